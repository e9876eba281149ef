//! 2D affine transforms

use crate::geometry::Point;

/// 2D affine transform
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    pub fn scale_uniform(s: f32) -> Self {
        Self::scale(s, s)
    }

    pub fn rotate(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_x(angle: f32) -> Self {
        Self {
            c: angle.tan(),
            ..Self::identity()
        }
    }

    pub fn skew_y(angle: f32) -> Self {
        Self {
            b: angle.tan(),
            ..Self::identity()
        }
    }

    /// Transform applying `self` first, then `next`
    pub fn then(&self, next: &Transform2D) -> Transform2D {
        Transform2D {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    /// Transform applying `prev` first, then `self`
    pub fn pre_multiply(&self, prev: &Transform2D) -> Transform2D {
        prev.then(self)
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.c * self.b
    }

    /// Inverse transform, `None` when the matrix is singular
    pub fn inverse(&self) -> Option<Transform2D> {
        let det = self.determinant() as f64;
        if det.abs() < 1e-6 {
            return None;
        }
        let invdet = 1.0 / det;
        let (a, b, c, d, e, f) = (
            self.a as f64,
            self.b as f64,
            self.c as f64,
            self.d as f64,
            self.e as f64,
            self.f as f64,
        );
        Some(Transform2D {
            a: (d * invdet) as f32,
            c: (-c * invdet) as f32,
            e: ((c * f - d * e) * invdet) as f32,
            b: (-b * invdet) as f32,
            d: (a * invdet) as f32,
            f: ((b * e - a * f) * invdet) as f32,
        })
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            p.x * self.a + p.y * self.c + self.e,
            p.x * self.b + p.y * self.d + self.f,
        )
    }

    /// Mean length of the two basis vectors
    pub fn average_scale(&self) -> f32 {
        let sx = (self.a * self.a + self.c * self.c).sqrt();
        let sy = (self.b * self.b + self.d * self.d).sqrt();
        (sx + sy) * 0.5
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Column-major 3x4 layout used by uniform blocks (each column padded to vec4)
    pub fn to_mat3x4(&self) -> [f32; 12] {
        [
            self.a, self.b, 0.0, 0.0, self.c, self.d, 0.0, 0.0, self.e, self.f, 1.0, 0.0,
        ]
    }
}
