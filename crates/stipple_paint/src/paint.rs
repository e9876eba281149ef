//! Paints: solid colors, two-stop gradients and image patterns
//!
//! Every paint is expressed in the same form: a transform into paint space,
//! a half extent, a corner radius and a feather distance between an inner and
//! an outer color. Gradients differ only in how those parameters are chosen,
//! so the fragment stage evaluates all of them with one rounded-box distance.

use slotmap::new_key_type;

use crate::color::Color;
use crate::transform::Transform2D;

new_key_type! {
    /// Handle to an image registered with a renderer
    pub struct ImageId;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub xform: Transform2D,
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<ImageId>,
}

impl Default for Paint {
    fn default() -> Self {
        Self::color(Color::BLACK)
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::color(color)
    }
}

impl Paint {
    pub fn color(color: Color) -> Self {
        Self {
            xform: Transform2D::identity(),
            extent: [0.0, 0.0],
            radius: 0.0,
            feather: 1.0,
            inner_color: color,
            outer_color: color,
            image: None,
        }
    }

    /// Gradient along the segment from `(sx, sy)` to `(ex, ey)`
    pub fn linear_gradient(sx: f32, sy: f32, ex: f32, ey: f32, from: Color, to: Color) -> Self {
        const LARGE: f32 = 1e5;
        let mut dx = ex - sx;
        let mut dy = ey - sy;
        let d = (dx * dx + dy * dy).sqrt();
        if d > 0.0001 {
            dx /= d;
            dy /= d;
        } else {
            dx = 0.0;
            dy = 1.0;
        }
        Self {
            xform: Transform2D {
                a: dy,
                b: -dx,
                c: dx,
                d: dy,
                e: sx - dx * LARGE,
                f: sy - dy * LARGE,
            },
            extent: [LARGE, LARGE + d * 0.5],
            radius: 0.0,
            feather: d.max(1.0),
            inner_color: from,
            outer_color: to,
            image: None,
        }
    }

    /// Gradient between two circles sharing a center
    pub fn radial_gradient(
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;
        Self {
            xform: Transform2D::translate(cx, cy),
            extent: [r, r],
            radius: r,
            feather: f.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Feathered rounded rectangle, useful for drop shadows
    #[allow(clippy::too_many_arguments)]
    pub fn box_gradient(
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        feather: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        Self {
            xform: Transform2D::translate(x + w * 0.5, y + h * 0.5),
            extent: [w * 0.5, h * 0.5],
            radius,
            feather: feather.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Image repeated over `(ox, oy)` with size `width` x `height`, rotated by `angle`
    pub fn image_pattern(
        ox: f32,
        oy: f32,
        width: f32,
        height: f32,
        angle: f32,
        image: ImageId,
        alpha: f32,
    ) -> Self {
        let mut xform = Transform2D::rotate(angle);
        xform.e = ox;
        xform.f = oy;
        let tint = Color::new(1.0, 1.0, 1.0, alpha);
        Self {
            xform,
            extent: [width, height],
            radius: 0.0,
            feather: 0.0,
            inner_color: tint,
            outer_color: tint,
            image: Some(image),
        }
    }

    /// Paint space followed by `xform`
    pub fn transformed(mut self, xform: &Transform2D) -> Self {
        self.xform = self.xform.then(xform);
        self
    }

    /// Scale both colors' alpha
    pub fn faded(mut self, alpha: f32) -> Self {
        self.inner_color = self.inner_color.fade(alpha);
        self.outer_color = self.outer_color.fade(alpha);
        self
    }

    pub fn is_solid(&self) -> bool {
        self.image.is_none() && self.inner_color == self.outer_color
    }
}
