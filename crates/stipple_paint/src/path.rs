//! Path building and representation
//!
//! Arcs and shape helpers are lowered to cubic segments as they are added, so
//! a built [`Path`] only holds moves, lines, quadratics, cubics, closes and
//! winding markers.

use smallvec::SmallVec;

use crate::geometry::{Point, Rect};
use crate::transform::Transform2D;

/// Bezier handle length for a quarter circle
pub const KAPPA90: f32 = 0.552_284_8;

const DIST_TOL: f32 = 0.01;

/// Orientation of a sub-path
///
/// Solid shapes wind counter-clockwise and holes clockwise; the tessellator
/// reorients every sub-path to match its marker before expansion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Winding {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl Winding {
    pub const SOLID: Winding = Winding::CounterClockwise;
    pub const HOLE: Winding = Winding::Clockwise;
}

/// Path command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo {
        control: Point,
        end: Point,
    },
    CubicTo {
        control1: Point,
        control2: Point,
        end: Point,
    },
    Close,
    /// Sets the winding of the current sub-path
    Winding(Winding),
}

/// A 2D path composed of commands
#[derive(Clone, Debug, Default)]
pub struct Path {
    commands: SmallVec<[PathCommand; 16]>,
    current: Point,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.current = Point::ZERO;
    }

    /// Last point added, or the origin for an empty path
    pub fn current_point(&self) -> Point {
        self.current
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        let point = Point::new(x, y);
        self.commands.push(PathCommand::MoveTo(point));
        self.current = point;
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        let point = Point::new(x, y);
        self.commands.push(PathCommand::LineTo(point));
        self.current = point;
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let end = Point::new(x, y);
        self.commands.push(PathCommand::QuadTo {
            control: Point::new(cx, cy),
            end,
        });
        self.current = end;
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let end = Point::new(x, y);
        self.commands.push(PathCommand::CubicTo {
            control1: Point::new(c1x, c1y),
            control2: Point::new(c2x, c2y),
            end,
        });
        self.current = end;
    }

    pub fn close(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    pub fn set_winding(&mut self, winding: Winding) {
        self.commands.push(PathCommand::Winding(winding));
    }

    /// Circular arc around `(cx, cy)` from angle `a0` to `a1` (radians)
    ///
    /// `Winding::Clockwise` sweeps with increasing angle in y-down space.
    /// Connects to the current sub-path with a line when the path is not empty.
    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        use std::f32::consts::{FRAC_PI_2, TAU};

        let mut da = a1 - a0;
        if dir == Winding::Clockwise {
            if da.abs() >= TAU {
                da = TAU;
            } else {
                while da < 0.0 {
                    da += TAU;
                }
            }
        } else if da.abs() >= TAU {
            da = -TAU;
        } else {
            while da > 0.0 {
                da -= TAU;
            }
        }

        let ndivs = ((da.abs() / FRAC_PI_2 + 0.5) as i32).clamp(1, 5);
        let hda = (da / ndivs as f32) / 2.0;
        let mut kappa = (4.0 / 3.0 * (1.0 - hda.cos()) / hda.sin()).abs();
        if dir == Winding::CounterClockwise {
            kappa = -kappa;
        }

        let mut prev = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for i in 0..=ndivs {
            let a = a0 + da * (i as f32 / ndivs as f32);
            let (dy, dx) = a.sin_cos();
            let x = cx + dx * r;
            let y = cy + dy * r;
            let tanx = -dy * r * kappa;
            let tany = dx * r * kappa;
            if i == 0 {
                if self.commands.is_empty() {
                    self.move_to(x, y);
                } else {
                    self.line_to(x, y);
                }
            } else {
                let (px, py, ptanx, ptany) = prev;
                self.cubic_to(px + ptanx, py + ptany, x - tanx, y - tany, x, y);
            }
            prev = (x, y, tanx, tany);
        }
    }

    /// Arc tangent to the lines (current → p1) and (p1 → p2)
    ///
    /// Degenerate configurations fall back to a straight line to `p1`.
    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        if self.commands.is_empty() {
            return;
        }
        let p0 = self.current;
        let p1 = Point::new(x1, y1);
        let p2 = Point::new(x2, y2);

        if p0.approx_eq(p1, DIST_TOL)
            || p1.approx_eq(p2, DIST_TOL)
            || dist_pt_seg_sq(p1, p0, p2) < DIST_TOL * DIST_TOL
            || radius < DIST_TOL
        {
            self.line_to(x1, y1);
            return;
        }

        let (dx0, dy0) = normalize(p0.x - p1.x, p0.y - p1.y);
        let (dx1, dy1) = normalize(p2.x - p1.x, p2.y - p1.y);
        let a = (dx0 * dx1 + dy0 * dy1).clamp(-1.0, 1.0).acos();
        let d = radius / (a / 2.0).tan();

        if d > 10000.0 {
            self.line_to(x1, y1);
            return;
        }

        let (cx, cy, a0, a1, dir) = if dx1 * dy0 - dx0 * dy1 > 0.0 {
            (
                x1 + dx0 * d + dy0 * radius,
                y1 + dy0 * d - dx0 * radius,
                dx0.atan2(-dy0),
                (-dx1).atan2(dy1),
                Winding::Clockwise,
            )
        } else {
            (
                x1 + dx0 * d - dy0 * radius,
                y1 + dy0 * d + dx0 * radius,
                (-dx0).atan2(dy0),
                dx1.atan2(-dy1),
                Winding::CounterClockwise,
            )
        };
        self.arc(cx, cy, radius, a0, a1, dir);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x, y + h);
        self.line_to(x + w, y + h);
        self.line_to(x + w, y);
        self.close();
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        if r < 0.1 {
            self.rect(x, y, w, h);
            return;
        }
        let rx = r.min(w.abs() * 0.5) * w.signum();
        let ry = r.min(h.abs() * 0.5) * h.signum();
        let k = 1.0 - KAPPA90;
        self.move_to(x, y + ry);
        self.line_to(x, y + h - ry);
        self.cubic_to(x, y + h - ry * k, x + rx * k, y + h, x + rx, y + h);
        self.line_to(x + w - rx, y + h);
        self.cubic_to(x + w - rx * k, y + h, x + w, y + h - ry * k, x + w, y + h - ry);
        self.line_to(x + w, y + ry);
        self.cubic_to(x + w, y + ry * k, x + w - rx * k, y, x + w - rx, y);
        self.line_to(x + rx, y);
        self.cubic_to(x + rx * k, y, x, y + ry * k, x, y + ry);
        self.close();
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        let k = KAPPA90;
        self.move_to(cx - rx, cy);
        self.cubic_to(cx - rx, cy + ry * k, cx - rx * k, cy + ry, cx, cy + ry);
        self.cubic_to(cx + rx * k, cy + ry, cx + rx, cy + ry * k, cx + rx, cy);
        self.cubic_to(cx + rx, cy - ry * k, cx + rx * k, cy - ry, cx, cy - ry);
        self.cubic_to(cx - rx * k, cy - ry, cx - rx, cy - ry * k, cx - rx, cy);
        self.close();
    }

    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) {
        self.ellipse(cx, cy, r, r);
    }

    /// Copy of the path with every point mapped through `xform`
    pub fn transformed(&self, xform: &Transform2D) -> Path {
        if xform.is_identity() {
            return self.clone();
        }
        let commands = self
            .commands
            .iter()
            .map(|cmd| match *cmd {
                PathCommand::MoveTo(p) => PathCommand::MoveTo(xform.apply(p)),
                PathCommand::LineTo(p) => PathCommand::LineTo(xform.apply(p)),
                PathCommand::QuadTo { control, end } => PathCommand::QuadTo {
                    control: xform.apply(control),
                    end: xform.apply(end),
                },
                PathCommand::CubicTo {
                    control1,
                    control2,
                    end,
                } => PathCommand::CubicTo {
                    control1: xform.apply(control1),
                    control2: xform.apply(control2),
                    end: xform.apply(end),
                },
                other => other,
            })
            .collect();
        Path {
            commands,
            current: xform.apply(self.current),
        }
    }

    /// Bounds of all points including control points
    pub fn control_bounds(&self) -> Option<Rect> {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        let mut any = false;
        let mut include = |p: Point| {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            any = true;
        };
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => include(p),
                PathCommand::QuadTo { control, end } => {
                    include(control);
                    include(end);
                }
                PathCommand::CubicTo {
                    control1,
                    control2,
                    end,
                } => {
                    include(control1);
                    include(control2);
                    include(end);
                }
                PathCommand::Close | PathCommand::Winding(_) => {}
            }
        }
        any.then(|| Rect::from_bounds(min.x, min.y, max.x, max.y))
    }
}

fn normalize(x: f32, y: f32) -> (f32, f32) {
    let d = (x * x + y * y).sqrt();
    if d > 1e-6 {
        (x / d, y / d)
    } else {
        (x, y)
    }
}

/// Squared distance from `p` to the segment `a`-`b`
fn dist_pt_seg_sq(p: Point, a: Point, b: Point) -> f32 {
    let pqx = b.x - a.x;
    let pqy = b.y - a.y;
    let dx = p.x - a.x;
    let dy = p.y - a.y;
    let d = pqx * pqx + pqy * pqy;
    let mut t = pqx * dx + pqy * dy;
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    let dx = a.x + t * pqx - p.x;
    let dy = a.y + t * pqy - p.y;
    dx * dx + dy * dy
}

/// Builder for constructing paths
pub struct PathBuilder {
    path: Path,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self { path: Path::new() }
    }

    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.path.move_to(x, y);
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.path.line_to(x, y);
        self
    }

    pub fn quad_to(mut self, cx: f32, cy: f32, x: f32, y: f32) -> Self {
        self.path.quad_to(cx, cy, x, y);
        self
    }

    pub fn cubic_to(mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Self {
        self.path.cubic_to(c1x, c1y, c2x, c2y, x, y);
        self
    }

    pub fn arc(mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) -> Self {
        self.path.arc(cx, cy, r, a0, a1, dir);
        self
    }

    pub fn arc_to(mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) -> Self {
        self.path.arc_to(x1, y1, x2, y2, radius);
        self
    }

    pub fn rect(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.path.rect(x, y, w, h);
        self
    }

    pub fn rounded_rect(mut self, x: f32, y: f32, w: f32, h: f32, r: f32) -> Self {
        self.path.rounded_rect(x, y, w, h, r);
        self
    }

    pub fn ellipse(mut self, cx: f32, cy: f32, rx: f32, ry: f32) -> Self {
        self.path.ellipse(cx, cy, rx, ry);
        self
    }

    pub fn circle(mut self, cx: f32, cy: f32, r: f32) -> Self {
        self.path.circle(cx, cy, r);
        self
    }

    pub fn winding(mut self, winding: Winding) -> Self {
        self.path.set_winding(winding);
        self
    }

    pub fn close(mut self) -> Self {
        self.path.close();
        self
    }

    pub fn build(self) -> Path {
        self.path
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}
