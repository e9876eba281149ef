//! Path tessellation
//!
//! Paths are flattened into polylines (cubics by recursive subdivision,
//! quadratics lifted to cubics), reoriented to their winding marker and then
//! expanded:
//!
//! - fills produce a triangle fan per sub-path plus an optional triangle strip
//!   for the antialiased fringe
//! - strokes produce one triangle strip per sub-path including caps and joins
//!
//! Texture coordinates on path vertices carry the antialiasing ramp: `u` runs
//! across the stroke or fringe (0.5 in the middle), `v` fades butt caps.

use std::f32::consts::PI;
use std::ops::Range;

use stipple_paint::{LineCap, LineJoin, Path, PathCommand, Point, Rect, StrokeStyle, Transform2D, Winding};

use crate::primitives::Vertex;
use crate::TessError;

const PT_CORNER: u8 = 0x01;
const PT_LEFT: u8 = 0x02;
const PT_BEVEL: u8 = 0x04;
const PT_INNERBEVEL: u8 = 0x08;

const MAX_BEZIER_DEPTH: u32 = 10;
const FILL_MITER_LIMIT: f32 = 2.4;

/// Tolerances derived from the device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessParams {
    /// Maximum curve deviation before subdividing
    pub tess_tol: f32,
    /// Points closer than this are merged
    pub dist_tol: f32,
    /// Width of the antialiased fringe
    pub fringe_width: f32,
}

impl TessParams {
    pub fn new(device_pixel_ratio: f32) -> Self {
        let ratio = device_pixel_ratio.max(1e-3);
        Self {
            tess_tol: 0.25 / ratio,
            dist_tol: 0.01 / ratio,
            fringe_width: 1.0 / ratio,
        }
    }
}

impl Default for TessParams {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FlatPoint {
    x: f32,
    y: f32,
    /// Unit direction to the next point
    dx: f32,
    dy: f32,
    len: f32,
    /// Extrusion vector scaled so that offsetting by it keeps edges parallel
    dmx: f32,
    dmy: f32,
    flags: u8,
}

#[derive(Debug, Clone)]
struct SubPath {
    first: usize,
    count: usize,
    closed: bool,
    winding: Winding,
    convex: bool,
    bevels: usize,
    fill: Range<usize>,
    stroke: Range<usize>,
}

impl SubPath {
    fn new(first: usize) -> Self {
        Self {
            first,
            count: 0,
            closed: false,
            winding: Winding::SOLID,
            convex: false,
            bevels: 0,
            fill: 0..0,
            stroke: 0..0,
        }
    }

    fn drawable(&self) -> bool {
        self.count >= 2
    }
}

/// One expanded sub-path
#[derive(Debug, Clone, PartialEq)]
pub struct TessPath {
    /// Triangle fan covering the interior (fills only)
    pub fill: Range<usize>,
    /// Triangle strip for the fringe (fills) or the whole stroke
    pub stroke: Range<usize>,
    pub winding: Winding,
    pub closed: bool,
    pub convex: bool,
}

/// Borrowed result of a fill or stroke expansion
#[derive(Debug, Clone, Copy)]
pub struct Tessellation<'a> {
    pub vertices: &'a [Vertex],
    pub paths: &'a [TessPath],
    /// Bounds of the flattened points
    pub bounds: Rect,
    /// A single convex sub-path, drawable without the stencil buffer
    pub convex: bool,
}

impl Tessellation<'_> {
    pub fn fill_vertices(&self, path: &TessPath) -> &[Vertex] {
        &self.vertices[path.fill.clone()]
    }

    pub fn stroke_vertices(&self, path: &TessPath) -> &[Vertex] {
        &self.vertices[path.stroke.clone()]
    }
}

/// Reusable path flattener and expander
pub struct PathTessellator {
    params: TessParams,
    max_points: usize,
    max_vertices: usize,
    points: Vec<FlatPoint>,
    subpaths: Vec<SubPath>,
    vertices: Vec<Vertex>,
    paths: Vec<TessPath>,
    bounds: Rect,
}

impl Default for PathTessellator {
    fn default() -> Self {
        Self::new(TessParams::default(), 1 << 16, 1 << 20)
    }
}

impl PathTessellator {
    pub fn new(params: TessParams, max_points: usize, max_vertices: usize) -> Self {
        Self {
            params,
            max_points,
            max_vertices,
            points: Vec::with_capacity(128),
            subpaths: Vec::with_capacity(16),
            vertices: Vec::with_capacity(256),
            paths: Vec::with_capacity(16),
            bounds: Rect::default(),
        }
    }

    pub fn params(&self) -> TessParams {
        self.params
    }

    pub fn set_params(&mut self, params: TessParams) {
        self.params = params;
    }

    /// Expand `path` (mapped through `xform`) into fill geometry
    pub fn fill(&mut self, path: &Path, xform: &Transform2D, antialias: bool) -> Result<Tessellation<'_>, TessError> {
        self.flatten(path, xform)?;
        let w = if antialias { self.params.fringe_width } else { 0.0 };
        self.expand_fill(w, LineJoin::Miter, FILL_MITER_LIMIT)?;
        Ok(self.output())
    }

    /// Expand `path` (mapped through `xform`) into stroke geometry of `style.width`
    pub fn stroke(
        &mut self,
        path: &Path,
        xform: &Transform2D,
        style: &StrokeStyle,
        antialias: bool,
    ) -> Result<Tessellation<'_>, TessError> {
        self.flatten(path, xform)?;
        let aa = if antialias { self.params.fringe_width } else { 0.0 };
        self.expand_stroke(style.width * 0.5, aa, style.line_cap, style.line_join, style.miter_limit)?;
        Ok(self.output())
    }

    /// Flattened points of every sub-path from the last fill, stroke or flatten
    pub fn flattened(&self) -> Vec<Vec<Point>> {
        self.subpaths
            .iter()
            .map(|sp| {
                self.points[sp.first..sp.first + sp.count]
                    .iter()
                    .map(|p| Point::new(p.x, p.y))
                    .collect()
            })
            .collect()
    }

    /// Flatten curves, merge coincident points and apply winding markers
    pub fn flatten(&mut self, path: &Path, xform: &Transform2D) -> Result<(), TessError> {
        self.points.clear();
        self.subpaths.clear();
        self.vertices.clear();
        self.paths.clear();

        let mut last = Point::ZERO;
        for cmd in path.commands() {
            match *cmd {
                PathCommand::MoveTo(p) => {
                    self.subpaths.push(SubPath::new(self.points.len()));
                    last = xform.apply(p);
                    self.add_point(last, PT_CORNER)?;
                }
                PathCommand::LineTo(p) => {
                    self.ensure_subpath(last)?;
                    last = xform.apply(p);
                    self.add_point(last, PT_CORNER)?;
                }
                PathCommand::QuadTo { control, end } => {
                    self.ensure_subpath(last)?;
                    let c = xform.apply(control);
                    let e = xform.apply(end);
                    let c1 = Point::new(last.x + 2.0 / 3.0 * (c.x - last.x), last.y + 2.0 / 3.0 * (c.y - last.y));
                    let c2 = Point::new(e.x + 2.0 / 3.0 * (c.x - e.x), e.y + 2.0 / 3.0 * (c.y - e.y));
                    self.tessellate_bezier([last, c1, c2, e], 0, PT_CORNER)?;
                    last = e;
                }
                PathCommand::CubicTo {
                    control1,
                    control2,
                    end,
                } => {
                    self.ensure_subpath(last)?;
                    let c1 = xform.apply(control1);
                    let c2 = xform.apply(control2);
                    let e = xform.apply(end);
                    self.tessellate_bezier([last, c1, c2, e], 0, PT_CORNER)?;
                    last = e;
                }
                PathCommand::Close => {
                    if let Some(sp) = self.subpaths.last_mut() {
                        sp.closed = true;
                    }
                }
                PathCommand::Winding(w) => {
                    if let Some(sp) = self.subpaths.last_mut() {
                        sp.winding = w;
                    }
                }
            }
        }

        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        let dist_tol = self.params.dist_tol;
        for sp in &mut self.subpaths {
            let pts = &mut self.points[sp.first..sp.first + sp.count];
            if sp.count > 1 {
                let (a, b) = (pts[sp.count - 1], pts[0]);
                if points_equal(a.x, a.y, b.x, b.y, dist_tol) {
                    sp.count -= 1;
                    sp.closed = true;
                }
            }
            let pts = &mut pts[..sp.count];

            if pts.len() > 2 {
                let area = poly_area(pts);
                let reverse = match sp.winding {
                    Winding::CounterClockwise => area < 0.0,
                    Winding::Clockwise => area > 0.0,
                };
                if reverse {
                    pts.reverse();
                }
            }

            let n = pts.len();
            for i in 0..n {
                let next = pts[(i + 1) % n];
                let p = &mut pts[i];
                let (dx, dy, len) = normalize(next.x - p.x, next.y - p.y);
                p.dx = dx;
                p.dy = dy;
                p.len = len;
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
        }
        self.bounds = if min.x <= max.x {
            Rect::from_bounds(min.x, min.y, max.x, max.y)
        } else {
            Rect::default()
        };
        Ok(())
    }

    fn ensure_subpath(&mut self, at: Point) -> Result<(), TessError> {
        if self.subpaths.is_empty() {
            self.subpaths.push(SubPath::new(self.points.len()));
            self.add_point(at, PT_CORNER)?;
        }
        Ok(())
    }

    fn add_point(&mut self, p: Point, flags: u8) -> Result<(), TessError> {
        let Some(sp) = self.subpaths.last_mut() else {
            return Ok(());
        };
        if sp.count > 0 {
            if let Some(last) = self.points.last_mut() {
                if points_equal(last.x, last.y, p.x, p.y, self.params.dist_tol) {
                    last.flags |= flags;
                    return Ok(());
                }
            }
        }
        if self.points.len() >= self.max_points {
            tracing::warn!(limit = self.max_points, "path point scratch exhausted");
            return Err(TessError::ScratchExhausted {
                what: "points",
                limit: self.max_points,
            });
        }
        self.points.push(FlatPoint {
            x: p.x,
            y: p.y,
            flags,
            ..Default::default()
        });
        sp.count += 1;
        Ok(())
    }

    fn tessellate_bezier(&mut self, [p1, p2, p3, p4]: [Point; 4], level: u32, flags: u8) -> Result<(), TessError> {
        if level > MAX_BEZIER_DEPTH {
            return Ok(());
        }

        let dx = p4.x - p1.x;
        let dy = p4.y - p1.y;
        let d2 = ((p2.x - p4.x) * dy - (p2.y - p4.y) * dx).abs();
        let d3 = ((p3.x - p4.x) * dy - (p3.y - p4.y) * dx).abs();

        if (d2 + d3) * (d2 + d3) < self.params.tess_tol * (dx * dx + dy * dy) {
            return self.add_point(p4, flags);
        }

        let mid = |a: Point, b: Point| Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5);
        let p12 = mid(p1, p2);
        let p23 = mid(p2, p3);
        let p34 = mid(p3, p4);
        let p123 = mid(p12, p23);
        let p234 = mid(p23, p34);
        let p1234 = mid(p123, p234);

        self.tessellate_bezier([p1, p12, p123, p1234], level + 1, 0)?;
        self.tessellate_bezier([p1234, p234, p34, p4], level + 1, flags)
    }

    fn calculate_joins(&mut self, w: f32, line_join: LineJoin, miter_limit: f32) {
        let iw = if w > 0.0 { 1.0 / w } else { 0.0 };

        for sp in &mut self.subpaths {
            if sp.count == 0 {
                continue;
            }
            let pts = &mut self.points[sp.first..sp.first + sp.count];
            let n = pts.len();
            let mut nleft = 0;
            sp.bevels = 0;

            for i in 0..n {
                let p0 = pts[(i + n - 1) % n];
                let p1 = &mut pts[i];
                let (dlx0, dly0) = (p0.dy, -p0.dx);
                let (dlx1, dly1) = (p1.dy, -p1.dx);

                p1.dmx = (dlx0 + dlx1) * 0.5;
                p1.dmy = (dly0 + dly1) * 0.5;
                let dmr2 = p1.dmx * p1.dmx + p1.dmy * p1.dmy;
                if dmr2 > 0.000_001 {
                    let scale = (1.0 / dmr2).min(600.0);
                    p1.dmx *= scale;
                    p1.dmy *= scale;
                }

                p1.flags &= PT_CORNER;

                let cross = p1.dx * p0.dy - p0.dx * p1.dy;
                if cross > 0.0 {
                    nleft += 1;
                    p1.flags |= PT_LEFT;
                }

                // inner bevel when the segments are too short for the extrusion
                let limit = (p0.len.min(p1.len) * iw).max(1.01);
                if dmr2 * limit * limit < 1.0 {
                    p1.flags |= PT_INNERBEVEL;
                }

                if p1.flags & PT_CORNER != 0
                    && (dmr2 * miter_limit * miter_limit < 1.0
                        || line_join == LineJoin::Bevel
                        || line_join == LineJoin::Round)
                {
                    p1.flags |= PT_BEVEL;
                }

                if p1.flags & (PT_BEVEL | PT_INNERBEVEL) != 0 {
                    sp.bevels += 1;
                }
            }

            sp.convex = nleft == n;
        }
    }

    fn reserve_vertices(&mut self, count: usize) -> Result<(), TessError> {
        if count > self.max_vertices {
            tracing::warn!(needed = count, limit = self.max_vertices, "path vertex scratch exhausted");
            return Err(TessError::ScratchExhausted {
                what: "vertices",
                limit: self.max_vertices,
            });
        }
        self.vertices.reserve(count);
        Ok(())
    }

    fn expand_fill(&mut self, w: f32, line_join: LineJoin, miter_limit: f32) -> Result<(), TessError> {
        let aa = self.params.fringe_width;
        let fringe = w > 0.0;

        self.calculate_joins(w, line_join, miter_limit);

        let mut needed = 0;
        for sp in self.subpaths.iter().filter(|sp| sp.drawable()) {
            needed += sp.count + sp.bevels + 1;
            if fringe {
                needed += (sp.count + sp.bevels * 5 + 1) * 2;
            }
        }
        self.reserve_vertices(needed)?;

        let mut drawable = self.subpaths.iter().filter(|sp| sp.drawable());
        let convex = match (drawable.next(), drawable.next()) {
            (Some(sp), None) => sp.convex,
            _ => false,
        };

        let woff = 0.5 * aa;
        for sp in &mut self.subpaths {
            if !sp.drawable() {
                continue;
            }
            let pts = &self.points[sp.first..sp.first + sp.count];
            let verts = &mut self.vertices;
            let n = pts.len();

            let start = verts.len();
            if fringe {
                for i in 0..n {
                    let p0 = &pts[(i + n - 1) % n];
                    let p1 = &pts[i];
                    if p1.flags & PT_BEVEL != 0 {
                        if p1.flags & PT_LEFT != 0 {
                            vset(verts, p1.x + p1.dmx * woff, p1.y + p1.dmy * woff, 0.5, 1.0);
                        } else {
                            let (dlx0, dly0) = (p0.dy, -p0.dx);
                            let (dlx1, dly1) = (p1.dy, -p1.dx);
                            vset(verts, p1.x + dlx0 * woff, p1.y + dly0 * woff, 0.5, 1.0);
                            vset(verts, p1.x + dlx1 * woff, p1.y + dly1 * woff, 0.5, 1.0);
                        }
                    } else {
                        vset(verts, p1.x + p1.dmx * woff, p1.y + p1.dmy * woff, 0.5, 1.0);
                    }
                }
            } else {
                for p in pts {
                    vset(verts, p.x, p.y, 0.5, 1.0);
                }
            }
            sp.fill = start..verts.len();

            if fringe {
                let mut lw = w + woff;
                let rw = w - woff;
                let mut lu = 0.0;
                let ru = 1.0;
                // half a fringe is enough when no stencil pass covers the inside
                if convex {
                    lw = woff;
                    lu = 0.5;
                }

                let start = verts.len();
                for i in 0..n {
                    let p0 = &pts[(i + n - 1) % n];
                    let p1 = &pts[i];
                    if p1.flags & (PT_BEVEL | PT_INNERBEVEL) != 0 {
                        bevel_join(verts, p0, p1, lw, rw, lu, ru);
                    } else {
                        vset(verts, p1.x + p1.dmx * lw, p1.y + p1.dmy * lw, lu, 1.0);
                        vset(verts, p1.x - p1.dmx * rw, p1.y - p1.dmy * rw, ru, 1.0);
                    }
                }
                close_strip(verts, start, lu, ru);
                sp.stroke = start..verts.len();
            } else {
                let end = verts.len();
                sp.stroke = end..end;
            }
        }
        Ok(())
    }

    fn expand_stroke(
        &mut self,
        w: f32,
        aa: f32,
        line_cap: LineCap,
        line_join: LineJoin,
        miter_limit: f32,
    ) -> Result<(), TessError> {
        let ncap = curve_divs(w, PI, self.params.tess_tol);
        let w = w + aa * 0.5;
        let (u0, u1) = if aa == 0.0 { (0.5, 0.5) } else { (0.0, 1.0) };

        self.calculate_joins(w, line_join, miter_limit);

        let mut needed = 0;
        for sp in self.subpaths.iter().filter(|sp| sp.drawable()) {
            needed += if line_join == LineJoin::Round {
                (sp.count + sp.bevels * (ncap + 2) + 1) * 2
            } else {
                (sp.count + sp.bevels * 5 + 1) * 2
            };
            if !sp.closed {
                needed += if line_cap == LineCap::Round {
                    (ncap * 2 + 2) * 2
                } else {
                    (3 + 3) * 2
                };
            }
        }
        self.reserve_vertices(needed)?;

        for sp in &mut self.subpaths {
            if !sp.drawable() {
                continue;
            }
            let pts = &self.points[sp.first..sp.first + sp.count];
            let verts = &mut self.vertices;
            let n = pts.len();
            let looped = sp.closed;
            sp.fill = 0..0;

            let start = verts.len();
            let (s, e) = if looped { (0, n) } else { (1, n - 1) };

            if !looped {
                let p0 = &pts[0];
                let p1 = &pts[1];
                let (dx, dy, _) = normalize(p1.x - p0.x, p1.y - p0.y);
                match line_cap {
                    LineCap::Butt => butt_cap_start(verts, p0, dx, dy, w, -aa * 0.5, aa, u0, u1),
                    LineCap::Square => butt_cap_start(verts, p0, dx, dy, w, w - aa, aa, u0, u1),
                    LineCap::Round => round_cap_start(verts, p0, dx, dy, w, ncap, u0, u1),
                }
            }

            for i in s..e {
                let p0 = &pts[(i + n - 1) % n];
                let p1 = &pts[i];
                if p1.flags & (PT_BEVEL | PT_INNERBEVEL) != 0 {
                    if line_join == LineJoin::Round {
                        round_join(verts, p0, p1, w, w, u0, u1, ncap);
                    } else {
                        bevel_join(verts, p0, p1, w, w, u0, u1);
                    }
                } else {
                    vset(verts, p1.x + p1.dmx * w, p1.y + p1.dmy * w, u0, 1.0);
                    vset(verts, p1.x - p1.dmx * w, p1.y - p1.dmy * w, u1, 1.0);
                }
            }

            if looped {
                close_strip(verts, start, u0, u1);
            } else {
                let p0 = &pts[n - 2];
                let p1 = &pts[n - 1];
                let (dx, dy, _) = normalize(p1.x - p0.x, p1.y - p0.y);
                match line_cap {
                    LineCap::Butt => butt_cap_end(verts, p1, dx, dy, w, -aa * 0.5, aa, u0, u1),
                    LineCap::Square => butt_cap_end(verts, p1, dx, dy, w, w - aa, aa, u0, u1),
                    LineCap::Round => round_cap_end(verts, p1, dx, dy, w, ncap, u0, u1),
                }
            }

            sp.stroke = start..verts.len();
        }
        Ok(())
    }

    fn output(&mut self) -> Tessellation<'_> {
        self.paths.clear();
        self.paths.extend(self.subpaths.iter().filter(|sp| sp.drawable()).map(|sp| TessPath {
            fill: sp.fill.clone(),
            stroke: sp.stroke.clone(),
            winding: sp.winding,
            closed: sp.closed,
            convex: sp.convex,
        }));
        let convex = self.paths.len() == 1 && self.paths[0].convex;
        Tessellation {
            vertices: &self.vertices,
            paths: &self.paths,
            bounds: self.bounds,
            convex,
        }
    }
}

#[inline]
fn vset(verts: &mut Vec<Vertex>, x: f32, y: f32, u: f32, v: f32) {
    verts.push(Vertex::new(x, y, u, v));
}

/// Repeat the first two vertices of a strip starting at `start` to close it
fn close_strip(verts: &mut Vec<Vertex>, start: usize, u0: f32, u1: f32) {
    let a = verts[start].pos;
    let b = verts[start + 1].pos;
    vset(verts, a[0], a[1], u0, 1.0);
    vset(verts, b[0], b[1], u1, 1.0);
}

fn points_equal(x1: f32, y1: f32, x2: f32, y2: f32, tol: f32) -> bool {
    let dx = x2 - x1;
    let dy = y2 - y1;
    dx * dx + dy * dy < tol * tol
}

fn normalize(x: f32, y: f32) -> (f32, f32, f32) {
    let d = (x * x + y * y).sqrt();
    if d > 1e-6 {
        (x / d, y / d, d)
    } else {
        (x, y, d)
    }
}

/// Signed area; positive for counter-clockwise order in y-down space
fn poly_area(pts: &[FlatPoint]) -> f32 {
    let a = pts[0];
    let mut area = 0.0;
    for w in pts[1..].windows(2) {
        let (b, c) = (w[0], w[1]);
        area += (c.x - a.x) * (b.y - a.y) - (b.x - a.x) * (c.y - a.y);
    }
    area * 0.5
}

fn curve_divs(r: f32, arc: f32, tol: f32) -> usize {
    let da = (r / (r + tol)).acos() * 2.0;
    ((arc / da).ceil() as usize).max(2)
}

/// Outer points of a join: the two segment normals when beveled, else the miter point
fn choose_bevel(bevel: bool, p0: &FlatPoint, p1: &FlatPoint, w: f32) -> (f32, f32, f32, f32) {
    if bevel {
        (
            p1.x + p0.dy * w,
            p1.y - p0.dx * w,
            p1.x + p1.dy * w,
            p1.y - p1.dx * w,
        )
    } else {
        let x = p1.x + p1.dmx * w;
        let y = p1.y + p1.dmy * w;
        (x, y, x, y)
    }
}

fn bevel_join(verts: &mut Vec<Vertex>, p0: &FlatPoint, p1: &FlatPoint, lw: f32, rw: f32, lu: f32, ru: f32) {
    let (dlx0, dly0) = (p0.dy, -p0.dx);
    let (dlx1, dly1) = (p1.dy, -p1.dx);
    let inner = p1.flags & PT_INNERBEVEL != 0;

    if p1.flags & PT_LEFT != 0 {
        let (lx0, ly0, lx1, ly1) = choose_bevel(inner, p0, p1, lw);

        vset(verts, lx0, ly0, lu, 1.0);
        vset(verts, p1.x - dlx0 * rw, p1.y - dly0 * rw, ru, 1.0);

        if p1.flags & PT_BEVEL != 0 {
            vset(verts, lx0, ly0, lu, 1.0);
            vset(verts, p1.x - dlx0 * rw, p1.y - dly0 * rw, ru, 1.0);

            vset(verts, lx1, ly1, lu, 1.0);
            vset(verts, p1.x - dlx1 * rw, p1.y - dly1 * rw, ru, 1.0);
        } else {
            let rx0 = p1.x - p1.dmx * rw;
            let ry0 = p1.y - p1.dmy * rw;

            vset(verts, p1.x, p1.y, 0.5, 1.0);
            vset(verts, p1.x - dlx0 * rw, p1.y - dly0 * rw, ru, 1.0);

            vset(verts, rx0, ry0, ru, 1.0);
            vset(verts, rx0, ry0, ru, 1.0);

            vset(verts, p1.x, p1.y, 0.5, 1.0);
            vset(verts, p1.x - dlx1 * rw, p1.y - dly1 * rw, ru, 1.0);
        }

        vset(verts, lx1, ly1, lu, 1.0);
        vset(verts, p1.x - dlx1 * rw, p1.y - dly1 * rw, ru, 1.0);
    } else {
        let (rx0, ry0, rx1, ry1) = choose_bevel(inner, p0, p1, -rw);

        vset(verts, p1.x + dlx0 * lw, p1.y + dly0 * lw, lu, 1.0);
        vset(verts, rx0, ry0, ru, 1.0);

        if p1.flags & PT_BEVEL != 0 {
            vset(verts, p1.x + dlx0 * lw, p1.y + dly0 * lw, lu, 1.0);
            vset(verts, rx0, ry0, ru, 1.0);

            vset(verts, p1.x + dlx1 * lw, p1.y + dly1 * lw, lu, 1.0);
            vset(verts, rx1, ry1, ru, 1.0);
        } else {
            let lx0 = p1.x + p1.dmx * lw;
            let ly0 = p1.y + p1.dmy * lw;

            vset(verts, p1.x + dlx0 * lw, p1.y + dly0 * lw, lu, 1.0);
            vset(verts, p1.x, p1.y, 0.5, 1.0);

            vset(verts, lx0, ly0, lu, 1.0);
            vset(verts, lx0, ly0, lu, 1.0);

            vset(verts, p1.x + dlx1 * lw, p1.y + dly1 * lw, lu, 1.0);
            vset(verts, p1.x, p1.y, 0.5, 1.0);
        }

        vset(verts, p1.x + dlx1 * lw, p1.y + dly1 * lw, lu, 1.0);
        vset(verts, rx1, ry1, ru, 1.0);
    }
}

#[allow(clippy::too_many_arguments)]
fn round_join(
    verts: &mut Vec<Vertex>,
    p0: &FlatPoint,
    p1: &FlatPoint,
    lw: f32,
    rw: f32,
    lu: f32,
    ru: f32,
    ncap: usize,
) {
    let (dlx0, dly0) = (p0.dy, -p0.dx);
    let (dlx1, dly1) = (p1.dy, -p1.dx);
    let inner = p1.flags & PT_INNERBEVEL != 0;

    if p1.flags & PT_LEFT != 0 {
        let (lx0, ly0, lx1, ly1) = choose_bevel(inner, p0, p1, lw);
        let a0 = (-dly0).atan2(-dlx0);
        let mut a1 = (-dly1).atan2(-dlx1);
        if a1 > a0 {
            a1 -= PI * 2.0;
        }

        vset(verts, lx0, ly0, lu, 1.0);
        vset(verts, p1.x - dlx0 * rw, p1.y - dly0 * rw, ru, 1.0);

        let n = (((a0 - a1) / PI * ncap as f32).ceil() as usize).clamp(2, ncap.max(2));
        for i in 0..n {
            let u = i as f32 / (n - 1) as f32;
            let a = a0 + u * (a1 - a0);
            let rx = p1.x + a.cos() * rw;
            let ry = p1.y + a.sin() * rw;
            vset(verts, p1.x, p1.y, 0.5, 1.0);
            vset(verts, rx, ry, ru, 1.0);
        }

        vset(verts, lx1, ly1, lu, 1.0);
        vset(verts, p1.x - dlx1 * rw, p1.y - dly1 * rw, ru, 1.0);
    } else {
        let (rx0, ry0, rx1, ry1) = choose_bevel(inner, p0, p1, -rw);
        let a0 = dly0.atan2(dlx0);
        let mut a1 = dly1.atan2(dlx1);
        if a1 < a0 {
            a1 += PI * 2.0;
        }

        vset(verts, p1.x + dlx0 * rw, p1.y + dly0 * rw, lu, 1.0);
        vset(verts, rx0, ry0, ru, 1.0);

        let n = (((a1 - a0) / PI * ncap as f32).ceil() as usize).clamp(2, ncap.max(2));
        for i in 0..n {
            let u = i as f32 / (n - 1) as f32;
            let a = a0 + u * (a1 - a0);
            let lx = p1.x + a.cos() * lw;
            let ly = p1.y + a.sin() * lw;
            vset(verts, lx, ly, lu, 1.0);
            vset(verts, p1.x, p1.y, 0.5, 1.0);
        }

        vset(verts, p1.x + dlx1 * rw, p1.y + dly1 * rw, lu, 1.0);
        vset(verts, rx1, ry1, ru, 1.0);
    }
}

#[allow(clippy::too_many_arguments)]
fn butt_cap_start(
    verts: &mut Vec<Vertex>,
    p: &FlatPoint,
    dx: f32,
    dy: f32,
    w: f32,
    d: f32,
    aa: f32,
    u0: f32,
    u1: f32,
) {
    let px = p.x - dx * d;
    let py = p.y - dy * d;
    let (dlx, dly) = (dy, -dx);
    vset(verts, px + dlx * w - dx * aa, py + dly * w - dy * aa, u0, 0.0);
    vset(verts, px - dlx * w - dx * aa, py - dly * w - dy * aa, u1, 0.0);
    vset(verts, px + dlx * w, py + dly * w, u0, 1.0);
    vset(verts, px - dlx * w, py - dly * w, u1, 1.0);
}

#[allow(clippy::too_many_arguments)]
fn butt_cap_end(
    verts: &mut Vec<Vertex>,
    p: &FlatPoint,
    dx: f32,
    dy: f32,
    w: f32,
    d: f32,
    aa: f32,
    u0: f32,
    u1: f32,
) {
    let px = p.x + dx * d;
    let py = p.y + dy * d;
    let (dlx, dly) = (dy, -dx);
    vset(verts, px + dlx * w, py + dly * w, u0, 1.0);
    vset(verts, px - dlx * w, py - dly * w, u1, 1.0);
    vset(verts, px + dlx * w + dx * aa, py + dly * w + dy * aa, u0, 0.0);
    vset(verts, px - dlx * w + dx * aa, py - dly * w + dy * aa, u1, 0.0);
}

#[allow(clippy::too_many_arguments)]
fn round_cap_start(
    verts: &mut Vec<Vertex>,
    p: &FlatPoint,
    dx: f32,
    dy: f32,
    w: f32,
    ncap: usize,
    u0: f32,
    u1: f32,
) {
    let (px, py) = (p.x, p.y);
    let (dlx, dly) = (dy, -dx);
    for i in 0..ncap {
        let a = i as f32 / (ncap - 1) as f32 * PI;
        let ax = a.cos() * w;
        let ay = a.sin() * w;
        vset(verts, px - dlx * ax - dx * ay, py - dly * ax - dy * ay, u0, 1.0);
        vset(verts, px, py, 0.5, 1.0);
    }
    vset(verts, px + dlx * w, py + dly * w, u0, 1.0);
    vset(verts, px - dlx * w, py - dly * w, u1, 1.0);
}

#[allow(clippy::too_many_arguments)]
fn round_cap_end(
    verts: &mut Vec<Vertex>,
    p: &FlatPoint,
    dx: f32,
    dy: f32,
    w: f32,
    ncap: usize,
    u0: f32,
    u1: f32,
) {
    let (px, py) = (p.x, p.y);
    let (dlx, dly) = (dy, -dx);
    vset(verts, px + dlx * w, py + dly * w, u0, 1.0);
    vset(verts, px - dlx * w, py - dly * w, u1, 1.0);
    for i in 0..ncap {
        let a = i as f32 / (ncap - 1) as f32 * PI;
        let ax = a.cos() * w;
        let ay = a.sin() * w;
        vset(verts, px, py, 0.5, 1.0);
        vset(verts, px - dlx * ax + dx * ay, py - dly * ax + dy * ay, u0, 1.0);
    }
}
