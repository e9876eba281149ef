//! Glyph outlines and curve flattening
//!
//! Outlines are sequences of move/line/quadratic commands in font units,
//! decoded from `glyf` simple and composite descriptions.

use stipple_paint::Point;

use crate::font::FontFace;
use crate::sfnt::{ParseError, Reader};

/// Composite glyphs referencing deeper than this are rejected
pub const MAX_COMPOSITE_DEPTH: u32 = 8;

/// Total components one outline may expand to, across all nesting levels
pub const MAX_COMPOSITE_COMPONENTS: u32 = 512;

/// Quadratic subdivision stops at this depth
pub const MAX_FLATTEN_DEPTH: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutlineVertex {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, end: Point },
}

pub type Outline = Vec<OutlineVertex>;

// simple glyph flags
const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

// composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Append the outline of `glyph` to `out`
pub(crate) fn decode_glyph(
    face: &FontFace,
    glyph: u16,
    depth: u32,
    budget: &mut u32,
    out: &mut Outline,
) -> Result<(), ParseError> {
    if depth > MAX_COMPOSITE_DEPTH {
        return Err(ParseError::Malformed("composite glyph nesting too deep"));
    }
    let Some(range) = face.glyph_range(glyph) else {
        return Ok(());
    };
    let data = face.data();
    let mut r = Reader::new(data, range.start);
    let contours = r.i16()?;
    r.skip(8)?;

    if contours > 0 {
        decode_simple(&mut r, contours as usize, out)
    } else if contours < 0 {
        decode_composite(face, &mut r, depth, budget, out)
    } else {
        Ok(())
    }
}

fn decode_simple(r: &mut Reader<'_>, contours: usize, out: &mut Outline) -> Result<(), ParseError> {
    let mut end_points = Vec::with_capacity(contours);
    for _ in 0..contours {
        end_points.push(r.u16()? as usize);
    }
    let num_points = end_points.last().map_or(0, |&e| e + 1);
    let instructions = r.u16()? as usize;
    r.skip(instructions)?;

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.u8()?;
        flags.push(flag);
        if flag & REPEAT != 0 {
            let count = r.u8()?;
            for _ in 0..count {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let mut xs = Vec::with_capacity(num_points);
    let mut x = 0i32;
    for &flag in &flags {
        x += read_coord(r, flag, X_SHORT, X_SAME_OR_POSITIVE)?;
        xs.push(x);
    }
    let mut points = Vec::with_capacity(num_points);
    let mut y = 0i32;
    for (i, &flag) in flags.iter().enumerate() {
        y += read_coord(r, flag, Y_SHORT, Y_SAME_OR_POSITIVE)?;
        points.push((Point::new(xs[i] as f32, y as f32), flag & ON_CURVE != 0));
    }

    let mut start = 0;
    for &end in &end_points {
        if end < start || end >= points.len() {
            return Err(ParseError::Malformed("contour end points out of order"));
        }
        emit_contour(&points[start..=end], out);
        start = end + 1;
    }
    Ok(())
}

fn read_coord(r: &mut Reader<'_>, flag: u8, short: u8, same_or_positive: u8) -> Result<i32, ParseError> {
    Ok(if flag & short != 0 {
        let v = r.u8()? as i32;
        if flag & same_or_positive != 0 {
            v
        } else {
            -v
        }
    } else if flag & same_or_positive != 0 {
        0
    } else {
        r.i16()? as i32
    })
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

/// Convert one contour of on/off-curve points, inserting implied on-curve midpoints
fn emit_contour(points: &[(Point, bool)], out: &mut Outline) {
    let n = points.len();
    if n == 0 {
        return;
    }
    // start on an on-curve point; synthesize one if there is none at either end
    let (start, first) = if points[0].1 {
        (points[0].0, 1)
    } else if points[n - 1].1 {
        (points[n - 1].0, 0)
    } else {
        (midpoint(points[0].0, points[n - 1].0), 0)
    };
    let last = if points[0].1 || !points[n - 1].1 { n } else { n - 1 };

    out.push(OutlineVertex::MoveTo(start));
    let mut control: Option<Point> = None;
    for &(p, on) in points[first..last].iter() {
        match (on, control) {
            (true, Some(c)) => {
                out.push(OutlineVertex::QuadTo { control: c, end: p });
                control = None;
            }
            (true, None) => out.push(OutlineVertex::LineTo(p)),
            (false, Some(c)) => {
                let mid = midpoint(c, p);
                out.push(OutlineVertex::QuadTo { control: c, end: mid });
                control = Some(p);
            }
            (false, None) => control = Some(p),
        }
    }
    match control {
        Some(c) => out.push(OutlineVertex::QuadTo {
            control: c,
            end: start,
        }),
        None => out.push(OutlineVertex::LineTo(start)),
    }
}

fn decode_composite(
    face: &FontFace,
    r: &mut Reader<'_>,
    depth: u32,
    budget: &mut u32,
    out: &mut Outline,
) -> Result<(), ParseError> {
    loop {
        *budget = budget
            .checked_sub(1)
            .ok_or(ParseError::Malformed("too many composite components"))?;
        let flags = r.u16()?;
        let glyph = r.u16()?;
        let (dx, dy) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (r.i16()? as f32, r.i16()? as f32)
        } else {
            (r.u8()? as i8 as f32, r.u8()? as i8 as f32)
        };
        // point-number anchoring is not supported; such components sit at the origin
        let (e, f) = if flags & ARGS_ARE_XY_VALUES != 0 {
            (dx, dy)
        } else {
            (0.0, 0.0)
        };
        let (a, b, c, d) = if flags & WE_HAVE_A_SCALE != 0 {
            let s = r.f2dot14()?;
            (s, 0.0, 0.0, s)
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            let sx = r.f2dot14()?;
            let sy = r.f2dot14()?;
            (sx, 0.0, 0.0, sy)
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            (r.f2dot14()?, r.f2dot14()?, r.f2dot14()?, r.f2dot14()?)
        } else {
            (1.0, 0.0, 0.0, 1.0)
        };

        let first = out.len();
        decode_glyph(face, glyph, depth + 1, budget, out)?;
        let map = |p: Point| Point::new(a * p.x + c * p.y + e, b * p.x + d * p.y + f);
        for v in &mut out[first..] {
            *v = match *v {
                OutlineVertex::MoveTo(p) => OutlineVertex::MoveTo(map(p)),
                OutlineVertex::LineTo(p) => OutlineVertex::LineTo(map(p)),
                OutlineVertex::QuadTo { control, end } => OutlineVertex::QuadTo {
                    control: map(control),
                    end: map(end),
                },
            };
        }

        if flags & MORE_COMPONENTS == 0 {
            return Ok(());
        }
    }
}

/// Flattened outline: points plus the length of each closed contour
#[derive(Clone, Debug, Default)]
pub struct Contours {
    pub points: Vec<Point>,
    pub lengths: Vec<usize>,
}

impl Contours {
    pub fn clear(&mut self) {
        self.points.clear();
        self.lengths.clear();
    }
}

/// Flatten `outline` into `out`, subdividing quadratics until the midpoint
/// deviates from the chord by no more than `flatness` (same units as the outline)
pub fn flatten_outline(outline: &[OutlineVertex], flatness: f32, out: &mut Contours) {
    out.clear();
    let flatness_sq = flatness * flatness;
    let mut contour_start = 0;
    let mut current = Point::ZERO;
    for v in outline {
        match *v {
            OutlineVertex::MoveTo(p) => {
                if out.points.len() > contour_start {
                    out.lengths.push(out.points.len() - contour_start);
                }
                contour_start = out.points.len();
                out.points.push(p);
                current = p;
            }
            OutlineVertex::LineTo(p) => {
                out.points.push(p);
                current = p;
            }
            OutlineVertex::QuadTo { control, end } => {
                flatten_quad(current, control, end, flatness_sq, &mut out.points);
                current = end;
            }
        }
    }
    if out.points.len() > contour_start {
        out.lengths.push(out.points.len() - contour_start);
    }
}

/// Append the flattened quadratic `p0, p1, p2` to `out`, excluding `p0`
///
/// A collinear curve contributes only its end point.
pub fn flatten_quad(p0: Point, p1: Point, p2: Point, flatness_sq: f32, out: &mut Vec<Point>) {
    let cross = (p1.x - p0.x) * (p2.y - p0.y) - (p1.y - p0.y) * (p2.x - p0.x);
    if cross == 0.0 {
        out.push(p2);
        return;
    }
    subdivide_quad(p0, p1, p2, flatness_sq, 0, out);
}

fn subdivide_quad(p0: Point, p1: Point, p2: Point, flatness_sq: f32, depth: u32, out: &mut Vec<Point>) {
    let mx = (p0.x + 2.0 * p1.x + p2.x) / 4.0;
    let my = (p0.y + 2.0 * p1.y + p2.y) / 4.0;
    let dx = (p0.x + p2.x) / 2.0 - mx;
    let dy = (p0.y + p2.y) / 2.0 - my;
    if depth < MAX_FLATTEN_DEPTH && dx * dx + dy * dy > flatness_sq {
        let m = Point::new(mx, my);
        subdivide_quad(p0, midpoint(p0, p1), m, flatness_sq, depth + 1, out);
        subdivide_quad(m, midpoint(p1, p2), p2, flatness_sq, depth + 1, out);
    } else {
        out.push(p2);
    }
}
