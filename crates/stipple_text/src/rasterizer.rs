//! Glyph rasterization
//!
//! Non-zero winding scanline rasterizer for flattened outlines. Each output row
//! is sampled at several sub-scanlines (15 for bitmaps under 8px tall, 5
//! otherwise); horizontal coverage is accumulated in 22.10 fixed point and
//! averaged into 8-bit alpha.
//!
//! Active edges live in an arena addressed by `u32` handles. Handles of edges
//! that leave the sweep go on a free list and are reused by later edges, so
//! rasterizing a glyph allocates nothing once the buffers have warmed up.

use stipple_paint::Point;

use crate::font::{BitmapBox, FontFace};
use crate::outline::{flatten_outline, Contours};
use crate::sfnt::ParseError;

const FIX_SHIFT: i32 = 10;
const FIX: i32 = 1 << FIX_SHIFT;
const FIX_MASK: i32 = FIX - 1;

/// Flatness tolerance in output pixels
const FLATNESS_PX: f32 = 0.35;

/// An outline edge in sub-scanline space, `y0 < y1`
#[derive(Clone, Copy, Debug)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// +1 or -1 depending on the original direction
    direction: i32,
}

#[derive(Clone, Copy, Debug, Default)]
struct ActiveEdge {
    /// Current x in fixed point
    x: i32,
    /// Per sub-scanline x step in fixed point
    dx: i32,
    /// Sub-scanline y where the edge ends
    ey: f32,
    direction: i32,
}

/// Arena of active edges with handle reuse
#[derive(Default)]
struct EdgeArena {
    nodes: Vec<ActiveEdge>,
    free: Vec<u32>,
}

impl EdgeArena {
    fn alloc(&mut self, edge: ActiveEdge) -> u32 {
        match self.free.pop() {
            Some(handle) => {
                self.nodes[handle as usize] = edge;
                handle
            }
            None => {
                self.nodes.push(edge);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, handle: u32) {
        self.free.push(handle);
    }

    fn get(&self, handle: u32) -> &ActiveEdge {
        &self.nodes[handle as usize]
    }

    fn get_mut(&mut self, handle: u32) -> &mut ActiveEdge {
        &mut self.nodes[handle as usize]
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }
}

/// Where and how big to rasterize
#[derive(Clone, Copy, Debug)]
pub struct RasterParams {
    pub scale_x: f32,
    pub scale_y: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    /// Pixel box origin; the output's top-left pixel is `(x_off, y_off)`
    pub x_off: i32,
    pub y_off: i32,
    pub width: usize,
    pub height: usize,
}

/// Glyph rasterizer with reusable scratch buffers
#[derive(Default)]
pub struct GlyphRasterizer {
    contours: Contours,
    edges: Vec<Edge>,
    arena: EdgeArena,
    active: Vec<u32>,
    scanline: Vec<u16>,
}

impl GlyphRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize `glyph` at `scale` into `out` (row stride `stride`)
    ///
    /// `width` x `height` should match the glyph's [`BitmapBox`]; pixels
    /// outside that area are left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn render_glyph(
        &mut self,
        face: &FontFace,
        glyph: u16,
        scale: f32,
        out: &mut [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), ParseError> {
        let bbox: BitmapBox = face.bitmap_box(glyph, scale, scale);
        if bbox.is_empty() || width == 0 || height == 0 {
            return Ok(());
        }
        let outline = face.outline(glyph)?;
        flatten_outline(&outline, FLATNESS_PX / scale, &mut self.contours);
        let params = RasterParams {
            scale_x: scale,
            scale_y: scale,
            shift_x: 0.0,
            shift_y: 0.0,
            x_off: bbox.x0,
            y_off: bbox.y0,
            width,
            height,
        };
        let contours = std::mem::take(&mut self.contours);
        self.rasterize(&contours, &params, out, stride);
        self.contours = contours;
        Ok(())
    }

    /// Rasterize already flattened contours (font units, y up)
    pub fn rasterize(&mut self, contours: &Contours, params: &RasterParams, out: &mut [u8], stride: usize) {
        if params.width == 0 || params.height == 0 {
            return;
        }
        let vsubsample: i32 = if params.height < 8 { 15 } else { 5 };
        self.build_edges(contours, params, vsubsample as f32);
        self.sweep(params, vsubsample, out, stride);
    }

    fn build_edges(&mut self, contours: &Contours, params: &RasterParams, vsubsample: f32) {
        self.edges.clear();
        let mut start = 0;
        for &len in &contours.lengths {
            let pts = &contours.points[start..start + len];
            start += len;
            for k in 0..len {
                let j = if k == 0 { len - 1 } else { k - 1 };
                let (pj, pk) = (pts[j], pts[k]);
                if pj.y == pk.y {
                    continue;
                }
                // y is flipped on output, so the upper point in bitmap space has the larger font y
                let (a, b, direction) = if pj.y > pk.y { (pj, pk, 1) } else { (pk, pj, -1) };
                let map = |p: Point| {
                    (
                        p.x * params.scale_x + params.shift_x,
                        (-p.y * params.scale_y + params.shift_y) * vsubsample,
                    )
                };
                let (x0, y0) = map(a);
                let (x1, y1) = map(b);
                self.edges.push(Edge {
                    x0,
                    y0,
                    x1,
                    y1,
                    direction,
                });
            }
        }
        self.edges.sort_by(|a, b| a.y0.total_cmp(&b.y0));
    }

    fn sweep(&mut self, params: &RasterParams, vsubsample: i32, out: &mut [u8], stride: usize) {
        let width = params.width;
        let max_weight = 255 / vsubsample;
        self.arena.clear();
        self.active.clear();
        self.scanline.clear();
        self.scanline.resize(width, 0);

        let mut next_edge = 0;
        let mut y = params.y_off * vsubsample;

        for row in 0..params.height {
            self.scanline.fill(0);
            for _ in 0..vsubsample {
                let scan_y = y as f32 + 0.5;

                // retire finished edges, step the rest
                let arena = &mut self.arena;
                self.active.retain(|&h| {
                    let e = arena.get_mut(h);
                    if e.ey <= scan_y {
                        arena.release(h);
                        false
                    } else {
                        e.x += e.dx;
                        true
                    }
                });

                // stepping can reorder crossing edges
                for i in 1..self.active.len() {
                    let mut j = i;
                    while j > 0 && self.arena.get(self.active[j - 1]).x > self.arena.get(self.active[j]).x {
                        self.active.swap(j - 1, j);
                        j -= 1;
                    }
                }

                // activate edges starting above this sub-scanline
                while next_edge < self.edges.len() && self.edges[next_edge].y0 <= scan_y {
                    let e = self.edges[next_edge];
                    next_edge += 1;
                    if e.y1 > scan_y {
                        let z = new_active(&e, params.x_off, scan_y);
                        let pos = self.active.partition_point(|&h| self.arena.get(h).x < z.x);
                        let handle = self.arena.alloc(z);
                        self.active.insert(pos, handle);
                    }
                }

                if !self.active.is_empty() {
                    fill_active_edges(&mut self.scanline, &self.active, &self.arena, max_weight);
                }
                y += 1;
            }

            let start = row * stride;
            if let Some(dst) = out.get_mut(start..start + width) {
                for (d, &s) in dst.iter_mut().zip(&self.scanline) {
                    *d = s.min(255) as u8;
                }
            }
        }
    }
}

fn new_active(e: &Edge, off_x: i32, start_y: f32) -> ActiveEdge {
    let dxdy = (e.x1 - e.x0) / (e.y1 - e.y0);
    let dx = if dxdy < 0.0 {
        -((FIX as f32 * -dxdy).floor() as i32)
    } else {
        (FIX as f32 * dxdy).floor() as i32
    };
    let x = (FIX as f32 * e.x0 + dx as f32 * (start_y - e.y0)).floor() as i32 - off_x * FIX;
    ActiveEdge {
        x,
        dx,
        ey: e.y1,
        direction: e.direction,
    }
}

/// Accumulate coverage of the spans where the winding number is non-zero
fn fill_active_edges(scanline: &mut [u16], active: &[u32], arena: &EdgeArena, max_weight: i32) {
    let len = scanline.len() as i32;
    let mut x0 = 0;
    let mut winding = 0;
    for &h in active {
        let e = arena.get(h);
        if winding == 0 {
            x0 = e.x;
            winding += e.direction;
            continue;
        }
        let x1 = e.x;
        winding += e.direction;
        if winding != 0 {
            continue;
        }
        let mut i = x0 >> FIX_SHIFT;
        let mut j = x1 >> FIX_SHIFT;
        if i >= len || j < 0 {
            continue;
        }
        if i == j {
            add(scanline, i, ((x1 - x0) * max_weight) >> FIX_SHIFT);
            continue;
        }
        if i >= 0 {
            add(scanline, i, ((FIX - (x0 & FIX_MASK)) * max_weight) >> FIX_SHIFT);
        } else {
            i = -1;
        }
        if j < len {
            add(scanline, j, ((x1 & FIX_MASK) * max_weight) >> FIX_SHIFT);
        } else {
            j = len;
        }
        for k in (i + 1)..j {
            add(scanline, k, max_weight);
        }
    }
}

fn add(scanline: &mut [u16], at: i32, value: i32) {
    if let Some(px) = scanline.get_mut(at as usize) {
        *px = px.saturating_add(value.max(0) as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stipple_test_fonts::{FontBuilder, GlyphDef};

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Contours {
        Contours {
            points: vec![
                Point::new(x0, y0),
                Point::new(x0, y1),
                Point::new(x1, y1),
                Point::new(x1, y0),
            ],
            lengths: vec![4],
        }
    }

    fn params(w: usize, h: usize, x_off: i32, y_off: i32) -> RasterParams {
        RasterParams {
            scale_x: 1.0,
            scale_y: 1.0,
            shift_x: 0.0,
            shift_y: 0.0,
            x_off,
            y_off,
            width: w,
            height: h,
        }
    }

    #[test]
    fn test_pixel_aligned_square_is_opaque() {
        let mut r = GlyphRasterizer::new();
        let mut out = vec![0u8; 16 * 16];
        // font y up: square covering y in [0, 10) maps to rows -10..0
        r.rasterize(&square(2.0, 0.0, 12.0, 10.0), &params(16, 16, 0, -12), &mut out, 16);
        for row in 0..16 {
            for col in 0..16 {
                let inside = (2..12).contains(&(row as i32)) && (2..12).contains(&col);
                let v = out[row * 16 + col];
                if inside {
                    assert_eq!(v, 255, "row {row} col {col}");
                } else {
                    assert_eq!(v, 0, "row {row} col {col}");
                }
            }
        }
    }

    #[test]
    fn test_half_pixel_edge_is_half_covered() {
        let mut r = GlyphRasterizer::new();
        let mut out = vec![0u8; 8 * 8];
        r.rasterize(&square(0.0, 0.0, 4.5, 8.0), &params(8, 8, 0, -8), &mut out, 8);
        let v = out[3 * 8 + 4];
        assert!((120..=135).contains(&v), "coverage {v}");
        assert_eq!(out[3 * 8 + 3], 255);
        assert_eq!(out[3 * 8 + 5], 0);
    }

    #[test]
    fn test_overlapping_contours_do_not_double_cover() {
        let mut r = GlyphRasterizer::new();
        let mut twice = square(0.0, 0.0, 8.0, 8.0);
        let extra = square(0.0, 0.0, 8.0, 8.0);
        twice.points.extend_from_slice(&extra.points);
        twice.lengths.push(4);
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        r.rasterize(&twice, &params(8, 8, 0, -8), &mut a, 8);
        r.rasterize(&square(0.0, 0.0, 8.0, 8.0), &params(8, 8, 0, -8), &mut b, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_opposite_winding_hole_stays_empty() {
        let mut r = GlyphRasterizer::new();
        let mut shape = square(0.0, 0.0, 12.0, 12.0);
        // inner square wound the other way
        shape.points.extend_from_slice(&[
            Point::new(4.0, 4.0),
            Point::new(8.0, 4.0),
            Point::new(8.0, 8.0),
            Point::new(4.0, 8.0),
        ]);
        shape.lengths.push(4);
        let mut out = vec![0u8; 144];
        r.rasterize(&shape, &params(12, 12, 0, -12), &mut out, 12);
        assert_eq!(out[6 * 12 + 6], 0);
        assert_eq!(out[12 + 1], 255);
    }

    #[test]
    fn test_small_bitmaps_use_finer_subsampling() {
        let mut r = GlyphRasterizer::new();
        let mut out = vec![0u8; 4 * 4];
        r.rasterize(&square(0.0, 0.0, 4.0, 4.0), &params(4, 4, 0, -4), &mut out, 4);
        // 15 sub-scanlines of weight 17 still reach full coverage
        assert!(out.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_render_glyph_into_strided_target() {
        let mut b = FontBuilder::new(1000).metrics(1000, 0, 0);
        let g = b.add_glyph(GlyphDef::rect(1000, 0, 0, 1000, 1000));
        let face = FontFace::parse(b.build(), 0).unwrap();
        let scale = 0.01;
        let bb = face.bitmap_box(g, scale, scale);
        assert_eq!((bb.width(), bb.height()), (10, 10));
        let stride = 32;
        let mut target = vec![7u8; stride * 12];
        let mut r = GlyphRasterizer::new();
        r.render_glyph(&face, g, scale, &mut target[stride + 1..], 10, 10, stride)
            .unwrap();
        assert_eq!(target[0], 7);
        assert_eq!(target[stride + 1], 255);
        assert_eq!(target[stride * 10 + 10], 255);
        assert_eq!(target[stride + 11], 7);
    }
}
