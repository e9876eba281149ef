//! Text shaping
//!
//! Walks UTF-8 text one codepoint at a time, resolves each glyph through the
//! [`GlyphCache`], applies kerning, letter spacing and alignment and produces
//! screen-space quads textured from the glyph atlas. The pen advances in whole
//! pixels so glyph bitmaps stay aligned to the pixel grid.

use stipple_paint::Rect;

use crate::cache::{CachedGlyph, GlyphCache, GlyphRequest};
use crate::registry::{Font, FontId};
use crate::style::{HAlign, TextStyle, VAlign};
use crate::{Result, TextError};

/// Default upper bound on quads produced by one [`TextShaper::shape`] call
pub const DEFAULT_MAX_QUADS: usize = 4096;

/// One textured glyph rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphQuad {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// Normalized atlas coordinates
    pub s0: f32,
    pub t0: f32,
    pub s1: f32,
    pub t1: f32,
}

/// Output of [`TextShaper::shape`]
#[derive(Debug, Clone, Default)]
pub struct ShapedRun {
    pub quads: Vec<GlyphQuad>,
    /// Pen advance from the aligned origin
    pub advance: f32,
    /// Glyphs skipped because the quad scratch buffer was full
    pub dropped: usize,
    /// Atlas generation the texture coordinates refer to
    pub atlas_generation: u64,
    /// Atlas size the texture coordinates were normalized by
    pub atlas_size: (u32, u32),
}

/// Output of [`TextShaper::measure`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBounds {
    pub advance: f32,
    pub bounds: Rect,
}

/// Font metrics for a style, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascender: f32,
    pub descender: f32,
    pub line_height: f32,
}

/// Per-character pen positions for hit testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPosition {
    /// Byte offset of the character in the source string
    pub byte_index: usize,
    pub ch: char,
    /// Pen position before the glyph
    pub x: f32,
    /// Pen position after the glyph
    pub next_x: f32,
    pub min_x: f32,
    pub max_x: f32,
}

/// A glyph visited while walking text
struct Visit {
    byte_index: usize,
    ch: char,
    x: f32,
    next_x: f32,
    glyph: Option<CachedGlyph>,
    quad: Option<GlyphQuad>,
}

/// Converts text into glyph quads
#[derive(Debug, Clone)]
pub struct TextShaper {
    max_quads: usize,
}

impl Default for TextShaper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUADS)
    }
}

impl TextShaper {
    pub fn new(max_quads: usize) -> Self {
        Self { max_quads }
    }

    pub fn max_quads(&self) -> usize {
        self.max_quads
    }

    /// Shape `text` with its pen origin at (`x`, `y`)
    ///
    /// Glyphs that do not fit in the atlas still advance the pen but produce
    /// no quad; unmapped codepoints are zero width.
    pub fn shape(&self, cache: &mut GlyphCache, style: &TextStyle, x: f32, y: f32, text: &str) -> Result<ShapedRun> {
        let Some(font) = style.font else {
            return Ok(ShapedRun::default());
        };
        let mut x = x;
        let mut y = y;
        if style.align.horizontal != HAlign::Left {
            let width = self.advance(cache, font, style, text)?;
            x -= match style.align.horizontal {
                HAlign::Right => width,
                _ => width * 0.5,
            };
        }
        y += vertical_offset(cache, font, style)?;

        let generation = cache.atlas().generation();
        let mut run = self.shape_at(cache, font, style, x, y, text)?;
        if run.atlas_generation != generation {
            // placements made before the reset are gone; the second pass only
            // needs room for this run
            tracing::debug!("glyph atlas reset while shaping, reshaping run");
            run = self.shape_at(cache, font, style, x, y, text)?;
        }
        if run.dropped > 0 {
            tracing::warn!(
                dropped = run.dropped,
                max_quads = self.max_quads,
                "text quad scratch exhausted; glyphs dropped"
            );
        }
        Ok(run)
    }

    fn shape_at(
        &self,
        cache: &mut GlyphCache,
        font: FontId,
        style: &TextStyle,
        x: f32,
        y: f32,
        text: &str,
    ) -> Result<ShapedRun> {
        let mut run = ShapedRun::default();
        let end_x = walk(cache, font, style, x, y, text, GlyphRequest::Required, |v| {
            let (Some(glyph), Some(quad)) = (v.glyph, v.quad) else {
                return;
            };
            if glyph.atlas.is_none() || glyph.empty {
                return;
            }
            if let Err(e) = push_quad(&mut run.quads, self.max_quads, quad) {
                tracing::trace!(codepoint = glyph.codepoint, "{}", e);
                run.dropped += 1;
            }
        })?;

        // the atlas may have grown mid-run; normalize against its final size
        let (w, h) = cache.atlas().dimensions();
        let itw = 1.0 / w.max(1) as f32;
        let ith = 1.0 / h.max(1) as f32;
        for q in &mut run.quads {
            q.s0 *= itw;
            q.s1 *= itw;
            q.t0 *= ith;
            q.t1 *= ith;
        }
        run.advance = end_x - x;
        run.atlas_generation = cache.atlas().generation();
        run.atlas_size = (w, h);
        Ok(run)
    }

    /// Advance and ink bounds of `text` without touching the atlas
    pub fn measure(&self, cache: &mut GlyphCache, style: &TextStyle, x: f32, y: f32, text: &str) -> Result<TextBounds> {
        let empty = TextBounds {
            advance: 0.0,
            bounds: Rect::new(x, y, 0.0, 0.0),
        };
        let Some(font) = style.font else {
            return Ok(empty);
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
        let y = y + vertical_offset(cache, font, style)?;
        let end_x = walk(cache, font, style, x, y, text, GlyphRequest::MetricsOnly, |v| {
            if let Some(q) = v.quad {
                min_x = min_x.min(q.x0);
                max_x = max_x.max(q.x1);
                min_y = min_y.min(q.y0);
                max_y = max_y.max(q.y1);
            }
        })?;
        let advance = end_x - x;
        let shift = match style.align.horizontal {
            HAlign::Left => 0.0,
            HAlign::Center => advance * 0.5,
            HAlign::Right => advance,
        };
        Ok(TextBounds {
            advance,
            bounds: Rect::from_bounds(min_x - shift, min_y, max_x - shift, max_y),
        })
    }

    /// Ascender, descender and line height of the style's font at its size
    pub fn vertical_metrics(&self, cache: &GlyphCache, style: &TextStyle) -> Result<VerticalMetrics> {
        let font = style.font.ok_or(TextError::UnknownFont(u32::MAX))?;
        let f = font_ref(cache, font)?;
        let size = quantized_size(style.size);
        Ok(VerticalMetrics {
            ascender: f.ascender() * size,
            descender: f.descender() * size,
            line_height: f.line_height() * size * style.line_height,
        })
    }

    /// Pen positions of every character, for caret placement and hit testing
    pub fn glyph_positions(
        &self,
        cache: &mut GlyphCache,
        style: &TextStyle,
        x: f32,
        y: f32,
        text: &str,
    ) -> Result<Vec<GlyphPosition>> {
        let Some(font) = style.font else {
            return Ok(Vec::new());
        };
        let mut x = x;
        if style.align.horizontal != HAlign::Left {
            let width = self.advance(cache, font, style, text)?;
            x -= match style.align.horizontal {
                HAlign::Right => width,
                _ => width * 0.5,
            };
        }
        let y = y + vertical_offset(cache, font, style)?;
        let mut positions = Vec::with_capacity(text.len());
        walk(cache, font, style, x, y, text, GlyphRequest::MetricsOnly, |v| {
            let (min_x, max_x) = match v.quad {
                Some(q) => (v.x.min(q.x0), v.next_x.max(q.x1)),
                None => (v.x, v.next_x),
            };
            positions.push(GlyphPosition {
                byte_index: v.byte_index,
                ch: v.ch,
                x: v.x,
                next_x: v.next_x,
                min_x,
                max_x,
            });
        })?;
        Ok(positions)
    }

    fn advance(&self, cache: &mut GlyphCache, font: FontId, style: &TextStyle, text: &str) -> Result<f32> {
        walk(cache, font, style, 0.0, 0.0, text, GlyphRequest::MetricsOnly, |_| {})
    }
}

fn font_ref(cache: &GlyphCache, font: FontId) -> Result<&Font> {
    cache.font(font).ok_or(TextError::UnknownFont(font.0))
}

/// Size as the cache sees it (whole tenths of a pixel)
fn quantized_size(size: f32) -> f32 {
    (size * 10.0) as i16 as f32 / 10.0
}

fn vertical_offset(cache: &GlyphCache, font: FontId, style: &TextStyle) -> Result<f32> {
    let f = font_ref(cache, font)?;
    let size = quantized_size(style.size);
    Ok(match style.align.vertical {
        VAlign::Top => f.ascender() * size,
        VAlign::Middle => (f.ascender() + f.descender()) / 2.0 * size,
        VAlign::Baseline => 0.0,
        VAlign::Bottom => f.descender() * size,
    })
}

fn push_quad(quads: &mut Vec<GlyphQuad>, max_quads: usize, quad: GlyphQuad) -> Result<()> {
    if quads.len() >= max_quads {
        return Err(TextError::ScratchExhausted);
    }
    quads.push(quad);
    Ok(())
}

/// Screen rectangle of a glyph with its one pixel border trimmed
///
/// Texture coordinates are left in atlas pixels.
fn glyph_quad(glyph: &CachedGlyph, x: f32, y: f32) -> GlyphQuad {
    let rx = (x + glyph.x_off as f32 + 1.0).floor();
    let ry = (y + glyph.y_off as f32 + 1.0).floor();
    let w = glyph.width.saturating_sub(2) as f32;
    let h = glyph.height.saturating_sub(2) as f32;
    let mut quad = GlyphQuad {
        x0: rx,
        y0: ry,
        x1: rx + w,
        y1: ry + h,
        ..GlyphQuad::default()
    };
    if let Some(region) = glyph.atlas {
        quad.s0 = (region.x + 1) as f32;
        quad.t0 = (region.y + 1) as f32;
        quad.s1 = (region.x + region.width - 1) as f32;
        quad.t1 = (region.y + region.height - 1) as f32;
    }
    quad
}

/// Walk `text` from pen (`x`, `y`), returning the final pen x
#[allow(clippy::too_many_arguments)]
fn walk(
    cache: &mut GlyphCache,
    font: FontId,
    style: &TextStyle,
    mut x: f32,
    y: f32,
    text: &str,
    request: GlyphRequest,
    mut visit: impl FnMut(Visit),
) -> Result<f32> {
    font_ref(cache, font)?;
    let mut prev: Option<(FontId, u16)> = None;
    for (byte_index, ch) in text.char_indices() {
        let codepoint = ch as u32;
        let looked_up = match cache.get_glyph(font, codepoint, style.size, style.blur, request) {
            Ok(glyph) => Some(glyph),
            Err(TextError::AtlasFull) => cache
                .get_glyph(font, codepoint, style.size, style.blur, GlyphRequest::MetricsOnly)
                .ok(),
            Err(TextError::GlyphNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let start_x = x;
        let Some(glyph) = looked_up else {
            prev = None;
            visit(Visit {
                byte_index,
                ch,
                x: start_x,
                next_x: x,
                glyph: None,
                quad: None,
            });
            continue;
        };

        if let Some((prev_font, prev_index)) = prev {
            let kern = if prev_font == glyph.source {
                let scale = cache.scale_for_size(glyph.source, glyph.size as f32 / 10.0);
                cache.kern_advance(glyph.source, prev_index, glyph.glyph_index) as f32 * scale
            } else {
                0.0
            };
            x += (kern + style.spacing + 0.5) as i32 as f32;
        }
        let quad = glyph_quad(&glyph, x, y);
        x += (glyph.x_advance + 0.5) as i32 as f32;
        prev = Some((glyph.source, glyph.glyph_index));
        visit(Visit {
            byte_index,
            ch,
            x: start_x,
            next_x: x,
            glyph: Some(glyph),
            quad: Some(quad),
        });
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::TextAlign;
    use stipple_test_fonts::{FontBuilder, GlyphDef};

    /// upem 1000, asc 800, desc -200; 'A' and 'V' are 600 wide, kerned by -100
    fn setup(atlas: u32) -> (GlyphCache, FontId) {
        let mut b = FontBuilder::new(1000).metrics(800, -200, 200);
        let a = b.add_glyph(GlyphDef::rect(600, 0, 0, 500, 700));
        let v = b.add_glyph(GlyphDef::rect(600, 0, 0, 500, 700));
        let space = b.add_glyph(GlyphDef::empty(300));
        b.map('A', a);
        b.map('V', v);
        b.map(' ', space);
        b.kern(a, v, -100);
        let mut cache = GlyphCache::new(atlas, atlas);
        let id = cache.load_font("sans", b.build());
        (cache, id)
    }

    fn style(font: FontId) -> TextStyle {
        TextStyle::default().with_font(font).with_size(20.0)
    }

    #[test]
    fn test_pen_advances_in_whole_pixels() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let run = shaper.shape(&mut cache, &style(font), 0.0, 0.0, "AA").unwrap();
        // 600 units at 0.02 px/unit
        assert_eq!(run.advance, 24.0);
        assert_eq!(run.quads.len(), 2);
        assert_eq!(run.quads[1].x0 - run.quads[0].x0, 12.0);
    }

    #[test]
    fn test_kerning_is_applied_between_pairs() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let plain = shaper.measure(&mut cache, &style(font), 0.0, 0.0, "AA").unwrap();
        let kerned = shaper.measure(&mut cache, &style(font), 0.0, 0.0, "AV").unwrap();
        // -100 * 0.02 = -2 px, biased by +0.5 and truncated toward zero
        assert_eq!(plain.advance - kerned.advance, 1.0);
    }

    #[test]
    fn test_letter_spacing_between_glyphs() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let spaced = style(font).with_spacing(3.0);
        let m = shaper.measure(&mut cache, &spaced, 0.0, 0.0, "AAA").unwrap();
        assert_eq!(m.advance, 36.0 + 6.0);
    }

    #[test]
    fn test_quad_geometry_and_texcoords() {
        let (mut cache, font) = setup(256);
        let run = TextShaper::default()
            .shape(&mut cache, &style(font), 10.0, 50.0, "A")
            .unwrap();
        let q = run.quads[0];
        let g = cache
            .get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required)
            .unwrap();
        let region = g.atlas.unwrap();
        // 10x14 bitmap plus 2px padding, minus the 1px trimmed border
        assert_eq!((q.x0, q.y0), (10.0 - 1.0, 50.0 - 14.0 - 1.0));
        assert_eq!((q.x1 - q.x0, q.y1 - q.y0), (12.0, 16.0));
        assert_eq!(q.s0, (region.x + 1) as f32 / 256.0);
        assert_eq!(q.t1, (region.y + region.height - 1) as f32 / 256.0);
        assert_eq!(run.atlas_size, (256, 256));
    }

    #[test]
    fn test_horizontal_alignment_shifts_origin() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let left = shaper.shape(&mut cache, &style(font), 100.0, 0.0, "AA").unwrap();
        let right_style = style(font).with_align(TextAlign::new(HAlign::Right, VAlign::Baseline));
        let right = shaper.shape(&mut cache, &right_style, 100.0, 0.0, "AA").unwrap();
        let center_style = style(font).with_align(TextAlign::new(HAlign::Center, VAlign::Baseline));
        let center = shaper.shape(&mut cache, &center_style, 100.0, 0.0, "AA").unwrap();
        assert_eq!(left.quads[0].x0 - right.quads[0].x0, 24.0);
        assert_eq!(left.quads[0].x0 - center.quads[0].x0, 12.0);
    }

    #[test]
    fn test_vertical_alignment_offsets() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let y_of = |cache: &mut GlyphCache, v: VAlign| {
            let s = style(font).with_align(TextAlign::new(HAlign::Left, v));
            shaper.shape(cache, &s, 0.0, 0.0, "A").unwrap().quads[0].y0
        };
        let baseline = y_of(&mut cache, VAlign::Baseline);
        assert_eq!(y_of(&mut cache, VAlign::Top) - baseline, 16.0);
        assert_eq!(y_of(&mut cache, VAlign::Middle) - baseline, 6.0);
        assert_eq!(y_of(&mut cache, VAlign::Bottom) - baseline, -4.0);
    }

    #[test]
    fn test_vertical_metrics_scale_with_size() {
        let (cache, font) = setup(256);
        let m = TextShaper::default().vertical_metrics(&cache, &style(font)).unwrap();
        assert!((m.ascender - 16.0).abs() < 1e-4);
        assert!((m.descender + 4.0).abs() < 1e-4);
        assert!((m.line_height - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_measure_never_rasterizes() {
        let (mut cache, font) = setup(256);
        let m = TextShaper::default()
            .measure(&mut cache, &style(font), 0.0, 0.0, "AV A")
            .unwrap();
        assert!(!cache.atlas().is_dirty());
        assert_eq!(cache.atlas().allocator().max_y(), 0);
        assert!(m.bounds.width > 0.0);
        assert!(m.bounds.y < 0.0);
    }

    #[test]
    fn test_missing_glyph_is_zero_width() {
        let (mut cache, font) = setup(256);
        let shaper = TextShaper::default();
        let with_gap = shaper.measure(&mut cache, &style(font), 0.0, 0.0, "A\u{4e2d}A").unwrap();
        let without = shaper.measure(&mut cache, &style(font), 0.0, 0.0, "AA").unwrap();
        assert_eq!(with_gap.advance, without.advance);
        let positions = shaper
            .glyph_positions(&mut cache, &style(font), 0.0, 0.0, "A\u{4e2d}A")
            .unwrap();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[1].x, positions[1].next_x);
    }

    #[test]
    fn test_atlas_full_glyphs_still_advance() {
        // room for exactly one 14x18 glyph bitmap
        let (mut cache, font) = setup(20);
        let run = TextShaper::default()
            .shape(&mut cache, &style(font), 0.0, 0.0, "AVA")
            .unwrap();
        assert_eq!(run.quads.len(), 2);
        assert_eq!(run.advance, 36.0 - 1.0);
    }

    #[test]
    fn test_scratch_exhaustion_drops_excess_quads() {
        let (mut cache, font) = setup(256);
        let run = TextShaper::new(2)
            .shape(&mut cache, &style(font), 0.0, 0.0, "AAAA")
            .unwrap();
        assert_eq!(run.quads.len(), 2);
        assert_eq!(run.dropped, 2);
        assert_eq!(run.advance, 48.0);
    }

    #[test]
    fn test_glyph_positions_track_pen() {
        let (mut cache, font) = setup(256);
        let positions = TextShaper::default()
            .glyph_positions(&mut cache, &style(font), 5.0, 0.0, "A V")
            .unwrap();
        let xs: Vec<_> = positions.iter().map(|p| (p.byte_index, p.x, p.next_x)).collect();
        assert_eq!(xs, vec![(0, 5.0, 17.0), (1, 17.0, 23.0), (2, 23.0, 35.0)]);
        assert!(positions[0].min_x <= 5.0);
    }

    #[test]
    fn test_no_font_selected_yields_nothing() {
        let (mut cache, _) = setup(64);
        let run = TextShaper::default()
            .shape(&mut cache, &TextStyle::default(), 0.0, 0.0, "A")
            .unwrap();
        assert!(run.quads.is_empty());
    }
}
