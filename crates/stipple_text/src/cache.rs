//! Glyph cache
//!
//! Glyphs are cached per font in a fixed 256-bucket chained hash table keyed
//! by (codepoint, size in tenths of a pixel, blur radius). A lookup miss
//! resolves the glyph through the font's fallback chain, computes its pixel
//! metrics and, unless only metrics were requested, rasterizes it into the
//! shared [`GlyphAtlas`].

use crate::atlas::{AtlasRegion, DirtyRect, GlyphAtlas};
use crate::blur;
use crate::rasterizer::GlyphRasterizer;
use crate::registry::{Font, FontId, FontRegistry};
use crate::{Result, TextError};

const HASH_BUCKETS: usize = 256;

/// Blur radii above this are clamped
pub const MAX_BLUR: i16 = 20;

/// Whether a lookup may touch the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphRequest {
    /// Rasterize into the atlas if not already there
    Required,
    /// Metrics only; never allocates or rasterizes
    MetricsOnly,
}

/// What to do when the atlas has no room for a glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasFullAction {
    /// Grow the atlas to the given size, keeping existing glyphs
    Expand { width: u32, height: u32 },
    /// Clear the atlas and every cached glyph
    Reset,
    /// Give up on this glyph
    Fail,
}

type AtlasFullHandler = Box<dyn FnMut(u32, u32) -> AtlasFullAction>;

/// Cached glyph metrics and atlas placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedGlyph {
    pub codepoint: u32,
    /// Pixel size in tenths
    pub size: i16,
    pub blur: i16,
    pub glyph_index: u16,
    /// Offset of the outline in the source font's `glyf` table
    pub outline_offset: Option<u32>,
    /// Font the glyph was taken from (the requested font or one of its fallbacks)
    pub source: FontId,
    /// Placement in the atlas, `None` for metrics-only and empty glyphs
    pub atlas: Option<AtlasRegion>,
    /// Bitmap size including padding
    pub width: u32,
    pub height: u32,
    /// Offset of the padded bitmap from the pen position, y down
    pub x_off: i32,
    pub y_off: i32,
    /// Horizontal advance in pixels
    pub x_advance: f32,
    /// No coverage (e.g. space)
    pub empty: bool,
}

impl CachedGlyph {
    /// Padding added on every side of the bitmap
    pub fn padding(&self) -> u32 {
        self.blur as u32 + 2
    }
}

fn hash_int(mut a: u32) -> u32 {
    a = a.wrapping_add(!(a << 15));
    a ^= a >> 10;
    a = a.wrapping_add(a << 3);
    a ^= a >> 6;
    a = a.wrapping_add(!(a << 11));
    a ^= a >> 16;
    a
}

fn bucket(codepoint: u32, size: i16, blur: i16) -> usize {
    let key = codepoint ^ ((size as u16 as u32) << 11) ^ ((blur as u32) << 27);
    hash_int(key) as usize & (HASH_BUCKETS - 1)
}

/// Per-font chained hash table
#[derive(Clone)]
pub(crate) struct GlyphTable {
    heads: Vec<Option<u32>>,
    glyphs: Vec<CachedGlyph>,
    next: Vec<Option<u32>>,
}

impl Default for GlyphTable {
    fn default() -> Self {
        Self {
            heads: vec![None; HASH_BUCKETS],
            glyphs: Vec::new(),
            next: Vec::new(),
        }
    }
}

impl GlyphTable {
    fn find(&self, codepoint: u32, size: i16, blur: i16) -> Option<usize> {
        let mut cursor = self.heads[bucket(codepoint, size, blur)];
        while let Some(i) = cursor {
            let g = &self.glyphs[i as usize];
            if g.codepoint == codepoint && g.size == size && g.blur == blur {
                return Some(i as usize);
            }
            cursor = self.next[i as usize];
        }
        None
    }

    fn get(&self, index: usize) -> &CachedGlyph {
        &self.glyphs[index]
    }

    /// Insert `glyph`, replacing an entry with the same key
    fn upsert(&mut self, glyph: CachedGlyph) {
        if let Some(i) = self.find(glyph.codepoint, glyph.size, glyph.blur) {
            self.glyphs[i] = glyph;
            return;
        }
        let b = bucket(glyph.codepoint, glyph.size, glyph.blur);
        let index = self.glyphs.len() as u32;
        self.glyphs.push(glyph);
        self.next.push(self.heads[b]);
        self.heads[b] = Some(index);
    }

    pub(crate) fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heads.fill(None);
        self.glyphs.clear();
        self.next.clear();
    }
}

/// Fonts, atlas texture and rasterizer behind a single lookup entry point
pub struct GlyphCache {
    registry: FontRegistry,
    atlas: GlyphAtlas,
    rasterizer: GlyphRasterizer,
    on_atlas_full: Option<AtlasFullHandler>,
}

impl GlyphCache {
    pub fn new(atlas_width: u32, atlas_height: u32) -> Self {
        Self {
            registry: FontRegistry::new(),
            atlas: GlyphAtlas::new(atlas_width, atlas_height),
            rasterizer: GlyphRasterizer::new(),
            on_atlas_full: None,
        }
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }

    pub fn load_font(&mut self, name: &str, data: Vec<u8>) -> FontId {
        self.registry.load_font(name, data)
    }

    pub fn font(&self, id: FontId) -> Option<&Font> {
        self.registry.font(id)
    }

    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    pub fn atlas_mut(&mut self) -> &mut GlyphAtlas {
        &mut self.atlas
    }

    /// Install the callback consulted when a glyph does not fit
    ///
    /// It receives the current atlas size. Without a handler a full atlas
    /// fails the request immediately.
    pub fn set_atlas_full_handler(&mut self, handler: impl FnMut(u32, u32) -> AtlasFullAction + 'static) {
        self.on_atlas_full = Some(Box::new(handler));
    }

    /// Grow the atlas; cached placements stay valid
    pub fn expand_atlas(&mut self, width: u32, height: u32) {
        self.atlas.expand(width, height);
    }

    /// Clear the atlas and forget every cached glyph
    pub fn reset_atlas(&mut self, width: u32, height: u32) {
        self.atlas.reset(width, height);
        self.registry.clear_glyphs();
    }

    /// Look up (and lazily rasterize) a glyph
    ///
    /// Returns `GlyphNotFound` when neither the font nor its fallbacks map the
    /// codepoint, and `AtlasFull` when a required bitmap could not be placed;
    /// in that case the metrics are still cached for a later
    /// [`GlyphRequest::MetricsOnly`] lookup.
    pub fn get_glyph(
        &mut self,
        font: FontId,
        codepoint: u32,
        size: f32,
        blur: f32,
        request: GlyphRequest,
    ) -> Result<CachedGlyph> {
        let isize = (size * 10.0) as i16;
        if isize < 2 {
            return Err(TextError::GlyphNotFound(codepoint));
        }
        let iblur = (blur as i16).clamp(0, MAX_BLUR);
        let pad = iblur as i32 + 2;

        let base = self.registry.font(font).ok_or(TextError::UnknownFont(font.0))?;
        if let Some(i) = base.glyphs.find(codepoint, isize, iblur) {
            let cached = base.glyphs.get(i);
            if request == GlyphRequest::MetricsOnly || cached.atlas.is_some() || cached.empty {
                return Ok(*cached);
            }
        }

        let (source, glyph_index) = self.resolve(font, codepoint)?;
        let face = self
            .registry
            .font(source)
            .and_then(Font::face)
            .ok_or(TextError::GlyphNotFound(codepoint))?;
        let scale = face.scale_for_pixel_height(isize as f32 / 10.0);
        let bbox = face.bitmap_box(glyph_index, scale, scale);
        let advance = face.h_metrics(glyph_index).advance;

        let mut glyph = CachedGlyph {
            codepoint,
            size: isize,
            blur: iblur,
            glyph_index,
            outline_offset: face.glyph_offset(glyph_index),
            source,
            atlas: None,
            width: (bbox.width() + 2 * pad) as u32,
            height: (bbox.height() + 2 * pad) as u32,
            x_off: bbox.x0 - pad,
            y_off: bbox.y0 - pad,
            x_advance: scale * advance as f32,
            empty: bbox.is_empty(),
        };

        if request == GlyphRequest::MetricsOnly || glyph.empty {
            self.store(font, glyph);
            return Ok(glyph);
        }

        match self.allocate(glyph.width, glyph.height) {
            Ok(region) => glyph.atlas = Some(region),
            Err(e) => {
                self.store(font, glyph);
                return Err(e);
            }
        }
        self.render(&glyph, scale);
        self.store(font, glyph);
        tracing::trace!(codepoint, size = isize, blur = iblur, "rasterized glyph");
        Ok(glyph)
    }

    /// Unscaled kerning between two glyphs of the same font
    pub fn kern_advance(&self, font: FontId, left: u16, right: u16) -> i16 {
        self.registry
            .font(font)
            .and_then(Font::face)
            .map_or(0, |face| face.kern_advance(left, right))
    }

    /// Pixel scale for `size` in `font`
    pub fn scale_for_size(&self, font: FontId, size: f32) -> f32 {
        self.registry
            .font(font)
            .and_then(Font::face)
            .map_or(0.0, |face| face.scale_for_pixel_height(size))
    }

    /// First font in `font`'s chain mapping `codepoint` to a real glyph
    fn resolve(&self, font: FontId, codepoint: u32) -> Result<(FontId, u16)> {
        let base = self.registry.font(font).ok_or(TextError::UnknownFont(font.0))?;
        let chain = std::iter::once(font).chain(base.fallbacks().iter().copied());
        for id in chain {
            let index = self
                .registry
                .font(id)
                .and_then(Font::face)
                .map_or(0, |face| face.glyph_index(codepoint));
            if index != 0 {
                return Ok((id, index));
            }
        }
        Err(TextError::GlyphNotFound(codepoint))
    }

    fn allocate(&mut self, width: u32, height: u32) -> Result<AtlasRegion> {
        match self.atlas.allocate(width, height) {
            Err(TextError::AtlasFull) => {}
            other => return other,
        }
        let (current_w, current_h) = self.atlas.dimensions();
        let action = match self.on_atlas_full.as_mut() {
            Some(handler) => handler(current_w, current_h),
            None => AtlasFullAction::Fail,
        };
        tracing::debug!(?action, width, height, "glyph atlas full");
        match action {
            AtlasFullAction::Expand { width, height } => self.expand_atlas(width, height),
            AtlasFullAction::Reset => self.reset_atlas(current_w, current_h),
            AtlasFullAction::Fail => return Err(TextError::AtlasFull),
        }
        let retried = self.atlas.allocate(width, height);
        if retried.is_err() {
            tracing::warn!(width, height, "glyph does not fit after atlas recovery");
        }
        retried
    }

    fn store(&mut self, font: FontId, glyph: CachedGlyph) {
        if let Some(f) = self.registry.font_mut(font) {
            f.glyphs.upsert(glyph);
        }
    }

    fn render(&mut self, glyph: &CachedGlyph, scale: f32) {
        let Some(region) = glyph.atlas else {
            return;
        };
        let Self {
            registry,
            atlas,
            rasterizer,
            ..
        } = self;
        let Some(face) = registry.font(glyph.source).and_then(Font::face) else {
            return;
        };
        let pad = glyph.padding() as usize;
        let (w, h) = (region.width as usize, region.height as usize);
        let (pixels, stride) = atlas.region_mut(&region);

        if let Some(inner) = pixels.get_mut(pad * stride + pad..) {
            let result = rasterizer.render_glyph(
                face,
                glyph.glyph_index,
                scale,
                inner,
                w - 2 * pad,
                h - 2 * pad,
                stride,
            );
            if let Err(e) = result {
                tracing::warn!(codepoint = glyph.codepoint, "failed to decode glyph outline: {}", e);
            }
        }

        // one pixel of clear border on every side
        for y in 0..h {
            let row = y * stride;
            if y == 0 || y == h - 1 {
                if let Some(r) = pixels.get_mut(row..row + w) {
                    r.fill(0);
                }
            } else if let Some(r) = pixels.get_mut(row..row + w) {
                r[0] = 0;
                r[w - 1] = 0;
            }
        }

        blur::blur(pixels, w, h, stride, glyph.blur as f32);

        atlas.mark_dirty(DirtyRect {
            x0: region.x,
            y0: region.y,
            x1: region.x + region.width,
            y1: region.y + region.height,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stipple_test_fonts::{FontBuilder, GlyphDef};
    use std::cell::Cell;
    use std::rc::Rc;

    /// upem 1000, asc 800, desc -200: size 20 maps 500 units to 10 px
    fn font_bytes(chars: &[char]) -> Vec<u8> {
        let mut b = FontBuilder::new(1000).metrics(800, -200, 0);
        for &ch in chars {
            let g = b.add_glyph(GlyphDef::rect(600, 0, 0, 500, 500));
            b.map(ch, g);
        }
        let space = b.add_glyph(GlyphDef::empty(250));
        b.map(' ', space);
        b.build()
    }

    fn cache_with(chars: &[char], w: u32, h: u32) -> (GlyphCache, FontId) {
        let mut cache = GlyphCache::new(w, h);
        let id = cache.load_font("sans", font_bytes(chars));
        (cache, id)
    }

    #[test]
    fn test_bucket_spreads_nearby_keys() {
        let mut used = [false; HASH_BUCKETS];
        for cp in 0x20..0x80u32 {
            used[bucket(cp, 200, 0)] = true;
        }
        // 96 consecutive codepoints land in many distinct buckets
        assert!(used.iter().filter(|&&u| u).count() > 48);
        assert_ne!(bucket(65, 200, 0), bucket(65, 210, 0));
    }

    #[test]
    fn test_repeated_lookup_returns_same_region() {
        let (mut cache, font) = cache_with(&['A', 'B'], 64, 64);
        let a = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let b = cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let again = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(a, again);
        assert_ne!(a.atlas, b.atlas);
        assert_eq!(cache.font(font).unwrap().cached_glyphs(), 2);
    }

    #[test]
    fn test_glyph_metrics_include_padding() {
        let (mut cache, font) = cache_with(&['A'], 64, 64);
        let g = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!((g.width, g.height), (14, 14));
        assert_eq!((g.x_off, g.y_off), (-2, -12));
        assert!((g.x_advance - 12.0).abs() < 1e-4);
        let region = g.atlas.unwrap();
        assert_eq!((region.width, region.height), (14, 14));
    }

    #[test]
    fn test_glyph_records_outline_offset() {
        let (mut cache, font) = cache_with(&['A', 'B'], 64, 64);
        let a = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::MetricsOnly).unwrap();
        let b = cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::MetricsOnly).unwrap();
        let space = cache.get_glyph(font, ' ' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let face = cache.font(font).and_then(Font::face).unwrap();
        assert_eq!(a.outline_offset, face.glyph_offset(a.glyph_index));
        assert!(a.outline_offset.is_some());
        assert!(b.outline_offset > a.outline_offset);
        assert_eq!(space.outline_offset, None);
    }

    #[test]
    fn test_sizes_and_blur_are_distinct_keys() {
        let (mut cache, font) = cache_with(&['A'], 128, 128);
        let small = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let large = cache.get_glyph(font, 'A' as u32, 40.0, 0.0, GlyphRequest::Required).unwrap();
        let blurred = cache.get_glyph(font, 'A' as u32, 20.0, 3.0, GlyphRequest::Required).unwrap();
        assert_ne!(small.atlas, large.atlas);
        assert_ne!(small.atlas, blurred.atlas);
        assert_eq!(blurred.width, small.width + 6);
    }

    #[test]
    fn test_blur_radius_is_clamped() {
        let (mut cache, font) = cache_with(&['A'], 256, 256);
        let g = cache.get_glyph(font, 'A' as u32, 20.0, 50.0, GlyphRequest::Required).unwrap();
        assert_eq!(g.blur, MAX_BLUR);
        assert_eq!(g.padding(), 22);
    }

    #[test]
    fn test_metrics_only_leaves_atlas_untouched() {
        let (mut cache, font) = cache_with(&['A'], 64, 64);
        let m = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::MetricsOnly).unwrap();
        assert!(m.atlas.is_none());
        assert!(!cache.atlas().is_dirty());
        assert_eq!(cache.atlas().allocator().max_y(), 0);

        let r = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert!(r.atlas.is_some());
        assert_eq!(r.x_advance, m.x_advance);
        assert_eq!((r.x_off, r.y_off), (m.x_off, m.y_off));
        assert!(cache.atlas().is_dirty());
    }

    #[test]
    fn test_empty_glyph_skips_atlas() {
        let (mut cache, font) = cache_with(&['A'], 64, 64);
        let g = cache.get_glyph(font, ' ' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert!(g.empty);
        assert!(g.atlas.is_none());
        assert!((g.x_advance - 5.0).abs() < 1e-4);
        assert!(!cache.atlas().is_dirty());
    }

    #[test]
    fn test_tiny_size_is_not_found() {
        let (mut cache, font) = cache_with(&['A'], 64, 64);
        assert_eq!(
            cache.get_glyph(font, 'A' as u32, 0.1, 0.0, GlyphRequest::Required),
            Err(TextError::GlyphNotFound('A' as u32))
        );
    }

    #[test]
    fn test_rendered_glyph_has_clear_border() {
        let (mut cache, font) = cache_with(&['A'], 64, 64);
        let g = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let r = g.atlas.unwrap();
        let (w, _) = cache.atlas().dimensions();
        let px = |x: u32, y: u32| cache.atlas().pixels()[((r.y + y) * w + r.x + x) as usize];
        for i in 0..r.width {
            assert_eq!(px(i, 0), 0);
            assert_eq!(px(i, r.height - 1), 0);
            assert_eq!(px(0, i), 0);
            assert_eq!(px(r.width - 1, i), 0);
        }
        // interior of the 10x10 square is opaque
        assert_eq!(px(7, 7), 255);
        let dirty = cache.atlas().dirty_rect().unwrap();
        assert!(dirty.x0 <= r.x && dirty.x1 >= r.x + r.width);
    }

    #[test]
    fn test_fallback_chain_resolves_missing_codepoints() {
        let mut cache = GlyphCache::new(64, 64);
        let latin = cache.load_font("latin", font_bytes(&['A']));
        let extra = cache.load_font("extra", font_bytes(&['B']));
        cache.registry_mut().add_fallback(latin, extra).unwrap();

        let a = cache.get_glyph(latin, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let b = cache.get_glyph(latin, 'B' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(a.source, latin);
        assert_eq!(b.source, extra);
        assert_eq!(
            cache.get_glyph(latin, 'C' as u32, 20.0, 0.0, GlyphRequest::Required),
            Err(TextError::GlyphNotFound('C' as u32))
        );
    }

    #[test]
    fn test_unusable_font_reports_not_found() {
        let mut cache = GlyphCache::new(64, 64);
        let broken = cache.load_font("broken", vec![1, 2, 3]);
        for request in [GlyphRequest::Required, GlyphRequest::MetricsOnly] {
            assert_eq!(
                cache.get_glyph(broken, 'A' as u32, 20.0, 0.0, request),
                Err(TextError::GlyphNotFound('A' as u32))
            );
        }
    }

    #[test]
    fn test_atlas_full_without_handler_keeps_metrics() {
        let (mut cache, font) = cache_with(&['A', 'B'], 16, 16);
        cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(
            cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::Required),
            Err(TextError::AtlasFull)
        );
        let m = cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::MetricsOnly).unwrap();
        assert!(m.atlas.is_none());
        assert!((m.x_advance - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_expand_handler_retries_once() {
        let (mut cache, font) = cache_with(&['A', 'B'], 16, 16);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        cache.set_atlas_full_handler(move |w, h| {
            seen.set(seen.get() + 1);
            AtlasFullAction::Expand {
                width: w * 2,
                height: h * 2,
            }
        });
        let a = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let b = cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.atlas().dimensions(), (32, 32));
        assert!(b.atlas.is_some());
        // earlier placements survive growth
        let again = cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(a.atlas, again.atlas);
    }

    #[test]
    fn test_reset_handler_drops_cached_glyphs() {
        let (mut cache, font) = cache_with(&['A', 'B'], 16, 16);
        cache.set_atlas_full_handler(|_, _| AtlasFullAction::Reset);
        cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        let generation = cache.atlas().generation();
        let b = cache.get_glyph(font, 'B' as u32, 20.0, 0.0, GlyphRequest::Required).unwrap();
        assert_eq!(cache.atlas().generation(), generation + 1);
        assert_eq!(b.atlas.map(|r| (r.x, r.y)), Some((0, 0)));
        assert_eq!(cache.font(font).unwrap().cached_glyphs(), 1);
    }

    #[test]
    fn test_failed_recovery_reports_atlas_full() {
        let (mut cache, font) = cache_with(&['A'], 8, 8);
        cache.set_atlas_full_handler(|_, _| AtlasFullAction::Expand { width: 8, height: 8 });
        assert_eq!(
            cache.get_glyph(font, 'A' as u32, 20.0, 0.0, GlyphRequest::Required),
            Err(TextError::AtlasFull)
        );
    }
}
