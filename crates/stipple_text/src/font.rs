//! Parsed TrueType font face

use std::ops::Range;

use crate::cmap::CharMap;
use crate::outline::{self, Outline};
use crate::sfnt::{read_i16, read_u16, read_u32, ParseError, TableDirectory, Tag};

/// Font-wide vertical metrics in font units (from `hhea`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaceMetrics {
    pub ascent: i16,
    /// Negative below the baseline
    pub descent: i16,
    pub line_gap: i16,
}

/// Horizontal metrics of one glyph in font units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HMetrics {
    pub advance: u16,
    pub left_side_bearing: i16,
}

/// Glyph bounds in font units, y up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlyphBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// Integer pixel box of a scaled glyph, y down
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitmapBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BitmapBox {
    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// A font face with quadratic (`glyf`) outlines
///
/// Owns the raw font bytes; all lookups read from them on demand.
pub struct FontFace {
    data: Vec<u8>,
    face_index: u32,
    units_per_em: u16,
    num_glyphs: u16,
    loca_long: bool,
    num_hmetrics: u16,
    metrics: FaceMetrics,
    loca: Range<usize>,
    glyf: Range<usize>,
    hmtx: Range<usize>,
    kern: Option<Range<usize>>,
    cmap: CharMap,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .field("num_glyphs", &self.num_glyphs)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl FontFace {
    /// Parse face `face_index` of a font or font collection
    pub fn parse(data: Vec<u8>, face_index: u32) -> Result<Self, ParseError> {
        let dir = TableDirectory::parse(&data, face_index)?;
        let head = dir.require(Tag::HEAD)?;
        let hhea = dir.require(Tag::HHEA)?;
        let maxp = dir.require(Tag::MAXP)?;
        let hmtx = dir.require(Tag::HMTX)?;
        let loca = dir.require(Tag::LOCA)?;
        let glyf = dir.require(Tag::GLYF)?;
        let cmap_table = dir.require(Tag::CMAP)?;
        let kern = dir.find(Tag::KERN);

        let eof = ParseError::UnexpectedEof;
        let units_per_em = read_u16(&data, head.start + 18).ok_or(eof.clone())?;
        let loca_format = read_i16(&data, head.start + 50).ok_or(eof.clone())?;
        if units_per_em == 0 {
            return Err(ParseError::Malformed("units per em is zero"));
        }
        let metrics = FaceMetrics {
            ascent: read_i16(&data, hhea.start + 4).ok_or(eof.clone())?,
            descent: read_i16(&data, hhea.start + 6).ok_or(eof.clone())?,
            line_gap: read_i16(&data, hhea.start + 8).ok_or(eof.clone())?,
        };
        let num_hmetrics = read_u16(&data, hhea.start + 34).ok_or(eof.clone())?;
        let num_glyphs = read_u16(&data, maxp.start + 4).ok_or(eof)?;
        let cmap = CharMap::select(&data, cmap_table.start)?;

        if metrics.ascent <= metrics.descent {
            return Err(ParseError::Malformed("ascent not above descent"));
        }
        if num_hmetrics == 0 && num_glyphs > 0 {
            return Err(ParseError::Malformed("no horizontal metrics"));
        }

        Ok(Self {
            data,
            face_index,
            units_per_em,
            num_glyphs,
            loca_long: loca_format != 0,
            num_hmetrics,
            metrics,
            loca,
            glyf,
            hmtx,
            kern,
            cmap,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn metrics(&self) -> FaceMetrics {
        self.metrics
    }

    /// Glyph index for `codepoint`; 0 (notdef) when unmapped
    pub fn glyph_index(&self, codepoint: u32) -> u16 {
        self.cmap.glyph_index(&self.data, codepoint)
    }

    /// Scale mapping font units to pixels so that ascent - descent spans `pixels`
    pub fn scale_for_pixel_height(&self, pixels: f32) -> f32 {
        let height = self.metrics.ascent as f32 - self.metrics.descent as f32;
        pixels / height
    }

    pub fn h_metrics(&self, glyph: u16) -> HMetrics {
        let hmtx = &self.data[self.hmtx.clone()];
        let n = self.num_hmetrics as usize;
        let g = glyph as usize;
        if g < n {
            HMetrics {
                advance: read_u16(hmtx, g * 4).unwrap_or(0),
                left_side_bearing: read_i16(hmtx, g * 4 + 2).unwrap_or(0),
            }
        } else {
            let last = n.saturating_sub(1);
            HMetrics {
                advance: read_u16(hmtx, last * 4).unwrap_or(0),
                left_side_bearing: read_i16(hmtx, n * 4 + (g - n) * 2).unwrap_or(0),
            }
        }
    }

    /// Kerning adjustment between two glyphs in font units
    pub fn kern_advance(&self, left: u16, right: u16) -> i16 {
        let Some(range) = &self.kern else {
            return 0;
        };
        let kern = &self.data[range.clone()];
        // only the first horizontal format 0 sub-table is used
        if read_u16(kern, 2).unwrap_or(0) < 1 || read_u16(kern, 8) != Some(1) {
            return 0;
        }
        let pairs = read_u16(kern, 10).unwrap_or(0) as usize;
        let needle = (left as u32) << 16 | right as u32;
        let (mut lo, mut hi) = (0usize, pairs);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let Some(straw) = read_u32(kern, 18 + mid * 6) else {
                return 0;
            };
            match needle.cmp(&straw) {
                std::cmp::Ordering::Less => hi = mid,
                std::cmp::Ordering::Greater => lo = mid + 1,
                std::cmp::Ordering::Equal => return read_i16(kern, 22 + mid * 6).unwrap_or(0),
            }
        }
        0
    }

    /// Byte range of the glyph description, `None` for glyphs without outlines
    pub(crate) fn glyph_range(&self, glyph: u16) -> Option<Range<usize>> {
        if glyph >= self.num_glyphs {
            return None;
        }
        let loca = &self.data[self.loca.clone()];
        let g = glyph as usize;
        let (start, end) = if self.loca_long {
            (read_u32(loca, g * 4)? as usize, read_u32(loca, g * 4 + 4)? as usize)
        } else {
            (
                read_u16(loca, g * 2)? as usize * 2,
                read_u16(loca, g * 2 + 2)? as usize * 2,
            )
        };
        if start >= end || self.glyf.start + end > self.glyf.end {
            return None;
        }
        Some(self.glyf.start + start..self.glyf.start + end)
    }

    /// Offset of the glyph description inside `glyf`, `None` without outline data
    pub fn glyph_offset(&self, glyph: u16) -> Option<u32> {
        let range = self.glyph_range(glyph)?;
        u32::try_from(range.start - self.glyf.start).ok()
    }

    pub fn glyph_box(&self, glyph: u16) -> Option<GlyphBox> {
        let range = self.glyph_range(glyph)?;
        let at = range.start;
        Some(GlyphBox {
            x_min: read_i16(&self.data, at + 2)?,
            y_min: read_i16(&self.data, at + 4)?,
            x_max: read_i16(&self.data, at + 6)?,
            y_max: read_i16(&self.data, at + 8)?,
        })
    }

    /// True for glyphs with no contours (spaces, unmapped slots)
    pub fn is_glyph_empty(&self, glyph: u16) -> bool {
        match self.glyph_range(glyph) {
            Some(range) => read_i16(&self.data, range.start).unwrap_or(0) == 0,
            None => true,
        }
    }

    /// Decode the outline of `glyph`, resolving composite components
    pub fn outline(&self, glyph: u16) -> Result<Outline, ParseError> {
        let mut out = Outline::new();
        let mut budget = outline::MAX_COMPOSITE_COMPONENTS;
        outline::decode_glyph(self, glyph, 0, &mut budget, &mut out)?;
        Ok(out)
    }

    /// Pixel box of `glyph` at the given scale, empty for glyphs without contours
    pub fn bitmap_box(&self, glyph: u16, scale_x: f32, scale_y: f32) -> BitmapBox {
        if self.is_glyph_empty(glyph) {
            return BitmapBox::default();
        }
        match self.glyph_box(glyph) {
            Some(b) => BitmapBox {
                x0: (b.x_min as f32 * scale_x).floor() as i32,
                y0: (-(b.y_max as f32) * scale_y).floor() as i32,
                x1: (b.x_max as f32 * scale_x).ceil() as i32,
                y1: (-(b.y_min as f32) * scale_y).ceil() as i32,
            },
            None => BitmapBox::default(),
        }
    }
}
