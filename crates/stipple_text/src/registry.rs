//! Font registry
//!
//! Owns every loaded [`Font`] and maps logical names to [`FontId`]s. Loading
//! never fails outright: malformed bytes produce a font that exists but has
//! no face, so lookups through it report `GlyphNotFound` instead of crashing.

use crate::cache::GlyphTable;
use crate::font::FontFace;
use crate::{Result, TextError};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Maximum number of fallback fonts per font
pub const MAX_FALLBACKS: usize = 20;

/// Handle to a font owned by a [`FontRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) u32);

impl FontId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A loaded font with metrics normalized to one em (`ascender - descender == 1`)
pub struct Font {
    name: String,
    face: Option<FontFace>,
    load_error: Option<TextError>,
    ascender: f32,
    descender: f32,
    line_height: f32,
    pub(crate) glyphs: GlyphTable,
    fallbacks: SmallVec<[FontId; 4]>,
}

impl Font {
    fn new(name: &str, face: std::result::Result<FontFace, TextError>) -> Self {
        let mut font = Self {
            name: name.to_string(),
            face: None,
            load_error: None,
            ascender: 0.0,
            descender: 0.0,
            line_height: 0.0,
            glyphs: GlyphTable::default(),
            fallbacks: SmallVec::new(),
        };
        match face {
            Ok(face) => {
                let m = face.metrics();
                let height = (m.ascent as f32 - m.descent as f32).max(1.0);
                font.ascender = m.ascent as f32 / height;
                font.descender = m.descent as f32 / height;
                font.line_height = (height + m.line_gap as f32) / height;
                font.face = Some(face);
            }
            Err(e) => font.load_error = Some(e),
        }
        font
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed face, `None` when loading failed
    pub fn face(&self) -> Option<&FontFace> {
        self.face.as_ref()
    }

    pub fn is_usable(&self) -> bool {
        self.face.is_some()
    }

    pub fn load_error(&self) -> Option<&TextError> {
        self.load_error.as_ref()
    }

    pub fn ascender(&self) -> f32 {
        self.ascender
    }

    /// Negative below the baseline
    pub fn descender(&self) -> f32 {
        self.descender
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    pub fn fallbacks(&self) -> &[FontId] {
        &self.fallbacks
    }

    /// Number of glyphs currently cached for this font
    pub fn cached_glyphs(&self) -> usize {
        self.glyphs.len()
    }
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("usable", &self.is_usable())
            .field("ascender", &self.ascender)
            .field("descender", &self.descender)
            .field("line_height", &self.line_height)
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

/// Owns loaded fonts and resolves names to ids
#[derive(Default)]
pub struct FontRegistry {
    fonts: Vec<Font>,
    by_name: FxHashMap<String, FontId>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the first face in `data` under `name`
    pub fn load_font(&mut self, name: &str, data: Vec<u8>) -> FontId {
        self.load_font_index(name, data, 0)
    }

    /// Load face `face_index` of a font collection under `name`
    ///
    /// Always returns an id. When parsing fails the error is kept on the font
    /// and every glyph lookup through it reports not found.
    pub fn load_font_index(&mut self, name: &str, data: Vec<u8>, face_index: u32) -> FontId {
        let face = FontFace::parse(data, face_index).map_err(TextError::from);
        if let Err(e) = &face {
            tracing::warn!("Failed to load font '{}': {}", name, e);
        }
        let id = FontId(self.fonts.len() as u32);
        let font = Font::new(name, face);
        if font.is_usable() {
            tracing::debug!(
                name,
                ascender = font.ascender,
                descender = font.descender,
                "loaded font"
            );
        }
        self.fonts.push(font);
        // first registration wins
        self.by_name.entry(name.to_string()).or_insert(id);
        id
    }

    pub fn find_font(&self, name: &str) -> Option<FontId> {
        self.by_name.get(name).copied()
    }

    pub fn font(&self, id: FontId) -> Option<&Font> {
        self.fonts.get(id.index())
    }

    pub(crate) fn font_mut(&mut self, id: FontId) -> Option<&mut Font> {
        self.fonts.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FontId, &Font)> {
        self.fonts
            .iter()
            .enumerate()
            .map(|(i, f)| (FontId(i as u32), f))
    }

    /// Append `fallback` to the chain tried when `base` lacks a codepoint
    pub fn add_fallback(&mut self, base: FontId, fallback: FontId) -> Result<()> {
        if self.font(fallback).is_none() {
            return Err(TextError::UnknownFont(fallback.0));
        }
        let font = self.font_mut(base).ok_or(TextError::UnknownFont(base.0))?;
        if font.fallbacks.len() >= MAX_FALLBACKS {
            tracing::warn!("Fallback chain of '{}' is full", font.name);
            return Err(TextError::FallbackChainFull);
        }
        font.fallbacks.push(fallback);
        Ok(())
    }

    pub fn reset_fallbacks(&mut self, base: FontId) -> Result<()> {
        let font = self.font_mut(base).ok_or(TextError::UnknownFont(base.0))?;
        font.fallbacks.clear();
        Ok(())
    }

    /// Drop every cached glyph; used when the atlas is reset
    pub(crate) fn clear_glyphs(&mut self) {
        for font in &mut self.fonts {
            font.glyphs.clear();
        }
    }
}
