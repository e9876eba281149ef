//! Font parsing, glyph rasterization and atlas caching for Stipple
//!
//! This crate provides:
//! - TrueType table parsing (cmap, glyf, hmtx, kern) without external dependencies
//! - Scanline glyph rasterization with vertical supersampling
//! - Skyline atlas packing with dirty-rect tracking
//! - A glyph cache keyed by codepoint, size and blur
//! - Text shaping into screen-space quads, measurement and line breaking

pub mod atlas;
pub mod blur;
pub mod cache;
pub mod cmap;
pub mod font;
pub mod layout;
pub mod outline;
pub mod rasterizer;
pub mod registry;
pub mod sfnt;
pub mod shaper;
pub mod style;

pub use atlas::{AtlasAllocator, AtlasNode, AtlasRegion, DirtyRect, GlyphAtlas};
pub use cache::{AtlasFullAction, CachedGlyph, GlyphCache, GlyphRequest};
pub use font::{BitmapBox, FaceMetrics, FontFace, HMetrics};
pub use layout::{break_lines, TextRow};
pub use outline::{Contours, OutlineVertex};
pub use rasterizer::GlyphRasterizer;
pub use registry::{Font, FontId, FontRegistry, MAX_FALLBACKS};
pub use sfnt::{ParseError, Tag};
pub use shaper::{GlyphPosition, GlyphQuad, ShapedRun, TextBounds, TextShaper, VerticalMetrics};
pub use style::{HAlign, StyleStack, TextAlign, TextStyle, VAlign, MAX_STYLE_STATES};

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextError {
    #[error("Failed to load font: {0}")]
    FontLoad(#[from] ParseError),

    #[error("Glyph not found for codepoint: U+{0:04X}")]
    GlyphNotFound(u32),

    #[error("Atlas is full, cannot allocate glyph")]
    AtlasFull,

    #[error("Style stack overflow")]
    StyleStackOverflow,

    #[error("Style stack underflow")]
    StyleStackUnderflow,

    #[error("Scratch buffer exhausted")]
    ScratchExhausted,

    #[error("Fallback chain is full")]
    FallbackChainFull,

    #[error("Unknown font id {0}")]
    UnknownFont(u32),
}

pub type Result<T> = std::result::Result<T, TextError>;
