//! Stipple GPU batching
//!
//! Turns paths and shaped text into triangle lists plus per-call fragment
//! uniforms, and replays them against a [`RenderSurface`] using a stencil
//! based fill.
//!
//! # Pipeline
//!
//! - [`PathTessellator`] flattens paths and expands fills and strokes
//! - [`Batcher`] accumulates calls, vertices and uniforms for one frame
//! - [`RenderSurface`] is the collaborator owning textures and the framebuffer
//! - [`Canvas`] ties the pieces together with a render-state stack

pub mod arena;
pub mod batcher;
pub mod canvas;
pub mod config;
pub mod primitives;
pub mod software;
pub mod surface;
pub mod tessellator;
pub mod uniforms;

pub use batcher::{BatchState, Batcher, CallKind, CallTexture, FlushStats, ImageOp};
pub use canvas::{Canvas, RenderState, MAX_RENDER_STATES};
pub use config::{AtlasConfig, ArenaCapacity, RendererConfig, ScratchLimits};
pub use primitives::{FragUniform, ShaderType, TexType, Vertex};
pub use software::SoftwareSurface;
pub use surface::{
    PassState, RecordedCall, RecordingSurface, RenderSurface, StencilTest, StencilWrite,
    TextureFormat, TextureId, TextureUpload, Viewport,
};
pub use tessellator::{PathTessellator, TessParams, TessPath, Tessellation};
pub use uniforms::{convert_paint, Scissor};

use thiserror::Error;

/// Path tessellation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TessError {
    #[error("Tessellation scratch exhausted ({what} limit {limit})")]
    ScratchExhausted { what: &'static str, limit: usize },
}

/// Errors reported by a [`RenderSurface`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("Unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("Texture upload out of bounds")]
    UploadOutOfBounds,

    #[error("Surface error: {0}")]
    Backend(String),
}

/// Errors from batching and the canvas layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Render state stack overflow")]
    StateStackOverflow,

    #[error("Render state stack underflow")]
    StateStackUnderflow,

    #[error("Unknown image")]
    UnknownImage,

    #[error("Image pixel buffer has the wrong size")]
    ImageSize,

    #[error(transparent)]
    Tess(#[from] TessError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Text(#[from] stipple_text::TextError),
}

/// Renderer configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse renderer config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize renderer config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid renderer config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;
