//! Renderer configuration
//!
//! Every field has a default, so a partial TOML document only overrides what
//! it names:
//!
//! ```toml
//! antialias = true
//! device_pixel_ratio = 2.0
//!
//! [atlas]
//! initial_width = 1024
//! initial_height = 1024
//! ```

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Glyph atlas sizing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub initial_width: u32,
    pub initial_height: u32,
    /// The atlas is reset instead of grown past this size
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            initial_width: 512,
            initial_height: 512,
            max_width: 4096,
            max_height: 4096,
        }
    }
}

/// Upper bounds on per-operation scratch buffers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchLimits {
    /// Flattened points per fill or stroke
    pub max_path_points: usize,
    /// Expanded vertices per fill or stroke
    pub max_path_vertices: usize,
    /// Glyph quads per text run
    pub max_text_quads: usize,
}

impl Default for ScratchLimits {
    fn default() -> Self {
        Self {
            max_path_points: 1 << 16,
            max_path_vertices: 1 << 20,
            max_text_quads: 4096,
        }
    }
}

/// Starting sizes of the per-frame arenas; they grow on demand
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaCapacity {
    pub calls: usize,
    pub paths: usize,
    pub vertices: usize,
    pub uniforms: usize,
}

impl Default for ArenaCapacity {
    fn default() -> Self {
        Self {
            calls: 128,
            paths: 128,
            vertices: 4096,
            uniforms: 128,
        }
    }
}

/// Configuration for creating a [`Canvas`](crate::Canvas)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Emit antialiasing fringes around fills and strokes
    pub antialias: bool,
    /// Draw strokes with the stencil so overlapping segments blend once
    pub stencil_strokes: bool,
    pub device_pixel_ratio: f32,
    pub atlas: AtlasConfig,
    pub scratch: ScratchLimits,
    pub initial_capacity: ArenaCapacity,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            stencil_strokes: true,
            device_pixel_ratio: 1.0,
            atlas: AtlasConfig::default(),
            scratch: ScratchLimits::default(),
            initial_capacity: ArenaCapacity::default(),
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl RendererConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.atlas;
        if a.initial_width == 0 || a.initial_height == 0 {
            return Err(ConfigError::Invalid("atlas size must be non-zero".into()));
        }
        if a.initial_width > a.max_width || a.initial_height > a.max_height {
            return Err(ConfigError::Invalid(format!(
                "initial atlas size {}x{} exceeds maximum {}x{}",
                a.initial_width, a.initial_height, a.max_width, a.max_height
            )));
        }
        if self.device_pixel_ratio <= 0.0 || !self.device_pixel_ratio.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "device pixel ratio must be positive, got {}",
                self.device_pixel_ratio
            )));
        }
        if self.scratch.max_path_points == 0 || self.scratch.max_path_vertices == 0 {
            return Err(ConfigError::Invalid("scratch limits must be non-zero".into()));
        }
        Ok(())
    }

    /// Raise scratch limits from the environment
    ///
    /// - `STIPPLE_MAX_PATH_POINTS`
    /// - `STIPPLE_MAX_PATH_VERTICES`
    /// - `STIPPLE_MAX_TEXT_QUADS`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_usize("STIPPLE_MAX_PATH_POINTS") {
            self.scratch.max_path_points = v.max(1);
        }
        if let Some(v) = env_usize("STIPPLE_MAX_PATH_VERTICES") {
            self.scratch.max_path_vertices = v.max(1);
        }
        if let Some(v) = env_usize("STIPPLE_MAX_TEXT_QUADS") {
            self.scratch.max_text_quads = v;
        }
        self
    }
}

pub(crate) fn log_renderer_config(config: &RendererConfig) {
    tracing::info!(
        "renderer config: antialias={}, stencil_strokes={}, dpr={}, atlas={}x{} (max {}x{}), max_path_points={}, max_path_vertices={}, max_text_quads={}",
        config.antialias,
        config.stencil_strokes,
        config.device_pixel_ratio,
        config.atlas.initial_width,
        config.atlas.initial_height,
        config.atlas.max_width,
        config.atlas.max_height,
        config.scratch.max_path_points,
        config.scratch.max_path_vertices,
        config.scratch.max_text_quads
    );
}
