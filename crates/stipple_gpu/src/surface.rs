//! Render surface collaborator
//!
//! The [`RenderSurface`] owns physical textures and the framebuffer. The
//! batcher drives it with a small vocabulary: texture uploads, a pass state
//! (colour mask plus stencil test and write), one uniform block and
//! triangle-list draws.

use stipple_text::DirtyRect;

use crate::primitives::{FragUniform, Vertex};
use crate::SurfaceError;

/// Handle to a texture owned by a surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// One byte of coverage per texel
    Alpha8,
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Alpha8 => 1,
            TextureFormat::Rgba8 => 4,
        }
    }
}

/// Pixels for one texture update
///
/// `pixels` holds the whole source image (`width` x `height`); only `rect`
/// needs to be copied. A size different from the texture's resizes it.
#[derive(Clone, Copy, Debug)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub rect: DirtyRect,
    pub pixels: &'a [u8],
}

/// Viewport for one frame, in logical units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilTest {
    Disabled,
    Always,
    EqualZero,
    NotEqualZero,
}

/// Stencil update for fragments passing the test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilWrite {
    Keep,
    /// Wrapping increment for front-facing triangles, wrapping decrement for back-facing
    Winding,
    /// Saturating increment
    Increment,
    /// Zero every tested fragment, passing or failing
    Zero,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassState {
    pub color_write: bool,
    pub stencil_test: StencilTest,
    pub stencil_write: StencilWrite,
}

impl PassState {
    /// Plain blending, no stencil
    pub const COLOR: PassState = PassState {
        color_write: true,
        stencil_test: StencilTest::Disabled,
        stencil_write: StencilWrite::Keep,
    };

    /// Fill pass 1: accumulate winding numbers, no colour
    pub const STENCIL_WINDING: PassState = PassState {
        color_write: false,
        stencil_test: StencilTest::Always,
        stencil_write: StencilWrite::Winding,
    };

    /// Fill pass 2: antialiased fringe outside the covered area
    pub const FRINGE: PassState = PassState {
        color_write: true,
        stencil_test: StencilTest::EqualZero,
        stencil_write: StencilWrite::Keep,
    };

    /// Fill pass 3: cover non-zero winding and clear the stencil
    pub const COVER: PassState = PassState {
        color_write: true,
        stencil_test: StencilTest::NotEqualZero,
        stencil_write: StencilWrite::Zero,
    };

    /// Stroke pass 1: opaque body, each pixel once
    pub const STROKE_BASE: PassState = PassState {
        color_write: true,
        stencil_test: StencilTest::EqualZero,
        stencil_write: StencilWrite::Increment,
    };

    /// Stroke pass 2: antialiased edges not yet touched
    pub const STROKE_AA: PassState = PassState {
        color_write: true,
        stencil_test: StencilTest::EqualZero,
        stencil_write: StencilWrite::Keep,
    };

    /// Stroke pass 3: clear the stencil under the stroke
    pub const STROKE_CLEAR: PassState = PassState {
        color_write: false,
        stencil_test: StencilTest::Always,
        stencil_write: StencilWrite::Zero,
    };
}

/// Rendering backend driven by the batcher
pub trait RenderSurface {
    /// Start a frame; render state is bound here once per flush
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), SurfaceError>;

    fn create_texture(&mut self, format: TextureFormat, width: u32, height: u32) -> Result<TextureId, SurfaceError>;

    fn delete_texture(&mut self, id: TextureId);

    fn update_texture(&mut self, id: TextureId, upload: TextureUpload<'_>) -> Result<(), SurfaceError>;

    fn set_pass(&mut self, pass: PassState);

    /// Uniforms and texture for subsequent draws
    fn set_uniforms(&mut self, uniforms: &FragUniform, texture: Option<TextureId>);

    /// Draw a triangle list
    fn draw(&mut self, vertices: &[Vertex]);

    fn end_frame(&mut self) -> Result<(), SurfaceError>;
}

/// One call made on a [`RecordingSurface`]
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    BeginFrame(Viewport),
    CreateTexture {
        id: TextureId,
        format: TextureFormat,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    UpdateTexture {
        id: TextureId,
        width: u32,
        height: u32,
        rect: DirtyRect,
    },
    SetPass(PassState),
    SetUniforms {
        uniforms: FragUniform,
        texture: Option<TextureId>,
    },
    Draw(Vec<Vertex>),
    EndFrame,
}

/// Surface that only records what it is asked to do
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<RecordedCall>,
    next_texture: u32,
    /// Make every texture update fail
    pub fail_uploads: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &[Vertex]> + '_ {
        self.calls.iter().filter_map(|c| match c {
            RecordedCall::Draw(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    pub fn uploads(&self) -> impl Iterator<Item = (TextureId, DirtyRect)> + '_ {
        self.calls.iter().filter_map(|c| match c {
            RecordedCall::UpdateTexture { id, rect, .. } => Some((*id, *rect)),
            _ => None,
        })
    }

    pub fn passes(&self) -> impl Iterator<Item = PassState> + '_ {
        self.calls.iter().filter_map(|c| match c {
            RecordedCall::SetPass(p) => Some(*p),
            _ => None,
        })
    }
}

impl RenderSurface for RecordingSurface {
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), SurfaceError> {
        self.calls.push(RecordedCall::BeginFrame(viewport));
        Ok(())
    }

    fn create_texture(&mut self, format: TextureFormat, width: u32, height: u32) -> Result<TextureId, SurfaceError> {
        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.calls.push(RecordedCall::CreateTexture {
            id,
            format,
            width,
            height,
        });
        Ok(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.calls.push(RecordedCall::DeleteTexture(id));
    }

    fn update_texture(&mut self, id: TextureId, upload: TextureUpload<'_>) -> Result<(), SurfaceError> {
        if self.fail_uploads {
            return Err(SurfaceError::Backend("upload rejected".into()));
        }
        self.calls.push(RecordedCall::UpdateTexture {
            id,
            width: upload.width,
            height: upload.height,
            rect: upload.rect,
        });
        Ok(())
    }

    fn set_pass(&mut self, pass: PassState) {
        self.calls.push(RecordedCall::SetPass(pass));
    }

    fn set_uniforms(&mut self, uniforms: &FragUniform, texture: Option<TextureId>) {
        self.calls.push(RecordedCall::SetUniforms {
            uniforms: *uniforms,
            texture,
        });
    }

    fn draw(&mut self, vertices: &[Vertex]) {
        self.calls.push(RecordedCall::Draw(vertices.to_vec()));
    }

    fn end_frame(&mut self) -> Result<(), SurfaceError> {
        self.calls.push(RecordedCall::EndFrame);
        Ok(())
    }
}
