//! GPU-ready vertex and uniform layouts
//!
//! All structures use `#[repr(C)]` and implement `bytemuck::Pod` so a surface
//! can upload them as raw bytes.

use stipple_paint::Color;

/// Fragment shader variants (must match shader constants)
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShaderType {
    /// Rounded-box gradient (solid colors are a degenerate gradient)
    #[default]
    FillGradient = 0,
    /// Image pattern sampled in paint space
    FillImage = 1,
    /// Flat white, used for stencil-only passes
    Simple = 2,
    /// Textured triangles sampled at the vertex texture coordinate
    Image = 3,
}

impl ShaderType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => ShaderType::FillImage,
            2 => ShaderType::Simple,
            3 => ShaderType::Image,
            _ => ShaderType::FillGradient,
        }
    }
}

/// How sampled texels are interpreted (must match shader constants)
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TexType {
    /// RGBA with premultiplied alpha
    #[default]
    Premultiplied = 0,
    /// RGBA with straight alpha
    Straight = 1,
    /// Single channel coverage replicated to all channels
    Alpha = 2,
}

impl TexType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => TexType::Straight,
            2 => TexType::Alpha,
            _ => TexType::Premultiplied,
        }
    }
}

/// Vertex handed to the surface
///
/// Layout:
/// - pos: `vec2<f32>` (8 bytes)
/// - uv: `vec2<f32>` (8 bytes) - atlas coordinate for triangles, fringe
///   coordinate for fills and strokes
/// - color: `u32` (4 bytes) - straight RGBA8, `r` in the low byte
///   Total: 20 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: u32,
}

/// Packed opaque white
pub const WHITE_PACKED: u32 = 0xffff_ffff;

impl Default for Vertex {
    fn default() -> Self {
        Self {
            pos: [0.0; 2],
            uv: [0.0; 2],
            color: WHITE_PACKED,
        }
    }
}

impl Vertex {
    /// Path vertex: white, `u`/`v` carry the antialiasing coordinate
    #[inline]
    pub fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            pos: [x, y],
            uv: [u, v],
            color: WHITE_PACKED,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color.to_packed();
        self
    }
}

/// Per-call fragment uniforms
///
/// Layout (std140 compatible, every member 4-byte aligned):
/// - scissor_mat: `mat3x4<f32>` (48 bytes) - inverse scissor transform
/// - paint_mat: `mat3x4<f32>` (48 bytes) - inverse paint transform
/// - inner_color / outer_color: `vec4<f32>` (32 bytes) - premultiplied
/// - scissor_ext / scissor_scale: `vec2<f32>` (16 bytes)
/// - extent: `vec2<f32>` (8 bytes)
/// - radius, feather, stroke_mult, stroke_thr: `f32` (16 bytes)
/// - tex_type, shader_type: `u32` (8 bytes)
///   Total: 176 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FragUniform {
    pub scissor_mat: [f32; 12],
    pub paint_mat: [f32; 12],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
    pub scissor_ext: [f32; 2],
    pub scissor_scale: [f32; 2],
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub stroke_mult: f32,
    /// Fragments whose stroke coverage is below this are discarded
    pub stroke_thr: f32,
    pub tex_type: u32,
    pub shader_type: u32,
}

impl Default for FragUniform {
    fn default() -> Self {
        Self {
            scissor_mat: [0.0; 12],
            paint_mat: [0.0; 12],
            inner_color: [0.0; 4],
            outer_color: [0.0; 4],
            // no scissor
            scissor_ext: [1.0, 1.0],
            scissor_scale: [1.0, 1.0],
            extent: [0.0; 2],
            radius: 0.0,
            feather: 1.0,
            stroke_mult: 1.0,
            stroke_thr: -1.0,
            tex_type: TexType::Premultiplied as u32,
            shader_type: ShaderType::FillGradient as u32,
        }
    }
}

impl FragUniform {
    /// Uniform for a stencil-only pass
    pub fn simple() -> Self {
        Self {
            shader_type: ShaderType::Simple as u32,
            ..Default::default()
        }
    }

    pub fn shader(&self) -> ShaderType {
        ShaderType::from_u32(self.shader_type)
    }

    pub fn texture_type(&self) -> TexType {
        TexType::from_u32(self.tex_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(std::mem::size_of::<FragUniform>(), 176);
        assert_eq!(std::mem::size_of::<FragUniform>() % 16, 0);
    }

    #[test]
    fn test_uniform_bytes_roundtrip_through_pod() {
        let mut u = FragUniform::simple();
        u.stroke_thr = 0.5;
        let bytes = bytemuck::bytes_of(&u);
        let back: FragUniform = *bytemuck::from_bytes(bytes);
        assert_eq!(back.shader(), ShaderType::Simple);
        assert_eq!(back.stroke_thr, 0.5);
    }

    #[test]
    fn test_vertex_color_packing() {
        let v = Vertex::new(1.0, 2.0, 0.5, 1.0).with_color(Color::RED);
        assert_eq!(v.color.to_le_bytes(), [255, 0, 0, 255]);
        assert_eq!(Vertex::default().color, WHITE_PACKED);
    }
}
