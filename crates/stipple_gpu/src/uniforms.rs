//! Paint to fragment uniform conversion

use stipple_paint::{Paint, Transform2D};

use crate::primitives::{FragUniform, ShaderType, TexType};

/// Scissor rectangle as a transform of its center plus a half extent
///
/// A negative extent disables scissoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scissor {
    pub xform: Transform2D,
    pub extent: [f32; 2],
}

impl Default for Scissor {
    fn default() -> Self {
        Self::NONE
    }
}

impl Scissor {
    pub const NONE: Scissor = Scissor {
        xform: Transform2D::identity(),
        extent: [-1.0, -1.0],
    };

    pub fn is_enabled(&self) -> bool {
        self.extent[0] >= -0.5 && self.extent[1] >= -0.5
    }
}

/// Pack `paint` into a fragment uniform
///
/// `width` is the stroke width (the fringe width for fills) and `tex_type`
/// describes the texture behind `paint.image`, if any.
pub fn convert_paint(
    paint: &Paint,
    scissor: &Scissor,
    width: f32,
    fringe: f32,
    stroke_thr: f32,
    tex_type: TexType,
) -> FragUniform {
    let mut frag = FragUniform {
        inner_color: paint.inner_color.premultiplied().to_array(),
        outer_color: paint.outer_color.premultiplied().to_array(),
        ..Default::default()
    };

    if scissor.is_enabled() {
        let inv = scissor.xform.inverse().unwrap_or_else(Transform2D::identity);
        let x = &scissor.xform;
        frag.scissor_mat = inv.to_mat3x4();
        frag.scissor_ext = scissor.extent;
        frag.scissor_scale = [
            (x.a * x.a + x.c * x.c).sqrt() / fringe,
            (x.b * x.b + x.d * x.d).sqrt() / fringe,
        ];
    } else {
        frag.scissor_mat = [0.0; 12];
        frag.scissor_ext = [1.0, 1.0];
        frag.scissor_scale = [1.0, 1.0];
    }

    frag.extent = paint.extent;
    frag.stroke_mult = (width * 0.5 + fringe * 0.5) / fringe;
    frag.stroke_thr = stroke_thr;

    if paint.image.is_some() {
        frag.shader_type = ShaderType::FillImage as u32;
        frag.tex_type = tex_type as u32;
    } else {
        frag.shader_type = ShaderType::FillGradient as u32;
        frag.radius = paint.radius;
        frag.feather = paint.feather;
    }

    let inv = paint.xform.inverse().unwrap_or_else(Transform2D::identity);
    frag.paint_mat = inv.to_mat3x4();
    frag
}
