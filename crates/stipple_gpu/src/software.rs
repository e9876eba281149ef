//! CPU reference surface
//!
//! Rasterizes triangle lists into an RGBA8 premultiplied framebuffer with an
//! 8-bit stencil buffer. Pixel centers are sampled at `+0.5` with a top-left
//! fill rule, so triangles sharing an edge never touch a pixel twice. The
//! fragment stage evaluates [`FragUniform`] the same way a GPU shader would.

use stipple_paint::Color;

use crate::primitives::{FragUniform, ShaderType, TexType, Vertex};
use crate::surface::{PassState, RenderSurface, StencilTest, StencilWrite, TextureFormat, TextureId, TextureUpload, Viewport};
use crate::SurfaceError;

struct SoftTexture {
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SoftTexture {
    /// Nearest texel, clamped to the edge
    fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let x = ((u * self.width as f32).floor() as i64).clamp(0, self.width as i64 - 1) as usize;
        let y = ((v * self.height as f32).floor() as i64).clamp(0, self.height as i64 - 1) as usize;
        let bpp = self.format.bytes_per_pixel();
        let i = (y * self.width as usize + x) * bpp;
        match self.format {
            TextureFormat::Alpha8 => [self.data[i] as f32 / 255.0, 0.0, 0.0, 1.0],
            TextureFormat::Rgba8 => [
                self.data[i] as f32 / 255.0,
                self.data[i + 1] as f32 / 255.0,
                self.data[i + 2] as f32 / 255.0,
                self.data[i + 3] as f32 / 255.0,
            ],
        }
    }
}

/// Software rasterizer implementing [`RenderSurface`]
pub struct SoftwareSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    stencil: Vec<u8>,
    device_pixel_ratio: f32,
    textures: Vec<Option<SoftTexture>>,
    pass: PassState,
    uniforms: FragUniform,
    texture: Option<TextureId>,
}

impl SoftwareSurface {
    /// Framebuffer of `width` x `height` physical pixels, cleared to transparent
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![0; len * 4],
            stencil: vec![0; len],
            device_pixel_ratio: 1.0,
            textures: Vec::new(),
            pass: PassState::COLOR,
            uniforms: FragUniform::default(),
            texture: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 framebuffer, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn stencil_at(&self, x: u32, y: u32) -> u8 {
        self.stencil[y as usize * self.width as usize + x as usize]
    }

    /// Fill the framebuffer with `color` and zero the stencil
    pub fn clear(&mut self, color: Color) {
        let rgba = color.premultiplied().to_rgba8();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        self.stencil.fill(0);
    }

    fn texture(&self, id: TextureId) -> Option<&SoftTexture> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.textures.get(index)?.as_ref()
    }

    fn texture_mut(&mut self, id: TextureId) -> Option<&mut SoftTexture> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.textures.get_mut(index)?.as_mut()
    }

    fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        match self.texture.and_then(|id| self.texture(id)) {
            Some(tex) => tex.sample(u, v),
            None => [0.0; 4],
        }
    }

    /// Fragment color for `fpos` (logical units), or `None` when discarded
    fn shade(&self, fpos: [f32; 2], uv: [f32; 2]) -> Option<[f32; 4]> {
        let u = &self.uniforms;
        let scissor = scissor_mask(u, fpos);
        let stroke_alpha = ((1.0 - (uv[0] * 2.0 - 1.0).abs()) * u.stroke_mult).min(1.0) * uv[1].min(1.0);
        if stroke_alpha < u.stroke_thr {
            return None;
        }

        let color = match u.shader() {
            ShaderType::FillGradient => {
                let pt = apply_mat(&u.paint_mat, fpos);
                let d = ((sd_round_rect(pt, u.extent, u.radius) + u.feather * 0.5) / u.feather).clamp(0.0, 1.0);
                let c = mix(u.inner_color, u.outer_color, d);
                scale(c, stroke_alpha * scissor)
            }
            ShaderType::FillImage => {
                let pt = apply_mat(&u.paint_mat, fpos);
                let c = self.sample(pt[0] / u.extent[0], pt[1] / u.extent[1]);
                let c = adjust_texel(c, u.texture_type());
                scale(mul(c, u.inner_color), stroke_alpha * scissor)
            }
            ShaderType::Simple => [1.0; 4],
            ShaderType::Image => {
                let c = adjust_texel(self.sample(uv[0], uv[1]), u.texture_type());
                mul(scale(c, scissor), u.inner_color)
            }
        };
        Some(color)
    }

    fn rasterize(&mut self, tri: &[Vertex]) {
        let dpr = self.device_pixel_ratio as f64;
        let mut p = [[0.0f64; 2]; 3];
        for (dst, v) in p.iter_mut().zip(tri) {
            *dst = [v.pos[0] as f64 * dpr, v.pos[1] as f64 * dpr];
        }
        let mut idx = [0usize, 1, 2];
        let mut area = edge(p[0], p[1], p[2]);
        if area == 0.0 || !area.is_finite() {
            return;
        }
        let front = area > 0.0;
        if !front {
            p.swap(1, 2);
            idx.swap(1, 2);
            area = -area;
        }

        let min_x = p.iter().map(|q| q[0]).fold(f64::MAX, f64::min).floor().max(0.0) as u32;
        let min_y = p.iter().map(|q| q[1]).fold(f64::MAX, f64::min).floor().max(0.0) as u32;
        let max_x = (p.iter().map(|q| q[0]).fold(f64::MIN, f64::max).ceil().max(0.0) as u32).min(self.width);
        let max_y = (p.iter().map(|q| q[1]).fold(f64::MIN, f64::max).ceil().max(0.0) as u32).min(self.height);

        let edges = [(p[1], p[2]), (p[2], p[0]), (p[0], p[1])];
        let top_left = edges.map(|(a, b)| is_top_left(a, b));
        let verts = idx.map(|i| tri[i]);
        let colors = verts.map(|v| Color::from_packed(v.color).to_array());

        for y in min_y..max_y {
            for x in min_x..max_x {
                let c = [x as f64 + 0.5, y as f64 + 0.5];
                let mut w = [0.0f64; 3];
                let mut inside = true;
                for (k, (a, b)) in edges.iter().enumerate() {
                    w[k] = edge(*a, *b, c);
                    if w[k] < 0.0 || (w[k] == 0.0 && !top_left[k]) {
                        inside = false;
                        break;
                    }
                }
                if !inside {
                    continue;
                }
                let l = [(w[0] / area) as f32, (w[1] / area) as f32, (w[2] / area) as f32];
                let uv = [
                    l[0] * verts[0].uv[0] + l[1] * verts[1].uv[0] + l[2] * verts[2].uv[0],
                    l[0] * verts[0].uv[1] + l[1] * verts[1].uv[1] + l[2] * verts[2].uv[1],
                ];
                let vcolor: [f32; 4] =
                    std::array::from_fn(|ch| l[0] * colors[0][ch] + l[1] * colors[1][ch] + l[2] * colors[2][ch]);
                let fpos = [(c[0] / dpr) as f32, (c[1] / dpr) as f32];
                self.fragment(x, y, fpos, uv, vcolor, front);
            }
        }
    }

    fn fragment(&mut self, x: u32, y: u32, fpos: [f32; 2], uv: [f32; 2], vcolor: [f32; 4], front: bool) {
        let Some(color) = self.shade(fpos, uv) else {
            return;
        };
        let i = y as usize * self.width as usize + x as usize;

        let pass = self.pass;
        if pass.stencil_test != StencilTest::Disabled {
            let s = self.stencil[i];
            let passed = match pass.stencil_test {
                StencilTest::Disabled | StencilTest::Always => true,
                StencilTest::EqualZero => s == 0,
                StencilTest::NotEqualZero => s != 0,
            };
            self.stencil[i] = match pass.stencil_write {
                StencilWrite::Keep => s,
                StencilWrite::Winding if passed => {
                    if front {
                        s.wrapping_add(1)
                    } else {
                        s.wrapping_sub(1)
                    }
                }
                StencilWrite::Increment if passed => s.saturating_add(1),
                StencilWrite::Zero => 0,
                _ => s,
            };
            if !passed {
                return;
            }
        }
        if !pass.color_write {
            return;
        }

        // vertex color is straight alpha
        let tint = [vcolor[0] * vcolor[3], vcolor[1] * vcolor[3], vcolor[2] * vcolor[3], vcolor[3]];
        let src = mul(color, tint);
        let px = &mut self.pixels[i * 4..i * 4 + 4];
        let inv = 1.0 - src[3].clamp(0.0, 1.0);
        for ch in 0..4 {
            let dst = px[ch] as f32 / 255.0;
            let out = (src[ch] + dst * inv).clamp(0.0, 1.0);
            px[ch] = (out * 255.0 + 0.5) as u8;
        }
    }
}

impl RenderSurface for SoftwareSurface {
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), SurfaceError> {
        self.device_pixel_ratio = viewport.device_pixel_ratio;
        self.pass = PassState::COLOR;
        self.texture = None;
        Ok(())
    }

    fn create_texture(&mut self, format: TextureFormat, width: u32, height: u32) -> Result<TextureId, SurfaceError> {
        let data = vec![0; width as usize * height as usize * format.bytes_per_pixel()];
        let texture = SoftTexture {
            format,
            width,
            height,
            data,
        };
        let slot = self.textures.iter().position(Option::is_none);
        let index = match slot {
            Some(i) => {
                self.textures[i] = Some(texture);
                i
            }
            None => {
                self.textures.push(Some(texture));
                self.textures.len() - 1
            }
        };
        Ok(TextureId(index as u32 + 1))
    }

    fn delete_texture(&mut self, id: TextureId) {
        if let Some(index) = (id.0 as usize).checked_sub(1) {
            if let Some(slot) = self.textures.get_mut(index) {
                *slot = None;
            }
        }
    }

    fn update_texture(&mut self, id: TextureId, upload: TextureUpload<'_>) -> Result<(), SurfaceError> {
        let tex = self.texture_mut(id).ok_or(SurfaceError::UnknownTexture(id))?;
        let bpp = tex.format.bytes_per_pixel();
        let (w, h) = (upload.width as usize, upload.height as usize);
        let r = upload.rect;
        if upload.pixels.len() < w * h * bpp || r.x1 > upload.width || r.y1 > upload.height || r.x0 > r.x1 || r.y0 > r.y1 {
            return Err(SurfaceError::UploadOutOfBounds);
        }
        if (tex.width, tex.height) != (upload.width, upload.height) {
            tex.width = upload.width;
            tex.height = upload.height;
            tex.data = vec![0; w * h * bpp];
        }
        let row_len = r.width() as usize * bpp;
        for y in r.y0 as usize..r.y1 as usize {
            let start = (y * w + r.x0 as usize) * bpp;
            tex.data[start..start + row_len].copy_from_slice(&upload.pixels[start..start + row_len]);
        }
        Ok(())
    }

    fn set_pass(&mut self, pass: PassState) {
        self.pass = pass;
    }

    fn set_uniforms(&mut self, uniforms: &FragUniform, texture: Option<TextureId>) {
        self.uniforms = *uniforms;
        self.texture = texture;
    }

    fn draw(&mut self, vertices: &[Vertex]) {
        for tri in vertices.chunks_exact(3) {
            self.rasterize(tri);
        }
    }

    fn end_frame(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

fn edge(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Top edges are horizontal with the interior below, left edges go up
fn is_top_left(a: [f64; 2], b: [f64; 2]) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

fn apply_mat(m: &[f32; 12], p: [f32; 2]) -> [f32; 2] {
    [m[0] * p[0] + m[4] * p[1] + m[8], m[1] * p[0] + m[5] * p[1] + m[9]]
}

fn sd_round_rect(pt: [f32; 2], ext: [f32; 2], rad: f32) -> f32 {
    let dx = pt[0].abs() - (ext[0] - rad);
    let dy = pt[1].abs() - (ext[1] - rad);
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    dx.max(dy).min(0.0) + outside - rad
}

fn scissor_mask(u: &FragUniform, p: [f32; 2]) -> f32 {
    let q = apply_mat(&u.scissor_mat, p);
    let sx = 0.5 - (q[0].abs() - u.scissor_ext[0]) * u.scissor_scale[0];
    let sy = 0.5 - (q[1].abs() - u.scissor_ext[1]) * u.scissor_scale[1];
    sx.clamp(0.0, 1.0) * sy.clamp(0.0, 1.0)
}

fn adjust_texel(c: [f32; 4], tex_type: TexType) -> [f32; 4] {
    match tex_type {
        TexType::Premultiplied => c,
        TexType::Straight => [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]],
        TexType::Alpha => [c[0]; 4],
    }
}

fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    std::array::from_fn(|i| a[i] * b[i])
}

fn scale(a: [f32; 4], s: f32) -> [f32; 4] {
    a.map(|v| v * s)
}
