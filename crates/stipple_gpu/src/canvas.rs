//! Immediate-mode drawing context
//!
//! [`Canvas`] owns the tessellator, batcher, glyph cache and style stack for
//! one render surface. Drawing calls are recorded until [`Canvas::flush`]
//! replays them; nothing here fails the host, so tessellation and shaping
//! problems are logged and the affected call is skipped.

use slotmap::SlotMap;
use smallvec::SmallVec;
use stipple_paint::{Color, ImageId, LineCap, LineJoin, Paint, Path, Point, Rect, StrokeStyle, Transform2D, Winding};
use stipple_text::{
    break_lines, AtlasFullAction, FontId, GlyphCache, HAlign, TextBounds, TextError, TextShaper, TextStyle,
    VerticalMetrics,
};

use crate::batcher::{Batcher, CallTexture, FlushStats, ImageOp};
use crate::config::{log_renderer_config, RendererConfig};
use crate::primitives::{TexType, Vertex};
use crate::surface::{RenderSurface, TextureFormat, Viewport};
use crate::tessellator::{PathTessellator, TessParams};
use crate::uniforms::Scissor;
use crate::{BatchError, ConfigError, Result};

/// Maximum depth of the render state stack, current state included
pub const MAX_RENDER_STATES: usize = 32;

/// Largest font scale applied from the current transform
const MAX_FONT_SCALE: f32 = 4.0;

/// Drawing state saved by [`Canvas::save`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub xform: Transform2D,
    pub scissor: Scissor,
    pub fill: Paint,
    pub stroke: Paint,
    pub stroke_width: f32,
    pub miter_limit: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub alpha: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            xform: Transform2D::identity(),
            scissor: Scissor::NONE,
            fill: Paint::color(Color::WHITE),
            stroke: Paint::color(Color::BLACK),
            stroke_width: 1.0,
            miter_limit: 10.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageInfo {
    width: u32,
    height: u32,
    tex_type: TexType,
}

fn quantize(a: f32, d: f32) -> f32 {
    (a / d + 0.5).floor() * d
}

/// Next atlas size when the glyph atlas is full: double the smaller side
fn grown_atlas_size(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    let grow_w = width < max_width;
    let grow_h = height < max_height;
    if grow_w && (width <= height || !grow_h) {
        Some(((width * 2).min(max_width), height))
    } else if grow_h {
        Some((width, (height * 2).min(max_height)))
    } else {
        None
    }
}

pub struct Canvas {
    config: RendererConfig,
    state: RenderState,
    saved: SmallVec<[RenderState; 8]>,
    path: Path,
    tessellator: PathTessellator,
    batcher: Batcher,
    cache: GlyphCache,
    shaper: TextShaper,
    styles: stipple_text::StyleStack,
    images: SlotMap<ImageId, ImageInfo>,
    viewport: Viewport,
    text_vertices: Vec<Vertex>,
}

impl Canvas {
    pub fn new(config: RendererConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        log_renderer_config(&config);

        let dpr = config.device_pixel_ratio;
        let tessellator = PathTessellator::new(
            TessParams::new(dpr),
            config.scratch.max_path_points,
            config.scratch.max_path_vertices,
        );
        let batcher = Batcher::new(&config.initial_capacity, config.stencil_strokes);

        let atlas = config.atlas.clone();
        let mut cache = GlyphCache::new(atlas.initial_width, atlas.initial_height);
        cache.set_atlas_full_handler(move |width, height| {
            match grown_atlas_size(width, height, atlas.max_width, atlas.max_height) {
                Some((w, h)) => {
                    tracing::debug!(width, height, w, h, "growing glyph atlas");
                    AtlasFullAction::Expand { width: w, height: h }
                }
                None => {
                    tracing::warn!(width, height, "glyph atlas at maximum size, resetting");
                    AtlasFullAction::Reset
                }
            }
        });

        Ok(Self {
            shaper: TextShaper::new(config.scratch.max_text_quads),
            config,
            state: RenderState::default(),
            saved: SmallVec::new(),
            path: Path::new(),
            tessellator,
            batcher,
            cache,
            styles: stipple_text::StyleStack::new(),
            images: SlotMap::with_key(),
            viewport: Viewport {
                width: 0.0,
                height: 0.0,
                device_pixel_ratio: dpr,
            },
            text_vertices: Vec::new(),
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Start a frame of `width` x `height` logical units
    ///
    /// Resets the render state and text style stacks. Calls recorded but not
    /// yet flushed are kept.
    pub fn begin_frame(&mut self, width: f32, height: f32, device_pixel_ratio: f32) {
        let dpr = if device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            tracing::warn!(device_pixel_ratio, "invalid device pixel ratio, using 1.0");
            1.0
        };
        self.viewport = Viewport {
            width,
            height,
            device_pixel_ratio: dpr,
        };
        self.batcher.set_viewport(self.viewport);
        self.tessellator.set_params(TessParams::new(dpr));
        self.state = RenderState::default();
        self.saved.clear();
        self.styles.reset();
        self.path.clear();
    }

    /// Replay every recorded call on `surface` and reset the frame arenas
    pub fn flush<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> Result<FlushStats> {
        self.batcher.flush(surface, self.cache.atlas_mut())
    }

    /// Drop every recorded call; queued image uploads survive
    pub fn cancel(&mut self) {
        self.batcher.cancel();
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    fn fringe(&self) -> f32 {
        self.tessellator.params().fringe_width
    }

    // State stack

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn save(&mut self) -> Result<()> {
        if self.saved.len() + 1 >= MAX_RENDER_STATES {
            tracing::warn!(depth = MAX_RENDER_STATES, "render state stack overflow");
            return Err(BatchError::StateStackOverflow);
        }
        self.saved.push(self.state);
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        match self.saved.pop() {
            Some(state) => {
                self.state = state;
                Ok(())
            }
            None => {
                tracing::warn!("render state stack underflow");
                Err(BatchError::StateStackUnderflow)
            }
        }
    }

    /// Reset the current state to defaults
    pub fn reset(&mut self) {
        self.state = RenderState::default();
    }

    // Transforms

    /// Apply `t` before the current transform
    pub fn transform(&mut self, t: &Transform2D) {
        self.state.xform = self.state.xform.pre_multiply(t);
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transform(&Transform2D::translate(x, y));
    }

    pub fn rotate(&mut self, angle: f32) {
        self.transform(&Transform2D::rotate(angle));
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.transform(&Transform2D::scale(x, y));
    }

    pub fn reset_transform(&mut self) {
        self.state.xform = Transform2D::identity();
    }

    // Paint and stroke style

    pub fn set_fill_color(&mut self, color: Color) {
        self.state.fill = Paint::color(color);
    }

    /// Use `paint`, interpreted in the current coordinate system
    pub fn set_fill_paint(&mut self, paint: Paint) {
        self.state.fill = paint.transformed(&self.state.xform);
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.state.stroke = Paint::color(color);
    }

    pub fn set_stroke_paint(&mut self, paint: Paint) {
        self.state.stroke = paint.transformed(&self.state.xform);
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.state.stroke_width = width;
    }

    pub fn set_miter_limit(&mut self, limit: f32) {
        self.state.miter_limit = limit;
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha;
    }

    // Scissoring

    /// Clip to a rectangle in the current coordinate system
    pub fn scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let w = w.max(0.0);
        let h = h.max(0.0);
        self.state.scissor = Scissor {
            xform: Transform2D::translate(x + w * 0.5, y + h * 0.5).then(&self.state.xform),
            extent: [w * 0.5, h * 0.5],
        };
    }

    /// Clip to the intersection of the current scissor and a rectangle
    ///
    /// The current scissor is approximated by its axis-aligned bounds in the
    /// current coordinate system.
    pub fn intersect_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        if !self.state.scissor.is_enabled() {
            self.scissor(x, y, w, h);
            return;
        }
        let inv = self.state.xform.inverse().unwrap_or_else(Transform2D::identity);
        let p = self.state.scissor.xform.then(&inv);
        let [ex, ey] = self.state.scissor.extent;
        let tex = ex * p.a.abs() + ey * p.c.abs();
        let tey = ex * p.b.abs() + ey * p.d.abs();
        let current = Rect::new(p.e - tex, p.f - tey, tex * 2.0, tey * 2.0);
        let r = current.intersect(&Rect::new(x, y, w, h));
        self.scissor(r.x, r.y, r.width, r.height);
    }

    pub fn reset_scissor(&mut self) {
        self.state.scissor = Scissor::NONE;
    }

    // Path building

    pub fn begin_path(&mut self) {
        self.path.clear();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to(x, y);
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.path.quad_to(cx, cy, x, y);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.path.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        self.path.arc(cx, cy, r, a0, a1, dir);
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        self.path.arc_to(x1, y1, x2, y2, radius);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.path.rect(x, y, w, h);
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        self.path.rounded_rect(x, y, w, h, r);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        self.path.ellipse(cx, cy, rx, ry);
    }

    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) {
        self.path.circle(cx, cy, r);
    }

    pub fn close_path(&mut self) {
        self.path.close();
    }

    pub fn path_winding(&mut self, winding: Winding) {
        self.path.set_winding(winding);
    }

    fn tex_type_for(&self, paint: &Paint) -> TexType {
        paint
            .image
            .and_then(|id| self.images.get(id))
            .map_or(TexType::Premultiplied, |info| info.tex_type)
    }

    /// Fill the current path with the fill paint
    pub fn fill(&mut self) {
        let paint = self.state.fill.faded(self.state.alpha);
        let tex_type = self.tex_type_for(&paint);
        let fringe = self.fringe();
        let scissor = self.state.scissor;
        match self.tessellator.fill(&self.path, &self.state.xform, self.config.antialias) {
            Ok(tess) => self.batcher.render_fill(&paint, tex_type, &scissor, fringe, &tess),
            Err(e) => tracing::debug!("fill skipped: {}", e),
        }
    }

    /// Stroke the current path with the stroke paint
    pub fn stroke(&mut self) {
        let state = self.state;
        let fringe = self.fringe();
        let scale = state.xform.average_scale();
        let mut width = (state.stroke_width * scale).clamp(0.0, 200.0);
        let mut paint = state.stroke;
        if width < fringe {
            // thin lines: draw at the fringe width with coverage folded into alpha
            let alpha = (width / fringe).clamp(0.0, 1.0);
            paint = paint.faded(alpha * alpha);
            width = fringe;
        }
        let paint = paint.faded(state.alpha);
        let tex_type = self.tex_type_for(&paint);
        let style = StrokeStyle::new(width)
            .with_cap(state.line_cap)
            .with_join(state.line_join)
            .with_miter_limit(state.miter_limit);
        match self
            .tessellator
            .stroke(&self.path, &state.xform, &style, self.config.antialias)
        {
            Ok(tess) => self
                .batcher
                .render_stroke(&paint, tex_type, &state.scissor, fringe, width, &tess),
            Err(e) => tracing::debug!("stroke skipped: {}", e),
        }
    }

    // Text

    pub fn load_font(&mut self, name: &str, data: Vec<u8>) -> FontId {
        self.cache.load_font(name, data)
    }

    pub fn find_font(&self, name: &str) -> Option<FontId> {
        self.cache.registry().find_font(name)
    }

    pub fn add_fallback_font(&mut self, base: FontId, fallback: FontId) -> Result<()> {
        self.cache.registry_mut().add_fallback(base, fallback)?;
        Ok(())
    }

    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut GlyphCache {
        &mut self.cache
    }

    pub fn text_style(&self) -> &TextStyle {
        self.styles.current()
    }

    pub fn text_style_mut(&mut self) -> &mut TextStyle {
        self.styles.current_mut()
    }

    pub fn set_font(&mut self, font: FontId) {
        self.styles.current_mut().font = Some(font);
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.styles.current_mut().size = size;
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.styles.current_mut().color = color;
    }

    pub fn set_text_align(&mut self, align: stipple_text::TextAlign) {
        self.styles.current_mut().align = align;
    }

    pub fn push_text_style(&mut self) -> Result<()> {
        self.styles.push().map_err(|e| {
            tracing::warn!("text style push failed: {}", e);
            BatchError::from(e)
        })
    }

    pub fn pop_text_style(&mut self) -> Result<()> {
        self.styles.pop().map_err(|e| {
            tracing::warn!("text style pop failed: {}", e);
            BatchError::from(e)
        })
    }

    /// Device pixels per unit of text under the current transform
    fn font_scale(&self) -> f32 {
        quantize(self.state.xform.average_scale(), 0.01).min(MAX_FONT_SCALE) * self.viewport.device_pixel_ratio
    }

    /// A collapsed transform leaves nothing to measure or draw
    fn degenerate_scale(scale: f32) -> bool {
        scale <= 0.0 || !scale.is_finite()
    }

    fn scaled_style(style: &TextStyle, scale: f32) -> TextStyle {
        TextStyle {
            size: style.size * scale,
            blur: style.blur * scale,
            spacing: style.spacing * scale,
            ..*style
        }
    }

    /// Draw `text` with its pen origin at (`x`, `y`); returns the pen position after it
    pub fn text(&mut self, x: f32, y: f32, text: &str) -> f32 {
        let style = *self.styles.current();
        self.draw_text(&style, x, y, text)
    }

    fn draw_text(&mut self, style: &TextStyle, x: f32, y: f32, text: &str) -> f32 {
        if style.font.is_none() || text.is_empty() {
            return x;
        }
        let scale = self.font_scale();
        if Self::degenerate_scale(scale) {
            return x;
        }
        let inv = 1.0 / scale;
        let scaled = Self::scaled_style(style, scale);
        let run = match self.shaper.shape(&mut self.cache, &scaled, x * scale, y * scale, text) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!("text skipped: {}", e);
                return x;
            }
        };
        if run.dropped > 0 {
            tracing::debug!(dropped = run.dropped, "text run exceeded the quad limit");
        }

        let xform = self.state.xform;
        let color = style.color.fade(self.state.alpha);
        let corner = |px: f32, py: f32| xform.apply(Point::new(px * inv, py * inv));
        self.text_vertices.clear();
        for q in &run.quads {
            let tl = corner(q.x0, q.y0);
            let tr = corner(q.x1, q.y0);
            let br = corner(q.x1, q.y1);
            let bl = corner(q.x0, q.y1);
            let v = |p: Point, s: f32, t: f32| Vertex::new(p.x, p.y, s, t).with_color(color);
            self.text_vertices.extend_from_slice(&[
                v(tl, q.s0, q.t0),
                v(br, q.s1, q.t1),
                v(tr, q.s1, q.t0),
                v(tl, q.s0, q.t0),
                v(bl, q.s0, q.t1),
                v(br, q.s1, q.t1),
            ]);
        }

        let texture = CallTexture::Atlas {
            generation: run.atlas_generation,
            width: run.atlas_size.0,
            height: run.atlas_size.1,
        };
        let fringe = self.fringe();
        self.batcher.render_triangles(
            &Paint::color(Color::WHITE),
            TexType::Alpha,
            &self.state.scissor,
            fringe,
            &self.text_vertices,
            texture,
        );
        x + run.advance * inv
    }

    /// Advance and bounds of `text` drawn at (`x`, `y`), in the current coordinate system
    pub fn text_bounds(&mut self, x: f32, y: f32, text: &str) -> Result<TextBounds> {
        let scale = self.font_scale();
        if Self::degenerate_scale(scale) {
            return Ok(TextBounds {
                advance: 0.0,
                bounds: Rect::new(x, y, 0.0, 0.0),
            });
        }
        let inv = 1.0 / scale;
        let scaled = Self::scaled_style(self.styles.current(), scale);
        let m = self.shaper.measure(&mut self.cache, &scaled, x * scale, y * scale, text)?;
        let b = m.bounds;
        Ok(TextBounds {
            advance: m.advance * inv,
            bounds: Rect::from_bounds(b.x * inv, b.y * inv, b.max_x() * inv, b.max_y() * inv),
        })
    }

    /// Ascender, descender and line height of the current text style
    pub fn text_metrics(&self) -> Result<VerticalMetrics> {
        let scale = self.font_scale();
        if Self::degenerate_scale(scale) {
            return Ok(VerticalMetrics {
                ascender: 0.0,
                descender: 0.0,
                line_height: 0.0,
            });
        }
        let inv = 1.0 / scale;
        let m = self
            .shaper
            .vertical_metrics(&self.cache, &Self::scaled_style(self.styles.current(), scale))?;
        Ok(VerticalMetrics {
            ascender: m.ascender * inv,
            descender: m.descender * inv,
            line_height: m.line_height * inv,
        })
    }

    /// Draw `text` wrapped to `break_width`, one row per line height
    ///
    /// Horizontal alignment positions each row inside the box. Returns the y
    /// coordinate below the last row.
    pub fn text_box(&mut self, x: f32, y: f32, break_width: f32, text: &str) -> Result<f32> {
        let style = *self.styles.current();
        if style.font.is_none() {
            return Err(TextError::UnknownFont(u32::MAX).into());
        }
        let scale = self.font_scale();
        if Self::degenerate_scale(scale) {
            return Ok(y);
        }
        let inv = 1.0 / scale;
        let scaled = Self::scaled_style(&style, scale);
        let rows = break_lines(&self.shaper, &mut self.cache, &scaled, text, break_width * scale)?;
        let line_height = self.shaper.vertical_metrics(&self.cache, &scaled)?.line_height * inv;

        let mut row_style = style;
        row_style.align.horizontal = HAlign::Left;
        let mut y = y;
        for row in rows {
            let width = row.width * inv;
            let rx = match style.align.horizontal {
                HAlign::Left => x,
                HAlign::Center => x + break_width * 0.5 - width * 0.5,
                HAlign::Right => x + break_width - width,
            };
            let line = text.get(row.start..row.end).unwrap_or_default();
            self.draw_text(&row_style, rx, y, line);
            y += line_height;
        }
        Ok(y)
    }

    // Images

    /// Register an RGBA8 image; the texture is created at the next flush
    pub fn create_image(&mut self, width: u32, height: u32, pixels: &[u8], premultiplied: bool) -> Result<ImageId> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(BatchError::ImageSize);
        }
        let tex_type = if premultiplied {
            TexType::Premultiplied
        } else {
            TexType::Straight
        };
        let image = self.images.insert(ImageInfo {
            width,
            height,
            tex_type,
        });
        self.batcher.queue_image_op(ImageOp::Create {
            image,
            format: TextureFormat::Rgba8,
            width,
            height,
            pixels: pixels.to_vec(),
        });
        Ok(image)
    }

    /// Replace every pixel of an image
    pub fn update_image(&mut self, image: ImageId, pixels: &[u8]) -> Result<()> {
        let info = self.images.get(image).ok_or(BatchError::UnknownImage)?;
        if pixels.len() != info.width as usize * info.height as usize * 4 {
            return Err(BatchError::ImageSize);
        }
        self.batcher.queue_image_op(ImageOp::Update {
            image,
            pixels: pixels.to_vec(),
        });
        Ok(())
    }

    /// Forget an image; its texture is released after the next flush draws
    pub fn delete_image(&mut self, image: ImageId) -> Result<()> {
        self.images.remove(image).ok_or(BatchError::UnknownImage)?;
        self.batcher.queue_image_op(ImageOp::Delete { image });
        Ok(())
    }

    pub fn image_size(&self, image: ImageId) -> Option<(u32, u32)> {
        self.images.get(image).map(|i| (i.width, i.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::CallKind;
    use crate::surface::RecordingSurface;
    use stipple_test_fonts::{FontBuilder, GlyphDef};

    fn canvas() -> Canvas {
        let mut c = Canvas::new(RendererConfig::default()).unwrap();
        c.begin_frame(100.0, 100.0, 1.0);
        c
    }

    #[test]
    fn test_state_stack_bounds() {
        let mut c = canvas();
        for _ in 0..MAX_RENDER_STATES - 1 {
            c.save().unwrap();
        }
        assert_eq!(c.save(), Err(BatchError::StateStackOverflow));
        for _ in 0..MAX_RENDER_STATES - 1 {
            c.restore().unwrap();
        }
        assert_eq!(c.restore(), Err(BatchError::StateStackUnderflow));
    }

    #[test]
    fn test_restore_brings_back_state() {
        let mut c = canvas();
        c.set_stroke_width(3.0);
        c.save().unwrap();
        c.set_stroke_width(7.0);
        c.translate(5.0, 0.0);
        c.restore().unwrap();
        assert_eq!(c.state().stroke_width, 3.0);
        assert!(c.state().xform.is_identity());
    }

    #[test]
    fn test_transforms_apply_in_call_order() {
        let mut c = canvas();
        c.translate(10.0, 0.0);
        c.scale(2.0, 2.0);
        let p = c.state().xform.apply(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn test_fill_records_in_device_space() {
        let mut c = canvas();
        c.translate(10.0, 20.0);
        c.begin_path();
        c.rect(0.0, 0.0, 5.0, 5.0);
        c.fill();
        assert_eq!(c.batcher().call_kinds().collect::<Vec<_>>(), vec![CallKind::ConvexFill]);

        let mut surface = RecordingSurface::new();
        c.flush(&mut surface).unwrap();
        let draw = surface.draws().next().unwrap();
        let min_x = draw.iter().map(|v| v.pos[0]).fold(f32::MAX, f32::min);
        let min_y = draw.iter().map(|v| v.pos[1]).fold(f32::MAX, f32::min);
        assert_eq!((min_x, min_y), (9.5, 19.5));
    }

    #[test]
    fn test_thin_stroke_fades_alpha() {
        let mut c = canvas();
        c.set_stroke_color(Color::BLACK);
        c.set_stroke_width(0.5);
        c.begin_path();
        c.move_to(0.0, 0.0);
        c.line_to(10.0, 0.0);
        c.stroke();
        let u = c.batcher().uniforms()[0];
        assert!((u.inner_color[3] - 0.25).abs() < 1e-6);
        assert_eq!(u.stroke_mult, 1.0);
    }

    #[test]
    fn test_global_alpha_applies_to_fill() {
        let mut c = canvas();
        c.set_fill_color(Color::WHITE);
        c.set_global_alpha(0.5);
        c.begin_path();
        c.rect(0.0, 0.0, 5.0, 5.0);
        c.fill();
        assert_eq!(c.batcher().uniforms()[0].inner_color, [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_intersect_scissor() {
        let mut c = canvas();
        c.scissor(0.0, 0.0, 10.0, 10.0);
        c.intersect_scissor(5.0, 5.0, 10.0, 10.0);
        let s = c.state().scissor;
        assert_eq!(s.extent, [2.5, 2.5]);
        assert_eq!(s.xform.apply(Point::ZERO), Point::new(7.5, 7.5));
        c.reset_scissor();
        assert!(!c.state().scissor.is_enabled());
    }

    #[test]
    fn test_cancel_drops_calls() {
        let mut c = canvas();
        c.begin_path();
        c.circle(10.0, 10.0, 5.0);
        c.fill();
        c.cancel();
        assert_eq!(c.batcher().call_count(), 0);
    }

    #[test]
    fn test_image_lifecycle() {
        let mut c = canvas();
        assert_eq!(c.create_image(2, 2, &[0; 3], false), Err(BatchError::ImageSize));
        let id = c.create_image(2, 2, &[255; 16], false).unwrap();
        assert_eq!(c.image_size(id), Some((2, 2)));
        assert_eq!(c.update_image(id, &[0; 4]), Err(BatchError::ImageSize));
        c.delete_image(id).unwrap();
        assert_eq!(c.delete_image(id), Err(BatchError::UnknownImage));
        assert_eq!(c.image_size(id), None);
    }

    #[test]
    fn test_atlas_growth_policy() {
        assert_eq!(grown_atlas_size(512, 512, 4096, 4096), Some((1024, 512)));
        assert_eq!(grown_atlas_size(1024, 512, 4096, 4096), Some((1024, 1024)));
        assert_eq!(grown_atlas_size(4096, 2048, 4096, 4096), Some((4096, 4096)));
        assert_eq!(grown_atlas_size(3000, 4096, 4096, 4096), Some((4096, 4096)));
        assert_eq!(grown_atlas_size(4096, 4096, 4096, 4096), None);
    }

    #[test]
    fn test_collapsed_transform_gives_empty_text_metrics() {
        let mut c = canvas();
        let mut b = FontBuilder::new(1000).metrics(800, -200, 0);
        let g = b.add_glyph(GlyphDef::rect(600, 0, 0, 500, 700));
        b.map('A', g);
        let font = c.load_font("block", b.build());
        c.set_font(font);
        c.set_font_size(20.0);
        c.scale(0.0, 0.0);

        let m = c.text_bounds(10.0, 20.0, "AA").unwrap();
        assert_eq!(m.advance, 0.0);
        assert_eq!(m.bounds, Rect::new(10.0, 20.0, 0.0, 0.0));
        let v = c.text_metrics().unwrap();
        assert_eq!((v.ascender, v.descender, v.line_height), (0.0, 0.0, 0.0));
        assert_eq!(c.text_box(0.0, 20.0, 50.0, "AA AA").unwrap(), 20.0);
        assert_eq!(c.text(10.0, 20.0, "AA"), 10.0);
        assert_eq!(c.batcher().call_count(), 0);
    }

    #[test]
    fn test_text_without_font_is_a_no_op() {
        let mut c = canvas();
        assert_eq!(c.text(5.0, 5.0, "hello"), 5.0);
        assert_eq!(c.batcher().call_count(), 0);
        assert!(c.text_box(0.0, 0.0, 100.0, "hello").is_err());
    }
}
