//! Per-frame draw call batching
//!
//! Calls, path ranges, vertices and uniforms accumulate in frame arenas.
//! [`Batcher::flush`] replays them in insertion order against a
//! [`RenderSurface`]:
//!
//! - `ConvexFill`: interior fan and fringe strip in one colour pass
//! - `Fill`: stencil winding pass, fringe where the stencil is zero, then a
//!   bounding quad covering non-zero stencil which also clears it
//! - `Stroke`: opaque body where the stencil is zero (incrementing it), the
//!   antialiased edge where it is still zero, then a stencil clear
//! - `Triangles`: textured triangles in one colour pass
//!
//! Fans and strips are expanded into triangle lists at submission.

use std::ops::Range;

use slotmap::SecondaryMap;
use smallvec::SmallVec;
use stipple_paint::{ImageId, Paint};
use stipple_text::{DirtyRect, GlyphAtlas};

use crate::arena::FrameArena;
use crate::config::ArenaCapacity;
use crate::primitives::{FragUniform, ShaderType, TexType, Vertex};
use crate::surface::{PassState, RenderSurface, TextureFormat, TextureId, TextureUpload, Viewport};
use crate::tessellator::Tessellation;
use crate::uniforms::{convert_paint, Scissor};
use crate::Result;

/// Lifecycle of a frame's batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Accumulating,
    Flushing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Fill,
    ConvexFill,
    Stroke,
    Triangles,
}

/// Texture sampled by a call
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CallTexture {
    None,
    Image(ImageId),
    /// Glyph atlas as it was when the texture coordinates were computed
    Atlas { generation: u64, width: u32, height: u32 },
}

#[derive(Clone, Debug)]
struct Call {
    kind: CallKind,
    paths: Range<usize>,
    /// Bounding quad for `Fill`, the vertices for `Triangles`
    triangles: Range<usize>,
    uniform: usize,
    uniform_count: usize,
    texture: CallTexture,
}

#[derive(Clone, Debug)]
struct PathRange {
    fill: Range<usize>,
    stroke: Range<usize>,
}

/// Image texture work applied at the next flush
#[derive(Clone, Debug)]
pub enum ImageOp {
    Create {
        image: ImageId,
        format: TextureFormat,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    Update {
        image: ImageId,
        pixels: Vec<u8>,
    },
    Delete {
        image: ImageId,
    },
}

/// Counters for one flush
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Calls replayed
    pub calls: usize,
    /// Calls skipped because their texture was gone or stale
    pub dropped: usize,
    pub draws: usize,
    pub vertices: usize,
    pub uploads: usize,
}

#[derive(Clone, Copy, Debug)]
struct SurfaceTexture {
    id: TextureId,
    format: TextureFormat,
    width: u32,
    height: u32,
}

/// Frame batcher bound to one surface's textures
pub struct Batcher {
    calls: FrameArena<Call>,
    paths: FrameArena<PathRange>,
    vertices: FrameArena<Vertex>,
    uniforms: FrameArena<FragUniform>,
    state: BatchState,
    stencil_strokes: bool,
    viewport: Viewport,
    image_ops: Vec<ImageOp>,
    textures: SecondaryMap<ImageId, SurfaceTexture>,
    atlas_texture: Option<SurfaceTexture>,
    scratch: Vec<Vertex>,
}

impl Batcher {
    pub fn new(capacity: &ArenaCapacity, stencil_strokes: bool) -> Self {
        Self {
            calls: FrameArena::with_capacity("calls", capacity.calls),
            paths: FrameArena::with_capacity("paths", capacity.paths),
            vertices: FrameArena::with_capacity("vertices", capacity.vertices),
            uniforms: FrameArena::with_capacity("uniforms", capacity.uniforms),
            state: BatchState::Idle,
            stencil_strokes,
            viewport: Viewport::default(),
            image_ops: Vec::new(),
            textures: SecondaryMap::new(),
            atlas_texture: None,
            scratch: Vec::with_capacity(capacity.vertices),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn call_kinds(&self) -> impl Iterator<Item = CallKind> + '_ {
        self.calls.as_slice().iter().map(|c| c.kind)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn uniforms(&self) -> &[FragUniform] {
        self.uniforms.as_slice()
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn queue_image_op(&mut self, op: ImageOp) {
        self.image_ops.push(op);
    }

    fn begin_call(&mut self) {
        if self.state == BatchState::Idle {
            tracing::trace!("batch accumulating");
            self.state = BatchState::Accumulating;
        }
    }

    fn paint_texture(paint: &Paint) -> CallTexture {
        paint.image.map_or(CallTexture::None, CallTexture::Image)
    }

    /// Record a fill of the tessellated paths
    pub fn render_fill(
        &mut self,
        paint: &Paint,
        tex_type: TexType,
        scissor: &Scissor,
        fringe: f32,
        tess: &Tessellation<'_>,
    ) {
        if tess.paths.is_empty() {
            return;
        }
        self.begin_call();

        let kind = if tess.convex {
            CallKind::ConvexFill
        } else {
            CallKind::Fill
        };

        let paths_start = self.paths.len();
        for path in tess.paths {
            let fill = self.vertices.extend_from_slice(tess.fill_vertices(path));
            let stroke = self.vertices.extend_from_slice(tess.stroke_vertices(path));
            self.paths.push(PathRange { fill, stroke });
        }
        let paths = paths_start..self.paths.len();

        let (triangles, uniform, uniform_count) = if kind == CallKind::Fill {
            let b = tess.bounds;
            let (x0, y0, x1, y1) = (b.x, b.y, b.max_x(), b.max_y());
            let quad = [
                Vertex::new(x1, y1, 0.5, 1.0),
                Vertex::new(x1, y0, 0.5, 1.0),
                Vertex::new(x0, y1, 0.5, 1.0),
                Vertex::new(x0, y0, 0.5, 1.0),
            ];
            let triangles = self.vertices.extend_from_slice(&quad);
            let uniform = self.uniforms.push(FragUniform::simple());
            self.uniforms
                .push(convert_paint(paint, scissor, fringe, fringe, -1.0, tex_type));
            (triangles, uniform, 2)
        } else {
            let end = self.vertices.len();
            let uniform = self
                .uniforms
                .push(convert_paint(paint, scissor, fringe, fringe, -1.0, tex_type));
            (end..end, uniform, 1)
        };

        self.calls.push(Call {
            kind,
            paths,
            triangles,
            uniform,
            uniform_count,
            texture: Self::paint_texture(paint),
        });
    }

    /// Record a stroke of the tessellated paths
    pub fn render_stroke(
        &mut self,
        paint: &Paint,
        tex_type: TexType,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        tess: &Tessellation<'_>,
    ) {
        if tess.paths.is_empty() {
            return;
        }
        self.begin_call();

        let paths_start = self.paths.len();
        for path in tess.paths {
            let stroke = self.vertices.extend_from_slice(tess.stroke_vertices(path));
            let end = stroke.start;
            self.paths.push(PathRange {
                fill: end..end,
                stroke,
            });
        }
        let paths = paths_start..self.paths.len();

        let uniform = self.uniforms.push(convert_paint(
            paint,
            scissor,
            stroke_width,
            fringe,
            -1.0,
            tex_type,
        ));
        let uniform_count = if self.stencil_strokes {
            self.uniforms.push(convert_paint(
                paint,
                scissor,
                stroke_width,
                fringe,
                1.0 - 0.5 / 255.0,
                tex_type,
            ));
            2
        } else {
            1
        };

        let end = self.vertices.len();
        self.calls.push(Call {
            kind: CallKind::Stroke,
            paths,
            triangles: end..end,
            uniform,
            uniform_count,
            texture: Self::paint_texture(paint),
        });
    }

    /// Record a textured triangle list
    #[allow(clippy::too_many_arguments)]
    pub fn render_triangles(
        &mut self,
        paint: &Paint,
        tex_type: TexType,
        scissor: &Scissor,
        fringe: f32,
        vertices: &[Vertex],
        texture: CallTexture,
    ) {
        if vertices.is_empty() {
            return;
        }
        self.begin_call();

        let triangles = self.vertices.extend_from_slice(vertices);
        let mut frag = convert_paint(paint, scissor, 1.0, fringe, -1.0, tex_type);
        frag.shader_type = ShaderType::Image as u32;
        frag.tex_type = tex_type as u32;
        let uniform = self.uniforms.push(frag);

        let start = self.paths.len();
        self.calls.push(Call {
            kind: CallKind::Triangles,
            paths: start..start,
            triangles,
            uniform,
            uniform_count: 1,
            texture,
        });
    }

    /// Discard every recorded call without drawing
    pub fn cancel(&mut self) {
        if self.state == BatchState::Accumulating {
            tracing::trace!(calls = self.calls.len(), "batch cancelled");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.calls.clear();
        self.paths.clear();
        self.vertices.clear();
        self.uniforms.clear();
        self.state = BatchState::Idle;
    }

    /// Upload pending textures, replay every call in order and reset the arenas
    pub fn flush<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, atlas: &mut GlyphAtlas) -> Result<FlushStats> {
        self.state = BatchState::Flushing;
        let result = self.submit(surface, atlas);
        self.reset();
        result
    }

    fn submit<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, atlas: &mut GlyphAtlas) -> Result<FlushStats> {
        let mut stats = FlushStats::default();
        surface.begin_frame(self.viewport)?;

        let deferred = self.apply_image_ops(surface, &mut stats);
        self.upload_atlas(surface, atlas, &mut stats);

        let Self {
            calls,
            paths,
            vertices,
            uniforms,
            textures,
            atlas_texture,
            scratch,
            ..
        } = self;
        let mut pass = PassTracker::default();
        let (atlas_w, atlas_h) = atlas.dimensions();

        for call in calls.as_slice() {
            let texture = match call.texture {
                CallTexture::None => None,
                CallTexture::Image(image) => match textures.get(image) {
                    Some(t) => Some(t.id),
                    None => {
                        tracing::warn!(?image, "dropping call for unknown image");
                        stats.dropped += 1;
                        continue;
                    }
                },
                CallTexture::Atlas { generation, .. } => match atlas_texture {
                    Some(t) if generation == atlas.generation() => Some(t.id),
                    _ => {
                        tracing::debug!(generation, current = atlas.generation(), "dropping stale text call");
                        stats.dropped += 1;
                        continue;
                    }
                },
            };
            let call_paths = paths.get(call.paths.clone());
            let verts = vertices.as_slice();
            let u = call.uniform;
            stats.calls += 1;

            match call.kind {
                CallKind::ConvexFill => {
                    scratch.clear();
                    for p in call_paths {
                        fan_to_list(&verts[p.fill.clone()], scratch);
                        strip_to_list(&verts[p.stroke.clone()], scratch);
                    }
                    pass.set(surface, PassState::COLOR);
                    surface.set_uniforms(&uniforms[u], texture);
                    draw(surface, scratch, &mut stats);
                }
                CallKind::Fill => {
                    scratch.clear();
                    for p in call_paths {
                        fan_to_list(&verts[p.fill.clone()], scratch);
                    }
                    pass.set(surface, PassState::STENCIL_WINDING);
                    surface.set_uniforms(&uniforms[u], None);
                    draw(surface, scratch, &mut stats);

                    scratch.clear();
                    for p in call_paths {
                        strip_to_list(&verts[p.stroke.clone()], scratch);
                    }
                    pass.set(surface, PassState::FRINGE);
                    surface.set_uniforms(&uniforms[u + 1], texture);
                    draw(surface, scratch, &mut stats);

                    scratch.clear();
                    strip_to_list(&verts[call.triangles.clone()], scratch);
                    pass.set(surface, PassState::COVER);
                    draw(surface, scratch, &mut stats);
                }
                CallKind::Stroke => {
                    scratch.clear();
                    for p in call_paths {
                        strip_to_list(&verts[p.stroke.clone()], scratch);
                    }
                    if call.uniform_count == 2 {
                        pass.set(surface, PassState::STROKE_BASE);
                        surface.set_uniforms(&uniforms[u + 1], texture);
                        draw(surface, scratch, &mut stats);

                        pass.set(surface, PassState::STROKE_AA);
                        surface.set_uniforms(&uniforms[u], texture);
                        draw(surface, scratch, &mut stats);

                        pass.set(surface, PassState::STROKE_CLEAR);
                        draw(surface, scratch, &mut stats);
                    } else {
                        pass.set(surface, PassState::COLOR);
                        surface.set_uniforms(&uniforms[u], texture);
                        draw(surface, scratch, &mut stats);
                    }
                }
                CallKind::Triangles => {
                    scratch.clear();
                    scratch.extend_from_slice(&verts[call.triangles.clone()]);
                    if let CallTexture::Atlas { width, height, .. } = call.texture {
                        // the atlas grew since these coordinates were computed
                        if (width, height) != (atlas_w, atlas_h) {
                            let su = width as f32 / atlas_w as f32;
                            let sv = height as f32 / atlas_h as f32;
                            for v in scratch.iter_mut() {
                                v.uv[0] *= su;
                                v.uv[1] *= sv;
                            }
                        }
                    }
                    pass.set(surface, PassState::COLOR);
                    surface.set_uniforms(&uniforms[u], texture);
                    draw(surface, scratch, &mut stats);
                }
            }
        }

        for image in deferred {
            if let Some(t) = self.textures.remove(image) {
                surface.delete_texture(t.id);
            }
        }

        surface.end_frame()?;
        tracing::trace!(
            calls = stats.calls,
            dropped = stats.dropped,
            draws = stats.draws,
            vertices = stats.vertices,
            "batch flushed"
        );
        Ok(stats)
    }

    /// Create and update image textures; deletions are returned for after the replay
    fn apply_image_ops<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        stats: &mut FlushStats,
    ) -> SmallVec<[ImageId; 4]> {
        let mut deferred = SmallVec::new();
        let mut ops = std::mem::take(&mut self.image_ops);
        for op in ops.drain(..) {
            match op {
                ImageOp::Create {
                    image,
                    format,
                    width,
                    height,
                    pixels,
                } => {
                    if let Some(old) = self.textures.remove(image) {
                        surface.delete_texture(old.id);
                    }
                    let id = match surface.create_texture(format, width, height) {
                        Ok(id) => id,
                        Err(e) => {
                            tracing::warn!(?image, "failed to create image texture: {}", e);
                            continue;
                        }
                    };
                    let texture = SurfaceTexture {
                        id,
                        format,
                        width,
                        height,
                    };
                    self.textures.insert(image, texture);
                    if upload_full(surface, &texture, &pixels) {
                        stats.uploads += 1;
                    }
                }
                ImageOp::Update { image, pixels } => match self.textures.get(image) {
                    Some(texture) => {
                        if upload_full(surface, texture, &pixels) {
                            stats.uploads += 1;
                        }
                    }
                    None => tracing::warn!(?image, "update for unknown image"),
                },
                ImageOp::Delete { image } => deferred.push(image),
            }
        }
        self.image_ops = ops;
        deferred
    }

    /// Upload the atlas dirty rectangle, at most once per flush
    fn upload_atlas<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, atlas: &mut GlyphAtlas, stats: &mut FlushStats) {
        let (width, height) = atlas.dimensions();
        let texture = match self.atlas_texture {
            Some(t) => t,
            None if !atlas.is_dirty() => return,
            None => match surface.create_texture(TextureFormat::Alpha8, width, height) {
                Ok(id) => {
                    // size 0 forces a full upload below
                    let t = SurfaceTexture {
                        id,
                        format: TextureFormat::Alpha8,
                        width: 0,
                        height: 0,
                    };
                    self.atlas_texture = Some(t);
                    t
                }
                Err(e) => {
                    tracing::warn!("failed to create glyph atlas texture: {}", e);
                    return;
                }
            },
        };

        let resized = (texture.width, texture.height) != (width, height);
        let rect = if resized {
            Some(DirtyRect {
                x0: 0,
                y0: 0,
                x1: width,
                y1: height,
            })
        } else {
            atlas.dirty_rect()
        };
        let Some(rect) = rect else {
            return;
        };

        let upload = TextureUpload {
            width,
            height,
            rect,
            pixels: atlas.pixels(),
        };
        match surface.update_texture(texture.id, upload) {
            Ok(()) => {
                atlas.mark_clean();
                self.atlas_texture = Some(SurfaceTexture {
                    width,
                    height,
                    ..texture
                });
                stats.uploads += 1;
            }
            Err(e) => tracing::warn!("glyph atlas upload failed, keeping dirty region: {}", e),
        }
    }
}

fn upload_full<S: RenderSurface + ?Sized>(surface: &mut S, texture: &SurfaceTexture, pixels: &[u8]) -> bool {
    let upload = TextureUpload {
        width: texture.width,
        height: texture.height,
        rect: DirtyRect {
            x0: 0,
            y0: 0,
            x1: texture.width,
            y1: texture.height,
        },
        pixels,
    };
    match surface.update_texture(texture.id, upload) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(format = ?texture.format, "image upload failed: {}", e);
            false
        }
    }
}

/// Skips redundant pass changes
#[derive(Default)]
struct PassTracker {
    current: Option<PassState>,
}

impl PassTracker {
    fn set<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, pass: PassState) {
        if self.current != Some(pass) {
            surface.set_pass(pass);
            self.current = Some(pass);
        }
    }
}

fn draw<S: RenderSurface + ?Sized>(surface: &mut S, list: &[Vertex], stats: &mut FlushStats) {
    if list.is_empty() {
        return;
    }
    surface.draw(list);
    stats.draws += 1;
    stats.vertices += list.len();
}

fn fan_to_list(src: &[Vertex], out: &mut Vec<Vertex>) {
    if src.len() < 3 {
        return;
    }
    for i in 1..src.len() - 1 {
        out.extend_from_slice(&[src[0], src[i], src[i + 1]]);
    }
}

fn strip_to_list(src: &[Vertex], out: &mut Vec<Vertex>) {
    if src.len() < 3 {
        return;
    }
    for i in 0..src.len() - 2 {
        // keep a consistent orientation across the strip
        if i % 2 == 0 {
            out.extend_from_slice(&[src[i], src[i + 1], src[i + 2]]);
        } else {
            out.extend_from_slice(&[src[i + 1], src[i], src[i + 2]]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordedCall, RecordingSurface};
    use crate::tessellator::PathTessellator;
    use slotmap::SlotMap;
    use stipple_paint::{Color, PathBuilder, StrokeStyle, Transform2D};

    fn batcher(stencil_strokes: bool) -> Batcher {
        Batcher::new(&ArenaCapacity::default(), stencil_strokes)
    }

    fn fill(b: &mut Batcher, tess: &mut PathTessellator, path: &stipple_paint::Path, color: Color) {
        let t = tess.fill(path, &Transform2D::identity(), true).unwrap();
        b.render_fill(&Paint::color(color), TexType::Premultiplied, &Scissor::NONE, 1.0, &t);
    }

    #[test]
    fn test_convex_fill_single_pass() {
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let rect = PathBuilder::new().rect(0.0, 0.0, 10.0, 10.0).build();
        fill(&mut b, &mut tess, &rect, Color::RED);
        assert_eq!(b.call_kinds().collect::<Vec<_>>(), vec![CallKind::ConvexFill]);
        assert_eq!(b.uniforms().len(), 1);
        assert_eq!(b.state(), BatchState::Accumulating);

        let mut surface = RecordingSurface::new();
        let mut atlas = GlyphAtlas::new(16, 16);
        let stats = b.flush(&mut surface, &mut atlas).unwrap();
        assert_eq!(surface.passes().collect::<Vec<_>>(), vec![PassState::COLOR]);
        // fan of 4 -> 2 triangles, closed fringe strip of 10 -> 8 triangles
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.vertices, 6 + 24);
        assert_eq!(b.state(), BatchState::Idle);
        assert_eq!(b.call_count(), 0);
    }

    #[test]
    fn test_general_fill_uses_three_stencil_passes() {
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let two = PathBuilder::new()
            .rect(0.0, 0.0, 10.0, 10.0)
            .rect(5.0, 5.0, 10.0, 10.0)
            .build();
        fill(&mut b, &mut tess, &two, Color::BLUE);
        assert_eq!(b.call_kinds().collect::<Vec<_>>(), vec![CallKind::Fill]);
        assert_eq!(b.uniforms()[0].shader(), ShaderType::Simple);
        assert_eq!(b.uniforms()[0].stroke_thr, -1.0);
        assert_eq!(b.uniforms()[1].shader(), ShaderType::FillGradient);

        let mut surface = RecordingSurface::new();
        b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(
            surface.passes().collect::<Vec<_>>(),
            vec![PassState::STENCIL_WINDING, PassState::FRINGE, PassState::COVER]
        );
        // bounding quad covers the union of both rectangles
        let cover = surface.draws().last().unwrap();
        assert_eq!(cover.len(), 6);
        let max_x = cover.iter().map(|v| v.pos[0]).fold(f32::MIN, f32::max);
        assert_eq!(max_x, 15.0);
    }

    #[test]
    fn test_stencil_stroke_passes_and_thresholds() {
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let line = PathBuilder::new().move_to(0.0, 0.0).line_to(20.0, 0.0).build();
        let t = tess
            .stroke(&line, &Transform2D::identity(), &StrokeStyle::new(4.0), true)
            .unwrap();
        b.render_stroke(&Paint::color(Color::BLACK), TexType::Premultiplied, &Scissor::NONE, 1.0, 4.0, &t);
        assert_eq!(b.uniforms().len(), 2);
        assert_eq!(b.uniforms()[0].stroke_thr, -1.0);
        assert_eq!(b.uniforms()[1].stroke_thr, 1.0 - 0.5 / 255.0);

        let mut surface = RecordingSurface::new();
        b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(
            surface.passes().collect::<Vec<_>>(),
            vec![PassState::STROKE_BASE, PassState::STROKE_AA, PassState::STROKE_CLEAR]
        );
        assert_eq!(surface.draws().count(), 3);
    }

    #[test]
    fn test_plain_stroke_single_pass() {
        let mut b = batcher(false);
        let mut tess = PathTessellator::default();
        let line = PathBuilder::new().move_to(0.0, 0.0).line_to(20.0, 0.0).build();
        let t = tess
            .stroke(&line, &Transform2D::identity(), &StrokeStyle::new(2.0), true)
            .unwrap();
        b.render_stroke(&Paint::color(Color::BLACK), TexType::Premultiplied, &Scissor::NONE, 1.0, 2.0, &t);
        assert_eq!(b.uniforms().len(), 1);
        let mut surface = RecordingSurface::new();
        b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(surface.passes().collect::<Vec<_>>(), vec![PassState::COLOR]);
    }

    #[test]
    fn test_calls_replay_in_insertion_order() {
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let rect = PathBuilder::new().rect(0.0, 0.0, 10.0, 10.0).build();
        for color in [Color::RED, Color::GREEN, Color::BLUE] {
            fill(&mut b, &mut tess, &rect, color);
        }
        let mut surface = RecordingSurface::new();
        b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        let colors: Vec<[f32; 4]> = surface
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::SetUniforms { uniforms, .. } => Some(uniforms.inner_color),
                _ => None,
            })
            .collect();
        assert_eq!(
            colors,
            vec![
                Color::RED.to_array(),
                Color::GREEN.to_array(),
                Color::BLUE.to_array()
            ]
        );
        // the colour pass is bound once for all three
        assert_eq!(surface.passes().count(), 1);
        assert!(matches!(surface.calls.first(), Some(RecordedCall::BeginFrame(_))));
        assert!(matches!(surface.calls.last(), Some(RecordedCall::EndFrame)));
    }

    #[test]
    fn test_cancel_discards_calls() {
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let rect = PathBuilder::new().rect(0.0, 0.0, 10.0, 10.0).build();
        fill(&mut b, &mut tess, &rect, Color::RED);
        fill(&mut b, &mut tess, &rect, Color::RED);
        let capacity = b.vertex_capacity();
        b.cancel();
        assert_eq!(b.state(), BatchState::Idle);
        assert_eq!(b.call_count(), 0);
        assert_eq!(b.vertex_capacity(), capacity);

        fill(&mut b, &mut tess, &rect, Color::GREEN);
        let mut surface = RecordingSurface::new();
        let stats = b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(stats.calls, 1);
        assert!(surface.calls.iter().all(|c| match c {
            RecordedCall::SetUniforms { uniforms, .. } => uniforms.inner_color == Color::GREEN.to_array(),
            _ => true,
        }));
    }

    #[test]
    fn test_unknown_image_call_is_dropped() {
        let mut images: SlotMap<ImageId, ()> = SlotMap::with_key();
        let id = images.insert(());
        let mut b = batcher(true);
        let mut tess = PathTessellator::default();
        let rect = PathBuilder::new().rect(0.0, 0.0, 10.0, 10.0).build();
        let t = tess.fill(&rect, &Transform2D::identity(), true).unwrap();
        let paint = Paint::image_pattern(0.0, 0.0, 10.0, 10.0, 0.0, id, 1.0);
        b.render_fill(&paint, TexType::Straight, &Scissor::NONE, 1.0, &t);

        let mut surface = RecordingSurface::new();
        let stats = b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(surface.draws().count(), 0);
    }

    #[test]
    fn test_image_ops_create_then_delete_after_replay() {
        let mut images: SlotMap<ImageId, ()> = SlotMap::with_key();
        let id = images.insert(());
        let mut b = batcher(true);
        b.queue_image_op(ImageOp::Create {
            image: id,
            format: TextureFormat::Rgba8,
            width: 2,
            height: 2,
            pixels: vec![255; 16],
        });
        let mut tess = PathTessellator::default();
        let rect = PathBuilder::new().rect(0.0, 0.0, 10.0, 10.0).build();
        let t = tess.fill(&rect, &Transform2D::identity(), true).unwrap();
        let paint = Paint::image_pattern(0.0, 0.0, 10.0, 10.0, 0.0, id, 1.0);
        b.render_fill(&paint, TexType::Straight, &Scissor::NONE, 1.0, &t);
        b.queue_image_op(ImageOp::Delete { image: id });

        let mut surface = RecordingSurface::new();
        let stats = b.flush(&mut surface, &mut GlyphAtlas::new(16, 16)).unwrap();
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.uploads, 1);
        let calls = &surface.calls;
        let created = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::CreateTexture { .. }))
            .unwrap();
        let drawn = calls.iter().position(|c| matches!(c, RecordedCall::Draw(_))).unwrap();
        let deleted = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::DeleteTexture(_)))
            .unwrap();
        assert!(created < drawn && drawn < deleted);
    }

    fn text_vertices() -> Vec<Vertex> {
        vec![
            Vertex::new(0.0, 0.0, 0.25, 0.25),
            Vertex::new(8.0, 0.0, 0.5, 0.25),
            Vertex::new(0.0, 8.0, 0.25, 0.5),
        ]
    }

    #[test]
    fn test_atlas_upload_once_and_only_when_dirty() {
        let mut atlas = GlyphAtlas::new(16, 16);
        atlas.mark_dirty(DirtyRect {
            x0: 2,
            y0: 2,
            x1: 6,
            y1: 6,
        });
        atlas.mark_dirty(DirtyRect {
            x0: 8,
            y0: 1,
            x1: 10,
            y1: 4,
        });
        let mut b = batcher(true);
        let mut surface = RecordingSurface::new();
        b.flush(&mut surface, &mut atlas).unwrap();
        // first upload covers the whole texture it just created
        let uploads: Vec<_> = surface.uploads().collect();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1.width(), 16);
        assert!(!atlas.is_dirty());

        atlas.mark_dirty(DirtyRect {
            x0: 2,
            y0: 2,
            x1: 6,
            y1: 6,
        });
        atlas.mark_dirty(DirtyRect {
            x0: 8,
            y0: 1,
            x1: 10,
            y1: 4,
        });
        surface.clear();
        b.flush(&mut surface, &mut atlas).unwrap();
        let uploads: Vec<_> = surface.uploads().collect();
        assert_eq!(
            uploads.iter().map(|u| u.1).collect::<Vec<_>>(),
            vec![DirtyRect {
                x0: 2,
                y0: 1,
                x1: 10,
                y1: 6
            }]
        );

        surface.clear();
        b.flush(&mut surface, &mut atlas).unwrap();
        assert_eq!(surface.uploads().count(), 0);
    }

    #[test]
    fn test_failed_upload_keeps_dirty_rect() {
        let mut atlas = GlyphAtlas::new(16, 16);
        atlas.mark_dirty(DirtyRect {
            x0: 0,
            y0: 0,
            x1: 4,
            y1: 4,
        });
        let mut b = batcher(true);
        let mut surface = RecordingSurface::new();
        surface.fail_uploads = true;
        b.flush(&mut surface, &mut atlas).unwrap();
        assert!(atlas.is_dirty());

        surface.fail_uploads = false;
        b.flush(&mut surface, &mut atlas).unwrap();
        assert!(!atlas.is_dirty());
        assert_eq!(surface.uploads().count(), 1);
    }

    #[test]
    fn test_stale_atlas_calls_are_skipped_and_grown_atlas_rescaled() {
        let mut atlas = GlyphAtlas::new(16, 16);
        atlas.mark_dirty(DirtyRect {
            x0: 0,
            y0: 0,
            x1: 16,
            y1: 16,
        });
        let mut b = batcher(true);
        let white = Paint::color(Color::WHITE);
        let recorded = CallTexture::Atlas {
            generation: atlas.generation(),
            width: 16,
            height: 16,
        };

        // grown: coordinates shrink by half
        b.render_triangles(&white, TexType::Alpha, &Scissor::NONE, 1.0, &text_vertices(), recorded);
        atlas.expand(32, 32);
        let mut surface = RecordingSurface::new();
        let stats = b.flush(&mut surface, &mut atlas).unwrap();
        assert_eq!(stats.dropped, 0);
        let drawn = surface.draws().next().unwrap();
        assert_eq!(drawn[1].uv, [0.25, 0.125]);

        // reset: the call refers to glyphs that no longer exist
        let stale = CallTexture::Atlas {
            generation: atlas.generation(),
            width: 32,
            height: 32,
        };
        b.render_triangles(&white, TexType::Alpha, &Scissor::NONE, 1.0, &text_vertices(), stale);
        atlas.reset(32, 32);
        surface.clear();
        let stats = b.flush(&mut surface, &mut atlas).unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(surface.draws().count(), 0);
    }

    #[test]
    fn test_triangles_use_image_shader() {
        let mut b = batcher(true);
        let recorded = CallTexture::Atlas {
            generation: 0,
            width: 16,
            height: 16,
        };
        b.render_triangles(
            &Paint::color(Color::WHITE),
            TexType::Alpha,
            &Scissor::NONE,
            1.0,
            &text_vertices(),
            recorded,
        );
        assert_eq!(b.uniforms()[0].shader(), ShaderType::Image);
        assert_eq!(b.uniforms()[0].texture_type(), TexType::Alpha);
        assert_eq!(b.call_kinds().next(), Some(CallKind::Triangles));
    }

    #[test]
    fn test_strip_and_fan_expansion() {
        let v: Vec<Vertex> = (0..5).map(|i| Vertex::new(i as f32, 0.0, 0.0, 0.0)).collect();
        let mut out = Vec::new();
        fan_to_list(&v, &mut out);
        assert_eq!(out.len(), 9);
        assert_eq!(out[3].pos[0], 0.0);
        out.clear();
        strip_to_list(&v, &mut out);
        assert_eq!(out.len(), 9);
        let xs: Vec<f32> = out.iter().map(|v| v.pos[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 2.0, 1.0, 3.0, 2.0, 3.0, 4.0]);
    }
}
