//! Glyph atlas
//!
//! [`AtlasAllocator`] packs rectangles with a bottom-left skyline heuristic;
//! [`GlyphAtlas`] pairs it with the 8-bit coverage texture it describes, a
//! dirty rectangle for uploads and a generation counter bumped on reset.

use crate::{Result, TextError};

/// One skyline segment: everything in `[x, x + width)` is occupied below `y`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasNode {
    pub x: i32,
    pub y: i32,
    pub width: i32,
}

/// Placement returned by the allocator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bottom-left skyline rectangle packer
#[derive(Clone, Debug)]
pub struct AtlasAllocator {
    width: i32,
    height: i32,
    nodes: Vec<AtlasNode>,
}

impl AtlasAllocator {
    pub fn new(width: u32, height: u32) -> Self {
        let mut atlas = Self {
            width: 0,
            height: 0,
            nodes: Vec::with_capacity(256),
        };
        atlas.reset(width, height);
        atlas
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn nodes(&self) -> &[AtlasNode] {
        &self.nodes
    }

    /// Highest occupied row
    pub fn max_y(&self) -> u32 {
        self.nodes.iter().map(|n| n.y).max().unwrap_or(0) as u32
    }

    /// Place a `w` x `h` rectangle, or report [`TextError::AtlasFull`]
    ///
    /// A zero-sized request gets an empty region and leaves the skyline as is.
    pub fn add_rect(&mut self, w: u32, h: u32) -> Result<AtlasRegion> {
        if w == 0 || h == 0 {
            return Ok(AtlasRegion {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            });
        }
        if w > self.width() || h > self.height() {
            return Err(TextError::AtlasFull);
        }
        let (w, h) = (w as i32, h as i32);
        let mut best_h = self.height;
        let mut best_w = self.width;
        let mut best: Option<(usize, i32, i32)> = None;

        for i in 0..self.nodes.len() {
            if let Some(y) = self.rect_fits(i, w, h) {
                let node = self.nodes[i];
                if y + h < best_h || (y + h == best_h && node.width < best_w) {
                    best = Some((i, node.x, y));
                    best_w = node.width;
                    best_h = y + h;
                }
            }
        }

        let Some((index, x, y)) = best else {
            return Err(TextError::AtlasFull);
        };
        self.add_skyline_level(index, x, y, w, h);
        Ok(AtlasRegion {
            x: x as u32,
            y: y as u32,
            width: w as u32,
            height: h as u32,
        })
    }

    /// Grow the packing area, keeping every existing placement
    pub fn expand(&mut self, width: u32, height: u32) {
        let (width, height) = (clamp_extent(width), clamp_extent(height));
        if width > self.width {
            self.nodes.push(AtlasNode {
                x: self.width,
                y: 0,
                width: width - self.width,
            });
            self.width = width;
        }
        self.height = self.height.max(height);
    }

    /// Forget all placements and start over at the given size
    pub fn reset(&mut self, width: u32, height: u32) {
        self.width = clamp_extent(width);
        self.height = clamp_extent(height);
        self.nodes.clear();
        self.nodes.push(AtlasNode {
            x: 0,
            y: 0,
            width: self.width,
        });
    }

    /// Lowest y at which a `w` x `h` rectangle can rest starting at node `i`
    fn rect_fits(&self, mut i: usize, w: i32, h: i32) -> Option<i32> {
        let x = self.nodes[i].x;
        let mut y = self.nodes[i].y;
        if x + w > self.width {
            return None;
        }
        let mut space_left = w;
        while space_left > 0 {
            let node = self.nodes.get(i)?;
            y = y.max(node.y);
            if y + h > self.height {
                return None;
            }
            space_left -= node.width;
            i += 1;
        }
        Some(y)
    }

    fn add_skyline_level(&mut self, index: usize, x: i32, y: i32, w: i32, h: i32) {
        self.nodes.insert(
            index,
            AtlasNode {
                x,
                y: y + h,
                width: w,
            },
        );

        // shrink or drop the nodes now shadowed by the new one
        let i = index + 1;
        while i < self.nodes.len() {
            let prev = self.nodes[i - 1];
            let prev_right = prev.x + prev.width;
            let node = &mut self.nodes[i];
            if node.x >= prev_right {
                break;
            }
            let shrink = prev_right - node.x;
            node.x += shrink;
            node.width -= shrink;
            if node.width <= 0 {
                self.nodes.remove(i);
            } else {
                break;
            }
        }

        // merge same-height neighbours
        let mut i = 0;
        while i + 1 < self.nodes.len() {
            if self.nodes[i].y == self.nodes[i + 1].y {
                self.nodes[i].width += self.nodes[i + 1].width;
                self.nodes.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}

fn clamp_extent(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Rectangle in texture pixels, `x1`/`y1` exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl DirtyRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn union(self, other: DirtyRect) -> DirtyRect {
        DirtyRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Glyph atlas texture (single channel coverage)
pub struct GlyphAtlas {
    allocator: AtlasAllocator,
    pixels: Vec<u8>,
    dirty: Option<DirtyRect>,
    generation: u64,
}

impl GlyphAtlas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            allocator: AtlasAllocator::new(width, height),
            pixels: vec![0; width as usize * height as usize],
            dirty: None,
            generation: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.allocator.width(), self.allocator.height())
    }

    pub fn allocator(&self) -> &AtlasAllocator {
        &self.allocator
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Incremented every time the atlas is reset
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn allocate(&mut self, width: u32, height: u32) -> Result<AtlasRegion> {
        self.allocator.add_rect(width, height)
    }

    /// Mutable view starting at the top-left of `region`, with the row stride
    pub fn region_mut(&mut self, region: &AtlasRegion) -> (&mut [u8], usize) {
        let stride = self.allocator.width() as usize;
        let start = region.y as usize * stride + region.x as usize;
        let end = (start + region.height.saturating_sub(1) as usize * stride + region.width as usize)
            .min(self.pixels.len());
        (&mut self.pixels[start.min(end)..end], stride)
    }

    pub fn mark_dirty(&mut self, rect: DirtyRect) {
        self.dirty = Some(match self.dirty {
            Some(d) => d.union(rect),
            None => rect,
        });
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn dirty_rect(&self) -> Option<DirtyRect> {
        self.dirty
    }

    /// Clear the dirty rectangle after a successful upload
    pub fn mark_clean(&mut self) {
        self.dirty = None;
    }

    /// Grow the texture, copying existing pixels into the top-left corner
    pub fn expand(&mut self, width: u32, height: u32) {
        let (old_w, old_h) = self.dimensions();
        let width = width.max(old_w);
        let height = height.max(old_h);
        if width == old_w && height == old_h {
            return;
        }
        let mut pixels = vec![0u8; width as usize * height as usize];
        for y in 0..old_h as usize {
            let src = &self.pixels[y * old_w as usize..(y + 1) * old_w as usize];
            pixels[y * width as usize..y * width as usize + old_w as usize].copy_from_slice(src);
        }
        self.pixels = pixels;
        self.allocator.expand(width, height);
        self.dirty = None;
        self.mark_dirty(DirtyRect {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        });
        tracing::debug!(old_w, old_h, width, height, "glyph atlas expanded");
    }

    /// Drop every placement and clear the texture
    pub fn reset(&mut self, width: u32, height: u32) {
        self.allocator.reset(width, height);
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, 0);
        self.generation += 1;
        self.dirty = Some(DirtyRect {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        });
        tracing::debug!(width, height, generation = self.generation, "glyph atlas reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nodes cover [0, width) contiguously
    fn assert_partition(atlas: &AtlasAllocator) {
        let mut x = 0;
        for node in atlas.nodes() {
            assert_eq!(node.x, x, "gap or overlap at {:?}", atlas.nodes());
            assert!(node.width > 0);
            assert!(node.y >= 0 && node.y <= atlas.height() as i32);
            x += node.width;
        }
        assert_eq!(x, atlas.width() as i32);
    }

    #[test]
    fn test_second_large_rect_reports_full() {
        let mut atlas = AtlasAllocator::new(64, 64);
        let first = atlas.add_rect(40, 40).unwrap();
        assert_eq!((first.x, first.y), (0, 0));
        assert_eq!(atlas.add_rect(40, 40), Err(TextError::AtlasFull));
        assert_partition(&atlas);
    }

    #[test]
    fn test_forty_by_ten_regions_stack_until_full() {
        let mut atlas = AtlasAllocator::new(64, 64);
        // the strip right of each 40 wide region is only 24 wide, so every
        // region stacks on the previous one
        for row in 0..6 {
            let r = atlas.add_rect(40, 10).unwrap();
            assert_eq!((r.x, r.y), (0, row * 10));
            assert_partition(&atlas);
        }
        assert_eq!(atlas.add_rect(40, 10), Err(TextError::AtlasFull));
        assert_partition(&atlas);

        atlas.expand(128, 64);
        let r = atlas.add_rect(40, 10).unwrap();
        assert_eq!((r.x, r.y), (40, 0));
        assert_partition(&atlas);
    }

    #[test]
    fn test_oversized_requests_leave_skyline_untouched() {
        let mut atlas = AtlasAllocator::new(64, 64);
        atlas.add_rect(10, 10).unwrap();
        let before = atlas.nodes().to_vec();
        for (w, h) in [(u32::MAX, 1), (1, u32::MAX), (65, 1), (1, 65), (i32::MAX as u32 + 1, 2)] {
            assert_eq!(atlas.add_rect(w, h), Err(TextError::AtlasFull), "{w}x{h}");
            assert_eq!(atlas.nodes(), &before[..]);
        }
        let empty = atlas.add_rect(0, 12).unwrap();
        assert_eq!((empty.width, empty.height), (0, 0));
        assert_eq!(atlas.nodes(), &before[..]);
        assert_partition(&atlas);
    }

    #[test]
    fn test_bottom_left_placement() {
        let mut atlas = AtlasAllocator::new(64, 64);
        atlas.add_rect(40, 10).unwrap();
        let second = atlas.add_rect(40, 10).unwrap();
        // too wide for the strip at x = 40, so it stacks on top
        assert_eq!((second.x, second.y), (0, 10));
        let third = atlas.add_rect(20, 5).unwrap();
        assert_eq!((third.x, third.y), (40, 0));
        assert_partition(&atlas);
    }

    #[test]
    fn test_tie_prefers_narrower_node() {
        let mut atlas = AtlasAllocator::new(100, 100);
        atlas.add_rect(30, 10).unwrap();
        atlas.add_rect(50, 20).unwrap();
        // nodes: [0,30)@10 [30,80)@20 [80,100)@0
        let r = atlas.add_rect(10, 10).unwrap();
        assert_eq!((r.x, r.y), (80, 0));
        // nodes: [0,30)@10 [30,80)@20 [80,90)@10 [90,100)@0
        // x = 0 and x = 80 both rest at y = 10; the narrower node wins
        let r = atlas.add_rect(20, 10).unwrap();
        assert_eq!((r.x, r.y), (80, 10));
        assert_partition(&atlas);
    }

    #[test]
    fn test_partition_holds_over_many_inserts() {
        let mut atlas = AtlasAllocator::new(128, 128);
        let mut seed = 7u32;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let w = 1 + (seed >> 16) % 17;
            let h = 1 + (seed >> 8) % 13;
            let _ = atlas.add_rect(w, h);
            assert_partition(&atlas);
        }
    }

    #[test]
    fn test_expand_keeps_nodes_and_adds_space() {
        let mut atlas = AtlasAllocator::new(64, 64);
        atlas.add_rect(40, 40).unwrap();
        atlas.expand(128, 128);
        assert_partition(&atlas);
        let r = atlas.add_rect(40, 40).unwrap();
        assert_eq!((r.x, r.y), (40, 0));
    }

    #[test]
    fn test_reset_clears_placements() {
        let mut atlas = AtlasAllocator::new(32, 32);
        atlas.add_rect(32, 32).unwrap();
        assert!(atlas.add_rect(1, 1).is_err());
        atlas.reset(32, 32);
        assert_eq!(atlas.nodes().len(), 1);
        assert!(atlas.add_rect(1, 1).is_ok());
    }

    #[test]
    fn test_texture_expand_preserves_pixels() {
        let mut atlas = GlyphAtlas::new(4, 4);
        let region = atlas.allocate(2, 2).unwrap();
        {
            let (pixels, stride) = atlas.region_mut(&region);
            pixels[0] = 10;
            pixels[stride + 1] = 20;
        }
        atlas.mark_clean();
        atlas.expand(8, 8);
        assert_eq!(atlas.pixels()[0], 10);
        assert_eq!(atlas.pixels()[8 + 1], 20);
        assert_eq!(
            atlas.dirty_rect(),
            Some(DirtyRect {
                x0: 0,
                y0: 0,
                x1: 8,
                y1: 8
            })
        );
        assert_eq!(atlas.generation(), 0);
    }

    #[test]
    fn test_texture_reset_bumps_generation() {
        let mut atlas = GlyphAtlas::new(4, 4);
        atlas.allocate(4, 4).unwrap();
        atlas.reset(4, 4);
        assert_eq!(atlas.generation(), 1);
        assert!(atlas.pixels().iter().all(|&p| p == 0));
        assert!(atlas.is_dirty());
    }

    #[test]
    fn test_dirty_union() {
        let mut atlas = GlyphAtlas::new(16, 16);
        atlas.mark_dirty(DirtyRect { x0: 1, y0: 1, x1: 3, y1: 3 });
        atlas.mark_dirty(DirtyRect { x0: 5, y0: 0, x1: 6, y1: 2 });
        assert_eq!(
            atlas.dirty_rect(),
            Some(DirtyRect { x0: 1, y0: 0, x1: 6, y1: 3 })
        );
        atlas.mark_clean();
        assert!(!atlas.is_dirty());
    }
}
