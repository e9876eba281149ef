//! Frame-scoped growable arenas
//!
//! Calls, paths, vertices and uniforms are appended into arenas that grow by
//! 1.5x when full and are cleared (not freed) after every flush, so a steady
//! frame loop stops allocating after the first few frames.

use std::ops::Range;

#[derive(Debug, Clone)]
pub struct FrameArena<T> {
    items: Vec<T>,
    label: &'static str,
}

impl<T> FrameArena<T> {
    pub fn with_capacity(label: &'static str, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            label,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Make room for `additional` items using 1.5x growth
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.items.len() + additional;
        let cap = self.items.capacity();
        if needed <= cap {
            return;
        }
        let target = needed.max(cap + cap / 2).max(4);
        tracing::trace!(arena = self.label, from = cap, to = target, "arena grow");
        self.items.reserve_exact(target - self.items.len());
    }

    /// Append one item and return its index
    pub fn push(&mut self, item: T) -> usize {
        self.reserve(1);
        self.items.push(item);
        self.items.len() - 1
    }

    /// Append a run of items and return its index range
    pub fn extend<I>(&mut self, items: I) -> Range<usize>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = items.into_iter();
        self.reserve(iter.len());
        let start = self.items.len();
        self.items.extend(iter);
        start..self.items.len()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, range: Range<usize>) -> &[T] {
        &self.items[range]
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Reset the length to zero, keeping the allocation
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Copy> FrameArena<T> {
    pub fn extend_from_slice(&mut self, items: &[T]) -> Range<usize> {
        self.reserve(items.len());
        let start = self.items.len();
        self.items.extend_from_slice(items);
        start..self.items.len()
    }
}

impl<T> std::ops::Index<usize> for FrameArena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
