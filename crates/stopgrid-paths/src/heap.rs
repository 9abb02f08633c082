//! Indexed binary min-heap.
//!
//! Unlike [`std::collections::BinaryHeap`], every queued item knows its own
//! position in the heap. That makes membership an O(1) check and lets a
//! search lower an item's priority in place instead of pushing a duplicate.
//!
//! The heap does not own its items. It stores ids into a caller-owned arena
//! (`&[T]` / `&mut [T]`), and writes each item's position back through
//! [`HeapItem::set_heap_index`] on every move.

use std::marker::PhantomData;

/// Heap index of an item that is not queued.
pub const NOT_IN_HEAP: usize = usize::MAX;

/// An item that can live in an [`IndexedHeap`].
///
/// `Ord` defines priority: the item that compares [`Less`](std::cmp::Ordering::Less)
/// is extracted first.
pub trait HeapItem: Ord {
    /// Position of this item in the heap, or [`NOT_IN_HEAP`].
    fn heap_index(&self) -> usize;

    /// Record a new heap position for this item.
    fn set_heap_index(&mut self, index: usize);
}

/// A binary min-heap of arena ids with embedded positions.
///
/// Invariant: for every queued id, `arena[id].heap_index()` equals the slot
/// holding `id`. Every mutation keeps this in sync; [`check_invariant`]
/// verifies it, and debug builds run it after each mutation.
///
/// [`check_invariant`]: Self::check_invariant
#[derive(Debug)]
pub struct IndexedHeap<T> {
    slots: Vec<usize>,
    marker: PhantomData<fn(&T)>,
}

impl<T: HeapItem> Default for IndexedHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HeapItem> IndexedHeap<T> {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty heap able to hold `capacity` ids without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            marker: PhantomData,
        }
    }

    /// Number of queued items.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no item is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Id of the minimum item, without removing it.
    #[inline]
    pub fn peek(&self) -> Option<usize> {
        self.slots.first().copied()
    }

    /// Whether `id` is queued. O(1): looks only at the slot the item claims
    /// to occupy.
    #[inline]
    pub fn contains(&self, arena: &[T], id: usize) -> bool {
        self.slots.get(arena[id].heap_index()) == Some(&id)
    }

    /// Queue `id` and restore heap order upward. O(log n).
    ///
    /// # Panics
    ///
    /// If `id` is already queued.
    pub fn insert(&mut self, arena: &mut [T], id: usize) {
        assert!(!self.contains(arena, id), "item {id} is already queued");
        let index = self.slots.len();
        self.slots.push(id);
        arena[id].set_heap_index(index);
        self.sift_up(arena, index);
        debug_assert!(self.check_invariant(arena), "heap index out of sync");
    }

    /// Remove and return the minimum item. O(log n).
    ///
    /// Returns `None` on an empty heap.
    pub fn extract_min(&mut self, arena: &mut [T]) -> Option<usize> {
        let last = self.slots.pop()?;
        let first = if self.slots.is_empty() {
            last
        } else {
            let first = std::mem::replace(&mut self.slots[0], last);
            arena[last].set_heap_index(0);
            self.sift_down(arena, 0);
            first
        };
        arena[first].set_heap_index(NOT_IN_HEAP);
        debug_assert!(self.check_invariant(arena), "heap index out of sync");
        Some(first)
    }

    /// Restore heap order after the priority of `id` was raised (its key
    /// lowered). Only sifts upward.
    ///
    /// # Panics
    ///
    /// If `id` is not queued.
    pub fn update_priority(&mut self, arena: &mut [T], id: usize) {
        assert!(self.contains(arena, id), "item {id} is not queued");
        let index = arena[id].heap_index();
        self.sift_up(arena, index);
        debug_assert!(self.check_invariant(arena), "heap index out of sync");
    }

    /// Drop every queued item, marking each as [`NOT_IN_HEAP`].
    pub fn clear(&mut self, arena: &mut [T]) {
        for &id in &self.slots {
            arena[id].set_heap_index(NOT_IN_HEAP);
        }
        self.slots.clear();
    }

    /// Verify index synchronisation and heap order.
    pub fn check_invariant(&self, arena: &[T]) -> bool {
        self.slots.iter().enumerate().all(|(i, &id)| {
            let synced = arena[id].heap_index() == i;
            let ordered = i == 0 || arena[self.slots[(i - 1) / 2]] <= arena[id];
            synced && ordered
        })
    }

    fn sift_up(&mut self, arena: &mut [T], mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if arena[self.slots[index]] < arena[self.slots[parent]] {
                self.swap(arena, index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, arena: &mut [T], mut index: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && arena[self.slots[right]] < arena[self.slots[left]] {
                child = right;
            }
            if arena[self.slots[child]] < arena[self.slots[index]] {
                self.swap(arena, index, child);
                index = child;
            } else {
                break;
            }
        }
    }

    fn swap(&mut self, arena: &mut [T], a: usize, b: usize) {
        self.slots.swap(a, b);
        arena[self.slots[a]].set_heap_index(a);
        arena[self.slots[b]].set_heap_index(b);
    }
}
