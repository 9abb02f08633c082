use std::cmp::Ordering;

use stopgrid_core::{Point, Range};

use crate::heap::{HeapItem, IndexedHeap, NOT_IN_HEAP};

/// Sentinel cost meaning "not reached".
pub const UNREACHABLE: i32 = i32::MAX;

// ---------------------------------------------------------------------------
// Search node
// ---------------------------------------------------------------------------

/// Per-search annotation of one grid cell.
///
/// Ordered by `(f, h)` ascending: among equal totals the node closer to the
/// target is expanded first.
#[derive(Clone, Debug)]
pub struct SearchNode {
    /// Cost from the search start.
    pub g: i32,
    /// Heuristic estimate to the target.
    pub h: i32,
    /// Flat index of the predecessor, `usize::MAX` for the start node.
    pub parent: usize,
    /// Whether the node has been expanded.
    pub closed: bool,
    heap_index: usize,
}

impl SearchNode {
    /// Total estimated cost through this node.
    #[inline]
    pub fn f(&self) -> i32 {
        self.g.saturating_add(self.h)
    }
}

impl Default for SearchNode {
    fn default() -> Self {
        Self {
            g: UNREACHABLE,
            h: 0,
            parent: usize::MAX,
            closed: false,
            heap_index: NOT_IN_HEAP,
        }
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f().cmp(&other.f()).then(self.h.cmp(&other.h))
    }
}

impl HeapItem for SearchNode {
    #[inline]
    fn heap_index(&self) -> usize {
        self.heap_index
    }

    #[inline]
    fn set_heap_index(&mut self, index: usize) {
        self.heap_index = index;
    }
}

// ---------------------------------------------------------------------------
// PathRange
// ---------------------------------------------------------------------------

/// Owner of the search state for one grid rectangle.
///
/// The node table and open set are allocated once and reused, but every
/// search starts by resetting them, so no annotation survives from one query
/// to the next.
pub struct PathRange {
    pub(crate) rng: Range,
    pub(crate) width: usize,
    pub(crate) nodes: Vec<SearchNode>,
    pub(crate) open: IndexedHeap<SearchNode>,
    // shared scratch buffer for neighbour queries
    pub(crate) nbuf: Vec<Point>,
}

impl PathRange {
    /// Create a new `PathRange` for the given grid rectangle.
    pub fn new(rng: Range) -> Self {
        let len = rng.len();
        Self {
            rng,
            width: rng.width().max(0) as usize,
            nodes: vec![SearchNode::default(); len],
            open: IndexedHeap::with_capacity(len),
            nbuf: Vec::with_capacity(8),
        }
    }

    /// Replace the underlying range, reallocating the node table if it grew.
    pub fn set_range(&mut self, rng: Range) {
        self.rng = rng;
        self.width = rng.width().max(0) as usize;
        self.open.clear(&mut self.nodes);
        if rng.len() > self.nodes.len() {
            self.nodes.resize(rng.len(), SearchNode::default());
        }
        self.reset();
    }

    /// The grid rectangle being searched.
    #[inline]
    pub fn range(&self) -> Range {
        self.rng
    }

    /// Annotation left on `p` by the last search, if `p` is in range.
    pub fn node(&self, p: Point) -> Option<&SearchNode> {
        self.idx(p).map(|i| &self.nodes[i])
    }

    /// Clear every annotation and the open set.
    pub(crate) fn reset(&mut self) {
        self.open.clear(&mut self.nodes);
        self.nodes.fill(SearchNode::default());
    }

    // -----------------------------------------------------------------------
    // Coordinate helpers
    // -----------------------------------------------------------------------

    /// Convert a `Point` to a flat index. Returns `None` if out of range.
    #[inline]
    pub(crate) fn idx(&self, p: Point) -> Option<usize> {
        if !self.rng.contains(p) {
            return None;
        }
        let x = (p.x - self.rng.min.x) as usize;
        let y = (p.y - self.rng.min.y) as usize;
        Some(y * self.width + x)
    }

    /// Convert a flat index back to a `Point`.
    #[inline]
    pub(crate) fn point(&self, idx: usize) -> Point {
        let x = (idx % self.width) as i32 + self.rng.min.x;
        let y = (idx / self.width) as i32 + self.rng.min.y;
        Point::new(x, y)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PathRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rng.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PathRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let range = Range::deserialize(deserializer)?;
        Ok(PathRange::new(range))
    }
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn pathrange_round_trip() {
        let rng = Range::new(1, 2, 10, 20);
        let pr = PathRange::new(rng);
        let json = serde_json::to_string(&pr).unwrap();
        let back: PathRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back.range(), rng);
        assert_eq!(back.nodes.len(), rng.len());
    }
}
