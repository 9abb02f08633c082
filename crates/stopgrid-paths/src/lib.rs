//! Pathfinding for small, dynamically changing tile grids.
//!
//! - **A\*** shortest-path search ([`PathRange::astar_path`]) driven by an
//!   [`IndexedHeap`] whose items carry their own heap position, giving O(1)
//!   membership checks and in-place priority updates.
//! - Distance metrics for 4-way ([`manhattan`]) and 8-way ([`octile`])
//!   movement.
//!
//! # Trait hierarchy
//!
//! | Trait | Provides |
//! |---|---|
//! | [`Pather`] | neighbour enumeration and passability |
//! | [`WeightedPather`] : [`Pather`] | step cost |
//! | [`AstarPather`] : [`WeightedPather`] | admissible heuristic |

mod astar;
mod distance;
mod heap;
mod pathrange;
mod traits;

pub use distance::{DIAGONAL_COST, STRAIGHT_COST, manhattan, octile};
pub use heap::{HeapItem, IndexedHeap, NOT_IN_HEAP};
pub use pathrange::{PathRange, SearchNode, UNREACHABLE};
pub use traits::{AstarPather, Pather, WeightedPather};
