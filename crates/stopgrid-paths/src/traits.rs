use stopgrid_core::Point;

/// Minimal pathfinding interface: neighbour enumeration and passability.
pub trait Pather {
    /// Append neighbours of `p` into `buf`. The caller clears `buf` before
    /// calling. Implementations need not filter out impassable points; the
    /// search asks [`passable`](Self::passable) separately.
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>);

    /// Whether a search may step onto `p`.
    fn passable(&self, _p: Point) -> bool {
        true
    }
}

/// Pather with weighted (non-negative) edges.
pub trait WeightedPather: Pather {
    /// Cost of moving from `from` to adjacent `to`. Must be >= 0.
    fn cost(&self, from: Point, to: Point) -> i32;
}

/// Full A* pather with an admissible heuristic.
pub trait AstarPather: WeightedPather {
    /// Heuristic estimate of distance from `from` to `to`.
    /// Must never overestimate the true cost (admissible).
    fn estimate(&self, from: Point, to: Point) -> i32;
}
