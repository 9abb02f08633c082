//! Tile and world-space path queries on top of [`PathRange`].

use log::warn;
use stopgrid_core::Vec3;
use stopgrid_paths::PathRange;

use crate::grid::{Grid, TileId};

/// A* over a [`Grid`].
///
/// Paths are returned without the start tile: every element is a step the
/// mover still has to take. Asking for the tile you are on yields that tile
/// alone.
pub struct Pathfinder {
    range: PathRange,
}

impl Pathfinder {
    pub fn new(grid: &Grid) -> Self {
        Self {
            range: PathRange::new(grid.range()),
        }
    }

    /// Shortest tile path from `from` to `to`, or `None` if `to` is
    /// unreachable.
    pub fn find_tile_path(&mut self, grid: &Grid, from: TileId, to: TileId) -> Option<Vec<TileId>> {
        if self.range.range() != grid.range() {
            self.range.set_range(grid.range());
        }
        if from == to {
            return grid.tile(to).map(|t| vec![t.id]);
        }
        let points = self
            .range
            .astar_path(grid, grid.point_of(from), grid.point_of(to))?;
        Some(
            points
                .into_iter()
                .skip(1)
                .filter_map(|p| grid.id_of(p))
                .collect(),
        )
    }

    /// Waypoints (tile centres) from the tile under `start` to the tile
    /// under `target`.
    pub fn find_path(&mut self, grid: &Grid, start: Vec3, target: Vec3) -> Option<Vec<Vec3>> {
        let Some(from) = grid.tile_at(start) else {
            warn!("path query from {start}, which is off the board");
            return None;
        };
        let Some(to) = grid.tile_at(target) else {
            warn!("path query to {target}, which is off the board");
            return None;
        };
        let tiles = self.find_tile_path(grid, from, to)?;
        Some(tiles.into_iter().map(|t| grid.center(t)).collect())
    }
}

/// Cost of walking `path` starting from `from`, under the grid's current
/// metric.
pub fn path_cost(grid: &Grid, from: TileId, path: &[TileId]) -> i32 {
    let mut prev = from;
    let mut total = 0;
    for &t in path {
        total += grid.distance(prev, t);
        prev = t;
    }
    total
}
