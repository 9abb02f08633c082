//! The tile grid: passability, stop designation, claims, and the mapping
//! between tile ids, grid points and world positions.
//!
//! Tile ids are column-major: `id = y + x * side`. World space puts grid `x`
//! on world `x` and grid `y` on world `z`; world `y` is elevation.

use stopgrid_core::{Point, Range, Vec3};
use stopgrid_paths::{AstarPather, Pather, WeightedPather, manhattan, octile};

use crate::error::PlanError;

/// Index of a tile in [`Grid::tiles`].
pub type TileId = usize;
/// Index of an agent in the simulation's agent table.
pub type AgentId = usize;

/// Movement metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Movement {
    /// 4-directional, unit step cost, Manhattan distance.
    #[default]
    Cardinal,
    /// 8-directional, fixed-point costs 10/14, octile distance.
    Octile,
}

impl Movement {
    pub fn from_diagonal(diagonal: bool) -> Self {
        if diagonal {
            Self::Octile
        } else {
            Self::Cardinal
        }
    }

    pub fn is_diagonal(self) -> bool {
        self == Self::Octile
    }

    /// Distance between two grid points under this metric.
    #[inline]
    pub fn distance(self, a: Point, b: Point) -> i32 {
        match self {
            Self::Cardinal => manhattan(a, b),
            Self::Octile => octile(a, b),
        }
    }
}

/// A cell of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    pub id: TileId,
    pub pos: Point,
    pub passable: bool,
    pub is_stop: bool,
    pub claimed_by: Option<AgentId>,
}

impl Tile {
    /// Passable and unclaimed.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.passable && self.claimed_by.is_none()
    }
}

/// A square board of tiles.
#[derive(Debug, Clone)]
pub struct Grid {
    side: i32,
    tile_size: i32,
    elevation: f32,
    movement: Movement,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Build a `side` x `side` board, every tile passable and not a stop.
    pub fn new(side: i32, tile_size: i32, elevation: f32) -> Self {
        let side = side.max(0);
        let mut tiles = Vec::with_capacity((side * side) as usize);
        for x in 0..side {
            for y in 0..side {
                tiles.push(Tile {
                    id: (y + x * side) as TileId,
                    pos: Point::new(x, y),
                    passable: true,
                    is_stop: false,
                    claimed_by: None,
                });
            }
        }
        Self {
            side,
            tile_size,
            elevation,
            movement: Movement::Cardinal,
            tiles,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[inline]
    pub fn side(&self) -> i32 {
        self.side
    }

    /// Number of tiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The board as a grid range.
    #[inline]
    pub fn range(&self) -> Range {
        Range::square(self.side)
    }

    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[inline]
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    /// Whether `id` is on the board, passable and unclaimed.
    #[inline]
    pub fn is_free(&self, id: TileId) -> bool {
        self.tile(id).is_some_and(Tile::is_free)
    }

    #[inline]
    pub fn movement(&self) -> Movement {
        self.movement
    }

    #[inline]
    pub fn set_movement(&mut self, movement: Movement) {
        self.movement = movement;
    }

    // -----------------------------------------------------------------------
    // Coordinates
    // -----------------------------------------------------------------------

    /// Tile id of a grid point, `None` off the board.
    #[inline]
    pub fn id_of(&self, p: Point) -> Option<TileId> {
        self.range()
            .contains(p)
            .then(|| (p.y + p.x * self.side) as TileId)
    }

    /// Grid point of a tile id.
    #[inline]
    pub fn point_of(&self, id: TileId) -> Point {
        let id = id as i32;
        Point::new(id / self.side, id % self.side)
    }

    fn offset(&self) -> i32 {
        self.tile_size / 2 - 1
    }

    /// World position of a tile's centre, at waypoint elevation.
    pub fn center(&self, id: TileId) -> Vec3 {
        let p = self.point_of(id);
        let offset = self.offset();
        Vec3::new(
            (p.x * self.tile_size + offset) as f32,
            self.elevation,
            (p.y * self.tile_size + offset) as f32,
        )
    }

    /// Tile under a world position, `None` off the board.
    pub fn tile_at(&self, pos: Vec3) -> Option<TileId> {
        let offset = self.offset() as f32;
        let size = self.tile_size as f32;
        let x = ((pos.x - offset) / size).round();
        let y = ((pos.z - offset) / size).round();
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.id_of(Point::new(x as i32, y as i32))
    }

    // -----------------------------------------------------------------------
    // Metric
    // -----------------------------------------------------------------------

    /// Distance between two tiles under the active metric. Serves as both
    /// step cost and A* heuristic.
    pub fn distance(&self, a: TileId, b: TileId) -> i32 {
        self.movement.distance(self.point_of(a), self.point_of(b))
    }

    /// In-bounds neighbours of a tile under the active metric. Passability
    /// is not filtered.
    pub fn neighbors(&self, id: TileId) -> Vec<TileId> {
        let mut buf = Vec::with_capacity(8);
        Pather::neighbors(self, self.point_of(id), &mut buf);
        buf.into_iter().filter_map(|p| self.id_of(p)).collect()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Set passability; returns whether it changed.
    pub fn set_passable(&mut self, id: TileId, passable: bool) -> bool {
        match self.tiles.get_mut(id) {
            Some(t) if t.passable != passable => {
                t.passable = passable;
                true
            }
            _ => false,
        }
    }

    /// Flip the stop designation; returns the new value.
    pub fn toggle_stop(&mut self, id: TileId) -> Option<bool> {
        let t = self.tiles.get_mut(id)?;
        t.is_stop = !t.is_stop;
        Some(t.is_stop)
    }

    /// Claim `id` for `agent`. Re-claiming an own tile is a no-op.
    pub fn claim(&mut self, id: TileId, agent: AgentId) -> Result<(), PlanError> {
        let Some(t) = self.tiles.get_mut(id) else {
            return Err(PlanError::NoEligibleDestination);
        };
        match t.claimed_by {
            Some(holder) if holder != agent => Err(PlanError::ClaimConflict { tile: id, holder }),
            _ => {
                t.claimed_by = Some(agent);
                Ok(())
            }
        }
    }

    /// Drop `agent`'s claim on `id`, if it has one.
    pub fn release(&mut self, id: TileId, agent: AgentId) {
        if let Some(t) = self.tiles.get_mut(id) {
            if t.claimed_by == Some(agent) {
                t.claimed_by = None;
            }
        }
    }

    /// Drop every claim on the board.
    pub fn clear_claims(&mut self) {
        for t in &mut self.tiles {
            t.claimed_by = None;
        }
    }
}

impl Pather for Grid {
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        let rng = self.range();
        let inside = |q: &Point| rng.contains(*q);
        match self.movement {
            Movement::Cardinal => buf.extend(p.neighbors_4().into_iter().filter(inside)),
            Movement::Octile => buf.extend(p.neighbors_8().into_iter().filter(inside)),
        }
    }

    fn passable(&self, p: Point) -> bool {
        self.id_of(p)
            .and_then(|id| self.tile(id))
            .is_some_and(|t| t.passable)
    }
}

impl WeightedPather for Grid {
    fn cost(&self, from: Point, to: Point) -> i32 {
        self.movement.distance(from, to)
    }
}

impl AstarPather for Grid {
    fn estimate(&self, from: Point, to: Point) -> i32 {
        self.movement.distance(from, to)
    }
}
