//! Error types.
//!
//! [`PlanError`] covers the outcomes an agent recovers from on its own; the
//! coordinator never lets one escape the tick that produced it.
//! [`SimError`] reports misuse of the public simulation API.

use stopgrid_core::Vec3;
use thiserror::Error;

use crate::grid::{AgentId, TileId};

/// Recoverable planning outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlanError {
    /// No route exists under the current passability and metric.
    #[error("no path from tile {from} to tile {to}")]
    PathNotFound { from: TileId, to: TileId },
    /// No free tile (random mode) or unclaimed stop (seek mode) qualifies.
    #[error("no eligible destination")]
    NoEligibleDestination,
    /// Another agent got to the tile first.
    #[error("tile {tile} is already claimed by agent {holder}")]
    ClaimConflict { tile: TileId, holder: AgentId },
    /// A world position does not fall on any tile.
    #[error("position {0} is outside the grid")]
    OutOfBoundsQuery(Vec3),
}

/// Errors returned by the [`Simulation`](crate::Simulation) API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error("unknown tile {0}")]
    UnknownTile(TileId),
    /// The tile is blocked, claimed, or already has an agent on it.
    #[error("tile {0} cannot host a new agent")]
    TileUnavailable(TileId),
}
