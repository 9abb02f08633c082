//! Simulation settings.

use crate::error::SimError;

/// Largest accepted board side.
pub const MAX_SIDE: i32 = 64;

/// Largest accepted tile edge, in world units.
pub const MAX_TILE_SIZE: i32 = 10_000;

/// Tunables for a [`Simulation`](crate::Simulation).
///
/// Defaults: 5-unit tiles, a board of 5 to 10 tiles per side and 1 to 5
/// agents.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SimConfig {
    /// World units per tile edge.
    pub tile_size: i32,
    /// Elevation of every waypoint.
    pub elevation: f32,
    /// Smallest board side drawn by [`Simulation::new`](crate::Simulation::new).
    pub min_side: i32,
    /// Largest board side drawn by [`Simulation::new`](crate::Simulation::new).
    pub max_side: i32,
    pub min_agents: usize,
    pub max_agents: usize,
    /// Ticks an agent waits before retrying after finding nothing to do.
    pub retry_delay: u32,
    /// Start with 8-directional movement.
    pub diagonal: bool,
    /// Start in seek mode.
    pub seek_mode: bool,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tile_size: 5,
            elevation: 1.0,
            min_side: 5,
            max_side: 10,
            min_agents: 1,
            max_agents: 5,
            retry_delay: 30,
            diagonal: false,
            seek_mode: false,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Check that every bound is usable.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(2..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(SimError::InvalidConfig(format!(
                "tile_size must be within 2..={MAX_TILE_SIZE}, got {}",
                self.tile_size
            )));
        }
        if self.min_side > self.max_side {
            return Err(SimError::InvalidConfig(format!(
                "side bounds {}..={} are empty",
                self.min_side, self.max_side
            )));
        }
        check_side(self.min_side)?;
        check_side(self.max_side)?;
        if self.min_agents > self.max_agents {
            return Err(SimError::InvalidConfig(format!(
                "agent bounds {}..={} are empty",
                self.min_agents, self.max_agents
            )));
        }
        if self.retry_delay == 0 {
            return Err(SimError::InvalidConfig("retry_delay must be positive".into()));
        }
        Ok(())
    }
}

/// Reject board sides outside `1..=MAX_SIDE`.
pub fn check_side(side: i32) -> Result<(), SimError> {
    if (1..=MAX_SIDE).contains(&side) {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!(
            "side must be within 1..={MAX_SIDE}, got {side}"
        )))
    }
}
