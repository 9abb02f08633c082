//! Stop-seeking agents on a tile grid.
//!
//! Agents wander between random tiles or, in seek mode, race for the
//! nearest free "stop" tile and park there. Blockers, stop edits and metric
//! switches reach them as [`WorldEvent`]s, and each agent's
//! [`Coordinator`] re-plans in response.
//!
//! ```no_run
//! use stopgrid_sim::{SimConfig, Simulation};
//!
//! let mut sim = Simulation::with_side(6, SimConfig::default()).unwrap();
//! sim.populate(3);
//! sim.set_seek_mode(true);
//! for _ in 0..50 {
//!     sim.step_movers();
//!     let report = sim.tick();
//!     assert!(sim.check_claims(), "tick {}", report.tick);
//! }
//! ```

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod grid;
pub mod pathfinder;
pub mod simulation;

pub use agent::{Agent, AgentState};
pub use config::{MAX_SIDE, MAX_TILE_SIZE, SimConfig};
pub use coordinator::Coordinator;
pub use error::{PlanError, SimError};
pub use events::{EventBus, EventKind, EventQueue, Subscriber, WorldEvent};
pub use grid::{AgentId, Grid, Movement, Tile, TileId};
pub use pathfinder::{Pathfinder, path_cost};
pub use simulation::{Simulation, SimulationState, TickReport};
