//! Per-agent movement and occupancy state.

use stopgrid_core::Vec3;

use crate::grid::{AgentId, TileId};

/// Where an agent is in the occupancy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgentState {
    /// No destination and no pending retry.
    #[default]
    Idle,
    /// Following a path to `destination`.
    EnRoute,
    /// Parked on a claimed stop.
    Holding,
    /// Nothing to do right now; select again when the timer runs out.
    Waiting { ticks_left: u32 },
}

/// A mobile agent.
///
/// An agent holds at most one stop (`occupied_stop`). A non-stop
/// destination is claimed only while the agent is travelling to it
/// (`transient_claim`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Agent {
    pub id: AgentId,
    /// World position; moves onto each waypoint as it is reached.
    pub position: Vec3,
    /// Waypoints still ahead, starting at index `waypoint`.
    pub path: Vec<Vec3>,
    pub waypoint: usize,
    pub destination: Option<TileId>,
    pub transient_claim: Option<TileId>,
    pub occupied_stop: Option<TileId>,
    pub state: AgentState,
}

impl Agent {
    pub fn new(id: AgentId, position: Vec3) -> Self {
        Self {
            id,
            position,
            path: Vec::new(),
            waypoint: 0,
            destination: None,
            transient_claim: None,
            occupied_stop: None,
            state: AgentState::Idle,
        }
    }

    /// The waypoint the agent is heading for.
    #[inline]
    pub fn current_waypoint(&self) -> Option<Vec3> {
        self.path.get(self.waypoint).copied()
    }

    /// Every waypoint has been consumed.
    #[inline]
    pub fn has_arrived(&self) -> bool {
        self.state == AgentState::EnRoute && self.waypoint >= self.path.len()
    }

    #[inline]
    pub fn is_holding(&self) -> bool {
        self.state == AgentState::Holding
    }

    /// Start following `path` toward `destination`.
    pub fn assign_path(&mut self, destination: TileId, path: Vec<Vec3>) {
        self.destination = Some(destination);
        self.path = path;
        self.waypoint = 0;
        self.state = AgentState::EnRoute;
    }

    /// Drop the current path and destination.
    pub fn stop(&mut self) {
        self.path.clear();
        self.waypoint = 0;
        self.destination = None;
    }

    /// Consume the current waypoint. Returns `true` when that was the last
    /// one.
    pub fn advance(&mut self) -> bool {
        let Some(wp) = self.current_waypoint() else {
            return false;
        };
        self.position = wp;
        self.waypoint += 1;
        self.waypoint >= self.path.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_walks_the_path() {
        let mut a = Agent::new(0, Vec3::new(1.0, 1.0, 1.0));
        assert!(!a.advance());
        let path = vec![Vec3::new(6.0, 1.0, 1.0), Vec3::new(11.0, 1.0, 1.0)];
        a.assign_path(10, path.clone());
        assert_eq!(a.state, AgentState::EnRoute);
        assert_eq!(a.current_waypoint(), Some(path[0]));
        assert_eq!(a.path.last(), Some(&path[1]));

        assert!(!a.advance());
        assert!(!a.has_arrived());
        assert!(a.advance());
        assert!(a.has_arrived());
        assert_eq!(a.position, path[1]);
        assert_eq!(a.current_waypoint(), None);
    }

    #[test]
    fn stop_clears_route() {
        let mut a = Agent::new(3, Vec3::default());
        a.assign_path(4, vec![Vec3::default()]);
        a.stop();
        assert_eq!(a.destination, None);
        assert!(a.path.is_empty());
    }
}
