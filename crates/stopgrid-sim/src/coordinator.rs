//! The occupancy protocol run by each agent.
//!
//! A [`Coordinator`] borrows the whole simulation state on behalf of one
//! agent. It picks destinations, asks the pathfinder for routes, takes and
//! gives back tile claims, and reacts to world events. Every [`PlanError`]
//! ends here: it is logged and turned into a state change, usually a
//! [`Waiting`](AgentState::Waiting) retry.

use log::{debug, info, trace};
use rand::Rng;
use stopgrid_core::Vec3;

use crate::agent::{Agent, AgentState};
use crate::error::PlanError;
use crate::events::WorldEvent;
use crate::grid::{AgentId, TileId};
use crate::simulation::SimulationState;

/// One agent's view of the simulation for the duration of a call.
pub struct Coordinator<'a> {
    state: &'a mut SimulationState,
    agent: AgentId,
}

impl<'a> Coordinator<'a> {
    /// # Panics
    ///
    /// If `agent` is not in the agent table.
    pub fn new(state: &'a mut SimulationState, agent: AgentId) -> Self {
        assert!(agent < state.agents.len(), "unknown agent {agent}");
        Self { state, agent }
    }

    #[inline]
    fn agent(&self) -> &Agent {
        &self.state.agents[self.agent]
    }

    #[inline]
    fn agent_mut(&mut self) -> &mut Agent {
        &mut self.state.agents[self.agent]
    }

    fn current_tile(&self) -> Result<TileId, PlanError> {
        let pos = self.agent().position;
        self.state
            .grid
            .tile_at(pos)
            .ok_or(PlanError::OutOfBoundsQuery(pos))
    }

    // -----------------------------------------------------------------------
    // Destination selection
    // -----------------------------------------------------------------------

    /// Drop every claim and pick the next destination.
    ///
    /// In seek mode the nearest reachable free stop wins; without one, or
    /// outside seek mode, a random free tile is chosen. If nothing works the
    /// agent waits and tries again later.
    pub fn select_destination(&mut self) {
        self.release_claims();
        self.agent_mut().stop();
        self.agent_mut().state = AgentState::Idle;

        let picked = if self.state.seek_mode {
            match self.seek_nearest_stop() {
                Err(PlanError::NoEligibleDestination) => self.go_to_random_tile(),
                other => other,
            }
        } else {
            self.go_to_random_tile()
        };
        match picked {
            Ok(tile) => trace!("agent {} heading for tile {tile}", self.agent),
            Err(e) => self.wait(e),
        }
    }

    /// Walk to a random passable unclaimed tile.
    ///
    /// Makes at most one draw per tile on the board; a draw that passes the
    /// tile check but has no route still uses up its attempt. The chosen
    /// tile is claimed for the trip.
    pub fn go_to_random_tile(&mut self) -> Result<TileId, PlanError> {
        let count = self.state.grid.len();
        for _ in 0..count {
            let id = self.state.rng.random_range(0..count);
            if !self.state.grid.is_free(id) {
                continue;
            }
            match self.plan_route(id) {
                Ok(()) => {
                    self.state.grid.claim(id, self.agent)?;
                    self.agent_mut().transient_claim = Some(id);
                    return Ok(id);
                }
                Err(e @ PlanError::PathNotFound { .. }) => debug!("agent {}: {e}", self.agent),
                Err(e) => return Err(e),
            }
        }
        Err(PlanError::NoEligibleDestination)
    }

    /// Walk to the closest free stop, by straight-line distance, that can
    /// be reached. Equal distances keep board order.
    pub fn seek_nearest_stop(&mut self) -> Result<TileId, PlanError> {
        let pos = self.agent().position;
        let grid = &self.state.grid;
        let mut stops: Vec<(f32, TileId)> = grid
            .tiles()
            .iter()
            .filter(|t| t.is_stop && t.is_free())
            .map(|t| (ground_distance(grid.center(t.id), pos), t.id))
            .collect();
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, id) in stops {
            match self.plan_route(id) {
                Ok(()) => return Ok(id),
                Err(e @ PlanError::PathNotFound { .. }) => debug!("agent {}: {e}", self.agent),
                Err(e) => return Err(e),
            }
        }
        Err(PlanError::NoEligibleDestination)
    }

    /// Route from the agent's tile to `to` and start following it.
    pub fn plan_route(&mut self, to: TileId) -> Result<(), PlanError> {
        let from = self.current_tile()?;
        let state = &mut *self.state;
        let tiles = state
            .pathfinder
            .find_tile_path(&state.grid, from, to)
            .ok_or(PlanError::PathNotFound { from, to })?;
        let waypoints = tiles.into_iter().map(|t| state.grid.center(t)).collect();
        state.agents[self.agent].assign_path(to, waypoints);
        state.report.routes += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Arrival
    // -----------------------------------------------------------------------

    /// The agent consumed its last waypoint.
    pub fn on_arrival(&mut self) {
        if !self.agent().has_arrived() {
            trace!("agent {}: stale arrival ignored", self.agent);
            return;
        }
        self.state.report.arrivals += 1;
        let tile = match self.current_tile() {
            Ok(tile) => tile,
            Err(e) => return self.wait(e),
        };

        let at = &self.state.grid.tiles()[tile];
        if self.state.seek_mode && at.is_stop && at.passable {
            match self.try_hold(tile) {
                Ok(()) => return,
                Err(e) => {
                    debug!("agent {} lost tile {tile}: {e}", self.agent);
                    self.state.report.conflicts += 1;
                }
            }
        }
        self.select_destination();
    }

    /// Take `tile` as this agent's stop, unless someone else already has
    /// it.
    pub fn try_hold(&mut self, tile: TileId) -> Result<(), PlanError> {
        if let Some(other) = self
            .state
            .agents
            .iter()
            .find(|a| a.id != self.agent && a.occupied_stop == Some(tile))
        {
            return Err(PlanError::ClaimConflict {
                tile,
                holder: other.id,
            });
        }
        // An own transient claim on this tile turns into the hold.
        self.state.grid.claim(tile, self.agent)?;
        if self.agent().transient_claim == Some(tile) {
            self.agent_mut().transient_claim = None;
        }
        self.release_transient();

        let agent = self.agent_mut();
        agent.stop();
        agent.occupied_stop = Some(tile);
        agent.state = AgentState::Holding;

        info!("agent {} holds stop {tile}", self.agent);
        self.state.report.claims.push((self.agent, tile));
        self.state.outbox.push(WorldEvent::TileClaimed {
            agent: self.agent,
            tile,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// Dispatch a delivered event.
    pub fn handle(&mut self, event: &WorldEvent) {
        trace!("agent {} <- {event}", self.agent);
        match *event {
            WorldEvent::BlockerAdded(_) | WorldEvent::BlockerRemoved(_) => {
                self.on_blockers_changed()
            }
            WorldEvent::StopToggled(tile) => self.on_stops_changed(tile),
            WorldEvent::DiagonalModeToggled(_) => self.on_diagonal_changed(),
            WorldEvent::SeekModeToggled(_) => self.on_seek_mode_changed(),
            WorldEvent::TileClaimed { agent, tile } => self.on_tile_claimed(agent, tile),
        }
    }

    /// Passability changed somewhere.
    pub fn on_blockers_changed(&mut self) {
        match self.agent().state {
            AgentState::Holding => {
                let blocked = self
                    .agent()
                    .occupied_stop
                    .is_some_and(|t| !self.state.grid.tiles()[t].passable);
                if blocked {
                    debug!("agent {}: held stop was blocked", self.agent);
                    self.release_hold();
                    self.select_destination();
                }
            }
            AgentState::EnRoute => self.revalidate_route(),
            AgentState::Idle | AgentState::Waiting { .. } => {}
        }
    }

    /// A stop was added or removed while seek mode is on.
    pub fn on_stops_changed(&mut self, tile: TileId) {
        if !self.state.seek_mode {
            return;
        }
        if self.agent().is_holding() {
            let still_stop = self.state.grid.tiles()[tile].is_stop;
            if self.agent().occupied_stop != Some(tile) || still_stop {
                return;
            }
            debug!("agent {}: stop {tile} revoked", self.agent);
            self.release_hold();
        }
        self.select_destination();
    }

    /// Seek mode flipped. Claims were already cleared by the simulation.
    pub fn on_seek_mode_changed(&mut self) {
        self.select_destination();
    }

    /// The metric changed: routes in progress may no longer be optimal.
    pub fn on_diagonal_changed(&mut self) {
        if self.agent().state == AgentState::EnRoute {
            self.revalidate_route();
        }
    }

    /// Another agent started holding `tile`.
    pub fn on_tile_claimed(&mut self, holder: AgentId, tile: TileId) {
        if holder == self.agent || self.agent().is_holding() {
            return;
        }
        if self.agent().destination == Some(tile) {
            debug!("agent {}: destination {tile} taken by {holder}", self.agent);
            self.select_destination();
        }
    }

    fn revalidate_route(&mut self) {
        let Some(dest) = self.agent().destination else {
            return self.select_destination();
        };
        let routed = match self.current_tile() {
            // A route to the tile underfoot never checks passability.
            Ok(from) if !self.state.grid.tiles()[dest].passable => {
                Err(PlanError::PathNotFound { from, to: dest })
            }
            Ok(_) => self.plan_route(dest),
            Err(e) => Err(e),
        };
        if let Err(e) = routed {
            debug!("agent {}: {e}", self.agent);
            self.state.report.replans += 1;
            self.select_destination();
        }
    }

    // -----------------------------------------------------------------------
    // Claims and timers
    // -----------------------------------------------------------------------

    /// Give back the claim taken for the current trip.
    pub fn release_transient(&mut self) {
        if let Some(t) = self.agent_mut().transient_claim.take() {
            self.state.grid.release(t, self.agent);
        }
    }

    /// Give back the held stop.
    pub fn release_hold(&mut self) {
        if let Some(t) = self.agent_mut().occupied_stop.take() {
            self.state.grid.release(t, self.agent);
            info!("agent {} left stop {t}", self.agent);
        }
        if self.agent().is_holding() {
            self.agent_mut().state = AgentState::Idle;
        }
    }

    pub fn release_claims(&mut self) {
        self.release_transient();
        self.release_hold();
    }

    /// Count down a pending retry; select again when it expires.
    pub fn retry_tick(&mut self) {
        if let AgentState::Waiting { ticks_left } = self.agent().state {
            if ticks_left <= 1 {
                self.select_destination();
            } else {
                self.agent_mut().state = AgentState::Waiting {
                    ticks_left: ticks_left - 1,
                };
            }
        }
    }

    fn wait(&mut self, err: PlanError) {
        debug!("agent {} waits: {err}", self.agent);
        self.release_claims();
        let delay = self.state.config.retry_delay;
        let agent = self.agent_mut();
        agent.stop();
        agent.state = AgentState::Waiting { ticks_left: delay };
        self.state.report.waits += 1;
    }
}

/// Straight-line distance on the ground plane.
fn ground_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x, 0.0, a.z).distance(Vec3::new(b.x, 0.0, b.z))
}

#[cfg(test)]
mod tests {
    use stopgrid_core::Point;

    use super::*;
    use crate::{SimConfig, Simulation};

    fn board(side: i32, seek: bool) -> Simulation {
        Simulation::with_side(
            side,
            SimConfig {
                seed: Some(1),
                seek_mode: seek,
                retry_delay: 5,
                ..SimConfig::default()
            },
        )
        .unwrap()
    }

    fn tile(s: &Simulation, x: i32, y: i32) -> TileId {
        s.grid().id_of(Point::new(x, y)).unwrap()
    }

    #[test]
    fn nearest_stop_ties_keep_board_order() {
        let mut s = board(5, true);
        let (left, right) = (tile(&s, 1, 2), tile(&s, 3, 2));
        s.toggle_stop(right).unwrap();
        s.toggle_stop(left).unwrap();
        s.initialize(0, tile(&s, 2, 2)).unwrap();
        assert!(left < right);
        assert_eq!(s.agent(0).unwrap().destination, Some(left));
    }

    #[test]
    fn unreachable_stop_is_skipped() {
        let mut s = board(5, true);
        let (walled, open) = (tile(&s, 1, 2), tile(&s, 4, 4));
        s.toggle_stop(walled).unwrap();
        s.toggle_stop(open).unwrap();
        for n in s.grid().neighbors(walled) {
            s.add_blocker(n).unwrap();
        }
        s.initialize(0, tile(&s, 4, 0)).unwrap();

        let mut c = Coordinator::new(s.state_mut(), 0);
        assert_eq!(c.seek_nearest_stop(), Ok(open));
        assert_eq!(s.agent(0).unwrap().destination, Some(open));
        // Seeking never claims.
        assert_eq!(s.grid().tile(open).unwrap().claimed_by, None);
    }

    #[test]
    fn random_budget_runs_out_when_boxed_in() {
        let mut s = board(3, false);
        let start = tile(&s, 0, 0);
        s.initialize(0, start).unwrap();
        for t in [start, tile(&s, 1, 0), tile(&s, 0, 1)] {
            s.add_blocker(t).unwrap();
        }

        let mut c = Coordinator::new(s.state_mut(), 0);
        c.release_claims();
        assert_eq!(c.go_to_random_tile(), Err(PlanError::NoEligibleDestination));

        c.select_destination();
        let a = s.agent(0).unwrap();
        assert_eq!(a.state, AgentState::Waiting { ticks_left: 5 });
        assert_eq!(a.transient_claim, None);
        assert!(s.check_claims());
    }

    #[test]
    fn own_transient_claim_becomes_the_hold() {
        let mut s = board(3, false);
        let start = tile(&s, 1, 1);
        s.toggle_stop(start).unwrap();
        s.initialize(0, start).unwrap();

        let state = s.state_mut();
        state.seek_mode = true;
        state.grid.clear_claims();
        state.grid.claim(start, 0).unwrap();
        state.agents[0].transient_claim = Some(start);

        let mut c = Coordinator::new(state, 0);
        assert_eq!(c.try_hold(start), Ok(()));
        let a = s.agent(0).unwrap();
        assert_eq!(a.occupied_stop, Some(start));
        assert_eq!(a.transient_claim, None);
        assert!(s.check_claims());
    }
}
