//! The tick loop and the public face of the crate.

use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stopgrid_core::{Point, Vec3};

use crate::agent::{Agent, AgentState};
use crate::config::{SimConfig, check_side};
use crate::coordinator::Coordinator;
use crate::error::SimError;
use crate::events::{EventBus, EventKind, Subscriber, WorldEvent};
use crate::grid::{AgentId, Grid, Movement, TileId};
use crate::pathfinder::Pathfinder;

/// What happened since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick this report closes.
    pub tick: u64,
    /// Events delivered to subscribers.
    pub events: usize,
    /// Arrivals processed.
    pub arrivals: usize,
    /// Stops taken, in processing order.
    pub claims: Vec<(AgentId, TileId)>,
    /// Arrivals that found their stop already held.
    pub conflicts: usize,
    /// Routes assigned.
    pub routes: usize,
    /// Routes that broke and forced a new destination.
    pub replans: usize,
    /// Agents sent to wait.
    pub waits: usize,
}

/// Everything the coordinators read and write.
pub struct SimulationState {
    pub grid: Grid,
    pub agents: Vec<Agent>,
    pub pathfinder: Pathfinder,
    pub rng: StdRng,
    pub seek_mode: bool,
    pub tick: u64,
    pub config: SimConfig,
    pub(crate) pending_arrivals: Vec<AgentId>,
    pub(crate) outbox: Vec<WorldEvent>,
    pub(crate) report: TickReport,
}

/// A board of tiles, the agents on it, and the events between them.
///
/// World changes (`add_blocker`, `set_seek_mode`, ...) apply to the grid at
/// once, but agents only hear about them at the start of the next
/// [`tick`](Self::tick).
pub struct Simulation {
    state: SimulationState,
    bus: EventBus,
}

impl Simulation {
    /// A board with a random side drawn from the configured bounds.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = seeded(&config);
        let side = rng.random_range(config.min_side..=config.max_side);
        Ok(Self::build(side, config, rng))
    }

    /// A board of exactly `side` x `side` tiles.
    pub fn with_side(side: i32, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        check_side(side)?;
        let rng = seeded(&config);
        Ok(Self::build(side, config, rng))
    }

    fn build(side: i32, config: SimConfig, rng: StdRng) -> Self {
        let mut grid = Grid::new(side, config.tile_size, config.elevation);
        grid.set_movement(Movement::from_diagonal(config.diagonal));
        info!("board {side}x{side}, {:?} movement", grid.movement());
        let pathfinder = Pathfinder::new(&grid);
        Self {
            state: SimulationState {
                grid,
                agents: Vec::new(),
                pathfinder,
                rng,
                seek_mode: config.seek_mode,
                tick: 0,
                config,
                pending_arrivals: Vec::new(),
                outbox: Vec::new(),
                report: TickReport::default(),
            },
            bus: EventBus::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.state.grid
    }

    #[inline]
    pub fn agents(&self) -> &[Agent] {
        &self.state.agents
    }

    #[inline]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.state.agents.get(id)
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.state.tick
    }

    #[inline]
    pub fn seek_mode(&self) -> bool {
        self.state.seek_mode
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.state.config
    }

    /// Tile under agent `id`.
    pub fn agent_tile(&self, id: AgentId) -> Option<TileId> {
        self.agent(id).and_then(|a| self.state.grid.tile_at(a.position))
    }

    // -----------------------------------------------------------------------
    // Population
    // -----------------------------------------------------------------------

    /// Place agent `id` on `start` and let it pick a destination.
    ///
    /// Ids are dense: `id` is either the next free id, which adds an agent,
    /// or an existing one, which restarts that agent from `start`.
    pub fn initialize(&mut self, id: AgentId, start: TileId) -> Result<(), SimError> {
        let count = self.state.agents.len();
        if id > count {
            return Err(SimError::UnknownAgent(id));
        }
        let tile = self
            .state
            .grid
            .tile(start)
            .ok_or(SimError::UnknownTile(start))?;
        let claimable = tile.passable && tile.claimed_by.is_none_or(|holder| holder == id);
        if !claimable || self.agent_on(start).is_some_and(|other| other != id) {
            return Err(SimError::TileUnavailable(start));
        }

        let position = self.state.grid.center(start);
        if id == count {
            self.state.agents.push(Agent::new(id, position));
        } else {
            Coordinator::new(&mut self.state, id).release_claims();
            self.state.agents[id] = Agent::new(id, position);
            self.state.pending_arrivals.retain(|&a| a != id);
        }
        // Events already queued describe a world the new choice has seen.
        self.bus.subscribe_all(id);
        debug!("agent {id} placed on tile {start}");
        Coordinator::new(&mut self.state, id).select_destination();
        self.flush_outbox();
        Ok(())
    }

    /// Add `count` agents on random free tiles, one draw per tile at most
    /// for each. Returns the ids placed, which may be fewer than asked for
    /// on a crowded board.
    pub fn populate(&mut self, count: usize) -> Vec<AgentId> {
        let mut placed = Vec::with_capacity(count);
        let tiles = self.state.grid.len();
        for _ in 0..count {
            let id = self.state.agents.len();
            let mut start = None;
            for _ in 0..tiles {
                let t = self.state.rng.random_range(0..tiles);
                if self.state.grid.is_free(t) && self.agent_on(t).is_none() {
                    start = Some(t);
                    break;
                }
            }
            let Some(start) = start else {
                warn!("no free tile for agent {id}");
                break;
            };
            if self.initialize(id, start).is_ok() {
                placed.push(id);
            }
        }
        info!("placed {} agents", placed.len());
        placed
    }

    /// Add a random number of agents within the configured bounds.
    pub fn populate_random(&mut self) -> Vec<AgentId> {
        let (lo, hi) = (self.state.config.min_agents, self.state.config.max_agents);
        let count = self.state.rng.random_range(lo..=hi);
        self.populate(count)
    }

    fn agent_on(&self, tile: TileId) -> Option<AgentId> {
        self.state
            .agents
            .iter()
            .find(|a| self.state.grid.tile_at(a.position) == Some(tile))
            .map(|a| a.id)
    }

    // -----------------------------------------------------------------------
    // Movement feedback
    // -----------------------------------------------------------------------

    /// Waypoints agent `id` has not reached yet.
    pub fn path(&self, id: AgentId) -> Option<&[Vec3]> {
        self.agent(id)
            .map(|a| &a.path[a.waypoint.min(a.path.len())..])
    }

    pub fn current_waypoint(&self, id: AgentId) -> Option<Vec3> {
        self.agent(id).and_then(Agent::current_waypoint)
    }

    /// Report that agent `id` reached its current waypoint. Returns whether
    /// that was the last one; the arrival is then handled by the next
    /// [`tick`](Self::tick).
    pub fn waypoint_reached(&mut self, id: AgentId) -> Result<bool, SimError> {
        let agent = self
            .state
            .agents
            .get_mut(id)
            .ok_or(SimError::UnknownAgent(id))?;
        if agent.state != AgentState::EnRoute {
            return Ok(false);
        }
        let arrived = agent.advance();
        if arrived {
            trace!("agent {id} arrived at {}", agent.position);
            self.state.pending_arrivals.push(id);
        }
        Ok(arrived)
    }

    /// Move every travelling agent one waypoint ahead. Returns how many
    /// finished their path.
    pub fn step_movers(&mut self) -> usize {
        let movers: Vec<AgentId> = self
            .state
            .agents
            .iter()
            .filter(|a| a.state == AgentState::EnRoute && a.current_waypoint().is_some())
            .map(|a| a.id)
            .collect();
        movers
            .into_iter()
            .filter(|&id| self.waypoint_reached(id).unwrap_or(false))
            .count()
    }

    // -----------------------------------------------------------------------
    // World changes
    // -----------------------------------------------------------------------

    /// Block a passable tile. Returns `false` if it was already blocked.
    pub fn add_blocker(&mut self, tile: TileId) -> Result<bool, SimError> {
        self.check_tile(tile)?;
        if !self.state.grid.set_passable(tile, false) {
            return Ok(false);
        }
        debug!("blocker added on tile {tile}");
        self.raise(WorldEvent::BlockerAdded(tile));
        Ok(true)
    }

    /// Unblock a blocked tile. Returns `false` if it was not blocked.
    pub fn remove_blocker(&mut self, tile: TileId) -> Result<bool, SimError> {
        self.check_tile(tile)?;
        if !self.state.grid.set_passable(tile, true) {
            return Ok(false);
        }
        debug!("blocker removed from tile {tile}");
        self.raise(WorldEvent::BlockerRemoved(tile));
        Ok(true)
    }

    /// Flip the stop flag of `tile`, returning the new value. Agents are
    /// only told while seek mode is on.
    pub fn toggle_stop(&mut self, tile: TileId) -> Result<bool, SimError> {
        let is_stop = self
            .state
            .grid
            .toggle_stop(tile)
            .ok_or(SimError::UnknownTile(tile))?;
        if self.state.seek_mode {
            self.raise(WorldEvent::StopToggled(tile));
        }
        Ok(is_stop)
    }

    /// Switch between 4- and 8-directional movement. Returns whether the
    /// mode changed.
    pub fn set_diagonal(&mut self, on: bool) -> bool {
        let movement = Movement::from_diagonal(on);
        if self.state.grid.movement() == movement {
            return false;
        }
        self.state.grid.set_movement(movement);
        info!("movement is now {movement:?}");
        self.raise(WorldEvent::DiagonalModeToggled(on));
        true
    }

    /// Enter or leave seek mode. Every claim on the board is dropped first.
    /// Returns whether the mode changed.
    pub fn set_seek_mode(&mut self, on: bool) -> bool {
        if self.state.seek_mode == on {
            return false;
        }
        self.state.grid.clear_claims();
        for agent in &mut self.state.agents {
            agent.transient_claim = None;
            agent.occupied_stop = None;
            if agent.state == AgentState::Holding {
                agent.state = AgentState::Idle;
            }
        }
        self.state.seek_mode = on;
        info!("seek mode {}", if on { "on" } else { "off" });
        self.raise(WorldEvent::SeekModeToggled(on));
        true
    }

    fn check_tile(&self, tile: TileId) -> Result<(), SimError> {
        match self.state.grid.tile(tile) {
            Some(_) => Ok(()),
            None => Err(SimError::UnknownTile(tile)),
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Register a callback for events of `kind`. Callbacks run after the
    /// agents registered before them.
    pub fn observe(&mut self, kind: EventKind, f: impl FnMut(&WorldEvent) + 'static) -> usize {
        self.bus.observe(kind, f)
    }

    fn raise(&mut self, event: WorldEvent) {
        self.bus.raise(event, self.state.tick);
    }

    fn flush_outbox(&mut self) {
        let tick = self.state.tick;
        for event in self.state.outbox.drain(..) {
            self.bus.raise(event, tick);
        }
    }

    fn deliver_due(&mut self) {
        let tick = self.state.tick;
        while let Some((event, recipients)) = self.bus.pop_due(tick) {
            trace!("tick {tick}: delivering {event}");
            self.state.report.events += 1;
            for sub in recipients {
                match sub {
                    Subscriber::Agent(id) => Coordinator::new(&mut self.state, id).handle(&event),
                    Subscriber::Observer(slot) => self.bus.notify_observer(slot, &event),
                }
            }
            self.flush_outbox();
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// 1. Deliver every event raised since the last tick.
    /// 2. Handle queued arrivals in increasing agent id; the first agent to
    ///    reach a free stop gets it.
    /// 3. Count down retry timers.
    /// 4. Deliver the events raised by steps 2 and 3.
    pub fn tick(&mut self) -> TickReport {
        self.deliver_due();

        let mut arrivals = std::mem::take(&mut self.state.pending_arrivals);
        arrivals.sort_unstable();
        arrivals.dedup();
        for id in arrivals {
            Coordinator::new(&mut self.state, id).on_arrival();
        }
        self.flush_outbox();

        for id in 0..self.state.agents.len() {
            Coordinator::new(&mut self.state, id).retry_tick();
        }
        self.flush_outbox();
        self.deliver_due();

        let mut report = std::mem::take(&mut self.state.report);
        report.tick = self.state.tick;
        self.state.tick += 1;
        report
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Whether tile claims and agent bookkeeping agree: every claim belongs
    /// to exactly the agent that records it, and holding agents and held
    /// stops match up one to one.
    pub fn check_claims(&self) -> bool {
        let grid = &self.state.grid;
        let agents = &self.state.agents;
        let tiles_ok = grid.tiles().iter().all(|t| match t.claimed_by {
            None => agents
                .iter()
                .all(|a| a.occupied_stop != Some(t.id) && a.transient_claim != Some(t.id)),
            Some(holder) => agents.get(holder).is_some_and(|a| {
                a.occupied_stop == Some(t.id) || a.transient_claim == Some(t.id)
            }),
        });
        let agents_ok = agents.iter().all(|a| {
            let held = a.occupied_stop.is_some();
            let in_sync = a
                .occupied_stop
                .iter()
                .chain(a.transient_claim.iter())
                .all(|&t| grid.tile(t).is_some_and(|tile| tile.claimed_by == Some(a.id)));
            held == a.is_holding() && in_sync
        });
        tiles_ok && agents_ok
    }

    /// ASCII map of the board, one row per grid `y`: `#` blocked, `S` stop,
    /// a digit for an agent (its id modulo 10), `.` otherwise.
    pub fn snapshot(&self) -> String {
        let grid = &self.state.grid;
        let side = grid.side();
        let mut out = String::with_capacity(((side + 1) * side) as usize);
        for y in 0..side {
            for x in 0..side {
                let Some(id) = grid.id_of(Point::new(x, y)) else {
                    continue;
                };
                let tile = &grid.tiles()[id];
                let ch = match self.agent_on(id) {
                    Some(a) => char::from_digit((a % 10) as u32, 10).unwrap_or('?'),
                    None if !tile.passable => '#',
                    None if tile.is_stop => 'S',
                    None => '.',
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}

fn seeded(config: &SimConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            seed: Some(42),
            ..SimConfig::default()
        }
    }

    fn sim(side: i32) -> Simulation {
        Simulation::with_side(side, config()).unwrap()
    }

    fn tile(s: &Simulation, x: i32, y: i32) -> TileId {
        s.grid().id_of(Point::new(x, y)).unwrap()
    }

    fn run(s: &mut Simulation, limit: usize) {
        for _ in 0..limit {
            s.step_movers();
            s.tick();
        }
    }

    #[test]
    fn random_side_within_bounds() {
        for seed in 0..20 {
            let s = Simulation::new(SimConfig {
                seed: Some(seed),
                ..SimConfig::default()
            })
            .unwrap();
            assert!((5..=10).contains(&s.grid().side()));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = SimConfig {
            retry_delay: 0,
            ..SimConfig::default()
        };
        assert!(matches!(Simulation::new(bad), Err(SimError::InvalidConfig(_))));
        assert!(Simulation::with_side(0, SimConfig::default()).is_err());
        assert!(Simulation::with_side(50_000, SimConfig::default()).is_err());
        let huge = SimConfig {
            min_side: 50_000,
            max_side: 50_000,
            ..SimConfig::default()
        };
        assert!(matches!(Simulation::new(huge), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn initialize_claims_a_random_destination() {
        let mut s = sim(5);
        s.initialize(0, 0).unwrap();
        let a = s.agent(0).unwrap();
        assert_eq!(a.state, AgentState::EnRoute);
        let dest = a.destination.unwrap();
        assert_eq!(a.transient_claim, Some(dest));
        assert_eq!(s.grid().tile(dest).unwrap().claimed_by, Some(0));
        assert_eq!(s.path(0).unwrap().last(), Some(&s.grid().center(dest)));
        assert!(s.check_claims());
    }

    #[test]
    fn initialize_rejects_bad_requests() {
        let mut s = sim(5);
        assert_eq!(s.initialize(1, 0), Err(SimError::UnknownAgent(1)));
        assert_eq!(s.initialize(0, 99), Err(SimError::UnknownTile(99)));
        s.add_blocker(3).unwrap();
        assert_eq!(s.initialize(0, 3), Err(SimError::TileUnavailable(3)));

        s.initialize(0, 0).unwrap();
        assert_eq!(s.initialize(1, 0), Err(SimError::TileUnavailable(0)));
        // Restarting an existing agent is allowed.
        s.initialize(0, 0).unwrap();
        assert_eq!(s.agents().len(), 1);
        assert!(s.check_claims());
    }

    #[test]
    fn populate_uses_distinct_tiles() {
        let mut s = sim(6);
        let ids = s.populate(5);
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        let mut starts: Vec<TileId> = ids.iter().map(|&id| s.agent_tile(id).unwrap()).collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), 5);
        assert!(s.check_claims());
    }

    #[test]
    fn agents_wander_with_seek_off() {
        let mut s = sim(6);
        s.populate(3);
        for _ in 0..60 {
            s.step_movers();
            let report = s.tick();
            assert!(report.claims.is_empty());
            assert!(s.check_claims());
        }
        assert!(s.agents().iter().all(|a| a.occupied_stop.is_none()));
    }

    #[test]
    fn single_agent_takes_the_only_stop() {
        let mut s = sim(5);
        let stop = tile(&s, 4, 4);
        s.toggle_stop(stop).unwrap();
        s.set_seek_mode(true);
        s.initialize(0, tile(&s, 0, 0)).unwrap();
        assert_eq!(s.agent(0).unwrap().destination, Some(stop));
        assert_eq!(s.path(0).unwrap().len(), 8);

        run(&mut s, 10);
        let a = s.agent(0).unwrap();
        assert!(a.is_holding());
        assert_eq!(a.occupied_stop, Some(stop));
        assert_eq!(s.grid().tile(stop).unwrap().claimed_by, Some(0));
        assert!(s.check_claims());
    }

    #[test]
    fn blocked_destination_triggers_new_choice() {
        let mut s = sim(5);
        let stop = tile(&s, 4, 4);
        s.toggle_stop(stop).unwrap();
        s.set_seek_mode(true);
        s.initialize(0, tile(&s, 0, 0)).unwrap();

        s.add_blocker(stop).unwrap();
        let report = s.tick();
        // The seek toggle and the blocker.
        assert_eq!(report.events, 2);
        assert_eq!(report.replans, 1);
        let a = s.agent(0).unwrap();
        assert_ne!(a.destination, Some(stop));
        assert!(s.check_claims());
    }

    #[test]
    fn late_agent_ignores_earlier_mode_change() {
        let mut s = sim(5);
        s.set_seek_mode(true);
        s.initialize(0, tile(&s, 0, 0)).unwrap();
        let before = s.agent(0).unwrap().clone();
        assert!(before.transient_claim.is_some());

        let report = s.tick();
        assert_eq!(report.events, 1);
        assert_eq!(report.routes, 0);
        let after = s.agent(0).unwrap();
        assert_eq!(after.destination, before.destination);
        assert_eq!(after.transient_claim, before.transient_claim);
        assert!(s.check_claims());
    }

    #[test]
    fn restarted_agent_ignores_earlier_blocker() {
        let mut s = sim(5);
        s.initialize(0, tile(&s, 0, 0)).unwrap();
        s.add_blocker(tile(&s, 2, 2)).unwrap();
        s.initialize(0, tile(&s, 4, 0)).unwrap();
        let dest = s.agent(0).unwrap().destination;

        let report = s.tick();
        assert_eq!(report.events, 1);
        assert_eq!(report.routes, 0);
        assert_eq!(s.agent(0).unwrap().destination, dest);
    }

    #[test]
    fn world_change_no_ops_raise_nothing() {
        let mut s = sim(5);
        assert_eq!(s.remove_blocker(2), Ok(false));
        assert_eq!(s.add_blocker(2), Ok(true));
        assert_eq!(s.add_blocker(2), Ok(false));
        assert_eq!(s.add_blocker(99), Err(SimError::UnknownTile(99)));
        assert!(!s.set_diagonal(false));
        assert!(!s.set_seek_mode(false));
        // Seek mode is off, so stop toggles stay silent.
        assert_eq!(s.toggle_stop(4), Ok(true));
        assert_eq!(s.tick().events, 1);
    }

    #[test]
    fn waits_when_nothing_is_reachable() {
        let mut s = Simulation::with_side(
            1,
            SimConfig {
                retry_delay: 3,
                ..config()
            },
        )
        .unwrap();
        s.initialize(0, 0).unwrap();
        // The only tile is the one it stands on.
        assert_eq!(s.path(0).unwrap().to_vec(), vec![s.grid().center(0)]);

        s.add_blocker(0).unwrap();
        let report = s.tick();
        assert_eq!(report.replans, 1);
        assert_eq!(report.waits, 1);
        // The timer already ran once in the same tick.
        assert_eq!(s.agent(0).unwrap().state, AgentState::Waiting { ticks_left: 2 });
        assert!(s.check_claims());

        s.remove_blocker(0).unwrap();
        s.tick();
        assert_eq!(s.agent(0).unwrap().state, AgentState::Waiting { ticks_left: 1 });
        s.tick();
        assert_eq!(s.agent(0).unwrap().state, AgentState::EnRoute);
        assert_eq!(s.grid().tile(0).unwrap().claimed_by, Some(0));
    }

    #[test]
    fn snapshot_marks_tiles_and_agents() {
        let mut s = sim(3);
        s.add_blocker(tile(&s, 1, 0)).unwrap();
        s.toggle_stop(tile(&s, 2, 2)).unwrap();
        s.initialize(0, tile(&s, 0, 1)).unwrap();
        assert_eq!(s.snapshot(), ".#.\n0..\n..S\n");
    }

    #[test]
    fn observers_run_after_agents() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut s = sim(4);
        s.initialize(0, 0).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        s.observe(EventKind::Diagonal, move |e| log.borrow_mut().push(*e));
        s.set_diagonal(true);
        s.tick();
        assert_eq!(*seen.borrow(), vec![WorldEvent::DiagonalModeToggled(true)]);
    }
}
