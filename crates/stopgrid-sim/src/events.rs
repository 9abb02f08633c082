//! World-change notifications.
//!
//! Events are queued in an [`EventQueue`] keyed by `(rank, insertion_order)`,
//! where the rank is the tick that raised them. Lower ranks are popped first;
//! ties are broken by insertion order (FIFO). The [`EventBus`] pairs the
//! queue with a subscription table so every event reaches its subscribers in
//! registration order, starting from the first event raised after they
//! registered.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use crate::grid::{AgentId, TileId};

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry<E> {
    event: E,
    rank: u64,
    /// Monotonically increasing counter used to break ties.
    seq: u64,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Natural order; the heap wraps entries in Reverse.
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// A priority event queue.
///
/// Events with lower rank are dequeued first. Among events with the same
/// rank, those pushed earlier are dequeued first. Every push is stamped
/// with a sequence number, returned on pop.
pub struct EventQueue<E> {
    heap: BinaryHeap<Reverse<Entry<E>>>,
    seq: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Push an event at the given rank.
    pub fn push(&mut self, event: E, rank: u64) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse(Entry { event, rank, seq }));
    }

    /// Pop the next event and its sequence number if its rank is at most
    /// `rank`.
    pub fn pop_due(&mut self, rank: u64) -> Option<(E, u64)> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.rank <= rank => {
                self.heap.pop().map(|Reverse(entry)| (entry.event, entry.seq))
            }
            _ => None,
        }
    }

    /// Sequence number the next push will get.
    pub fn next_seq(&self) -> u64 {
        self.seq
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A change in the world that agents may have to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorldEvent {
    BlockerAdded(TileId),
    BlockerRemoved(TileId),
    StopToggled(TileId),
    DiagonalModeToggled(bool),
    SeekModeToggled(bool),
    /// An agent started holding a stop.
    TileClaimed { agent: AgentId, tile: TileId },
}

impl WorldEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BlockerAdded(_) | Self::BlockerRemoved(_) => EventKind::Blockers,
            Self::StopToggled(_) => EventKind::Stops,
            Self::DiagonalModeToggled(_) => EventKind::Diagonal,
            Self::SeekModeToggled(_) => EventKind::SeekMode,
            Self::TileClaimed { .. } => EventKind::TileClaimed,
        }
    }
}

impl fmt::Display for WorldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockerAdded(t) => write!(f, "blocker added on tile {t}"),
            Self::BlockerRemoved(t) => write!(f, "blocker removed from tile {t}"),
            Self::StopToggled(t) => write!(f, "stop toggled on tile {t}"),
            Self::DiagonalModeToggled(on) => write!(f, "diagonal movement {}", on_off(*on)),
            Self::SeekModeToggled(on) => write!(f, "seek mode {}", on_off(*on)),
            Self::TileClaimed { agent, tile } => write!(f, "agent {agent} claimed tile {tile}"),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Subscription channel of a [`WorldEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Blockers,
    Stops,
    Diagonal,
    SeekMode,
    TileClaimed,
}

impl EventKind {
    pub const COUNT: usize = 5;

    pub const ALL: [EventKind; Self::COUNT] = [
        Self::Blockers,
        Self::Stops,
        Self::Diagonal,
        Self::SeekMode,
        Self::TileClaimed,
    ];

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// A registered recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscriber {
    Agent(AgentId),
    /// Index of a callback registered with [`EventBus::observe`].
    Observer(usize),
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    who: Subscriber,
    /// First queue sequence number this subscriber hears about.
    since: u64,
}

type Observer = Box<dyn FnMut(&WorldEvent)>;

/// Pending events plus who listens to what.
///
/// The bus only stores and orders; the simulation pops due events together
/// with their recipients and hands the event to each in turn. A subscriber
/// never receives an event queued before it registered.
#[derive(Default)]
pub struct EventBus {
    queue: EventQueue<WorldEvent>,
    subscriptions: [Vec<Subscription>; EventKind::COUNT],
    observers: Vec<Observer>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` for `kind`.
    ///
    /// Registering again keeps the agent's place in line but drops every
    /// event queued so far.
    pub fn subscribe(&mut self, kind: EventKind, agent: AgentId) {
        let since = self.queue.next_seq();
        let subs = &mut self.subscriptions[kind.slot()];
        match subs.iter_mut().find(|s| s.who == Subscriber::Agent(agent)) {
            Some(sub) => sub.since = since,
            None => subs.push(Subscription {
                who: Subscriber::Agent(agent),
                since,
            }),
        }
    }

    /// Register `agent` for every kind.
    pub fn subscribe_all(&mut self, agent: AgentId) {
        for kind in EventKind::ALL {
            self.subscribe(kind, agent);
        }
    }

    /// Register a callback for `kind`, returning its observer index.
    pub fn observe(&mut self, kind: EventKind, f: impl FnMut(&WorldEvent) + 'static) -> usize {
        let slot = self.observers.len();
        self.observers.push(Box::new(f));
        self.subscriptions[kind.slot()].push(Subscription {
            who: Subscriber::Observer(slot),
            since: self.queue.next_seq(),
        });
        slot
    }

    /// Recipients of `kind`, in registration order.
    pub fn subscribers(&self, kind: EventKind) -> impl Iterator<Item = Subscriber> + '_ {
        self.subscriptions[kind.slot()].iter().map(|s| s.who)
    }

    /// Queue `event` for delivery at `tick`.
    pub fn raise(&mut self, event: WorldEvent, tick: u64) {
        self.queue.push(event, tick);
    }

    /// Next event raised at or before `tick`, with the subscribers that were
    /// registered when it was raised.
    pub fn pop_due(&mut self, tick: u64) -> Option<(WorldEvent, Vec<Subscriber>)> {
        let (event, seq) = self.queue.pop_due(tick)?;
        let recipients = self.subscriptions[event.kind().slot()]
            .iter()
            .filter(|s| s.since <= seq)
            .map(|s| s.who)
            .collect();
        Some((event, recipients))
    }

    /// Run observer `slot` on `event`.
    pub fn notify_observer(&mut self, slot: usize, event: &WorldEvent) {
        if let Some(f) = self.observers.get_mut(slot) {
            f(event);
        }
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
