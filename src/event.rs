//! Event records for the future-event list.
//!
//! Every pending resumption of a component is an `Event`. Events are
//! immutable once pushed; rescheduling a component pushes a new event and
//! invalidates the old one (see [`crate::scheduler::Scheduler`]).

use std::cmp::Ordering;

use crate::id::ComponentId;
use crate::priority::Priority;
use crate::time::TickTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// The monotonic nature of `EventId` is the final tie-breaker in the
/// scheduler: events with equal time, priority and urgency are ordered
/// by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A pending resumption of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,

    /// The virtual time at which the component resumes.
    pub scheduled_at: TickTime,

    /// Tie-breaker among events at the same time; higher runs first.
    pub priority: Priority,

    /// Urgent events run before non-urgent ones of equal time and priority.
    pub urgent: bool,

    /// The component to resume.
    pub component: ComponentId,
}

impl Event {
    /// Build an event. Ids come from the scheduler's generator.
    pub fn new(
        id: EventId,
        scheduled_at: TickTime,
        priority: Priority,
        urgent: bool,
        component: ComponentId,
    ) -> Self {
        Event {
            id,
            scheduled_at,
            priority,
            urgent,
            component,
        }
    }
}

/// Ordering: earliest time, then highest priority, then urgent, then
/// lowest id first.
///
/// Rust's `BinaryHeap` is a *max*-heap, so the natural ordering is
/// **reversed** here to turn it into a min-heap on the key above.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.urgent.cmp(&other.urgent))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} resume {} ({}{})",
            self.id,
            self.scheduled_at,
            self.component,
            self.priority,
            if self.urgent { ", urgent" } else { "" }
        )
    }
}
