//! Deterministic future-event list.
//!
//! A `BinaryHeap` with reversed `Ord` on `Event` acts as a min-heap keyed
//! by `(time, priority desc, urgent, event_id)`. Each component has at most
//! one live event. Rescheduling or cancelling a component only updates the
//! `live` index; the superseded heap entry is discarded lazily when it
//! reaches the top.

use std::collections::{BinaryHeap, HashMap};

use crate::event::{Event, EventId, EventIdGen};
use crate::id::ComponentId;
use crate::priority::Priority;
use crate::time::TickTime;

/// The event heap plus its liveness index.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Min-heap (via reversed Ord on Event). May contain stale entries.
    queue: BinaryHeap<Event>,

    /// The one live event per scheduled component.
    live: HashMap<ComponentId, EventId>,

    /// Monotonic event-ID generator.
    id_gen: EventIdGen,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `component` at `at`, replacing any event it already has.
    ///
    /// Causality (`at >= now`) is checked by the caller, which owns the
    /// clock.
    pub fn schedule(
        &mut self,
        component: ComponentId,
        at: TickTime,
        priority: Priority,
        urgent: bool,
    ) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, priority, urgent, component));
        self.live.insert(component, id);
        id
    }

    /// Drop the live event of `component`. Returns `true` if one existed.
    pub fn cancel(&mut self, component: ComponentId) -> bool {
        self.live.remove(&component).is_some()
    }

    /// Returns `true` if `component` has a live event.
    pub fn is_scheduled(&self, component: ComponentId) -> bool {
        self.live.contains_key(&component)
    }

    /// Pop the next live event.
    ///
    /// Returns `None` when no live events remain.
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(event) = self.queue.pop() {
            if self.live.get(&event.component) == Some(&event.id) {
                self.live.remove(&event.component);
                return Some(event);
            }
        }
        None
    }

    /// Peek at the next live event without removing it.
    pub fn peek_next(&mut self) -> Option<&Event> {
        self.purge_stale();
        self.queue.peek()
    }

    fn purge_stale(&mut self) {
        while let Some(top) = self.queue.peek() {
            if self.live.get(&top.component) == Some(&top.id) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Returns `true` if there are no live events.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns the number of live events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Drain all live events in dispatch order into a `Vec`.
    /// Useful for testing and snapshotting.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.live.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        self.queue.clear();
        events
    }
}
