//! Component collections owned by the environment.
//!
//! [`ComponentQueue`] keeps its members sorted by a [`QueueOrder`];
//! [`ComponentList`] keeps insertion order. Both sample their length over
//! time and the length of stay of every member that leaves.

mod list;
mod queue;

pub use list::{ComponentList, ListEntry};
pub use queue::{ComponentQueue, QueueEntry, QueueOrder};

use tracing::debug;

use crate::entity::Entity;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, ListId, QueueId};
use crate::monitor::{SampleSummary, TimelineSummary};
use crate::priority::Priority;
use crate::time::TickTime;
use crate::trace::TraceKind;

/// Snapshot of a collection's counters and statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionStatistics {
    pub name: String,
    pub timestamp: TickTime,
    pub size: usize,
    pub added: u64,
    pub removed: u64,
    pub length: TimelineSummary,
    pub length_of_stay: SampleSummary,
}

// ── Queues ────────────────────────────────────────────────────────────

impl Environment {
    /// Create a queue owned by the environment.
    pub fn create_queue(
        &mut self,
        name: &str,
        order: QueueOrder,
        capacity: Option<usize>,
    ) -> QueueId {
        let id = QueueId::from_index(self.queues.len());
        let name = self.names.assign(name);
        debug!(queue = %id, %name, ?capacity, "queue created");
        let entity = Entity::new(name, self.now);
        self.queues.push(ComponentQueue::new(
            entity,
            order,
            capacity,
            self.config.tracking.queue_statistics,
        ));
        id
    }

    /// Borrow a queue.
    pub fn queue(&self, id: QueueId) -> SimResult<&ComponentQueue> {
        self.queues.get(id.index()).ok_or(SimError::UnknownQueue(id))
    }

    fn queue_mut(&mut self, id: QueueId) -> SimResult<&mut ComponentQueue> {
        self.queues
            .get_mut(id.index())
            .ok_or(SimError::UnknownQueue(id))
    }

    /// Add `component` to queue `id`. A full queue returns the
    /// recoverable `QueueCapacityExceeded`.
    pub fn enqueue(
        &mut self,
        id: QueueId,
        component: ComponentId,
        priority: Option<Priority>,
    ) -> SimResult<()> {
        self.record(component)?;
        let now = self.now;
        let queue = self.queue_mut(id)?;
        queue.add(component, priority, now)?;
        let collection = queue.name().to_string();
        self.publish(TraceKind::QueueEntered {
            collection,
            component,
        });
        Ok(())
    }

    /// Remove `component` from queue `id`. Returns `false` if it was not
    /// a member.
    pub fn dequeue(&mut self, id: QueueId, component: ComponentId) -> SimResult<bool> {
        let now = self.now;
        let queue = self.queue_mut(id)?;
        let Some(entry) = queue.remove(component, now) else {
            return Ok(false);
        };
        let collection = queue.name().to_string();
        self.publish(TraceKind::QueueLeft {
            collection,
            component,
            stay: now - entry.enter_time,
        });
        Ok(true)
    }

    /// Remove and return the head of queue `id`.
    pub fn poll_queue(&mut self, id: QueueId) -> SimResult<Option<ComponentId>> {
        let now = self.now;
        let queue = self.queue_mut(id)?;
        let Some(entry) = queue.poll(now) else {
            return Ok(None);
        };
        let collection = queue.name().to_string();
        self.publish(TraceKind::QueueLeft {
            collection,
            component: entry.component,
            stay: now - entry.enter_time,
        });
        Ok(Some(entry.component))
    }

    /// Re-sort `component` after a priority or key change.
    pub fn update_queue_order(
        &mut self,
        id: QueueId,
        component: ComponentId,
        priority: Option<Priority>,
        key: Option<f64>,
    ) -> SimResult<bool> {
        Ok(self.queue_mut(id)?.update_order_of(component, priority, key))
    }

    /// Change the member bound of a queue.
    pub fn set_queue_capacity(&mut self, id: QueueId, capacity: Option<usize>) -> SimResult<()> {
        self.queue_mut(id)?.set_capacity(capacity);
        Ok(())
    }

    /// Statistics snapshot of a queue at the current time.
    pub fn queue_statistics(&self, id: QueueId) -> SimResult<CollectionStatistics> {
        Ok(self.queue(id)?.statistics(self.now))
    }
}

// ── Lists ─────────────────────────────────────────────────────────────

impl Environment {
    /// Create a list owned by the environment.
    pub fn create_list(&mut self, name: &str, capacity: Option<usize>) -> ListId {
        let id = ListId::from_index(self.lists.len());
        let name = self.names.assign(name);
        debug!(list = %id, %name, ?capacity, "list created");
        let entity = Entity::new(name, self.now);
        self.lists.push(ComponentList::new(
            entity,
            capacity,
            self.config.tracking.queue_statistics,
        ));
        id
    }

    /// Borrow a list.
    pub fn list(&self, id: ListId) -> SimResult<&ComponentList> {
        self.lists.get(id.index()).ok_or(SimError::UnknownList(id))
    }

    fn list_mut(&mut self, id: ListId) -> SimResult<&mut ComponentList> {
        self.lists.get_mut(id.index()).ok_or(SimError::UnknownList(id))
    }

    /// Append `component` to a list and publish `QueueEntered`.
    pub fn list_add(&mut self, id: ListId, component: ComponentId) -> SimResult<()> {
        self.record(component)?;
        let now = self.now;
        let list = self.list_mut(id)?;
        list.add(component, now)?;
        let collection = list.name().to_string();
        self.publish(TraceKind::QueueEntered {
            collection,
            component,
        });
        Ok(())
    }

    /// Remove `component` from a list. Returns `false` if it was absent.
    pub fn list_remove(&mut self, id: ListId, component: ComponentId) -> SimResult<bool> {
        let now = self.now;
        let list = self.list_mut(id)?;
        let Some(entry) = list.remove(component, now) else {
            return Ok(false);
        };
        let collection = list.name().to_string();
        self.publish(TraceKind::QueueLeft {
            collection,
            component,
            stay: now - entry.enter_time,
        });
        Ok(true)
    }

    /// Remove and return the oldest member of list `id`.
    pub fn list_poll(&mut self, id: ListId) -> SimResult<Option<ComponentId>> {
        let now = self.now;
        let list = self.list_mut(id)?;
        let Some(entry) = list.poll(now) else {
            return Ok(None);
        };
        let collection = list.name().to_string();
        self.publish(TraceKind::QueueLeft {
            collection,
            component: entry.component,
            stay: now - entry.enter_time,
        });
        Ok(Some(entry.component))
    }

    /// Statistics snapshot of a list at the current time.
    pub fn list_statistics(&self, id: ListId) -> SimResult<CollectionStatistics> {
        Ok(self.list(id)?.statistics(self.now))
    }
}
