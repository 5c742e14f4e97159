//! `ComponentQueue`: comparator-ordered holding area with statistics.

use std::cmp::Ordering;

use crate::entity::Entity;
use crate::error::{SimError, SimResult};
use crate::id::ComponentId;
use crate::monitor::{LevelTimeline, SampleStatistics};
use crate::priority::Priority;
use crate::time::TickTime;

use super::CollectionStatistics;

/// One member of a [`ComponentQueue`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueEntry {
    pub component: ComponentId,
    pub enter_time: TickTime,
    pub priority: Priority,
    /// Secondary sort key used by [`QueueOrder::PriorityKey`].
    pub key: f64,
    /// Arrival sequence number, unique within the queue.
    pub seq: u64,
}

/// How a [`ComponentQueue`] orders its members.
#[derive(Debug, Clone, Copy, Default)]
pub enum QueueOrder {
    /// Priority desc, then enter time asc (FCFS with priority override).
    #[default]
    PriorityFcfs,
    /// Priority desc, then `key` asc, then arrival.
    PriorityKey,
    /// Most recent arrival first.
    Lifo,
    Custom(fn(&QueueEntry, &QueueEntry) -> Ordering),
}

impl QueueOrder {
    /// `Less` means `a` is served before `b`.
    pub fn compare(&self, a: &QueueEntry, b: &QueueEntry) -> Ordering {
        match self {
            QueueOrder::PriorityFcfs => b
                .priority
                .cmp(&a.priority)
                .then_with(|| a.enter_time.cmp(&b.enter_time))
                .then_with(|| a.seq.cmp(&b.seq)),
            QueueOrder::PriorityKey => b
                .priority
                .cmp(&a.priority)
                .then_with(|| a.key.total_cmp(&b.key))
                .then_with(|| a.seq.cmp(&b.seq)),
            QueueOrder::Lifo => b.seq.cmp(&a.seq),
            QueueOrder::Custom(f) => f(a, b).then_with(|| a.seq.cmp(&b.seq)),
        }
    }
}

/// Ordered container of components waiting for service.
///
/// Every structural change samples the queue length; every removal
/// samples the length of stay (`now - enter_time`).
#[derive(Debug, Clone)]
pub struct ComponentQueue {
    entity: Entity,
    order: QueueOrder,
    entries: Vec<QueueEntry>,
    capacity: Option<usize>,
    next_seq: u64,
    added: u64,
    removed: u64,
    length: LevelTimeline,
    stay: SampleStatistics,
}

impl ComponentQueue {
    /// Create an empty queue. `track` enables the length timeline.
    pub fn new(entity: Entity, order: QueueOrder, capacity: Option<usize>, track: bool) -> Self {
        let length = LevelTimeline::new(entity.created_at, 0.0, track);
        ComponentQueue {
            entity,
            order,
            entries: Vec::new(),
            capacity,
            next_seq: 0,
            added: 0,
            removed: 0,
            length,
            stay: SampleStatistics::new(),
        }
    }

    /// Returns the queue's name.
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    /// Name and creation time.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// The ordering in effect.
    pub fn order(&self) -> QueueOrder {
        self.order
    }

    /// Maximum number of members, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Change the capacity. Shrinking below the current size is allowed;
    /// subsequent adds fail until the queue drains.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    /// Insert `component` at its comparator position.
    ///
    /// Fails with `QueueCapacityExceeded` when the queue is full.
    pub fn add(
        &mut self,
        component: ComponentId,
        priority: Option<Priority>,
        now: TickTime,
    ) -> SimResult<()> {
        self.add_keyed(component, priority, 0.0, now)
    }

    /// [`add`](Self::add) with an explicit secondary key.
    pub fn add_keyed(
        &mut self,
        component: ComponentId,
        priority: Option<Priority>,
        key: f64,
        now: TickTime,
    ) -> SimResult<()> {
        if let Some(cap) = self.capacity {
            if self.entries.len() >= cap {
                return Err(SimError::QueueCapacityExceeded {
                    collection: self.entity.name.clone(),
                    capacity: cap,
                });
            }
        }
        let entry = QueueEntry {
            component,
            enter_time: now,
            priority: priority.unwrap_or_default(),
            key,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.insert_sorted(entry);
        self.added += 1;
        self.length.record(now, self.entries.len() as f64);
        Ok(())
    }

    fn insert_sorted(&mut self, entry: QueueEntry) {
        let order = self.order;
        let pos = self
            .entries
            .partition_point(|e| order.compare(e, &entry) != Ordering::Greater);
        self.entries.insert(pos, entry);
    }

    /// Remove and return the head.
    pub fn poll(&mut self, now: TickTime) -> Option<QueueEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.record_exit(&entry, now);
        Some(entry)
    }

    /// Remove `component`. Returns its entry if it was a member.
    pub fn remove(&mut self, component: ComponentId, now: TickTime) -> Option<QueueEntry> {
        let pos = self.position(component)?;
        let entry = self.entries.remove(pos);
        self.record_exit(&entry, now);
        Some(entry)
    }

    fn record_exit(&mut self, entry: &QueueEntry, now: TickTime) {
        self.removed += 1;
        self.stay.record(now - entry.enter_time);
        self.length.record(now, self.entries.len() as f64);
    }

    /// Re-position `component` after its ordering attributes changed.
    ///
    /// Implemented as remove + re-insert; the enter time and arrival
    /// sequence are kept and no statistics are sampled.
    pub fn update_order_of(
        &mut self,
        component: ComponentId,
        priority: Option<Priority>,
        key: Option<f64>,
    ) -> bool {
        let Some(pos) = self.position(component) else {
            return false;
        };
        let mut entry = self.entries.remove(pos);
        if let Some(p) = priority {
            entry.priority = p;
        }
        if let Some(k) = key {
            entry.key = k;
        }
        self.insert_sorted(entry);
        true
    }

    /// Returns `true` if `component` is queued.
    pub fn contains(&self, component: ComponentId) -> bool {
        self.position(component).is_some()
    }

    /// Zero-based position of `component`, head first.
    pub fn position(&self, component: ComponentId) -> Option<usize> {
        self.entries.iter().position(|e| e.component == component)
    }

    /// The entry of `component`, if queued.
    pub fn get(&self, component: ComponentId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.component == component)
    }

    /// The head entry without removing it.
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.first()
    }

    /// Entries in queue order, head first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Members in service order.
    pub fn components(&self) -> Vec<ComponentId> {
        self.entries.iter().map(|e| e.component).collect()
    }

    /// Returns the number of queued components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total successful adds.
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Total removals (poll + remove).
    pub fn removed(&self) -> u64 {
        self.removed
    }

    /// Length over time.
    pub fn length_timeline(&self) -> &LevelTimeline {
        &self.length
    }

    /// Time each departed member spent queued.
    pub fn length_of_stay(&self) -> &SampleStatistics {
        &self.stay
    }

    /// Snapshot of counters and summaries at `now`.
    pub fn statistics(&self, now: TickTime) -> CollectionStatistics {
        CollectionStatistics {
            name: self.entity.name.clone(),
            timestamp: now,
            size: self.entries.len(),
            added: self.added,
            removed: self.removed,
            length: self.length.summary(now),
            length_of_stay: self.stay.summary(),
        }
    }
}
