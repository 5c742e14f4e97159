//! `ComponentList`: insertion-ordered membership with statistics.

use crate::entity::Entity;
use crate::error::{SimError, SimResult};
use crate::id::ComponentId;
use crate::monitor::{LevelTimeline, SampleStatistics};
use crate::time::TickTime;

use super::CollectionStatistics;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ListEntry {
    pub component: ComponentId,
    pub enter_time: TickTime,
}

/// A list of components in the order they were added.
///
/// Supports removal from anywhere. Statistics follow the same rules as
/// [`ComponentQueue`](super::ComponentQueue).
#[derive(Debug, Clone)]
pub struct ComponentList {
    entity: Entity,
    entries: Vec<ListEntry>,
    capacity: Option<usize>,
    added: u64,
    removed: u64,
    length: LevelTimeline,
    stay: SampleStatistics,
}

impl ComponentList {
    /// Create an empty list. `track` enables the length timeline.
    pub fn new(entity: Entity, capacity: Option<usize>, track: bool) -> Self {
        let length = LevelTimeline::new(entity.created_at, 0.0, track);
        ComponentList {
            entity,
            entries: Vec::new(),
            capacity,
            added: 0,
            removed: 0,
            length,
            stay: SampleStatistics::new(),
        }
    }

    /// Returns the list's name.
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    /// Maximum number of members, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Change the bound. Existing members are kept even if over it.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    /// Append `component`. Fails with `QueueCapacityExceeded` when full.
    pub fn add(&mut self, component: ComponentId, now: TickTime) -> SimResult<()> {
        if let Some(cap) = self.capacity {
            if self.entries.len() >= cap {
                return Err(SimError::QueueCapacityExceeded {
                    collection: self.entity.name.clone(),
                    capacity: cap,
                });
            }
        }
        self.entries.push(ListEntry {
            component,
            enter_time: now,
        });
        self.added += 1;
        self.length.record(now, self.entries.len() as f64);
        Ok(())
    }

    /// Remove the first occurrence of `component`.
    pub fn remove(&mut self, component: ComponentId, now: TickTime) -> Option<ListEntry> {
        let pos = self.entries.iter().position(|e| e.component == component)?;
        let entry = self.entries.remove(pos);
        self.record_exit(&entry, now);
        Some(entry)
    }

    /// Remove and return the oldest member.
    pub fn poll(&mut self, now: TickTime) -> Option<ListEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.record_exit(&entry, now);
        Some(entry)
    }

    fn record_exit(&mut self, entry: &ListEntry, now: TickTime) {
        self.removed += 1;
        self.stay.record(now - entry.enter_time);
        self.length.record(now, self.entries.len() as f64);
    }

    /// Returns `true` if `component` is a member.
    pub fn contains(&self, component: ComponentId) -> bool {
        self.entries.iter().any(|e| e.component == component)
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries.iter()
    }

    /// Member ids in insertion order.
    pub fn components(&self) -> Vec<ComponentId> {
        self.entries.iter().map(|e| e.component).collect()
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total additions since creation.
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Total removals since creation.
    pub fn removed(&self) -> u64 {
        self.removed
    }

    /// Length over time.
    pub fn length_timeline(&self) -> &LevelTimeline {
        &self.length
    }

    /// Time each departed member spent in the list.
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
