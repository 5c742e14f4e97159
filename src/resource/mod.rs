//! Capacity-bounded resources and their arbitration.
//!
//! A regular resource hands out claims up to its capacity and tracks who
//! holds them. A depletable resource is a level in `[0, capacity]`:
//! positive requests take from it, negative ones put back. Both share one
//! structure, with `level = capacity - claimed`.

mod arbitration;
mod policy;
mod request;

#[cfg(test)]
mod tests;

pub use policy::{CapacityLimitMode, HonorPolicy, SelectionPolicy};
pub use request::{FailAfter, Request};

use tracing::debug;

use crate::collections::{CollectionStatistics, ComponentQueue, QueueOrder};
use crate::entity::Entity;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, ResourceId};
use crate::monitor::{LevelTimeline, TimelineSummary};
use crate::time::TickTime;

/// Tolerance for quantity comparisons.
pub const EPS: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    Regular,
    Depletable,
}

// ── ResourceSpec ──────────────────────────────────────────────────────

/// Construction parameters for [`Environment::create_resource`].
///
/// ```rust
/// # use kairos::{ResourceSpec, HonorPolicy};
/// let clerks = ResourceSpec::new("clerks", 3.0).policy(HonorPolicy::RelaxedFcfs);
/// let tank = ResourceSpec::new("tank", 100.0).depletable(40.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    name: String,
    capacity: f64,
    policy: Option<HonorPolicy>,
    preemptive: bool,
    limit_mode: CapacityLimitMode,
    initial_level: Option<f64>,
}

impl ResourceSpec {
    /// A regular resource with strict FCFS honoring.
    pub fn new(name: impl Into<String>, capacity: f64) -> Self {
        ResourceSpec {
            name: name.into(),
            capacity,
            policy: None,
            preemptive: false,
            limit_mode: CapacityLimitMode::default(),
            initial_level: None,
        }
    }

    /// Requester honor policy.
    pub fn policy(mut self, policy: HonorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Higher-priority requests may bump lower-priority claimers.
    pub fn preemptive(mut self, preemptive: bool) -> Self {
        self.preemptive = preemptive;
        self
    }

    /// What happens when a single request exceeds capacity.
    pub fn capacity_limit(mut self, mode: CapacityLimitMode) -> Self {
        self.limit_mode = mode;
        self
    }

    /// Make the resource depletable, starting at `initial_level`.
    pub fn depletable(mut self, initial_level: f64) -> Self {
        self.initial_level = Some(initial_level);
        self
    }
}

// ── Resource ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) entity: Entity,
    pub(crate) kind: ResourceKind,
    pub(crate) capacity: f64,
    pub(crate) claimed: f64,
    pub(crate) policy: HonorPolicy,
    pub(crate) preemptive: bool,
    pub(crate) limit_mode: CapacityLimitMode,
    pub(crate) requesters: ComponentQueue,
    pub(crate) claimers: ComponentQueue,
    pub(crate) capacity_timeline: LevelTimeline,
    pub(crate) claimed_timeline: LevelTimeline,
}

impl Resource {
    /// Returns the resource's name.
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    /// Regular or depletable.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns `true` for depletable resources.
    pub fn is_depletable(&self) -> bool {
        self.kind == ResourceKind::Depletable
    }

    /// Current capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Quantity currently claimed.
    pub fn claimed(&self) -> f64 {
        self.claimed
    }

    /// Capacity not claimed.
    pub fn available(&self) -> f64 {
        self.capacity - self.claimed
    }

    /// Fill level of a depletable resource. Same as `available`.
    pub fn level(&self) -> f64 {
        self.available()
    }

    /// The honor policy in effect.
    pub fn policy(&self) -> HonorPolicy {
        self.policy
    }

    /// Returns `true` if higher-priority requests may bump claimers.
    pub fn is_preemptive(&self) -> bool {
        self.preemptive
    }

    /// The capacity limit mode in effect.
    pub fn limit_mode(&self) -> CapacityLimitMode {
        self.limit_mode
    }

    /// Components waiting for this resource, in honor order.
    pub fn requesters(&self) -> &ComponentQueue {
        &self.requesters
    }

    /// Components holding a claim, in claim order.
    pub fn claimers(&self) -> &ComponentQueue {
        &self.claimers
    }

    /// Number of waiting components.
    pub fn requester_count(&self) -> usize {
        self.requesters.len()
    }

    /// Number of claiming components.
    pub fn claimer_count(&self) -> usize {
        self.claimers.len()
    }

    /// Capacity over time.
    pub fn capacity_timeline(&self) -> &LevelTimeline {
        &self.capacity_timeline
    }

    /// Claimed quantity over time.
    pub fn claimed_timeline(&self) -> &LevelTimeline {
        &self.claimed_timeline
    }

    /// Whether a request for `quantity` fits right now.
    pub(crate) fn fits(&self, quantity: f64) -> bool {
        if quantity > 0.0 {
            quantity <= self.capacity - self.claimed + EPS
        } else {
            -quantity <= self.claimed + EPS
        }
    }

    pub(crate) fn set_claimed(&mut self, claimed: f64, now: TickTime) {
        self.claimed = if claimed.abs() < EPS { 0.0 } else { claimed };
        self.claimed_timeline.record(now, self.claimed);
    }

    /// Snapshot of timelines and queue statistics at `now`.
    pub fn statistics(&self, now: TickTime) -> ResourceStatistics {
        ResourceStatistics {
            name: self.entity.name.clone(),
            timestamp: now,
            capacity: self.capacity_timeline.summary(now),
            claimed: self.claimed_timeline.summary(now),
            requesters: self.requesters.statistics(now),
            claimers: self.claimers.statistics(now),
        }
    }
}

/// Snapshot of a resource's timelines and queues.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceStatistics {
    pub name: String,
    pub timestamp: TickTime,
    pub capacity: TimelineSummary,
    pub claimed: TimelineSummary,
    pub requesters: CollectionStatistics,
    pub claimers: CollectionStatistics,
}

// ── Environment: creation & queries ───────────────────────────────────

impl Environment {
    /// Create a resource from `spec`. Invalid capacities, levels or policies are rejected.
    pub fn create_resource(&mut self, spec: ResourceSpec) -> SimResult<ResourceId> {
        let id = ResourceId::from_index(self.resources.len());
        if !spec.capacity.is_finite() || spec.capacity < 0.0 {
            return Err(SimError::InvalidQuantity {
                resource: id,
                quantity: spec.capacity,
            });
        }
        let policy = spec
            .policy
            .unwrap_or(self.config.default_honor_policy)
            .validate()?;
        let (kind, claimed) = match spec.initial_level {
            Some(level) => {
                if !level.is_finite() || level < 0.0 || level > spec.capacity + EPS {
                    return Err(SimError::CapacityLimit {
                        resource: id,
                        reason: format!(
                            "initial level {} outside [0, {}]",
                            level, spec.capacity
                        ),
                    });
                }
                (ResourceKind::Depletable, spec.capacity - level)
            }
            None => (ResourceKind::Regular, 0.0),
        };

        let now = self.now;
        let track_timelines = self.config.tracking.resource_timelines;
        let track_queues = self.config.tracking.queue_statistics;
        let name = self.names.assign(&spec.name);
        let order = match policy {
            HonorPolicy::Sqf => QueueOrder::PriorityKey,
            _ => QueueOrder::PriorityFcfs,
        };
        let requesters = ComponentQueue::new(
            Entity::new(format!("{}.requesters", name), now),
            order,
            None,
            track_queues,
        );
        let claimers = ComponentQueue::new(
            Entity::new(format!("{}.claimers", name), now),
            QueueOrder::PriorityFcfs,
            None,
            track_queues,
        );
        debug!(resource = %id, %name, capacity = spec.capacity, ?kind, ?policy, "resource created");
        self.resources.push(Resource {
            entity: Entity::new(name, now),
            kind,
            capacity: spec.capacity,
            claimed,
            policy,
            preemptive: spec.preemptive,
            limit_mode: spec.limit_mode,
            requesters,
            claimers,
            capacity_timeline: LevelTimeline::new(now, spec.capacity, track_timelines),
            claimed_timeline: LevelTimeline::new(now, claimed, track_timelines),
        });
        Ok(id)
    }

    /// Borrow a resource.
    pub fn resource(&self, id: ResourceId) -> SimResult<&Resource> {
        self.resources
            .get(id.index())
            .ok_or(SimError::UnknownResource(id))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> SimResult<&mut Resource> {
        self.resources
            .get_mut(id.index())
            .ok_or(SimError::UnknownResource(id))
    }

    /// Every resource id in creation order.
    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.resources.len()).map(ResourceId::from_index)
    }

    /// Quantity of `resource` currently claimed by `component`.
    pub fn claimed_by(&self, component: ComponentId, resource: ResourceId) -> SimResult<f64> {
        self.resource(resource)?;
        Ok(self
            .record(component)?
            .claims
            .get(&resource)
            .copied()
            .unwrap_or(0.0))
    }

    /// Quantity of `resource` that `component` is waiting for.
    pub fn requested_by(&self, component: ComponentId, resource: ResourceId) -> SimResult<f64> {
        self.resource(resource)?;
        Ok(self
            .record(component)?
            .requests
            .get(&resource)
            .copied()
            .unwrap_or(0.0))
    }

    /// Statistics snapshot of `id` at the current time.
    pub fn resource_statistics(&self, id: ResourceId) -> SimResult<ResourceStatistics> {
        Ok(self.resource(id)?.statistics(self.now))
    }
}
