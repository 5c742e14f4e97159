//! Arbitration knobs: honor policies, capacity-limit modes and resource
//! selection.

use crate::error::{SimError, SimResult};

/// The order in which competing requests on one resource are honored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum HonorPolicy {
    /// Only the head of the requester queue may be granted
    /// (head-of-line blocking).
    #[default]
    StrictFcfs,
    /// Every request that fits is granted, in queue order.
    RelaxedFcfs,
    /// Shortest request first: the requester queue is ordered by
    /// priority, then requested quantity. Only the head may be granted.
    Sqf,
    /// Blend of arrival order and request size.
    ///
    /// Within the top priority class each requester scores
    /// `alpha * arrival_rank + (1 - alpha) * quantity_rank`; the scan
    /// visits requesters by ascending score and grants every one that
    /// fits. `alpha` must lie in `[0, 1]`.
    WeightedFcfs(f64),
}

impl HonorPolicy {
    /// Reject weights outside `[0, 1]`.
    pub fn validate(self) -> SimResult<Self> {
        if let HonorPolicy::WeightedFcfs(alpha) = self {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(SimError::InvalidPolicy(format!(
                    "weighted FCFS alpha must be in [0, 1], got {}",
                    alpha
                )));
            }
        }
        Ok(self)
    }

    /// Policies where only the front of the queue may be served.
    pub(crate) fn is_head_of_line(self) -> bool {
        matches!(self, HonorPolicy::StrictFcfs | HonorPolicy::Sqf)
    }
}

/// What happens when a single request can never fit the capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CapacityLimitMode {
    /// Reject with `SimError::CapacityLimit`.
    #[default]
    Error,
    /// Truncate: takes to the capacity, puts to the free room.
    Cap,
    /// Queue anyway and wait for the capacity to grow.
    Schedule,
}

/// Strategy for picking one resource out of a set of alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionPolicy {
    /// Fewest pending requesters; ties go to the earlier resource.
    ShortestQueue,
    /// First resource with enough available quantity, if any.
    FirstAvailable,
    /// Any resource, uniformly at random.
    RandomOrder,
    /// A random resource among those with enough available quantity.
    RandomAvailable,
    /// Cycle through the set, one step per selection.
    RoundRobin,
}
