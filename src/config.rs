//! Environment configuration.

use crate::resource::HonorPolicy;

/// What `run` does when the event list drains before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EmptyQueuePolicy {
    /// Return immediately; the clock stays at the last event.
    Stop,
    /// Advance the clock to the deadline, then return.
    #[default]
    Idle,
}

/// Which statistics are sampled.
///
/// Disabled timelines keep only their current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackingConfig {
    pub queue_statistics: bool,
    pub resource_timelines: bool,
    pub state_timelines: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            queue_statistics: true,
            resource_timelines: true,
            state_timelines: true,
        }
    }
}

impl TrackingConfig {
    /// Track nothing beyond current values.
    pub fn off() -> Self {
        TrackingConfig {
            queue_statistics: false,
            resource_timelines: false,
            state_timelines: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvConfig {
    /// Seed of the default sampler.
    pub seed: u64,
    pub empty_queue: EmptyQueuePolicy,
    /// Keep every trace record in memory (see `Environment::trace`).
    pub record_trace: bool,
    pub tracking: TrackingConfig,
    /// Policy for resources created without an explicit one.
    pub default_honor_policy: HonorPolicy,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            seed: 42,
            empty_queue: EmptyQueuePolicy::default(),
            record_trace: false,
            tracking: TrackingConfig::default(),
            default_honor_policy: HonorPolicy::default(),
        }
    }
}
