//! Fluent builder for [`Environment`] setup.

use crate::config::{EmptyQueuePolicy, EnvConfig, TrackingConfig};
use crate::environment::Environment;
use crate::registry::Registry;
use crate::resource::HonorPolicy;
use crate::sampler::Sampler;
use crate::trace::TraceListener;
use crate::transform::TickTransform;

// ── EnvironmentBuilder ────────────────────────────────────────────────

/// Fluent builder for an [`Environment`].
///
/// # Example
/// ```rust
/// use kairos::{Environment, EmptyQueuePolicy};
///
/// struct Config { service_time: f64 }
///
/// let env = Environment::builder()
///     .seed(7)
///     .record_trace()
///     .empty_queue(EmptyQueuePolicy::Stop)
///     .dependency(Config { service_time: 4.0 })
///     .build();
/// assert_eq!(env.dependency::<Config>().unwrap().service_time, 4.0);
/// ```
pub struct EnvironmentBuilder {
    config: EnvConfig,
    registry: Registry,
    sampler: Option<Box<dyn Sampler>>,
    transform: Option<Box<dyn TickTransform>>,
    listeners: Vec<Box<dyn TraceListener>>,
}

impl EnvironmentBuilder {
    /// Start from `EnvConfig::default()` with no services installed.
    pub fn new() -> Self {
        EnvironmentBuilder {
            config: EnvConfig::default(),
            registry: Registry::new(),
            sampler: None,
            transform: None,
            listeners: Vec::new(),
        }
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: EnvConfig) -> Self {
        self.config = config;
        self
    }

    // ── Config ────────────────────────────────────────────────

    /// Seed of the default sampler.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Keep every trace record in memory.
    pub fn record_trace(mut self) -> Self {
        self.config.record_trace = true;
        self
    }

    /// What the clock does when the event list drains before a deadline.
    pub fn empty_queue(mut self, policy: EmptyQueuePolicy) -> Self {
        self.config.empty_queue = policy;
        self
    }

    /// Select which statistics are collected.
    pub fn tracking(mut self, tracking: TrackingConfig) -> Self {
        self.config.tracking = tracking;
        self
    }

    /// Policy for resources created without one.
    pub fn default_honor_policy(mut self, policy: HonorPolicy) -> Self {
        self.config.default_honor_policy = policy;
        self
    }

    // ── Services ──────────────────────────────────────────────

    /// Replace the seeded default sampler.
    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Install a tick/wall-clock mapping.
    pub fn tick_transform(mut self, transform: impl TickTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Register a dependency, retrievable by type from the environment
    /// and from process bodies.
    pub fn dependency<T: 'static>(mut self, value: T) -> Self {
        self.registry.insert(value);
        self
    }

    /// Register a trace listener. May be called repeatedly.
    pub fn listener(mut self, listener: impl TraceListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    // ── Build ─────────────────────────────────────────────────

    /// Consume the builder and produce an environment at time zero.
    pub fn build(self) -> Environment {
        let mut env = Environment::new(self.config);
        env.registry = self.registry;
        if let Some(sampler) = self.sampler {
            env.set_sampler(sampler);
        }
        if let Some(transform) = self.transform {
            env.set_tick_transform(transform);
        }
        for listener in self.listeners {
            env.add_listener(listener);
        }
        env
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
