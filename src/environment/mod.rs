//! The simulation environment: owner of every component, resource, state
//! and collection, and driver of the event loop.
//!
//! Each step first runs the components that went into standby during the
//! previous step, then pops the next live event, advances the clock and
//! dispatches on the state of the event's component:
//!
//! - `Scheduled`: resume the body.
//! - `WaitingOnResource`: the renege timer fired; withdraw the request,
//!   flag the failure, resume.
//! - `WaitingOnState`: the wait timed out; same treatment.
//!
//! The loop is single-threaded and fully deterministic for a given model
//! and seed.

use std::collections::HashMap;
use std::time::SystemTime;

use tracing::{error, info, trace};

use crate::builder::EnvironmentBuilder;
use crate::collections::{ComponentList, ComponentQueue};
use crate::component::{ComponentRecord, ComponentState};
use crate::config::{EmptyQueuePolicy, EnvConfig};
use crate::context::Context;
use crate::entity::NameRegistry;
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::id::{ComponentId, ResourceId};
use crate::process::Suspension;
use crate::registry::Registry;
use crate::resource::Resource;
use crate::sampler::{Sampler, SeededSampler};
use crate::scheduler::Scheduler;
use crate::state::StateCell;
use crate::time::TickTime;
use crate::trace::{trace_hash, TraceKind, TraceListener, TraceRecord};
use crate::transform::TickTransform;

#[cfg(test)]
mod tests;

// ── Run control ───────────────────────────────────────────────────────

/// How far [`Environment::run`] goes.
pub enum RunUntil {
    /// Until no events remain.
    Quiescent,
    /// For `d` ticks from the current time.
    Duration(f64),
    /// Up to an absolute time.
    Time(TickTime),
    /// Until the predicate holds (checked before every step) or no
    /// events remain.
    Condition(Box<dyn FnMut(&Environment) -> bool>),
}

impl RunUntil {
    /// Box a predicate into `RunUntil::Condition`.
    pub fn condition(f: impl FnMut(&Environment) -> bool + 'static) -> Self {
        RunUntil::Condition(Box::new(f))
    }
}

impl std::fmt::Debug for RunUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunUntil::Quiescent => f.write_str("Quiescent"),
            RunUntil::Duration(d) => write!(f, "Duration({})", d),
            RunUntil::Time(t) => write!(f, "Time({})", t),
            RunUntil::Condition(_) => f.write_str("Condition(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// The deadline was reached.
    Deadline,
    /// No events remained.
    Exhausted,
    /// The run condition held.
    Condition,
    /// A component called `stop_simulation`.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    /// Events dispatched during this call.
    pub events_processed: u64,
    pub final_time: TickTime,
    pub reason: StopReason,
}

// ── Environment ───────────────────────────────────────────────────────

pub struct Environment {
    pub(crate) config: EnvConfig,
    pub(crate) now: TickTime,
    pub(crate) scheduler: Scheduler,

    pub(crate) components: Vec<ComponentRecord>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) states: Vec<Box<dyn StateCell>>,
    pub(crate) queues: Vec<ComponentQueue>,
    pub(crate) lists: Vec<ComponentList>,

    pub(crate) current: Option<ComponentId>,
    pub(crate) standby: Vec<ComponentId>,
    pub(crate) pending_standby: Vec<ComponentId>,
    pub(crate) stop_requested: bool,
    pub(crate) events_processed: u64,

    pub(crate) names: NameRegistry,
    pub(crate) registry: Registry,
    pub(crate) sampler: Box<dyn Sampler>,
    pub(crate) transform: Option<Box<dyn TickTransform>>,
    pub(crate) listeners: Vec<Box<dyn TraceListener>>,
    pub(crate) trace: Vec<TraceRecord>,
    pub(crate) trace_seq: u64,
    pub(crate) round_robin: HashMap<Vec<ResourceId>, usize>,
}

impl Environment {
    /// Create an empty environment at time zero.
    pub fn new(config: EnvConfig) -> Self {
        let sampler = Box::new(SeededSampler::new(config.seed));
        Environment {
            config,
            now: TickTime::ZERO,
            scheduler: Scheduler::new(),
            components: Vec::new(),
            resources: Vec::new(),
            states: Vec::new(),
            queues: Vec::new(),
            lists: Vec::new(),
            current: None,
            standby: Vec::new(),
            pending_standby: Vec::new(),
            stop_requested: false,
            events_processed: 0,
            names: NameRegistry::new(),
            registry: Registry::new(),
            sampler,
            transform: None,
            listeners: Vec::new(),
            trace: Vec::new(),
            trace_seq: 0,
            round_robin: HashMap::new(),
        }
    }

    /// Start a fluent [`EnvironmentBuilder`].
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Current virtual time. Never decreases.
    #[inline]
    pub fn now(&self) -> TickTime {
        self.now
    }

    /// The configuration the environment was built with.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// The component whose body is running, if any.
    pub fn current(&self) -> Option<ComponentId> {
        self.current
    }

    /// Total events dispatched since creation.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of live events.
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// Time of the next live event.
    pub fn peek_next_time(&mut self) -> Option<TickTime> {
        self.scheduler.peek_next().map(|e| e.scheduled_at)
    }

    /// Returns `true` if `component` has a live event.
    pub fn is_scheduled(&self, component: ComponentId) -> bool {
        self.scheduler.is_scheduled(component)
    }

    // ── Services ──────────────────────────────────────────────────────

    /// Borrow the dependency registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutably borrow the dependency registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Look up a registered dependency by type.
    pub fn dependency<T: 'static>(&self) -> SimResult<&T> {
        self.registry.get::<T>()
    }

    /// The random source used by bodies and random selection.
    pub fn sampler_mut(&mut self) -> &mut dyn Sampler {
        self.sampler.as_mut()
    }

    /// Replace the random source.
    pub fn set_sampler(&mut self, sampler: Box<dyn Sampler>) {
        self.sampler = sampler;
    }

    /// Install a tick/wall-clock mapping.
    pub fn set_tick_transform(&mut self, transform: Box<dyn TickTransform>) {
        self.transform = Some(transform);
    }

    /// Wall-clock counterpart of `t`, if a tick transform is installed.
    pub fn wall_time(&self, t: TickTime) -> Option<SystemTime> {
        self.transform.as_ref()?.to_wall_time(t)
    }

    // ── Trace ─────────────────────────────────────────────────────────

    /// Register a trace listener. Listeners see every record in order.
    pub fn add_listener(&mut self, listener: Box<dyn TraceListener>) {
        self.listeners.push(listener);
    }

    /// Recorded trace; empty unless `EnvConfig::record_trace` is set.
    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }

    /// Determinism fingerprint of the recorded trace.
    pub fn trace_hash(&self) -> u64 {
        trace_hash(&self.trace)
    }

    pub(crate) fn publish(&mut self, kind: TraceKind) {
        let record = TraceRecord {
            seq: self.trace_seq,
            time: self.now,
            current: self.current,
            kind,
        };
        self.trace_seq += 1;
        for listener in &mut self.listeners {
            listener.on_record(&record);
        }
        if self.config.record_trace {
            self.trace.push(record);
        }
    }

    // ── Event loop ────────────────────────────────────────────────────

    /// Execute one step: run pending standby components, then pop and
    /// dispatch one event.
    ///
    /// Returns the dispatched event, or `None` if no event was pending.
    pub fn step(&mut self) -> SimResult<Option<Event>> {
        let pending = std::mem::take(&mut self.pending_standby);
        for id in pending {
            if self.record(id)?.state == ComponentState::Standby {
                self.run_component(id)?;
            }
        }
        let woken = std::mem::take(&mut self.standby);
        self.pending_standby.extend(woken);

        let Some(event) = self.scheduler.pop_next() else {
            return Ok(None);
        };
        if event.scheduled_at < self.now {
            return Err(SimError::ClockRegression {
                now: self.now.ticks(),
                event: event.scheduled_at.ticks(),
            });
        }
        self.now = event.scheduled_at;
        self.events_processed += 1;
        trace!(%event, "dispatch");

        let id = event.component;
        let state = self.record(id)?.state;
        self.record_mut(id)?.scheduled_time = None;
        match state {
            ComponentState::Scheduled => {}
            ComponentState::WaitingOnResource => self.renege_request(id)?,
            ComponentState::WaitingOnState => self.renege_wait(id)?,
            other => {
                return Err(SimError::InvalidState {
                    component: id,
                    state: other,
                    action: "be dispatched",
                })
            }
        }
        self.run_component(id)?;
        Ok(Some(event))
    }

    /// Run the body of `id` up to its next suspension.
    fn run_component(&mut self, id: ComponentId) -> SimResult<()> {
        let mut body = self.record_mut(id)?.body.take().ok_or(SimError::NoProcess(id))?;
        self.transition(id, ComponentState::Current)?;
        self.current = Some(id);

        let result = {
            let mut cx = Context::new(self, id);
            body.resume(&mut cx)
        };

        self.current = None;
        self.record_mut(id)?.body = Some(body);
        let suspension = result?.suspension();

        if suspension == Suspension::Terminate {
            return self.finish_component(id);
        }
        let state = self.record(id)?.state;
        if state == ComponentState::Current {
            return Err(SimError::InvalidState {
                component: id,
                state,
                action: "return without suspending",
            });
        }
        Ok(())
    }

    /// Advance the simulation.
    ///
    /// Events at exactly the deadline are left pending and the clock is
    /// set to the deadline. When the event list drains first, the
    /// configured [`EmptyQueuePolicy`] decides where the clock stops.
    pub fn run(&mut self, until: RunUntil) -> SimResult<RunSummary> {
        let start_events = self.events_processed;
        info!(now = %self.now, ?until, "run started");
        match self.run_loop(until) {
            Ok(reason) => {
                let summary = RunSummary {
                    events_processed: self.events_processed - start_events,
                    final_time: self.now,
                    reason,
                };
                info!(
                    now = %self.now,
                    events = summary.events_processed,
                    ?reason,
                    "run finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.current = None;
                error!(now = %self.now, error = %e, "run aborted");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, until: RunUntil) -> SimResult<StopReason> {
        let (deadline, mut condition) = match until {
            RunUntil::Quiescent => (None, None),
            RunUntil::Duration(d) => (Some(self.now.plus(d)?), None),
            RunUntil::Time(t) if t < self.now => {
                return Err(SimError::NonCausalSchedule {
                    requested: t.ticks(),
                    now: self.now.ticks(),
                })
            }
            RunUntil::Time(t) => (Some(t), None),
            RunUntil::Condition(f) => (None, Some(f)),
        };
        self.stop_requested = false;

        loop {
            if let Some(cond) = condition.as_mut() {
                if cond(self) {
                    return Ok(StopReason::Condition);
                }
            }
            let next = self.scheduler.peek_next().map(|e| e.scheduled_at);
            match (next, deadline) {
                (None, deadline) => {
                    if let (EmptyQueuePolicy::Idle, Some(d)) = (self.config.empty_queue, deadline) {
                        if d.is_finite() {
                            self.now = d;
                        }
                    }
                    return Ok(StopReason::Exhausted);
                }
                (Some(at), Some(d)) if at >= d => {
                    self.now = d;
                    return Ok(StopReason::Deadline);
                }
                _ => {}
            }
            self.step()?;
            if self.stop_requested {
                self.stop_requested = false;
                return Ok(StopReason::Stopped);
            }
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EnvConfig::default())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("now", &self.now)
            .field("components", &self.components.len())
            .field("resources", &self.resources.len())
            .field("states", &self.states.len())
            .field("pending_events", &self.scheduler.len())
            .field("events_processed", &self.events_processed)
            .finish_non_exhaustive()
    }
}
