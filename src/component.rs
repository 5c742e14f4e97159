//! Component lifecycle: the per-component record and the external
//! operations that move a component between states.
//!
//! ```text
//!             activate            event fires
//!  Created ───────────► Scheduled ───────────► Current
//!                          ▲                      │ hold / passivate / standby
//!                          │ activate / grant     │ request / wait / terminate
//!                          │                      ▼
//!  Passive · Standby · WaitingOnResource · WaitingOnState · Terminated
//!                          │
//!                interrupt │ resume
//!                          ▼
//!                     Interrupted
//! ```

use indexmap::IndexMap;
use tracing::debug;

use crate::entity::Entity;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, ResourceId};
use crate::priority::Priority;
use crate::process::{Process, ProcessMode};
use crate::state::StateRequest;
use crate::time::TickTime;
use crate::trace::TraceKind;

// ── ComponentState ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentState {
    Created,
    Scheduled,
    Current,
    Passive,
    Standby,
    WaitingOnState,
    WaitingOnResource,
    Interrupted,
    Terminated,
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentState::Created => "created",
            ComponentState::Scheduled => "scheduled",
            ComponentState::Current => "current",
            ComponentState::Passive => "passive",
            ComponentState::Standby => "standby",
            ComponentState::WaitingOnState => "waiting",
            ComponentState::WaitingOnResource => "requesting",
            ComponentState::Interrupted => "interrupted",
            ComponentState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

// ── ComponentRecord ───────────────────────────────────────────────────

/// Everything the environment knows about one component.
pub(crate) struct ComponentRecord {
    pub(crate) entity: Entity,
    pub(crate) state: ComponentState,
    /// `None` for data components, and while the body is running.
    pub(crate) body: Option<Box<dyn Process>>,
    pub(crate) mode: ProcessMode,
    /// Time of the live event, if any.
    pub(crate) scheduled_time: Option<TickTime>,

    pub(crate) requests: IndexMap<ResourceId, f64>,
    pub(crate) request_priority: Priority,
    pub(crate) one_of: bool,
    pub(crate) claims: IndexMap<ResourceId, f64>,
    pub(crate) honored_by: Option<ResourceId>,

    pub(crate) waits: Vec<StateRequest>,
    pub(crate) wait_all: bool,

    pub(crate) failed: bool,

    pub(crate) remaining: Option<f64>,
    pub(crate) interrupt_level: u32,
    pub(crate) interrupted_state: Option<ComponentState>,
}

impl ComponentRecord {
    pub(crate) fn new(entity: Entity, body: Option<Box<dyn Process>>) -> Self {
        ComponentRecord {
            entity,
            state: ComponentState::Created,
            body,
            mode: ProcessMode::default(),
            scheduled_time: None,
            requests: IndexMap::new(),
            request_priority: Priority::NORMAL,
            one_of: false,
            claims: IndexMap::new(),
            honored_by: None,
            waits: Vec::new(),
            wait_all: false,
            failed: false,
            remaining: None,
            interrupt_level: 0,
            interrupted_state: None,
        }
    }

    fn remaining_until(&self, now: TickTime) -> Option<f64> {
        self.scheduled_time
            .filter(|t| t.is_finite())
            .and_then(|t| t.duration_since(now))
    }
}

impl std::fmt::Debug for ComponentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRecord")
            .field("name", &self.entity.name)
            .field("state", &self.state)
            .field("scheduled_time", &self.scheduled_time)
            .field("requests", &self.requests)
            .field("claims", &self.claims)
            .field("waits", &self.waits.len())
            .field("failed", &self.failed)
            .finish()
    }
}

// ── ActivateOptions ───────────────────────────────────────────────────

/// Arguments of [`Environment::activate`].
///
/// Defaults to "now, normal priority, not urgent, keep the body".
#[derive(Default)]
pub struct ActivateOptions {
    pub(crate) at: Option<TickTime>,
    pub(crate) delay: f64,
    pub(crate) priority: Priority,
    pub(crate) urgent: bool,
    pub(crate) process: Option<Box<dyn Process>>,
}

impl ActivateOptions {
    /// Activate now with normal priority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate at an absolute time.
    pub fn at(mut self, at: TickTime) -> Self {
        self.at = Some(at);
        self
    }

    /// Activate `delay` ticks from now.
    pub fn after(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Priority of the resulting event.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Run before non-urgent events of equal time and priority.
    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    /// Replace the body; the component restarts at the new entry point.
    pub fn process<P: Process + 'static>(mut self, process: P) -> Self {
        self.process = Some(Box::new(process));
        self
    }

    fn resolve(&self, now: TickTime) -> SimResult<TickTime> {
        match self.at {
            Some(at) => Ok(at),
            None => now.plus(self.delay),
        }
    }
}

impl std::fmt::Debug for ActivateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivateOptions")
            .field("at", &self.at)
            .field("delay", &self.delay)
            .field("priority", &self.priority)
            .field("urgent", &self.urgent)
            .field("process", &self.process.is_some())
            .finish()
    }
}

// ── Creation & queries ────────────────────────────────────────────────

impl Environment {
    pub(crate) fn record(&self, id: ComponentId) -> SimResult<&ComponentRecord> {
        self.components
            .get(id.index())
            .ok_or(SimError::UnknownComponent(id))
    }

    pub(crate) fn record_mut(&mut self, id: ComponentId) -> SimResult<&mut ComponentRecord> {
        self.components
            .get_mut(id.index())
            .ok_or(SimError::UnknownComponent(id))
    }

    fn insert_component(&mut self, name: &str, body: Option<Box<dyn Process>>) -> ComponentId {
        let id = ComponentId::from_index(self.components.len());
        let name = self.names.assign(name);
        let entity = Entity::new(name.clone(), self.now);
        self.components.push(ComponentRecord::new(entity, body));
        debug!(component = %id, %name, "component created");
        self.publish(TraceKind::ComponentCreated {
            component: id,
            name,
        });
        id
    }

    /// Create a component without a body. It stays `Created` and can be
    /// placed in queues, lists and claimer sets.
    pub fn create_component(&mut self, name: &str) -> ComponentId {
        self.insert_component(name, None)
    }

    /// Create a component and schedule its body at the current time.
    pub fn spawn<P: Process + 'static>(&mut self, name: &str, body: P) -> SimResult<ComponentId> {
        self.spawn_with(name, body, ActivateOptions::new())
    }

    /// Create a component and schedule its body according to `options`.
    pub fn spawn_with<P: Process + 'static>(
        &mut self,
        name: &str,
        body: P,
        options: ActivateOptions,
    ) -> SimResult<ComponentId> {
        let id = self.insert_component(name, Some(Box::new(body)));
        self.activate(id, options)?;
        Ok(id)
    }

    /// Like [`spawn`](Self::spawn), but `terminate()` re-runs the body.
    pub fn spawn_repeating<P: Process + 'static>(
        &mut self,
        name: &str,
        body: P,
    ) -> SimResult<ComponentId> {
        let id = self.insert_component(name, Some(Box::new(body)));
        self.record_mut(id)?.mode = ProcessMode::Repeating;
        self.activate(id, ActivateOptions::new())?;
        Ok(id)
    }

    /// Create a component with a body that waits for an explicit
    /// [`activate`](Self::activate).
    pub fn spawn_passive<P: Process + 'static>(&mut self, name: &str, body: P) -> ComponentId {
        self.insert_component(name, Some(Box::new(body)))
    }

    /// Choose what `terminate()` means for `id`.
    pub fn set_process_mode(&mut self, id: ComponentId, mode: ProcessMode) -> SimResult<()> {
        self.record_mut(id)?.mode = mode;
        Ok(())
    }

    /// Number of components ever created, terminated ones included.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Every component id in creation order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..self.components.len()).map(ComponentId::from_index)
    }

    /// Current lifecycle state of `id`.
    pub fn component_state(&self, id: ComponentId) -> SimResult<ComponentState> {
        Ok(self.record(id)?.state)
    }

    /// Assigned name of `id`, e.g. `Customer.3`.
    pub fn component_name(&self, id: ComponentId) -> SimResult<&str> {
        Ok(&self.record(id)?.entity.name)
    }

    /// Name and creation time of `id`.
    pub fn component_entity(&self, id: ComponentId) -> SimResult<&Entity> {
        Ok(&self.record(id)?.entity)
    }

    /// `true` if the last request or wait of `id` timed out or was
    /// withdrawn.
    pub fn failed(&self, id: ComponentId) -> SimResult<bool> {
        Ok(self.record(id)?.failed)
    }

    /// Time of the live event of `id`, if it has one.
    pub fn scheduled_time(&self, id: ComponentId) -> SimResult<Option<TickTime>> {
        Ok(self.record(id)?.scheduled_time)
    }

    /// Time left on the suspension that was cut short by an interrupt or
    /// an external passivate.
    pub fn remaining_duration(&self, id: ComponentId) -> SimResult<Option<f64>> {
        Ok(self.record(id)?.remaining)
    }

    /// How many interrupts are outstanding on `id`.
    pub fn interrupt_level(&self, id: ComponentId) -> SimResult<u32> {
        Ok(self.record(id)?.interrupt_level)
    }

    /// Borrow the body of `id` as its concrete type.
    pub fn process<T: 'static>(&self, id: ComponentId) -> SimResult<&T> {
        let body = self.record(id)?.body.as_ref().ok_or(SimError::NoProcess(id))?;
        body.as_any()
            .downcast_ref::<T>()
            .ok_or(SimError::ProcessTypeMismatch {
                component: id,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Mutably borrow the body of `id` as its concrete type.
    pub fn process_mut<T: 'static>(&mut self, id: ComponentId) -> SimResult<&mut T> {
        let body = self
            .record_mut(id)?
            .body
            .as_mut()
            .ok_or(SimError::NoProcess(id))?;
        body.as_any_mut()
            .downcast_mut::<T>()
            .ok_or(SimError::ProcessTypeMismatch {
                component: id,
                expected: std::any::type_name::<T>(),
            })
    }
}

// ── Transitions ───────────────────────────────────────────────────────

impl Environment {
    pub(crate) fn transition(&mut self, id: ComponentId, to: ComponentState) -> SimResult<()> {
        let rec = self.record_mut(id)?;
        let from = rec.state;
        if from == to {
            return Ok(());
        }
        rec.state = to;
        debug!(component = %id, %from, %to, now = %self.now, "state change");
        self.publish(TraceKind::StateTransition {
            component: id,
            from,
            to,
        });
        Ok(())
    }

    /// Give `id` a live event at `at` and move it to `state`.
    pub(crate) fn reschedule(
        &mut self,
        id: ComponentId,
        at: TickTime,
        priority: Priority,
        urgent: bool,
        state: ComponentState,
    ) -> SimResult<()> {
        if at < self.now {
            return Err(SimError::NonCausalSchedule {
                requested: at.ticks(),
                now: self.now.ticks(),
            });
        }
        self.scheduler.schedule(id, at, priority, urgent);
        self.record_mut(id)?.scheduled_time = Some(at);
        self.transition(id, state)?;
        self.publish(TraceKind::Rescheduled {
            component: id,
            at,
            priority,
            urgent,
        });
        Ok(())
    }

    /// Drop the live event of `id` and take it off the standby lists.
    pub(crate) fn unschedule(&mut self, id: ComponentId) -> SimResult<()> {
        self.scheduler.cancel(id);
        self.standby.retain(|c| *c != id);
        self.pending_standby.retain(|c| *c != id);
        self.record_mut(id)?.scheduled_time = None;
        Ok(())
    }

    /// Withdraw pending requests and waits, flagging the component as
    /// failed when there were any.
    pub(crate) fn check_fail(&mut self, id: ComponentId) -> SimResult<()> {
        let rec = self.record(id)?;
        let requesting = !rec.requests.is_empty();
        let waiting = !rec.waits.is_empty();
        if requesting {
            let left = self.withdraw_requests(id)?;
            for r in left {
                self.honor_scan(r)?;
            }
        }
        if waiting {
            self.withdraw_waits(id)?;
        }
        if requesting || waiting {
            self.record_mut(id)?.failed = true;
            self.publish(TraceKind::Reneged { component: id });
        }
        Ok(())
    }

    fn ensure_alive(&self, id: ComponentId, action: &'static str) -> SimResult<ComponentState> {
        match self.record(id)?.state {
            ComponentState::Terminated => Err(SimError::Terminated(id)),
            ComponentState::Current => Err(SimError::InvalidState {
                component: id,
                state: ComponentState::Current,
                action,
            }),
            state => Ok(state),
        }
    }
}

// ── External operations ───────────────────────────────────────────────

impl Environment {
    /// Schedule `id` to run.
    ///
    /// A scheduled component has its event replaced. A requesting or
    /// waiting component has its request or wait withdrawn and is
    /// flagged as failed. Interrupted components must be resumed
    /// instead, and the current component uses `hold`.
    pub fn activate(&mut self, id: ComponentId, options: ActivateOptions) -> SimResult<()> {
        let state = self.ensure_alive(id, "activate")?;
        if state == ComponentState::Interrupted {
            return Err(SimError::InvalidState {
                component: id,
                state,
                action: "activate",
            });
        }
        let at = options.resolve(self.now)?;
        if at < self.now {
            return Err(SimError::NonCausalSchedule {
                requested: at.ticks(),
                now: self.now.ticks(),
            });
        }
        let ActivateOptions {
            priority,
            urgent,
            process,
            ..
        } = options;
        if process.is_none() && self.record(id)?.body.is_none() {
            return Err(SimError::NoProcess(id));
        }
        let rec = self.record_mut(id)?;
        if let Some(p) = process {
            rec.body = Some(p);
        }
        rec.remaining = None;
        self.unschedule(id)?;
        self.check_fail(id)?;
        self.reschedule(id, at, priority, urgent, ComponentState::Scheduled)
    }

    /// Schedule `id` at an absolute time. Shorthand for `activate`.
    pub fn schedule(
        &mut self,
        id: ComponentId,
        at: TickTime,
        priority: Priority,
        urgent: bool,
    ) -> SimResult<()> {
        let mut options = ActivateOptions::new().at(at).priority(priority);
        options.urgent = urgent;
        self.activate(id, options)
    }

    /// Passivate a component other than the current one. The time left
    /// on its event is kept as the remaining duration.
    pub fn passivate_component(&mut self, id: ComponentId) -> SimResult<()> {
        let state = self.ensure_alive(id, "passivate")?;
        if state == ComponentState::Interrupted {
            return Err(SimError::InvalidState {
                component: id,
                state,
                action: "passivate",
            });
        }
        let now = self.now;
        let remaining = self.record(id)?.remaining_until(now);
        self.unschedule(id)?;
        self.check_fail(id)?;
        self.record_mut(id)?.remaining = remaining;
        self.transition(id, ComponentState::Passive)
    }

    /// Suspend `id` in place. Claims and pending requests are kept; the
    /// time left on its event is stored. Interrupting an already
    /// interrupted component raises its interrupt level.
    pub fn interrupt(&mut self, id: ComponentId) -> SimResult<()> {
        let state = self.ensure_alive(id, "interrupt")?;
        match state {
            ComponentState::Interrupted => {
                let rec = self.record_mut(id)?;
                rec.interrupt_level += 1;
                let level = rec.interrupt_level;
                self.publish(TraceKind::Interrupted {
                    component: id,
                    level,
                });
                return Ok(());
            }
            ComponentState::Created => {
                return Err(SimError::InvalidState {
                    component: id,
                    state,
                    action: "interrupt",
                })
            }
            _ => {}
        }
        let now = self.now;
        let rec = self.record(id)?;
        // a passive component has no event; keep what passivation stored
        let remaining = match state {
            ComponentState::Passive => rec.remaining,
            _ => rec.remaining_until(now),
        };
        self.unschedule(id)?;
        let rec = self.record_mut(id)?;
        rec.remaining = remaining;
        rec.interrupt_level = 1;
        rec.interrupted_state = Some(state);
        self.transition(id, ComponentState::Interrupted)?;
        self.publish(TraceKind::Interrupted {
            component: id,
            level: 1,
        });
        Ok(())
    }

    /// Undo one interrupt level of `id`, or all of them with `all`.
    ///
    /// At level zero the component returns to the state it was
    /// interrupted in, with its remaining time restored.
    pub fn resume(&mut self, id: ComponentId, all: bool, priority: Priority) -> SimResult<()> {
        let rec = self.record_mut(id)?;
        if rec.state != ComponentState::Interrupted {
            return Err(SimError::InvalidState {
                component: id,
                state: rec.state,
                action: "resume",
            });
        }
        rec.interrupt_level = if all {
            0
        } else {
            rec.interrupt_level.saturating_sub(1)
        };
        if rec.interrupt_level > 0 {
            return Ok(());
        }
        let prior = rec
            .interrupted_state
            .take()
            .unwrap_or(ComponentState::Scheduled);
        let remaining = rec.remaining.take();
        self.publish(TraceKind::Resumed { component: id });

        let now = self.now;
        match prior {
            ComponentState::Passive => {
                self.record_mut(id)?.remaining = remaining;
                self.transition(id, ComponentState::Passive)
            }
            ComponentState::Standby => {
                self.standby.push(id);
                self.transition(id, ComponentState::Standby)
            }
            ComponentState::WaitingOnResource => {
                match remaining {
                    Some(d) => self.reschedule(id, now.plus(d)?, priority, false, prior)?,
                    None => self.transition(id, prior)?,
                }
                let resources: Vec<ResourceId> =
                    self.record(id)?.requests.keys().copied().collect();
                for r in resources {
                    self.honor_scan(r)?;
                }
                Ok(())
            }
            ComponentState::WaitingOnState => {
                match remaining {
                    Some(d) => self.reschedule(id, now.plus(d)?, priority, false, prior)?,
                    None => self.transition(id, prior)?,
                }
                self.try_wait(id)?;
                Ok(())
            }
            _ => {
                let at = now.plus(remaining.unwrap_or(0.0))?;
                self.reschedule(id, at, priority, false, ComponentState::Scheduled)
            }
        }
    }

    /// Terminate a component other than the current one. It leaves every
    /// queue and releases all claims.
    pub fn cancel(&mut self, id: ComponentId) -> SimResult<()> {
        self.ensure_alive(id, "cancel")?;
        self.vacate(id)?;
        self.transition(id, ComponentState::Terminated)
    }

    /// Take `id` out of the heap, every requester and waiter queue and
    /// every claimer set.
    fn vacate(&mut self, id: ComponentId) -> SimResult<()> {
        self.unschedule(id)?;
        let left = self.withdraw_requests(id)?;
        for r in left {
            self.honor_scan(r)?;
        }
        self.withdraw_waits(id)?;
        self.release_all_claims(id)?;
        let rec = self.record_mut(id)?;
        rec.remaining = None;
        rec.interrupt_level = 0;
        rec.interrupted_state = None;
        Ok(())
    }

    /// End of a body run that returned `terminate()`.
    pub(crate) fn finish_component(&mut self, id: ComponentId) -> SimResult<()> {
        self.vacate(id)?;
        match self.record(id)?.mode {
            ProcessMode::Repeating => {
                let now = self.now;
                self.reschedule(id, now, Priority::NORMAL, false, ComponentState::Scheduled)
            }
            ProcessMode::RunToCompletion => self.transition(id, ComponentState::Terminated),
        }
    }
}
