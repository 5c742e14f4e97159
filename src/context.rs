//! The handle a process body receives on every resume.
//!
//! Suspension verbs (`hold`, `passivate`, `standby`, `request`, `wait`,
//! `terminate`, ...) act on the component being run and return the
//! [`Yield`] the body must hand back. The remaining methods forward to
//! the [`Environment`] so a body can drive other components.

use crate::component::{ActivateOptions, ComponentState};
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, ListId, QueueId, ResourceId};
use crate::priority::Priority;
use crate::process::{Outcome, Process, Suspension, Yield};
use crate::resource::{Request, SelectionPolicy};
use crate::sampler::Sampler;
use crate::state::{State, StateRequest, StateValue, Wait};
use crate::time::TickTime;
use crate::trace::TraceKind;

/// When a `hold` ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldOptions {
    pub(crate) duration: Option<f64>,
    pub(crate) until: Option<TickTime>,
    pub(crate) priority: Priority,
    pub(crate) urgent: bool,
}

impl HoldOptions {
    /// End the hold `duration` ticks from now.
    pub fn duration(duration: f64) -> Self {
        HoldOptions {
            duration: Some(duration),
            until: None,
            priority: Priority::NORMAL,
            urgent: false,
        }
    }

    /// End the hold at an absolute time.
    pub fn until(until: TickTime) -> Self {
        HoldOptions {
            duration: None,
            until: Some(until),
            priority: Priority::NORMAL,
            urgent: false,
        }
    }

    /// Priority of the wake-up event.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Wake before non-urgent events of equal time and priority.
    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

pub struct Context<'a> {
    env: &'a mut Environment,
    me: ComponentId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(env: &'a mut Environment, me: ComponentId) -> Self {
        Context { env, me }
    }

    /// The component being run.
    #[inline]
    pub fn me(&self) -> ComponentId {
        self.me
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> TickTime {
        self.env.now()
    }

    /// Read-only view of the environment.
    pub fn env(&self) -> &Environment {
        self.env
    }

    /// Assigned name of this component.
    pub fn name(&self) -> &str {
        self.env
            .component_name(self.me)
            .unwrap_or_default()
    }

    /// `true` if the last request or wait timed out or was withdrawn.
    pub fn failed(&self) -> bool {
        self.env.failed(self.me).unwrap_or(false)
    }

    /// The resource that honored the last `one_of` request.
    pub fn honored_by(&self) -> Option<ResourceId> {
        self.env.record(self.me).ok().and_then(|r| r.honored_by)
    }

    /// Quantity of `resource` this component holds.
    pub fn claimed(&self, resource: ResourceId) -> f64 {
        self.env.claimed_by(self.me, resource).unwrap_or(0.0)
    }

    /// Returns `true` if this component holds any of `resource`.
    pub fn is_claiming(&self, resource: ResourceId) -> bool {
        self.claimed(resource) > 0.0
    }

    /// `true` if this component no longer holds `resource`, typically
    /// after a higher-priority request bumped it.
    pub fn is_bumped(&self, resource: ResourceId) -> bool {
        !self.is_claiming(resource)
    }

    fn ensure_current(&self, action: &'static str) -> SimResult<()> {
        let state = self.env.component_state(self.me)?;
        if state != ComponentState::Current {
            return Err(SimError::InvalidState {
                component: self.me,
                state,
                action,
            });
        }
        Ok(())
    }

    /// A request or wait issued while the previous one is still pending.
    fn ensure_unblocked(&self) -> SimResult<()> {
        let rec = self.env.record(self.me)?;
        if !rec.requests.is_empty() || !rec.waits.is_empty() {
            return Err(SimError::DoubleSuspension(self.me));
        }
        Ok(())
    }

    // ── Suspension verbs ──────────────────────────────────────────────

    /// Suspend for `duration` ticks.
    pub fn hold(&mut self, duration: f64) -> SimResult<Yield> {
        self.hold_with(HoldOptions::duration(duration))
    }

    /// Suspend until the time given by `options`.
    pub fn hold_with(&mut self, options: HoldOptions) -> SimResult<Yield> {
        self.ensure_current("hold")?;
        let now = self.env.now();
        let at = match (options.until, options.duration) {
            (Some(until), _) => until,
            (None, Some(d)) => now.plus(d)?,
            (None, None) => now,
        };
        self.env.reschedule(
            self.me,
            at,
            options.priority,
            options.urgent,
            ComponentState::Scheduled,
        )?;
        Ok(Yield::new(Suspension::Hold))
    }

    /// Suspend until another component activates this one.
    pub fn passivate(&mut self) -> SimResult<Yield> {
        self.suspend(ComponentState::Passive, "passivate")?;
        Ok(Yield::new(Suspension::Passivate))
    }

    /// Run again after the next event, whatever it is.
    pub fn standby(&mut self) -> SimResult<Yield> {
        self.suspend(ComponentState::Standby, "standby")?;
        self.env.standby.push(self.me);
        Ok(Yield::new(Suspension::Standby))
    }

    fn suspend(&mut self, to: ComponentState, action: &'static str) -> SimResult<()> {
        self.ensure_current(action)?;
        let me = self.me;
        self.env.scheduler.cancel(me);
        let rec = self.env.record_mut(me)?;
        rec.scheduled_time = None;
        rec.remaining = None;
        self.env.transition(me, to)
    }

    /// Claim resources. Returns `Outcome::Ready` when honored on the
    /// spot; otherwise the component waits and the body must return the
    /// suspended `Yield`.
    pub fn request(&mut self, request: Request) -> SimResult<Outcome> {
        self.ensure_unblocked()?;
        self.ensure_current("request")?;
        self.env.request_current(self.me, request)
    }

    /// Take `quantity` from a depletable resource.
    pub fn take(&mut self, resource: ResourceId, quantity: f64) -> SimResult<Outcome> {
        self.level_request(resource, quantity)
    }

    /// Put `quantity` back into a depletable resource.
    pub fn put(&mut self, resource: ResourceId, quantity: f64) -> SimResult<Outcome> {
        self.level_request(resource, -quantity)
    }

    fn level_request(&mut self, resource: ResourceId, signed: f64) -> SimResult<Outcome> {
        if !self.env.resource(resource)?.is_depletable() {
            return Err(SimError::NotDepletable(resource));
        }
        if signed.is_nan() || signed == 0.0 {
            return Err(SimError::InvalidQuantity {
                resource,
                quantity: signed.abs(),
            });
        }
        self.request(Request::new(resource).quantity(signed))
    }

    /// Wait for a single condition.
    pub fn wait(&mut self, request: StateRequest) -> SimResult<Outcome> {
        self.wait_for(Wait::from(request))
    }

    /// Wait until any of `requests` holds.
    pub fn wait_any(&mut self, requests: impl IntoIterator<Item = StateRequest>) -> SimResult<Outcome> {
        self.wait_for(Wait::any(requests))
    }

    /// Wait until all of `requests` hold at one evaluation.
    pub fn wait_all(&mut self, requests: impl IntoIterator<Item = StateRequest>) -> SimResult<Outcome> {
        self.wait_for(Wait::all(requests))
    }

    /// Wait with full control over any/all and the timeout.
    pub fn wait_for(&mut self, wait: Wait) -> SimResult<Outcome> {
        self.ensure_unblocked()?;
        self.ensure_current("wait")?;
        self.env.wait_current(self.me, wait)
    }

    /// End the body. A repeating component starts over at the current
    /// time; otherwise all claims are released and the component
    /// terminates.
    pub fn terminate(&mut self) -> SimResult<Yield> {
        self.ensure_current("terminate")?;
        Ok(Yield::new(Suspension::Terminate))
    }

    /// Interrupt this component. It stays suspended until another
    /// component resumes it, then runs again at once.
    pub fn interrupt_self(&mut self) -> SimResult<Yield> {
        let me = self.me;
        self.suspend(ComponentState::Interrupted, "interrupt")?;
        let rec = self.env.record_mut(me)?;
        rec.remaining = Some(0.0);
        rec.interrupt_level = 1;
        rec.interrupted_state = Some(ComponentState::Scheduled);
        self.env.publish(TraceKind::Interrupted {
            component: me,
            level: 1,
        });
        Ok(Yield::new(Suspension::Interrupt))
    }

    /// Stop the running `Environment::run`. This component continues at
    /// the current time when the simulation is run again.
    pub fn stop_simulation(&mut self) -> SimResult<Yield> {
        self.ensure_current("stop the simulation")?;
        let now = self.env.now();
        self.env
            .reschedule(self.me, now, Priority::NORMAL, true, ComponentState::Scheduled)?;
        self.env.stop_requested = true;
        self.env.publish(TraceKind::SimulationStopped { by: Some(self.me) });
        Ok(Yield::new(Suspension::StopSimulation))
    }

    // ── Releases ──────────────────────────────────────────────────────

    /// Release the whole claim on `resource`.
    pub fn release(&mut self, resource: ResourceId) -> SimResult<()> {
        self.env.release_claim(self.me, resource, None, true)
    }

    /// Release part of the claim on `resource`. More than is held is `OverRelease`.
    pub fn release_quantity(&mut self, resource: ResourceId, quantity: f64) -> SimResult<()> {
        self.env.release_claim(self.me, resource, Some(quantity), true)
    }

    /// Release every claim this component holds.
    pub fn release_all(&mut self) -> SimResult<()> {
        self.env.release_all_claims(self.me)
    }

    // ── Acting on other components ────────────────────────────────────

    /// Create a component and schedule it now.
    pub fn spawn<P: Process + 'static>(&mut self, name: &str, body: P) -> SimResult<ComponentId> {
        self.env.spawn(name, body)
    }

    /// Create a component and schedule it according to `options`.
    pub fn spawn_with<P: Process + 'static>(
        &mut self,
        name: &str,
        body: P,
        options: ActivateOptions,
    ) -> SimResult<ComponentId> {
        self.env.spawn_with(name, body, options)
    }

    /// Create a body-less data component.
    pub fn create_component(&mut self, name: &str) -> ComponentId {
        self.env.create_component(name)
    }

    /// See [`Environment::activate`].
    pub fn activate(&mut self, target: ComponentId, options: ActivateOptions) -> SimResult<()> {
        self.env.activate(target, options)
    }

    /// See [`Environment::passivate_component`].
    pub fn passivate_component(&mut self, target: ComponentId) -> SimResult<()> {
        self.env.passivate_component(target)
    }

    /// See [`Environment::interrupt`].
    pub fn interrupt(&mut self, target: ComponentId) -> SimResult<()> {
        self.env.interrupt(target)
    }

    /// Undo one interrupt level of `target`.
    pub fn resume(&mut self, target: ComponentId) -> SimResult<()> {
        self.env.resume(target, false, Priority::NORMAL)
    }

    /// Undo every interrupt level of `target`.
    pub fn resume_all(&mut self, target: ComponentId) -> SimResult<()> {
        self.env.resume(target, true, Priority::NORMAL)
    }

    /// See [`Environment::cancel`].
    pub fn cancel(&mut self, target: ComponentId) -> SimResult<()> {
        self.env.cancel(target)
    }

    // ── States ────────────────────────────────────────────────────────

    /// Current value of `state`.
    pub fn state_value<T: StateValue>(&self, state: &State<T>) -> SimResult<T> {
        self.env.state_value(state)
    }

    /// See [`Environment::set_state`].
    pub fn set_state<T: StateValue>(&mut self, state: &State<T>, value: T) -> SimResult<()> {
        self.env.set_state(state, value)
    }

    /// See [`Environment::trigger`].
    pub fn trigger<T: StateValue>(
        &mut self,
        state: &State<T>,
        value: T,
        value_after: Option<T>,
        max: Option<usize>,
    ) -> SimResult<()> {
        self.env.trigger(state, value, value_after, max)
    }

    // ── Resources ─────────────────────────────────────────────────────

    /// See [`Environment::set_capacity`].
    pub fn set_capacity(&mut self, resource: ResourceId, capacity: f64) -> SimResult<()> {
        self.env.set_capacity(resource, capacity)
    }

    /// See [`Environment::refill`].
    pub fn refill(&mut self, resource: ResourceId, quantity: f64) -> SimResult<()> {
        self.env.refill(resource, quantity)
    }

    /// See [`Environment::select_resource`].
    pub fn select_resource(
        &mut self,
        resources: &[ResourceId],
        quantity: f64,
        policy: SelectionPolicy,
    ) -> SimResult<Option<ResourceId>> {
        self.env.select_resource(resources, quantity, policy)
    }

    // ── Collections ───────────────────────────────────────────────────

    /// Add `component` to `queue`.
    pub fn enqueue(&mut self, queue: QueueId, component: ComponentId, priority: Option<Priority>) -> SimResult<()> {
        self.env.enqueue(queue, component, priority)
    }

    /// Remove `component` from `queue`.
    pub fn dequeue(&mut self, queue: QueueId, component: ComponentId) -> SimResult<bool> {
        self.env.dequeue(queue, component)
    }

    /// Remove and return the head of `queue`.
    pub fn poll_queue(&mut self, queue: QueueId) -> SimResult<Option<ComponentId>> {
        self.env.poll_queue(queue)
    }

    /// Append `component` to `list`.
    pub fn list_add(&mut self, list: ListId, component: ComponentId) -> SimResult<()> {
        self.env.list_add(list, component)
    }

    /// Remove `component` from `list`.
    pub fn list_remove(&mut self, list: ListId, component: ComponentId) -> SimResult<bool> {
        self.env.list_remove(list, component)
    }

    /// Remove and return the first member of `list`.
    pub fn list_poll(&mut self, list: ListId) -> SimResult<Option<ComponentId>> {
        self.env.list_poll(list)
    }

    // ── Services ──────────────────────────────────────────────────────

    /// Look up a registered dependency by type.
    pub fn dependency<T: 'static>(&self) -> SimResult<&T> {
        self.env.registry().get::<T>()
    }

    /// Mutable dependency lookup.
    pub fn dependency_mut<T: 'static>(&mut self) -> SimResult<&mut T> {
        self.env.registry_mut().get_mut::<T>()
    }

    /// The environment's random source.
    pub fn sampler(&mut self) -> &mut dyn Sampler {
        self.env.sampler_mut()
    }
}
