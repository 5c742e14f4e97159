//! Observable values that components can wait on.
//!
//! A [`State<T>`] is a typed handle into the environment's state table.
//! Changing the value scans the waiters in queue order and wakes every
//! component whose wait condition now holds.

use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::collections::{ComponentQueue, QueueOrder};
use crate::component::ComponentState;
use crate::entity::Entity;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, StateId};
use crate::priority::Priority;
use crate::process::{Outcome, Suspension, Yield};
use crate::resource::FailAfter;
use crate::time::TickTime;
use crate::trace::TraceKind;

/// Bound for values held in a [`State`].
pub trait StateValue: Clone + PartialEq + Debug + 'static {}

impl<T: Clone + PartialEq + Debug + 'static> StateValue for T {}

// ── Handles ───────────────────────────────────────────────────────────

/// Typed handle to a state owned by an [`Environment`].
pub struct State<T> {
    id: StateId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> State<T> {
    /// Returns the state's id.
    pub fn id(&self) -> StateId {
        self.id
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for State<T> {}

impl<T> PartialEq for State<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "State<{}>({})", std::any::type_name::<T>(), self.id)
    }
}

// ── Storage ───────────────────────────────────────────────────────────

/// Type-erased view of a state slot.
pub(crate) trait StateCell {
    fn entity(&self) -> &Entity;
    fn value_any(&self) -> &dyn Any;
    fn waiters(&self) -> &ComponentQueue;
    fn waiters_mut(&mut self) -> &mut ComponentQueue;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct StateSlot<T> {
    entity: Entity,
    value: T,
    waiters: ComponentQueue,
    history: Vec<(TickTime, T)>,
    track: bool,
}

impl<T: StateValue> StateSlot<T> {
    fn set(&mut self, value: T, now: TickTime) {
        self.value = value;
        if self.track {
            self.history.push((now, self.value.clone()));
        }
    }
}

impl<T: StateValue> StateCell for StateSlot<T> {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn value_any(&self) -> &dyn Any {
        &self.value
    }

    fn waiters(&self) -> &ComponentQueue {
        &self.waiters
    }

    fn waiters_mut(&mut self) -> &mut ComponentQueue {
        &mut self.waiters
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Wait conditions ───────────────────────────────────────────────────

/// One condition of a wait: a predicate over the value of a state.
#[derive(Clone)]
pub struct StateRequest {
    pub(crate) state: StateId,
    pub(crate) predicate: Rc<dyn Fn(&dyn Any) -> bool>,
    pub(crate) priority: Priority,
}

impl StateRequest {
    /// Holds when `predicate` returns `true` for the state's value.
    pub fn new<T: StateValue>(state: &State<T>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        StateRequest {
            state: state.id,
            predicate: Rc::new(move |v: &dyn Any| v.downcast_ref::<T>().is_some_and(&predicate)),
            priority: Priority::NORMAL,
        }
    }

    /// Holds when the value equals `expected`.
    pub fn equals<T: StateValue>(state: &State<T>, expected: T) -> Self {
        Self::new(state, move |v| *v == expected)
    }

    /// Position in the state's waiter queue.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// The state this condition reads.
    pub fn state(&self) -> StateId {
        self.state
    }
}

impl Debug for StateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRequest")
            .field("state", &self.state)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A complete wait: one or more conditions, combined with any/all
/// semantics, with an optional timeout.
#[derive(Debug, Clone)]
pub struct Wait {
    pub(crate) requests: Vec<StateRequest>,
    pub(crate) all: bool,
    pub(crate) fail: Option<FailAfter>,
}

impl Wait {
    /// Released by the first condition that holds.
    pub fn any(requests: impl IntoIterator<Item = StateRequest>) -> Self {
        Wait {
            requests: requests.into_iter().collect(),
            all: false,
            fail: None,
        }
    }

    /// Released once every condition holds at the same evaluation.
    pub fn all(requests: impl IntoIterator<Item = StateRequest>) -> Self {
        Wait {
            all: true,
            ..Wait::any(requests)
        }
    }

    /// Give up `delay` ticks from now.
    pub fn fail_delay(mut self, delay: f64) -> Self {
        self.fail = Some(FailAfter::Delay(delay));
        self
    }

    /// Give up at an absolute time.
    pub fn fail_at(mut self, at: TickTime) -> Self {
        self.fail = Some(FailAfter::At(at));
        self
    }
}

impl From<StateRequest> for Wait {
    fn from(request: StateRequest) -> Self {
        Wait::any([request])
    }
}

// ── Environment: state operations ─────────────────────────────────────

impl Environment {
    /// Create a state holding `initial`.
    pub fn create_state<T: StateValue>(&mut self, name: &str, initial: T) -> State<T> {
        let id = StateId::from_index(self.states.len());
        let now = self.now;
        let track = self.config.tracking.state_timelines;
        let name = self.names.assign(name);
        let waiters = ComponentQueue::new(
            Entity::new(format!("{}.waiters", name), now),
            QueueOrder::PriorityFcfs,
            None,
            self.config.tracking.queue_statistics,
        );
        let history = if track {
            vec![(now, initial.clone())]
        } else {
            Vec::new()
        };
        debug!(state = %id, %name, value = ?initial, "state created");
        self.states.push(Box::new(StateSlot {
            entity: Entity::new(name, now),
            value: initial,
            waiters,
            history,
            track,
        }));
        State {
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn cell(&self, id: StateId) -> SimResult<&dyn StateCell> {
        self.states
            .get(id.index())
            .map(|b| &**b)
            .ok_or(SimError::UnknownState(id))
    }

    pub(crate) fn cell_mut(&mut self, id: StateId) -> SimResult<&mut (dyn StateCell + 'static)> {
        self.states
            .get_mut(id.index())
            .map(|b| &mut **b)
            .ok_or(SimError::UnknownState(id))
    }

    fn slot<T: StateValue>(&self, state: &State<T>) -> SimResult<&StateSlot<T>> {
        self.cell(state.id)?
            .as_any()
            .downcast_ref::<StateSlot<T>>()
            .ok_or(SimError::StateTypeMismatch {
                state: state.id,
                expected: std::any::type_name::<T>(),
            })
    }

    fn slot_mut<T: StateValue>(&mut self, state: &State<T>) -> SimResult<&mut StateSlot<T>> {
        self.cell_mut(state.id)?
            .as_any_mut()
            .downcast_mut::<StateSlot<T>>()
            .ok_or(SimError::StateTypeMismatch {
                state: state.id,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Current value of `state`.
    pub fn state_value<T: StateValue>(&self, state: &State<T>) -> SimResult<T> {
        Ok(self.slot(state)?.value.clone())
    }

    /// Assigned name of `state`.
    pub fn state_name<T>(&self, state: &State<T>) -> SimResult<&str> {
        Ok(&self.cell(state.id)?.entity().name)
    }

    /// Every value the state has taken, with the time it was set.
    /// Empty when state timelines are not tracked.
    pub fn state_history<T: StateValue>(&self, state: &State<T>) -> SimResult<&[(TickTime, T)]> {
        Ok(&self.slot(state)?.history)
    }

    /// Number of components waiting on `state`.
    pub fn waiter_count<T>(&self, state: &State<T>) -> SimResult<usize> {
        Ok(self.cell(state.id)?.waiters().len())
    }

    /// The waiter queue of `state`, in scan order.
    pub fn waiters<T>(&self, state: &State<T>) -> SimResult<&ComponentQueue> {
        Ok(self.cell(state.id)?.waiters())
    }

    /// Set the value and wake every waiter whose condition now holds.
    /// Setting the current value again does nothing.
    pub fn set_state<T: StateValue>(&mut self, state: &State<T>, value: T) -> SimResult<()> {
        if self.slot(state)?.value == value {
            return Ok(());
        }
        self.assign_state(state, value)?;
        self.scan_waiters(state.id, None)
    }

    /// Set `value`, wake at most `max` waiters, then set `value_after`
    /// (if any) without waking anyone.
    pub fn trigger<T: StateValue>(
        &mut self,
        state: &State<T>,
        value: T,
        value_after: Option<T>,
        max: Option<usize>,
    ) -> SimResult<()> {
        self.assign_state(state, value)?;
        self.scan_waiters(state.id, max)?;
        if let Some(after) = value_after {
            self.assign_state(state, after)?;
        }
        Ok(())
    }

    fn assign_state<T: StateValue>(&mut self, state: &State<T>, value: T) -> SimResult<()> {
        let now = self.now;
        let rendered = format!("{:?}", value);
        let slot = self.slot_mut(state)?;
        slot.set(value, now);
        let name = slot.entity.name.clone();
        debug!(state = %state.id, %name, value = %rendered, %now, "state changed");
        self.publish(TraceKind::StateValueChanged {
            state: state.id,
            name,
            value: rendered,
        });
        Ok(())
    }

    /// Re-evaluate the waiters of `id` in queue order.
    fn scan_waiters(&mut self, id: StateId, max: Option<usize>) -> SimResult<()> {
        let candidates = self.cell(id)?.waiters().components();
        let mut honored = 0usize;
        for c in candidates {
            if max.is_some_and(|m| honored >= m) {
                break;
            }
            if !self.cell(id)?.waiters().contains(c) {
                continue;
            }
            if self.try_wait(c)? {
                honored += 1;
            }
        }
        Ok(())
    }

    /// Issue `wait` on behalf of the current component `id`.
    pub(crate) fn wait_current(&mut self, id: ComponentId, wait: Wait) -> SimResult<Outcome> {
        let rec = self.record(id)?;
        if !rec.requests.is_empty() || !rec.waits.is_empty() {
            return Err(SimError::DoubleSuspension(id));
        }
        for request in &wait.requests {
            self.cell(request.state)?;
        }
        let now = self.now;
        let fail_at = match wait.fail {
            Some(FailAfter::Delay(d)) => Some(now.plus(d)?),
            Some(FailAfter::At(t)) if t < now => {
                return Err(SimError::NonCausalSchedule {
                    requested: t.ticks(),
                    now: now.ticks(),
                })
            }
            Some(FailAfter::At(t)) => Some(t),
            None => None,
        };

        let rec = self.record_mut(id)?;
        rec.failed = false;
        if wait.requests.is_empty() {
            return Ok(Outcome::Ready);
        }
        let requests = wait.requests;
        rec.waits = requests.clone();
        rec.wait_all = wait.all;
        if self.try_wait(id)? {
            return Ok(Outcome::Ready);
        }

        for request in &requests {
            let waiters = self.cell_mut(request.state)?.waiters_mut();
            if !waiters.contains(id) {
                waiters.add(id, Some(request.priority), now)?;
            }
        }
        match fail_at {
            Some(at) => self.reschedule(id, at, Priority::NORMAL, false, ComponentState::WaitingOnState)?,
            None => self.transition(id, ComponentState::WaitingOnState)?,
        }
        Ok(Outcome::Suspended(Yield::new(Suspension::Wait)))
    }

    /// Release `id` if its wait condition holds now.
    pub(crate) fn try_wait(&mut self, id: ComponentId) -> SimResult<bool> {
        let rec = self.record(id)?;
        if rec.state == ComponentState::Interrupted || rec.waits.is_empty() {
            return Ok(false);
        }
        let mut results = Vec::with_capacity(rec.waits.len());
        for w in &rec.waits {
            let value = self.cell(w.state)?.value_any();
            results.push((w.predicate)(value));
        }
        let honored = if rec.wait_all {
            results.iter().all(|r| *r)
        } else {
            results.iter().any(|r| *r)
        };
        if !honored {
            return Ok(false);
        }
        self.withdraw_waits(id)?;
        debug!(component = %id, now = %self.now, "wait honored");
        if self.current != Some(id) {
            let now = self.now;
            self.reschedule(id, now, Priority::NORMAL, false, ComponentState::Scheduled)?;
        }
        Ok(true)
    }

    /// Take `id` off every waiter list and forget its conditions.
    pub(crate) fn withdraw_waits(&mut self, id: ComponentId) -> SimResult<()> {
        let now = self.now;
        let waits = std::mem::take(&mut self.record_mut(id)?.waits);
        for w in &waits {
            self.cell_mut(w.state)?.waiters_mut().remove(id, now);
        }
        Ok(())
    }

    /// A wait timed out: withdraw it and flag the failure.
    pub(crate) fn renege_wait(&mut self, id: ComponentId) -> SimResult<()> {
        self.withdraw_waits(id)?;
        self.record_mut(id)?.failed = true;
        debug!(component = %id, now = %self.now, "wait reneged");
        self.publish(TraceKind::Reneged { component: id });
        Ok(())
    }
}
