//! Structured error types for the simulation kernel.
//!
//! All fallible public APIs return `Result<T, SimError>`. Most variants are
//! model-author errors that abort a run. The exceptions are listed by
//! [`SimError::is_fatal`]: they are domain outcomes a process body is
//! expected to catch and handle.

use thiserror::Error;

use crate::component::ComponentState;
use crate::id::{ComponentId, ListId, QueueId, ResourceId, StateId};

/// The top-level error type for the simulation kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    // ── Scheduling errors ─────────────────────────────────

    /// Attempted to schedule a component before the current time.
    #[error("cannot schedule at T={requested} when current time is T={now}")]
    NonCausalSchedule { requested: f64, now: f64 },

    /// The clock was asked to move backwards. Indicates a kernel bug.
    #[error("clock regression from T={now} to T={event}")]
    ClockRegression { now: f64, event: f64 },

    /// A negative or NaN duration / time value.
    #[error("invalid duration {0}")]
    InvalidDuration(f64),

    // ── Component errors ──────────────────────────────────

    /// A component id was referenced but is not known to the environment.
    #[error("component {0} not found")]
    UnknownComponent(ComponentId),

    /// The requested transition is not valid from the component's state.
    #[error("component {component} cannot {action} while {state}")]
    InvalidState {
        component: ComponentId,
        state: ComponentState,
        action: &'static str,
    },

    /// The component has terminated; no further scheduling is permitted.
    #[error("component {0} is terminated")]
    Terminated(ComponentId),

    /// The component is already suspended on a resource or state.
    #[error("component {0} is already enqueued on a resource or state")]
    DoubleSuspension(ComponentId),

    /// Activation of a component that has no process body.
    #[error("component {0} has no process to run")]
    NoProcess(ComponentId),

    /// A process downcast to a concrete type failed.
    #[error("process of component {component} is not a {expected}")]
    ProcessTypeMismatch {
        component: ComponentId,
        expected: &'static str,
    },

    // ── Resource errors ───────────────────────────────────

    /// A resource id was referenced but is not known to the environment.
    #[error("resource {0} not found")]
    UnknownResource(ResourceId),

    /// Zero, negative or NaN quantity where a positive one is required.
    #[error("invalid quantity {quantity} on resource {resource}")]
    InvalidQuantity { resource: ResourceId, quantity: f64 },

    /// Attempted to release more than the component has claimed.
    #[error("component {component} cannot release {requested} from {resource}, only {claimed} claimed")]
    OverRelease {
        component: ComponentId,
        resource: ResourceId,
        requested: f64,
        claimed: f64,
    },

    /// A request or capacity change conflicts with the resource's limits.
    #[error("capacity limit on resource {resource}: {reason}")]
    CapacityLimit {
        resource: ResourceId,
        reason: String,
    },

    /// Policy parameters are out of range.
    #[error("invalid honor policy: {0}")]
    InvalidPolicy(String),

    /// A level operation was used on a non-depletable resource.
    #[error("resource {0} is not depletable")]
    NotDepletable(ResourceId),

    // ── Collection errors ─────────────────────────────────

    /// A bounded queue or list is full. Recoverable.
    #[error("{collection} is at capacity {capacity}")]
    QueueCapacityExceeded { collection: String, capacity: usize },

    #[error("queue {0} not found")]
    UnknownQueue(QueueId),

    #[error("list {0} not found")]
    UnknownList(ListId),

    // ── State errors ──────────────────────────────────────

    #[error("state {0} not found")]
    UnknownState(StateId),

    /// A typed state handle did not match the stored value type.
    #[error("state {state} does not hold a {expected}")]
    StateTypeMismatch {
        state: StateId,
        expected: &'static str,
    },

    // ── Registry errors ───────────────────────────────────

    /// No dependency of the requested type has been registered.
    #[error("no dependency of type {0} registered")]
    DependencyMissing(&'static str),
}

impl SimError {
    /// Returns `false` for domain outcomes a model is expected to handle
    /// (full collections), `true` for everything that must abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::QueueCapacityExceeded { .. })
    }
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
