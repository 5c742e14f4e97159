//! The `Process` trait: resumable component bodies.
//!
//! A body is an explicit state machine. Each call to
//! [`Process::resume`] runs it from its current position up to the next
//! suspension verb on the [`Context`], whose returned [`Yield`] is handed
//! back to the environment.

use std::any::Any;

use crate::context::Context;
use crate::error::SimResult;

// ── Yield ─────────────────────────────────────────────────────────────

/// Which verb suspended a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Suspension {
    Hold,
    Passivate,
    Standby,
    Request,
    Wait,
    Interrupt,
    Terminate,
    StopSimulation,
}

/// Proof that a body reached a suspension point.
///
/// Only [`Context`] verbs can construct one, so a body cannot return
/// without telling the environment where it went.
#[must_use = "a process body must return the Yield of its suspension verb"]
#[derive(Debug, PartialEq, Eq)]
pub struct Yield {
    suspension: Suspension,
}

impl Yield {
    pub(crate) fn new(suspension: Suspension) -> Self {
        Yield { suspension }
    }

    /// The verb that produced this token.
    pub fn suspension(&self) -> Suspension {
        self.suspension
    }
}

/// Result of a verb that may or may not suspend (`request`, `wait`, ...).
#[must_use = "a suspended outcome must be returned from the process body"]
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Honored immediately; the body keeps running.
    Ready,
    /// The component is enqueued; return the `Yield`.
    Suspended(Yield),
}

impl Outcome {
    /// Returns `true` if the verb completed without suspending.
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready)
    }
}

// ── Process ───────────────────────────────────────────────────────────

/// A component body.
///
/// # Contract
///
/// Implementations **must**:
/// - Keep their program counter in `self`; `resume` is re-entered from
///   the top after every suspension.
/// - Route all side effects on the model through `cx`.
/// - Return the `Yield` of the suspension verb they stopped at.
///
/// # Example
///
/// ```rust
/// use kairos::{Context, Process, SimResult, Yield};
///
/// struct Blinker { on: bool, toggles: u32 }
///
/// impl Process for Blinker {
///     fn resume(&mut self, cx: &mut Context<'_>) -> SimResult<Yield> {
///         self.on = !self.on;
///         self.toggles += 1;
///         if self.toggles == 10 {
///             return cx.terminate();
///         }
///         cx.hold(1.0)
///     }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// }
/// ```
pub trait Process {
    /// Run until the next suspension point.
    fn resume(&mut self, cx: &mut Context<'_>) -> SimResult<Yield>;

    /// Downcast support, required for `Environment::process::<T>()`.
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A body backed by a closure, useful for tests and small models.
impl<F> Process for F
where
    F: FnMut(&mut Context<'_>) -> SimResult<Yield> + 'static,
{
    fn resume(&mut self, cx: &mut Context<'_>) -> SimResult<Yield> {
        (self)(cx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Identity helper that pins a closure to the `Process` signature so its
/// argument type is inferred.
pub fn process_fn<F>(f: F) -> F
where
    F: FnMut(&mut Context<'_>) -> SimResult<Yield> + 'static,
{
    f
}

/// What `terminate()` means for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessMode {
    /// `terminate()` ends the component for good.
    #[default]
    RunToCompletion,
    /// `terminate()` re-runs the body at the current time.
    Repeating,
}
