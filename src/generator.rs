//! Arrival generator: a process that spawns components at sampled
//! inter-arrival times.

use std::any::Any;

use tracing::debug;

use crate::context::Context;
use crate::error::SimResult;
use crate::id::ComponentId;
use crate::process::{Process, Yield};
use crate::sampler::Sampler;
use crate::time::TickTime;

/// Spawns a component after every inter-arrival time until `total`
/// components exist or the next arrival would fall after `until`.
///
/// ```rust
/// use kairos::{Context, Environment, Generator, RunUntil, Sampler};
///
/// let mut env = Environment::default();
/// let gen = Generator::new(
///     |s: &mut dyn Sampler| s.exponential(5.0),
///     |cx: &mut Context<'_>, _n: u64| Ok(cx.create_component("Customer.")),
/// )
/// .total(10);
/// env.spawn("arrivals", gen).unwrap();
/// env.run(RunUntil::Quiescent).unwrap();
/// assert_eq!(env.component_count(), 11);
/// ```
pub struct Generator<I, F> {
    iat: I,
    factory: F,
    total: Option<u64>,
    until: Option<TickTime>,
    start_immediately: bool,
    primed: bool,
    created: u64,
}

impl<I, F> Generator<I, F>
where
    I: FnMut(&mut dyn Sampler) -> f64 + 'static,
    F: FnMut(&mut Context<'_>, u64) -> SimResult<ComponentId> + 'static,
{
    /// A generator with no limits that waits one inter-arrival time first.
    pub fn new(iat: I, factory: F) -> Self {
        Generator {
            iat,
            factory,
            total: None,
            until: None,
            start_immediately: false,
            primed: false,
            created: 0,
        }
    }

    /// Stop after `n` arrivals.
    pub fn total(mut self, n: u64) -> Self {
        self.total = Some(n);
        self
    }

    /// No arrivals after `t`.
    pub fn until(mut self, t: TickTime) -> Self {
        self.until = Some(t);
        self
    }

    /// First arrival at start instead of after one inter-arrival time.
    pub fn start_immediately(mut self) -> Self {
        self.start_immediately = true;
        self
    }

    /// Arrivals spawned so far.
    pub fn created(&self) -> u64 {
        self.created
    }

    fn exhausted(&self) -> bool {
        self.total.is_some_and(|n| self.created >= n)
    }

    fn next_arrival(&mut self, cx: &mut Context<'_>) -> SimResult<Yield> {
        let delay = (self.iat)(cx.sampler());
        let at = cx.now().plus(delay)?;
        if self.until.is_some_and(|u| at > u) {
            return cx.terminate();
        }
        cx.hold(delay)
    }
}

impl<I, F> Process for Generator<I, F>
where
    I: FnMut(&mut dyn Sampler) -> f64 + 'static,
    F: FnMut(&mut Context<'_>, u64) -> SimResult<ComponentId> + 'static,
{
    fn resume(&mut self, cx: &mut Context<'_>) -> SimResult<Yield> {
        if !self.primed {
            self.primed = true;
            if !self.start_immediately {
                return self.next_arrival(cx);
            }
        }
        if self.exhausted() || self.until.is_some_and(|u| cx.now() > u) {
            return cx.terminate();
        }
        let n = self.created;
        let id = (self.factory)(cx, n)?;
        self.created += 1;
        debug!(generator = %cx.me(), spawned = %id, n, "arrival");
        if self.exhausted() {
            return cx.terminate();
        }
        self.next_arrival(cx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
