//! Request descriptions built by process bodies.

use crate::id::ResourceId;
use crate::priority::Priority;
use crate::resource::CapacityLimitMode;
use crate::time::TickTime;

/// When a pending request gives up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailAfter {
    Delay(f64),
    At(TickTime),
}

/// A claim on one or more resources.
///
/// ```rust
/// # use kairos::{Request, ResourceId, Priority};
/// # let (clerk, desk) = (ResourceId::new(0), ResourceId::new(1));
/// let r = Request::new(clerk)
///     .quantity(2.0)
///     .and(desk, 1.0)
///     .priority(Priority::IMPORTANT)
///     .fail_delay(5.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub(crate) items: Vec<(ResourceId, f64)>,
    pub(crate) priority: Option<Priority>,
    pub(crate) one_of: bool,
    pub(crate) fail: Option<FailAfter>,
    pub(crate) fail_priority: Priority,
    pub(crate) limit_mode: Option<CapacityLimitMode>,
}

impl Request {
    /// Request one unit of `resource`.
    pub fn new(resource: ResourceId) -> Self {
        Request {
            items: vec![(resource, 1.0)],
            priority: None,
            one_of: false,
            fail: None,
            fail_priority: Priority::NORMAL,
            limit_mode: None,
        }
    }

    /// Request one unit from each of `resources`, all of them required.
    pub fn all_of(resources: impl IntoIterator<Item = ResourceId>) -> Self {
        let mut req = Request::empty();
        req.items = resources.into_iter().map(|r| (r, 1.0)).collect();
        req
    }

    /// Request one unit from the first of `resources` able to grant it,
    /// tried in the given order.
    pub fn any_of(resources: impl IntoIterator<Item = ResourceId>) -> Self {
        let mut req = Request::all_of(resources);
        req.one_of = true;
        req
    }

    fn empty() -> Self {
        Request {
            items: Vec::new(),
            priority: None,
            one_of: false,
            fail: None,
            fail_priority: Priority::NORMAL,
            limit_mode: None,
        }
    }

    /// Set the quantity of every resource listed so far.
    pub fn quantity(mut self, quantity: f64) -> Self {
        for item in &mut self.items {
            item.1 = quantity;
        }
        self
    }

    /// Add another resource with its own quantity.
    pub fn and(mut self, resource: ResourceId, quantity: f64) -> Self {
        self.items.push((resource, quantity));
        self
    }

    /// Position among requesters; higher is served first.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Honor the first listed resource that can grant, instead of all of them.
    pub fn one_of(mut self) -> Self {
        self.one_of = true;
        self
    }

    /// Give up if not honored within `delay`.
    pub fn fail_delay(mut self, delay: f64) -> Self {
        self.fail = Some(FailAfter::Delay(delay));
        self
    }

    /// Give up if not honored by `at`.
    pub fn fail_at(mut self, at: TickTime) -> Self {
        self.fail = Some(FailAfter::At(at));
        self
    }

    /// Event priority of the renege timer.
    pub fn fail_priority(mut self, priority: Priority) -> Self {
        self.fail_priority = priority;
        self
    }

    /// Override the resource's capacity-limit mode for this request.
    pub fn limit_mode(mut self, mode: CapacityLimitMode) -> Self {
        self.limit_mode = Some(mode);
        self
    }

    /// Requested resources in listed order.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.items.iter().map(|(r, _)| *r)
    }
}
