//! Scheduling and queueing priorities.

/// An ordered priority. Higher values are served first.
///
/// Used to break ties between events at the same virtual time, and to
/// order requesters, waiters and queue members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Priority(i32);

impl Priority {
    pub const LOWEST: Priority = Priority(-20);
    pub const LOW: Priority = Priority(-10);
    pub const NORMAL: Priority = Priority(0);
    pub const IMPORTANT: Priority = Priority(20);
    pub const CRITICAL: Priority = Priority(30);

    /// Wrap a raw priority; higher runs first.
    #[inline]
    pub fn new(value: i32) -> Self {
        Priority(value)
    }

    /// Return the raw value.
    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Priority::LOWEST => write!(f, "LOWEST"),
            Priority::LOW => write!(f, "LOW"),
            Priority::NORMAL => write!(f, "NORMAL"),
            Priority::IMPORTANT => write!(f, "IMPORTANT"),
            Priority::CRITICAL => write!(f, "CRITICAL"),
            Priority(v) => write!(f, "P{}", v),
        }
    }
}
