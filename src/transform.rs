//! Mapping between virtual ticks and wall-clock instants.
//!
//! Display only. Ordering and arithmetic inside the kernel use
//! [`TickTime`] exclusively.

use std::time::{Duration, SystemTime};

use crate::time::TickTime;

pub trait TickTransform {
    /// `None` for times that have no wall-clock counterpart, such as
    /// [`TickTime::DISTANT_FUTURE`].
    fn to_wall_time(&self, t: TickTime) -> Option<SystemTime>;
    fn to_tick_time(&self, wall: SystemTime) -> TickTime;
}

/// One tick equals `tick_unit`, counted from `origin`.
#[derive(Debug, Clone, Copy)]
pub struct OffsetTransform {
    pub origin: SystemTime,
    pub tick_unit: Duration,
}

impl OffsetTransform {
    /// Tick zero maps to `origin`; one tick lasts `tick_unit`.
    pub fn new(origin: SystemTime, tick_unit: Duration) -> Self {
        OffsetTransform { origin, tick_unit }
    }

    /// Ticks are minutes, counted from `origin`.
    pub fn minutes(origin: SystemTime) -> Self {
        Self::new(origin, Duration::from_secs(60))
    }
}

impl TickTransform for OffsetTransform {
    fn to_wall_time(&self, t: TickTime) -> Option<SystemTime> {
        let offset = Duration::try_from_secs_f64(self.tick_unit.as_secs_f64() * t.ticks()).ok()?;
        self.origin.checked_add(offset)
    }

    /// Instants before `origin` map to tick zero.
    fn to_tick_time(&self, wall: SystemTime) -> TickTime {
        let elapsed = wall.duration_since(self.origin).unwrap_or_default();
        TickTime::at(elapsed.as_secs_f64() / self.tick_unit.as_secs_f64())
    }
}
