//! Virtual time for the simulation clock.
//!
//! `TickTime` is a dimensionless scalar. It advances only when the
//! scheduler dispatches events, never from wall-clock observation. Mapping
//! ticks to calendar time is the job of [`crate::transform`].

use std::cmp::Ordering;
use std::ops::{Add, Sub};

use crate::error::{SimError, SimResult};

/// A point on the virtual time axis.
///
/// Backed by an `f64` that is guaranteed not to be NaN, which makes the
/// total order below agree with the numeric one. `+inf` is allowed and
/// is used for "never" (see [`TickTime::DISTANT_FUTURE`]).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TickTime(f64);

impl TickTime {
    /// The zero-point of simulation time.
    pub const ZERO: TickTime = TickTime(0.0);

    /// A time that is never reached.
    pub const DISTANT_FUTURE: TickTime = TickTime(f64::INFINITY);

    /// Create a `TickTime` from a raw value.
    ///
    /// Returns `InvalidDuration` for NaN and negative values.
    pub fn new(ticks: f64) -> SimResult<Self> {
        if ticks.is_nan() || ticks < 0.0 {
            return Err(SimError::InvalidDuration(ticks));
        }
        Ok(TickTime(ticks))
    }

    /// Create a `TickTime` from a value known to be valid (test and
    /// constant sites). NaN and negative inputs are clamped to zero.
    #[inline]
    pub fn at(ticks: f64) -> Self {
        if ticks.is_nan() || ticks < 0.0 {
            TickTime::ZERO
        } else {
            TickTime(ticks)
        }
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> f64 {
        self.0
    }

    /// Returns `true` unless this is [`TickTime::DISTANT_FUTURE`].
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// The absolute time `delay` ticks after `self`.
    ///
    /// `delay` must be a non-negative, non-NaN value.
    pub fn plus(self, delay: f64) -> SimResult<TickTime> {
        check_duration(delay)?;
        Ok(TickTime(self.0 + delay))
    }

    /// Returns the non-negative distance from `earlier` to `self`, or
    /// `None` if `earlier` is after `self`.
    #[inline]
    pub fn duration_since(self, earlier: TickTime) -> Option<f64> {
        if earlier.0 > self.0 {
            None
        } else {
            Some(self.0 - earlier.0)
        }
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: TickTime) -> bool {
        self.0 < other.0
    }
}

/// Validate a hold / delay duration.
pub(crate) fn check_duration(d: f64) -> SimResult<f64> {
    if d.is_nan() || d < 0.0 {
        Err(SimError::InvalidDuration(d))
    } else {
        Ok(d)
    }
}

impl PartialEq for TickTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TickTime {}

impl Ord for TickTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for TickTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<f64> for TickTime {
    type Output = TickTime;

    /// Saturating add for already-validated durations.
    fn add(self, rhs: f64) -> TickTime {
        TickTime::at(self.0 + rhs)
    }
}

impl Sub for TickTime {
    type Output = f64;

    fn sub(self, rhs: TickTime) -> f64 {
        self.0 - rhs.0
    }
}

impl Default for TickTime {
    fn default() -> Self {
        TickTime::ZERO
    }
}

impl std::fmt::Display for TickTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_infinite() {
            write!(f, "T=inf")
        } else {
            write!(f, "T={}", self.0)
        }
    }
}
