//! Running statistics for queues, resources and states.
//!
//! Two shapes cover everything the kernel tracks:
//! - [`LevelTimeline`], a step function sampled at every mutation
//!   (queue length, claimed quantity, capacity);
//! - [`SampleStatistics`], a bag of observations (length of stay).

use crate::time::TickTime;

// ── LevelTimeline ─────────────────────────────────────────────────────

/// A piecewise-constant value over virtual time.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelTimeline {
    points: Vec<(TickTime, f64)>,
    enabled: bool,
}

impl LevelTimeline {
    /// A timeline starting at `value` at time `start`.
    pub fn new(start: TickTime, value: f64, enabled: bool) -> Self {
        LevelTimeline {
            points: vec![(start, value)],
            enabled,
        }
    }

    /// Record a new level. Consecutive records at the same instant keep
    /// only the last value. When disabled, only the current value is kept.
    pub fn record(&mut self, at: TickTime, value: f64) {
        if !self.enabled {
            self.points.clear();
            self.points.push((at, value));
            return;
        }
        match self.points.last_mut() {
            Some(last) if last.0 == at => last.1 = value,
            Some(last) if last.1 == value => {}
            _ => self.points.push((at, value)),
        }
    }

    /// Most recent value.
    pub fn current(&self) -> f64 {
        self.points.last().map(|p| p.1).unwrap_or(0.0)
    }

    /// Recorded `(time, value)` steps.
    pub fn points(&self) -> &[(TickTime, f64)] {
        &self.points
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest value recorded.
    pub fn max(&self) -> f64 {
        self.points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest value recorded.
    pub fn min(&self) -> f64 {
        self.points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min)
    }

    /// Time-weighted mean over `[first record, now]`.
    ///
    /// Returns the current value when the window has zero length.
    pub fn time_weighted_mean(&self, now: TickTime) -> f64 {
        let Some(&(start, _)) = self.points.first() else {
            return 0.0;
        };
        let span = now - start;
        if span <= 0.0 {
            return self.current();
        }
        let mut area = 0.0;
        for (i, &(t, v)) in self.points.iter().enumerate() {
            let end = self.points.get(i + 1).map(|p| p.0).unwrap_or(now);
            let end = if end > now { now } else { end };
            if end > t {
                area += v * (end - t);
            }
        }
        area / span
    }

    pub(crate) fn summary(&self, now: TickTime) -> TimelineSummary {
        TimelineSummary {
            current: self.current(),
            mean: self.time_weighted_mean(now),
            min: if self.points.is_empty() { 0.0 } else { self.min() },
            max: if self.points.is_empty() { 0.0 } else { self.max() },
        }
    }
}

/// Snapshot of a [`LevelTimeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TimelineSummary {
    pub current: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

// ── SampleStatistics ──────────────────────────────────────────────────

/// Unweighted observations.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleStatistics {
    values: Vec<f64>,
}

impl SampleStatistics {
    /// An empty sample set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn record(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Observations in recording order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of observations.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.values.len() as f64;
        Some(var.sqrt())
    }

    /// Smallest observation.
    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    /// Largest observation.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Nearest-rank percentile, `p` in `[0, 100]`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let p = p.clamp(0.0, 100.0);
        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
    }

    pub(crate) fn summary(&self) -> SampleSummary {
        SampleSummary {
            count: self.count(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min(),
            max: self.max(),
        }
    }
}

/// Snapshot of a [`SampleStatistics`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}
