//! Delay metrics collection for tick accuracy monitoring.
//!
//! Provides a ring buffer-based histogram of per-tick delays (overrun
//! past the scheduled deadline, in clock ticks) without heap allocations
//! during normal operation. With absolute-deadline scheduling the mean
//! delay converges toward zero over a run; these metrics make that
//! property observable.

use crate::events::{LifecycleEvent, TickEvent, TimerObserver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Tick delay metrics with a ring buffer for percentile tracking.
#[derive(Debug)]
pub struct DelayMetrics {
    /// Ring buffer of per-tick delays in clock ticks.
    samples: Box<[i64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples retained (saturates at buffer size).
    sample_count: usize,
    /// Total ticks recorded.
    total_ticks: u64,
    /// Minimum observed delay.
    min_ticks: i64,
    /// Maximum observed delay.
    max_ticks: i64,
    /// Sum of all delays for mean calculation.
    sum_ticks: i128,
}

impl DelayMetrics {
    /// Create a new metrics collector retaining `histogram_size` samples.
    #[must_use]
    pub fn new(histogram_size: usize) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0i64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_ticks: 0,
            min_ticks: i64::MAX,
            max_ticks: i64::MIN,
            sum_ticks: 0,
        }
    }

    /// Record one tick delay.
    ///
    /// Allocation-free; safe to call from the worker thread.
    pub fn record(&mut self, delay_ticks: i64) {
        self.samples[self.write_pos] = delay_ticks;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_ticks += 1;
        self.min_ticks = self.min_ticks.min(delay_ticks);
        self.max_ticks = self.max_ticks.max(delay_ticks);
        self.sum_ticks += i128::from(delay_ticks);
    }

    /// Total ticks recorded.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Minimum observed delay, if any tick was recorded.
    #[must_use]
    pub fn min(&self) -> Option<i64> {
        (self.total_ticks > 0).then_some(self.min_ticks)
    }

    /// Maximum observed delay, if any tick was recorded.
    #[must_use]
    pub fn max(&self) -> Option<i64> {
        (self.total_ticks > 0).then_some(self.max_ticks)
    }

    /// Mean delay over the whole run.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.total_ticks > 0 {
            Some(self.sum_ticks as f64 / self.total_ticks as f64)
        } else {
            None
        }
    }

    /// Compute a percentile from the retained samples.
    ///
    /// Returns `None` if no samples were recorded or `percentile` is
    /// outside `0.0..=100.0`.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<i64> {
        if self.sample_count == 0 {
            return None;
        }
        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<i64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    /// Get an immutable snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> DelaySnapshot {
        DelaySnapshot {
            total_ticks: self.total_ticks,
            min_ticks: self.min(),
            max_ticks: self.max(),
            mean_ticks: self.mean(),
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_ticks = 0;
        self.min_ticks = i64::MAX;
        self.max_ticks = i64::MIN;
        self.sum_ticks = 0;
    }
}

/// Immutable snapshot of delay metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DelaySnapshot {
    /// Total ticks recorded.
    pub total_ticks: u64,
    /// Minimum delay in clock ticks.
    pub min_ticks: Option<i64>,
    /// Maximum delay in clock ticks.
    pub max_ticks: Option<i64>,
    /// Mean delay in clock ticks.
    pub mean_ticks: Option<f64>,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl DelaySnapshot {
    /// Spread (max - min) of observed delays.
    #[must_use]
    pub fn jitter_ticks(&self) -> Option<i64> {
        match (self.min_ticks, self.max_ticks) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

/// Observer that feeds the tick stream into [`DelayMetrics`] and counts
/// lifecycle transitions.
///
/// Register one with the timer and read [`DelayRecorder::snapshot`] from
/// any thread; internally the metrics sit behind a mutex taken only for
/// the duration of a single record.
#[derive(Debug)]
pub struct DelayRecorder {
    metrics: Mutex<DelayMetrics>,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl DelayRecorder {
    /// Create a recorder retaining `histogram_size` delay samples.
    #[must_use]
    pub fn new(histogram_size: usize) -> Self {
        Self {
            metrics: Mutex::new(DelayMetrics::new(histogram_size)),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    /// Snapshot of the delay metrics collected so far.
    #[must_use]
    pub fn snapshot(&self) -> DelaySnapshot {
        match self.metrics.lock() {
            Ok(m) => m.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    /// Number of start notifications observed.
    #[must_use]
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Acquire)
    }

    /// Number of stop notifications observed.
    #[must_use]
    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::Acquire)
    }
}

impl TimerObserver for DelayRecorder {
    fn on_start(&self, _event: LifecycleEvent) {
        self.starts.fetch_add(1, Ordering::AcqRel);
    }

    fn on_tick(&self, event: TickEvent) {
        match self.metrics.lock() {
            Ok(mut m) => m.record(event.delay_ticks),
            Err(poisoned) => poisoned.into_inner().record(event.delay_ticks),
        }
    }

    fn on_stop(&self, _event: LifecycleEvent) {
        self.stops.fetch_add(1, Ordering::AcqRel);
    }
}
