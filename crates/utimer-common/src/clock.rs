//! Monotonic clock source abstraction.
//!
//! The timer loop schedules against raw clock ticks, not `Duration`s, so
//! deadline arithmetic stays in integers and never accumulates rounding
//! error. The production clock is [`MonotonicClock`]; the trait seam
//! exists so the scheduling algorithm can be driven deterministically by
//! a fake clock in tests.

use std::time::Instant;

/// A monotonic, high-resolution tick counter with a known frequency.
///
/// Implementations must be monotonic: `now_ticks` never decreases.
/// The trait is consumed, not owned, by the timer loop.
pub trait ClockSource: Send + Sync {
    /// Current value of the tick counter.
    fn now_ticks(&self) -> u64;

    /// Ticks per second.
    fn frequency(&self) -> u64;
}

/// Production clock: `std::time::Instant` anchored at construction,
/// counting elapsed nanoseconds (frequency 1 GHz).
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    /// Nanosecond tick rate.
    pub const FREQUENCY: u64 = 1_000_000_000;

    /// Create a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now_ticks(&self) -> u64 {
        self.anchor.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        Self::FREQUENCY
    }
}

/// Convert a microsecond interval into clock ticks.
///
/// Uses the floor of `frequency / 1_000_000` as the ticks-per-microsecond
/// factor, so a clock coarser than 1 MHz yields a period of 0 ticks. The
/// timer loop then degenerates into a continuous spin; callers get a
/// warning at start but no error.
#[must_use]
pub fn period_ticks(frequency: u64, interval_us: u64) -> u64 {
    (frequency / 1_000_000) * interval_us
}
