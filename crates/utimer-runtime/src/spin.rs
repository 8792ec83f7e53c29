//! Spin-wait primitive for sub-scheduler-granularity timing.
//!
//! The wait polls the clock and yields the CPU slice instead of blocking
//! in the kernel, trading one busy core for precision a general-purpose
//! sleep cannot guarantee. No sleep substitution: a blocking wait would
//! reintroduce scheduler-quantum jitter.

use std::thread;
use utimer_common::clock::ClockSource;

/// Busy-wait until the clock reaches `deadline_ticks`.
///
/// Returns the wake time observed on exit, which is `>= deadline_ticks`
/// unless the deadline had already passed on entry, in which case the
/// first observation is returned without yielding at all.
pub fn spin_until(clock: &dyn ClockSource, deadline_ticks: u64) -> u64 {
    loop {
        let now = clock.now_ticks();
        if now >= deadline_ticks {
            return now;
        }
        thread::yield_now();
    }
}
