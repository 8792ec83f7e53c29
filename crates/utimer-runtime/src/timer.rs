//! Microsecond timer: spin-wait scheduling loop and lifecycle controller.
//!
//! The timer owns one dedicated worker thread that schedules against an
//! absolute deadline in clock ticks. Each iteration the deadline advances
//! by exactly the period, never by `now + period`, so handler latency and
//! individual overruns do not compound into long-run drift: a late tick
//! is followed by a correspondingly shorter wait (or an immediate
//! catch-up firing when the overrun exceeds a full period).

use crate::realtime;
use crate::spin::spin_until;
use crossbeam_utils::CachePadded;
use static_assertions::assert_impl_all;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, trace, warn};
use utimer_common::clock::{period_ticks, ClockSource, MonotonicClock};
use utimer_common::config::{RealtimeConfig, TimerConfig};
use utimer_common::error::{TimerError, TimerResult};
use utimer_common::events::{LifecycleEvent, StartOutcome, TickEvent, TimerObserver};

/// Marker for a tick observer panic; terminates the loop cleanly.
struct HandlerPanic;

/// One period of the scheduling algorithm, owned by the worker thread.
///
/// Kept separate from the thread plumbing so the deadline arithmetic is
/// testable against a deterministic clock.
struct TimerLoop {
    clock: Arc<dyn ClockSource>,
    period_ticks: u64,
    next_deadline: u64,
    ticks_fired: u64,
}

impl TimerLoop {
    fn new(clock: Arc<dyn ClockSource>, period_ticks: u64) -> Self {
        let next_deadline = clock.now_ticks() + period_ticks;
        Self {
            clock,
            period_ticks,
            next_deadline,
            ticks_fired: 0,
        }
    }

    /// Execute one period: spin to the deadline, measure the overrun,
    /// notify observers, advance the deadline by exactly one period.
    fn run_once(
        &mut self,
        worker: ThreadId,
        observers: &[Arc<dyn TimerObserver>],
    ) -> Result<TickEvent, HandlerPanic> {
        let wake = spin_until(self.clock.as_ref(), self.next_deadline);
        let delay_ticks = wake as i64 - self.next_deadline as i64;

        let event = TickEvent {
            worker,
            delay_ticks,
        };

        let mut panicked = false;
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_tick(event))).is_err() {
                error!("tick observer panicked; stopping timer");
                panicked = true;
                break;
            }
        }

        if self.period_ticks == 0 {
            // A zero period (clock coarser than 1 MHz) would leave the
            // deadline stalled at its initial value while wake times run
            // away. Re-anchor so delay keeps measuring per-iteration
            // lateness; the loop still fires continuously with no wait.
            self.next_deadline = wake;
        } else {
            self.next_deadline += self.period_ticks;
        }
        self.ticks_fired += 1;

        if panicked {
            Err(HandlerPanic)
        } else {
            Ok(event)
        }
    }

    fn next_deadline(&self) -> u64 {
        self.next_deadline
    }

    fn ticks_fired(&self) -> u64 {
        self.ticks_fired
    }
}

/// High-resolution periodic timer firing at a fixed microsecond interval.
///
/// Each instance owns at most one dedicated worker thread, created at
/// [`start`](Self::start) and joined at [`stop`](Self::stop). The worker
/// busy-waits (yield-and-recheck) on the monotonic clock instead of
/// sleeping, trading one CPU core for sub-scheduler-granularity timing.
///
/// All lifecycle methods take `&mut self`, so concurrent start/stop on
/// one instance is excluded at compile time; sharing an instance across
/// threads requires external synchronization. Multiple instances run
/// fully independently.
///
/// Dropping a running timer stops it.
pub struct MicroTimer {
    config: TimerConfig,
    clock: Arc<dyn ClockSource>,
    observers: Vec<Arc<dyn TimerObserver>>,
    /// Snapshot of `observers` taken at the last `start()`; all
    /// notifications of that run (ticks and lifecycle) go to this list.
    active_observers: Vec<Arc<dyn TimerObserver>>,
    running: Arc<CachePadded<AtomicBool>>,
    worker: Option<JoinHandle<()>>,
}

assert_impl_all!(MicroTimer: Send);

impl MicroTimer {
    /// Create a timer with the default configuration (100µs interval)
    /// and the production monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TimerConfig::default())
    }

    /// Create a timer with an explicit configuration.
    #[must_use]
    pub fn with_config(config: TimerConfig) -> Self {
        Self::with_parts(config, Arc::new(MonotonicClock::new()), Vec::new())
    }

    fn with_parts(
        config: TimerConfig,
        clock: Arc<dyn ClockSource>,
        observers: Vec<Arc<dyn TimerObserver>>,
    ) -> Self {
        Self {
            config,
            clock,
            observers,
            active_observers: Vec::new(),
            running: Arc::new(CachePadded::new(AtomicBool::new(false))),
            worker: None,
        }
    }

    /// Builder for configuring a timer fluently.
    #[must_use]
    pub fn builder() -> MicroTimerBuilder {
        MicroTimerBuilder::new()
    }

    /// Configured interval in microseconds.
    #[must_use]
    pub fn interval_us(&self) -> u64 {
        self.config.interval_us
    }

    /// Set the interval in microseconds.
    ///
    /// The interval is converted to clock ticks once, at the next
    /// `start()`; a running timer keeps its current period until
    /// restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval_us` is zero.
    pub fn set_interval_us(&mut self, interval_us: u64) -> TimerResult<()> {
        if interval_us == 0 {
            return Err(TimerError::Config(
                "interval_us must be greater than zero".into(),
            ));
        }
        self.config.interval_us = interval_us;
        Ok(())
    }

    /// Register an observer, invoked after all previously registered ones.
    ///
    /// The observer list is snapshotted at `start()` and every
    /// notification of that run (ticks, the start itself, and the
    /// matching stop) goes to the snapshot; like the interval, a
    /// subscription made while running takes effect at the next start
    /// (existing subscriptions keep firing).
    pub fn subscribe(&mut self, observer: Arc<dyn TimerObserver>) {
        self.observers.push(observer);
    }

    /// Whether a start has been requested and not yet stopped.
    ///
    /// True immediately after `start()` returns, possibly before the
    /// worker completes its first iteration; false again after `stop()`
    /// or after a tick observer fault terminated the loop.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start or stop the timer according to `enabled`.
    ///
    /// Delegates to [`start`](Self::start)/[`stop`](Self::stop) when the
    /// value differs from the current state; otherwise a no-op.
    ///
    /// # Errors
    ///
    /// Propagates start errors (invalid configuration, spawn failure).
    pub fn set_enabled(&mut self, enabled: bool) -> TimerResult<()> {
        if enabled != self.is_enabled() {
            if enabled {
                self.start()?;
            } else {
                self.stop();
            }
        }
        Ok(())
    }

    /// Start the timer.
    ///
    /// Spawns the dedicated worker thread, emits `on_start` with the
    /// caller's thread id, and returns the worker's id. Starting an
    /// already-running timer is a no-op reported via
    /// [`StartOutcome::AlreadyRunning`], not an error.
    ///
    /// If the configured interval truncates to a zero-tick period for
    /// the clock in use, the worker fires continuously with no wait and
    /// consumes one core entirely; this is logged at start but accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker
    /// thread cannot be spawned.
    pub fn start(&mut self) -> TimerResult<StartOutcome> {
        if let Some(handle) = &self.worker {
            if !handle.is_finished() {
                debug!("start requested but worker is already running");
                return Ok(StartOutcome::AlreadyRunning);
            }
            // Reap a worker that exited on its own (tick observer fault)
            if let Some(finished) = self.worker.take() {
                if finished.join().is_err() {
                    warn!("previous worker thread panicked");
                }
            }
        }

        self.config.validate()?;

        let period = period_ticks(self.clock.frequency(), self.config.interval_us);
        if period == 0 {
            warn!(
                interval_us = self.config.interval_us,
                frequency = self.clock.frequency(),
                "interval truncates to a zero-tick period; worker will spin continuously"
            );
        }

        self.running.store(true, Ordering::Release);
        self.active_observers = self.observers.clone();

        let running = Arc::clone(&self.running);
        let clock = Arc::clone(&self.clock);
        let observers = self.active_observers.clone();
        let rt_config = self.config.realtime.clone();

        let handle = match thread::Builder::new()
            .name("utimer-worker".into())
            .spawn(move || worker_main(clock, period, &rt_config, &running, &observers))
        {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(TimerError::Thread(format!(
                    "failed to spawn worker thread: {e}"
                )));
            }
        };

        let worker_id = handle.thread().id();
        self.worker = Some(handle);

        info!(
            interval_us = self.config.interval_us,
            period_ticks = period,
            "timer started"
        );

        dispatch_lifecycle(&self.active_observers, "start", |observer, event| {
            observer.on_start(event);
        });

        Ok(StartOutcome::Started(worker_id))
    }

    /// Stop the timer, blocking until the worker thread has exited.
    ///
    /// No-op when no worker is alive. The wait is unbounded: a tick
    /// observer that never returns stalls `stop()` indefinitely.
    ///
    /// The running flag is observed by the worker only between outer
    /// iterations, never inside the spin-wait, so a stop request landing
    /// mid-spin lets the pending tick fire once before the worker exits.
    /// After `stop()` returns, no further tick notifications are
    /// delivered until the timer is restarted.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }

        // A fault-initiated stop was already reported from the worker;
        // only the call that actually performed the transition notifies.
        if was_running {
            info!("timer stopped");
            dispatch_lifecycle(&self.active_observers, "stop", |observer, event| {
                observer.on_stop(event);
            });
        }
    }
}

impl Default for MicroTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MicroTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Deliver a start/stop notification from the calling thread, isolating
/// observer panics.
fn dispatch_lifecycle<F>(observers: &[Arc<dyn TimerObserver>], kind: &str, notify: F)
where
    F: Fn(&dyn TimerObserver, LifecycleEvent),
{
    let event = LifecycleEvent {
        caller: thread::current().id(),
    };
    for observer in observers {
        if catch_unwind(AssertUnwindSafe(|| notify(observer.as_ref(), event))).is_err() {
            error!(kind, "lifecycle observer panicked");
        }
    }
}

/// Worker thread body: RT setup, then the outer scheduling loop.
fn worker_main(
    clock: Arc<dyn ClockSource>,
    period: u64,
    rt_config: &RealtimeConfig,
    running: &CachePadded<AtomicBool>,
    observers: &[Arc<dyn TimerObserver>],
) {
    let worker_id = thread::current().id();
    debug!(?worker_id, period_ticks = period, "worker thread started");

    if let Err(e) = realtime::init_realtime(rt_config) {
        warn!(error = %e, "real-time setup failed; continuing without RT guarantees");
    }

    let mut timer_loop = TimerLoop::new(clock, period);

    while running.load(Ordering::Acquire) {
        match timer_loop.run_once(worker_id, observers) {
            Ok(event) => trace!(delay_ticks = event.delay_ticks, "tick"),
            Err(HandlerPanic) => {
                // The swap arbitrates against a concurrent stop(): whichever
                // side performs the true-to-false transition reports the stop.
                if running.swap(false, Ordering::AcqRel) {
                    let event = LifecycleEvent { caller: worker_id };
                    for observer in observers {
                        if catch_unwind(AssertUnwindSafe(|| observer.on_stop(event))).is_err() {
                            error!("stop observer panicked during fault shutdown");
                        }
                    }
                }
                break;
            }
        }
    }

    debug!(ticks = timer_loop.ticks_fired(), "worker thread exiting");
}

/// Builder for configuring a [`MicroTimer`].
pub struct MicroTimerBuilder {
    config: TimerConfig,
    clock: Option<Arc<dyn ClockSource>>,
    observers: Vec<Arc<dyn TimerObserver>>,
}

impl MicroTimerBuilder {
    /// Create a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TimerConfig::default(),
            clock: None,
            observers: Vec::new(),
        }
    }

    /// Set the interval in microseconds.
    #[must_use]
    pub fn interval_us(mut self, interval_us: u64) -> Self {
        self.config.interval_us = interval_us;
        self
    }

    /// Set the real-time configuration for the worker thread.
    #[must_use]
    pub fn realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.config.realtime = realtime;
        self
    }

    /// Set the full timer configuration.
    #[must_use]
    pub fn config(mut self, config: TimerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the clock source (defaults to [`MonotonicClock`]).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register an observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn TimerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Build the timer.
    #[must_use]
    pub fn build(self) -> MicroTimer {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        MicroTimer::with_parts(self.config, clock, self.observers)
    }
}

impl Default for MicroTimerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
