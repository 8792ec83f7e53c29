//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Test log initialization
//! - Recording the full notification stream in order
//! - Running a timer for a fixed number of ticks and collecting stats

#![allow(dead_code)] // Shared between test modules with different needs

use anyhow::{ensure, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::ThreadId;
use std::time::Duration;
use utimer_common::{DelayRecorder, DelaySnapshot, LifecycleEvent, TickEvent, TimerObserver};
use utimer_runtime::MicroTimer;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once per process (RUST_LOG aware).
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One recorded notification, in delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// `on_start` with the caller's thread id.
    Start(ThreadId),
    /// `on_tick` with the worker's thread id and measured delay.
    Tick(ThreadId, i64),
    /// `on_stop` with the caller's thread id.
    Stop(ThreadId),
}

/// Observer recording every notification in the order delivered.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Mutex<Vec<Notification>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn tick_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|n| matches!(n, Notification::Tick(..)))
            .count()
    }

    fn push(&self, notification: Notification) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

impl TimerObserver for EventLog {
    fn on_start(&self, event: LifecycleEvent) {
        self.push(Notification::Start(event.caller));
    }

    fn on_tick(&self, event: TickEvent) {
        self.push(Notification::Tick(event.worker, event.delay_ticks));
    }

    fn on_stop(&self, event: LifecycleEvent) {
        self.push(Notification::Stop(event.caller));
    }
}

/// Observer that flips a flag once a target tick count is reached.
#[derive(Debug)]
pub struct TickTarget {
    remaining: Mutex<u64>,
    reached: AtomicBool,
}

impl TickTarget {
    pub fn new(target: u64) -> Self {
        Self {
            remaining: Mutex::new(target),
            reached: AtomicBool::new(target == 0),
        }
    }

    pub fn reached(&self) -> bool {
        self.reached.load(Ordering::Acquire)
    }
}

impl TimerObserver for TickTarget {
    fn on_tick(&self, _event: TickEvent) {
        if let Ok(mut remaining) = self.remaining.lock() {
            if *remaining > 0 {
                *remaining -= 1;
                if *remaining == 0 {
                    self.reached.store(true, Ordering::Release);
                }
            }
        }
    }
}

/// Poll `condition` every millisecond for up to `timeout`.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Run a timer at `interval_us` until `ticks` ticks were observed, then
/// stop it and return the collected delay statistics.
pub fn collect_run(interval_us: u64, ticks: u64) -> Result<DelaySnapshot> {
    let recorder = Arc::new(DelayRecorder::new(ticks as usize));
    let target = Arc::new(TickTarget::new(ticks));

    let mut timer = MicroTimer::builder()
        .interval_us(interval_us)
        .observer(recorder.clone())
        .observer(target.clone())
        .build();

    timer.start().context("timer failed to start")?;

    // Generous budget: the run itself needs ticks * interval
    let budget = Duration::from_micros(interval_us * ticks * 20) + Duration::from_secs(2);
    let done = wait_for(budget, || target.reached());
    timer.stop();

    ensure!(done, "timer did not reach {ticks} ticks within {budget:?}");
    ensure!(
        recorder.start_count() == 1 && recorder.stop_count() == 1,
        "expected exactly one start and one stop notification"
    );

    Ok(recorder.snapshot())
}
