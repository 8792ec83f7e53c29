//! Lifecycle acceptance tests.
//!
//! Verify the start/stop state machine through the public surface:
//! idempotent start, blocking stop, the enabled property, and the
//! thread identities carried by each notification.

use super::common::{init_logging, wait_for, EventLog, Notification};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use utimer_common::StartOutcome;
use utimer_runtime::MicroTimer;

#[test]
fn test_double_start_reports_sentinel_and_single_notification() {
    init_logging();

    let log = Arc::new(EventLog::new());
    let mut timer = MicroTimer::builder()
        .interval_us(1_000)
        .observer(log.clone())
        .build();

    let first = timer.start().expect("first start");
    let first_worker = first.worker().expect("first start spawns a worker");

    let second = timer.start().expect("second start");
    assert_eq!(second, StartOutcome::AlreadyRunning);

    timer.stop();

    let starts = log
        .entries()
        .iter()
        .filter(|n| matches!(n, Notification::Start(_)))
        .count();
    assert_eq!(starts, 1, "sentinel start must not emit a notification");

    // Every tick came from the one worker thread
    for entry in log.entries() {
        if let Notification::Tick(worker, _) = entry {
            assert_eq!(worker, first_worker);
        }
    }
}

#[test]
fn test_stop_blocks_and_silences_ticks() {
    init_logging();

    let log = Arc::new(EventLog::new());
    let mut timer = MicroTimer::builder()
        .interval_us(500)
        .observer(log.clone())
        .build();

    timer.start().expect("start");
    assert!(wait_for(Duration::from_secs(5), || log.tick_count() >= 20));

    timer.stop();
    let ticks_at_stop = log.tick_count();

    // stop() joined the worker; the stream is closed
    thread::sleep(Duration::from_millis(50));
    assert_eq!(log.tick_count(), ticks_at_stop);

    // The start notification is emitted after the worker spawns, so an
    // early tick may precede it in the log; the stop notification is
    // strictly last because stop() joins the worker before emitting.
    let entries = log.entries();
    let starts = entries
        .iter()
        .filter(|n| matches!(n, Notification::Start(_)))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(entries.last(), Some(&Notification::Stop(thread::current().id())));
}

#[test]
fn test_notification_thread_identities() {
    init_logging();

    let log = Arc::new(EventLog::new());
    let mut timer = MicroTimer::builder()
        .interval_us(1_000)
        .observer(log.clone())
        .build();

    let caller = thread::current().id();
    let outcome = timer.start().expect("start");
    let worker = outcome.worker().expect("worker spawned");
    assert_ne!(worker, caller);

    assert!(wait_for(Duration::from_secs(5), || log.tick_count() >= 1));
    timer.stop();

    for entry in log.entries() {
        match entry {
            // Lifecycle notifications carry the requesting thread, ticks
            // carry the worker
            Notification::Start(id) | Notification::Stop(id) => assert_eq!(id, caller),
            Notification::Tick(id, delay) => {
                assert_eq!(id, worker);
                assert!(delay >= 0);
            }
        }
    }
}

#[test]
fn test_enabled_property_follows_lifecycle() {
    init_logging();

    let log = Arc::new(EventLog::new());
    let mut timer = MicroTimer::builder()
        .interval_us(1_000)
        .observer(log.clone())
        .build();

    assert!(!timer.is_enabled());

    timer.set_enabled(true).expect("enable");
    assert!(timer.is_enabled());

    // Setting the same value again must not restart the timer
    timer.set_enabled(true).expect("re-enable");

    timer.set_enabled(false).expect("disable");
    assert!(!timer.is_enabled());

    let entries = log.entries();
    let starts = entries
        .iter()
        .filter(|n| matches!(n, Notification::Start(_)))
        .count();
    let stops = entries
        .iter()
        .filter(|n| matches!(n, Notification::Stop(_)))
        .count();
    assert_eq!((starts, stops), (1, 1));
}

#[test]
fn test_restart_produces_fresh_worker() {
    init_logging();

    let mut timer = MicroTimer::builder().interval_us(1_000).build();

    let first = timer.start().expect("start").worker().expect("worker");
    timer.stop();

    let second = timer.start().expect("restart").worker().expect("worker");
    timer.stop();

    assert_ne!(first, second, "restart must spawn a new thread");
}

#[test]
fn test_independent_instances() {
    init_logging();

    let log_a = Arc::new(EventLog::new());
    let log_b = Arc::new(EventLog::new());

    let mut timer_a = MicroTimer::builder()
        .interval_us(500)
        .observer(log_a.clone())
        .build();
    let mut timer_b = MicroTimer::builder()
        .interval_us(500)
        .observer(log_b.clone())
        .build();

    timer_a.start().expect("start a");
    timer_b.start().expect("start b");

    assert!(wait_for(Duration::from_secs(5), || {
        log_a.tick_count() >= 5 && log_b.tick_count() >= 5
    }));

    // Stopping one timer must not affect the other
    timer_a.stop();
    let b_before = log_b.tick_count();
    assert!(wait_for(Duration::from_secs(5), || {
        log_b.tick_count() > b_before
    }));

    timer_b.stop();
}
