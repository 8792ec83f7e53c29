//! Timer notification types and the observer interface.
//!
//! All notifications are synchronous direct calls on the thread that
//! produced them: ticks (and fault-initiated stops) arrive on the worker
//! thread, start/stop notifications on the caller thread. There is no
//! queue and no drop policy; a slow observer directly delays the next
//! tick.

use std::thread::ThreadId;

/// One tick notification, constructed and delivered once per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Identity of the worker thread that fired the tick.
    pub worker: ThreadId,
    /// How late the firing was relative to the scheduled deadline, in
    /// clock ticks. Zero when the deadline had already passed before the
    /// wait began; never negative in practice.
    pub delay_ticks: i64,
}

/// A start or stop transition, carrying the identity of the thread that
/// requested it (not the worker thread, except for fault-initiated stops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Thread that invoked the transition.
    pub caller: ThreadId,
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker thread was spawned; carries its identity.
    Started(ThreadId),
    /// A worker is already alive; the request was a no-op.
    AlreadyRunning,
}

impl StartOutcome {
    /// Worker thread id if this start actually spawned one.
    #[must_use]
    pub fn worker(&self) -> Option<ThreadId> {
        match self {
            Self::Started(id) => Some(*id),
            Self::AlreadyRunning => None,
        }
    }
}

/// Observer of timer notifications.
///
/// All methods default to no-ops so implementors subscribe only to the
/// notifications they care about. Observers are invoked in registration
/// order; each one's execution time adds to the handler latency seen by
/// the next measured delay.
///
/// A panic escaping `on_tick` is caught by the timer loop, reported, and
/// terminates the loop cleanly through the stop notification path.
/// Panics escaping `on_start`/`on_stop` are caught and logged only.
pub trait TimerObserver: Send + Sync {
    /// The timer was started.
    fn on_start(&self, event: LifecycleEvent) {
        let _ = event;
    }

    /// A period elapsed.
    fn on_tick(&self, event: TickEvent) {
        let _ = event;
    }

    /// The timer was stopped.
    fn on_stop(&self, event: LifecycleEvent) {
        let _ = event;
    }
}
