//! Real-time scheduling setup for the worker thread.
//!
//! Applied from inside the worker before its first iteration:
//! - Real-time scheduling (SCHED_FIFO/SCHED_RR) to minimize preemption
//!   jitter during the spin-wait
//! - CPU affinity to keep the spinning thread off housekeeping cores
//!
//! Missing privileges degrade to a warning, never a failure: the timer
//! still runs, just without RT guarantees.

#![allow(unused_imports)] // Platform-specific code may not use all imports

use tracing::{debug, info, warn};
use utimer_common::config::{CpuAffinity, RealtimeConfig, SchedPolicy};
use utimer_common::error::{TimerError, TimerResult};

/// Result of real-time initialization for the worker thread.
#[derive(Debug, Clone, Default)]
pub struct RealtimeStatus {
    /// Applied scheduler policy.
    pub scheduler_policy: Option<SchedPolicy>,
    /// Applied scheduler priority.
    pub scheduler_priority: Option<u8>,
    /// CPUs the thread is pinned to.
    pub cpu_affinity: Option<Vec<usize>>,
}

/// Initialize the real-time environment for the calling thread.
///
/// # Errors
///
/// Returns an error only on malformed configuration (e.g. an invalid CPU
/// index). Privilege problems (EPERM) are logged and reported as `None`
/// fields in the returned status.
///
/// # Platform Support
///
/// Full support on Linux; no-op with a warning elsewhere.
pub fn init_realtime(config: &RealtimeConfig) -> TimerResult<RealtimeStatus> {
    if !config.enabled {
        debug!("Real-time scheduling disabled in configuration");
        return Ok(RealtimeStatus::default());
    }

    info!("Initializing real-time environment for worker thread");

    let (scheduler_policy, scheduler_priority) = set_scheduler(config.policy, config.priority)?;
    let cpu_affinity = set_cpu_affinity(&config.cpu_affinity)?;

    let status = RealtimeStatus {
        scheduler_policy,
        scheduler_priority,
        cpu_affinity,
    };

    info!(?status, "Real-time initialization complete");
    Ok(status)
}

/// Set real-time scheduler policy and priority for the calling thread.
#[cfg(target_os = "linux")]
fn set_scheduler(
    policy: SchedPolicy,
    priority: u8,
) -> TimerResult<(Option<SchedPolicy>, Option<u8>)> {
    let linux_policy = match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => {
            debug!("Using SCHED_OTHER (non-RT) scheduling");
            return Ok((Some(SchedPolicy::Other), None));
        }
    };

    // Clamp priority to valid range (1-99 for RT policies)
    let clamped_priority = priority.clamp(1, 99);
    if clamped_priority != priority {
        warn!(
            original = priority,
            clamped = clamped_priority,
            "Scheduler priority clamped to valid range"
        );
    }

    debug!(
        ?policy,
        priority = clamped_priority,
        "Setting real-time scheduler"
    );

    let param = libc::sched_param {
        sched_priority: i32::from(clamped_priority),
    };

    // SAFETY: sched_setscheduler is safe with a valid sched_param; pid 0
    // targets the calling thread.
    let result = unsafe { libc::sched_setscheduler(0, linux_policy, &param) };

    if result == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            warn!(
                "sched_setscheduler failed with EPERM - running without RT privileges. \
                 Consider running with CAP_SYS_NICE capability or as root."
            );
            return Ok((None, None));
        }
        return Err(TimerError::Realtime(format!(
            "sched_setscheduler failed: {err}"
        )));
    }

    info!(
        ?policy,
        priority = clamped_priority,
        "Real-time scheduler configured"
    );
    Ok((Some(policy), Some(clamped_priority)))
}

#[cfg(not(target_os = "linux"))]
fn set_scheduler(
    policy: SchedPolicy,
    priority: u8,
) -> TimerResult<(Option<SchedPolicy>, Option<u8>)> {
    warn!(
        ?policy,
        priority, "Real-time scheduling not available on this platform"
    );
    Ok((None, None))
}

/// Set CPU affinity for the calling thread.
#[cfg(target_os = "linux")]
fn set_cpu_affinity(affinity: &CpuAffinity) -> TimerResult<Option<Vec<usize>>> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let cpus = match affinity {
        CpuAffinity::None => {
            debug!("No CPU affinity configured");
            return Ok(None);
        }
        CpuAffinity::Single(cpu) => vec![*cpu],
        CpuAffinity::Set(cpus) => cpus.clone(),
    };

    if cpus.is_empty() {
        return Ok(None);
    }

    debug!(?cpus, "Setting CPU affinity");

    let mut cpu_set = CpuSet::new();
    for &cpu in &cpus {
        cpu_set
            .set(cpu)
            .map_err(|e| TimerError::Realtime(format!("Invalid CPU index {cpu}: {e}")))?;
    }

    match sched_setaffinity(Pid::from_raw(0), &cpu_set) {
        Ok(()) => {
            info!(?cpus, "CPU affinity set");
            Ok(Some(cpus))
        }
        Err(e) => {
            if e == nix::errno::Errno::EINVAL {
                warn!(?cpus, "Invalid CPU set - some CPUs may not exist");
                Ok(None)
            } else {
                Err(TimerError::Realtime(format!(
                    "sched_setaffinity failed: {e}"
                )))
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn set_cpu_affinity(affinity: &CpuAffinity) -> TimerResult<Option<Vec<usize>>> {
    if !matches!(affinity, CpuAffinity::None) {
        warn!("CPU affinity not available on this platform");
    }
    Ok(None)
}

/// Check if the current process has real-time capabilities.
#[cfg(target_os = "linux")]
pub fn check_rt_capabilities() -> RtCapabilities {
    use std::fs;

    let mut caps = RtCapabilities {
        // SAFETY: geteuid has no preconditions
        is_root: unsafe { libc::geteuid() } == 0,
        ..Default::default()
    };

    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit writes into the rlimit we own
    if unsafe { libc::getrlimit(libc::RLIMIT_RTPRIO, &mut rlim) } == 0 {
        caps.rtprio_limit = Some(rlim.rlim_cur);
    }

    if let Ok(version) = fs::read_to_string("/proc/version") {
        caps.preempt_rt = version.contains("PREEMPT_RT") || version.contains("PREEMPT RT");
    }

    caps
}

#[cfg(not(target_os = "linux"))]
pub fn check_rt_capabilities() -> RtCapabilities {
    RtCapabilities::default()
}

/// Information about real-time capabilities of the system.
#[derive(Debug, Clone, Default)]
pub struct RtCapabilities {
    /// Whether running as root.
    pub is_root: bool,
    /// RLIMIT_RTPRIO value (max RT priority allowed).
    pub rtprio_limit: Option<u64>,
    /// Whether running on a PREEMPT_RT kernel.
    pub preempt_rt: bool,
}

impl RtCapabilities {
    /// Check if RT scheduling is likely to succeed.
    #[must_use]
    pub fn can_use_rt_scheduling(&self) -> bool {
        self.is_root || self.rtprio_limit.is_some_and(|l| l > 0)
    }
}
