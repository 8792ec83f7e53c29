//! Configuration structures for the timer runtime.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for production deployment.

use crate::error::{TimerError, TimerResult};
use serde::{Deserialize, Serialize};

/// Top-level timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Interval in microseconds between tick notifications. Must be > 0.
    ///
    /// The interval is converted into clock ticks once, at `start()`;
    /// changing it while the timer is running takes effect only after
    /// a restart.
    pub interval_us: u64,

    /// Real-time configuration for the worker thread.
    pub realtime: RealtimeConfig,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval_us: 100,
            realtime: RealtimeConfig::default(),
        }
    }
}

impl TimerConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(input: &str) -> TimerResult<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| TimerError::Config(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is zero.
    pub fn validate(&self) -> TimerResult<()> {
        if self.interval_us == 0 {
            return Err(TimerError::Config(
                "interval_us must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Real-time scheduling configuration for the worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Request real-time scheduling for the worker thread. On by
    /// default; without privileges the request is refused by the kernel
    /// and the worker keeps normal scheduling.
    pub enabled: bool,

    /// Scheduler policy: "fifo" or "rr" (round-robin).
    pub policy: SchedPolicy,

    /// Scheduler priority (1-99 for RT policies).
    pub priority: u8,

    /// CPU affinity for the worker thread.
    pub cpu_affinity: CpuAffinity,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: SchedPolicy::Fifo,
            priority: 90,
            cpu_affinity: CpuAffinity::None,
        }
    }
}

/// Linux scheduler policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO - first-in-first-out real-time scheduling.
    #[default]
    Fifo,
    /// SCHED_RR - round-robin real-time scheduling.
    Rr,
    /// SCHED_OTHER - default non-RT scheduling.
    Other,
}

/// CPU affinity specification for the worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CpuAffinity {
    /// No affinity; the scheduler may migrate the thread.
    #[default]
    None,
    /// Pin to a single CPU.
    Single(usize),
    /// Pin to a set of CPUs.
    Set(Vec<usize>),
}
