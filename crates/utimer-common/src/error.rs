use thiserror::Error;

/// Timer error types covering configuration and worker thread failures.
///
/// A start request against an already-running timer is *not* an error;
/// it is reported through [`crate::events::StartOutcome::AlreadyRunning`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Configuration or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker thread could not be spawned.
    #[error("thread error: {0}")]
    Thread(String),

    /// Real-time setup failure that was configured as fatal.
    #[error("realtime setup error: {0}")]
    Realtime(String),
}

/// Convenience type alias for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;
