//! Extraction supervisor.
//!
//! Owns at most one background extraction job at a time. The engine's
//! blocking `extract` call runs on tokio's blocking pool while a polling
//! task samples the engine's progress on a fixed interval, publishes
//! [`SupervisorEvent`]s, and classifies the terminal outcome.

mod job;
mod supervisor;

pub use job::{JobError, JobId, JobOutcome, JobSnapshot, JobStatus};
pub use supervisor::{DEFAULT_POLL_INTERVAL, ExtractionSupervisor, SupervisorEvent};

/// Reasons a job cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("an extraction job is already running")]
    AlreadyRunning,

    #[error("extraction already completed; a new supervisor is required")]
    AlreadyCompleted,

    #[error("no tokio runtime available to run the extraction")]
    NoRuntime,
}

/// Reasons a retry request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("retry is only valid after a failed job (current status: {0})")]
    NotFailed(JobStatus),
}
