use std::fmt;
use std::path::{Path, PathBuf};

use d2onboard_sources::Source;
use uuid::Uuid;

use crate::RetryError;

/// Identifies one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of the supervisor's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Allowed edges: Idle→Running, Running→Succeeded, Running→Failed,
    /// Failed→Running.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Idle, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Running)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Classified extraction failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("extraction failed: {0}")]
    GenericFailure(String),

    #[error("missing required files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(JobError),
}

/// Point-in-time view of the supervisor's job.
#[derive(Debug, Clone, Default)]
pub struct JobSnapshot {
    job_id: Option<JobId>,
    source: Option<Source>,
    destination: Option<PathBuf>,
    status: JobStatus,
    progress: f32,
    current_file: String,
    error: Option<JobError>,
}

impl JobSnapshot {
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Progress in `[0, 1]`, non-decreasing within a job.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// Moves to `Running` with fresh progress. Returns `false` (leaving
    /// state untouched) when the current status does not allow it.
    pub(crate) fn begin(&mut self, job_id: JobId, source: Source, destination: PathBuf) -> bool {
        if !self.status.can_transition_to(JobStatus::Running) {
            return false;
        }
        *self = JobSnapshot {
            job_id: Some(job_id),
            source: Some(source),
            destination: Some(destination),
            status: JobStatus::Running,
            progress: 0.0,
            current_file: String::new(),
            error: None,
        };
        true
    }

    /// Folds an engine sample into the snapshot.
    ///
    /// Samples for another job or for a job that is no longer running are
    /// dropped. Progress is clamped to `[0, 1]` and never moves backwards.
    /// Returns the published values when something changed.
    pub(crate) fn observe(
        &mut self,
        job_id: JobId,
        progress: f32,
        current_file: String,
    ) -> Option<(f32, String)> {
        if self.job_id != Some(job_id) || self.status != JobStatus::Running {
            return None;
        }

        let clamped = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        let next = clamped.max(self.progress);

        if next == self.progress && current_file == self.current_file {
            return None;
        }

        self.progress = next;
        self.current_file = current_file;
        Some((self.progress, self.current_file.clone()))
    }

    /// Applies the terminal outcome. Returns `false` if the job already left
    /// `Running` or `job_id` is stale.
    pub(crate) fn finish(&mut self, job_id: JobId, outcome: &JobOutcome) -> bool {
        if self.job_id != Some(job_id) {
            return false;
        }
        let next = match outcome {
            JobOutcome::Succeeded => JobStatus::Succeeded,
            JobOutcome::Failed(_) => JobStatus::Failed,
        };
        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;
        match outcome {
            JobOutcome::Succeeded => {
                self.progress = 1.0;
                self.current_file.clear();
            }
            JobOutcome::Failed(err) => {
                self.error = Some(err.clone());
            }
        }
        true
    }

    /// Clears the error of a failed job so a new source can be chosen.
    pub(crate) fn clear_error(&mut self) -> Result<(), RetryError> {
        if self.status != JobStatus::Failed {
            return Err(RetryError::NotFailed(self.status));
        }
        self.error = None;
        Ok(())
    }
}
