use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use d2onboard_engine::{EngineError, ExtractionEngine};
use d2onboard_sources::Source;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::{JobError, JobId, JobOutcome, JobSnapshot, JobStatus};
use crate::{RetryError, StartError};

/// Interval at which the engine's progress is sampled.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Published by the polling task. For any job, every `Progress` precedes
/// its single `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Progress {
        job_id: JobId,
        progress: f32,
        current_file: String,
    },
    Finished {
        job_id: JobId,
        outcome: JobOutcome,
    },
}

impl SupervisorEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            SupervisorEvent::Progress { job_id, .. } | SupervisorEvent::Finished { job_id, .. } => {
                *job_id
            }
        }
    }
}

/// Runs extraction jobs against an [`ExtractionEngine`], one at a time.
///
/// `start` never blocks: the engine call goes to the blocking pool and a
/// spawned task becomes the only writer of job state until the job ends.
/// Dropping the supervisor stops polling; a running engine call still runs
/// to completion.
pub struct ExtractionSupervisor {
    engine: Arc<dyn ExtractionEngine>,
    poll_interval: Duration,
    state: Arc<Mutex<JobSnapshot>>,
    events_tx: mpsc::Sender<SupervisorEvent>,
    events_rx: Option<mpsc::Receiver<SupervisorEvent>>,
    cancel: CancellationToken,
}

impl ExtractionSupervisor {
    pub fn new(engine: Arc<dyn ExtractionEngine>, poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            state: Arc::new(Mutex::new(JobSnapshot::default())),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SupervisorEvent>> {
        self.events_rx.take()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Copy of the current job state.
    pub fn snapshot(&self) -> JobSnapshot {
        lock(&self.state).clone()
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).status()
    }

    /// Starts extracting `source` into `destination`.
    ///
    /// Rejected while a job is running (the running job is left untouched)
    /// and after a job has succeeded.
    pub fn start(
        &self,
        source: &Source,
        destination: impl Into<PathBuf>,
    ) -> Result<JobId, StartError> {
        let destination = destination.into();
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;
        let job_id = JobId::new();

        {
            let mut state = lock(&self.state);
            match state.status() {
                JobStatus::Running => {
                    warn!(job_id = ?state.job_id(), "start rejected: job already running");
                    return Err(StartError::AlreadyRunning);
                }
                JobStatus::Succeeded => {
                    warn!("start rejected: extraction already completed");
                    return Err(StartError::AlreadyCompleted);
                }
                JobStatus::Idle | JobStatus::Failed => {}
            }
            if !state.begin(job_id, source.clone(), destination.clone()) {
                return Err(StartError::AlreadyRunning);
            }
        }

        info!(
            job_id = %job_id,
            kind = %source.kind(),
            source = %source.path(),
            destination = %destination.display(),
            "extraction started"
        );

        let engine = Arc::clone(&self.engine);
        let source_path = PathBuf::from(source.path());
        let worker_destination = destination;
        let worker = runtime.spawn_blocking(move || {
            engine.extract(Path::new(&source_path), &worker_destination)
        });

        runtime.spawn(supervise(
            job_id,
            Arc::clone(&self.engine),
            Arc::clone(&self.state),
            self.events_tx.clone(),
            self.poll_interval,
            worker,
            self.cancel.child_token(),
        ));

        Ok(job_id)
    }

    /// Clears a failed job's error so the user can pick a new source.
    ///
    /// The prior source is not reused; the caller starts a fresh job.
    pub fn retry(&self) -> Result<(), RetryError> {
        let mut state = lock(&self.state);
        state.clear_error()?;
        info!(job_id = ?state.job_id(), "retry requested");
        Ok(())
    }
}

impl Drop for ExtractionSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(state: &Mutex<JobSnapshot>) -> MutexGuard<'_, JobSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Polls the engine until the worker returns, then classifies and
/// publishes the outcome.
async fn supervise(
    job_id: JobId,
    engine: Arc<dyn ExtractionEngine>,
    state: Arc<Mutex<JobSnapshot>>,
    events: mpsc::Sender<SupervisorEvent>,
    poll_interval: Duration,
    mut worker: JoinHandle<Result<(), EngineError>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let joined = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job_id = %job_id, "supervisor dropped, polling stopped");
                return;
            }
            joined = &mut worker => break joined,
            _ = ticker.tick() => {
                let sample = engine.current_progress();
                let file = engine.current_file_name();
                let update = lock(&state).observe(job_id, sample, file);
                if let Some((progress, current_file)) = update {
                    debug!(job_id = %job_id, progress, file = %current_file, "progress");
                    publish(&events, SupervisorEvent::Progress { job_id, progress, current_file });
                }
            }
        }
    };

    let outcome = classify(engine.as_ref(), joined);

    let (applied, final_progress) = {
        let mut state = lock(&state);
        let before = state.progress();
        let applied = state.finish(job_id, &outcome);
        let final_progress = (applied && state.progress() > before).then(|| state.progress());
        (applied, final_progress)
    };
    if !applied {
        warn!(job_id = %job_id, "job already finished, outcome dropped");
        return;
    }

    match &outcome {
        JobOutcome::Succeeded => info!(job_id = %job_id, "extraction succeeded"),
        JobOutcome::Failed(err) => error!(job_id = %job_id, error = %err, "extraction failed"),
    }

    if let Some(progress) = final_progress {
        publish(
            &events,
            SupervisorEvent::Progress {
                job_id,
                progress,
                current_file: String::new(),
            },
        );
    }

    // The terminal event must not be dropped, so wait for capacity.
    if events
        .send(SupervisorEvent::Finished { job_id, outcome })
        .await
        .is_err()
    {
        debug!(job_id = %job_id, "no event receiver for outcome");
    }
}

/// Maps the worker's result onto a job outcome. A non-empty missing-files
/// list wins over any other failure.
fn classify(
    engine: &dyn ExtractionEngine,
    joined: Result<Result<(), EngineError>, tokio::task::JoinError>,
) -> JobOutcome {
    let message = match joined {
        Ok(Ok(())) => return JobOutcome::Succeeded,
        Ok(Err(err)) => err.to_string(),
        Err(join_err) => format!("extraction worker stopped unexpectedly: {join_err}"),
    };

    let missing = engine.missing_files();
    if missing.is_empty() {
        JobOutcome::Failed(JobError::GenericFailure(message))
    } else {
        JobOutcome::Failed(JobError::MissingFiles(missing))
    }
}

/// Progress is best effort: the snapshot always holds the latest value.
fn publish(events: &mpsc::Sender<SupervisorEvent>, event: SupervisorEvent) {
    if let Err(err) = events.try_send(event) {
        debug!("progress event not delivered: {err}");
    }
}
