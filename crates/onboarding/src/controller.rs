use std::path::{Path, PathBuf};
use std::sync::Arc;

use d2onboard_extraction::{ExtractionSupervisor, JobId, JobOutcome, SupervisorEvent};
use d2onboard_ledger::CompletionLedger;
use d2onboard_sources::{
    DevicePicker, FilePicker, NetworkTarget, ResolveError, Source, SourceKind, SourceResolver,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::step::{Command, WizardStep};
use crate::view::{ErrorView, HELP, HelpContent, ProgressView};
use crate::FlowError;

/// Host application side of the handoff after a successful onboarding.
pub trait HostHandoff: Send + Sync {
    /// Leave onboarding and continue normal startup using `asset_path`.
    fn proceed(&self, asset_path: &Path);
}

/// Interactive pickers used when resolving local and USB sources.
#[derive(Clone)]
pub struct Pickers {
    pub file: Arc<dyn FilePicker>,
    pub device: Arc<dyn DevicePicker>,
}

/// Drives the wizard.
///
/// All methods run on the foreground sequence. Job state is only read
/// through the supervisor's event stream.
pub struct OnboardingController {
    ledger: CompletionLedger,
    resolver: SourceResolver,
    supervisor: ExtractionSupervisor,
    events: mpsc::Receiver<SupervisorEvent>,
    destination: PathBuf,
    host: Arc<dyn HostHandoff>,
    pickers: Pickers,

    step: WizardStep,
    awaiting_credentials: bool,
    current_job: Option<JobId>,
    progress: ProgressView,
    error: Option<ErrorView>,
    inline_error: Option<String>,
}

impl OnboardingController {
    pub fn new(
        ledger: CompletionLedger,
        resolver: SourceResolver,
        mut supervisor: ExtractionSupervisor,
        destination: impl Into<PathBuf>,
        host: Arc<dyn HostHandoff>,
        pickers: Pickers,
    ) -> Result<Self, FlowError> {
        let events = supervisor.take_events().ok_or(FlowError::EventsUnavailable)?;
        Ok(Self {
            ledger,
            resolver,
            supervisor,
            events,
            destination: destination.into(),
            host,
            pickers,
            step: WizardStep::Welcome,
            awaiting_credentials: false,
            current_job: None,
            progress: ProgressView::default(),
            error: None,
            inline_error: None,
        })
    }

    /// `true` if the ledger says onboarding has to run.
    pub fn needs_onboarding(&self) -> bool {
        self.ledger.is_first_run()
    }

    /// Skips the wizard when assets are already in place.
    ///
    /// Returns `true` (and hands off) if onboarding is not needed.
    pub fn resume_if_complete(&mut self) -> bool {
        if self.ledger.is_first_run() {
            return false;
        }
        let asset_path = self
            .ledger
            .asset_path()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.destination.clone());
        info!(path = %asset_path.display(), "onboarding already complete");
        self.step = WizardStep::Complete;
        self.host.proceed(&asset_path);
        true
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn progress(&self) -> &ProgressView {
        &self.progress
    }

    pub fn error_view(&self) -> Option<&ErrorView> {
        self.error.as_ref()
    }

    /// Resolution failure reported at the selection step.
    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    /// `true` after choosing the network kind, until credentials are confirmed.
    pub fn awaiting_credentials(&self) -> bool {
        self.awaiting_credentials
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn supervisor(&self) -> &ExtractionSupervisor {
        &self.supervisor
    }

    pub fn help(&self) -> &'static HelpContent {
        &HELP
    }

    /// Applies a user command.
    ///
    /// Resolution failures leave the wizard on the source step and start no
    /// job; they are returned and also kept in [`inline_error`](Self::inline_error).
    pub fn dispatch(&mut self, command: Command) -> Result<WizardStep, FlowError> {
        debug!(step = %self.step, command = command.name(), "dispatch");
        match command {
            Command::OpenHelp => {
                info!(step = %self.step, "help opened");
                Ok(self.step)
            }
            Command::ConfirmWelcome => {
                self.require(WizardStep::Welcome, &command)?;
                self.advance(WizardStep::ChooseSource);
                Ok(self.step)
            }
            Command::ChooseSource(kind) => {
                self.require(WizardStep::ChooseSource, &command)?;
                self.inline_error = None;
                match kind {
                    SourceKind::Network => {
                        self.awaiting_credentials = true;
                        Ok(self.step)
                    }
                    SourceKind::Local => {
                        self.awaiting_credentials = false;
                        let resolved = self.resolver.resolve_local(self.pickers.file.as_ref());
                        self.begin(resolved)
                    }
                    SourceKind::Usb => {
                        self.awaiting_credentials = false;
                        let resolved = self.resolver.resolve_usb(self.pickers.device.as_ref());
                        self.begin(resolved)
                    }
                }
            }
            Command::ConfirmNetworkCredentials(ref target) => {
                self.require(WizardStep::ChooseSource, &command)?;
                if !self.awaiting_credentials {
                    return Err(FlowError::InvalidCommand {
                        step: self.step,
                        command: command.name(),
                    });
                }
                self.inline_error = None;
                self.awaiting_credentials = false;
                self.begin_network(target.clone())
            }
            Command::Retry => self.retry(),
        }
    }

    /// Returns from the error step to source selection.
    pub fn retry(&mut self) -> Result<WizardStep, FlowError> {
        self.require(WizardStep::Error, &Command::Retry)?;
        self.supervisor.retry()?;
        self.error = None;
        self.current_job = None;
        self.progress = ProgressView::default();
        self.advance(WizardStep::ChooseSource);
        Ok(self.step)
    }

    /// Waits for the next supervisor event and applies it.
    ///
    /// Returns `None` once the event stream has closed.
    pub async fn pump(&mut self) -> Option<WizardStep> {
        let event = self.events.recv().await?;
        self.apply(event);
        Some(self.step)
    }

    /// Applies every event already queued without waiting.
    pub fn pump_pending(&mut self) -> WizardStep {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
        self.step
    }

    /// Pumps events until the current job leaves the extracting step.
    pub async fn wait_for_outcome(&mut self) -> WizardStep {
        while self.step == WizardStep::Extracting {
            if self.pump().await.is_none() {
                break;
            }
        }
        self.step
    }

    fn require(&self, expected: WizardStep, command: &Command) -> Result<(), FlowError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(FlowError::InvalidCommand {
                step: self.step,
                command: command.name(),
            })
        }
    }

    fn advance(&mut self, next: WizardStep) {
        debug_assert!(self.step.can_transition_to(next), "{} -> {}", self.step, next);
        info!(from = %self.step, to = %next, "wizard step");
        self.step = next;
    }

    fn begin_network(&mut self, target: NetworkTarget) -> Result<WizardStep, FlowError> {
        let resolved = self.resolver.resolve_network(target);
        self.begin(resolved)
    }

    fn begin(&mut self, resolved: Result<Source, ResolveError>) -> Result<WizardStep, FlowError> {
        let source = match resolved {
            Ok(source) => source,
            Err(err) => {
                warn!(error = %err, "source resolution failed");
                self.inline_error = Some(err.to_string());
                return Err(err.into());
            }
        };

        let job_id = match self.supervisor.start(&source, self.destination.clone()) {
            Ok(job_id) => job_id,
            Err(err) => {
                warn!(error = %err, "extraction could not start");
                self.inline_error = Some(err.to_string());
                return Err(err.into());
            }
        };
        self.current_job = Some(job_id);
        self.progress = ProgressView::default();
        self.advance(WizardStep::Extracting);
        Ok(self.step)
    }

    fn apply(&mut self, event: SupervisorEvent) {
        if self.current_job != Some(event.job_id()) || self.step != WizardStep::Extracting {
            debug!(job_id = %event.job_id(), "stale supervisor event ignored");
            return;
        }

        match event {
            SupervisorEvent::Progress {
                progress,
                current_file,
                ..
            } => {
                self.progress = ProgressView {
                    progress,
                    current_file,
                };
            }
            SupervisorEvent::Finished { outcome, .. } => match outcome {
                JobOutcome::Succeeded => self.complete(),
                JobOutcome::Failed(err) => {
                    self.error = Some(ErrorView::from(&err));
                    self.advance(WizardStep::Error);
                }
            },
        }
    }

    fn complete(&mut self) {
        self.progress.progress = 1.0;
        self.progress.current_file.clear();

        let asset_path = self.destination.to_string_lossy().to_string();
        if let Err(err) = self.ledger.mark_complete(asset_path) {
            warn!(error = %err, "failed to persist onboarding completion");
        }
        self.advance(WizardStep::Complete);
        self.host.proceed(&self.destination);
    }
}
