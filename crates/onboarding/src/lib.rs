//! Linear onboarding wizard.
//!
//! [`OnboardingController`] walks the user from the welcome step through
//! source selection and extraction, records completion in the ledger and
//! hands control to the host application. Presentation layers drive it with
//! [`Command`]s and render the [`WizardStep`] plus the progress and error
//! views it exposes.

mod controller;
mod step;
mod view;

pub use controller::{HostHandoff, OnboardingController, Pickers};
pub use step::{Command, WizardStep};
pub use view::{ErrorAction, ErrorView, HELP, HelpContent, HelpSection, ProgressView};

use d2onboard_extraction::{RetryError, StartError};
use d2onboard_sources::ResolveError;

/// Errors surfaced by [`OnboardingController::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{command} is not available on the {step} step")]
    InvalidCommand {
        step: WizardStep,
        command: &'static str,
    },

    #[error("event stream already taken from the supervisor")]
    EventsUnavailable,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Retry(#[from] RetryError),
}
