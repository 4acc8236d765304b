use std::fmt;

use d2onboard_sources::{NetworkTarget, SourceKind};
use serde::{Deserialize, Serialize};

/// Wizard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    Welcome,
    ChooseSource,
    Extracting,
    Error,
    /// Terminal: the host has been told to proceed.
    Complete,
}

impl WizardStep {
    pub fn can_transition_to(self, next: WizardStep) -> bool {
        matches!(
            (self, next),
            (WizardStep::Welcome, WizardStep::ChooseSource)
                | (WizardStep::ChooseSource, WizardStep::Extracting)
                | (WizardStep::Extracting, WizardStep::Complete)
                | (WizardStep::Extracting, WizardStep::Error)
                | (WizardStep::Error, WizardStep::ChooseSource)
        )
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStep::Welcome => write!(f, "welcome"),
            WizardStep::ChooseSource => write!(f, "choose-source"),
            WizardStep::Extracting => write!(f, "extracting"),
            WizardStep::Error => write!(f, "error"),
            WizardStep::Complete => write!(f, "complete"),
        }
    }
}

/// User intents accepted by the controller.
#[derive(Debug, Clone)]
pub enum Command {
    ConfirmWelcome,
    ChooseSource(SourceKind),
    ConfirmNetworkCredentials(NetworkTarget),
    Retry,
    OpenHelp,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ConfirmWelcome => "confirm-welcome",
            Command::ChooseSource(_) => "choose-source",
            Command::ConfirmNetworkCredentials(_) => "confirm-network-credentials",
            Command::Retry => "retry",
            Command::OpenHelp => "open-help",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wizard_edges() {
        use WizardStep::*;
        assert!(Welcome.can_transition_to(ChooseSource));
        assert!(ChooseSource.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Complete));
        assert!(Extracting.can_transition_to(Error));
        assert!(Error.can_transition_to(ChooseSource));

        assert!(!Welcome.can_transition_to(Extracting));
        assert!(!Error.can_transition_to(Extracting));
        assert!(!Complete.can_transition_to(ChooseSource));
        assert!(!Complete.can_transition_to(Welcome));
    }

    #[test]
    fn step_serializes_camel_case() {
        let json = serde_json::to_string(&WizardStep::ChooseSource).unwrap();
        assert_eq!(json, "\"chooseSource\"");
    }
}
