use d2onboard_extraction::JobError;
use serde::Serialize;

/// What the extracting step renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub progress: f32,
    pub current_file: String,
}

impl ProgressView {
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Actions offered on the error step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorAction {
    Retry,
    Help,
}

/// Classified failure as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub title: String,
    pub message: String,
    /// Itemized only for missing-files failures.
    pub missing_files: Vec<String>,
    pub actions: Vec<ErrorAction>,
}

impl From<&JobError> for ErrorView {
    fn from(err: &JobError) -> Self {
        let actions = vec![ErrorAction::Retry, ErrorAction::Help];
        match err {
            JobError::GenericFailure(message) => ErrorView {
                title: "Extraction failed".into(),
                message: message.clone(),
                missing_files: Vec::new(),
                actions,
            },
            JobError::MissingFiles(files) => ErrorView {
                title: "Missing game files".into(),
                message: "Missing required files. Supply these and try again:".into(),
                missing_files: files.clone(),
                actions,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HelpSection {
    pub heading: &'static str,
    pub body: &'static str,
}

/// Static guidance shown by the help affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HelpContent {
    pub title: &'static str,
    pub sections: &'static [HelpSection],
}

pub const HELP: HelpContent = HelpContent {
    title: "Horadric Wisdom",
    sections: &[
        HelpSection {
            heading: "Required Files",
            body: "d2data.mpq, d2char.mpq, d2sfx.mpq, d2music.mpq, d2speech.mpq and \
                   d2exp.mpq from an installed copy of the game. Video and patch \
                   archives are copied when present.",
        },
        HelpSection {
            heading: "Local Files",
            body: "Browse to the game's install directory and select any .mpq file \
                   inside it. Every archive in that directory is used.",
        },
        HelpSection {
            heading: "USB Storage",
            body: "Copy the install directory to a USB drive, plug it in and pick \
                   the drive from the list.",
        },
        HelpSection {
            heading: "Network Share",
            body: "Enter the host and share name of an SMB, FTP or HTTP server that \
                   exposes the install directory.",
        },
    ],
};
