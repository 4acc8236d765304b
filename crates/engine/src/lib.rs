//! Extraction engine contract and the built-in filesystem engine.
//!
//! The onboarding pipeline only ever talks to an [`ExtractionEngine`]. This
//! is the single boundary where engine-specific behaviour (archive layout,
//! device probing, network reachability) enters the pipeline.
//!
//! [`ArchiveCopyEngine`] is the default implementation: it validates the
//! game archives found in a source directory and copies them into the
//! private asset directory, reporting progress through shared state that
//! callers sample.

pub mod archive;
mod copy;
pub mod network;
pub mod usb;

use std::path::Path;

pub use archive::{
    GameVersion, Installation, OPTIONAL_ARCHIVES, REQUIRED_ARCHIVES, SourceType,
    detect_source_type, is_valid_archive, missing_required, scan_for_installations,
};
pub use copy::{ArchiveCopyEngine, CopyOptions};
pub use network::NetworkProtocol;

/// Errors reported by an extraction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("{0} required archive(s) missing")]
    MissingArchives(usize),

    #[error("checksum mismatch after copying {0}")]
    ChecksumMismatch(String),

    #[error("an extraction is already running")]
    Busy,

    #[error("{0}")]
    Other(String),
}

/// Black-box extraction service consumed by the onboarding pipeline.
///
/// `extract` blocks and is always called from a background worker. The
/// remaining query methods may be called concurrently from any thread while
/// an extraction is running.
pub trait ExtractionEngine: Send + Sync {
    /// Converts the archives at `source` into `destination`.
    fn extract(&self, source: &Path, destination: &Path) -> Result<(), EngineError>;

    /// Progress of the running extraction in `[0, 1]`.
    fn current_progress(&self) -> f32;

    /// Name of the item being processed, empty when idle.
    fn current_file_name(&self) -> String;

    /// Required archives the last extraction could not find.
    fn missing_files(&self) -> Vec<String>;

    /// Pre-flight check: does `path` hold a usable set of archives?
    fn validate(&self, path: &Path) -> bool;

    /// Removable storage devices as `path|label|totalSpace|freeSpace` records.
    fn list_usb_devices(&self) -> Vec<String>;

    /// Attempts to reach a network share.
    fn connect_network(
        &self,
        protocol: NetworkProtocol,
        host: &str,
        share: &str,
        username: &str,
        password: &str,
    ) -> bool;
}
