//! Turns a user's choice of source into a [`Source`] the extraction
//! supervisor can consume.
//!
//! Three kinds are supported: a local directory picked through
//! [`DirBrowser`], a removable device picked from the engine's device list,
//! and a network share reached through the engine's connect primitive.
//! Resolution failures never produce a `Source`.

mod browse;
mod device;
mod resolver;
mod source;

pub use browse::{BrowseEntry, DirBrowser, browse_root};
pub use device::{UsbDevice, parse_device_records};
pub use resolver::{DevicePicker, FilePicker, NetworkTarget, SourceResolver};
pub use source::{Credential, Source, SourceKind};

/// Errors raised while resolving a source. None of them create a job.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no source selected")]
    NoSelection,

    #[error("no USB storage devices found")]
    NoDevicesFound,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("source path is empty")]
    EmptyPath,

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
