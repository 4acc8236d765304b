//! Durable onboarding completion record.
//!
//! The ledger answers one question at startup: do we still need to run
//! onboarding? It persists whether extraction finished and where the assets
//! landed, and re-checks the asset directory on every query so that an
//! externally deleted install sends the user back through onboarding.

mod ledger;
mod record;
mod store;

pub use ledger::{CompletionLedger, DEFAULT_REQUIRED_FILES, has_required_files};
pub use record::CompletionRecord;
pub use store::{JsonFileStore, LedgerStore, MemoryStore};

/// Errors produced by the ledger crate.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger store poisoned")]
    Poisoned,
}
