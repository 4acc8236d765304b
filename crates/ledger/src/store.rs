//! Ledger storage backends.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{CompletionRecord, LedgerError};

/// Durable key/value namespace holding the completion record.
///
/// Constructed once at startup and handed to the ledger, so tests can swap
/// in [`MemoryStore`].
pub trait LedgerStore: Send + Sync {
    /// Loads the record, returning the default when nothing was stored yet.
    fn load(&self) -> Result<CompletionRecord, LedgerError>;

    /// Replaces the stored record.
    fn save(&self, record: &CompletionRecord) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Stores the record as a small pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<CompletionRecord, LedgerError> {
        if !self.path.exists() {
            return Ok(CompletionRecord::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<CompletionRecord>(&content) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to parse onboarding ledger, treating as first run"
                );
                Ok(CompletionRecord::default())
            }
        }
    }

    fn save(&self, record: &CompletionRecord) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, json)?;
        set_permissions_0600(&self.path);

        tracing::debug!(path = %self.path.display(), "onboarding ledger saved");
        Ok(())
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<CompletionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `record`.
    pub fn with_record(record: CompletionRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<CompletionRecord, LedgerError> {
        let record = self.record.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(record.clone())
    }

    fn save(&self, record: &CompletionRecord) -> Result<(), LedgerError> {
        let mut stored = self.record.lock().map_err(|_| LedgerError::Poisoned)?;
        *stored = record.clone();
        Ok(())
    }
}
