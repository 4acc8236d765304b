use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{CompletionRecord, LedgerError, LedgerStore};

/// Files that must exist under the asset directory for it to count as usable.
pub const DEFAULT_REQUIRED_FILES: &[&str] = &["d2data.mpq", "d2exp.mpq"];

/// Gatekeeper for the onboarding flow.
///
/// Holds a cached copy of the stored record; every write goes through to the
/// backing store. A single foreground caller is assumed.
pub struct CompletionLedger {
    store: Box<dyn LedgerStore>,
    record: CompletionRecord,
    required_files: Vec<String>,
    default_asset_dir: Option<PathBuf>,
}

impl CompletionLedger {
    /// Loads the current record from `store`.
    pub fn open(store: impl LedgerStore + 'static) -> Result<Self, LedgerError> {
        let record = store.load()?;
        Ok(Self {
            store: Box::new(store),
            record,
            required_files: DEFAULT_REQUIRED_FILES.iter().map(|s| s.to_string()).collect(),
            default_asset_dir: None,
        })
    }

    /// Overrides the files checked by [`is_first_run`](Self::is_first_run).
    pub fn with_required_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Directory checked when the record is complete but carries no path.
    pub fn with_default_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_asset_dir = Some(dir.into());
        self
    }

    /// Returns `true` if onboarding must run.
    ///
    /// That is the case when it never completed, or when the recorded asset
    /// directory no longer holds the required files.
    pub fn is_first_run(&self) -> bool {
        if !self.record.complete {
            return true;
        }

        let dir = match (&self.record.asset_path, &self.default_asset_dir) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(default)) => default.clone(),
            (None, None) => return true,
        };

        let valid = has_required_files(&dir, &self.required_files);
        if !valid {
            tracing::info!(
                path = %dir.display(),
                "recorded assets are incomplete, onboarding required"
            );
        }
        !valid
    }

    /// Records a successful extraction into `asset_path`.
    ///
    /// The in-memory record is updated before the store write, so callers
    /// observe completion even if persisting fails. Last writer wins.
    pub fn mark_complete(&mut self, asset_path: impl Into<String>) -> Result<(), LedgerError> {
        self.record = CompletionRecord {
            complete: true,
            asset_path: Some(asset_path.into()),
            completed_at: Some(Utc::now()),
        };
        self.store.save(&self.record)
    }

    /// Returns the stored asset path, if any.
    pub fn asset_path(&self) -> Option<&str> {
        self.record.asset_path.as_deref()
    }

    pub fn record(&self) -> &CompletionRecord {
        &self.record
    }
}

/// Returns `true` if `dir` is a directory containing every entry in `required`.
pub fn has_required_files(dir: &Path, required: &[String]) -> bool {
    dir.is_dir() && required.iter().all(|name| dir.join(name).exists())
}
