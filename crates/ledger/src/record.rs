use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted onboarding state.
///
/// Serialized with the same key names the host has always used
/// (`onboarding_complete`, `asset_path`) so existing installs keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(rename = "onboarding_complete", default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_path: Option<String>,
    /// When the last successful extraction was recorded. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
