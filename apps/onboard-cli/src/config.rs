//! Host configuration.
//!
//! Stored as JSON in `<config base>/d2onboard/config.json`. Every field is
//! optional on disk; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardConfig {
    /// Application-private data directory. Assets land in `<data_dir>/assets`.
    pub data_dir: PathBuf,

    /// Completion ledger file. Defaults to `<data_dir>/onboarding.json`.
    pub ledger_path: Option<PathBuf>,

    /// External storage candidates for the local file picker.
    pub browse_roots: Vec<PathBuf>,

    /// Suffix of selectable files in the local picker.
    pub filter_extension: String,

    pub poll_interval_ms: u64,

    /// Where network shares are mounted, as `<root>/<host>/<share>`.
    pub network_mount_root: PathBuf,

    /// Program run after onboarding, with the asset path as its argument.
    pub launch_command: Option<String>,

    pub verify_checksums: bool,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).ok();
        let mut browse_roots: Vec<PathBuf> = home.into_iter().collect();
        browse_roots.extend(["/media", "/run/media", "/mnt"].map(PathBuf::from));

        Self {
            data_dir: data_base_dir().join("d2onboard"),
            ledger_path: None,
            browse_roots,
            filter_extension: ".mpq".into(),
            poll_interval_ms: 100,
            network_mount_root: PathBuf::from("/mnt/net"),
            launch_command: None,
            verify_checksums: true,
        }
    }
}

impl OnboardConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file is absent or unparseable.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<OnboardConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        set_permissions_0600(path);
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("onboarding.json"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
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

pub fn config_path() -> PathBuf {
    config_base_dir().join("d2onboard").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".config"))
    }
}

fn data_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let local = std::env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| "C:\\Users\\Default\\AppData\\Local".into());
        PathBuf::from(local)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".local").join("share"))
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OnboardConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, OnboardConfig::default());
        assert_eq!(config.filter_extension, ".mpq");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"data_dir":"/srv/d2","poll_interval_ms":250}"#).unwrap();

        let config = OnboardConfig::load_from(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/d2"));
        assert_eq!(config.asset_dir(), PathBuf::from("/srv/d2/assets"));
        assert_eq!(config.ledger_path(), PathBuf::from("/srv/d2/onboarding.json"));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert!(config.verify_checksums);
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(OnboardConfig::load_from(&path).unwrap(), OnboardConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = OnboardConfig {
            launch_command: Some("/usr/bin/d2".into()),
            verify_checksums: false,
            ..OnboardConfig::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(OnboardConfig::load_from(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
