//! Game archive discovery and validation.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Archives the engine cannot run without.
pub const REQUIRED_ARCHIVES: &[&str] = &[
    "d2data.mpq",
    "d2char.mpq",
    "d2sfx.mpq",
    "d2music.mpq",
    "d2speech.mpq",
    "d2exp.mpq",
];

/// Archives copied when present but never reported missing.
pub const OPTIONAL_ARCHIVES: &[&str] = &[
    "d2video.mpq",
    "d2xmusic.mpq",
    "d2xtalk.mpq",
    "d2xvideo.mpq",
    "patch_d2.mpq",
];

/// Every archive begins with this magic.
pub const ARCHIVE_SIGNATURE: [u8; 4] = *b"MPQ\x1a";

/// Smallest file that can hold an archive header.
pub const MIN_ARCHIVE_SIZE: u64 = 32;

const ARCHIVE_EXTENSION: &str = "mpq";

/// Returns `true` if `path` is a plausible archive (size and signature).
pub fn is_valid_archive(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() || metadata.len() < MIN_ARCHIVE_SIZE {
        return false;
    }

    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut signature = [0u8; 4];
    file.read_exact(&mut signature).is_ok() && signature == ARCHIVE_SIGNATURE
}

/// Indexes the archive files in `dir` by lowercase file name.
///
/// Returns an empty index if `dir` cannot be read.
pub fn archive_index(dir: &Path) -> HashMap<String, PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashMap::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let path = entry.path();
            let is_archive = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
                .unwrap_or(false);
            if !is_archive {
                return None;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            Some((name, path))
        })
        .collect()
}

/// Lists required archives that are absent or corrupt in `dir`.
///
/// Names are returned in canonical (lowercase) form, in the order of
/// [`REQUIRED_ARCHIVES`].
pub fn missing_required(dir: &Path) -> Vec<String> {
    let index = archive_index(dir);
    REQUIRED_ARCHIVES
        .iter()
        .filter(|name| {
            index
                .get(**name)
                .map(|path| !is_valid_archive(path))
                .unwrap_or(true)
        })
        .map(|name| name.to_string())
        .collect()
}

/// An archive scheduled for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArchive {
    pub source: PathBuf,
    /// Lowercase destination name.
    pub name: String,
    pub size: u64,
}

/// Builds the copy list: all required archives plus any valid optional ones.
pub fn plan_archives(dir: &Path) -> std::io::Result<Vec<PlannedArchive>> {
    let index = archive_index(dir);
    let mut plan = Vec::new();

    for name in REQUIRED_ARCHIVES.iter().chain(OPTIONAL_ARCHIVES) {
        let Some(path) = index.get(*name) else {
            continue;
        };
        if !is_valid_archive(path) {
            continue;
        }
        let size = std::fs::metadata(path)?.len();
        plan.push(PlannedArchive {
            source: path.clone(),
            name: name.to_string(),
            size,
        });
    }

    Ok(plan)
}

// ---------------------------------------------------------------------------
// Installation scanning
// ---------------------------------------------------------------------------

/// Game edition detected in an installation directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GameVersion {
    Classic,
    LordOfDestruction,
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameVersion::Classic => write!(f, "Diablo II"),
            GameVersion::LordOfDestruction => write!(f, "Diablo II: Lord of Destruction"),
        }
    }
}

/// A directory that looks like an existing game install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub path: PathBuf,
    pub version: GameVersion,
}

/// Finds game installs among the immediate subdirectories of `search_paths`.
///
/// A subdirectory qualifies when it holds `d2data.mpq` and `d2sfx.mpq`;
/// the presence of `d2exp.mpq` marks the expansion.
pub fn scan_for_installations(search_paths: &[PathBuf]) -> Vec<Installation> {
    let mut installations = Vec::new();

    for search_path in search_paths {
        let Ok(entries) = std::fs::read_dir(search_path) else {
            continue;
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let index = archive_index(&dir);
            if !(index.contains_key("d2data.mpq") && index.contains_key("d2sfx.mpq")) {
                continue;
            }
            let version = if index.contains_key("d2exp.mpq") {
                GameVersion::LordOfDestruction
            } else {
                GameVersion::Classic
            };
            tracing::debug!(path = %dir.display(), ?version, "found installation");
            installations.push(Installation { path: dir, version });
        }
    }

    installations
}

/// Kind of input a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Iso,
    Archive,
    Directory,
    Unknown,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Iso => write!(f, "disc image"),
            SourceType::Archive => write!(f, "archive"),
            SourceType::Directory => write!(f, "directory"),
            SourceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classifies `path` by extension, falling back to a directory check.
pub fn detect_source_type(path: &Path) -> SourceType {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "iso" => SourceType::Iso,
        "mpq" => SourceType::Archive,
        _ if path.is_dir() => SourceType::Directory,
        _ => SourceType::Unknown,
    }
}
