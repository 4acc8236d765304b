//! Directory browser backing the local file picker.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ResolveError;

/// An entry shown in the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Full absolute path.
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Stateful directory navigator with an optional file-extension filter.
///
/// Directories are always listed so the user can keep navigating; files are
/// listed only when they match the filter.
#[derive(Debug, Clone)]
pub struct DirBrowser {
    current: PathBuf,
    filter: Option<String>,
}

impl DirBrowser {
    /// Creates a browser at `start`. `filter` is a file suffix such as `.mpq`,
    /// matched case-insensitively; empty means no filtering.
    pub fn new(start: impl Into<PathBuf>, filter: Option<&str>) -> Self {
        let filter = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        Self {
            current: start.into(),
            filter,
        }
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Case-insensitive suffix match against the filter. Always `true`
    /// without a filter.
    pub fn matches_filter(&self, name: &str) -> bool {
        match &self.filter {
            Some(suffix) => name.to_lowercase().ends_with(suffix.as_str()),
            None => true,
        }
    }

    /// Lists the current directory: directories first, then matching files,
    /// each group sorted case-insensitively. Hidden entries are skipped.
    pub fn entries(&self) -> Result<Vec<BrowseEntry>, ResolveError> {
        let mut entries: Vec<BrowseEntry> = std::fs::read_dir(&self.current)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    return None;
                }
                let path = entry.path();
                let is_dir = path.is_dir();
                if !is_dir && !self.matches_filter(&name) {
                    return None;
                }
                Some(BrowseEntry { name, path, is_dir })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        Ok(entries)
    }

    /// Moves to the parent directory. Returns `false` at the root or when
    /// the parent cannot be read.
    pub fn ascend(&mut self) -> bool {
        let Some(parent) = self.current.parent() else {
            return false;
        };
        if std::fs::read_dir(parent).is_err() {
            return false;
        }
        self.current = parent.to_path_buf();
        true
    }

    /// Enters the subdirectory `name` of the current directory.
    pub fn descend(&mut self, name: &str) -> Result<(), ResolveError> {
        let target = self.child(name)?;
        if !target.is_dir() {
            return Err(ResolveError::InvalidSelection(format!(
                "not a directory: {}",
                target.display()
            )));
        }
        self.current = target;
        Ok(())
    }

    /// Selects the file `name` in the current directory.
    pub fn select(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let target = self.child(name)?;
        if !target.is_file() {
            return Err(ResolveError::InvalidSelection(format!(
                "not a file: {}",
                target.display()
            )));
        }
        if !self.matches_filter(name) {
            return Err(ResolveError::InvalidSelection(format!(
                "{name} does not match {}",
                self.filter.as_deref().unwrap_or_default()
            )));
        }
        Ok(target)
    }

    /// Joins a single plain path component onto the current directory.
    fn child(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.current.join(name)),
            _ => Err(ResolveError::InvalidSelection(format!(
                "not an entry name: {name}"
            ))),
        }
    }
}

/// Picks the browser's starting directory: the first existing candidate
/// (external storage), else `fallback` (app-private storage).
pub fn browse_root(candidates: &[PathBuf], fallback: &Path) -> PathBuf {
    candidates
        .iter()
        .find(|candidate| candidate.is_dir())
        .cloned()
        .unwrap_or_else(|| fallback.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        fs::create_dir(base.join("Diablo II")).unwrap();
        fs::create_dir(base.join("backups")).unwrap();
        fs::create_dir(base.join(".cache")).unwrap();
        fs::write(base.join("d2data.mpq"), b"x").unwrap();
        fs::write(base.join("D2EXP.MPQ"), b"x").unwrap();
        fs::write(base.join("notes.txt"), b"x").unwrap();
        tmp
    }

    fn names(entries: &[BrowseEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn filter_keeps_directories_and_matching_files() {
        let tmp = tree();
        let browser = DirBrowser::new(tmp.path(), Some(".mpq"));
        let entries = browser.entries().unwrap();

        assert_eq!(
            names(&entries),
            vec!["backups", "Diablo II", "d2data.mpq", "D2EXP.MPQ"]
        );
        assert!(entries[0].is_dir);
        assert!(!entries[2].is_dir);
    }

    #[test]
    fn no_filter_lists_all_visible_entries() {
        let tmp = tree();
        let browser = DirBrowser::new(tmp.path(), None);
        let entries = browser.entries().unwrap();
        assert_eq!(entries.len(), 5);
        assert!(names(&entries).contains(&"notes.txt"));
        assert!(!names(&entries).contains(&".cache"));
    }

    #[test]
    fn empty_filter_is_no_filter() {
        let browser = DirBrowser::new("/", Some(""));
        assert!(browser.filter().is_none());
    }

    #[test]
    fn descend_and_ascend() {
        let tmp = tree();
        let mut browser = DirBrowser::new(tmp.path(), Some(".mpq"));

        browser.descend("Diablo II").unwrap();
        assert_eq!(browser.current(), tmp.path().join("Diablo II"));

        assert!(browser.ascend());
        assert_eq!(browser.current(), tmp.path());
    }

    #[test]
    fn ascend_at_root_is_noop() {
        let mut browser = DirBrowser::new("/", None);
        assert!(!browser.ascend());
        assert_eq!(browser.current(), Path::new("/"));
    }

    #[test]
    fn descend_rejects_files_and_traversal() {
        let tmp = tree();
        let mut browser = DirBrowser::new(tmp.path(), None);
        assert!(browser.descend("notes.txt").is_err());
        assert!(browser.descend("..").is_err());
        assert!(browser.descend("a/b").is_err());
        assert_eq!(browser.current(), tmp.path());
    }

    #[test]
    fn select_enforces_filter() {
        let tmp = tree();
        let browser = DirBrowser::new(tmp.path(), Some(".mpq"));

        assert_eq!(
            browser.select("D2EXP.MPQ").unwrap(),
            tmp.path().join("D2EXP.MPQ")
        );
        assert!(browser.select("notes.txt").is_err());
        assert!(browser.select("backups").is_err());
    }

    #[test]
    fn entries_of_missing_directory_fail() {
        let browser = DirBrowser::new("/definitely/not/real", None);
        assert!(matches!(browser.entries(), Err(ResolveError::Io(_))));
    }

    #[test]
    fn browse_root_prefers_existing_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let fallback = tmp.path().join("private");
        let candidates = vec![PathBuf::from("/definitely/not/real"), tmp.path().to_path_buf()];

        assert_eq!(browse_root(&candidates, &fallback), tmp.path());
        assert_eq!(browse_root(&candidates[..1], &fallback), fallback);
    }

    #[test]
    fn entry_serialization() {
        let entry = BrowseEntry {
            name: "Games".into(),
            path: PathBuf::from("/home/user/Games"),
            is_dir: true,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"name\":\"Games\""));
        assert!(json.contains("\"isDir\":true"));
    }
}
