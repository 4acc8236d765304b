use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::archive::{self, PlannedArchive};
use crate::network::{self, NetworkProtocol};
use crate::{EngineError, ExtractionEngine, usb};

/// Default copy block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Share of the progress bar spent copying; the rest covers verification
/// and the final rename.
const COPY_WEIGHT: f32 = 0.99;

/// Tunables for [`ArchiveCopyEngine`].
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Directory under which network shares are mounted as `<host>/<share>`.
    pub network_mount_root: PathBuf,
    /// Compare SHA-256 of source and copy after each archive.
    pub verify_checksums: bool,
    pub block_size: usize,
    pub probe_timeout: Duration,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            network_mount_root: PathBuf::from("/mnt/net"),
            verify_checksums: true,
            block_size: DEFAULT_BLOCK_SIZE,
            probe_timeout: network::PROBE_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    progress: f32,
    current_file: String,
    missing: Vec<String>,
}

/// Copies validated game archives from a source directory into the asset
/// directory.
pub struct ArchiveCopyEngine {
    options: CopyOptions,
    state: Mutex<EngineState>,
    running: AtomicBool,
}

impl Default for ArchiveCopyEngine {
    fn default() -> Self {
        Self::new(CopyOptions::default())
    }
}

impl ArchiveCopyEngine {
    pub fn new(options: CopyOptions) -> Self {
        Self {
            options,
            state: Mutex::new(EngineState::default()),
            running: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        *self.state() = EngineState::default();
    }

    fn set_current_file(&self, name: &str) {
        self.state().current_file = name.to_string();
    }

    fn set_progress(&self, progress: f32) {
        self.state().progress = progress.clamp(0.0, 1.0);
    }

    /// Maps UNC sources onto the local network mount root.
    fn resolve_source(&self, source: &Path) -> PathBuf {
        let raw = source.to_string_lossy();
        network::mount_point_for(&self.options.network_mount_root, &raw)
            .unwrap_or_else(|| source.to_path_buf())
    }

    fn run(&self, source: &Path, destination: &Path) -> Result<(), EngineError> {
        let source_dir = self.resolve_source(source);
        if !source_dir.is_dir() {
            return Err(EngineError::SourceNotFound(
                source_dir.to_string_lossy().into_owned(),
            ));
        }

        let missing = archive::missing_required(&source_dir);
        if !missing.is_empty() {
            warn!(source = %source_dir.display(), ?missing, "required archives missing");
            let count = missing.len();
            self.state().missing = missing;
            return Err(EngineError::MissingArchives(count));
        }

        let plan = archive::plan_archives(&source_dir)?;
        std::fs::create_dir_all(destination)?;

        let total_bytes = plan.iter().map(|a| a.size).sum::<u64>().max(1);
        let mut copied: u64 = 0;

        info!(
            source = %source_dir.display(),
            destination = %destination.display(),
            archives = plan.len(),
            total_bytes,
            "extracting archives"
        );

        for item in &plan {
            self.set_current_file(&item.name);
            let target = destination.join(&item.name);
            self.copy_archive(item, &target, |n| {
                copied += n;
                self.set_progress(copied as f32 / total_bytes as f32 * COPY_WEIGHT);
            })?;
            debug!(archive = %item.name, bytes = item.size, "archive copied");
        }

        let mut state = self.state();
        state.progress = 1.0;
        state.current_file.clear();
        Ok(())
    }

    /// Copies one archive via a `.part` file, verifying it before the rename.
    fn copy_archive(
        &self,
        item: &PlannedArchive,
        target: &Path,
        mut on_block: impl FnMut(u64),
    ) -> Result<(), EngineError> {
        let partial = target.with_extension("mpq.part");
        let result = (|| -> Result<(), EngineError> {
            let mut input = std::fs::File::open(&item.source)?;
            let mut output = std::fs::File::create(&partial)?;
            let mut hasher = Sha256::new();
            let mut buf = vec![0u8; self.options.block_size.max(1)];

            loop {
                let n = input.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                output.write_all(&buf[..n])?;
                if self.options.verify_checksums {
                    hasher.update(&buf[..n]);
                }
                on_block(n as u64);
            }
            output.flush()?;
            output.sync_all()?;
            drop(output);

            if self.options.verify_checksums {
                let expected = hex::encode(hasher.finalize());
                let actual = file_checksum(&partial)?;
                if expected != actual {
                    return Err(EngineError::ChecksumMismatch(item.name.clone()));
                }
            }

            std::fs::rename(&partial, target)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }
}

/// Computes the hex SHA-256 of a file.
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl ExtractionEngine for ArchiveCopyEngine {
    fn extract(&self, source: &Path, destination: &Path) -> Result<(), EngineError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Busy);
        }
        self.reset();

        let result = self.run(source, destination);
        if result.is_err() {
            self.state().current_file.clear();
        }

        self.running.store(false, Ordering::Release);
        result
    }

    fn current_progress(&self) -> f32 {
        self.state().progress
    }

    fn current_file_name(&self) -> String {
        self.state().current_file.clone()
    }

    fn missing_files(&self) -> Vec<String> {
        self.state().missing.clone()
    }

    fn validate(&self, path: &Path) -> bool {
        let dir = self.resolve_source(path);
        dir.is_dir() && archive::missing_required(&dir).is_empty()
    }

    fn list_usb_devices(&self) -> Vec<String> {
        usb::enumerate_devices()
    }

    fn connect_network(
        &self,
        protocol: NetworkProtocol,
        host: &str,
        share: &str,
        username: &str,
        _password: &str,
    ) -> bool {
        match network::probe(protocol, host, self.options.probe_timeout) {
            Ok(addr) => {
                info!(
                    %protocol,
                    %addr,
                    share,
                    authenticated = !username.is_empty(),
                    "network share reachable"
                );
                true
            }
            Err(e) => {
                warn!(%protocol, host, share, error = %e, "network share unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::REQUIRED_ARCHIVES;
    use crate::archive::tests::{write_archive, write_required};
    use std::fs;

    fn engine() -> ArchiveCopyEngine {
        ArchiveCopyEngine::new(CopyOptions {
            block_size: 16,
            ..CopyOptions::default()
        })
    }

    #[test]
    fn extract_copies_all_archives() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_required(src.path());
        write_archive(src.path(), "D2Video.MPQ", 100);

        let engine = engine();
        engine.extract(src.path(), dst.path()).unwrap();

        for name in REQUIRED_ARCHIVES {
            let copied = dst.path().join(name);
            assert!(copied.exists(), "{name} not copied");
            assert_eq!(
                file_checksum(&copied).unwrap(),
                file_checksum(&src.path().join(name)).unwrap()
            );
        }
        assert!(dst.path().join("d2video.mpq").exists());
        assert_eq!(engine.current_progress(), 1.0);
        assert!(engine.current_file_name().is_empty());
        assert!(engine.missing_files().is_empty());
    }

    #[test]
    fn extract_leaves_no_partial_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_required(src.path());

        engine().extract(src.path(), dst.path()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dst.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn extract_reports_missing_archives() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_required(src.path());
        fs::remove_file(src.path().join("d2sfx.mpq")).unwrap();
        fs::remove_file(src.path().join("d2music.mpq")).unwrap();

        let engine = engine();
        let err = engine.extract(src.path(), dst.path()).unwrap_err();

        assert!(matches!(err, EngineError::MissingArchives(2)));
        assert_eq!(engine.missing_files(), vec!["d2sfx.mpq", "d2music.mpq"]);
        assert!(!dst.path().join("d2data.mpq").exists());
    }

    #[test]
    fn missing_list_resets_on_next_extract() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_archive(src.path(), "d2data.mpq", 64);

        let engine = engine();
        assert!(engine.extract(src.path(), dst.path()).is_err());
        assert!(!engine.missing_files().is_empty());

        write_required(src.path());
        engine.extract(src.path(), dst.path()).unwrap();
        assert!(engine.missing_files().is_empty());
    }

    #[test]
    fn extract_fails_for_missing_source() {
        let dst = tempfile::tempdir().unwrap();
        let engine = engine();
        let err = engine
            .extract(Path::new("/definitely/not/real"), dst.path())
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceNotFound(_)));
        assert!(engine.missing_files().is_empty());
    }

    #[test]
    fn unc_source_reads_from_mount_root() {
        let mounts = tempfile::tempdir().unwrap();
        let share = mounts.path().join("nas").join("games");
        fs::create_dir_all(&share).unwrap();
        write_required(&share);
        let dst = tempfile::tempdir().unwrap();

        let engine = ArchiveCopyEngine::new(CopyOptions {
            network_mount_root: mounts.path().to_path_buf(),
            ..CopyOptions::default()
        });
        engine.extract(Path::new(r"\\nas\games"), dst.path()).unwrap();
        assert!(dst.path().join("d2exp.mpq").exists());
    }

    #[test]
    fn validate_checks_required_set() {
        let src = tempfile::tempdir().unwrap();
        let engine = engine();
        assert!(!engine.validate(src.path()));
        write_required(src.path());
        assert!(engine.validate(src.path()));
    }

    #[test]
    fn connect_network_probes_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let engine = engine();
        assert!(engine.connect_network(NetworkProtocol::Smb, &addr, "games", "", ""));

        drop(listener);
        assert!(!engine.connect_network(NetworkProtocol::Smb, "nas:notaport", "games", "", ""));
    }
}
