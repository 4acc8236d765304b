use std::path::{Path, PathBuf};
use std::sync::Arc;

use d2onboard_engine::network::unc_path;
use d2onboard_engine::{ExtractionEngine, NetworkProtocol};
use tracing::{debug, info, warn};

use crate::browse::DirBrowser;
use crate::device::{UsbDevice, parse_device_records};
use crate::source::{Credential, Source, SourceKind};
use crate::ResolveError;

/// Interactive file selection over a [`DirBrowser`].
///
/// Implementations drive `ascend`/`descend` as the user navigates and return
/// the chosen file, or `None` if the user backs out.
pub trait FilePicker: Send + Sync {
    fn pick_file(&self, browser: &mut DirBrowser) -> Option<PathBuf>;
}

/// Selection of one device from an enumerated list. Returns its index.
pub trait DevicePicker: Send + Sync {
    fn pick_device(&self, devices: &[UsbDevice]) -> Option<usize>;
}

/// Network share details entered by the user.
///
/// Consumed by [`SourceResolver::resolve_network`]; nothing is retained
/// after a failed attempt.
#[derive(Debug, Clone)]
pub struct NetworkTarget {
    pub protocol: NetworkProtocol,
    pub host: String,
    pub share: String,
    pub credential: Credential,
}

impl NetworkTarget {
    pub fn new(
        protocol: NetworkProtocol,
        host: impl Into<String>,
        share: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            protocol,
            host: host.into(),
            share: share.into(),
            credential,
        }
    }
}

/// Resolves user choices into [`Source`]s.
pub struct SourceResolver {
    engine: Arc<dyn ExtractionEngine>,
    browse_root: PathBuf,
    filter: Option<String>,
}

impl SourceResolver {
    pub fn new(engine: Arc<dyn ExtractionEngine>, browse_root: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            browse_root: browse_root.into(),
            filter: None,
        }
    }

    /// Restricts local file selection to names ending in `extension`.
    pub fn with_filter(mut self, extension: impl Into<String>) -> Self {
        self.filter = Some(extension.into());
        self
    }

    pub fn browse_root(&self) -> &Path {
        &self.browse_root
    }

    /// A fresh browser positioned at the browse root.
    pub fn browser(&self) -> DirBrowser {
        DirBrowser::new(&self.browse_root, self.filter.as_deref())
    }

    /// Local source: the directory containing the file the user picks.
    pub fn resolve_local(&self, picker: &dyn FilePicker) -> Result<Source, ResolveError> {
        let mut browser = self.browser();
        let file = picker.pick_file(&mut browser).ok_or(ResolveError::NoSelection)?;

        if !file.is_file() {
            return Err(ResolveError::InvalidSelection(format!(
                "not a file: {}",
                file.display()
            )));
        }
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !browser.matches_filter(&name) {
            return Err(ResolveError::InvalidSelection(format!(
                "{} does not match {}",
                file.display(),
                browser.filter().unwrap_or_default()
            )));
        }

        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                ResolveError::InvalidSelection(format!("no parent directory: {}", file.display()))
            })?;

        debug!(file = %file.display(), dir = %dir.display(), "local source selected");
        Source::new(SourceKind::Local, dir.to_string_lossy(), None)
    }

    /// Typed descriptors for the engine's removable devices.
    pub fn usb_devices(&self) -> Vec<UsbDevice> {
        parse_device_records(&self.engine.list_usb_devices())
    }

    pub fn resolve_usb(&self, picker: &dyn DevicePicker) -> Result<Source, ResolveError> {
        let devices = self.usb_devices();
        if devices.is_empty() {
            return Err(ResolveError::NoDevicesFound);
        }

        let device = picker
            .pick_device(&devices)
            .and_then(|index| devices.get(index))
            .ok_or(ResolveError::NoSelection)?;

        info!(path = %device.path, label = %device.label, "USB source selected");
        Source::new(SourceKind::Usb, device.path.clone(), None)
    }

    /// Network source. Host and share are checked locally before the engine
    /// is asked to connect.
    pub fn resolve_network(&self, target: NetworkTarget) -> Result<Source, ResolveError> {
        let host = target.host.trim();
        let share = target.share.trim();
        if host.is_empty() {
            return Err(ResolveError::ConnectionFailed("host is required".into()));
        }
        if share.is_empty() {
            return Err(ResolveError::ConnectionFailed("share is required".into()));
        }

        let connected = self.engine.connect_network(
            target.protocol,
            host,
            share,
            &target.credential.username,
            &target.credential.password,
        );
        if !connected {
            warn!(protocol = %target.protocol, host, share, "network connect failed");
            return Err(ResolveError::ConnectionFailed(format!(
                "could not reach {host} over {}",
                target.protocol
            )));
        }

        let path = unc_path(host, share);
        info!(protocol = %target.protocol, path = %path, "network source selected");
        Source::new(SourceKind::Network, path, Some(target.credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use d2onboard_engine::EngineError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubEngine {
        devices: Vec<String>,
        connect_ok: bool,
        connect_calls: AtomicUsize,
        last_connect: Mutex<Option<(String, String, String)>>,
    }

    impl ExtractionEngine for StubEngine {
        fn extract(&self, _: &Path, _: &Path) -> Result<(), EngineError> {
            Ok(())
        }
        fn current_progress(&self) -> f32 {
            0.0
        }
        fn current_file_name(&self) -> String {
            String::new()
        }
        fn missing_files(&self) -> Vec<String> {
            Vec::new()
        }
        fn validate(&self, _: &Path) -> bool {
            true
        }
        fn list_usb_devices(&self) -> Vec<String> {
            self.devices.clone()
        }
        fn connect_network(
            &self,
            _: NetworkProtocol,
            host: &str,
            share: &str,
            username: &str,
            _: &str,
        ) -> bool {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_connect.lock().unwrap() =
                Some((host.to_string(), share.to_string(), username.to_string()));
            self.connect_ok
        }
    }

    struct FixedFile(Option<PathBuf>);

    impl FilePicker for FixedFile {
        fn pick_file(&self, _: &mut DirBrowser) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    /// Navigates one directory down and selects a file through the browser.
    struct NavigatingPicker;

    impl FilePicker for NavigatingPicker {
        fn pick_file(&self, browser: &mut DirBrowser) -> Option<PathBuf> {
            browser.descend("game").ok()?;
            browser.select("d2data.mpq").ok()
        }
    }

    struct FirstDevice;

    impl DevicePicker for FirstDevice {
        fn pick_device(&self, devices: &[UsbDevice]) -> Option<usize> {
            (!devices.is_empty()).then_some(0)
        }
    }

    struct OutOfRange;

    impl DevicePicker for OutOfRange {
        fn pick_device(&self, devices: &[UsbDevice]) -> Option<usize> {
            Some(devices.len())
        }
    }

    fn resolver(engine: StubEngine) -> (SourceResolver, Arc<StubEngine>) {
        let engine = Arc::new(engine);
        let resolver = SourceResolver::new(engine.clone(), "/").with_filter(".mpq");
        (resolver, engine)
    }

    #[test]
    fn local_uses_containing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("D2DATA.MPQ");
        std::fs::write(&file, b"x").unwrap();

        let (resolver, _) = resolver(StubEngine::default());
        let source = resolver.resolve_local(&FixedFile(Some(file))).unwrap();
        assert_eq!(source.kind(), SourceKind::Local);
        assert_eq!(source.path(), tmp.path().to_string_lossy().as_ref());
        assert!(source.credential().is_none());
    }

    #[test]
    fn local_rejects_file_outside_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("passwd");
        std::fs::write(&file, b"root:x:0:0").unwrap();

        let (resolver, _) = resolver(StubEngine::default());
        assert!(matches!(
            resolver.resolve_local(&FixedFile(Some(file))),
            Err(ResolveError::InvalidSelection(_))
        ));
    }

    #[test]
    fn local_rejects_missing_file_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("archives.mpq")).unwrap();

        let (resolver, _) = resolver(StubEngine::default());
        for picked in [
            tmp.path().join("absent.mpq"),
            tmp.path().join("archives.mpq"),
        ] {
            assert!(matches!(
                resolver.resolve_local(&FixedFile(Some(picked))),
                Err(ResolveError::InvalidSelection(_))
            ));
        }
    }

    #[test]
    fn local_without_filter_accepts_any_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("setup.exe");
        std::fs::write(&file, b"x").unwrap();

        let resolver = SourceResolver::new(Arc::new(StubEngine::default()), tmp.path());
        let source = resolver.resolve_local(&FixedFile(Some(file))).unwrap();
        assert_eq!(source.path(), tmp.path().to_string_lossy().as_ref());
    }

    #[test]
    fn local_abort_is_no_selection() {
        let (resolver, _) = resolver(StubEngine::default());
        assert!(matches!(
            resolver.resolve_local(&FixedFile(None)),
            Err(ResolveError::NoSelection)
        ));
    }

    #[test]
    fn local_through_browser() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("game")).unwrap();
        std::fs::write(tmp.path().join("game/d2data.mpq"), b"x").unwrap();

        let resolver = SourceResolver::new(Arc::new(StubEngine::default()), tmp.path())
            .with_filter(".mpq");
        let source = resolver.resolve_local(&NavigatingPicker).unwrap();
        assert_eq!(
            source.path(),
            tmp.path().join("game").to_string_lossy().as_ref()
        );
    }

    #[test]
    fn usb_single_device() {
        let (resolver, _) = resolver(StubEngine {
            devices: vec!["/mnt/usb1|SanDisk|64000000000|32000000000".into()],
            ..Default::default()
        });
        let source = resolver.resolve_usb(&FirstDevice).unwrap();
        assert_eq!(source.kind(), SourceKind::Usb);
        assert_eq!(source.path(), "/mnt/usb1");
    }

    #[test]
    fn usb_empty_list_is_no_devices() {
        let (resolver, _) = resolver(StubEngine::default());
        assert!(matches!(
            resolver.resolve_usb(&FirstDevice),
            Err(ResolveError::NoDevicesFound)
        ));
    }

    #[test]
    fn usb_malformed_records_only_is_no_devices() {
        let (resolver, _) = resolver(StubEngine {
            devices: vec!["garbage".into(), "".into()],
            ..Default::default()
        });
        assert!(matches!(
            resolver.resolve_usb(&FirstDevice),
            Err(ResolveError::NoDevicesFound)
        ));
    }

    #[test]
    fn usb_bad_index_is_no_selection() {
        let (resolver, _) = resolver(StubEngine {
            devices: vec!["/mnt/usb1|SanDisk".into()],
            ..Default::default()
        });
        assert!(matches!(
            resolver.resolve_usb(&OutOfRange),
            Err(ResolveError::NoSelection)
        ));
    }

    #[test]
    fn network_success_builds_unc_path() {
        let (resolver, engine) = resolver(StubEngine {
            connect_ok: true,
            ..Default::default()
        });
        let target = NetworkTarget::new(
            NetworkProtocol::Smb,
            "nas",
            "games",
            Credential::new("alice", "secret"),
        );
        let source = resolver.resolve_network(target).unwrap();

        assert_eq!(source.kind(), SourceKind::Network);
        assert_eq!(source.path(), r"\\nas\games");
        assert_eq!(source.credential().unwrap().username, "alice");
        assert_eq!(engine.connect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.last_connect.lock().unwrap().clone(),
            Some(("nas".into(), "games".into(), "alice".into()))
        );
    }

    #[test]
    fn network_empty_host_skips_engine() {
        let (resolver, engine) = resolver(StubEngine {
            connect_ok: true,
            ..Default::default()
        });
        let target = NetworkTarget::new(NetworkProtocol::Ftp, "", "games", Credential::default());
        assert!(matches!(
            resolver.resolve_network(target),
            Err(ResolveError::ConnectionFailed(_))
        ));
        assert_eq!(engine.connect_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn network_connect_failure() {
        let (resolver, engine) = resolver(StubEngine::default());
        let target =
            NetworkTarget::new(NetworkProtocol::Http, "nas", "games", Credential::default());
        assert!(matches!(
            resolver.resolve_network(target),
            Err(ResolveError::ConnectionFailed(_))
        ));
        assert_eq!(engine.connect_calls.load(Ordering::SeqCst), 1);
    }
}
