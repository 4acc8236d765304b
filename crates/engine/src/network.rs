//! Network share addressing and reachability probing.

use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default timeout for a reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Protocol used to reach a network share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkProtocol {
    Smb,
    Ftp,
    Http,
}

impl NetworkProtocol {
    pub fn all() -> &'static [NetworkProtocol] {
        &[NetworkProtocol::Smb, NetworkProtocol::Ftp, NetworkProtocol::Http]
    }

    /// Well-known TCP port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            NetworkProtocol::Smb => 445,
            NetworkProtocol::Ftp => 21,
            NetworkProtocol::Http => 80,
        }
    }
}

impl fmt::Display for NetworkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkProtocol::Smb => write!(f, "SMB"),
            NetworkProtocol::Ftp => write!(f, "FTP"),
            NetworkProtocol::Http => write!(f, "HTTP"),
        }
    }
}

/// Error returned when parsing an unknown protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network protocol: {0}")]
pub struct UnknownProtocol(pub String);

impl FromStr for NetworkProtocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SMB" => Ok(NetworkProtocol::Smb),
            "FTP" => Ok(NetworkProtocol::Ftp),
            "HTTP" => Ok(NetworkProtocol::Http),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// Resolves `host` (optionally `host:port`) to a socket address.
fn resolve(protocol: NetworkProtocol, host: &str) -> std::io::Result<SocketAddr> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let target = match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => {
            let port = port.parse::<u16>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid port in {host}"),
                )
            })?;
            (name.to_string(), port)
        }
        _ => (host.to_string(), protocol.default_port()),
    };

    target.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address for {host}"),
        )
    })
}

/// Opens (and immediately closes) a TCP connection to the share's host.
pub fn probe(
    protocol: NetworkProtocol,
    host: &str,
    timeout: Duration,
) -> std::io::Result<SocketAddr> {
    let addr = resolve(protocol, host)?;
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    drop(stream);
    Ok(addr)
}

/// Formats a UNC-style path: `\\host\share`.
pub fn unc_path(host: &str, share: &str) -> String {
    let share = share.trim_matches(|c| c == '\\' || c == '/');
    format!(r"\\{host}\{share}")
}

/// Splits a UNC path into `(host, share)`. The share keeps any nested segments.
pub fn parse_unc(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(r"\\")?;
    let (host, share) = rest.split_once('\\')?;
    if host.is_empty() || share.is_empty() {
        return None;
    }
    Some((host, share))
}

/// Maps a UNC path onto the local directory where the share is mounted.
///
/// `\\host\share\sub` becomes `<root>/host/share/sub`. Returns `None` for
/// anything that is not a UNC path, or when the host or a share segment is
/// not a plain name (`.`, `..`, absolute, or containing a separator), so the
/// result always stays under `root`.
pub fn mount_point_for(root: &Path, path: &str) -> Option<PathBuf> {
    let (host, share) = parse_unc(path)?;
    let mut local = root.to_path_buf();
    push_plain(&mut local, host)?;
    for segment in share.split('\\').filter(|s| !s.is_empty()) {
        push_plain(&mut local, segment)?;
    }
    Some(local)
}

/// Appends `segment` only if it is exactly one normal path component.
fn push_plain(path: &mut PathBuf, segment: &str) -> Option<()> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == segment => {
            path.push(segment);
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn protocol_parse_and_display() {
        for protocol in NetworkProtocol::all() {
            let parsed: NetworkProtocol = protocol.to_string().parse().unwrap();
            assert_eq!(parsed, *protocol);
        }
        assert_eq!("smb".parse::<NetworkProtocol>().unwrap(), NetworkProtocol::Smb);
        assert!("gopher".parse::<NetworkProtocol>().is_err());
    }

    #[test]
    fn unc_formatting() {
        assert_eq!(unc_path("nas", "games"), r"\\nas\games");
        assert_eq!(unc_path("nas", r"\games\"), r"\\nas\games");
    }

    #[test]
    fn unc_parsing() {
        assert_eq!(parse_unc(r"\\nas\games"), Some(("nas", "games")));
        assert_eq!(parse_unc(r"\\nas\games\d2"), Some(("nas", r"games\d2")));
        assert_eq!(parse_unc(r"\\nas"), None);
        assert_eq!(parse_unc("/mnt/usb"), None);
    }

    #[test]
    fn unc_maps_under_mount_root() {
        let root = Path::new("/mnt/net");
        assert_eq!(
            mount_point_for(root, r"\\nas\games\d2"),
            Some(PathBuf::from("/mnt/net/nas/games/d2"))
        );
        assert_eq!(mount_point_for(root, "/local/dir"), None);
    }

    #[test]
    fn unc_segments_cannot_escape_mount_root() {
        let root = Path::new("/mnt/net");
        for path in [
            r"\\nas\..\..\etc",
            r"\\nas\games\..\..\..\etc",
            r"\\..\games",
            r"\\nas\.\games",
            r"\\nas\/etc",
            r"\\nas\games/../../etc",
            r"\\/etc\games",
        ] {
            assert_eq!(mount_point_for(root, path), None, "{path}");
        }
        assert_eq!(
            mount_point_for(root, r"\\nas\games\\d2"),
            Some(PathBuf::from("/mnt/net/nas/games/d2"))
        );
    }

    #[test]
    fn probe_reaches_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let reached = probe(NetworkProtocol::Http, &addr.to_string(), PROBE_TIMEOUT).unwrap();
        assert_eq!(reached, addr);
    }

    #[test]
    fn resolve_hostname_with_explicit_port() {
        let addr = resolve(NetworkProtocol::Ftp, "localhost:2121").unwrap();
        assert_eq!(addr.port(), 2121);
    }

    #[test]
    fn resolve_uses_protocol_default_port() {
        let addr = resolve(NetworkProtocol::Smb, "localhost").unwrap();
        assert_eq!(addr.port(), 445);
    }

    #[test]
    fn probe_rejects_bad_port() {
        assert!(probe(NetworkProtocol::Smb, "nas:notaport", PROBE_TIMEOUT).is_err());
    }
}
