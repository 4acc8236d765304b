//! Removable storage enumeration.
//!
//! Produces device records in the `path|label|totalSpace|freeSpace` format
//! the resolver consumes. On Linux the mount table and sysfs are read
//! directly; free space is not available from sysfs and is reported as 0.

use std::path::{Path, PathBuf};

/// Field separator of a device record.
pub const RECORD_SEPARATOR: char = '|';

/// Mount locations desktop automounters use for removable media.
const AUTOMOUNT_PREFIXES: &[&str] = &["/media/", "/run/media/"];

const SECTOR_SIZE: u64 = 512;

/// One line of `/proc/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Parses the contents of a mount table (`/proc/mounts` format).
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: unescape_octal(device),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decodes the `\040`-style escapes the kernel uses for whitespace in paths.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Candidate sysfs names for the whole disk backing `partition`.
///
/// `sdb1` → `sdb1`, `sdb`; `mmcblk0p1` → `mmcblk0p1`, `mmcblk0`.
fn disk_candidates(partition: &str) -> Vec<String> {
    let mut candidates = vec![partition.to_string()];
    let stripped = partition.trim_end_matches(|c: char| c.is_ascii_digit());
    if stripped.len() != partition.len() && !stripped.is_empty() {
        match stripped.strip_suffix('p') {
            Some(disk) if disk.ends_with(|c: char| c.is_ascii_digit()) => {
                candidates.push(disk.to_string());
            }
            _ => candidates.push(stripped.to_string()),
        }
    }
    candidates
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

fn is_removable(sys_root: &Path, device_name: &str) -> bool {
    disk_candidates(device_name).iter().any(|name| {
        read_trimmed(&sys_root.join("class/block").join(name).join("removable")).as_deref()
            == Some("1")
    })
}

fn total_bytes(sys_root: &Path, device_name: &str) -> u64 {
    read_trimmed(&sys_root.join("class/block").join(device_name).join("size"))
        .and_then(|s| s.parse::<u64>().ok())
        .map(|sectors| sectors * SECTOR_SIZE)
        .unwrap_or(0)
}

/// Builds device records from a mount table, consulting `sys_root` (normally
/// `/sys`) for removability and size.
pub fn device_records(mounts: &str, sys_root: &Path) -> Vec<String> {
    let mut records = Vec::new();

    for entry in parse_mounts(mounts) {
        let Some(device_name) = entry.device.strip_prefix("/dev/") else {
            continue;
        };
        if entry.mount_point == Path::new("/") {
            continue;
        }

        let mount_str = entry.mount_point.to_string_lossy();
        let automounted = AUTOMOUNT_PREFIXES
            .iter()
            .any(|prefix| mount_str.starts_with(prefix));
        if !automounted && !is_removable(sys_root, device_name) {
            continue;
        }

        let label = entry
            .mount_point
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| device_name.to_string());
        let total = total_bytes(sys_root, device_name);

        records.push(format!(
            "{mount_str}{sep}{label}{sep}{total}{sep}0",
            sep = RECORD_SEPARATOR
        ));
    }

    records
}

/// Enumerates mounted removable storage on this machine.
pub fn enumerate_devices() -> Vec<String> {
    enumerate_devices_inner()
}

#[cfg(target_os = "linux")]
fn enumerate_devices_inner() -> Vec<String> {
    match std::fs::read_to_string("/proc/mounts") {
        Ok(mounts) => device_records(&mounts, Path::new("/sys")),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read mount table");
            Vec::new()
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn enumerate_devices_inner() -> Vec<String> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MOUNTS: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid 0 0
/dev/sdb1 /media/alice/SanDisk vfat rw 0 0
/dev/sdc1 /mnt/backup ext4 rw 0 0
/dev/mmcblk0p1 /mnt/sd\\040card exfat rw 0 0
tmpfs /run/media tmpfs rw 0 0
";

    fn fake_sys() -> tempfile::TempDir {
        let sys = tempfile::tempdir().unwrap();
        let block = sys.path().join("class/block");
        for (name, removable, size) in [
            ("sdb", Some("1"), None),
            ("sdb1", None, Some("125000000")),
            ("sdc", Some("0"), None),
            ("sdc1", None, Some("2000")),
            ("mmcblk0", Some("1"), None),
            ("mmcblk0p1", None, Some("1000")),
        ] {
            let dir = block.join(name);
            fs::create_dir_all(&dir).unwrap();
            if let Some(r) = removable {
                fs::write(dir.join("removable"), format!("{r}\n")).unwrap();
            }
            if let Some(s) = size {
                fs::write(dir.join("size"), format!("{s}\n")).unwrap();
            }
        }
        sys
    }

    #[test]
    fn parses_mount_lines() {
        let mounts = parse_mounts(MOUNTS);
        assert_eq!(mounts.len(), 6);
        assert_eq!(mounts[2].device, "/dev/sdb1");
        assert_eq!(mounts[2].mount_point, PathBuf::from("/media/alice/SanDisk"));
        assert_eq!(mounts[2].fs_type, "vfat");
    }

    #[test]
    fn decodes_escaped_whitespace() {
        let mounts = parse_mounts(MOUNTS);
        assert_eq!(mounts[4].mount_point, PathBuf::from("/mnt/sd card"));
    }

    #[test]
    fn disk_candidates_strip_partition_suffix() {
        assert_eq!(disk_candidates("sdb1"), vec!["sdb1", "sdb"]);
        assert_eq!(disk_candidates("mmcblk0p1"), vec!["mmcblk0p1", "mmcblk0"]);
        assert_eq!(disk_candidates("sdb"), vec!["sdb"]);
    }

    #[test]
    fn records_include_only_removable_or_automounted() {
        let sys = fake_sys();
        let records = device_records(MOUNTS, sys.path());

        assert_eq!(
            records,
            vec![
                format!("/media/alice/SanDisk|SanDisk|{}|0", 125_000_000u64 * 512),
                format!("/mnt/sd card|sd card|{}|0", 1000u64 * 512),
            ]
        );
    }

    #[test]
    fn unknown_size_reports_zero() {
        let sys = tempfile::tempdir().unwrap();
        let records = device_records("/dev/sdz1 /media/u/stick vfat rw 0 0\n", sys.path());
        assert_eq!(records, vec!["/media/u/stick|stick|0|0".to_string()]);
    }
}
