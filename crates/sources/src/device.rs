//! Typed view of the engine's delimited device records.

use serde::{Deserialize, Serialize};

use d2onboard_engine::usb::RECORD_SEPARATOR;

/// A removable storage device offered as a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbDevice {
    pub path: String,
    pub label: String,
    /// Bytes; 0 when unknown.
    pub total_space: u64,
    /// Bytes; 0 when unknown.
    pub free_space: u64,
}

impl UsbDevice {
    /// Parses one `path|label|total|free` record.
    ///
    /// Only the path and label are required; missing or malformed sizes
    /// become 0. Records without a label or with an empty path are rejected.
    pub fn parse(record: &str) -> Option<Self> {
        let mut fields = record.split(RECORD_SEPARATOR);
        let path = fields.next()?.trim();
        let label = fields.next()?.trim();
        if path.is_empty() {
            return None;
        }

        let mut size = || {
            fields
                .next()
                .and_then(|f| f.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };
        let total_space = size();
        let free_space = size();

        Some(Self {
            path: path.to_string(),
            label: label.to_string(),
            total_space,
            free_space,
        })
    }

    /// Label for display, falling back to the path.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.path
        } else {
            &self.label
        }
    }
}

/// Parses every well-formed record, logging and skipping the rest.
pub fn parse_device_records<S: AsRef<str>>(records: &[S]) -> Vec<UsbDevice> {
    records
        .iter()
        .filter_map(|record| {
            let record = record.as_ref();
            let device = UsbDevice::parse(record);
            if device.is_none() {
                tracing::debug!(record, "skipping malformed device record");
            }
            device
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let device = UsbDevice::parse("/mnt/usb1|SanDisk|64000000000|32000000000").unwrap();
        assert_eq!(
            device,
            UsbDevice {
                path: "/mnt/usb1".into(),
                label: "SanDisk".into(),
                total_space: 64_000_000_000,
                free_space: 32_000_000_000,
            }
        );
    }

    #[test]
    fn tolerates_missing_sizes() {
        let device = UsbDevice::parse("/mnt/usb2|Kingston").unwrap();
        assert_eq!(device.path, "/mnt/usb2");
        assert_eq!(device.label, "Kingston");
        assert_eq!(device.total_space, 0);
        assert_eq!(device.free_space, 0);
    }

    #[test]
    fn tolerates_malformed_sizes() {
        let device = UsbDevice::parse("/mnt/usb3|Stick|lots|").unwrap();
        assert_eq!(device.total_space, 0);
        assert_eq!(device.free_space, 0);
    }

    #[test]
    fn rejects_short_records() {
        assert!(UsbDevice::parse("/mnt/usb1").is_none());
        assert!(UsbDevice::parse("").is_none());
        assert!(UsbDevice::parse("|label|1|2").is_none());
    }

    #[test]
    fn parse_records_skips_bad_entries() {
        let devices = parse_device_records(&["/mnt/a|A|1|1", "garbage", "/mnt/b|"]);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].display_name(), "A");
        assert_eq!(devices[1].display_name(), "/mnt/b");
    }

    #[test]
    fn device_serialization() {
        let device = UsbDevice::parse("/mnt/usb1|SanDisk|10|5").unwrap();
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"totalSpace\":10"));
        assert!(json.contains("\"freeSpace\":5"));
    }
}
