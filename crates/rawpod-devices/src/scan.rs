//! Looking for an iPod among the local disks

use crate::facade::DeviceFacade;
use rawpod_core::{DeviceId, DeviceProvider, Error};
use rawpod_zones::{IpodLayout, PartitionTable};
use serde::{Serialize, Serializer};
use std::fmt;

/// What probing one device turned up
#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Sector 0 could not be read
    ReadFailed(#[serde(serialize_with = "error_message")] Error),
    /// Sector 0 has no MBR signature
    InvalidTable,
    /// A valid MBR, but no iPod layout
    NotIpod,
    Found(IpodLayout),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed(e) => write!(f, "cannot read MBR: {}", e),
            Self::InvalidTable => f.write_str("invalid partition table"),
            Self::NotIpod => f.write_str("not an iPod"),
            Self::Found(layout) => write!(f, "iPod ({})", layout),
        }
    }
}

fn error_message<S: Serializer>(error: &Error, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Result of probing one device
#[derive(Debug, Serialize)]
pub struct DeviceProbe {
    pub device: DeviceId,
    pub outcome: ProbeOutcome,
}

/// Every device probed, in order, and the iPod if one was found
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub probes: Vec<DeviceProbe>,
    pub found: Option<(DeviceId, IpodLayout)>,
}

/// Read and classify the MBR of a single device
pub fn probe_device<P: DeviceProvider>(facade: &DeviceFacade<P>, device: DeviceId) -> DeviceProbe {
    let outcome = match facade.read_mbr(device) {
        Err(e) => ProbeOutcome::ReadFailed(e),
        Ok(image) => match PartitionTable::decode(&image) {
            Err(_) => ProbeOutcome::InvalidTable,
            Ok(table) => match IpodLayout::classify(&table, &image) {
                IpodLayout::NotRecognized => ProbeOutcome::NotIpod,
                layout => ProbeOutcome::Found(layout),
            },
        },
    };

    DeviceProbe { device, outcome }
}

/// Probe devices `0..limit` and stop at the first iPod
///
/// A device that cannot be read is logged and skipped. With an override image
/// configured no disks are probed; device 0 (the image) is taken to be the iPod.
pub fn find_ipod<P: DeviceProvider>(facade: &DeviceFacade<P>, limit: u8) -> ScanReport {
    if facade.is_substituted() {
        tracing::info!("treating override image as an iPod");
        let device = DeviceId::new(0);
        let probe = probe_device(facade, device);
        let layout = match &probe.outcome {
            ProbeOutcome::Found(layout) => *layout,
            _ => IpodLayout::NotRecognized,
        };
        return ScanReport {
            probes: vec![probe],
            found: Some((device, layout)),
        };
    }

    let mut report = ScanReport::default();
    for n in 0..limit {
        let probe = probe_device(facade, DeviceId::new(n));
        match &probe.outcome {
            ProbeOutcome::ReadFailed(e) => {
                tracing::warn!(device = %probe.device, error = %e, "cannot read MBR")
            }
            ProbeOutcome::Found(layout) => {
                tracing::info!(device = %probe.device, %layout, "found iPod");
                report.found = Some((probe.device, *layout));
            }
            other => tracing::debug!(device = %probe.device, "{}", other),
        }

        report.probes.push(probe);
        if report.found.is_some() {
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawpod_core::{MemoryDisk, MemoryProvider, RawDevice};
    use rawpod_zones::{ipod::IPOD_MARKER, MbrImage, PartitionEntry, PartitionType};

    fn disk_with(image: &MbrImage) -> MemoryDisk {
        let disk = MemoryDisk::new(4);
        disk.open("setup").write_at(0, image.as_bytes()).unwrap();
        disk
    }

    fn winpod() -> MbrImage {
        let mut image = MbrImage::blank();
        image.as_bytes_mut()[0x1AE..0x1B8].copy_from_slice(IPOD_MARKER);
        let mut table = PartitionTable::default();
        table[1] = PartitionEntry::new(PartitionType::FAT32_CHS, 63, 1_000_000);
        table.encode(&mut image);
        image
    }

    #[test]
    fn test_scan_skips_failures() {
        let broken = MemoryDisk::new(4);
        broken.fail_with(Some(5));

        let provider = MemoryProvider::new()
            .with_disk(DeviceId::new(0), MemoryDisk::new(4))
            .with_disk(DeviceId::new(1), broken)
            .with_disk(DeviceId::new(2), disk_with(&MbrImage::blank()))
            .with_disk(DeviceId::new(3), disk_with(&winpod()))
            .with_disk(DeviceId::new(4), disk_with(&winpod()));
        let facade = DeviceFacade::with_provider(provider);

        let report = find_ipod(&facade, 8);
        assert_eq!(report.found, Some((DeviceId::new(3), IpodLayout::WinPod)));
        assert_eq!(report.probes.len(), 4);
        assert!(matches!(report.probes[0].outcome, ProbeOutcome::InvalidTable));
        assert!(matches!(report.probes[1].outcome, ProbeOutcome::ReadFailed(_)));
        assert!(matches!(report.probes[2].outcome, ProbeOutcome::NotIpod));
        assert_eq!(report.probes[3].outcome.to_string(), "iPod (WinPod)");
    }

    #[test]
    fn test_scan_nothing_found() {
        let facade = DeviceFacade::with_provider(MemoryProvider::new());
        let report = find_ipod(&facade, 3);

        assert!(report.found.is_none());
        assert_eq!(report.probes.len(), 3);
        assert!(report
            .probes
            .iter()
            .all(|p| matches!(p.outcome, ProbeOutcome::ReadFailed(_))));
    }

    #[test]
    fn test_scan_override_assumes_device_zero() {
        let provider = MemoryProvider::new()
            .with_disk(DeviceId::new(0), disk_with(&MbrImage::blank()))
            .substituted(true);
        let report = find_ipod(&DeviceFacade::with_provider(provider), 8);

        assert_eq!(
            report.found,
            Some((DeviceId::new(0), IpodLayout::NotRecognized))
        );
        assert_eq!(report.probes.len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let broken = MemoryDisk::new(4);
        broken.fail_with(Some(5));
        let provider = MemoryProvider::new()
            .with_disk(DeviceId::new(0), broken)
            .with_disk(DeviceId::new(1), disk_with(&MbrImage::blank()))
            .with_disk(DeviceId::new(2), disk_with(&winpod()));
        let report = find_ipod(&DeviceFacade::with_provider(provider), 8);

        let json = serde_json::to_value(&report).unwrap();
        let probes = json["probes"].as_array().unwrap();
        assert_eq!(probes.len(), 3);
        assert_eq!(probes[0]["device"], 0);
        assert_eq!(probes[0]["outcome"]["status"], "read_failed");
        assert!(probes[0]["outcome"]["detail"].as_str().unwrap().starts_with("Device I/O error"));
        assert_eq!(probes[1]["outcome"]["status"], "invalid_table");
        assert_eq!(probes[2]["outcome"]["status"], "found");
        assert_eq!(probes[2]["outcome"]["detail"], "WinPod");
        assert_eq!(json["found"], serde_json::json!([2, "WinPod"]));
    }
}
