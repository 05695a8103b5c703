//! Device facade - whole-MBR reads and writes on numbered devices
//!
//! Every call opens the device afresh and nothing is cached between calls, so a
//! read always reflects what is on disk right now.

use crate::config::DeviceConfig;
use crate::local::LocalDevices;
use rawpod_core::{DeviceId, DeviceProvider, Error, Result};
use rawpod_pipeline::PartitionWindow;
use rawpod_zones::{slot_index, MbrImage, PartitionTable, PartitionType};
use serde::Serialize;

/// Parameters of a shrink-and-add edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRequest {
    /// 1-based partition to shrink
    pub source: u32,
    /// 1-based empty slot to fill
    pub dest: u32,
    /// Type byte for the new partition
    pub partition_type: PartitionType,
    /// Requested size of the new partition in sectors, before cylinder rounding
    pub sectors: u32,
    /// Compute the new table without writing it
    pub dry_run: bool,
}

/// Tables before and after a split
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitOutcome {
    pub before: PartitionTable,
    pub after: PartitionTable,
    /// False for a dry run
    pub written: bool,
}

/// MBR-level access to numbered devices
///
/// # Example
///
/// ```rust,no_run
/// use rawpod_core::DeviceId;
/// use rawpod_devices::{DeviceConfig, DeviceFacade};
///
/// let facade = DeviceFacade::new(DeviceConfig::default().with_override("ipod.img"));
/// let (_, table) = facade.read_table(DeviceId::new(0)).unwrap();
/// print!("{}", table);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceFacade<P = LocalDevices> {
    provider: P,
}

impl DeviceFacade<LocalDevices> {
    /// Facade over local disks, or over the override image if `config` names one
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_provider(LocalDevices::new(config))
    }
}

impl<P: DeviceProvider> DeviceFacade<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// True when device numbers are redirected to a stand-in
    pub fn is_substituted(&self) -> bool {
        self.provider.is_substituted()
    }

    /// Read sector 0 of a device
    ///
    /// # Errors
    ///
    /// Any error from opening or reading the device, including a short read, is
    /// returned as is.
    pub fn read_mbr(&self, device: DeviceId) -> Result<MbrImage> {
        let mut dev = self.provider.open(device)?;
        let mut sector = [0u8; MbrImage::SIZE];
        dev.read_sectors(0, &mut sector)?;
        tracing::debug!(device = %device, source = dev.identify(), "read MBR");
        Ok(MbrImage::new(sector))
    }

    /// Replace sector 0 of a device, then have the OS pick up the new table
    ///
    /// The re-read is skipped for stand-in backing stores.
    pub fn write_mbr(&self, device: DeviceId, image: &MbrImage) -> Result<()> {
        let mut dev = self.provider.open(device)?;
        dev.write_sectors(0, image.as_bytes())?;
        dev.flush()?;

        if dev.is_block_device() && !self.provider.is_substituted() {
            dev.reread_partition_table()?;
        } else {
            tracing::debug!(device = %device, "stand-in device, not re-reading partition table");
        }

        tracing::info!(device = %device, path = dev.identify(), "wrote MBR");
        Ok(())
    }

    /// Total number of 512-byte sectors on a device
    pub fn device_size_sectors(&self, device: DeviceId) -> Result<u64> {
        self.provider.open(device)?.size_in_sectors()
    }

    /// Read sector 0 and decode its partition table
    pub fn read_table(&self, device: DeviceId) -> Result<(MbrImage, PartitionTable)> {
        let image = self.read_mbr(device)?;
        let table = PartitionTable::decode(&image)?;
        Ok((image, table))
    }

    /// Open the 1-based `partition` of `device` as a device of its own
    pub fn open_partition(&self, device: DeviceId, partition: u32) -> Result<PartitionWindow> {
        let index = slot_index(partition)?;
        let (_, table) = self.read_table(device)?;
        let entry = table[index];
        if entry.is_empty() {
            return Err(Error::custom(format!(
                "partition {} of {} is empty",
                partition, device
            )));
        }

        let dev = self.provider.open(device)?;
        PartitionWindow::new(dev, entry.start_sector as u64, entry.sector_count as u64)
    }

    /// Shrink one partition and add a new one behind it, in a single
    /// read-modify-write of sector 0
    ///
    /// Nothing is written if the edit is rejected or `request.dry_run` is set.
    pub fn split_partition(&self, device: DeviceId, request: &SplitRequest) -> Result<SplitOutcome> {
        let (mut image, before) = self.read_table(device)?;

        let mut after = before.clone();
        after.shrink_and_add(
            request.source,
            request.dest,
            request.partition_type,
            request.sectors,
        )?;

        if request.dry_run {
            tracing::info!(device = %device, "dry run, partition table not written");
            return Ok(SplitOutcome {
                before,
                after,
                written: false,
            });
        }

        after.encode(&mut image);
        self.write_mbr(device, &image)?;

        Ok(SplitOutcome {
            before,
            after,
            written: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawpod_core::{MemoryDisk, MemoryProvider, RawDevice};
    use rawpod_zones::PartitionEntry;

    const DISK: DeviceId = DeviceId::new(1);

    /// A disk of `disk_sectors` whose table claims a FAT32 partition 2 of
    /// `fat_sectors` at sector 63
    fn sample_disk(disk_sectors: u64, fat_sectors: u32) -> MemoryDisk {
        let mut image = MbrImage::blank();
        image.as_bytes_mut()[..4].copy_from_slice(&[0xEB, 0x3C, 0x90, 0x00]);
        let mut table = PartitionTable::default();
        table[1] = PartitionEntry::new(PartitionType::FAT32_CHS, 63, fat_sectors);
        table.encode(&mut image);

        let disk = MemoryDisk::new(disk_sectors);
        disk.open("setup").write_at(0, image.as_bytes()).unwrap();
        disk
    }

    fn facade_for(disk: &MemoryDisk) -> DeviceFacade<MemoryProvider> {
        DeviceFacade::with_provider(MemoryProvider::new().with_disk(DISK, disk.clone()))
    }

    #[test]
    fn test_read_mbr() {
        let disk = sample_disk(1000, 937);
        let image = facade_for(&disk).read_mbr(DISK).unwrap();

        assert!(image.has_valid_signature());
        assert_eq!(image.as_bytes()[..], disk.contents()[..512]);
    }

    #[test]
    fn test_read_errors_pass_through() {
        let disk = sample_disk(1000, 937);
        let facade = facade_for(&disk);
        disk.fail_with(Some(5));

        let err = facade.read_mbr(DISK).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(5));

        let err = facade.read_mbr(DeviceId::new(0)).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_short_device() {
        let disk = MemoryDisk::from_bytes(vec![0u8; 100]);
        let err = facade_for(&disk).read_mbr(DISK).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_write_mbr_rescans_block_device() {
        let disk = sample_disk(1000, 937);
        let facade = facade_for(&disk);

        let mut image = MbrImage::blank();
        image.as_bytes_mut()[0] = 0x33;
        facade.write_mbr(DISK, &image).unwrap();

        assert_eq!(disk.contents()[..512], image.as_bytes()[..]);
        assert_eq!(disk.rescans(), 1);
    }

    #[test]
    fn test_write_mbr_skips_rescan_on_stand_in() {
        let image_disk = sample_disk(1000, 937).as_image();
        facade_for(&image_disk)
            .write_mbr(DISK, &MbrImage::blank())
            .unwrap();
        assert_eq!(image_disk.rescans(), 0);

        let disk = sample_disk(1000, 937);
        let facade = DeviceFacade::with_provider(
            MemoryProvider::new()
                .with_disk(DISK, disk.clone())
                .substituted(true),
        );
        facade.write_mbr(DISK, &MbrImage::blank()).unwrap();
        assert_eq!(disk.rescans(), 0);
    }

    #[test]
    fn test_write_error_pass_through() {
        let disk = sample_disk(1000, 937);
        let facade = facade_for(&disk);
        disk.fail_with(Some(28));

        let err = facade.write_mbr(DISK, &MbrImage::blank()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(28));
        assert_eq!(disk.rescans(), 0);
    }

    #[test]
    fn test_device_size() {
        let disk = sample_disk(1000, 937);
        assert_eq!(facade_for(&disk).device_size_sectors(DISK).unwrap(), 1000);
    }

    #[test]
    fn test_read_table_invalid() {
        let disk = MemoryDisk::new(10);
        let err = facade_for(&disk).read_table(DISK).unwrap_err();
        assert!(matches!(err, Error::InvalidMbr(_)));
    }

    #[test]
    fn test_split_partition_writes() {
        let disk = sample_disk(64, 1_000_000);
        let facade = facade_for(&disk);
        let request = SplitRequest {
            source: 2,
            dest: 3,
            partition_type: PartitionType::LINUX,
            sectors: 100_000,
            dry_run: false,
        };

        let outcome = facade.split_partition(DISK, &request).unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.after[2].sector_count, 96_390);
        assert_eq!(disk.rescans(), 1);

        let (image, table) = facade.read_table(DISK).unwrap();
        assert_eq!(table, outcome.after);
        assert_eq!(image.as_bytes()[..4], [0xEBu8, 0x3C, 0x90, 0x00]);
    }

    #[test]
    fn test_split_partition_dry_run() {
        let disk = sample_disk(64, 1_000_000);
        let before = disk.contents();
        let request = SplitRequest {
            source: 2,
            dest: 3,
            partition_type: PartitionType::LINUX,
            sectors: 100_000,
            dry_run: true,
        };

        let outcome = facade_for(&disk).split_partition(DISK, &request).unwrap();
        assert!(!outcome.written);
        assert_ne!(outcome.before, outcome.after);
        assert_eq!(disk.contents(), before);
        assert_eq!(disk.rescans(), 0);
    }

    #[test]
    fn test_split_rejected_writes_nothing() {
        let disk = sample_disk(1000, 937);
        let before = disk.contents();
        let request = SplitRequest {
            source: 2,
            dest: 2,
            partition_type: PartitionType::LINUX,
            sectors: 10,
            dry_run: false,
        };

        let err = facade_for(&disk).split_partition(DISK, &request).unwrap_err();
        assert!(matches!(
            err,
            Error::SlotOccupied {
                slot: 2,
                partition_type: 0x0B
            }
        ));
        assert_eq!(disk.contents(), before);
    }

    #[test]
    fn test_open_partition() {
        let disk = sample_disk(1000, 937);
        let facade = facade_for(&disk);

        let mut window = facade.open_partition(DISK, 2).unwrap();
        assert_eq!(window.start_sector(), 63);
        assert_eq!(window.sector_count(), 937);
        window.write_at(0, b"FAT").unwrap();
        assert_eq!(&disk.contents()[63 * 512..63 * 512 + 3], b"FAT");

        assert!(matches!(
            facade.open_partition(DISK, 0),
            Err(Error::InvalidSlot(0))
        ));
        assert!(facade.open_partition(DISK, 1).is_err());
    }
}
