//! iPod partition layout detection
//!
//! iPods formatted by iTunes for Windows carry the ASCII marker `Apple iPod` inside
//! the MBR bootstrap area, an empty-typed firmware partition in slot 1 and the FAT32
//! music partition in slot 2. A Linux partition in slot 3 marks a disk that has
//! already been set up for an alternative firmware.

use crate::mbr::{types::PartitionType, MbrImage, PartitionTable};
use rawpod_core::Result;
use serde::Serialize;
use std::fmt;

/// Marker iTunes writes at offset 0x1AE of the MBR
pub const IPOD_MARKER: &[u8; 10] = b"Apple iPod";

/// The firmware partition must start below this sector
pub const FIRMWARE_START_LIMIT: u32 = 1024;

/// The firmware partition must be shorter than this many sectors
pub const FIRMWARE_LENGTH_LIMIT: u32 = 200 << 11;

/// A Linux partition starting below this sector was carved from the firmware area
pub const SMALL_LINUX_START_LIMIT: u32 = 64 << 11;

/// Known iPod partition layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IpodLayout {
    /// Not an iPod, or an iPod layout this tool cannot read (Macintosh-formatted
    /// iPods use an Apple partition map and always land here)
    NotRecognized,
    /// Windows-formatted iPod: firmware + FAT32
    WinPod,
    /// Windows-formatted iPod with a Linux partition outside the firmware area
    LinPodLarge,
    /// Windows-formatted iPod with a small Linux partition between the firmware
    /// partition and the FAT32 partition
    LinPodSmall,
}

impl IpodLayout {
    /// Classify a decoded table together with the image it came from
    ///
    /// Rules are checked in order and the first match wins.
    pub fn classify(table: &PartitionTable, image: &MbrImage) -> Self {
        let firmware = &table[0];
        let music = &table[1];
        let linux = &table[2];

        let windows_layout = image.vendor_marker() == IPOD_MARKER
            && firmware.partition_type == PartitionType::EMPTY
            && music.partition_type == PartitionType::FAT32_CHS
            && firmware.start_sector < FIRMWARE_START_LIMIT
            && firmware.sector_count < FIRMWARE_LENGTH_LIMIT;

        if !windows_layout {
            // TODO: recognize Macintosh-formatted iPods once Apple partition maps are read
            return Self::NotRecognized;
        }

        if linux.partition_type != PartitionType::LINUX {
            return Self::WinPod;
        }

        if linux.start_sector > firmware.start_sector
            && linux.start_sector < music.start_sector
            && linux.start_sector < SMALL_LINUX_START_LIMIT
        {
            Self::LinPodSmall
        } else {
            Self::LinPodLarge
        }
    }

    /// Decode and classify an MBR image in one step
    pub fn detect(image: &MbrImage) -> Result<(PartitionTable, Self)> {
        let table = PartitionTable::decode(image)?;
        let layout = Self::classify(&table, image);
        Ok((table, layout))
    }

    pub fn is_ipod(self) -> bool {
        self != Self::NotRecognized
    }

    /// Get a human-readable name for this layout
    pub fn name(self) -> &'static str {
        match self {
            Self::NotRecognized => "not an iPod",
            Self::WinPod => "WinPod",
            Self::LinPodLarge => "LinPod (large)",
            Self::LinPodSmall => "LinPod (small)",
        }
    }
}

impl fmt::Display for IpodLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbr::types::PartitionEntry;

    fn winpod_image() -> MbrImage {
        let mut image = MbrImage::blank();
        image.as_bytes_mut()[0x1AE..0x1B8].copy_from_slice(IPOD_MARKER);

        let mut table = PartitionTable::default();
        table[0] = PartitionEntry::new(PartitionType::EMPTY, 0, 0);
        table[1] = PartitionEntry::new(PartitionType::FAT32_CHS, 63, 1_000_000);
        table.encode(&mut image);
        image
    }

    /// A WinPod whose music partition starts far enough in to leave room for a
    /// Linux partition on either side of the 64 << 11 bound
    fn with_linux(start: u32) -> MbrImage {
        let mut image = winpod_image();
        let mut table = PartitionTable::decode(&image).unwrap();
        table[1].start_sector = 300_000;
        table[2] = PartitionEntry::new(PartitionType::LINUX, start, 2000);
        table.encode(&mut image);
        image
    }

    fn detect(image: &MbrImage) -> IpodLayout {
        IpodLayout::detect(image).unwrap().1
    }

    #[test]
    fn test_winpod() {
        assert_eq!(detect(&winpod_image()), IpodLayout::WinPod);
        assert!(IpodLayout::WinPod.is_ipod());
    }

    #[test]
    fn test_small_linpod() {
        assert_eq!(detect(&with_linux(500)), IpodLayout::LinPodSmall);
    }

    #[test]
    fn test_large_linpod() {
        // Still between slots 1 and 2, but past the 64 << 11 bound
        assert_eq!(detect(&with_linux((64 << 11) + 1)), IpodLayout::LinPodLarge);
        assert_eq!(detect(&with_linux(64 << 11)), IpodLayout::LinPodLarge);
        // Not strictly after the firmware partition
        assert_eq!(detect(&with_linux(0)), IpodLayout::LinPodLarge);
        // After the music partition
        assert_eq!(detect(&with_linux(2_000_000)), IpodLayout::LinPodLarge);
    }

    #[test]
    fn test_linux_after_music_start() {
        // Music partition at 63 leaves no room before it, so sector 500 is "large"
        let mut image = winpod_image();
        let mut table = PartitionTable::decode(&image).unwrap();
        table[2] = PartitionEntry::new(PartitionType::LINUX, 500, 2000);
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::LinPodLarge);
    }

    #[test]
    fn test_missing_marker() {
        let mut image = winpod_image();
        image.as_bytes_mut()[0x1AE] = b'a';
        assert_eq!(detect(&image), IpodLayout::NotRecognized);
        assert!(!IpodLayout::NotRecognized.is_ipod());

        let mut image = with_linux(500);
        image.as_bytes_mut()[0x1B7] = 0;
        assert_eq!(detect(&image), IpodLayout::NotRecognized);
    }

    #[test]
    fn test_wrong_slot_types() {
        let mut image = winpod_image();
        let mut table = PartitionTable::decode(&image).unwrap();
        table[1].partition_type = PartitionType::FAT32_LBA;
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::NotRecognized);

        let mut image = winpod_image();
        let mut table = PartitionTable::decode(&image).unwrap();
        table[0].partition_type = PartitionType::HFS;
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::NotRecognized);
    }

    #[test]
    fn test_firmware_bounds() {
        let mut image = winpod_image();
        let mut table = PartitionTable::decode(&image).unwrap();
        table[0].start_sector = 1023;
        table[0].sector_count = FIRMWARE_LENGTH_LIMIT - 1;
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::WinPod);

        table[0].start_sector = 1024;
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::NotRecognized);

        table[0].start_sector = 63;
        table[0].sector_count = 409_600;
        table.encode(&mut image);
        assert_eq!(detect(&image), IpodLayout::NotRecognized);
    }

    #[test]
    fn test_detect_invalid_signature() {
        let mut image = winpod_image();
        image.as_bytes_mut()[511] = 0;
        assert!(IpodLayout::detect(&image).is_err());
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(IpodLayout::LinPodSmall.to_string(), "LinPod (small)");
        assert_eq!(IpodLayout::NotRecognized.to_string(), "not an iPod");
    }
}
