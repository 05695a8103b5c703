//! MBR partition entries, type codes and CHS addressing

use rawpod_core::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// MBR partition type code
///
/// Kept as the raw byte so that codes this tool has never heard of survive a
/// decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PartitionType(pub u8);

impl PartitionType {
    /// Empty/unused partition entry
    pub const EMPTY: Self = Self(0x00);
    /// FAT12, CHS
    pub const FAT12: Self = Self(0x01);
    /// FAT16 < 32MB, CHS
    pub const FAT16_SMALL: Self = Self(0x04);
    /// Extended partition, CHS
    pub const EXTENDED: Self = Self(0x05);
    /// FAT16 >= 32MB, CHS
    pub const FAT16: Self = Self(0x06);
    /// NTFS/exFAT/HPFS
    pub const NTFS: Self = Self(0x07);
    /// FAT32, CHS
    pub const FAT32_CHS: Self = Self(0x0B);
    /// FAT32, LBA
    pub const FAT32_LBA: Self = Self(0x0C);
    /// FAT16, LBA
    pub const FAT16_LBA: Self = Self(0x0E);
    /// Extended partition, LBA
    pub const EXTENDED_LBA: Self = Self(0x0F);
    /// Linux swap
    pub const LINUX_SWAP: Self = Self(0x82);
    /// Linux native (ext2/ext3/ext4)
    pub const LINUX: Self = Self(0x83);
    /// Apple HFS/HFS+
    pub const HFS: Self = Self(0xAF);
    /// GPT protective MBR
    pub const GPT_PROTECTIVE: Self = Self(0xEE);
    /// EFI system partition
    pub const EFI_SYSTEM: Self = Self(0xEF);

    /// Get the byte value of this partition type
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// True for the "unused slot" code
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Get a human-readable name for this partition type
    pub fn name(self) -> &'static str {
        match self.0 {
            0x00 => "Empty",
            0x01 => "FAT12",
            0x04 => "FAT16 (<32MB)",
            0x05 => "Extended",
            0x06 => "FAT16",
            0x07 => "NTFS/exFAT",
            0x0B => "FAT32 (CHS)",
            0x0C => "FAT32 (LBA)",
            0x0E => "FAT16 (LBA)",
            0x0F => "Extended (LBA)",
            0x82 => "Linux swap",
            0x83 => "Linux",
            0xAF => "HFS/HFS+",
            0xEE => "GPT Protective",
            0xEF => "EFI System",
            _ => "Unknown",
        }
    }
}

impl From<u8> for PartitionType {
    fn from(b: u8) -> Self {
        Self(b)
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} {}", self.0, self.name())
    }
}

impl FromStr for PartitionType {
    type Err = Error;

    /// Accepts `0x`-prefixed hex, plain decimal, or one of `linux`, `swap`, `fat32`, `hfs`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.to_ascii_lowercase().as_str() {
            "linux" => return Ok(Self::LINUX),
            "swap" => return Ok(Self::LINUX_SWAP),
            "fat32" => return Ok(Self::FAT32_CHS),
            "hfs" => return Ok(Self::HFS),
            lower => match lower.strip_prefix("0x") {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => lower.parse::<u8>(),
            },
        };

        parsed
            .map(Self)
            .map_err(|_| Error::custom(format!("Invalid partition type: {}", s)))
    }
}

/// CHS (Cylinder-Head-Sector) address
///
/// Traditional disk addressing using physical geometry.
/// Maximum values: 1023 cylinders, 255 heads, 63 sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CHSAddress {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

impl CHSAddress {
    /// Parse CHS address from 3 bytes
    ///
    /// Format:
    /// - Byte 0: Head (0-255)
    /// - Byte 1: Sector (bits 0-5) + Cylinder high (bits 6-7)
    /// - Byte 2: Cylinder low (bits 0-7)
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        let head = bytes[0];
        let sector = bytes[1] & 0x3F;
        let cyl_high = ((bytes[1] & 0xC0) as u16) << 2;
        let cylinder = cyl_high | bytes[2] as u16;

        Self {
            cylinder,
            head,
            sector,
        }
    }
}

impl fmt::Display for CHSAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C:{}/H:{}/S:{}", self.cylinder, self.head, self.sector)
    }
}

/// One 16-byte slot of the MBR partition table
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0x00    1     Status (0x80 = active)
/// 0x01    3     CHS of first sector
/// 0x04    1     Partition type
/// 0x05    3     CHS of last sector
/// 0x08    4     LBA of first sector (LE)
/// 0x0C    4     Number of sectors (LE)
/// ```
///
/// The CHS fields are never interpreted when editing the table; they are copied
/// through as they were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    pub status: u8,
    #[serde(skip)]
    pub chs_start: [u8; 3],
    pub partition_type: PartitionType,
    #[serde(skip)]
    pub chs_end: [u8; 3],
    pub start_sector: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    /// Size of an entry on disk
    pub const SIZE: usize = 16;

    /// Status byte of the active (bootable) partition
    pub const ACTIVE: u8 = 0x80;

    /// An all-zero, unused entry
    pub const EMPTY: Self = Self {
        status: 0,
        chs_start: [0; 3],
        partition_type: PartitionType::EMPTY,
        chs_end: [0; 3],
        start_sector: 0,
        sector_count: 0,
    };

    /// Create an entry with blank CHS fields
    pub fn new(partition_type: PartitionType, start_sector: u32, sector_count: u32) -> Self {
        Self {
            partition_type,
            start_sector,
            sector_count,
            ..Self::EMPTY
        }
    }

    /// Slice an entry out of its 16 on-disk bytes
    pub fn from_bytes(entry: &[u8; Self::SIZE]) -> Self {
        Self {
            status: entry[0],
            chs_start: [entry[1], entry[2], entry[3]],
            partition_type: PartitionType(entry[4]),
            chs_end: [entry[5], entry[6], entry[7]],
            start_sector: u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]),
            sector_count: u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]),
        }
    }

    /// Serialize to the 16 on-disk bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut entry = [0u8; Self::SIZE];
        entry[0] = self.status;
        entry[1..4].copy_from_slice(&self.chs_start);
        entry[4] = self.partition_type.0;
        entry[5..8].copy_from_slice(&self.chs_end);
        entry[8..12].copy_from_slice(&self.start_sector.to_le_bytes());
        entry[12..16].copy_from_slice(&self.sector_count.to_le_bytes());
        entry
    }

    pub fn is_bootable(&self) -> bool {
        self.status == Self::ACTIVE
    }

    pub fn set_bootable(&mut self, bootable: bool) {
        self.status = if bootable { Self::ACTIVE } else { 0 };
    }

    /// True if the slot holds no partition
    pub fn is_empty(&self) -> bool {
        self.partition_type.is_empty()
    }

    /// First sector past the end of this partition
    pub fn end_sector(&self) -> u64 {
        self.start_sector as u64 + self.sector_count as u64
    }

    /// Decoded legacy address of the first sector
    pub fn chs_first(&self) -> CHSAddress {
        CHSAddress::from_bytes(self.chs_start)
    }

    /// Decoded legacy address of the last sector
    pub fn chs_last(&self) -> CHSAddress {
        CHSAddress::from_bytes(self.chs_end)
    }
}

impl Default for PartitionEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<20} start {:>10}  length {:>10} ({})",
            if self.is_bootable() { "*" } else { " " },
            self.partition_type.to_string(),
            self.start_sector,
            self.sector_count,
            rawpod_core::format_sectors(self.sector_count as u64)
        )
    }
}
