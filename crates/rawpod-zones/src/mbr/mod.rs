//! MBR (Master Boot Record) image and partition table codec

pub mod types;

use rawpod_core::{Error, Result, SECTOR_SIZE};
use serde::Serialize;
use std::fmt;
use std::ops::{Index, IndexMut};
use types::PartitionEntry;

const MBR_SIZE: usize = SECTOR_SIZE;
const NUM_PARTITIONS: usize = 4;

/// Byte image of sector 0
///
/// # Structure
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0x000   430   Bootstrap code
/// 0x1AE   10    Vendor marker ("Apple iPod" on iPods)
/// 0x1B8   4     Disk signature
/// 0x1BE   16    Partition entry 1
/// 0x1CE   16    Partition entry 2
/// 0x1DE   16    Partition entry 3
/// 0x1EE   16    Partition entry 4
/// 0x1FE   2     Boot signature (0x55, 0xAA)
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct MbrImage {
    bytes: [u8; MBR_SIZE],
}

impl MbrImage {
    /// Size of the MBR in bytes (always one sector)
    pub const SIZE: usize = MBR_SIZE;

    /// Offset of the first partition entry
    pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;

    /// Size of the serialized partition table
    pub const PARTITION_TABLE_SIZE: usize =
        PartitionEntry::SIZE * PartitionTable::NUM_PARTITIONS;

    /// Offset of the vendor marker
    pub const VENDOR_MARKER_OFFSET: usize = 0x1AE;

    /// Length of the vendor marker
    pub const VENDOR_MARKER_LEN: usize = 10;

    /// Offset of the disk signature
    pub const DISK_SIGNATURE_OFFSET: usize = 0x1B8;

    /// Offset of the boot signature
    pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

    /// The boot signature bytes, in disk order
    pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

    /// Wrap a sector that was read from a device
    pub fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self { bytes }
    }

    /// A zeroed sector carrying only the boot signature
    pub fn blank() -> Self {
        let mut bytes = [0u8; Self::SIZE];
        bytes[Self::BOOT_SIGNATURE_OFFSET..].copy_from_slice(&Self::BOOT_SIGNATURE);
        Self { bytes }
    }

    /// Copy an image out of a byte slice
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMbr`] unless the slice is exactly 512 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; Self::SIZE] = bytes.try_into().map_err(|_| {
            Error::invalid_mbr(format!(
                "expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; Self::SIZE] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> [u8; Self::SIZE] {
        self.bytes
    }

    /// Get the boot signature as a little-endian word (0xAA55 when valid)
    pub fn boot_signature(&self) -> u16 {
        u16::from_le_bytes([
            self.bytes[Self::BOOT_SIGNATURE_OFFSET],
            self.bytes[Self::BOOT_SIGNATURE_OFFSET + 1],
        ])
    }

    pub fn has_valid_signature(&self) -> bool {
        self.bytes[Self::BOOT_SIGNATURE_OFFSET..] == Self::BOOT_SIGNATURE
    }

    /// The 10 vendor marker bytes at 0x1AE
    pub fn vendor_marker(&self) -> &[u8] {
        &self.bytes[Self::VENDOR_MARKER_OFFSET..Self::VENDOR_MARKER_OFFSET + Self::VENDOR_MARKER_LEN]
    }

    /// Get the disk signature
    pub fn disk_signature(&self) -> u32 {
        let o = Self::DISK_SIGNATURE_OFFSET;
        u32::from_le_bytes([
            self.bytes[o],
            self.bytes[o + 1],
            self.bytes[o + 2],
            self.bytes[o + 3],
        ])
    }

    fn partition_table_bytes(&self) -> &[u8] {
        &self.bytes[Self::PARTITION_TABLE_OFFSET..Self::BOOT_SIGNATURE_OFFSET]
    }
}

impl Default for MbrImage {
    fn default() -> Self {
        Self::blank()
    }
}

impl fmt::Debug for MbrImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MbrImage")
            .field("boot_signature", &format_args!("0x{:04X}", self.boot_signature()))
            .field("disk_signature", &format_args!("0x{:08X}", self.disk_signature()))
            .field("vendor_marker", &String::from_utf8_lossy(self.vendor_marker()))
            .finish_non_exhaustive()
    }
}

/// The four primary partition slots of an MBR
///
/// Decoding copies the table out of the image; edits stay local until the table is
/// encoded back. `clone()` gives an independent copy to experiment on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PartitionTable {
    entries: [PartitionEntry; NUM_PARTITIONS],
}

impl PartitionTable {
    /// Number of partition entries in MBR
    pub const NUM_PARTITIONS: usize = NUM_PARTITIONS;

    /// Decode the partition table of an MBR image
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMbr`] if the boot signature is not `0x55 0xAA`.
    pub fn decode(image: &MbrImage) -> Result<Self> {
        if !image.has_valid_signature() {
            return Err(Error::invalid_mbr(format!(
                "Invalid MBR boot signature: expected 0xAA55, got 0x{:04X}",
                image.boot_signature()
            )));
        }

        let raw = image.partition_table_bytes();
        let mut entries = [PartitionEntry::EMPTY; Self::NUM_PARTITIONS];
        for (entry, chunk) in entries.iter_mut().zip(raw.chunks_exact(PartitionEntry::SIZE)) {
            let chunk: &[u8; PartitionEntry::SIZE] = chunk
                .try_into()
                .map_err(|_| Error::invalid_mbr("truncated partition entry"))?;
            *entry = PartitionEntry::from_bytes(chunk);
        }

        Ok(Self { entries })
    }

    /// Write this table into bytes 446..510 of `image`, leaving the rest alone
    pub fn encode(&self, image: &mut MbrImage) {
        let start = MbrImage::PARTITION_TABLE_OFFSET;
        let end = start + MbrImage::PARTITION_TABLE_SIZE;
        image.as_bytes_mut()[start..end].copy_from_slice(&self.to_bytes());
    }

    /// The 64-byte on-disk form of the table
    pub fn to_bytes(&self) -> [u8; MbrImage::PARTITION_TABLE_SIZE] {
        let mut raw = [0u8; MbrImage::PARTITION_TABLE_SIZE];
        for (chunk, entry) in raw.chunks_exact_mut(PartitionEntry::SIZE).zip(&self.entries) {
            chunk.copy_from_slice(&entry.to_bytes());
        }
        raw
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionEntry> {
        self.entries.iter()
    }

    /// Look up a partition by its 1-based number
    pub fn entry(&self, slot: u32) -> Result<&PartitionEntry> {
        Ok(&self.entries[slot_index(slot)?])
    }
}

impl Index<usize> for PartitionTable {
    type Output = PartitionEntry;

    fn index(&self, index: usize) -> &PartitionEntry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PartitionTable {
    fn index_mut(&mut self, index: usize) -> &mut PartitionEntry {
        &mut self.entries[index]
    }
}

impl fmt::Display for PartitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f, "{}: {}", i + 1, entry)?;
        }
        Ok(())
    }
}

/// Convert a 1-based partition number to a slot index
///
/// Slot 0 wraps around and fails the same bound check as 5 and up.
pub fn slot_index(slot: u32) -> Result<usize> {
    let index = slot.wrapping_sub(1) as usize;
    if index >= PartitionTable::NUM_PARTITIONS {
        return Err(Error::InvalidSlot(slot));
    }
    Ok(index)
}
