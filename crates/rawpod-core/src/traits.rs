//! The raw device port
//!
//! Everything above this layer talks to storage only through these two traits, so a
//! real disk, a plain image file, or an in-memory buffer are interchangeable.

use crate::error::Result;
use crate::types::{DeviceId, SECTOR_SIZE};

/// Synchronous byte-addressed access to one opened device
pub trait RawDevice: Send {
    /// Get a human-readable identifier for this device
    fn identify(&self) -> &str;

    /// Fill `buf` from `offset`; a short read is an error
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `buf` at `offset`
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Push buffered writes down to the device
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Total addressable 512-byte sectors
    fn size_in_sectors(&mut self) -> Result<u64>;

    /// True for real block devices, whose partition table the OS caches
    fn is_block_device(&self) -> bool;

    /// Ask the OS to re-read the partition table of this device
    fn reread_partition_table(&mut self) -> Result<()>;

    /// Read whole sectors starting at `lba`
    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(lba * SECTOR_SIZE as u64, buf)
    }

    /// Write whole sectors starting at `lba`
    fn write_sectors(&mut self, lba: u64, buf: &[u8]) -> Result<()> {
        self.write_at(lba * SECTOR_SIZE as u64, buf)
    }
}

/// Opens devices by number
pub trait DeviceProvider {
    /// Open the device with the given number for reading and writing
    fn open(&self, id: DeviceId) -> Result<Box<dyn RawDevice>>;

    /// True when every device number is redirected to a stand-in backing store
    fn is_substituted(&self) -> bool {
        false
    }
}
