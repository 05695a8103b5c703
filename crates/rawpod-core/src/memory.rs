//! In-memory devices
//!
//! A [`MemoryDisk`] is a shared byte buffer that behaves like a disk: handles opened
//! from it see each other's writes, and the disk counts partition-table re-reads so
//! callers can check that a write reached the OS. Failures can be injected with a
//! platform error code.

use crate::error::Result;
use crate::traits::{DeviceProvider, RawDevice};
use crate::types::{DeviceId, SECTOR_SIZE};
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct DiskState {
    data: Vec<u8>,
    block_device: bool,
    rescans: usize,
    failure: Option<i32>,
}

/// A disk held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    state: Arc<Mutex<DiskState>>,
}

impl MemoryDisk {
    /// A zero-filled disk of `sectors` sectors
    pub fn new(sectors: u64) -> Self {
        Self::from_bytes(vec![0u8; sectors as usize * SECTOR_SIZE])
    }

    /// A disk holding exactly `data`
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DiskState {
                data,
                block_device: true,
                ..Default::default()
            })),
        }
    }

    /// Present the disk as a plain image file rather than a block device
    pub fn as_image(self) -> Self {
        self.lock().block_device = false;
        self
    }

    /// Make every following access fail with `errno`, or clear the failure with `None`
    pub fn fail_with(&self, errno: Option<i32>) {
        self.lock().failure = errno;
    }

    /// Copy of the current disk contents
    pub fn contents(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    /// Number of partition-table re-reads requested so far
    pub fn rescans(&self) -> usize {
        self.lock().rescans
    }

    /// Open a handle onto this disk
    pub fn open(&self, name: impl Into<String>) -> MemoryDevice {
        MemoryDevice {
            disk: self.clone(),
            name: name.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DiskState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An open handle onto a [`MemoryDisk`]
#[derive(Debug)]
pub struct MemoryDevice {
    disk: MemoryDisk,
    name: String,
}

impl MemoryDevice {
    fn checked(&self) -> Result<MutexGuard<'_, DiskState>> {
        let state = self.disk.lock();
        if let Some(errno) = state.failure {
            return Err(io::Error::from_raw_os_error(errno).into());
        }
        Ok(state)
    }
}

fn span(offset: u64, len: usize, size: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

impl RawDevice for MemoryDevice {
    fn identify(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let state = self.checked()?;
        let range = span(offset, buf.len(), state.data.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of disk")
        })?;
        buf.copy_from_slice(&state.data[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut state = self.checked()?;
        let range = span(offset, buf.len(), state.data.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::WriteZero, "write past end of disk")
        })?;
        state.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn size_in_sectors(&mut self) -> Result<u64> {
        Ok(self.checked()?.data.len() as u64 / SECTOR_SIZE as u64)
    }

    fn is_block_device(&self) -> bool {
        self.disk.lock().block_device
    }

    fn reread_partition_table(&mut self) -> Result<()> {
        self.checked()?.rescans += 1;
        Ok(())
    }
}

/// Serves [`MemoryDisk`]s by device number
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    disks: BTreeMap<DeviceId, MemoryDisk>,
    substituted: bool,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `disk` as device `id`
    pub fn with_disk(mut self, id: DeviceId, disk: MemoryDisk) -> Self {
        self.disks.insert(id, disk);
        self
    }

    /// Report this provider as an override stand-in
    pub fn substituted(mut self, substituted: bool) -> Self {
        self.substituted = substituted;
        self
    }
}

impl DeviceProvider for MemoryProvider {
    fn open(&self, id: DeviceId) -> Result<Box<dyn RawDevice>> {
        let disk = self.disks.get(&id).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such device: {}", id))
        })?;
        Ok(Box::new(disk.open(format!("memory {}", id))))
    }

    fn is_substituted(&self) -> bool {
        self.substituted
    }
}
