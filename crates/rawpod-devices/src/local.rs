//! Local disks and image files
//!
//! [`LocalRawDevice`] reads and writes a disk node or a plain image file with
//! ordinary file I/O. [`LocalDevices`] decides which one a device number means: the
//! platform disk, or the override image when one is configured.

use crate::config::DeviceConfig;
use rawpod_core::{DeviceId, DeviceProvider, RawDevice, Result, SECTOR_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A disk or disk image opened for reading and writing
///
/// # Example
///
/// ```rust,no_run
/// use rawpod_core::RawDevice;
/// use rawpod_devices::LocalRawDevice;
/// use std::path::Path;
///
/// let mut image = LocalRawDevice::open_image(Path::new("ipod.img")).unwrap();
/// let sectors = image.size_in_sectors().unwrap();
/// println!("{}: {} sectors", image.identify(), sectors);
/// ```
#[derive(Debug)]
pub struct LocalRawDevice {
    file: File,
    name: String,
    block_device: bool,
}

impl LocalRawDevice {
    /// Open a disk node such as `/dev/sdb`
    ///
    /// # Errors
    ///
    /// Returns the OS error if the node cannot be opened read-write.
    pub fn open_disk(path: &Path) -> Result<Self> {
        Self::open(path, true)
    }

    /// Open a plain file standing in for a disk
    pub fn open_image(path: &Path) -> Result<Self> {
        Self::open(path, false)
    }

    fn open(path: &Path, block_device: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        tracing::debug!(path = %path.display(), block_device, "opened device");

        Ok(Self {
            file,
            name: path.display().to_string(),
            block_device,
        })
    }
}

impl RawDevice for LocalRawDevice {
    fn identify(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn size_in_sectors(&mut self) -> Result<u64> {
        let bytes = if self.block_device {
            disk_size_bytes(&mut self.file)?
        } else {
            self.file.metadata()?.len()
        };
        Ok(bytes / SECTOR_SIZE as u64)
    }

    fn is_block_device(&self) -> bool {
        self.block_device
    }

    fn reread_partition_table(&mut self) -> Result<()> {
        if !self.block_device {
            return Ok(());
        }
        tracing::debug!(device = %self.name, "asking kernel to re-read partition table");
        reread_partition_table(&self.file)?;
        Ok(())
    }
}

/// Block device nodes report a zero metadata length; seeking finds the real end
#[cfg(not(windows))]
fn disk_size_bytes(file: &mut File) -> std::io::Result<u64> {
    file.seek(SeekFrom::End(0))
}

// TODO: query IOCTL_DISK_GET_DRIVE_GEOMETRY; physical drive handles do not seek to their end
#[cfg(windows)]
fn disk_size_bytes(_file: &mut File) -> std::io::Result<u64> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "physical drive size is not available on Windows",
    ))
}

#[cfg(target_os = "linux")]
fn reread_partition_table(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    /// `_IO(0x12, 95)` from `<linux/fs.h>`
    const BLKRRPART: libc::c_ulong = 0x125F;

    // SAFETY: BLKRRPART takes no argument and the descriptor is owned by `file`
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), BLKRRPART as _) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Windows re-reads the layout of a physical drive on its own after sector 0 changes
#[cfg(not(target_os = "linux"))]
fn reread_partition_table(_file: &File) -> std::io::Result<()> {
    Ok(())
}

/// Maps device numbers to local disks, or to the override image
#[derive(Debug, Clone, Default)]
pub struct LocalDevices {
    config: DeviceConfig,
}

impl LocalDevices {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

impl DeviceProvider for LocalDevices {
    fn open(&self, id: DeviceId) -> Result<Box<dyn RawDevice>> {
        match &self.config.override_path {
            Some(path) => {
                tracing::debug!(device = %id, path = %path.display(), "using override image");
                Ok(Box::new(LocalRawDevice::open_image(path)?))
            }
            None => {
                let path = id.platform_path()?;
                Ok(Box::new(LocalRawDevice::open_disk(&path)?))
            }
        }
    }

    fn is_substituted(&self) -> bool {
        self.config.is_overridden()
    }
}
