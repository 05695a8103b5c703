//! Core types for rawpod

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Size of a logical sector in bytes; the MBR and every LBA field use this unit
pub const SECTOR_SIZE: usize = 512;

/// Identity of a whole disk, numbered the way the platform enumerates disks
///
/// Disk `N` is `/dev/sd{a+N}` on Linux and `\\.\PhysicalDriveN` on Windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(pub u8);

impl DeviceId {
    /// Create a device id from its number
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// Get the device number
    pub fn number(self) -> u8 {
        self.0
    }

    /// Map this device to the platform's raw disk path
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDevice`] if the number has no platform name.
    #[cfg(target_os = "linux")]
    pub fn platform_path(self) -> Result<PathBuf> {
        if self.0 >= 26 {
            return Err(Error::invalid_device(format!(
                "disk {} has no /dev/sdX name",
                self.0
            )));
        }
        Ok(PathBuf::from(format!("/dev/sd{}", (b'a' + self.0) as char)))
    }

    #[cfg(windows)]
    pub fn platform_path(self) -> Result<PathBuf> {
        Ok(PathBuf::from(format!(r"\\.\PhysicalDrive{}", self.0)))
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    pub fn platform_path(self) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/dev/disk{}", self.0)))
    }
}

impl From<u8> for DeviceId {
    fn from(number: u8) -> Self {
        Self(number)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disk {}", self.0)
    }
}

/// Format a sector count as a human-readable size
pub fn format_sectors(sectors: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = sectors as f64 * SECTOR_SIZE as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sectors() {
        assert_eq!(format_sectors(0), "0 B");
        assert_eq!(format_sectors(1), "512 B");
        assert_eq!(format_sectors(2), "1.00 KB");
        assert_eq!(format_sectors(2048), "1.00 MB");
        assert_eq!(format_sectors(3 * 1024), "1.50 MB");
    }

    #[test]
    fn test_device_id_display() {
        assert_eq!(DeviceId::new(2).to_string(), "disk 2");
        assert_eq!(DeviceId::from(5).number(), 5);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_platform_path() {
        assert_eq!(
            DeviceId::new(0).platform_path().unwrap(),
            PathBuf::from("/dev/sda")
        );
        assert_eq!(
            DeviceId::new(3).platform_path().unwrap(),
            PathBuf::from("/dev/sdd")
        );
        assert!(matches!(
            DeviceId::new(26).platform_path(),
            Err(Error::InvalidDevice(_))
        ));
    }
}
