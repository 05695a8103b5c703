//! Partition window - one partition of a device, addressed from its first byte

use rawpod_core::{Error, RawDevice, Result, SECTOR_SIZE};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A device handle limited to the sectors of one partition
///
/// Offsets are relative to the partition's first sector and every access is checked
/// against its length, so a filesystem driver handed this window cannot touch the
/// rest of the disk.
///
/// # Example
///
/// ```rust
/// use rawpod_core::{MemoryDisk, RawDevice};
/// use rawpod_pipeline::PartitionWindow;
///
/// let disk = MemoryDisk::new(100);
/// let mut window = PartitionWindow::new(Box::new(disk.open("disk")), 10, 20).unwrap();
/// window.write_at(0, b"hello").unwrap();
///
/// assert_eq!(&disk.contents()[10 * 512..10 * 512 + 5], b"hello");
/// assert_eq!(window.size_in_sectors().unwrap(), 20);
/// ```
pub struct PartitionWindow {
    inner: Box<dyn RawDevice>,
    name: String,
    start_sector: u64,
    sector_count: u64,
    position: u64,
}

impl PartitionWindow {
    /// Create a window over `sector_count` sectors starting at `start_sector`
    ///
    /// # Errors
    ///
    /// Returns an error if the partition does not fit inside the device.
    pub fn new(mut inner: Box<dyn RawDevice>, start_sector: u64, sector_count: u64) -> Result<Self> {
        let device_sectors = inner.size_in_sectors()?;
        let end = start_sector.checked_add(sector_count);
        if end.map_or(true, |end| end > device_sectors) {
            return Err(Error::custom(format!(
                "partition at sector {} with {} sectors runs past end of {} ({} sectors)",
                start_sector,
                sector_count,
                inner.identify(),
                device_sectors
            )));
        }

        let name = format!("{} @ sector {}", inner.identify(), start_sector);
        Ok(Self {
            inner,
            name,
            start_sector,
            sector_count,
            position: 0,
        })
    }

    /// Get the first sector of the partition on the device
    pub fn start_sector(&self) -> u64 {
        self.start_sector
    }

    /// Get the length of the partition in sectors
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Get the length of the partition in bytes
    pub fn length(&self) -> u64 {
        self.sector_count * SECTOR_SIZE as u64
    }

    /// Get the current stream position within the partition
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get the remaining bytes from current position to end
    pub fn remaining(&self) -> u64 {
        self.length().saturating_sub(self.position)
    }

    fn absolute(&self, offset: u64, len: usize) -> io::Result<u64> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.length()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "access beyond end of partition",
            ));
        }
        Ok(self.start_sector * SECTOR_SIZE as u64 + offset)
    }
}

impl RawDevice for PartitionWindow {
    fn identify(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let absolute = self.absolute(offset, buf.len())?;
        self.inner.read_at(absolute, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let absolute = self.absolute(offset, buf.len())?;
        self.inner.write_at(absolute, buf)
    }

    fn flush(&mut self) -> Result<()> {
        RawDevice::flush(&mut *self.inner)
    }

    fn size_in_sectors(&mut self) -> Result<u64> {
        Ok(self.sector_count)
    }

    fn is_block_device(&self) -> bool {
        false
    }

    /// A partition has no table of its own to re-read
    fn reread_partition_table(&mut self) -> Result<()> {
        Ok(())
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl Read for PartitionWindow {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = (buf.len() as u64).min(self.remaining()) as usize;
        if to_read == 0 {
            return Ok(0);
        }

        self.read_at(self.position, &mut buf[..to_read]).map_err(into_io)?;
        self.position += to_read as u64;
        Ok(to_read)
    }
}

impl Write for PartitionWindow {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let to_write = (buf.len() as u64).min(self.remaining()) as usize;
        if to_write == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write at end of partition",
            ));
        }

        self.write_at(self.position, &buf[..to_write]).map_err(into_io)?;
        self.position += to_write as u64;
        Ok(to_write)
    }

    fn flush(&mut self) -> io::Result<()> {
        RawDevice::flush(self).map_err(into_io)
    }
}

impl Seek for PartitionWindow {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.length().checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
        };

        match new_pos {
            Some(p) if p <= self.length() => {
                self.position = p;
                Ok(p)
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek beyond end of partition",
            )),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of partition",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawpod_core::MemoryDisk;

    fn patterned_disk() -> MemoryDisk {
        let data: Vec<u8> = (0..8 * SECTOR_SIZE).map(|i| (i / SECTOR_SIZE) as u8).collect();
        MemoryDisk::from_bytes(data)
    }

    fn window(disk: &MemoryDisk, start: u64, count: u64) -> PartitionWindow {
        PartitionWindow::new(Box::new(disk.open("test")), start, count).unwrap()
    }

    #[test]
    fn test_window_basic() {
        let disk = patterned_disk();
        let w = window(&disk, 2, 3);

        assert_eq!(w.start_sector(), 2);
        assert_eq!(w.sector_count(), 3);
        assert_eq!(w.length(), 3 * 512);
        assert_eq!(w.remaining(), 3 * 512);
        assert_eq!(w.identify(), "test @ sector 2");
    }

    #[test]
    fn test_window_must_fit_device() {
        let disk = patterned_disk();
        assert!(PartitionWindow::new(Box::new(disk.open("d")), 6, 2).is_ok());
        assert!(PartitionWindow::new(Box::new(disk.open("d")), 6, 3).is_err());
        assert!(PartitionWindow::new(Box::new(disk.open("d")), u64::MAX, 2).is_err());
    }

    #[test]
    fn test_read_is_relative() {
        let disk = patterned_disk();
        let mut w = window(&disk, 2, 3);

        let mut buf = [0u8; 4];
        w.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [2; 4]);

        w.read_sectors(2, &mut buf).unwrap();
        assert_eq!(buf, [4; 4]);
    }

    #[test]
    fn test_access_bounded() {
        let disk = patterned_disk();
        let mut w = window(&disk, 2, 3);

        let mut buf = [0u8; 8];
        assert!(w.read_at(3 * 512 - 4, &mut buf).is_err());
        assert!(w.write_at(3 * 512, &[1]).is_err());
        assert!(w.write_at(3 * 512 - 1, &[9]).is_ok());

        // Sector 5 belongs to the next partition and is untouched
        assert_eq!(disk.contents()[5 * 512], 5);
        assert_eq!(disk.contents()[5 * 512 - 1], 9);
    }

    #[test]
    fn test_stream_read_stops_at_end() {
        let disk = patterned_disk();
        let mut w = window(&disk, 1, 1);

        let mut buf = vec![0u8; 1000];
        let n = w.read(&mut buf).unwrap();
        assert_eq!(n, 512);
        assert!(buf[..n].iter().all(|&b| b == 1));
        assert_eq!(w.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_stream_write_and_seek() {
        let disk = patterned_disk();
        let mut w = window(&disk, 3, 1);

        w.seek(SeekFrom::End(-2)).unwrap();
        assert_eq!(w.write(b"xyz").unwrap(), 2);
        assert!(w.write(b"z").is_err());
        Write::flush(&mut w).unwrap();

        let contents = disk.contents();
        assert_eq!(&contents[4 * 512 - 2..4 * 512], b"xy");
        assert_eq!(contents[4 * 512], 4);

        w.seek(SeekFrom::Start(10)).unwrap();
        w.seek(SeekFrom::Current(-4)).unwrap();
        assert_eq!(w.position(), 6);
        assert!(w.seek(SeekFrom::Current(-7)).is_err());
        assert!(w.seek(SeekFrom::Start(513)).is_err());
        assert_eq!(w.position(), 6);
    }

    #[test]
    fn test_device_errors_pass_through() {
        let disk = patterned_disk();
        let mut w = window(&disk, 0, 2);
        disk.fail_with(Some(5));

        let err = w.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(5));
    }
}
