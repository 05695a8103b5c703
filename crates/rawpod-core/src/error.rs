//! rawpod error types

use thiserror::Error;

/// The main error type for rawpod operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reported by the device port, carried unchanged
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sector 0 does not hold a usable MBR
    #[error("Invalid MBR: {0}")]
    InvalidMbr(String),

    /// Partition slot number outside 1..=4
    #[error("Invalid partition slot: {0} (must be 1-4)")]
    InvalidSlot(u32),

    /// Source partition is smaller than the requested carve-out
    #[error("Insufficient space: requested {requested} sectors, partition has {available}")]
    InsufficientSpace { requested: u32, available: u32 },

    /// Destination slot already holds a partition
    #[error("Partition slot {slot} is occupied (type 0x{partition_type:02X})")]
    SlotOccupied { slot: u32, partition_type: u8 },

    /// Device number cannot be mapped to a platform device
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

/// Result type alias for rawpod operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error from a string
    pub fn custom(msg: impl Into<String>) -> Self {
        Error::Custom(msg.into())
    }

    /// Create an invalid MBR error
    pub fn invalid_mbr(msg: impl Into<String>) -> Self {
        Error::InvalidMbr(msg.into())
    }

    /// Create an invalid device error
    pub fn invalid_device(msg: impl Into<String>) -> Self {
        Error::InvalidDevice(msg.into())
    }

    /// The platform error code behind an I/O failure, if there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
