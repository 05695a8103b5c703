//! # rawpod core
//!
//! Shared error handling, device identity, and the raw device port for rawpod.
//!
//! - **Error**: one error enum for every rawpod crate
//! - **DeviceId**: disk numbering and the platform path it maps to
//! - **RawDevice / DeviceProvider**: the boundary to real or substituted storage
//! - **MemoryDisk**: an in-memory stand-in that records partition-table re-reads
//!
//! ## Example
//!
//! ```rust,no_run
//! use rawpod_core::{DeviceId, DeviceProvider, Result, SECTOR_SIZE};
//!
//! fn first_sector(provider: &dyn DeviceProvider) -> Result<[u8; SECTOR_SIZE]> {
//!     let mut device = provider.open(DeviceId::new(0))?;
//!     let mut sector = [0u8; SECTOR_SIZE];
//!     device.read_sectors(0, &mut sector)?;
//!     Ok(sector)
//! }
//! ```

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use memory::{MemoryDevice, MemoryDisk, MemoryProvider};
pub use traits::{DeviceProvider, RawDevice};
pub use types::{format_sectors, DeviceId, SECTOR_SIZE};
