//! # rawpod devices
//!
//! Access to the disks rawpod edits:
//! - **LocalRawDevice / LocalDevices**: disk nodes and override images
//! - **DeviceFacade**: read and write sector 0, query device size, open partitions,
//!   split a partition in one read-modify-write cycle
//! - **scan**: probe disks in order until an iPod turns up
//!
//! ## Example
//!
//! ```rust,no_run
//! use rawpod_devices::{find_ipod, DeviceConfig, DeviceFacade};
//!
//! let config = DeviceConfig::from_env();
//! let facade = DeviceFacade::new(config.clone());
//! let report = find_ipod(&facade, config.scan_limit);
//!
//! for probe in &report.probes {
//!     println!("{}: {}", probe.device, probe.outcome);
//! }
//! ```

pub mod config;
pub mod facade;
pub mod local;
pub mod scan;

pub use config::DeviceConfig;
pub use facade::{DeviceFacade, SplitOutcome, SplitRequest};
pub use local::{LocalDevices, LocalRawDevice};
pub use scan::{find_ipod, probe_device, DeviceProbe, ProbeOutcome, ScanReport};
