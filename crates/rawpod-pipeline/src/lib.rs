//! # rawpod pipeline
//!
//! Stream wrappers over raw devices. [`PartitionWindow`] presents one partition as
//! an independent device, both through the [`rawpod_core::RawDevice`] port and as a
//! `Read + Write + Seek` stream for filesystem code.

pub mod window;

pub use window::PartitionWindow;
