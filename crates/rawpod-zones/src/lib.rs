//! # rawpod zones
//!
//! Partition table handling for rawpod:
//! - **mbr**: the 512-byte MBR image and its four-slot partition table
//! - **ipod**: recognition of the partition layouts iTunes and iPodLinux leave behind
//! - **resize**: carving a new partition out of the tail of an existing one
//!
//! ## Example
//!
//! ```rust
//! use rawpod_zones::{IpodLayout, MbrImage, PartitionTable, PartitionType};
//!
//! let image = MbrImage::blank();
//! let mut table = PartitionTable::decode(&image).unwrap();
//! assert_eq!(IpodLayout::classify(&table, &image), IpodLayout::NotRecognized);
//!
//! table[1].partition_type = PartitionType::FAT32_CHS;
//! table[1].sector_count = 1_000_000;
//! table.shrink_and_add(2, 3, PartitionType::LINUX, 100_000).unwrap();
//! assert_eq!(table[2].sector_count % 16065, 0);
//! ```

pub mod ipod;
pub mod mbr;
pub mod resize;

pub use ipod::IpodLayout;
pub use mbr::types::{CHSAddress, PartitionEntry, PartitionType};
pub use mbr::{slot_index, MbrImage, PartitionTable};
pub use resize::{cylinder_round, CYLINDER_SECTORS};
