//! Shrink a partition and place a new one in the space freed at its tail

use crate::mbr::{slot_index, types::PartitionType, PartitionTable};
use rawpod_core::{Error, Result};

/// Heads per cylinder of the legacy geometry partitioning tools align to
pub const HEADS: u32 = 255;

/// Sectors per track of the legacy geometry
pub const SECTORS_PER_TRACK: u32 = 63;

/// Sectors in one cylinder
pub const CYLINDER_SECTORS: u32 = HEADS * SECTORS_PER_TRACK;

impl PartitionTable {
    /// Take roughly `requested` sectors off the end of partition `source` and give
    /// them to a new partition of type `new_type` in the empty slot `dest`
    ///
    /// Slots are 1-based. The size is moved to a cylinder boundary where possible
    /// (see [`cylinder_round`]). Only the in-memory table changes; on error it is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// - [`Error::InvalidSlot`] if either slot is outside 1..=4
    /// - [`Error::InsufficientSpace`] if `source` is shorter than `requested`
    /// - [`Error::SlotOccupied`] if `dest` already has a partition type
    /// - [`Error::InvalidSlot`] if `source` and `dest` are the same empty slot
    pub fn shrink_and_add(
        &mut self,
        source: u32,
        dest: u32,
        new_type: PartitionType,
        requested: u32,
    ) -> Result<()> {
        let src = slot_index(source)?;
        let dst = slot_index(dest)?;

        let available = self[src].sector_count;
        if requested > available {
            return Err(Error::InsufficientSpace {
                requested,
                available,
            });
        }

        let occupant = self[dst].partition_type;
        if !occupant.is_empty() {
            return Err(Error::SlotOccupied {
                slot: dest,
                partition_type: occupant.to_byte(),
            });
        }
        if src == dst {
            return Err(Error::InvalidSlot(dest));
        }

        let size = cylinder_round(requested, available);
        tracing::debug!(
            source,
            dest,
            requested,
            size,
            "splitting {} sectors off partition {}",
            size,
            source
        );

        let remaining = available - size;
        let start = self[src]
            .start_sector
            .checked_add(remaining)
            .ok_or_else(|| {
                Error::custom(format!("partition {} extends past sector 2^32", source))
            })?;

        self[src].sector_count = remaining;

        let mut added = self[dst];
        added.status = 0;
        added.partition_type = new_type;
        added.start_sector = start;
        added.sector_count = size;
        self[dst] = added;

        Ok(())
    }
}

/// Round a carve-out of `requested` sectors from a partition of `available`
/// sectors to a whole number of cylinders
///
/// Rounding down needs at least one cylinder requested. Rounding up must leave the
/// source partition non-empty, so it needs `requested + cylinder < available`.
/// Rounding up is only chosen when both directions are usable and it is the
/// strictly smaller adjustment; otherwise the size is truncated to whole
/// cylinders, which takes a sub-cylinder request to zero. With neither direction
/// usable the request is returned as is.
pub fn cylinder_round(requested: u32, available: u32) -> u32 {
    let cylinder = CYLINDER_SECTORS as u64;
    let requested_wide = requested as u64;
    let remainder = requested_wide % cylinder;

    let can_round_down = requested_wide >= cylinder;
    let can_round_up = requested_wide + cylinder < available as u64;

    if !can_round_down && !can_round_up {
        return requested;
    }

    let round_up = can_round_up && can_round_down && remainder > cylinder - remainder;
    let size = if round_up {
        (requested_wide + cylinder - 1) / cylinder * cylinder
    } else {
        requested_wide - remainder
    };

    // Never more than `available`, which is a u32
    size as u32
}
