/// Back-to-front placement of the three injected segments inside the FST
/// arena.
///
/// The arena's front holds the explicit directory entries (root, decoy path,
/// overflow chain); the tail is dead space as far as boot1 is concerned, and
/// that is where stage2, its recovery stream and stage1 go. Segments are
/// packed from the arena end downwards, each start rounded down to the
/// 32-byte slot boundary, so their addresses keep the alignment the repair
/// compensation relies on.
use std::fmt;
use thiserror::Error;

use crate::fst::FST_ENTRY_SIZE;

/// Memory address boot1 loads the superblock to.
pub const SUPERBLOCK_BASE: u32 = 0x01F8_0000;

/// Total crafted image size: header + FAT + FST arena + trailing pad.
pub const SUPERBLOCK_SIZE: usize = 0x40000;

/// Image offset of the FST arena (12-byte header + 0x10000-byte FAT).
pub const FST_OFFSET: usize = 0x1000C;

/// The arena holds 6143 32-byte entries.
pub const FST_AREA_ENTRIES: usize = 6143;
pub const FST_AREA_SIZE: usize = FST_AREA_ENTRIES * FST_ENTRY_SIZE;

/// The three segments, in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Stage2,
    RecoveryStream,
    Stage1,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Segment::Stage2 => "stage2",
            Segment::RecoveryStream => "repair data",
            Segment::Stage1 => "stage1",
        })
    }
}

/// The one fatal build error: a segment dips into the explicit directory
/// entries. The arena is simply too small for the given payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("insufficient superblock space for {segment} (overlaps directory entries by {overlap} bytes)")]
    InsufficientSpace { segment: Segment, overlap: usize },
}

/// A placed segment: offset within the arena plus its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub offset: usize,
    pub len: usize,
}

impl Placement {
    /// Offset within the final superblock image.
    pub fn image_offset(&self) -> usize {
        FST_OFFSET + self.offset
    }

    /// Absolute address once boot1 has loaded the superblock.
    pub fn addr(&self) -> u32 {
        SUPERBLOCK_BASE + self.image_offset() as u32
    }
}

/// Finalized placements for the build pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub stage1: Placement,
    pub recovery: Placement,
    pub stage2: Placement,
}

/// Place the segments below the arena end, in order: stage2 against the
/// end, the recovery stream before it, stage1 before that. `entries_len`
/// is the byte length of the explicit directory entries at the arena front;
/// the first segment that would reach into them aborts the build.
pub fn place(
    entries_len: usize,
    stage2_len: usize,
    recovery_len: usize,
    stage1_len: usize,
) -> Result<Layout, LayoutError> {
    let stage2 = fit(Segment::Stage2, FST_AREA_SIZE, stage2_len, entries_len)?;
    let recovery = fit(Segment::RecoveryStream, stage2.offset, recovery_len, entries_len)?;
    let stage1 = fit(Segment::Stage1, recovery.offset, stage1_len, entries_len)?;

    Ok(Layout {
        stage1,
        recovery,
        stage2,
    })
}

fn fit(
    segment: Segment,
    end: usize,
    len: usize,
    entries_len: usize,
) -> Result<Placement, LayoutError> {
    // Signed arithmetic: an oversized segment pushes the offset negative.
    let offset = (end as i64 - len as i64) & !0x1F;
    if offset < entries_len as i64 {
        return Err(LayoutError::InsufficientSpace {
            segment,
            overlap: (entries_len as i64 - offset) as usize,
        });
    }
    Ok(Placement {
        offset: offset as usize,
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1::STAGE1_SIZE;

    #[test]
    fn test_offsets_are_slot_aligned() {
        for stage2_len in [1, 31, 32, 33, 1000, 4097] {
            let layout = place(0xDC0, stage2_len, 77, STAGE1_SIZE).unwrap();
            assert_eq!(layout.stage2.offset % 32, 0);
            assert_eq!(layout.recovery.offset % 32, 0);
            assert_eq!(layout.stage1.offset % 32, 0);
        }
    }

    #[test]
    fn test_back_to_front_order() {
        let layout = place(0xDC0, 0x1000, 0x81, STAGE1_SIZE).unwrap();

        // stage2 hugs the arena end
        assert_eq!(layout.stage2.offset, (FST_AREA_SIZE - 0x1000) & !0x1F);
        // each earlier segment ends at or before the next one's start
        assert!(layout.recovery.offset + layout.recovery.len <= layout.stage2.offset);
        assert!(layout.stage1.offset + layout.stage1.len <= layout.recovery.offset);
        assert!(layout.stage1.offset >= 0xDC0);
    }

    #[test]
    fn test_addresses_follow_superblock_base() {
        let layout = place(0xDC0, 64, 2, STAGE1_SIZE).unwrap();
        assert_eq!(
            layout.stage2.addr(),
            SUPERBLOCK_BASE + (FST_OFFSET + layout.stage2.offset) as u32
        );
        // aligned arena offset + arena base keeps the 0x0C address tail
        assert_eq!(layout.recovery.addr() & 0x1F, 0x0C);
    }

    #[test]
    fn test_stage2_too_large() {
        let err = place(0xDC0, FST_AREA_SIZE + 1, 0, STAGE1_SIZE).unwrap_err();
        match err {
            LayoutError::InsufficientSpace { segment, overlap } => {
                assert_eq!(segment, Segment::Stage2);
                assert!(overlap > 0);
            }
        }
    }

    #[test]
    fn test_recovery_stream_is_second_to_collide() {
        // stage2 fits, the recovery stream does not
        let entries_len = 0x1000;
        let err = place(entries_len, FST_AREA_SIZE - entries_len - 0xE0, 0x100, STAGE1_SIZE)
            .unwrap_err();
        match err {
            LayoutError::InsufficientSpace { segment, .. } => {
                assert_eq!(segment, Segment::RecoveryStream);
            }
        }
    }

    #[test]
    fn test_stage1_is_last_to_collide() {
        // stage2 and the recovery stream fit exactly, stage1 does not
        let entries_len = 0x1000;
        let err = place(entries_len, FST_AREA_SIZE - entries_len - 0x40, 0x40, STAGE1_SIZE)
            .unwrap_err();
        match err {
            LayoutError::InsufficientSpace { segment, overlap } => {
                assert_eq!(segment, Segment::Stage1);
                assert_eq!(overlap, STAGE1_SIZE);
            }
        }
    }
}
