/// Compensation for boot1's superblock repair pass.
///
/// When boot1 decides the superblock needs repair it zeroes the mode byte of
/// every 32-byte FST slot it walks, across the whole arena, including the
/// slots that merely hold stage1/repair/stage2 bytes. Stage2 therefore loses
/// one byte per 32. compensate() saves those bytes into a compact recovery
/// stream and pre-clears them in the staged copy, so the flashed image
/// already matches what boot1 produces and stage1 can replay the stream to
/// put the bytes back before stage2 runs.
use crate::fst::{FST_ENTRY_SIZE, MODE_FIELD_OFFSET};

/// Output of the one-shot compensation pass.
pub struct Compensated {
    /// Stage2 copy with every clobber-position byte cleared.
    pub stage2: Vec<u8>,
    /// Saved bytes, in walk order, with placeholders interleaved (see
    /// compensate).
    pub recovery: Vec<u8>,
}

/// Split a stage2 payload into a clobbered copy and its recovery stream.
///
/// The recovery stream itself is placed at a 32-byte-aligned arena offset,
/// and the arena starts at an absolute address ending in 0x0C. Stream bytes
/// at index 0x0C (mod 0x20) thus land on addresses ending in 0x18, exactly
/// the positions boot1 clears. A zero placeholder is inserted at each such
/// index so that no real recovery byte sits where it would be wiped; stage1
/// skips those positions when replaying.
///
/// Must run exactly once, on the unmodified payload: re-running it on the
/// clobbered copy would record an all-zero stream.
pub fn compensate(payload: &[u8]) -> Compensated {
    let mut stage2 = payload.to_vec();
    let mut recovery = Vec::new();

    let mut offs = MODE_FIELD_OFFSET;
    while offs < stage2.len() {
        if recovery.len() & 0x1F == MODE_FIELD_OFFSET {
            recovery.push(0); // placeholder, lands on a cleared position
        }
        recovery.push(stage2[offs]);
        stage2[offs] = 0;
        offs += FST_ENTRY_SIZE;
    }

    Compensated { stage2, recovery }
}
