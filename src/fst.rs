/// ISFS directory-entry (FST) record and its 32-byte on-flash codec.
///
/// Entry layout (all multi-byte fields big-endian):
///   +0x00 name[12]  ASCII, null-padded, not necessarily terminated
///   +0x0C mode      u8   2 = directory, 0xC1 = regular file
///   +0x0D attr      u8
///   +0x0E sub       u16  first child index (dirs) / start cluster (files)
///   +0x10 sib       u16  next sibling index, 0xFFFF = none
///   +0x12 size      u32  file size in bytes
///   +0x16 x1        u16
///   +0x18 uid       u16
///   +0x1A gid       u16
///   +0x1C x3        u32

/// Size of one FST entry; also the clobber stride of boot1's repair pass.
pub const FST_ENTRY_SIZE: usize = 0x20;

/// Maximum name length. A full 12-byte name carries no terminator.
pub const FST_NAME_LEN: usize = 12;

/// Offset of the mode byte inside an entry. boot1's repair pass zeroes the
/// byte at this offset of every 32-byte slot it walks, whether or not the
/// slot actually holds an entry.
pub const MODE_FIELD_OFFSET: usize = 0x0C;

/// "No entry" sentinel for sub/sib links.
pub const NO_ENTRY: u16 = 0xFFFF;

/// One FST record. Plain data on purpose: the crafted image writes
/// structurally invalid trees, so no cross-entry consistency is enforced
/// here. Defaults describe an empty directory with no links.
#[derive(Debug, Clone)]
pub struct FstEntry {
    pub name: &'static str,
    pub mode: u8,
    pub attr: u8,
    pub sub: u16,
    pub sib: u16,
    pub size: u32,
    pub x1: u16,
    pub uid: u16,
    pub gid: u16,
    pub x3: u32,
}

impl Default for FstEntry {
    fn default() -> Self {
        FstEntry {
            name: "",
            mode: 2,
            attr: 0,
            sub: NO_ENTRY,
            sib: NO_ENTRY,
            size: 0,
            x1: 0,
            uid: 0,
            gid: 0,
            x3: 0,
        }
    }
}

impl FstEntry {
    /// Serialize to the on-flash form. Caller must keep the name ASCII and
    /// at most 12 bytes; this is a precondition, not a runtime error.
    pub fn encode(&self) -> [u8; FST_ENTRY_SIZE] {
        debug_assert!(self.name.len() <= FST_NAME_LEN);
        debug_assert!(self.name.is_ascii());

        let mut out = [0u8; FST_ENTRY_SIZE];
        out[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out[0x0C] = self.mode;
        out[0x0D] = self.attr;
        out[0x0E..0x10].copy_from_slice(&self.sub.to_be_bytes());
        out[0x10..0x12].copy_from_slice(&self.sib.to_be_bytes());
        out[0x12..0x16].copy_from_slice(&self.size.to_be_bytes());
        out[0x16..0x18].copy_from_slice(&self.x1.to_be_bytes());
        out[0x18..0x1A].copy_from_slice(&self.uid.to_be_bytes());
        out[0x1A..0x1C].copy_from_slice(&self.gid.to_be_bytes());
        out[0x1C..0x20].copy_from_slice(&self.x3.to_be_bytes());
        out
    }
}
