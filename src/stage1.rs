/// Stage1 bootstrap generator.
///
/// Emits a fixed ARM (big-endian) sequence followed by a three-word
/// parameter block. At run time the code walks the recovery stream, stores
/// every saved byte back at the 32-byte clobber stride inside stage2, skips
/// the placeholder positions the encoder left zero, and finally branches to
/// stage2. This exactly inverts boot1's repair pass (see repair.rs).
///
/// The words at +0x0C and +0x2C are deliberately zero: boot1 clears the byte
/// at offset 0x0C of every 32-byte slot, and keeping those slots empty means
/// the clearing changes nothing about the code.

/// Emitted size: 13 instruction words plus 3 parameter words.
pub const STAGE1_SIZE: usize = 0x40;

const STAGE1_CODE: [u32; 13] = [
    0xE28F002C, // +00       add r0, pc, #0x2C      ; r0 = parameter block
    0xE8900007, // +04       ldmia r0, {r0, r1, r2} ; recovery start / end / stage2
    0xE282500C, // +08       add r5, r2, #0xC       ; first clobbered stage2 byte
    0x00000000, // +0C                              ; slot cleared by boot1
    0xE200401F, // +10 loop: and r4, r0, #0x1F
    0xE4D03001, // +14       ldrb r3, [r0], #1
    0xE3540018, // +18       cmp r4, #0x18          ; placeholder byte?
    0x14C53020, // +1C       strbne r3, [r5], #0x20 ; real byte: store, advance
    0xE1500001, // +20       cmp r0, r1
    0x124FF01C, // +24       bne loop (subne pc, pc, #0x1C)
    0xE12FFF12, // +28       bx r2                  ; enter stage2
    0x00000000, // +2C                              ; slot cleared by boot1
    0x00000000, // +30
];

/// Emit stage1 for the given recovery stream and stage2 placements.
pub fn generate(recovery_addr: u32, recovery_len: usize, stage2_addr: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(STAGE1_SIZE);
    for word in STAGE1_CODE {
        out.extend_from_slice(&word.to_be_bytes());
    }
    out.extend_from_slice(&recovery_addr.to_be_bytes());
    out.extend_from_slice(&(recovery_addr + recovery_len as u32).to_be_bytes());
    out.extend_from_slice(&stage2_addr.to_be_bytes());
    debug_assert_eq!(out.len(), STAGE1_SIZE);
    out
}
