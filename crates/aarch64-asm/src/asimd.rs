//! ASIMD (NEON) encoders: per-element-size vector add/sub, and the
//! single-register load/store forms the driver uses for whole-vector
//! spill/fill around fallback ABI calls.
//!
//! Only full 128-bit (`Q=1`) vector width is exposed — that's the only
//! width the driver's SRA spill path needs.

use xlate_core::register::{SubRegSize, VRegister, XRegister};

fn simd_three_same(q: u32, u: u32, size: u32, rm: u32, opcode: u32, rn: u32, rd: u32) -> u32 {
    (q << 30) | (u << 29) | (0b01110 << 24) | (size << 22) | (1 << 21) | (rm << 16) | (opcode << 11) | (1 << 10) | (rn << 5) | rd
}

impl crate::Emitter {
    pub fn add_vector(&mut self, elem: SubRegSize, rd: VRegister, rn: VRegister, rm: VRegister) {
        let word = simd_three_same(1, 0, elem.size_field(), rm.idx(), 0b10000, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn sub_vector(&mut self, elem: SubRegSize, rd: VRegister, rn: VRegister, rm: VRegister) {
        let word = simd_three_same(1, 1, elem.size_field(), rm.idx(), 0b10000, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    /// Load one full vector register from `[rn, #byte_offset]`. Named after
    /// the SVE-style "single structure" load the driver's spill path models
    /// it on, even though the underlying encoding is a plain 128-bit `LDR`.
    pub fn ld1_single(&mut self, rt: VRegister, rn: XRegister, byte_offset: u32) {
        self.ldr_q_imm(rt.idx(), rn, byte_offset);
    }

    pub fn st1_single(&mut self, rt: VRegister, rn: XRegister, byte_offset: u32) {
        self.str_q_imm(rt.idx(), rn, byte_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_emitter;

    #[test]
    fn add_vector_and_sub_vector_differ_only_in_u_bit() {
        let (back_add, mut e_add) = make_emitter(4);
        e_add.add_vector(SubRegSize::I32, VRegister::new(0), VRegister::new(1), VRegister::new(2));
        let (back_sub, mut e_sub) = make_emitter(4);
        e_sub.sub_vector(SubRegSize::I32, VRegister::new(0), VRegister::new(1), VRegister::new(2));
        let word_add = u32::from_le_bytes(back_add[0..4].try_into().unwrap());
        let word_sub = u32::from_le_bytes(back_sub[0..4].try_into().unwrap());
        assert_eq!(word_add ^ word_sub, 1 << 29);
    }

    #[test]
    fn st1_single_then_ld1_single_round_trip_same_offset_field() {
        let (back_st, mut e_st) = make_emitter(4);
        e_st.st1_single(VRegister::new(3), xlate_core::register::x::R4, 32);
        let (back_ld, mut e_ld) = make_emitter(4);
        e_ld.ld1_single(VRegister::new(3), xlate_core::register::x::R4, 32);
        let word_st = u32::from_le_bytes(back_st[0..4].try_into().unwrap());
        let word_ld = u32::from_le_bytes(back_ld[0..4].try_into().unwrap());
        assert_eq!((word_st >> 10) & 0xFFF, (word_ld >> 10) & 0xFFF);
    }
}
