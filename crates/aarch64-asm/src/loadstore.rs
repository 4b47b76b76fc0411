//! Load/store encoders: unsigned-immediate and register-offset single
//! loads/stores, register pairs, and the Q-register (128-bit) variants
//! `asimd` reuses for spill/fill.

use xlate_core::register::{ExtendType, Register, Size, XRegister};

use crate::Emitter;

fn ldst_imm(size_field: u32, opc: u32, imm12: u32, rn: u32, rt: u32) -> u32 {
    (size_field << 30) | (0b111 << 27) | (0b01 << 24) | (opc << 22) | (imm12 << 10) | (rn << 5) | rt
}

fn ldst_vector_imm(opc: u32, imm12: u32, rn: u32, rt: u32) -> u32 {
    (0b00 << 30) | (0b111 << 27) | (1 << 26) | (0b01 << 24) | (opc << 22) | (imm12 << 10) | (rn << 5) | rt
}

fn ldst_reg_offset(size_field: u32, opc: u32, rm: u32, extend: u32, rn: u32, rt: u32) -> u32 {
    (size_field << 30) | (0b111 << 27) | (0b00 << 24) | (opc << 22) | (1 << 21) | (rm << 16) | (extend << 13) | (0b10 << 10) | (rn << 5) | rt
}

fn ldst_pair(opc: u32, l: u32, imm7: u32, rt2: u32, rn: u32, rt: u32) -> u32 {
    (opc << 30) | (0b101 << 27) | (0b010 << 23) | (l << 22) | (imm7 << 15) | (rt2 << 10) | (rn << 5) | rt
}

impl Emitter {
    /// `str rt, [rn, #imm]` — unsigned offset, scaled by the access size.
    pub fn str_imm(&mut self, size: Size, rt: Register, rn: XRegister, byte_offset: u32) {
        let scale = if matches!(size, Size::I64) { 3 } else { 2 };
        debug_assert!(byte_offset % (1 << scale) == 0, "unaligned str offset");
        let size_field = if matches!(size, Size::I64) { 0b11 } else { 0b10 };
        let imm12 = byte_offset >> scale;
        self.emit_u32(ldst_imm(size_field, 0b00, imm12, rn.idx(), rt.idx()));
    }

    pub fn ldr_imm(&mut self, size: Size, rt: Register, rn: XRegister, byte_offset: u32) {
        let scale = if matches!(size, Size::I64) { 3 } else { 2 };
        debug_assert!(byte_offset % (1 << scale) == 0, "unaligned ldr offset");
        let size_field = if matches!(size, Size::I64) { 0b11 } else { 0b10 };
        let imm12 = byte_offset >> scale;
        self.emit_u32(ldst_imm(size_field, 0b01, imm12, rn.idx(), rt.idx()));
    }

    pub fn str_reg(&mut self, size: Size, rt: Register, rn: XRegister, rm: XRegister, extend: ExtendType) {
        let size_field = if matches!(size, Size::I64) { 0b11 } else { 0b10 };
        self.emit_u32(ldst_reg_offset(size_field, 0b00, rm.idx(), extend.encoding(), rn.idx(), rt.idx()));
    }

    pub fn ldr_reg(&mut self, size: Size, rt: Register, rn: XRegister, rm: XRegister, extend: ExtendType) {
        let size_field = if matches!(size, Size::I64) { 0b11 } else { 0b10 };
        self.emit_u32(ldst_reg_offset(size_field, 0b01, rm.idx(), extend.encoding(), rn.idx(), rt.idx()));
    }

    /// `stp rt, rt2, [rn, #imm]` — signed offset, 64-bit GPR pair, scaled by
    /// 8.
    pub fn stp(&mut self, rt: Register, rt2: Register, rn: XRegister, imm: i32) {
        debug_assert!(imm % 8 == 0 && (-512..512).contains(&imm));
        let imm7 = ((imm / 8) as u32) & 0x7F;
        self.emit_u32(ldst_pair(0b10, 0, imm7, rt2.idx(), rn.idx(), rt.idx()));
    }

    pub fn ldp(&mut self, rt: Register, rt2: Register, rn: XRegister, imm: i32) {
        debug_assert!(imm % 8 == 0 && (-512..512).contains(&imm));
        let imm7 = ((imm / 8) as u32) & 0x7F;
        self.emit_u32(ldst_pair(0b10, 1, imm7, rt2.idx(), rn.idx(), rt.idx()));
    }

    /// `str qt, [rn, #imm]` — 128-bit vector store, unsigned offset scaled
    /// by 16. Used by `asimd::st1_single` for whole-register spill.
    pub(crate) fn str_q_imm(&mut self, rt: u32, rn: XRegister, byte_offset: u32) {
        debug_assert!(byte_offset % 16 == 0);
        self.emit_u32(ldst_vector_imm(0b10, byte_offset >> 4, rn.idx(), rt));
    }

    pub(crate) fn ldr_q_imm(&mut self, rt: u32, rn: XRegister, byte_offset: u32) {
        debug_assert!(byte_offset % 16 == 0);
        self.emit_u32(ldst_vector_imm(0b11, byte_offset >> 4, rn.idx(), rt));
    }
}
