//! Scalar floating-point data processing: register moves, immediate loads,
//! and the four basic arithmetic ops, over `HReg`/`SReg`/`DReg`.

use xlate_core::register::{DReg, HReg, SReg};

fn fp_type_field_h() -> u32 {
    0b11
}
fn fp_type_field_s() -> u32 {
    0b00
}
fn fp_type_field_d() -> u32 {
    0b01
}

fn fp_data_2src(typ: u32, rm: u32, opcode: u32, rn: u32, rd: u32) -> u32 {
    (0b00011110 << 24) | (typ << 22) | (1 << 21) | (rm << 16) | (opcode << 12) | (0b10 << 10) | (rn << 5) | rd
}

fn fp_data_1src(typ: u32, opcode6: u32, rn: u32, rd: u32) -> u32 {
    (0b00011110 << 24) | (typ << 22) | (1 << 21) | (opcode6 << 15) | (0b10000 << 10) | (rn << 5) | rd
}

fn fp_imm(typ: u32, imm8: u32, rd: u32) -> u32 {
    (0b00011110 << 24) | (typ << 22) | (1 << 21) | (imm8 << 13) | (0b100 << 10) | rd
}

impl crate::Emitter {
    pub fn fmov_reg_s(&mut self, rd: SReg, rn: SReg) {
        self.emit_u32(fp_data_1src(fp_type_field_s(), 0, rn.idx(), rd.idx()));
    }
    pub fn fmov_reg_d(&mut self, rd: DReg, rn: DReg) {
        self.emit_u32(fp_data_1src(fp_type_field_d(), 0, rn.idx(), rd.idx()));
    }
    pub fn fmov_reg_h(&mut self, rd: HReg, rn: HReg) {
        self.emit_u32(fp_data_1src(fp_type_field_h(), 0, rn.idx(), rd.idx()));
    }

    /// `fmov sd, #imm8` — the 8-bit "VFP expand" immediate encoding, not a
    /// raw bit pattern.
    pub fn fmov_imm_s(&mut self, rd: SReg, imm8: u8) {
        self.emit_u32(fp_imm(fp_type_field_s(), u32::from(imm8), rd.idx()));
    }
    pub fn fmov_imm_d(&mut self, rd: DReg, imm8: u8) {
        self.emit_u32(fp_imm(fp_type_field_d(), u32::from(imm8), rd.idx()));
    }
    pub fn fmov_imm_h(&mut self, rd: HReg, imm8: u8) {
        self.emit_u32(fp_imm(fp_type_field_h(), u32::from(imm8), rd.idx()));
    }

    pub fn fadd_s(&mut self, rd: SReg, rn: SReg, rm: SReg) {
        self.emit_u32(fp_data_2src(fp_type_field_s(), rm.idx(), 0b0010, rn.idx(), rd.idx()));
    }
    pub fn fadd_d(&mut self, rd: DReg, rn: DReg, rm: DReg) {
        self.emit_u32(fp_data_2src(fp_type_field_d(), rm.idx(), 0b0010, rn.idx(), rd.idx()));
    }
    pub fn fadd_h(&mut self, rd: HReg, rn: HReg, rm: HReg) {
        self.emit_u32(fp_data_2src(fp_type_field_h(), rm.idx(), 0b0010, rn.idx(), rd.idx()));
    }

    pub fn fsub_s(&mut self, rd: SReg, rn: SReg, rm: SReg) {
        self.emit_u32(fp_data_2src(fp_type_field_s(), rm.idx(), 0b0011, rn.idx(), rd.idx()));
    }
    pub fn fsub_d(&mut self, rd: DReg, rn: DReg, rm: DReg) {
        self.emit_u32(fp_data_2src(fp_type_field_d(), rm.idx(), 0b0011, rn.idx(), rd.idx()));
    }
    pub fn fsub_h(&mut self, rd: HReg, rn: HReg, rm: HReg) {
        self.emit_u32(fp_data_2src(fp_type_field_h(), rm.idx(), 0b0011, rn.idx(), rd.idx()));
    }

    pub fn fmul_s(&mut self, rd: SReg, rn: SReg, rm: SReg) {
        self.emit_u32(fp_data_2src(fp_type_field_s(), rm.idx(), 0b0000, rn.idx(), rd.idx()));
    }
    pub fn fmul_d(&mut self, rd: DReg, rn: DReg, rm: DReg) {
        self.emit_u32(fp_data_2src(fp_type_field_d(), rm.idx(), 0b0000, rn.idx(), rd.idx()));
    }
    pub fn fmul_h(&mut self, rd: HReg, rn: HReg, rm: HReg) {
        self.emit_u32(fp_data_2src(fp_type_field_h(), rm.idx(), 0b0000, rn.idx(), rd.idx()));
    }

    pub fn fdiv_s(&mut self, rd: SReg, rn: SReg, rm: SReg) {
        self.emit_u32(fp_data_2src(fp_type_field_s(), rm.idx(), 0b0001, rn.idx(), rd.idx()));
    }
    pub fn fdiv_d(&mut self, rd: DReg, rn: DReg, rm: DReg) {
        self.emit_u32(fp_data_2src(fp_type_field_d(), rm.idx(), 0b0001, rn.idx(), rd.idx()));
    }
    pub fn fdiv_h(&mut self, rd: HReg, rn: HReg, rm: HReg) {
        self.emit_u32(fp_data_2src(fp_type_field_h(), rm.idx(), 0b0001, rn.idx(), rd.idx()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_emitter;
    use xlate_core::register::VRegister;

    #[test]
    fn fadd_d_encodes_distinct_type_field_from_fadd_s() {
        let (back_s, mut es) = make_emitter(4);
        es.fadd_s(VRegister::new(0).s(), VRegister::new(1).s(), VRegister::new(2).s());
        let (back_d, mut ed) = make_emitter(4);
        ed.fadd_d(VRegister::new(0).d(), VRegister::new(1).d(), VRegister::new(2).d());
        let word_s = u32::from_le_bytes(back_s[0..4].try_into().unwrap());
        let word_d = u32::from_le_bytes(back_d[0..4].try_into().unwrap());
        assert_ne!((word_s >> 22) & 0b11, (word_d >> 22) & 0b11);
    }

    #[test]
    fn h_width_arithmetic_and_imm_ops_use_the_h_type_field() {
        let h = VRegister::new(0).h();
        let check = |word: u32| assert_eq!((word >> 22) & 0b11, fp_type_field_h());
        let (back, mut e) = make_emitter(4);
        e.fadd_h(h, h, h);
        check(u32::from_le_bytes(back[0..4].try_into().unwrap()));
        let (back, mut e) = make_emitter(4);
        e.fsub_h(h, h, h);
        check(u32::from_le_bytes(back[0..4].try_into().unwrap()));
        let (back, mut e) = make_emitter(4);
        e.fmul_h(h, h, h);
        check(u32::from_le_bytes(back[0..4].try_into().unwrap()));
        let (back, mut e) = make_emitter(4);
        e.fdiv_h(h, h, h);
        check(u32::from_le_bytes(back[0..4].try_into().unwrap()));
        let (back, mut e) = make_emitter(4);
        e.fmov_imm_h(h, 0x70);
        check(u32::from_le_bytes(back[0..4].try_into().unwrap()));
    }
}
