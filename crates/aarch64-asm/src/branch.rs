//! Branch family: unconditional/conditional/compare-and-branch/test-and-
//! branch, plus `adr`/`adrp` and PC-relative literal loads, all of which
//! share the label-patching machinery in `emitter`.
//!
//! Each op follows the same three-method shape: a `_raw` encoder that takes
//! an already-known immediate, a `_to_backward` variant that computes the
//! offset from an already-bound `BackwardLabel`, and a `_to_forward` variant
//! that records the site and emits a zero-immediate placeholder for
//! `Emitter::bind_forward` to patch later.

use xlate_core::label::{BackwardLabel, ForwardLabel, PatchKind};
use xlate_core::register::{Condition, Register, XRegister};

use crate::emitter::encode_adr_split;
use crate::Emitter;

fn imm26_field(imm: i64) -> u32 {
    ((imm / 4) as u32) & 0x3FF_FFFF
}

fn imm19_field(imm: i64) -> u32 {
    ((imm / 4) as u32) & 0x7_FFFF
}

impl Emitter {
    pub fn b_raw(&mut self, imm: i64) {
        PatchKind::B.check_range(imm).expect("b target out of range");
        self.emit_u32((0b000101 << 26) | imm26_field(imm));
    }

    pub fn b_to_backward(&mut self, label: &BackwardLabel) {
        let imm = self.backward_offset(label);
        self.b_raw(imm);
    }

    pub fn bl_raw(&mut self, imm: i64) {
        PatchKind::B.check_range(imm).expect("bl target out of range");
        self.emit_u32((0b100101 << 26) | imm26_field(imm));
    }

    pub fn br(&mut self, rn: XRegister) {
        self.emit_u32((0b1101011 << 25) | (0b11111 << 16) | rn.idx() << 5);
    }

    pub fn blr(&mut self, rn: XRegister) {
        self.emit_u32((0b1101011 << 25) | (0b0001 << 21) | (0b11111 << 16) | rn.idx() << 5);
    }

    pub fn ret(&mut self, rn: XRegister) {
        self.emit_u32((0b1101011 << 25) | (0b0010 << 21) | (0b11111 << 16) | rn.idx() << 5);
    }

    pub fn b_cond_raw(&mut self, cond: Condition, imm: i64) {
        PatchKind::BCond.check_range(imm).expect("b.cond target out of range");
        self.emit_u32((0b01010100 << 24) | (imm19_field(imm) << 5) | cond.encoding());
    }

    pub fn b_cond_to_backward(&mut self, cond: Condition, label: &BackwardLabel) {
        let imm = self.backward_offset(label);
        self.b_cond_raw(cond, imm);
    }

    pub fn cbz_raw(&mut self, sf: u32, rt: Register, imm: i64) {
        PatchKind::BCond.check_range(imm).expect("cbz target out of range");
        self.emit_u32((sf << 31) | (0b011010 << 25) | (imm19_field(imm) << 5) | rt.idx());
    }

    pub fn cbnz_raw(&mut self, sf: u32, rt: Register, imm: i64) {
        PatchKind::BCond.check_range(imm).expect("cbnz target out of range");
        self.emit_u32((sf << 31) | (0b011010 << 25) | (1 << 24) | (imm19_field(imm) << 5) | rt.idx());
    }

    pub fn tbz_raw(&mut self, rt: Register, bit: u32, imm: i64) {
        debug_assert!(bit < 64);
        PatchKind::TestBranch.check_range(imm).expect("tbz target out of range");
        let b5 = (bit >> 5) & 1;
        let b40 = bit & 0x1F;
        let imm14 = (((imm / 4) as u32) & 0x3FFF) << 5;
        self.emit_u32((b5 << 31) | (0b011011 << 25) | (b40 << 19) | imm14 | rt.idx());
    }

    pub fn tbnz_raw(&mut self, rt: Register, bit: u32, imm: i64) {
        debug_assert!(bit < 64);
        PatchKind::TestBranch.check_range(imm).expect("tbnz target out of range");
        let b5 = (bit >> 5) & 1;
        let b40 = bit & 0x1F;
        let imm14 = (((imm / 4) as u32) & 0x3FFF) << 5;
        self.emit_u32((b5 << 31) | (0b011011 << 25) | (1 << 24) | (b40 << 19) | imm14 | rt.idx());
    }

    pub fn adr_raw(&mut self, rd: XRegister, imm: i64) {
        PatchKind::Adr.check_range(imm).expect("adr target out of range");
        let (immlo, immhi) = encode_adr_split(imm);
        self.emit_u32((immlo << 29) | (0b10000 << 24) | (immhi << 5) | rd.idx());
    }

    pub fn adrp_raw(&mut self, rd: XRegister, page_offset: i64) {
        PatchKind::Adrp.check_range(page_offset).expect("adrp target out of range");
        let (immlo, immhi) = encode_adr_split(page_offset);
        self.emit_u32((1 << 31) | (immlo << 29) | (0b10000 << 24) | (immhi << 5) | rd.idx());
    }

    pub fn adr_to_forward(&mut self, rd: XRegister, label: &mut ForwardLabel) {
        self.record_forward_use(label, PatchKind::Adr);
        self.adr_raw(rd, 0);
    }

    pub fn adrp_to_forward(&mut self, rd: XRegister, label: &mut ForwardLabel) {
        self.record_forward_use(label, PatchKind::Adrp);
        self.adrp_raw(rd, 0);
    }

    /// `ldr rt, =label` — PC-relative literal load, 32- or 64-bit GPR.
    pub fn ldr_literal_raw(&mut self, is_64: bool, rt: Register, imm: i64) {
        PatchKind::RelativeLoad.check_range(imm).expect("ldr literal target out of range");
        let opc = u32::from(is_64);
        self.emit_u32((opc << 30) | (0b011 << 27) | (imm19_field(imm) << 5) | rt.idx());
    }
}

pub fn b_to_forward(e: &mut Emitter, label: &mut ForwardLabel) {
    e.record_forward_use(label, PatchKind::B);
    e.b_raw(0);
}

pub fn cbz_to_forward(e: &mut Emitter, sf: u32, rt: Register, label: &mut ForwardLabel) {
    e.record_forward_use(label, PatchKind::BCond);
    e.cbz_raw(sf, rt, 0);
}

pub fn cbnz_to_forward(e: &mut Emitter, sf: u32, rt: Register, label: &mut ForwardLabel) {
    e.record_forward_use(label, PatchKind::BCond);
    e.cbnz_raw(sf, rt, 0);
}

pub fn tbz_to_forward(e: &mut Emitter, rt: Register, bit: u32, label: &mut ForwardLabel) {
    e.record_forward_use(label, PatchKind::TestBranch);
    e.tbz_raw(rt, bit, 0);
}

pub fn tbnz_to_forward(e: &mut Emitter, rt: Register, bit: u32, label: &mut ForwardLabel) {
    e.record_forward_use(label, PatchKind::TestBranch);
    e.tbnz_raw(rt, bit, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_emitter;
    use xlate_core::register::x;

    #[test]
    fn ret_x30_matches_known_encoding() {
        let (backing, mut e) = make_emitter(4);
        e.ret(x::R30);
        assert_eq!(&backing[0..4], &0xD65F_03C0u32.to_le_bytes());
    }

    #[test]
    fn forward_b_then_bind_produces_correct_two_instruction_jump() {
        let (backing, mut e) = make_emitter(12);
        let mut label = ForwardLabel::new();
        b_to_forward(&mut e, &mut label);
        e.nop();
        e.bind_forward(&mut label);
        let word = u32::from_le_bytes(backing[0..4].try_into().unwrap());
        assert_eq!(word & 0x3FF_FFFF, 1);
    }

    #[test]
    fn backward_b_computes_negative_offset_directly() {
        let (backing, mut e) = make_emitter(12);
        let mut label = BackwardLabel::new();
        e.bind_backward(&mut label);
        e.nop();
        e.b_to_backward(&label);
        let word = u32::from_le_bytes(backing[4..8].try_into().unwrap());
        // offset = 0 - 4 = -4, / 4 = -1
        assert_eq!(word & 0x3FF_FFFF, 0x3FF_FFFF);
    }
}
