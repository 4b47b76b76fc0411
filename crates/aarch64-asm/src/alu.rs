//! Integer ALU encoders: add/sub (immediate, shifted-register, extended-
//! register forms), logical shifted-register ops, and wide-immediate moves.

use xlate_core::register::{ExtendType, Register, ShiftType, Size, XRegister};

use crate::Emitter;

fn add_sub_immediate(sf: u32, op: u32, s: u32, shift12: u32, imm12: u32, rn: u32, rd: u32) -> u32 {
    (sf << 31) | (op << 30) | (s << 29) | (0b10001 << 24) | (shift12 << 22) | (imm12 << 10) | (rn << 5) | rd
}

fn add_sub_shifted(sf: u32, op: u32, s: u32, shift: u32, rm: u32, imm6: u32, rn: u32, rd: u32) -> u32 {
    (sf << 31) | (op << 30) | (s << 29) | (0b01011 << 24) | (shift << 22) | (rm << 16) | (imm6 << 10) | (rn << 5) | rd
}

fn add_sub_extended(sf: u32, op: u32, s: u32, rm: u32, option: u32, imm3: u32, rn: u32, rd: u32) -> u32 {
    (sf << 31) | (op << 30) | (s << 29) | (0b01011 << 24) | (0b001 << 21) | (rm << 16) | (option << 13) | (imm3 << 10) | (rn << 5) | rd
}

fn logical_shifted(sf: u32, opc: u32, shift: u32, n: u32, rm: u32, imm6: u32, rn: u32, rd: u32) -> u32 {
    (sf << 31) | (opc << 29) | (0b01010 << 24) | (shift << 22) | (n << 21) | (rm << 16) | (imm6 << 10) | (rn << 5) | rd
}

fn move_wide(sf: u32, opc: u32, hw: u32, imm16: u32, rd: u32) -> u32 {
    (sf << 31) | (opc << 29) | (0b100101 << 23) | (hw << 21) | (imm16 << 5) | rd
}

impl Emitter {
    /// `imm12`, optionally shifted left by 12 when `shift12` is set (to
    /// reach the full 24-bit unsigned range at 4 KiB granularity).
    pub fn add_imm_shifted(&mut self, size: Size, rd: Register, rn: Register, imm12: u32, shift12: bool) {
        debug_assert!(imm12 < 1 << 12, "imm12 out of range");
        let word = add_sub_immediate(size.sf(), 0, 0, u32::from(shift12), imm12, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn add_imm(&mut self, size: Size, rd: XRegister, rn: XRegister, imm12: u32) {
        self.add_imm_shifted(size, rd.r(), rn.r(), imm12, false);
    }

    pub fn adds_imm(&mut self, size: Size, rd: Register, rn: Register, imm12: u32) {
        debug_assert!(imm12 < 1 << 12);
        let word = add_sub_immediate(size.sf(), 0, 1, 0, imm12, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn sub_imm(&mut self, size: Size, rd: Register, rn: Register, imm12: u32) {
        debug_assert!(imm12 < 1 << 12);
        let word = add_sub_immediate(size.sf(), 1, 0, 0, imm12, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn subs_imm(&mut self, size: Size, rd: Register, rn: Register, imm12: u32) {
        debug_assert!(imm12 < 1 << 12);
        let word = add_sub_immediate(size.sf(), 1, 1, 0, imm12, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    /// `cmp rn, #imm12` — alias of `subs xzr, rn, #imm12`.
    pub fn cmp_imm(&mut self, size: Size, rn: Register, imm12: u32) {
        self.subs_imm(size, Register::ZR, rn, imm12);
    }

    pub fn add_shifted(&mut self, size: Size, rd: Register, rn: Register, rm: Register, shift: ShiftType, amount: u32) {
        debug_assert!(amount < 64);
        let word = add_sub_shifted(size.sf(), 0, 0, shift.encoding(), rm.idx(), amount, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn sub_shifted(&mut self, size: Size, rd: Register, rn: Register, rm: Register, shift: ShiftType, amount: u32) {
        debug_assert!(amount < 64);
        let word = add_sub_shifted(size.sf(), 1, 0, shift.encoding(), rm.idx(), amount, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn subs_shifted(&mut self, size: Size, rd: Register, rn: Register, rm: Register, shift: ShiftType, amount: u32) {
        debug_assert!(amount < 64);
        let word = add_sub_shifted(size.sf(), 1, 1, shift.encoding(), rm.idx(), amount, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    /// `cmp rn, rm{, shift #amount}` — alias of `subs xzr, rn, rm`.
    pub fn cmp_shifted(&mut self, size: Size, rn: Register, rm: Register, shift: ShiftType, amount: u32) {
        self.subs_shifted(size, Register::ZR, rn, rm, shift, amount);
    }

    pub fn add_extended(&mut self, size: Size, rd: Register, rn: Register, rm: Register, extend: ExtendType, imm3: u32) {
        debug_assert!(imm3 <= 4);
        let word = add_sub_extended(size.sf(), 0, 0, rm.idx(), extend.encoding(), imm3, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn sub_extended(&mut self, size: Size, rd: Register, rn: Register, rm: Register, extend: ExtendType, imm3: u32) {
        debug_assert!(imm3 <= 4);
        let word = add_sub_extended(size.sf(), 1, 0, rm.idx(), extend.encoding(), imm3, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn and(&mut self, size: Size, rd: Register, rn: Register, rm: Register) {
        let word = logical_shifted(size.sf(), 0b00, 0, 0, rm.idx(), 0, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn orr(&mut self, size: Size, rd: Register, rn: Register, rm: Register) {
        let word = logical_shifted(size.sf(), 0b01, 0, 0, rm.idx(), 0, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    pub fn eor(&mut self, size: Size, rd: Register, rn: Register, rm: Register) {
        let word = logical_shifted(size.sf(), 0b10, 0, 0, rm.idx(), 0, rn.idx(), rd.idx());
        self.emit_u32(word);
    }

    /// `mov rd, rm` — alias of `orr rd, zr, rm`.
    pub fn mov_reg(&mut self, size: Size, rd: Register, rm: Register) {
        self.orr(size, rd, Register::ZR, rm);
    }

    /// `movz rd, #imm16, lsl #(hw*16)`.
    pub fn movz(&mut self, size: Size, rd: Register, imm16: u16, hw: u32) {
        debug_assert!(hw < if matches!(size, Size::I64) { 4 } else { 2 });
        let word = move_wide(size.sf(), 0b10, hw, u32::from(imm16), rd.idx());
        self.emit_u32(word);
    }

    pub fn movn(&mut self, size: Size, rd: Register, imm16: u16, hw: u32) {
        debug_assert!(hw < if matches!(size, Size::I64) { 4 } else { 2 });
        let word = move_wide(size.sf(), 0b00, hw, u32::from(imm16), rd.idx());
        self.emit_u32(word);
    }

    pub fn movk(&mut self, size: Size, rd: Register, imm16: u16, hw: u32) {
        debug_assert!(hw < if matches!(size, Size::I64) { 4 } else { 2 });
        let word = move_wide(size.sf(), 0b11, hw, u32::from(imm16), rd.idx());
        self.emit_u32(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_emitter;
    use xlate_core::register::x;

    #[test]
    fn add_x0_x1_x2_matches_known_encoding() {
        let (backing, mut e) = make_emitter(4);
        e.add_shifted(Size::I64, x::R0.r(), x::R1.r(), x::R2.r(), ShiftType::Lsl, 0);
        assert_eq!(&backing[0..4], &0x8B02_0020u32.to_le_bytes());
    }

    #[test]
    fn movz_places_imm16_and_halfword_correctly() {
        let (backing, mut e) = make_emitter(4);
        e.movz(Size::I64, x::R0.r(), 0x1234, 0);
        let word = u32::from_le_bytes(backing[0..4].try_into().unwrap());
        assert_eq!((word >> 5) & 0xFFFF, 0x1234);
        assert_eq!(word & 0x1F, 0);
    }

    #[test]
    fn mov_reg_is_orr_with_zero_register() {
        let (backing, mut e) = make_emitter(4);
        e.mov_reg(Size::I64, x::R0.r(), x::R5.r());
        let word = u32::from_le_bytes(backing[0..4].try_into().unwrap());
        assert_eq!((word >> 16) & 0x1F, 5); // Rm
        assert_eq!((word >> 5) & 0x1F, 31); // Rn = zr
    }
}
