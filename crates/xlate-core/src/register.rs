//! Register identities for the AArch64 emitter.
//!
//! Registers are small `Copy` value types carrying a 32-bit index and
//! nothing else. Converting between sizes (`Register::w()`/`Register::x()`)
//! is nominal: it's the same index, used under different encoding rules.
//! Encoders dispatch on the operation, not on the register's Rust type, so
//! unlike a decoder or IR this crate doesn't model register *classes* as an
//! enum of variants — it just tags indices.

/// An unsized general-purpose register index, `[0, 32)`.
///
/// Index 31 is either the stack pointer or the zero register depending on
/// the instruction that encodes it — the type carries no opinion on which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(u32);

impl Register {
    pub const SP: Register = Register(31);
    pub const ZR: Register = Register(31);

    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 32, "GPR index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn w(self) -> WRegister {
        WRegister(self.0)
    }

    #[must_use]
    pub const fn x(self) -> XRegister {
        XRegister(self.0)
    }
}

/// A 32-bit GPR view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WRegister(u32);

impl WRegister {
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 32, "GPR index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn r(self) -> Register {
        Register(self.0)
    }

    #[must_use]
    pub const fn x(self) -> XRegister {
        XRegister(self.0)
    }
}

/// A 64-bit GPR view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XRegister(u32);

impl XRegister {
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 32, "GPR index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn r(self) -> Register {
        Register(self.0)
    }

    #[must_use]
    pub const fn w(self) -> WRegister {
        WRegister(self.0)
    }
}

macro_rules! gpr_const_block {
    ($ty:ident, $modname:ident) => {
        #[allow(missing_docs)]
        pub mod $modname {
            use super::$ty;
            pub const R0: $ty = $ty::new(0);
            pub const R1: $ty = $ty::new(1);
            pub const R2: $ty = $ty::new(2);
            pub const R3: $ty = $ty::new(3);
            pub const R4: $ty = $ty::new(4);
            pub const R5: $ty = $ty::new(5);
            pub const R6: $ty = $ty::new(6);
            pub const R7: $ty = $ty::new(7);
            pub const R8: $ty = $ty::new(8);
            pub const R16: $ty = $ty::new(16);
            pub const R17: $ty = $ty::new(17);
            pub const R18: $ty = $ty::new(18);
            pub const R29: $ty = $ty::new(29);
            pub const R30: $ty = $ty::new(30);
            pub const SP: $ty = $ty::new(31);
            pub const ZR: $ty = $ty::new(31);
        }
    };
}
gpr_const_block!(WRegister, w);
gpr_const_block!(XRegister, x);

/// A vector/FP register index, `[0, 32)`, unsized like [`Register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VRegister(u32);

impl VRegister {
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 32, "vector register index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn b(self) -> BReg {
        BReg(self.0)
    }
    #[must_use]
    pub const fn h(self) -> HReg {
        HReg(self.0)
    }
    #[must_use]
    pub const fn s(self) -> SReg {
        SReg(self.0)
    }
    #[must_use]
    pub const fn d(self) -> DReg {
        DReg(self.0)
    }
    #[must_use]
    pub const fn q(self) -> QReg {
        QReg(self.0)
    }
}

macro_rules! scalar_fp_reg {
    ($name:ident) => {
        /// A sized scalar FP/vector-element register view.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            #[must_use]
            pub const fn idx(self) -> u32 {
                self.0
            }

            #[must_use]
            pub const fn v(self) -> VRegister {
                VRegister(self.0)
            }
        }
    };
}
scalar_fp_reg!(BReg);
scalar_fp_reg!(HReg);
scalar_fp_reg!(SReg);
scalar_fp_reg!(DReg);
scalar_fp_reg!(QReg);

/// An SVE scalable vector register index, `Z0..Z31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZRegister(u32);

impl ZRegister {
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 32, "SVE Z register index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }
}

/// An SVE predicate register index, `P0..P15`.
///
/// Predicate operands are either "merging" (`/M`) or "zeroing" (`/Z`)
/// depending on the instruction; that's a property of the use site, not the
/// register, so it's modeled as a separate argument rather than a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PRegister(u32);

impl PRegister {
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        assert!(idx < 16, "predicate register index out of range");
        Self(idx)
    }

    #[must_use]
    pub const fn idx(self) -> u32 {
        self.0
    }
}

/// Merge/zero predication mode for an SVE governing predicate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredMode {
    Merge,
    Zero,
}

/// ALU operating size, encoded directly into the `sf` bit (or equivalent).
///
/// Carried as a runtime value rather than a generic parameter so driver code
/// can pick it at the use site with a `match`/`csel`-shaped branch instead of
/// monomorphizing a whole code path per guest operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    I32,
    I64,
}

impl Size {
    #[must_use]
    pub const fn sf(self) -> u32 {
        match self {
            Size::I32 => 0,
            Size::I64 => 1,
        }
    }
}

/// AArch64 condition codes, used by `b.cond`, `csel`, and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Condition {
    Eq = 0b0000,
    Ne = 0b0001,
    Cs = 0b0010,
    Cc = 0b0011,
    Mi = 0b0100,
    Pl = 0b0101,
    Vs = 0b0110,
    Vc = 0b0111,
    Hi = 0b1000,
    Ls = 0b1001,
    Ge = 0b1010,
    Lt = 0b1011,
    Gt = 0b1100,
    Le = 0b1101,
    Al = 0b1110,
    Nv = 0b1111,
}

impl Condition {
    pub const ALL: [Condition; 16] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Cs,
        Condition::Cc,
        Condition::Mi,
        Condition::Pl,
        Condition::Vs,
        Condition::Vc,
        Condition::Hi,
        Condition::Ls,
        Condition::Ge,
        Condition::Lt,
        Condition::Gt,
        Condition::Le,
        Condition::Al,
        Condition::Nv,
    ];

    #[must_use]
    pub const fn encoding(self) -> u32 {
        self as u32
    }
}

/// Shift applied to the third operand of a shifted-register ALU op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftType {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftType {
    #[must_use]
    pub const fn encoding(self) -> u32 {
        match self {
            ShiftType::Lsl => 0b00,
            ShiftType::Lsr => 0b01,
            ShiftType::Asr => 0b10,
            ShiftType::Ror => 0b11,
        }
    }
}

/// Extension applied to the third operand of an extended-register ALU op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendType {
    Uxtb,
    Uxth,
    Uxtw,
    Uxtx,
    Sxtb,
    Sxth,
    Sxtw,
    Sxtx,
}

impl ExtendType {
    #[must_use]
    pub const fn encoding(self) -> u32 {
        match self {
            ExtendType::Uxtb => 0b000,
            ExtendType::Uxth => 0b001,
            ExtendType::Uxtw => 0b010,
            ExtendType::Uxtx => 0b011,
            ExtendType::Sxtb => 0b100,
            ExtendType::Sxth => 0b101,
            ExtendType::Sxtw => 0b110,
            ExtendType::Sxtx => 0b111,
        }
    }
}

/// ASIMD per-element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRegSize {
    I8,
    I16,
    I32,
    I64,
}

impl SubRegSize {
    #[must_use]
    pub const fn size_field(self) -> u32 {
        match self {
            SubRegSize::I8 => 0b00,
            SubRegSize::I16 => 0b01,
            SubRegSize::I32 => 0b10,
            SubRegSize::I64 => 0b11,
        }
    }
}

/// SVE `PTRUE`/counting-predicate patterns (`AArch64.SVEPredicateConstraint`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PredicatePattern {
    Pow2 = 0b00000,
    Vl1 = 0b00001,
    Vl2 = 0b00010,
    Vl3 = 0b00011,
    Vl4 = 0b00100,
    Vl5 = 0b00101,
    Vl6 = 0b00110,
    Vl7 = 0b00111,
    Vl8 = 0b01000,
    Vl16 = 0b01001,
    Vl32 = 0b01010,
    Vl64 = 0b01011,
    Vl128 = 0b01100,
    Vl256 = 0b01101,
    Mul4 = 0b11101,
    Mul3 = 0b11110,
    All = 0b11111,
}

impl PredicatePattern {
    pub const ALL: [PredicatePattern; 17] = [
        PredicatePattern::Pow2,
        PredicatePattern::Vl1,
        PredicatePattern::Vl2,
        PredicatePattern::Vl3,
        PredicatePattern::Vl4,
        PredicatePattern::Vl5,
        PredicatePattern::Vl6,
        PredicatePattern::Vl7,
        PredicatePattern::Vl8,
        PredicatePattern::Vl16,
        PredicatePattern::Vl32,
        PredicatePattern::Vl64,
        PredicatePattern::Vl128,
        PredicatePattern::Vl256,
        PredicatePattern::Mul4,
        PredicatePattern::Mul3,
        PredicatePattern::All,
    ];

    #[must_use]
    pub const fn encoding(self) -> u32 {
        self as u32
    }
}
