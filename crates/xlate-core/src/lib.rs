//! Shared register, buffer, label, ABI, and error types for the AArch64
//! host translator workspace.
//!
//! Everything here is data or pure bookkeeping. Nothing in this crate
//! knows how to encode an instruction (`aarch64-asm`), cache a translation
//! (`xlate-cache`), or drive a compile (`jit-core`) — this crate just gives
//! those three a common vocabulary.

pub mod buffer;
pub mod error;
pub mod icache;
pub mod ir;
pub mod label;
pub mod register;
pub mod state;

pub use buffer::Buffer;
pub use error::{EncodeError, TranslatorFault};
pub use register::{
    BReg, Condition, DReg, ExtendType, HReg, PRegister, PredMode, PredicatePattern, QReg,
    Register, SReg, ShiftType, Size, SubRegSize, VRegister, WRegister, XRegister, ZRegister,
};
