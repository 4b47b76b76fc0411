//! Error taxonomy (see spec §7), from recoverable to fatal.
//!
//! Recoverable conditions (cache miss, L2 exhaustion, buffer margin) are
//! modeled as `Option`/`Result` return values in the crates that produce
//! them and never appear here. This enum covers the conditions that are
//! surfaced as `Result` at encode/bind time but are still, in practice,
//! programmer errors rather than something a caller is expected to handle —
//! matching `format-adf::AdfError`'s shape rather than pulling in
//! `thiserror`.

use std::fmt;

use crate::label::PatchKind;

#[derive(Debug)]
pub enum EncodeError {
    /// A label bind computed an offset that doesn't fit the referring
    /// instruction's patch style.
    LabelOutOfRange { kind: PatchKind, offset: i64 },
    /// An operand violated an encoder's precondition (register class,
    /// immediate range, size). Only raised in debug builds; encoders elide
    /// the check in release (see spec §7).
    InvalidOperand { reason: &'static str },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabelOutOfRange { kind, offset } => {
                write!(f, "label offset {offset} out of range for patch style {kind:?}")
            }
            Self::InvalidOperand { reason } => write!(f, "invalid operand: {reason}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Fatal conditions raised by the JIT driver and lookup cache (spec §7).
/// Like [`EncodeError`], these are programmer/configuration errors, not
/// something a caller retries — every variant here is paired with a
/// `panic!` at the call site in practice; the type exists so tests can
/// assert on *which* fatal condition fired without parsing a panic message.
#[derive(Debug)]
pub enum TranslatorFault {
    /// The IR carried an opcode with neither a native encoding nor a
    /// fallback handler id.
    UnknownOp { opcode: u32 },
    /// A debug-only register class/size precondition failed.
    InvalidRegisterClass { reason: &'static str },
    /// The code buffer manager could not roll to a new buffer (e.g. the
    /// configured maximum buffer size was already in use).
    BufferExhausted { requested: usize, max: usize },
}

impl fmt::Display for TranslatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOp { opcode } => write!(f, "unknown IR opcode {opcode}"),
            Self::InvalidRegisterClass { reason } => write!(f, "invalid register class: {reason}"),
            Self::BufferExhausted { requested, max } => {
                write!(f, "requested buffer size {requested} exceeds configured max {max}")
            }
        }
    }
}

impl std::error::Error for TranslatorFault {}
