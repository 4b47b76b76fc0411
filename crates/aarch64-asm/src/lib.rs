//! A low-overhead AArch64/ASIMD/SVE machine-code emitter.
//!
//! `Emitter` wraps an `xlate_core::Buffer` cursor; every other module in
//! this crate (`alu`, `branch`, `loadstore`, `system`, `scalar_fp`, `asimd`,
//! `sve`) just adds inherent methods to it grouped by instruction family,
//! the way the teacher splits a CPU's opcode table across files. Label
//! patching (forward/backward/bidirectional) lives in `emitter` since it's
//! the one piece of bookkeeping every family needs.

pub mod alu;
pub mod asimd;
pub mod branch;
pub mod emitter;
pub mod loadstore;
pub mod scalar_fp;
pub mod system;
pub mod sve;

pub use emitter::Emitter;
