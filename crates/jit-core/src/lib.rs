//! Code buffer lifecycle, cross-block linking, fallback ABI marshalling,
//! and the per-unit JIT compile driver.
//!
//! This crate is the glue: `aarch64-asm` knows how to encode instructions,
//! `xlate-cache` knows how to look up and link compiled blocks, and this
//! crate is what actually owns executable memory and walks an IR unit
//! through both of them.

pub mod buffer_manager;
pub mod code_buffer;
pub mod config;
pub mod driver;
pub mod fallback_abi;
pub mod linker;
pub mod stats;

pub use buffer_manager::BufferManager;
pub use code_buffer::{BufferState, CodeBuffer};
pub use config::JitConfig;
pub use driver::{CompiledBlock, JitDriver, NativeOpEncoder, NoNativeOps};
pub use linker::{link_exit, ExitSite, LinkOutcome};
pub use stats::JitStats;
