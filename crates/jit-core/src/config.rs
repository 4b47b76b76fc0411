//! Runtime-tunable knobs, constructed by the embedding context (spec §4.6).
//! No config-file crate — the reference workspace doesn't carry one either.

#[derive(Debug, Clone, Copy)]
pub struct JitConfig {
    /// Size of the first code buffer allocated for a thread.
    pub initial_buffer_size: usize,
    /// Buffers double on roll up to this ceiling.
    pub max_buffer_size: usize,
    /// A block compile that would leave fewer than this many bytes free in
    /// the current buffer triggers a roll before compiling (spec §4.5
    /// "buffer margin exceeded").
    pub margin_bytes: usize,
    /// Whether every block's prologue probes `interrupt_fault_page` with a
    /// zero store, used only on hosts that deliver a pending-suspend
    /// interrupt this way (off by default, matching the reference
    /// workspace's Windows/suspend-only use of the check).
    pub needs_pending_interrupt_fault_check: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 16 * 1024 * 1024,
            max_buffer_size: 128 * 1024 * 1024,
            margin_bytes: 4096,
            needs_pending_interrupt_fault_check: false,
        }
    }
}
