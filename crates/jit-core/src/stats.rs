//! Counters printed on demand via `eprintln!` (spec §4.6) — no `log`/
//! `tracing` dependency, matching the reference workspace.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct JitStats {
    pub blocks_compiled: AtomicU64,
    pub cache_misses: AtomicU64,
    pub buffer_rolls: AtomicU64,
    pub fallback_calls: AtomicU64,
}

impl JitStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block_compiled(&self) {
        self.blocks_compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buffer_roll(&self) {
        self.buffer_rolls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_call(&self) {
        self.fallback_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn print_summary(&self) {
        eprintln!(
            "jit stats: blocks={} misses={} rolls={} fallback_calls={}",
            self.blocks_compiled.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.buffer_rolls.load(Ordering::Relaxed),
            self.fallback_calls.load(Ordering::Relaxed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let stats = JitStats::new();
        stats.record_block_compiled();
        stats.record_block_compiled();
        stats.record_cache_miss();
        assert_eq!(stats.blocks_compiled.load(Ordering::Relaxed), 2);
        assert_eq!(stats.cache_misses.load(Ordering::Relaxed), 1);
        assert_eq!(stats.buffer_rolls.load(Ordering::Relaxed), 0);
    }
}
