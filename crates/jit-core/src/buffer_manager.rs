//! Owns the current writable [`CodeBuffer`] plus one [`LookupCache`] per
//! buffer (spec §4.5: "each code buffer owns its own guest->host lookup
//! cache"), and rolls to a fresh buffer when the margin check fails.

use std::sync::Arc;

use xlate_cache::LookupCache;
use xlate_core::error::TranslatorFault;
use xlate_core::icache::IcacheFlush;

use crate::code_buffer::CodeBuffer;
use crate::config::JitConfig;
use crate::stats::JitStats;

struct Slot {
    buffer: Arc<CodeBuffer>,
    cache: LookupCache,
}

pub struct BufferManager {
    config: JitConfig,
    current: Slot,
    /// Buffers rolled away from but not yet safe to drop (spec §4.5
    /// `Retained`): a linker delink closure may still hold an `Arc` to one
    /// of these even after the manager itself stops writing into it.
    retained: Vec<Arc<CodeBuffer>>,
}

impl BufferManager {
    pub fn new(config: JitConfig) -> std::io::Result<Self> {
        let buffer = CodeBuffer::allocate(config.initial_buffer_size)?;
        Ok(Self {
            config,
            current: Slot {
                buffer,
                cache: LookupCache::new(),
            },
            retained: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> JitConfig {
        self.config
    }

    #[must_use]
    pub fn current_buffer(&self) -> &Arc<CodeBuffer> {
        &self.current.buffer
    }

    #[must_use]
    pub fn current_cache(&self) -> &LookupCache {
        &self.current.cache
    }

    /// True when fewer than `margin_bytes` remain writable past `cursor_offset`.
    #[must_use]
    pub fn needs_roll(&self, cursor_offset: usize) -> bool {
        self.current
            .buffer
            .usable_size()
            .saturating_sub(cursor_offset)
            < self.config.margin_bytes
    }

    /// Retire the current buffer and allocate a new, larger one with a fresh
    /// cache. If some other `Arc<CodeBuffer>` clone is still alive (a
    /// signal handler or in-flight host call may still be executing inside
    /// it), the old buffer is kept on the `retained` side list marked
    /// `Retained`; otherwise it's marked `Freed` and dropped immediately
    /// (spec §4.5: "if the previous buffer still has references..., retain
    /// it...; otherwise drop the list").
    pub fn roll(&mut self, stats: &JitStats, icache: &impl IcacheFlush) -> Result<(), TranslatorFault> {
        let current_size = self.current.buffer.usable_size();
        if current_size >= self.config.max_buffer_size {
            return Err(TranslatorFault::BufferExhausted {
                requested: current_size * 2,
                max: self.config.max_buffer_size,
            });
        }
        let new_size = (current_size * 2).min(self.config.max_buffer_size);
        let new_buffer = CodeBuffer::allocate(new_size).map_err(|_| TranslatorFault::BufferExhausted {
            requested: new_size,
            max: self.config.max_buffer_size,
        })?;
        self.current.buffer.seal(icache);
        let old = std::mem::replace(
            &mut self.current,
            Slot {
                buffer: new_buffer,
                cache: LookupCache::new(),
            },
        );
        if Arc::strong_count(&old.buffer) > 1 {
            old.buffer.mark_retained();
            self.retained.push(old.buffer);
        } else {
            old.buffer.mark_freed();
        }
        self.retained.retain(|b| {
            if Arc::strong_count(b) > 1 {
                true
            } else {
                b.mark_freed();
                false
            }
        });
        stats.record_buffer_roll();
        Ok(())
    }

    #[must_use]
    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }
}
