//! RWX code buffer allocation and lifecycle (spec §3 "Code buffer", §4.5).
//!
//! State machine: `Empty -> Writable -> Sealed -> (Retained | Freed)`.
//! `Retained` is a bookkeeping label the buffer manager applies when it
//! rolls away from a buffer that a signal handler or in-flight host call
//! might still be executing inside; the memory itself stays mapped for as
//! long as any `Arc<CodeBuffer>` clone exists, retained or not — `Freed`
//! just means the manager has dropped its own reference.
//!
//! mmap/mprotect via `libc` directly (spec §6.4) rather than a memmap
//! abstraction crate, matching the reference workspace's habit of reaching
//! for raw host primitives at this kind of boundary (`cpal`/`wgpu` raw
//! handles).

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use xlate_core::buffer::Buffer;
use xlate_core::icache::IcacheFlush;

pub const GUARD_PAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferState {
    Empty = 0,
    Writable = 1,
    Sealed = 2,
    Retained = 3,
    Freed = 4,
}

impl BufferState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Empty,
            1 => Self::Writable,
            2 => Self::Sealed,
            3 => Self::Retained,
            _ => Self::Freed,
        }
    }
}

struct Mapping {
    base: *mut u8,
    mapped_size: usize,
}

// SAFETY: the mapping is only ever written through `CodeBuffer::begin_write`,
// which callers serialize themselves (single writer per buffer).
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `base`/`mapped_size` describe exactly the region this
        // struct's constructor mmap'd, never otherwise unmapped.
        unsafe {
            libc::munmap(self.base.cast(), self.mapped_size);
        }
    }
}

pub struct CodeBuffer {
    mapping: Mapping,
    usable_size: usize,
    state: AtomicU8,
    /// How much of this buffer has been committed by a prior
    /// `commit_write`; the next `begin_write` resumes right after it, so a
    /// buffer can hold many compiled blocks back-to-back.
    write_offset: AtomicUsize,
}

impl CodeBuffer {
    /// Allocate `usable_size` bytes of RWX memory plus a trailing
    /// [`GUARD_PAGE_SIZE`]-byte guard with write permission removed.
    pub fn allocate(usable_size: usize) -> std::io::Result<Arc<Self>> {
        let mapped_size = usable_size + GUARD_PAGE_SIZE;
        // SAFETY: standard anonymous mapping request; checked for MAP_FAILED below.
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped_size,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error());
        }
        let base = base.cast::<u8>();
        // SAFETY: `base + usable_size` is within the just-created mapping.
        let guard_rc = unsafe {
            libc::mprotect(
                base.add(usable_size).cast(),
                GUARD_PAGE_SIZE,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if guard_rc != 0 {
            let err = std::io::Error::last_os_error();
            // SAFETY: undoing the mapping just created above.
            unsafe {
                libc::munmap(base.cast(), mapped_size);
            }
            return Err(err);
        }

        Ok(Arc::new(Self {
            mapping: Mapping { base, mapped_size },
            usable_size,
            state: AtomicU8::new(BufferState::Empty as u8),
            write_offset: AtomicUsize::new(0),
        }))
    }

    #[must_use]
    pub fn state(&self) -> BufferState {
        BufferState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn usable_size(&self) -> usize {
        self.usable_size
    }

    #[must_use]
    pub fn base(&self) -> *mut u8 {
        self.mapping.base
    }

    #[must_use]
    pub fn written_len(&self) -> usize {
        self.write_offset.load(Ordering::Acquire)
    }

    /// Borrow a cursor positioned at the end of previously committed
    /// writes, transitioning `Empty -> Writable` on first call. Pair with
    /// [`Self::commit_write`] once the caller is done emitting.
    pub fn begin_write(&self) -> Buffer {
        self.state
            .compare_exchange(
                BufferState::Empty as u8,
                BufferState::Writable as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok();
        assert_ne!(self.state(), BufferState::Sealed, "buffer already sealed");
        // SAFETY: `base` is valid for `usable_size` bytes for this buffer's lifetime.
        let mut buf = unsafe { Buffer::new(self.mapping.base, self.usable_size) };
        buf.set_cursor_offset(self.written_len());
        buf
    }

    /// Record how much of the buffer `buf`'s cursor advanced to as
    /// committed. Callers must pass back the same cursor `begin_write`
    /// handed out (or one derived from it) after each block they emit.
    pub fn commit_write(&self, buf: &Buffer) {
        self.write_offset.store(buf.cursor_offset(), Ordering::Release);
    }

    /// Flush the instruction cache over `[base+start, base+end)` so a block
    /// just written into that range is safe to execute. Does not change
    /// buffer state — a `Writable` buffer stays `Writable` and can still
    /// receive the next block (spec §4.5: a buffer accumulates many
    /// compiled blocks before the manager decides to roll away from it).
    pub fn flush_icache_range(&self, start: usize, end: usize, icache: &impl IcacheFlush) {
        assert!(end <= self.usable_size);
        // SAFETY: `start`/`end` lie within the mapped, RWX region.
        unsafe {
            icache.flush(self.mapping.base.add(start), self.mapping.base.add(end));
        }
    }

    /// Flush the instruction cache over everything written so far and mark
    /// the buffer `Sealed`: no further blocks will be compiled into it
    /// (the manager has decided to roll away). Further writes through a
    /// previously-obtained cursor are still memory-safe (the mapping stays
    /// writable) but violate the state machine the manager relies on.
    pub fn seal(&self, icache: &impl IcacheFlush) {
        let written = self.written_len();
        // SAFETY: `written <= usable_size` by construction of `commit_write`.
        unsafe {
            icache.flush(self.mapping.base, self.mapping.base.add(written));
        }
        self.state.store(BufferState::Sealed as u8, Ordering::Release);
    }

    pub fn mark_retained(&self) {
        self.state.store(BufferState::Retained as u8, Ordering::Release);
    }

    pub fn mark_freed(&self) {
        self.state.store(BufferState::Freed as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlate_core::icache::NoopIcache;

    #[test]
    fn allocate_reserves_usable_size_plus_guard() {
        let buf = CodeBuffer::allocate(64 * 1024).unwrap();
        assert_eq!(buf.usable_size(), 64 * 1024);
        assert_eq!(buf.state(), BufferState::Empty);
    }

    #[test]
    fn begin_write_transitions_empty_to_writable_once() {
        let buf = CodeBuffer::allocate(4096).unwrap();
        let mut cursor = buf.begin_write();
        assert_eq!(buf.state(), BufferState::Writable);
        cursor.emit_u32(0xD503_201F);
        let _second = buf.begin_write();
        assert_eq!(buf.state(), BufferState::Writable);
    }

    #[test]
    fn commit_write_advances_subsequent_begin_write() {
        let buf = CodeBuffer::allocate(4096).unwrap();
        let mut cursor = buf.begin_write();
        cursor.emit_u32(0xD503_201F);
        buf.commit_write(&cursor);
        assert_eq!(buf.written_len(), 4);
        let second = buf.begin_write();
        assert_eq!(second.cursor_offset(), 4);
    }

    #[test]
    fn seal_transitions_to_sealed() {
        let buf = CodeBuffer::allocate(4096).unwrap();
        let mut cursor = buf.begin_write();
        cursor.emit_u32(0xD503_201F);
        buf.commit_write(&cursor);
        buf.seal(&NoopIcache);
        assert_eq!(buf.state(), BufferState::Sealed);
    }

    #[test]
    fn flush_icache_range_does_not_change_state() {
        let buf = CodeBuffer::allocate(4096).unwrap();
        let mut cursor = buf.begin_write();
        cursor.emit_u32(0xD503_201F);
        buf.commit_write(&cursor);
        buf.flush_icache_range(0, 4, &NoopIcache);
        assert_eq!(buf.state(), BufferState::Writable);
        // a second block can still be written after the flush
        let second = buf.begin_write();
        assert_eq!(second.cursor_offset(), 4);
    }

    #[test]
    #[should_panic(expected = "sealed")]
    fn begin_write_after_seal_panics() {
        let buf = CodeBuffer::allocate(4096).unwrap();
        buf.seal(&NoopIcache);
        let _ = buf.begin_write();
    }

    #[test]
    fn guard_page_immediately_follows_usable_region() {
        // The write-protection on the guard page itself isn't exercised
        // here (that would SIGSEGV this test process); see
        // `tests/buffer_isolation.rs` for the out-of-process check.
        let buf = CodeBuffer::allocate(4096).unwrap();
        let guard = buf.base().wrapping_add(buf.usable_size());
        assert!(!guard.is_null());
    }
}
