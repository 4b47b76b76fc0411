//! Property #8: a code buffer's trailing guard page is mapped separately
//! from the writable region and never grows the usable size a caller asked
//! for.

use jit_core::code_buffer::{BufferState, CodeBuffer, GUARD_PAGE_SIZE};
use xlate_core::icache::NoopIcache;

#[test]
fn two_buffers_from_the_same_process_do_not_alias() {
    let a = CodeBuffer::allocate(4096).unwrap();
    let b = CodeBuffer::allocate(4096).unwrap();
    assert_ne!(a.base(), b.base());
}

#[test]
fn guard_page_sits_immediately_past_usable_size() {
    let buf = CodeBuffer::allocate(8192).unwrap();
    let guard_start = buf.base().wrapping_add(buf.usable_size());
    // Distance from usable-region end to guard end is exactly one guard page.
    assert_eq!(guard_start.wrapping_add(GUARD_PAGE_SIZE), buf.base().wrapping_add(8192 + GUARD_PAGE_SIZE));
}

#[test]
fn full_lifecycle_write_seal_retain() {
    let buf = CodeBuffer::allocate(4096).unwrap();
    assert_eq!(buf.state(), BufferState::Empty);

    let mut cursor = buf.begin_write();
    cursor.emit_u32(0xD503_201F); // nop
    buf.commit_write(&cursor);
    assert_eq!(buf.state(), BufferState::Writable);

    buf.seal(&NoopIcache);
    assert_eq!(buf.state(), BufferState::Sealed);

    buf.mark_retained();
    assert_eq!(buf.state(), BufferState::Retained);
}
