//! Property #9: the RIP-reconstruction table the driver emits alongside a
//! compiled block is consistent with `xlate_core::state::reconstruct_guest_rip`.

use jit_core::buffer_manager::BufferManager;
use jit_core::config::JitConfig;
use jit_core::driver::{JitDriver, NoNativeOps};
use xlate_core::icache::NoopIcache;
use xlate_core::ir::{IrBlock, IrOp, MockUnit, OperandRef};
use xlate_core::state::reconstruct_guest_rip;

fn config() -> JitConfig {
    JitConfig {
        initial_buffer_size: 64 * 1024,
        max_buffer_size: 256 * 1024,
        margin_bytes: 512,
        needs_pending_interrupt_fault_check: false,
    }
}

fn three_op_fallback_unit(entry: u64) -> MockUnit {
    let op = |id| IrOp {
        opcode: 50 + id,
        size_bits: 64,
        result_class: None,
        operands: vec![OperandRef::Constant(0)],
        fallback_handler_id: Some(id),
    };
    MockUnit {
        blocks: vec![IrBlock {
            ops: vec![op(0), op(1), op(2)],
            fallthrough_target: None,
        }],
        entry,
        assignments: std::collections::HashMap::new(),
        spill_slots: 0,
    }
}

#[test]
fn every_op_boundary_reconstructs_to_the_block_entry_guest_rip() {
    let buffers = BufferManager::new(config()).unwrap();
    let encoder = NoNativeOps;
    let icache = NoopIcache;
    let mut driver = JitDriver::new(buffers, &encoder, &icache);

    let unit = three_op_fallback_unit(0x7777_0000);
    let compiled = driver.compile_block(&unit, &unit).unwrap();
    let block = &compiled[0];

    // Read the emitted tail's rip-entries table straight out of the
    // buffer, the way a fault handler would, instead of trusting a value
    // the driver kept around internally.
    let base = driver.buffers().current_buffer().base();
    let header_offset = (block.host_entry - base as u64) as usize;
    let read_u32 = |off: usize| -> u32 {
        // SAFETY: `off` is always within the block's already-committed bytes.
        unsafe { base.add(off).cast::<u32>().read_unaligned() }
    };
    let offset_to_tail = (read_u32(header_offset) as u64) | ((read_u32(header_offset + 4) as u64) << 32);
    let tail_offset = header_offset + offset_to_tail as usize;

    let rip_entries_count = read_u32(tail_offset + 12);
    let offset_to_rip_entries = read_u32(tail_offset + 16) as usize;
    assert_eq!(rip_entries_count, 3, "one rip entry per fallback-called op");

    let mut entries = Vec::new();
    for i in 0..rip_entries_count as usize {
        let entry_offset = header_offset + offset_to_rip_entries + i * 8;
        entries.push(xlate_core::state::JitRipEntry {
            host_pc_delta: read_u32(entry_offset) as i32,
            guest_rip_delta: read_u32(entry_offset + 4) as i32,
        });
    }

    // Straight-line fallback-only block: every op is attributed to the same
    // guest RIP (no per-op guest address advance without a real decoder),
    // so reconstruction at any host PC within the block must yield the
    // block's own entry guest RIP.
    for probe in [block.host_entry, block.host_entry + 4, block.host_entry + block.size as u64 - 1] {
        let rip = reconstruct_guest_rip(block.host_entry, block.guest_entry, &entries, probe);
        assert_eq!(rip, block.guest_entry);
    }
}
