//! Per-block compile driver (spec §4 end-to-end): buffer margin check,
//! header/tail emission, per-op dispatch (native encoder or fallback ABI),
//! RIP-reconstruction table, cache insertion, icache flush.

use aarch64_asm::Emitter;
use xlate_core::error::TranslatorFault;
use xlate_core::icache::IcacheFlush;
use xlate_core::ir::{IrBlock, IrListView, RegisterAllocationData};
use xlate_core::register::{x, ExtendType, Register, Size};
use xlate_core::state::{CpuStateFrame, JitRipEntry};

use crate::buffer_manager::BufferManager;
use crate::fallback_abi::{emit_fallback_call, FallbackCallPlan, STATE_REGISTER};
use crate::stats::JitStats;

/// Scratch register for the prologue's `adr`/sp-adjustment sequence. Shares
/// `linker::INDIRECT_SCRATCH`'s register (x16, AAPCS64 inter-procedure
/// scratch) — never live across the two uses within one block.
const PROLOGUE_SCRATCH: xlate_core::register::XRegister = x::R16;

/// Bytes reserved per allocator spill slot (large enough for one vector
/// register), matching the reference JIT's `MaxSpillSlotSize`.
const SPILL_SLOT_SIZE: u32 = 16;

fn inline_jit_block_header_offset() -> usize {
    std::mem::offset_of!(CpuStateFrame, inline_jit_block_header)
}

fn interrupt_fault_page_offset() -> usize {
    std::mem::offset_of!(CpuStateFrame, interrupt_fault_page)
}

/// `sub sp, sp, #total_bytes`, widening to a movz/movk-loaded register when
/// the immediate doesn't fit the 12-bit add/sub-immediate encoding.
fn emit_sp_adjust(e: &mut Emitter, total_bytes: u32) {
    if total_bytes == 0 {
        return;
    }
    if total_bytes < 4096 {
        e.sub_imm(Size::I64, Register::new(x::SP.idx()), Register::new(x::SP.idx()), total_bytes);
    } else {
        e.movz(Size::I64, Register::new(PROLOGUE_SCRATCH.idx()), (total_bytes & 0xFFFF) as u16, 0);
        if total_bytes >> 16 != 0 {
            e.movk(Size::I64, Register::new(PROLOGUE_SCRATCH.idx()), (total_bytes >> 16) as u16, 1);
        }
        e.sub_extended(
            Size::I64,
            Register::new(x::SP.idx()),
            Register::new(x::SP.idx()),
            Register::new(PROLOGUE_SCRATCH.idx()),
            ExtendType::Uxtx,
            0,
        );
    }
}

/// The pluggable per-opcode native encoder. A real front end supplies one
/// implementation per supported IR opcode set; `encode` returns `false` to
/// signal "I don't have a native form for this op", which sends the driver
/// down the fallback ABI path instead (if the op carries a
/// `fallback_handler_id`) or fails the compile with
/// [`TranslatorFault::UnknownOp`].
pub trait NativeOpEncoder {
    fn encode(
        &self,
        emitter: &mut Emitter,
        op: &xlate_core::ir::IrOp,
        alloc: &dyn RegisterAllocationData,
    ) -> bool;
}

/// An encoder with no native ops at all — every op with a
/// `fallback_handler_id` goes through the fallback ABI, everything else
/// fails the compile. Useful for driving this crate's own tests without a
/// real opcode table.
pub struct NoNativeOps;

impl NativeOpEncoder for NoNativeOps {
    fn encode(
        &self,
        _emitter: &mut Emitter,
        _op: &xlate_core::ir::IrOp,
        _alloc: &dyn RegisterAllocationData,
    ) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompiledBlock {
    pub guest_entry: u64,
    pub host_entry: u64,
    pub size: u32,
}

pub struct JitDriver<'a, E, I> {
    buffers: BufferManager,
    encoder: &'a E,
    icache: &'a I,
    stats: JitStats,
}

impl<'a, E: NativeOpEncoder, I: IcacheFlush> JitDriver<'a, E, I> {
    pub fn new(buffers: BufferManager, encoder: &'a E, icache: &'a I) -> Self {
        Self {
            buffers,
            encoder,
            icache,
            stats: JitStats::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &JitStats {
        &self.stats
    }

    #[must_use]
    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Compile every block of `unit`, appending to the current buffer
    /// (rolling to a fresh one first if the margin check fails), and
    /// register each block's guest entry in that buffer's lookup cache.
    pub fn compile_block(
        &mut self,
        unit: &dyn IrListView,
        alloc: &dyn RegisterAllocationData,
    ) -> Result<Vec<CompiledBlock>, TranslatorFault> {
        let mut compiled = Vec::with_capacity(unit.blocks().len());
        let mut guest_rip = unit.entry_guest_address();

        for block in unit.blocks() {
            let estimate = estimate_block_bytes(block);
            let written = self.buffers.current_buffer().written_len();
            if self.buffers.needs_roll(written + estimate) {
                self.buffers.roll(&self.stats, self.icache)?;
            }

            let result = self.compile_one_block(block, alloc, guest_rip)?;
            self.buffers
                .current_cache()
                .insert(guest_rip, result.host_entry);
            self.stats.record_block_compiled();
            compiled.push(result);

            guest_rip = block.fallthrough_target.unwrap_or(guest_rip);
        }

        Ok(compiled)
    }

    fn compile_one_block(
        &mut self,
        block: &IrBlock,
        alloc: &dyn RegisterAllocationData,
        guest_rip: u64,
    ) -> Result<CompiledBlock, TranslatorFault> {
        let buffer = self.buffers.current_buffer().clone();
        let mut emitter = Emitter::new(buffer.begin_write());
        let header_offset = emitter.cursor_offset();
        let host_entry = buffer.base() as u64 + header_offset as u64;

        // `JitCodeHeader { offset_to_block_tail: u64 }`, patched below once
        // the tail's real offset is known.
        emitter.emit_u32(0);
        emitter.emit_u32(0);

        // Prologue: record this block's header address in the state frame
        // so an async signal can recover "what block am I in", optionally
        // probe the interrupt-fault page, and reserve the allocator's spill
        // slots on the stack.
        let adr_site_offset = emitter.cursor_offset();
        emitter.adr_raw(PROLOGUE_SCRATCH, header_offset as i64 - adr_site_offset as i64);
        emitter.str_imm(
            Size::I64,
            Register::new(PROLOGUE_SCRATCH.idx()),
            STATE_REGISTER,
            inline_jit_block_header_offset() as u32,
        );
        if self.buffers.config().needs_pending_interrupt_fault_check {
            emitter.str_imm(
                Size::I64,
                Register::new(x::ZR.idx()),
                STATE_REGISTER,
                interrupt_fault_page_offset() as u32,
            );
        }
        emit_sp_adjust(&mut emitter, alloc.spill_slot_count() * SPILL_SLOT_SIZE);

        let mut rip_entries = Vec::new();
        let mut last_host_pc = host_entry;
        let mut last_guest_rip = guest_rip;

        for op in &block.ops {
            let encoded = self.encoder.encode(&mut emitter, op, alloc);
            if !encoded {
                match op.fallback_handler_id {
                    Some(handler_id) => {
                        let plan = FallbackCallPlan {
                            handler_id,
                            gpr_args: Vec::new(),
                            fpr_args: Vec::new(),
                        };
                        emit_fallback_call(&mut emitter, &plan, crate::linker::INDIRECT_SCRATCH);
                        self.stats.record_fallback_call();
                    }
                    None => return Err(TranslatorFault::UnknownOp { opcode: op.opcode }),
                }
            }

            let host_pc = buffer.base() as u64 + emitter.cursor_offset() as u64;
            rip_entries.push(JitRipEntry {
                host_pc_delta: (host_pc as i64 - last_host_pc as i64) as i32,
                guest_rip_delta: (guest_rip as i64 - last_guest_rip as i64) as i32,
            });
            last_host_pc = host_pc;
            last_guest_rip = guest_rip;
        }

        let tail_offset = emitter.cursor_offset();
        let offset_to_tail = (tail_offset - header_offset) as u64;
        emitter.with_cursor_at(header_offset, |e| {
            e.emit_u32((offset_to_tail & 0xFFFF_FFFF) as u32);
            e.emit_u32((offset_to_tail >> 32) as u32);
        });

        // `JitCodeTail` header fields (spec §6.3): guest_rip, a reserved
        // futex word for the linker, block size, and the RIP-entries table
        // that follows immediately after.
        emitter.emit_u64(guest_rip);
        emitter.emit_u32(0); // spin_lock_futex, unlocked
        let size_field_offset = emitter.cursor_offset();
        emitter.emit_u32(0); // size, patched below
        emitter.emit_u32(rip_entries.len() as u32);
        emitter.emit_u32(0); // offset_to_rip_entries, patched below

        let rip_entries_offset = emitter.cursor_offset();
        for entry in &rip_entries {
            emitter.emit_u32(entry.host_pc_delta as u32);
            emitter.emit_u32(entry.guest_rip_delta as u32);
        }

        let block_end = emitter.cursor_offset();
        let block_size = (block_end - header_offset) as u32;
        emitter.with_cursor_at(size_field_offset, |e| {
            e.emit_u32(block_size);
            e.emit_u32(rip_entries.len() as u32);
            e.emit_u32((rip_entries_offset - header_offset) as u32);
        });

        let buf = emitter.into_buffer();
        let block_end_offset = buf.cursor_offset();
        buffer.commit_write(&buf);
        buffer.flush_icache_range(header_offset, block_end_offset, self.icache);

        Ok(CompiledBlock {
            guest_entry: guest_rip,
            host_entry,
            size: block_size,
        })
    }
}

fn estimate_block_bytes(block: &IrBlock) -> usize {
    // Conservative: header (8) + tail fixed fields (20) + prologue worst
    // case (adr+str 8, interrupt probe 4, movz+movk+sub_extended 12) +
    // worst case one fallback call (8 bytes) per op + one rip entry (8
    // bytes) per op.
    28 + 24 + block.ops.len() * 16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JitConfig;
    use xlate_core::icache::NoopIcache;
    use xlate_core::ir::{IrOp, MockUnit, OperandRef};

    fn tiny_config() -> JitConfig {
        JitConfig {
            initial_buffer_size: 64 * 1024,
            max_buffer_size: 256 * 1024,
            margin_bytes: 512,
            needs_pending_interrupt_fault_check: false,
        }
    }

    fn fallback_only_unit(guest_entry: u64) -> MockUnit {
        MockUnit {
            blocks: vec![IrBlock {
                ops: vec![IrOp {
                    opcode: 99,
                    size_bits: 64,
                    result_class: None,
                    operands: vec![OperandRef::Constant(0)],
                    fallback_handler_id: Some(7),
                }],
                fallthrough_target: None,
            }],
            entry: guest_entry,
            assignments: std::collections::HashMap::new(),
            spill_slots: 0,
        }
    }

    #[test]
    fn compiles_one_fallback_block_and_registers_it_in_the_cache() {
        let buffers = BufferManager::new(tiny_config()).unwrap();
        let encoder = NoNativeOps;
        let icache = NoopIcache;
        let mut driver = JitDriver::new(buffers, &encoder, &icache);

        let unit = fallback_only_unit(0x4000_0000);
        let compiled = driver.compile_block(&unit, &unit).unwrap();

        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].guest_entry, 0x4000_0000);
        assert_eq!(driver.stats().fallback_calls.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(
            driver.buffers().current_cache().lookup(0x4000_0000),
            Some(compiled[0].host_entry)
        );
    }

    #[test]
    fn unknown_op_with_no_fallback_handler_fails_compile() {
        let buffers = BufferManager::new(tiny_config()).unwrap();
        let encoder = NoNativeOps;
        let icache = NoopIcache;
        let mut driver = JitDriver::new(buffers, &encoder, &icache);

        let mut unit = fallback_only_unit(0x1000);
        unit.blocks[0].ops[0].fallback_handler_id = None;

        let err = driver.compile_block(&unit, &unit).unwrap_err();
        assert!(matches!(err, TranslatorFault::UnknownOp { opcode: 99 }));
    }

    fn read_u32_at(base: *mut u8, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        unsafe { std::ptr::copy_nonoverlapping(base.add(offset), bytes.as_mut_ptr(), 4) };
        u32::from_le_bytes(bytes)
    }

    #[test]
    fn prologue_opens_with_adr_then_str_of_the_block_header() {
        let buffers = BufferManager::new(tiny_config()).unwrap();
        let encoder = NoNativeOps;
        let icache = NoopIcache;
        let mut driver = JitDriver::new(buffers, &encoder, &icache);

        let unit = fallback_only_unit(0x4000_0000);
        let compiled = driver.compile_block(&unit, &unit).unwrap();
        let base = driver.buffers().current_buffer().base();
        let header_offset = (compiled[0].host_entry - base as u64) as usize;

        let adr_word = read_u32_at(base, header_offset + 8);
        assert_eq!((adr_word >> 24) & 0x1F, 0b10000); // ADR's fixed opcode bits
        let str_word = read_u32_at(base, header_offset + 12);
        assert_eq!(str_word >> 24, 0xF9); // sf=1, 111, opc=01 for a 64-bit STR unsigned-offset
    }

    #[test]
    fn spill_slots_emit_a_stack_pointer_adjustment() {
        let buffers = BufferManager::new(tiny_config()).unwrap();
        let encoder = NoNativeOps;
        let icache = NoopIcache;
        let mut driver = JitDriver::new(buffers, &encoder, &icache);

        let mut unit = fallback_only_unit(0x1000);
        unit.spill_slots = 2;
        let compiled = driver.compile_block(&unit, &unit).unwrap();
        let base = driver.buffers().current_buffer().base();
        let header_offset = (compiled[0].host_entry - base as u64) as usize;

        // header(8) + adr(4) + str(4) = offset 16 for the sub-immediate word.
        let sub_word = read_u32_at(base, header_offset + 16);
        assert_eq!(sub_word >> 30, 0b11); // sf=1, op=1 (sub)
        assert_eq!((sub_word >> 10) & 0xFFF, 32); // 2 slots * 16 bytes
    }

    #[test]
    fn interrupt_fault_check_adds_one_more_store() {
        let mut config = tiny_config();
        config.needs_pending_interrupt_fault_check = true;
        let buffers = BufferManager::new(config).unwrap();
        let encoder = NoNativeOps;
        let icache = NoopIcache;
        let mut driver = JitDriver::new(buffers, &encoder, &icache);

        let unit = fallback_only_unit(0x1000);
        let without_check_buffers = BufferManager::new(tiny_config()).unwrap();
        let mut without_check_driver = JitDriver::new(without_check_buffers, &encoder, &icache);
        let with_check = driver.compile_block(&unit, &unit).unwrap();
        let without_check = without_check_driver.compile_block(&unit, &unit).unwrap();

        assert_eq!(with_check[0].size, without_check[0].size + 4);
    }
}
