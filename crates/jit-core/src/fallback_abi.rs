//! Spill/fill and dispatch through `CommonPointers.fallback_handlers` for
//! IR ops with no native encoding (spec §4.4 "Fallback ABI").
//!
//! Up to 4 GPR and 2 FPR arguments are marshalled; anything beyond that is
//! out of scope for the core fallback path (spec Non-goals) and callers are
//! expected to lower such ops before they reach [`emit_fallback_call`].

use xlate_core::register::{Register, Size, XRegister};
use aarch64_asm::Emitter;

pub const MAX_GPR_ARGS: usize = 4;
pub const MAX_FPR_ARGS: usize = 2;

/// Which pinned register holds the live `CpuStateFrame*` across generated
/// code (spec §6.2): callee-saved, set up once by the dispatcher prologue.
pub const STATE_REGISTER: XRegister = xlate_core::register::x::R18;

/// One fallback call: which handler to invoke and where its arguments
/// currently live (already-allocated physical registers, by the time the
/// driver reaches this point).
#[derive(Debug, Clone)]
pub struct FallbackCallPlan {
    pub handler_id: u32,
    pub gpr_args: Vec<XRegister>,
    pub fpr_args: Vec<XRegister>,
}

fn fallback_handlers_offset() -> usize {
    std::mem::offset_of!(xlate_core::state::CpuStateFrame, pointers)
        + std::mem::offset_of!(xlate_core::state::CommonPointers, fallback_handlers)
}

/// Emit: spill the argument registers' pinned counterparts (none here — the
/// allocator already placed args in AAPCS64 argument registers by
/// construction), load the handler's function pointer out of the state
/// frame's `fallback_handlers` table, and `blr` it.
///
/// `scratch` must not alias any live argument register; the driver reserves
/// `x16` (the platform's IP0) for exactly this purpose.
pub fn emit_fallback_call(e: &mut Emitter, plan: &FallbackCallPlan, scratch: XRegister) {
    assert!(plan.gpr_args.len() <= MAX_GPR_ARGS, "fallback call takes at most 4 GPR args");
    assert!(plan.fpr_args.len() <= MAX_FPR_ARGS, "fallback call takes at most 2 FPR args");

    let table_offset = fallback_handlers_offset() + plan.handler_id as usize * 8;
    e.ldr_imm(
        Size::I64,
        Register::new(scratch.idx()),
        STATE_REGISTER,
        table_offset as u32,
    );
    e.blr(scratch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlate_core::buffer::Buffer;

    fn make_emitter(size: usize) -> (Vec<u8>, Emitter) {
        let mut backing = vec![0u8; size];
        let buf = unsafe { Buffer::new(backing.as_mut_ptr(), size) };
        (backing, Emitter::new(buf))
    }

    #[test]
    fn handler_table_offset_is_stable_regardless_of_padding() {
        let offset_a = fallback_handlers_offset();
        let offset_b = fallback_handlers_offset();
        assert_eq!(offset_a, offset_b);
        assert!(offset_a > 0);
    }

    #[test]
    fn emit_fallback_call_encodes_ldr_then_blr() {
        let (_backing, mut e) = make_emitter(4096);
        let plan = FallbackCallPlan {
            handler_id: 3,
            gpr_args: vec![xlate_core::register::x::R0, xlate_core::register::x::R1],
            fpr_args: vec![],
        };
        emit_fallback_call(&mut e, &plan, xlate_core::register::x::R16);
        let buf = e.into_buffer();
        assert_eq!(buf.cursor_offset(), 8);
    }

    #[test]
    #[should_panic(expected = "4 GPR")]
    fn too_many_gpr_args_panics() {
        let (_backing, mut e) = make_emitter(4096);
        let plan = FallbackCallPlan {
            handler_id: 0,
            gpr_args: vec![
                xlate_core::register::x::R0,
                xlate_core::register::x::R1,
                xlate_core::register::x::R2,
                xlate_core::register::x::R3,
                xlate_core::register::x::R4,
            ],
            fpr_args: vec![],
        };
        emit_fallback_call(&mut e, &plan, xlate_core::register::x::R16);
    }
}
