//! The IR surface the JIT driver consumes (spec §6.1). Decoding and
//! register allocation are external collaborators; this module only
//! describes the shape the driver reads, as traits, so the driver can be
//! exercised against a minimal mock without a real x86 front end.

/// A physical register an SSA value has been assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    Gpr(u32),
    GprFixed(u32),
    Fpr(u32),
    FprFixed(u32),
    Pred(u32),
    GprPair(u32, u32),
}

/// One operand reference: either another SSA value or an inline constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRef {
    Ssa(u32),
    Constant(i64),
}

/// One IR operation within a block.
#[derive(Debug, Clone)]
pub struct IrOp {
    pub opcode: u32,
    /// Operation width in bits: 8/16/32/64 for scalar, 64/128/256 for vector.
    pub size_bits: u32,
    pub result_class: Option<RegisterClass>,
    pub operands: Vec<OperandRef>,
    /// Non-`None` only for ops with no native encoding — the fallback ABI
    /// handler id (spec §4.4) to dispatch through instead.
    pub fallback_handler_id: Option<u32>,
}

/// One straight-line IR block: a sequence of ops with no internal control
/// flow, terminated by whatever exit semantics the last op carries.
pub struct IrBlock {
    pub ops: Vec<IrOp>,
    /// Guest address of the fall-through successor, if the block doesn't
    /// end in an unconditional exit.
    pub fallthrough_target: Option<u64>,
}

/// A view over the IR blocks making up one compilation unit, in the order
/// the driver should emit them.
pub trait IrListView {
    fn blocks(&self) -> &[IrBlock];
    fn entry_guest_address(&self) -> u64;
}

/// Register allocation results for one compilation unit (spec §6.1): a
/// physical assignment per SSA id, how many stack spill slots are needed,
/// and which operands live in a pinned "fixed" class.
pub trait RegisterAllocationData {
    fn physical_register(&self, ssa: u32) -> RegisterClass;
    fn spill_slot_count(&self) -> u32;
    fn is_fixed(&self, ssa: u32) -> bool;
}

/// A minimal in-memory `IrListView`/`RegisterAllocationData` pair for tests
/// that need a compilable unit without a real decoder/allocator.
pub struct MockUnit {
    pub blocks: Vec<IrBlock>,
    pub entry: u64,
    pub assignments: std::collections::HashMap<u32, RegisterClass>,
    pub spill_slots: u32,
}

impl IrListView for MockUnit {
    fn blocks(&self) -> &[IrBlock] {
        &self.blocks
    }

    fn entry_guest_address(&self) -> u64 {
        self.entry
    }
}

impl RegisterAllocationData for MockUnit {
    fn physical_register(&self, ssa: u32) -> RegisterClass {
        self.assignments
            .get(&ssa)
            .copied()
            .unwrap_or(RegisterClass::Gpr(0))
    }

    fn spill_slot_count(&self) -> u32 {
        self.spill_slots
    }

    fn is_fixed(&self, ssa: u32) -> bool {
        matches!(self.assignments.get(&ssa), Some(RegisterClass::GprFixed(_) | RegisterClass::FprFixed(_)))
    }
}
