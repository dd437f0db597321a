// This module lowers a reduced, scheduled graph into an InstructionSequence. The selector
// walks the blocks in reverse of their final order and the nodes of each block backwards,
// so that by the time a node is visited every consumer below it has already decided
// whether it covers (fuses) the node into its own instruction. Instructions are still
// emitted top-down per node and per block control, and each just-emitted range is reversed
// in place; the final pass reads every block backwards, which restores program order. The
// target independent half (block and node dispatch, control flow, flags continuations,
// representation marks, frame state capture, the call buffer) lives here, while the
// target's own operand policies and opcodes live in the target module.

//! Instruction selection.
//!
//! - [`flags`]: condition codes and flags continuations
//! - [`instruction`]: instructions, operands and the instruction sequence
//! - [`linkage`]: call descriptors and parameter locations
//! - [`selector`]: the [`InstructionSelector`] driver

pub mod call_buffer;
pub mod flags;
pub mod instruction;
pub mod linkage;
pub mod operand;
pub mod selector;

pub use flags::{FlagsCondition, FlagsContinuation, FlagsMode};
pub use instruction::{
    AddressingMode, ArchOpcode, BlockRange, Constant, FrameStateDescriptor, Instruction,
    InstructionCode, InstructionOperand, InstructionSequence, OperandPolicy,
};
pub use linkage::{CallDescriptor, CallKind, Linkage, LinkageLocation, LocationKind};
pub use selector::InstructionSelector;

/// Target configuration the selector honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFeatures {
    /// Name used in diagnostics.
    pub name: &'static str,
    /// 64-bit wide integer operators can be lowered.
    pub word64: bool,
    /// Calls to a constant code object may encode the callee as an immediate.
    pub call_code_immediate: bool,
    /// Calls to a constant address may encode the callee as an immediate.
    pub call_address_immediate: bool,
}

impl TargetFeatures {
    pub const fn x64() -> Self {
        Self {
            name: "x64",
            word64: true,
            call_code_immediate: true,
            call_address_immediate: true,
        }
    }

    /// A 32-bit configuration: same instruction patterns, no 64-bit operators.
    pub const fn ia32() -> Self {
        Self {
            name: "ia32",
            word64: false,
            call_code_immediate: true,
            call_address_immediate: true,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x64" => Some(Self::x64()),
            "ia32" => Some(Self::ia32()),
            _ => None,
        }
    }
}

impl Default for TargetFeatures {
    fn default() -> Self {
        Self::x64()
    }
}
