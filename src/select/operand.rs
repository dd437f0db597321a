//! Operand construction.
//!
//! `define_*` creates an output operand for a node and marks the node as
//! defined, `use_*` creates an input operand and marks the node as used, so a
//! producer visited later knows it must still be materialized. Immediates do
//! not count as uses: the constant is encoded into the instruction.

use super::instruction::{Constant, InstructionOperand, OperandPolicy};
use super::linkage::{LinkageLocation, LocationKind};
use super::selector::InstructionSelector;
use crate::core::{CompileError, CompileResult};
use crate::ir::{BlockId, NodeId, Operator};

fn policy_for(location: LinkageLocation) -> OperandPolicy {
    match location.kind {
        LocationKind::Register(code) => OperandPolicy::FixedRegister(code),
        LocationKind::DoubleRegister(code) => OperandPolicy::FixedDoubleRegister(code),
        LocationKind::StackSlot(slot) => OperandPolicy::FixedSlot(slot),
        LocationKind::AnyRegister => OperandPolicy::MustHaveRegister,
    }
}

impl InstructionSelector<'_> {
    fn define(&mut self, node: NodeId, policy: OperandPolicy) -> InstructionOperand {
        self.mark_as_defined(node);
        InstructionOperand::unallocated(policy, node.as_u32())
    }

    fn use_with(&mut self, node: NodeId, policy: OperandPolicy, used_at_start: bool) -> InstructionOperand {
        self.mark_as_used(node);
        InstructionOperand::Unallocated {
            policy,
            vreg: node.as_u32(),
            used_at_start,
        }
    }

    pub(crate) fn define_as_any(&mut self, node: NodeId) -> InstructionOperand {
        self.define(node, OperandPolicy::Any)
    }

    pub(crate) fn define_as_register(&mut self, node: NodeId) -> InstructionOperand {
        self.define(node, OperandPolicy::MustHaveRegister)
    }

    pub(crate) fn define_as_double_register(&mut self, node: NodeId) -> InstructionOperand {
        self.define(node, OperandPolicy::MustHaveRegister)
    }

    pub(crate) fn define_same_as_first(&mut self, node: NodeId) -> InstructionOperand {
        self.define(node, OperandPolicy::SameAsFirstInput)
    }

    pub(crate) fn define_as_fixed(&mut self, node: NodeId, register: u8) -> InstructionOperand {
        self.define(node, OperandPolicy::FixedRegister(register))
    }

    pub(crate) fn define_as_location(&mut self, node: NodeId, location: LinkageLocation) -> InstructionOperand {
        self.define(node, policy_for(location))
    }

    /// Define `node` as its constant value. Every live range needs a
    /// definition, constants included.
    pub(crate) fn define_as_constant(&mut self, node: NodeId) -> CompileResult<InstructionOperand> {
        let constant = self.to_constant(node)?;
        self.mark_as_defined(node);
        self.sequence.add_constant(node.as_u32(), constant);
        Ok(InstructionOperand::Constant(node.as_u32()))
    }

    pub(crate) fn use_any(&mut self, node: NodeId) -> InstructionOperand {
        self.use_with(node, OperandPolicy::Any, true)
    }

    pub(crate) fn use_register(&mut self, node: NodeId) -> InstructionOperand {
        self.use_with(node, OperandPolicy::MustHaveRegister, true)
    }

    /// A register that no output of the instruction may share.
    pub(crate) fn use_unique_register(&mut self, node: NodeId) -> InstructionOperand {
        self.use_with(node, OperandPolicy::MustHaveRegister, false)
    }

    pub(crate) fn use_double_register(&mut self, node: NodeId) -> InstructionOperand {
        self.use_with(node, OperandPolicy::MustHaveRegister, true)
    }

    pub(crate) fn use_fixed(&mut self, node: NodeId, register: u8) -> InstructionOperand {
        self.use_with(node, OperandPolicy::FixedRegister(register), false)
    }

    pub(crate) fn use_location(&mut self, node: NodeId, location: LinkageLocation) -> InstructionOperand {
        self.use_with(node, policy_for(location), false)
    }

    pub(crate) fn use_immediate(&mut self, node: NodeId) -> CompileResult<InstructionOperand> {
        let constant = self.to_constant(node)?;
        Ok(InstructionOperand::Immediate(self.sequence.add_immediate(constant)))
    }

    pub(crate) fn temp_fixed_register(&mut self, register: u8) -> InstructionOperand {
        let vreg = self.sequence.next_virtual_register();
        InstructionOperand::unallocated(OperandPolicy::FixedRegister(register), vreg)
    }

    pub(crate) fn temp_immediate(&mut self, value: i32) -> InstructionOperand {
        InstructionOperand::Immediate(self.sequence.add_immediate(Constant::Int32(value)))
    }

    pub(crate) fn label(&self, block: BlockId) -> InstructionOperand {
        InstructionOperand::Label(block)
    }

    pub(crate) fn to_constant(&self, node: NodeId) -> CompileResult<Constant> {
        Ok(match *self.graph.op(node) {
            Operator::Int32Constant(v) => Constant::Int32(v),
            Operator::Int64Constant(v) => Constant::Int64(v),
            Operator::Float64Constant(v) | Operator::NumberConstant(v) => Constant::Float64(v),
            Operator::ExternalConstant(address) => Constant::ExternalReference(address),
            Operator::HeapConstant(object) => Constant::HeapObject(object),
            ref op => {
                return Err(CompileError::invariant(format!(
                    "{} ({}) is not a constant",
                    node,
                    op.mnemonic()
                )))
            }
        })
    }

    /// Whether `node` fits a 32-bit immediate field.
    pub(crate) fn can_be_immediate(&self, node: NodeId) -> bool {
        match *self.graph.op(node) {
            Operator::Int32Constant(_) => true,
            Operator::Int64Constant(v) => i32::try_from(v).is_ok(),
            _ => false,
        }
    }

    /// Immediate for constants the deoptimizer can materialize itself,
    /// otherwise a plain use.
    pub(crate) fn use_or_immediate(&mut self, node: NodeId) -> CompileResult<InstructionOperand> {
        match self.graph.op(node) {
            Operator::Int32Constant(_)
            | Operator::NumberConstant(_)
            | Operator::Float64Constant(_)
            | Operator::HeapConstant(_) => self.use_immediate(node),
            _ => Ok(self.use_any(node)),
        }
    }
}
