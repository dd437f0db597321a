// This module builds the operand lists of a call. The call's value inputs are split by the
// call descriptor: the callee and every argument with a register (or "any register")
// location become fixed operands of the call instruction itself, while arguments assigned
// a caller pushed stack slot are collected by slot so the target can push them, last slot
// first, right before the call. Outputs are the call itself for a single return value, or
// the projections that select each return value; a return value nobody projects gets no
// operand. Calls that may lazily deoptimize also carry the labels of their continuation
// and deoptimization blocks. All lists are scratch vectors in the session arena.

//! Call operand partitioning.

use bumpalo::{collections::Vec as BumpVec, Bump};

use super::instruction::InstructionOperand;
use super::linkage::{CallDescriptor, CallKind, LocationKind};
use super::selector::InstructionSelector;
use crate::core::{CompileError, CompileResult};
use crate::ir::{BlockId, NodeId, Operator};

/// Operands of one call, partitioned by how each argument is passed.
pub struct CallBuffer<'b> {
    pub descriptor: &'b CallDescriptor,
    /// Nodes receiving the return values, in return order.
    pub output_nodes: BumpVec<'b, NodeId>,
    pub outputs: BumpVec<'b, InstructionOperand>,
    /// Callee, register arguments and optional block labels.
    pub fixed_and_control_args: BumpVec<'b, InstructionOperand>,
    pub fixed_count: usize,
    /// Stack arguments indexed by `-slot - 1`.
    pub pushed_nodes: BumpVec<'b, Option<NodeId>>,
    pub pushed_count: usize,
}

impl<'b> CallBuffer<'b> {
    pub fn new(arena: &'b Bump, descriptor: &'b CallDescriptor) -> Self {
        let mut pushed_nodes = BumpVec::with_capacity_in(descriptor.input_count(), arena);
        pushed_nodes.resize(descriptor.input_count(), None);
        Self {
            descriptor,
            output_nodes: BumpVec::with_capacity_in(descriptor.return_count(), arena),
            outputs: BumpVec::with_capacity_in(descriptor.return_count(), arena),
            fixed_and_control_args: BumpVec::with_capacity_in(descriptor.input_count() + 2, arena),
            fixed_count: 0,
            pushed_nodes,
            pushed_count: 0,
        }
    }

    pub fn input_count(&self) -> usize {
        self.descriptor.input_count()
    }

    /// Pushed arguments in slot order, `-1` first.
    pub fn pushed(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.pushed_nodes[..self.pushed_count].iter().flatten().copied()
    }
}

impl<'a> InstructionSelector<'a> {
    /// Fill `buffer` for `call`. `continuation` and `deoptimization` are the
    /// successor blocks when the call ends its block.
    pub(crate) fn initialize_call_buffer(
        &mut self,
        call: NodeId,
        buffer: &mut CallBuffer<'_>,
        continuation: Option<BlockId>,
        deoptimization: Option<BlockId>,
    ) -> CompileResult<()> {
        let graph = self.graph;
        let descriptor = buffer.descriptor;

        if descriptor.return_count() == 1 {
            buffer.output_nodes.push(call);
        } else {
            for index in 0..descriptor.return_count() {
                // A return value nobody projects is not live.
                if let Some(projection) = graph.find_projection(call, index as u32) {
                    buffer.output_nodes.push(projection);
                }
            }
        }
        for index in 0..buffer.output_nodes.len() {
            let output = buffer.output_nodes[index];
            let location = match *graph.op(output) {
                Operator::Projection(i) => descriptor.return_location(i as usize)?,
                _ => descriptor.return_location(index)?,
            };
            self.mark_as_representation(location.representation, output)?;
            let operand = self.define_as_location(output, location);
            buffer.outputs.push(operand);
        }

        let callee = graph.value_input(call, 0)?;
        let callee_operand = match descriptor.kind() {
            CallKind::CodeObject
                if self.features.call_code_immediate
                    && matches!(graph.op(callee), Operator::HeapConstant(_)) =>
            {
                self.use_immediate(callee)?
            }
            CallKind::Address
                if self.features.call_address_immediate
                    && matches!(
                        graph.op(callee),
                        Operator::Int32Constant(_) | Operator::Int64Constant(_)
                    ) =>
            {
                self.use_immediate(callee)?
            }
            CallKind::CodeObject | CallKind::Address => self.use_register(callee),
            CallKind::JSFunction => self.use_location(callee, descriptor.input_location(0)?),
        };
        buffer.fixed_and_control_args.push(callee_operand);
        buffer.fixed_count = 1;

        let input_count = buffer.input_count();
        let partition_error = |buffer: &CallBuffer<'_>| CompileError::CallArguments {
            node: call,
            inputs: input_count,
            fixed: buffer.fixed_count,
            pushed: buffer.pushed_count,
        };
        for index in 1..input_count {
            let argument = graph.value_input(call, index)?;
            let location = descriptor.input_location(index)?;
            match location.kind {
                LocationKind::StackSlot(slot) => {
                    let stack_index = usize::try_from(-(slot as i64) - 1)
                        .map_err(|_| partition_error(buffer))?;
                    if !matches!(buffer.pushed_nodes.get(stack_index), Some(None)) {
                        return Err(partition_error(buffer));
                    }
                    buffer.pushed_nodes[stack_index] = Some(argument);
                    buffer.pushed_count += 1;
                }
                _ => {
                    // Pushed arguments are used by the push `emit_call` picks.
                    let operand = self.use_location(argument, location);
                    buffer.fixed_and_control_args.push(operand);
                    buffer.fixed_count += 1;
                }
            }
        }

        // Slots must be dense from -1 so every push lands where the callee
        // expects it.
        if buffer.pushed_nodes[..buffer.pushed_count].iter().any(Option::is_none)
            || buffer.fixed_count + buffer.pushed_count != input_count
        {
            return Err(partition_error(buffer));
        }

        match (descriptor.can_lazily_deoptimize(), continuation, deoptimization) {
            (true, Some(cont), Some(deopt)) => {
                buffer.fixed_and_control_args.push(self.label(cont));
                buffer.fixed_and_control_args.push(self.label(deopt));
            }
            (false, None, None) => {}
            (true, _, _) => {
                return Err(CompileError::invariant(format!(
                    "call {} to {} may lazily deoptimize but does not end its block",
                    call,
                    descriptor.debug_name()
                )))
            }
            (false, _, _) => {
                return Err(CompileError::invariant(format!(
                    "call {} to {} ends its block but cannot lazily deoptimize",
                    call,
                    descriptor.debug_name()
                )))
            }
        }
        Ok(())
    }
}
