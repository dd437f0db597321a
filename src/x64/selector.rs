// This module holds the x86-64 lowering rules of the instruction selector. Each visit method
// turns one operator into target instructions and picks operand policies that fit the
// two-address instruction forms of the architecture: the result of an arithmetic operation
// shares the register of its first input, a constant right operand becomes an immediate,
// variable shift counts live in rcx, division uses the rax/rdx pair, and the write barrier
// store takes its operands in the fixed registers the barrier stub expects. Comparisons and
// tests set the flags and hand them to a FlagsContinuation. Calls push their stack
// arguments right before the call and, for C calls, drop them again afterwards.

use log::trace;

use super::opcodes::X64Opcode;
use super::registers::{RAX, RBX, RCX, RDX};
use crate::core::{CompileError, CompileResult};
use crate::ir::{MachineType, NodeId, Operator, StoreRepresentation, WriteBarrierKind};
use crate::select::call_buffer::CallBuffer;
use crate::select::{
    AddressingMode, ArchOpcode, CallKind, FlagsContinuation, InstructionCode, InstructionOperand,
    InstructionSelector,
};

impl InstructionSelector<'_> {
    // Memory.

    pub(crate) fn visit_load(&mut self, node: NodeId, rep: MachineType) -> CompileResult<()> {
        let base = self.graph.value_input(node, 0)?;
        let index = self.graph.value_input(node, 1)?;

        let output = if rep == MachineType::Float64 {
            self.define_as_double_register(node)
        } else {
            self.define_as_register(node)
        };
        let opcode = match rep {
            MachineType::Float64 => X64Opcode::SSELoad,
            MachineType::Word8 => X64Opcode::LoadWord8,
            MachineType::Word16 => X64Opcode::LoadWord16,
            MachineType::Word32 => X64Opcode::LoadWord32,
            MachineType::Tagged | MachineType::Word64 => X64Opcode::LoadWord64,
        };
        let (mode, inputs) = if self.can_be_immediate(base) {
            // load [#base + %index]
            (AddressingMode::MRI, vec![self.use_register(index), self.use_immediate(base)?])
        } else if self.can_be_immediate(index) {
            // load [%base + #index]
            (AddressingMode::MRI, vec![self.use_register(base), self.use_immediate(index)?])
        } else {
            // load [%base + %index + K]
            (AddressingMode::MR1I, vec![self.use_register(base), self.use_register(index)])
        };
        let code = InstructionCode::new(opcode).with_addressing_mode(mode);
        self.emit(code, vec![output], inputs, vec![]);
        Ok(())
    }

    pub(crate) fn visit_store(&mut self, node: NodeId, store: StoreRepresentation) -> CompileResult<()> {
        let base = self.graph.value_input(node, 0)?;
        let index = self.graph.value_input(node, 1)?;
        let value = self.graph.value_input(node, 2)?;
        let rep = store.rep;

        if store.write_barrier == WriteBarrierKind::FullWriteBarrier {
            if rep != MachineType::Tagged {
                return Err(CompileError::invariant(format!(
                    "write barrier store {} stores a {} value",
                    node,
                    rep.name()
                )));
            }
            // The barrier stub takes object, slot and value in fixed registers.
            let temps = vec![self.temp_fixed_register(RCX), self.temp_fixed_register(RDX)];
            let inputs = vec![
                self.use_fixed(base, RBX),
                self.use_fixed(index, RCX),
                self.use_fixed(value, RDX),
            ];
            self.emit(X64Opcode::StoreWriteBarrier, vec![], inputs, temps);
            return Ok(());
        }

        let mut is_immediate = false;
        let val = if rep == MachineType::Float64 {
            self.use_double_register(value)
        } else if self.can_be_immediate(value) {
            is_immediate = true;
            self.use_immediate(value)?
        } else if rep == MachineType::Word8 {
            // Byte stores need a register with an addressable low byte.
            self.use_fixed(value, RDX)
        } else {
            self.use_register(value)
        };
        let opcode = match (rep, is_immediate) {
            (MachineType::Float64, _) => X64Opcode::SSEStore,
            (MachineType::Word8, false) => X64Opcode::StoreWord8,
            (MachineType::Word8, true) => X64Opcode::StoreWord8I,
            (MachineType::Word16, false) => X64Opcode::StoreWord16,
            (MachineType::Word16, true) => X64Opcode::StoreWord16I,
            (MachineType::Word32, false) => X64Opcode::StoreWord32,
            (MachineType::Word32, true) => X64Opcode::StoreWord32I,
            (MachineType::Tagged | MachineType::Word64, false) => X64Opcode::StoreWord64,
            (MachineType::Tagged | MachineType::Word64, true) => X64Opcode::StoreWord64I,
        };
        let (mode, mut inputs) = if self.can_be_immediate(base) {
            // store [#base + %index], %|#value
            (AddressingMode::MRI, vec![self.use_register(index), self.use_immediate(base)?])
        } else if self.can_be_immediate(index) {
            // store [%base + #index], %|#value
            (AddressingMode::MRI, vec![self.use_register(base), self.use_immediate(index)?])
        } else {
            // store [%base + %index], %|#value
            (AddressingMode::MR1I, vec![self.use_register(base), self.use_register(index)])
        };
        inputs.push(val);
        let code = InstructionCode::new(opcode).with_addressing_mode(mode);
        self.emit(code, vec![], inputs, vec![]);
        Ok(())
    }

    // Integer arithmetic.

    fn visit_binop(
        &mut self,
        node: NodeId,
        opcode: X64Opcode,
        cont: &FlagsContinuation,
    ) -> CompileResult<()> {
        let m = self.match_binop(node)?;
        let inputs = if self.can_be_immediate(m.right) {
            vec![self.use_any(m.left), self.use_immediate(m.right)?]
        } else {
            vec![self.use_register(m.left), self.use_any(m.right)]
        };
        let outputs = vec![self.define_same_as_first(node)];
        self.emit_with_continuation(opcode, outputs, inputs, vec![], cont)
    }

    fn visit_plain_binop(&mut self, node: NodeId, opcode: X64Opcode) -> CompileResult<()> {
        self.visit_binop(node, opcode, &FlagsContinuation::None)
    }

    /// `x ^ -1` is a bitwise not.
    fn visit_xor(&mut self, node: NodeId, xor: X64Opcode, not: X64Opcode) -> CompileResult<()> {
        let m = self.match_binop(node)?;
        if self.is_int_constant(m.right, -1) {
            let output = self.define_same_as_first(node);
            let input = self.use_any(m.left);
            self.emit(not, vec![output], vec![input], vec![]);
            return Ok(());
        }
        self.visit_plain_binop(node, xor)
    }

    /// `0 - x` is a negation.
    fn visit_sub(&mut self, node: NodeId, sub: X64Opcode, neg: X64Opcode) -> CompileResult<()> {
        let m = self.match_binop(node)?;
        if self.is_int_constant(m.left, 0) {
            let output = self.define_same_as_first(node);
            let input = self.use_any(m.right);
            self.emit(neg, vec![output], vec![input], vec![]);
            return Ok(());
        }
        self.visit_plain_binop(node, sub)
    }

    /// Variable shift counts go in cl. The hardware masks the count, so an
    /// explicit mask on the count is redundant.
    fn visit_shift(&mut self, node: NodeId, opcode: X64Opcode, count_mask: i64) -> CompileResult<()> {
        let left = self.graph.value_input(node, 0)?;
        let mut right = self.graph.value_input(node, 1)?;

        let output = self.define_same_as_first(node);
        let inputs = if self.can_be_immediate(right) {
            vec![self.use_register(left), self.use_immediate(right)?]
        } else {
            if matches!(self.graph.op(right), Operator::Word32And | Operator::Word64And) {
                let mask = self.match_binop(right)?;
                if self.is_int_constant(mask.right, count_mask) {
                    right = mask.left;
                }
            }
            vec![self.use_register(left), self.use_fixed(right, RCX)]
        };
        self.emit(opcode, vec![output], inputs, vec![]);
        Ok(())
    }

    fn visit_mul(&mut self, node: NodeId, opcode: X64Opcode) -> CompileResult<()> {
        let left = self.graph.value_input(node, 0)?;
        let right = self.graph.value_input(node, 1)?;
        // The three operand form takes an immediate factor.
        let (output, inputs) = if self.can_be_immediate(right) {
            (self.define_as_register(node), vec![self.use_any(left), self.use_immediate(right)?])
        } else if self.can_be_immediate(left) {
            (self.define_as_register(node), vec![self.use_any(right), self.use_immediate(left)?])
        } else {
            (self.define_same_as_first(node), vec![self.use_register(left), self.use_any(right)])
        };
        self.emit(opcode, vec![output], inputs, vec![]);
        Ok(())
    }

    /// Quotient in rax, rdx clobbered.
    fn visit_div(&mut self, node: NodeId, opcode: X64Opcode) -> CompileResult<()> {
        let dividend = self.graph.value_input(node, 0)?;
        let divisor = self.graph.value_input(node, 1)?;
        let temps = vec![self.temp_fixed_register(RDX)];
        let output = self.define_as_fixed(node, RAX);
        let inputs = vec![self.use_fixed(dividend, RAX), self.use_unique_register(divisor)];
        self.emit(opcode, vec![output], inputs, temps);
        Ok(())
    }

    /// Remainder in rdx, rax clobbered.
    fn visit_mod(&mut self, node: NodeId, opcode: X64Opcode) -> CompileResult<()> {
        let dividend = self.graph.value_input(node, 0)?;
        let divisor = self.graph.value_input(node, 1)?;
        let temps = vec![self.temp_fixed_register(RAX), self.temp_fixed_register(RDX)];
        let output = self.define_as_fixed(node, RDX);
        let inputs = vec![self.use_fixed(dividend, RAX), self.use_unique_register(divisor)];
        self.emit(opcode, vec![output], inputs, temps);
        Ok(())
    }

    pub(crate) fn visit_word32_and(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::And32)
    }

    pub(crate) fn visit_word64_and(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::And)
    }

    pub(crate) fn visit_word32_or(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::Or32)
    }

    pub(crate) fn visit_word64_or(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::Or)
    }

    pub(crate) fn visit_word32_xor(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_xor(node, X64Opcode::Xor32, X64Opcode::Not32)
    }

    pub(crate) fn visit_word64_xor(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_xor(node, X64Opcode::Xor, X64Opcode::Not)
    }

    pub(crate) fn visit_word32_shl(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Shl32, 0x1F)
    }

    pub(crate) fn visit_word32_shr(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Shr32, 0x1F)
    }

    pub(crate) fn visit_word32_sar(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Sar32, 0x1F)
    }

    pub(crate) fn visit_word64_shl(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Shl, 0x3F)
    }

    pub(crate) fn visit_word64_shr(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Shr, 0x3F)
    }

    pub(crate) fn visit_word64_sar(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_shift(node, X64Opcode::Sar, 0x3F)
    }

    pub(crate) fn visit_int32_add(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::Add32)
    }

    pub(crate) fn visit_int64_add(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_plain_binop(node, X64Opcode::Add)
    }

    pub(crate) fn visit_int32_add_with_overflow(
        &mut self,
        node: NodeId,
        cont: &FlagsContinuation,
    ) -> CompileResult<()> {
        self.visit_binop(node, X64Opcode::Add32, cont)
    }

    pub(crate) fn visit_int32_sub(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_sub(node, X64Opcode::Sub32, X64Opcode::Neg32)
    }

    pub(crate) fn visit_int64_sub(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_sub(node, X64Opcode::Sub, X64Opcode::Neg)
    }

    pub(crate) fn visit_int32_sub_with_overflow(
        &mut self,
        node: NodeId,
        cont: &FlagsContinuation,
    ) -> CompileResult<()> {
        self.visit_binop(node, X64Opcode::Sub32, cont)
    }

    pub(crate) fn visit_int32_mul(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mul(node, X64Opcode::Imul32)
    }

    pub(crate) fn visit_int64_mul(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mul(node, X64Opcode::Imul)
    }

    pub(crate) fn visit_int32_div(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_div(node, X64Opcode::Idiv32)
    }

    pub(crate) fn visit_int64_div(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_div(node, X64Opcode::Idiv)
    }

    pub(crate) fn visit_int32_udiv(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_div(node, X64Opcode::Udiv32)
    }

    pub(crate) fn visit_int64_udiv(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_div(node, X64Opcode::Udiv)
    }

    pub(crate) fn visit_int32_mod(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mod(node, X64Opcode::Idiv32)
    }

    pub(crate) fn visit_int64_mod(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mod(node, X64Opcode::Idiv)
    }

    pub(crate) fn visit_int32_umod(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mod(node, X64Opcode::Udiv32)
    }

    pub(crate) fn visit_int64_umod(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_mod(node, X64Opcode::Udiv)
    }

    // Conversions.

    pub(crate) fn visit_convert_int32_to_int64(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_register(node);
        let operand = self.use_register(input);
        self.emit(X64Opcode::Int32ToInt64, vec![output], vec![operand], vec![]);
        Ok(())
    }

    pub(crate) fn visit_convert_int64_to_int32(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_register(node);
        let operand = self.use_register(input);
        self.emit(X64Opcode::Int64ToInt32, vec![output], vec![operand], vec![]);
        Ok(())
    }

    pub(crate) fn visit_change_int32_to_float64(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_double_register(node);
        let operand = self.use_any(input);
        self.emit(X64Opcode::SSEInt32ToFloat64, vec![output], vec![operand], vec![]);
        Ok(())
    }

    pub(crate) fn visit_change_uint32_to_float64(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_double_register(node);
        // cvtqsi2sd only reads a register here.
        let operand = self.use_register(input);
        self.emit(X64Opcode::SSEUint32ToFloat64, vec![output], vec![operand], vec![]);
        Ok(())
    }

    pub(crate) fn visit_change_float64_to_int32(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_register(node);
        let operand = self.use_any(input);
        self.emit(X64Opcode::SSEFloat64ToInt32, vec![output], vec![operand], vec![]);
        Ok(())
    }

    pub(crate) fn visit_change_float64_to_uint32(&mut self, node: NodeId) -> CompileResult<()> {
        let input = self.graph.value_input(node, 0)?;
        let output = self.define_as_register(node);
        let operand = self.use_double_register(input);
        self.emit(X64Opcode::SSEFloat64ToUint32, vec![output], vec![operand], vec![]);
        Ok(())
    }

    // Floating point.

    fn visit_float64_binop(&mut self, node: NodeId, opcode: X64Opcode, temps: Vec<InstructionOperand>) -> CompileResult<()> {
        let left = self.graph.value_input(node, 0)?;
        let right = self.graph.value_input(node, 1)?;
        let output = self.define_same_as_first(node);
        let inputs = vec![self.use_double_register(left), self.use_double_register(right)];
        self.emit(opcode, vec![output], inputs, temps);
        Ok(())
    }

    pub(crate) fn visit_float64_add(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_float64_binop(node, X64Opcode::SSEFloat64Add, vec![])
    }

    pub(crate) fn visit_float64_sub(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_float64_binop(node, X64Opcode::SSEFloat64Sub, vec![])
    }

    pub(crate) fn visit_float64_mul(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_float64_binop(node, X64Opcode::SSEFloat64Mul, vec![])
    }

    pub(crate) fn visit_float64_div(&mut self, node: NodeId) -> CompileResult<()> {
        self.visit_float64_binop(node, X64Opcode::SSEFloat64Div, vec![])
    }

    /// fprem loop; rax holds the FPU status word.
    pub(crate) fn visit_float64_mod(&mut self, node: NodeId) -> CompileResult<()> {
        let temps = vec![self.temp_fixed_register(RAX)];
        self.visit_float64_binop(node, X64Opcode::SSEFloat64Mod, temps)
    }

    // Comparisons.

    fn visit_compare(
        &mut self,
        opcode: X64Opcode,
        left: InstructionOperand,
        right: InstructionOperand,
        cont: &FlagsContinuation,
    ) -> CompileResult<()> {
        self.emit_with_continuation(opcode, vec![], vec![left, right], vec![], cont)
    }

    /// Compare the two inputs of `node`, with an immediate on whichever side
    /// allows one.
    fn visit_word_compare(
        &mut self,
        node: NodeId,
        opcode: X64Opcode,
        cont: &FlagsContinuation,
        commutative: bool,
    ) -> CompileResult<()> {
        let left = self.graph.value_input(node, 0)?;
        let right = self.graph.value_input(node, 1)?;

        if self.can_be_immediate(right) {
            let (l, r) = (self.use_any(left), self.use_immediate(right)?);
            self.visit_compare(opcode, l, r, cont)
        } else if self.can_be_immediate(left) {
            let mut cont = *cont;
            if !commutative {
                cont.commute();
            }
            let (l, r) = (self.use_any(right), self.use_immediate(left)?);
            self.visit_compare(opcode, l, r, &cont)
        } else {
            let (l, r) = (self.use_register(left), self.use_any(right));
            self.visit_compare(opcode, l, r, cont)
        }
    }

    pub(crate) fn visit_word32_compare(&mut self, node: NodeId, cont: &FlagsContinuation) -> CompileResult<()> {
        self.visit_word_compare(node, X64Opcode::Cmp32, cont, false)
    }

    pub(crate) fn visit_word64_compare(&mut self, node: NodeId, cont: &FlagsContinuation) -> CompileResult<()> {
        self.visit_word_compare(node, X64Opcode::Cmp, cont, false)
    }

    /// Set the flags from `node != 0`. A subtraction becomes a compare of
    /// its operands and a bitwise and a test of them.
    pub(crate) fn visit_word32_test(&mut self, node: NodeId, cont: &FlagsContinuation) -> CompileResult<()> {
        match self.graph.op(node) {
            Operator::Int32Sub => return self.visit_word_compare(node, X64Opcode::Cmp32, cont, false),
            Operator::Word32And => return self.visit_word_compare(node, X64Opcode::Test32, cont, true),
            _ => {}
        }
        let value = self.use_any(node);
        let mask = self.temp_immediate(-1);
        self.visit_compare(X64Opcode::Test32, value, mask, cont)
    }

    pub(crate) fn visit_word64_test(&mut self, node: NodeId, cont: &FlagsContinuation) -> CompileResult<()> {
        match self.graph.op(node) {
            Operator::Int64Sub => return self.visit_word_compare(node, X64Opcode::Cmp, cont, false),
            Operator::Word64And => return self.visit_word_compare(node, X64Opcode::Test, cont, true),
            _ => {}
        }
        let value = self.use_any(node);
        let mask = self.temp_immediate(-1);
        self.visit_compare(X64Opcode::Test, value, mask, cont)
    }

    pub(crate) fn visit_float64_compare(&mut self, node: NodeId, cont: &FlagsContinuation) -> CompileResult<()> {
        let left = self.graph.value_input(node, 0)?;
        let right = self.graph.value_input(node, 1)?;
        let (l, r) = (self.use_double_register(left), self.use_any(right));
        self.visit_compare(X64Opcode::SSEFloat64Cmp, l, r, cont)
    }

    // Calls.

    /// Emit the pushes, the call and the stack cleanup for a prepared buffer.
    pub(crate) fn emit_call(&mut self, buffer: &CallBuffer<'_>, ends_block: bool) -> CompileResult<()> {
        // Last slot first, so slot -1 ends up on top of the stack.
        for argument in buffer.pushed().rev() {
            if self.can_be_immediate(argument) {
                let operand = self.use_immediate(argument)?;
                self.emit(X64Opcode::PushI, vec![], vec![operand], vec![]);
            } else {
                let operand = self.use_any(argument);
                self.emit(X64Opcode::Push, vec![], vec![operand], vec![]);
            }
        }

        let descriptor = buffer.descriptor;
        let code = match descriptor.kind() {
            CallKind::CodeObject => InstructionCode::new(X64Opcode::CallCodeObject)
                .with_misc(i32::from(descriptor.can_lazily_deoptimize())),
            CallKind::Address => InstructionCode::new(X64Opcode::CallAddress),
            CallKind::JSFunction => InstructionCode::new(X64Opcode::CallJSFunction),
        };
        let outputs = buffer.outputs.iter().copied().collect();
        let inputs = buffer.fixed_and_control_args.iter().copied().collect();
        let call = self.emit(code, outputs, inputs, vec![]);
        call.mark_as_call();
        if ends_block {
            call.mark_as_control();
        }

        // The caller pops the arguments of a C call.
        if descriptor.kind() == CallKind::Address && buffer.pushed_count > 0 {
            if ends_block {
                return Err(CompileError::invariant(format!(
                    "C call {} cannot end its block",
                    descriptor.debug_name()
                )));
            }
            trace!("pop {} argument slots after {}", buffer.pushed_count, descriptor.debug_name());
            let code = InstructionCode::new(ArchOpcode::PopStack).with_misc(buffer.pushed_count as i32);
            self.emit(code, vec![], vec![], vec![]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use crate::core::CompilationSession;
    use crate::ir::{Graph, MachineType, NodeId, Operator, Schedule, StoreRepresentation, WriteBarrierKind};
    use crate::select::{InstructionSequence, TargetFeatures};
    use crate::x64::calling_convention::c_linkage;

    use super::*;

    /// Schedule `nodes` in a single block returning `ret` and select it.
    fn select_single_block(
        graph: &Graph,
        nodes: &[NodeId],
        ret: NodeId,
        params: &[MachineType],
    ) -> InstructionSequence {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let linkage = c_linkage(&arena, "f", params, Some(MachineType::Word32));
        let mut schedule = Schedule::new();
        let entry = schedule.entry();
        for &node in nodes {
            schedule.add_node(entry, node).unwrap();
        }
        schedule.add_return(entry, ret).unwrap();
        schedule.compute_rpo();
        InstructionSelector::new(graph, &schedule, &linkage, TargetFeatures::x64(), &session)
            .select_instructions()
            .unwrap()
    }

    fn listing(seq: &InstructionSequence) -> Vec<String> {
        seq.instructions().iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_add_takes_immediate_on_the_right() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let p = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let c = graph.int32_constant(5);
        // Constant on the left of a commutative operator.
        let add = graph.new_node(Operator::Int32Add, &[c, p]).unwrap();
        let ret = graph.new_node(Operator::Return, &[add, start, start]).unwrap();

        let seq = select_single_block(&graph, &[p, c, add], ret, &[MachineType::Word32]);
        let lines = listing(&seq);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], format!("v{}(1) = x64_add32 v{}(-)^ [immediate:0]", add.as_u32(), p.as_u32()));
        assert!(seq.constant(c.as_u32()).is_none());
    }

    #[test]
    fn test_xor_with_minus_one_is_not() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let p = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let m1 = graph.int32_constant(-1);
        let xor = graph.new_node(Operator::Word32Xor, &[p, m1]).unwrap();
        let ret = graph.new_node(Operator::Return, &[xor, start, start]).unwrap();

        let seq = select_single_block(&graph, &[p, m1, xor], ret, &[MachineType::Word32]);
        assert_eq!(seq.instructions()[1].mnemonic(), "x64_not32");
    }

    #[test]
    fn test_variable_shift_strips_count_mask() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let x = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let y = graph.new_node(Operator::Parameter(1), &[start]).unwrap();
        let mask = graph.int32_constant(0x1F);
        let and = graph.new_node(Operator::Word32And, &[y, mask]).unwrap();
        let shl = graph.new_node(Operator::Word32Shl, &[x, and]).unwrap();
        let ret = graph.new_node(Operator::Return, &[shl, start, start]).unwrap();

        let params = [MachineType::Word32, MachineType::Word32];
        let seq = select_single_block(&graph, &[x, y, mask, and, shl], ret, &params);
        let shift = seq
            .instructions()
            .iter()
            .find(|i| i.mnemonic() == "x64_shl32")
            .unwrap();
        assert_eq!(shift.inputs()[1].to_string(), format!("v{}(=r1)", y.as_u32()));
        assert!(seq.instructions().iter().all(|i| i.mnemonic() != "x64_and32"));
    }

    #[test]
    fn test_division_uses_rax_and_rdx() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let x = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let y = graph.new_node(Operator::Parameter(1), &[start]).unwrap();
        let rem = graph.new_node(Operator::Int32Mod, &[x, y]).unwrap();
        let ret = graph.new_node(Operator::Return, &[rem, start, start]).unwrap();

        let params = [MachineType::Word32, MachineType::Word32];
        let seq = select_single_block(&graph, &[x, y, rem], ret, &params);
        let idiv = seq.instructions().iter().find(|i| i.mnemonic() == "x64_idiv32").unwrap();
        assert_eq!(idiv.outputs()[0].to_string(), format!("v{}(=r2)", rem.as_u32()));
        assert_eq!(idiv.inputs()[0].to_string(), format!("v{}(=r0)", x.as_u32()));
        assert_eq!(idiv.temps().len(), 2);
    }

    #[test]
    fn test_store_with_write_barrier_uses_fixed_registers() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let object = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let offset = graph.new_node(Operator::Parameter(1), &[start]).unwrap();
        let value = graph.new_node(Operator::Parameter(2), &[start]).unwrap();
        let store = graph
            .new_node(
                Operator::Store(StoreRepresentation {
                    rep: MachineType::Tagged,
                    write_barrier: WriteBarrierKind::FullWriteBarrier,
                }),
                &[object, offset, value, start],
            )
            .unwrap();
        let zero = graph.int32_constant(0);
        let ret = graph.new_node(Operator::Return, &[zero, store, start]).unwrap();

        let params = [MachineType::Tagged, MachineType::Word64, MachineType::Tagged];
        let seq = select_single_block(&graph, &[object, offset, value, store, zero], ret, &params);
        let barrier = seq
            .instructions()
            .iter()
            .find(|i| i.mnemonic() == "x64_store_write_barrier")
            .unwrap();
        let inputs: Vec<String> = barrier.inputs().iter().map(|o| o.to_string()).collect();
        assert_eq!(
            inputs,
            vec![
                format!("v{}(=r3)", object.as_u32()),
                format!("v{}(=r1)", offset.as_u32()),
                format!("v{}(=r2)", value.as_u32()),
            ]
        );
        assert!(seq.is_reference(object.as_u32()));
    }
}
