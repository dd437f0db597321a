// This module implements the target independent half of the instruction selector. The
// driver marks the value inputs of loop header phis as used, visits the blocks of the
// schedule in reverse of their final order, and assembles the per-block instruction ranges
// into the InstructionSequence at the end. Inside a block the control transfer is selected first,
// then the nodes from last to first, skipping nodes that are unused or already defined by
// a consumer that covered them. A node can be covered (folded into the instruction of its
// consumer) only when the consumer is its single user and both sit in the same block.
// Comparisons are lowered against a FlagsContinuation so that a compare feeding a branch,
// a boolean or a deoptimization guard becomes one flags-setting instruction; comparisons
// against zero are folded by negating the continuation, and the overflow projection of an
// overflow-checked add or subtract is fused when the arithmetic value itself is not needed
// before the consumer. Representation marks (double, reference) flow forward through phis.
// Target specific lowering rules are methods on the same selector in the target module.

//! The instruction selector driver.

use bumpalo::collections::Vec as BumpVec;
use log::{debug, trace};

use super::call_buffer::CallBuffer;
use super::flags::{FlagsCondition, FlagsContinuation};
use super::instruction::{
    ArchOpcode, FrameStateDescriptor, Instruction, InstructionCode, InstructionOperand,
    InstructionSequence,
};
use super::linkage::Linkage;
use super::TargetFeatures;
use crate::core::{BitVector, CompilationSession, CompileError, CompileResult};
use crate::ir::{BlockId, ControlKind, Graph, MachineType, NodeId, Operator, Schedule};

/// Operands of a binary operator, constant moved to the right for
/// commutative operators.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinopMatch {
    pub left: NodeId,
    pub right: NodeId,
}

fn is_commutative(op: &Operator) -> bool {
    use Operator::*;
    matches!(
        op,
        Word32And
            | Word32Or
            | Word32Xor
            | Word32Equal
            | Word64And
            | Word64Or
            | Word64Xor
            | Word64Equal
            | Int32Add
            | Int32AddWithOverflow
            | Int32Mul
            | Int64Add
            | Int64Mul
    )
}

fn is_word64_operator(op: &Operator) -> bool {
    use Operator::*;
    matches!(
        op,
        Word64And
            | Word64Or
            | Word64Xor
            | Word64Shl
            | Word64Shr
            | Word64Sar
            | Word64Equal
            | Int64Add
            | Int64Sub
            | Int64Mul
            | Int64Div
            | Int64UDiv
            | Int64Mod
            | Int64UMod
            | Int64LessThan
            | Int64LessThanOrEqual
            | ConvertInt32ToInt64
            | ConvertInt64ToInt32
    )
}

/// The value inputs of a phi, without its control input.
fn phi_values(graph: &Graph, phi: NodeId) -> &[NodeId] {
    let inputs = graph.inputs(phi);
    &inputs[..graph.op(phi).inputs().value.min(inputs.len())]
}

/// Lowers a scheduled graph into an [`InstructionSequence`].
pub struct InstructionSelector<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) schedule: &'a Schedule,
    pub(crate) linkage: &'a Linkage,
    pub(crate) features: TargetFeatures,
    pub(crate) session: &'a CompilationSession<'a>,
    pub(crate) sequence: InstructionSequence,
    instructions: Vec<Instruction>,
    defined: BitVector,
    used: BitVector,
    current_block: Option<BlockId>,
    /// `(end, start)` indices into `instructions` per block; the block's
    /// code runs backwards from `start - 1` down to `end`.
    block_code: Vec<Option<(usize, usize)>>,
}

impl<'a> InstructionSelector<'a> {
    pub fn new(
        graph: &'a Graph,
        schedule: &'a Schedule,
        linkage: &'a Linkage,
        features: TargetFeatures,
        session: &'a CompilationSession<'a>,
    ) -> Self {
        let node_count = graph.node_count();
        Self {
            graph,
            schedule,
            linkage,
            features,
            session,
            sequence: InstructionSequence::new(node_count),
            instructions: Vec::new(),
            defined: BitVector::new(node_count),
            used: BitVector::new(node_count),
            current_block: None,
            block_code: vec![None; schedule.block_count()],
        }
    }

    /// Select instructions for every block in the schedule's order.
    pub fn select_instructions(mut self) -> CompileResult<InstructionSequence> {
        let schedule = self.schedule;
        let graph = self.graph;
        let blocks = schedule.rpo_order();
        if blocks.is_empty() {
            return Err(CompileError::invariant("schedule has no block order"));
        }
        schedule.verify(graph)?;
        self.check_scheduled()?;

        self.mark_loop_phi_inputs();

        for &block in blocks.iter().rev() {
            self.visit_block(block)?;
        }

        let mut selected: Vec<Option<Instruction>> = self.instructions.drain(..).map(Some).collect();
        for &block in blocks {
            let (end, start) = self.block_code[block.index()]
                .ok_or_else(|| CompileError::invariant(format!("{} was never visited", block)))?;
            self.sequence.start_block(block, schedule.block(block).is_deferred())?;
            for index in (end..start).rev() {
                if let Some(instruction) = selected[index].take() {
                    self.sequence.add_instruction(instruction);
                }
            }
            self.sequence.end_block(block)?;
        }

        let name = self.linkage.incoming_descriptor().debug_name();
        self.session.record_function_selected(name, self.sequence.len());
        debug!(
            "selected {} instructions in {} blocks for {}",
            self.sequence.len(),
            blocks.len(),
            name
        );
        Ok(self.sequence)
    }

    /// Every value input reached from a block must itself be placed in a block.
    fn check_scheduled(&self) -> CompileResult<()> {
        let schedule = self.schedule;
        for &id in schedule.rpo_order() {
            let block = schedule.block(id);
            for node in block.nodes().iter().copied().chain(block.control_input()) {
                let node = self.graph.try_node(node)?;
                let values = node.op().inputs().value;
                for &input in &node.inputs()[..values.min(node.input_count())] {
                    if schedule.block_of(input).is_none() {
                        return Err(CompileError::Unscheduled { node: input });
                    }
                }
            }
        }
        Ok(())
    }

    // Marks.

    /// Back edges make phi inputs live before their defining block is
    /// visited, so record those uses up front.
    fn mark_loop_phi_inputs(&mut self) {
        let schedule = self.schedule;
        let graph = self.graph;
        for &block in schedule.rpo_order() {
            let block = schedule.block(block);
            if !block.is_loop_header() {
                continue;
            }
            for &phi in block.nodes() {
                if graph.op(phi).is_phi() {
                    for &input in phi_values(graph, phi) {
                        self.mark_as_used(input);
                    }
                }
            }
        }
    }

    pub(crate) fn is_defined(&self, node: NodeId) -> bool {
        self.defined.get(node.index())
    }

    pub(crate) fn mark_as_defined(&mut self, node: NodeId) {
        self.defined.insert(node.index());
    }

    /// Nodes with side effects are always used.
    pub(crate) fn is_used(&self, node: NodeId) -> bool {
        !self.graph.op(node).is_eliminatable() || self.used.get(node.index())
    }

    pub(crate) fn mark_as_used(&mut self, node: NodeId) {
        self.used.insert(node.index());
    }

    pub(crate) fn is_double(&self, node: NodeId) -> bool {
        self.sequence.is_double(node.as_u32())
    }

    pub(crate) fn is_reference(&self, node: NodeId) -> bool {
        self.sequence.is_reference(node.as_u32())
    }

    /// Mark `node` as a float64 value, together with every phi it flows into.
    pub(crate) fn mark_as_double(&mut self, node: NodeId) -> CompileResult<()> {
        self.propagate_representation(node, true)
    }

    /// Mark `node` as a tagged reference, together with every phi it flows into.
    pub(crate) fn mark_as_reference(&mut self, node: NodeId) -> CompileResult<()> {
        self.propagate_representation(node, false)
    }

    pub(crate) fn mark_as_representation(&mut self, rep: MachineType, node: NodeId) -> CompileResult<()> {
        match rep {
            MachineType::Float64 => self.mark_as_double(node),
            MachineType::Tagged => self.mark_as_reference(node),
            _ => Ok(()),
        }
    }

    fn propagate_representation(&mut self, node: NodeId, double: bool) -> CompileResult<()> {
        let mut worklist = vec![node];
        while let Some(node) = worklist.pop() {
            let (has_mark, conflicts) = if double {
                (self.is_double(node), self.is_reference(node))
            } else {
                (self.is_reference(node), self.is_double(node))
            };
            if conflicts {
                return Err(CompileError::RepresentationConflict { node });
            }
            if has_mark {
                continue;
            }
            if double {
                self.sequence.mark_as_double(node.as_u32());
            } else {
                self.sequence.mark_as_reference(node.as_u32());
            }
            for edge in self.graph.uses(node) {
                if self.graph.op(edge.user).is_phi() {
                    worklist.push(edge.user);
                }
            }
        }
        Ok(())
    }

    // Structure queries.

    /// `user` may fold `node` into its own instruction.
    pub(crate) fn can_cover(&self, user: NodeId, node: NodeId) -> bool {
        self.graph.owned_by(node, user)
            && self.schedule.block_of(node).is_some()
            && self.schedule.block_of(node) == self.schedule.block_of(user)
    }

    /// Whether `block` directly follows the current block in the final order.
    pub(crate) fn is_next_in_assembly_order(&self, block: BlockId) -> bool {
        let Some(current) = self.current_block.map(|b| self.schedule.block(b)) else {
            return false;
        };
        let target = self.schedule.block(block);
        match (current.rpo_number(), target.rpo_number()) {
            (Some(c), Some(t)) => t == c + 1 && target.is_deferred() == current.is_deferred(),
            _ => false,
        }
    }

    pub(crate) fn match_binop(&self, node: NodeId) -> CompileResult<BinopMatch> {
        let left = self.graph.value_input(node, 0)?;
        let right = self.graph.value_input(node, 1)?;
        if is_commutative(self.graph.op(node))
            && self.graph.op(left).is_constant()
            && !self.graph.op(right).is_constant()
        {
            return Ok(BinopMatch { left: right, right: left });
        }
        Ok(BinopMatch { left, right })
    }

    /// Integer value of a word constant.
    pub(crate) fn int_value(&self, node: NodeId) -> Option<i64> {
        match *self.graph.op(node) {
            Operator::Int32Constant(v) => Some(v as i64),
            Operator::Int64Constant(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn is_int_constant(&self, node: NodeId, value: i64) -> bool {
        self.int_value(node) == Some(value)
    }

    // Emission.

    pub(crate) fn emit(
        &mut self,
        code: impl Into<InstructionCode>,
        outputs: Vec<InstructionOperand>,
        inputs: Vec<InstructionOperand>,
        temps: Vec<InstructionOperand>,
    ) -> &mut Instruction {
        let instruction = Instruction::new(code.into(), outputs, inputs, temps);
        trace!("emit {}", instruction);
        self.session.record_instruction_selected(instruction.mnemonic());
        self.instructions.push(instruction);
        let last = self.instructions.len() - 1;
        &mut self.instructions[last]
    }

    /// Emit a flags-setting instruction consumed by `cont`.
    pub(crate) fn emit_with_continuation(
        &mut self,
        code: impl Into<InstructionCode>,
        mut outputs: Vec<InstructionOperand>,
        mut inputs: Vec<InstructionOperand>,
        temps: Vec<InstructionOperand>,
        cont: &FlagsContinuation,
    ) -> CompileResult<()> {
        let mut code = code.into().with_continuation(cont);
        match *cont {
            FlagsContinuation::None => {}
            FlagsContinuation::Branch {
                true_block,
                false_block,
                ..
            } => {
                inputs.push(self.label(true_block));
                inputs.push(self.label(false_block));
            }
            FlagsContinuation::Set { result, .. } => {
                outputs.push(self.define_as_register(result));
            }
            FlagsContinuation::Deoptimize { frame_state, .. } => {
                let (descriptor, operands) = self.frame_state_operands(frame_state)?;
                inputs.extend(operands.iter().copied());
                code = code.with_misc(self.add_deoptimization_entry(descriptor));
            }
        }
        let instruction = self.emit(code, outputs, inputs, temps);
        if cont.is_branch() {
            instruction.mark_as_control();
        }
        Ok(())
    }

    fn add_deoptimization_entry(&mut self, descriptor: FrameStateDescriptor) -> i32 {
        self.session.record_deoptimization_entry();
        self.sequence.add_deoptimization_entry(descriptor) as i32
    }

    /// Operands of the values captured by `state`: parameters, locals, then
    /// the operand stack.
    fn frame_state_operands(
        &mut self,
        state: NodeId,
    ) -> CompileResult<(FrameStateDescriptor, BumpVec<'a, InstructionOperand>)> {
        let graph = self.graph;
        let Operator::FrameState(bailout_id) = *graph.op(state) else {
            return Err(CompileError::invariant(format!(
                "{} ({}) is not a frame state",
                state,
                graph.op(state).mnemonic()
            )));
        };
        let mut groups = [0usize; 3];
        let mut operands = BumpVec::new_in(self.session.arena());
        for (slot, count) in groups.iter_mut().enumerate() {
            let values = graph.value_input(state, slot)?;
            if !matches!(graph.op(values), Operator::StateValues(_)) {
                return Err(CompileError::invariant(format!(
                    "input {} of frame state {} is not a state value list",
                    slot, state
                )));
            }
            *count = graph.inputs(values).len();
            for &value in graph.inputs(values) {
                operands.push(self.use_or_immediate(value)?);
            }
        }
        let descriptor = FrameStateDescriptor {
            bailout_id,
            parameters: groups[0],
            locals: groups[1],
            stack: groups[2],
        };
        debug_assert_eq!(descriptor.size(), operands.len());
        Ok((descriptor, operands))
    }

    // Blocks.

    fn visit_block(&mut self, block: BlockId) -> CompileResult<()> {
        trace!("visit {}", block);
        self.current_block = Some(block);
        let block_end = self.instructions.len();

        // Selected top down, scheduled bottom up.
        self.visit_control(block)?;
        self.instructions[block_end..].reverse();

        let schedule = self.schedule;
        for &node in schedule.block(block).nodes().iter().rev() {
            if !self.is_used(node) || self.is_defined(node) {
                continue;
            }
            let node_end = self.instructions.len();
            self.visit_node(node)?;
            self.instructions[node_end..].reverse();
        }

        self.block_code[block.index()] = Some((block_end, self.instructions.len()));
        self.current_block = None;
        Ok(())
    }

    fn visit_control(&mut self, block: BlockId) -> CompileResult<()> {
        let schedule = self.schedule;
        let block = schedule.block(block);
        let input = block.control_input();
        let require_input = || {
            input.ok_or_else(|| {
                CompileError::invariant(format!("control of {} has no input node", block.id()))
            })
        };
        match block.control() {
            ControlKind::None => Ok(()),
            ControlKind::Goto => self.visit_goto(block.successor_at(0)?),
            ControlKind::Branch => {
                let tblock = block.successor_at(0)?;
                let fblock = block.successor_at(1)?;
                if tblock == fblock {
                    return self.visit_goto(tblock);
                }
                self.visit_branch(require_input()?, tblock, fblock)
            }
            ControlKind::Return => {
                let input = require_input()?;
                let value = match self.graph.op(input) {
                    Operator::Return => self.graph.value_input(input, 0)?,
                    _ => input,
                };
                self.visit_return(value)
            }
            ControlKind::Throw => {
                let input = require_input()?;
                Err(self.unsupported(input))
            }
            ControlKind::Deoptimize => self.visit_deoptimize(require_input()?),
            ControlKind::Call => {
                let deoptimization = block.successor_at(0)?;
                let continuation = block.successor_at(1)?;
                self.visit_call(require_input()?, Some(continuation), Some(deoptimization))
            }
        }
    }

    fn visit_goto(&mut self, target: BlockId) -> CompileResult<()> {
        if self.is_next_in_assembly_order(target) {
            // Fall through.
            self.emit(ArchOpcode::Nop, vec![], vec![], vec![]).mark_as_control();
        } else {
            let label = self.label(target);
            self.emit(ArchOpcode::Jmp, vec![], vec![label], vec![]).mark_as_control();
        }
        Ok(())
    }

    fn visit_branch(&mut self, branch: NodeId, tblock: BlockId, fblock: BlockId) -> CompileResult<()> {
        let value = self.graph.value_input(branch, 0)?;
        let mut cont = FlagsContinuation::branch(FlagsCondition::NotEqual, tblock, fblock);

        // Let the false block fall through when the true block comes next.
        if self.is_next_in_assembly_order(tblock) {
            cont.negate();
            cont.swap_blocks();
        }
        self.visit_flags_condition(branch, value, cont)
    }

    fn visit_return(&mut self, value: NodeId) -> CompileResult<()> {
        let location = self.linkage.return_location()?;
        let operand = self.use_location(value, location);
        self.emit(ArchOpcode::Ret, vec![], vec![operand], vec![]);
        Ok(())
    }

    fn visit_deoptimize(&mut self, deopt: NodeId) -> CompileResult<()> {
        let state = self.graph.value_input(deopt, 0)?;
        let (descriptor, operands) = self.frame_state_operands(state)?;
        let id = self.add_deoptimization_entry(descriptor);
        debug!("deoptimization entry {} for {}", id, deopt);
        let inputs = operands.iter().copied().collect();
        self.emit(InstructionCode::new(ArchOpcode::Deoptimize).with_misc(id), vec![], inputs, vec![]);
        Ok(())
    }

    /// Bail out with the guard's frame state when its condition is non-zero.
    fn visit_deoptimize_if(&mut self, node: NodeId) -> CompileResult<()> {
        let condition = self.graph.value_input(node, 0)?;
        let frame_state = self.graph.value_input(node, 1)?;
        let cont = FlagsContinuation::deoptimize(FlagsCondition::NotEqual, frame_state);
        self.visit_flags_condition(node, condition, cont)
    }

    /// Lower `value` as the condition `user` consumes through `cont`,
    /// folding zero compares and comparisons that `user` can cover.
    fn visit_flags_condition(
        &mut self,
        mut user: NodeId,
        mut value: NodeId,
        mut cont: FlagsContinuation,
    ) -> CompileResult<()> {
        let graph = self.graph;

        while self.can_cover(user, value) {
            let zero = match graph.op(value) {
                Operator::Word32Equal => 0,
                Operator::Word64Equal if self.features.word64 => 0,
                _ => break,
            };
            let m = self.match_binop(value)?;
            if !self.is_int_constant(m.right, zero) {
                break;
            }
            user = value;
            value = m.left;
            cont.negate();
        }

        if self.can_cover(user, value) {
            let word64 = self.features.word64;
            let fused = match *graph.op(value) {
                Operator::Word32Equal => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::Equal);
                    self.visit_word32_compare(value, &cont)?;
                    true
                }
                Operator::Int32LessThan => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThan);
                    self.visit_word32_compare(value, &cont)?;
                    true
                }
                Operator::Int32LessThanOrEqual => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThanOrEqual);
                    self.visit_word32_compare(value, &cont)?;
                    true
                }
                Operator::Uint32LessThan => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::UnsignedLessThan);
                    self.visit_word32_compare(value, &cont)?;
                    true
                }
                Operator::Uint32LessThanOrEqual => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::UnsignedLessThanOrEqual);
                    self.visit_word32_compare(value, &cont)?;
                    true
                }
                Operator::Word64Equal if word64 => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::Equal);
                    self.visit_word64_compare(value, &cont)?;
                    true
                }
                Operator::Int64LessThan if word64 => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThan);
                    self.visit_word64_compare(value, &cont)?;
                    true
                }
                Operator::Int64LessThanOrEqual if word64 => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThanOrEqual);
                    self.visit_word64_compare(value, &cont)?;
                    true
                }
                Operator::Float64Equal => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::UnorderedEqual);
                    self.visit_float64_compare(value, &cont)?;
                    true
                }
                Operator::Float64LessThan => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::UnorderedLessThan);
                    self.visit_float64_compare(value, &cont)?;
                    true
                }
                Operator::Float64LessThanOrEqual => {
                    cont.overwrite_and_negate_if_equal(FlagsCondition::UnorderedLessThanOrEqual);
                    self.visit_float64_compare(value, &cont)?;
                    true
                }
                Operator::Projection(1) => self.visit_overflow_condition(value, &mut cont)?,
                _ => false,
            };
            if fused {
                debug!("fused {} into {} ({:?})", value, user, cont.mode());
                self.session.record_fused_pattern();
                return Ok(());
            }
        }

        self.visit_word32_test(value, &cont)
    }

    /// Fuse the overflow bit of an overflow-checked operation. The value
    /// output must be unused, or defined already by a later block.
    fn visit_overflow_condition(
        &mut self,
        projection: NodeId,
        cont: &mut FlagsContinuation,
    ) -> CompileResult<bool> {
        let node = self.graph.value_input(projection, 0)?;
        if let Some(result) = self.graph.find_projection(node, 0) {
            if !self.is_defined(result) {
                return Ok(false);
            }
        }
        match self.graph.op(node) {
            Operator::Int32AddWithOverflow => {
                cont.overwrite_and_negate_if_equal(FlagsCondition::Overflow);
                self.visit_int32_add_with_overflow(node, cont)?;
                Ok(true)
            }
            Operator::Int32SubWithOverflow => {
                cont.overwrite_and_negate_if_equal(FlagsCondition::Overflow);
                self.visit_int32_sub_with_overflow(node, cont)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // Nodes.

    pub(crate) fn unsupported(&self, node: NodeId) -> CompileError {
        CompileError::UnsupportedOperator {
            node,
            mnemonic: self.graph.op(node).mnemonic(),
            target: self.features.name,
        }
    }

    fn visit_node(&mut self, node: NodeId) -> CompileResult<()> {
        use Operator::*;
        let graph = self.graph;
        if self.schedule.block_of(node).is_none() {
            return Err(CompileError::Unscheduled { node });
        }
        trace!("visit {} {}", node, graph.op(node));

        let op = graph.op(node);
        if is_word64_operator(op) && !self.features.word64 {
            return Err(self.unsupported(node));
        }
        match *op {
            Start | End | Loop(_) | Merge(_) | Branch | IfTrue | IfFalse | EffectPhi(_)
            | LazyDeoptimization | Continuation | FrameState(_) | StateValues(_) => Ok(()),
            Return | Deoptimize => Err(CompileError::invariant(format!(
                "{} ({}) is placed among the nodes of a block",
                node,
                op.mnemonic()
            ))),
            Throw | Dead | LoadContext(_) | StoreContext(_) => Err(self.unsupported(node)),
            Parameter(index) => {
                let location = self.linkage.parameter_location(index)?;
                self.mark_as_representation(location.representation, node)?;
                self.visit_parameter(node, index)
            }
            Phi(_) => self.visit_phi(node),
            Projection(_) => self.visit_projection(node),
            Int32Constant(_) | Int64Constant(_) | ExternalConstant(_) => self.visit_constant(node),
            Float64Constant(_) => {
                self.mark_as_double(node)?;
                self.visit_constant(node)
            }
            HeapConstant(_) | NumberConstant(_) => {
                self.mark_as_reference(node)?;
                self.visit_constant(node)
            }
            Call(_) => self.visit_call(node, None, None),
            DeoptimizeIf => self.visit_deoptimize_if(node),
            Load(rep) => {
                self.mark_as_representation(rep, node)?;
                self.visit_load(node, rep)
            }
            Store(rep) => self.visit_store(node, rep),
            Word32And => self.visit_word32_and(node),
            Word32Or => self.visit_word32_or(node),
            Word32Xor => self.visit_word32_xor(node),
            Word32Shl => self.visit_word32_shl(node),
            Word32Shr => self.visit_word32_shr(node),
            Word32Sar => self.visit_word32_sar(node),
            Word32Equal => self.visit_word32_equal(node),
            Word64And => self.visit_word64_and(node),
            Word64Or => self.visit_word64_or(node),
            Word64Xor => self.visit_word64_xor(node),
            Word64Shl => self.visit_word64_shl(node),
            Word64Shr => self.visit_word64_shr(node),
            Word64Sar => self.visit_word64_sar(node),
            Word64Equal => self.visit_word64_equal(node),
            Int32Add => self.visit_int32_add(node),
            Int32AddWithOverflow => {
                let cont = match graph.find_projection(node, 1) {
                    Some(ovf) => FlagsContinuation::set(FlagsCondition::Overflow, ovf),
                    None => FlagsContinuation::None,
                };
                self.visit_int32_add_with_overflow(node, &cont)
            }
            Int32Sub => self.visit_int32_sub(node),
            Int32SubWithOverflow => {
                let cont = match graph.find_projection(node, 1) {
                    Some(ovf) => FlagsContinuation::set(FlagsCondition::Overflow, ovf),
                    None => FlagsContinuation::None,
                };
                self.visit_int32_sub_with_overflow(node, &cont)
            }
            Int32Mul => self.visit_int32_mul(node),
            Int32Div => self.visit_int32_div(node),
            Int32UDiv => self.visit_int32_udiv(node),
            Int32Mod => self.visit_int32_mod(node),
            Int32UMod => self.visit_int32_umod(node),
            Int32LessThan => self.visit_word32_compare_set(node, FlagsCondition::SignedLessThan),
            Int32LessThanOrEqual => {
                self.visit_word32_compare_set(node, FlagsCondition::SignedLessThanOrEqual)
            }
            Uint32LessThan => self.visit_word32_compare_set(node, FlagsCondition::UnsignedLessThan),
            Uint32LessThanOrEqual => {
                self.visit_word32_compare_set(node, FlagsCondition::UnsignedLessThanOrEqual)
            }
            Int64Add => self.visit_int64_add(node),
            Int64Sub => self.visit_int64_sub(node),
            Int64Mul => self.visit_int64_mul(node),
            Int64Div => self.visit_int64_div(node),
            Int64UDiv => self.visit_int64_udiv(node),
            Int64Mod => self.visit_int64_mod(node),
            Int64UMod => self.visit_int64_umod(node),
            Int64LessThan => {
                let cont = FlagsContinuation::set(FlagsCondition::SignedLessThan, node);
                self.visit_word64_compare(node, &cont)
            }
            Int64LessThanOrEqual => {
                let cont = FlagsContinuation::set(FlagsCondition::SignedLessThanOrEqual, node);
                self.visit_word64_compare(node, &cont)
            }
            ConvertInt32ToInt64 => self.visit_convert_int32_to_int64(node),
            ConvertInt64ToInt32 => self.visit_convert_int64_to_int32(node),
            ChangeInt32ToFloat64 => {
                self.mark_as_double(node)?;
                self.visit_change_int32_to_float64(node)
            }
            ChangeUint32ToFloat64 => {
                self.mark_as_double(node)?;
                self.visit_change_uint32_to_float64(node)
            }
            ChangeFloat64ToInt32 => self.visit_change_float64_to_int32(node),
            ChangeFloat64ToUint32 => self.visit_change_float64_to_uint32(node),
            Float64Add => {
                self.mark_as_double(node)?;
                self.visit_float64_add(node)
            }
            Float64Sub => {
                self.mark_as_double(node)?;
                self.visit_float64_sub(node)
            }
            Float64Mul => {
                self.mark_as_double(node)?;
                self.visit_float64_mul(node)
            }
            Float64Div => {
                self.mark_as_double(node)?;
                self.visit_float64_div(node)
            }
            Float64Mod => {
                self.mark_as_double(node)?;
                self.visit_float64_mod(node)
            }
            Float64Equal => self.visit_float64_compare_set(node, FlagsCondition::UnorderedEqual),
            Float64LessThan => self.visit_float64_compare_set(node, FlagsCondition::UnorderedLessThan),
            Float64LessThanOrEqual => {
                self.visit_float64_compare_set(node, FlagsCondition::UnorderedLessThanOrEqual)
            }
        }
    }

    fn visit_parameter(&mut self, node: NodeId, index: u32) -> CompileResult<()> {
        let location = self.linkage.parameter_location(index)?;
        let output = self.define_as_location(node, location);
        self.emit(ArchOpcode::Nop, vec![output], vec![], vec![]);
        Ok(())
    }

    /// One input per predecessor, in predecessor order. The control input
    /// is not a value and gets no operand.
    fn visit_phi(&mut self, node: NodeId) -> CompileResult<()> {
        let graph = self.graph;
        let output = self.define_as_any(node);
        let mut inputs = Vec::new();
        for &input in phi_values(graph, node) {
            inputs.push(self.use_any(input));
        }
        self.emit(ArchOpcode::Phi, vec![output], inputs, vec![]);
        Ok(())
    }

    fn visit_projection(&mut self, node: NodeId) -> CompileResult<()> {
        let value = self.graph.value_input(node, 0)?;
        match (self.graph.op(value), self.graph.op(node)) {
            (Operator::Int32AddWithOverflow | Operator::Int32SubWithOverflow, Operator::Projection(0)) => {
                let output = self.define_same_as_first(node);
                let input = self.use_any(value);
                self.emit(ArchOpcode::Nop, vec![output], vec![input], vec![]);
            }
            (Operator::Int32AddWithOverflow | Operator::Int32SubWithOverflow, _) => {
                self.mark_as_used(value);
            }
            _ => {}
        }
        Ok(())
    }

    /// Every live range needs a defining instruction, constants included.
    fn visit_constant(&mut self, node: NodeId) -> CompileResult<()> {
        let output = self.define_as_constant(node)?;
        self.emit(ArchOpcode::Nop, vec![output], vec![], vec![]);
        Ok(())
    }

    pub(crate) fn visit_word32_equal(&mut self, node: NodeId) -> CompileResult<()> {
        let cont = FlagsContinuation::set(FlagsCondition::Equal, node);
        let m = self.match_binop(node)?;
        if self.is_int_constant(m.right, 0) {
            return self.visit_word32_test(m.left, &cont);
        }
        self.visit_word32_compare(node, &cont)
    }

    pub(crate) fn visit_word64_equal(&mut self, node: NodeId) -> CompileResult<()> {
        let cont = FlagsContinuation::set(FlagsCondition::Equal, node);
        let m = self.match_binop(node)?;
        if self.is_int_constant(m.right, 0) {
            return self.visit_word64_test(m.left, &cont);
        }
        self.visit_word64_compare(node, &cont)
    }

    fn visit_word32_compare_set(&mut self, node: NodeId, condition: FlagsCondition) -> CompileResult<()> {
        let cont = FlagsContinuation::set(condition, node);
        self.visit_word32_compare(node, &cont)
    }

    fn visit_float64_compare_set(&mut self, node: NodeId, condition: FlagsCondition) -> CompileResult<()> {
        let cont = FlagsContinuation::set(condition, node);
        self.visit_float64_compare(node, &cont)
    }

    /// Lower a call, either in the middle of a block or as the block's
    /// control with its continuation and deoptimization successors.
    pub(crate) fn visit_call(
        &mut self,
        call: NodeId,
        continuation: Option<BlockId>,
        deoptimization: Option<BlockId>,
    ) -> CompileResult<()> {
        let graph = self.graph;
        let Operator::Call(descriptor) = graph.op(call) else {
            return Err(CompileError::invariant(format!(
                "{} ({}) is not a call",
                call,
                graph.op(call).mnemonic()
            )));
        };
        let mut buffer = CallBuffer::new(self.session.arena(), descriptor);
        self.initialize_call_buffer(call, &mut buffer, continuation, deoptimization)?;
        self.emit_call(&buffer, deoptimization.is_some())
    }
}
