// This module defines the selector's output: the Instruction and its operands, and the
// InstructionSequence that collects the instructions of one function together with the
// side tables a register allocator and code generator need. Operands of a freshly selected
// instruction are mostly unallocated virtual registers carrying an allocation policy (any
// location, some register, a fixed register or stack slot, or the same register as the
// first input); the virtual register of a node's value is the node id, and temporaries get
// fresh numbers above the node count. Constants are recorded per virtual register, while
// immediates live in their own table and are referenced by index. The sequence also keeps
// the per-block instruction ranges in final block order, the double and reference marks of
// virtual registers, and the table of deoptimization entries (captured frame layouts).

//! Instructions, operands and the instruction sequence.

use std::fmt;

use hashbrown::{HashMap, HashSet};

use super::flags::{FlagsContinuation, FlagsCondition, FlagsMode};
use crate::core::{CompileError, CompileResult};
use crate::ir::{BailoutId, BlockId, HeapRef};
use crate::x64::X64Opcode;

/// Allocation policy of an unallocated operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandPolicy {
    Any,
    MustHaveRegister,
    FixedRegister(u8),
    FixedDoubleRegister(u8),
    FixedSlot(i32),
    SameAsFirstInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionOperand {
    /// A virtual register waiting for the register allocator.
    Unallocated {
        policy: OperandPolicy,
        vreg: u32,
        /// The input is dead once the instruction starts, so an output may
        /// share its location.
        used_at_start: bool,
    },
    /// The value of a constant node.
    Constant(u32),
    /// Index into the sequence's immediate table.
    Immediate(usize),
    /// A basic block, for jumps and call continuations.
    Label(BlockId),
}

impl InstructionOperand {
    pub fn unallocated(policy: OperandPolicy, vreg: u32) -> Self {
        InstructionOperand::Unallocated {
            policy,
            vreg,
            used_at_start: false,
        }
    }

    pub fn vreg(&self) -> Option<u32> {
        match *self {
            InstructionOperand::Unallocated { vreg, .. } | InstructionOperand::Constant(vreg) => Some(vreg),
            _ => None,
        }
    }

    pub fn policy(&self) -> Option<OperandPolicy> {
        match *self {
            InstructionOperand::Unallocated { policy, .. } => Some(policy),
            _ => None,
        }
    }

    pub fn has_fixed_slot_policy(&self) -> bool {
        matches!(self.policy(), Some(OperandPolicy::FixedSlot(_)))
    }

    pub fn is_unallocated(&self) -> bool {
        matches!(self, InstructionOperand::Unallocated { .. })
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, InstructionOperand::Immediate(_))
    }

    pub fn is_label(&self) -> bool {
        matches!(self, InstructionOperand::Label(_))
    }
}

impl fmt::Display for InstructionOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            InstructionOperand::Unallocated { policy, vreg, used_at_start } => {
                write!(f, "v{}", vreg)?;
                match policy {
                    OperandPolicy::Any => f.write_str("(-)")?,
                    OperandPolicy::MustHaveRegister => f.write_str("(R)")?,
                    OperandPolicy::FixedRegister(code) => write!(f, "(=r{})", code)?,
                    OperandPolicy::FixedDoubleRegister(code) => write!(f, "(=d{})", code)?,
                    OperandPolicy::FixedSlot(slot) => write!(f, "(=slot{})", slot)?,
                    OperandPolicy::SameAsFirstInput => f.write_str("(1)")?,
                }
                if used_at_start {
                    f.write_str("^")?;
                }
                Ok(())
            }
            InstructionOperand::Constant(vreg) => write!(f, "[constant:{}]", vreg),
            InstructionOperand::Immediate(index) => write!(f, "[immediate:{}]", index),
            InstructionOperand::Label(block) => write!(f, "[{}]", block),
        }
    }
}

/// Target independent opcodes, plus the target's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchOpcode {
    Nop,
    Jmp,
    Ret,
    Deoptimize,
    /// Merge one value per predecessor into the output.
    Phi,
    /// Drop `misc` pushed argument slots after a call.
    PopStack,
    Target(X64Opcode),
}

impl ArchOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArchOpcode::Nop => "arch_nop",
            ArchOpcode::Jmp => "arch_jmp",
            ArchOpcode::Ret => "arch_ret",
            ArchOpcode::Deoptimize => "arch_deoptimize",
            ArchOpcode::Phi => "arch_phi",
            ArchOpcode::PopStack => "arch_pop_stack",
            ArchOpcode::Target(op) => op.mnemonic(),
        }
    }
}

impl From<X64Opcode> for ArchOpcode {
    fn from(op: X64Opcode) -> Self {
        ArchOpcode::Target(op)
    }
}

/// Memory operand shape of loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    None,
    /// `[base + index*1 + disp]`
    MR1I,
    /// `[base + disp]`
    MRI,
}

/// Opcode plus the fields that refine it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionCode {
    pub opcode: ArchOpcode,
    pub addressing_mode: AddressingMode,
    pub flags_mode: FlagsMode,
    pub condition: Option<FlagsCondition>,
    /// Opcode specific payload: deoptimization id, popped slot count, or
    /// whether a call records a lazy bailout.
    pub misc: i32,
}

impl InstructionCode {
    pub fn new(opcode: impl Into<ArchOpcode>) -> Self {
        Self {
            opcode: opcode.into(),
            addressing_mode: AddressingMode::None,
            flags_mode: FlagsMode::None,
            condition: None,
            misc: 0,
        }
    }

    pub fn with_addressing_mode(mut self, mode: AddressingMode) -> Self {
        self.addressing_mode = mode;
        self
    }

    pub fn with_misc(mut self, misc: i32) -> Self {
        self.misc = misc;
        self
    }

    /// Attach the flags consumer of `cont`.
    pub fn with_continuation(mut self, cont: &FlagsContinuation) -> Self {
        self.flags_mode = cont.mode();
        self.condition = cont.condition();
        self
    }
}

impl From<ArchOpcode> for InstructionCode {
    fn from(opcode: ArchOpcode) -> Self {
        InstructionCode::new(opcode)
    }
}

impl From<X64Opcode> for InstructionCode {
    fn from(opcode: X64Opcode) -> Self {
        InstructionCode::new(opcode)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    code: InstructionCode,
    outputs: Vec<InstructionOperand>,
    inputs: Vec<InstructionOperand>,
    temps: Vec<InstructionOperand>,
    is_control: bool,
    is_call: bool,
}

impl Instruction {
    pub fn new(
        code: InstructionCode,
        outputs: Vec<InstructionOperand>,
        inputs: Vec<InstructionOperand>,
        temps: Vec<InstructionOperand>,
    ) -> Self {
        Self {
            code,
            outputs,
            inputs,
            temps,
            is_control: false,
            is_call: false,
        }
    }

    pub fn code(&self) -> InstructionCode {
        self.code
    }

    pub fn opcode(&self) -> ArchOpcode {
        self.code.opcode
    }

    pub fn mnemonic(&self) -> &'static str {
        self.code.opcode.mnemonic()
    }

    pub fn outputs(&self) -> &[InstructionOperand] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[InstructionOperand] {
        &self.inputs
    }

    pub fn temps(&self) -> &[InstructionOperand] {
        &self.temps
    }

    pub fn is_control(&self) -> bool {
        self.is_control
    }

    pub fn is_call(&self) -> bool {
        self.is_call
    }

    pub fn mark_as_control(&mut self) {
        self.is_control = true;
    }

    pub fn mark_as_call(&mut self) {
        self.is_call = true;
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, out) in self.outputs.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { "" } else { " " }, out)?;
        }
        if !self.outputs.is_empty() {
            f.write_str(" = ")?;
        }
        f.write_str(self.mnemonic())?;
        if self.code.addressing_mode != AddressingMode::None {
            write!(f, " : {:?}", self.code.addressing_mode)?;
        }
        if let Some(condition) = self.code.condition {
            let mode = match self.code.flags_mode {
                FlagsMode::Branch => "branch",
                FlagsMode::Set => "set",
                FlagsMode::Deoptimize => "deoptimize",
                FlagsMode::None => "none",
            };
            write!(f, " && {} if {}", mode, condition)?;
        }
        for input in &self.inputs {
            write!(f, " {}", input)?;
        }
        if !self.temps.is_empty() {
            f.write_str(" ;")?;
            for temp in &self.temps {
                write!(f, " {}", temp)?;
            }
        }
        Ok(())
    }
}

/// A constant value known at selection time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    ExternalReference(u64),
    HeapObject(HeapRef),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int32(v) => write!(f, "{}", v),
            Constant::Int64(v) => write!(f, "{}l", v),
            Constant::Float64(v) => write!(f, "{}f", v),
            Constant::ExternalReference(a) => write!(f, "&{:#x}", a),
            Constant::HeapObject(h) => write!(f, "{}", h),
        }
    }
}

/// Layout of the frame captured by a deoptimization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStateDescriptor {
    pub bailout_id: BailoutId,
    pub parameters: usize,
    pub locals: usize,
    pub stack: usize,
}

impl FrameStateDescriptor {
    /// Number of captured values.
    pub fn size(&self) -> usize {
        self.parameters + self.locals + self.stack
    }
}

/// Instruction range of one block: `start..end` in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub block: BlockId,
    pub start: usize,
    pub end: usize,
    pub deferred: bool,
}

/// The instructions of one function in final order.
#[derive(Debug, Default)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
    blocks: Vec<BlockRange>,
    block_start: Option<(BlockId, usize, bool)>,
    doubles: HashSet<u32>,
    references: HashSet<u32>,
    constants: HashMap<u32, Constant>,
    immediates: Vec<Constant>,
    deoptimization_entries: Vec<FrameStateDescriptor>,
    next_virtual_register: u32,
}

impl InstructionSequence {
    /// Virtual registers below `node_count` are reserved for node values.
    pub fn new(node_count: usize) -> Self {
        Self {
            next_virtual_register: node_count as u32,
            ..Self::default()
        }
    }

    pub fn next_virtual_register(&mut self) -> u32 {
        let vreg = self.next_virtual_register;
        self.next_virtual_register += 1;
        vreg
    }

    pub fn virtual_register_count(&self) -> u32 {
        self.next_virtual_register
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Block ranges in final block order.
    pub fn blocks(&self) -> &[BlockRange] {
        &self.blocks
    }

    /// Instructions of `block`, if it was emitted.
    pub fn block_instructions(&self, block: BlockId) -> Option<&[Instruction]> {
        self.blocks
            .iter()
            .find(|r| r.block == block)
            .map(|r| &self.instructions[r.start..r.end])
    }

    pub fn start_block(&mut self, block: BlockId, deferred: bool) -> CompileResult<()> {
        if let Some((open, _, _)) = self.block_start {
            return Err(CompileError::invariant(format!(
                "{} started while {} is still open",
                block, open
            )));
        }
        self.block_start = Some((block, self.instructions.len(), deferred));
        Ok(())
    }

    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn end_block(&mut self, block: BlockId) -> CompileResult<()> {
        match self.block_start.take() {
            Some((open, start, deferred)) if open == block => {
                self.blocks.push(BlockRange {
                    block,
                    start,
                    end: self.instructions.len(),
                    deferred,
                });
                Ok(())
            }
            _ => Err(CompileError::invariant(format!("{} ended without being started", block))),
        }
    }

    pub fn mark_as_double(&mut self, vreg: u32) {
        self.doubles.insert(vreg);
    }

    pub fn mark_as_reference(&mut self, vreg: u32) {
        self.references.insert(vreg);
    }

    pub fn is_double(&self, vreg: u32) -> bool {
        self.doubles.contains(&vreg)
    }

    pub fn is_reference(&self, vreg: u32) -> bool {
        self.references.contains(&vreg)
    }

    pub fn add_constant(&mut self, vreg: u32, constant: Constant) {
        self.constants.insert(vreg, constant);
    }

    pub fn constant(&self, vreg: u32) -> Option<Constant> {
        self.constants.get(&vreg).copied()
    }

    pub fn add_immediate(&mut self, constant: Constant) -> usize {
        self.immediates.push(constant);
        self.immediates.len() - 1
    }

    pub fn immediate(&self, index: usize) -> Option<Constant> {
        self.immediates.get(index).copied()
    }

    /// Register a frame layout and return its deoptimization id.
    pub fn add_deoptimization_entry(&mut self, descriptor: FrameStateDescriptor) -> usize {
        self.deoptimization_entries.push(descriptor);
        self.deoptimization_entries.len() - 1
    }

    pub fn deoptimization_entry(&self, id: usize) -> Option<&FrameStateDescriptor> {
        self.deoptimization_entries.get(id)
    }

    pub fn deoptimization_entries(&self) -> &[FrameStateDescriptor] {
        &self.deoptimization_entries
    }
}
