// This module is the consumer side of instruction selection. A CodeGenerator takes a
// finished InstructionSequence and turns it into some output; real machine code emission
// needs register allocation first, which this crate does not do, so the generator shipped
// here is a listing generator. It prints every block in final order with its instructions,
// resolving immediates to their values and fixed register policies to x86-64 register names,
// followed by the constant table and the deoptimization entries. The command line tool and
// the integration tests read this listing.

//! Code generator interface and the textual listing generator.

use std::fmt::Write as _;

use crate::core::{CompileError, CompileResult};
use crate::select::{
    Instruction, InstructionOperand, InstructionSequence, OperandPolicy,
};
use crate::x64::registers::{double_register_name, register_name};

/// Consumer of a selected instruction sequence.
pub trait CodeGenerator {
    type Output;

    /// Generate output for one function.
    fn generate(&mut self, name: &str, sequence: &InstructionSequence) -> CompileResult<Self::Output>;
}

/// Renders an instruction sequence as text.
#[derive(Debug, Default)]
pub struct ListingGenerator {
    /// Append the constant table and deoptimization entries.
    pub show_tables: bool,
}

impl ListingGenerator {
    pub fn new() -> Self {
        Self { show_tables: true }
    }

    fn operand(sequence: &InstructionSequence, operand: &InstructionOperand) -> CompileResult<String> {
        Ok(match *operand {
            InstructionOperand::Unallocated { policy, vreg, used_at_start } => {
                let policy = match policy {
                    OperandPolicy::Any => "-".to_string(),
                    OperandPolicy::MustHaveRegister if sequence.is_double(vreg) => "D".to_string(),
                    OperandPolicy::MustHaveRegister => "R".to_string(),
                    OperandPolicy::FixedRegister(code) => format!("={}", register_name(code)),
                    OperandPolicy::FixedDoubleRegister(code) => format!("={}", double_register_name(code)),
                    OperandPolicy::FixedSlot(slot) => format!("=slot{}", slot),
                    OperandPolicy::SameAsFirstInput => "1".to_string(),
                };
                format!("v{}({}){}", vreg, policy, if used_at_start { "^" } else { "" })
            }
            InstructionOperand::Constant(vreg) => format!("[constant:v{}]", vreg),
            InstructionOperand::Immediate(index) => {
                let value = sequence.immediate(index).ok_or_else(|| {
                    CompileError::invariant(format!("immediate {} is not in the sequence", index))
                })?;
                format!("#{}", value)
            }
            InstructionOperand::Label(block) => format!("[{}]", block),
        })
    }

    fn instruction(
        out: &mut String,
        sequence: &InstructionSequence,
        index: usize,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let mut line = format!("{:4}: ", index);
        for (i, output) in instruction.outputs().iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&Self::operand(sequence, output)?);
        }
        if !instruction.outputs().is_empty() {
            line.push_str(" = ");
        }
        line.push_str(instruction.mnemonic());

        let code = instruction.code();
        if let Some(condition) = code.condition {
            let _ = write!(line, " && {:?} if {}", code.flags_mode, condition);
        }
        if code.misc != 0 {
            let _ = write!(line, " <{}>", code.misc);
        }
        for input in instruction.inputs() {
            line.push(' ');
            line.push_str(&Self::operand(sequence, input)?);
        }
        if !instruction.temps().is_empty() {
            line.push_str(" ;");
            for temp in instruction.temps() {
                line.push(' ');
                line.push_str(&Self::operand(sequence, temp)?);
            }
        }
        if instruction.is_call() {
            line.push_str(" [call]");
        }
        let _ = writeln!(out, "{}", line.trim_end());
        Ok(())
    }
}

impl CodeGenerator for ListingGenerator {
    type Output = String;

    fn generate(&mut self, name: &str, sequence: &InstructionSequence) -> CompileResult<String> {
        let mut out = String::new();
        let _ = writeln!(out, "function {}", name);
        for range in sequence.blocks() {
            let deferred = if range.deferred { " (deferred)" } else { "" };
            let _ = writeln!(out, "{}{}:", range.block, deferred);
            let instructions = sequence.instructions().get(range.start..range.end).ok_or_else(|| {
                CompileError::invariant(format!("block {} has an invalid instruction range", range.block))
            })?;
            for (offset, instruction) in instructions.iter().enumerate() {
                Self::instruction(&mut out, sequence, range.start + offset, instruction)?;
            }
        }

        if self.show_tables {
            let mut constants: Vec<_> = (0..sequence.virtual_register_count())
                .filter_map(|vreg| sequence.constant(vreg).map(|c| (vreg, c)))
                .collect();
            constants.sort_by_key(|(vreg, _)| *vreg);
            if !constants.is_empty() {
                out.push_str("constants:\n");
                for (vreg, constant) in constants {
                    let _ = writeln!(out, "  v{} = {}", vreg, constant);
                }
            }
            let entries = sequence.deoptimization_entries();
            if !entries.is_empty() {
                out.push_str("deoptimization entries:\n");
                for (id, entry) in entries.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "  {}: bailout {} ({} parameters, {} locals, {} stack)",
                        id, entry.bailout_id.0, entry.parameters, entry.locals, entry.stack
                    );
                }
            }
        }
        Ok(out)
    }
}
