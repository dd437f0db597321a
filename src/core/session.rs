// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession is the per-compilation hub shared by the graph reducer and the
// instruction selector: it hands out the arena that scratch buffers (call buffers,
// deoptimization operand lists) are carved from, and it accumulates SessionStats across
// passes. Stats cover the reducer (nodes visited, in-place changes, replacements) and the
// selector (instructions emitted per opcode, fused flag patterns, deoptimization entries),
// and render as a human readable report for the command line tool. All bookkeeping lives
// behind RefCell so passes only need a shared reference to the session.

//! Arena-based compilation session management.
//!
//! All scratch data of a compilation is tied to the session lifetime, which
//! keeps lifetimes simple: the session outlives every pass that borrows it.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for compilation scratch objects.
    arena: &'arena Bump,

    /// Session statistics for debugging and tuning.
    stats: RefCell<SessionStats>,

    /// Name of the function currently being compiled.
    current_function: RefCell<Option<String>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            current_function: RefCell::new(None),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Set current function being compiled.
    pub fn set_current_function(&self, name: &str) {
        *self.current_function.borrow_mut() = Some(name.to_string());
    }

    /// Name of the function being compiled, if any.
    pub fn current_function(&self) -> Option<String> {
        self.current_function.borrow().clone()
    }

    /// Record that a function went through selection.
    pub fn record_function_selected(&self, name: &str, instruction_count: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_selected += 1;
        if stats.largest_function_size < instruction_count {
            stats.largest_function_size = instruction_count;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Record a node handed to the reducer.
    pub fn record_node_reduced(&self) {
        self.stats.borrow_mut().nodes_reduced += 1;
    }

    /// Record an in-place reduction.
    pub fn record_in_place_change(&self) {
        self.stats.borrow_mut().in_place_changes += 1;
    }

    /// Record a node replacement.
    pub fn record_replacement(&self) {
        self.stats.borrow_mut().replacements += 1;
    }

    /// Record an emitted instruction.
    pub fn record_instruction_selected(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_selected += 1;
        *stats
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    /// Record a producer folded into its consumer's instruction.
    pub fn record_fused_pattern(&self) {
        self.stats.borrow_mut().fused_patterns += 1;
    }

    /// Record a registered deoptimization entry.
    pub fn record_deoptimization_entry(&self) {
        self.stats.borrow_mut().deoptimization_entries += 1;
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of functions that went through instruction selection.
    pub functions_selected: usize,

    /// Nodes handed to the reducer (counting repeated visits).
    pub nodes_reduced: usize,

    /// Reductions that changed a node in place.
    pub in_place_changes: usize,

    /// Reductions that replaced a node.
    pub replacements: usize,

    /// Number of instructions emitted by the selector.
    pub instructions_selected: usize,

    /// Count of each instruction mnemonic emitted.
    pub instruction_counts: HashMap<String, usize>,

    /// Producers covered by a consumer instruction.
    pub fused_patterns: usize,

    /// Deoptimization entries registered.
    pub deoptimization_entries: usize,

    /// Largest function selected, in instructions.
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Nodes reduced: {}", self.nodes_reduced)?;
        writeln!(f, "  In-place changes: {}", self.in_place_changes)?;
        writeln!(f, "  Replacements: {}", self.replacements)?;
        writeln!(f, "  Functions selected: {}", self.functions_selected)?;
        writeln!(f, "  Instructions selected: {}", self.instructions_selected)?;
        writeln!(f, "  Fused patterns: {}", self.fused_patterns)?;
        writeln!(f, "  Deoptimization entries: {}", self.deoptimization_entries)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|(a_name, a), (b_name, b)| b.cmp(a).then(a_name.cmp(b_name)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_session_creation() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.nodes_reduced, 0);
        assert_eq!(stats.instructions_selected, 0);
        assert!(session.current_function().is_none());
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_node_reduced();
        session.record_node_reduced();
        session.record_in_place_change();
        session.record_replacement();
        session.record_instruction_selected("x64_add32");
        session.record_instruction_selected("arch_ret");
        session.record_instruction_selected("x64_add32");
        session.record_fused_pattern();
        session.record_function_selected("f", 3);

        let stats = session.stats();
        assert_eq!(stats.nodes_reduced, 2);
        assert_eq!(stats.in_place_changes, 1);
        assert_eq!(stats.replacements, 1);
        assert_eq!(stats.instructions_selected, 3);
        assert_eq!(stats.instruction_counts["x64_add32"], 2);
        assert_eq!(stats.fused_patterns, 1);
        assert_eq!(stats.largest_function_name, "f");
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_instruction_selected("arch_nop");
        session.record_function_selected("select_example", 7);

        let output = format!("{}", session.stats());
        assert!(output.contains("Instructions selected: 1"));
        assert!(output.contains("select_example (7 instructions)"));
        assert!(output.contains("arch_nop: 1"));
    }
}
