// This module defines the error type shared by every pass of the compiler core using the
// thiserror crate. CompileError covers the three failure families a graph compilation can
// hit: invariant violations left behind by an upstream pass (bad node ids, wrong input
// arity, malformed edge kinds, phis in branch targets, unscheduled nodes, conflicting
// value representations, incomplete call argument partitions), operators that the active
// target configuration cannot lower, and reductions that fail to reach a fixed point within
// the attempt bound. Text IR parse failures are reported through the same enum so the
// command line tool has a single error path. CompileResult<T> is the matching alias.

//! Error types for the graph compiler.
//!
//! All failures are compiler-internal: they indicate a defect in an upstream
//! pass or a configuration gap, never a user error. They are reported as
//! structured values so the caller of a pass decides how to abort.

use thiserror::Error;

use crate::ir::{BlockId, EdgeKind, NodeId};

/// Main error type for graph reduction and instruction selection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("node {node} is not part of the graph")]
    InvalidNode { node: NodeId },

    #[error("{mnemonic} at node {node} expects {expected} inputs, got {actual}")]
    InputArity {
        node: NodeId,
        mnemonic: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("input {index} of node {node} is a {actual:?} edge, expected {expected:?}")]
    EdgeKind {
        node: NodeId,
        index: usize,
        expected: EdgeKind,
        actual: EdgeKind,
    },

    #[error("branch target {block} contains a phi")]
    BranchTargetHasPhi { block: BlockId },

    #[error("node {node} is not scheduled in any block")]
    Unscheduled { node: NodeId },

    #[error("node {node} is marked both as double and as reference")]
    RepresentationConflict { node: NodeId },

    #[error("call {node} has {inputs} value inputs but {fixed} fixed and {pushed} pushed arguments")]
    CallArguments {
        node: NodeId,
        inputs: usize,
        fixed: usize,
        pushed: usize,
    },

    #[error("invariant violated: {reason}")]
    Invariant { reason: String },

    #[error("unsupported operator {mnemonic} at node {node} for target {target}")]
    UnsupportedOperator {
        node: NodeId,
        mnemonic: &'static str,
        target: &'static str,
    },

    #[error("reduction of node {node} did not reach a fixed point after {attempts} attempts")]
    ReductionLimitExceeded { node: NodeId, attempts: usize },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl CompileError {
    /// Shorthand for a free-form invariant violation.
    pub fn invariant(reason: impl Into<String>) -> Self {
        CompileError::Invariant {
            reason: reason.into(),
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
