//! graphsel: the middle and back end core of an optimizing compiler.
//!
//! A function arrives as a sea-of-nodes graph. The [`reduce`] passes rewrite
//! it to a fixed point (constant folding, context specialization), an
//! upstream scheduler places the nodes in basic blocks, and the instruction
//! selector lowers the scheduled graph to x64 instructions over virtual
//! registers.
//!
//! ```ignore
//! use bumpalo::Bump;
//! use graphsel::core::CompilationSession;
//! use graphsel::select::TargetFeatures;
//! use graphsel::test_ir::parse_module;
//!
//! let module = parse_module(&text)?;
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let sequence = module.functions[0].select(TargetFeatures::x64(), &session)?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, bit vectors, the compilation session
//! - [`ir`] - graph, operators, heap model, schedule, traversal
//! - [`reduce`] - the graph reducer and its reducers
//! - [`select`] - target independent instruction selection
//! - [`x64`] - x64 opcodes, registers, calling conventions, lowering rules
//! - [`codegen`] - consumers of the selected instructions
//! - [`test_ir`] - the `.tir` text format

pub mod codegen;
pub mod core;
pub mod ir;
pub mod reduce;
pub mod select;
pub mod test_ir;
pub mod x64;

pub use crate::core::{CompilationSession, CompileError, CompileResult, SessionStats};
pub use crate::ir::{Graph, NodeId, Operator, Schedule};
pub use crate::reduce::{GraphReducer, Reducer, Reduction};
pub use crate::select::{InstructionSelector, InstructionSequence, TargetFeatures};
