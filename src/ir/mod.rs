//! The sea-of-nodes intermediate representation.
//!
//! - [`node`] / [`operator`]: vertices and their typed operators
//! - [`graph`]: the node arena and edge mutation
//! - [`heap`]: the managed objects heap constants refer to
//! - [`schedule`]: basic blocks and block order, produced upstream
//! - [`visit`]: explicit-stack depth-first traversal

pub mod graph;
pub mod heap;
pub mod node;
pub mod operator;
pub mod schedule;
pub mod visit;

pub use graph::Graph;
pub use heap::{Heap, HeapObject, HeapRef};
pub use node::{EdgeKind, Node, NodeId, Use};
pub use operator::{
    BailoutId, ContextAccess, InputLayout, MachineType, Operator, OutputLayout, StoreRepresentation,
    WriteBarrierKind,
};
pub use schedule::{BasicBlock, BlockId, ControlKind, Schedule};
pub use visit::{visit, visit_node_inputs_from_end, visit_node_uses_from_start, Control, Direction, NodeVisitor};
