//! IR nodes and their identifiers.
//!
//! A node owns its operator, its ordered inputs and the list of its uses.
//! Inputs are positional: the consuming operator's layout decides whether
//! input `i` is a value, effect or control edge. Uses are the reverse edges,
//! kept as `(user, input index)` pairs so an edge can be updated in place.

use std::fmt;

use super::operator::Operator;

/// Identifier of a node, dense and monotonically increasing within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index, usable for per-node side tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an edge, derived from the consuming operator's input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Value,
    Effect,
    Control,
}

/// A reverse edge: `user` consumes this node at input `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: NodeId,
    pub index: u32,
}

/// A vertex of the graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub(crate) op: Operator,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) uses: Vec<Use>,
}

impl Node {
    pub(crate) fn new(id: NodeId, op: Operator, inputs: Vec<NodeId>) -> Self {
        Self {
            id,
            op,
            inputs,
            uses: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn op(&self) -> &Operator {
        &self.op
    }

    #[inline]
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    #[inline]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Input at `index`, if present.
    #[inline]
    pub fn input_at(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied()
    }

    #[inline]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    #[inline]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    /// True once the node has been unlinked by a reduction, or for a `Dead`
    /// marker nothing refers to.
    pub fn is_dead(&self) -> bool {
        self.uses.is_empty()
            && (matches!(self.op, Operator::Dead)
                || (self.inputs.is_empty() && self.op.total_input_count() > 0))
    }

    /// Kind of input edge `index` according to this node's operator.
    pub fn edge_kind(&self, index: usize) -> EdgeKind {
        self.op.edge_kind(index)
    }

    /// Whether the node has exactly one use and that use is `owner`.
    pub fn owned_by(&self, owner: NodeId) -> bool {
        self.uses.len() == 1 && self.uses[0].user == owner
    }
}
