// This module implements the Graph, the arena that owns every IR node of one compilation
// unit. Nodes are addressed by dense NodeId values handed out in creation order, so the
// node count doubles as the watermark the reducer uses to tell nodes that existed before a
// reduction from the ones it created. Nodes are never freed: a node that is reduced away
// is unlinked by clearing its inputs and dropping it from its inputs' use lists. Every edge
// update goes through the graph so that the forward input lists and the reverse use lists
// stay consistent. Replacing the uses of a node is edge-kind aware: value uses move to the
// replacement, while effect and control uses fall through to the replaced node's own
// effect and control inputs when the replacement does not produce those outputs. The graph
// also caches constant nodes so equal constants share one node.

//! Graph container, edge mutation and the constant cache.

use std::fmt;

use hashbrown::HashMap;
use log::trace;

use super::heap::HeapRef;
use super::node::{EdgeKind, Node, NodeId, Use};
use super::operator::Operator;
use crate::core::{CompileError, CompileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int32(i32),
    Int64(i64),
    Float64(u64),
    Number(u64),
    External(u64),
    Heap(HeapRef),
}

/// Owner of all nodes of one function.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    start: Option<NodeId>,
    end: Option<NodeId>,
    constants: HashMap<ConstantKey, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever created. Node ids are below this value.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn start(&self) -> Option<NodeId> {
        self.start
    }

    pub fn end(&self) -> Option<NodeId> {
        self.end
    }

    pub fn set_start(&mut self, node: NodeId) {
        self.start = Some(node);
    }

    pub fn set_end(&mut self, node: NodeId) {
        self.end = Some(node);
    }

    /// Create a node, checking the input count against the operator layout.
    pub fn new_node(&mut self, op: Operator, inputs: &[NodeId]) -> CompileResult<NodeId> {
        let id = NodeId::new(self.nodes.len() as u32);
        let expected = op.total_input_count();
        if inputs.len() != expected {
            return Err(CompileError::InputArity {
                node: id,
                mnemonic: op.mnemonic(),
                expected,
                actual: inputs.len(),
            });
        }
        for &input in inputs {
            self.check(input)?;
        }
        Ok(self.push_node(op, inputs.to_vec()))
    }

    fn push_node(&mut self, op: Operator, inputs: Vec<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        for (index, &input) in inputs.iter().enumerate() {
            self.nodes[input.index()].uses.push(Use {
                user: id,
                index: index as u32,
            });
        }
        self.nodes.push(Node::new(id, op, inputs));
        id
    }

    /// Fail with `InvalidNode` unless `id` names a node of this graph.
    pub fn check(&self, id: NodeId) -> CompileResult<()> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(CompileError::InvalidNode { node: id })
        }
    }

    pub fn try_node(&self, id: NodeId) -> CompileResult<&Node> {
        self.nodes.get(id.index()).ok_or(CompileError::InvalidNode { node: id })
    }

    /// Node by id.
    ///
    /// Panics if `id` was not produced by this graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> &Operator {
        &self.nodes[id.index()].op
    }

    #[inline]
    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].inputs
    }

    #[inline]
    pub fn uses(&self, id: NodeId) -> &[Use] {
        &self.nodes[id.index()].uses
    }

    /// Input `index` of `id`, reporting a missing input as an arity error.
    pub fn input(&self, id: NodeId, index: usize) -> CompileResult<NodeId> {
        let node = self.try_node(id)?;
        node.input_at(index).ok_or(CompileError::InputArity {
            node: id,
            mnemonic: node.op.mnemonic(),
            expected: node.op.total_input_count(),
            actual: node.inputs.len(),
        })
    }

    /// Value input `index`, checked against the operator layout.
    pub fn value_input(&self, id: NodeId, index: usize) -> CompileResult<NodeId> {
        let kind = self.op(id).edge_kind(index);
        if kind != EdgeKind::Value {
            return Err(CompileError::EdgeKind {
                node: id,
                index,
                expected: EdgeKind::Value,
                actual: kind,
            });
        }
        self.input(id, index)
    }

    /// First effect input, if the operator takes one.
    pub fn effect_input(&self, id: NodeId) -> Option<NodeId> {
        let layout = self.op(id).inputs();
        if layout.effect == 0 {
            return None;
        }
        self.node(id).input_at(layout.value)
    }

    /// First control input, if the operator takes one.
    pub fn control_input(&self, id: NodeId) -> Option<NodeId> {
        let layout = self.op(id).inputs();
        if layout.control == 0 {
            return None;
        }
        self.node(id).input_at(layout.value + layout.effect)
    }

    /// Change the operator of `id` in place. The new operator must accept
    /// the node's current inputs.
    pub fn set_op(&mut self, id: NodeId, op: Operator) -> CompileResult<()> {
        let node = self.try_node(id)?;
        if op.total_input_count() != node.inputs.len() {
            return Err(CompileError::InputArity {
                node: id,
                mnemonic: op.mnemonic(),
                expected: op.total_input_count(),
                actual: node.inputs.len(),
            });
        }
        self.nodes[id.index()].op = op;
        Ok(())
    }

    /// Point input `index` of `id` at `new_input`.
    pub fn replace_input(&mut self, id: NodeId, index: usize, new_input: NodeId) -> CompileResult<()> {
        self.check(new_input)?;
        let old_input = self.input(id, index)?;
        if old_input == new_input {
            return Ok(());
        }
        self.remove_use(old_input, id, index as u32);
        self.nodes[id.index()].inputs[index] = new_input;
        self.nodes[new_input.index()].uses.push(Use {
            user: id,
            index: index as u32,
        });
        Ok(())
    }

    fn remove_use(&mut self, used: NodeId, user: NodeId, index: u32) {
        let uses = &mut self.nodes[used.index()].uses;
        if let Some(pos) = uses.iter().position(|u| u.user == user && u.index == index) {
            uses.swap_remove(pos);
        }
    }

    /// Unlink `id` from all of its inputs.
    pub fn remove_all_inputs(&mut self, id: NodeId) -> CompileResult<()> {
        self.check(id)?;
        let inputs = std::mem::take(&mut self.nodes[id.index()].inputs);
        for (index, input) in inputs.into_iter().enumerate() {
            self.remove_use(input, id, index as u32);
        }
        Ok(())
    }

    /// Redirect every use of `node` to `replacement`.
    pub fn replace_uses(&mut self, node: NodeId, replacement: NodeId) -> CompileResult<()> {
        self.replace_uses_if(node, replacement, |_| true)
    }

    /// Redirect the uses of `node` whose user satisfies `pred`.
    ///
    /// Value uses move to `replacement`. Effect and control uses move to
    /// `replacement` when it produces that output, and otherwise to the
    /// corresponding input of `node`, which keeps the effect and control
    /// chains intact when an effectful node is replaced by a pure value.
    pub fn replace_uses_if<F>(&mut self, node: NodeId, replacement: NodeId, pred: F) -> CompileResult<()>
    where
        F: Fn(NodeId) -> bool,
    {
        self.check(node)?;
        self.check(replacement)?;
        if node == replacement {
            return Ok(());
        }
        let outputs = self.op(replacement).outputs();
        let effect = self.effect_input(node);
        let control = self.control_input(node);

        let mut uses = std::mem::take(&mut self.nodes[node.index()].uses).into_iter();
        let mut kept = Vec::new();
        while let Some(edge) = uses.next() {
            if !pred(edge.user) {
                kept.push(edge);
                continue;
            }
            let kind = self.op(edge.user).edge_kind(edge.index as usize);
            let target = match kind {
                EdgeKind::Value => Some(replacement),
                EdgeKind::Effect if outputs.effect => Some(replacement),
                EdgeKind::Control if outputs.control => Some(replacement),
                EdgeKind::Effect => effect,
                EdgeKind::Control => control,
            };
            let Some(target) = target else {
                // Edges not yet visited still read `node`.
                kept.push(edge);
                kept.extend(uses);
                self.nodes[node.index()].uses = kept;
                return Err(CompileError::invariant(format!(
                    "{:?} use of {} by {} cannot be redirected to {}",
                    kind, node, edge.user, replacement
                )));
            };
            trace!("redirect {}:{} from {} to {}", edge.user, edge.index, node, target);
            self.nodes[edge.user.index()].inputs[edge.index as usize] = target;
            self.nodes[target.index()].uses.push(edge);
        }
        self.nodes[node.index()].uses = kept;
        Ok(())
    }

    /// Whether `node` has exactly one use, by `owner`.
    pub fn owned_by(&self, node: NodeId, owner: NodeId) -> bool {
        self.node(node).owned_by(owner)
    }

    /// The `Projection(index)` user of `node`, if one exists.
    pub fn find_projection(&self, node: NodeId, index: u32) -> Option<NodeId> {
        self.uses(node).iter().map(|u| u.user).find(|&user| {
            matches!(self.op(user), Operator::Projection(i) if *i == index)
                && self.inputs(user).first() == Some(&node)
        })
    }

    /// Ids of all nodes that have not been unlinked.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| !n.is_dead()).map(|n| n.id())
    }

    fn cached_constant(&mut self, key: ConstantKey, op: Operator) -> NodeId {
        if let Some(&id) = self.constants.get(&key) {
            if *self.op(id) == op {
                return id;
            }
        }
        let id = self.push_node(op, Vec::new());
        self.constants.insert(key, id);
        id
    }

    pub fn int32_constant(&mut self, value: i32) -> NodeId {
        self.cached_constant(ConstantKey::Int32(value), Operator::Int32Constant(value))
    }

    pub fn int64_constant(&mut self, value: i64) -> NodeId {
        self.cached_constant(ConstantKey::Int64(value), Operator::Int64Constant(value))
    }

    pub fn float64_constant(&mut self, value: f64) -> NodeId {
        self.cached_constant(ConstantKey::Float64(value.to_bits()), Operator::Float64Constant(value))
    }

    pub fn number_constant(&mut self, value: f64) -> NodeId {
        self.cached_constant(ConstantKey::Number(value.to_bits()), Operator::NumberConstant(value))
    }

    pub fn external_constant(&mut self, address: u64) -> NodeId {
        self.cached_constant(ConstantKey::External(address), Operator::ExternalConstant(address))
    }

    pub fn heap_constant(&mut self, value: HeapRef) -> NodeId {
        self.cached_constant(ConstantKey::Heap(value), Operator::HeapConstant(value))
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.live_nodes() {
            let node = self.node(id);
            write!(f, "{} = {}", id, node.op())?;
            for (i, input) in node.inputs().iter().enumerate() {
                f.write_str(if i == 0 { " " } else { ", " })?;
                write!(f, "{}", input)?;
            }
            if self.start == Some(id) {
                f.write_str("  ; start")?;
            }
            if self.end == Some(id) {
                f.write_str("  ; end")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        graph.set_start(start);
        let p0 = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
        let one = graph.int32_constant(1);
        let add = graph.new_node(Operator::Int32Add, &[p0, one]).unwrap();
        (graph, start, p0, add)
    }

    #[test]
    fn test_new_node_checks_arity() {
        let mut graph = Graph::new();
        let c = graph.int32_constant(3);
        let err = graph.new_node(Operator::Int32Add, &[c]).unwrap_err();
        assert!(matches!(err, CompileError::InputArity { expected: 2, actual: 1, .. }));

        let bogus = NodeId::new(99);
        let err = graph.new_node(Operator::Int32Add, &[c, bogus]).unwrap_err();
        assert_eq!(err, CompileError::InvalidNode { node: bogus });
    }

    #[test]
    fn test_uses_track_inputs() {
        let (mut graph, _, p0, add) = diamond();
        assert!(graph.owned_by(p0, add));
        let one = graph.int32_constant(1);
        let two = graph.int32_constant(2);
        graph.replace_input(add, 1, two).unwrap();
        assert_eq!(graph.inputs(add), &[p0, two]);
        assert!(graph.owned_by(two, add));
        assert!(graph.uses(one).is_empty());
    }

    #[test]
    fn test_constants_are_cached() {
        let mut graph = Graph::new();
        let a = graph.int32_constant(7);
        let b = graph.int32_constant(7);
        let c = graph.int64_constant(7);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.float64_constant(0.5), graph.float64_constant(0.5));
    }

    #[test]
    fn test_replace_uses_redirects_effects_to_effect_input() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let ctx = graph.int32_constant(0);
        let load = graph
            .new_node(
                Operator::LoadContext(crate::ir::ContextAccess::new(0, 0, true)),
                &[ctx, start],
            )
            .unwrap();
        let ret = graph.new_node(Operator::Return, &[load, load, start]).unwrap();
        let value = graph.int32_constant(5);

        graph.replace_uses(load, value).unwrap();
        assert_eq!(graph.inputs(ret), &[value, start, start]);
        assert!(graph.uses(load).is_empty());
    }

    #[test]
    fn test_replace_uses_if_keeps_filtered_uses() {
        let (mut graph, _, p0, add) = diamond();
        let later = graph.new_node(Operator::Int32Sub, &[p0, p0]).unwrap();
        let zero = graph.int32_constant(0);
        graph.replace_uses_if(p0, zero, |user| user < later).unwrap();
        assert_eq!(graph.inputs(add)[0], zero);
        assert_eq!(graph.inputs(later), &[p0, p0]);
        assert_eq!(graph.uses(p0).len(), 2);
    }

    #[test]
    fn test_failed_redirect_leaves_every_use_in_place() {
        let (mut graph, start, p0, _) = diamond();
        let ret = graph.new_node(Operator::Return, &[p0, start, start]).unwrap();
        let value = graph.int32_constant(5);
        assert_eq!(graph.uses(start).len(), 3);

        // Start has no control input to hand its control uses to.
        assert!(graph.replace_uses(start, value).is_err());
        assert_eq!(graph.uses(start).len(), 3);
        assert_eq!(graph.inputs(p0), &[start]);
        assert_eq!(graph.inputs(ret), &[p0, start, start]);
        assert!(graph.uses(value).is_empty());
    }

    #[test]
    fn test_find_projection() {
        let (mut graph, _, p0, _) = diamond();
        let ovf = graph.new_node(Operator::Int32AddWithOverflow, &[p0, p0]).unwrap();
        let bit = graph.new_node(Operator::Projection(1), &[ovf]).unwrap();
        assert_eq!(graph.find_projection(ovf, 1), Some(bit));
        assert_eq!(graph.find_projection(ovf, 0), None);
    }

    #[test]
    fn test_remove_all_inputs_unlinks() {
        let (mut graph, _, p0, add) = diamond();
        graph.remove_all_inputs(add).unwrap();
        assert!(graph.node(add).is_dead());
        assert!(graph.uses(p0).is_empty());
        assert!(!graph.live_nodes().any(|n| n == add));
    }
}
