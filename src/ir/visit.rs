// This module implements the generic depth-first traversal shared by the reducer and the
// context specializer. The walk never recurses: it keeps an explicit stack of frames, each
// holding a node and the position of the next child to look at, and re-reads the child from
// the graph when it gets there, so visitors may rewrite edges of nodes that are already
// finished while the walk is in progress. Settlement is tracked in a BitVector indexed by
// node id that grows when a visitor creates nodes past its initial size. Visitors steer the
// walk through the Control returned from pre and post: Skip suppresses descending into a
// node, Reenter leaves it unsettled so a later path may visit it again. Edge callbacks fire
// for every edge, including edges into children that are already settled.

//! Explicit-stack depth-first graph traversal.

use super::graph::Graph;
use super::node::NodeId;
use crate::core::{BitVector, CompileResult};

/// How a visitor wants the traversal to continue at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Continue depth-first normally.
    Continue,
    /// Do not descend into this node's children.
    Skip,
    /// Leave the node unsettled so it may be visited again.
    Reenter,
    /// `Skip` and `Reenter` combined.
    Defer,
}

impl Control {
    #[inline]
    pub fn is_skip(self) -> bool {
        matches!(self, Control::Skip | Control::Defer)
    }

    #[inline]
    pub fn is_reenter(self) -> bool {
        matches!(self, Control::Reenter | Control::Defer)
    }
}

/// Which edges lead from a node to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Children are the node's inputs.
    Inputs,
    /// Children are the node's users.
    Uses,
}

impl Direction {
    fn child_count(self, graph: &Graph, node: NodeId) -> usize {
        match self {
            Direction::Inputs => graph.inputs(node).len(),
            Direction::Uses => graph.uses(node).len(),
        }
    }

    /// The `position`-th child and the input index of the edge leading to it.
    fn child(self, graph: &Graph, node: NodeId, position: usize) -> Option<(usize, NodeId)> {
        match self {
            Direction::Inputs => graph.inputs(node).get(position).map(|&to| (position, to)),
            Direction::Uses => graph
                .uses(node)
                .get(position)
                .map(|u| (u.index as usize, u.user)),
        }
    }
}

/// Callbacks invoked by [`visit`]. Every method has a no-op default.
pub trait NodeVisitor {
    fn pre(&mut self, _graph: &mut Graph, _node: NodeId) -> CompileResult<Control> {
        Ok(Control::Continue)
    }

    /// Called once all children have been processed. `Skip` is meaningless
    /// here and treated as `Continue`.
    fn post(&mut self, _graph: &mut Graph, _node: NodeId) -> CompileResult<Control> {
        Ok(Control::Continue)
    }

    fn pre_edge(&mut self, _graph: &Graph, _from: NodeId, _index: usize, _to: NodeId) {}

    fn post_edge(&mut self, _graph: &Graph, _from: NodeId, _index: usize, _to: NodeId) {}
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    next: usize,
    descend: bool,
    /// The edge at `next` led into a child that is still being walked.
    open: bool,
}

/// Depth-first walk from each of `roots` in turn.
pub fn visit<V: NodeVisitor>(
    graph: &mut Graph,
    roots: &[NodeId],
    direction: Direction,
    visitor: &mut V,
) -> CompileResult<()> {
    let mut visited = BitVector::new(graph.node_count());
    let mut stack: Vec<Frame> = Vec::new();

    for &root in roots {
        let mut current = root;
        'descend: loop {
            graph.check(current)?;
            let mut descend = !visited.get(current.index());
            if descend {
                let control = visitor.pre(graph, current)?;
                descend = !control.is_skip();
                if !control.is_reenter() {
                    visited.insert(current.index());
                }
            }
            stack.push(Frame {
                node: current,
                next: 0,
                descend,
                open: false,
            });

            loop {
                let Some(&top) = stack.last() else {
                    break 'descend;
                };
                let exhausted = !top.descend || top.next >= direction.child_count(graph, top.node);
                if exhausted {
                    if top.descend {
                        let control = visitor.post(graph, top.node)?;
                        visited.set(top.node.index(), !control.is_reenter());
                    }
                    stack.pop();
                    if stack.is_empty() {
                        break 'descend;
                    }
                } else if !top.open {
                    if let Some((index, to)) = direction.child(graph, top.node, top.next) {
                        visitor.pre_edge(graph, top.node, index, to);
                        if !visited.get(to.index()) {
                            if let Some(frame) = stack.last_mut() {
                                frame.open = true;
                            }
                            current = to;
                            continue 'descend;
                        }
                    }
                }

                // The edge at the top frame's position is finished.
                if let Some(top) = stack.last_mut() {
                    if let Some((index, to)) = direction.child(graph, top.node, top.next) {
                        visitor.post_edge(graph, top.node, index, to);
                    }
                    top.next += 1;
                    top.open = false;
                }
            }
        }
    }
    Ok(())
}

/// Walk the inputs of every node reachable from the graph's end.
pub fn visit_node_inputs_from_end<V: NodeVisitor>(graph: &mut Graph, visitor: &mut V) -> CompileResult<()> {
    match graph.end() {
        Some(end) => visit(graph, &[end], Direction::Inputs, visitor),
        None => Ok(()),
    }
}

/// Walk the users of every node reachable from the graph's start.
pub fn visit_node_uses_from_start<V: NodeVisitor>(graph: &mut Graph, visitor: &mut V) -> CompileResult<()> {
    match graph.start() {
        Some(start) => visit(graph, &[start], Direction::Uses, visitor),
        None => Ok(()),
    }
}
