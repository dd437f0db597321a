// This module implements the GraphReducer, which drives a list of pluggable Reducer rules to
// a fixed point over the graph. Each node is reduced by repeatedly offering it to every rule
// in order. An in-place change reruns the other rules on the same node. A replacement by a
// node that existed before the attempt started (its id is below the node count watermark
// taken at the start of the attempt) is taken as already reduced: the uses move over, the
// node is unlinked and reduction stops. A replacement by a node created during the attempt
// only takes over the uses that predate the attempt, since new nodes may deliberately still
// point at the original, and reduction continues on the replacement. The number of attempts
// is bounded; running out of attempts is reported as ReductionLimitExceeded rather than
// silently accepted. Whole-graph reduction runs the reducer from the post callback of an
// input traversal rooted at the end node, so operands are reduced before their users.

//! Fixed-point graph reduction.

pub mod common;
pub mod context_specialization;
pub mod machine;

pub use common::CommonOperatorReducer;
pub use context_specialization::{specialize_to_context, ContextSpecializer};
pub use machine::MachineOperatorReducer;

use log::{debug, trace, warn};

use crate::core::{CompilationSession, CompileError, CompileResult};
use crate::ir::{visit, Control, Direction, Graph, NodeId, NodeVisitor};

/// Default bound on reduction attempts per node.
pub const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// Outcome of offering a node to a [`Reducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    NoChange,
    /// The node itself was rewritten.
    InPlace,
    /// Uses of the node should move to the given node.
    Replace(NodeId),
}

impl Reduction {
    pub fn is_changed(self) -> bool {
        !matches!(self, Reduction::NoChange)
    }

    /// The node that stands for `node` after this reduction, if anything
    /// changed. In-place changes and self-replacements yield `node`.
    pub fn replacement(self, node: NodeId) -> Option<NodeId> {
        match self {
            Reduction::NoChange => None,
            Reduction::InPlace => Some(node),
            Reduction::Replace(replacement) => Some(replacement),
        }
    }
}

/// A local rewrite rule.
pub trait Reducer {
    /// Name used in traces.
    fn name(&self) -> &'static str;

    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Reduction>;
}

/// Drives a set of reducers to a fixed point.
pub struct GraphReducer<'a> {
    reducers: Vec<Box<dyn Reducer + 'a>>,
    max_attempts: usize,
    session: Option<&'a CompilationSession<'a>>,
}

impl Default for GraphReducer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphReducer<'a> {
    pub fn new() -> Self {
        Self {
            reducers: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            session: None,
        }
    }

    /// Override the attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Record statistics into `session`.
    pub fn with_session(mut self, session: &'a CompilationSession<'a>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn add_reducer<R: Reducer + 'a>(&mut self, reducer: R) {
        self.reducers.push(Box::new(reducer));
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Reduce `node` (and whatever replaces it) to a fixed point.
    pub fn reduce_node(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<()> {
        graph.check(node)?;
        if let Some(session) = self.session {
            session.record_node_reduced();
        }

        let mut node = node;
        let mut skip: Option<usize> = None;
        let mut reduce = true;
        for _ in 0..=self.max_attempts {
            if !reduce {
                return Ok(());
            }
            reduce = false;
            let before = graph.node_count();
            for i in 0..self.reducers.len() {
                if skip == Some(i) {
                    continue;
                }
                let reduction = self.reducers[i].reduce(graph, node)?;
                let Some(replacement) = reduction.replacement(node) else {
                    continue;
                };

                if replacement == node {
                    trace!("{}: {} changed in place", self.reducers[i].name(), node);
                    if let Some(session) = self.session {
                        session.record_in_place_change();
                    }
                    reduce = true;
                    skip = Some(i);
                    break;
                }

                trace!("{}: {} replaced by {}", self.reducers[i].name(), node, replacement);
                if let Some(session) = self.session {
                    session.record_replacement();
                }
                if graph.start() == Some(node) {
                    graph.set_start(replacement);
                }
                if graph.end() == Some(node) {
                    graph.set_end(replacement);
                }

                if replacement.index() < before {
                    // An old replacement is already reduced.
                    graph.replace_uses(node, replacement)?;
                    graph.remove_all_inputs(node)?;
                    return Ok(());
                }

                // Nodes created by this reduction may keep using `node`.
                graph.replace_uses_if(node, replacement, |user| user.index() < before)?;
                if graph.uses(node).is_empty() {
                    graph.remove_all_inputs(node)?;
                }
                skip = None;
                node = replacement;
                reduce = true;
                break;
            }
        }

        if reduce {
            let function = self.session.and_then(|s| s.current_function()).unwrap_or_default();
            warn!(
                "reduction of {} in '{}' did not settle within {} attempts",
                node,
                function,
                self.max_attempts + 1
            );
            return Err(CompileError::ReductionLimitExceeded {
                node,
                attempts: self.max_attempts + 1,
            });
        }
        Ok(())
    }

    /// Reduce every node reachable from the graph's end, operands first.
    pub fn reduce_graph(&mut self, graph: &mut Graph) -> CompileResult<()> {
        let end = graph
            .end()
            .ok_or_else(|| CompileError::invariant("graph has no end node"))?;
        debug!("reducing graph of {} nodes", graph.node_count());
        self.reduce_subgraph(graph, &[end])
    }

    /// Reduce every node reachable from `roots` through inputs.
    pub fn reduce_subgraph(&mut self, graph: &mut Graph, roots: &[NodeId]) -> CompileResult<()> {
        let mut visitor = ReduceVisitor { reducer: self };
        visit(graph, roots, Direction::Inputs, &mut visitor)
    }
}

struct ReduceVisitor<'r, 'a> {
    reducer: &'r mut GraphReducer<'a>,
}

impl NodeVisitor for ReduceVisitor<'_, '_> {
    fn post(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Control> {
        self.reducer.reduce_node(graph, node)?;
        Ok(Control::Continue)
    }
}
