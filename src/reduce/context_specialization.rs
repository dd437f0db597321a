// This module specializes lexical context accesses to a context that is known at compile
// time. A LoadContext or StoreContext names its slot by a static depth (parent links to
// follow) and an index. Once the context input is a heap constant, the parent walk can be
// done by the compiler: the access is rewritten in place to depth 0 against the resolved
// ancestor, and an immutable load whose slot already holds a real value is replaced by that
// value as a constant. Slots still holding undefined or the hole may be initialized later,
// so those loads keep reading memory. The specializer works both as a Reducer plugged into
// the GraphReducer and through specialize_to_context, which first swaps the function's
// context parameter for the constant and then walks the graph once from the end.

//! Folding of context slot accesses against a known context.

use log::{debug, trace};

use super::{Reducer, Reduction};
use crate::core::CompileResult;
use crate::ir::{
    visit_node_inputs_from_end, ContextAccess, Control, Graph, Heap, HeapObject, HeapRef, NodeId,
    NodeVisitor, Operator,
};

/// Folds context accesses whose context input is a heap constant.
pub struct ContextSpecializer<'h> {
    heap: &'h Heap,
}

impl<'h> ContextSpecializer<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self { heap }
    }

    /// The constant context feeding `node`, if it is one.
    fn constant_context(&self, graph: &Graph, node: NodeId) -> CompileResult<Option<HeapRef>> {
        let input = graph.value_input(node, 0)?;
        Ok(match graph.op(input) {
            Operator::HeapConstant(context) if self.heap.is_context(*context) => Some(*context),
            _ => None,
        })
    }

    /// Node holding `value`, numbers as number constants.
    fn constant_for(&self, graph: &mut Graph, value: HeapRef) -> CompileResult<NodeId> {
        Ok(match self.heap.get(value)? {
            HeapObject::Number(n) => graph.number_constant(*n),
            _ => graph.heap_constant(value),
        })
    }

    /// Point `node` at depth 0 of `context`.
    fn fold_parent_walk(
        &self,
        graph: &mut Graph,
        node: NodeId,
        op: Operator,
        context: HeapRef,
    ) -> CompileResult<Reduction> {
        graph.set_op(node, op)?;
        let constant = graph.heap_constant(context);
        graph.replace_input(node, 0, constant)?;
        trace!("context: {} now reads {} directly", node, context);
        Ok(Reduction::InPlace)
    }

    pub fn reduce_load_context(
        &self,
        graph: &mut Graph,
        node: NodeId,
        access: ContextAccess,
    ) -> CompileResult<Reduction> {
        let Some(context) = self.constant_context(graph, node)? else {
            return Ok(Reduction::NoChange);
        };
        let resolved = self.heap.context_ancestor(context, access.depth)?;

        if access.immutable {
            let value = self.heap.context_slot(resolved, access.index)?;
            // The context may have escaped before the slot was initialized.
            if !self.heap.is_uninitialized(value) {
                debug!("context: {} folded to the value of slot {}", node, access.index);
                return Ok(Reduction::Replace(self.constant_for(graph, value)?));
            }
        }

        if access.depth == 0 {
            return Ok(Reduction::NoChange);
        }
        let op = Operator::LoadContext(ContextAccess::new(0, access.index, access.immutable));
        self.fold_parent_walk(graph, node, op, resolved)
    }

    pub fn reduce_store_context(
        &self,
        graph: &mut Graph,
        node: NodeId,
        access: ContextAccess,
    ) -> CompileResult<Reduction> {
        let Some(context) = self.constant_context(graph, node)? else {
            return Ok(Reduction::NoChange);
        };
        if access.depth == 0 {
            return Ok(Reduction::NoChange);
        }
        let resolved = self.heap.context_ancestor(context, access.depth)?;
        let op = Operator::StoreContext(ContextAccess::new(0, access.index, access.immutable));
        self.fold_parent_walk(graph, node, op, resolved)
    }
}

impl Reducer for ContextSpecializer<'_> {
    fn name(&self) -> &'static str {
        "context-specialization"
    }

    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Reduction> {
        match *graph.op(node) {
            Operator::LoadContext(access) => self.reduce_load_context(graph, node, access),
            Operator::StoreContext(access) => self.reduce_store_context(graph, node, access),
            _ => Ok(Reduction::NoChange),
        }
    }
}

struct SpecializationVisitor<'s, 'h> {
    specializer: &'s mut ContextSpecializer<'h>,
}

impl NodeVisitor for SpecializationVisitor<'_, '_> {
    fn post(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Control> {
        if let Reduction::Replace(value) = self.specializer.reduce(graph, node)? {
            if value != node {
                graph.replace_uses(node, value)?;
            }
        }
        Ok(Control::Continue)
    }
}

/// Specialize the whole graph to `context`: uses of the function's context
/// parameter become the constant, then every reachable access is folded.
pub fn specialize_to_context(
    graph: &mut Graph,
    heap: &Heap,
    context_parameter: NodeId,
    context: HeapRef,
) -> CompileResult<()> {
    graph.check(context_parameter)?;
    let constant = graph.heap_constant(context);
    graph.replace_uses(context_parameter, constant)?;
    debug!("context: specializing to {} via {}", context, constant);

    let mut specializer = ContextSpecializer::new(heap);
    let mut visitor = SpecializationVisitor {
        specializer: &mut specializer,
    };
    visit_node_inputs_from_end(graph, &mut visitor)
}
