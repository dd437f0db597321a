//! Context specialization against a known chain of contexts.

use graphsel::core::CompileError;
use graphsel::ir::{ContextAccess, Graph, Heap, HeapRef, NodeId, Operator};
use graphsel::reduce::{specialize_to_context, ContextSpecializer, GraphReducer};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `root <- middle <- leaf`, with a string in `root[0]`, undefined in
/// `root[1]`, a number in `middle[1]` and the hole in `middle[0]`.
struct Contexts {
    heap: Heap,
    root: HeapRef,
    middle: HeapRef,
    leaf: HeapRef,
    greeting: HeapRef,
}

fn contexts() -> Contexts {
    let mut heap = Heap::new();
    let root = heap.context(None, 2);
    let middle = heap.context(Some(root), 2);
    let leaf = heap.context(Some(middle), 1);
    let greeting = heap.string("hello");
    let number = heap.number(2.5);
    let hole = heap.the_hole();
    let undefined = heap.undefined();
    heap.set_context_slot(root, 0, greeting).unwrap();
    heap.set_context_slot(root, 1, undefined).unwrap();
    heap.set_context_slot(middle, 1, number).unwrap();
    heap.set_context_slot(middle, 0, hole).unwrap();
    Contexts {
        heap,
        root,
        middle,
        leaf,
        greeting,
    }
}

struct Function {
    graph: Graph,
    start: NodeId,
    context: NodeId,
    load: NodeId,
    ret: NodeId,
}

/// `return LoadContext[access](context)` where the context is parameter 0.
fn load_function(access: ContextAccess) -> Function {
    let mut graph = Graph::new();
    let start = graph.new_node(Operator::Start, &[]).unwrap();
    graph.set_start(start);
    let context = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
    let load = graph.new_node(Operator::LoadContext(access), &[context, start]).unwrap();
    let ret = graph.new_node(Operator::Return, &[load, load, start]).unwrap();
    let end = graph.new_node(Operator::End, &[ret]).unwrap();
    graph.set_end(end);
    Function {
        graph,
        start,
        context,
        load,
        ret,
    }
}

#[test]
fn test_immutable_load_two_levels_up_becomes_a_constant() {
    init();
    let c = contexts();
    let mut f = load_function(ContextAccess::new(2, 0, true));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    let inputs = f.graph.inputs(f.ret);
    assert_eq!(*f.graph.op(inputs[0]), Operator::HeapConstant(c.greeting));
    // The effect chain skips the folded load.
    assert_eq!(inputs[1], f.start);
    assert!(f.graph.uses(f.load).is_empty());
}

#[test]
fn test_number_slot_folds_to_a_number_constant() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(1, 1, true));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    let value = f.graph.inputs(f.ret)[0];
    assert_eq!(*f.graph.op(value), Operator::NumberConstant(2.5));
}

#[test]
fn test_hole_slot_keeps_the_load_but_drops_the_walk() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(1, 0, true));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    assert_eq!(f.graph.inputs(f.ret)[0], f.load);
    assert_eq!(*f.graph.op(f.load), Operator::LoadContext(ContextAccess::new(0, 0, true)));
    let context = f.graph.inputs(f.load)[0];
    assert_eq!(*f.graph.op(context), Operator::HeapConstant(c.middle));
}

#[test]
fn test_undefined_slot_is_not_folded() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(2, 1, true));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    assert_eq!(f.graph.inputs(f.ret)[0], f.load);
    assert_eq!(*f.graph.op(f.load), Operator::LoadContext(ContextAccess::new(0, 1, true)));
}

#[test]
fn test_mutable_load_is_only_rebased() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(2, 0, false));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    assert_eq!(*f.graph.op(f.load), Operator::LoadContext(ContextAccess::new(0, 0, false)));
    let context = f.graph.inputs(f.load)[0];
    assert_eq!(*f.graph.op(context), Operator::HeapConstant(c.root));
    assert_eq!(f.graph.inputs(f.ret)[0], f.load);
}

#[test]
fn test_depth_zero_load_of_a_mutable_slot_is_untouched() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(0, 0, false));
    specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf).unwrap();

    assert_eq!(*f.graph.op(f.load), Operator::LoadContext(ContextAccess::new(0, 0, false)));
}

#[test]
fn test_store_walk_is_folded_in_place() {
    let c = contexts();
    let mut graph = Graph::new();
    let start = graph.new_node(Operator::Start, &[]).unwrap();
    graph.set_start(start);
    let context = graph.new_node(Operator::Parameter(0), &[start]).unwrap();
    let value = graph.int32_constant(9);
    let store = graph
        .new_node(Operator::StoreContext(ContextAccess::new(1, 1, false)), &[context, value, start])
        .unwrap();
    let ret = graph.new_node(Operator::Return, &[value, store, start]).unwrap();
    let end = graph.new_node(Operator::End, &[ret]).unwrap();
    graph.set_end(end);

    specialize_to_context(&mut graph, &c.heap, context, c.leaf).unwrap();

    assert_eq!(*graph.op(store), Operator::StoreContext(ContextAccess::new(0, 1, false)));
    assert_eq!(*graph.op(graph.inputs(store)[0]), Operator::HeapConstant(c.middle));
    assert_eq!(graph.inputs(store)[1], value);
    assert_eq!(graph.inputs(ret)[1], store);
}

#[test]
fn test_specializer_runs_inside_the_graph_reducer() {
    init();
    let c = contexts();
    let mut f = load_function(ContextAccess::new(2, 0, true));
    // The context arrives as a constant already.
    let constant = f.graph.heap_constant(c.leaf);
    f.graph.replace_uses(f.context, constant).unwrap();

    let mut reducer = GraphReducer::new();
    reducer.add_reducer(ContextSpecializer::new(&c.heap));
    reducer.reduce_graph(&mut f.graph).unwrap();

    let value = f.graph.inputs(f.ret)[0];
    assert_eq!(*f.graph.op(value), Operator::HeapConstant(c.greeting));
    assert!(f.graph.node(f.load).is_dead());
}

#[test]
fn test_non_context_constant_is_left_alone() {
    let mut c = contexts();
    let code = c.heap.code("stub");
    let mut f = load_function(ContextAccess::new(1, 0, true));
    let constant = f.graph.heap_constant(code);
    f.graph.replace_uses(f.context, constant).unwrap();

    let mut reducer = GraphReducer::new();
    reducer.add_reducer(ContextSpecializer::new(&c.heap));
    reducer.reduce_graph(&mut f.graph).unwrap();

    assert_eq!(*f.graph.op(f.load), Operator::LoadContext(ContextAccess::new(1, 0, true)));
}

#[test]
fn test_walking_past_the_outermost_context_fails() {
    let c = contexts();
    let mut f = load_function(ContextAccess::new(5, 0, true));
    let result = specialize_to_context(&mut f.graph, &c.heap, f.context, c.leaf);
    assert!(matches!(result, Err(CompileError::Invariant { .. })));
}
