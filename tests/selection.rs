//! Instruction selection over schedules built by hand, mostly the ways a
//! malformed schedule is rejected.

use bumpalo::Bump;
use graphsel::core::{CompilationSession, CompileError, CompileResult};
use graphsel::ir::{Graph, MachineType, NodeId, Operator, Schedule};
use graphsel::select::{
    FlagsCondition, FlagsMode, InstructionSelector, InstructionSequence, Linkage, TargetFeatures,
};
use graphsel::x64::c_linkage;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Function {
    graph: Graph,
    schedule: Schedule,
    linkage: Linkage,
    start: NodeId,
}

fn function(arena: &Bump, params: &[MachineType]) -> Function {
    let mut graph = Graph::new();
    let start = graph.new_node(Operator::Start, &[]).unwrap();
    graph.set_start(start);
    Function {
        graph,
        schedule: Schedule::new(),
        linkage: c_linkage(arena, "f", params, Some(MachineType::Word32)),
        start,
    }
}

fn select(f: &Function, session: &CompilationSession<'_>) -> CompileResult<InstructionSequence> {
    InstructionSelector::new(&f.graph, &f.schedule, &f.linkage, TargetFeatures::x64(), session)
        .select_instructions()
}

#[test]
fn test_phi_in_branch_target_is_rejected() {
    init();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Word32]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let branch = f.graph.new_node(Operator::Branch, &[p, f.start]).unwrap();
    let phi = f.graph.new_node(Operator::Phi(1), &[p, f.start]).unwrap();
    let ret_t = f.graph.new_node(Operator::Return, &[phi, f.start, f.start]).unwrap();
    let ret_f = f.graph.new_node(Operator::Return, &[p, f.start, f.start]).unwrap();

    let entry = f.schedule.entry();
    let then_block = f.schedule.new_block();
    let else_block = f.schedule.new_block();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_branch(entry, branch, then_block, else_block).unwrap();
    f.schedule.add_node(then_block, phi).unwrap();
    f.schedule.add_return(then_block, ret_t).unwrap();
    f.schedule.add_return(else_block, ret_f).unwrap();
    f.schedule.compute_rpo();

    assert!(matches!(
        select(&f, &session),
        Err(CompileError::BranchTargetHasPhi { block }) if block == then_block
    ));
}

#[test]
fn test_value_outside_every_block_is_rejected() {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Word32]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let add = f.graph.new_node(Operator::Int32Add, &[p, p]).unwrap();
    let ret = f.graph.new_node(Operator::Return, &[add, f.start, f.start]).unwrap();

    let entry = f.schedule.entry();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_return(entry, ret).unwrap();
    f.schedule.compute_rpo();

    assert!(matches!(
        select(&f, &session),
        Err(CompileError::Unscheduled { node }) if node == add
    ));
}

#[test]
fn test_throw_is_not_lowered() {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Tagged]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let throw = f.graph.new_node(Operator::Throw, &[p, f.start, f.start]).unwrap();

    let entry = f.schedule.entry();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_throw(entry, throw).unwrap();
    f.schedule.compute_rpo();

    match select(&f, &session) {
        Err(CompileError::UnsupportedOperator { node, mnemonic, target }) => {
            assert_eq!(node, throw);
            assert_eq!(mnemonic, "Throw");
            assert_eq!(target, "x64");
        }
        other => panic!("expected throw to be rejected, got {:?}", other),
    }
}

#[test]
fn test_return_among_block_nodes_is_rejected() {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Word32]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let stray = f.graph.new_node(Operator::Return, &[p, f.start, f.start]).unwrap();
    let ret = f.graph.new_node(Operator::Return, &[p, f.start, f.start]).unwrap();

    let entry = f.schedule.entry();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_node(entry, stray).unwrap();
    f.schedule.add_return(entry, ret).unwrap();
    f.schedule.compute_rpo();

    assert!(matches!(select(&f, &session), Err(CompileError::Invariant { .. })));
}

#[test]
fn test_float_compare_materializes_its_condition() {
    init();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Float64]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let limit = f.graph.float64_constant(1.5);
    let lt = f.graph.new_node(Operator::Float64LessThan, &[p, limit]).unwrap();
    let ret = f.graph.new_node(Operator::Return, &[lt, f.start, f.start]).unwrap();

    let entry = f.schedule.entry();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_node(entry, limit).unwrap();
    f.schedule.add_node(entry, lt).unwrap();
    f.schedule.add_return(entry, ret).unwrap();
    f.schedule.compute_rpo();

    let seq = select(&f, &session).unwrap();
    let compare = seq
        .instructions()
        .iter()
        .find(|i| i.mnemonic() == "sse_float64_cmp")
        .unwrap();
    assert_eq!(compare.code().flags_mode, FlagsMode::Set);
    assert_eq!(compare.code().condition, Some(FlagsCondition::UnorderedLessThan));
    assert_eq!(compare.outputs().len(), 1);
    assert_eq!(compare.outputs()[0].vreg(), Some(lt.as_u32()));
    assert!(seq.is_double(p.as_u32()));
    assert!(seq.is_double(limit.as_u32()));
    assert!(!seq.is_double(lt.as_u32()));
}

#[test]
fn test_selection_is_recorded_in_the_session() {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut f = function(&arena, &[MachineType::Word32]);
    let p = f.graph.new_node(Operator::Parameter(0), &[f.start]).unwrap();
    let ret = f.graph.new_node(Operator::Return, &[p, f.start, f.start]).unwrap();
    let entry = f.schedule.entry();
    f.schedule.add_node(entry, p).unwrap();
    f.schedule.add_return(entry, ret).unwrap();
    f.schedule.compute_rpo();

    let seq = select(&f, &session).unwrap();
    let stats = session.stats();
    assert_eq!(stats.functions_selected, 1);
    assert_eq!(stats.largest_function_size, seq.len());
    assert_eq!(stats.largest_function_name, "f");
}
