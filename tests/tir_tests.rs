//! Integration tests driven by the `.tir` files under `tests/tir`.
//!
//! Each test parses a file, runs the reducer or the instruction selector on
//! one of its functions and checks the printed result.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use bumpalo::Bump;
use graphsel::codegen::{CodeGenerator, ListingGenerator};
use graphsel::core::{CompilationSession, CompileError};
use graphsel::ir::Operator;
use graphsel::select::{FlagsCondition, FlagsMode, InstructionSequence, TargetFeatures};
use graphsel::reduce::DEFAULT_MAX_ATTEMPTS;
use graphsel::test_ir::{parse_module, TirModule};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper to load and parse a TIR file from the test directory
fn load_tir_file(filename: &str) -> TirModule {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/tir").join(filename);
    let contents = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));

    parse_module(&contents).unwrap_or_else(|e| panic!("Failed to parse {filename}: {e}"))
}

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

fn select(module: &TirModule, function: &str, features: TargetFeatures) -> Result<InstructionSequence, CompileError> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let tir = module
        .function(function)
        .unwrap_or_else(|| panic!("no function {function}"));
    tir.select(features, &session)
}

fn listing(module: &TirModule, function: &str) -> String {
    let sequence = select(module, function, TargetFeatures::x64())
        .unwrap_or_else(|e| panic!("selection of {function} failed: {e}"));
    ListingGenerator::new().generate(function, &sequence).unwrap()
}

fn mnemonics(sequence: &InstructionSequence) -> Vec<&'static str> {
    sequence.instructions().iter().map(|i| i.mnemonic()).collect()
}

#[test]
fn test_if_zero_branches_on_a_test() {
    init();
    let module = load_tir_file("if_zero.tir");
    let sequence = select(&module, "pick", TargetFeatures::x64()).unwrap();

    let tests: Vec<_> = sequence
        .instructions()
        .iter()
        .filter(|i| i.mnemonic() == "x64_test32")
        .collect();
    assert_eq!(tests.len(), 1);
    let test = tests[0];
    assert_eq!(test.code().flags_mode, FlagsMode::Branch);
    assert_eq!(test.code().condition, Some(FlagsCondition::Equal));
    assert!(test.is_control());

    let names = mnemonics(&sequence);
    assert_eq!(names.iter().filter(|&&m| m == "arch_ret").count(), 2);
    assert!(!names.contains(&"x64_cmp32"));
    assert!(sequence
        .instructions()
        .iter()
        .all(|i| i.code().flags_mode != FlagsMode::Set));

    let output = ListingGenerator::new().generate("pick", &sequence).unwrap();
    check_output_contains(
        &output,
        &[
            "function pick",
            "v1(=rdi) = arch_nop",
            "x64_test32 && Branch if equal v1(-)^ #-1 [B1] [B2]",
            "arch_ret v2(=rax)",
            "arch_ret v3(=rax)",
        ],
    );
}

#[test]
fn test_if_zero_blocks_follow_reverse_post_order() {
    let module = load_tir_file("if_zero.tir");
    let tir = module.function("pick").unwrap();
    let then_block = tir.block("then").unwrap();
    let else_block = tir.block("else").unwrap();
    let sequence = select(&module, "pick", TargetFeatures::x64()).unwrap();

    let order: Vec<_> = sequence.blocks().iter().map(|b| b.block).collect();
    assert_eq!(order, vec![tir.schedule.entry(), else_block, then_block]);
    for block in [then_block, else_block] {
        let code = sequence.block_instructions(block).unwrap();
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].mnemonic(), "arch_ret");
    }
}

#[test]
fn test_branch_falls_through_to_the_true_block() {
    init();
    let module = load_tir_file("fallthrough.tir");
    let tir = module.function("clamp").unwrap();
    let small = tir.block("small").unwrap();
    let join = tir.block("join").unwrap();
    let sequence = select(&module, "clamp", TargetFeatures::x64()).unwrap();

    let cmp = sequence
        .instructions()
        .iter()
        .find(|i| i.mnemonic() == "x64_cmp32")
        .expect("compare");
    // Inverted so `small`, which comes next, is the fall-through side.
    assert_eq!(cmp.code().condition, Some(FlagsCondition::SignedGreaterThanOrEqual));
    let labels: Vec<_> = cmp.inputs().iter().filter(|o| o.is_label()).map(|o| o.to_string()).collect();
    assert_eq!(labels, vec![format!("[{}]", join), format!("[{}]", small)]);

    // The goto from `small` to `join` falls through as well.
    assert!(!mnemonics(&sequence).contains(&"arch_jmp"));
}

#[test]
fn test_loop_jumps_back_to_its_header() {
    init();
    let module = load_tir_file("loop.tir");
    let tir = module.function("count").unwrap();
    assert!(tir.schedule.block(tir.block("header").unwrap()).is_loop_header());

    let output = listing(&module, "count");
    check_output_contains(
        &output,
        &["x64_cmp32 && Branch if signed less than", "x64_add32", "arch_jmp [B1]", "arch_ret"],
    );

    let sequence = select(&module, "count", TargetFeatures::x64()).unwrap();
    let names = mnemonics(&sequence);
    assert_eq!(names.iter().filter(|&&m| m == "arch_jmp").count(), 1);
    // The increment takes its constant as an immediate.
    let add = sequence
        .instructions()
        .iter()
        .find(|i| i.mnemonic() == "x64_add32")
        .unwrap();
    assert!(add.inputs()[1].is_immediate());
}

#[test]
fn test_loop_phi_merges_entry_and_back_edge_values() {
    init();
    let module = load_tir_file("loop.tir");
    let tir = module.function("count").unwrap();
    let sequence = select(&module, "count", TargetFeatures::x64()).unwrap();

    let header = sequence.block_instructions(tir.block("header").unwrap()).unwrap();
    assert_eq!(header[0].mnemonic(), "arch_phi");
    assert_eq!(header[0].outputs()[0].vreg(), Some(tir.node("i").unwrap().as_u32()));
    let inputs: Vec<_> = header[0].inputs().iter().map(|op| op.vreg()).collect();
    assert_eq!(
        inputs,
        vec![Some(tir.node("zero").unwrap().as_u32()), Some(tir.node("next").unwrap().as_u32())]
    );
    assert_eq!(mnemonics(&sequence).iter().filter(|&&m| m == "arch_phi").count(), 1);
}

#[test]
fn test_every_register_input_has_a_definition() {
    init();
    let cases = [
        ("loop.tir", "count"),
        ("fallthrough.tir", "clamp"),
        ("if_zero.tir", "pick"),
        ("calls.tir", "spill"),
    ];
    for (file, function) in cases {
        let module = load_tir_file(file);
        let sequence = select(&module, function, TargetFeatures::x64()).unwrap();
        let defined: HashSet<u32> = sequence
            .instructions()
            .iter()
            .flat_map(|i| i.outputs())
            .filter_map(|op| op.vreg())
            .collect();
        for instruction in sequence.instructions() {
            for input in instruction.inputs().iter().filter(|op| op.is_unallocated()) {
                let vreg = input.vreg().unwrap();
                assert!(
                    defined.contains(&vreg),
                    "{function}: v{vreg} read by {} has no definition",
                    instruction.mnemonic()
                );
            }
        }
    }
}

#[test]
fn test_overflow_check_fuses_into_the_add() {
    init();
    let module = load_tir_file("checked_add.tir");
    let sequence = select(&module, "checked_add", TargetFeatures::x64()).unwrap();

    let names = mnemonics(&sequence);
    assert_eq!(names.iter().filter(|&&m| m == "x64_add32").count(), 1);
    assert!(!names.contains(&"x64_test32"));

    let add = sequence
        .instructions()
        .iter()
        .find(|i| i.mnemonic() == "x64_add32")
        .unwrap();
    assert_eq!(add.code().flags_mode, FlagsMode::Deoptimize);
    assert_eq!(add.code().condition, Some(FlagsCondition::Overflow));
    // Two operands, then the captured parameters.
    assert_eq!(add.inputs().len(), 4);

    assert_eq!(sequence.deoptimization_entries().len(), 1);
    let entry = sequence.deoptimization_entry(add.code().misc as usize).unwrap();
    assert_eq!(entry.bailout_id.0, 7);
    assert_eq!((entry.parameters, entry.locals, entry.stack), (2, 0, 0));

    let output = ListingGenerator::new().generate("checked_add", &sequence).unwrap();
    check_output_contains(
        &output,
        &[
            "x64_add32 && Deoptimize if overflow",
            "deoptimization entries:",
            "0: bailout 7 (2 parameters, 0 locals, 0 stack)",
        ],
    );
}

#[test]
fn test_lazy_call_ends_its_block() {
    init();
    let module = load_tir_file("calls.tir");
    let tir = module.function("invoke").unwrap();
    let entry = tir.schedule.entry();
    let cont = tir.block("cont").unwrap();
    let deopt = tir.block("deopt").unwrap();
    let sequence = select(&module, "invoke", TargetFeatures::x64()).unwrap();

    let code = sequence.block_instructions(entry).unwrap();
    let names: Vec<_> = code.iter().map(|i| i.mnemonic()).collect();
    assert_eq!(
        names,
        vec!["arch_nop", "arch_nop", "arch_nop", "x64_push", "x64_push", "x64_call_js_function"]
    );

    // The receiver sits in the deeper slot and is pushed first.
    let recv = tir.node("recv").unwrap();
    let one = tir.node("one").unwrap();
    assert_eq!(code[3].inputs()[0].vreg(), Some(recv.as_u32()));
    assert_eq!(code[4].inputs()[0].vreg(), Some(one.as_u32()));

    let call = &code[5];
    assert!(call.is_call());
    assert!(call.is_control());
    let labels: Vec<_> = call.inputs().iter().filter(|o| o.is_label()).map(|o| o.to_string()).collect();
    assert_eq!(labels, vec![format!("[{}]", cont), format!("[{}]", deopt)]);

    let bailout = sequence.block_instructions(deopt).unwrap();
    assert_eq!(bailout.len(), 1);
    assert_eq!(bailout[0].mnemonic(), "arch_deoptimize");
    assert_eq!(sequence.deoptimization_entries()[0].bailout_id.0, 3);

    let output = ListingGenerator::new().generate("invoke", &sequence).unwrap();
    check_output_contains(&output, &["B2 (deferred):", "= x64_call_js_function", "[call]"]);
}

#[test]
fn test_c_call_pushes_and_pops_stack_arguments() {
    init();
    let module = load_tir_file("calls.tir");
    let sequence = select(&module, "spill", TargetFeatures::x64()).unwrap();

    assert_eq!(
        mnemonics(&sequence),
        vec!["arch_nop", "x64_pushi", "x64_call_address", "arch_pop_stack", "arch_ret"]
    );
    let call = &sequence.instructions()[2];
    // Callee plus six register arguments.
    assert_eq!(call.inputs().len(), 7);
    assert!(call.inputs()[0].is_immediate());
    assert!(!call.is_control());
    assert_eq!(sequence.instructions()[3].code().misc, 1);
    // The pushed constant only lives in the push.
    let seven = module.function("spill").unwrap().node("seven").unwrap();
    assert!(sequence.constant(seven.as_u32()).is_none());

    let output = listing(&module, "spill");
    check_output_contains(
        &output,
        &["x64_pushi #7", "(=rdi)", "(=r9)", "= x64_call_address #4096l", "arch_pop_stack <1>"],
    );
}

#[test]
fn test_word64_is_rejected_on_ia32() {
    init();
    let module = load_tir_file("wide.tir");
    assert!(select(&module, "widen", TargetFeatures::x64()).is_ok());

    let sum = module.function("widen").unwrap().node("sum").unwrap();
    match select(&module, "widen", TargetFeatures::ia32()) {
        Err(CompileError::UnsupportedOperator { node, mnemonic, target }) => {
            assert_eq!(node, sum);
            assert_eq!(mnemonic, "Int64Add");
            assert_eq!(target, "ia32");
        }
        other => panic!("expected an unsupported operator, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_reducer_folds_constants() {
    init();
    let mut module = load_tir_file("fold.tir");
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let TirModule { heap, functions, .. } = &mut module;
    let tir = &mut functions[0];
    tir.reduce(heap, &session, DEFAULT_MAX_ATTEMPTS).unwrap();

    let x = tir.node("x").unwrap();
    let sum = tir.node("sum").unwrap();
    let ret = tir.node("ret").unwrap();
    assert_eq!(tir.graph.inputs(ret)[0], sum);
    let inputs = tir.graph.inputs(sum).to_vec();
    assert_eq!(inputs[0], x);
    assert_eq!(*tir.graph.op(inputs[1]), Operator::Int32Constant(5));

    // `x + 0` is gone.
    let same = tir.node("same").unwrap();
    assert!(tir.graph.node(same).is_dead());
    assert!(session.stats().replacements >= 2);
}

#[test]
fn test_context_loads_are_specialized() {
    init();
    let mut module = load_tir_file("context.tir");
    let outer = module.object("outer").unwrap();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let TirModule { heap, functions, .. } = &mut module;
    for tir in functions.iter_mut() {
        tir.reduce(heap, &session, DEFAULT_MAX_ATTEMPTS).unwrap();
    }

    let get = &functions[0];
    let ret = get.node("ret").unwrap();
    let start = get.node("start").unwrap();
    let inputs = get.graph.inputs(ret);
    assert_eq!(*get.graph.op(inputs[0]), Operator::NumberConstant(42.0));
    assert_eq!(inputs[1], start);

    let get_mutable = &functions[1];
    let load = get_mutable.node("load").unwrap();
    match get_mutable.graph.op(load) {
        Operator::LoadContext(access) => {
            assert_eq!((access.depth, access.index), (0, 2));
            assert!(!access.immutable);
        }
        other => panic!("expected a context load, got {}", other.mnemonic()),
    }
    let context = get_mutable.graph.inputs(load)[0];
    assert_eq!(*get_mutable.graph.op(context), Operator::HeapConstant(outer));
}

#[test]
fn test_unscheduled_function_prints_its_graph() {
    let module = load_tir_file("fold.tir");
    let tir = module.function("fold").unwrap();
    assert!(!tir.scheduled);
    let graph = tir.graph.to_string();
    check_output_contains(&graph, &["Int32Add", "Return"]);
}
