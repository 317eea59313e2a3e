//! Compiler integration: snapshots, diagnostics, and program shape.

use phosphor_blocks::standard_registry;
use phosphor_compiler::frontend;
use phosphor_compiler::program::{Phase, Step, ValueExpr};
use phosphor_compiler::{compile, CompileOptions};
use phosphor_core::diag::DiagnosticKind;
use phosphor_core::id::BlockId;
use phosphor_core::ty::Cardinality;
use phosphor_core::value::Value;
use phosphor_core::{AdapterRegistry, NullSink};
use phosphor_graph::edge::PortRef;
use phosphor_graph::params::{ParamValue, Params};
use phosphor_graph::{Block, Patch};
use phosphor_test_utils as fixtures;

fn compile_default(patch: &Patch) -> phosphor_compiler::CompileOutput {
    compile(
        patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &CompileOptions::default(),
        &NullSink,
    )
}

// ── Illegal cycles ─────────────────────────────────────────────────

#[test]
fn illegal_cycle_blocks_the_backend() {
    let output = compile_default(&fixtures::illegal_cycle_patch());
    assert!(!output.snapshot.backend_ready);
    assert!(output.program.is_none());

    let flagged: Vec<&BlockId> = output
        .snapshot
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::IllegalCycle)
        .filter_map(|d| d.block.as_ref())
        .collect();
    assert!(flagged.contains(&&BlockId::from("a")));
    assert!(flagged.contains(&&BlockId::from("b")));
    assert!(output.snapshot.cycles.has_illegal());
}

#[test]
fn delay_broken_cycle_compiles() {
    let output = compile_default(&fixtures::feedback_patch(0.0, 0.01));
    assert!(output.snapshot.backend_ready, "{:?}", output.snapshot.diagnostics);
    let program = output.program.expect("program");
    // The cycle summary records the component as legal, with the delay.
    assert_eq!(output.snapshot.cycles.components.len(), 1);
    let component = &output.snapshot.cycles.components[0];
    assert!(component.legal);
    assert_eq!(component.delays, vec![BlockId::from("hold")]);
    // The cut edge became a state read plus a phase-2 write-back.
    assert!(program
        .schedule
        .steps
        .iter()
        .any(|s| matches!(s.step, Step::ReadScalarState { .. })));
    assert!(program
        .schedule
        .steps
        .iter()
        .any(|s| matches!(s.step, Step::WriteScalarState { .. })
            && s.phase == Phase::Phase2));
}

// ── Type coherence over the normalized patch ───────────────────────

#[test]
fn normalized_edges_connect_equal_types() {
    let patch = fixtures::golden_spiral_patch(100, 4000.0, 50.0, 0.35);
    let artifacts = frontend::run(
        &patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
    );
    assert!(artifacts.snapshot.backend_ready);

    for edge in &artifacts.norm.edges {
        let from_ty = artifacts.norm.blocks[&edge.from.block]
            .def
            .output(&edge.from.port.0)
            .map(|p| p.ty)
            .expect("source port");
        let to_ty = artifacts.norm.blocks[&edge.to.block]
            .def
            .input(&edge.to.port.0)
            .map(|p| p.ty)
            .expect("target port");
        assert_eq!(from_ty.payload, to_ty.payload, "edge {edge:?}");
        assert_eq!(from_ty.unit, to_ty.unit, "edge {edge:?}");
        // Cardinality may widen signal → field (broadcast); it never
        // narrows without a reducer block.
        let broadcast_ok = from_ty.cardinality == to_ty.cardinality
            || (from_ty.cardinality == Cardinality::Signal
                && to_ty.cardinality == Cardinality::Field);
        assert!(broadcast_ok, "edge {edge:?}");
    }
}

// ── Common-subexpression elimination ───────────────────────────────

#[test]
fn identical_constants_share_one_expression() {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("a", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(0.5))),
    );
    patch.add_block(
        Block::new("b", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(0.5))),
    );
    patch.add_block(Block::new("sum", "Add"));
    patch.connect(PortRef::new("a", "out"), PortRef::new("sum", "lhs"));
    patch.connect(PortRef::new("b", "out"), PortRef::new("sum", "rhs"));

    let output = compile_default(&patch);
    let program = output.program.expect("program");
    let half_consts = program
        .exprs
        .iter()
        .filter(|n| n.expr == ValueExpr::Const(Value::scalar(0.5)))
        .count();
    assert_eq!(half_consts, 1);
}

// ── Schedule shape ─────────────────────────────────────────────────

#[test]
fn schedule_phases_are_ordered_with_one_boundary() {
    let output = compile_default(&fixtures::golden_spiral_patch(16, 4000.0, 2.0, 0.5));
    let program = output.program.expect("program");
    assert!(program.schedule.phases_ordered());
    let boundaries = program
        .schedule
        .steps
        .iter()
        .filter(|s| matches!(s.step, Step::PhaseBoundary))
        .count();
    assert_eq!(boundaries, 1);
    // Counts resolve before anything touches a lane buffer.
    let solve = program
        .schedule
        .steps
        .iter()
        .position(|s| matches!(s.step, Step::SolveInstance { .. }))
        .expect("solve step");
    let first_field = program
        .schedule
        .steps
        .iter()
        .position(|s| matches!(s.step, Step::MaterializeField { .. }))
        .expect("materialize step");
    assert!(solve < first_field);
}

#[test]
fn unreachable_blocks_are_pruned_from_the_schedule() {
    let mut patch = fixtures::const_chain_patch(4);
    // An orphan constant: lowered, but nothing downstream needs it.
    patch.add_block(
        Block::new("orphan", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(9.0))),
    );
    let output = compile_default(&patch);
    let program = output.program.expect("program");
    let orphan_slots = program.debug.slots_of_block(&BlockId::from("orphan"));
    assert!(!orphan_slots.is_empty());
    let scheduled = program.schedule.steps.iter().any(|s| match s.step {
        Step::EvalSignal { slot, .. } => orphan_slots.contains(&slot),
        _ => false,
    });
    assert!(!scheduled, "orphan const should be pruned");
}

// ── Revision and budget ────────────────────────────────────────────

#[test]
fn program_carries_the_patch_revision() {
    let patch = fixtures::const_chain_patch(4);
    let output = compile_default(&patch);
    assert_eq!(output.snapshot.revision, patch.revision());
    assert_eq!(output.program.expect("program").revision, patch.revision());
}

#[test]
fn exceeding_the_soft_budget_is_informational() {
    let patch = fixtures::golden_spiral_patch(8, 4000.0, 1.0, 0.5);
    let opts = CompileOptions {
        soft_budget_us: 0,
        ..CompileOptions::default()
    };
    let output = compile(
        &patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &opts,
        &NullSink,
    );
    // The budget diagnostic appears, and the compile still succeeds.
    assert!(output
        .snapshot
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::CompileBudgetExceeded));
    assert!(output.program.is_some());
}

// ── Stable state identity ──────────────────────────────────────────

#[test]
fn state_ids_survive_unrelated_edits() {
    let mut patch = fixtures::feedback_patch(0.0, 0.01);
    let first = compile_default(&patch);
    let first_ids: Vec<_> = first
        .program
        .expect("program")
        .slots
        .states
        .iter()
        .map(|s| s.state_id.clone())
        .collect();

    // An unrelated edit must not disturb state identity.
    patch.add_block(
        Block::new("extra", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(1.0))),
    );
    let second = compile_default(&patch);
    let second_ids: Vec<_> = second
        .program
        .expect("program")
        .slots
        .states
        .iter()
        .map(|s| s.state_id.clone())
        .collect();
    assert_eq!(first_ids, second_ids);
}
