//! Step-session integration: determinism, breakpoints, anomalies, and
//! the why-not analyzer.

use indexmap::IndexMap;

use phosphor_arena::BufferPool;
use phosphor_blocks::standard_registry;
use phosphor_compiler::program::Phase;
use phosphor_compiler::{compile, CompileOptions};
use phosphor_core::diag::AnomalyKind;
use phosphor_core::id::{BlockId, PortId, ValueSlotId};
use phosphor_core::value::Value;
use phosphor_core::{AdapterRegistry, DebugTap, NullSink};
use phosphor_debug::{analyze_why_not, Breakpoint, DebugSettings, Reason, SlotValue, StepSession};
use phosphor_engine::execute_frame;
use phosphor_graph::params::{ParamValue, Params};
use phosphor_graph::{Block, Patch};
use phosphor_runtime::{ProgramState, SessionState};
use phosphor_test_utils as fixtures;

fn compiled(patch: &Patch) -> phosphor_compiler::program::CompiledProgram {
    let output = compile(
        patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &CompileOptions::default(),
        &NullSink,
    );
    assert!(
        output.snapshot.backend_ready,
        "{:?}",
        output.snapshot.diagnostics
    );
    output.program.expect("program")
}

/// Tap recording every write during full execution.
#[derive(Default)]
struct RecordingTap {
    scalars: IndexMap<ValueSlotId, Value>,
    fields: IndexMap<ValueSlotId, Vec<f32>>,
}

impl DebugTap for RecordingTap {
    fn record_slot_value(&mut self, slot: ValueSlotId, value: Value) {
        self.scalars.insert(slot, value);
    }

    fn record_field_value(&mut self, slot: ValueSlotId, _lanes: usize, _width: usize, data: &[f32]) {
        self.fields.insert(slot, data.to_vec());
    }
}

// ── Slot determinism: stepping equals full execution ───────────────

#[test]
fn stepping_writes_exactly_what_playback_writes() {
    let patch = fixtures::golden_spiral_patch(32, 4000.0, 5.0, 0.4);
    let program = compiled(&patch);
    let t = 321.0;

    // Full execution with a recording tap.
    let mut full_state = ProgramState::for_program(&program);
    let mut full_session = SessionState::new();
    let mut full_pool = BufferPool::new();
    let mut tap = RecordingTap::default();
    let result = execute_frame(
        &program,
        &mut full_state,
        &mut full_session,
        &mut full_pool,
        &NullSink,
        Some(&mut tap),
        t,
    );
    result.frame.recycle(&mut full_pool);

    // Stepped execution capturing every write.
    let mut step_state = ProgramState::for_program(&program);
    let mut step_session_state = SessionState::new();
    let mut step_pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut step_state,
        &mut step_session_state,
        &mut step_pool,
        &NullSink,
        t,
        DebugSettings::default(),
    );
    let mut stepped: IndexMap<ValueSlotId, SlotValue> = IndexMap::new();
    let mut steps = 0;
    while let Some(snapshot) = session.step_next() {
        steps += 1;
        for (slot, value) in snapshot.written_value_slots {
            stepped.insert(slot, value);
        }
    }
    assert_eq!(steps, program.schedule.len());

    // Same slots written, same values.
    let full_slots: Vec<ValueSlotId> = tap
        .scalars
        .keys()
        .chain(tap.fields.keys())
        .copied()
        .collect();
    for slot in &full_slots {
        assert!(stepped.contains_key(slot), "slot {slot} missing from stepping");
    }
    for (slot, value) in &tap.scalars {
        match &stepped[slot] {
            SlotValue::Scalar(v) => assert_eq!(v, value, "slot {slot}"),
            other => panic!("slot {slot}: expected scalar, got {other:?}"),
        }
    }
    for (slot, data) in &tap.fields {
        match &stepped[slot] {
            SlotValue::Field { lanes, width, preview } => {
                // The preview is a prefix of the full buffer.
                assert_eq!(*lanes * *width, data.len(), "slot {slot}");
                assert_eq!(preview.as_slice(), &data[..preview.len()], "slot {slot}");
            }
            other => panic!("slot {slot}: expected field, got {other:?}"),
        }
    }
}

// ── Anomaly capture ────────────────────────────────────────────────

#[test]
fn division_anomaly_is_reported_on_the_dividing_step() {
    let patch = fixtures::divide_by_zero_patch(4);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    session.add_breakpoint(Breakpoint::Anomaly);

    let snapshot = session.run_to_breakpoint().expect("anomaly hit");
    assert_eq!(snapshot.block, Some(BlockId::from("ratio")));
    assert!(!snapshot.anomalies.is_empty());
    assert_eq!(snapshot.anomalies[0].kind, AnomalyKind::PosInf);

    // The frame still completes and renders.
    let (result, _) = session.finish_frame();
    assert_eq!(result.frame.passes.len(), 1);
    result.frame.recycle(&mut pool);
    assert!(pool.reconcile().balanced);
}

// ── Breakpoints ────────────────────────────────────────────────────

#[test]
fn phase_boundary_breakpoint_pauses_between_phases() {
    let patch = fixtures::feedback_patch(0.0, 0.25);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    session.add_breakpoint(Breakpoint::PhaseBoundary);

    let snapshot = session.run_to_breakpoint().expect("boundary hit");
    assert_eq!(snapshot.phase, Phase::PhaseBoundary);
    let (result, _) = session.finish_frame();
    result.frame.recycle(&mut pool);
}

#[test]
fn block_breakpoint_pauses_on_that_block() {
    let patch = fixtures::feedback_patch(0.0, 0.25);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    session.add_breakpoint(Breakpoint::Block(BlockId::from("accum")));

    let snapshot = session.run_to_breakpoint().expect("block hit");
    assert_eq!(snapshot.block, Some(BlockId::from("accum")));
    assert_eq!(snapshot.block_name.as_deref(), Some("accum"));
    let (result, _) = session.finish_frame();
    result.frame.recycle(&mut pool);
}

#[test]
fn slot_condition_breakpoint_watches_values() {
    let patch = fixtures::feedback_patch(0.0, 0.25);
    let program = compiled(&patch);
    let slot = program
        .debug
        .slot_of(&phosphor_graph::edge::PortRef::new("accum", "out"))
        .expect("accum slot");
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    session.add_breakpoint(Breakpoint::SlotCondition {
        slot,
        predicate: Box::new(|v| v.x() > 0.2),
    });

    let snapshot = session.run_to_breakpoint().expect("condition hit");
    match &snapshot.written_value_slots[&slot] {
        SlotValue::Scalar(v) => assert!((v.x() - 0.25).abs() < 1e-6),
        other => panic!("expected scalar, got {other:?}"),
    }
    let (result, _) = session.finish_frame();
    result.frame.recycle(&mut pool);
}

// ── Run-to-phase-end and the pre-frame marker ──────────────────────

#[test]
fn start_frame_is_a_preframe_marker() {
    let patch = fixtures::const_chain_patch(4);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    let marker = session.start_frame();
    assert_eq!(marker.phase, Phase::PreFrame);
    assert_eq!(marker.index, 0);
    assert!(marker.written_value_slots.is_empty());
    assert_eq!(marker.total, program.schedule.len());
}

#[test]
fn run_to_phase_end_stops_at_phase_edges() {
    let patch = fixtures::const_chain_patch(4);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    let first = session.run_to_phase_end().expect("pre-frame ran");
    assert_eq!(first.phase, Phase::PreFrame);
    let second = session.run_to_phase_end().expect("phase 1 ran");
    assert_eq!(second.phase, Phase::Phase1);
    let (result, _) = session.finish_frame();
    result.frame.recycle(&mut pool);
}

// ── Lane identities ────────────────────────────────────────────────

#[test]
fn lane_identities_name_the_instance() {
    let patch = fixtures::const_chain_patch(3);
    let program = compiled(&patch);
    let mut state = ProgramState::for_program(&program);
    let mut session_state = SessionState::new();
    let mut pool = BufferPool::new();
    let mut session = StepSession::new(
        &program,
        &mut state,
        &mut session_state,
        &mut pool,
        &NullSink,
        0.0,
        DebugSettings::default(),
    );
    // Run phase 1 so the lane table is seeded.
    let _ = session.run_to_phase_end();
    let _ = session.run_to_phase_end();

    let color_slot = program.passes[0].color.expect("color slot");
    let identities = session.lane_identities(color_slot);
    assert_eq!(identities.len(), 3);
    for (label, _) in &identities {
        assert_eq!(label, "dots");
    }
    let (result, _) = session.finish_frame();
    result.frame.recycle(&mut pool);
}

// ── Why-not analysis ───────────────────────────────────────────────

#[test]
fn why_not_explains_pruned_and_missing_blocks() {
    let mut patch = fixtures::const_chain_patch(4);
    patch.add_block(
        Block::new("orphan", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(7.0))),
    );
    let output = compile(
        &patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &CompileOptions::default(),
        &NullSink,
    );
    let program = output.program.expect("program");

    // The orphan lowered but nothing needs it.
    let reasons = analyze_why_not(
        &program,
        Some(&output.snapshot),
        &BlockId::from("orphan"),
        None,
    );
    assert_eq!(reasons, vec![Reason::DependencyPruned]);

    // A block that does not exist anywhere.
    let reasons = analyze_why_not(
        &program,
        Some(&output.snapshot),
        &BlockId::from("ghost"),
        None,
    );
    assert_eq!(reasons, vec![Reason::NoConnections]);

    // An evaluated block yields no reasons.
    let reasons = analyze_why_not(
        &program,
        Some(&output.snapshot),
        &BlockId::from("fill"),
        Some(&PortId::from("out")),
    );
    assert!(reasons.is_empty(), "{reasons:?}");
}

#[test]
fn why_not_reports_compile_errors_from_a_newer_snapshot() {
    // A running program from a good patch, then a broken recompile.
    let good = fixtures::const_chain_patch(4);
    let program = compiled(&good);

    let broken = fixtures::illegal_cycle_patch();
    let output = compile(
        &broken,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &CompileOptions::default(),
        &NullSink,
    );
    assert!(output.program.is_none());

    let reasons = analyze_why_not(
        &program,
        Some(&output.snapshot),
        &BlockId::from("a"),
        None,
    );
    assert!(reasons.contains(&Reason::CompileError));
}
