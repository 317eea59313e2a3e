//! End-to-end scenarios over the engine host: compile, swap, render.

use phosphor_blocks::standard_registry;
use phosphor_core::event::{EngineEvent, MappingKind, SwapMode};
use phosphor_core::id::{BlockId, StateId};
use phosphor_core::op::GOLDEN_ANGLE;
use phosphor_engine::Engine;
use phosphor_graph::params::ParamValue;
use phosphor_test_utils as fixtures;

const TAU: f32 = std::f32::consts::TAU;

// ── Constant chain ─────────────────────────────────────────────────

#[test]
fn const_chain_renders_broadcast_color() {
    let mut engine = Engine::new(standard_registry());
    let snapshot = engine.apply_patch(&fixtures::const_chain_patch(4));
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    let frame = engine.render_frame(0.0).expect("frame");
    assert_eq!(frame.passes.len(), 1);
    let pass = &frame.passes[0];
    assert_eq!(pass.count, 4);
    let color = pass.color.as_ref().expect("color buffer");
    assert_eq!(color.lanes(), 4);
    assert_eq!(color.as_slice(), &[0.5, 0.5, 0.5, 0.5]);
}

// ── Golden spiral ──────────────────────────────────────────────────

#[test]
fn golden_spiral_positions_are_bounded_and_ordered() {
    let mut engine = Engine::new(standard_registry());
    let patch = fixtures::golden_spiral_patch(5000, 4000.0, 50.0, 0.35);
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    let frame = engine.render_frame(1234.5).expect("frame");
    assert_eq!(frame.passes.len(), 1);
    let pass = &frame.passes[0];
    assert_eq!(pass.count, 5000);

    let position = &pass.position;
    assert_eq!(position.lanes(), 5000);
    assert_eq!(position.width(), 2);

    let mut last_radius = 0.0f32;
    for i in 0..position.lanes() {
        let lane = position.lane(i);
        let (x, y) = (lane[0], lane[1]);
        assert!(x.is_finite() && y.is_finite(), "lane {i} not finite");
        assert!(
            x.abs() <= 0.35 + 1e-4 && y.abs() <= 0.35 + 1e-4,
            "lane {i} out of bounds: ({x}, {y})"
        );
        // The sqrt radius profile is monotone in lane order.
        let radius = (x * x + y * y).sqrt();
        assert!(radius + 1e-4 >= last_radius, "radius dipped at lane {i}");
        last_radius = radius;
    }

    // Successive angles advance by the scaled golden angle, modulo 2π.
    let expected = (GOLDEN_ANGLE * 50.0).rem_euclid(TAU);
    for i in 1..6 {
        let a = position.lane(i);
        let b = position.lane(i + 1);
        let delta =
            (b[1].atan2(b[0]) - a[1].atan2(a[0])).rem_euclid(TAU);
        assert!(
            (delta - expected).abs() < 1e-2,
            "angle step at lane {i}: {delta} vs {expected}"
        );
    }
}

// ── Hot-swap with feedback ─────────────────────────────────────────

fn held_value(engine: &mut Engine) -> f32 {
    let (program, state, _, _) = engine.debug_parts().expect("program installed");
    let slot = program
        .slots
        .state_by_id(&StateId::derive(&BlockId::from("hold"), "held"))
        .expect("state slot");
    state.state_scalars[slot.id.0 as usize].x()
}

#[test]
fn hot_swap_preserves_unit_delay_state() {
    let mut engine = Engine::new(standard_registry());
    let mut patch = fixtures::feedback_patch(0.0, 0.01);
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    for i in 0..100 {
        let _ = engine.render_frame(i as f64 * 16.0);
    }
    let after_100 = held_value(&mut engine);
    assert!((after_100 - 1.0).abs() < 1e-3, "state was {after_100}");

    // Swap to an increment of 0.02 on the same delay block.
    patch.set_param(&BlockId::from("step"), "value", ParamValue::Float(0.02));
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    // First frame under the new program reads the migrated value and
    // writes value + 0.02.
    let migrated = held_value(&mut engine);
    assert!((migrated - after_100).abs() < 1e-6, "migration lost state");
    let _ = engine.render_frame(2000.0);
    let stepped = held_value(&mut engine);
    assert!(
        (stepped - (after_100 + 0.02)).abs() < 1e-4,
        "expected {} got {stepped}",
        after_100 + 0.02
    );
}

#[test]
fn first_swap_is_hard_then_soft() {
    let mut engine = Engine::new(standard_registry());
    let events = engine.subscribe();
    let mut patch = fixtures::feedback_patch(0.0, 0.01);
    engine.apply_patch(&patch);
    patch.set_param(&BlockId::from("step"), "value", ParamValue::Float(0.02));
    engine.apply_patch(&patch);

    let modes: Vec<SwapMode> = events
        .try_iter()
        .filter_map(|e| match e {
            EngineEvent::ProgramSwapped { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![SwapMode::Hard, SwapMode::Soft]);
}

// ── Domain resize ──────────────────────────────────────────────────

fn held_lanes(engine: &mut Engine) -> Vec<f32> {
    let (program, state, _, _) = engine.debug_parts().expect("program installed");
    let slot = program
        .slots
        .state_by_id(&StateId::derive(&BlockId::from("hold"), "held"))
        .expect("state slot");
    let store = &state.state_fields[slot.id.0 as usize];
    (0..store.lanes).map(|i| store.lane(i)[0]).collect()
}

#[test]
fn domain_shrink_preserves_surviving_lane_state() {
    let mut engine = Engine::new(standard_registry());
    let events = engine.subscribe();
    let mut patch = fixtures::field_feedback_patch(50, 1.0);
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    for i in 0..3 {
        let _ = engine.render_frame(i as f64 * 16.0);
    }
    let before = held_lanes(&mut engine);
    assert_eq!(before.len(), 50);
    // Lane i accumulated 3 × i/49.
    assert!((before[49] - 3.0).abs() < 1e-4);

    patch.set_param(&BlockId::from("dots"), "count", ParamValue::Int(30));
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);
    let _ = engine.render_frame(1000.0);

    let after = held_lanes(&mut engine);
    assert_eq!(after.len(), 30);
    for i in 0..30 {
        // Migrated value plus one new accumulation at the new
        // normalization (i/29).
        let expected = before[i] + i as f32 / 29.0;
        assert!(
            (after[i] - expected).abs() < 1e-4,
            "lane {i}: {} vs {expected}",
            after[i]
        );
    }

    let change = events.try_iter().find_map(|e| match e {
        EngineEvent::DomainChanged {
            old_count,
            new_count,
            mapping,
            ..
        } => Some((old_count, new_count, mapping)),
        _ => None,
    });
    assert_eq!(change, Some((50, 30, MappingKind::ById)));
}

// ── Anomalies never abort the frame ────────────────────────────────

#[test]
fn division_by_zero_completes_the_frame() {
    let mut engine = Engine::new(standard_registry());
    let snapshot = engine.apply_patch(&fixtures::divide_by_zero_patch(4));
    assert!(snapshot.backend_ready, "{:?}", snapshot.diagnostics);

    let frame = engine.render_frame(0.0).expect("frame completes");
    assert_eq!(frame.passes.len(), 1);
    assert!(engine.last_metrics().anomalies > 0);
}

// ── Frame purity ───────────────────────────────────────────────────

#[test]
fn identical_inputs_give_identical_frames() {
    use phosphor_arena::BufferPool;
    use phosphor_compiler::{compile, CompileOptions};
    use phosphor_core::{AdapterRegistry, NullSink};
    use phosphor_engine::execute_frame;
    use phosphor_runtime::{ProgramState, SessionState};

    let patch = fixtures::golden_spiral_patch(64, 4000.0, 3.0, 0.35);
    let output = compile(
        &patch,
        &standard_registry(),
        &AdapterRegistry::standard(),
        &CompileOptions::default(),
        &NullSink,
    );
    let program = output.program.expect("program");

    let state0 = ProgramState::for_program(&program);
    let session0 = SessionState::new();

    let run = |state: &mut ProgramState, session: &mut SessionState| {
        let mut pool = BufferPool::new();
        let result = execute_frame(
            &program, state, session, &mut pool, &NullSink, None, 777.7,
        );
        let lanes: Vec<Vec<f32>> = result
            .frame
            .passes
            .iter()
            .map(|p| p.position.as_slice().to_vec())
            .collect();
        result.frame.recycle(&mut pool);
        assert!(pool.reconcile().balanced);
        lanes
    };

    let mut state_a = state0.clone();
    let mut session_a = session0.clone();
    let lanes_a = run(&mut state_a, &mut session_a);

    let mut state_b = state0.clone();
    let mut session_b = session0.clone();
    let lanes_b = run(&mut state_b, &mut session_b);

    assert_eq!(lanes_a, lanes_b);
    assert_eq!(state_a.state_scalars, state_b.state_scalars);
    assert_eq!(state_a.state_fields, state_b.state_fields);
}

// ── Pool balance over many frames ──────────────────────────────────

#[test]
fn no_pool_leaks_across_frames_and_resizes() {
    let mut engine = Engine::new(standard_registry());
    let events = engine.subscribe();
    let mut patch = fixtures::field_feedback_patch(32, 0.5);
    engine.apply_patch(&patch);
    for i in 0..20 {
        let _ = engine.render_frame(i as f64 * 16.0);
        if i == 10 {
            patch.set_param(&BlockId::from("dots"), "count", ParamValue::Int(48));
            engine.apply_patch(&patch);
        }
    }
    let leaks = events
        .try_iter()
        .filter(|e| {
            matches!(
                e,
                EngineEvent::Warning {
                    warning: phosphor_core::RuntimeWarning::BufferPoolLeak { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(leaks, 0);
}

// ── Revision coherence ─────────────────────────────────────────────

#[test]
fn events_carry_the_compiled_revision() {
    let mut engine = Engine::new(standard_registry());
    let events = engine.subscribe();
    let patch = fixtures::const_chain_patch(4);
    let revision = patch.revision();

    let snapshot = engine.apply_patch(&patch);
    assert_eq!(snapshot.revision, revision);
    let program_revision = engine.program().expect("program").revision;
    assert_eq!(program_revision, revision);

    let _ = engine.render_frame(0.0);
    for event in events.try_iter() {
        assert_eq!(event.revision(), revision, "event {event:?}");
    }
}
