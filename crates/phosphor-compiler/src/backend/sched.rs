//! Schedule building: ordering the DAG into a two-phase frame.
//!
//! The schedule prunes to expressions reachable from the frame's roots
//! (render passes, state write-backs, instance counts), orders instance
//! solving topologically so counts resolve before any dependent field,
//! reads state at the start of Phase 1 after continuity, and writes it
//! back in Phase 2.

use indexmap::IndexSet;

use phosphor_core::diag::BackendError;
use phosphor_core::id::{ExprId, InstanceId};
use phosphor_core::ty::Cardinality;

use crate::program::{Phase, Schedule, ScheduledStep, Step, StateSlotKind, ValueExpr};

use super::lower::Lowered;

const PASS: &str = "schedule";

/// Expressions transitively reachable from a set of roots.
fn reachable(lowered: &Lowered, roots: &[ExprId]) -> IndexSet<ExprId> {
    let mut seen: IndexSet<ExprId> = IndexSet::new();
    let mut stack: Vec<ExprId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for arg in lowered.exprs[id.0 as usize].expr.args() {
            stack.push(arg);
        }
    }
    seen
}

/// The instances referenced anywhere in an expression's dependency
/// closure.
fn instances_in_closure(lowered: &Lowered, root: ExprId) -> IndexSet<InstanceId> {
    let mut out = IndexSet::new();
    for id in reachable(lowered, &[root]) {
        if let Some(instance) = lowered.slots.values[id.0 as usize].instance {
            out.insert(instance);
        }
    }
    out
}

/// Topological order of instances by count-expression dependency.
///
/// An instance whose count reduces a field of another instance must be
/// solved after it. A count depending on its own instance's fields is a
/// backend invariant violation (mid-frame resize).
fn instance_order(lowered: &Lowered) -> Result<Vec<InstanceId>, BackendError> {
    let n = lowered.instances.len();
    let mut deps: Vec<IndexSet<InstanceId>> = Vec::with_capacity(n);
    for def in &lowered.instances {
        let in_closure = instances_in_closure(lowered, def.count_expr);
        if in_closure.contains(&def.id) {
            return Err(BackendError::new(
                PASS,
                format!(
                    "instance '{}' count depends on its own lanes",
                    def.label
                ),
            ));
        }
        deps.push(in_closure);
    }
    let mut order: Vec<InstanceId> = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while order.len() < n {
        let before = order.len();
        for i in 0..n {
            if placed[i] {
                continue;
            }
            if deps[i]
                .iter()
                .all(|d| placed.get(d.0 as usize).copied().unwrap_or(true))
            {
                placed[i] = true;
                order.push(InstanceId(i as u32));
            }
        }
        if order.len() == before {
            return Err(BackendError::new(
                PASS,
                "instance count dependencies form a cycle",
            ));
        }
    }
    Ok(order)
}

/// Append evaluation steps for an expression's closure in dependency
/// order, skipping already-scheduled expressions and state reads (those
/// get explicit read steps).
fn schedule_exprs(
    lowered: &Lowered,
    roots: &[ExprId],
    phase: Phase,
    done: &mut IndexSet<ExprId>,
    steps: &mut Vec<ScheduledStep>,
) -> Result<(), BackendError> {
    // Iterative postorder: args before users.
    let mut stack: Vec<(ExprId, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((id, expanded)) = stack.pop() {
        if done.contains(&id) {
            continue;
        }
        let node = &lowered.exprs[id.0 as usize];
        if !expanded {
            stack.push((id, true));
            for arg in node.expr.args() {
                stack.push((arg, false));
            }
            continue;
        }
        if done.contains(&id) {
            continue;
        }
        done.insert(id);
        let slot_def = &lowered.slots.values[node.slot.0 as usize];
        let block = lowered
            .debug
            .block_of_slot(node.slot)
            .and_then(|b| lowered.debug.index_of(b));
        let step = match (&node.expr, slot_def.cardinality) {
            (ValueExpr::ReadScalarState { state }, _) => Step::ReadScalarState {
                state: *state,
                slot: node.slot,
            },
            (ValueExpr::ReadFieldState { state, instance }, _) => Step::ReadFieldState {
                state: *state,
                slot: node.slot,
                instance: *instance,
            },
            (_, Cardinality::Field) => Step::MaterializeField {
                expr: id,
                slot: node.slot,
                instance: slot_def.instance.ok_or_else(|| {
                    BackendError::new(PASS, format!("field slot {} has no instance", node.slot))
                })?,
            },
            _ => Step::EvalSignal {
                expr: id,
                slot: node.slot,
            },
        };
        steps.push(ScheduledStep { step, phase, block });
    }
    Ok(())
}

/// Build the frame schedule from the lowered program parts.
pub fn build(lowered: &Lowered) -> Result<Schedule, BackendError> {
    let mut steps: Vec<ScheduledStep> = Vec::new();
    let mut done: IndexSet<ExprId> = IndexSet::new();

    // Sanity: every value slot's cardinality must be signal or field.
    for slot in &lowered.slots.values {
        if !matches!(slot.cardinality, Cardinality::Signal | Cardinality::Field) {
            return Err(BackendError::new(
                PASS,
                format!("slot {} has non-executable cardinality", slot.id),
            ));
        }
    }

    // ── PreFrame: instance-count solving, in dependency order ──
    let order = instance_order(lowered)?;
    for &instance in &order {
        let def = &lowered.instances[instance.0 as usize];
        let block = lowered.debug.index_of(&def.stable_key);
        schedule_exprs(
            lowered,
            &[def.count_expr],
            Phase::PreFrame,
            &mut done,
            &mut steps,
        )?;
        steps.push(ScheduledStep {
            step: Step::SolveInstance {
                instance,
                expr: def.count_expr,
            },
            phase: Phase::PreFrame,
            block,
        });
    }

    // ── Phase 1: continuity, state reads, evaluation ──
    for &instance in &order {
        let def = &lowered.instances[instance.0 as usize];
        let block = lowered.debug.index_of(&def.stable_key);
        steps.push(ScheduledStep {
            step: Step::ContinuityMapBuild { instance },
            phase: Phase::Phase1,
            block,
        });
        let has_field_state = lowered
            .slots
            .states
            .iter()
            .any(|s| s.kind == StateSlotKind::FieldLane && s.instance == Some(instance));
        if has_field_state {
            steps.push(ScheduledStep {
                step: Step::ContinuityApply { instance },
                phase: Phase::Phase1,
                block,
            });
        }
    }

    // Roots of the frame: render inputs and state write sources.
    let mut roots: Vec<ExprId> = Vec::new();
    for pass in &lowered.passes {
        // Slots and expressions are allocated 1:1.
        roots.push(ExprId(pass.position.0));
        if let Some(color) = pass.color {
            roots.push(ExprId(color.0));
        }
        if let Some(shape) = pass.shape {
            roots.push(ExprId(shape.0));
        }
    }
    for &(_, source) in &lowered.state_writes {
        roots.push(source);
    }

    // Explicit state reads at the start of Phase 1, for every state slot
    // whose read expression is live this frame.
    let live = reachable(lowered, &roots);
    for node in &lowered.exprs {
        let id = ExprId(node.slot.0);
        if !live.contains(&id) || done.contains(&id) {
            continue;
        }
        match &node.expr {
            ValueExpr::ReadScalarState { state } => {
                steps.push(ScheduledStep {
                    step: Step::ReadScalarState {
                        state: *state,
                        slot: node.slot,
                    },
                    phase: Phase::Phase1,
                    block: lowered
                        .debug
                        .block_of_state(*state)
                        .and_then(|b| lowered.debug.index_of(b)),
                });
                done.insert(id);
            }
            ValueExpr::ReadFieldState { state, instance } => {
                steps.push(ScheduledStep {
                    step: Step::ReadFieldState {
                        state: *state,
                        slot: node.slot,
                        instance: *instance,
                    },
                    phase: Phase::Phase1,
                    block: lowered
                        .debug
                        .block_of_state(*state)
                        .and_then(|b| lowered.debug.index_of(b)),
                });
                done.insert(id);
            }
            _ => {}
        }
    }

    schedule_exprs(lowered, &roots, Phase::Phase1, &mut done, &mut steps)?;

    // ── Boundary ──
    steps.push(ScheduledStep {
        step: Step::PhaseBoundary,
        phase: Phase::PhaseBoundary,
        block: None,
    });

    // ── Phase 2: state write-backs ──
    for &(state, source) in &lowered.state_writes {
        let def = lowered
            .slots
            .states
            .get(state.0 as usize)
            .ok_or_else(|| BackendError::new(PASS, format!("unknown state slot {state}")))?;
        let from = lowered.exprs[source.0 as usize].slot;
        let block = lowered
            .debug
            .block_of_state(state)
            .and_then(|b| lowered.debug.index_of(b));
        let step = match def.kind {
            StateSlotKind::Scalar => Step::WriteScalarState { state, from },
            StateSlotKind::FieldLane => Step::WriteFieldState {
                state,
                from,
                instance: def.instance.ok_or_else(|| {
                    BackendError::new(PASS, format!("field state {state} has no instance"))
                })?,
            },
        };
        steps.push(ScheduledStep {
            step,
            phase: Phase::Phase2,
            block,
        });
    }

    // ── PostFrame: render passes ──
    for (i, pass) in lowered.passes.iter().enumerate() {
        let block = lowered.debug.index_of(&pass.sink);
        steps.push(ScheduledStep {
            step: Step::Render { pass: i },
            phase: Phase::PostFrame,
            block,
        });
    }

    let schedule = Schedule { steps };
    if !schedule.phases_ordered() {
        return Err(BackendError::new(PASS, "phases are not monotonically ordered"));
    }
    Ok(schedule)
}
