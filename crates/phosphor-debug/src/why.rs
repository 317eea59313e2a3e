//! The why-not-evaluated explainer.
//!
//! Given a block (and optionally a port), explain why no value appeared
//! this frame. Reasons are ordered most-specific first; an empty result
//! means the block *is* evaluated.

use phosphor_compiler::frontend::snapshot::FrontendSnapshot;
use phosphor_compiler::program::{CompiledProgram, Step};
use phosphor_core::diag::Severity;
use phosphor_core::id::{BlockId, PortId, ValueSlotId};
use phosphor_core::ty::Cardinality;
use phosphor_graph::edge::PortRef;

/// Why a block or port produced no value this frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// A compile error on the block blocks all evaluation.
    CompileError,
    /// The block lowered to nothing in the running program.
    NotInSchedule,
    /// The block's expressions exist but nothing downstream needs them.
    DependencyPruned,
    /// The block (or port) has no connections at all.
    NoConnections,
    /// The port is event-typed and the event did not fire.
    EventNotFired,
    /// No specific cause could be determined.
    Unknown,
}

/// Value slots a schedule step writes.
fn written_slots(step: &Step) -> Vec<ValueSlotId> {
    match step {
        Step::EvalSignal { slot, .. }
        | Step::MaterializeField { slot, .. }
        | Step::ReadScalarState { slot, .. }
        | Step::ReadFieldState { slot, .. } => vec![*slot],
        _ => Vec::new(),
    }
}

/// Analyze why a block (or one port of it) is not evaluated.
///
/// `snapshot` is the frontend snapshot of the compile that produced (or
/// failed to produce) the running program; passing the snapshot of a
/// *newer*, failed compile explains why the stale program disagrees
/// with the patch.
pub fn analyze_why_not(
    program: &CompiledProgram,
    snapshot: Option<&FrontendSnapshot>,
    block: &BlockId,
    port: Option<&PortId>,
) -> Vec<Reason> {
    let mut reasons = Vec::new();

    // Compile errors dominate everything else.
    if let Some(snapshot) = snapshot {
        let has_error = snapshot
            .diagnostics_for(block)
            .iter()
            .any(|d| d.severity >= Severity::Error);
        if has_error {
            reasons.push(Reason::CompileError);
        }
    }

    // Event ports: present only when fired.
    if let (Some(snapshot), Some(port)) = (snapshot, port) {
        let port_ref = PortRef {
            block: block.clone(),
            port: port.clone(),
        };
        if let Some(resolved) = snapshot.ports.get(&port_ref) {
            if resolved.ty.cardinality == Cardinality::Event {
                reasons.push(Reason::EventNotFired);
            }
        }
    }

    let slots = match port {
        Some(port) => {
            let port_ref = PortRef {
                block: block.clone(),
                port: port.clone(),
            };
            program.debug.slot_of(&port_ref).into_iter().collect()
        }
        None => program.debug.slots_of_block(block),
    };

    if program.debug.index_of(block).is_none() {
        // The running program never saw the block. Distinguish "not
        // wired to anything" from "dropped between compiles".
        let connected = snapshot
            .map(|s| {
                s.ports
                    .keys()
                    .any(|p| &p.block == block)
            })
            .unwrap_or(false);
        reasons.push(if connected {
            Reason::NotInSchedule
        } else {
            Reason::NoConnections
        });
    } else if slots.is_empty() {
        // Known block, but the queried port produced no slot.
        reasons.push(Reason::NotInSchedule);
    } else {
        let scheduled = program.schedule.steps.iter().any(|s| {
            written_slots(&s.step)
                .iter()
                .any(|slot| slots.contains(slot))
        });
        if !scheduled {
            reasons.push(Reason::DependencyPruned);
        }
    }

    if reasons.is_empty() {
        let evaluated = program.schedule.steps.iter().any(|s| {
            written_slots(&s.step)
                .iter()
                .any(|slot| slots.contains(slot))
        });
        if !evaluated {
            reasons.push(Reason::Unknown);
        }
    }

    reasons
}
