//! The frontend: normalization, adapter insertion, cardinality solving,
//! type resolution, and cycle analysis.
//!
//! Passes run in a fixed order, each producing data the next consumes.
//! Errors are collected as diagnostics and every pass runs best-effort,
//! so the snapshot carries partial provenance even when compilation
//! cannot proceed to the backend.

pub mod adapt;
pub mod card;
pub mod cycles;
pub mod norm;
pub mod resolve;
pub mod snapshot;

use phosphor_core::diag::Severity;
use phosphor_core::AdapterRegistry;
use phosphor_graph::{BlockRegistry, Patch};

use card::CardMap;
use norm::NormalizedPatch;
use snapshot::FrontendSnapshot;

/// Everything the frontend produces: the public snapshot plus the
/// normalized artifacts the backend lowers from.
#[derive(Debug)]
pub struct FrontendArtifacts {
    /// Public result: resolved types, provenance, diagnostics, cycles.
    pub snapshot: FrontendSnapshot,
    /// The normalized patch (defaults materialized, buses collapsed,
    /// adapters inserted).
    pub norm: NormalizedPatch,
    /// Resolved cardinality and domain binding per output port.
    pub cards: CardMap,
}

/// Run all frontend passes over a patch snapshot.
pub fn run(
    patch: &Patch,
    registry: &BlockRegistry,
    adapters: &AdapterRegistry,
) -> FrontendArtifacts {
    let mut diagnostics = Vec::new();

    // 1. Normalization: defaults, bus collapse, single-source checks.
    let mut norm = norm::normalize(patch, registry, &mut diagnostics);

    // 2. Adapter insertion: lenses first, then discovered unit chains.
    adapt::insert_adapters(&mut norm, adapters, &mut diagnostics);

    // 3. Cardinality solving: signal/field propagation, domain binding.
    let cards = card::solve(&norm, &mut diagnostics);

    // 4. Type resolution: per-port resolved types and provenance.
    let ports = resolve::resolve(&norm, &cards, &mut diagnostics);

    // 5. Cycle analysis: SCCs with unit-delay edges cut.
    let cycle_summary = cycles::analyze(&norm, &mut diagnostics);

    let backend_ready = !diagnostics
        .iter()
        .any(|d| d.severity >= Severity::Error);

    FrontendArtifacts {
        snapshot: FrontendSnapshot {
            revision: patch.revision(),
            ports,
            diagnostics,
            cycles: cycle_summary,
            backend_ready,
        },
        norm,
        cards,
    }
}
