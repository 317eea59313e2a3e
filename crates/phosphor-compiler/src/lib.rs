//! The Phosphor compiler: patch snapshot in, executable program out.
//!
//! Compilation is two stages. The **frontend** normalizes the patch
//! (default-source materialization, bus collapse, adapter insertion),
//! solves cardinality, resolves types with provenance, and analyzes
//! cycles, collecting diagnostics rather than throwing, so the authoring UI
//! gets partial provenance even on failure. The **backend** runs only
//! when the frontend reports `backend_ready` and lowers the normalized
//! patch to a [`program::CompiledProgram`]: a typed value-expression DAG,
//! slot tables with stable state identities, a two-phase frame schedule,
//! and a debug index.
//!
//! [`compile`] drives both stages and announces start/end on the event
//! sink. On frontend failure the output carries diagnostics and no
//! program; on a backend invariant failure the compile aborts and the
//! caller keeps its previous program.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod frontend;
pub mod program;

use std::time::Instant;

use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::event::{CompileStatus, EngineEvent, EventSink};
use phosphor_core::id::CompileId;
use phosphor_core::AdapterRegistry;
use phosphor_graph::{BlockRegistry, Patch};

use frontend::snapshot::FrontendSnapshot;
use program::CompiledProgram;

/// Options for one compile invocation.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Identity of this compile, for pairing start/end events.
    pub compile_id: CompileId,
    /// Soft wall-clock budget. Exceeding it attaches an informational
    /// diagnostic; the compile is never killed.
    pub soft_budget_us: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            compile_id: CompileId(0),
            soft_budget_us: 8_000,
        }
    }
}

/// Result of one compile invocation.
#[derive(Debug)]
pub struct CompileOutput {
    /// The frontend's snapshot: resolved types, provenance, diagnostics,
    /// cycle summary. Always present.
    pub snapshot: FrontendSnapshot,
    /// The compiled program. Present iff the snapshot reports
    /// `backend_ready` and the backend completed.
    pub program: Option<CompiledProgram>,
}

/// Compile a patch snapshot against a block registry.
///
/// Emits `CompileStart`/`CompileEnd` on `sink`. Never panics on author
/// errors: those surface as diagnostics in the snapshot. A backend
/// internal inconsistency is downgraded to a fatal diagnostic and the
/// output carries no program.
pub fn compile(
    patch: &Patch,
    registry: &BlockRegistry,
    adapters: &AdapterRegistry,
    opts: &CompileOptions,
    sink: &dyn EventSink,
) -> CompileOutput {
    let started = Instant::now();
    let revision = patch.revision();
    sink.emit(EngineEvent::CompileStart {
        revision,
        compile: opts.compile_id,
    });

    let front = frontend::run(patch, registry, adapters);
    let mut snapshot = front.snapshot;

    let program = if snapshot.backend_ready {
        match backend::run(
            &front.norm,
            &front.cards,
            revision,
            opts.compile_id,
        ) {
            Ok(program) => Some(program),
            Err(err) => {
                snapshot.backend_ready = false;
                snapshot.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InternalInvariant,
                    err.to_string(),
                ));
                None
            }
        }
    } else {
        None
    };

    let duration_us = started.elapsed().as_micros() as u64;
    if duration_us > opts.soft_budget_us {
        snapshot.diagnostics.push(Diagnostic::new(
            DiagnosticKind::CompileBudgetExceeded,
            format!(
                "compile took {duration_us}us, soft budget {}us",
                opts.soft_budget_us
            ),
        ));
    }

    sink.emit(EngineEvent::CompileEnd {
        revision,
        compile: opts.compile_id,
        status: if program.is_some() {
            CompileStatus::Success
        } else {
            CompileStatus::Failure
        },
        duration_us,
    });

    CompileOutput { snapshot, program }
}
