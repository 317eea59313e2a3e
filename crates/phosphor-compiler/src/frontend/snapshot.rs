//! The frontend snapshot: everything the authoring layer needs to paint
//! port types, provenance badges, and error markers.

use phosphor_core::diag::{Diagnostic, Severity};
use phosphor_core::id::{BlockId, Revision};

use super::cycles::CycleSummary;
use super::resolve::ResolvedPorts;

/// The public result of the frontend passes.
///
/// Produced on every compile, success or failure; downstream passes run
/// best-effort so partial provenance is available even when
/// `backend_ready` is false.
#[derive(Clone, Debug)]
pub struct FrontendSnapshot {
    /// Revision of the patch this snapshot was derived from.
    pub revision: Revision,
    /// Resolved type and provenance per author-visible port.
    pub ports: ResolvedPorts,
    /// All diagnostics collected across passes.
    pub diagnostics: Vec<Diagnostic>,
    /// Feedback components and their legality.
    pub cycles: CycleSummary,
    /// Whether the backend may run: no diagnostic at error severity or
    /// above.
    pub backend_ready: bool,
}

impl FrontendSnapshot {
    /// Diagnostics attributed to one block.
    pub fn diagnostics_for(&self, block: &BlockId) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.block.as_ref() == Some(block))
            .collect()
    }

    /// Whether any diagnostic reaches error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }
}
