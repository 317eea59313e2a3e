//! Diagnostics and error types for the compile and execute pipeline.
//!
//! Compile problems are *collected*, never thrown: the frontend attaches
//! [`Diagnostic`]s to the offending block or edge and keeps going so the
//! authoring layer receives partial provenance even on failure. Only the
//! backend aborts, with a [`BackendError`] that names the failing pass.
//! Runtime problems are warnings carried on the event stream; they never
//! abort a frame.

use std::error::Error;
use std::fmt;

use crate::id::{BlockId, EdgeId, PortId, ValueSlotId};
use crate::ty::CanonicalType;

// ── Compile diagnostics ────────────────────────────────────────────

/// Severity of a diagnostic. The backend runs only when no diagnostic
/// reaches [`Severity::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; does not block compilation.
    Info,
    /// Suspicious but compilable.
    Warning,
    /// Blocks backend compilation.
    Error,
    /// Compiler bug; aborts the compile.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// What went wrong. Kinds map one-to-one onto the frontend passes that
/// detect them.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticKind {
    /// An input port has no user edge and no declared default.
    UnresolvedInput,
    /// A `Single`-combine input port has more than one user edge.
    ConflictingSources,
    /// Edge endpoint types are unequal and no adapter path exists.
    TypeMismatch {
        /// Type produced by the source port.
        from: CanonicalType,
        /// Type required by the target port.
        to: CanonicalType,
    },
    /// A field reached a signal-only input (or vice versa) without an
    /// explicit reducer or broadcast.
    CardinalityConflict,
    /// A feedback cycle not broken by a unit delay.
    IllegalCycle,
    /// Two blocks share a display name.
    DuplicateDisplayName,
    /// The compile exceeded its soft time budget.
    CompileBudgetExceeded,
    /// Backend internal inconsistency (compiler bug).
    InternalInvariant,
}

impl DiagnosticKind {
    /// The default severity for this kind.
    pub fn severity(&self) -> Severity {
        match self {
            Self::CompileBudgetExceeded => Severity::Info,
            Self::InternalInvariant => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// A short kebab-case name for event payloads and test assertions.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnresolvedInput => "unresolved-input",
            Self::ConflictingSources => "conflicting-sources",
            Self::TypeMismatch { .. } => "type-mismatch",
            Self::CardinalityConflict => "cardinality-conflict",
            Self::IllegalCycle => "illegal-cycle",
            Self::DuplicateDisplayName => "duplicate-display-name",
            Self::CompileBudgetExceeded => "compile-budget-exceeded",
            Self::InternalInvariant => "internal-invariant",
        }
    }
}

/// A diagnostic attached to a block, port, or edge.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// How bad it is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// The block the problem is attributed to, if any.
    pub block: Option<BlockId>,
    /// The port on that block, if any.
    pub port: Option<PortId>,
    /// The edge the problem is attributed to, if any.
    pub edge: Option<EdgeId>,
}

impl Diagnostic {
    /// Build a diagnostic at the kind's default severity.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        let severity = kind.severity();
        Self {
            kind,
            severity,
            message: message.into(),
            block: None,
            port: None,
            edge: None,
        }
    }

    /// Attach a block.
    pub fn on_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    /// Attach a port (implies a block).
    pub fn on_port(mut self, block: BlockId, port: PortId) -> Self {
        self.block = Some(block);
        self.port = Some(port);
        self
    }

    /// Attach an edge.
    pub fn on_edge(mut self, edge: EdgeId) -> Self {
        self.edge = Some(edge);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(block) = &self.block {
            write!(f, " [block {block}")?;
            if let Some(port) = &self.port {
                write!(f, ".{port}")?;
            }
            write!(f, "]")?;
        }
        if let Some(edge) = &self.edge {
            write!(f, " [{edge}]")?;
        }
        Ok(())
    }
}

// ── Backend failure ────────────────────────────────────────────────

/// A backend internal inconsistency.
///
/// Indicates a compiler bug (e.g. an unresolved type surviving the
/// frontend): the compile is aborted, the snapshot carries an
/// [`DiagnosticKind::InternalInvariant`] fatal, and the previously
/// running program is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendError {
    /// Name of the backend pass that failed.
    pub pass: &'static str,
    /// Description of the inconsistency.
    pub detail: String,
}

impl BackendError {
    /// Build an error for the named pass.
    pub fn new(pass: &'static str, detail: impl Into<String>) -> Self {
        Self {
            pass,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend pass '{}' failed: {}", self.pass, self.detail)
    }
}

impl Error for BackendError {}

// ── Runtime warnings ───────────────────────────────────────────────

/// Classification of a non-finite value written to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Not a number.
    NaN,
    /// Positive infinity.
    PosInf,
    /// Negative infinity.
    NegInf,
}

impl AnomalyKind {
    /// Classify a component, returning `None` for finite values.
    pub fn classify(x: f32) -> Option<Self> {
        if x.is_nan() {
            Some(Self::NaN)
        } else if x == f32::INFINITY {
            Some(Self::PosInf)
        } else if x == f32::NEG_INFINITY {
            Some(Self::NegInf)
        } else {
            None
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NaN => write!(f, "NaN"),
            Self::PosInf => write!(f, "+Inf"),
            Self::NegInf => write!(f, "-Inf"),
        }
    }
}

/// Warnings raised during frame execution. Reported via the event stream
/// and frame metrics; the frame always completes.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeWarning {
    /// A NaN or ±∞ was written to a value slot.
    LaneAnomaly {
        /// The slot that received the anomaly.
        slot: ValueSlotId,
        /// The block that produced it, when the debug index knows.
        block: Option<BlockId>,
        /// What was written.
        kind: AnomalyKind,
    },
    /// Buffers granted and returned did not balance at frame end; the
    /// pool was reset.
    BufferPoolLeak {
        /// Buffers granted since the last reconciliation.
        granted: u64,
        /// Buffers returned since the last reconciliation.
        returned: u64,
    },
    /// State migration found entries it could not match.
    StateMigrationMismatch {
        /// Number of session entries with no new-program counterpart.
        discarded: usize,
        /// Number of new slots initialized from declared defaults.
        initialized: usize,
    },
}

impl fmt::Display for RuntimeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LaneAnomaly { slot, block, kind } => {
                write!(f, "{kind} written to {slot}")?;
                if let Some(block) = block {
                    write!(f, " by block {block}")?;
                }
                Ok(())
            }
            Self::BufferPoolLeak { granted, returned } => {
                write!(f, "buffer pool imbalance: {granted} granted, {returned} returned")
            }
            Self::StateMigrationMismatch {
                discarded,
                initialized,
            } => {
                write!(
                    f,
                    "state migration: {discarded} entries discarded, {initialized} initialized fresh"
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_default_severities() {
        assert_eq!(DiagnosticKind::UnresolvedInput.severity(), Severity::Error);
        assert_eq!(
            DiagnosticKind::CompileBudgetExceeded.severity(),
            Severity::Info
        );
        assert_eq!(DiagnosticKind::InternalInvariant.severity(), Severity::Fatal);
    }

    #[test]
    fn severity_ordering_backs_backend_gate() {
        assert!(Severity::Error >= Severity::Error);
        assert!(Severity::Fatal >= Severity::Error);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Info < Severity::Warning);
    }

    #[test]
    fn anomaly_classification() {
        assert_eq!(AnomalyKind::classify(1.0), None);
        assert_eq!(AnomalyKind::classify(f32::NAN), Some(AnomalyKind::NaN));
        assert_eq!(AnomalyKind::classify(f32::INFINITY), Some(AnomalyKind::PosInf));
        assert_eq!(
            AnomalyKind::classify(f32::NEG_INFINITY),
            Some(AnomalyKind::NegInf)
        );
    }

    #[test]
    fn diagnostic_display_carries_attribution() {
        let d = Diagnostic::new(DiagnosticKind::UnresolvedInput, "input 'freq' has no source")
            .on_port(BlockId::from("osc-1"), PortId::from("freq"));
        let text = d.to_string();
        assert!(text.contains("osc-1.freq"), "{text}");
        assert!(text.starts_with("error:"), "{text}");
    }
}
