//! The engine event stream: compile lifecycle, hot-swap, domain changes,
//! and frame health.
//!
//! Events are plain values pushed through an [`EventSink`]. The concrete
//! multi-subscriber bus lives in `phosphor-engine`; everything below it
//! (compiler, continuity, executor) only sees the trait, so observers
//! never leak into the core's dependencies.

use crate::diag::RuntimeWarning;
use crate::id::{CompileId, Revision};

/// Outcome of a compile, carried on [`EngineEvent::CompileEnd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStatus {
    /// A program was produced.
    Success,
    /// Diagnostics blocked the backend; no program.
    Failure,
}

/// How a new program replaced the old one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapMode {
    /// First program of the session; nothing to migrate.
    Hard,
    /// State migrated from the previous program; visually continuous.
    Soft,
}

/// Strategy used to map lanes across a domain resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingKind {
    /// Lanes matched by surviving element ID.
    ById,
    /// First `min(old, new)` lanes matched positionally.
    Prefix,
    /// No lanes preserved; all state reinitialized.
    None,
}

/// Frame-timing statistics for a health snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Wall-clock microseconds of the most recent frame.
    pub last_frame_us: u64,
    /// Exponential moving average of frame time, microseconds.
    pub avg_frame_us: u64,
    /// Frames executed since the last snapshot.
    pub frames: u64,
    /// Anomalies (NaN/±∞ writes) counted since the last snapshot.
    pub anomalies: u64,
}

/// Memory statistics for a health snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MemoryStats {
    /// Bytes held by pooled lane buffers (free + outstanding).
    pub pool_bytes: usize,
    /// Free buffers currently parked in the pool.
    pub pool_free: usize,
    /// Bytes held by persistent state stores.
    pub state_bytes: usize,
}

/// An event announced by the core.
///
/// Every variant carries the patch revision it was derived from, so
/// observers can correlate events with compiles (revision coherence).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A compile began.
    CompileStart {
        /// Revision of the patch snapshot being compiled.
        revision: Revision,
        /// Identity of this compile invocation.
        compile: CompileId,
    },
    /// A compile finished.
    CompileEnd {
        /// Revision of the patch snapshot that was compiled.
        revision: Revision,
        /// Identity of this compile invocation.
        compile: CompileId,
        /// Success or failure.
        status: CompileStatus,
        /// Wall-clock duration in microseconds.
        duration_us: u64,
    },
    /// A new program was installed at a frame boundary.
    ProgramSwapped {
        /// Revision the new program was compiled from.
        revision: Revision,
        /// The compile that produced it.
        compile: CompileId,
        /// Hard (first program) or soft (state migrated).
        mode: SwapMode,
        /// `(instance label, lane count)` pairs at swap time.
        instance_counts: Vec<(String, u32)>,
    },
    /// An instance domain's lane count changed.
    DomainChanged {
        /// Revision of the program observing the change.
        revision: Revision,
        /// Display label of the instance domain.
        instance: String,
        /// Lane count before the change.
        old_count: u32,
        /// Lane count after the change.
        new_count: u32,
        /// How old lanes mapped onto new lanes.
        mapping: MappingKind,
        /// Absolute frame time of the change, milliseconds.
        t_ms: f64,
    },
    /// Throttled frame-health report.
    HealthSnapshot {
        /// Revision of the running program.
        revision: Revision,
        /// Frame timing statistics.
        frame: FrameStats,
        /// Memory statistics.
        memory: MemoryStats,
    },
    /// A runtime warning (anomaly, pool leak, migration mismatch).
    Warning {
        /// Revision of the running program.
        revision: Revision,
        /// The warning payload.
        warning: RuntimeWarning,
    },
}

impl EngineEvent {
    /// The revision this event was derived from.
    pub fn revision(&self) -> Revision {
        match self {
            Self::CompileStart { revision, .. }
            | Self::CompileEnd { revision, .. }
            | Self::ProgramSwapped { revision, .. }
            | Self::DomainChanged { revision, .. }
            | Self::HealthSnapshot { revision, .. }
            | Self::Warning { revision, .. } => *revision,
        }
    }
}

/// Receiver of engine events.
///
/// Implementations must be cheap and non-reentrant: sinks are called from
/// inside the compile and frame paths.
pub trait EventSink {
    /// Deliver one event.
    fn emit(&self, event: EngineEvent);
}

/// A sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
