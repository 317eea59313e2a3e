//! Core types and traits for the Phosphor dataflow engine.
//!
//! This is the leaf crate with zero internal Phosphor dependencies. It
//! defines the fundamental abstractions used throughout the workspace:
//! identifiers, the canonical type algebra, the unit-adapter registry,
//! scalar values, the operator vocabulary, diagnostics, and the engine
//! event stream.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adapt;
pub mod diag;
pub mod event;
pub mod id;
pub mod op;
pub mod tap;
pub mod ty;
pub mod value;

// Re-export core types at crate root for convenience.
pub use adapt::{AdapterRegistry, UnitConversion};
pub use diag::{AnomalyKind, BackendError, Diagnostic, DiagnosticKind, RuntimeWarning, Severity};
pub use event::{
    CompileStatus, EngineEvent, EventSink, FrameStats, MappingKind, MemoryStats, NullSink,
    SwapMode,
};
pub use id::{
    BlockId, CompileId, EdgeId, ElementId, ExprId, InstanceId, PortId, Revision, StateId,
    StateSlotId, ValueSlotId,
};
pub use op::{LaneOp, MapOp, PrimitiveKind, ReduceOp, TimeFn};
pub use tap::{DebugTap, NullTap};
pub use ty::{CanonicalType, Cardinality, ObjectKind, Payload, Unit};
pub use value::Value;
