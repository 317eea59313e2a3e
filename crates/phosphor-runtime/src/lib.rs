//! Runtime state for the Phosphor dataflow engine.
//!
//! Two lifetimes of state live here. [`SessionState`] outlives every
//! compiled program: it holds scalar and per-lane state keyed by stable
//! [`StateId`](phosphor_core::StateId), plus the lane-identity tables
//! that make per-element continuity survive domain resizes.
//! [`ProgramState`] is bound to exactly one program: dense slot arenas
//! primed from the session on hot-swap and discarded with the program.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod continuity;
pub mod program_state;
pub mod session;

pub use continuity::{DomainChange, LaneMapping, LaneSource, LaneTable};
pub use program_state::{flush_to_session, migrate_state, MigrationStats, ProgramState};
pub use session::{FieldStateStore, SessionState};
