//! Deterministic step-debugging over one frame.
//!
//! A [`StepSession`] drives the executor's frame cursor one schedule
//! step at a time, capturing per-step writes, anomalies, and lane
//! identities. Because stepping and playback share the same evaluation
//! machinery, a stepped frame writes exactly what a played frame
//! writes; the only difference is the pause points.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod session;
pub mod why;

pub use session::{
    Breakpoint, DebugSettings, SlotValue, StepSession, StepSnapshot,
};
pub use why::{analyze_why_not, Reason};
