//! Frame execution and hot-swap orchestration for the Phosphor
//! dataflow engine.
//!
//! [`FrameCursor`] executes one frame's schedule step by step; the same
//! machinery drives full-speed playback and the step debugger, which is
//! what makes stepping deterministic by construction. [`Engine`] wires
//! the compiler, session state, buffer pool, and event bus into the
//! authoring loop: mutate patch → compile → soft-swap → render frames.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bus;
pub mod executor;
pub mod host;
pub mod metrics;
pub mod render;

pub use bus::EventBus;
pub use executor::{execute_frame, AnomalyRecord, FrameCursor, FrameResult, StepRecord};
pub use host::{Engine, EngineConfig};
pub use metrics::FrameMetrics;
pub use render::{RenderFrame, RenderPass};
