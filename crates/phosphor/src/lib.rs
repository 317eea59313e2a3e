//! Phosphor: a live-editable dataflow engine for real-time visual
//! synthesis.
//!
//! An author composes a patch, a graph of typed blocks (time roots,
//! field operators, math, render sinks), and the engine continuously
//! compiles it into an executable program. Executing the program once
//! per frame produces a render description of instanced geometry
//! passes. Recompiling after an edit hot-swaps the program without
//! losing animation continuity or per-element state.
//!
//! This is the top-level facade crate re-exporting the public API of
//! the Phosphor sub-crates. For most users, adding `phosphor` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use phosphor::prelude::*;
//!
//! // A patch: 0.5 broadcast across 4 lanes into a render sink.
//! let mut patch = Patch::new();
//! patch.add_block(
//!     Block::new("level", "Const")
//!         .with_params(Params::new().with("value", ParamValue::Float(0.5))),
//! );
//! patch.add_block(
//!     Block::new("dots", "Array")
//!         .with_params(Params::new().with("count", ParamValue::Int(4))),
//! );
//! patch.add_block(Block::new("fill", "FieldBroadcast"));
//! patch.add_block(Block::new("render", "RenderInstances2D"));
//! patch.connect(PortRef::new("level", "out"), PortRef::new("fill", "signal"));
//! patch.connect(PortRef::new("dots", "out"), PortRef::new("fill", "domain"));
//! patch.connect(PortRef::new("dots", "out"), PortRef::new("render", "domain"));
//! patch.connect(PortRef::new("fill", "out"), PortRef::new("render", "color"));
//!
//! // Compile, swap, render one frame.
//! let mut engine = Engine::new(phosphor::blocks::standard_registry());
//! let snapshot = engine.apply_patch(&patch);
//! assert!(snapshot.backend_ready);
//! let frame = engine.render_frame(16.6).unwrap();
//! assert_eq!(frame.passes.len(), 1);
//! assert_eq!(frame.passes[0].count, 4);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `phosphor-core` | IDs, type algebra, values, operators, events, diagnostics |
//! | [`graph`] | `phosphor-graph` | Patch model and block registry |
//! | [`compiler`] | `phosphor-compiler` | Frontend passes, backend lowering, compiled programs |
//! | [`arena`] | `phosphor-arena` | Lane buffers and the frame buffer pool |
//! | [`runtime`] | `phosphor-runtime` | Session/program state, continuity, migration |
//! | [`engine`] | `phosphor-engine` | Frame executor, event bus, hot-swap host |
//! | [`debug`] | `phosphor-debug` | Step-debug sessions and the why-not analyzer |
//! | [`blocks`] | `phosphor-blocks` | The reference block library |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: IDs, the type algebra, values, operators, events, and
/// diagnostics (`phosphor-core`).
pub use phosphor_core as types;

/// Patch model and block registry (`phosphor-graph`).
pub use phosphor_graph as graph;

/// Frontend and backend compilers plus the program IR
/// (`phosphor-compiler`).
pub use phosphor_compiler as compiler;

/// Lane buffers and the pooled buffer arena (`phosphor-arena`).
pub use phosphor_arena as arena;

/// Session and program state with hot-swap continuity
/// (`phosphor-runtime`).
pub use phosphor_runtime as runtime;

/// Frame executor, event bus, and the hot-swap host
/// (`phosphor-engine`).
pub use phosphor_engine as engine;

/// Step-debug sessions and the why-not analyzer (`phosphor-debug`).
pub use phosphor_debug as debug;

/// The reference block library (`phosphor-blocks`).
pub use phosphor_blocks as blocks;

/// The types most applications need.
pub mod prelude {
    pub use phosphor_compiler::{compile, CompileOptions, CompileOutput};
    pub use phosphor_core::{
        BlockId, CanonicalType, Cardinality, EngineEvent, Payload, PortId, Revision, Unit, Value,
    };
    pub use phosphor_engine::{Engine, EngineConfig, RenderFrame, RenderPass};
    pub use phosphor_graph::{
        Behavior, Block, BlockDef, BlockRegistry, Params, ParamValue, Patch, PortDef, PortRef,
    };
}
