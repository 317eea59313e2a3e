//! Patch data model and block registry for the Phosphor dataflow engine.
//!
//! A [`Patch`] is the author's graph: typed block instances, edges between
//! ports, and a monotonic revision counter. The [`BlockRegistry`] is the
//! authority on what ports a block kind has and what each port's declared
//! type and default source are; the compiler never invents ports.
//!
//! The patch is owned by the authoring layer. The compiler receives a
//! snapshot by reference and never mutates it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod edge;
pub mod params;
pub mod patch;
pub mod registry;

pub use block::{Block, BlockRole, CombineMode, InputPortState};
pub use edge::{Edge, EdgeRole, PortRef};
pub use params::{ParamValue, Params};
pub use patch::Patch;
pub use registry::{Behavior, BlockDef, BlockRegistry, DefaultSource, PortDef, StateDecl, StateKind};
