//! Patch fixtures shared by the Phosphor test suites.
//!
//! Each builder returns a ready-to-compile patch over the standard
//! block registry. The shapes mirror the engine's end-to-end scenarios:
//! a constant chain, a golden spiral, unit-delay feedback, an illegal
//! cycle, and a division anomaly.

#![forbid(unsafe_code)]

pub mod fixtures;

pub use fixtures::*;
