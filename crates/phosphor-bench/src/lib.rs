//! Benchmark profiles for the Phosphor frame executor.
//!
//! Two pre-built engines for benchmarking and examples:
//!
//! - [`spiral_profile`]: a 5000-lane golden spiral, the reference
//!   real-time workload.
//! - [`feedback_profile`]: per-lane unit-delay feedback, exercising the
//!   state read/write path.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use phosphor_engine::Engine;

/// A compiled engine running the golden-spiral patch at `count` lanes.
pub fn spiral_profile(count: i64) -> Engine {
    let mut engine = Engine::new(phosphor_blocks::standard_registry());
    let patch = phosphor_test_utils::golden_spiral_patch(count, 4000.0, 50.0, 0.35);
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "spiral profile must compile");
    engine
}

/// A compiled engine running per-lane feedback at `count` lanes.
pub fn feedback_profile(count: i64) -> Engine {
    let mut engine = Engine::new(phosphor_blocks::standard_registry());
    let patch = phosphor_test_utils::field_feedback_patch(count, 0.01);
    let snapshot = engine.apply_patch(&patch);
    assert!(snapshot.backend_ready, "feedback profile must compile");
    engine
}
