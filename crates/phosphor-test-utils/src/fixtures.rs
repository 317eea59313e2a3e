//! Ready-to-compile patch builders.

use phosphor_core::id::PortId;
use phosphor_core::value::Value;
use phosphor_graph::block::InputPortState;
use phosphor_graph::edge::PortRef;
use phosphor_graph::params::{ParamValue, Params};
use phosphor_graph::registry::DefaultSource;
use phosphor_graph::{Block, BlockRegistry, Patch};

/// The standard registry used by every fixture.
pub fn registry() -> BlockRegistry {
    phosphor_blocks::standard_registry()
}

/// Override one input port's default source on a block.
fn override_default(block: &mut Block, port: &str, value: Value) {
    block.inputs.insert(
        PortId::from(port),
        InputPortState {
            default_override: Some(DefaultSource::Const(value)),
            ..InputPortState::default()
        },
    );
}

/// Constant chain: `Const(0.5) → FieldBroadcast → RenderInstances2D`
/// over an `Array(count)` domain. One pass, `count` lanes, every color
/// lane 0.5.
pub fn const_chain_patch(count: i64) -> Patch {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("level", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(0.5))),
    );
    patch.add_block(
        Block::new("dots", "Array")
            .with_params(Params::new().with("count", ParamValue::Int(count))),
    );
    patch.add_block(Block::new("fill", "FieldBroadcast"));
    patch.add_block(Block::new("render", "RenderInstances2D"));
    patch.connect(PortRef::new("level", "out"), PortRef::new("fill", "signal"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("fill", "domain"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("render", "domain"));
    patch.connect(PortRef::new("fill", "out"), PortRef::new("render", "color"));
    patch
}

/// Golden spiral: time-root phase drives an angular offset over a
/// golden-angle layout; radius is the area-uniform sqrt profile.
///
/// `InfiniteTimeRoot(period_ms) → FieldAngularOffset ← FieldGoldenAngle
/// (turns) ← Array(count) → FieldPolarToCartesian(radius from
/// FieldRadiusSqrt(max_radius)) → RenderInstances2D`.
pub fn golden_spiral_patch(count: i64, period_ms: f32, turns: f32, max_radius: f32) -> Patch {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("clock", "InfiniteTimeRoot")
            .with_params(Params::new().with("periodMs", ParamValue::Float(period_ms))),
    );
    patch.add_block(
        Block::new("dots", "Array")
            .with_params(Params::new().with("count", ParamValue::Int(count))),
    );

    let mut angles = Block::new("angles", "FieldGoldenAngle");
    override_default(&mut angles, "turns", Value::scalar(turns));
    patch.add_block(angles);

    patch.add_block(Block::new("spin", "FieldAngularOffset"));

    let mut radius = Block::new("radius", "FieldRadiusSqrt");
    override_default(&mut radius, "maxRadius", Value::scalar(max_radius));
    patch.add_block(radius);

    patch.add_block(Block::new("layout", "FieldPolarToCartesian"));
    patch.add_block(Block::new("render", "RenderInstances2D"));

    patch.connect(PortRef::new("dots", "out"), PortRef::new("angles", "domain"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("radius", "domain"));
    patch.connect(PortRef::new("angles", "out"), PortRef::new("spin", "angle"));
    patch.connect(PortRef::new("clock", "out"), PortRef::new("spin", "offset"));
    patch.connect(PortRef::new("radius", "out"), PortRef::new("layout", "radius"));
    patch.connect(PortRef::new("spin", "out"), PortRef::new("layout", "angle"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("render", "domain"));
    patch.connect(PortRef::new("layout", "out"), PortRef::new("render", "position"));
    patch
}

/// Unit-delay feedback: `UnitDelay(init) + Const(increment) → UnitDelay`.
/// The held value grows by `increment` every frame.
pub fn feedback_patch(init: f32, increment: f32) -> Patch {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("hold", "UnitDelay")
            .with_params(Params::new().with("init", ParamValue::Float(init))),
    );
    patch.add_block(
        Block::new("step", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(increment))),
    );
    patch.add_block(Block::new("accum", "Add"));
    patch.connect(PortRef::new("hold", "out"), PortRef::new("accum", "lhs"));
    patch.connect(PortRef::new("step", "out"), PortRef::new("accum", "rhs"));
    patch.connect(PortRef::new("accum", "out"), PortRef::new("hold", "in"));
    patch
}

/// Per-lane feedback over a resizable domain: lane `i` accumulates its
/// normalized index (scaled by `gain`) every frame through a
/// field-cardinality unit delay, so every lane's state is distinct.
pub fn field_feedback_patch(count: i64, gain: f32) -> Patch {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("dots", "Array")
            .with_params(Params::new().with("count", ParamValue::Int(count))),
    );
    patch.add_block(
        Block::new("gain", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(gain))),
    );
    patch.add_block(Block::new("ramp", "FieldNorm01"));
    patch.add_block(Block::new("scaled", "Multiply"));
    patch.add_block(Block::new("hold", "UnitDelay"));
    patch.add_block(Block::new("accum", "Add"));
    patch.add_block(Block::new("render", "RenderInstances2D"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("ramp", "domain"));
    patch.connect(PortRef::new("ramp", "out"), PortRef::new("scaled", "lhs"));
    patch.connect(PortRef::new("gain", "out"), PortRef::new("scaled", "rhs"));
    patch.connect(PortRef::new("hold", "out"), PortRef::new("accum", "lhs"));
    patch.connect(PortRef::new("scaled", "out"), PortRef::new("accum", "rhs"));
    patch.connect(PortRef::new("accum", "out"), PortRef::new("hold", "in"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("render", "domain"));
    patch.connect(PortRef::new("hold", "out"), PortRef::new("render", "color"));
    patch
}

/// Two blocks feeding each other with no unit delay: an illegal cycle.
pub fn illegal_cycle_patch() -> Patch {
    let mut patch = Patch::new();
    patch.add_block(Block::new("a", "Negate"));
    patch.add_block(Block::new("b", "Negate"));
    patch.connect(PortRef::new("a", "out"), PortRef::new("b", "in"));
    patch.connect(PortRef::new("b", "out"), PortRef::new("a", "in"));
    patch
}

/// Division by a zero constant feeding a render sink's color: the
/// quotient is +Inf on every frame, and the frame still completes.
pub fn divide_by_zero_patch(count: i64) -> Patch {
    let mut patch = Patch::new();
    patch.add_block(
        Block::new("zero", "Const")
            .with_params(Params::new().with("value", ParamValue::Float(0.0))),
    );
    patch.add_block(
        Block::new("dots", "Array")
            .with_params(Params::new().with("count", ParamValue::Int(count))),
    );
    patch.add_block(Block::new("ratio", "FieldDivide"));
    patch.add_block(Block::new("render", "RenderInstances2D"));
    patch.connect(PortRef::new("zero", "out"), PortRef::new("ratio", "den"));
    patch.connect(PortRef::new("dots", "out"), PortRef::new("render", "domain"));
    patch.connect(PortRef::new("ratio", "out"), PortRef::new("render", "color"));
    patch
}
