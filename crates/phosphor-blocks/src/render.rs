//! Render sinks: blocks that emit instanced geometry passes.

use phosphor_core::op::PrimitiveKind;
use phosphor_core::ty::{CanonicalType, Payload, Unit};
use phosphor_core::value::Value;
use phosphor_graph::block::BlockRole;
use phosphor_graph::registry::{Behavior, BlockDef, BlockRegistry, DefaultSource, PortDef};

/// Register the render sinks.
pub fn register(reg: &mut BlockRegistry) {
    // Instanced 2D discs. Every channel defaults to a broadcast
    // constant: position at the origin, full intensity, unit shape.
    // Color is a per-lane intensity; packed RGBA stays upstream in the
    // signal domain. `scale` param applies uniformly.
    reg.register(BlockDef {
        kind: "RenderInstances2D",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("domain", "Domain", CanonicalType::domain()),
            PortDef::required(
                "position",
                "Position",
                CanonicalType::field(Payload::Vec2, None),
            )
            .with_default(DefaultSource::Const(Value::vec2(0.0, 0.0))),
            PortDef::required(
                "color",
                "Color",
                CanonicalType::field(Payload::Float, Some(Unit::Norm01)),
            )
            .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required(
                "shape",
                "Shape",
                CanonicalType::field(Payload::Float, Some(Unit::Scalar)),
            )
            .with_default(DefaultSource::Const(Value::scalar(1.0))),
        ],
        outputs: vec![],
        states: vec![],
        behavior: Behavior::Render(PrimitiveKind::Disc),
    });
}
