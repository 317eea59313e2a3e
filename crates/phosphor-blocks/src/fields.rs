//! Field-domain blocks: domains, lane generators, element-wise field
//! math, and reducers.

use phosphor_core::op::{LaneOp, MapOp, ReduceOp};
use phosphor_core::ty::{CanonicalType, Payload, Unit};
use phosphor_core::value::Value;
use phosphor_graph::block::BlockRole;
use phosphor_graph::registry::{Behavior, BlockDef, BlockRegistry, DefaultSource, PortDef};

fn float_signal(unit: Unit) -> CanonicalType {
    CanonicalType::signal(Payload::Float, Some(unit))
}

fn float_field(unit: Unit) -> CanonicalType {
    CanonicalType::field(Payload::Float, Some(unit))
}

fn domain_in() -> PortDef {
    PortDef::required("domain", "Domain", CanonicalType::domain())
}

/// A lane-generator definition bound to a domain.
fn lane(kind: &'static str, op: LaneOp, extra: Vec<PortDef>, out: CanonicalType) -> BlockDef {
    let mut inputs = extra;
    inputs.push(domain_in());
    BlockDef {
        kind,
        role: BlockRole::Normal,
        inputs,
        outputs: vec![PortDef::required("out", "Field", out)],
        states: vec![],
        behavior: Behavior::Lane(op),
    }
}

/// A reducer definition: field in, signal out.
fn reducer(kind: &'static str, op: ReduceOp) -> BlockDef {
    BlockDef {
        kind,
        role: BlockRole::Normal,
        inputs: vec![PortDef::required("field", "Field", float_field(Unit::Scalar))],
        outputs: vec![PortDef::required("out", "Value", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Reduce(op),
    }
}

/// Register the field-domain library.
pub fn register(reg: &mut BlockRegistry) {
    // The instance domain: N lanes with stable element identity.
    // `count` param (or wired count input); `continuity` param selects
    // byId (default), prefix, or none.
    reg.register(BlockDef {
        kind: "Array",
        role: BlockRole::Normal,
        inputs: vec![PortDef::required("count", "Count", float_signal(Unit::Count))
            .with_default(DefaultSource::Const(Value::scalar(64.0)))],
        outputs: vec![PortDef::required("out", "Domain", CanonicalType::domain())],
        states: vec![],
        behavior: Behavior::Domain,
    });

    reg.register(lane(
        "FieldIndex",
        LaneOp::Index,
        vec![],
        float_field(Unit::Scalar),
    ));
    reg.register(lane(
        "FieldNorm01",
        LaneOp::Norm01,
        vec![],
        float_field(Unit::Norm01),
    ));

    // i × golden-angle × turns: the spiral workhorse.
    reg.register(lane(
        "FieldGoldenAngle",
        LaneOp::GoldenAngle,
        vec![PortDef::required("turns", "Turns", float_signal(Unit::Scalar))
            .with_default(DefaultSource::Const(Value::scalar(1.0)))],
        float_field(Unit::Radians),
    ));

    // maxRadius × sqrt(norm01): area-uniform disc packing.
    reg.register(lane(
        "FieldRadiusSqrt",
        LaneOp::RadiusSqrt,
        vec![PortDef::required(
            "maxRadius",
            "Max radius",
            float_signal(Unit::Scalar),
        )
        .with_default(DefaultSource::Const(Value::scalar(1.0)))],
        float_field(Unit::Scalar),
    ));

    // Deterministic per-element noise; `seed` param, time term scaled by
    // the `rate` the author wires in. The time input is absolute
    // milliseconds, not phase-wrapped, so element jitter stays continuous
    // across cycle boundaries.
    reg.register(lane(
        "FieldJitter",
        LaneOp::Jitter { seed: 0 },
        vec![
            PortDef::required("amount", "Amount", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(0.1))),
            PortDef::required("time", "Time", float_signal(Unit::Milliseconds))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
        ],
        float_field(Unit::Scalar),
    ));

    // Broadcast one signal across a domain's lanes.
    reg.register(BlockDef {
        kind: "FieldBroadcast",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("signal", "Signal", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
            domain_in(),
        ],
        outputs: vec![PortDef::required("out", "Field", float_field(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Broadcast,
    });

    // angle + offset, element-wise; phase01 offsets adapt to radians.
    reg.register(BlockDef {
        kind: "FieldAngularOffset",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("angle", "Angle", float_field(Unit::Radians)),
            PortDef::required("offset", "Offset", float_signal(Unit::Radians))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
        ],
        outputs: vec![PortDef::required("out", "Angle", float_field(Unit::Radians))],
        states: vec![],
        behavior: Behavior::Map(MapOp::Add),
    });

    // (radius, angle) → vec2 position.
    reg.register(BlockDef {
        kind: "FieldPolarToCartesian",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("radius", "Radius", float_field(Unit::Scalar)),
            PortDef::required("angle", "Angle", float_field(Unit::Radians)),
        ],
        outputs: vec![PortDef::required(
            "out",
            "Position",
            CanonicalType::field(Payload::Vec2, None),
        )],
        states: vec![],
        behavior: Behavior::Map(MapOp::PolarToCartesian),
    });

    // num / den, element-wise; division by zero propagates IEEE-754.
    reg.register(BlockDef {
        kind: "FieldDivide",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("num", "Numerator", float_field(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required("den", "Denominator", float_field(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
        ],
        outputs: vec![PortDef::required("out", "Quotient", float_field(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Map(MapOp::Div),
    });

    reg.register(reducer("FieldSum", ReduceOp::Sum));
    reg.register(reducer("FieldMean", ReduceOp::Mean));
    reg.register(reducer("FieldMax", ReduceOp::Max));
    reg.register(reducer("FieldMin", ReduceOp::Min));
    reg.register(reducer("FieldCount", ReduceOp::Count));
}
