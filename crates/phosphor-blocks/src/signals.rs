//! Signal-domain blocks: constants, time roots, scalar math, state.

use phosphor_core::op::{MapOp, TimeFn};
use phosphor_core::ty::{CanonicalType, Payload, Unit};
use phosphor_core::value::Value;
use phosphor_graph::block::BlockRole;
use phosphor_graph::registry::{
    Behavior, BlockDef, BlockRegistry, DefaultSource, PortDef, StateDecl, StateKind,
};

fn float_signal(unit: Unit) -> CanonicalType {
    CanonicalType::signal(Payload::Float, Some(unit))
}

/// A binary scalar-math definition with defaulted operands.
fn binary(kind: &'static str, op: MapOp, lhs_default: f32, rhs_default: f32) -> BlockDef {
    BlockDef {
        kind,
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("lhs", "A", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(lhs_default))),
            PortDef::required("rhs", "B", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(rhs_default))),
        ],
        outputs: vec![PortDef::required("out", "Result", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Map(op),
    }
}

/// A unary scalar-math definition.
fn unary(kind: &'static str, op: MapOp, in_unit: Unit, out_unit: Unit) -> BlockDef {
    BlockDef {
        kind,
        role: BlockRole::Normal,
        inputs: vec![PortDef::required("in", "In", float_signal(in_unit))
            .with_default(DefaultSource::Const(Value::scalar(0.0)))],
        outputs: vec![PortDef::required("out", "Out", float_signal(out_unit))],
        states: vec![],
        behavior: Behavior::Map(op),
    }
}

/// Register the signal-domain library.
pub fn register(reg: &mut BlockRegistry) {
    // Constant producer; `value` param.
    reg.register(BlockDef {
        kind: "Const",
        role: BlockRole::Normal,
        inputs: vec![],
        outputs: vec![PortDef::required("out", "Value", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Const,
    });

    // The animation clock anchor: cyclic phase from absolute time.
    // `periodMs` param, default one cycle per 4 seconds. Float payload
    // with the phase01 unit, so phase flows into ordinary math and
    // adapts to radians where trig wants it.
    reg.register(BlockDef {
        kind: "InfiniteTimeRoot",
        role: BlockRole::TimeRoot,
        inputs: vec![],
        outputs: vec![PortDef::required(
            "out",
            "Phase",
            float_signal(Unit::Phase01),
        )],
        states: vec![],
        behavior: Behavior::Time(TimeFn::Phase),
    });

    // Unbounded ramp in cycles; useful for ever-growing spirals.
    reg.register(BlockDef {
        kind: "TimeRamp",
        role: BlockRole::TimeRoot,
        inputs: vec![],
        outputs: vec![PortDef::required("out", "Cycles", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Time(TimeFn::Ramp),
    });

    reg.register(binary("Add", MapOp::Add, 0.0, 0.0));
    reg.register(binary("Subtract", MapOp::Sub, 0.0, 0.0));
    reg.register(binary("Multiply", MapOp::Mul, 1.0, 1.0));
    reg.register(binary("Divide", MapOp::Div, 0.0, 1.0));
    reg.register(binary("MinOf", MapOp::Min, 0.0, 0.0));
    reg.register(binary("MaxOf", MapOp::Max, 0.0, 0.0));

    // mix(a, b, t)
    reg.register(BlockDef {
        kind: "Mix",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("a", "A", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
            PortDef::required("b", "B", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required("t", "Blend", float_signal(Unit::Norm01))
                .with_default(DefaultSource::Const(Value::scalar(0.5))),
        ],
        outputs: vec![PortDef::required("out", "Result", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Map(MapOp::Mix),
    });

    reg.register(unary("Clamp01", MapOp::Clamp01, Unit::Scalar, Unit::Norm01));
    reg.register(unary("Negate", MapOp::Neg, Unit::Scalar, Unit::Scalar));
    reg.register(unary("AbsoluteValue", MapOp::Abs, Unit::Scalar, Unit::Scalar));
    reg.register(unary("SquareRoot", MapOp::Sqrt, Unit::Scalar, Unit::Scalar));
    reg.register(unary("FloorTo", MapOp::Floor, Unit::Scalar, Unit::Scalar));
    reg.register(unary("WrapPhase", MapOp::WrapPhase, Unit::Scalar, Unit::Phase01));

    // Trig wants radians; phase01 sources adapt automatically.
    let mut sine = unary("Sine", MapOp::Sin, Unit::Radians, Unit::Scalar);
    sine.inputs[0].id = "angle";
    sine.inputs[0].label = "Angle";
    reg.register(sine);
    let mut cosine = unary("Cosine", MapOp::Cos, Unit::Radians, Unit::Scalar);
    cosine.inputs[0].id = "angle";
    cosine.inputs[0].label = "Angle";
    reg.register(cosine);

    // Packers.
    reg.register(BlockDef {
        kind: "PackVec2",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("x", "X", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
            PortDef::required("y", "Y", float_signal(Unit::Scalar))
                .with_default(DefaultSource::Const(Value::scalar(0.0))),
        ],
        outputs: vec![PortDef::required(
            "out",
            "Vector",
            CanonicalType::signal(Payload::Vec2, None),
        )],
        states: vec![],
        behavior: Behavior::Map(MapOp::PackVec2),
    });
    reg.register(BlockDef {
        kind: "PackColor",
        role: BlockRole::Normal,
        inputs: vec![
            PortDef::required("r", "Red", float_signal(Unit::Norm01))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required("g", "Green", float_signal(Unit::Norm01))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required("b", "Blue", float_signal(Unit::Norm01))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
            PortDef::required("a", "Alpha", float_signal(Unit::Norm01))
                .with_default(DefaultSource::Const(Value::scalar(1.0))),
        ],
        outputs: vec![PortDef::required(
            "out",
            "Color",
            CanonicalType::signal(Payload::Color, None),
        )],
        states: vec![],
        behavior: Behavior::Map(MapOp::PackColor),
    });

    // One-frame delay; the only legal way to close a feedback loop.
    // `init` param seeds the held value.
    reg.register(BlockDef {
        kind: "UnitDelay",
        role: BlockRole::Normal,
        inputs: vec![PortDef::required("in", "In", float_signal(Unit::Scalar))
            .with_default(DefaultSource::Const(Value::scalar(0.0)))],
        outputs: vec![PortDef::required(
            "out",
            "Held",
            float_signal(Unit::Scalar),
        )],
        states: vec![StateDecl {
            role_tag: "held",
            kind: StateKind::Scalar,
            payload: Payload::Float,
            initial: Value::scalar(0.0),
        }],
        behavior: Behavior::UnitDelay,
    });

    // Value-neutral fan-in/fan-out; collapsed by the frontend.
    reg.register(BlockDef {
        kind: "Bus",
        role: BlockRole::Bus,
        inputs: vec![PortDef::required("in", "In", float_signal(Unit::Scalar))],
        outputs: vec![PortDef::required("out", "Out", float_signal(Unit::Scalar))],
        states: vec![],
        behavior: Behavior::Bus,
    });
}
