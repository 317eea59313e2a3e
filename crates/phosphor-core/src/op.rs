//! The closed operator vocabulary shared by the compiler and executor.
//!
//! Block behaviors, expression nodes, and lane evaluators all dispatch on
//! these tags. Numeric semantics for map, reduce, and time operators live
//! here so the executor and the step debugger evaluate identically; lane
//! generators ([`LaneOp`]) are evaluated by the executor, which owns the
//! seeded RNG for jitter.

use crate::value::Value;

/// The golden angle in radians (`2π(1 − 1/φ)`), used by spiral layouts.
pub const GOLDEN_ANGLE: f32 = 2.399_963_3;

// ── Map operators ──────────────────────────────────────────────────

/// Element-wise operators over one or more inputs.
///
/// Applied per frame for signals and per lane for fields; signal
/// arguments broadcast across lanes. Arity is fixed per operator and
/// validated at lowering time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapOp {
    /// `a + b`, componentwise.
    Add,
    /// `a - b`, componentwise.
    Sub,
    /// `a * b`, componentwise.
    Mul,
    /// `a / b`, componentwise. Division by zero follows IEEE-754.
    Div,
    /// Componentwise minimum.
    Min,
    /// Componentwise maximum.
    Max,
    /// `a + (b - a) * t` with scalar `t`.
    Mix,
    /// Clamp to [0, 1].
    Clamp01,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Square root.
    Sqrt,
    /// Absolute value.
    Abs,
    /// Floor.
    Floor,
    /// Negate.
    Neg,
    /// Wrap into [0, 1) (`rem_euclid(1)`); the phase wrap.
    WrapPhase,
    /// `(radius, angle)` → `vec2(r·cos θ, r·sin θ)`.
    PolarToCartesian,
    /// Pack two scalars into a vec2.
    PackVec2,
    /// Pack four scalars into an RGBA color.
    PackColor,
}

impl MapOp {
    /// Number of inputs the operator consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Clamp01
            | Self::Sin
            | Self::Cos
            | Self::Sqrt
            | Self::Abs
            | Self::Floor
            | Self::Neg
            | Self::WrapPhase => 1,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Min
            | Self::Max
            | Self::PolarToCartesian
            | Self::PackVec2 => 2,
            Self::Mix => 3,
            Self::PackColor => 4,
        }
    }

    /// A short lowercase name for debug output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mix => "mix",
            Self::Clamp01 => "clamp01",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Neg => "neg",
            Self::WrapPhase => "wrap-phase",
            Self::PolarToCartesian => "polar-to-cartesian",
            Self::PackVec2 => "pack-vec2",
            Self::PackColor => "pack-color",
        }
    }

    /// Apply the operator. `args` must match [`MapOp::arity`].
    ///
    /// NaN and infinities propagate per IEEE-754; anomaly detection
    /// happens at the slot write, not here.
    pub fn apply(&self, args: &[Value]) -> Value {
        debug_assert_eq!(args.len(), self.arity(), "{} arity", self.name());
        match self {
            Self::Add => args[0].zip(args[1], |a, b| a + b),
            Self::Sub => args[0].zip(args[1], |a, b| a - b),
            Self::Mul => args[0].zip(args[1], |a, b| a * b),
            Self::Div => args[0].zip(args[1], |a, b| a / b),
            Self::Min => args[0].zip(args[1], f32::min),
            Self::Max => args[0].zip(args[1], f32::max),
            Self::Mix => {
                let t = args[2].x();
                args[0].zip(args[1], |a, b| a + (b - a) * t)
            }
            Self::Clamp01 => args[0].map(|x| x.clamp(0.0, 1.0)),
            Self::Sin => args[0].map(f32::sin),
            Self::Cos => args[0].map(f32::cos),
            Self::Sqrt => args[0].map(f32::sqrt),
            Self::Abs => args[0].map(f32::abs),
            Self::Floor => args[0].map(f32::floor),
            Self::Neg => args[0].map(|x| -x),
            Self::WrapPhase => args[0].map(|x| x.rem_euclid(1.0)),
            Self::PolarToCartesian => {
                let r = args[0].x();
                let theta = args[1].x();
                Value::vec2(r * theta.cos(), r * theta.sin())
            }
            Self::PackVec2 => Value::vec2(args[0].x(), args[1].x()),
            Self::PackColor => Value::vec4(args[0].x(), args[1].x(), args[2].x(), args[3].x()),
        }
    }
}

// ── Reduce operators ───────────────────────────────────────────────

/// Fold a field down to one signal value.
///
/// Reduction is the only legal field→signal crossing; the executor folds
/// lane by lane using `init`/`accum`/`finish`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum of all lanes.
    Sum,
    /// Arithmetic mean; 0 for an empty domain.
    Mean,
    /// Minimum; +∞ for an empty domain.
    Min,
    /// Maximum; −∞ for an empty domain.
    Max,
    /// The lane count itself.
    Count,
}

impl ReduceOp {
    /// The fold's starting accumulator.
    pub fn init(&self) -> f32 {
        match self {
            Self::Sum | Self::Mean | Self::Count => 0.0,
            Self::Min => f32::INFINITY,
            Self::Max => f32::NEG_INFINITY,
        }
    }

    /// Fold one lane value into the accumulator.
    pub fn accum(&self, acc: f32, lane: f32) -> f32 {
        match self {
            Self::Sum | Self::Mean => acc + lane,
            Self::Min => acc.min(lane),
            Self::Max => acc.max(lane),
            Self::Count => acc,
        }
    }

    /// Finish the fold given the lane count.
    pub fn finish(&self, acc: f32, count: usize) -> f32 {
        match self {
            Self::Mean => {
                if count == 0 {
                    0.0
                } else {
                    acc / count as f32
                }
            }
            Self::Count => count as f32,
            _ => acc,
        }
    }

    /// A short lowercase name for debug output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }
}

// ── Lane generators ────────────────────────────────────────────────

/// Per-lane generators: functions of the lane's position and identity.
///
/// Evaluated by the executor, which supplies lane index, lane count,
/// element ID, and any broadcast arguments. Jitter is the only stochastic
/// generator; its stream is seeded from `seed XOR element_id`, so a lane
/// keeps its jitter when the domain resizes around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaneOp {
    /// The lane index as a float.
    Index,
    /// Lane index normalized to [0, 1] (`i / max(count − 1, 1)`).
    Norm01,
    /// `i × golden-angle × scale`. Args: `[scale]`.
    GoldenAngle,
    /// `max_radius × sqrt(norm01(i))`, the area-uniform radial layout.
    /// Args: `[max_radius]`.
    RadiusSqrt,
    /// Deterministic per-element noise in [-amount, amount]. Args:
    /// `[amount, time_term]`. Time is absolute milliseconds scaled by the
    /// block's rate param; see the jitter block's documentation.
    Jitter {
        /// Seed folded with each lane's element ID.
        seed: u64,
    },
}

impl LaneOp {
    /// Number of broadcast arguments the generator consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Index | Self::Norm01 => 0,
            Self::GoldenAngle | Self::RadiusSqrt => 1,
            Self::Jitter { .. } => 2,
        }
    }

    /// A short lowercase name for debug output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Index => "lane-index",
            Self::Norm01 => "lane-norm01",
            Self::GoldenAngle => "golden-angle",
            Self::RadiusSqrt => "radius-sqrt",
            Self::Jitter { .. } => "jitter",
        }
    }
}

// ── Time roots ─────────────────────────────────────────────────────

/// How a time-root block maps absolute frame time to its output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeFn {
    /// Cyclic phase: `(t / period) mod 1`, in [0, 1).
    Phase,
    /// Unbounded ramp: `t / period`.
    Ramp,
}

impl TimeFn {
    /// Evaluate at absolute time `t_abs_ms` with the given period.
    ///
    /// A non-positive period yields 0 rather than an infinity; time roots
    /// are anchors, not anomaly sources.
    pub fn apply(&self, t_abs_ms: f64, period_ms: f64) -> f32 {
        if period_ms <= 0.0 {
            return 0.0;
        }
        let cycles = t_abs_ms / period_ms;
        match self {
            Self::Phase => cycles.rem_euclid(1.0) as f32,
            Self::Ramp => cycles as f32,
        }
    }
}

// ── Render primitives ──────────────────────────────────────────────

/// Instanced primitive emitted by a render-sink block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// A filled disc per instance.
    Disc,
    /// An axis-aligned quad per instance.
    Quad,
    /// A line segment per instance.
    Line,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn polar_to_cartesian_axes() {
        let v = MapOp::PolarToCartesian.apply(&[Value::scalar(2.0), Value::scalar(0.0)]);
        assert_eq!(v, Value::vec2(2.0, 0.0));
        let v = MapOp::PolarToCartesian.apply(&[
            Value::scalar(2.0),
            Value::scalar(std::f32::consts::FRAC_PI_2),
        ]);
        assert!((v.comps()[0]).abs() < 1e-6);
        assert!((v.comps()[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn div_by_zero_propagates() {
        let v = MapOp::Div.apply(&[Value::scalar(1.0), Value::scalar(0.0)]);
        assert!(v.x().is_infinite());
        let v = MapOp::Div.apply(&[Value::scalar(0.0), Value::scalar(0.0)]);
        assert!(v.x().is_nan());
    }

    #[test]
    fn reduce_empty_domains() {
        assert_eq!(ReduceOp::Mean.finish(ReduceOp::Mean.init(), 0), 0.0);
        assert_eq!(ReduceOp::Count.finish(ReduceOp::Count.init(), 0), 0.0);
        assert_eq!(ReduceOp::Sum.finish(ReduceOp::Sum.init(), 0), 0.0);
    }

    #[test]
    fn reduce_mean_of_three() {
        let op = ReduceOp::Mean;
        let mut acc = op.init();
        for lane in [1.0, 2.0, 6.0] {
            acc = op.accum(acc, lane);
        }
        assert_eq!(op.finish(acc, 3), 3.0);
    }

    #[test]
    fn time_phase_wraps() {
        assert_eq!(TimeFn::Phase.apply(4000.0, 4000.0), 0.0);
        assert!((TimeFn::Phase.apply(5000.0, 4000.0) - 0.25).abs() < 1e-6);
        assert_eq!(TimeFn::Phase.apply(100.0, 0.0), 0.0);
    }

    #[test]
    fn time_ramp_is_unbounded() {
        assert!((TimeFn::Ramp.apply(8000.0, 4000.0) - 2.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn wrap_phase_in_range(x in -1000.0f32..1000.0) {
            let v = MapOp::WrapPhase.apply(&[Value::scalar(x)]);
            prop_assert!((0.0..1.0).contains(&v.x()));
        }

        #[test]
        fn phase_in_unit_interval(t in 0.0f64..1e9, period in 1.0f64..1e6) {
            let p = TimeFn::Phase.apply(t, period);
            prop_assert!((0.0..1.0).contains(&p));
        }

        #[test]
        fn reduce_sum_matches_iter(xs in prop::collection::vec(-1e3f32..1e3, 0..64)) {
            let op = ReduceOp::Sum;
            let mut acc = op.init();
            for &x in &xs {
                acc = op.accum(acc, x);
            }
            let expect: f32 = xs.iter().sum();
            prop_assert!((op.finish(acc, xs.len()) - expect).abs() < 1e-2);
        }

        #[test]
        fn reduce_min_max_bound(xs in prop::collection::vec(-1e3f32..1e3, 1..64)) {
            let mut lo = ReduceOp::Min.init();
            let mut hi = ReduceOp::Max.init();
            for &x in &xs {
                lo = ReduceOp::Min.accum(lo, x);
                hi = ReduceOp::Max.accum(hi, x);
            }
            for &x in &xs {
                prop_assert!(lo <= x && x <= hi);
            }
        }
    }
}
