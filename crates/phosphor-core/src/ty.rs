//! The canonical type algebra: payload × unit × cardinality.
//!
//! Every port, expression, and slot in the pipeline carries a
//! [`CanonicalType`]. Two types are *equal* iff payload, unit, and
//! cardinality all match; they are *adaptable* iff a unit-conversion path
//! exists between their units at the same payload and cardinality (see
//! [`crate::adapt`]).

use std::fmt;

/// Tag for opaque object payloads.
///
/// Object payloads never materialize into lane buffers; they exist so
/// compile-time handles (domains) flow through the type checker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A handle to an instance domain, produced by domain blocks.
    DomainHandle,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomainHandle => write!(f, "domain"),
        }
    }
}

/// Classification of a value's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Payload {
    /// A single floating-point number.
    Float,
    /// An integer, stored exactly in an f32 component for |v| ≤ 2²⁴.
    Int,
    /// An RGBA color, four components in [0, 1].
    Color,
    /// A 2-component vector.
    Vec2,
    /// A 3-component vector.
    Vec3,
    /// A 4-component vector.
    Vec4,
    /// A cyclic phase value, conventionally in [0, 1).
    Phase,
    /// A categorical value; `n_values` is the number of categories.
    Enum {
        /// Number of possible categories.
        n_values: u32,
    },
    /// An opaque object handle; never buffered.
    Object {
        /// What the handle refers to.
        kind: ObjectKind,
    },
}

impl Payload {
    /// Number of f32 storage components this payload occupies per value.
    ///
    /// Object payloads return 0: they are compile-time-only and cannot be
    /// materialized into a lane buffer.
    pub fn components(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Phase | Self::Enum { .. } => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Color | Self::Vec4 => 4,
            Self::Object { .. } => 0,
        }
    }

    /// Whether values of this payload can live in a lane buffer.
    pub fn is_bufferable(&self) -> bool {
        self.components() > 0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::Color => write!(f, "color"),
            Self::Vec2 => write!(f, "vec2"),
            Self::Vec3 => write!(f, "vec3"),
            Self::Vec4 => write!(f, "vec4"),
            Self::Phase => write!(f, "phase"),
            Self::Enum { n_values } => write!(f, "enum<{n_values}>"),
            Self::Object { kind } => write!(f, "object<{kind}>"),
        }
    }
}

/// Unit annotation constraining a value's interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    /// One cycle maps to [0, 1).
    Phase01,
    /// Angle in radians.
    Radians,
    /// Angle in degrees.
    Degrees,
    /// Dimensionless scalar.
    Scalar,
    /// Normalized magnitude in [0, 1].
    Norm01,
    /// Time in milliseconds.
    Milliseconds,
    /// A lane or element count.
    Count,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phase01 => write!(f, "phase01"),
            Self::Radians => write!(f, "radians"),
            Self::Degrees => write!(f, "degrees"),
            Self::Scalar => write!(f, "scalar"),
            Self::Norm01 => write!(f, "norm01"),
            Self::Milliseconds => write!(f, "ms"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// How many values a port carries per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// One value per frame.
    Signal,
    /// N values per frame, bound to an instance domain.
    Field,
    /// Present only on frames where the event fired.
    Event,
    /// A compile-time constant (e.g. a domain handle).
    Static,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => write!(f, "signal"),
            Self::Field => write!(f, "field"),
            Self::Event => write!(f, "event"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// A fully-resolved type: payload, optional unit, cardinality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalType {
    /// The payload classification.
    pub payload: Payload,
    /// Optional unit constraint. `None` means uninterpreted.
    pub unit: Option<Unit>,
    /// One value per frame, N values, event, or compile-time constant.
    pub cardinality: Cardinality,
}

impl CanonicalType {
    /// A signal type with the given payload and unit.
    pub fn signal(payload: Payload, unit: Option<Unit>) -> Self {
        Self {
            payload,
            unit,
            cardinality: Cardinality::Signal,
        }
    }

    /// A field type with the given payload and unit.
    pub fn field(payload: Payload, unit: Option<Unit>) -> Self {
        Self {
            payload,
            unit,
            cardinality: Cardinality::Field,
        }
    }

    /// The static domain-handle type produced by domain blocks.
    pub fn domain() -> Self {
        Self {
            payload: Payload::Object {
                kind: ObjectKind::DomainHandle,
            },
            unit: None,
            cardinality: Cardinality::Static,
        }
    }

    /// Return the same type with the cardinality replaced.
    pub fn with_cardinality(self, cardinality: Cardinality) -> Self {
        Self {
            cardinality,
            ..self
        }
    }

    /// Return the same type with the unit replaced.
    pub fn with_unit(self, unit: Option<Unit>) -> Self {
        Self { unit, ..self }
    }

    /// Whether `self` and `other` differ only in unit.
    ///
    /// This is the precondition for unit adaptation: payload and
    /// cardinality must already agree.
    pub fn unit_adaptable_shape(&self, other: &Self) -> bool {
        self.payload == other.payload && self.cardinality == other.cardinality
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Some(unit) => write!(f, "{}:{unit}@{}", self.payload, self.cardinality),
            None => write!(f, "{}@{}", self.payload, self.cardinality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_widths() {
        assert_eq!(Payload::Float.components(), 1);
        assert_eq!(Payload::Phase.components(), 1);
        assert_eq!(Payload::Vec2.components(), 2);
        assert_eq!(Payload::Vec3.components(), 3);
        assert_eq!(Payload::Color.components(), 4);
        assert_eq!(Payload::Vec4.components(), 4);
        assert_eq!(Payload::Enum { n_values: 7 }.components(), 1);
        assert_eq!(
            Payload::Object {
                kind: ObjectKind::DomainHandle
            }
            .components(),
            0
        );
    }

    #[test]
    fn equality_requires_all_three() {
        let a = CanonicalType::signal(Payload::Float, Some(Unit::Radians));
        assert_eq!(a, CanonicalType::signal(Payload::Float, Some(Unit::Radians)));
        assert_ne!(a, CanonicalType::signal(Payload::Float, Some(Unit::Degrees)));
        assert_ne!(a, CanonicalType::field(Payload::Float, Some(Unit::Radians)));
        assert_ne!(a, CanonicalType::signal(Payload::Int, Some(Unit::Radians)));
    }

    #[test]
    fn adaptable_shape_ignores_unit() {
        let a = CanonicalType::signal(Payload::Float, Some(Unit::Radians));
        let b = CanonicalType::signal(Payload::Float, Some(Unit::Degrees));
        let c = CanonicalType::field(Payload::Float, Some(Unit::Degrees));
        assert!(a.unit_adaptable_shape(&b));
        assert!(!a.unit_adaptable_shape(&c));
    }

    #[test]
    fn display_is_compact() {
        let t = CanonicalType::field(Payload::Vec2, Some(Unit::Norm01));
        assert_eq!(t.to_string(), "vec2:norm01@field");
        assert_eq!(CanonicalType::domain().to_string(), "object<domain>@static");
    }
}
