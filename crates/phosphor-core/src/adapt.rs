//! Unit conversions and the adapter registry.
//!
//! The frontend inserts adapter blocks wherever an edge connects ports
//! whose types differ only in unit. [`AdapterRegistry`] holds the table of
//! single-hop conversions keyed by `(payload, from, to)`;
//! [`AdapterRegistry::find_path`] discovers multi-hop chains by
//! breadth-first search over that table.

use indexmap::IndexMap;

use crate::ty::{Payload, Unit};

/// A single-hop unit conversion with exact numeric semantics.
///
/// Conversions apply componentwise to every payload component. Each
/// variant is its own inverse's partner; the registry records direction
/// explicitly, so `apply` never branches on direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitConversion {
    /// radians → degrees (`x * 180 / π`).
    RadiansToDegrees,
    /// degrees → radians (`x * π / 180`).
    DegreesToRadians,
    /// phase01 → radians (`x * 2π`).
    Phase01ToRadians,
    /// radians → phase01 (`x / 2π`, wrapped to [0, 1)).
    RadiansToPhase01,
    /// norm01 → scalar (identity reinterpretation).
    Norm01ToScalar,
    /// scalar → norm01 (clamped to [0, 1]).
    ScalarToNorm01,
    /// milliseconds → scalar seconds (`x / 1000`).
    MillisecondsToScalar,
}

impl UnitConversion {
    /// The unit this conversion consumes.
    pub fn from_unit(&self) -> Unit {
        match self {
            Self::RadiansToDegrees | Self::RadiansToPhase01 => Unit::Radians,
            Self::DegreesToRadians => Unit::Degrees,
            Self::Phase01ToRadians => Unit::Phase01,
            Self::Norm01ToScalar => Unit::Norm01,
            Self::ScalarToNorm01 => Unit::Scalar,
            Self::MillisecondsToScalar => Unit::Milliseconds,
        }
    }

    /// The unit this conversion produces.
    pub fn to_unit(&self) -> Unit {
        match self {
            Self::RadiansToDegrees => Unit::Degrees,
            Self::DegreesToRadians | Self::Phase01ToRadians => Unit::Radians,
            Self::RadiansToPhase01 => Unit::Phase01,
            Self::Norm01ToScalar | Self::MillisecondsToScalar => Unit::Scalar,
            Self::ScalarToNorm01 => Unit::Norm01,
        }
    }

    /// Apply the conversion to one component.
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Self::RadiansToDegrees => x.to_degrees(),
            Self::DegreesToRadians => x.to_radians(),
            Self::Phase01ToRadians => x * std::f32::consts::TAU,
            Self::RadiansToPhase01 => (x / std::f32::consts::TAU).rem_euclid(1.0),
            Self::Norm01ToScalar => x,
            Self::ScalarToNorm01 => x.clamp(0.0, 1.0),
            Self::MillisecondsToScalar => x / 1000.0,
        }
    }
}

/// Key of a single-hop conversion: payload plus unit endpoints.
type AdapterKey = (Payload, Unit, Unit);

/// Table of registered unit conversions.
///
/// Keyed by `(payload, from, to)`. [`AdapterRegistry::standard`] registers
/// the built-in conversions for every float-like payload; domain-specific
/// registries can extend the table before compilation.
#[derive(Clone, Debug)]
pub struct AdapterRegistry {
    table: IndexMap<AdapterKey, UnitConversion>,
}

/// Payloads that participate in the standard conversion table.
const CONVERTIBLE: [Payload; 3] = [Payload::Float, Payload::Phase, Payload::Vec2];

impl AdapterRegistry {
    /// An empty registry with no conversions.
    pub fn empty() -> Self {
        Self {
            table: IndexMap::new(),
        }
    }

    /// The standard registry: angle, phase, and normalization conversions
    /// for float-like payloads.
    pub fn standard() -> Self {
        let mut reg = Self::empty();
        for payload in CONVERTIBLE {
            reg.register(payload, UnitConversion::RadiansToDegrees);
            reg.register(payload, UnitConversion::DegreesToRadians);
            reg.register(payload, UnitConversion::Phase01ToRadians);
            reg.register(payload, UnitConversion::RadiansToPhase01);
            reg.register(payload, UnitConversion::Norm01ToScalar);
            reg.register(payload, UnitConversion::ScalarToNorm01);
            reg.register(payload, UnitConversion::MillisecondsToScalar);
        }
        reg
    }

    /// Register a conversion for a payload. Later registrations replace
    /// earlier ones for the same key.
    pub fn register(&mut self, payload: Payload, conv: UnitConversion) {
        self.table
            .insert((payload, conv.from_unit(), conv.to_unit()), conv);
    }

    /// Look up a single-hop conversion.
    pub fn direct(&self, payload: Payload, from: Unit, to: Unit) -> Option<UnitConversion> {
        self.table.get(&(payload, from, to)).copied()
    }

    /// Find the shortest conversion chain from `from` to `to`.
    ///
    /// Returns `None` if no chain exists. A `from == to` request returns
    /// an empty chain. Breadth-first, so the result is minimal in hops;
    /// ties break on registration order for determinism.
    pub fn find_path(&self, payload: Payload, from: Unit, to: Unit) -> Option<Vec<UnitConversion>> {
        if from == to {
            return Some(Vec::new());
        }

        // BFS frontier of (unit, chain-so-far). The unit space is tiny, so
        // a Vec-backed visited set is fine.
        let mut visited = vec![from];
        let mut frontier = vec![(from, Vec::new())];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (unit, chain) in frontier {
                for (&(p, f, t), &conv) in &self.table {
                    if p != payload || f != unit || visited.contains(&t) {
                        continue;
                    }
                    let mut extended = chain.clone();
                    extended.push(conv);
                    if t == to {
                        return Some(extended);
                    }
                    visited.push(t);
                    next.push((t, extended));
                }
            }
            frontier = next;
        }
        None
    }

    /// Whether a value of unit `from` can reach unit `to` at this payload.
    pub fn adaptable(&self, payload: Payload, from: Unit, to: Unit) -> bool {
        self.find_path(payload, from, to).is_some()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn direct_hop_found() {
        let reg = AdapterRegistry::standard();
        let path = reg
            .find_path(Payload::Float, Unit::Radians, Unit::Degrees)
            .unwrap();
        assert_eq!(path, vec![UnitConversion::RadiansToDegrees]);
    }

    #[test]
    fn identity_path_is_empty() {
        let reg = AdapterRegistry::standard();
        let path = reg
            .find_path(Payload::Float, Unit::Scalar, Unit::Scalar)
            .unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn multi_hop_degrees_to_phase01() {
        // degrees → radians → phase01: no direct entry exists.
        let reg = AdapterRegistry::standard();
        let path = reg
            .find_path(Payload::Float, Unit::Degrees, Unit::Phase01)
            .unwrap();
        assert_eq!(
            path,
            vec![
                UnitConversion::DegreesToRadians,
                UnitConversion::RadiansToPhase01,
            ]
        );
    }

    #[test]
    fn unreachable_unit_is_none() {
        let reg = AdapterRegistry::standard();
        assert!(reg
            .find_path(Payload::Float, Unit::Scalar, Unit::Milliseconds)
            .is_none());
    }

    #[test]
    fn unknown_payload_has_no_paths() {
        let reg = AdapterRegistry::standard();
        assert!(reg
            .find_path(Payload::Int, Unit::Radians, Unit::Degrees)
            .is_none());
    }

    #[test]
    fn path_endpoints_compose() {
        let reg = AdapterRegistry::standard();
        let path = reg
            .find_path(Payload::Float, Unit::Degrees, Unit::Phase01)
            .unwrap();
        assert_eq!(path.first().unwrap().from_unit(), Unit::Degrees);
        assert_eq!(path.last().unwrap().to_unit(), Unit::Phase01);
        for pair in path.windows(2) {
            assert_eq!(pair[0].to_unit(), pair[1].from_unit());
        }
    }

    proptest! {
        #[test]
        fn angle_round_trip_is_close(x in -1000.0f32..1000.0) {
            let there = UnitConversion::RadiansToDegrees.apply(x);
            let back = UnitConversion::DegreesToRadians.apply(there);
            prop_assert!((back - x).abs() <= x.abs() * 1e-5 + 1e-4);
        }

        #[test]
        fn radians_to_phase01_in_range(x in -1000.0f32..1000.0) {
            let p = UnitConversion::RadiansToPhase01.apply(x);
            prop_assert!((0.0..1.0).contains(&p));
        }

        #[test]
        fn scalar_to_norm01_clamps(x in -10.0f32..10.0) {
            let n = UnitConversion::ScalarToNorm01.apply(x);
            prop_assert!((0.0..=1.0).contains(&n));
        }
    }
}
