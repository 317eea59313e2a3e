//! Block definitions and the registry mapping kind → metadata.
//!
//! The registry is pure metadata: port declarations, state declarations,
//! and a closed [`Behavior`] tag per block kind. No behavior binding
//! happens here: the backend lowers behaviors to expressions and the
//! executor evaluates them, both by matching on the tag. This replaces
//! string dispatch with tagged variants; no trait objects are involved.

use indexmap::IndexMap;

use phosphor_core::adapt::UnitConversion;
use phosphor_core::op::{LaneOp, MapOp, PrimitiveKind, ReduceOp, TimeFn};
use phosphor_core::ty::{CanonicalType, Payload};
use phosphor_core::value::Value;

use crate::block::{BlockRole, CombineMode};

/// A synthetic producer for an input port with no user edge.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultSource {
    /// A constant value of the port's declared type.
    Const(Value),
    /// A phase time root with the given period.
    TimeRoot {
        /// Cycle period in milliseconds.
        period_ms: f32,
    },
    /// A domain handle with a fixed lane count.
    DomainCount(u32),
}

/// What a block computes; the closed dispatch vocabulary.
///
/// Expression lowering matches on this tag to emit DAG nodes; the lane
/// evaluator matches on the op tags inside. Adding a block kind means
/// composing these variants, not extending the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Behavior {
    /// Emit the `value` param as a constant.
    Const,
    /// Map absolute frame time through a [`TimeFn`]; period from the
    /// `periodMs` param or the `period` input.
    Time(TimeFn),
    /// Element-wise operator over the block's inputs, in port order.
    Map(MapOp),
    /// Per-lane generator bound to the domain arriving on the block's
    /// `domain` input.
    Lane(LaneOp),
    /// Fold the field input down to a signal.
    Reduce(ReduceOp),
    /// Broadcast the signal input across the domain input's lanes.
    Broadcast,
    /// Read last frame's state, write this frame's input; breaks cycles.
    UnitDelay,
    /// Declare an instance domain; count from the `count` param or input.
    Domain,
    /// A unit conversion inserted by the frontend.
    Adapter(UnitConversion),
    /// Value-neutral fan-in/fan-out; collapsed during normalization.
    Bus,
    /// Emit an instanced render pass.
    Render(PrimitiveKind),
}

/// Declared type and default for one port.
#[derive(Clone, Debug, PartialEq)]
pub struct PortDef {
    /// Port identity, unique per block kind.
    pub id: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Declared canonical type.
    pub ty: CanonicalType,
    /// Default source used when no user edge targets the port.
    pub default: Option<DefaultSource>,
    /// Declared merge strategy for multiple incoming edges.
    pub combine: CombineMode,
}

impl PortDef {
    /// A port with no default and `Single` combine.
    pub fn required(id: &'static str, label: &'static str, ty: CanonicalType) -> Self {
        Self {
            id,
            label,
            ty,
            default: None,
            combine: CombineMode::Single,
        }
    }

    /// Builder-style default source.
    pub fn with_default(mut self, default: DefaultSource) -> Self {
        self.default = Some(default);
        self
    }

    /// Builder-style combine mode.
    pub fn with_combine(mut self, combine: CombineMode) -> Self {
        self.combine = combine;
        self
    }
}

/// Persistence class of a declared state slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKind {
    /// One persistent value.
    Scalar,
    /// One persistent value per lane of the bound instance.
    FieldLane,
}

/// A state slot declared by a block definition.
///
/// The `role_tag` is the per-block suffix of the stable state ID
/// (`"{block_id}/{role_tag}"`), which is what hot-swap migration matches
/// on, never the slot index.
#[derive(Clone, Debug, PartialEq)]
pub struct StateDecl {
    /// Per-block role suffix of the stable state ID.
    pub role_tag: &'static str,
    /// Scalar or per-lane persistence.
    pub kind: StateKind,
    /// Payload of the stored value(s).
    pub payload: Payload,
    /// Initial value for fresh slots and fresh lanes.
    pub initial: Value,
}

/// Full definition of a block kind.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDef {
    /// The kind name, unique per registry.
    pub kind: &'static str,
    /// Structural role instances of this kind take.
    pub role: BlockRole,
    /// Input ports, in declaration order.
    pub inputs: Vec<PortDef>,
    /// Output ports, in declaration order.
    pub outputs: Vec<PortDef>,
    /// Declared persistent state.
    pub states: Vec<StateDecl>,
    /// What the block computes.
    pub behavior: Behavior,
}

impl BlockDef {
    /// Look up an input port by ID.
    pub fn input(&self, id: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Look up an output port by ID.
    pub fn output(&self, id: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// The registry: block kind → definition.
///
/// The registry is the sole authority on port existence and declared
/// types. The compiler consults it for every block instance and emits a
/// diagnostic if an instance references an unregistered kind.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    defs: IndexMap<&'static str, BlockDef>,
}

impl BlockRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Later registrations replace earlier ones
    /// for the same kind.
    pub fn register(&mut self, def: BlockDef) {
        self.defs.insert(def.kind, def);
    }

    /// Look up a definition by kind.
    pub fn get(&self, kind: &str) -> Option<&BlockDef> {
        self.defs.get(kind)
    }

    /// Iterate definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockDef> {
        self.defs.values()
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_core::ty::Unit;

    fn const_def() -> BlockDef {
        BlockDef {
            kind: "Const",
            role: BlockRole::Normal,
            inputs: vec![],
            outputs: vec![PortDef::required(
                "out",
                "Value",
                CanonicalType::signal(Payload::Float, Some(Unit::Scalar)),
            )],
            states: vec![],
            behavior: Behavior::Const,
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = BlockRegistry::new();
        reg.register(const_def());
        let def = reg.get("Const").unwrap();
        assert!(def.output("out").is_some());
        assert!(def.output("missing").is_none());
        assert!(reg.get("Unknown").is_none());
    }

    #[test]
    fn later_registration_replaces() {
        let mut reg = BlockRegistry::new();
        reg.register(const_def());
        let mut replacement = const_def();
        replacement.outputs[0].label = "Constant";
        reg.register(replacement);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("Const").unwrap().outputs[0].label, "Constant");
    }
}
