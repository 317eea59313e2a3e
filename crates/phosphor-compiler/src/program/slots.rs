//! Slot tables: per-frame value slots and persistent state slots.

use phosphor_core::id::{BlockId, InstanceId, StateId, StateSlotId, ValueSlotId};
use phosphor_core::ty::{Cardinality, Payload};
use phosphor_core::value::Value;

/// Persistence class of a state slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateSlotKind {
    /// One persistent scalar.
    Scalar,
    /// One persistent value per lane of the bound instance.
    FieldLane,
}

/// A per-frame value slot. Re-initialized every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueSlotDef {
    /// The slot's index.
    pub id: ValueSlotId,
    /// Payload stored in the slot.
    pub payload: Payload,
    /// Signal (one value) or field (a lane buffer).
    pub cardinality: Cardinality,
    /// The instance a field slot is bound to.
    pub instance: Option<InstanceId>,
}

/// A persistent state slot. Survives frames; identity survives programs.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSlotDef {
    /// The slot's program-local index.
    pub id: StateSlotId,
    /// Stable cross-program identity (`"{block_id}/{role_tag}"`).
    pub state_id: StateId,
    /// Scalar or per-lane.
    pub kind: StateSlotKind,
    /// Payload of the stored value(s).
    pub payload: Payload,
    /// The instance a per-lane slot is bound to.
    pub instance: Option<InstanceId>,
    /// Initial value for fresh slots and fresh lanes.
    pub initial: Value,
    /// The block that declared the state, for debug attribution.
    pub block: BlockId,
}

/// The two parallel slot arenas of a compiled program.
#[derive(Clone, Debug, Default)]
pub struct SlotTable {
    /// Per-frame value slots, indexed by [`ValueSlotId`].
    pub values: Vec<ValueSlotDef>,
    /// Persistent state slots, indexed by [`StateSlotId`].
    pub states: Vec<StateSlotDef>,
}

impl SlotTable {
    /// Look up a value slot definition.
    pub fn value(&self, id: ValueSlotId) -> Option<&ValueSlotDef> {
        self.values.get(id.0 as usize)
    }

    /// Look up a state slot definition.
    pub fn state(&self, id: StateSlotId) -> Option<&StateSlotDef> {
        self.states.get(id.0 as usize)
    }

    /// Find a state slot by its stable identity.
    pub fn state_by_id(&self, state_id: &StateId) -> Option<&StateSlotDef> {
        self.states.iter().find(|s| &s.state_id == state_id)
    }
}
