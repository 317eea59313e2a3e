//! Block instances and per-input port state.

use indexmap::IndexMap;
use phosphor_core::adapt::UnitConversion;
use phosphor_core::id::{BlockId, PortId};

use crate::params::Params;
use crate::registry::DefaultSource;

/// Structural role of a block within a patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockRole {
    /// An ordinary value-producing block.
    #[default]
    Normal,
    /// A time root: the patch's animation clock anchor.
    TimeRoot,
    /// A value-neutral fan-in/fan-out node, collapsed by the frontend.
    Bus,
}

/// How multiple incoming edges on one input port are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombineMode {
    /// Exactly one source; more than one user edge is an error.
    #[default]
    Single,
    /// Sources are summed.
    Sum,
    /// Sources are multiplied.
    Product,
    /// The first edge in insertion order wins.
    First,
}

/// Author-configured state of one input port.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputPortState {
    /// Merge strategy when several edges target this port. `None` means
    /// the registry's declared mode applies.
    pub combine: Option<CombineMode>,
    /// Per-port override of the registry-declared default source.
    pub default_override: Option<DefaultSource>,
    /// Author-configured unit lenses, applied before automatic adapter
    /// discovery, in order.
    pub lenses: Vec<UnitConversion>,
}

impl InputPortState {
    /// Whether the author has customized anything on this port.
    pub fn is_default(&self) -> bool {
        self.combine.is_none() && self.default_override.is_none() && self.lenses.is_empty()
    }
}

/// One block instance in a patch.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Stable author-assigned identity.
    pub id: BlockId,
    /// The block kind, resolved against the registry.
    pub kind: String,
    /// Unique human-readable name.
    pub display_name: String,
    /// Authored parameters.
    pub params: Params,
    /// Per-input port state, keyed by port ID. Ports with default state
    /// may be absent.
    pub inputs: IndexMap<PortId, InputPortState>,
    /// Structural role.
    pub role: BlockRole,
}

impl Block {
    /// Create a block with default port state and a display name equal to
    /// its ID.
    pub fn new(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = id.0.clone();
        Self {
            id,
            kind: kind.into(),
            display_name,
            params: Params::new(),
            inputs: IndexMap::new(),
            role: BlockRole::Normal,
        }
    }

    /// Builder-style display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Builder-style params.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Builder-style role.
    pub fn with_role(mut self, role: BlockRole) -> Self {
        self.role = role;
        self
    }

    /// The effective state of an input port (default if untouched).
    pub fn input_state(&self, port: &PortId) -> InputPortState {
        self.inputs.get(port).cloned().unwrap_or_default()
    }
}
