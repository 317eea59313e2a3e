//! The debug index: bidirectional maps between program internals and
//! author-visible identity.
//!
//! Everything the step debugger and the why-not analyzer need to speak
//! in block IDs and display names instead of slot numbers.

use indexmap::IndexMap;

use phosphor_core::id::{BlockId, StateSlotId, ValueSlotId};
use phosphor_graph::edge::PortRef;

/// Bidirectional identity maps for one compiled program.
#[derive(Clone, Debug, Default)]
pub struct DebugIndex {
    /// Block table: index → stable ID. Step and expression attribution
    /// reference this table by index.
    blocks: Vec<BlockId>,
    /// Display names, parallel to `blocks`.
    display_names: Vec<String>,
    /// Output port → the slot carrying its value.
    slot_for_port: IndexMap<PortRef, ValueSlotId>,
    /// Slot → the port whose value it carries (first binding wins; CSE
    /// can alias several ports to one slot).
    port_for_slot: IndexMap<ValueSlotId, PortRef>,
    /// Slot → block-table index of the producing block.
    block_for_slot: IndexMap<ValueSlotId, u32>,
    /// State slot → block-table index of the declaring block.
    block_for_state: IndexMap<StateSlotId, u32>,
}

impl DebugIndex {
    /// Intern a block, returning its table index.
    pub fn intern_block(&mut self, id: &BlockId, display_name: &str) -> u32 {
        if let Some(i) = self.blocks.iter().position(|b| b == id) {
            return i as u32;
        }
        self.blocks.push(id.clone());
        self.display_names.push(display_name.to_string());
        (self.blocks.len() - 1) as u32
    }

    /// Record that a port's value lives in a slot.
    pub fn bind_port(&mut self, port: PortRef, slot: ValueSlotId, block_index: u32) {
        self.slot_for_port.insert(port.clone(), slot);
        self.port_for_slot.entry(slot).or_insert(port);
        self.block_for_slot.entry(slot).or_insert(block_index);
    }

    /// Record a state slot's declaring block.
    pub fn bind_state(&mut self, state: StateSlotId, block_index: u32) {
        self.block_for_state.insert(state, block_index);
    }

    /// The block table index for a stable ID.
    pub fn index_of(&self, id: &BlockId) -> Option<u32> {
        self.blocks.iter().position(|b| b == id).map(|i| i as u32)
    }

    /// The stable ID at a block table index.
    pub fn block_at(&self, index: u32) -> Option<&BlockId> {
        self.blocks.get(index as usize)
    }

    /// The display name at a block table index.
    pub fn display_name_at(&self, index: u32) -> Option<&str> {
        self.display_names.get(index as usize).map(String::as_str)
    }

    /// Find a block index by display name (for human breakpoints).
    pub fn index_by_display_name(&self, name: &str) -> Option<u32> {
        self.display_names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    /// The slot carrying an output port's value.
    pub fn slot_of(&self, port: &PortRef) -> Option<ValueSlotId> {
        self.slot_for_port.get(port).copied()
    }

    /// The port whose value a slot carries.
    pub fn port_of(&self, slot: ValueSlotId) -> Option<&PortRef> {
        self.port_for_slot.get(&slot)
    }

    /// The block that writes a slot.
    pub fn block_of_slot(&self, slot: ValueSlotId) -> Option<&BlockId> {
        self.block_for_slot
            .get(&slot)
            .and_then(|&i| self.block_at(i))
    }

    /// The block that declared a state slot.
    pub fn block_of_state(&self, state: StateSlotId) -> Option<&BlockId> {
        self.block_for_state
            .get(&state)
            .and_then(|&i| self.block_at(i))
    }

    /// All slots written by a block.
    pub fn slots_of_block(&self, id: &BlockId) -> Vec<ValueSlotId> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        self.block_for_slot
            .iter()
            .filter(|(_, &b)| b == index)
            .map(|(&slot, _)| slot)
            .collect()
    }

    /// Number of interned blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
