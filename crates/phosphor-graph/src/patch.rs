//! The patch: the author's whole graph plus its revision counter.
//!
//! Every mutation bumps the revision; the revision labels every compile
//! output and runtime event derived from this graph so observers can
//! check coherence. The structural hash feeds the authoring layer's
//! recompile watcher: revision changes on *any* mutation, the hash only
//! on mutations that can affect compilation.

use indexmap::IndexMap;

use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::id::{BlockId, EdgeId, PortId, Revision};

use crate::block::Block;
use crate::edge::{Edge, EdgeRole, PortRef};
use crate::params::ParamValue;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

#[inline]
fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The author's graph: blocks, edges, revision.
#[derive(Clone, Debug, Default)]
pub struct Patch {
    blocks: IndexMap<BlockId, Block>,
    edges: IndexMap<EdgeId, Edge>,
    revision: Revision,
    next_edge: u64,
}

impl Patch {
    /// An empty patch at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Insert or replace a block. Bumps the revision.
    pub fn add_block(&mut self, block: Block) -> &mut Self {
        self.blocks.insert(block.id.clone(), block);
        self.revision = self.revision.next();
        self
    }

    /// Remove a block and every edge touching it. Bumps the revision.
    pub fn remove_block(&mut self, id: &BlockId) -> Option<Block> {
        let removed = self.blocks.shift_remove(id)?;
        self.edges
            .retain(|_, e| &e.from.block != id && &e.to.block != id);
        self.revision = self.revision.next();
        Some(removed)
    }

    /// Connect an output port to an input port with a user edge.
    /// Bumps the revision and returns the new edge's ID.
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(
            id,
            Edge {
                id,
                from,
                to,
                role: EdgeRole::User,
            },
        );
        self.revision = self.revision.next();
        id
    }

    /// Remove an edge. Bumps the revision.
    pub fn disconnect(&mut self, id: EdgeId) -> Option<Edge> {
        let removed = self.edges.shift_remove(&id)?;
        self.revision = self.revision.next();
        Some(removed)
    }

    /// Set one parameter on a block. Bumps the revision. Returns `false`
    /// if the block does not exist.
    pub fn set_param(&mut self, block: &BlockId, key: &str, value: ParamValue) -> bool {
        match self.blocks.get_mut(block) {
            Some(b) => {
                b.params.set(key, value);
                self.revision = self.revision.next();
                true
            }
            None => false,
        }
    }

    /// Look up a block.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Iterate blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Iterate edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// User edges targeting a given input port, in insertion order.
    pub fn edges_into(&self, block: &BlockId, port: &PortId) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|e| &e.to.block == block && &e.to.port == port)
            .collect()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Patch-level validation: display-name uniqueness.
    ///
    /// Returns one `DuplicateDisplayName` diagnostic per offending block
    /// (the later blocks in insertion order are flagged).
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut seen: IndexMap<&str, &BlockId> = IndexMap::new();
        let mut diags = Vec::new();
        for block in self.blocks.values() {
            if let Some(first) = seen.get(block.display_name.as_str()) {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateDisplayName,
                        format!(
                            "display name '{}' already used by block {first}",
                            block.display_name
                        ),
                    )
                    .on_block(block.id.clone()),
                );
            } else {
                seen.insert(block.display_name.as_str(), &block.id);
            }
        }
        diags
    }

    /// FNV-1a hash of the patch's compile-relevant structure.
    ///
    /// Covers block kinds, params, port state, and edges, but not display
    /// names. The authoring layer debounces on `(revision, hash)` change.
    pub fn structural_hash(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        for block in self.blocks.values() {
            hash = fnv1a_bytes(hash, block.id.0.as_bytes());
            hash = fnv1a_bytes(hash, block.kind.as_bytes());
            for (key, value) in block.params.iter() {
                hash = fnv1a_bytes(hash, key.as_bytes());
                hash = match value {
                    ParamValue::Float(v) => fnv1a_bytes(hash, &v.to_bits().to_le_bytes()),
                    ParamValue::Int(v) => fnv1a_bytes(hash, &v.to_le_bytes()),
                    ParamValue::Bool(v) => fnv1a_bytes(hash, &[u8::from(*v)]),
                    ParamValue::Text(v) | ParamValue::Choice(v) => {
                        fnv1a_bytes(hash, v.as_bytes())
                    }
                };
            }
            for (port, state) in &block.inputs {
                if state.is_default() {
                    continue;
                }
                hash = fnv1a_bytes(hash, port.0.as_bytes());
                hash = fnv1a_bytes(hash, format!("{state:?}").as_bytes());
            }
        }
        for edge in self.edges.values() {
            hash = fnv1a_bytes(hash, edge.from.block.0.as_bytes());
            hash = fnv1a_bytes(hash, edge.from.port.0.as_bytes());
            hash = fnv1a_bytes(hash, edge.to.block.0.as_bytes());
            hash = fnv1a_bytes(hash, edge.to.port.0.as_bytes());
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutations_bump_revision() {
        let mut patch = Patch::new();
        assert_eq!(patch.revision(), Revision(0));
        patch.add_block(Block::new("a", "Const"));
        assert_eq!(patch.revision(), Revision(1));
        patch.add_block(Block::new("b", "Const"));
        let edge = patch.connect(PortRef::new("a", "out"), PortRef::new("b", "in"));
        assert_eq!(patch.revision(), Revision(3));
        patch.disconnect(edge);
        assert_eq!(patch.revision(), Revision(4));
        patch.set_param(&BlockId::from("a"), "value", ParamValue::Float(1.0));
        assert_eq!(patch.revision(), Revision(5));
    }

    #[test]
    fn remove_block_drops_attached_edges() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Const"));
        patch.add_block(Block::new("b", "Add"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("b", "lhs"));
        assert_eq!(patch.edge_count(), 1);
        patch.remove_block(&BlockId::from("a"));
        assert_eq!(patch.edge_count(), 0);
        assert_eq!(patch.block_count(), 1);
    }

    #[test]
    fn duplicate_display_names_flagged() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Const").named("osc"));
        patch.add_block(Block::new("b", "Const").named("osc"));
        let diags = patch.validate();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::DuplicateDisplayName);
        assert_eq!(diags[0].block, Some(BlockId::from("b")));
    }

    #[test]
    fn structural_hash_ignores_display_name() {
        let mut a = Patch::new();
        a.add_block(Block::new("x", "Const"));
        let mut b = Patch::new();
        b.add_block(Block::new("x", "Const").named("pretty"));
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn structural_hash_sees_params_and_edges() {
        let mut a = Patch::new();
        a.add_block(Block::new("x", "Const"));
        let base = a.structural_hash();
        a.set_param(&BlockId::from("x"), "value", ParamValue::Float(2.0));
        let with_param = a.structural_hash();
        assert_ne!(base, with_param);

        a.add_block(Block::new("y", "Add"));
        a.connect(PortRef::new("x", "out"), PortRef::new("y", "lhs"));
        assert_ne!(with_param, a.structural_hash());
    }
}
