//! Strongly-typed identifiers used across the compile and execute pipeline.
//!
//! Two families live here. Author-facing identity (`BlockId`, `PortId`,
//! `StateId`) is string-keyed and stable across recompiles; it is what
//! hot-swap state migration matches on. Program-internal identity
//! (`ExprId`, slot and instance IDs) is a dense index valid only within
//! one [`CompiledProgram`](https://docs.rs/phosphor-compiler) and is
//! reassigned on every compile.

use std::fmt;

/// Identifies a block within a patch.
///
/// Assigned by the authoring layer and never reused; synthesized blocks
/// (default sources, adapters) derive their IDs from the target block and
/// port so they too are stable across recompiles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub String);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for BlockId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Identifies a port on a block. Unique per block, not globally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub String);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PortId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for PortId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Identifies an edge within a patch. Allocated monotonically by the
/// patch and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge{}", self.0)
    }
}

impl From<u64> for EdgeId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Stable, content-addressed identity of a state slot.
///
/// Formed as `"{block_id}/{role_tag}"` where the role tag is declared by
/// the block definition (e.g. `"phase-accumulator"`). Because it derives
/// from the author-visible block ID rather than a slot index, state keyed
/// by `StateId` survives recompiles that reorder or renumber slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub String);

impl StateId {
    /// Derive the state ID for a block's declared state role.
    pub fn derive(block: &BlockId, role_tag: &str) -> Self {
        Self(format!("{}/{role_tag}", block.0))
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a value-expression node within a compiled program's DAG.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<u32> for ExprId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a per-frame value slot. Reassigned on every compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueSlotId(pub u32);

impl fmt::Display for ValueSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for ValueSlotId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a persistent state slot within one program.
///
/// The index is program-local; cross-program identity goes through the
/// slot's [`StateId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateSlotId(pub u32);

impl fmt::Display for StateSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<u32> for StateSlotId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of an instance domain within one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl From<u32> for InstanceId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Stable per-element identity within an instance domain.
///
/// Assigned by the author where the domain block supports it, otherwise
/// synthesized monotonically by the session's lane table. Element IDs are
/// what lane continuity preserves across domain resizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ElementId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonic patch revision counter.
///
/// Incremented on every author mutation; labels every compile output and
/// runtime event so observers can match them to the patch they came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(pub u64);

impl Revision {
    /// Return the next revision.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies one compile invocation, for pairing start/end events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompileId(pub u64);

impl fmt::Display for CompileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<u64> for CompileId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_id_derivation_is_stable() {
        let block = BlockId::from("osc-1");
        let a = StateId::derive(&block, "phase-accumulator");
        let b = StateId::derive(&block, "phase-accumulator");
        assert_eq!(a, b);
        assert_eq!(a.0, "osc-1/phase-accumulator");
    }

    #[test]
    fn state_ids_differ_by_role() {
        let block = BlockId::from("osc-1");
        assert_ne!(
            StateId::derive(&block, "phase-accumulator"),
            StateId::derive(&block, "hold"),
        );
    }

    #[test]
    fn revision_next_is_monotonic() {
        let r = Revision(41);
        assert_eq!(r.next(), Revision(42));
        assert!(r < r.next());
    }
}
