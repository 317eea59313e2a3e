//! Edges: directed port-to-port connections.

use std::fmt;

use phosphor_core::id::{BlockId, EdgeId, PortId};

/// A `(block, port)` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// The block.
    pub block: BlockId,
    /// The port on that block.
    pub port: PortId,
}

impl PortRef {
    /// Build an endpoint.
    pub fn new(block: impl Into<BlockId>, port: impl Into<PortId>) -> Self {
        Self {
            block: block.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block, self.port)
    }
}

/// Who created an edge.
///
/// Only `User` edges are author-visible; the frontend inserts `Default`
/// and `Adapter` edges during normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeRole {
    /// Authored connection.
    #[default]
    User,
    /// Connects a synthesized default-source block to its target port.
    Default,
    /// Connects through an inserted unit-adapter block.
    Adapter,
}

/// A directed connection from an output port to an input port.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    /// Identity within the patch.
    pub id: EdgeId,
    /// Source output port.
    pub from: PortRef,
    /// Target input port.
    pub to: PortRef,
    /// Who created the edge.
    pub role: EdgeRole,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
