//! Type resolution: per-port resolved types and provenance.
//!
//! This is the snapshot the authoring UI consumes: for every port of
//! every user-authored block, the resolved canonical type (declared type
//! with solved cardinality) and where its value comes from.

use indexmap::IndexMap;

use phosphor_core::diag::Diagnostic;
use phosphor_core::id::PortId;
use phosphor_core::ty::{CanonicalType, Cardinality};
use phosphor_graph::edge::{EdgeRole, PortRef};

use super::card::CardMap;
use super::norm::{NormOrigin, NormalizedPatch};

/// Where a port's value comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum Provenance {
    /// An author-drawn edge.
    UserEdge,
    /// A synthesized default source of the given type.
    DefaultSource(CanonicalType),
    /// An inserted unit adapter producing the given type.
    Adapter(CanonicalType),
    /// The port's own block produces the value (output ports).
    Producer,
    /// No source could be established.
    Unresolved,
}

/// One resolved port.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPort {
    /// The resolved type: declared payload and unit, solved cardinality.
    pub ty: CanonicalType,
    /// Where the value comes from.
    pub provenance: Provenance,
}

/// Resolved types for every port, keyed by `(block, port)`.
pub type ResolvedPorts = IndexMap<PortRef, ResolvedPort>;

/// Run type resolution over the normalized patch.
///
/// Synthesized blocks (defaults, adapters) are skipped: they have no
/// author-visible ports. Diagnostics are not produced here: unresolved
/// inputs were already flagged during normalization; this pass just
/// records `Unresolved` provenance for them.
pub fn resolve(
    norm: &NormalizedPatch,
    cards: &CardMap,
    _diagnostics: &mut [Diagnostic],
) -> ResolvedPorts {
    let mut ports = ResolvedPorts::new();

    for block in norm.blocks.values() {
        if block.origin != NormOrigin::User {
            continue;
        }

        for input in &block.def.inputs {
            let port = PortRef {
                block: block.id.clone(),
                port: PortId(input.id.to_string()),
            };
            let edges = norm.edges_into(&block.id, input.id);
            let provenance = match edges.first() {
                None => Provenance::Unresolved,
                Some(edge) => {
                    let source_ty = norm
                        .blocks
                        .get(&edge.from.block)
                        .and_then(|b| b.def.output(&edge.from.port.0))
                        .map(|p| p.ty);
                    match (edge.role, &norm.blocks.get(&edge.from.block)) {
                        (EdgeRole::User, _) => Provenance::UserEdge,
                        (EdgeRole::Default, _) => {
                            Provenance::DefaultSource(source_ty.unwrap_or(input.ty))
                        }
                        (EdgeRole::Adapter, Some(src))
                            if src.origin == NormOrigin::Adapter =>
                        {
                            Provenance::Adapter(source_ty.unwrap_or(input.ty))
                        }
                        // An adapter-role edge whose immediate source is a
                        // user block: the tail of a spliced chain.
                        (EdgeRole::Adapter, _) => Provenance::UserEdge,
                    }
                }
            };

            // The input's cardinality follows its source; the declared
            // payload and unit stand.
            let cardinality = edges
                .first()
                .and_then(|e| cards.output(&e.from))
                .map(|c| match (input.ty.cardinality, c.cardinality) {
                    // A signal flowing into a field-typed input broadcasts.
                    (Cardinality::Field, Cardinality::Signal) => Cardinality::Field,
                    (_, actual) => actual,
                })
                .unwrap_or(input.ty.cardinality);
            ports.insert(
                port,
                ResolvedPort {
                    ty: input.ty.with_cardinality(cardinality),
                    provenance,
                },
            );
        }

        for output in &block.def.outputs {
            let port = PortRef {
                block: block.id.clone(),
                port: PortId(output.id.to_string()),
            };
            let cardinality = cards
                .output(&port)
                .map(|c| c.cardinality)
                .unwrap_or(output.ty.cardinality);
            ports.insert(
                port,
                ResolvedPort {
                    ty: output.ty.with_cardinality(cardinality),
                    provenance: Provenance::Producer,
                },
            );
        }
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_blocks::standard_registry;
    use phosphor_graph::{Block, Patch};

    fn resolved(patch: &Patch) -> ResolvedPorts {
        let mut diags = Vec::new();
        let mut norm =
            super::super::norm::normalize(patch, &standard_registry(), &mut diags);
        super::super::adapt::insert_adapters(
            &mut norm,
            &phosphor_core::AdapterRegistry::standard(),
            &mut diags,
        );
        let cards = super::super::card::solve(&norm, &mut diags);
        resolve(&norm, &cards, &mut diags)
    }

    #[test]
    fn defaulted_input_has_default_provenance() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("sum", "Add"));
        let ports = resolved(&patch);
        let lhs = &ports[&PortRef::new("sum", "lhs")];
        assert!(matches!(lhs.provenance, Provenance::DefaultSource(_)));
    }

    #[test]
    fn user_edge_provenance() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("c", "Const"));
        patch.add_block(Block::new("sum", "Add"));
        patch.connect(PortRef::new("c", "out"), PortRef::new("sum", "lhs"));
        let ports = resolved(&patch);
        assert_eq!(
            ports[&PortRef::new("sum", "lhs")].provenance,
            Provenance::UserEdge
        );
        assert_eq!(
            ports[&PortRef::new("c", "out")].provenance,
            Provenance::Producer
        );
    }

    #[test]
    fn adapter_provenance_reports_adapter_type() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("t", "InfiniteTimeRoot"));
        patch.add_block(Block::new("s", "Sine"));
        patch.connect(PortRef::new("t", "out"), PortRef::new("s", "angle"));
        let ports = resolved(&patch);
        match &ports[&PortRef::new("s", "angle")].provenance {
            Provenance::Adapter(ty) => {
                assert_eq!(ty.unit, Some(phosphor_core::ty::Unit::Radians));
            }
            other => panic!("expected adapter provenance, got {other:?}"),
        }
    }

    #[test]
    fn field_cardinality_resolves_on_ports() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("dots", "Array"));
        patch.add_block(Block::new("idx", "FieldNorm01"));
        patch.add_block(Block::new("neg", "Negate"));
        patch.connect(PortRef::new("dots", "out"), PortRef::new("idx", "domain"));
        patch.connect(PortRef::new("idx", "out"), PortRef::new("neg", "in"));
        let ports = resolved(&patch);
        assert_eq!(
            ports[&PortRef::new("neg", "out")].ty.cardinality,
            Cardinality::Field
        );
        assert_eq!(
            ports[&PortRef::new("neg", "in")].ty.cardinality,
            Cardinality::Field
        );
    }
}
