//! Adapter insertion: unit lenses and discovered conversion chains.
//!
//! For every edge whose endpoint types differ in unit (same payload,
//! cardinality handled later), this pass splices in a chain of adapter
//! blocks carrying [`Behavior::Adapter`]. Author lenses on the target
//! port run first; the remaining gap is closed by
//! [`AdapterRegistry::find_path`]. Irreconcilable payloads or units are
//! flagged `TypeMismatch` and the edge is left in place so downstream
//! passes still see the topology.

use indexmap::IndexMap;

use phosphor_core::adapt::{AdapterRegistry, UnitConversion};
use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::id::{BlockId, PortId};
use phosphor_core::ty::{CanonicalType, Cardinality};
use phosphor_graph::block::BlockRole;
use phosphor_graph::edge::{EdgeRole, PortRef};
use phosphor_graph::params::Params;
use phosphor_graph::registry::{Behavior, BlockDef, PortDef};

use super::norm::{NormBlock, NormEdge, NormOrigin, NormalizedPatch};

/// The declared type of an output port in the normalized patch.
fn output_type(norm: &NormalizedPatch, port: &PortRef) -> Option<CanonicalType> {
    norm.blocks
        .get(&port.block)?
        .def
        .output(&port.port.0)
        .map(|p| p.ty)
}

/// The declared type of an input port in the normalized patch.
fn input_type(norm: &NormalizedPatch, port: &PortRef) -> Option<CanonicalType> {
    norm.blocks
        .get(&port.block)?
        .def
        .input(&port.port.0)
        .map(|p| p.ty)
}

/// Build the adapter block for one conversion hop.
fn adapter_block(id: BlockId, conv: UnitConversion, ty: CanonicalType) -> NormBlock {
    let def = BlockDef {
        kind: "#adapter",
        role: BlockRole::Normal,
        inputs: vec![PortDef::required(
            "in",
            "In",
            ty.with_unit(Some(conv.from_unit())),
        )],
        outputs: vec![PortDef::required(
            "out",
            "Out",
            ty.with_unit(Some(conv.to_unit())),
        )],
        states: vec![],
        behavior: Behavior::Adapter(conv),
    };
    NormBlock {
        display_name: id.0.clone(),
        id,
        def,
        params: Params::new(),
        lenses: IndexMap::new(),
        role: BlockRole::Normal,
        origin: NormOrigin::Adapter,
    }
}

/// Splice a conversion chain into one edge, returning the new blocks and
/// the rewritten edge list segment. `ordinal` disambiguates parallel
/// edges between the same port pair.
fn splice(
    edge: &NormEdge,
    ordinal: usize,
    chain: &[UnitConversion],
    base_ty: CanonicalType,
) -> (Vec<NormBlock>, Vec<NormEdge>) {
    let mut blocks = Vec::new();
    let mut edges = Vec::new();
    let mut upstream = edge.from.clone();
    for (i, conv) in chain.iter().enumerate() {
        let id = BlockId(format!(
            "{}.{}->{}.{}#adapt{ordinal}.{i}",
            edge.from.block, edge.from.port, edge.to.block, edge.to.port
        ));
        let block = adapter_block(id.clone(), *conv, base_ty);
        edges.push(NormEdge {
            from: upstream,
            to: PortRef {
                block: id.clone(),
                port: PortId("in".to_string()),
            },
            role: if i == 0 { edge.role } else { EdgeRole::Adapter },
            source_edge: edge.source_edge,
        });
        upstream = PortRef {
            block: id.clone(),
            port: PortId("out".to_string()),
        };
        blocks.push(block);
    }
    edges.push(NormEdge {
        from: upstream,
        to: edge.to.clone(),
        role: EdgeRole::Adapter,
        source_edge: edge.source_edge,
    });
    (blocks, edges)
}

/// Run the adapter pass over the normalized patch, in place.
pub fn insert_adapters(
    norm: &mut NormalizedPatch,
    adapters: &AdapterRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut new_blocks: Vec<NormBlock> = Vec::new();
    let mut new_edges: Vec<NormEdge> = Vec::new();

    let old_edges = std::mem::take(&mut norm.edges);
    for (ordinal, edge) in old_edges.iter().enumerate() {
        let (Some(from_ty), Some(to_ty)) = (output_type(norm, &edge.from), input_type(norm, &edge.to))
        else {
            // A dangling endpoint: the port does not exist on the block's
            // definition. Attributed to the edge; topology dropped.
            let mut diag = Diagnostic::new(
                DiagnosticKind::UnresolvedInput,
                format!("edge references a port that does not exist: {} -> {}", edge.from, edge.to),
            );
            if let Some(id) = edge.source_edge {
                diag = diag.on_edge(id);
            }
            diagnostics.push(diag);
            continue;
        };

        // Author lenses run first, then the discovered chain closes the
        // remaining unit gap. Cardinality is solved by the next pass, so
        // comparison here is shape- and unit-only.
        let lens_chain: Vec<UnitConversion> = norm
            .blocks
            .get(&edge.to.block)
            .and_then(|b| b.lenses.get(&edge.to.port.0).cloned())
            .unwrap_or_default();

        let mut current_unit = from_ty.unit;
        let mut chain = Vec::new();
        for conv in lens_chain {
            if current_unit == Some(conv.from_unit()) {
                chain.push(conv);
                current_unit = Some(conv.to_unit());
            }
            // A lens that does not apply at the current unit is skipped;
            // the discovered chain below picks up the slack.
        }

        if from_ty.payload != to_ty.payload {
            let mut diag = Diagnostic::new(
                DiagnosticKind::TypeMismatch {
                    from: from_ty,
                    to: to_ty,
                },
                format!("cannot connect {from_ty} to {to_ty}"),
            );
            if let Some(id) = edge.source_edge {
                diag = diag.on_edge(id);
            }
            diagnostics.push(
                diag.on_port(edge.to.block.clone(), edge.to.port.clone()),
            );
            new_edges.push(edge.clone());
            continue;
        }

        match (current_unit, to_ty.unit) {
            (a, b) if a == b => {
                if chain.is_empty() {
                    new_edges.push(edge.clone());
                } else {
                    let (blocks, edges) = splice(
                        edge,
                        ordinal,
                        &chain,
                        from_ty.with_cardinality(Cardinality::Signal),
                    );
                    new_blocks.extend(blocks);
                    new_edges.extend(edges);
                }
            }
            (Some(from_unit), Some(to_unit)) => {
                match adapters.find_path(from_ty.payload, from_unit, to_unit) {
                    Some(found) => {
                        chain.extend(found);
                        let (blocks, edges) = splice(
                            edge,
                            ordinal,
                            &chain,
                            from_ty.with_cardinality(Cardinality::Signal),
                        );
                        new_blocks.extend(blocks);
                        new_edges.extend(edges);
                    }
                    None => {
                        let mut diag = Diagnostic::new(
                            DiagnosticKind::TypeMismatch {
                                from: from_ty,
                                to: to_ty,
                            },
                            format!("no unit adapter from {from_unit} to {to_unit}"),
                        );
                        if let Some(id) = edge.source_edge {
                            diag = diag.on_edge(id);
                        }
                        diagnostics.push(
                            diag.on_port(edge.to.block.clone(), edge.to.port.clone()),
                        );
                        new_edges.push(edge.clone());
                    }
                }
            }
            _ => {
                // One side is unit-less and the other is not; units do not
                // reconcile by adapter.
                let mut diag = Diagnostic::new(
                    DiagnosticKind::TypeMismatch {
                        from: from_ty,
                        to: to_ty,
                    },
                    format!("unit mismatch: {from_ty} vs {to_ty}"),
                );
                if let Some(id) = edge.source_edge {
                    diag = diag.on_edge(id);
                }
                diagnostics.push(diag.on_port(edge.to.block.clone(), edge.to.port.clone()));
                new_edges.push(edge.clone());
            }
        }
    }

    for block in new_blocks {
        norm.blocks.insert(block.id.clone(), block);
    }
    norm.edges = new_edges;
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_blocks::standard_registry;
    use phosphor_core::diag::Severity;
    use phosphor_graph::{Block, Patch};

    fn normalized(patch: &Patch) -> (NormalizedPatch, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let norm = super::super::norm::normalize(patch, &standard_registry(), &mut diags);
        (norm, diags)
    }

    #[test]
    fn equal_types_pass_through() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Const"));
        patch.add_block(Block::new("n", "Negate"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("n", "in"));
        let (mut norm, mut diags) = normalized(&patch);
        let before = norm.blocks.len();
        insert_adapters(&mut norm, &AdapterRegistry::standard(), &mut diags);
        assert_eq!(norm.blocks.len(), before);
        assert!(diags.iter().all(|d| d.severity < Severity::Error));
    }

    #[test]
    fn phase_into_radians_gets_adapter() {
        let mut patch = Patch::new();
        // InfiniteTimeRoot emits phase01; Sin wants radians.
        patch.add_block(Block::new("t", "InfiniteTimeRoot"));
        patch.add_block(Block::new("s", "Sine"));
        patch.connect(PortRef::new("t", "out"), PortRef::new("s", "angle"));
        let (mut norm, mut diags) = normalized(&patch);
        insert_adapters(&mut norm, &AdapterRegistry::standard(), &mut diags);
        assert!(diags.iter().all(|d| d.severity < Severity::Error), "{diags:?}");
        let adapter = norm
            .blocks
            .values()
            .find(|b| matches!(b.def.behavior, Behavior::Adapter(_)))
            .expect("adapter inserted");
        assert!(matches!(
            adapter.def.behavior,
            Behavior::Adapter(UnitConversion::Phase01ToRadians)
        ));
        // The spliced edges connect source -> adapter -> target.
        let into_adapter = norm.edges_into(&adapter.id, "in");
        assert_eq!(into_adapter.len(), 1);
        assert_eq!(into_adapter[0].from, PortRef::new("t", "out"));
    }

    #[test]
    fn payload_mismatch_is_type_error() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("d", "Array"));
        patch.add_block(Block::new("n", "Negate"));
        // Array's output is a domain handle, Negate wants a float.
        patch.connect(PortRef::new("d", "out"), PortRef::new("n", "in"));
        let (mut norm, mut diags) = normalized(&patch);
        insert_adapters(&mut norm, &AdapterRegistry::standard(), &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::TypeMismatch { .. })));
    }
}
