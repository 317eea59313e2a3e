//! Cardinality solving: signal/field propagation and domain binding.
//!
//! Fields originate at lane generators and broadcasts (both bound to a
//! domain block) and propagate through element-wise operators; they are
//! collapsed to signals only by explicit reducers. Signals broadcast
//! into fields implicitly; the backend emits the lift. The solve is a
//! monotone fixpoint (signal < field, unbound < bound) so feedback
//! through unit delays converges.

use indexmap::IndexMap;

use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::id::BlockId;
use phosphor_core::ty::Cardinality;
use phosphor_graph::edge::PortRef;
use phosphor_graph::registry::Behavior;

use super::norm::{NormBlock, NormalizedPatch};

/// Resolved cardinality of one output port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortCard {
    /// Signal, field, event, or static.
    pub cardinality: Cardinality,
    /// The domain block a field is bound to, when known.
    pub domain: Option<BlockId>,
}

impl PortCard {
    fn signal() -> Self {
        Self {
            cardinality: Cardinality::Signal,
            domain: None,
        }
    }

    fn field(domain: Option<BlockId>) -> Self {
        Self {
            cardinality: Cardinality::Field,
            domain,
        }
    }

    fn stat() -> Self {
        Self {
            cardinality: Cardinality::Static,
            domain: None,
        }
    }
}

/// Resolved cardinalities for every output port in the normalized patch.
#[derive(Clone, Debug, Default)]
pub struct CardMap {
    outputs: IndexMap<PortRef, PortCard>,
}

impl CardMap {
    /// The resolved cardinality of an output port.
    pub fn output(&self, port: &PortRef) -> Option<&PortCard> {
        self.outputs.get(port)
    }

    /// Iterate all resolved output ports.
    pub fn iter(&self) -> impl Iterator<Item = (&PortRef, &PortCard)> {
        self.outputs.iter()
    }

    /// The domain a block's field output is bound to, if any output is a
    /// field.
    pub fn field_domain_of(&self, block: &BlockId) -> Option<&BlockId> {
        self.outputs
            .iter()
            .find(|(port, card)| {
                &port.block == block && card.cardinality == Cardinality::Field
            })
            .and_then(|(_, card)| card.domain.as_ref())
    }
}

/// Whether a block's inputs flow element-wise to its outputs, making it
/// cardinality-polymorphic.
fn is_elementwise(block: &NormBlock) -> bool {
    matches!(
        block.def.behavior,
        Behavior::Map(_) | Behavior::Adapter(_) | Behavior::UnitDelay
    )
}

/// The domain block feeding a block's `domain` input, if wired.
fn domain_source(norm: &NormalizedPatch, block: &NormBlock) -> Option<BlockId> {
    let edges = norm.edges_into(&block.id, "domain");
    let producer = norm.blocks.get(&edges.first()?.from.block)?;
    match producer.def.behavior {
        Behavior::Domain => Some(producer.id.clone()),
        _ => None,
    }
}

/// Solve cardinalities over the normalized patch.
pub fn solve(norm: &NormalizedPatch, diagnostics: &mut Vec<Diagnostic>) -> CardMap {
    let mut map = CardMap::default();

    // Monotone fixpoint: each pass can only promote signal → field or
    // bind a previously unknown domain, so it terminates.
    let max_rounds = norm.blocks.len() + 2;
    for _ in 0..max_rounds {
        let mut changed = false;

        for block in norm.blocks.values() {
            for out in &block.def.outputs {
                let port = PortRef {
                    block: block.id.clone(),
                    port: phosphor_core::id::PortId(out.id.to_string()),
                };
                let card = resolve_output(norm, &map, block, out.ty.cardinality);
                if map.outputs.get(&port) != Some(&card) {
                    map.outputs.insert(port, card);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    check_conflicts(norm, &map, diagnostics);
    map
}

/// Compute one output port's cardinality from the current map.
fn resolve_output(
    norm: &NormalizedPatch,
    map: &CardMap,
    block: &NormBlock,
    declared: Cardinality,
) -> PortCard {
    match &block.def.behavior {
        Behavior::Const | Behavior::Time(_) | Behavior::Reduce(_) => PortCard::signal(),
        Behavior::Domain => PortCard::stat(),
        Behavior::Lane(_) | Behavior::Broadcast => {
            PortCard::field(domain_source(norm, block))
        }
        Behavior::Map(_) | Behavior::Adapter(_) | Behavior::UnitDelay => {
            // Element-wise: field iff any data input resolves field; the
            // domain is inherited from the first bound field input.
            let mut domain = None;
            let mut any_field = false;
            for input in &block.def.inputs {
                for edge in norm.edges_into(&block.id, input.id) {
                    if let Some(card) = map.outputs.get(&edge.from) {
                        if card.cardinality == Cardinality::Field {
                            any_field = true;
                            if domain.is_none() {
                                domain = card.domain.clone();
                            }
                        }
                    }
                }
            }
            if any_field {
                PortCard::field(domain)
            } else {
                PortCard::signal()
            }
        }
        Behavior::Bus | Behavior::Render(_) => {
            // Buses are gone by now; render sinks have no outputs. Fall
            // back to the declared cardinality for robustness.
            PortCard {
                cardinality: declared,
                domain: None,
            }
        }
    }
}

/// Validate every edge against its target port's requirements.
fn check_conflicts(norm: &NormalizedPatch, map: &CardMap, diagnostics: &mut Vec<Diagnostic>) {
    for block in norm.blocks.values() {
        // Element-wise blocks accept both signals and fields, but all
        // field inputs must share one domain.
        if is_elementwise(block) {
            let mut bound: Option<&BlockId> = None;
            for input in &block.def.inputs {
                for edge in norm.edges_into(&block.id, input.id) {
                    let Some(card) = map.outputs.get(&edge.from) else {
                        continue;
                    };
                    if card.cardinality != Cardinality::Field {
                        continue;
                    }
                    match (bound, card.domain.as_ref()) {
                        (Some(a), Some(b)) if a != b => {
                            diagnostics.push(
                                Diagnostic::new(
                                    DiagnosticKind::CardinalityConflict,
                                    format!(
                                        "inputs bind to different domains: {a} vs {b}"
                                    ),
                                )
                                .on_block(block.id.clone()),
                            );
                        }
                        (None, Some(b)) => bound = Some(b),
                        _ => {}
                    }
                }
            }
            continue;
        }

        // Reducers are the one consumer of fields that cannot take a
        // broadcast: a lone signal has no domain to fold over.
        let allow_broadcast = !matches!(block.def.behavior, Behavior::Reduce(_));

        for input in &block.def.inputs {
            let required = input.ty.cardinality;
            for edge in norm.edges_into(&block.id, input.id) {
                let Some(card) = map.outputs.get(&edge.from) else {
                    continue;
                };
                let actual = card.cardinality;
                let ok = match required {
                    // Signals broadcast into fields; fields stay fields.
                    Cardinality::Field => {
                        actual == Cardinality::Field
                            || (allow_broadcast && actual == Cardinality::Signal)
                    }
                    Cardinality::Signal => actual == Cardinality::Signal,
                    Cardinality::Event => actual == Cardinality::Event,
                    Cardinality::Static => actual == Cardinality::Static,
                };
                if !ok {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::CardinalityConflict,
                            format!(
                                "input '{}' requires {required} but receives {actual}",
                                input.id
                            ),
                        )
                        .on_port(
                            block.id.clone(),
                            phosphor_core::id::PortId(input.id.to_string()),
                        ),
                    );
                }
            }
        }

        // Field inputs of domain-bound sinks must match the sink's domain.
        if let Behavior::Render(_) = block.def.behavior {
            let sink_domain = domain_source(norm, block);
            for input in &block.def.inputs {
                if input.ty.cardinality != Cardinality::Field {
                    continue;
                }
                for edge in norm.edges_into(&block.id, input.id) {
                    let Some(card) = map.outputs.get(&edge.from) else {
                        continue;
                    };
                    if card.cardinality == Cardinality::Field
                        && card.domain.is_some()
                        && sink_domain.is_some()
                        && card.domain != sink_domain
                    {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::CardinalityConflict,
                                format!(
                                    "field input '{}' is bound to a different domain than the sink",
                                    input.id
                                ),
                            )
                            .on_port(
                                block.id.clone(),
                                phosphor_core::id::PortId(input.id.to_string()),
                            ),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_blocks::standard_registry;
    use phosphor_graph::{Block, Patch};

    fn solved(patch: &Patch) -> (NormalizedPatch, CardMap, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let mut norm =
            super::super::norm::normalize(patch, &standard_registry(), &mut diags);
        super::super::adapt::insert_adapters(
            &mut norm,
            &phosphor_core::AdapterRegistry::standard(),
            &mut diags,
        );
        let map = solve(&norm, &mut diags);
        (norm, map, diags)
    }

    #[test]
    fn const_is_signal() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("c", "Const"));
        let (_, map, diags) = solved(&patch);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(
            map.output(&PortRef::new("c", "out")).unwrap().cardinality,
            Cardinality::Signal
        );
    }

    #[test]
    fn broadcast_binds_to_domain() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("c", "Const"));
        patch.add_block(Block::new("dots", "Array"));
        patch.add_block(Block::new("b", "FieldBroadcast"));
        patch.connect(PortRef::new("c", "out"), PortRef::new("b", "signal"));
        patch.connect(PortRef::new("dots", "out"), PortRef::new("b", "domain"));
        let (_, map, diags) = solved(&patch);
        assert!(diags.is_empty(), "{diags:?}");
        let card = map.output(&PortRef::new("b", "out")).unwrap();
        assert_eq!(card.cardinality, Cardinality::Field);
        assert_eq!(card.domain, Some(BlockId::from("dots")));
    }

    #[test]
    fn field_propagates_through_elementwise() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("dots", "Array"));
        patch.add_block(Block::new("idx", "FieldNorm01"));
        patch.add_block(Block::new("neg", "Negate"));
        patch.connect(PortRef::new("dots", "out"), PortRef::new("idx", "domain"));
        patch.connect(PortRef::new("idx", "out"), PortRef::new("neg", "in"));
        let (_, map, diags) = solved(&patch);
        assert!(diags.is_empty(), "{diags:?}");
        let card = map.output(&PortRef::new("neg", "out")).unwrap();
        assert_eq!(card.cardinality, Cardinality::Field);
        assert_eq!(card.domain, Some(BlockId::from("dots")));
    }

    #[test]
    fn reduce_collapses_to_signal() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("dots", "Array"));
        patch.add_block(Block::new("idx", "FieldNorm01"));
        patch.add_block(Block::new("sum", "FieldSum"));
        patch.connect(PortRef::new("dots", "out"), PortRef::new("idx", "domain"));
        patch.connect(PortRef::new("idx", "out"), PortRef::new("sum", "field"));
        let (_, map, diags) = solved(&patch);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(
            map.output(&PortRef::new("sum", "out")).unwrap().cardinality,
            Cardinality::Signal
        );
    }

    #[test]
    fn signal_into_reducer_conflicts() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("c", "Const"));
        patch.add_block(Block::new("sum", "FieldSum"));
        patch.connect(PortRef::new("c", "out"), PortRef::new("sum", "field"));
        let (_, _, diags) = solved(&patch);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::CardinalityConflict));
    }

    #[test]
    fn mixed_domains_conflict() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Array"));
        patch.add_block(Block::new("b", "Array"));
        patch.add_block(Block::new("fa", "FieldNorm01"));
        patch.add_block(Block::new("fb", "FieldNorm01"));
        patch.add_block(Block::new("add", "Add"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("fa", "domain"));
        patch.connect(PortRef::new("b", "out"), PortRef::new("fb", "domain"));
        patch.connect(PortRef::new("fa", "out"), PortRef::new("add", "lhs"));
        patch.connect(PortRef::new("fb", "out"), PortRef::new("add", "rhs"));
        let (_, _, diags) = solved(&patch);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::CardinalityConflict));
    }
}
