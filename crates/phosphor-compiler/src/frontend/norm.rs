//! Normalization: default-source materialization and bus collapse.
//!
//! Output is a [`NormalizedPatch`] in which every input port of every
//! surviving block is either sourced by at least one edge or flagged
//! with a diagnostic, and no bus blocks remain. Synthesized blocks get
//! IDs derived from their target port, so they (and any state they
//! might carry) are stable across recompiles.

use indexmap::IndexMap;

use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::id::{BlockId, EdgeId, PortId};
use phosphor_core::op::TimeFn;
use phosphor_core::ty::{CanonicalType, Cardinality, Payload, Unit};
use phosphor_graph::block::{BlockRole, CombineMode};
use phosphor_graph::edge::{EdgeRole, PortRef};
use phosphor_graph::params::Params;
use phosphor_graph::registry::{Behavior, BlockDef, BlockRegistry, DefaultSource, PortDef};
use phosphor_graph::Patch;

/// Where a normalized block came from.
#[derive(Clone, Debug, PartialEq)]
pub enum NormOrigin {
    /// Copied from the author's patch.
    User,
    /// Synthesized to satisfy a defaulted input port.
    Default {
        /// The port the default feeds.
        target: PortRef,
        /// The declared default it materializes.
        source: DefaultSource,
    },
    /// Inserted by the adapter pass.
    Adapter,
}

/// A block instance in the normalized patch.
///
/// Owns its definition: user blocks clone the registry entry with any
/// author port-state overrides folded in, synthesized blocks carry a
/// definition built on the fly. Downstream passes never consult the
/// registry or the original patch again.
#[derive(Clone, Debug)]
pub struct NormBlock {
    /// Stable identity (author-assigned or derived).
    pub id: BlockId,
    /// Human-readable name.
    pub display_name: String,
    /// The block's definition, with author combine overrides applied.
    pub def: BlockDef,
    /// Authored parameters.
    pub params: Params,
    /// Author-configured unit lenses per input port.
    pub lenses: IndexMap<String, Vec<phosphor_core::adapt::UnitConversion>>,
    /// Structural role.
    pub role: BlockRole,
    /// Where the block came from.
    pub origin: NormOrigin,
}

/// An edge in the normalized patch.
#[derive(Clone, Debug, PartialEq)]
pub struct NormEdge {
    /// Source output port.
    pub from: PortRef,
    /// Target input port.
    pub to: PortRef,
    /// User, default, or adapter.
    pub role: EdgeRole,
    /// The authored edge this derives from, for diagnostics.
    pub source_edge: Option<EdgeId>,
}

/// The normalized patch: no buses, every input sourced or flagged.
#[derive(Clone, Debug, Default)]
pub struct NormalizedPatch {
    /// Blocks by ID, in deterministic order.
    pub blocks: IndexMap<BlockId, NormBlock>,
    /// Edges, in deterministic order.
    pub edges: Vec<NormEdge>,
}

impl NormalizedPatch {
    /// Edges targeting an input port, in edge order.
    pub fn edges_into(&self, block: &BlockId, port: &str) -> Vec<&NormEdge> {
        self.edges
            .iter()
            .filter(|e| &e.to.block == block && e.to.port.0 == port)
            .collect()
    }

    /// The block producing a given output port, if it exists.
    pub fn producer(&self, port: &PortRef) -> Option<&NormBlock> {
        self.blocks.get(&port.block)
    }
}

/// The synthesized definition for a defaulted input port.
fn default_def(source: &DefaultSource, target_ty: CanonicalType) -> BlockDef {
    match source {
        DefaultSource::Const(_) => BlockDef {
            kind: "#default-const",
            role: BlockRole::Normal,
            inputs: vec![],
            outputs: vec![PortDef::required(
                "out",
                "Value",
                // Defaults feed exactly one port; a signal here broadcasts
                // during cardinality solving if the target is a field.
                target_ty.with_cardinality(Cardinality::Signal),
            )],
            states: vec![],
            behavior: Behavior::Const,
        },
        DefaultSource::TimeRoot { .. } => BlockDef {
            kind: "#default-time",
            role: BlockRole::TimeRoot,
            inputs: vec![],
            outputs: vec![PortDef::required(
                "out",
                "Phase",
                CanonicalType::signal(Payload::Float, Some(Unit::Phase01)),
            )],
            states: vec![],
            behavior: Behavior::Time(TimeFn::Phase),
        },
        DefaultSource::DomainCount(_) => BlockDef {
            kind: "#default-domain",
            role: BlockRole::Normal,
            inputs: vec![],
            outputs: vec![PortDef::required("out", "Domain", CanonicalType::domain())],
            states: vec![],
            behavior: Behavior::Domain,
        },
    }
}

/// Params for a synthesized default block.
fn default_params(source: &DefaultSource) -> Params {
    use phosphor_graph::params::ParamValue;
    match source {
        // Scalar consts flow through the param; wider consts are read
        // from the origin during lowering.
        DefaultSource::Const(v) => Params::new().with("value", ParamValue::Float(v.x())),
        DefaultSource::TimeRoot { period_ms } => {
            Params::new().with("periodMs", ParamValue::Float(*period_ms))
        }
        DefaultSource::DomainCount(n) => {
            Params::new().with("count", ParamValue::Int(i64::from(*n)))
        }
    }
}

/// Run normalization over a patch.
///
/// Produces the normalized patch and appends diagnostics for unknown
/// kinds, unresolved inputs, and conflicting sources.
pub fn normalize(
    patch: &Patch,
    registry: &BlockRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> NormalizedPatch {
    diagnostics.extend(patch.validate());

    let mut norm = NormalizedPatch::default();

    // Copy user blocks that resolve against the registry. Buses are kept
    // aside for edge rewiring and never enter the normalized set.
    let mut buses: Vec<&phosphor_graph::Block> = Vec::new();
    for block in patch.blocks() {
        let Some(def) = registry.get(&block.kind) else {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnresolvedInput,
                    format!("block kind '{}' is not registered", block.kind),
                )
                .on_block(block.id.clone()),
            );
            continue;
        };
        if matches!(def.behavior, Behavior::Bus) {
            buses.push(block);
            continue;
        }
        // Fold author port-state into the owned definition: combine
        // overrides become the def's combine mode, lenses are kept per
        // port for the adapter pass.
        let mut def = def.clone();
        let mut lenses = IndexMap::new();
        for port in &mut def.inputs {
            let state = block.input_state(&PortId(port.id.to_string()));
            if let Some(combine) = state.combine {
                port.combine = combine;
            }
            if !state.lenses.is_empty() {
                lenses.insert(port.id.to_string(), state.lenses.clone());
            }
        }
        norm.blocks.insert(
            block.id.clone(),
            NormBlock {
                id: block.id.clone(),
                display_name: block.display_name.clone(),
                def,
                params: block.params.clone(),
                lenses,
                role: block.role,
                origin: NormOrigin::User,
            },
        );
    }

    // Rewire edges through buses: every source feeding a bus input fans
    // out to every target of the bus output. Chained buses resolve by
    // repeated substitution.
    let bus_ids: Vec<&BlockId> = buses.iter().map(|b| &b.id).collect();
    let is_bus = |id: &BlockId| bus_ids.contains(&id);

    let mut edges: Vec<NormEdge> = Vec::new();
    for edge in patch.edges() {
        if is_bus(&edge.from.block) {
            continue; // handled from the inbound side
        }
        if is_bus(&edge.to.block) {
            // Follow the fan-out, skipping through chained buses.
            let mut frontier = vec![&edge.to.block];
            let mut seen: Vec<&BlockId> = Vec::new();
            while let Some(bus) = frontier.pop() {
                if seen.contains(&bus) {
                    continue; // bus cycle; drop silently, cycle pass reports
                }
                seen.push(bus);
                for out_edge in patch.edges().filter(|e| &e.from.block == bus) {
                    if is_bus(&out_edge.to.block) {
                        frontier.push(&out_edge.to.block);
                    } else {
                        edges.push(NormEdge {
                            from: edge.from.clone(),
                            to: out_edge.to.clone(),
                            role: EdgeRole::User,
                            source_edge: Some(edge.id),
                        });
                    }
                }
            }
        } else {
            edges.push(NormEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                role: edge.role,
                source_edge: Some(edge.id),
            });
        }
    }
    norm.edges = edges;

    // Default materialization and source-count checks, per input port of
    // every surviving block.
    let block_ids: Vec<BlockId> = norm.blocks.keys().cloned().collect();
    let mut synthesized: Vec<(NormBlock, NormEdge)> = Vec::new();
    for block_id in &block_ids {
        let block = &norm.blocks[block_id];
        for port in &block.def.inputs {
            let incoming = norm.edges_into(block_id, port.id);
            let state = patch
                .block(block_id)
                .map(|b| b.input_state(&PortId(port.id.to_string())))
                .unwrap_or_default();

            if incoming.is_empty() {
                let default = state.default_override.clone().or_else(|| port.default.clone());
                match default {
                    Some(source) => {
                        let target = PortRef {
                            block: block_id.clone(),
                            port: PortId(port.id.to_string()),
                        };
                        let synth_id = BlockId(format!("{}.{}#default", block_id, port.id));
                        let def = default_def(&source, port.ty);
                        synthesized.push((
                            NormBlock {
                                id: synth_id.clone(),
                                display_name: synth_id.0.clone(),
                                def,
                                params: default_params(&source),
                                lenses: IndexMap::new(),
                                role: BlockRole::Normal,
                                origin: NormOrigin::Default {
                                    target: target.clone(),
                                    source,
                                },
                            },
                            NormEdge {
                                from: PortRef {
                                    block: synth_id,
                                    port: PortId("out".to_string()),
                                },
                                to: target,
                                role: EdgeRole::Default,
                                source_edge: None,
                            },
                        ));
                    }
                    None => {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::UnresolvedInput,
                                format!(
                                    "input '{}' has no source and declares no default",
                                    port.id
                                ),
                            )
                            .on_port(block_id.clone(), PortId(port.id.to_string())),
                        );
                    }
                }
            } else if incoming.len() > 1 {
                if port.combine == CombineMode::Single {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::ConflictingSources,
                            format!(
                                "input '{}' accepts a single source but has {} edges",
                                port.id,
                                incoming.len()
                            ),
                        )
                        .on_port(block_id.clone(), PortId(port.id.to_string())),
                    );
                }
            }
        }
    }

    for (block, edge) in synthesized {
        norm.blocks.insert(block.id.clone(), block);
        norm.edges.push(edge);
    }

    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_blocks::standard_registry;
    use phosphor_graph::Block;

    fn registry() -> BlockRegistry {
        standard_registry()
    }

    #[test]
    fn defaults_materialize_for_unconnected_inputs() {
        let mut patch = Patch::new();
        // Add has two defaulted float inputs.
        patch.add_block(Block::new("sum", "Add"));
        let mut diags = Vec::new();
        let norm = normalize(&patch, &registry(), &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
        // The Add block plus one synthesized const per input.
        assert_eq!(norm.blocks.len(), 3);
        assert!(norm.blocks.contains_key(&BlockId::from("sum.lhs#default")));
        assert!(norm.blocks.contains_key(&BlockId::from("sum.rhs#default")));
        assert_eq!(
            norm.edges_into(&BlockId::from("sum"), "lhs").len(),
            1
        );
    }

    #[test]
    fn synthesized_ids_stable_across_runs() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("sum", "Add"));
        let mut d1 = Vec::new();
        let mut d2 = Vec::new();
        let a = normalize(&patch, &registry(), &mut d1);
        let b = normalize(&patch, &registry(), &mut d2);
        let ids_a: Vec<&BlockId> = a.blocks.keys().collect();
        let ids_b: Vec<&BlockId> = b.blocks.keys().collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn missing_default_is_unresolved() {
        let mut patch = Patch::new();
        // FieldPolarToCartesian requires both field inputs; neither
        // declares a default.
        patch.add_block(Block::new("p2c", "FieldPolarToCartesian"));
        let mut diags = Vec::new();
        normalize(&patch, &registry(), &mut diags);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedInput
                && d.port == Some(PortId::from("radius"))));
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedInput
                && d.port == Some(PortId::from("angle"))));
    }

    #[test]
    fn unknown_kind_flagged() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("x", "NoSuchBlock"));
        let mut diags = Vec::new();
        let norm = normalize(&patch, &registry(), &mut diags);
        assert!(norm.blocks.is_empty());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn bus_collapse_rewires_through() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("c", "Const"));
        patch.add_block(Block::new("bus", "Bus").with_role(BlockRole::Bus));
        patch.add_block(Block::new("sum", "Add"));
        patch.connect(PortRef::new("c", "out"), PortRef::new("bus", "in"));
        patch.connect(PortRef::new("bus", "out"), PortRef::new("sum", "lhs"));
        let mut diags = Vec::new();
        let norm = normalize(&patch, &registry(), &mut diags);
        assert!(!norm.blocks.contains_key(&BlockId::from("bus")));
        let into = norm.edges_into(&BlockId::from("sum"), "lhs");
        assert_eq!(into.len(), 1);
        assert_eq!(into[0].from, PortRef::new("c", "out"));
    }

    #[test]
    fn single_combine_with_two_sources_conflicts() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Const"));
        patch.add_block(Block::new("b", "Const"));
        patch.add_block(Block::new("neg", "Negate"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("neg", "in"));
        patch.connect(PortRef::new("b", "out"), PortRef::new("neg", "in"));
        let mut diags = Vec::new();
        normalize(&patch, &registry(), &mut diags);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::ConflictingSources));
    }
}
