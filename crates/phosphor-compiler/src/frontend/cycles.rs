//! Cycle analysis: strongly connected components with unit-delay edges
//! cut.
//!
//! Author-visible feedback is legal only across a unit delay. The
//! dependency graph is built over normalized blocks; edges into a unit
//! delay's `in` port are cut (they become state write-backs across the
//! phase boundary, not same-frame dependencies). Any SCC of size > 1 or
//! self-loop that survives the cut is an illegal cycle.

use indexmap::IndexMap;

use phosphor_core::diag::{Diagnostic, DiagnosticKind};
use phosphor_core::id::BlockId;
use phosphor_graph::registry::Behavior;

use super::norm::NormalizedPatch;

/// One feedback component found in the uncut dependency graph.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleComponent {
    /// Member blocks, in normalized order.
    pub blocks: Vec<BlockId>,
    /// Unit-delay members that break the feedback.
    pub delays: Vec<BlockId>,
    /// Whether every cycle in the component passes through a delay.
    pub legal: bool,
}

/// Summary of all feedback components in the patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleSummary {
    /// Components of size > 1 (or with self-loops) in the uncut graph.
    pub components: Vec<CycleComponent>,
}

impl CycleSummary {
    /// Whether any component is illegal.
    pub fn has_illegal(&self) -> bool {
        self.components.iter().any(|c| !c.legal)
    }
}

/// Iterative Tarjan SCC over an adjacency list.
///
/// Returns components in reverse topological order; each component lists
/// node indices.
fn tarjan(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    // Explicit call stack of (node, neighbor cursor) frames.
    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        let mut call: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(&(v, cursor)) = call.last() {
            if cursor == 0 {
                index[v] = next_index;
                low[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if cursor < adj[v].len() {
                if let Some(frame) = call.last_mut() {
                    frame.1 += 1;
                }
                let w = adj[v][cursor];
                if index[w] == usize::MAX {
                    call.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                if low[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
                call.pop();
                if let Some(&mut (parent, _)) = call.last_mut() {
                    low[parent] = low[parent].min(low[v]);
                }
            }
        }
    }
    components
}

/// Build adjacency (producer → consumer) over normalized blocks.
///
/// `cut_delays` removes edges into unit-delay `in` ports.
fn adjacency(norm: &NormalizedPatch, cut_delays: bool) -> (Vec<&BlockId>, Vec<Vec<usize>>) {
    let ids: Vec<&BlockId> = norm.blocks.keys().collect();
    let index_of: IndexMap<&BlockId, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut adj = vec![Vec::new(); ids.len()];
    for edge in &norm.edges {
        let (Some(&from), Some(&to)) = (
            index_of.get(&edge.from.block),
            index_of.get(&edge.to.block),
        ) else {
            continue;
        };
        if cut_delays {
            let target = &norm.blocks[&edge.to.block];
            if matches!(target.def.behavior, Behavior::UnitDelay) && edge.to.port.0 == "in" {
                continue;
            }
        }
        if !adj[from].contains(&to) {
            adj[from].push(to);
        }
    }
    (ids, adj)
}

/// Whether a node has a self-loop in the adjacency list.
fn has_self_loop(adj: &[Vec<usize>], v: usize) -> bool {
    adj[v].contains(&v)
}

/// Run cycle analysis, appending `IllegalCycle` diagnostics for every
/// block on an unbroken cycle.
pub fn analyze(norm: &NormalizedPatch, diagnostics: &mut Vec<Diagnostic>) -> CycleSummary {
    let (ids, full_adj) = adjacency(norm, false);
    let (_, cut_adj) = adjacency(norm, true);

    let full_components = tarjan(&full_adj);
    let cut_components = tarjan(&cut_adj);

    // A node is "still cyclic after the cut" if its cut-graph component
    // has size > 1 or a self-loop.
    let mut still_cyclic = vec![false; ids.len()];
    for component in &cut_components {
        let cyclic = component.len() > 1
            || component.iter().any(|&v| has_self_loop(&cut_adj, v));
        if cyclic {
            for &v in component {
                still_cyclic[v] = true;
            }
        }
    }

    let mut summary = CycleSummary::default();
    for component in &full_components {
        let cyclic = component.len() > 1
            || component.iter().any(|&v| has_self_loop(&full_adj, v));
        if !cyclic {
            continue;
        }
        let mut members: Vec<usize> = component.clone();
        members.sort_unstable();
        let blocks: Vec<BlockId> = members.iter().map(|&v| ids[v].clone()).collect();
        let delays: Vec<BlockId> = blocks
            .iter()
            .filter(|id| {
                matches!(norm.blocks[*id].def.behavior, Behavior::UnitDelay)
            })
            .cloned()
            .collect();
        let legal = !members.iter().any(|&v| still_cyclic[v]);
        if !legal {
            for id in &blocks {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::IllegalCycle,
                        "feedback cycle is not broken by a unit delay",
                    )
                    .on_block(id.clone()),
                );
            }
        }
        summary.components.push(CycleComponent {
            blocks,
            delays,
            legal,
        });
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_blocks::standard_registry;
    use phosphor_graph::edge::PortRef;
    use phosphor_graph::{Block, Patch};

    fn analyzed(patch: &Patch) -> (CycleSummary, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let norm = super::super::norm::normalize(patch, &standard_registry(), &mut diags);
        diags.clear();
        let summary = analyze(&norm, &mut diags);
        (summary, diags)
    }

    #[test]
    fn acyclic_patch_has_no_components() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Const"));
        patch.add_block(Block::new("b", "Negate"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("b", "in"));
        let (summary, diags) = analyzed(&patch);
        assert!(summary.components.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn two_block_cycle_without_delay_is_illegal() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("a", "Negate"));
        patch.add_block(Block::new("b", "Negate"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("b", "in"));
        patch.connect(PortRef::new("b", "out"), PortRef::new("a", "in"));
        let (summary, diags) = analyzed(&patch);
        assert_eq!(summary.components.len(), 1);
        assert!(!summary.components[0].legal);
        // Both blocks carry the diagnostic.
        let flagged: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == DiagnosticKind::IllegalCycle)
            .collect();
        assert_eq!(flagged.len(), 2);
    }

    #[test]
    fn cycle_through_unit_delay_is_legal() {
        let mut patch = Patch::new();
        patch.add_block(Block::new("delay", "UnitDelay"));
        patch.add_block(Block::new("inc", "Add"));
        patch.connect(PortRef::new("delay", "out"), PortRef::new("inc", "lhs"));
        patch.connect(PortRef::new("inc", "out"), PortRef::new("delay", "in"));
        let (summary, diags) = analyzed(&patch);
        assert_eq!(summary.components.len(), 1);
        assert!(summary.components[0].legal, "{summary:?}");
        assert_eq!(summary.components[0].delays, vec![BlockId::from("delay")]);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn mixed_cycle_partially_broken_is_illegal() {
        // Two nested loops sharing nodes; only one passes the delay.
        let mut patch = Patch::new();
        patch.add_block(Block::new("delay", "UnitDelay"));
        patch.add_block(Block::new("a", "Negate"));
        patch.add_block(Block::new("b", "Negate"));
        // Legal loop: delay -> a -> delay.in
        patch.connect(PortRef::new("delay", "out"), PortRef::new("a", "in"));
        patch.connect(PortRef::new("a", "out"), PortRef::new("delay", "in"));
        // Illegal loop: a -> b -> a (no delay on it)
        patch.connect(PortRef::new("a", "out"), PortRef::new("b", "in"));
        patch.connect(PortRef::new("b", "out"), PortRef::new("a", "in"));
        let (summary, diags) = analyzed(&patch);
        assert!(summary.has_illegal());
        assert!(!diags.is_empty());
    }
}
