//! Standalone Sankoff ancestral-state reconstruction (§4.3).
//!
//! Unlike [`super::WeightOps`], Sankoff evaluates every reference position
//! independently with its own per-site optimum, so a single node can have
//! different "best" child bases at different sites within the same clade.
//! That does not fit the single shared-optimum-index model the generic DP
//! assumes, so this is its own engine rather than a `WeightOps` impl —
//! mirroring the upstream, which keeps its Sankoff scorer as a separate
//! class from the generic subtree-weight machinery.
use rayon::prelude::*;

use crate::compact_genome::{CompactGenome, CompactGenomeData};
use crate::dag::{Dag, NodeId};
use crate::error::{MadagError, Result};
use crate::mutation::{MutationBase, MutationPosition};
use crate::reference::Reference;

const BASES: [MutationBase; 4] = [MutationBase::A, MutationBase::C, MutationBase::G, MutationBase::T];
const INFEASIBLE: u32 = u32::MAX / 4;

fn transition(i: usize, j: usize) -> u32 {
    u32::from(i != j)
}

/// The outcome of a Sankoff pass: the total substitution score and a copy
/// of the input DAG with every node's compact genome replaced by its
/// maximum-parsimony ancestral reconstruction.
pub struct SankoffResult {
    pub score: u64,
    pub dag: Dag,
}

struct SiteResult {
    resolved: Vec<MutationBase>,
    score: u32,
}

/// Runs the per-site Sankoff DP and traceback on a single reference
/// position, independent of every other site (hence parallelizable).
fn solve_site(dag: &Dag, postorder: &[NodeId], preorder: &[NodeId], reference: &Reference, pos: usize) -> Result<SiteResult> {
    let mutation_pos = MutationPosition(pos);
    let reference_base = reference
        .base_at(pos)
        .ok_or_else(|| MadagError::InvariantViolation(format!("position {pos} is outside the reference")))?;
    let mut cost: Vec<[u32; 4]> = vec![[0; 4]; dag.node_count()];

    for &node in postorder {
        if dag.is_leaf(node) {
            let observed = dag
                .node(node)
                .compact_genome
                .base_at(mutation_pos, reference)
                .unwrap_or(reference_base);
            for (i, base) in BASES.iter().enumerate() {
                cost[node.0][i] = if observed.is_compatible(*base) { 0 } else { INFEASIBLE };
            }
            continue;
        }
        let mut acc = [0u32; 4];
        for i in 0..4 {
            let mut sum = 0u32;
            for edge_id in dag.child_edges(node) {
                let child = dag.edge(edge_id).child;
                let best = (0..4)
                    .map(|j| transition(i, j) + cost[child.0][j])
                    .min()
                    .unwrap_or(0);
                sum = sum.saturating_add(best);
            }
            acc[i] = sum;
        }
        cost[node.0] = acc;
    }

    // Top-down traceback: each node picks the base minimizing transition
    // cost from its parent's already-chosen base plus its own subtree cost,
    // preferring to match the parent's base when multiple bases tie.
    let mut resolved = vec![MutationBase::A; dag.node_count()];
    let root = preorder[0];
    let root_costs = cost[root.0];
    let mut root_choice = 0;
    for j in 1..4 {
        if root_costs[j] < root_costs[root_choice] {
            root_choice = j;
        }
    }
    resolved[root.0] = BASES[root_choice];
    let score = root_costs[root_choice];

    for &node in preorder {
        if node == root {
            continue;
        }
        let parent_edge = dag.node(node).parents.first().copied().ok_or_else(|| {
            MadagError::InvariantViolation(format!("node {} has no parent but is not the tree's root", node.0))
        })?;
        let parent = dag.edge(parent_edge).parent;
        let parent_idx = BASES.iter().position(|b| *b == resolved[parent.0]).ok_or_else(|| {
            MadagError::InvariantViolation("resolved base is not one of the four named bases".to_owned())
        })?;
        let node_cost = cost[node.0];
        let mut candidates: Vec<usize> = vec![parent_idx];
        candidates.extend((0..4).filter(|&j| j != parent_idx));
        let mut best = candidates[0];
        let mut best_val = transition(parent_idx, best) + node_cost[best];
        for &j in &candidates[1..] {
            let val = transition(parent_idx, j) + node_cost[j];
            if val < best_val {
                best = j;
                best_val = val;
            }
        }
        resolved[node.0] = BASES[best];
    }

    Ok(SiteResult { resolved, score })
}

/// Runs Sankoff reconstruction over every node of a tree-shaped `dag`,
/// parallelized across reference positions. Returns an error if `dag` is
/// not a tree: per-site traceback assumes exactly one parent per node.
pub fn reconstruct(dag: &Dag) -> Result<SankoffResult> {
    if !dag.is_tree() {
        return Err(MadagError::UnsupportedFeature(
            "Sankoff reconstruction requires a tree, not a DAG with shared ancestry".to_owned(),
        ));
    }
    let postorder = dag.postorder()?;
    let preorder = dag.preorder()?;
    let reference = dag.reference().clone();

    let site_results: Vec<SiteResult> = (1..=reference.len())
        .into_par_iter()
        .map(|pos| solve_site(dag, &postorder, &preorder, &reference, pos))
        .collect::<Result<Vec<_>>>()?;

    let mut out = dag.clone();
    for node in dag.node_ids() {
        let mut data = CompactGenomeData::new();
        for (pos, site) in site_results.iter().enumerate() {
            let position = MutationPosition(pos + 1);
            let base = site.resolved[node.0];
            let Some(ref_base) = reference.base_at(position.0) else {
                continue;
            };
            if base != ref_base {
                data.insert(position, base);
            }
        }
        out.node_mut(node).compact_genome = CompactGenome::intern(data);
    }
    out.recompute_edge_mutations();

    let score = site_results.iter().map(|s| u64::from(s.score)).sum();
    Ok(SankoffResult { score, dag: out })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::sample_id::SampleId;
    use std::sync::Arc;

    #[test]
    fn reconstruction_on_a_cherry_recovers_a_compatible_ancestor() {
        let reference = Arc::new(Reference::new("ref", "AAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_a_cg = CompactGenome::from_sequence("ACA", &reference).expect("valid");
        let leaf_b_cg = CompactGenome::from_sequence("ACA", &reference).expect("valid");
        let a = dag.add_node(leaf_a_cg.clone(), Some(SampleId::intern("sankoff_a")));
        let b = dag.add_node(leaf_b_cg.clone(), Some(SampleId::intern("sankoff_b")));
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);
        let ua_cg = dag.node(ua).compact_genome.clone();
        let ma = ua_cg.edge_mutations_to(&leaf_a_cg, &reference);
        let mb = ua_cg.edge_mutations_to(&leaf_b_cg, &reference);
        dag.add_edge(ua, a, 0, ma);
        dag.add_edge(ua, b, 1, mb);

        let result = reconstruct(&dag).expect("fixture is a tree");
        // Both leaves are identical, so the most-parsimonious ancestor
        // matches them exactly at zero cost.
        assert_eq!(result.score, 0);
        assert_eq!(result.dag.node(ua).compact_genome, leaf_a_cg);
    }

    #[test]
    fn reconstruction_rejects_a_non_tree_dag() {
        let reference = Arc::new(Reference::new("ref", "AAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = CompactGenome::from_sequence("ACA", &reference).expect("valid");
        let leaf = dag.add_node(leaf_cg.clone(), Some(SampleId::intern("shared_leaf")));
        let p1 = dag.add_node(CompactGenome::empty(), None);
        let p2 = dag.add_node(CompactGenome::empty(), None);
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);
        let empty = CompactGenome::empty();
        let m = empty.edge_mutations_to(&leaf_cg, &reference);
        dag.add_edge(p1, leaf, 0, m.clone());
        dag.add_edge(p2, leaf, 0, m);
        dag.add_edge(ua, p1, 0, crate::edge_mutations::EdgeMutations::default());
        dag.add_edge(ua, p2, 1, crate::edge_mutations::EdgeMutations::default());
        assert!(reconstruct(&dag).is_err());
    }
}
