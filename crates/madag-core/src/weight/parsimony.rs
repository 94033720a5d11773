//! `ParsimonyScore` and `BinaryParsimonyScore` (§4.3).
use crate::dag::{Dag, EdgeId, NodeId};
use crate::weight::WeightOps;

/// Counts total mutations: `compute_edge = |M|`, within-clade picks the
/// minimum, between-clade sums.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsimonyScore;

impl WeightOps for ParsimonyScore {
    type Weight = usize;

    fn compute_leaf(&self, _dag: &Dag, _node: NodeId) -> usize {
        0
    }

    fn compute_edge(&self, dag: &Dag, edge: EdgeId) -> usize {
        dag.edge(edge).mutations.len()
    }

    fn above_node(&self, edge_weight: &usize, child_weight: &usize) -> usize {
        edge_weight + child_weight
    }

    fn within_clade_accum_optimum(&self, candidates: &[usize]) -> (usize, Vec<usize>) {
        let min = *candidates.iter().min().expect("a clade always has at least one edge");
        let indices = candidates
            .iter()
            .enumerate()
            .filter(|(_, w)| **w == min)
            .map(|(i, _)| i)
            .collect();
        (min, indices)
    }

    fn between_clades(&self, clade_weights: &[usize]) -> usize {
        clade_weights.iter().sum()
    }
}

/// Position-aware variant: only single-bit substitutions score (ambiguous
/// endpoints that are merely *compatible*, rather than a forced change,
/// contribute zero). This models reconstructions where an ambiguous call
/// is free to resolve to whichever allele avoids a mutation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryParsimonyScore;

impl WeightOps for BinaryParsimonyScore {
    type Weight = usize;

    fn compute_leaf(&self, _dag: &Dag, _node: NodeId) -> usize {
        0
    }

    fn compute_edge(&self, dag: &Dag, edge: EdgeId) -> usize {
        dag.edge(edge)
            .mutations
            .entries()
            .filter(|(_, (parent, child))| !parent.is_compatible(*child))
            .count()
    }

    fn above_node(&self, edge_weight: &usize, child_weight: &usize) -> usize {
        edge_weight + child_weight
    }

    fn within_clade_accum_optimum(&self, candidates: &[usize]) -> (usize, Vec<usize>) {
        ParsimonyScore.within_clade_accum_optimum(candidates)
    }

    fn between_clades(&self, clade_weights: &[usize]) -> usize {
        clade_weights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::compute_weight_below;

    #[test]
    fn parsimony_score_matches_edge_mutation_total_on_a_single_edge_tree() {
        let reference = std::sync::Arc::new(crate::reference::Reference::new("ref", "GAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = crate::compact_genome::CompactGenome::from_sequence("ACC", &reference).expect("valid");
        let leaf = dag.add_node(leaf_cg.clone(), Some(crate::sample_id::SampleId::intern("only")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let muts = dag.node(ua).compact_genome.clone().edge_mutations_to(&leaf_cg, &reference);
        let expected = muts.len();
        dag.add_edge(ua, leaf, 0, muts);
        let dp = compute_weight_below(&dag, &ParsimonyScore).expect("has root");
        assert_eq!(dp.weight_below[ua.0], expected);
    }
}
