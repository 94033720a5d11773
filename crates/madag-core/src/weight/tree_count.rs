//! `TreeCount` and the generic `WithCount` lexicographic-pairing wrapper
//! used for `min_weight_count` (§4.3).
use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::dag::{Dag, EdgeId, NodeId};
use crate::weight::WeightOps;

/// Counts the number of distinct trees embedded below each node: edges and
/// leaves contribute a multiplicative identity, within-clade sums
/// alternatives (every alternative placement is a distinct tree), and
/// between-clade multiplies (a tree below a node picks one choice per
/// clade independently).
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeCount;

impl WeightOps for TreeCount {
    type Weight = BigUint;

    fn compute_leaf(&self, _dag: &Dag, _node: NodeId) -> BigUint {
        BigUint::one()
    }

    fn compute_edge(&self, _dag: &Dag, _edge: EdgeId) -> BigUint {
        BigUint::one()
    }

    fn above_node(&self, edge_weight: &BigUint, child_weight: &BigUint) -> BigUint {
        edge_weight * child_weight
    }

    fn within_clade_accum_optimum(&self, candidates: &[BigUint]) -> (BigUint, Vec<usize>) {
        let sum = candidates.iter().fold(BigUint::zero(), |acc, w| acc + w);
        (sum, (0..candidates.len()).collect())
    }

    fn between_clades(&self, clade_weights: &[BigUint]) -> BigUint {
        clade_weights.iter().fold(BigUint::one(), |acc, w| acc * w)
    }
}

/// Wraps an arbitrary [`WeightOps`] to additionally track, per node, how
/// many minimum-weight subtrees achieve the optimal weight — the
/// lexicographic `(Weight, count)` pair named by `min_weight_count` in
/// §4.3. `count` uses arbitrary-precision arithmetic since the number of
/// co-optimal trees can be combinatorially large.
#[derive(Debug, Clone, Copy)]
pub struct WithCount<O>(pub O);

impl<O: WeightOps> WeightOps for WithCount<O> {
    type Weight = (O::Weight, BigUint);

    fn compute_leaf(&self, dag: &Dag, node: NodeId) -> Self::Weight {
        (self.0.compute_leaf(dag, node), BigUint::one())
    }

    fn compute_edge(&self, dag: &Dag, edge: EdgeId) -> Self::Weight {
        (self.0.compute_edge(dag, edge), BigUint::one())
    }

    fn above_node(&self, edge_weight: &Self::Weight, child_weight: &Self::Weight) -> Self::Weight {
        (
            self.0.above_node(&edge_weight.0, &child_weight.0),
            child_weight.1.clone(),
        )
    }

    fn within_clade_accum_optimum(&self, candidates: &[Self::Weight]) -> (Self::Weight, Vec<usize>) {
        let inner_weights: Vec<O::Weight> = candidates.iter().map(|(w, _)| w.clone()).collect();
        let (optimum, indices) = self.0.within_clade_accum_optimum(&inner_weights);
        let count = indices.iter().fold(BigUint::zero(), |acc, &i| acc + &candidates[i].1);
        ((optimum, count), indices)
    }

    fn between_clades(&self, clade_weights: &[Self::Weight]) -> Self::Weight {
        let inner_weights: Vec<O::Weight> = clade_weights.iter().map(|(w, _)| w.clone()).collect();
        let combined_weight = self.0.between_clades(&inner_weights);
        let combined_count = clade_weights.iter().fold(BigUint::one(), |acc, (_, c)| acc * c);
        (combined_weight, combined_count)
    }
}

/// `min_weight_count`: the number of minimum-weight trees below `root`
/// under the base semiring `ops`.
pub fn min_weight_count<O: WeightOps>(dag: &Dag, ops: O) -> crate::error::Result<BigUint> {
    let wrapped = WithCount(ops);
    let dp = crate::weight::compute_weight_below(dag, &wrapped)?;
    let root = dag.ua()?;
    Ok(dp.weight_below[root.0].1.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::compute_weight_below;

    #[test]
    fn tree_count_on_a_cherry_is_the_product_of_two_singleton_clades() {
        let reference = std::sync::Arc::new(crate::reference::Reference::new("ref", "GAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg_a = crate::compact_genome::CompactGenome::from_sequence("ACC", &reference).expect("valid");
        let leaf_cg_b = crate::compact_genome::CompactGenome::from_sequence("TAG", &reference).expect("valid");
        let a = dag.add_node(leaf_cg_a.clone(), Some(crate::sample_id::SampleId::intern("tc_a")));
        let b = dag.add_node(leaf_cg_b.clone(), Some(crate::sample_id::SampleId::intern("tc_b")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let root_cg = dag.node(ua).compact_genome.clone();
        let ma = root_cg.edge_mutations_to(&leaf_cg_a, &reference);
        let mb = root_cg.edge_mutations_to(&leaf_cg_b, &reference);
        dag.add_edge(ua, a, 0, ma);
        dag.add_edge(ua, b, 1, mb);
        let dp = compute_weight_below(&dag, &TreeCount).expect("has root");
        assert_eq!(dp.weight_below[ua.0], BigUint::one());
    }

    #[test]
    fn min_weight_count_on_single_leaf_tree_is_one() {
        let reference = std::sync::Arc::new(crate::reference::Reference::new("ref", "GAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = crate::compact_genome::CompactGenome::from_sequence("ACC", &reference).expect("valid");
        let leaf = dag.add_node(leaf_cg.clone(), Some(crate::sample_id::SampleId::intern("mwc_only")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let muts = dag.node(ua).compact_genome.clone().edge_mutations_to(&leaf_cg, &reference);
        dag.add_edge(ua, leaf, 0, muts);
        let count = min_weight_count(&dag, crate::weight::parsimony::ParsimonyScore).expect("has root");
        assert_eq!(count, BigUint::one());
    }
}
