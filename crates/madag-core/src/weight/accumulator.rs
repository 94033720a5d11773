//! `WeightAccumulator` (§4.3): tracks the full distribution of achievable
//! weights below a node, rather than collapsing to a single optimum.
use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::dag::{Dag, EdgeId, NodeId};
use crate::weight::WeightOps;

/// A weight distribution: how many trees achieve each possible scalar
/// weight, keyed by that weight. `BTreeMap` keeps the distribution sorted
/// so `Ord` (required by [`WeightOps::Weight`]) compares lexicographically
/// by weight and, within a tie, by count.
pub type Distribution = BTreeMap<usize, BigUint>;

fn singleton(weight: usize) -> Distribution {
    let mut m = Distribution::new();
    m.insert(weight, BigUint::one());
    m
}

/// Convolution: the distribution of `a + b` for independent choices `a`
/// from the left distribution and `b` from the right, with counts
/// multiplying (the Cartesian product of ways to achieve each pair).
fn convolve(a: &Distribution, b: &Distribution) -> Distribution {
    let mut out = Distribution::new();
    for (wa, ca) in a {
        for (wb, cb) in b {
            *out.entry(wa + wb).or_insert_with(BigUint::zero) += ca * cb;
        }
    }
    out
}

/// Union: combines two distributions over the same underlying weight space
/// by adding counts at each weight (alternatives from different edges are
/// not composed, they are alternate ways of reaching the same node).
fn union(a: &Distribution, b: &Distribution) -> Distribution {
    let mut out = a.clone();
    for (w, c) in b {
        *out.entry(*w).or_insert_with(BigUint::zero) += c;
    }
    out
}

/// Wraps a scalar [`WeightOps`] (one that scores a single edge or leaf with
/// a `usize`) into one that accumulates the full weight distribution below
/// each node: within a clade, alternative edges' distributions are unioned
/// (every alternative is a distinct way to realize that clade); across
/// clades, distributions are convolved (a tree independently picks one
/// realization per clade, and weights add).
#[derive(Debug, Clone, Copy)]
pub struct WeightAccumulator<O>(pub O);

impl<O: WeightOps<Weight = usize>> WeightOps for WeightAccumulator<O> {
    type Weight = Distribution;

    fn compute_leaf(&self, dag: &Dag, node: NodeId) -> Distribution {
        singleton(self.0.compute_leaf(dag, node))
    }

    fn compute_edge(&self, dag: &Dag, edge: EdgeId) -> Distribution {
        singleton(self.0.compute_edge(dag, edge))
    }

    fn above_node(&self, edge_weight: &Distribution, child_weight: &Distribution) -> Distribution {
        convolve(edge_weight, child_weight)
    }

    fn within_clade_accum_optimum(&self, candidates: &[Distribution]) -> (Distribution, Vec<usize>) {
        let combined = candidates
            .iter()
            .fold(Distribution::new(), |acc, dist| union(&acc, dist));
        (combined, (0..candidates.len()).collect())
    }

    fn between_clades(&self, clade_weights: &[Distribution]) -> Distribution {
        clade_weights
            .iter()
            .fold(singleton(0), |acc, dist| convolve(&acc, dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::compute_weight_below;
    use crate::weight::parsimony::ParsimonyScore;

    #[test]
    fn accumulator_on_single_edge_tree_puts_all_mass_on_the_edge_mutation_count() {
        let reference = std::sync::Arc::new(crate::reference::Reference::new("ref", "GAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = crate::compact_genome::CompactGenome::from_sequence("ACC", &reference).expect("valid");
        let leaf = dag.add_node(leaf_cg.clone(), Some(crate::sample_id::SampleId::intern("acc_only")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let muts = dag.node(ua).compact_genome.clone().edge_mutations_to(&leaf_cg, &reference);
        let mutation_count = muts.len();
        dag.add_edge(ua, leaf, 0, muts);

        let ops = WeightAccumulator(ParsimonyScore);
        let dp = compute_weight_below(&dag, &ops).expect("has root");
        let dist = &dp.weight_below[ua.0];
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.get(&mutation_count), Some(&BigUint::one()));
    }

    #[test]
    fn between_clades_convolves_two_cherries_distributions() {
        let reference = std::sync::Arc::new(crate::reference::Reference::new("ref", "GAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg_a = crate::compact_genome::CompactGenome::from_sequence("ACC", &reference).expect("valid");
        let leaf_cg_b = crate::compact_genome::CompactGenome::from_sequence("TAG", &reference).expect("valid");
        let a = dag.add_node(leaf_cg_a.clone(), Some(crate::sample_id::SampleId::intern("ch_a")));
        let b = dag.add_node(leaf_cg_b.clone(), Some(crate::sample_id::SampleId::intern("ch_b")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let root_cg = dag.node(ua).compact_genome.clone();
        let ma = root_cg.edge_mutations_to(&leaf_cg_a, &reference);
        let mb = root_cg.edge_mutations_to(&leaf_cg_b, &reference);
        let expected_total = ma.len() + mb.len();
        dag.add_edge(ua, a, 0, ma);
        dag.add_edge(ua, b, 1, mb);

        let ops = WeightAccumulator(ParsimonyScore);
        let dp = compute_weight_below(&dag, &ops).expect("has root");
        let dist = &dp.weight_below[ua.0];
        assert_eq!(dist.get(&expected_total), Some(&BigUint::one()));
    }
}
