//! The subtree-weight dynamic program (C5, §4.3): a generic bottom-up
//! semiring evaluation over a [`Dag`], plus the sampling, counting, and
//! trimming operations built on top of it.
pub mod accumulator;
pub mod parsimony;
pub mod sankoff;
pub mod tree_count;

use std::collections::HashMap;

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand::Rng;

use crate::dag::{Dag, EdgeId, NodeId};
use crate::error::{MadagError, Result};
use crate::weight::tree_count::TreeCount;

/// The semiring interface a weight function implements to plug into
/// [`SubtreeDp`].
pub trait WeightOps {
    /// Totally ordered weight type.
    type Weight: Clone + Ord;

    /// The weight contributed by a leaf on its own (no incoming edge yet
    /// considered).
    fn compute_leaf(&self, dag: &Dag, node: NodeId) -> Self::Weight;

    /// The weight contributed by one edge in isolation.
    fn compute_edge(&self, dag: &Dag, edge: EdgeId) -> Self::Weight;

    /// Combines an edge's own weight with the weight already accumulated
    /// below its child, yielding the weight of "this edge plus everything
    /// below it".
    fn above_node(&self, edge_weight: &Self::Weight, child_weight: &Self::Weight) -> Self::Weight;

    /// Picks the best weight(s) among the alternative edges of one clade,
    /// returning the optimum and the indices (into the input slice) that
    /// achieve it.
    fn within_clade_accum_optimum(&self, candidates: &[Self::Weight]) -> (Self::Weight, Vec<usize>);

    /// Combines the per-clade optimum weights into the node's total weight
    /// below it.
    fn between_clades(&self, clade_weights: &[Self::Weight]) -> Self::Weight;
}

/// Per-node memoized results of one DP pass: the optimal weight below each
/// node, and, for internal nodes, which edge(s) in each clade achieve that
/// optimum (needed by the samplers).
pub struct DpResult<W: Clone> {
    pub weight_below: Vec<W>,
    /// For each node, for each clade, the indices (into that clade's edge
    /// list) that achieve the clade's optimum.
    pub clade_optima: Vec<Vec<Vec<usize>>>,
}

/// Runs [`WeightOps::compute_leaf`]/`compute_edge`/etc. once per node in
/// postorder, memoizing every result (mandatory: DAG nodes may have
/// multiple parents but their subtree is evaluated exactly once).
pub fn compute_weight_below<O: WeightOps>(dag: &Dag, ops: &O) -> Result<DpResult<O::Weight>> {
    let order = dag.postorder()?;
    let mut weight_below: Vec<Option<O::Weight>> = vec![None; dag.node_count()];
    let mut clade_optima: Vec<Vec<Vec<usize>>> = vec![Vec::new(); dag.node_count()];

    for node in order {
        let data = dag.node(node);
        if data.is_leaf() {
            weight_below[node.0] = Some(ops.compute_leaf(dag, node));
            continue;
        }
        let mut per_clade_weights = Vec::with_capacity(data.clades.len());
        let mut per_clade_optima = Vec::with_capacity(data.clades.len());
        for clade in &data.clades {
            let candidates: Vec<O::Weight> = clade
                .iter()
                .map(|&edge_id| {
                    let child = dag.edge(edge_id).child;
                    let child_weight = weight_below[child.0]
                        .clone()
                        .expect("postorder guarantees children are evaluated first");
                    let edge_weight = ops.compute_edge(dag, edge_id);
                    ops.above_node(&edge_weight, &child_weight)
                })
                .collect();
            let (optimum, indices) = ops.within_clade_accum_optimum(&candidates);
            per_clade_weights.push(optimum);
            per_clade_optima.push(indices);
        }
        weight_below[node.0] = Some(ops.between_clades(&per_clade_weights));
        clade_optima[node.0] = per_clade_optima;
    }

    let weight_below = weight_below
        .into_iter()
        .enumerate()
        .map(|(i, w)| w.ok_or(MadagError::UnreachableNode { node: i }))
        .collect::<Result<Vec<_>>>()?;

    Ok(DpResult {
        weight_below,
        clade_optima,
    })
}

/// Samples a tree from `dag` under `ops`'s optimum, choosing uniformly
/// among each clade's optimum-achieving edges. Used for both
/// `min_weight_sample_tree` (DP already restricted to optima) and as the
/// building block for `uniform_sample_tree` with a different index-choice
/// rule supplied via `choose`.
fn sample_tree_with<O: WeightOps>(
    dag: &Dag,
    dp: &DpResult<O::Weight>,
    rng: &mut impl Rng,
    mut choose: impl FnMut(&mut dyn Rng, NodeId, usize, &[usize]) -> usize,
) -> Result<Dag> {
    let root = dag.ua()?;
    let mut sampled = Dag::new(dag.reference().clone());
    let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();

    fn copy_node(dag: &Dag, sampled: &mut Dag, mapping: &mut HashMap<NodeId, NodeId>, node: NodeId) -> NodeId {
        if let Some(&id) = mapping.get(&node) {
            return id;
        }
        let data = dag.node(node);
        let id = sampled.add_node(data.compact_genome.clone(), data.sample_id.clone());
        mapping.insert(node, id);
        id
    }

    let root_new = copy_node(dag, &mut sampled, &mut mapping, root);
    sampled.set_ua(root_new);

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let data = dag.node(node);
        let node_new = mapping[&node];
        for (clade_idx, clade) in data.clades.iter().enumerate() {
            if clade.is_empty() {
                continue;
            }
            let optima = &dp.clade_optima[node.0][clade_idx];
            let pick_within = choose(rng, node, clade_idx, optima);
            let edge_id = clade[optima[pick_within]];
            let edge = dag.edge(edge_id);
            let child_new = copy_node(dag, &mut sampled, &mut mapping, edge.child);
            sampled.add_edge(node_new, child_new, clade_idx, edge.mutations.clone());
            stack.push(edge.child);
        }
    }
    Ok(sampled)
}

/// `min_weight_sample_tree`: samples a weight-optimal tree, choosing
/// uniformly among each clade's optimum-achieving edges.
pub fn min_weight_sample_tree<O: WeightOps>(dag: &Dag, ops: &O, rng: &mut impl Rng) -> Result<Dag> {
    let dp = compute_weight_below(dag, ops)?;
    sample_tree_with::<O>(dag, &dp, rng, |rng, _node, _clade_idx, optima| rng.gen_range(0..optima.len()))
}

/// `sample_tree`: samples any tree embedded in the DAG, uniformly over each
/// clade's full edge list (not restricted to the weight optimum).
pub fn sample_tree<O: WeightOps>(dag: &Dag, ops: &O, rng: &mut impl Rng) -> Result<Dag> {
    let dp = compute_weight_below(dag, ops)?;
    let order = dag.preorder()?;
    let full_indices: Vec<Vec<Vec<usize>>> = order
        .iter()
        .map(|&node| dag.node(node).clades.iter().map(|clade| (0..clade.len()).collect()).collect())
        .collect();
    let dp_full = DpResult {
        weight_below: dp.weight_below,
        clade_optima: full_indices,
    };
    sample_tree_with::<O>(dag, &dp_full, rng, |rng, _node, _clade_idx, optima| {
        rng.gen_range(0..optima.len())
    })
}

/// `uniform_sample_tree`: samples any tree embedded in the DAG, choosing
/// within each clade with probability proportional to the number of
/// distinct subtrees embedded below each candidate child, so a child with
/// many alternative descendants is proportionally more likely to be picked
/// than one with a single descendant leaf.
pub fn uniform_sample_tree<O: WeightOps>(dag: &Dag, ops: &O, rng: &mut impl Rng) -> Result<Dag> {
    let dp = compute_weight_below(dag, ops)?;
    let counts = compute_weight_below(dag, &TreeCount)?;
    let order = dag.preorder()?;
    let full_indices: Vec<Vec<Vec<usize>>> = order
        .iter()
        .map(|&node| dag.node(node).clades.iter().map(|clade| (0..clade.len()).collect()).collect())
        .collect();
    let dp_full = DpResult {
        weight_below: dp.weight_below,
        clade_optima: full_indices,
    };
    sample_tree_with::<O>(dag, &dp_full, rng, |rng, node, clade_idx, optima| {
        let clade = &dag.node(node).clades[clade_idx];
        let weights: Vec<BigUint> =
            optima.iter().map(|&i| counts.weight_below[dag.edge(clade[i]).child.0].clone()).collect();
        let total = weights.iter().fold(BigUint::zero(), |acc, w| acc + w);
        let mut pick = rng.gen_biguint_range(&BigUint::zero(), &total);
        let mut chosen = weights.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if pick < *w {
                chosen = i;
                break;
            }
            pick -= w.clone();
        }
        chosen
    })
}

/// `trim_to_min_weight`: returns a new DAG containing exactly the nodes and
/// edges that participate in at least one minimum-weight tree.
pub fn trim_to_min_weight<O: WeightOps>(dag: &Dag, ops: &O) -> Result<Dag> {
    let dp = compute_weight_below(dag, ops)?;
    let mut trimmed = Dag::new(dag.reference().clone());
    let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
    let root = dag.ua()?;

    fn copy_node(dag: &Dag, trimmed: &mut Dag, mapping: &mut HashMap<NodeId, NodeId>, node: NodeId) -> NodeId {
        if let Some(&id) = mapping.get(&node) {
            return id;
        }
        let data = dag.node(node);
        let id = trimmed.add_node(data.compact_genome.clone(), data.sample_id.clone());
        mapping.insert(node, id);
        id
    }

    let root_new = copy_node(dag, &mut trimmed, &mut mapping, root);
    trimmed.set_ua(root_new);

    let mut stack = vec![root];
    let mut visited = vec![false; dag.node_count()];
    while let Some(node) = stack.pop() {
        if visited[node.0] {
            continue;
        }
        visited[node.0] = true;
        let data = dag.node(node);
        let node_new = mapping[&node];
        for (clade_idx, clade) in data.clades.iter().enumerate() {
            for &optimum_idx in &dp.clade_optima[node.0][clade_idx] {
                let edge_id = clade[optimum_idx];
                let edge = dag.edge(edge_id);
                let child_new = copy_node(dag, &mut trimmed, &mut mapping, edge.child);
                trimmed.add_edge(node_new, child_new, clade_idx, edge.mutations.clone());
                stack.push(edge.child);
            }
        }
    }
    Ok(trimmed)
}
