//! The merge engine (C4, §4.2): canonical-labelled, parallelism-aware union
//! of many input MADAGs into one result DAG.
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::compact_genome::CompactGenome;
use crate::dag::{Dag, EdgeId, NodeId};
use crate::edge_mutations::EdgeMutations;
use crate::error::{MadagError, Result};
use crate::leaf_set::LeafSet;
use crate::node_label::NodeLabel;
use crate::reference::Reference;
use crate::sample_id::SampleId;

const SHARD_COUNT: usize = 16;

fn shard_index(label: &NodeLabel) -> usize {
    let mut hasher = DefaultHasher::new();
    label.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

fn edge_shard_index(key: &(NodeId, NodeId, usize)) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

/// Accumulates the union of many input [`Dag`]s over a shared reference,
/// deduplicating nodes by [`NodeLabel`] and edges by
/// `(parent_label, child_label, clade_idx)`.
///
/// Grows incrementally: repeated calls to [`Merge::add_dag`] add more input
/// without rebuilding already-assigned ids. Node id allocation is monotonic
/// and the outcome is deterministic given a fixed sequence of `add_dag`
/// calls, independent of how much of each call's internal work runs in
/// parallel (§5 Ordering).
pub struct Merge {
    reference: Arc<Reference>,
    node_shards: Vec<Mutex<HashMap<NodeLabel, NodeId>>>,
    edge_shards: Vec<Mutex<HashMap<(NodeId, NodeId, usize), EdgeId>>>,
    labels: Mutex<Vec<NodeLabel>>,
    edge_list: Mutex<Vec<(NodeId, NodeId, usize)>>,
    next_edge_id: AtomicUsize,
}

impl Merge {
    /// Starts an empty merge accumulator over `reference`.
    pub fn new(reference: Arc<Reference>) -> Merge {
        Merge {
            reference,
            node_shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            edge_shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            labels: Mutex::new(Vec::new()),
            edge_list: Mutex::new(Vec::new()),
            next_edge_id: AtomicUsize::new(0),
        }
    }

    fn lock_labels(&self) -> std::sync::MutexGuard<'_, Vec<NodeLabel>> {
        self.labels.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_edge_list(&self) -> std::sync::MutexGuard<'_, Vec<(NodeId, NodeId, usize)>> {
        self.edge_list.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Inserts `label` into the node table if absent, returning the
    /// canonical id (freshly allocated or pre-existing). Concurrent callers
    /// racing on the same label's shard serialize on that shard's lock;
    /// allocation of a genuinely new id serializes on the `labels` lock,
    /// which is also what makes ids dense in `[0, node_count)`.
    fn intern_node(&self, label: NodeLabel) -> NodeId {
        let shard = &self.node_shards[shard_index(&label)];
        let mut table = shard.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(&id) = table.get(&label) {
            return id;
        }
        let mut labels = self.lock_labels();
        let id = NodeId(labels.len());
        labels.push(label.clone());
        table.insert(label, id);
        id
    }

    /// Inserts an edge label if absent, returning the canonical edge id.
    fn intern_edge(&self, key: (NodeId, NodeId, usize)) -> EdgeId {
        let shard = &self.edge_shards[edge_shard_index(&key)];
        let mut table = shard.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(&id) = table.get(&key) {
            return id;
        }
        let id = EdgeId(self.next_edge_id.fetch_add(1, Ordering::SeqCst));
        let mut edges = self.lock_edge_list();
        // Edge ids are allocated atomically but the parallel edge list is
        // appended under its own lock; pad with placeholders if another
        // thread's edge landed at a higher index first (edges may commit
        // out of order even though ids were drawn in order).
        if edges.len() <= id.0 {
            edges.resize(id.0 + 1, (NodeId(0), NodeId(0), 0));
        }
        edges[id.0] = key;
        table.insert(key, id);
        id
    }

    /// Adds one input DAG to the accumulator (§4.2 phases 1-4).
    ///
    /// Precondition: `dag`'s nodes already carry computed compact genomes
    /// (via [`Dag::recompute_compact_genomes`]) and its leaves carry sample
    /// ids; `dag`'s reference must equal this merge's reference by content.
    pub fn add_dag(&self, dag: &Dag) -> Result<()> {
        if dag.reference().name() != self.reference.name()
            || dag.reference().to_sequence() != self.reference.to_sequence()
        {
            return Err(MadagError::RefMismatch);
        }

        // Leaf-set phase: compute (but do not mutate `dag` with) each
        // node's LeafSet in postorder.
        let order = dag.postorder()?;
        let mut local_leaf_sets: Vec<Option<LeafSet>> = vec![None; dag.node_count()];
        for node in order {
            let data = dag.node(node);
            let ls = if data.is_leaf() {
                let sample_id = data
                    .sample_id
                    .clone()
                    .ok_or(MadagError::MissingSampleId { node: node.0 })?;
                LeafSet::for_leaf(sample_id)
            } else {
                let clade_sets = data
                    .clades
                    .iter()
                    .map(|clade| -> Result<Vec<SampleId>> {
                        let mut leaves: Vec<SampleId> = Vec::new();
                        for &edge_id in clade {
                            let child = dag.edge(edge_id).child;
                            let child_ls = local_leaf_sets[child.0]
                                .clone()
                                .ok_or(MadagError::UnreachableNode { node: child.0 })?;
                            leaves.extend(child_ls.all_leaves());
                        }
                        Ok(leaves)
                    })
                    .collect::<Result<Vec<_>>>()?;
                LeafSet::intern(clade_sets)
            };
            local_leaf_sets[node.0] = Some(ls);
        }

        // Node-assignment phase, parallel over input nodes.
        let local_to_global: Vec<NodeId> = (0..dag.node_count())
            .into_par_iter()
            .map(|i| -> Result<NodeId> {
                let node = dag.node(NodeId(i));
                let ls = local_leaf_sets[i].clone().ok_or(MadagError::UnreachableNode { node: i })?;
                let label = match &node.sample_id {
                    Some(sample_id) => NodeLabel::leaf(node.compact_genome.clone(), ls, sample_id.clone()),
                    None => NodeLabel::internal(node.compact_genome.clone(), ls),
                };
                Ok(self.intern_node(label))
            })
            .collect::<Result<Vec<_>>>()?;

        // Edge-assignment phase, parallel over input edges.
        dag.edge_ids().collect::<Vec<_>>().into_par_iter().for_each(|edge_id| {
            let edge = dag.edge(edge_id);
            let parent = local_to_global[edge.parent.0];
            let child = local_to_global[edge.child.0];
            self.intern_edge((parent, child, edge.clade_idx));
        });

        Ok(())
    }

    /// Number of distinct nodes assigned so far.
    pub fn node_count(&self) -> usize {
        self.lock_labels().len()
    }

    /// Connection phase (§4.2 step 5): materializes the result DAG from the
    /// interned labels and edges, recomputing edge mutations on demand
    /// (`edge_mutations_from_endpoints`) since they are a derived table, not
    /// part of the canonical label. Runs under the equivalent of the
    /// spec's "single write lock" by simply taking an exclusive snapshot of
    /// the accumulator's tables.
    pub fn build_result(&self) -> Result<Dag> {
        let labels = self.lock_labels();
        let edges = self.lock_edge_list();

        let mut dag = Dag::new(self.reference.clone());
        for label in labels.iter() {
            dag.add_node(label.compact_genome.clone(), label.sample_id.clone());
        }

        // Group this parent's outgoing edges by clade identity, not by the
        // input clade_idx each edge happened to carry: two alternative
        // subtrees for the same clade share a leaf span, and different
        // input trees may have numbered that clade differently. Edges whose
        // child shares a leaf set belong to the same clade; within a clade,
        // alternatives are ordered by child id so that repeated builds from
        // the same accumulator state are identical.
        let mut by_parent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &(parent, child, _clade_idx) in edges.iter() {
            by_parent.entry(parent).or_default().push(child);
        }

        let mut root_candidate = None;
        for node_id in dag.node_ids().collect::<Vec<_>>() {
            if dag.node(node_id).parents.is_empty() && dag.node(node_id).compact_genome == CompactGenome::empty()
            {
                root_candidate = Some(node_id);
            }
        }

        for (parent, children) in by_parent {
            let mut clades: HashMap<LeafSet, Vec<NodeId>> = HashMap::new();
            for child in children {
                clades.entry(labels[child.0].leaf_set.clone()).or_default().push(child);
            }
            let mut clade_groups: Vec<(LeafSet, Vec<NodeId>)> = clades.into_iter().collect();
            clade_groups.sort_by(|(a, _), (b, _)| a.data().cmp(b.data()));

            for (clade_idx, (_leaf_set, mut members)) in clade_groups.into_iter().enumerate() {
                members.sort_by_key(|child| child.0);
                for child in members {
                    let parent_cg = dag.node(parent).compact_genome.clone();
                    let child_cg = dag.node(child).compact_genome.clone();
                    let mutations = parent_cg.edge_mutations_to(&child_cg, &self.reference);
                    dag.add_edge(parent, child, clade_idx, mutations);
                }
            }
        }

        let root = dag
            .node_ids()
            .find(|id| dag.node(*id).parents.is_empty())
            .or(root_candidate)
            .ok_or(MadagError::EmptyGraph)?;
        dag.set_ua(root);
        dag.recompute_leaf_sets()?;
        Ok(dag)
    }
}

/// Convenience one-shot merge of a batch of DAGs that share a reference.
pub fn merge_all(reference: Arc<Reference>, dags: &[Dag]) -> Result<Dag> {
    let merge = Merge::new(reference);
    for dag in dags {
        merge.add_dag(dag)?;
    }
    merge.build_result()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::compact_genome::CompactGenome;

    fn single_leaf_tree(reference: &Arc<Reference>, sample: &str, seq: &str) -> Dag {
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = CompactGenome::from_sequence(seq, reference).expect("valid sequence");
        let leaf = dag.add_node(leaf_cg.clone(), Some(SampleId::intern(sample)));
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);
        let root_cg = dag.node(ua).compact_genome.clone();
        let muts = root_cg.edge_mutations_to(&leaf_cg, reference);
        dag.add_edge(ua, leaf, 0, muts);
        dag
    }

    #[test]
    fn merging_a_single_dag_is_idempotent_in_node_and_edge_count() {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let dag = single_leaf_tree(&reference, "only_leaf", "ACC");
        let merged = merge_all(reference, &[dag.clone()]).expect("single-tree merge succeeds");
        assert_eq!(merged.node_count(), dag.node_count());
        assert_eq!(merged.edge_count(), dag.edge_count());
    }

    #[test]
    fn merging_twice_yields_the_same_node_count() {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let dag = single_leaf_tree(&reference, "dup_leaf", "ACC");
        let merge = Merge::new(reference);
        merge.add_dag(&dag).expect("first add succeeds");
        merge.add_dag(&dag).expect("second add succeeds");
        let result = merge.build_result().expect("non-empty accumulator");
        assert_eq!(result.node_count(), dag.node_count());
        assert_eq!(result.edge_count(), dag.edge_count());
    }

    #[test]
    fn merging_two_distinct_single_leaf_trees_unions_leaves() {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let dag_a = single_leaf_tree(&reference, "leaf_a", "ACC");
        let dag_b = single_leaf_tree(&reference, "leaf_b", "TAG");
        let merged = merge_all(reference, &[dag_a, dag_b]).expect("two-tree merge succeeds");
        // Two distinct leaves plus one shared UA (both trees' UA has the
        // same empty-CG label, so it unifies into a single node).
        assert_eq!(merged.node_count(), 3);
        assert_eq!(merged.edge_count(), 2);
    }

    #[test]
    fn mismatched_reference_is_rejected() {
        let reference_a = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let reference_b = Arc::new(Reference::new("ref", "CCC").expect("valid sequence"));
        let dag_a = single_leaf_tree(&reference_a, "mismatch_a", "ACC");
        let merge = Merge::new(reference_b);
        assert!(matches!(merge.add_dag(&dag_a), Err(MadagError::RefMismatch)));
    }
}
