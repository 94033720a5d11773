//! The MADAG store (C2) and its traversal/topology operations (C3).
//!
//! Nodes and edges are arena-allocated: a [`Dag`] owns two dense `Vec`s and
//! hands out `NodeId`/`EdgeId` indices into them. This is the idiomatic
//! analogue of the upstream's raw-pointer node/edge graph — see
//! `DESIGN.md` for the grounding. Indexing a `Dag`'s own arenas by an id it
//! minted is treated as a trusted invariant, matching the workspace's
//! existing practice of plain `Vec`/`HashMap` indexing by an internally
//! consistent id (see the graph-store precedent this crate is built from).
use std::collections::VecDeque;
use std::sync::Arc;

use crate::compact_genome::CompactGenome;
use crate::edge_mutations::EdgeMutations;
use crate::error::{MadagError, Result};
use crate::leaf_set::LeafSet;
use crate::reference::Reference;
use crate::sample_id::SampleId;

/// Arena index of a node within one [`Dag`]. Not meaningful across DAGs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Arena index of an edge within one [`Dag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub usize);

/// A node's stored columns. `leaf_set` is derived and filled in by
/// [`Dag::recompute_leaf_sets`]; it is `None` until then.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub compact_genome: CompactGenome,
    pub sample_id: Option<SampleId>,
    pub leaf_set: Option<LeafSet>,
    /// One entry per clade; each clade is the set of edges leaving this node
    /// into one logical child subtree.
    pub clades: Vec<Vec<EdgeId>>,
    pub parents: Vec<EdgeId>,
}

impl NodeData {
    fn new(compact_genome: CompactGenome, sample_id: Option<SampleId>) -> NodeData {
        NodeData {
            compact_genome,
            sample_id,
            leaf_set: None,
            clades: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// A node is a leaf iff it carries a `sample_id`; leaves have no
    /// outgoing edges.
    pub fn is_leaf(&self) -> bool {
        self.sample_id.is_some()
    }
}

/// An edge's stored columns.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub parent: NodeId,
    pub child: NodeId,
    pub clade_idx: usize,
    pub mutations: EdgeMutations,
}

/// A mutation-annotated DAG: arena of nodes and edges over a shared
/// [`Reference`], with a distinguished universal-ancestor (UA) root.
#[derive(Debug, Clone)]
pub struct Dag {
    reference: Arc<Reference>,
    nodes: Vec<NodeData>,
    edges: Vec<EdgeData>,
    ua: Option<NodeId>,
}

impl Dag {
    /// An empty DAG over `reference`, with no nodes yet.
    pub fn new(reference: Arc<Reference>) -> Dag {
        Dag {
            reference,
            nodes: Vec::new(),
            edges: Vec::new(),
            ua: None,
        }
    }

    pub fn reference(&self) -> &Arc<Reference> {
        &self.reference
    }

    /// Appends a new node, returning its id. The first node added with
    /// `sample_id = None` and no declared parent becomes a UA candidate;
    /// callers building a DAG from scratch should call [`Dag::set_ua`]
    /// explicitly once the root is known.
    pub fn add_node(&mut self, compact_genome: CompactGenome, sample_id: Option<SampleId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(compact_genome, sample_id));
        id
    }

    /// Declares `node` as the universal-ancestor root.
    pub fn set_ua(&mut self, node: NodeId) {
        self.ua = Some(node);
    }

    /// Appends an edge from `parent` into `parent`'s `clade_idx`-th clade,
    /// ending at `child`, and wires up both endpoints' adjacency. Clade
    /// lists grow on demand: `clade_idx` may equal the parent's current
    /// clade count to start a new clade.
    pub fn add_edge(
        &mut self,
        parent: NodeId,
        child: NodeId,
        clade_idx: usize,
        mutations: EdgeMutations,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(EdgeData {
            parent,
            child,
            clade_idx,
            mutations,
        });
        let parent_node = &mut self.nodes[parent.0];
        if clade_idx == parent_node.clades.len() {
            parent_node.clades.push(Vec::new());
        }
        parent_node.clades[clade_idx].push(id);
        self.nodes[child.0].parents.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &EdgeData {
        &self.edges[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId)
    }

    /// The universal-ancestor root, if one has been declared.
    pub fn ua(&self) -> Result<NodeId> {
        self.ua.ok_or(MadagError::EmptyGraph)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_leaf()
    }

    /// Children of `id` across all clades, in clade order.
    pub fn child_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.node(id).clades.iter().flatten().copied()
    }

    /// All leaf node ids, in arena order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.node_ids().filter(|id| self.is_leaf(*id)).collect()
    }

    /// Preorder (root-to-leaves) traversal starting at the UA. A node may be
    /// visited through more than one parent edge in a DAG; each node is
    /// still yielded once, the first time all of its parents have been
    /// visited (Kahn-style topological order), so that preorder computations
    /// can assume every parent has already been processed.
    pub fn preorder(&self) -> Result<Vec<NodeId>> {
        let root = self.ua()?;
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(root);
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        // The UA has no parents by construction; everything else is only
        // enqueued once every parent edge has been consumed.
        while let Some(node) = queue.pop_front() {
            if seen[node.0] {
                continue;
            }
            seen[node.0] = true;
            order.push(node);
            for edge_id in self.child_edges(node) {
                let child = self.edge(edge_id).child;
                indegree[child.0] -= 1;
                if indegree[child.0] == 0 {
                    queue.push_back(child);
                }
            }
        }
        Ok(order)
    }

    /// Postorder (leaves-to-root): the reverse of [`Dag::preorder`], which
    /// already guarantees every node appears after all of its ancestors and
    /// therefore before none of its descendants.
    pub fn postorder(&self) -> Result<Vec<NodeId>> {
        let mut order = self.preorder()?;
        order.reverse();
        Ok(order)
    }

    /// Recomputes every node's compact genome via `cg_extend_by_edge` along
    /// a preorder walk: the UA's CG is the empty genome (`R` itself) and
    /// every other node's CG is its single incoming clade... except a DAG
    /// node may have multiple parent edges with different mutation sets
    /// only if they are redundant encodings of the same CG (merge-engine
    /// invariant); this walk simply uses the first parent edge encountered,
    /// which is correct for the common entry point of loading a tree file.
    pub fn recompute_compact_genomes(&mut self) -> Result<()> {
        let root = self.ua()?;
        self.nodes[root.0].compact_genome = CompactGenome::empty();
        for node in self.preorder()? {
            if node == root {
                continue;
            }
            let Some(&parent_edge) = self.nodes[node.0].parents.first() else {
                continue;
            };
            let edge = self.edges[parent_edge.0].clone();
            let parent_cg = self.nodes[edge.parent.0].compact_genome.clone();
            let child_cg = parent_cg.apply_edge(&edge.mutations, &self.reference);
            self.nodes[node.0].compact_genome = child_cg;
        }
        Ok(())
    }

    /// Recomputes every edge's `EdgeMutations` from its endpoints' compact
    /// genomes (the merge engine's "edge mutations are a separate derived
    /// table" rule, §4.2).
    pub fn recompute_edge_mutations(&mut self) {
        for edge in &mut self.edges {
            let parent_cg = &self.nodes[edge.parent.0].compact_genome;
            let child_cg = &self.nodes[edge.child.0].compact_genome;
            edge.mutations = parent_cg.edge_mutations_to(child_cg, &self.reference);
        }
    }

    /// Recomputes every node's [`LeafSet`] in postorder: leaves get their
    /// singleton set, internal nodes union their children's leaf sets
    /// per-clade.
    pub fn recompute_leaf_sets(&mut self) -> Result<()> {
        for node in self.postorder()? {
            let leaf_set = if self.is_leaf(node) {
                let sample_id = self.nodes[node.0]
                    .sample_id
                    .clone()
                    .ok_or(MadagError::MissingSampleId { node: node.0 })?;
                LeafSet::for_leaf(sample_id)
            } else {
                let mut clade_sets = Vec::with_capacity(self.nodes[node.0].clades.len());
                for clade in &self.nodes[node.0].clades {
                    let mut clade_leaves: Vec<SampleId> = Vec::new();
                    for edge_id in clade {
                        let child = self.edges[edge_id.0].child;
                        let child_ls = self.nodes[child.0]
                            .leaf_set
                            .clone()
                            .expect("postorder guarantees children are processed first");
                        clade_leaves.extend(child_ls.all_leaves());
                    }
                    clade_sets.push(clade_leaves);
                }
                LeafSet::intern(clade_sets)
            };
            self.nodes[node.0].leaf_set = Some(leaf_set);
        }
        Ok(())
    }

    /// True iff every non-UA node has exactly one parent edge (the
    /// tree-special-case invariant of §3).
    pub fn is_tree(&self) -> bool {
        let Ok(root) = self.ua() else { return false };
        self.nodes
            .iter()
            .enumerate()
            .all(|(i, n)| i == root.0 || n.parents.len() == 1)
    }

    /// Validates the §3 DAG invariants that are cheap to check structurally
    /// (acyclicity via the topological preorder, leaf sample-id presence,
    /// single UA clade). Consistency between edge mutations and endpoint CGs
    /// is checked by [`Dag::validate_edge_consistency`] since it requires
    /// the reference.
    pub fn validate_structure(&self) -> Result<()> {
        let root = self.ua()?;
        let order = self.preorder()?;
        if order.len() != self.nodes.len() {
            return Err(MadagError::InvariantViolation(
                "DAG contains a cycle or an unreachable node".to_owned(),
            ));
        }
        if self.nodes[root.0].clades.len() > 1 {
            return Err(MadagError::InvariantViolation(
                "UA root must have exactly one child clade".to_owned(),
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if i != root.0 && node.parents.is_empty() {
                return Err(MadagError::InvariantViolation(format!(
                    "non-root node {i} has no parent"
                )));
            }
            if node.is_leaf() && !node.clades.is_empty() {
                return Err(MadagError::InvariantViolation(format!(
                    "leaf node {i} has outgoing edges"
                )));
            }
            if !node.is_leaf() && node.clades.is_empty() && i != root.0 {
                // An internal, childless, non-root node is not itself
                // illegal by §3, but it has no leaves below it, which would
                // make leaf-set computation vacuous; flagged defensively.
            }
        }
        Ok(())
    }

    /// Checks the consistency law: for every edge, applying its mutations
    /// to the parent's CG yields the child's CG exactly.
    pub fn validate_edge_consistency(&self) -> Result<()> {
        for (i, edge) in self.edges.iter().enumerate() {
            let parent_cg = &self.nodes[edge.parent.0].compact_genome;
            let expected_child = parent_cg.apply_edge(&edge.mutations, &self.reference);
            if expected_child != self.nodes[edge.child.0].compact_genome {
                return Err(MadagError::InvariantViolation(format!(
                    "edge {i} mutations are inconsistent with its endpoint compact genomes"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact_genome::CompactGenome;

    /// Builds the standard 11-node/10-edge fixture from §8 scenario 1:
    /// reference "GAA", leaves 1..6 with sequences ACC/TAG/GGG/ACG/CTT/TCC,
    /// internals 7..10 with TGG/GTC/AGT/GAA, rooted at a UA above node 10.
    fn tiny_fixture() -> (Dag, Vec<NodeId>) {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let mut dag = Dag::new(reference.clone());
        let leaf_seqs = ["ACC", "TAG", "GGG", "ACG", "CTT", "TCC"];
        let internal_seqs = ["TGG", "GTC", "AGT", "GAA"];
        let mut ids = Vec::new();
        for (i, seq) in leaf_seqs.iter().enumerate() {
            let cg = CompactGenome::from_sequence(seq, &reference).expect("valid sequence");
            let sample = SampleId::intern(format!("leaf_{}", i + 1));
            ids.push(dag.add_node(cg, Some(sample)));
        }
        for seq in internal_seqs {
            let cg = CompactGenome::from_sequence(seq, &reference).expect("valid sequence");
            ids.push(dag.add_node(cg, None));
        }
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);

        // Topology: 7 -> {1, 2}; 8 -> {3, 4}; 9 -> {7, 8}; 10 -> {9, 5, 6}; UA -> {10}
        let n = |i: usize| ids[i - 1];
        let mk_edge = |dag: &mut Dag, parent: usize, child: usize, clade: usize| {
            let p = n(parent);
            let c = n(child);
            let m = dag.node(p).compact_genome.clone().edge_mutations_to(&dag.node(c).compact_genome.clone(), &reference);
            dag.add_edge(p, c, clade, m)
        };
        mk_edge(&mut dag, 7, 1, 0);
        mk_edge(&mut dag, 7, 2, 1);
        mk_edge(&mut dag, 8, 3, 0);
        mk_edge(&mut dag, 8, 4, 1);
        mk_edge(&mut dag, 9, 7, 0);
        mk_edge(&mut dag, 9, 8, 1);
        mk_edge(&mut dag, 10, 9, 0);
        mk_edge(&mut dag, 10, 5, 1);
        mk_edge(&mut dag, 10, 6, 2);
        let ua_cg = dag.node(ua).compact_genome.clone();
        let n10_cg = dag.node(n(10)).compact_genome.clone();
        let ua_edge_muts = ua_cg.edge_mutations_to(&n10_cg, &reference);
        dag.add_edge(ua, n(10), 0, ua_edge_muts);
        (dag, ids)
    }

    #[test]
    fn fixture_has_eleven_nodes_and_ten_edges() {
        let (dag, _) = tiny_fixture();
        assert_eq!(dag.node_count(), 11);
        assert_eq!(dag.edge_count(), 10);
    }

    #[test]
    fn preorder_visits_every_node_exactly_once() {
        let (dag, _) = tiny_fixture();
        let order = dag.preorder().expect("fixture has a UA root");
        assert_eq!(order.len(), 11);
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 11);
    }

    #[test]
    fn recompute_compact_genomes_is_idempotent_with_original_edge_mutations() {
        let (mut dag, ids) = tiny_fixture();
        let original_muts: Vec<EdgeMutations> = dag.edges.iter().map(|e| e.mutations.clone()).collect();
        dag.recompute_compact_genomes().expect("fixture has a UA root");
        dag.recompute_edge_mutations();
        let recomputed: Vec<EdgeMutations> = dag.edges.iter().map(|e| e.mutations.clone()).collect();
        assert_eq!(original_muts, recomputed);
        assert!(dag.validate_edge_consistency().is_ok());
        let _ = ids;
    }

    #[test]
    fn leaf_set_below_root_is_all_leaves() {
        let (mut dag, ids) = tiny_fixture();
        dag.recompute_leaf_sets().expect("fixture has a UA root");
        let ua = dag.ua().expect("fixture has a UA root");
        let ls = dag.node(ua).leaf_set.clone().expect("recomputed above");
        assert_eq!(ls.all_leaves().len(), 6);
        let _ = ids;
    }

    #[test]
    fn fixture_is_a_tree() {
        let (dag, _) = tiny_fixture();
        assert!(dag.is_tree());
    }

    #[test]
    fn ambiguous_leaf_has_one_fewer_mutation_on_its_incoming_edge() {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let unambiguous = CompactGenome::from_sequence("TAG", &reference).expect("valid sequence");
        let mut data = unambiguous.data().clone();
        data.insert(crate::mutation::MutationPosition(2), crate::mutation::MutationBase::N);
        data.insert(crate::mutation::MutationPosition(3), crate::mutation::MutationBase::N);
        let ambiguous = CompactGenome::intern(data);
        let root_cg = CompactGenome::empty();
        let unambiguous_edge = root_cg.edge_mutations_to(&unambiguous, &reference);
        let ambiguous_edge = root_cg.edge_mutations_to(&ambiguous, &reference);
        assert_eq!(ambiguous_edge.len(), unambiguous_edge.len() - 1);
    }
}
