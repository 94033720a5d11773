//! Copy-on-write overlay DAG (C6, §4.4): a wrapper over a base [`Dag`] that
//! records per-element modifications without mutating the base, used by the
//! SPR engine to build a hypothetical post-move tree.
//!
//! Each base node or edge is either pass-through (reads the base value) or
//! overlaid (reads a locally stored override); writing a feature promotes
//! the element to overlaid on first touch. New nodes and edges are appended
//! with fresh ids in an overlay-only id space, kept disjoint from the
//! base's ids via [`OverlayNodeId`]/[`OverlayEdgeId`].
use std::collections::HashMap;

use crate::compact_genome::CompactGenome;
use crate::dag::{Dag, EdgeId, NodeId};
use crate::edge_mutations::EdgeMutations;
use crate::error::Result;
use crate::sample_id::SampleId;

/// A node identifier in an overlay: either a pass-through reference into
/// the base DAG, or a fresh node appended within the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayNodeId {
    Base(NodeId),
    New(usize),
}

/// An edge identifier in an overlay, mirroring [`OverlayNodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayEdgeId {
    Base(EdgeId),
    New(usize),
}

#[derive(Debug, Clone)]
struct OverlayNode {
    compact_genome: CompactGenome,
    sample_id: Option<SampleId>,
    clades: Vec<Vec<OverlayEdgeId>>,
    parents: Vec<OverlayEdgeId>,
}

#[derive(Debug, Clone)]
struct OverlayEdge {
    parent: OverlayNodeId,
    child: OverlayNodeId,
    clade_idx: usize,
    mutations: EdgeMutations,
}

fn base_view(base: &Dag, node: NodeId) -> OverlayNode {
    let data = base.node(node);
    OverlayNode {
        compact_genome: data.compact_genome.clone(),
        sample_id: data.sample_id.clone(),
        clades: data
            .clades
            .iter()
            .map(|clade| clade.iter().map(|&e| OverlayEdgeId::Base(e)).collect())
            .collect(),
        parents: data.parents.iter().map(|&e| OverlayEdgeId::Base(e)).collect(),
    }
}

fn base_edge_view(base: &Dag, edge: EdgeId) -> OverlayEdge {
    let data = base.edge(edge);
    OverlayEdge {
        parent: OverlayNodeId::Base(data.parent),
        child: OverlayNodeId::Base(data.child),
        clade_idx: data.clade_idx,
        mutations: data.mutations.clone(),
    }
}

/// Copy-on-write view over `base`.
pub struct Overlay<'b> {
    base: &'b Dag,
    ua: OverlayNodeId,
    node_overrides: HashMap<NodeId, OverlayNode>,
    edge_overrides: HashMap<EdgeId, OverlayEdge>,
    new_nodes: Vec<OverlayNode>,
    new_edges: Vec<OverlayEdge>,
}

impl<'b> Overlay<'b> {
    /// Starts a fresh, all-pass-through overlay over `base`.
    pub fn new(base: &'b Dag) -> Result<Overlay<'b>> {
        let ua = base.ua()?;
        Ok(Overlay {
            base,
            ua: OverlayNodeId::Base(ua),
            node_overrides: HashMap::new(),
            edge_overrides: HashMap::new(),
            new_nodes: Vec::new(),
            new_edges: Vec::new(),
        })
    }

    /// The overlay's root. Unchanged from the base unless explicitly reset.
    pub fn ua(&self) -> OverlayNodeId {
        self.ua
    }

    fn base_view(&self, node: NodeId) -> OverlayNode {
        base_view(self.base, node)
    }

    fn base_edge_view(&self, edge: EdgeId) -> OverlayEdge {
        base_edge_view(self.base, edge)
    }

    /// Ensures `id` has an entry in the override table (cloning from the
    /// base on first touch) and returns a mutable reference to it.
    fn promote_node(&mut self, id: OverlayNodeId) -> &mut OverlayNode {
        match id {
            OverlayNodeId::New(i) => &mut self.new_nodes[i],
            OverlayNodeId::Base(n) => {
                let base = self.base;
                self.node_overrides.entry(n).or_insert_with(|| base_view(base, n))
            }
        }
    }

    fn promote_edge(&mut self, id: OverlayEdgeId) -> &mut OverlayEdge {
        match id {
            OverlayEdgeId::New(i) => &mut self.new_edges[i],
            OverlayEdgeId::Base(e) => {
                let base = self.base;
                self.edge_overrides.entry(e).or_insert_with(|| base_edge_view(base, e))
            }
        }
    }

    /// The compact genome currently visible at `node`.
    pub fn compact_genome(&self, node: OverlayNodeId) -> CompactGenome {
        match node {
            OverlayNodeId::New(i) => self.new_nodes[i].compact_genome.clone(),
            OverlayNodeId::Base(n) => self
                .node_overrides
                .get(&n)
                .map(|o| o.compact_genome.clone())
                .unwrap_or_else(|| self.base.node(n).compact_genome.clone()),
        }
    }

    /// Overwrites `node`'s compact genome, promoting it to overlaid.
    pub fn set_compact_genome(&mut self, node: OverlayNodeId, cg: CompactGenome) {
        self.promote_node(node).compact_genome = cg;
    }

    /// The sample id currently visible at `node`.
    pub fn sample_id(&self, node: OverlayNodeId) -> Option<SampleId> {
        match node {
            OverlayNodeId::New(i) => self.new_nodes[i].sample_id.clone(),
            OverlayNodeId::Base(n) => self
                .node_overrides
                .get(&n)
                .map(|o| o.sample_id.clone())
                .unwrap_or_else(|| self.base.node(n).sample_id.clone()),
        }
    }

    /// The clade list currently visible at `node`.
    pub fn clades(&self, node: OverlayNodeId) -> Vec<Vec<OverlayEdgeId>> {
        match node {
            OverlayNodeId::New(i) => self.new_nodes[i].clades.clone(),
            OverlayNodeId::Base(n) => self
                .node_overrides
                .get(&n)
                .map(|o| o.clades.clone())
                .unwrap_or_else(|| {
                    self.base
                        .node(n)
                        .clades
                        .iter()
                        .map(|clade| clade.iter().map(|&e| OverlayEdgeId::Base(e)).collect())
                        .collect()
                }),
        }
    }

    /// The parent node currently visible above `node`, or `None` if `node`
    /// is the root.
    pub fn parent_of(&self, node: OverlayNodeId) -> Option<OverlayNodeId> {
        let parents = match node {
            OverlayNodeId::New(i) => &self.new_nodes[i].parents,
            OverlayNodeId::Base(n) => match self.node_overrides.get(&n) {
                Some(o) => &o.parents,
                None => {
                    let first = self.base.node(n).parents.first()?;
                    return Some(self.edge(OverlayEdgeId::Base(*first)).0);
                }
            },
        };
        let &first = parents.first()?;
        Some(self.edge(first).0)
    }

    /// `(parent, child, clade_idx, mutations)` currently visible at `edge`.
    pub fn edge(&self, edge: OverlayEdgeId) -> (OverlayNodeId, OverlayNodeId, usize, EdgeMutations) {
        match edge {
            OverlayEdgeId::New(i) => {
                let e = &self.new_edges[i];
                (e.parent, e.child, e.clade_idx, e.mutations.clone())
            }
            OverlayEdgeId::Base(id) => match self.edge_overrides.get(&id) {
                Some(e) => (e.parent, e.child, e.clade_idx, e.mutations.clone()),
                None => {
                    let data = self.base.edge(id);
                    (
                        OverlayNodeId::Base(data.parent),
                        OverlayNodeId::Base(data.child),
                        data.clade_idx,
                        data.mutations.clone(),
                    )
                }
            },
        }
    }

    /// Overwrites `edge`'s mutation set, promoting it to overlaid.
    pub fn set_edge_mutations(&mut self, edge: OverlayEdgeId, mutations: EdgeMutations) {
        self.promote_edge(edge).mutations = mutations;
    }

    /// Appends a brand-new, parentless, childless node and returns its id.
    pub fn append_node(&mut self, compact_genome: CompactGenome, sample_id: Option<SampleId>) -> OverlayNodeId {
        let id = OverlayNodeId::New(self.new_nodes.len());
        self.new_nodes.push(OverlayNode {
            compact_genome,
            sample_id,
            clades: Vec::new(),
            parents: Vec::new(),
        });
        id
    }

    /// Appends a brand-new edge and wires it into both endpoints' adjacency.
    pub fn append_edge(
        &mut self,
        parent: OverlayNodeId,
        child: OverlayNodeId,
        clade_idx: usize,
        mutations: EdgeMutations,
    ) -> OverlayEdgeId {
        let id = OverlayEdgeId::New(self.new_edges.len());
        self.new_edges.push(OverlayEdge {
            parent,
            child,
            clade_idx,
            mutations,
        });
        let parent_node = self.promote_node(parent);
        if clade_idx == parent_node.clades.len() {
            parent_node.clades.push(Vec::new());
        }
        parent_node.clades[clade_idx].push(id);
        self.promote_node(child).parents.push(id);
        id
    }

    /// Re-points `edge`'s parent endpoint to `new_parent`'s `new_clade_idx`-th
    /// clade slot, removing it from its old parent's clade list. The edge's
    /// child endpoint and mutation set are untouched.
    pub fn retarget_edge_parent(&mut self, edge: OverlayEdgeId, new_parent: OverlayNodeId, new_clade_idx: usize) {
        let old_parent = self.node_ref_for_edge_parent(edge);
        {
            let old = self.promote_node(old_parent);
            for clade in &mut old.clades {
                clade.retain(|&e| e != edge);
            }
        }
        {
            let parent_node = self.promote_node(new_parent);
            if new_clade_idx == parent_node.clades.len() {
                parent_node.clades.push(Vec::new());
            }
            parent_node.clades[new_clade_idx].push(edge);
        }
        self.promote_edge(edge).parent = new_parent;
        self.promote_edge(edge).clade_idx = new_clade_idx;
    }

    fn node_ref_for_edge_parent(&mut self, edge: OverlayEdgeId) -> OverlayNodeId {
        self.promote_edge(edge).parent
    }

    /// Walks the overlay from its root and materializes a fresh, concrete
    /// [`Dag`] with dense ids, discarding the overlay/base distinction.
    pub fn materialize(&self) -> Result<Dag> {
        Ok(self.materialize_with_mapping()?.0)
    }

    /// As [`Overlay::materialize`], but also returns the
    /// `OverlayNodeId -> NodeId` mapping assigned during the walk, so a
    /// caller can translate overlay ids (e.g. a node it appended, or a base
    /// id it already held) into the materialized `Dag`'s id space.
    pub fn materialize_with_mapping(&self) -> Result<(Dag, HashMap<OverlayNodeId, NodeId>)> {
        let mut dag = Dag::new(self.base.reference().clone());
        let mut mapping: HashMap<OverlayNodeId, NodeId> = HashMap::new();

        fn copy_node(overlay: &Overlay, dag: &mut Dag, mapping: &mut HashMap<OverlayNodeId, NodeId>, id: OverlayNodeId) -> NodeId {
            if let Some(&existing) = mapping.get(&id) {
                return existing;
            }
            let new_id = dag.add_node(overlay.compact_genome(id), overlay.sample_id(id));
            mapping.insert(id, new_id);
            new_id
        }

        let root_new = copy_node(self, &mut dag, &mut mapping, self.ua);
        dag.set_ua(root_new);

        let mut stack = vec![self.ua];
        let mut visited: std::collections::HashSet<OverlayNodeId> = std::collections::HashSet::new();
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let node_new = mapping[&node];
            // `clade_idx` is renumbered densely here, skipping any clade left
            // empty by `retarget_edge_parent`: `Dag::add_edge` requires
            // clade indices to be contiguous from 0, and a pruned-but-not-
            // removed clade slot would otherwise leave a gap.
            let mut clade_idx = 0;
            for clade in self.clades(node) {
                if clade.is_empty() {
                    continue;
                }
                for edge_id in clade {
                    let (_, child, _, mutations) = self.edge(edge_id);
                    let child_new = copy_node(self, &mut dag, &mut mapping, child);
                    dag.add_edge(node_new, child_new, clade_idx, mutations);
                    stack.push(child);
                }
                clade_idx += 1;
            }
        }
        Ok((dag, mapping))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn untouched_overlay_materializes_identically_to_base() {
        let dag = crate::formats::json::tiny_fixture_dag();
        let overlay = Overlay::new(&dag).expect("fixture has a root");
        let materialized = overlay.materialize().expect("overlay walks to completion");
        assert_eq!(materialized.node_count(), dag.node_count());
        assert_eq!(materialized.edge_count(), dag.edge_count());
    }

    #[test]
    fn set_compact_genome_is_visible_without_mutating_the_base() {
        let dag = crate::formats::json::tiny_fixture_dag();
        let mut overlay = Overlay::new(&dag).expect("fixture has a root");
        let ua = overlay.ua();
        let fresh = CompactGenome::from_sequence("AAA", dag.reference()).unwrap_or_else(|_| CompactGenome::empty());
        overlay.set_compact_genome(ua, fresh.clone());
        assert_eq!(overlay.compact_genome(ua), fresh);
        let root = dag.ua().expect("fixture has a root");
        assert_eq!(dag.node(root).compact_genome, CompactGenome::empty());
    }

    #[test]
    fn appended_node_and_edge_are_visible_and_materialize() {
        let dag = crate::formats::json::tiny_fixture_dag();
        let mut overlay = Overlay::new(&dag).expect("fixture has a root");
        let ua = overlay.ua();
        let new_node = overlay.append_node(CompactGenome::empty(), None);
        let edge = overlay.append_edge(ua, new_node, overlay.clades(ua).len(), EdgeMutations::default());
        let (parent, child, _, _) = overlay.edge(edge);
        assert_eq!(parent, ua);
        assert_eq!(child, new_node);
        let materialized = overlay.materialize().expect("overlay walks to completion");
        assert_eq!(materialized.node_count(), dag.node_count() + 1);
        assert_eq!(materialized.edge_count(), dag.edge_count() + 1);
    }
}
