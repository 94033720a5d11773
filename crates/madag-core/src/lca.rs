//! Lowest-common-ancestor queries over a tree-shaped [`Dag`] (§4.4, C7).
//!
//! Grounded on the upstream's own dedicated LCA routine (a dual upward walk
//! from both query nodes rather than a general DAG reachability search),
//! since the SPR engine only ever calls this on the single sampled tree `T`,
//! where every node has exactly one parent edge.
use crate::dag::{Dag, NodeId};
use crate::error::{MadagError, Result};

fn parent_of(dag: &Dag, node: NodeId) -> Option<NodeId> {
    dag.node(node).parents.first().map(|&edge_id| dag.edge(edge_id).parent)
}

/// Depth of `node` below the UA root (the root itself is depth 0).
pub fn depth(dag: &Dag, mut node: NodeId) -> usize {
    let mut d = 0;
    while let Some(parent) = parent_of(dag, node) {
        node = parent;
        d += 1;
    }
    d
}

/// The deepest node whose subtree contains both `a` and `b`: walks the
/// deeper node up until both are at equal depth, then walks both up in
/// lockstep until they coincide.
pub fn lca(dag: &Dag, a: NodeId, b: NodeId) -> Result<NodeId> {
    let depth_a = depth(dag, a);
    let depth_b = depth(dag, b);
    let (mut deeper, mut shallower, gap) = if depth_a >= depth_b {
        (a, b, depth_a - depth_b)
    } else {
        (b, a, depth_b - depth_a)
    };
    for _ in 0..gap {
        deeper = parent_of(dag, deeper).ok_or(MadagError::UnreachableNode { node: deeper.0 })?;
    }
    while deeper != shallower {
        deeper = parent_of(dag, deeper).ok_or(MadagError::UnreachableNode { node: deeper.0 })?;
        shallower = parent_of(dag, shallower).ok_or(MadagError::UnreachableNode { node: shallower.0 })?;
    }
    Ok(deeper)
}

/// True iff `descendant` is `ancestor`, or lies below it in the tree.
pub fn is_ancestor(dag: &Dag, ancestor: NodeId, mut descendant: NodeId) -> bool {
    loop {
        if descendant == ancestor {
            return true;
        }
        match parent_of(dag, descendant) {
            Some(parent) => descendant = parent,
            None => return false,
        }
    }
}

/// Number of edges on the path from `node` up to `ancestor` (which must
/// actually be an ancestor of `node`, including `node` itself at distance 0).
pub fn distance_to_ancestor(dag: &Dag, node: NodeId, ancestor: NodeId) -> Result<usize> {
    let mut current = node;
    let mut steps = 0;
    while current != ancestor {
        current = parent_of(dag, current).ok_or(MadagError::UnreachableNode { node: current.0 })?;
        steps += 1;
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lca_of_two_leaves_under_the_same_cherry_is_their_parent() {
        let dag = crate::formats::json::tiny_fixture_dag();
        // Fixture: node 7 -> {leaf_1, leaf_2}.
        let found = lca(&dag, NodeId(0), NodeId(1)).expect("fixture is a tree");
        assert_eq!(found, NodeId(6));
    }

    #[test]
    fn lca_of_a_node_and_its_own_ancestor_is_the_ancestor() {
        let dag = crate::formats::json::tiny_fixture_dag();
        let ua = dag.ua().expect("fixture has a root");
        let found = lca(&dag, NodeId(0), ua).expect("fixture is a tree");
        assert_eq!(found, ua);
    }

    #[test]
    fn is_ancestor_holds_transitively() {
        let dag = crate::formats::json::tiny_fixture_dag();
        let ua = dag.ua().expect("fixture has a root");
        assert!(is_ancestor(&dag, ua, NodeId(0)));
        assert!(!is_ancestor(&dag, NodeId(0), ua));
    }

    #[test]
    fn distance_to_ancestor_counts_edges() {
        let dag = crate::formats::json::tiny_fixture_dag();
        // leaf_1 (0) -> node 7 (idx 6) is one edge.
        let d = distance_to_ancestor(&dag, NodeId(0), NodeId(6)).expect("6 is an ancestor of 0");
        assert_eq!(d, 1);
    }
}
