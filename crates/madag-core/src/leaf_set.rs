//! LeafSet (LS): the canonical clade structure used for node identity in the
//! merge engine (§3, §4.2).
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::interning::ShardedInterner;
use crate::sample_id::SampleId;

/// A sorted list of sorted lists of sample ids: one inner list per clade of
/// the node it describes. Leaves have `[[self_sample_id]]`.
pub type LeafSetData = Vec<Vec<SampleId>>;

fn normalize(mut clades: LeafSetData) -> LeafSetData {
    for clade in &mut clades {
        clade.sort();
        clade.dedup();
    }
    clades.sort();
    clades
}

#[derive(Debug)]
struct LeafSetInner {
    data: LeafSetData,
    hash: u64,
}

fn hash_data(data: &LeafSetData) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

/// A deduplicated handle to a [`LeafSetData`].
#[derive(Debug, Clone)]
pub struct LeafSet(Arc<LeafSetInner>);

impl PartialEq for LeafSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.data == other.0.data
    }
}
impl Eq for LeafSet {}

impl Hash for LeafSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

/// The process-wide leaf-set interning table.
pub static LEAF_SETS: ShardedInterner<LeafSetData, Arc<LeafSetInner>> = ShardedInterner::new(|data| {
    Arc::new(LeafSetInner {
        data: data.clone(),
        hash: hash_data(data),
    })
});

impl LeafSet {
    /// Interns a list of per-clade leaf lists, sorting and deduplicating
    /// each clade and the outer list so that equal clade structures always
    /// produce an equal `LeafSet` regardless of child-edge order.
    pub fn intern(clades: LeafSetData) -> LeafSet {
        LeafSet(LEAF_SETS.intern_owned(normalize(clades)))
    }

    /// The leaf-set of a leaf node: a single clade containing only itself.
    pub fn for_leaf(sample_id: SampleId) -> LeafSet {
        LeafSet::intern(vec![vec![sample_id]])
    }

    /// Computes the parent's leaf set from its children's leaf sets: one
    /// clade per child, each clade the union of that child's own leaves
    /// across all of *its* clades (`ComputeLS`, bottom-up).
    pub fn from_children<'a>(children: impl IntoIterator<Item = &'a LeafSet>) -> LeafSet {
        let clades: LeafSetData = children
            .into_iter()
            .map(|child| child.data().iter().flatten().cloned().collect())
            .collect();
        LeafSet::intern(clades)
    }

    /// Borrows the underlying per-clade lists.
    pub fn data(&self) -> &LeafSetData {
        &self.0.data
    }

    /// All leaves below this node, across every clade, deduplicated.
    pub fn all_leaves(&self) -> Vec<SampleId> {
        let mut all: Vec<SampleId> = self.data().iter().flatten().cloned().collect();
        all.sort();
        all.dedup();
        all
    }

    /// Number of clades.
    pub fn clade_count(&self) -> usize {
        self.data().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_set_is_insensitive_to_clade_order() {
        let a = SampleId::intern("a");
        let b = SampleId::intern("b");
        let ls1 = LeafSet::intern(vec![vec![a.clone()], vec![b.clone()]]);
        let ls2 = LeafSet::intern(vec![vec![b], vec![a]]);
        assert_eq!(ls1, ls2);
    }

    #[test]
    fn for_leaf_is_single_singleton_clade() {
        let a = SampleId::intern("leaf_a");
        let ls = LeafSet::for_leaf(a.clone());
        assert_eq!(ls.clade_count(), 1);
        assert_eq!(ls.all_leaves(), vec![a]);
    }

    #[test]
    fn from_children_unions_per_child() {
        let a = SampleId::intern("union_a");
        let b = SampleId::intern("union_b");
        let c = SampleId::intern("union_c");
        let child1 = LeafSet::intern(vec![vec![a.clone()], vec![b.clone()]]);
        let child2 = LeafSet::for_leaf(c.clone());
        let parent = LeafSet::from_children([&child1, &child2]);
        assert_eq!(parent.clade_count(), 2);
        let mut leaves = parent.all_leaves();
        leaves.sort();
        let mut expected = vec![a, b, c];
        expected.sort();
        assert_eq!(leaves, expected);
    }
}
