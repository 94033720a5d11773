//! `NodeLabel`: the canonical identity `(CG, LS, SampleId?)` used to
//! deduplicate nodes across merged DAGs (§3, §4.2).
use std::hash::{Hash, Hasher};

use crate::compact_genome::CompactGenome;
use crate::leaf_set::LeafSet;
use crate::sample_id::SampleId;

/// Canonical node identity. Equality (and hashing) follow the leaf/internal
/// split described in §3: a leaf (one with a `sample_id`) compares by
/// `(sample_id, leaf_set)`, ignoring its own CG; an internal node compares
/// by `(compact_genome, leaf_set)`.
#[derive(Debug, Clone)]
pub struct NodeLabel {
    pub compact_genome: CompactGenome,
    pub leaf_set: LeafSet,
    pub sample_id: Option<SampleId>,
}

impl NodeLabel {
    /// Builds a label for an internal node (no sample id).
    pub fn internal(compact_genome: CompactGenome, leaf_set: LeafSet) -> NodeLabel {
        NodeLabel {
            compact_genome,
            leaf_set,
            sample_id: None,
        }
    }

    /// Builds a label for a leaf node.
    pub fn leaf(compact_genome: CompactGenome, leaf_set: LeafSet, sample_id: SampleId) -> NodeLabel {
        NodeLabel {
            compact_genome,
            leaf_set,
            sample_id: Some(sample_id),
        }
    }

    fn is_leaf(&self) -> bool {
        self.sample_id.is_some()
    }
}

impl PartialEq for NodeLabel {
    fn eq(&self, other: &Self) -> bool {
        match (&self.sample_id, &other.sample_id) {
            (Some(a), Some(b)) => a == b && self.leaf_set == other.leaf_set,
            (None, None) => self.compact_genome == other.compact_genome && self.leaf_set == other.leaf_set,
            // A leaf and an internal node are never the same label, even if
            // one happens to carry a stray sample_id/CG collision.
            _ => false,
        }
    }
}
impl Eq for NodeLabel {}

impl Hash for NodeLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_leaf().hash(state);
        match &self.sample_id {
            Some(sample_id) => sample_id.hash(state),
            None => self.compact_genome.hash(state),
        }
        self.leaf_set.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_labels_ignore_compact_genome() {
        let sample = SampleId::intern("label_leaf");
        let ls = LeafSet::for_leaf(sample.clone());
        let cg_a = CompactGenome::empty();
        let mut data = crate::compact_genome::CompactGenomeData::new();
        data.insert(
            crate::mutation::MutationPosition(1),
            crate::mutation::MutationBase::A,
        );
        let cg_b = CompactGenome::intern(data);
        let a = NodeLabel::leaf(cg_a, ls.clone(), sample.clone());
        let b = NodeLabel::leaf(cg_b, ls, sample);
        assert_eq!(a, b);
    }

    #[test]
    fn internal_labels_compare_by_cg_and_leaf_set() {
        let sample_a = SampleId::intern("internal_a");
        let sample_b = SampleId::intern("internal_b");
        let ls1 = LeafSet::intern(vec![vec![sample_a]]);
        let ls2 = LeafSet::intern(vec![vec![sample_b]]);
        let cg = CompactGenome::empty();
        let a = NodeLabel::internal(cg.clone(), ls1);
        let b = NodeLabel::internal(cg, ls2);
        assert_ne!(a, b);
    }

    #[test]
    fn leaf_and_internal_never_equal() {
        let sample = SampleId::intern("leaf_vs_internal");
        let ls = LeafSet::for_leaf(sample.clone());
        let cg = CompactGenome::empty();
        let leaf = NodeLabel::leaf(cg.clone(), ls.clone(), sample);
        let internal = NodeLabel::internal(cg, ls);
        assert_ne!(leaf, internal);
    }
}
