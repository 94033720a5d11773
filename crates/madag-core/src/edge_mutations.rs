//! `EdgeMutations`: the per-edge diff between a parent and child compact
//! genome (§3, §4.1).
use std::collections::BTreeMap;

use crate::mutation::{MutationBase, MutationPosition};

/// Ordered mapping from position to `(parent_base, child_base)`, with
/// `parent_base != child_base` at every entry (enforced by the only
/// constructor, [`EdgeMutations::new`]).
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct EdgeMutations(BTreeMap<MutationPosition, (MutationBase, MutationBase)>);

impl EdgeMutations {
    /// Builds an `EdgeMutations` from a prebuilt map, dropping any entry
    /// where the parent and child base happen to be equal (defensive:
    /// callers constructing this from raw file data may not have enforced
    /// the invariant already).
    pub fn new(map: BTreeMap<MutationPosition, (MutationBase, MutationBase)>) -> EdgeMutations {
        EdgeMutations(map.into_iter().filter(|(_, (p, c))| p != c).collect())
    }

    /// No mutations: parent and child compact genomes are identical.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of mutated sites on this edge.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates `(position, (parent_base, child_base))` in position order.
    pub fn entries(&self) -> impl Iterator<Item = (&MutationPosition, &(MutationBase, MutationBase))> {
        self.0.iter()
    }

    /// The `(parent_base, child_base)` pair at `pos`, if mutated there.
    pub fn at(&self, pos: MutationPosition) -> Option<(MutationBase, MutationBase)> {
        self.0.get(&pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_drops_non_mutating_entries() {
        let mut map = BTreeMap::new();
        map.insert(MutationPosition(1), (MutationBase::A, MutationBase::A));
        map.insert(MutationPosition(2), (MutationBase::A, MutationBase::C));
        let muts = EdgeMutations::new(map);
        assert_eq!(muts.len(), 1);
        assert_eq!(muts.at(MutationPosition(1)), None);
        assert_eq!(muts.at(MutationPosition(2)), Some((MutationBase::A, MutationBase::C)));
    }

    #[test]
    fn default_is_empty() {
        assert!(EdgeMutations::default().is_empty());
    }
}
