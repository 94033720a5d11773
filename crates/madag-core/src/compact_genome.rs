//! Compact-genome (CG) algebra: §4.1 (C1).
//!
//! A [`CompactGenome`] is a sparse, ordered diff against a [`Reference`]. The
//! underlying `BTreeMap<MutationPosition, MutationBase>` is never mutated in
//! place once built; instead every operation produces a new map which is
//! interned into the process-wide [`COMPACT_GENOMES`] table, so that two
//! nodes with an identical ancestral sequence always share one allocation
//! and compare equal by pointer as well as by value.
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::edge_mutations::EdgeMutations;
use crate::error::{MadagError, Result};
use crate::interning::ShardedInterner;
use crate::mutation::{MutationBase, MutationPosition};
use crate::reference::Reference;

/// The raw sparse diff: position -> base, with the invariant (enforced by
/// every constructor in this module) that no entry equals `R[pos]`.
pub type CompactGenomeData = BTreeMap<MutationPosition, MutationBase>;

#[derive(Debug)]
struct CompactGenomeInner {
    data: CompactGenomeData,
    hash: u64,
}

fn hash_data(data: &CompactGenomeData) -> u64 {
    // Order-sensitive hash over (pos, base.bits) pairs; `BTreeMap` iterates
    // in key order already, so this is stable regardless of insertion order.
    let mut hasher = DefaultHasher::new();
    for (pos, base) in data {
        pos.0.hash(&mut hasher);
        base.bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// A deduplicated handle to a [`CompactGenomeData`].
///
/// Equality and hashing are defined on the interned data, so two handles
/// produced from equal maps are always equal (and, since they come from the
/// same interning table, the same `Arc` allocation).
#[derive(Debug, Clone)]
pub struct CompactGenome(Arc<CompactGenomeInner>);

impl PartialEq for CompactGenome {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.data == other.0.data
    }
}
impl Eq for CompactGenome {}

impl Hash for CompactGenome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

/// The process-wide compact-genome interning table (§3 Lifecycle, §5).
pub static COMPACT_GENOMES: ShardedInterner<CompactGenomeData, Arc<CompactGenomeInner>> =
    ShardedInterner::new(|data| {
        Arc::new(CompactGenomeInner {
            data: data.clone(),
            hash: hash_data(data),
        })
    });

impl CompactGenome {
    /// Interns a raw diff map, returning the deduplicated handle.
    pub fn intern(data: CompactGenomeData) -> CompactGenome {
        CompactGenome(COMPACT_GENOMES.intern_owned(data))
    }

    /// The canonical empty genome ("identical to the reference").
    pub fn empty() -> CompactGenome {
        CompactGenome::intern(CompactGenomeData::new())
    }

    /// Borrows the underlying sparse map.
    pub fn data(&self) -> &CompactGenomeData {
        &self.0.data
    }

    /// `cg_from_sequence`: builds a CG from a full sequence diffed against
    /// `reference`. Positions equal to the reference are omitted.
    pub fn from_sequence(sequence: &str, reference: &Reference) -> Result<CompactGenome> {
        let chars: Vec<char> = sequence.chars().collect();
        if chars.len() != reference.len() {
            return Err(MadagError::LengthMismatch {
                expected: reference.len(),
                actual: chars.len(),
            });
        }
        let mut data = CompactGenomeData::new();
        for (i, c) in chars.iter().enumerate() {
            let pos = MutationPosition(i + 1);
            let base = MutationBase::from_char(c.to_ascii_uppercase())
                .ok_or(MadagError::InvalidBase(*c))?;
            let ref_base = reference
                .base_at(pos.0)
                .ok_or(MadagError::LengthMismatch {
                    expected: reference.len(),
                    actual: chars.len(),
                })?;
            if base != ref_base {
                data.insert(pos, base);
            }
        }
        Ok(CompactGenome::intern(data))
    }

    /// `cg_to_sequence`: materializes the full sequence this CG represents.
    pub fn to_sequence(&self, reference: &Reference) -> String {
        let mut out: Vec<MutationBase> = (1..=reference.len())
            .map(|p| reference.base_at(p).unwrap_or(MutationBase::N))
            .collect();
        for (pos, base) in self.data() {
            if pos.0 >= 1 && pos.0 <= out.len() {
                out[pos.0 - 1] = *base;
            }
        }
        out.iter().map(|b| b.to_string()).collect()
    }

    /// The base this CG implies at `pos`, resolving to the reference when
    /// the position is not in the diff (`get_base` / `HasMutationAtPosition`
    /// combined).
    pub fn base_at(&self, pos: MutationPosition, reference: &Reference) -> Option<MutationBase> {
        self.data().get(&pos).copied().or_else(|| reference.base_at(pos.0))
    }

    /// `HasMutationAtPosition`.
    pub fn has_mutation_at(&self, pos: MutationPosition) -> bool {
        self.data().contains_key(&pos)
    }

    /// True iff any entry in the diff is an ambiguous base.
    pub fn contains_ambiguity(&self) -> bool {
        self.data().values().any(|b| b.is_ambiguous())
    }

    /// `cg_extend_by_edge`: applies `mutations` on top of `self` (the parent
    /// CG) to derive the child CG, snapping entries that return to the
    /// reference back out of the map.
    pub fn apply_edge(&self, mutations: &EdgeMutations, reference: &Reference) -> CompactGenome {
        let mut data = self.data().clone();
        for (pos, (_, child_base)) in mutations.entries() {
            let ref_base = reference.base_at(pos.0);
            if Some(*child_base) == ref_base {
                data.remove(pos);
            } else {
                data.insert(*pos, *child_base);
            }
        }
        CompactGenome::intern(data)
    }

    /// `edge_mutations_from_endpoints`: derives the symmetric-difference
    /// edge mutations between `self` (parent) and `child`, resolved against
    /// `reference`.
    pub fn edge_mutations_to(&self, child: &CompactGenome, reference: &Reference) -> EdgeMutations {
        let mut positions: Vec<MutationPosition> =
            self.data().keys().chain(child.data().keys()).copied().collect();
        positions.sort_unstable();
        positions.dedup();

        let mut out = BTreeMap::new();
        for pos in positions {
            let Some(parent_base) = self.base_at(pos, reference) else {
                continue;
            };
            let Some(child_base) = child.base_at(pos, reference) else {
                continue;
            };
            if parent_base != child_base {
                out.insert(pos, (parent_base, child_base));
            }
        }
        EdgeMutations::new(out)
    }

    /// `cg_is_compatible`: for every position present in either CG, the
    /// resolved bases share a bit.
    pub fn is_compatible(&self, other: &CompactGenome, reference: &Reference) -> bool {
        self.differing_sites(other, reference).is_empty()
    }

    /// `cg_differing_sites`: positions where the two CGs' resolved bases are
    /// incompatible.
    pub fn differing_sites(&self, other: &CompactGenome, reference: &Reference) -> Vec<MutationPosition> {
        let mut positions: Vec<MutationPosition> =
            self.data().keys().chain(other.data().keys()).copied().collect();
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .filter(|pos| {
                let a = self.base_at(*pos, reference);
                let b = other.base_at(*pos, reference);
                match (a, b) {
                    (Some(a), Some(b)) => !a.is_compatible(b),
                    _ => true,
                }
            })
            .collect()
    }
}
