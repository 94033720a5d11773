//! The reference sequence `R` that every compact genome is diffed against.
use std::fmt;

use crate::error::{MadagError, Result};
use crate::mutation::MutationBase;

/// A nonempty reference sequence over `{A,C,G,T}`.
///
/// Positions are exposed 1-indexed via [`Reference::base_at`] to match
/// [`crate::mutation::MutationPosition`]; internally the bases are stored
/// 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    name: String,
    bases: Vec<MutationBase>,
}

impl Reference {
    /// Builds a reference from a name and an unambiguous sequence string.
    /// Rejects an empty sequence and any character outside `{A,C,G,T}`
    /// (ambiguity codes are not permitted in the reference itself).
    pub fn new(name: impl Into<String>, sequence: &str) -> Result<Reference> {
        if sequence.is_empty() {
            return Err(MadagError::InputFormat(
                "reference sequence must be nonempty".to_owned(),
            ));
        }
        let mut bases = Vec::with_capacity(sequence.len());
        for c in sequence.chars() {
            let base = MutationBase::from_char(c.to_ascii_uppercase())
                .filter(|b| b.is_unambiguous())
                .ok_or(MadagError::InvalidBase(c))?;
            bases.push(base);
        }
        Ok(Reference {
            name: name.into(),
            bases,
        })
    }

    /// The reference's display name (e.g. a FASTA header).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the reference sequence.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Always false: [`Reference::new`] rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the base at 1-indexed `pos`, or `None` if out of range.
    pub fn base_at(&self, pos: usize) -> Option<MutationBase> {
        if pos == 0 {
            return None;
        }
        self.bases.get(pos - 1).copied()
    }

    /// Renders the reference back to a plain sequence string.
    pub fn to_sequence(&self) -> String {
        self.bases.iter().map(|b| b.to_string()).collect()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{} ({} bp)", self.name, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_valid_sequence() {
        let r = Reference::new("ref", "GAA").expect("valid sequence");
        assert_eq!(r.len(), 3);
        assert_eq!(r.base_at(1), Some(MutationBase::G));
        assert_eq!(r.base_at(3), Some(MutationBase::A));
        assert_eq!(r.base_at(4), None);
        assert_eq!(r.base_at(0), None);
    }

    #[test]
    fn rejects_empty_sequence() {
        assert!(Reference::new("ref", "").is_err());
    }

    #[test]
    fn rejects_ambiguous_or_invalid_characters() {
        assert!(Reference::new("ref", "GAN").is_err());
        assert!(Reference::new("ref", "GAX").is_err());
    }

    #[test]
    fn to_sequence_roundtrips() {
        let r = Reference::new("ref", "ACGT").expect("valid sequence");
        assert_eq!(r.to_sequence(), "ACGT");
    }
}
