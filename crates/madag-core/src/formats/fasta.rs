//! Single-record FASTA reference loading/writing (§6).
use std::sync::Arc;

use crate::error::{MadagError, Result};
use crate::reference::Reference;

/// Parses a single-record FASTA file into a [`Reference`]. Line breaks
/// within the sequence body are unwrapped; anything past the first record
/// is ignored, matching the "single record, unwrapped" contract.
pub fn parse(text: &str) -> Result<Reference> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| MadagError::InputFormat("FASTA input is empty".to_owned()))?;
    let name = header
        .strip_prefix('>')
        .ok_or_else(|| MadagError::InputFormat("FASTA record must start with '>'".to_owned()))?
        .trim()
        .to_owned();
    let sequence: String = lines
        .take_while(|line| !line.starts_with('>'))
        .map(str::trim)
        .collect();
    Reference::new(name, &sequence)
}

/// Parses a reference and wraps it in an `Arc`, the shape every [`crate::dag::Dag`]
/// stores it in.
pub fn parse_arc(text: &str) -> Result<Arc<Reference>> {
    parse(text).map(Arc::new)
}

/// Renders `reference` back to single-record FASTA text.
pub fn write(reference: &Reference) -> String {
    format!(">{}\n{}\n", reference.name(), reference.to_sequence())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_record() {
        let r = parse(">ref\nGAA\n").expect("valid record");
        assert_eq!(r.name(), "ref");
        assert_eq!(r.to_sequence(), "GAA");
    }

    #[test]
    fn unwraps_multiline_sequence_bodies() {
        let r = parse(">ref\nGA\nA\n").expect("valid record");
        assert_eq!(r.to_sequence(), "GAA");
    }

    #[test]
    fn write_then_parse_roundtrips() {
        let original = Reference::new("round", "ACGT").expect("valid sequence");
        let text = write(&original);
        let parsed = parse(&text).expect("valid record");
        assert_eq!(parsed, original);
    }

    #[test]
    fn rejects_input_without_header() {
        assert!(parse("GAA\n").is_err());
    }
}
