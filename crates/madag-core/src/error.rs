//! The error kinds produced by every layer of the core library.
//!
//! Mirrors the flat hand-rolled-enum style used throughout this crate
//! (see `GraphBuildError`/`MergeError` for the precedent): one variant per
//! failure mode, a `Display` impl that writes a short lowercase sentence, and
//! a marker `std::error::Error` impl. No `thiserror`.
use std::fmt;

/// Every fallible outcome the compact-genome, DAG, merge, DP, SPR, and
/// optimization layers can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MadagError {
    /// A file or byte stream did not match the expected format.
    InputFormat(String),
    /// Two inputs (or an input and the reference passed on the CLI) disagree
    /// on the reference sequence.
    RefMismatch,
    /// A leaf lacks a `sample_id` after loading.
    MissingSampleId {
        /// The node id that is missing its sample id.
        node: usize,
    },
    /// An input's edge mutations are inconsistent with its endpoint compact
    /// genomes, or a §3 invariant failed during an operation.
    InvariantViolation(String),
    /// SPR preconditions were violated.
    IllegalMove(String),
    /// The subtree-weight DP (or a traversal) was invoked on a DAG without a
    /// root.
    EmptyGraph,
    /// A query referenced a node unreachable from the root.
    UnreachableNode {
        /// The node id that could not be reached.
        node: usize,
    },
    /// A requested feature has no implementation in this build (e.g. ML
    /// scoring without the optional backend).
    UnsupportedFeature(String),
    /// A sequence was shorter than the reference it was diffed against.
    LengthMismatch {
        /// Expected length (the reference's).
        expected: usize,
        /// Actual length of the offending sequence.
        actual: usize,
    },
    /// A character outside `{A,C,G,T,N}` (or the accepted IUPAC set) was
    /// encountered while parsing a sequence.
    InvalidBase(char),
}

impl fmt::Display for MadagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MadagError::InputFormat(detail) => write!(f, "malformed input: {detail}"),
            MadagError::RefMismatch => {
                write!(f, "inputs disagree on the reference sequence")
            }
            MadagError::MissingSampleId { node } => {
                write!(f, "leaf node {node} has no sample id")
            }
            MadagError::InvariantViolation(detail) => {
                write!(f, "invariant violation: {detail}")
            }
            MadagError::IllegalMove(detail) => write!(f, "illegal SPR move: {detail}"),
            MadagError::EmptyGraph => write!(f, "operation requires a non-empty DAG with a root"),
            MadagError::UnreachableNode { node } => {
                write!(f, "node {node} is not reachable from the root")
            }
            MadagError::UnsupportedFeature(what) => write!(f, "unsupported feature: {what}"),
            MadagError::LengthMismatch { expected, actual } => write!(
                f,
                "sequence length {actual} does not match reference length {expected}"
            ),
            MadagError::InvalidBase(c) => write!(f, "invalid base character {c:?}"),
        }
    }
}

impl std::error::Error for MadagError {}

/// Shorthand result type used across the core library.
pub type Result<T> = std::result::Result<T, MadagError>;
