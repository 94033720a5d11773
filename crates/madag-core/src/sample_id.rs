//! Process-wide deduplicating interner for leaf sample identifiers.
//!
//! Sample ids are the only piece of process-global mutable state besides the
//! compact-genome and leaf-set interners (see `interning.rs`); all three
//! share the same sharded-lock design so that concurrent merges never
//! serialize on a single global lock.
use std::fmt;
use std::sync::Arc;

use crate::interning::ShardedInterner;

/// A deduplicated handle to a sample name.
///
/// Cloning a `SampleId` is a cheap `Arc` clone; equality and hashing compare
/// the interned pointer identity's backing string, which is stable for the
/// life of the process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleId(Arc<str>);

impl SampleId {
    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for SampleId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SampleId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SampleId::intern(s))
    }
}

/// The process-wide sample-id interning table.
///
/// A sharded `Mutex<HashMap<...>>` keyed by the sample's string value,
/// matching the spec's "shared-read / sharded-write" requirement for
/// interning tables (§5).
pub static SAMPLE_IDS: ShardedInterner<String, Arc<str>> = ShardedInterner::new(|s: &String| Arc::from(s.as_str()));

impl SampleId {
    /// Interns a sample name, returning the deduplicated handle.
    pub fn intern(name: impl Into<String>) -> SampleId {
        SampleId(SAMPLE_IDS.intern_owned(name.into()))
    }
}
