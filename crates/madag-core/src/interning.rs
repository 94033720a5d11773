//! Sharded-lock interning table shared by the compact-genome, leaf-set, and
//! sample-id interners (§5: "shared-read / sharded-write" process-wide
//! state).
//!
//! A single global `Mutex<HashMap<...>>` would serialize every interning
//! insertion across all threads of a merge. Sharding by the key's hash
//! bounds lock contention to the threads that happen to land on the same
//! bucket, while keeping a plain `HashMap` (no external concurrent-map
//! dependency) inside each shard.
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock};

const SHARD_COUNT: usize = 16;

/// A process-wide, lazily-initialized interning table from `K` to `V`.
///
/// `make` constructs the canonical value for a key the first time it is
/// seen; subsequent lookups of an equal key return a clone of the existing
/// value (cheap for the `Arc`-based values this crate interns).
pub struct ShardedInterner<K, V> {
    shards: OnceLock<Vec<Mutex<HashMap<K, V>>>>,
    make: fn(&K) -> V,
}

impl<K, V> ShardedInterner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a new interner. Usable in a `static` initializer.
    pub const fn new(make: fn(&K) -> V) -> Self {
        Self {
            shards: OnceLock::new(),
            make,
        }
    }

    fn shards(&self) -> &Vec<Mutex<HashMap<K, V>>> {
        self.shards
            .get_or_init(|| (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect())
    }

    fn shard_index(key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % SHARD_COUNT
    }

    /// Interns `key`, returning the deduplicated canonical value.
    pub fn intern_owned(&self, key: K) -> V {
        let shards = self.shards();
        let shard = &shards[Self::shard_index(&key)];
        let mut table = shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = table.get(&key) {
            return existing.clone();
        }
        let value = (self.make)(&key);
        table.insert(key, value.clone());
        value
    }

    /// The number of distinct keys interned so far, summed across shards.
    /// Exposed for tests and diagnostics only.
    pub fn len(&self) -> usize {
        self.shards().iter().map(|s| s.lock().unwrap_or_else(|p| p.into_inner()).len()).sum()
    }

    /// True iff nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
