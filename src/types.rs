use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;

/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
