//! A word-count job over a small partitioned dataset engine.
//!
//! Lines are read from a local path or an S3-compatible object store, split
//! into words, counted per distinct word and written back ordered by
//! frequency. The pipeline is declared against [`Dataset`]s, which are lazy:
//! nothing runs until an action such as [`Dataset::collect`] or
//! [`Dataset::save_as_text_file`] is called on an explicitly acquired
//! [`Context`].

use std::hash::{Hash, Hasher};

pub mod cmd;
pub mod codec;
pub mod context;
pub mod dataset;
pub mod error;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workload;

pub use context::{Context, ContextConfig};
pub use dataset::{Dataset, SortOrder};
pub use error::{Error, Result};

/// Hashes a shuffle key. The reduce bucket for a key is
/// `ihash(key) % n_partitions`.
pub fn ihash<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    key.hash(&mut hasher);
    (hasher.finish() & 0x7fff_ffff) as u32
}
