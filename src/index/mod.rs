//! Deduplication structures
//!
//! - [`ObjectIndex`]: the global result set, shared by every worker behind a
//!   single mutex
//! - [`PerTaskCache`]: a small LRU owned by one directory task

pub mod cache;
pub mod murmur;
pub mod table;

pub use cache::PerTaskCache;
pub use table::{ObjectIndex, KEY_SEED, MAX_EXPONENT};

use parking_lot::Mutex;
use std::sync::Arc;

/// Result index shared across worker threads
pub type SharedIndex = Arc<Mutex<ObjectIndex>>;

/// Wrap an index for sharing across workers
pub fn shared(index: ObjectIndex) -> SharedIndex {
    Arc::new(Mutex::new(index))
}
