//! State shared by every worker for the duration of a crawl

use crate::index::SharedIndex;
use crate::tree::{MetadataStore, NamespaceTree};
use crate::walker::queue::TaskQueue;
use crate::walker::task::Task;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters updated by workers while crawling
#[derive(Debug, Default)]
pub struct CrawlStats {
    /// Namespace roots processed
    pub namespaces: AtomicU64,

    /// Directories listed (namespace roots included)
    pub directories: AtomicU64,

    /// Regular files examined
    pub files: AtomicU64,

    /// New entries added to the result index
    pub recorded: AtomicU64,

    /// Object lookups answered by a per-task cache
    pub cache_hits: AtomicU64,

    /// Errors encountered
    pub errors: AtomicU64,

    /// Items skipped (vanished, permission denied)
    pub skipped: AtomicU64,
}

impl CrawlStats {
    pub(crate) fn record_namespace(&self) {
        self.namespaces.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dir(&self) {
        self.directories.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_entry(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of errors so far
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Everything a task needs besides its own payload
pub struct CrawlContext {
    pub tree: Arc<NamespaceTree>,
    pub store: Arc<dyn MetadataStore>,
    pub index: SharedIndex,
    pub queue: Arc<TaskQueue<Task>>,
    pub cache_capacity: usize,
    pub stats: Arc<CrawlStats>,
}
