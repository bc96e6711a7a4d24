//! Crawl coordinator - orchestrates the parallel namespace crawl
//!
//! The coordinator is responsible for:
//! - Setting up the task queue, result index and worker pool
//! - Seeding one task per target
//! - Waiting for the outstanding count to drain, with progress reporting
//! - Shutting the pool down with one sentinel per worker
//! - Writing the result index to the output file

use crate::config::{CrawlConfig, QueueCapacity};
use crate::error::{ConfigError, CrawlerError, Result};
use crate::index::{shared, ObjectIndex};
use crate::progress::ProgressReporter;
use crate::targets::Targets;
use crate::tree::{MetadataStore, NamespaceTree};
use crate::walker::context::{CrawlContext, CrawlStats};
use crate::walker::queue::TaskQueue;
use crate::walker::seed;
use crate::walker::task::Task;
use crate::walker::worker::{aggregate_stats, Worker};
use chrono::{DateTime, Local};
use std::fs::File;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the coordinator wakes to refresh progress
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a completed crawl
#[derive(Debug)]
pub struct CrawlResult {
    /// Directories listed, namespace roots included
    pub directories: u64,

    /// Regular files examined
    pub files: u64,

    /// Distinct identifiers or paths added to the index
    pub objects_recorded: u64,

    /// Object lookups answered by per-task caches
    pub cache_hits: u64,

    /// Per-item errors
    pub errors: u64,

    /// Items skipped because they vanished or were unreadable
    pub skipped: u64,

    /// Lines written to the output file
    pub entries_written: u64,

    /// Time taken for the crawl
    pub duration: Duration,
}

impl CrawlResult {
    /// True if every item was processed
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.skipped == 0
    }
}

/// Coordinates the parallel namespace crawl
pub struct CrawlCoordinator {
    /// Configuration
    config: CrawlConfig,

    /// Namespace hierarchy
    tree: Arc<NamespaceTree>,

    /// Metadata access
    store: Arc<dyn MetadataStore>,

    /// Output file, already truncated
    output: File,
}

impl CrawlCoordinator {
    /// Create a coordinator, truncating the output file
    pub fn new(
        config: CrawlConfig,
        tree: Arc<NamespaceTree>,
        store: Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let output = File::create(&config.output_path).map_err(|e| ConfigError::InvalidOutputPath {
            path: config.output_path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            config,
            tree,
            store,
            output,
        })
    }

    /// Run the crawl to completion
    pub fn run(mut self, progress: Option<&ProgressReporter>) -> Result<CrawlResult> {
        let start_time = Instant::now();
        let start_datetime: DateTime<Local> = Local::now();

        info!(
            start_time = %start_datetime.to_rfc3339(),
            mode = self.config.targets.mode(),
            targets = self.config.targets.len(),
            threads = self.config.threads,
            "Starting crawl"
        );

        let queue = Arc::new(match self.config.queue_capacity {
            QueueCapacity::Bounded(capacity) => TaskQueue::new(capacity)?,
            QueueCapacity::Unbounded => TaskQueue::unbounded(),
        });
        let index = shared(ObjectIndex::with_exponent(self.config.hash_exponent)?);
        let stats = Arc::new(CrawlStats::default());

        let ctx = Arc::new(CrawlContext {
            tree: Arc::clone(&self.tree),
            store: Arc::clone(&self.store),
            index: Arc::clone(&index),
            queue: Arc::clone(&queue),
            cache_capacity: self.config.cache_capacity,
            stats: Arc::clone(&stats),
        });

        // Workers first: seeding a bounded queue blocks until someone dequeues
        let workers = spawn_workers(&ctx, self.config.threads)?;

        self.seed(&ctx);
        self.wait_for_completion(&ctx, start_time, progress);

        for _ in &workers {
            queue.enqueue(Task::Shutdown);
        }
        let (tasks, failed, panicked) = aggregate_stats(&workers);
        for worker in workers {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
            }
        }
        debug!(tasks, failed, panicked, "Workers joined");

        drop(ctx);
        let queue_stats = (queue.stats().throughput(), queue.stats().wait_count());
        queue.destroy()?;
        debug!(
            tasks = queue_stats.0,
            producer_waits = queue_stats.1,
            "Task queue destroyed"
        );

        let entries_written = {
            let index = index.lock();
            debug!(
                entries = index.len(),
                buckets = index.capacity(),
                max_chain = index.max_chain(),
                "Writing result index"
            );
            index.dump(&mut self.output)? as u64
        };

        let duration = start_time.elapsed();
        let result = CrawlResult {
            directories: stats.directories.load(Ordering::Relaxed),
            files: stats.files.load(Ordering::Relaxed),
            objects_recorded: stats.recorded.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            errors: stats.errors.load(Ordering::Relaxed),
            skipped: stats.skipped.load(Ordering::Relaxed),
            entries_written,
            duration,
        };

        info!(
            end_time = %Local::now().to_rfc3339(),
            dirs = result.directories,
            files = result.files,
            recorded = result.objects_recorded,
            errors = result.errors,
            skipped = result.skipped,
            duration_secs = duration.as_secs(),
            "Crawl completed"
        );
        if result.errors > 0 {
            warn!(errors = result.errors, "Some items could not be processed; see log");
        }

        Ok(result)
    }

    /// Enqueue one task per target. Targets that cannot be resolved are
    /// logged and counted, the rest of the crawl goes ahead.
    fn seed(&self, ctx: &CrawlContext) {
        match &self.config.targets {
            Targets::Paths(paths) => {
                for target in paths {
                    match seed::path_task(ctx, target) {
                        Ok(Some(task)) => {
                            debug!(task = %task, "Seeding");
                            ctx.queue.enqueue(task);
                        }
                        Ok(None) => {
                            ctx.stats.record_skip();
                            warn!(path = %target, "Target is neither a directory nor a file");
                        }
                        Err(e) => seed_failed(ctx, target, &e),
                    }
                }
            }
            Targets::Objects(groups) => {
                for group in groups {
                    match seed::object_task(ctx, group) {
                        Ok(task) => {
                            debug!(task = %task, ids = group.ids.len(), "Seeding");
                            ctx.queue.enqueue(task);
                        }
                        Err(e) => seed_failed(ctx, &group.namespace, &e),
                    }
                }
            }
        }
    }

    /// Block until every queued task has completed
    fn wait_for_completion(
        &self,
        ctx: &CrawlContext,
        start_time: Instant,
        progress: Option<&ProgressReporter>,
    ) {
        loop {
            if ctx.queue.wait_all_done_for(POLL_INTERVAL) {
                break;
            }
            if let Some(reporter) = progress {
                reporter.update(&CrawlProgress::capture(
                    &ctx.stats,
                    ctx.queue.len(),
                    self.config.threads,
                    start_time.elapsed(),
                ));
            }
        }
    }
}

fn spawn_workers(ctx: &Arc<CrawlContext>, count: usize) -> Result<Vec<Worker>> {
    let mut workers = Vec::with_capacity(count);
    for id in 0..count {
        match Worker::spawn(id, Arc::clone(ctx)) {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                // Release whatever did start before giving up
                for _ in &workers {
                    ctx.queue.enqueue(Task::Shutdown);
                }
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(e.into());
            }
        }
    }
    info!(count = workers.len(), "Workers spawned");
    Ok(workers)
}

fn seed_failed(ctx: &CrawlContext, target: &str, error: &CrawlerError) {
    if error.is_recoverable() {
        ctx.stats.record_skip();
        warn!(target_path = %target, error = %error, "Skipping target");
    } else {
        ctx.stats.record_error();
        error!(target_path = %target, error = %error, "Failed to resolve target");
    }
}

/// Point-in-time view of a running crawl, for display
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    /// Directories listed
    pub dirs: u64,

    /// Files examined
    pub files: u64,

    /// Entries recorded
    pub recorded: u64,

    /// Cache hits
    pub cache_hits: u64,

    /// Errors encountered
    pub errors: u64,

    /// Current queue length
    pub queue_size: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Snapshot the shared counters
    pub fn capture(
        stats: &CrawlStats,
        queue_size: usize,
        total_workers: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            dirs: stats.directories.load(Ordering::Relaxed),
            files: stats.files.load(Ordering::Relaxed),
            recorded: stats.recorded.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            errors: stats.errors.load(Ordering::Relaxed),
            queue_size,
            total_workers,
            elapsed,
        }
    }

    /// Calculate files per second rate
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }

    /// Calculate dirs per second rate
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dirs as f64 / secs
        } else {
            0.0
        }
    }
}
