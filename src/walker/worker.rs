//! Worker threads
//!
//! Each worker:
//! - Dequeues a task, blocking while the queue is empty
//! - Exits on the shutdown sentinel
//! - Otherwise executes the task, which may enqueue children
//! - Marks the task complete only after execution returns

use crate::error::{TaskOutcome, WorkerError};
use crate::walker::context::CrawlContext;
use crate::walker::traverse;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Stack size for worker threads.
///
/// Pools may run tens of thousands of threads, so the default stack is far
/// too large. Tasks do not recurse; the deepest frames are tag parsing and
/// log formatting.
pub const WORKER_STACK_SIZE: usize = 256 * 1024;

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Tasks executed
    pub tasks: AtomicU64,

    /// Tasks that ended in failure
    pub failed: AtomicU64,

    /// Tasks that panicked
    pub panicked: AtomicU64,
}

impl WorkerStats {
    fn record_task(&self) {
        self.tasks.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }
}

/// A worker thread that executes crawl tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(id: usize, ctx: Arc<CrawlContext>) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("crawler-{}", id))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || worker_loop(id, ctx, stats_clone))
            .map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(id: usize, ctx: Arc<CrawlContext>, stats: Arc<WorkerStats>) {
    debug!(worker = id, "Worker starting");

    loop {
        let task = ctx.queue.dequeue();
        if task.is_shutdown() {
            ctx.queue.mark_complete();
            break;
        }

        let label = task.to_string();
        stats.record_task();

        // A panicking task must still be marked complete, or the
        // coordinator would wait forever.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| traverse::execute(&ctx, task)));

        match outcome {
            Ok(TaskOutcome::Completed {
                path,
                entries,
                children,
            }) => {
                trace!(worker = id, path = %path, entries, children, "Task completed");
            }
            Ok(TaskOutcome::Skipped { path, reason }) => {
                warn!(worker = id, path = %path, reason = %reason, "Task skipped");
            }
            Ok(TaskOutcome::Failed { path, error }) => {
                stats.record_failure();
                error!(worker = id, path = %path, error = %error, "Task failed");
            }
            Err(payload) => {
                stats.record_panic();
                ctx.stats.record_error();
                error!(
                    worker = id,
                    task = %label,
                    panic = %panic_message(payload.as_ref()),
                    "Task panicked"
                );
            }
        }

        ctx.queue.mark_complete();
    }

    info!(
        worker = id,
        tasks = stats.tasks.load(Ordering::Relaxed),
        failed = stats.failed.load(Ordering::Relaxed),
        "Worker shutting down"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Aggregate statistics from multiple workers: (tasks, failed, panicked)
pub fn aggregate_stats(workers: &[Worker]) -> (u64, u64, u64) {
    workers.iter().fold((0, 0, 0), |(tasks, failed, panicked), w| {
        (
            tasks + w.stats.tasks.load(Ordering::Relaxed),
            failed + w.stats.failed.load(Ordering::Relaxed),
            panicked + w.stats.panicked.load(Ordering::Relaxed),
        )
    })
}
