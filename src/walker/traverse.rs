//! Task execution
//!
//! Each task variant maps to one function here. Failures never propagate
//! to the worker as errors: they are logged, counted in [`CrawlStats`] and
//! abandon only the file or subtree they concern. The returned
//! [`TaskOutcome`] is for the worker's own logging.
//!
//! [`CrawlStats`]: super::context::CrawlStats

use crate::error::{CrawlerError, TaskOutcome};
use crate::index::{ObjectIndex, PerTaskCache};
use crate::tag::FileTag;
use crate::tree::{EntryKind, MetaContext, Position};
use crate::walker::context::CrawlContext;
use crate::walker::task::{child_path, TargetSet, Task};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Run one task to completion, enqueuing any child tasks it discovers
pub fn execute(ctx: &CrawlContext, task: Task) -> TaskOutcome {
    match task {
        Task::Namespace { position, path } => namespace_task(ctx, position, path),
        Task::Directory { position, path } => directory_task(ctx, position, path, None),
        Task::File {
            position,
            path,
            name,
        } => file_task(ctx, position, path, name),
        Task::ObjectNamespace {
            position,
            path,
            targets,
        } => {
            ctx.stats.record_namespace();
            directory_task(ctx, position, path, Some(targets))
        }
        Task::ObjectDirectory {
            position,
            path,
            targets,
        } => directory_task(ctx, position, path, Some(targets)),
        Task::Shutdown => TaskOutcome::Skipped {
            path: String::new(),
            reason: "shutdown sentinel".into(),
        },
    }
}

/// Queue every subspace, then process the namespace root like a directory
fn namespace_task(ctx: &CrawlContext, position: Position, path: String) -> TaskOutcome {
    ctx.stats.record_namespace();

    let mut queued = 0;
    for &sub_id in &ctx.tree.namespace(position.namespace()).subspaces {
        let name = &ctx.tree.namespace(sub_id).name;
        match ctx.tree.traverse(&position, name) {
            Ok(child) if child.is_namespace_root() => {
                let sub_path = child_path(&path, name);
                debug!(path = %sub_path, "Queueing subspace");
                ctx.queue.enqueue(Task::Namespace {
                    position: child,
                    path: sub_path,
                });
                queued += 1;
            }
            Ok(child) => {
                ctx.stats.record_error();
                error!(
                    path = %path,
                    subspace = %name,
                    depth = child.depth(),
                    "Subspace did not resolve to a namespace root"
                );
            }
            Err(e) => report(ctx, &path, &e.into(), "Failed to enter subspace"),
        }
    }

    match directory_task(ctx, position, path, None) {
        TaskOutcome::Completed {
            path,
            entries,
            children,
        } => TaskOutcome::Completed {
            path,
            entries,
            children: children + queued,
        },
        other => other,
    }
}

/// List a directory: queue subdirectories, resolve regular files.
///
/// Without `targets` every object of every file is recorded; with `targets`
/// only the paths of files holding one of those objects are, and namespace
/// boundaries are not crossed.
fn directory_task(
    ctx: &CrawlContext,
    mut position: Position,
    path: String,
    targets: Option<TargetSet>,
) -> TaskOutcome {
    let ctxt = match position.fortify(&ctx.tree, ctx.store.as_ref()) {
        Ok(ctxt) => ctxt.clone(),
        Err(e) => return fail(ctx, path, e.into()),
    };

    let entries = match ctx.store.open_dir(&ctxt) {
        Ok(entries) => entries,
        Err(e) => return fail(ctx, path, e.into()),
    };
    ctx.stats.record_dir();

    let mut cache = targets
        .is_none()
        .then(|| PerTaskCache::new(ctx.cache_capacity));
    let mut listed = 0;
    let mut children = 0;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report(ctx, &path, &e.into(), "Failed to read directory entry");
                continue;
            }
        };
        if ctx.store.path_filter(&entry.name) || entry.is_special() {
            continue;
        }
        listed += 1;

        match entry.kind {
            EntryKind::Directory => {
                if queue_child(ctx, &position, &path, &entry.name, targets.as_ref()) {
                    children += 1;
                }
            }
            EntryKind::File => {
                ctx.stats.record_file();
                let file_path = child_path(&path, &entry.name);
                let result = match &targets {
                    None => record_objects(ctx, &ctxt, &entry.name, &file_path, cache.as_mut()),
                    Some(targets) => {
                        match_targets(ctx, &ctxt, &entry.name, &file_path, targets).map(|_| ())
                    }
                };
                if let Err(e) = result {
                    report(ctx, &file_path, &e, "Failed to resolve file objects");
                }
            }
            _ => trace!(path = %path, name = %entry.name, "Ignoring non-regular entry"),
        }
    }

    position.release();
    TaskOutcome::Completed {
        path,
        entries: listed,
        children,
    }
}

/// Record the objects of a single file
fn file_task(ctx: &CrawlContext, mut position: Position, path: String, name: String) -> TaskOutcome {
    let file_path = child_path(&path, &name);
    let ctxt = match position.fortify(&ctx.tree, ctx.store.as_ref()) {
        Ok(ctxt) => ctxt.clone(),
        Err(e) => return fail(ctx, file_path, e.into()),
    };

    ctx.stats.record_file();
    let outcome = match record_objects(ctx, &ctxt, &name, &file_path, None) {
        Ok(()) => TaskOutcome::Completed {
            path: file_path,
            entries: 1,
            children: 0,
        },
        Err(e) => fail(ctx, file_path, e),
    };
    position.release();
    outcome
}

/// Queue a task for subdirectory `name`. Returns whether one was queued.
fn queue_child(
    ctx: &CrawlContext,
    parent: &Position,
    parent_path: &str,
    name: &str,
    targets: Option<&TargetSet>,
) -> bool {
    let path = child_path(parent_path, name);
    let child = match ctx.tree.traverse(parent, name) {
        Ok(child) => child,
        Err(e) => {
            report(ctx, &path, &e.into(), "Failed to traverse into directory");
            return false;
        }
    };

    let task = match (targets, child.is_namespace_root()) {
        (None, true) => Task::Namespace {
            position: child,
            path,
        },
        (None, false) => Task::Directory {
            position: child,
            path,
        },
        (Some(_), true) => {
            debug!(path = %path, "Not crossing into namespace during object search");
            return false;
        }
        (Some(targets), false) => Task::ObjectDirectory {
            position: child,
            path,
            targets: Arc::clone(targets),
        },
    };

    trace!(task = %task, "Queueing child");
    ctx.queue.enqueue(task);
    true
}

fn read_tag(ctx: &CrawlContext, ctxt: &MetaContext, name: &str) -> Result<FileTag, CrawlerError> {
    let raw = ctx.store.file_tag(ctxt, name)?;
    Ok(FileTag::parse(&raw)?)
}

/// Add each object of a file to the index, consulting the cache first
fn record_objects(
    ctx: &CrawlContext,
    ctxt: &MetaContext,
    name: &str,
    file_path: &str,
    mut cache: Option<&mut PerTaskCache>,
) -> Result<(), CrawlerError> {
    let tag = read_tag(ctx, ctxt, name)?;

    for (chunk, object_id) in tag.object_ids() {
        if let Some(cache) = cache.as_deref_mut() {
            if cache.probe(&object_id) {
                ctx.stats.record_cache_hit();
                continue;
            }
            cache.insert(&object_id);
        }

        if ctx.index.lock().insert(&object_id) {
            ctx.stats.record_entry();
            debug!(
                path = %file_path,
                object = %object_id,
                fileno = tag.fileno,
                objno = chunk,
                "Recorded object"
            );
        }
    }
    Ok(())
}

/// Record `file_path` if any of its objects is a target.
/// Returns whether the file matched.
fn match_targets(
    ctx: &CrawlContext,
    ctxt: &MetaContext,
    name: &str,
    file_path: &str,
    targets: &ObjectIndex,
) -> Result<bool, CrawlerError> {
    let tag = read_tag(ctx, ctxt, name)?;

    for (_, object_id) in tag.object_ids() {
        if targets.contains(&object_id) {
            if ctx.index.lock().insert(file_path) {
                ctx.stats.record_entry();
                debug!(path = %file_path, object = %object_id, "Recorded file holding target object");
            }
            return Ok(true);
        }
    }
    Ok(false)
}

/// Count and log an error that does not end the current task
fn report(ctx: &CrawlContext, path: &str, error: &CrawlerError, what: &str) {
    if error.is_recoverable() {
        ctx.stats.record_skip();
        warn!(path = %path, error = %error, "{}", what);
    } else {
        ctx.stats.record_error();
        error!(path = %path, error = %error, "{}", what);
    }
}

/// Count an error that ends the current task
fn fail(ctx: &CrawlContext, path: String, error: CrawlerError) -> TaskOutcome {
    let outcome = TaskOutcome::from_error(path, error);
    match outcome {
        TaskOutcome::Skipped { .. } => ctx.stats.record_skip(),
        _ => ctx.stats.record_error(),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{shared, ObjectIndex};
    use crate::tag::stream_id;
    use crate::tree::{MemoryStore, NamespaceSpec, NamespaceTree};
    use crate::walker::context::CrawlStats;
    use crate::walker::queue::TaskQueue;
    use std::sync::atomic::Ordering;

    fn tag(ns: &str, objno: u64, offset: u64, bytes: u64) -> String {
        FileTag {
            objno,
            offset,
            bytes,
            ..FileTag::new("ctag", stream_id("repo", ns, 100, 200), 1000)
        }
        .to_string()
    }

    fn object(ns: &str, objno: u64) -> String {
        format!("ctag|{}.{}", stream_id("repo", ns, 100, 200), objno)
    }

    fn context(store: MemoryStore) -> CrawlContext {
        let root = NamespaceSpec::new("root")
            .repo("repo")
            .subspace(NamespaceSpec::new("a"))
            .subspace(NamespaceSpec::new("b"));
        CrawlContext {
            tree: Arc::new(NamespaceTree::build("/mnt", "/", root).unwrap()),
            store: Arc::new(store),
            index: shared(ObjectIndex::with_exponent(8).unwrap()),
            queue: Arc::new(TaskQueue::unbounded()),
            cache_capacity: 4,
            stats: Arc::new(CrawlStats::default()),
        }
    }

    fn drain(ctx: &CrawlContext) -> Vec<Task> {
        std::iter::from_fn(|| ctx.queue.try_dequeue()).collect()
    }

    #[test]
    fn test_directory_records_objects_and_queues_children() {
        let store = MemoryStore::new();
        store.add_file("/", "data/f1", tag("/", 0, 0, 2500));
        store.add_dir("/", "data/sub");
        let ctx = context(store);

        let position = ctx.tree.resolve("/mnt/data").unwrap();
        let outcome = execute(
            &ctx,
            Task::Directory {
                position,
                path: "/mnt/data".into(),
            },
        );
        assert!(matches!(
            outcome,
            TaskOutcome::Completed {
                entries: 2,
                children: 1,
                ..
            }
        ));

        let index = ctx.index.lock();
        assert_eq!(index.len(), 3);
        for objno in 0..3 {
            assert!(index.contains(&object("/", objno)));
        }
        drop(index);

        let queued = drain(&ctx);
        assert_eq!(queued.len(), 1);
        assert!(matches!(&queued[0], Task::Directory { path, .. } if path == "/mnt/data/sub"));
    }

    #[test]
    fn test_cache_absorbs_shared_objects() {
        let store = MemoryStore::new();
        store.add_file("/", "packed/f1", tag("/", 7, 0, 10));
        store.add_file("/", "packed/f2", tag("/", 7, 10, 10));
        store.add_file("/", "packed/f3", tag("/", 7, 20, 10));
        let ctx = context(store);

        let position = ctx.tree.resolve("/mnt/packed").unwrap();
        execute(
            &ctx,
            Task::Directory {
                position,
                path: "/mnt/packed".into(),
            },
        );

        assert_eq!(ctx.index.lock().len(), 1);
        assert_eq!(ctx.stats.cache_hits.load(Ordering::Relaxed), 2);
        assert_eq!(ctx.stats.files.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_namespace_queues_subspaces() {
        let store = MemoryStore::new();
        store.add_namespace("/a");
        store.add_namespace("/b");
        store.add_file("/", "top", tag("/", 1, 0, 1));
        let ctx = context(store);

        let outcome = execute(
            &ctx,
            Task::Namespace {
                position: ctx.tree.root_position(),
                path: "/mnt".into(),
            },
        );
        assert!(matches!(
            outcome,
            TaskOutcome::Completed {
                entries: 1,
                children: 2,
                ..
            }
        ));

        let mut paths: Vec<_> = drain(&ctx)
            .into_iter()
            .map(|t| {
                assert!(matches!(t, Task::Namespace { .. }));
                t.path().unwrap().to_string()
            })
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/mnt/a", "/mnt/b"]);
        assert!(ctx.index.lock().contains(&object("/", 1)));
    }

    #[test]
    fn test_bad_file_does_not_stop_directory() {
        let store = MemoryStore::new();
        store.add_untagged_file("/", "d/untagged");
        store.add_file("/", "d/garbled", "VER(9.9)");
        store.add_file("/", "d/good", tag("/", 4, 0, 1));
        let ctx = context(store);

        let position = ctx.tree.resolve("/mnt/d").unwrap();
        let outcome = execute(
            &ctx,
            Task::Directory {
                position,
                path: "/mnt/d".into(),
            },
        );
        assert!(outcome.is_success());
        assert_eq!(ctx.stats.error_count(), 2);
        assert!(ctx.index.lock().contains(&object("/", 4)));
    }

    #[test]
    fn test_unreadable_directory_fails_task() {
        let store = MemoryStore::new();
        store.add_dir("/", "broken");
        store.break_dir("/", "broken");
        let ctx = context(store);

        let position = ctx.tree.resolve("/mnt/broken").unwrap();
        let outcome = execute(
            &ctx,
            Task::Directory {
                position,
                path: "/mnt/broken".into(),
            },
        );
        assert!(matches!(outcome, TaskOutcome::Failed { .. }));
        assert_eq!(ctx.stats.error_count(), 1);
        assert!(drain(&ctx).is_empty());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let ctx = context(MemoryStore::new());
        let position = ctx.tree.resolve("/mnt/gone").unwrap();
        let outcome = execute(
            &ctx,
            Task::Directory {
                position,
                path: "/mnt/gone".into(),
            },
        );
        assert!(matches!(outcome, TaskOutcome::Skipped { .. }));
        assert_eq!(ctx.stats.skipped.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.stats.error_count(), 0);
    }

    #[test]
    fn test_file_task_records_without_cache() {
        let store = MemoryStore::new();
        store.add_file("/a", "f", tag("/a", 0, 900, 200));
        let ctx = context(store);

        let position = ctx.tree.resolve("/mnt/a").unwrap();
        let outcome = execute(
            &ctx,
            Task::File {
                position,
                path: "/mnt/a".into(),
                name: "f".into(),
            },
        );
        assert!(matches!(outcome, TaskOutcome::Completed { ref path, .. } if path == "/mnt/a/f"));
        assert_eq!(ctx.index.lock().len(), 2);
        assert_eq!(ctx.stats.cache_hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_object_directory_records_matching_paths() {
        let store = MemoryStore::new();
        store.add_file("/a", "d/hit", tag("/a", 5, 0, 1500));
        store.add_file("/a", "d/miss", tag("/a", 9, 0, 1));
        store.add_dir("/a", "d/deeper");
        let ctx = context(store);

        let mut wanted = ObjectIndex::with_capacity(1024).unwrap();
        wanted.insert(&object("/a", 6));
        let targets = Arc::new(wanted);

        let position = ctx.tree.resolve("/mnt/a/d").unwrap();
        execute(
            &ctx,
            Task::ObjectDirectory {
                position,
                path: "/mnt/a/d".into(),
                targets,
            },
        );

        let index = ctx.index.lock();
        assert_eq!(index.len(), 1);
        assert!(index.contains("/mnt/a/d/hit"));
        drop(index);

        let queued = drain(&ctx);
        assert_eq!(queued.len(), 1);
        assert!(matches!(&queued[0], Task::ObjectDirectory { path, .. } if path == "/mnt/a/d/deeper"));
    }

    #[test]
    fn test_shutdown_is_not_executed() {
        let ctx = context(MemoryStore::new());
        assert!(matches!(
            execute(&ctx, Task::Shutdown),
            TaskOutcome::Skipped { .. }
        ));
    }
}
