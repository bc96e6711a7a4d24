//! Initial tasks built from the scan targets

use crate::error::{CrawlerError, TreeError};
use crate::targets::ObjectGroup;
use crate::tree::EntryKind;
use crate::walker::context::CrawlContext;
use crate::walker::task::Task;
use std::path::Path;
use std::sync::Arc;

/// Build the task for a user path.
///
/// Returns `Ok(None)` when the path names something that is neither a
/// directory nor a regular file.
pub fn path_task(ctx: &CrawlContext, target: &str) -> Result<Option<Task>, CrawlerError> {
    let tree = &ctx.tree;
    let position = tree.resolve(target)?;
    let path = tree.user_path(&position);

    // Subspace roots live outside their parent's listing; no stat needed
    if position.is_namespace_root() {
        return Ok(Some(Task::Namespace { position, path }));
    }

    let name = match Path::new(&path).file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Ok(Some(Task::Namespace { position, path })),
    };
    let mut parent = tree.traverse(&position, "..")?;
    let kind = {
        let ctxt = parent.fortify(tree, ctx.store.as_ref())?;
        ctx.store.entry_kind(ctxt, &name)?
    };

    let task = match kind {
        EntryKind::Directory => {
            parent.release();
            Some(Task::Directory { position, path })
        }
        // The fortified parent is kept; the file task reuses it
        EntryKind::File => Some(Task::File {
            path: tree.user_path(&parent),
            position: parent,
            name,
        }),
        EntryKind::Symlink | EntryKind::Other => None,
    };
    Ok(task)
}

/// Build the reverse-lookup task for one namespace's object identifiers
pub fn object_task(ctx: &CrawlContext, group: &ObjectGroup) -> Result<Task, CrawlerError> {
    let tree = &ctx.tree;
    let target = format!(
        "{}{}",
        tree.mountpoint().display(),
        group.namespace.trim_end_matches('/')
    );
    let position = tree.resolve(&target)?;
    if !position.is_namespace_root() {
        return Err(TreeError::NotNamespace { path: target }.into());
    }

    Ok(Task::ObjectNamespace {
        path: tree.user_path(&position),
        position,
        targets: Arc::clone(&group.ids),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaError;
    use crate::index::{shared, ObjectIndex};
    use crate::tree::{MemoryStore, NamespaceSpec, NamespaceTree};
    use crate::walker::context::CrawlStats;
    use crate::walker::queue::TaskQueue;

    fn context(store: MemoryStore) -> CrawlContext {
        let root = NamespaceSpec::new("root")
            .repo("repo")
            .subspace(NamespaceSpec::new("a").subspace(NamespaceSpec::new("b")));
        CrawlContext {
            tree: Arc::new(NamespaceTree::build("/mnt", "/", root).unwrap()),
            store: Arc::new(store),
            index: shared(ObjectIndex::with_exponent(4).unwrap()),
            queue: Arc::new(TaskQueue::unbounded()),
            cache_capacity: 4,
            stats: Arc::new(CrawlStats::default()),
        }
    }

    fn group(namespace: &str) -> ObjectGroup {
        ObjectGroup {
            namespace: namespace.to_string(),
            ids: Arc::new(ObjectIndex::with_capacity(8).unwrap()),
        }
    }

    #[test]
    fn test_namespace_targets() {
        let ctx = context(MemoryStore::new());

        let task = path_task(&ctx, "/mnt").unwrap().unwrap();
        assert!(matches!(task, Task::Namespace { ref path, .. } if path == "/mnt"));

        let task = path_task(&ctx, "/mnt/a/b").unwrap().unwrap();
        assert!(matches!(task, Task::Namespace { ref path, .. } if path == "/mnt/a/b"));
    }

    #[test]
    fn test_directory_and_file_targets() {
        let store = MemoryStore::new();
        store.add_dir("/a", "dir");
        store.add_file("/a", "dir/file", "tag");
        let ctx = context(store);

        let task = path_task(&ctx, "/mnt/a/dir").unwrap().unwrap();
        match task {
            Task::Directory { position, path } => {
                assert_eq!(path, "/mnt/a/dir");
                assert_eq!(position.depth(), 1);
                assert!(position.context().is_none());
            }
            other => panic!("unexpected {}", other),
        }

        let task = path_task(&ctx, "/mnt/a/dir/file").unwrap().unwrap();
        match task {
            Task::File {
                position,
                path,
                name,
            } => {
                assert_eq!(path, "/mnt/a/dir");
                assert_eq!(name, "file");
                assert!(position.context().is_some());
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_unusable_path_targets() {
        let ctx = context(MemoryStore::new());

        let err = path_task(&ctx, "/elsewhere/x").unwrap_err();
        assert!(matches!(err, CrawlerError::Tree(TreeError::OutsideMount { .. })));

        let err = path_task(&ctx, "/mnt/missing").unwrap_err();
        assert!(matches!(err, CrawlerError::Meta(MetaError::NotFound { .. })));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_object_targets() {
        let ctx = context(MemoryStore::new());

        let task = object_task(&ctx, &group("/a/b")).unwrap();
        assert!(matches!(task, Task::ObjectNamespace { ref path, .. } if path == "/mnt/a/b"));

        let task = object_task(&ctx, &group("/")).unwrap();
        assert!(matches!(task, Task::ObjectNamespace { ref path, .. } if path == "/mnt"));

        let err = object_task(&ctx, &group("/a/unknown")).unwrap_err();
        assert!(matches!(err, CrawlerError::Tree(TreeError::NotNamespace { .. })));
    }
}
