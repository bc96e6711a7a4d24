//! Positions within the namespace tree

use super::config::{NamespaceId, NamespaceTree};
use super::store::{MetaContext, MetadataStore};
use crate::error::{MetaResult, TreeError, TreeResult};
use std::path::{Path, PathBuf};

/// A directory inside a namespace.
///
/// `depth` counts directories below the namespace root; 0 means the
/// position is the namespace root itself. The metadata context is attached
/// lazily by whichever worker first needs it.
#[derive(Debug, Clone)]
pub struct Position {
    namespace: NamespaceId,
    depth: usize,
    dir: PathBuf,
    ctxt: Option<MetaContext>,
}

impl Position {
    fn new(namespace: NamespaceId, depth: usize, dir: PathBuf) -> Self {
        Self {
            namespace,
            depth,
            dir,
            ctxt: None,
        }
    }

    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Directory relative to the namespace root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_namespace_root(&self) -> bool {
        self.depth == 0
    }

    pub fn context(&self) -> Option<&MetaContext> {
        self.ctxt.as_ref()
    }

    /// Attach a metadata context if none is attached yet
    pub fn fortify(
        &mut self,
        tree: &NamespaceTree,
        store: &dyn MetadataStore,
    ) -> MetaResult<&MetaContext> {
        let ctxt = match self.ctxt.take() {
            Some(ctxt) => ctxt,
            None => store.fortify(&tree.namespace(self.namespace).path, &self.dir)?,
        };
        Ok(self.ctxt.insert(ctxt))
    }

    /// Drop the metadata context
    pub fn release(&mut self) {
        self.ctxt = None;
    }
}

impl NamespaceTree {
    /// Position at the root namespace
    pub fn root_position(&self) -> Position {
        Position::new(self.root().id, 0, PathBuf::new())
    }

    /// Walk `rel` (slash separated) starting at `from`.
    ///
    /// At a namespace root a component naming a subspace enters that
    /// subspace. `..` at a namespace root returns to the parent namespace's
    /// root. The result carries no metadata context.
    pub fn traverse(&self, from: &Position, rel: &str) -> TreeResult<Position> {
        let mut namespace = from.namespace;
        let mut depth = from.depth;
        let mut dir = from.dir.clone();

        for component in rel.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    if depth > 0 {
                        dir.pop();
                        depth -= 1;
                    } else if let Some(parent) = self.namespace(namespace).parent {
                        namespace = parent;
                        dir = PathBuf::new();
                    } else {
                        return Err(TreeError::EscapesRoot {
                            path: rel.to_string(),
                        });
                    }
                }
                name => {
                    if depth == 0 {
                        if let Some(sub) = self.subspace(namespace, name) {
                            namespace = sub.id;
                            continue;
                        }
                    }
                    dir.push(name);
                    depth += 1;
                }
            }
        }

        Ok(Position::new(namespace, depth, dir))
    }

    /// Resolve an absolute user path under the mountpoint
    pub fn resolve(&self, user_path: &str) -> TreeResult<Position> {
        let rel = Path::new(user_path)
            .strip_prefix(self.mountpoint())
            .map_err(|_| TreeError::OutsideMount {
                path: user_path.to_string(),
                mountpoint: self.mountpoint().to_path_buf(),
            })?;
        self.traverse(&self.root_position(), &rel.to_string_lossy())
    }

    /// User-visible path of a position
    pub fn user_path(&self, position: &Position) -> String {
        let mut path = self.mountpoint().to_path_buf();
        for component in self.namespace(position.namespace).path.split('/') {
            if !component.is_empty() {
                path.push(component);
            }
        }
        if !position.dir.as_os_str().is_empty() {
            path.push(&position.dir);
        }
        path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::config::NamespaceSpec;

    fn tree() -> NamespaceTree {
        let root = NamespaceSpec::new("root").repo("r").subspace(
            NamespaceSpec::new("a").subspace(NamespaceSpec::new("b")),
        );
        NamespaceTree::build("/mnt/marfs", "/meta", root).unwrap()
    }

    #[test]
    fn test_traverse_into_subspace() {
        let tree = tree();
        let pos = tree.traverse(&tree.root_position(), "a/b").unwrap();
        assert_eq!(tree.namespace(pos.namespace()).path, "/a/b");
        assert_eq!(pos.depth(), 0);
        assert!(pos.is_namespace_root());
    }

    #[test]
    fn test_traverse_directories() {
        let tree = tree();
        let pos = tree.traverse(&tree.root_position(), "a/dir/sub").unwrap();
        assert_eq!(tree.namespace(pos.namespace()).path, "/a");
        assert_eq!(pos.depth(), 2);
        assert_eq!(pos.dir(), Path::new("dir/sub"));

        // Below the namespace root a subspace name is just a directory
        let nested = tree.traverse(&pos, "b").unwrap();
        assert_eq!(tree.namespace(nested.namespace()).path, "/a");
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn test_traverse_dotdot() {
        let tree = tree();
        let deep = tree.traverse(&tree.root_position(), "a/b/x").unwrap();
        let up = tree.traverse(&deep, "..").unwrap();
        assert_eq!(tree.namespace(up.namespace()).path, "/a/b");
        assert_eq!(up.depth(), 0);

        let parent = tree.traverse(&up, "..").unwrap();
        assert_eq!(tree.namespace(parent.namespace()).path, "/a");
        assert_eq!(parent.depth(), 0);

        assert!(matches!(
            tree.traverse(&tree.root_position(), ".."),
            Err(TreeError::EscapesRoot { .. })
        ));
    }

    #[test]
    fn test_resolve_and_user_path() {
        let tree = tree();
        let pos = tree.resolve("/mnt/marfs/a/data/run1").unwrap();
        assert_eq!(tree.user_path(&pos), "/mnt/marfs/a/data/run1");

        let root = tree.resolve("/mnt/marfs").unwrap();
        assert_eq!(tree.user_path(&root), "/mnt/marfs");

        assert!(matches!(
            tree.resolve("/elsewhere/a"),
            Err(TreeError::OutsideMount { .. })
        ));
    }
}
