//! In-memory metadata store
//!
//! Uses the same layout as [`PosixStore`](super::PosixStore) rooted at `/`,
//! so subspaces sit under hidden `MDAL_subspaces` entries and never show up
//! as ordinary directories. Listings include `.` and `..` the way a real
//! readdir does.

use super::store::{namespace_location, DirEntry, DirHandle, EntryKind, MetaContext, MetadataStore};
use crate::error::{MetaError, MetaResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { tag: Option<String> },
}

/// Metadata tree held in memory, populated through `add_*` calls
#[derive(Debug)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    broken: RwLock<HashSet<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: RwLock::new(nodes),
            broken: RwLock::new(HashSet::new()),
        }
    }

    fn location(namespace: &str, rel: &str) -> PathBuf {
        namespace_location(Path::new("/"), namespace, Path::new(rel.trim_start_matches('/')))
    }

    fn insert(&self, location: PathBuf, node: Node) {
        let mut nodes = self.nodes.write();
        let mut parent = location.parent();
        while let Some(dir) = parent {
            nodes.entry(dir.to_path_buf()).or_insert(Node::Dir);
            parent = dir.parent();
        }
        nodes.insert(location, node);
    }

    /// Create a directory (and its ancestors) inside a namespace
    pub fn add_dir(&self, namespace: &str, rel: &str) {
        self.insert(Self::location(namespace, rel), Node::Dir);
    }

    /// Create the root directory of a namespace
    pub fn add_namespace(&self, namespace: &str) {
        self.add_dir(namespace, "");
    }

    /// Create a tagged file (and its ancestors) inside a namespace
    pub fn add_file(&self, namespace: &str, rel: &str, tag: impl Into<String>) {
        self.insert(
            Self::location(namespace, rel),
            Node::File {
                tag: Some(tag.into()),
            },
        );
    }

    /// Create a file carrying no tag
    pub fn add_untagged_file(&self, namespace: &str, rel: &str) {
        self.insert(Self::location(namespace, rel), Node::File { tag: None });
    }

    /// Make listing this directory fail
    pub fn break_dir(&self, namespace: &str, rel: &str) {
        self.broken.write().insert(Self::location(namespace, rel));
    }

    fn node(&self, location: &Path) -> Option<Node> {
        self.nodes.read().get(location).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for MemoryStore {
    fn fortify(&self, namespace_path: &str, dir: &Path) -> MetaResult<MetaContext> {
        let location = namespace_location(Path::new("/"), namespace_path, dir);
        let path = location.display().to_string();
        match self.node(&location) {
            Some(Node::Dir) => Ok(MetaContext::new(location)),
            Some(Node::File { .. }) => Err(MetaError::NotADirectory { path }),
            None => Err(MetaError::NotFound { path }),
        }
    }

    fn open_dir<'a>(&'a self, ctxt: &MetaContext) -> MetaResult<DirHandle<'a>> {
        let location = ctxt.location();
        if self.broken.read().contains(location) {
            return Err(MetaError::ReadDirFailed {
                path: location.display().to_string(),
                reason: "Input/output error".into(),
            });
        }

        let nodes = self.nodes.read();
        if !matches!(nodes.get(location), Some(Node::Dir)) {
            return Err(MetaError::NotFound {
                path: location.display().to_string(),
            });
        }

        let mut entries = vec![
            DirEntry::new(".", EntryKind::Directory),
            DirEntry::new("..", EntryKind::Directory),
        ];
        entries.extend(
            nodes
                .iter()
                .filter(|(path, _)| path.parent() == Some(location))
                .filter_map(|(path, node)| {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    let kind = match node {
                        Node::Dir => EntryKind::Directory,
                        Node::File { .. } => EntryKind::File,
                    };
                    Some(DirEntry::new(name, kind))
                }),
        );

        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn entry_kind(&self, ctxt: &MetaContext, name: &str) -> MetaResult<EntryKind> {
        let location = ctxt.entry(name);
        match self.node(&location) {
            Some(Node::Dir) => Ok(EntryKind::Directory),
            Some(Node::File { .. }) => Ok(EntryKind::File),
            None => Err(MetaError::NotFound {
                path: location.display().to_string(),
            }),
        }
    }

    fn file_tag(&self, ctxt: &MetaContext, name: &str) -> MetaResult<String> {
        let location = ctxt.entry(name);
        let path = location.display().to_string();
        match self.node(&location) {
            Some(Node::File { tag: Some(tag) }) => Ok(tag),
            Some(Node::File { tag: None }) => Err(MetaError::MissingTag { path }),
            Some(Node::Dir) => Err(MetaError::TagReadFailed {
                path,
                reason: "is a directory".into(),
            }),
            None => Err(MetaError::NotFound { path }),
        }
    }
}
