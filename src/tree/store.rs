//! Metadata access layer
//!
//! The crawler only needs a handful of metadata operations. They sit behind
//! [`MetadataStore`] so the traversal engine runs the same way against the
//! on-disk layout and against an in-memory tree.

use crate::error::MetaResult;
use std::path::{Path, PathBuf};

/// Prefix of names reserved by the metadata layer
pub const RESERVED_PREFIX: &str = "MDAL_";

/// Directory holding a namespace's subspaces
pub const SUBSPACE_DIR: &str = "MDAL_subspaces";

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Other,
}

/// A single directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Check if this is "." or ".."
    pub fn is_special(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Resolved metadata location of a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaContext {
    location: PathBuf,
}

impl MetaContext {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Location of a named entry in this directory
    pub fn entry(&self, name: &str) -> PathBuf {
        self.location.join(name)
    }
}

/// Open directory stream; closed when dropped
pub type DirHandle<'a> = Box<dyn Iterator<Item = MetaResult<DirEntry>> + 'a>;

/// Operations the crawler needs from the metadata layer
pub trait MetadataStore: Send + Sync {
    /// Resolve the metadata location of `dir` inside a namespace
    fn fortify(&self, namespace_path: &str, dir: &Path) -> MetaResult<MetaContext>;

    /// List a fortified directory
    fn open_dir<'a>(&'a self, ctxt: &MetaContext) -> MetaResult<DirHandle<'a>>;

    /// Kind of the entry `name` in a fortified directory
    fn entry_kind(&self, ctxt: &MetaContext, name: &str) -> MetaResult<EntryKind>;

    /// Raw tag string of the file `name` in a fortified directory
    fn file_tag(&self, ctxt: &MetaContext, name: &str) -> MetaResult<String>;

    /// True for names reserved by the metadata layer, which must be skipped
    fn path_filter(&self, name: &str) -> bool {
        name.starts_with(RESERVED_PREFIX)
    }
}

/// Metadata location of a directory, given the layout root.
///
/// Namespace `/a/b` lives at `<base>/MDAL_subspaces/a/MDAL_subspaces/b`.
pub fn namespace_location(base: &Path, namespace_path: &str, dir: &Path) -> PathBuf {
    let mut location = base.to_path_buf();
    for component in namespace_path.split('/').filter(|c| !c.is_empty()) {
        location.push(SUBSPACE_DIR);
        location.push(component);
    }
    if !dir.as_os_str().is_empty() {
        location.push(dir);
    }
    location
}
