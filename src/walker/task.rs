//! Units of work passed through the task queue

use crate::index::ObjectIndex;
use crate::tree::Position;
use std::fmt;
use std::sync::Arc;

/// Object identifiers being looked up in reverse mode, shared read-only by
/// every task of one namespace group
pub type TargetSet = Arc<ObjectIndex>;

/// A unit of traversal work.
///
/// Each variant owns its position and the user-visible path accumulated so
/// far. `Shutdown` carries nothing and tells a worker to exit.
#[derive(Debug)]
pub enum Task {
    /// Namespace root: fan out to subspaces, then list contents
    Namespace { position: Position, path: String },

    /// Ordinary directory below a namespace root
    Directory { position: Position, path: String },

    /// A single file, positioned at its parent directory
    File {
        position: Position,
        path: String,
        name: String,
    },

    /// Namespace root searched for files holding target objects
    ObjectNamespace {
        position: Position,
        path: String,
        targets: TargetSet,
    },

    /// Directory searched for files holding target objects
    ObjectDirectory {
        position: Position,
        path: String,
        targets: TargetSet,
    },

    /// Worker exit sentinel
    Shutdown,
}

impl Task {
    /// Short name of the variant, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Namespace { .. } => "namespace",
            Task::Directory { .. } => "directory",
            Task::File { .. } => "file",
            Task::ObjectNamespace { .. } => "object-namespace",
            Task::ObjectDirectory { .. } => "object-directory",
            Task::Shutdown => "shutdown",
        }
    }

    /// User-visible path this task covers
    pub fn path(&self) -> Option<&str> {
        match self {
            Task::Namespace { path, .. }
            | Task::Directory { path, .. }
            | Task::File { path, .. }
            | Task::ObjectNamespace { path, .. }
            | Task::ObjectDirectory { path, .. } => Some(path),
            Task::Shutdown => None,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Task::Shutdown)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::File { path, name, .. } => write!(f, "{} task '{}/{}'", self.kind(), path, name),
            _ => match self.path() {
                Some(path) => write!(f, "{} task '{}'", self.kind(), path),
                None => write!(f, "{} task", self.kind()),
            },
        }
    }
}

/// Join a child name onto a user-visible path
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
