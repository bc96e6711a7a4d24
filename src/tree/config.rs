//! Namespace tree configuration
//!
//! The tree is described in a TOML file named by `MARFS_CONFIG_PATH`:
//!
//! ```toml
//! mountpoint = "/campaign"
//! meta_root = "/gpfs/marfs-mdal"
//!
//! [root]
//! name = "root"
//! repo = "main-repo"
//!
//! [[root.subspaces]]
//! name = "projects"
//!
//! [[root.subspaces.subspaces]]
//! name = "archive"
//! repo = "cold-repo"
//! ```
//!
//! Namespaces without a `repo` inherit their parent's.

use crate::error::{TreeError, TreeResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeFile {
    mountpoint: PathBuf,
    meta_root: PathBuf,
    root: NamespaceSpec,
}

/// One namespace as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSpec {
    pub name: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub subspaces: Vec<NamespaceSpec>,
}

impl NamespaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: None,
            subspaces: Vec::new(),
        }
    }

    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn subspace(mut self, child: NamespaceSpec) -> Self {
        self.subspaces.push(child);
        self
    }
}

/// Handle to a namespace within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub(crate) usize);

/// A resolved namespace
#[derive(Debug)]
pub struct Namespace {
    pub id: NamespaceId,
    pub name: String,
    /// Absolute namespace path: `/`, `/a`, `/a/b`
    pub path: String,
    pub repo: String,
    pub parent: Option<NamespaceId>,
    pub subspaces: Vec<NamespaceId>,
}

/// Immutable namespace hierarchy, shared read-only by all workers
#[derive(Debug)]
pub struct NamespaceTree {
    mountpoint: PathBuf,
    meta_root: PathBuf,
    namespaces: Vec<Namespace>,
}

impl NamespaceTree {
    /// Load the tree from a TOML file
    pub fn load(path: &Path) -> TreeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TreeError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text, path)
    }

    /// Parse the tree from TOML text; `origin` is only used in errors
    pub fn from_toml(text: &str, origin: &Path) -> TreeResult<Self> {
        let file: TreeFile = toml::from_str(text).map_err(|e| TreeError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::build(file.mountpoint, file.meta_root, file.root)
    }

    /// Build and validate a tree
    pub fn build(
        mountpoint: impl Into<PathBuf>,
        meta_root: impl Into<PathBuf>,
        root: NamespaceSpec,
    ) -> TreeResult<Self> {
        let mountpoint = mountpoint.into();
        if !mountpoint.is_absolute() {
            return Err(TreeError::Invalid(format!(
                "mountpoint '{}' must be absolute",
                mountpoint.display()
            )));
        }
        let repo = root
            .repo
            .clone()
            .ok_or_else(|| TreeError::Invalid("root namespace must name a repo".into()))?;

        let mut tree = Self {
            mountpoint,
            meta_root: meta_root.into(),
            namespaces: Vec::new(),
        };
        tree.insert(&root, "/".to_string(), repo, None)?;
        Ok(tree)
    }

    fn insert(
        &mut self,
        spec: &NamespaceSpec,
        path: String,
        repo: String,
        parent: Option<NamespaceId>,
    ) -> TreeResult<NamespaceId> {
        let id = NamespaceId(self.namespaces.len());
        self.namespaces.push(Namespace {
            id,
            name: spec.name.clone(),
            path: path.clone(),
            repo: repo.clone(),
            parent,
            subspaces: Vec::new(),
        });

        let mut seen = HashSet::new();
        for child in &spec.subspaces {
            validate_name(&child.name, &path)?;
            if !seen.insert(child.name.as_str()) {
                return Err(TreeError::Invalid(format!(
                    "duplicate subspace '{}' under '{}'",
                    child.name, path
                )));
            }
            let child_path = if path == "/" {
                format!("/{}", child.name)
            } else {
                format!("{}/{}", path, child.name)
            };
            let child_repo = child.repo.clone().unwrap_or_else(|| repo.clone());
            let child_id = self.insert(child, child_path, child_repo, Some(id))?;
            self.namespaces[id.0].subspaces.push(child_id);
        }
        Ok(id)
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn meta_root(&self) -> &Path {
        &self.meta_root
    }

    pub fn root(&self) -> &Namespace {
        &self.namespaces[0]
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    /// Named subspace directly under `parent`
    pub fn subspace(&self, parent: NamespaceId, name: &str) -> Option<&Namespace> {
        self.namespace(parent)
            .subspaces
            .iter()
            .map(|&id| self.namespace(id))
            .find(|ns| ns.name == name)
    }

    /// Find a namespace by its absolute namespace path
    pub fn find(&self, path: &str) -> Option<&Namespace> {
        let trimmed = path.trim_end_matches('/');
        let wanted = if trimmed.is_empty() { "/" } else { trimmed };
        self.namespaces.iter().find(|ns| ns.path == wanted)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.iter()
    }
}

fn validate_name(name: &str, parent: &str) -> TreeResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(TreeError::Invalid(format!(
            "invalid subspace name '{}' under '{}'",
            name, parent
        )));
    }
    Ok(())
}
