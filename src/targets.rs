//! Scan targets
//!
//! Targets are either user paths under the mountpoint or object identifiers.
//! The first target decides which; later targets of the other kind are
//! ignored. Object identifiers are grouped by the namespace encoded in them
//! so each namespace is searched once for all of its identifiers.

use crate::error::ConfigError;
use crate::index::ObjectIndex;
use crate::tag::namespace_path;
use crate::walker::task::TargetSet;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Bucket count of each per-namespace identifier set
pub const TARGET_SET_CAPACITY: usize = 1024;

/// Object identifiers that live in one namespace
#[derive(Debug, Clone)]
pub struct ObjectGroup {
    /// Namespace path, e.g. `/a/b`
    pub namespace: String,

    /// Identifiers to look for
    pub ids: TargetSet,
}

/// What to scan
#[derive(Debug, Clone)]
pub enum Targets {
    /// Map files under these paths to their objects
    Paths(Vec<String>),

    /// Find the files holding these objects
    Objects(Vec<ObjectGroup>),
}

/// True if a target names an object rather than a path
pub fn is_object_id(target: &str) -> bool {
    target.contains('|')
}

impl Targets {
    /// Classify and group raw targets
    pub fn parse<I, S>(items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mode: Option<bool> = None;
        let mut paths = Vec::new();
        let mut groups: Vec<(String, ObjectIndex)> = Vec::new();

        for item in items {
            let item = item.as_ref().trim();
            if item.is_empty() {
                continue;
            }
            let object = is_object_id(item);
            let objects_mode = *mode.get_or_insert(object);
            if object != objects_mode {
                warn!(arg = %item, "Ignoring target of a different kind than the first");
                continue;
            }

            if !object {
                paths.push(normalize_path(item));
                continue;
            }

            let Some(namespace) = namespace_path(item) else {
                warn!(arg = %item, "Failed to extract namespace path from object ID");
                continue;
            };
            let slot = match groups.iter().position(|(ns, _)| *ns == namespace) {
                Some(slot) => slot,
                None => {
                    groups.push((namespace, ObjectIndex::with_capacity(TARGET_SET_CAPACITY)?));
                    groups.len() - 1
                }
            };
            groups[slot].1.insert(item);
        }

        match mode {
            Some(true) if !groups.is_empty() => Ok(Targets::Objects(
                groups
                    .into_iter()
                    .map(|(namespace, set)| ObjectGroup {
                        namespace,
                        ids: Arc::new(set),
                    })
                    .collect(),
            )),
            Some(false) if !paths.is_empty() => Ok(Targets::Paths(paths)),
            _ => Err(ConfigError::NoTargets),
        }
    }

    /// Read targets from a file, one per line
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InputFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(text.lines())
    }

    /// Number of seeds this produces: paths, or namespace groups
    pub fn len(&self) -> usize {
        match self {
            Targets::Paths(paths) => paths.len(),
            Targets::Objects(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable mode name
    pub fn mode(&self) -> &'static str {
        match self {
            Targets::Paths(_) => "paths",
            Targets::Objects(_) => "object IDs",
        }
    }
}

/// Drop trailing slashes, keeping a bare `/`
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
