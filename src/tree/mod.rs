//! Namespace tree and metadata access
//!
//! - [`NamespaceTree`]: immutable namespace hierarchy loaded at startup
//! - [`Position`]: a directory inside a namespace, with a lazily attached
//!   metadata context
//! - [`MetadataStore`]: directory listing, entry kinds and file tags, with
//!   an on-disk ([`PosixStore`]) and an in-memory ([`MemoryStore`])
//!   implementation

pub mod config;
pub mod memory;
pub mod position;
pub mod posix;
pub mod store;

pub use config::{Namespace, NamespaceId, NamespaceSpec, NamespaceTree};
pub use memory::MemoryStore;
pub use position::Position;
pub use posix::PosixStore;
pub use store::{DirEntry, DirHandle, EntryKind, MetaContext, MetadataStore};
