//! Error types for marfs-crawler
//!
//! The hierarchy mirrors the three failure classes of a crawl:
//! - startup errors (configuration, tree loading, queue/pool creation) that
//!   abort the run
//! - per-item errors (metadata access, tag decoding) that are logged, counted
//!   and abandon only the affected file or subtree
//! - queue protocol violations returned to the immediate caller

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the crawler
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Namespace tree errors
    #[error("Namespace error: {0}")]
    Tree(#[from] TreeError),

    /// Metadata access errors
    #[error("Metadata error: {0}")]
    Meta(#[from] MetaError),

    /// File tag decoding errors
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// Task queue protocol errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Object index errors
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (output file, log file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlerError {
    /// Whether this error only means the item vanished or is unreadable,
    /// as opposed to a malformed tree or tag.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CrawlerError::Meta(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid thread count
    #[error("Invalid thread count {count}: must be at least 1")]
    InvalidThreadCount { count: usize },

    /// Hash exponent outside the supported range
    #[error("Invalid hash table exponent {exponent}: must be between {min} and {max}")]
    InvalidHashExponent { exponent: u32, min: u32, max: u32 },

    /// Invalid per-task cache capacity
    #[error("Invalid cache capacity {capacity}: must be at least 1")]
    InvalidCacheCapacity { capacity: usize },

    /// Invalid queue capacity
    #[error("Invalid queue capacity {value}: must be positive, or -1 for unbounded")]
    InvalidQueueCapacity { value: i64 },

    /// Output file not given
    #[error("An output file must be given with -o")]
    MissingOutput,

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Tree configuration path not given
    #[error("No namespace configuration: set MARFS_CONFIG_PATH or pass --config")]
    MissingTreeConfig,

    /// Target input file could not be read
    #[error("Cannot read input file '{path}': {reason}")]
    InputFile { path: PathBuf, reason: String },

    /// Log destination could not be opened
    #[error("Cannot open log file '{path}': {reason}")]
    LogFile { path: PathBuf, reason: String },

    /// Nothing to scan
    #[error("No paths or object IDs to scan")]
    NoTargets,

    /// Effective user or group could not be lowered to the real one
    #[error("Failed to downgrade to effective {what} {id}: {reason}")]
    Privilege {
        what: &'static str,
        id: u32,
        reason: String,
    },

    /// Index sizing rejected
    #[error("Invalid index size: {0}")]
    Index(#[from] IndexError),
}

/// Namespace tree configuration and traversal errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Failed to read the tree configuration
    #[error("Failed to read namespace config '{path}': {reason}")]
    Load { path: PathBuf, reason: String },

    /// Tree configuration is syntactically invalid
    #[error("Failed to parse namespace config '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Tree configuration is semantically invalid
    #[error("Invalid namespace config: {0}")]
    Invalid(String),

    /// Path is not under the mountpoint
    #[error("Path '{path}' is outside of mountpoint '{mountpoint}'")]
    OutsideMount { path: String, mountpoint: PathBuf },

    /// Traversal tried to leave the root namespace
    #[error("Path '{path}' escapes the root namespace")]
    EscapesRoot { path: String },

    /// Traversal did not land on a namespace root
    #[error("Path '{path}' does not target a namespace")]
    NotNamespace { path: String },
}

/// Metadata access errors
#[derive(Error, Debug)]
pub enum MetaError {
    /// Target does not exist
    #[error("No such entry: '{path}'")]
    NotFound { path: String },

    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Target is not a directory
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: String },

    /// Directory open/read failed
    #[error("Failed to read directory '{path}': {reason}")]
    ReadDirFailed { path: String, reason: String },

    /// Entry stat failed
    #[error("Failed to stat '{path}': {reason}")]
    StatFailed { path: String, reason: String },

    /// File carries no tag
    #[error("File '{path}' has no MarFS tag")]
    MissingTag { path: String },

    /// Tag read failed
    #[error("Failed to read tag of '{path}': {reason}")]
    TagReadFailed { path: String, reason: String },

    /// Operation not available on this platform or store
    #[error("Operation not supported: {op}")]
    Unsupported { op: &'static str },
}

impl MetaError {
    /// Build from an I/O error, keeping the common kinds distinct.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error, op: MetaOp) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => MetaError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => MetaError::PermissionDenied { path },
            _ => {
                let reason = err.to_string();
                match op {
                    MetaOp::ReadDir => MetaError::ReadDirFailed { path, reason },
                    MetaOp::Stat => MetaError::StatFailed { path, reason },
                    MetaOp::Tag => MetaError::TagReadFailed { path, reason },
                }
            }
        }
    }

    /// Check if this error means the item can be skipped
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MetaError::NotFound { .. } | MetaError::PermissionDenied { .. }
        )
    }
}

/// Metadata operation kinds, used to classify I/O failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOp {
    ReadDir,
    Stat,
    Tag,
}

/// File tag decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// Tag string does not follow the expected layout
    #[error("Malformed tag '{tag}': {reason}")]
    Malformed { tag: String, reason: String },

    /// Tag was written by an unknown format version
    #[error("Unsupported tag version {major}.{minor:03}")]
    UnsupportedVersion { major: u32, minor: u32 },

    /// Chunk index outside of the file's object range
    #[error("Object {chunk} is outside of file bounds {first}..={last}")]
    ChunkOutOfRange { chunk: u64, first: u64, last: u64 },
}

/// Task queue protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Queue created with no room for tasks
    #[error("Queue capacity must be at least 1")]
    ZeroCapacity,

    /// Queue destroyed while tasks are still queued
    #[error("Cannot destroy queue: {pending} tasks still queued")]
    Busy { pending: usize },

    /// Queue destroyed while other handles remain
    #[error("Cannot destroy queue: {holders} handles still alive")]
    StillShared { holders: usize },
}

/// Object index errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Zero buckets requested
    #[error("Index capacity must be at least 1")]
    ZeroCapacity,

    /// Capacity exponent too large
    #[error("Index exponent {exponent} exceeds maximum {max}")]
    ExponentTooLarge { exponent: u32, max: u32 },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be started
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },
}

/// Result type alias for CrawlerError
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for TreeError
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Result type alias for MetaError
pub type MetaResult<T> = std::result::Result<T, MetaError>;

/// Result type alias for TagError
pub type TagResult<T> = std::result::Result<T, TagError>;

/// Outcome of executing a single task
#[derive(Debug)]
pub enum TaskOutcome {
    /// Task ran to completion
    Completed {
        path: String,
        entries: usize,
        children: usize,
    },

    /// Skipped due to a recoverable error
    Skipped { path: String, reason: String },

    /// Failed with error
    Failed { path: String, error: CrawlerError },
}

impl TaskOutcome {
    /// Build the outcome for an error, splitting recoverable from fatal
    pub fn from_error(path: String, error: CrawlerError) -> Self {
        if error.is_recoverable() {
            TaskOutcome::Skipped {
                path,
                reason: error.to_string(),
            }
        } else {
            TaskOutcome::Failed { path, error }
        }
    }

    /// Returns true if this outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }

    /// Returns the path associated with this outcome
    pub fn path(&self) -> &str {
        match self {
            TaskOutcome::Completed { path, .. } => path,
            TaskOutcome::Skipped { path, .. } => path,
            TaskOutcome::Failed { path, .. } => path,
        }
    }
}
