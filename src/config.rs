//! Configuration types for marfs-crawler
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::targets::Targets;
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

/// Smallest accepted index exponent
pub const MIN_HASH_EXPONENT: u32 = 2;

/// Largest accepted index exponent
pub const MAX_HASH_EXPONENT: u32 = crate::index::MAX_EXPONENT;

/// Default index exponent (131072 buckets)
pub const DEFAULT_HASH_EXPONENT: u32 = 17;

/// Default per-task cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Thread counts above this draw a warning
pub const MAX_THREADS_WARN: usize = 32768;

/// Cache capacities above this draw a warning
pub const CACHE_CAPACITY_WARN: usize = 1024;

/// Index capacities below this draw a warning
pub const MIN_BUCKETS_WARN: usize = 256;

/// Log destination meaning "standard error"
const STDERR_LOG: &str = "stderr";

/// Parallel MarFS namespace crawler
#[derive(Parser, Debug, Clone)]
#[command(
    name = "marfs-crawler",
    version,
    about = "Parallel MarFS namespace crawler",
    long_about = "Walks MarFS namespaces with a pool of worker threads.\n\n\
                  Given paths, records the identifier of every object backing the files below them.\n\
                  Given object identifiers, records the paths of the files those objects belong to.",
    after_help = "EXAMPLES:\n    \
        marfs-crawler -o objects.txt /campaign/projects\n    \
        marfs-crawler -t 64 -q 4096 -p -o objects.txt /campaign\n    \
        marfs-crawler -o paths.txt 'ctag|main-repo##projects#1700000000.0.3'\n    \
        marfs-crawler -i ids.txt -l crawl.log -o paths.txt"
)]
pub struct CliArgs {
    /// Paths under the mountpoint, or object identifiers
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = default_threads(), value_name = "NUM")]
    pub threads: usize,

    /// Object index capacity as a power of two
    #[arg(short = 'H', long, default_value_t = DEFAULT_HASH_EXPONENT, value_name = "EXP")]
    pub hash_exponent: u32,

    /// Per-task object cache capacity
    #[arg(short = 'c', long, default_value_t = DEFAULT_CACHE_CAPACITY, value_name = "NUM")]
    pub cache_capacity: usize,

    /// Task queue capacity (-1 for unbounded). A bounded queue can hang on wide trees
    #[arg(
        short = 'q',
        long,
        default_value_t = -1,
        allow_negative_numbers = true,
        value_name = "NUM"
    )]
    pub queue_capacity: i64,

    /// Output file, truncated before the crawl
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Log file, or "stderr"
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Read targets from a file, one per line
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Namespace tree configuration
    #[arg(long, env = "MARFS_CONFIG_PATH", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show progress and a summary
    #[arg(short, long)]
    pub progress: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit 1 if any file or directory could not be processed
    #[arg(long)]
    pub fail_on_error: bool,
}

impl CliArgs {
    /// Log file, unless logging goes to stderr
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log.as_ref().filter(|p| p.as_os_str() != STDERR_LOG)
    }
}

fn default_threads() -> usize {
    num_cpus::get()
}

/// Task queue sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    Bounded(usize),
    Unbounded,
}

impl QueueCapacity {
    /// Interpret the command-line value, where -1 means unbounded
    pub fn from_arg(value: i64) -> Result<Self, ConfigError> {
        match value {
            -1 => Ok(QueueCapacity::Unbounded),
            n if n > 0 => usize::try_from(n)
                .map(QueueCapacity::Bounded)
                .map_err(|_| ConfigError::InvalidQueueCapacity { value }),
            _ => Err(ConfigError::InvalidQueueCapacity { value }),
        }
    }

    /// Whether enqueueing can block. Workers are also the only consumers, so
    /// a directory with more children than free slots can stall the crawl.
    pub fn can_stall(&self) -> bool {
        matches!(self, QueueCapacity::Bounded(_))
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// What to scan
    pub targets: Targets,

    /// Output file path
    pub output_path: PathBuf,

    /// Namespace tree configuration file
    pub tree_config: Option<PathBuf>,

    /// Number of worker threads
    pub threads: usize,

    /// Object index capacity exponent
    pub hash_exponent: u32,

    /// Per-task cache capacity
    pub cache_capacity: usize,

    /// Task queue capacity
    pub queue_capacity: QueueCapacity,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Turn per-item errors into a failing exit code
    pub fail_on_error: bool,
}

impl CrawlConfig {
    /// Configuration with default tuning
    pub fn new(output_path: impl Into<PathBuf>, targets: Targets) -> Self {
        Self {
            targets,
            output_path: output_path.into(),
            tree_config: None,
            threads: default_threads(),
            hash_exponent: DEFAULT_HASH_EXPONENT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            queue_capacity: QueueCapacity::Unbounded,
            show_progress: false,
            verbose: false,
            fail_on_error: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.threads == 0 {
            return Err(ConfigError::InvalidThreadCount {
                count: args.threads,
            });
        }
        if args.threads > MAX_THREADS_WARN {
            warn!(threads = args.threads, "Very large thread count requested");
        }

        if !(MIN_HASH_EXPONENT..=MAX_HASH_EXPONENT).contains(&args.hash_exponent) {
            return Err(ConfigError::InvalidHashExponent {
                exponent: args.hash_exponent,
                min: MIN_HASH_EXPONENT,
                max: MAX_HASH_EXPONENT,
            });
        }
        let buckets = 1usize << args.hash_exponent;
        if buckets < MIN_BUCKETS_WARN {
            warn!(buckets, "Small object index; expect long hash chains");
        }

        if args.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity {
                capacity: args.cache_capacity,
            });
        }
        if args.cache_capacity > CACHE_CAPACITY_WARN {
            warn!(
                capacity = args.cache_capacity,
                threads = args.threads,
                "Large per-task cache; memory use grows with every queued task"
            );
        }

        let queue_capacity = QueueCapacity::from_arg(args.queue_capacity)?;
        if let QueueCapacity::Bounded(capacity) = queue_capacity {
            warn!(
                capacity,
                threads = args.threads,
                "Bounded task queue; a directory with more children than free slots can hang the crawl"
            );
            if capacity < args.threads {
                warn!(
                    capacity,
                    threads = args.threads,
                    "Queue smaller than the thread pool; workers will sit idle"
                );
            }
        }

        let output_path = args.output.clone().ok_or(ConfigError::MissingOutput)?;
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidOutputPath {
                    path: output_path.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let tree_config = args.config.clone().ok_or(ConfigError::MissingTreeConfig)?;

        let targets = match &args.input {
            Some(input) => {
                if !args.targets.is_empty() {
                    warn!(
                        count = args.targets.len(),
                        "Ignoring command-line targets in favor of the input file"
                    );
                }
                Targets::from_file(input)?
            }
            None => Targets::parse(&args.targets)?,
        };

        Ok(Self {
            targets,
            output_path,
            tree_config: Some(tree_config),
            threads: args.threads,
            hash_exponent: args.hash_exponent,
            cache_capacity: args.cache_capacity,
            queue_capacity,
            show_progress: args.progress,
            verbose: args.verbose,
            fail_on_error: args.fail_on_error,
        })
    }
}
