//! marfs-crawler - Parallel MarFS namespace crawler
//!
//! Maps files in a MarFS namespace hierarchy to the data objects backing
//! them, or the other way round: given object identifiers, finds the files
//! whose data lives in those objects.
//!
//! # Features
//!
//! - **Parallel Crawling**: a fixed pool of worker threads shares one task
//!   queue; completion is detected by an outstanding-task count rather than
//!   an empty queue.
//!
//! - **Namespace Aware**: subspaces are entered through the configured
//!   namespace tree, never through directory listings.
//!
//! - **Deduplicating Output**: results go through a fixed-capacity hash set,
//!   with a small per-directory LRU in front of it to absorb files packed
//!   into the same object.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────────┐
//! │ CLI / config │──►│   Targets    │──►│       CrawlCoordinator       │
//! └──────────────┘   └──────────────┘   │  TaskQueue ─► Worker × N     │
//!                                       │      ▲           │           │
//!                                       │      └─ children ┘           │
//!                                       └──────────────┬───────────────┘
//!                                                      │
//!                   ┌──────────────┐   ┌───────────────▼──────────────┐
//!                   │ NamespaceTree│◄──│ traverse: tags ─► ObjectIndex│
//!                   │ MetadataStore│   └───────────────┬──────────────┘
//!                   └──────────────┘                   ▼
//!                                               output file, one
//!                                               entry per line
//! ```
//!
//! # Example
//!
//! ```bash
//! # Every object under a namespace
//! MARFS_CONFIG_PATH=/etc/marfs.toml marfs-crawler -o objects.txt /campaign/projects
//!
//! # Files holding these objects
//! marfs-crawler --config /etc/marfs.toml -i ids.txt -o paths.txt
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod privilege;
pub mod progress;
pub mod tag;
pub mod targets;
pub mod tree;
pub mod walker;

pub use config::{CliArgs, CrawlConfig, QueueCapacity};
pub use error::{CrawlerError, Result};
pub use targets::Targets;
pub use walker::{CrawlCoordinator, CrawlResult};
