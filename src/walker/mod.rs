//! Parallel namespace crawler
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │    CrawlCoordinator     │
//!                     │  - seeds one task per   │
//!                     │    target               │
//!                     │  - waits for the        │
//!                     │    outstanding count    │
//!                     └───────────┬─────────────┘
//!                                 │
//!                     ┌───────────▼─────────────┐
//!                     │       TaskQueue         │◄──────────┐
//!                     │  FIFO + outstanding     │           │ child tasks
//!                     └───────────┬─────────────┘           │
//!       ┌─────────────────────────┼─────────────────────────┤
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────┴─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │ LRU cache │             │ LRU cache │             │ LRU cache │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └─────────────────────────┼─────────────────────────┘
//!                     ┌───────────▼─────────────┐
//!                     │  ObjectIndex (mutex)    │
//!                     └─────────────────────────┘
//! ```

pub mod context;
pub mod coordinator;
pub mod queue;
pub mod seed;
pub mod task;
pub mod traverse;
pub mod worker;

pub use context::{CrawlContext, CrawlStats};
pub use coordinator::{CrawlCoordinator, CrawlProgress, CrawlResult};
pub use queue::{QueueStats, TaskQueue};
pub use task::{Task, TargetSet};
pub use worker::Worker;
