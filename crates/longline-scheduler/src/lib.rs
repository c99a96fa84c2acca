//! Job scheduling and the scrape worker.
//!
//! A single worker loop per process polls for pending jobs, claims one
//! atomically, and orchestrates the category crawler and product extractor
//! over its pages. Each persisted product writes the product row, the
//! job link and the `NEW_PRODUCT_DETECTED` outbox event in one transaction.

pub mod error;
pub mod manager;
pub mod worker;

pub use error::{Result, SchedulerError};
pub use manager::JobManager;
pub use worker::{JobWorker, WorkerConfig};
