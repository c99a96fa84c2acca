//! Longline Database Layer
//!
//! Postgres access for the product store: products, scraper jobs, job-product
//! links and the transactional outbox. Uses `SQLx` with embedded migrations.
//!
//! # Design Principles
//!
//! - The `Database` wrapper owns the connection pool; other components
//!   receive narrow capabilities (`&PgPool` or a transaction handle)
//! - Every multi-row change runs inside a transaction; the outbox append is
//!   bound to the same transaction as the domain write that produced it
//! - Row-level operations are free async functions over a `PgExecutor`, so
//!   they compose with both the pool and open transactions
//!
//! # Example
//!
//! ```ignore
//! use longline_db::Database;
//!
//! let db = Database::connect(&config.database).await?;
//! db.run_migrations().await?;
//! ```

pub mod connection;
pub mod error;
pub mod jobs;
pub mod migrations;
pub mod outbox;
pub mod products;

pub use connection::Database;
pub use error::{DatabaseError, Result};
pub use jobs::{JobProductRow, JobRecord, JobStats, NewJob};
pub use outbox::{NewOutboxEvent, OutboxEventRecord, OutboxStatus, DEFAULT_TARGET_STREAM};
pub use products::{NewProduct, ProductRecord};
