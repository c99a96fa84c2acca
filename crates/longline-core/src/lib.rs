//! Longline Core - Foundation crate for the Longline scraping backend.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Longline crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with environment overrides
//! - [`types`] - Shared domain types (`ProductId`, `ProductStatus`, `SizeTable`)
//!
//! # Example
//!
//! ```rust
//! use longline_core::{AppConfig, ProductId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let pid = ProductId::new("B0000000AA")?;
//! assert_eq!(pid.as_str(), "B0000000AA");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserSettings, BusConfig, ConsumerSettings, DatabaseConfig, OutboxSettings,
    ScraperSettings, ServerConfig,
};
pub use error::{ConfigError, ConfigResult, LonglineError, Result};
pub use types::{JobStatus, ProductId, ProductStatus, SizeTable};
