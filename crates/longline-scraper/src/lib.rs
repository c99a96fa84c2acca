//! Product extraction and category crawling.
//!
//! The crawler walks search-result pagination and emits product identities;
//! the extractor turns a product page into a [`CompleteProduct`] including
//! the normalized size table read from the size-chart modal. All HTML field
//! parsing is pure and testable without a browser; only navigation and
//! modal interaction touch the page handle.

pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fields;
pub mod reviews;

pub use crawler::{CategoryCrawler, ProductSummary};
pub use error::{Result, ScrapeError};
pub use extractor::{CompleteProduct, ProductExtractor};
pub use reviews::{extract_reviews, ReviewData, ReviewInfo};
