//! Shared domain types used across the Longline backend.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::LonglineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Newtype for marketplace product identifiers with validation.
///
/// A PID is an opaque, 10-character ASCII alphanumeric identifier assigned
/// by the marketplace (e.g. `B0000000AA`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new `ProductId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not exactly 10 ASCII alphanumeric characters.
    pub fn new(id: impl Into<String>) -> Result<Self, LonglineError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the newtype, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn validate(id: &str) -> Result<(), LonglineError> {
        static PID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            PID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{10}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(LonglineError::Validation(format!(
                "invalid product ID: must be 10 ASCII alphanumeric characters, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a product.
///
/// Transitions within a scraping cycle are monotonic:
/// `Pending → Scraped → {Active, Rejected}`. `Failed` is terminal for a
/// cycle but a product may be re-opened later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    /// Discovered but not yet scraped
    Pending,
    /// Full product data persisted by the worker
    Scraped,
    /// Enriched and qualified (size table with length data)
    Active,
    /// Enriched but lacking length data
    Rejected,
    /// Scraping cycle failed
    Failed,
}

impl ProductStatus {
    /// Canonical string stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Scraped => "SCRAPED",
            Self::Active => "ACTIVE",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse from a stored string. Unknown values map to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "SCRAPED" => Self::Scraped,
            "ACTIVE" => Self::Active,
            "REJECTED" => Self::Rejected,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a scraping job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed by a worker
    Pending,
    /// Claimed and executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Canonical string stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from a stored string. Unknown values map to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized garment size table.
///
/// Maps size labels (`"S"`, `"M"`, …) to canonical measurement keys
/// (`"length"`, `"chest"`, …) with positive centimeter values. The `sizes`
/// list preserves the order the sizes appeared in on the page and agrees
/// exactly with the key set of `measurements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeTable {
    /// Size labels in page order
    pub sizes: Vec<String>,
    /// size label → measurement key → value
    pub measurements: BTreeMap<String, BTreeMap<String, f64>>,
    /// Measurement unit, canonically `"cm"`
    pub unit: String,
}

impl SizeTable {
    /// Measurement key for garment length.
    pub const LENGTH: &'static str = "length";
    /// Measurement key for chest circumference.
    pub const CHEST: &'static str = "chest";

    /// An empty table with the canonical unit.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sizes: Vec::new(),
            measurements: BTreeMap::new(),
            unit: "cm".to_string(),
        }
    }

    /// True if the table holds no sizes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// A table is qualifying iff at least one size has both a positive
    /// `length` and a positive `chest` measurement. Only qualifying tables
    /// may move a product towards ACTIVE.
    #[must_use]
    pub fn is_qualifying(&self) -> bool {
        self.measurements.values().any(|m| {
            m.get(Self::LENGTH).is_some_and(|v| *v > 0.0)
                && m.get(Self::CHEST).is_some_and(|v| *v > 0.0)
        })
    }

    /// True if any size carries a positive `length` measurement. Decides
    /// ACTIVE vs REJECTED on the enrichment path.
    #[must_use]
    pub fn has_length(&self) -> bool {
        self.measurements
            .values()
            .any(|m| m.get(Self::LENGTH).is_some_and(|v| *v > 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &[(&str, f64)])]) -> SizeTable {
        let mut t = SizeTable::empty();
        for (size, ms) in entries {
            t.sizes.push((*size).to_string());
            t.measurements.insert(
                (*size).to_string(),
                ms.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            );
        }
        t
    }

    #[test]
    fn test_product_id_valid() {
        let pid = ProductId::new("B0000000AA").expect("valid pid");
        assert_eq!(pid.as_str(), "B0000000AA");
        assert_eq!(pid.to_string(), "B0000000AA");
    }

    #[test]
    fn test_product_id_rejects_bad_length() {
        assert!(ProductId::new("B00").is_err());
        assert!(ProductId::new("B0000000AAX").is_err());
    }

    #[test]
    fn test_product_id_rejects_non_alphanumeric() {
        assert!(ProductId::new("B000-000AA").is_err());
        assert!(ProductId::new("B000 000AA").is_err());
    }

    #[test]
    fn test_product_status_round_trip() {
        for status in [
            ProductStatus::Pending,
            ProductStatus::Scraped,
            ProductStatus::Active,
            ProductStatus::Rejected,
            ProductStatus::Failed,
        ] {
            assert_eq!(ProductStatus::parse(status.as_str()), status);
        }
        assert_eq!(ProductStatus::parse("garbage"), ProductStatus::Pending);
    }

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_qualifying_requires_length_and_chest() {
        let t = table(&[("M", &[("length", 72.0), ("chest", 100.0)])]);
        assert!(t.is_qualifying());
        assert!(t.has_length());

        let t = table(&[("M", &[("chest", 100.0)])]);
        assert!(!t.is_qualifying());
        assert!(!t.has_length());

        let t = table(&[("M", &[("length", 72.0), ("width", 52.0)])]);
        assert!(!t.is_qualifying());
        assert!(t.has_length());
    }

    #[test]
    fn test_qualifying_ignores_zero_values() {
        let t = table(&[("M", &[("length", 0.0), ("chest", 100.0)])]);
        assert!(!t.is_qualifying());
        assert!(!t.has_length());
    }

    #[test]
    fn test_qualifying_any_size_suffices() {
        let t = table(&[
            ("S", &[("chest", 96.0)]),
            ("M", &[("length", 72.0), ("chest", 100.0)]),
        ]);
        assert!(t.is_qualifying());
    }

    #[test]
    fn test_size_table_serde() {
        let t = table(&[("M", &[("length", 72.0), ("chest", 100.0)])]);
        let json = serde_json::to_string(&t).expect("serialize");
        let parsed: SizeTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, t);
        assert_eq!(parsed.unit, "cm");
    }
}
