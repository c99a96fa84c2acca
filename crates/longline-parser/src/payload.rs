//! Raw table payload and orientation detection.

use longline_core::SizeTable;
use serde::{Deserialize, Serialize};

/// The closed set of size labels recognized in table cells.
///
/// Comparison is case-insensitive after trimming.
pub const SIZE_LABELS: [&str; 11] = [
    "XS", "S", "M", "L", "XL", "XXL", "XXXL", "3XL", "4XL", "5XL", "6XL",
];

/// True if `s` (trimmed, case-insensitive) is a known size label.
#[must_use]
pub fn is_size_label(s: &str) -> bool {
    let s = s.trim().to_ascii_uppercase();
    SIZE_LABELS.contains(&s.as_str())
}

/// A raw table as read from the DOM: a header row plus data rows of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePayload {
    /// The first table row
    pub headers: Vec<String>,
    /// All remaining rows
    pub rows: Vec<Vec<String>>,
}

/// Which axis of the table carries the size labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Size labels across the header row (from index 1); each data row is a
    /// measurement.
    ColumnsAreSizes,
    /// Size labels down the first column; each header beyond index 0 labels
    /// a measurement.
    RowsAreSizes,
    /// Neither axis contains a recognized size label.
    Unparseable,
}

impl TablePayload {
    /// Detect the table orientation.
    ///
    /// Header cells win: if any header after index 0 is a size label the
    /// table is [`Orientation::ColumnsAreSizes`]; otherwise, if any data
    /// row starts with a size label it is [`Orientation::RowsAreSizes`].
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        if self.headers.iter().skip(1).any(|h| is_size_label(h)) {
            return Orientation::ColumnsAreSizes;
        }
        if self
            .rows
            .iter()
            .any(|row| row.first().is_some_and(|c| is_size_label(c)))
        {
            return Orientation::RowsAreSizes;
        }
        Orientation::Unparseable
    }

    /// Rebuild a rows-are-sizes payload from a normalized table.
    ///
    /// Measurement columns are emitted in the sorted union of all keys the
    /// table contains; sizes keep their original order. Parsing the result
    /// yields the same table again.
    #[must_use]
    pub fn from_table(table: &SizeTable) -> Self {
        let mut keys: Vec<String> = Vec::new();
        for measurements in table.measurements.values() {
            for key in measurements.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys.sort();

        let mut headers = Vec::with_capacity(keys.len() + 1);
        headers.push("Größe".to_string());
        headers.extend(keys.iter().cloned());

        let rows = table
            .sizes
            .iter()
            .map(|size| {
                let mut row = Vec::with_capacity(keys.len() + 1);
                row.push(size.clone());
                let measurements = table.measurements.get(size);
                for key in &keys {
                    let cell = measurements
                        .and_then(|m| m.get(key))
                        .map(|v| format_value(*v))
                        .unwrap_or_default();
                    row.push(cell);
                }
                row
            })
            .collect();

        Self { headers, rows }
    }
}

fn format_value(v: f64) -> String {
    if (v - v.trunc()).abs() < f64::EPSILON {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(headers: &[&str], rows: &[&[&str]]) -> TablePayload {
        TablePayload {
            headers: headers.iter().map(ToString::to_string).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(ToString::to_string).collect())
                .collect(),
        }
    }

    #[test]
    fn test_size_label_lexicon() {
        assert!(is_size_label("XL"));
        assert!(is_size_label(" m "));
        assert!(is_size_label("6xl"));
        assert!(!is_size_label("42"));
        assert!(!is_size_label("Größe"));
        assert!(!is_size_label(""));
    }

    #[test]
    fn test_orientation_rows_are_sizes() {
        let p = payload(
            &["Größe", "Brustumfang", "Länge"],
            &[&["S", "96", "70"], &["M", "100", "72"]],
        );
        assert_eq!(p.orientation(), Orientation::RowsAreSizes);
    }

    #[test]
    fn test_orientation_columns_are_sizes() {
        let p = payload(
            &["Maße", "S", "M", "L"],
            &[&["Brustumfang", "96", "100", "104"]],
        );
        assert_eq!(p.orientation(), Orientation::ColumnsAreSizes);
    }

    #[test]
    fn test_orientation_header_wins() {
        // A size label in the header takes precedence over one in a row
        let p = payload(&["Größe", "M"], &[&["S", "100"]]);
        assert_eq!(p.orientation(), Orientation::ColumnsAreSizes);
    }

    #[test]
    fn test_orientation_unparseable() {
        let p = payload(&["Farbe", "Preis"], &[&["Rot", "19,99"]]);
        assert_eq!(p.orientation(), Orientation::Unparseable);
    }

    #[test]
    fn test_first_header_cell_ignored() {
        // Index 0 of the header row never counts as a size label
        let p = payload(&["XL", "Brustumfang"], &[&["Rot", "100"]]);
        assert_eq!(p.orientation(), Orientation::Unparseable);
    }
}
