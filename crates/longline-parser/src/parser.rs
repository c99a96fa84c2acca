//! Table payload parsing.

use crate::measure::Measure;
use crate::payload::{is_size_label, Orientation, TablePayload};
use crate::value::parse_value;
use longline_core::SizeTable;
use std::collections::BTreeMap;

/// Parse a raw table payload into a normalized size table.
///
/// Unparseable tables produce an empty result rather than an error: a
/// missing or exotic size chart is an expected condition, not a failure.
/// If any size is produced, the `sizes` list and the `measurements` key
/// set agree exactly.
#[must_use]
pub fn parse_table(payload: &TablePayload) -> SizeTable {
    match payload.orientation() {
        Orientation::ColumnsAreSizes => parse_columns_are_sizes(payload),
        Orientation::RowsAreSizes => parse_rows_are_sizes(payload),
        Orientation::Unparseable => {
            tracing::debug!(
                headers = payload.headers.len(),
                rows = payload.rows.len(),
                "table payload has no recognizable size labels"
            );
            SizeTable::empty()
        }
    }
}

/// Size labels across the header row; each data row is one measurement.
fn parse_columns_are_sizes(payload: &TablePayload) -> SizeTable {
    let mut table = SizeTable::empty();

    // Remember which column each size label lives in; non-size columns
    // (care hints, inch conversions) are skipped entirely.
    let mut size_columns: Vec<(usize, String)> = Vec::new();
    for (idx, header) in payload.headers.iter().enumerate().skip(1) {
        let label = header.trim().to_string();
        if is_size_label(&label) && !table.sizes.contains(&label) {
            table.sizes.push(label.clone());
            table.measurements.insert(label.clone(), BTreeMap::new());
            size_columns.push((idx, label));
        }
    }

    for row in &payload.rows {
        let Some(raw_label) = row.first() else {
            continue;
        };
        let Some(measure) = Measure::canonicalize(raw_label) else {
            continue;
        };

        for (column, size) in &size_columns {
            let Some(cell) = row.get(*column) else {
                continue;
            };
            if let Some(value) = parse_value(cell) {
                if let Some(measurements) = table.measurements.get_mut(size) {
                    measurements.insert(measure.as_str().to_string(), value);
                }
            }
        }
    }

    table
}

/// Size labels down the first column; headers beyond index 0 label measurements.
fn parse_rows_are_sizes(payload: &TablePayload) -> SizeTable {
    let mut table = SizeTable::empty();

    let measure_columns: Vec<Option<Measure>> = payload
        .headers
        .iter()
        .skip(1)
        .map(|h| Measure::canonicalize(h))
        .collect();

    for row in &payload.rows {
        let Some(raw_label) = row.first() else {
            continue;
        };
        let label = raw_label.trim().to_string();
        if !is_size_label(&label) || table.sizes.contains(&label) {
            continue;
        }

        let mut measurements = BTreeMap::new();
        for (offset, measure) in measure_columns.iter().enumerate() {
            let Some(measure) = measure else {
                continue;
            };
            let Some(cell) = row.get(offset + 1) else {
                continue;
            };
            if let Some(value) = parse_value(cell) {
                measurements.insert(measure.as_str().to_string(), value);
            }
        }

        table.sizes.push(label.clone());
        table.measurements.insert(label, measurements);
    }

    table
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
    fn test_rows_are_sizes() {
        let table = parse_table(&payload(
            &["Größe", "Brustumfang", "Länge", "Schulter"],
            &[
                &["S", "96", "70", "44"],
                &["M", "100", "72", "45,5"],
                &["L", "104", "74", "47"],
            ],
        ));

        assert_eq!(table.sizes, vec!["S", "M", "L"]);
        assert_eq!(table.measurements["M"]["chest"], 100.0);
        assert_eq!(table.measurements["M"]["length"], 72.0);
        assert_eq!(table.measurements["M"]["shoulder"], 45.5);
        assert_eq!(table.unit, "cm");
        assert!(table.is_qualifying());
    }

    #[test]
    fn test_columns_are_sizes() {
        let table = parse_table(&payload(
            &["Maße", "S", "M", "L"],
            &[
                &["Brustumfang", "96", "100", "104"],
                &["Länge", "70", "72", "74"],
            ],
        ));

        assert_eq!(table.sizes, vec!["S", "M", "L"]);
        assert_eq!(table.measurements["S"]["chest"], 96.0);
        assert_eq!(table.measurements["L"]["length"], 74.0);
        assert!(table.is_qualifying());
    }

    #[test]
    fn test_numeric_range_takes_maximum() {
        let table = parse_table(&payload(
            &["Größe", "Brustumfang", "Länge"],
            &[&["XL", "103 - 106", "76"]],
        ));

        assert_eq!(table.measurements["XL"]["chest"], 106.0);
        assert_eq!(table.measurements["XL"]["length"], 76.0);
    }

    #[test]
    fn test_unknown_measurement_columns_dropped() {
        let table = parse_table(&payload(
            &["Größe", "Gewicht", "Länge"],
            &[&["M", "250", "72"]],
        ));

        assert_eq!(table.measurements["M"].len(), 1);
        assert_eq!(table.measurements["M"]["length"], 72.0);
    }

    #[test]
    fn test_non_size_rows_skipped() {
        let table = parse_table(&payload(
            &["Größe", "Länge"],
            &[&["M", "72"], &["Einheitsgröße", "75"], &["L", "74"]],
        ));

        assert_eq!(table.sizes, vec!["M", "L"]);
    }

    #[test]
    fn test_unparseable_table_yields_empty_result() {
        let table = parse_table(&payload(&["Farbe", "Preis"], &[&["Rot", "19,99"]]));
        assert!(table.is_empty());
        assert!(table.measurements.is_empty());
    }

    #[test]
    fn test_zero_cells_dropped() {
        let table = parse_table(&payload(
            &["Größe", "Brustumfang", "Länge"],
            &[&["M", "0", "72"]],
        ));

        assert!(!table.measurements["M"].contains_key("chest"));
        assert_eq!(table.measurements["M"]["length"], 72.0);
    }

    #[test]
    fn test_sizes_agree_with_measurement_keys() {
        let table = parse_table(&payload(
            &["Größe", "Länge"],
            &[&["S", "70"], &["M", "n/a"], &["L", "74"]],
        ));

        let keys: Vec<&String> = table.measurements.keys().collect();
        let mut sizes_sorted = table.sizes.clone();
        sizes_sorted.sort();
        assert_eq!(
            keys,
            sizes_sorted.iter().collect::<Vec<_>>(),
            "sizes list and measurement key set must agree"
        );
    }

    #[test]
    fn test_duplicate_size_rows_kept_once() {
        let table = parse_table(&payload(
            &["Größe", "Länge"],
            &[&["M", "72"], &["M", "99"]],
        ));

        assert_eq!(table.sizes, vec!["M"]);
        assert_eq!(table.measurements["M"]["length"], 72.0);
    }

    #[test]
    fn test_parser_idempotence() {
        let original = parse_table(&payload(
            &["Größe", "Brustumfang", "Länge", "Ärmellänge"],
            &[&["S", "96", "70", "60,5"], &["M", "100 - 104", "72", "62"]],
        ));
        assert!(!original.is_empty());

        let rebuilt = parse_table(&TablePayload::from_table(&original));
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_columns_are_sizes_skips_non_size_columns() {
        let table = parse_table(&payload(
            &["Maße", "S", "inch", "M"],
            &[&["Länge", "70", "27", "72"]],
        ));

        assert_eq!(table.sizes, vec!["S", "M"]);
        assert_eq!(table.measurements["S"]["length"], 70.0);
        assert_eq!(table.measurements["M"]["length"], 72.0);
    }
}
