//! Numeric cell parsing.

/// Parse a measurement cell into a positive number.
///
/// Strips everything except digits, `.` and `,`; a comma is treated as the
/// decimal separator. A range of the form `a - b` resolves to the larger
/// bound, which captures the garment's outer extent. Returns `None` for
/// zero, negative or unparseable cells.
#[must_use]
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some((left, right)) = text.split_once('-') {
        let a = parse_single(left);
        let b = parse_single(right);
        return match (a, b) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
    }

    parse_single(text)
}

fn parse_single(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '0'..='9' | '.' => Some(c),
            ',' => Some('.'),
            _ => None,
        })
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) if v > 0.0 => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integers() {
        assert_eq!(parse_value("76"), Some(76.0));
        assert_eq!(parse_value(" 104 cm "), Some(104.0));
    }

    #[test]
    fn test_comma_decimal() {
        assert_eq!(parse_value("71,5"), Some(71.5));
        assert_eq!(parse_value("71.5"), Some(71.5));
    }

    #[test]
    fn test_range_takes_maximum() {
        assert_eq!(parse_value("103 - 106"), Some(106.0));
        assert_eq!(parse_value("84-94"), Some(94.0));
        // Reversed bounds still yield the larger value
        assert_eq!(parse_value("94 - 84"), Some(94.0));
    }

    #[test]
    fn test_half_open_range() {
        assert_eq!(parse_value("103 -"), Some(103.0));
        assert_eq!(parse_value("- 106"), Some(106.0));
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert_eq!(parse_value("0"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("n/a"), None);
        assert_eq!(parse_value("-"), None);
    }
}
