//! Measurement label canonicalization.
//!
//! Marketplace tables label measurements in German, English, or a mix of
//! both. Canonicalization is substring-based and case-insensitive over a
//! fixed bilingual alias map; unrecognized labels are dropped by the parser.

/// Canonical measurement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Garment length, hem to collar
    Length,
    /// Chest circumference
    Chest,
    /// Flat width
    Width,
    /// Shoulder width
    Shoulder,
    /// Sleeve length
    Sleeve,
    /// Waist circumference
    Waist,
    /// Hip circumference
    Hip,
    /// Body height
    Height,
}

/// Alias table, checked in order. More specific aliases come first so that
/// compounds like "Ärmellänge" resolve to sleeve rather than length.
const ALIASES: [(Measure, &[&str]); 8] = [
    (Measure::Sleeve, &["ärmel", "sleeve"]),
    (Measure::Shoulder, &["schulter", "shoulder"]),
    (Measure::Chest, &["brustumfang", "brust", "chest"]),
    (Measure::Waist, &["taille", "bund", "waist"]),
    (Measure::Hip, &["hüfte", "hip"]),
    (Measure::Height, &["körpergröße", "height"]),
    (Measure::Width, &["breite", "width"]),
    (Measure::Length, &["länge", "length"]),
];

impl Measure {
    /// Canonical key used in size tables and event payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Chest => "chest",
            Self::Width => "width",
            Self::Shoulder => "shoulder",
            Self::Sleeve => "sleeve",
            Self::Waist => "waist",
            Self::Hip => "hip",
            Self::Height => "height",
        }
    }

    /// Canonicalize a raw measurement label.
    ///
    /// Returns `None` for labels outside the alias map.
    #[must_use]
    pub fn canonicalize(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        for (measure, aliases) in ALIASES {
            if aliases.iter().any(|alias| label.contains(alias)) {
                return Some(measure);
            }
        }
        None
    }
}
