//! Value resolution and deficiency classification
//!
//! Pure per-record helpers: resolve a possibly-censored result into a
//! numeric value, and classify it against an explicit threshold. Missing or
//! unparseable values propagate as `None`; nothing here defaults to
//! "not deficient".

/// Resolve a measurement into a numeric value
///
/// The numeric column wins when present. Otherwise the censored text column
/// is stripped of everything but digits, sign and decimal point (`<20` ->
/// `20`). An empty or unparseable remainder resolves to `None`.
#[must_use]
pub fn resolve_value(numeric: Option<f64>, censored: Option<&str>) -> Option<f64> {
    if let Some(v) = numeric {
        if v.is_finite() {
            return Some(v);
        }
    }
    let text = censored?;
    let stripped: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Classify a resolved value against the deficiency threshold
///
/// Below the threshold is deficient. A missing value stays missing.
#[must_use]
pub fn classify_deficient(value: Option<f64>, threshold: f64) -> Option<bool> {
    value.map(|v| v < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 50.0;

    #[test]
    fn test_numeric_column_wins() {
        assert_eq!(resolve_value(Some(42.5), Some("<20")), Some(42.5));
    }

    #[test]
    fn test_censored_string_stripped() {
        assert_eq!(resolve_value(None, Some("<20")), Some(20.0));
        assert_eq!(resolve_value(None, Some("> 125")), Some(125.0));
        assert_eq!(resolve_value(None, Some("12.5")), Some(12.5));
    }

    #[test]
    fn test_unparseable_resolves_to_none() {
        assert_eq!(resolve_value(None, Some("pending")), None);
        assert_eq!(resolve_value(None, Some("")), None);
        assert_eq!(resolve_value(None, None), None);
        assert_eq!(resolve_value(Some(f64::NAN), None), None);
    }

    #[test]
    fn test_classification_is_monotonic_around_threshold() {
        assert_eq!(classify_deficient(Some(0.0), THRESHOLD), Some(true));
        assert_eq!(classify_deficient(Some(49.999), THRESHOLD), Some(true));
        assert_eq!(classify_deficient(Some(50.0), THRESHOLD), Some(false));
        assert_eq!(classify_deficient(Some(120.0), THRESHOLD), Some(false));
    }

    #[test]
    fn test_missing_never_coerced() {
        // A missing value must stay missing, not become "not deficient"
        assert_eq!(classify_deficient(None, THRESHOLD), None);
        assert_eq!(
            classify_deficient(resolve_value(None, Some("n/a")), THRESHOLD),
            None
        );
    }
}
