use rust_decimal::Decimal;

/// Ratio applied when none is configured
pub fn default_dominant_ratio() -> Decimal {
    Decimal::new(1, 1)
}

/// Deltas whose magnitude is at least `ratio` times the largest magnitude.
///
/// Order is preserved. The result is never empty for non-empty input since
/// the largest value always qualifies.
pub fn dominant_figures(deltas: &[Decimal], ratio: Decimal) -> Vec<Decimal> {
    let Some(max_abs) = deltas.iter().map(|delta| delta.abs()).max() else {
        return Vec::new();
    };

    let threshold = max_abs * ratio;
    deltas
        .iter()
        .copied()
        .filter(|delta| delta.abs() >= threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_dust_dropped() {
        let deltas = vec![dec!(-1000), dec!(3), dec!(250), dec!(-99)];
        assert_eq!(
            dominant_figures(&deltas, default_dominant_ratio()),
            vec![dec!(-1000), dec!(250)]
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let deltas = vec![dec!(1000), dec!(-100)];
        assert_eq!(dominant_figures(&deltas, dec!(0.1)), deltas);
    }

    #[test]
    fn test_all_zero() {
        let deltas = vec![dec!(0), dec!(0)];
        assert_eq!(dominant_figures(&deltas, dec!(0.1)), deltas);
    }

    #[test]
    fn test_empty() {
        assert!(dominant_figures(&[], dec!(0.1)).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let deltas = vec![dec!(5), dec!(-700), dec!(69), dec!(71), dec!(650)];
        let once = dominant_figures(&deltas, dec!(0.1));
        let twice = dominant_figures(&once, dec!(0.1));
        assert_eq!(once, twice);
    }
}
