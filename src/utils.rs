use ndarray::ArrayView2;
use tracing::info;

/// Rounds half away from zero to `decimals` places. NaN stays NaN.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Min, max and mean of the finite values of a field slice, `None` when
/// there are none.
pub fn finite_statistics(values: ArrayView2<'_, f64>) -> Option<(f64, f64, f64)> {
    let (count, min, max, sum) = values.iter().filter(|v| v.is_finite()).fold(
        (0usize, f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(n, lo, hi, sum), &v| (n + 1, lo.min(v), hi.max(v), sum + v),
    );
    (count > 0).then(|| (min, max, sum / count as f64))
}

pub fn log_field_statistics(label: &str, values: ArrayView2<'_, f64>) {
    let valid = values.iter().filter(|v| v.is_finite()).count();
    match finite_statistics(values) {
        Some((min, max, mean)) => info!(
            field = label,
            min = round_to(min, 2),
            max = round_to(max, 2),
            mean = round_to(mean, 2),
            valid,
            total = values.len(),
            "field statistics"
        ),
        None => info!(field = label, total = values.len(), "field has no valid values"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(48.123456, 2), 48.12);
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-1.005001, 2), -1.01);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_finite_statistics_skips_nan() {
        let values = array![[1.0, f64::NAN], [3.0, 5.0]];
        assert_eq!(finite_statistics(values.view()), Some((1.0, 5.0, 3.0)));

        let empty = array![[f64::NAN]];
        assert_eq!(finite_statistics(empty.view()), None);
    }
}
