//! Descriptive statistics primitives
//!
//! Small numeric helpers shared by the outlier detector and the
//! aggregator. All functions skip nothing themselves: callers strip
//! missing values first with [`non_missing`], so every aggregate sees
//! only real measurements.

/// Collect the non-missing values of a column, in row order.
pub fn non_missing(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter_map(|v| *v).collect()
}

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). `None` for fewer than 2 values:
/// insufficient data is a distinct state from zero variance.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile with linear interpolation between order statistics
/// (`pos = q * (n - 1)`), the single interpolation rule used everywhere
/// so quartile-based results are reproducible. `None` for an empty slice
/// or `q` outside [0, 1].
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let pos = q * (sorted.len() as f64 - 1.0);
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let a = sorted[idx];
    let b = sorted[(idx + 1).min(sorted.len() - 1)];
    Some(a + (b - a) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_missing_strips_gaps() {
        let values = vec![Some(1.0), None, Some(3.0), None];
        assert_eq!(non_missing(&values), vec![1.0, 3.0]);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(mean(&[60.0, 80.0, 100.0]), Some(80.0));
    }

    #[test]
    fn test_sample_std_needs_two_values() {
        assert_eq!(sample_std(&[]), None);
        assert_eq!(sample_std(&[5.0]), None);
        // [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, sum of squares 32, 32/7
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_std_zero_variance() {
        let std = sample_std(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(std, 0.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = vec![10.0, 11.0, 12.0, 12.0, 13.0, 100.0];
        // pos = 0.25 * 5 = 1.25 -> 11 + 0.25 * (12 - 11)
        assert!((quantile(&values, 0.25).unwrap() - 11.25).abs() < 1e-12);
        // pos = 0.75 * 5 = 3.75 -> 12 + 0.75 * (13 - 12)
        assert!((quantile(&values, 0.75).unwrap() - 12.75).abs() < 1e-12);
        assert_eq!(quantile(&values, 0.0), Some(10.0));
        assert_eq!(quantile(&values, 1.0), Some(100.0));
    }

    #[test]
    fn test_quantile_unsorted_input() {
        let values = vec![9.0, 1.0, 5.0];
        assert_eq!(quantile(&values, 0.5), Some(5.0));
    }

    #[test]
    fn test_quantile_edge_cases() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[7.0], 0.5), Some(7.0));
        assert_eq!(quantile(&[1.0, 2.0], 1.5), None);
    }
}
