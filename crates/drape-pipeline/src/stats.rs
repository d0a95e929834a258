//! Small descriptive statistics over sample vectors.

/// Value at quantile `q` of an ascending slice.
///
/// Uses the lower sample at index `floor(q * (n - 1))` without
/// interpolation. Returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let idx = (q.clamp(0.0, 1.0) * last as f64).floor() as usize;
    sorted.get(idx.min(last)).copied()
}

/// Ascending copy of `values` in IEEE total order.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Share of `values` satisfying `predicate`, `0.0` when empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| predicate(v)).count() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_uses_lower_index() {
        let v = [1.0, 2.0, 3.0, 4.0];
        // floor(0.5 * 3) = 1
        assert_eq!(quantile(&v, 0.5), Some(2.0));
        // floor(0.9 * 3) = 2
        assert_eq!(quantile(&v, 0.9), Some(3.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
        assert_eq!(quantile(&v, 0.0), Some(1.0));
    }

    #[test]
    fn quantile_of_empty_is_none() {
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn quantile_of_single_value() {
        assert_eq!(quantile(&[7.5], 0.85), Some(7.5));
    }

    #[test]
    fn sorted_is_ascending_and_leaves_input() {
        let v = [3.0, -1.0, 2.0];
        assert_eq!(sorted(&v), vec![-1.0, 2.0, 3.0]);
        assert_eq!(v, [3.0, -1.0, 2.0]);
    }

    #[test]
    fn fraction_counts_matches() {
        let v = [1.0, 5.0, 10.0, 20.0];
        assert!((fraction(&v, |x| x >= 10.0) - 0.5).abs() < f64::EPSILON);
        assert!(fraction(&[], |_| true).abs() < f64::EPSILON);
    }
}
