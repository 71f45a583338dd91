//! Descriptive statistics over latency samples.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// The `p`-th percentile of ascending `sorted` values, `None` for an empty slice.
///
/// Interpolates linearly between the two closest ranks, with the rank of `p` being
/// `p / 100 * (n - 1)`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p / 100.0).clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Relative least-squares slope of `y` over `x`, in percent of the mean `y` per unit of `x`.
///
/// `None` if there are fewer than two points, all `x` are equal, or the mean `y` is not positive.
pub fn trend_pct(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let var_x: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if var_x <= 0.0 || mean_y <= 0.0 {
        return None;
    }

    let cov_xy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = cov_xy / var_x;

    Some(slope / mean_y * 100.0)
}

/// Summary of a latency distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// The 50th percentile.
    pub median: f64,
    /// The 95th percentile.
    pub p95: f64,
    /// The 99th percentile.
    pub p99: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
}

impl LatencySummary {
    /// Summarizes the given samples in any order, `None` if there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count: sorted.len(),
            mean: mean(&sorted)?,
            median: percentile(&sorted, 50.0)?,
            p95: percentile(&sorted, 95.0)?,
            p99: percentile(&sorted, 99.0)?,
            min: *sorted.first()?,
            max: *sorted.last()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn interpolates_percentiles() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 100.0];

        assert_close(percentile(&sorted, 50.0).unwrap(), 30.0);
        assert_close(percentile(&sorted, 95.0).unwrap(), 88.0);
        assert_close(percentile(&sorted, 99.0).unwrap(), 97.6);
        assert_close(percentile(&sorted, 0.0).unwrap(), 10.0);
        assert_close(percentile(&sorted, 100.0).unwrap(), 100.0);
        assert_close(percentile(&sorted, 25.0).unwrap(), 20.0);
    }

    #[test]
    fn percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[7.0], 99.0), Some(7.0));
        assert_close(percentile(&[1.0, 2.0], 50.0).unwrap(), 1.5);
    }

    #[test]
    fn summarizes_unsorted_values() {
        let summary = LatencySummary::from_values(&[100.0, 30.0, 10.0, 40.0, 20.0]).unwrap();

        assert_eq!(summary.count, 5);
        assert_close(summary.mean, 40.0);
        assert_close(summary.median, 30.0);
        assert_close(summary.p95, 88.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 100.0);
        assert!(summary.median <= summary.p95 && summary.p95 <= summary.p99);

        assert_eq!(LatencySummary::from_values(&[]), None);
    }

    #[test]
    fn trend_of_a_rising_series() {
        // slope 2 over a mean of 11
        let trend = trend_pct(&[(0.0, 10.0), (1.0, 12.0)]).unwrap();
        assert_close(trend, 2.0 / 11.0 * 100.0);

        let flat = trend_pct(&[(0.0, 5.0), (1.0, 5.0), (2.0, 5.0)]).unwrap();
        assert_close(flat, 0.0);

        let falling = trend_pct(&[(0.0, 12.0), (4.0, 8.0)]).unwrap();
        assert!(falling < 0.0);
    }

    #[test]
    fn undefined_trends() {
        assert_eq!(trend_pct(&[]), None);
        assert_eq!(trend_pct(&[(3.0, 1.0)]), None);
        assert_eq!(trend_pct(&[(3.0, 1.0), (3.0, 2.0)]), None);
        assert_eq!(trend_pct(&[(0.0, 0.0), (1.0, 0.0)]), None);
    }

    #[test]
    fn mean_of_nothing() {
        assert_eq!(mean(&[]), None);
        assert_close(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
    }
}
