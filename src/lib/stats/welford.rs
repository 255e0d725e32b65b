//! Numerically stable online mean/variance accumulators.
//!
//! Contact counts span several orders of magnitude and arrive as a stream,
//! so both the scalar [`Welford`] and the bucketed [`WelfordBuckets`] use
//! the incremental update
//! `mean' = mean + (x - mean)/n; ssd' += (x - mean)(x - mean')`
//! rather than a two-pass sum of squares.

use crate::stats::zscore::ZScores;

/// Scalar streaming mean/variance accumulator.
#[derive(Debug, Clone, Default)]
pub struct Welford {
    count: u64,
    mean: f64,
    agg_squared_diff: f64,
}

impl Welford {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, x: f64) {
        self.count += 1;
        let next_mean = self.mean + (x - self.mean) / self.count as f64;
        self.agg_squared_diff += (x - self.mean) * (x - next_mean);
        self.mean = next_mean;
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation; `0` until more than two values were seen,
    /// so the undefined small-sample variance is never divided.
    pub fn stddev(&self) -> f64 {
        if self.count > 2 {
            (self.agg_squared_diff / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }

    /// Z-score of `x` against this accumulator; `0` when the deviation is
    /// degenerate.
    pub fn zscore(&self, x: f64) -> f64 {
        let sd = self.stddev();
        if sd > 0.0 {
            (x - self.mean) / sd
        } else {
            0.0
        }
    }
}

/// Per-bucket streaming moments, one [`Welford`] state per distance bucket
/// stored as flat arrays.
///
/// Bucket indices must be validated by the caller; an out-of-range bucket is
/// a contract violation and panics.
#[derive(Debug, Clone)]
pub struct WelfordBuckets {
    counts: Vec<u64>,
    mu: Vec<f64>,
    agg_squared_diffs: Vec<f64>,
}

impl WelfordBuckets {
    pub fn new(n: usize) -> Self {
        Self {
            counts: vec![0; n],
            mu: vec![0.0; n],
            agg_squared_diffs: vec![0.0; n],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn add_value(&mut self, bucket: usize, x: f64) {
        self.counts[bucket] += 1;
        let next_mu = self.mu[bucket] + (x - self.mu[bucket]) / self.counts[bucket] as f64;
        self.agg_squared_diffs[bucket] += (x - self.mu[bucket]) * (x - next_mu);
        self.mu[bucket] = next_mu;
    }

    #[inline]
    pub fn count(&self, bucket: usize) -> u64 {
        self.counts[bucket]
    }

    pub fn mean(&self) -> &[f64] {
        &self.mu
    }

    /// Per-bucket sample standard deviation; `0` for any bucket with fewer
    /// than three values.
    pub fn stddev(&self) -> Vec<f64> {
        let mut std = vec![0.0; self.counts.len()];
        for i in 0..self.counts.len() {
            if self.counts[i] > 2 {
                std[i] = (self.agg_squared_diffs[i] / (self.counts[i] - 1) as f64).sqrt();
            }
        }
        std
    }

    pub fn zscores(&self) -> ZScores {
        ZScores::new(self.mu.clone(), self.stddev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn two_pass_mean_var(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        (mean, var)
    }

    proptest! {
        #[test]
        fn matches_two_pass_statistics(values in prop::collection::vec(-1e4f64..1e4, 3..200)) {
            let mut w = Welford::new();
            for &v in &values {
                w.add_value(v);
            }
            let (mean, var) = two_pass_mean_var(&values);
            prop_assert!((w.mean() - mean).abs() < 1e-6 * (1.0 + mean.abs()));
            prop_assert!((w.stddev() - var.sqrt()).abs() < 1e-6 * (1.0 + var.sqrt()));
        }
    }

    #[test]
    fn stddev_zero_below_three_samples() {
        let mut w = Welford::new();
        assert_eq!(w.stddev(), 0.0);
        w.add_value(5.0);
        assert_eq!(w.stddev(), 0.0);
        w.add_value(9.0);
        assert_eq!(w.stddev(), 0.0);
        w.add_value(1.0);
        assert!(w.stddev() > 0.0);
    }

    #[test]
    fn bucketed_stddev_zero_below_three_samples() {
        let mut buckets = WelfordBuckets::new(2);
        buckets.add_value(0, 1.0);
        buckets.add_value(0, 2.0);
        for _ in 0..5 {
            buckets.add_value(1, 3.0);
            buckets.add_value(1, 7.0);
        }
        let std = buckets.stddev();
        assert_eq!(std[0], 0.0);
        assert!(std[1] > 0.0);
    }

    #[test]
    fn bucketed_mean_tracks_inputs() {
        let mut buckets = WelfordBuckets::new(1);
        for v in [2.0, 4.0, 6.0, 8.0] {
            buckets.add_value(0, v);
        }
        assert_abs_diff_eq!(buckets.mean()[0], 5.0, epsilon = 1e-12);
        assert_eq!(buckets.count(0), 4);
    }
}
