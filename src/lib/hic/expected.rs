//! Distance-decay expected-contact models.

use crate::hic::dataset::ContactZoom;
use crate::hic::log1p_bucket;
use crate::stats::Welford;

/// The modeled average contact value as a function of genomic distance,
/// used for observed/expected ratios.
pub trait ExpectedModel {
    fn expected(&self, dist_bins: usize) -> f64;
}

/// Expected values fit per log-distance bucket: the per-bucket mean of
/// `log1p(value)` mapped back through `expm1`. Coarse but monotone enough
/// for obs/expected ranking, and cheap to fit per chromosome/resolution
/// inside a worker.
pub struct LogBinnedExpected {
    mean_log: Vec<f64>,
}

impl LogBinnedExpected {
    pub fn fit(zoom: &dyn ContactZoom, norm: Option<&[f64]>, max_dist_bins: usize) -> Self {
        let buckets = log1p_bucket(max_dist_bins) + 1;
        let mut stats: Vec<Welford> = vec![Welford::new(); buckets];
        for record in zoom.records() {
            let dist = record.dist();
            if dist > max_dist_bins || record.count <= 0.0 {
                continue;
            }
            let value = match norm {
                Some(v) => {
                    let denom = v[record.bin_x] * v[record.bin_y];
                    if denom.is_finite() && denom > 0.0 {
                        record.count as f64 / denom
                    } else {
                        continue;
                    }
                }
                None => record.count as f64,
            };
            stats[log1p_bucket(dist)].add_value(value.ln_1p());
        }
        Self {
            mean_log: stats.iter().map(|w| w.mean()).collect(),
        }
    }
}

impl ExpectedModel for LogBinnedExpected {
    fn expected(&self, dist_bins: usize) -> f64 {
        if self.mean_log.is_empty() {
            return 0.0;
        }
        let bucket = log1p_bucket(dist_bins).min(self.mean_log.len() - 1);
        self.mean_log[bucket].exp_m1()
    }
}
