//! Normalization vectors: schemes, computation, and outlier cleanup.
//!
//! Vectors correct per-bin technical bias; dividing a raw count by the
//! product of the two bins' factors yields a normalized contact value. Any
//! vector used as a denominator must first pass through [`clean_in_place`]
//! so division artifacts cannot propagate into z-scores.

use crate::hic::dataset::ContactZoom;
use std::str::FromStr;

/// Normalization schemes carried concurrently through the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormScheme {
    /// Matrix-balancing scale factors.
    Scale,
    /// Vanilla coverage: mean-scaled row sums.
    Vc,
    /// Square root of vanilla coverage.
    VcSqrt,
}

impl NormScheme {
    pub const ALL: [NormScheme; 3] = [NormScheme::Scale, NormScheme::Vc, NormScheme::VcSqrt];

    pub fn label(&self) -> &'static str {
        match self {
            NormScheme::Scale => "SCALE",
            NormScheme::Vc => "VC",
            NormScheme::VcSqrt => "VC_SQRT",
        }
    }
}

impl std::fmt::Display for NormScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NormScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCALE" => Ok(NormScheme::Scale),
            "VC" => Ok(NormScheme::Vc),
            "VC_SQRT" | "VCSQRT" => Ok(NormScheme::VcSqrt),
            other => Err(format!("Unknown normalization scheme '{}'", other)),
        }
    }
}

/// Per-bin coverage: each record contributes its count to both bins, once to
/// the diagonal.
pub fn row_sums(zoom: &dyn ContactZoom) -> Vec<f64> {
    let (nrows, _) = zoom.dims();
    let mut sums = vec![0.0; nrows];
    for record in zoom.records() {
        if record.count > 0.0 {
            sums[record.bin_x] += record.count as f64;
            if record.bin_x != record.bin_y {
                sums[record.bin_y] += record.count as f64;
            }
        }
    }
    sums
}

/// Compute the vector for `scheme` from a zoom's raw records.
pub fn compute_vector(zoom: &dyn ContactZoom, scheme: NormScheme) -> Vec<f64> {
    match scheme {
        NormScheme::Vc => vc_vector(zoom),
        NormScheme::VcSqrt => vc_vector(zoom).into_iter().map(f64::sqrt).collect(),
        NormScheme::Scale => scale_vector(zoom, 50, 1e-3),
    }
}

/// Vanilla-coverage factors: row sums divided by the mean covered row sum,
/// so a typical bin sits near 1 and normalized values stay on the raw count
/// scale. Uncovered bins are undefined.
pub fn vc_vector(zoom: &dyn ContactZoom) -> Vec<f64> {
    let sums = row_sums(zoom);
    let covered: Vec<f64> = sums.iter().copied().filter(|&s| s > 0.0).collect();
    if covered.is_empty() {
        return vec![f64::NAN; sums.len()];
    }
    let mean = covered.iter().sum::<f64>() / covered.len() as f64;
    sums.into_iter()
        .map(|s| if s > 0.0 { s / mean } else { f64::NAN })
        .collect()
}

/// Matrix-balancing factors via bounded Sinkhorn iteration: drive the
/// normalized row sums toward uniformity. The iteration is scale-preserving,
/// so normalized values stay comparable to raw counts and the cascade's
/// magnitude gates remain meaningful. Bins with no coverage are undefined.
pub fn scale_vector(zoom: &dyn ContactZoom, max_iters: usize, tol: f64) -> Vec<f64> {
    let (nrows, _) = zoom.dims();
    let raw_sums = row_sums(zoom);
    let covered: Vec<usize> = (0..nrows).filter(|&i| raw_sums[i] > 0.0).collect();
    if covered.is_empty() {
        return vec![f64::NAN; nrows];
    }

    let mut v = vec![1.0; nrows];
    for _ in 0..max_iters {
        // Normalized row sums under the current factors.
        let mut sums = vec![0.0; nrows];
        for record in zoom.records() {
            let denom = v[record.bin_x] * v[record.bin_y];
            if denom > 0.0 && record.count > 0.0 {
                let val = record.count as f64 / denom;
                sums[record.bin_x] += val;
                if record.bin_x != record.bin_y {
                    sums[record.bin_y] += val;
                }
            }
        }
        let mean_sum = covered.iter().map(|&i| sums[i]).sum::<f64>() / covered.len() as f64;
        if mean_sum <= 0.0 {
            break;
        }
        let mut max_delta: f64 = 0.0;
        for &i in &covered {
            if sums[i] > 0.0 {
                let ratio = sums[i] / mean_sum;
                v[i] *= ratio.sqrt();
                max_delta = max_delta.max((ratio - 1.0).abs());
            }
        }
        if max_delta < tol {
            break;
        }
    }

    (0..nrows)
        .map(|i| if raw_sums[i] > 0.0 { v[i] } else { f64::NAN })
        .collect()
}

/// In-place cleanup of a normalization vector before it gates candidate
/// acceptance: infinite and negative entries become undefined, then the
/// Tukey rule on the log scale marks entries far below the first quartile
/// as undefined.
pub fn clean_in_place(vec: &mut [f64]) {
    for v in vec.iter_mut() {
        if v.is_infinite() || *v < 0.0 {
            *v = f64::NAN;
        }
    }

    let mut logs: Vec<f64> = vec
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| v.ln())
        .filter(|l| l.is_finite())
        .collect();
    if logs.len() < 4 {
        return;
    }
    logs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p25 = percentile(&logs, 0.25);
    let iqr = percentile(&logs, 0.75) - p25;
    let lower_bound = p25 - 1.5 * iqr;

    for v in vec.iter_mut() {
        // NaN entries fail the comparison and stay as they are.
        if v.ln() < lower_bound {
            *v = f64::NAN;
        }
    }
}

/// Linear-interpolation quantile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hic::dataset::{Dataset, InMemoryDataset};
    use crate::hic::ChromPair;

    #[test]
    fn clean_marks_invalid_entries_undefined() {
        let mut vec = vec![1.0, 0.9, 1.1, 1.2, 0.8, 1.05, f64::INFINITY, -3.0];
        clean_in_place(&mut vec);
        assert!(vec[6].is_nan());
        assert!(vec[7].is_nan());
        assert!(vec[..6].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn clean_applies_log_scale_tukey_fence() {
        // A cluster near 1.0 and one extreme low outlier.
        let mut vec = vec![1.0, 1.1, 0.9, 1.05, 0.95, 1.2, 0.85, 1e-8];
        clean_in_place(&mut vec);
        assert!(vec[7].is_nan());
        assert!(vec[..7].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn clean_leaves_short_vectors_untouched() {
        let mut vec = vec![1.0, 2.0];
        clean_in_place(&mut vec);
        assert_eq!(vec, [1.0, 2.0]);
    }

    #[test]
    fn vc_vector_scales_to_unit_mean() {
        let mut ds = InMemoryDataset::new(100, vec![("chrT".to_string(), 400)]);
        ds.add_contacts("chrT", &[(0, 1, 4.0), (1, 2, 4.0), (2, 3, 4.0)])
            .unwrap();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 100).unwrap();
        let vc = vc_vector(zoom.as_ref());
        let covered: Vec<f64> = vc.iter().copied().filter(|v| !v.is_nan()).collect();
        let mean = covered.iter().sum::<f64>() / covered.len() as f64;
        assert!((mean - 1.0).abs() < 1e-9);
        // Uncovered trailing bin is undefined.
        assert!(vc[4].is_nan());
    }

    #[test]
    fn scale_vector_balances_row_sums() {
        let mut ds = InMemoryDataset::new(100, vec![("chrT".to_string(), 500)]);
        // Lopsided coverage: bin 0 is much hotter than the rest.
        ds.add_contacts(
            "chrT",
            &[(0, 1, 40.0), (0, 2, 40.0), (1, 2, 4.0), (2, 3, 4.0), (1, 3, 4.0)],
        )
        .unwrap();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 100).unwrap();
        let v = scale_vector(zoom.as_ref(), 50, 1e-6);

        let mut sums = vec![0.0; 6];
        for r in zoom.records() {
            let val = r.count as f64 / (v[r.bin_x] * v[r.bin_y]);
            sums[r.bin_x] += val;
            if r.bin_x != r.bin_y {
                sums[r.bin_y] += val;
            }
        }
        let covered: Vec<f64> = sums.into_iter().filter(|&s| s > 0.0).collect();
        let mean = covered.iter().sum::<f64>() / covered.len() as f64;
        for s in covered {
            assert!((s / mean - 1.0).abs() < 0.15, "unbalanced row sum {}", s);
        }
    }
}
