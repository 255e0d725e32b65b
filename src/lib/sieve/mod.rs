//! Local-background validation of candidate loci.
//!
//! Each candidate's observed value is scored against a Welford background
//! accumulated over its local window, excluding every cell that shares the
//! candidate's row or column. A true peak drags a linear "cross" artifact
//! through its row and column; excluding only the center pixel would fold
//! that artifact into the background and deflate the z-score.

use crate::core::errors::Result;
use crate::feature::{Locus, LocusMetrics, ResolutionMetrics};
use crate::hic::dataset::Dataset;
use crate::hic::expected::{ExpectedModel, LogBinnedExpected};
use crate::hic::{norm, BinLocation, ChromPair, NormScheme};
use crate::stats::Welford;
use log::{debug, info};
use ndarray::Array2;
use rustc_hash::FxHashMap;

/// Grid cell for grouping nearby loci into one dense fetch, in bins.
const GROUPING_BINS: usize = 500;

/// How strictly the per-resolution z-score gates retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SievePolicy {
    /// Keep a locus passing at any assessed resolution.
    Default,
    /// Keep only loci passing at every assessed resolution.
    Strict,
    /// Keep everything; metrics are still recorded for auditing.
    Peek,
}

#[derive(Debug, Clone)]
pub struct SieveConfig {
    pub resolutions: Vec<u32>,
    pub window: usize,
    pub norm: NormScheme,
    pub policy: SievePolicy,
    pub zscore_cutoff: f64,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            resolutions: vec![1000, 2000, 5000],
            window: 5,
            norm: NormScheme::Vc,
            policy: SievePolicy::Default,
            zscore_cutoff: 1.0,
        }
    }
}

/// Validate one chromosome pair's candidates, attaching per-resolution
/// metrics and applying the retention policy.
pub fn sieve_pair(
    ds: &dyn Dataset,
    pair: &ChromPair,
    loci: Vec<Locus>,
    config: &SieveConfig,
) -> Result<Vec<Locus>> {
    let buffer = 2 * config.window;
    let mut resolutions = config.resolutions.clone();
    resolutions.sort_unstable();

    let n = loci.len();
    let mut metrics: Vec<LocusMetrics> = loci.iter().map(|l| l.metrics.clone()).collect();
    let mut assessed = vec![0u32; n];
    let mut passed = vec![0u32; n];

    for &resolution in &resolutions {
        let zoom = match ds.zoom(pair, resolution) {
            Some(z) => z,
            None => {
                debug!("{}: no matrix at {} bp, skipping", pair, resolution);
                continue;
            }
        };
        let mut norm_vec = ds.norm_vector(&pair.chr1, resolution, config.norm);
        if let Some(vec) = norm_vec.as_mut() {
            norm::clean_in_place(vec);
        }
        let norm_slice = norm_vec.as_deref();

        // Loci wider than a bin cannot be pinned to a pixel at this zoom.
        let this_round: Vec<usize> = (0..n)
            .filter(|&i| loci[i].width1().max(loci[i].width2()) <= resolution as u64)
            .collect();
        if this_round.is_empty() {
            continue;
        }

        let (rows, cols) = zoom.dims();
        let expected = LogBinnedExpected::fit(zoom.as_ref(), norm_slice, rows.max(cols));

        // One dense window per group of nearby loci, not per locus.
        let positions: Vec<BinLocation> = this_round
            .iter()
            .map(|&i| {
                BinLocation::new(
                    (loci[i].mid1() / resolution as u64) as usize,
                    (loci[i].mid2() / resolution as u64) as usize,
                )
            })
            .collect();
        let mut by_cell: FxHashMap<(usize, usize), Vec<usize>> = FxHashMap::default();
        for (k, pos) in positions.iter().enumerate() {
            if pos.bin_x >= rows || pos.bin_y >= cols {
                continue;
            }
            by_cell
                .entry((pos.bin_x / GROUPING_BINS, pos.bin_y / GROUPING_BINS))
                .or_default()
                .push(k);
        }

        for group in by_cell.into_values() {
            let min_r = group.iter().map(|&k| positions[k].bin_x).min().unwrap();
            let max_r = group.iter().map(|&k| positions[k].bin_x).max().unwrap();
            let min_c = group.iter().map(|&k| positions[k].bin_y).min().unwrap();
            let max_c = group.iter().map(|&k| positions[k].bin_y).max().unwrap();
            let r0 = min_r.saturating_sub(buffer);
            let c0 = min_c.saturating_sub(buffer);
            let region = zoom.dense_region(
                r0,
                (max_r + buffer + 1).min(rows),
                c0,
                (max_c + buffer + 1).min(cols),
                norm_slice,
            );

            for &k in &group {
                let i = this_round[k];
                let pos = positions[k];
                let mid_x = pos.bin_x - r0;
                let mid_y = pos.bin_y - c0;
                let dist = pos.bin_x.abs_diff(pos.bin_y);

                let zscore = local_zscore(&region, mid_x, mid_y, config.window);
                let observed = region[[mid_x, mid_y]];
                let exp = expected.expected(dist);
                let oe = if exp > 0.0 {
                    (observed as f64 / exp) as f32
                } else {
                    0.0
                };

                metrics[i].insert(
                    resolution,
                    ResolutionMetrics {
                        obs_over_expected: oe,
                        local_zscore: zscore,
                    },
                );
                assessed[i] += 1;
                if zscore > config.zscore_cutoff {
                    passed[i] += 1;
                }
            }
        }
        // The zoom view and vector drop with this iteration.
    }

    let kept: Vec<Locus> = loci
        .into_iter()
        .enumerate()
        .filter_map(|(i, mut locus)| {
            locus.metrics = metrics[i].clone();
            let keep = match config.policy {
                SievePolicy::Peek => true,
                SievePolicy::Strict => assessed[i] > 0 && passed[i] == assessed[i],
                SievePolicy::Default => passed[i] > 0,
            };
            keep.then_some(locus)
        })
        .collect();
    info!("{}: {} loci kept", pair, kept.len());
    Ok(kept)
}

/// Z-score of the center cell against the `±window` square around it,
/// excluding every cell in the center's row or column.
pub fn local_zscore(region: &Array2<f32>, mid_x: usize, mid_y: usize, window: usize) -> f64 {
    let (rows, cols) = region.dim();
    let start_r = mid_x.saturating_sub(window);
    let end_r = (mid_x + window + 1).min(rows);
    let start_c = mid_y.saturating_sub(window);
    let end_c = (mid_y + window + 1).min(cols);

    let mut welford = Welford::new();
    for i in start_r..end_r {
        for j in start_c..end_c {
            if i != mid_x && j != mid_y {
                welford.add_value(region[[i, j]] as f64);
            }
        }
    }
    welford.zscore(region[[mid_x, mid_y]] as f64)
}
