//! The multi-resolution extreme-pixel cascade.
//!
//! Candidates are born at the finest resolution from per-distance z-scores
//! over raw counts, then survive only if coarser resolutions corroborate
//! them: usable coverage, an AND-combined multi-normalization z-score pass
//! nearby, and local-maximum status in the coarse matrix. Survivors are
//! coalesced to one centroid per cluster and optionally pinpointed against
//! a smoothed local density.

pub mod coverage;
pub mod enrichment;
pub mod extremes;
pub mod nms;

use crate::cluster::{components, smooth};
use crate::core::errors::{CalderaError, Result};
use crate::feature::Locus;
use crate::hic::dataset::{ContactZoom, Dataset};
use crate::hic::{norm, BinLocation, Chromosome, ChromPair, NormScheme};
use log::{debug, info};
use std::sync::Arc;

/// Cascade tuning knobs; defaults are the shipped constants.
#[derive(Debug, Clone)]
pub struct SiftConfig {
    /// Finest resolution, where candidates are born.
    pub hires: u32,
    /// Coarser corroboration resolutions, ascending.
    pub low_resolutions: Vec<u32>,
    pub min_dist_bp: u64,
    pub max_dist_bp: u64,
    pub hires_zscore_cutoff: f64,
    pub lowres_zscore_cutoff: f64,
    pub coalesce_radius_bp: u64,
    /// Re-localize each centroid on a smoothed density summit.
    pub pinpoint: bool,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            hires: 200,
            low_resolutions: vec![5000],
            min_dist_bp: 10_000,
            max_dist_bp: 10_000_000,
            hires_zscore_cutoff: 2.0,
            lowres_zscore_cutoff: 2.0,
            coalesce_radius_bp: 5_000,
            pinpoint: false,
        }
    }
}

/// Run the full cascade for one chromosome. A chromosome with no backing
/// matrix yields an empty call set; a missing normalization vector at a
/// resolution that does have a matrix is an error for this unit.
pub fn sift_chromosome(
    ds: &dyn Dataset,
    chrom: &Chromosome,
    config: &SiftConfig,
) -> Result<Vec<Locus>> {
    let pair = ChromPair::intra(chrom);
    let zoom_high = match ds.zoom(&pair, config.hires) {
        Some(z) => z,
        None => {
            debug!("{}: no matrix at {} bp, skipping", chrom.name, config.hires);
            return Ok(Vec::new());
        }
    };

    let max_bin = (config.max_dist_bp / config.hires as u64) as usize;
    let min_bin = (config.min_dist_bp / config.hires as u64) as usize;
    info!("{}: start hi-res pass ({})", chrom.name, config.hires);
    let mut pixels = extremes::hires_extreme_pixels(
        zoom_high.as_ref(),
        max_bin,
        min_bin,
        config.hires_zscore_cutoff,
    );
    info!("{}: {} initial candidates", chrom.name, pixels.len());
    drop(zoom_high);

    for &low_res in &config.low_resolutions {
        if pixels.is_empty() {
            break;
        }
        let scale = (low_res / config.hires) as usize;

        let mut scale_vec = require_vector(ds, chrom, low_res, NormScheme::Scale)?;
        let mut coverage_vec = require_vector(ds, chrom, low_res, NormScheme::Vc)?;
        norm::clean_in_place(&mut scale_vec);
        norm::clean_in_place(&mut coverage_vec);

        coverage::filter_by_norms(&mut pixels, &scale_vec, &coverage_vec, scale);
        info!(
            "{}: {} candidates after coverage filter ({})",
            chrom.name,
            pixels.len(),
            low_res
        );

        let zoom_low = match ds.zoom(&pair, low_res) {
            Some(z) => z,
            None => {
                debug!("{}: no matrix at {} bp, skipping", chrom.name, low_res);
                continue;
            }
        };
        let mut sqrt_vec = require_vector(ds, chrom, low_res, NormScheme::VcSqrt)?;
        norm::clean_in_place(&mut sqrt_vec);

        info!("{}: start low-res pass ({})", chrom.name, low_res);
        let corroborated = extremes::extreme_locations(
            zoom_low.as_ref(),
            &[scale_vec, coverage_vec, sqrt_vec],
            (config.max_dist_bp / low_res as u64) as usize,
            (config.min_dist_bp / low_res as u64) as usize,
            config.lowres_zscore_cutoff,
        );
        nms::filter_by_overlap(&mut pixels, &corroborated, scale);
        info!(
            "{}: {} candidates after corroboration ({})",
            chrom.name,
            pixels.len(),
            low_res
        );

        enrichment::filter_if_not_local_max(zoom_low.as_ref(), &mut pixels, scale);
        info!(
            "{}: {} candidates after local-max filter ({})",
            chrom.name,
            pixels.len(),
            low_res
        );
        // zoom_low and the vectors drop here; nothing coarse outlives the
        // resolution it belongs to.
    }

    let mut centroids = nms::coalesce_to_centroids(pixels, config.hires, config.coalesce_radius_bp);
    info!("{}: {} loci after coalescing", chrom.name, centroids.len());

    if config.pinpoint && !centroids.is_empty() {
        if let Some(zoom_high) = ds.zoom(&pair, config.hires) {
            centroids = pinpoint(zoom_high, centroids);
        }
    }

    Ok(centroids
        .into_iter()
        .map(|(pixel, _)| Locus::from_pixel(chrom, pixel, config.hires))
        .collect())
}

fn require_vector(
    ds: &dyn Dataset,
    chrom: &Chromosome,
    resolution: u32,
    scheme: NormScheme,
) -> Result<Vec<f64>> {
    ds.norm_vector(chrom, resolution, scheme)
        .ok_or_else(|| CalderaError::MissingNormVector {
            scheme: scheme.label().to_string(),
            chrom: chrom.name.clone(),
            resolution,
        })
}

/// Half-width of the pinpoint window in fine bins.
const PINPOINT_WINDOW: usize = 16;

/// Floor under the smoothed-summit threshold; windows without that much
/// signal keep their centroid.
const PINPOINT_FLOOR: f32 = 10.0;

/// Snap each centroid to the summit of the strongest connected region of
/// its smoothed local window.
fn pinpoint(
    zoom: Arc<dyn ContactZoom + Send + Sync>,
    centroids: Vec<(BinLocation, f32)>,
) -> Vec<(BinLocation, f32)> {
    centroids
        .into_iter()
        .map(|(loc, count)| {
            let r0 = loc.bin_x.saturating_sub(PINPOINT_WINDOW);
            let c0 = loc.bin_y.saturating_sub(PINPOINT_WINDOW);
            let region = zoom.dense_region(
                r0,
                loc.bin_x + PINPOINT_WINDOW + 1,
                c0,
                loc.bin_y + PINPOINT_WINDOW + 1,
                None,
            );
            let density = smooth::smooth_2d(&region);
            let summit = components::extract_maxima(&density, PINPOINT_FLOOR)
                .into_iter()
                .max_by(|a, b| a.max_val.partial_cmp(&b.max_val).unwrap());
            match summit {
                Some(m) => (
                    BinLocation::new(r0 + m.max_coordinate.0, c0 + m.max_coordinate.1),
                    count,
                ),
                None => (loc, count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hic::dataset::InMemoryDataset;

    /// Deterministic small-count noise, roughly Poisson(5)-shaped.
    fn noise(i: usize, j: usize) -> f32 {
        let mut h = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(j as u64);
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51afd7ed558ccd);
        h ^= h >> 33;
        3.0 + (h % 5) as f32
    }

    /// 200x200 bins of uniform background with one implanted strong peak at
    /// distance 100 and a weaker shoulder two bins over.
    fn synthetic_dataset() -> (InMemoryDataset, BinLocation) {
        let peak = BinLocation::new(50, 150);
        let mut triplets = Vec::new();
        for i in 0..200usize {
            for j in i..200usize {
                triplets.push((i, j, noise(i, j)));
            }
        }
        triplets.push((peak.bin_x, peak.bin_y, 245.0)); // ~50x background
        triplets.push((peak.bin_x, peak.bin_y + 2, 95.0));

        let mut ds = InMemoryDataset::new(200, vec![("chrS".to_string(), 40_000)]);
        ds.add_contacts("chrS", &triplets).unwrap();
        (ds, peak)
    }

    fn test_config() -> SiftConfig {
        SiftConfig {
            // 40 kb of chromosome: corroborate at 1 kb so the distance
            // window still exists at the coarse resolution.
            low_resolutions: vec![1000],
            ..SiftConfig::default()
        }
    }

    #[test]
    fn cascade_retains_implanted_peak_and_rejects_background() {
        let (ds, peak) = synthetic_dataset();
        let chrom = ds.chromosome("chrS").unwrap().clone();
        let loci = sift_chromosome(&ds, &chrom, &test_config()).unwrap();

        assert!(!loci.is_empty(), "implanted peak was lost");
        let hit = loci.iter().any(|l| {
            let bin1 = l.start1 / 200;
            let bin2 = l.start2 / 200;
            bin1.abs_diff(peak.bin_x as u64) <= 2 && bin2.abs_diff(peak.bin_y as u64) <= 2
        });
        assert!(hit, "no call near the implanted peak: {:?}", loci);

        // Twenty pure-background loci at comparable distance must not be
        // called.
        for k in 0..20u64 {
            let i = 3 + 5 * k; // rows 3, 8, ..., 98
            let j = i + 100;
            let background = loci.iter().any(|l| l.start1 / 200 == i && l.start2 / 200 == j);
            assert!(!background, "background locus ({}, {}) was called", i, j);
        }
    }

    #[test]
    fn shoulder_coalesces_into_the_peak_call() {
        let (ds, _) = synthetic_dataset();
        let chrom = ds.chromosome("chrS").unwrap().clone();
        let loci = sift_chromosome(&ds, &chrom, &test_config()).unwrap();
        // Peak and shoulder are 2 bins apart, far inside the coalesce
        // radius: exactly one call comes back.
        assert_eq!(loci.len(), 1);
    }

    #[test]
    fn chromosome_without_matrix_is_skipped() {
        let ds = InMemoryDataset::new(200, vec![("chrEmpty".to_string(), 40_000)]);
        let chrom = ds.chromosome("chrEmpty").unwrap().clone();
        let loci = sift_chromosome(&ds, &chrom, &test_config()).unwrap();
        assert!(loci.is_empty());
    }
}
