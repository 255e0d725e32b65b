//! Cross-dataset variability calling.
//!
//! One Welford accumulator per pixel collects that pixel's normalized value
//! across N datasets; pixels whose count variability sits far out in the
//! distribution of per-pixel deviations are flagged as hotspots.

use crate::core::errors::Result;
use crate::feature::Locus;
use crate::hic::dataset::Dataset;
use crate::hic::{norm, BinLocation, Chromosome, ChromPair, NormScheme};
use crate::stats::Welford;
use log::{debug, info};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct HotspotConfig {
    pub resolution: u32,
    pub norm: NormScheme,
    pub min_dist_bp: u64,
    pub max_dist_bp: u64,
    /// A pixel must be observed in at least this many datasets before its
    /// variability is scored.
    pub min_datasets: u64,
    /// 1.645 corresponds to a one-sided 90% confidence cut.
    pub zscore_cutoff: f64,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            resolution: 2000,
            norm: NormScheme::Scale,
            min_dist_bp: 25_000,
            max_dist_bp: 10_000_000,
            min_datasets: 3,
            zscore_cutoff: 1.645,
        }
    }
}

/// Find loci on one chromosome whose normalized contact value varies
/// anomalously across `datasets`.
pub fn find_hotspots(
    datasets: &[&dyn Dataset],
    chrom: &Chromosome,
    config: &HotspotConfig,
) -> Result<Vec<Locus>> {
    let pair = ChromPair::intra(chrom);
    let min_bins = (config.min_dist_bp / config.resolution as u64) as usize;
    let max_bins = (config.max_dist_bp / config.resolution as u64) as usize;

    let mut per_pixel: FxHashMap<BinLocation, Welford> = FxHashMap::default();
    for ds in datasets {
        let zoom = match ds.zoom(&pair, config.resolution) {
            Some(z) => z,
            None => {
                debug!("{}: no matrix at {} bp in one dataset", chrom.name, config.resolution);
                continue;
            }
        };
        let mut vector = match ds.norm_vector(chrom, config.resolution, config.norm) {
            Some(v) => v,
            None => {
                debug!("{}: no {} vector in one dataset", chrom.name, config.norm);
                continue;
            }
        };
        norm::clean_in_place(&mut vector);

        for record in zoom.records() {
            let dist = record.dist();
            if dist < min_bins || dist > max_bins || record.count <= 0.0 {
                continue;
            }
            let denom = vector[record.bin_x] * vector[record.bin_y];
            if !denom.is_finite() || denom <= 0.0 {
                continue;
            }
            per_pixel
                .entry(record.location())
                .or_default()
                .add_value(record.count as f64 / denom);
        }
        // The zoom view drops before the next dataset's is acquired.
    }

    per_pixel.retain(|_, welford| welford.count() >= config.min_datasets);

    let mut overall = Welford::new();
    for welford in per_pixel.values() {
        overall.add_value(welford.stddev());
    }

    let mut hotspots: Vec<Locus> = per_pixel
        .into_iter()
        .filter(|(_, welford)| overall.zscore(welford.stddev()) >= config.zscore_cutoff)
        .map(|(pixel, welford)| {
            let mut locus = Locus::from_pixel(chrom, pixel, config.resolution);
            locus.metrics.stddev = Some(welford.stddev());
            locus
        })
        .collect();
    hotspots.sort_by_key(|l| (l.start1, l.start2));
    info!("{}: {} hotspots", chrom.name, hotspots.len());
    Ok(hotspots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hic::dataset::InMemoryDataset;

    /// Several uniform datasets that disagree wildly at exactly one pixel.
    fn datasets() -> Vec<InMemoryDataset> {
        (0..4)
            .map(|d| {
                let mut triplets = Vec::new();
                for i in 0..120usize {
                    for j in i..120usize {
                        triplets.push((i, j, 4.0 + ((i + j + d) % 3) as f32 * 0.25));
                    }
                }
                // The volatile pixel swings between 4 and 64 by dataset.
                triplets.push((20, 60, (d * 20) as f32));
                let mut ds = InMemoryDataset::new(2000, vec![("chrH".to_string(), 240_000)]);
                ds.add_contacts("chrH", &triplets).unwrap();
                ds
            })
            .collect()
    }

    #[test]
    fn volatile_pixel_is_flagged() {
        let owned = datasets();
        let refs: Vec<&dyn Dataset> = owned.iter().map(|d| d as &dyn Dataset).collect();
        let chrom = owned[0].chromosome("chrH").unwrap().clone();

        let hotspots = find_hotspots(&refs, &chrom, &HotspotConfig::default()).unwrap();
        assert!(!hotspots.is_empty());
        let hit = hotspots
            .iter()
            .any(|l| l.start1 == 20 * 2000 && l.start2 == 60 * 2000);
        assert!(hit, "volatile pixel not flagged: {:?}", hotspots);
        assert!(hotspots.iter().all(|l| l.metrics.stddev.is_some()));
    }

    #[test]
    fn sparse_pixels_are_not_scored() {
        let owned = datasets();
        // Only two datasets: below the minimum support, nothing is scored.
        let refs: Vec<&dyn Dataset> = owned[..2].iter().map(|d| d as &dyn Dataset).collect();
        let chrom = owned[0].chromosome("chrH").unwrap().clone();
        let hotspots = find_hotspots(&refs, &chrom, &HotspotConfig::default()).unwrap();
        assert!(hotspots.is_empty());
    }
}
