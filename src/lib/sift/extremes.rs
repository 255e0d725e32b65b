//! Extreme-pixel passes: background fitting and z-score retention.
//!
//! Raw and normalized scoring share one [`ScoreSource`] so the cascade
//! logic exists once and is instantiated per scheme.

use crate::hic::dataset::ContactZoom;
use crate::hic::{log1p_bucket, BinLocation, ContactRecord};
use crate::stats::{MultiZScores, WelfordBuckets};
use rustc_hash::{FxHashMap, FxHashSet};

/// One scoring view of a record: raw counts, or counts divided by the
/// product of a normalization vector's factors.
pub enum ScoreSource<'a> {
    Raw,
    Normalized(&'a [f64]),
}

impl<'a> ScoreSource<'a> {
    /// The divisor this source applies to `record`; `1` for raw.
    #[inline]
    pub fn denominator(&self, record: &ContactRecord) -> f64 {
        match self {
            ScoreSource::Raw => 1.0,
            ScoreSource::Normalized(v) => v[record.bin_x] * v[record.bin_y],
        }
    }

    /// The source's value for `record`, `None` when the denominator is
    /// unusable.
    #[inline]
    pub fn value(&self, record: &ContactRecord) -> Option<f64> {
        let denom = self.denominator(record);
        if denom > 0.0 {
            Some(record.count as f64 / denom)
        } else {
            None
        }
    }
}

/// High-resolution extreme pass: fit per-bucket background moments on
/// `log1p(count)` over raw records with `count > 1`, then re-stream and
/// retain pixels whose z-score clears `cutoff` inside the distance window.
/// Returned with their raw counts for the downstream filters.
pub fn hires_extreme_pixels(
    zoom: &dyn ContactZoom,
    max_bin: usize,
    min_bin: usize,
    cutoff: f64,
) -> FxHashMap<BinLocation, f32> {
    let max_compressed = log1p_bucket(max_bin) + 1;
    let min_compressed = log1p_bucket(min_bin);

    let mut stats = WelfordBuckets::new(max_compressed);
    for record in zoom.records() {
        if record.count > 1.0 {
            let bucket = log1p_bucket(record.dist());
            if bucket < max_compressed {
                stats.add_value(bucket, (record.count as f64).ln_1p());
            }
        }
    }
    let zscores = stats.zscores();

    let mut pixels = FxHashMap::default();
    for record in zoom.records() {
        if record.count > 1.0 {
            let bucket = log1p_bucket(record.dist());
            if bucket > min_compressed && bucket < max_compressed {
                let z = zscores.zscore(bucket, (record.count as f64).ln_1p());
                if z > cutoff {
                    pixels.insert(record.location(), record.count);
                }
            }
        }
    }
    pixels
}

/// Coarse-resolution corroboration pass: fit one background per source
/// (raw plus every normalization scheme) and retain locations passing the
/// AND-combined z-score test. Normalized values participate only when the
/// denominator is usable and the value itself exceeds 1; the scoring pass
/// additionally requires every denominator above 1, keeping low-coverage
/// bins out of the corroboration set.
pub fn extreme_locations(
    zoom: &dyn ContactZoom,
    norms: &[Vec<f64>],
    max_bin: usize,
    min_bin: usize,
    cutoff: f64,
) -> FxHashSet<BinLocation> {
    let max_compressed = log1p_bucket(max_bin) + 1;
    let min_compressed = log1p_bucket(min_bin);

    let sources: Vec<ScoreSource> = std::iter::once(ScoreSource::Raw)
        .chain(norms.iter().map(|v| ScoreSource::Normalized(v)))
        .collect();

    let mut stats: Vec<WelfordBuckets> = sources
        .iter()
        .map(|_| WelfordBuckets::new(max_compressed))
        .collect();
    for record in zoom.records() {
        if record.count > 1.0 {
            let bucket = log1p_bucket(record.dist());
            if bucket < max_compressed {
                for (source, stat) in sources.iter().zip(stats.iter_mut()) {
                    match source {
                        ScoreSource::Raw => stat.add_value(bucket, (record.count as f64).ln_1p()),
                        ScoreSource::Normalized(_) => {
                            if let Some(val) = source.value(&record) {
                                if val > 1.0 {
                                    stat.add_value(bucket, val.ln_1p());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    let multi = MultiZScores::new(stats.into_iter().map(|s| s.zscores()).collect());

    let mut locations = FxHashSet::default();
    let mut values = Vec::with_capacity(sources.len());
    'records: for record in zoom.records() {
        if record.count <= 1.0 {
            continue;
        }
        let bucket = log1p_bucket(record.dist());
        if bucket <= min_compressed || bucket >= max_compressed {
            continue;
        }
        values.clear();
        for source in &sources {
            if let ScoreSource::Normalized(_) = source {
                if source.denominator(&record) <= 1.0 {
                    continue 'records;
                }
            }
            match source.value(&record) {
                Some(val) if matches!(source, ScoreSource::Raw) || val > 1.0 => {
                    values.push(val.ln_1p())
                }
                _ => continue 'records,
            }
        }
        if multi.passes_all(bucket, cutoff, &values) {
            locations.insert(record.location());
        }
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hic::dataset::{Dataset, InMemoryDataset};
    use crate::hic::ChromPair;

    /// Uniform background plus one pixel with its own count in the same
    /// distance band.
    fn peaky_dataset(peak_count: f32) -> InMemoryDataset {
        let mut ds = InMemoryDataset::new(100, vec![("chrT".to_string(), 100_000)]);
        let mut triplets = Vec::new();
        for i in 0..800 {
            if i != 350 {
                triplets.push((i, i + 100, 4.0 + (i % 3) as f32));
            }
        }
        triplets.push((350, 450, peak_count));
        ds.add_contacts("chrT", &triplets).unwrap();
        ds
    }

    fn zoom_of(ds: &InMemoryDataset) -> std::sync::Arc<dyn ContactZoom + Send + Sync> {
        let chrom = ds.chromosome("chrT").unwrap().clone();
        ds.zoom(&ChromPair::intra(&chrom), 100).unwrap()
    }

    #[test]
    fn hires_pass_keeps_the_implanted_peak() {
        let ds = peaky_dataset(200.0);
        let zoom = zoom_of(&ds);
        let pixels = hires_extreme_pixels(zoom.as_ref(), 1000, 10, 2.0);
        assert!(pixels.contains_key(&BinLocation::new(350, 450)));
        // Background pixels do not clear the cutoff.
        assert!(pixels.len() < 10);
    }

    #[test]
    fn hires_pass_ignores_uniform_background() {
        let ds = peaky_dataset(5.0);
        let zoom = zoom_of(&ds);
        let pixels = hires_extreme_pixels(zoom.as_ref(), 1000, 10, 2.0);
        assert!(pixels.is_empty());
    }

    #[test]
    fn corroboration_requires_usable_denominators() {
        let ds = peaky_dataset(200.0);
        let zoom = zoom_of(&ds);
        // A vector that blanks the peak's bins suppresses the location even
        // though the raw z-score is extreme.
        let n = zoom.dims().0;
        let mut blanked = vec![2.0; n];
        blanked[350] = 0.5;
        let good = vec![2.0; n];

        let with_good = extreme_locations(
            zoom.as_ref(),
            &[good.clone(), good.clone()],
            1000,
            10,
            2.0,
        );
        assert!(with_good.contains(&BinLocation::new(350, 450)));

        let with_blanked = extreme_locations(zoom.as_ref(), &[good, blanked], 1000, 10, 2.0);
        assert!(!with_blanked.contains(&BinLocation::new(350, 450)));
    }
}
