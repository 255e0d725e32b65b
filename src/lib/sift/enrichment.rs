//! Local-maximum filtering of candidates against the coarse matrix.

use crate::cluster;
use crate::hic::dataset::ContactZoom;
use crate::hic::BinLocation;
use rustc_hash::FxHashMap;

/// Proximity radius for grouping candidates before bounding-box extraction,
/// in fine-resolution bins.
const GROUPING_RADIUS: usize = 250;

/// Box padding in coarse bins.
const BOX_BUFFER: usize = 5;

/// Drop candidates that are not a local maximum of the coarse raw matrix.
///
/// Candidates are grouped by proximity, one dense bounding box is fetched
/// per group, and each candidate's scaled pixel must have no strictly
/// greater raw value among its 8 neighbors inside the box. True peaks
/// survive the scale change; shoulders of a stronger pixel do not.
pub fn filter_if_not_local_max(
    zoom_low: &dyn ContactZoom,
    pixels: &mut FxHashMap<BinLocation, f32>,
    scale: usize,
) {
    let locations: Vec<BinLocation> = pixels.keys().copied().collect();
    let (rows, cols) = zoom_low.dims();
    let mut to_remove = Vec::new();

    for group in cluster::cluster_by_proximity(&locations, GROUPING_RADIUS) {
        let coarse: Vec<BinLocation> = group.iter().map(|loc| loc.scale_down(scale)).collect();
        let min_r = coarse.iter().map(|c| c.bin_x).min().unwrap();
        let max_r = coarse.iter().map(|c| c.bin_x).max().unwrap();
        let min_c = coarse.iter().map(|c| c.bin_y).min().unwrap();
        let max_c = coarse.iter().map(|c| c.bin_y).max().unwrap();

        let r0 = min_r.saturating_sub(BOX_BUFFER);
        let c0 = min_c.saturating_sub(BOX_BUFFER);
        let r1 = (max_r + BOX_BUFFER + 1).min(rows);
        let c1 = (max_c + BOX_BUFFER + 1).min(cols);
        let region = zoom_low.dense_region(r0, r1, c0, c1, None);
        let (region_rows, region_cols) = region.dim();

        for (original, coarse) in group.iter().zip(&coarse) {
            let i = coarse.bin_x - r0;
            let j = coarse.bin_y - c0;
            if i >= region_rows || j >= region_cols {
                // Off the end of the coarse matrix: nothing to judge against.
                continue;
            }
            let val = region[[i, j]];
            let mut is_max = true;
            'neighbors: for ni in i.saturating_sub(1)..(i + 2).min(region_rows) {
                for nj in j.saturating_sub(1)..(j + 2).min(region_cols) {
                    if region[[ni, nj]] > val {
                        is_max = false;
                        break 'neighbors;
                    }
                }
            }
            if !is_max {
                to_remove.push(*original);
            }
        }
    }

    for loc in to_remove {
        pixels.remove(&loc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hic::dataset::{Dataset, InMemoryDataset};
    use crate::hic::ChromPair;

    #[test]
    fn shoulder_pixels_are_removed() {
        // Coarse matrix at 1000 bp (scale 5 from 200 bp): a strong pixel at
        // (20, 40) next to a weaker one at (20, 41).
        let mut ds = InMemoryDataset::new(1000, vec![("chrT".to_string(), 100_000)]);
        ds.add_contacts("chrT", &[(20, 40, 50.0), (20, 41, 10.0), (60, 80, 9.0)])
            .unwrap();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 1000).unwrap();

        let mut pixels = FxHashMap::default();
        // Fine-resolution candidates mapping onto the three coarse pixels.
        pixels.insert(BinLocation::new(100, 200), 50.0);
        pixels.insert(BinLocation::new(100, 205), 10.0);
        pixels.insert(BinLocation::new(300, 400), 9.0);

        filter_if_not_local_max(zoom.as_ref(), &mut pixels, 5);

        assert!(pixels.contains_key(&BinLocation::new(100, 200)));
        assert!(!pixels.contains_key(&BinLocation::new(100, 205)));
        // An isolated pixel is trivially a local maximum.
        assert!(pixels.contains_key(&BinLocation::new(300, 400)));
    }
}
