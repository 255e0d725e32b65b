//! Non-maximum suppression: corroboration overlap and centroid coalescing.

use crate::hic::BinLocation;
use rustc_hash::{FxHashMap, FxHashSet};

/// Drop candidates with no corroborating coarse-resolution location within
/// one coarse bin of their scaled position. Candidates the coarse pass
/// cannot see nearby are scheme artifacts, not loops.
pub fn filter_by_overlap(
    pixels: &mut FxHashMap<BinLocation, f32>,
    corroborated: &FxHashSet<BinLocation>,
    scale: usize,
) {
    pixels.retain(|loc, _| {
        let coarse = loc.scale_down(scale);
        for x in coarse.bin_x.saturating_sub(1)..=coarse.bin_x + 1 {
            for y in coarse.bin_y.saturating_sub(1)..=coarse.bin_y + 1 {
                if corroborated.contains(&BinLocation::new(x, y)) {
                    return true;
                }
            }
        }
        false
    });
}

/// Merge candidates within `radius_bp` into one representative each:
/// strongest-first greedy absorption, emitting the count-weighted centroid
/// of each absorbed group with the strongest member's count. Ordering is
/// deterministic (count descending, then bin coordinates).
pub fn coalesce_to_centroids(
    pixels: FxHashMap<BinLocation, f32>,
    resolution: u32,
    radius_bp: u64,
) -> Vec<(BinLocation, f32)> {
    let radius_bins = (radius_bp / resolution as u64).max(1) as i64;
    let radius_sq = radius_bins * radius_bins;

    let mut ordered: Vec<(BinLocation, f32)> = pixels.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut absorbed = vec![false; ordered.len()];
    let mut centroids = Vec::new();
    for seed in 0..ordered.len() {
        if absorbed[seed] {
            continue;
        }
        let (seed_loc, seed_count) = ordered[seed];
        let mut weight_sum = 0.0f64;
        let mut wx = 0.0f64;
        let mut wy = 0.0f64;
        for other in seed..ordered.len() {
            if absorbed[other] {
                continue;
            }
            let (loc, count) = ordered[other];
            let dx = loc.bin_x as i64 - seed_loc.bin_x as i64;
            let dy = loc.bin_y as i64 - seed_loc.bin_y as i64;
            if dx * dx + dy * dy <= radius_sq {
                absorbed[other] = true;
                let w = count as f64;
                weight_sum += w;
                wx += w * loc.bin_x as f64;
                wy += w * loc.bin_y as f64;
            }
        }
        let centroid = BinLocation::new(
            (wx / weight_sum).round() as usize,
            (wy / weight_sum).round() as usize,
        );
        centroids.push((centroid, seed_count));
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_map(pairs: &[(usize, usize, f32)]) -> FxHashMap<BinLocation, f32> {
        pairs
            .iter()
            .map(|&(x, y, c)| (BinLocation::new(x, y), c))
            .collect()
    }

    #[test]
    fn overlap_filter_requires_nearby_corroboration() {
        let mut pixels = to_map(&[(100, 200, 5.0), (500, 900, 5.0)]);
        let mut corroborated = FxHashSet::default();
        // One coarse bin away from (4, 8) at scale 25.
        corroborated.insert(BinLocation::new(5, 8));
        filter_by_overlap(&mut pixels, &corroborated, 25);
        assert_eq!(pixels.len(), 1);
        assert!(pixels.contains_key(&BinLocation::new(100, 200)));
    }

    #[test]
    fn coalesce_merges_tight_cluster_to_weighted_centroid() {
        // Radius 5000 bp at 200 bp: 25 bins.
        let pixels = to_map(&[(100, 200, 30.0), (110, 210, 10.0), (800, 900, 7.0)]);
        let mut centroids = coalesce_to_centroids(pixels, 200, 5_000);
        centroids.sort_by_key(|(loc, _)| *loc);

        assert_eq!(centroids.len(), 2);
        // 30:10 weighting pulls the centroid a quarter of the way over.
        assert_eq!(centroids[0].0, BinLocation::new(103, 203));
        assert_eq!(centroids[0].1, 30.0);
        assert_eq!(centroids[1].0, BinLocation::new(800, 900));
    }

    #[test]
    fn coalesce_is_idempotent_on_separated_centroids() {
        let pixels = to_map(&[
            (100, 200, 30.0),
            (104, 204, 10.0),
            (800, 900, 9.0),
            (2000, 2400, 3.0),
        ]);
        let first: FxHashMap<BinLocation, f32> =
            coalesce_to_centroids(pixels, 200, 5_000).into_iter().collect();
        let mut second = coalesce_to_centroids(first.clone(), 200, 5_000);
        second.sort_by_key(|(loc, _)| *loc);
        let mut first: Vec<(BinLocation, f32)> = first.into_iter().collect();
        first.sort_by_key(|(loc, _)| *loc);
        assert_eq!(first, second);
    }
}
