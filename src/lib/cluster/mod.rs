//! Spatial grouping of candidate pixels.
//!
//! Single-linkage proximity clustering for the groups the cascade filters
//! operate on; image-space labeling lives in [`components`]. Both grow
//! regions breadth-first, one over a quantized spatial index and one over
//! pixel connectivity.

pub mod components;
pub mod smooth;

use crate::hic::BinLocation;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Single-linkage clusters: two locations land in the same cluster when a
/// chain of pairwise euclidean distances `<= radius` connects them. Grown
/// breadth-first over a grid spatial index so only neighboring cells are
/// compared.
pub fn cluster_by_proximity(locations: &[BinLocation], radius: usize) -> Vec<Vec<BinLocation>> {
    if locations.is_empty() {
        return Vec::new();
    }
    let cell = radius.max(1);
    let radius_sq = (radius * radius) as i64;

    let mut grid: FxHashMap<(usize, usize), Vec<usize>> = FxHashMap::default();
    for (idx, loc) in locations.iter().enumerate() {
        grid.entry((loc.bin_x / cell, loc.bin_y / cell))
            .or_default()
            .push(idx);
    }

    let within = |a: &BinLocation, b: &BinLocation| -> bool {
        let dx = a.bin_x as i64 - b.bin_x as i64;
        let dy = a.bin_y as i64 - b.bin_y as i64;
        dx * dx + dy * dy <= radius_sq
    };

    let mut assigned = vec![false; locations.len()];
    let mut clusters = Vec::new();
    for seed in 0..locations.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![locations[seed]];
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            let loc = locations[current];
            let (gx, gy) = (loc.bin_x / cell, loc.bin_y / cell);
            for nx in gx.saturating_sub(1)..=gx + 1 {
                for ny in gy.saturating_sub(1)..=gy + 1 {
                    if let Some(bucket) = grid.get(&(nx, ny)) {
                        for &other in bucket {
                            if !assigned[other] && within(&loc, &locations[other]) {
                                assigned[other] = true;
                                members.push(locations[other]);
                                queue.push_back(other);
                            }
                        }
                    }
                }
            }
        }
        clusters.push(members);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_chains_merge_transitively() {
        // a-b and b-c are within radius, a-c is not; all three must chain.
        let locations = vec![
            BinLocation::new(0, 0),
            BinLocation::new(4, 0),
            BinLocation::new(8, 0),
            BinLocation::new(100, 100),
        ];
        let mut clusters = cluster_by_proximity(&locations, 5);
        clusters.sort_by_key(Vec::len);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 1);
        assert_eq!(clusters[1].len(), 3);
    }

    #[test]
    fn isolated_points_stay_singletons() {
        let locations = vec![
            BinLocation::new(0, 0),
            BinLocation::new(50, 50),
            BinLocation::new(200, 10),
        ];
        let clusters = cluster_by_proximity(&locations, 3);
        assert_eq!(clusters.len(), 3);
    }
}
