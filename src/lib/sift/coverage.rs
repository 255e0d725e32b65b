//! Coverage filtering of candidate pixels against cleaned norm vectors.

use crate::hic::BinLocation;
use rustc_hash::FxHashMap;

/// Drop candidates whose coarse-scaled bins land on an unusable entry of
/// either cleaned vector. The sanitizer has already marked blacklisted and
/// low-coverage bins as NaN, so usability is simply "still finite"; those
/// regions are invisible at the fine resolution and only the coarse vectors
/// expose them.
pub fn filter_by_norms(
    pixels: &mut FxHashMap<BinLocation, f32>,
    scale_vec: &[f64],
    coverage_vec: &[f64],
    scale: usize,
) {
    pixels.retain(|loc, _| {
        let coarse = loc.scale_down(scale);
        usable(scale_vec, coarse.bin_x)
            && usable(scale_vec, coarse.bin_y)
            && usable(coverage_vec, coarse.bin_x)
            && usable(coverage_vec, coarse.bin_y)
    });
}

#[inline]
fn usable(vec: &[f64], bin: usize) -> bool {
    vec.get(bin).map(|v| v.is_finite()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_on_blanked_bins_are_dropped() {
        let mut pixels = FxHashMap::default();
        pixels.insert(BinLocation::new(100, 200), 10.0);
        pixels.insert(BinLocation::new(500, 600), 10.0);

        // Coarse factor 25: bins 4/8 and 20/24.
        let mut scale_vec = vec![1.0; 30];
        let coverage_vec = vec![1.0; 30];
        scale_vec[20] = f64::NAN;

        filter_by_norms(&mut pixels, &scale_vec, &coverage_vec, 25);
        assert_eq!(pixels.len(), 1);
        assert!(pixels.contains_key(&BinLocation::new(100, 200)));
    }

    #[test]
    fn out_of_range_bins_are_unusable() {
        let mut pixels = FxHashMap::default();
        pixels.insert(BinLocation::new(100, 2000), 10.0);
        let vec = vec![1.0; 30];
        filter_by_norms(&mut pixels, &vec, &vec, 25);
        assert!(pixels.is_empty());
    }
}
