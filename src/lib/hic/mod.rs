//! Contact-map data model: records, bin locations, chromosomes, zoom views.

pub mod dataset;
pub mod expected;
pub mod norm;

pub use dataset::{ContactZoom, Dataset, InMemoryDataset};
pub use expected::{ExpectedModel, LogBinnedExpected};
pub use norm::NormScheme;

use serde::{Deserialize, Serialize};

/// One observed contact between two genomic bin indices at a given
/// resolution. Symmetric: `(x, y)` and `(y, x)` are the same physical
/// contact; iterators emit each pair at most once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRecord {
    pub bin_x: usize,
    pub bin_y: usize,
    pub count: f32,
}

impl ContactRecord {
    pub fn new(bin_x: usize, bin_y: usize, count: f32) -> Self {
        Self { bin_x, bin_y, count }
    }

    /// Genomic distance in bins.
    #[inline]
    pub fn dist(&self) -> usize {
        self.bin_x.abs_diff(self.bin_y)
    }

    #[inline]
    pub fn location(&self) -> BinLocation {
        BinLocation::new(self.bin_x, self.bin_y)
    }
}

/// A pixel position in bin coordinates, used for candidate bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BinLocation {
    pub bin_x: usize,
    pub bin_y: usize,
}

impl BinLocation {
    pub fn new(bin_x: usize, bin_y: usize) -> Self {
        Self { bin_x, bin_y }
    }

    /// The corresponding position at a coarser resolution.
    #[inline]
    pub fn scale_down(&self, factor: usize) -> BinLocation {
        BinLocation::new(self.bin_x / factor, self.bin_y / factor)
    }
}

/// Chromosome metadata as served by the dataset layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub name: String,
    pub index: usize,
    pub length: u64,
}

impl Chromosome {
    /// Number of bins covering this chromosome at `resolution` bp.
    pub fn bins(&self, resolution: u32) -> usize {
        (self.length / resolution as u64) as usize + 1
    }
}

/// A unit of work for the parallel engine.
#[derive(Debug, Clone)]
pub struct ChromPair {
    pub chr1: Chromosome,
    pub chr2: Chromosome,
}

impl ChromPair {
    pub fn intra(chrom: &Chromosome) -> Self {
        Self {
            chr1: chrom.clone(),
            chr2: chrom.clone(),
        }
    }

    pub fn is_intra(&self) -> bool {
        self.chr1.index == self.chr2.index
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.chr1.name, self.chr2.name)
    }
}

impl std::fmt::Display for ChromPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.chr1.name, self.chr2.name)
    }
}

/// Compress a distance in bins into its log-scale bucket,
/// `floor(ln(1 + d))`. Monotone non-decreasing in `d`, so a handful of
/// buckets cover the full dynamic range of contact distances.
#[inline]
pub fn log1p_bucket(dist: usize) -> usize {
    (1.0 + dist as f64).ln().floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_monotonic_in_distance() {
        let mut prev = 0;
        for d in 0..100_000 {
            let b = log1p_bucket(d);
            assert!(b >= prev);
            prev = b;
        }
    }

    #[test]
    fn record_distance_is_symmetric() {
        assert_eq!(ContactRecord::new(10, 110, 1.0).dist(), 100);
        assert_eq!(ContactRecord::new(110, 10, 1.0).dist(), 100);
    }

    #[test]
    fn scale_down_floors() {
        let loc = BinLocation::new(1049, 26);
        assert_eq!(loc.scale_down(25), BinLocation::new(41, 1));
    }
}
