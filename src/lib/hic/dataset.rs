//! Dataset trait seams and the in-memory sparse contact store.
//!
//! The reader side of the pipeline is a collaborator boundary: anything that
//! can serve zoom views, normalization vectors, and chromosome metadata can
//! drive the cascade. [`InMemoryDataset`] is the CSR-backed implementation
//! used by the CLI (fed from a contact dump) and by the test suite; coarser
//! zooms are derived on demand by integer bin aggregation so a single base
//! resolution is enough to run the whole multi-resolution cascade.

use crate::core::errors::{CalderaError, Result};
use crate::core::io::get_reader;
use crate::hic::norm::{self, NormScheme};
use crate::hic::{Chromosome, ChromPair, ContactRecord};
use crate::utils::is_bgzipped;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::Array2;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// A per-resolution, per-chromosome-pair view of the contact matrix.
///
/// `records` is a lazy, restartable, finite sequence over the stored
/// triangle (each symmetric pair emitted once); `dense_region` is the
/// synchronous random-access query for a sub-rectangle.
pub trait ContactZoom {
    fn resolution(&self) -> u32;

    /// `(rows, cols)` in bins.
    fn dims(&self) -> (usize, usize);

    fn records(&self) -> Box<dyn Iterator<Item = ContactRecord> + '_>;

    /// Dense `[r0, r1) x [c0, c1)` window, mirrored across the diagonal.
    ///
    /// With `norm` supplied, each count is divided by the product of the two
    /// bins' factors; cells whose denominator is non-positive or undefined
    /// come back as `0`.
    fn dense_region(
        &self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
        norm: Option<&[f64]>,
    ) -> Array2<f32>;
}

/// The contact-map collaborator consumed by the pipelines.
pub trait Dataset: Send + Sync {
    fn chromosomes(&self) -> &[Chromosome];

    fn chromosome(&self, name: &str) -> Option<&Chromosome>;

    /// `None` when no matrix backs this pair/resolution; callers treat that
    /// as a skip, not an error.
    fn zoom(&self, pair: &ChromPair, resolution: u32) -> Option<Arc<dyn ContactZoom + Send + Sync>>;

    /// A fresh owned copy of the normalization vector, safe for in-place
    /// cleaning by the caller.
    fn norm_vector(
        &self,
        chrom: &Chromosome,
        resolution: u32,
        scheme: NormScheme,
    ) -> Option<Vec<f64>>;
}

/// Upper-triangle CSR storage for one chromosome at one resolution.
pub struct InMemoryZoom {
    resolution: u32,
    matrix: CsrMatrix<f32>,
}

impl InMemoryZoom {
    fn new(resolution: u32, matrix: CsrMatrix<f32>) -> Self {
        Self { resolution, matrix }
    }
}

impl ContactZoom for InMemoryZoom {
    fn resolution(&self) -> u32 {
        self.resolution
    }

    fn dims(&self) -> (usize, usize) {
        (self.matrix.nrows(), self.matrix.ncols())
    }

    fn records(&self) -> Box<dyn Iterator<Item = ContactRecord> + '_> {
        Box::new(
            self.matrix
                .triplet_iter()
                .map(|(x, y, &count)| ContactRecord::new(x, y, count)),
        )
    }

    fn dense_region(
        &self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
        norm: Option<&[f64]>,
    ) -> Array2<f32> {
        let (nrows, ncols) = self.dims();
        let r1 = r1.min(nrows);
        let c1 = c1.min(ncols);
        if r0 >= r1 || c0 >= c1 {
            return Array2::zeros((0, 0));
        }
        let mut out = Array2::zeros((r1 - r0, c1 - c0));

        let normed = |x: usize, y: usize, count: f32| -> f32 {
            match norm {
                Some(v) => {
                    let denom = v[x] * v[y];
                    if denom.is_finite() && denom > 0.0 {
                        (count as f64 / denom) as f32
                    } else {
                        0.0
                    }
                }
                None => count,
            }
        };

        // Stored triangle has bin_x <= bin_y; the window sees both
        // orientations of each pair.
        for i in r0..r1 {
            let row = self.matrix.row(i);
            for (&j, &val) in row.col_indices().iter().zip(row.values()) {
                if j >= c0 && j < c1 {
                    out[[i - r0, j - c0]] = normed(i, j, val);
                }
            }
        }
        for a in c0..c1.min(nrows) {
            let row = self.matrix.row(a);
            for (&b, &val) in row.col_indices().iter().zip(row.values()) {
                if b > a && b >= r0 && b < r1 {
                    out[[b - r0, a - c0]] = normed(a, b, val);
                }
            }
        }
        out
    }
}

/// In-memory dataset holding one base-resolution matrix per chromosome.
pub struct InMemoryDataset {
    base_resolution: u32,
    chromosomes: Vec<Chromosome>,
    by_name: FxHashMap<String, usize>,
    matrices: Vec<Option<CsrMatrix<f32>>>,
}

impl InMemoryDataset {
    pub fn new(base_resolution: u32, chrom_sizes: Vec<(String, u64)>) -> Self {
        let mut by_name = FxHashMap::default();
        let chromosomes: Vec<Chromosome> = chrom_sizes
            .into_iter()
            .enumerate()
            .map(|(index, (name, length))| {
                by_name.insert(name.clone(), index);
                Chromosome {
                    name,
                    index,
                    length,
                }
            })
            .collect();
        let matrices = (0..chromosomes.len()).map(|_| None).collect();
        Self {
            base_resolution,
            chromosomes,
            by_name,
            matrices,
        }
    }

    pub fn base_resolution(&self) -> u32 {
        self.base_resolution
    }

    /// Install the base-resolution contacts for one chromosome. Triplets may
    /// arrive in either orientation and with duplicates; they are
    /// canonicalized to the upper triangle and summed.
    pub fn add_contacts(&mut self, chrom: &str, triplets: &[(usize, usize, f32)]) -> Result<()> {
        let idx = *self
            .by_name
            .get(chrom)
            .ok_or_else(|| CalderaError::InvalidInput(format!("Unknown chromosome '{}'", chrom)))?;
        let n = self.chromosomes[idx].bins(self.base_resolution);

        let mut rows = Vec::with_capacity(triplets.len());
        let mut cols = Vec::with_capacity(triplets.len());
        let mut vals = Vec::with_capacity(triplets.len());
        for &(x, y, count) in triplets {
            let (x, y) = if x <= y { (x, y) } else { (y, x) };
            if y >= n {
                return Err(CalderaError::InvalidInput(format!(
                    "Bin ({}, {}) exceeds {} bins for {} at {} bp",
                    x, y, n, chrom, self.base_resolution
                )));
            }
            rows.push(x);
            cols.push(y);
            vals.push(count);
        }

        let coo = CooMatrix::try_from_triplets(n, n, rows, cols, vals)
            .map_err(|e| CalderaError::SparseMatrix(format!("COO creation failed: {:?}", e)))?;
        self.matrices[idx] = Some(CsrMatrix::from(&coo));
        Ok(())
    }

    /// Load a contact dump: tab-separated `chrom  bin_x  bin_y  count` rows
    /// at the base resolution, plain or bgzipped. Chromosome lengths come
    /// from `chrom_sizes` (`name  length_bp`) when given, otherwise from the
    /// largest bin observed per chromosome.
    pub fn from_contacts_path(
        path: &Path,
        base_resolution: u32,
        chrom_sizes: Option<&Path>,
    ) -> Result<Self> {
        let mut per_chrom: FxHashMap<String, Vec<(usize, usize, f32)>> = FxHashMap::default();
        let mut order: Vec<String> = Vec::new();

        let mut reader = get_reader(&Some(path), false, is_bgzipped(path))
            .map_err(|e| CalderaError::Parse(format!("{}: {}", path.display(), e)))?;
        for record in reader.records() {
            let record = record?;
            if record.len() < 4 {
                return Err(CalderaError::Parse(format!(
                    "Contact dump row needs 4 fields, got {}",
                    record.len()
                )));
            }
            let chrom = record[0].to_string();
            let bin_x: usize = parse_field(&record[1], "bin_x")?;
            let bin_y: usize = parse_field(&record[2], "bin_y")?;
            let count: f32 = parse_field(&record[3], "count")?;
            if !per_chrom.contains_key(&chrom) {
                order.push(chrom.clone());
            }
            per_chrom
                .entry(chrom)
                .or_default()
                .push((bin_x, bin_y, count));
        }
        if per_chrom.is_empty() {
            return Err(CalderaError::EmptyData(format!(
                "No contact records in {}",
                path.display()
            )));
        }

        let sizes: Vec<(String, u64)> = match chrom_sizes {
            Some(sizes_path) => {
                let mut reader = get_reader(&Some(sizes_path), false, is_bgzipped(sizes_path))
                    .map_err(|e| CalderaError::Parse(format!("{}: {}", sizes_path.display(), e)))?;
                let mut sizes = Vec::new();
                for record in reader.records() {
                    let record = record?;
                    if record.len() < 2 {
                        return Err(CalderaError::Parse(
                            "Chrom sizes row needs 2 fields".to_string(),
                        ));
                    }
                    sizes.push((record[0].to_string(), parse_field(&record[1], "length")?));
                }
                sizes
            }
            None => order
                .iter()
                .map(|name| {
                    let max_bin = per_chrom[name]
                        .iter()
                        .map(|&(x, y, _)| x.max(y))
                        .max()
                        .unwrap_or(0);
                    (name.clone(), (max_bin as u64 + 1) * base_resolution as u64)
                })
                .collect(),
        };

        let mut ds = InMemoryDataset::new(base_resolution, sizes);
        for (chrom, triplets) in &per_chrom {
            ds.add_contacts(chrom, triplets)?;
        }
        Ok(ds)
    }

    /// Aggregate the base matrix into a coarser zoom by integer bin division.
    fn derive_zoom(&self, chrom_index: usize, resolution: u32) -> Option<CsrMatrix<f32>> {
        let base = self.matrices[chrom_index].as_ref()?;
        if resolution == self.base_resolution {
            return Some(base.clone());
        }
        if resolution < self.base_resolution || resolution % self.base_resolution != 0 {
            return None;
        }
        let factor = (resolution / self.base_resolution) as usize;
        let n = self.chromosomes[chrom_index].bins(resolution);

        let mut bins: FxHashMap<(usize, usize), f32> = FxHashMap::default();
        for (x, y, &count) in base.triplet_iter() {
            let key = (x / factor, y / factor);
            *bins.entry(key).or_insert(0.0) += count;
        }
        let mut rows = Vec::with_capacity(bins.len());
        let mut cols = Vec::with_capacity(bins.len());
        let mut vals = Vec::with_capacity(bins.len());
        for ((x, y), count) in bins {
            rows.push(x);
            cols.push(y);
            vals.push(count);
        }
        let coo = CooMatrix::try_from_triplets(n, n, rows, cols, vals).ok()?;
        Some(CsrMatrix::from(&coo))
    }
}

impl Dataset for InMemoryDataset {
    fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    fn chromosome(&self, name: &str) -> Option<&Chromosome> {
        self.by_name.get(name).map(|&i| &self.chromosomes[i])
    }

    fn zoom(&self, pair: &ChromPair, resolution: u32) -> Option<Arc<dyn ContactZoom + Send + Sync>> {
        // Inter-chromosomal matrices are not stored; those units are skipped.
        if !pair.is_intra() {
            return None;
        }
        let matrix = self.derive_zoom(pair.chr1.index, resolution)?;
        Some(Arc::new(InMemoryZoom::new(resolution, matrix)))
    }

    fn norm_vector(
        &self,
        chrom: &Chromosome,
        resolution: u32,
        scheme: NormScheme,
    ) -> Option<Vec<f64>> {
        let zoom = self.zoom(&ChromPair::intra(chrom), resolution)?;
        Some(norm::compute_vector(zoom.as_ref(), scheme))
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CalderaError::Parse(format!("Bad {} value '{}'", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset() -> InMemoryDataset {
        let mut ds = InMemoryDataset::new(100, vec![("chrT".to_string(), 1_000)]);
        ds.add_contacts("chrT", &[(0, 2, 4.0), (2, 0, 1.0), (1, 1, 3.0), (3, 5, 2.0)])
            .unwrap();
        ds
    }

    #[test]
    fn duplicate_and_mirrored_triplets_sum() {
        let ds = small_dataset();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 100).unwrap();
        let counts: Vec<ContactRecord> = zoom.records().collect();
        let at = |x, y| {
            counts
                .iter()
                .find(|r| r.bin_x == x && r.bin_y == y)
                .map(|r| r.count)
        };
        assert_eq!(at(0, 2), Some(5.0));
        assert_eq!(at(1, 1), Some(3.0));
    }

    #[test]
    fn dense_region_mirrors_across_diagonal() {
        let ds = small_dataset();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 100).unwrap();
        let region = zoom.dense_region(0, 6, 0, 6, None);
        assert_eq!(region[[0, 2]], 5.0);
        assert_eq!(region[[2, 0]], 5.0);
        assert_eq!(region[[1, 1]], 3.0);
        assert_eq!(region[[5, 3]], 2.0);
        assert_eq!(region[[4, 4]], 0.0);
    }

    #[test]
    fn dense_region_applies_normalization() {
        let ds = small_dataset();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 100).unwrap();
        let mut norm = vec![1.0; 11];
        norm[0] = 2.0;
        norm[2] = 2.5;
        norm[3] = f64::NAN;
        let region = zoom.dense_region(0, 6, 0, 6, Some(&norm));
        assert_eq!(region[[0, 2]], 1.0);
        // Undefined factor blanks the cell instead of propagating artifacts.
        assert_eq!(region[[3, 5]], 0.0);
    }

    #[test]
    fn coarse_zoom_aggregates_bins() {
        let ds = small_dataset();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        let zoom = ds.zoom(&ChromPair::intra(&chrom), 200).unwrap();
        let records: Vec<ContactRecord> = zoom.records().collect();
        // (0,2)+mirror lands in (0,1); (1,1) lands in (0,0); (3,5) in (1,2).
        let at = |x, y| {
            records
                .iter()
                .find(|r| r.bin_x == x && r.bin_y == y)
                .map(|r| r.count)
        };
        assert_eq!(at(0, 1), Some(5.0));
        assert_eq!(at(0, 0), Some(3.0));
        assert_eq!(at(1, 2), Some(2.0));
    }

    #[test]
    fn unaligned_resolution_is_absent() {
        let ds = small_dataset();
        let chrom = ds.chromosome("chrT").unwrap().clone();
        assert!(ds.zoom(&ChromPair::intra(&chrom), 250).is_none());
        assert!(ds.zoom(&ChromPair::intra(&chrom), 50).is_none());
    }
}
