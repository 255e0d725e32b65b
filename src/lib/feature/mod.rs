//! Candidate loci and the BEDPE boundary.
//!
//! Inside the pipeline a locus carries a typed [`LocusMetrics`] record;
//! the string-keyed attribute map of the BEDPE format exists only at this
//! serialization boundary.

use crate::core::errors::{CalderaError, Result};
use crate::core::io::{get_reader, get_writer};
use crate::hic::{BinLocation, Chromosome};
use crate::utils::{is_bgzipped, make_parent_dirs};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-resolution validation metrics attached by the sieve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMetrics {
    pub obs_over_expected: f32,
    pub local_zscore: f64,
}

/// Accumulating metrics record with named optional numeric fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocusMetrics {
    /// Keyed by resolution in bp.
    pub per_resolution: BTreeMap<u32, ResolutionMetrics>,
    /// Cross-dataset count variability, set by the hotspot caller.
    pub stddev: Option<f64>,
}

impl LocusMetrics {
    pub fn insert(&mut self, resolution: u32, metrics: ResolutionMetrics) {
        self.per_resolution.insert(resolution, metrics);
    }

    pub fn is_empty(&self) -> bool {
        self.per_resolution.is_empty() && self.stddev.is_none()
    }

    /// Flatten to the string-keyed attribute map of the BEDPE boundary.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        for (res, m) in &self.per_resolution {
            attrs.insert(
                format!("{}_obs_over_expected", res),
                format!("{}", m.obs_over_expected),
            );
            attrs.insert(format!("{}_local_zscore", res), format!("{}", m.local_zscore));
        }
        if let Some(std) = self.stddev {
            attrs.insert("std".to_string(), format!("{}", std));
        }
        attrs
    }
}

/// A called or candidate locus: a rectangle in genomic coordinates plus its
/// metrics. Created by the detector, annotated by the validator, immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locus {
    pub chr1: String,
    pub start1: u64,
    pub end1: u64,
    pub chr2: String,
    pub start2: u64,
    pub end2: u64,
    #[serde(default)]
    pub metrics: LocusMetrics,
}

impl Locus {
    /// A single-pixel locus from bin coordinates at `resolution`.
    pub fn from_pixel(chrom: &Chromosome, pixel: BinLocation, resolution: u32) -> Self {
        let start1 = pixel.bin_x as u64 * resolution as u64;
        let start2 = pixel.bin_y as u64 * resolution as u64;
        Self {
            chr1: chrom.name.clone(),
            start1,
            end1: start1 + resolution as u64,
            chr2: chrom.name.clone(),
            start2,
            end2: start2 + resolution as u64,
            metrics: LocusMetrics::default(),
        }
    }

    pub fn mid1(&self) -> u64 {
        (self.start1 + self.end1) / 2
    }

    pub fn mid2(&self) -> u64 {
        (self.start2 + self.end2) / 2
    }

    pub fn width1(&self) -> u64 {
        self.end1 - self.start1
    }

    pub fn width2(&self) -> u64 {
        self.end2 - self.start2
    }

    /// The chromosome-pair key grouping loci into work units.
    pub fn key(&self) -> String {
        format!("{}_{}", self.chr1, self.chr2)
    }
}

/// Loci grouped by chromosome-pair key, ordered deterministically.
#[derive(Debug, Default)]
pub struct FeatureList {
    by_key: BTreeMap<String, Vec<Locus>>,
}

impl FeatureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_by_key(&mut self, key: String, mut loci: Vec<Locus>) {
        self.by_key.entry(key).or_default().append(&mut loci);
    }

    pub fn push(&mut self, locus: Locus) {
        self.by_key.entry(locus.key()).or_default().push(locus);
    }

    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&[Locus]> {
        self.by_key.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Locus>)> {
        self.by_key.iter()
    }

    pub fn into_groups(self) -> BTreeMap<String, Vec<Locus>> {
        self.by_key
    }

    /// Drain a worker channel into a keyed list.
    pub fn collect(receiver: crossbeam::channel::Receiver<Locus>) -> Self {
        let mut list = Self::new();
        for locus in receiver {
            list.push(locus);
        }
        list
    }

    /// Write tab-separated BEDPE: six coordinate columns plus one
    /// `key=value;...` attribute column when metrics are present.
    pub fn write_bedpe(&self, path: &Path) -> Result<()> {
        make_parent_dirs(path).map_err(|e| CalderaError::InvalidInput(e.to_string()))?;
        let mut writer = get_writer(&Some(path), is_bgzipped(path), false, 1, 6)
            .map_err(|e| CalderaError::InvalidInput(e.to_string()))?;
        for loci in self.by_key.values() {
            let mut sorted: Vec<&Locus> = loci.iter().collect();
            sorted.sort_by_key(|l| (l.start1, l.start2));
            for locus in sorted {
                let mut row = vec![
                    locus.chr1.clone(),
                    locus.start1.to_string(),
                    locus.end1.to_string(),
                    locus.chr2.clone(),
                    locus.start2.to_string(),
                    locus.end2.to_string(),
                ];
                let attrs = locus.metrics.to_attributes();
                if !attrs.is_empty() {
                    row.push(attrs.iter().map(|(k, v)| format!("{}={}", k, v)).join(";"));
                }
                writer.write_record(&row)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a BEDPE candidate list; extra columns beyond the six coordinates
    /// are ignored.
    pub fn read_bedpe(path: &Path) -> Result<Self> {
        let mut reader = get_reader(&Some(path), false, is_bgzipped(path))
            .map_err(|e| CalderaError::Parse(format!("{}: {}", path.display(), e)))?;
        let mut list = Self::new();
        for record in reader.records() {
            let record = record?;
            if record.len() < 6 {
                return Err(CalderaError::Parse(format!(
                    "BEDPE row needs at least 6 fields, got {}",
                    record.len()
                )));
            }
            let parse = |i: usize| -> Result<u64> {
                record[i].trim().parse().map_err(|_| {
                    CalderaError::Parse(format!("Bad coordinate '{}'", &record[i]))
                })
            };
            list.push(Locus {
                chr1: record[0].to_string(),
                start1: parse(1)?,
                end1: parse(2)?,
                chr2: record[3].to_string(),
                start2: parse(4)?,
                end2: parse(5)?,
                metrics: LocusMetrics::default(),
            });
        }
        Ok(list)
    }
}
