use anyhow::{bail, Result};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

use crate::commands::common;
use caldera_lib::engine::{intra_pairs, PairProcessor, ParPairs};
use caldera_lib::feature::{FeatureList, Locus};
use caldera_lib::hic::dataset::Dataset;
use caldera_lib::hic::{norm, ChromPair, InMemoryDataset};
use caldera_lib::sift::{sift_chromosome, SiftConfig};
use caldera_lib::utils::{get_writer, is_bgzipped, make_parent_dirs};

#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "detect", about = "Multi-resolution anomalous-pixel detection")]
pub struct DetectArgs {
    /// Contact dump TSV(.gz): chrom, bin_x, bin_y, count at the base resolution
    #[structopt(long, parse(from_os_str))]
    pub contacts: PathBuf,

    /// Two-column chrom sizes TSV; inferred from the dump when omitted
    #[structopt(long, parse(from_os_str))]
    pub chrom_sizes: Option<PathBuf>,

    /// Output BEDPE path
    #[structopt(long, short = "o", parse(from_os_str))]
    pub output: PathBuf,

    /// Base (finest) resolution of the dump, in bp
    #[structopt(long, default_value = "200")]
    pub resolution: u32,

    /// Comma-separated corroboration resolutions, in bp
    #[structopt(long, default_value = "5000")]
    pub low_resolutions: String,

    /// Minimum genomic distance considered, in bp
    #[structopt(long, default_value = "10000")]
    pub min_dist: u64,

    /// Maximum genomic distance considered, in bp
    #[structopt(long, default_value = "10000000")]
    pub max_dist: u64,

    /// Z-score cutoff for the fine-resolution pass
    #[structopt(long, default_value = "2.0")]
    pub zscore_cutoff: f64,

    /// Z-score cutoff for the coarse corroboration pass
    #[structopt(long, default_value = "2.0")]
    pub lowres_zscore_cutoff: f64,

    /// Radius for merging nearby candidates, in bp
    #[structopt(long, default_value = "5000")]
    pub coalesce_radius: u64,

    /// Snap each call to the summit of its smoothed local density
    #[structopt(long)]
    pub pinpoint: bool,

    /// Also export per-bin coverage as a bedgraph
    #[structopt(long, parse(from_os_str))]
    pub row_sums: Option<PathBuf>,

    /// Number of threads to use (default: all)
    #[structopt(short, long)]
    pub threads: Option<usize>,
}

impl DetectArgs {
    fn to_config(&self) -> Result<SiftConfig> {
        let low_resolutions = common::parse_resolutions(&self.low_resolutions)?;
        for &low in &low_resolutions {
            if low <= self.resolution || low % self.resolution != 0 {
                bail!(
                    "Corroboration resolution {} must be a coarser multiple of {}",
                    low,
                    self.resolution
                );
            }
        }
        if self.min_dist >= self.max_dist {
            bail!("--min-dist must be below --max-dist");
        }
        Ok(SiftConfig {
            hires: self.resolution,
            low_resolutions,
            min_dist_bp: self.min_dist,
            max_dist_bp: self.max_dist,
            hires_zscore_cutoff: self.zscore_cutoff,
            lowres_zscore_cutoff: self.lowres_zscore_cutoff,
            coalesce_radius_bp: self.coalesce_radius,
            pinpoint: self.pinpoint,
        })
    }
}

struct SiftProcessor {
    ds: Arc<InMemoryDataset>,
    config: SiftConfig,
}

impl PairProcessor for SiftProcessor {
    type P = Locus;

    fn process_pair(&self, pair: &ChromPair) -> Result<Vec<Locus>> {
        Ok(sift_chromosome(self.ds.as_ref(), &pair.chr1, &self.config)?)
    }
}

pub fn run_detect(args: DetectArgs) -> Result<()> {
    info!("Starting detection cascade");
    if let Some(threads) = args.threads {
        caldera_lib::utils::determine_allowed_cpus(threads)?;
    }
    let config = args.to_config()?;
    let ds = common::open_dataset(&args.contacts, args.resolution, args.chrom_sizes.as_ref())?;
    info!(
        "Loaded {} chromosomes at {} bp",
        ds.chromosomes().len(),
        args.resolution
    );

    if let Some(path) = &args.row_sums {
        export_row_sums(ds.as_ref(), path, args.resolution)?;
    }

    let pairs = intra_pairs(ds.chromosomes());
    let processor = SiftProcessor {
        ds: ds.clone(),
        config,
    };
    let receiver = ParPairs::new(pairs, args.threads, None, processor).process()?;
    let list = FeatureList::collect(receiver);

    info!("{} loci called", list.len());
    list.write_bedpe(&args.output)?;
    info!("detect complete");
    Ok(())
}

/// Per-bin coverage track: `chrom  start  end  value` for every covered bin.
fn export_row_sums(ds: &InMemoryDataset, path: &PathBuf, resolution: u32) -> Result<()> {
    make_parent_dirs(path)?;
    let mut writer = get_writer(&Some(path), is_bgzipped(path), false, 1, 6)?;
    for chrom in ds.chromosomes() {
        let zoom = match ds.zoom(&ChromPair::intra(chrom), resolution) {
            Some(z) => z,
            None => continue,
        };
        for (bin, sum) in norm::row_sums(zoom.as_ref()).iter().enumerate() {
            if *sum > 0.0 {
                let start = bin as u64 * resolution as u64;
                writer.write_record(&[
                    chrom.name.clone(),
                    start.to_string(),
                    (start + resolution as u64).to_string(),
                    sum.to_string(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
