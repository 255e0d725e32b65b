use anyhow::{bail, Result};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

use crate::commands::common;
use caldera_lib::engine::{intra_pairs, PairProcessor, ParPairs};
use caldera_lib::feature::{FeatureList, Locus};
use caldera_lib::hic::dataset::Dataset;
use caldera_lib::hic::{ChromPair, InMemoryDataset, NormScheme};
use caldera_lib::hotspot::{find_hotspots, HotspotConfig};

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "hotspot",
    about = "Flag loci with anomalous variability across datasets"
)]
pub struct HotspotArgs {
    /// Contact dump TSV(.gz) per dataset; pass the flag once per file
    #[structopt(long = "contacts", parse(from_os_str), required = true)]
    pub contacts: Vec<PathBuf>,

    /// Two-column chrom sizes TSV shared by all datasets
    #[structopt(long, parse(from_os_str))]
    pub chrom_sizes: Option<PathBuf>,

    /// Output BEDPE path
    #[structopt(long, short = "o", parse(from_os_str))]
    pub output: PathBuf,

    /// Resolution the datasets are compared at, in bp
    #[structopt(long, default_value = "2000")]
    pub resolution: u32,

    /// Normalization scheme applied per dataset
    #[structopt(long, short = "k", default_value = "SCALE")]
    pub norm: NormScheme,

    /// Minimum genomic distance considered, in bp
    #[structopt(long, default_value = "25000")]
    pub min_dist: u64,

    /// Maximum genomic distance considered, in bp
    #[structopt(long, default_value = "10000000")]
    pub max_dist: u64,

    /// Minimum datasets a locus must be observed in
    #[structopt(long, default_value = "3")]
    pub min_datasets: u64,

    /// Variability z-score cutoff
    #[structopt(long, default_value = "1.645")]
    pub zscore_cutoff: f64,

    /// Number of threads to use (default: all)
    #[structopt(short, long)]
    pub threads: Option<usize>,
}

struct HotspotProcessor {
    datasets: Vec<Arc<InMemoryDataset>>,
    config: HotspotConfig,
}

impl PairProcessor for HotspotProcessor {
    type P = Locus;

    fn process_pair(&self, pair: &ChromPair) -> Result<Vec<Locus>> {
        let refs: Vec<&dyn Dataset> = self
            .datasets
            .iter()
            .map(|ds| ds.as_ref() as &dyn Dataset)
            .collect();
        Ok(find_hotspots(&refs, &pair.chr1, &self.config)?)
    }
}

pub fn run_hotspot(args: HotspotArgs) -> Result<()> {
    info!("Starting hotspot comparison of {} datasets", args.contacts.len());
    if let Some(threads) = args.threads {
        caldera_lib::utils::determine_allowed_cpus(threads)?;
    }
    if args.contacts.len() < args.min_datasets as usize {
        bail!(
            "Need at least {} datasets, got {}",
            args.min_datasets,
            args.contacts.len()
        );
    }

    let datasets: Vec<Arc<InMemoryDataset>> = args
        .contacts
        .iter()
        .map(|path| common::open_dataset(path, args.resolution, args.chrom_sizes.as_ref()))
        .collect::<Result<_>>()?;

    let config = HotspotConfig {
        resolution: args.resolution,
        norm: args.norm,
        min_dist_bp: args.min_dist,
        max_dist_bp: args.max_dist,
        min_datasets: args.min_datasets,
        zscore_cutoff: args.zscore_cutoff,
    };

    let pairs = intra_pairs(datasets[0].chromosomes());
    let processor = HotspotProcessor { datasets, config };
    let receiver = ParPairs::new(pairs, args.threads, None, processor).process()?;
    let hotspots = FeatureList::collect(receiver);

    info!("{} hotspots found", hotspots.len());
    hotspots.write_bedpe(&args.output)?;
    info!("hotspot complete");
    Ok(())
}
