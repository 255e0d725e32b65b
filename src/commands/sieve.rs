use anyhow::Result;
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

use crate::commands::common;
use caldera_lib::engine::{PairProcessor, ParPairs};
use caldera_lib::feature::{FeatureList, Locus};
use caldera_lib::hic::dataset::Dataset;
use caldera_lib::hic::{ChromPair, InMemoryDataset, NormScheme};
use caldera_lib::sieve::{sieve_pair, SieveConfig, SievePolicy};

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "sieve",
    about = "Validate and rank a candidate list against local backgrounds"
)]
pub struct SieveArgs {
    /// Candidate list (BEDPE) to assess
    #[structopt(long, parse(from_os_str))]
    pub loops: PathBuf,

    /// Output BEDPE path
    #[structopt(long, short = "o", parse(from_os_str))]
    pub output: PathBuf,

    /// Contact dump TSV(.gz): chrom, bin_x, bin_y, count at the base resolution
    #[structopt(long, parse(from_os_str))]
    pub contacts: PathBuf,

    /// Two-column chrom sizes TSV; inferred from the dump when omitted
    #[structopt(long, parse(from_os_str))]
    pub chrom_sizes: Option<PathBuf>,

    /// Base (finest) resolution of the dump, in bp
    #[structopt(long, default_value = "1000")]
    pub resolution: u32,

    /// Comma-separated resolutions to assess, in bp
    #[structopt(long, default_value = "1000,2000,5000")]
    pub resolutions: String,

    /// Normalization scheme applied to local windows
    #[structopt(long, short = "k", default_value = "VC")]
    pub norm: NormScheme,

    /// Half-width of the local window, in bins
    #[structopt(long, default_value = "5")]
    pub window: usize,

    /// Local z-score a locus must exceed
    #[structopt(long, default_value = "1.0")]
    pub zscore_cutoff: f64,

    /// Require every assessed resolution to pass
    #[structopt(long)]
    pub strict: bool,

    /// Keep everything, only recording metrics
    #[structopt(long)]
    pub peek: bool,

    /// Number of threads to use (default: all)
    #[structopt(short, long)]
    pub threads: Option<usize>,
}

impl SieveArgs {
    fn policy(&self) -> SievePolicy {
        if self.peek {
            SievePolicy::Peek
        } else if self.strict {
            SievePolicy::Strict
        } else {
            SievePolicy::Default
        }
    }

    fn effective_window(&self) -> usize {
        if self.window < 2 {
            5
        } else {
            self.window
        }
    }
}

struct SieveProcessor {
    ds: Arc<InMemoryDataset>,
    groups: FxHashMap<String, Vec<Locus>>,
    config: SieveConfig,
}

impl PairProcessor for SieveProcessor {
    type P = Locus;

    fn process_pair(&self, pair: &ChromPair) -> Result<Vec<Locus>> {
        let loci = self.groups.get(&pair.key()).cloned().unwrap_or_default();
        Ok(sieve_pair(self.ds.as_ref(), pair, loci, &self.config)?)
    }
}

pub fn run_sieve(args: SieveArgs) -> Result<()> {
    info!("Starting sieve");
    if let Some(threads) = args.threads {
        caldera_lib::utils::determine_allowed_cpus(threads)?;
    }
    let config = SieveConfig {
        resolutions: common::parse_resolutions(&args.resolutions)?,
        window: args.effective_window(),
        norm: args.norm,
        policy: args.policy(),
        zscore_cutoff: args.zscore_cutoff,
    };
    info!("Using normalization: {}", config.norm);

    let ds = common::open_dataset(&args.contacts, args.resolution, args.chrom_sizes.as_ref())?;
    let candidate_list = FeatureList::read_bedpe(&args.loops)?;
    info!("Assessing {} candidate loci", candidate_list.len());

    // One work unit per chromosome-pair key present in the candidate list.
    let mut pairs = Vec::new();
    let mut groups: FxHashMap<String, Vec<Locus>> = FxHashMap::default();
    for (key, loci) in candidate_list.into_groups() {
        let first = &loci[0];
        match (ds.chromosome(&first.chr1), ds.chromosome(&first.chr2)) {
            (Some(c1), Some(c2)) => {
                pairs.push(ChromPair {
                    chr1: c1.clone(),
                    chr2: c2.clone(),
                });
                groups.insert(key, loci);
            }
            _ => warn!(
                "Skipping {} loci on unknown chromosome pair {}",
                loci.len(),
                key
            ),
        }
    }

    let processor = SieveProcessor {
        ds,
        groups,
        config,
    };
    let receiver = ParPairs::new(pairs, args.threads, None, processor).process()?;
    let kept = FeatureList::collect(receiver);

    info!("{} loci kept", kept.len());
    kept.write_bedpe(&args.output)?;
    info!("sieve complete");
    Ok(())
}
