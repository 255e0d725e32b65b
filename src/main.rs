//! CALDERA - Contact Anomaly Locus Detection and Ranking
//!
//! CALDERA is a highly parallelized utility for calling statistically
//! anomalous loci in sparse, symmetric Hi-C contact maps, and for validating
//! or ranking previously called candidates.
//!
//! # Tools
//!
//! CALDERA provides several subcommands:
//!
//! - `detect`: multi-resolution cascade calling of anomalous pixels
//! - `sieve`: local-background validation of an existing candidate list
//! - `hotspot`: cross-dataset variability calling
//!
//! # Usage
//!
//! ```bash
//! # Call candidate loci from a contact dump
//! caldera detect --contacts contacts.tsv.gz --resolution 200 -o calls.bedpe
//!
//! # Validate an existing candidate list
//! caldera sieve --loops calls.bedpe --contacts contacts.tsv.gz \
//!     --resolution 1000 --resolutions 1000,2000,5000 -o kept.bedpe
//!
//! # Compare several datasets for volatile loci
//! caldera hotspot --contacts a.tsv.gz --contacts b.tsv.gz --contacts c.tsv.gz \
//!     -o hotspots.bedpe
//! ```
//!
//! For more detailed usage information, see the documentation for each
//! subcommand.

extern crate caldera_lib;
pub mod commands;
use anyhow::Result;
use caldera_lib::utils;
use env_logger::Env;
use log::*;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Commands for anomaly detection in Hi-C contact maps with CALDERA
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Call anomalous pixels via the multi-resolution cascade
    Detect(commands::DetectArgs),
    /// Validate and rank a candidate list against local backgrounds
    Sieve(commands::SieveArgs),
    /// Flag loci with anomalous variability across datasets
    Hotspot(commands::HotspotArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Detect(args) => commands::run_detect(args)?,
            Subcommand::Sieve(args) => commands::run_sieve(args)?,
            Subcommand::Hotspot(args) => commands::run_hotspot(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if utils::is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{}", err);
        std::process::exit(1);
    }
    Ok(())
}
