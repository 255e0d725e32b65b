//! # ParPairs
//!
//! Runs a processor over chromosome pairs in parallel.
//!
//! This module provides the core parallelization for CALDERA. Work is
//! partitioned by chromosome pair, each unit is processed to completion on a
//! fixed rayon pool, and results stream back through one bounded crossbeam
//! channel, the only synchronized structure in the run. A unit that fails
//! is logged and skipped so one bad chromosome pair cannot abort the whole
//! run.
//!
//! The main struct is [`ParPairs`], configured with a [`PairProcessor`]
//! implementation that defines how each pair should be processed.
//!
//! # Example
//!
//! ```rust
//! use caldera_lib::engine::{PairProcessor, ParPairs};
//! use caldera_lib::hic::ChromPair;
//!
//! struct MyProcessor;
//!
//! impl PairProcessor for MyProcessor {
//!     type P = String; // Your output type
//!
//!     fn process_pair(&self, pair: &ChromPair) -> anyhow::Result<Vec<Self::P>> {
//!         Ok(vec![format!("Processed {}", pair)])
//!     }
//! }
//!
//! let runner = ParPairs::new(Vec::new(), Some(2), None, MyProcessor);
//! let receiver = runner.process().unwrap();
//! assert!(receiver.into_iter().next().is_none());
//! ```

use crate::hic::{Chromosome, ChromPair};
use anyhow::Result;
use crossbeam::channel::{bounded, Receiver};
use log::*;
use rayon::prelude::*;
use serde::Serialize;
use std::thread;

const BYTES_IN_A_GIGABYTE: usize = 1024 * 1024 * 1024;

/// A modifier to apply to the channel size formula that is
/// `(BYTES_IN_A_GIGABYTE * channel_size_modifier) / size_of(R::P) * threads`.
pub const CHANNEL_SIZE_MODIFIER: f64 = 0.25;

/// PairProcessor defines how one chromosome pair is turned into results.
///
/// Per-pair state lives inside the implementation call; only the returned
/// items cross threads.
pub trait PairProcessor {
    /// The type of values returned by [`process_pair`].
    ///
    /// This type must implement `Serialize` so that results can be sent
    /// between threads, and `Send` and `Sync` for thread safety.
    ///
    /// [`process_pair`]: #tymethod.process_pair
    type P: 'static + Send + Sync + Serialize;

    /// Process one chromosome pair to completion.
    ///
    /// Errors are reported and the unit is skipped; they never abort the
    /// run.
    fn process_pair(&self, pair: &ChromPair) -> Result<Vec<Self::P>>;
}

/// ParPairs holds the configuration needed to launch [`ParPairs::process`].
#[derive(Debug)]
pub struct ParPairs<R: 'static + PairProcessor + Send + Sync> {
    pairs: Vec<ChromPair>,
    threads: usize,
    channel_size_modifier: f64,
    pool: rayon::ThreadPool,
    processor: R,
}

impl<R: PairProcessor + Send + Sync> ParPairs<R> {
    /// Create a ParPairs runner.
    ///
    /// # Arguments
    ///
    /// * `pairs` - the chromosome pairs to process
    /// * `threads` - worker count, defaults to all CPUs
    /// * `channel_size_modifier` - optional override of the memory fraction
    ///   backing the result channel
    /// * `processor` - something that implements [`PairProcessor`]
    pub fn new(
        pairs: Vec<ChromPair>,
        threads: Option<usize>,
        channel_size_modifier: Option<f64>,
        processor: R,
    ) -> Self {
        let threads = std::cmp::max(threads.unwrap_or_else(num_cpus::get), 1);
        info!("Using {} worker threads.", threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("Failed to build rayon thread pool");
        Self {
            pairs,
            threads,
            channel_size_modifier: channel_size_modifier.unwrap_or(CHANNEL_SIZE_MODIFIER),
            pool,
            processor,
        }
    }

    /// Process each pair on the pool, streaming results back in channel
    /// order. The receiver is live immediately; the caller drains it while
    /// workers run.
    pub fn process(self) -> Result<Receiver<R::P>> {
        let ParPairs {
            pairs,
            threads,
            channel_size_modifier,
            pool,
            processor,
        } = self;

        let item_size = std::mem::size_of::<R::P>().max(1);
        let channel_size = ((BYTES_IN_A_GIGABYTE as f64 * channel_size_modifier).floor() as usize
            / item_size)
            .saturating_mul(threads)
            .max(1);
        info!(
            "Creating channel of length {} (* {} bytes per item)",
            channel_size, item_size
        );

        let (snd, rxv) = bounded::<R::P>(channel_size);
        thread::spawn(move || {
            pool.install(move || {
                info!("Processing {} chromosome pairs", pairs.len());
                pairs.into_par_iter().for_each_with(snd, |snd, pair| {
                    match processor.process_pair(&pair) {
                        Ok(results) => {
                            for item in results {
                                if snd.send(item).is_err() {
                                    warn!("Channel closed, collector may have disconnected");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            // Partial-failure tolerance: report and move on.
                            error!("Skipping {}: {:#}", pair, err);
                        }
                    }
                });
            });
        });
        Ok(rxv)
    }
}

/// One intra-chromosomal pair per chromosome.
pub fn intra_pairs(chromosomes: &[Chromosome]) -> Vec<ChromPair> {
    chromosomes.iter().map(ChromPair::intra).collect()
}

/// Every ordered pair `(i, j)` with `j >= i`.
pub fn all_pairs(chromosomes: &[Chromosome]) -> Vec<ChromPair> {
    let mut pairs = Vec::new();
    for i in 0..chromosomes.len() {
        for j in i..chromosomes.len() {
            pairs.push(ChromPair {
                chr1: chromosomes[i].clone(),
                chr2: chromosomes[j].clone(),
            });
        }
    }
    pairs
}
