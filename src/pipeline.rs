//! Batch pipeline: reader -> worker pool -> aggregator
//!
//! # Threads
//! - one reader thread producing [`Batch`]es into a bounded queue
//! - a rayon pool of N workers, each running a whole batch (project, pair,
//!   compare, accumulate) before pulling the next one
//! - one aggregator thread folding per-batch results
//!
//! Completion is signalled by dropping senders. The first fatal error stops
//! the aggregator, which closes the result queue; workers then stop, which
//! closes the batch queue and stops the reader.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};

use crate::aggregator::{CorrelationTable, CrossBatchAggregator};
use crate::bam_source::{read_batches, Batch, SourceStats};
use crate::codon_comparator::CodonComparator;
use crate::config::CorrConfig;
use crate::error::CorrError;
use crate::genetic_code::GeneticCode;
use crate::lag_covariance::LagCovariances;
use crate::read_pairer::WindowPairer;
use crate::read_projector::{MappedRead, ProjectionStats, ReadProjector};

// ============================================================================
// Statistics
// ============================================================================

/// Run-wide counters, merged from the reader and every batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records read from the input
    pub records_read: usize,
    /// Unmapped records skipped by the reader
    pub unmapped: usize,
    /// Records outside the mapping-quality window
    pub discard_mapping_quality: usize,
    /// Records without stored bases
    pub discard_empty_sequence: usize,
    /// Reads projected and paired
    pub reads_used: usize,
    /// Overlapping pairs compared
    pub pairs_compared: usize,
    /// Third-codon sites evaluated over all pairs
    pub sites_evaluated: usize,
    /// Evaluated sites with a valid 0/1 observation
    pub valid_observations: usize,
    /// Batches aggregated
    pub batches: usize,
}

impl PipelineStats {
    /// Merge stats from multiple threads into a single aggregate
    pub fn merge(self, other: Self) -> Self {
        Self {
            records_read: self.records_read + other.records_read,
            unmapped: self.unmapped + other.unmapped,
            discard_mapping_quality: self.discard_mapping_quality + other.discard_mapping_quality,
            discard_empty_sequence: self.discard_empty_sequence + other.discard_empty_sequence,
            reads_used: self.reads_used + other.reads_used,
            pairs_compared: self.pairs_compared + other.pairs_compared,
            sites_evaluated: self.sites_evaluated + other.sites_evaluated,
            valid_observations: self.valid_observations + other.valid_observations,
            batches: self.batches + other.batches,
        }
    }

    fn add_projection(&mut self, projection: &ProjectionStats) {
        self.reads_used += projection.reads_used;
        self.discard_mapping_quality += projection.discard_mapping_quality;
        self.discard_empty_sequence += projection.discard_empty_sequence;
    }

    fn add_source(&mut self, source: &SourceStats) {
        self.records_read += source.records_read;
        self.unmapped += source.unmapped;
    }
}

/// Per-lag covariances of one finished batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub reference: String,
    /// Index = lag; `None` where the batch had no observation pairs
    pub covariances: Vec<Option<f64>>,
    pub stats: PipelineStats,
}

// ============================================================================
// Per-batch work
// ============================================================================

/// Run one batch end to end on the calling thread.
pub fn process_batch(batch: &Batch, config: &CorrConfig, code: &GeneticCode) -> Result<BatchResult> {
    let projector = ReadProjector::new(config);
    let comparator = CodonComparator::new(code, config);
    let mut lags = LagCovariances::new(config.max_lag);
    let mut projection = ProjectionStats::default();
    let mut pairer = WindowPairer::new();

    let mut pairs_compared = 0usize;
    let mut sites_evaluated = 0usize;
    let mut valid_observations = 0usize;
    let mut on_pair = |a: &MappedRead, b: &MappedRead| {
        let profile = comparator.compare(a, b);
        pairs_compared += 1;
        sites_evaluated += profile.len();
        valid_observations += profile.observed();
        lags.add_profile(&profile);
    };

    for record in &batch.records {
        let outcome = projector
            .project(record)
            .with_context(|| format!("Failed to project read in batch {}", batch.reference))?;
        projection.record(&outcome);
        if let Ok(read) = outcome {
            pairer
                .push(read, &mut on_pair)
                .with_context(|| format!("Failed to pair reads in batch {}", batch.reference))?;
        }
    }
    pairer.finish(&mut on_pair);

    let mut stats = PipelineStats {
        pairs_compared,
        sites_evaluated,
        valid_observations,
        batches: 1,
        ..PipelineStats::default()
    };
    stats.add_projection(&projection);

    Ok(BatchResult {
        reference: batch.reference.clone(),
        covariances: lags.results(),
        stats,
    })
}

fn run_worker(
    batches: Receiver<Batch>,
    results: Sender<Result<BatchResult>>,
    config: &CorrConfig,
    code: &GeneticCode,
) {
    for batch in batches.iter() {
        let outcome = process_batch(&batch, config, code);
        let failed = outcome.is_err();
        if results.send(outcome).is_err() || failed {
            break;
        }
    }
}

fn aggregate(
    results: Receiver<Result<BatchResult>>,
    max_lag: usize,
    progress: bool,
) -> Result<(CorrelationTable, PipelineStats)> {
    let mut aggregator = CrossBatchAggregator::new(max_lag);
    let mut stats = PipelineStats::default();

    for result in results.iter() {
        let result = result?;
        aggregator.fold(&result.covariances);
        if progress {
            info!(
                "Batch {} done: {} reads, {} pairs",
                result.reference, result.stats.reads_used, result.stats.pairs_compared
            );
        } else {
            debug!(
                "Batch {} done: {} reads, {} pairs",
                result.reference, result.stats.reads_used, result.stats.pairs_compared
            );
        }
        stats = stats.merge(result.stats);
    }

    Ok((aggregator.finish(), stats))
}

// ============================================================================
// Orchestration
// ============================================================================

/// Run the worker pool over batches produced by `produce`.
///
/// `produce` runs on its own thread and must stop once sending fails.
pub fn run_pipeline<P>(config: &CorrConfig, produce: P) -> Result<(CorrelationTable, PipelineStats)>
where
    P: FnOnce(&Sender<Batch>) -> Result<SourceStats> + Send,
{
    config.validate()?;
    let code = GeneticCode::ncbi(&config.genetic_code)?;
    let workers = config.effective_workers();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to build worker pool")?;

    let (batch_tx, batch_rx): (Sender<Batch>, Receiver<Batch>) = bounded(config.channel_buffer);
    let (result_tx, result_rx): (Sender<Result<BatchResult>>, Receiver<Result<BatchResult>>) =
        bounded(config.channel_buffer);

    info!(
        "Starting {} workers (max lag {}, genetic code {} {})",
        workers, config.max_lag, code.id, code.name
    );
    let t0 = Instant::now();

    let (source, aggregated) = thread::scope(|scope| {
        let reader = scope.spawn(move || {
            let stats = produce(&batch_tx);
            drop(batch_tx);
            stats
        });

        let max_lag = config.max_lag;
        let progress = config.progress;
        let aggregator = scope.spawn(move || aggregate(result_rx, max_lag, progress));

        let endpoints: Vec<_> = (0..workers)
            .map(|_| (batch_rx.clone(), result_tx.clone()))
            .collect();
        drop(batch_rx);
        drop(result_tx);

        let code = &code;
        let pool_outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.scope(|s| {
                for (batches, results) in endpoints {
                    s.spawn(move |_| run_worker(batches, results, config, code));
                }
            })
        }));

        let source = reader.join().map_err(|_| CorrError::WorkerPanicked("reader"));
        let aggregated = aggregator
            .join()
            .map_err(|_| CorrError::WorkerPanicked("aggregator"));
        if pool_outcome.is_err() {
            return (Err(CorrError::WorkerPanicked("batch worker")), aggregated);
        }
        (source, aggregated)
    });

    // a worker failure is the root cause when both sides report one
    let (table, mut stats) = aggregated??;
    let source = source??;
    stats.add_source(&source);

    info!("Correlation pipeline complete ({}ms):", t0.elapsed().as_millis());
    info!("  Records read: {}", stats.records_read);
    info!("  Unmapped: {}", stats.unmapped);
    info!("  Filtered (mapping quality): {}", stats.discard_mapping_quality);
    info!("  Filtered (empty sequence): {}", stats.discard_empty_sequence);
    info!("  Reads used: {}", stats.reads_used);
    info!("  Pairs compared: {}", stats.pairs_compared);
    info!(
        "  Sites evaluated: {} ({} valid)",
        stats.sites_evaluated, stats.valid_observations
    );
    info!("  Batches aggregated: {}", stats.batches);

    Ok((table, stats))
}

/// Compute the lag table for an alignment file.
pub fn calculate_correlation(
    bam_path: &str,
    config: &CorrConfig,
) -> Result<(CorrelationTable, PipelineStats)> {
    let read_threads = config.read_threads;
    run_pipeline(config, move |tx| {
        read_batches(bam_path, read_threads, |batch| {
            tx.send(batch)
                .map_err(|_| anyhow!("Batch queue closed before input was exhausted"))
        })
    })
}

// ============================================================================
// Tests
// ============================================================================
