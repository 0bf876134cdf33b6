use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use mcorr::CorrConfig;

/// Correlation profile of synonymous substitutions from aligned reads
#[derive(Debug, Clone, Parser)]
#[command(name = "mcorr-bam", version)]
struct Args {
    /// Position-sorted SAM/BAM/CRAM input
    #[arg(value_name = "BAM")]
    bam: PathBuf,

    /// Output CSV path
    #[arg(value_name = "OUT")]
    out: PathBuf,

    /// Number of lags to report
    #[arg(long = "maxl", default_value_t = 100)]
    max_lag: usize,

    /// Batch workers (0 = one per CPU)
    #[arg(long = "ncpu", default_value_t = 0)]
    ncpu: usize,

    /// Base quality must be above this value
    #[arg(long = "minbq", default_value_t = 13)]
    min_base_quality: u8,

    /// Mapping quality must be above this value
    #[arg(long = "minmq", default_value_t = 30)]
    min_mapping_quality: u8,

    /// Mapping quality must not exceed this value
    #[arg(long = "maxmq", default_value_t = 50)]
    max_mapping_quality: u8,

    /// NCBI genetic code table id
    #[arg(long = "codon", default_value = "11")]
    genetic_code: String,

    /// htslib decompression threads
    #[arg(long = "read-threads", default_value_t = 2)]
    read_threads: usize,

    /// Capacity of the batch and result queues
    #[arg(long = "channel-buffer", default_value_t = 64)]
    channel_buffer: usize,

    /// Report every finished batch
    #[arg(long)]
    progress: bool,
}

impl Args {
    fn config(&self) -> CorrConfig {
        CorrConfig {
            min_base_quality: self.min_base_quality,
            min_mapping_quality: self.min_mapping_quality,
            max_mapping_quality: self.max_mapping_quality,
            max_lag: self.max_lag,
            workers: self.ncpu,
            read_threads: self.read_threads,
            channel_buffer: self.channel_buffer,
            genetic_code: self.genetic_code.clone(),
            progress: self.progress,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    let bam = args.bam.to_str().context("Input path is not valid UTF-8")?;
    let out = args.out.to_str().context("Output path is not valid UTF-8")?;

    let (stats, rows) = mcorr::run(bam, out, &config)?;
    info!(
        "{} reads used, {} pairs compared, {} lag rows",
        stats.reads_used, stats.pairs_compared, rows
    );
    Ok(())
}
