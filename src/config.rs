//! Run configuration
//!
//! All tuning values travel in one immutable [`CorrConfig`] that is handed to
//! the projector, comparator and pipeline constructors.

use crate::error::CorrError;

/// Configuration for a correlation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrConfig {
    /// Bases must have quality strictly above this value
    pub min_base_quality: u8,
    /// Records must have mapping quality strictly above this value
    pub min_mapping_quality: u8,
    /// Sanity cap on mapping quality (inclusive)
    pub max_mapping_quality: u8,
    /// Number of lag buckets; lags 0..max_lag are reported
    pub max_lag: usize,
    /// Number of batch workers (0 = one per available CPU)
    pub workers: usize,
    /// htslib decompression threads for the reader
    pub read_threads: usize,
    /// Capacity of the batch and result hand-off queues
    pub channel_buffer: usize,
    /// NCBI translation table id
    pub genetic_code: String,
    /// Log every finished batch at info level instead of debug
    pub progress: bool,
}

impl Default for CorrConfig {
    fn default() -> Self {
        Self {
            min_base_quality: 13,
            min_mapping_quality: 30,
            max_mapping_quality: 50,
            max_lag: 100,
            workers: 0,
            read_threads: 2,
            channel_buffer: 64,
            genetic_code: "11".to_string(),
            progress: false,
        }
    }
}

impl CorrConfig {
    /// Reject combinations that would silently produce nothing useful.
    pub fn validate(&self) -> Result<(), CorrError> {
        if self.min_mapping_quality > self.max_mapping_quality {
            return Err(CorrError::InvalidConfig(format!(
                "minimum mapping quality {} exceeds maximum {}",
                self.min_mapping_quality, self.max_mapping_quality
            )));
        }
        if self.channel_buffer == 0 {
            return Err(CorrError::InvalidConfig(
                "channel buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the size of rayon's default pool.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            rayon::current_num_threads().max(1)
        }
    }
}
