//! Synonymous-substitution correlation profiles from aligned reads.
//!
//! Overlapping read pairs on the same reference are compared at third codon
//! positions; substitution indicators are correlated as a function of
//! reference distance (lag), per reference sequence, then averaged across
//! sequences. Lag 0 is the site diversity (Ks) that normalises the rest.

pub mod aggregator;
pub mod bam_source;
pub mod codon_comparator;
pub mod config;
pub mod error;
pub mod genetic_code;
pub mod lag_covariance;
pub mod output;
pub mod pipeline;
pub mod read_pairer;
pub mod read_projector;
pub mod seq_decode;

use anyhow::Result;
use log::info;

pub use aggregator::{CorrelationTable, LagRow, RowKind};
pub use config::CorrConfig;
pub use error::CorrError;
pub use genetic_code::GeneticCode;
pub use pipeline::{calculate_correlation, run_pipeline, PipelineStats};

/// Compute the lag table for `bam_path` and write it to `out_path`.
///
/// Nothing is written unless the whole input was processed. Returns the run
/// statistics and the number of rows written.
pub fn run(bam_path: &str, out_path: &str, config: &CorrConfig) -> Result<(PipelineStats, usize)> {
    let (table, stats) = calculate_correlation(bam_path, config)?;
    let rows = output::write_table(out_path, &table)?;
    info!("Wrote {} lag rows to {}", rows, out_path);
    Ok((stats, rows))
}

// ============================================================================
// PyO3 Bindings
// ============================================================================

#[cfg(feature = "python")]
mod python {
    #![allow(non_local_definitions)]

    use pyo3::exceptions::PyRuntimeError;
    use pyo3::prelude::*;

    use crate::config::CorrConfig;

    /// Compute the synonymous-substitution lag table for an alignment file.
    ///
    /// # Arguments
    /// * `bam_path` - SAM/BAM/CRAM input, position-sorted
    /// * `out_path` - CSV output path (`l,m,v,n,t,b`)
    /// * `num_threads` - Batch workers (0 = auto-detect)
    /// * `genetic_code` - NCBI translation table id
    ///
    /// # Returns
    /// Number of lag rows written
    ///
    /// # Example (Python)
    /// ```python
    /// import mcorr
    /// rows = mcorr.calculate_correlation("sample.bam", "sample.csv", max_lag=300)
    /// ```
    #[pyfunction]
    #[pyo3(signature = (
        bam_path,
        out_path,
        max_lag=100,
        min_base_quality=13,
        min_mapping_quality=30,
        max_mapping_quality=50,
        num_threads=0,
        genetic_code="11"
    ))]
    #[allow(clippy::too_many_arguments)]
    fn calculate_correlation(
        py: Python,
        bam_path: &str,
        out_path: &str,
        max_lag: usize,
        min_base_quality: u8,
        min_mapping_quality: u8,
        max_mapping_quality: u8,
        num_threads: usize,
        genetic_code: &str,
    ) -> PyResult<usize> {
        let config = CorrConfig {
            min_base_quality,
            min_mapping_quality,
            max_mapping_quality,
            max_lag,
            workers: num_threads,
            genetic_code: genetic_code.to_string(),
            ..CorrConfig::default()
        };

        py.allow_threads(|| crate::run(bam_path, out_path, &config))
            .map(|(_, rows)| rows)
            .map_err(|e| PyRuntimeError::new_err(format!("Correlation failed: {:#}", e)))
    }

    /// mcorr Python module
    #[pymodule]
    fn mcorr(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(calculate_correlation, m)?)?;
        Ok(())
    }
}
