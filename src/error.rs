//! Fatal error conditions.
//!
//! Routine exclusions (low mapping quality, ambiguous bases, non-synonymous
//! codons, empty lag buckets) are never errors; they only show up in the
//! statistics. Everything here aborts the run before any output is written.

/// Errors that abort a correlation run.
#[derive(Debug, thiserror::Error)]
pub enum CorrError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown genetic code '{0}'")]
    UnknownGeneticCode(String),

    #[error("malformed alignment record at position {position}: {reason}")]
    MalformedRecord { position: i64, reason: String },

    #[error("alignment stream is not position-sorted: {current} follows {previous}")]
    UnsortedInput { previous: usize, current: usize },

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}
