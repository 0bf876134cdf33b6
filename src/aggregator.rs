//! Cross-batch aggregation
//!
//! Each finished batch contributes one covariance per lag. The aggregator
//! folds those scalars into a running mean and variance per lag. It is owned
//! by a single thread, so no locking is involved, and the result does not
//! depend on the order batches arrive in (up to floating-point rounding).

/// Online mean and sample variance (Welford)
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MeanVariance {
    n: u64,
    mean: f64,
    m2: f64,
}

impl MeanVariance {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> Option<f64> {
        (self.n > 0).then_some(self.mean)
    }

    /// Bias-corrected variance; needs at least two values.
    pub fn variance(&self) -> Option<f64> {
        (self.n > 1).then(|| self.m2 / (self.n - 1) as f64)
    }
}

/// Which statistic a table row carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Lag 0: same-site diversity
    Ks,
    /// Lag > 0: substitution covariance
    P2,
}

impl RowKind {
    pub fn for_lag(lag: usize) -> Self {
        if lag == 0 {
            RowKind::Ks
        } else {
            RowKind::P2
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RowKind::Ks => "Ks",
            RowKind::P2 => "P2",
        }
    }
}

/// Aggregated statistics for one lag
#[derive(Debug, Clone, PartialEq)]
pub struct LagRow {
    pub lag: usize,
    /// Mean of per-batch covariances (not normalised)
    pub mean: f64,
    /// Sample variance across batches, `None` with fewer than two batches
    pub variance: Option<f64>,
    /// Number of batches that contributed
    pub sample_count: u64,
    pub kind: RowKind,
}

/// Final per-lag table; lags without any contribution are absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationTable {
    pub rows: Vec<LagRow>,
}

impl CorrelationTable {
    pub fn ks(&self) -> Option<&LagRow> {
        self.rows.iter().find(|r| r.kind == RowKind::Ks)
    }

    pub fn row(&self, lag: usize) -> Option<&LagRow> {
        self.rows.iter().find(|r| r.lag == lag)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Single-owner fold over per-batch lag covariances
#[derive(Debug, Clone)]
pub struct CrossBatchAggregator {
    lags: Vec<MeanVariance>,
    batches: usize,
}

impl CrossBatchAggregator {
    pub fn new(max_lag: usize) -> Self {
        Self {
            lags: vec![MeanVariance::new(); max_lag],
            batches: 0,
        }
    }

    /// Fold one batch's per-lag covariances; undefined lags are skipped.
    pub fn fold(&mut self, covariances: &[Option<f64>]) {
        for (acc, value) in self.lags.iter_mut().zip(covariances) {
            if let Some(v) = value {
                if v.is_finite() {
                    acc.increment(*v);
                }
            }
        }
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn finish(self) -> CorrelationTable {
        let rows = self
            .lags
            .iter()
            .enumerate()
            .filter_map(|(lag, acc)| {
                acc.mean().map(|mean| LagRow {
                    lag,
                    mean,
                    variance: acc.variance(),
                    sample_count: acc.n(),
                    kind: RowKind::for_lag(lag),
                })
            })
            .collect();
        CorrelationTable { rows }
    }
}
