//! Per-lag streaming covariance for one reference batch
//!
//! Every pair of observed sites `(i, j)`, `i <= j`, inside a substitution
//! profile feeds the covariance bucket for `lag = pos(j) - pos(i)`. The
//! diagonal (`lag == 0`) is the site diversity later reported as Ks.

use crate::codon_comparator::{SubstitutionProfile, CODON_LEN};

/// Online bivariate covariance (population form, `co_moment / n`)
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BivariateCovariance {
    n: u64,
    mean_x: f64,
    mean_y: f64,
    co_moment: f64,
}

impl BivariateCovariance {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        self.mean_y += (y - self.mean_y) / n;
        self.co_moment += dx * (y - self.mean_y);
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn mean_x(&self) -> f64 {
        self.mean_x
    }

    pub fn mean_y(&self) -> f64 {
        self.mean_y
    }

    /// `None` until at least one pair has been seen.
    pub fn covariance(&self) -> Option<f64> {
        if self.n == 0 {
            None
        } else {
            Some(self.co_moment / self.n as f64)
        }
    }
}

/// One covariance bucket per lag in `0..max_lag`
#[derive(Debug, Clone)]
pub struct LagCovariances {
    buckets: Vec<BivariateCovariance>,
}

impl LagCovariances {
    pub fn new(max_lag: usize) -> Self {
        Self {
            buckets: vec![BivariateCovariance::new(); max_lag],
        }
    }

    pub fn max_lag(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket(&self, lag: usize) -> Option<&BivariateCovariance> {
        self.buckets.get(lag)
    }

    /// Fold every observed site pair of `profile` into its lag bucket.
    pub fn add_profile(&mut self, profile: &SubstitutionProfile) {
        let max_lag = self.buckets.len();
        let obs = &profile.observations;
        for (i, first) in obs.iter().enumerate() {
            let Some(x) = first.value() else {
                continue;
            };
            for (step, second) in obs[i..].iter().enumerate() {
                let lag = step * CODON_LEN;
                if lag >= max_lag {
                    break;
                }
                if let Some(y) = second.value() {
                    self.buckets[lag].increment(x, y);
                }
            }
        }
    }

    /// Scalar covariance per lag; `None` where the bucket saw no pairs.
    pub fn results(&self) -> Vec<Option<f64>> {
        self.buckets.iter().map(BivariateCovariance::covariance).collect()
    }
}
