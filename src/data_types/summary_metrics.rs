
use serde::Serialize;
use std::ops::AddAssign;

/// Returns `numerator / denominator`, or None for an empty denominator
pub fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Recall/precision view of a diff, treating lhs as the truth set and rhs as the query set.
/// Mismatched positions count against both sides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryMetrics {
    /// lhs positions reproduced by rhs
    pub truth_tp: u64,
    /// lhs positions that rhs missed or called differently
    pub truth_fn: u64,
    /// rhs positions reproduced by lhs
    pub query_tp: u64,
    /// rhs positions absent from lhs or called differently
    pub query_fp: u64,
}

impl AddAssign for SummaryMetrics {
    fn add_assign(&mut self, other: Self) {
        self.truth_tp += other.truth_tp;
        self.truth_fn += other.truth_fn;
        self.query_tp += other.query_tp;
        self.query_fp += other.query_fp;
    }
}

impl SummaryMetrics {
    pub fn new(truth_tp: u64, truth_fn: u64, query_tp: u64, query_fp: u64) -> Self {
        Self {
            truth_tp, truth_fn, query_tp, query_fp
        }
    }

    /// Number of lhs positions considered
    pub fn truth_total(&self) -> u64 {
        self.truth_tp + self.truth_fn
    }

    /// Number of rhs positions considered
    pub fn query_total(&self) -> u64 {
        self.query_tp + self.query_fp
    }

    /// Fraction of lhs positions that rhs reproduces
    pub fn recall(&self) -> Option<f64> {
        ratio(self.truth_tp, self.truth_total())
    }

    /// Fraction of rhs positions that lhs reproduces
    pub fn precision(&self) -> Option<f64> {
        ratio(self.query_tp, self.query_total())
    }

    /// Harmonic mean of recall and precision; 0.0 if both are 0.0
    pub fn f1(&self) -> Option<f64> {
        let recall = self.recall()?;
        let precision = self.precision()?;
        if recall + precision > 0.0 {
            Some(2.0 * recall * precision / (recall + precision))
        } else {
            Some(0.0)
        }
    }
}
