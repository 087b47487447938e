
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use crate::data_types::call::VariantType;
use crate::data_types::outcome::{AlignmentOutcome, Classification};
use crate::data_types::summary_metrics::{ratio, SummaryMetrics};

/// Counters for each of the four alignment classifications
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ClassCounts {
    /// Positions where both sides agree
    pub matches: u64,
    /// Positions where both sides have calls that disagree
    pub mismatches: u64,
    /// Positions with only lhs calls
    pub lhs_only: u64,
    /// Positions with only rhs calls
    pub rhs_only: u64
}

impl AddAssign for ClassCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.matches += rhs.matches;
        self.mismatches += rhs.mismatches;
        self.lhs_only += rhs.lhs_only;
        self.rhs_only += rhs.rhs_only;
    }
}

impl ClassCounts {
    /// Increments the counter for a classification
    pub fn increment(&mut self, classification: Classification) {
        match classification {
            Classification::Match => self.matches += 1,
            Classification::Mismatch => self.mismatches += 1,
            Classification::LhsOnly => self.lhs_only += 1,
            Classification::RhsOnly => self.rhs_only += 1
        };
    }

    /// Returns the counter for a classification
    pub fn get(&self, classification: Classification) -> u64 {
        match classification {
            Classification::Match => self.matches,
            Classification::Mismatch => self.mismatches,
            Classification::LhsOnly => self.lhs_only,
            Classification::RhsOnly => self.rhs_only
        }
    }

    /// Total number of positions visited
    pub fn total(&self) -> u64 {
        self.matches + self.mismatches + self.lhs_only + self.rhs_only
    }

    /// Fraction of shared positions that match; None when no position is shared
    pub fn concordance(&self) -> Option<f64> {
        ratio(self.matches, self.matches + self.mismatches)
    }

    /// Converts to the truth/query view with lhs as truth
    pub fn summary_metrics(&self) -> SummaryMetrics {
        SummaryMetrics::new(
            self.matches, self.mismatches + self.lhs_only,
            self.matches, self.mismatches + self.rhs_only
        )
    }
}

/// The aggregate result of a diff run
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DiffStats {
    /// Counts across all positions
    counts: ClassCounts,
    /// Counts split by the inferred variant type of each position
    variant_counts: BTreeMap<VariantType, ClassCounts>,
    /// Number of lhs call records consumed
    lhs_calls: u64,
    /// Number of rhs call records consumed
    rhs_calls: u64,
    /// Set when the run stopped before both inputs were exhausted
    truncated: bool
}

impl AddAssign for DiffStats {
    fn add_assign(&mut self, rhs: Self) {
        self.counts += rhs.counts;
        for (variant_type, counts) in rhs.variant_counts.into_iter() {
            let entry = self.variant_counts.entry(variant_type).or_default();
            *entry += counts;
        }
        self.lhs_calls += rhs.lhs_calls;
        self.rhs_calls += rhs.rhs_calls;
        self.truncated |= rhs.truncated;
    }
}

impl DiffStats {
    /// Folds a single outcome into the stats
    /// # Arguments
    /// * `outcome` - the outcome to add, each outcome should be added exactly once
    pub fn add_outcome(&mut self, outcome: &AlignmentOutcome) {
        let classification = outcome.classification();
        self.counts.increment(classification);
        self.variant_counts.entry(outcome.variant_type())
            .or_default()
            .increment(classification);
        self.lhs_calls += outcome.lhs_calls().len() as u64;
        self.rhs_calls += outcome.rhs_calls().len() as u64;
    }

    /// Flags these stats as covering only part of the inputs
    pub fn set_truncated(&mut self) {
        self.truncated = true;
    }

    /// Returns the count for a classification across all variant types
    pub fn count(&self, classification: Classification) -> u64 {
        self.counts.get(classification)
    }

    /// Returns true if nothing has been counted
    pub fn is_empty(&self) -> bool {
        self.counts.total() == 0
    }

    // getters
    pub fn counts(&self) -> &ClassCounts {
        &self.counts
    }

    pub fn variant_counts(&self) -> &BTreeMap<VariantType, ClassCounts> {
        &self.variant_counts
    }

    pub fn lhs_calls(&self) -> u64 {
        self.lhs_calls
    }

    pub fn rhs_calls(&self) -> u64 {
        self.rhs_calls
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}
