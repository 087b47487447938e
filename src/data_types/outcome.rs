
use serde::Serialize;

use crate::data_types::call::{Call, VariantType};

/// Identifies which input a call came from
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum_macros::Display)]
pub enum Side {
    #[strum(serialize = "lhs")]
    Lhs,
    #[strum(serialize = "rhs")]
    Rhs
}

/// The classification of a single aligned position
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::AsRefStr, strum_macros::EnumIter)]
pub enum Classification {
    /// Both sides have calls here and they are equivalent
    #[strum(serialize = "MATCH")]
    Match=0,
    /// Both sides have calls here and they differ
    #[strum(serialize = "MISMATCH")]
    Mismatch,
    /// Only the lhs has a call here
    #[strum(serialize = "LHS_ONLY")]
    LhsOnly,
    /// Only the rhs has a call here
    #[strum(serialize = "RHS_ONLY")]
    RhsOnly
}

/// One outcome per distinct (contig, position) visited by the merge.
/// Each side holds every call at the position, so split multi-allelic records stay together.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlignmentOutcome {
    /// The contig of the position
    contig: String,
    /// The 0-based position
    position: u64,
    /// Calls from the lhs at this position, empty if none
    lhs_calls: Vec<Call>,
    /// Calls from the rhs at this position, empty if none
    rhs_calls: Vec<Call>,
    /// The final classification, always consistent with which sides are populated
    classification: Classification
}

impl AlignmentOutcome {
    /// Creates an outcome for a position where only one side had calls
    /// # Arguments
    /// * `side` - the side that had calls
    /// * `calls` - the calls from that side, must be non-empty and share a position
    pub fn one_sided(side: Side, calls: Vec<Call>) -> Self {
        let (contig, position) = position_of(&calls);
        match side {
            Side::Lhs => Self {
                contig, position,
                lhs_calls: calls,
                rhs_calls: vec![],
                classification: Classification::LhsOnly
            },
            Side::Rhs => Self {
                contig, position,
                lhs_calls: vec![],
                rhs_calls: calls,
                classification: Classification::RhsOnly
            }
        }
    }

    /// Creates an outcome for a position where both sides had calls
    /// # Arguments
    /// * `lhs_calls` - the lhs calls at the position
    /// * `rhs_calls` - the rhs calls at the position
    /// * `is_match` - the result of the equivalence check
    pub fn paired(lhs_calls: Vec<Call>, rhs_calls: Vec<Call>, is_match: bool) -> Self {
        let (contig, position) = position_of(&lhs_calls);
        let classification = if is_match {
            Classification::Match
        } else {
            Classification::Mismatch
        };
        Self {
            contig, position,
            lhs_calls, rhs_calls,
            classification
        }
    }

    /// Returns the variant type for this outcome, preferring the lhs calls when present
    pub fn variant_type(&self) -> VariantType {
        if self.lhs_calls.is_empty() {
            VariantType::from_group(&self.rhs_calls)
        } else {
            VariantType::from_group(&self.lhs_calls)
        }
    }

    // getters
    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn lhs_calls(&self) -> &[Call] {
        &self.lhs_calls
    }

    pub fn rhs_calls(&self) -> &[Call] {
        &self.rhs_calls
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }
}

fn position_of(calls: &[Call]) -> (String, u64) {
    calls.first()
        .map(|c| (c.contig().to_string(), c.position()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(position: u64, alleles: &[&str], genotype: &[usize]) -> Call {
        Call::new(
            "chr1".to_string(), position,
            alleles.iter().map(|a| a.to_string()).collect(),
            genotype.to_vec()
        ).unwrap()
    }

    #[test]
    fn test_one_sided() {
        let lhs = AlignmentOutcome::one_sided(Side::Lhs, vec![call(5, &["A", "T"], &[1])]);
        assert_eq!(lhs.classification(), Classification::LhsOnly);
        assert_eq!((lhs.contig(), lhs.position()), ("chr1", 5));
        assert!(lhs.rhs_calls().is_empty());

        let rhs = AlignmentOutcome::one_sided(Side::Rhs, vec![call(7, &["AT", "A"], &[1])]);
        assert_eq!(rhs.classification(), Classification::RhsOnly);
        assert!(rhs.lhs_calls().is_empty());
        assert_eq!(rhs.variant_type(), VariantType::Deletion);
    }

    #[test]
    fn test_paired() {
        let outcome = AlignmentOutcome::paired(
            vec![call(5, &["A", "T"], &[1])],
            vec![call(5, &["A", "T"], &[0, 1])],
            false
        );
        assert_eq!(outcome.classification(), Classification::Mismatch);
        assert_eq!(outcome.variant_type(), VariantType::Snv);
        assert_eq!(Classification::Mismatch.as_ref(), "MISMATCH");
        assert_eq!(Side::Rhs.to_string(), "rhs");
    }
}
