/*!
# Equivalence
Decides whether the lhs and rhs calls at a shared position are the same call.
Each side may carry several records at one position (e.g. split multi-allelic records), so the comparison is always group-to-group.
A group is reduced to a set of per-record signatures, and two groups match when those sets are equal.

Two rules are provided:
* `ExactEquivalence` - literal allele strings, no reference access
* `NormalizedEquivalence` - alleles are padded with reference context to a shared window so that differing REF/ALT anchoring compares equal
*/
use itertools::Itertools;
use log::{trace, warn};
use rustc_hash::FxHashSet as HashSet;
use serde::Serialize;

use crate::data_types::call::Call;
use crate::parsing::reference::{ReferenceLookupError, ReferenceProvider};

/// The available equivalence rules
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, strum_macros::Display, strum_macros::EnumString, clap::ValueEnum)]
pub enum EquivalenceMode {
    /// Alleles are compared after padding to a shared reference window
    #[default]
    #[strum(ascii_case_insensitive, serialize = "normalized")]
    Normalized,
    /// Alleles must be string-identical
    #[strum(ascii_case_insensitive, serialize = "exact")]
    Exact
}

impl EquivalenceMode {
    /// Builds the rule for this mode
    pub fn build(&self) -> Box<dyn Equivalence> {
        match self {
            EquivalenceMode::Normalized => Box::new(NormalizedEquivalence),
            EquivalenceMode::Exact => Box::new(ExactEquivalence)
        }
    }
}

/// Canonical form of one call record
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallSignature {
    /// The allele set; representation depends on the rule
    alleles: Vec<String>,
    /// The called alleles, sorted so that order does not matter
    genotype: Vec<String>
}

/// Decides MATCH vs MISMATCH for two groups of calls at the same position
pub trait Equivalence {
    /// Returns true if the two groups are equivalent.
    /// # Arguments
    /// * `lhs` - all lhs calls at the position, non-empty
    /// * `rhs` - all rhs calls at the position, non-empty
    /// * `reference` - the reference, only consulted by rules that need context
    /// # Errors
    /// * if a needed reference lookup fails
    fn is_equivalent(&self, lhs: &[Call], rhs: &[Call], reference: &mut dyn ReferenceProvider) -> Result<bool, ReferenceLookupError>;
}

/// Literal comparison: same REF, same ALT multiset, same called allele multiset
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactEquivalence;

impl ExactEquivalence {
    fn signature(call: &Call) -> CallSignature {
        let alleles = std::iter::once(call.reference_allele().to_string())
            .chain(call.alternate_alleles().iter().cloned().sorted())
            .collect();
        let genotype = call.called_alleles()
            .map(|a| a.to_string())
            .sorted()
            .collect();
        CallSignature { alleles, genotype }
    }
}

impl Equivalence for ExactEquivalence {
    fn is_equivalent(&self, lhs: &[Call], rhs: &[Call], _reference: &mut dyn ReferenceProvider) -> Result<bool, ReferenceLookupError> {
        let lhs_set: HashSet<CallSignature> = lhs.iter().map(ExactEquivalence::signature).collect();
        let rhs_set: HashSet<CallSignature> = rhs.iter().map(ExactEquivalence::signature).collect();
        Ok(lhs_set == rhs_set)
    }
}

/// Reference-aware comparison.
/// Every allele of every call is extended with reference bases so that all alleles span the same window, which starts at the shared position and is as long as the longest REF in either group.
/// For example, `AT -> A` and `ATT -> AT` both become `ATT -> AT`.
/// Comparison is case-insensitive, and ALT alleles that reproduce the reference window are dropped from the allele set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizedEquivalence;

impl NormalizedEquivalence {
    fn signature(call: &Call, window: &str) -> CallSignature {
        let ref_len = call.reference_allele().len();
        // the window is at least as long as every REF in the comparison
        let suffix = window.get(ref_len..).unwrap_or_default();
        let extend = |allele: &str| -> String {
            let mut extended = allele.to_ascii_uppercase();
            extended.push_str(suffix);
            extended
        };

        let alleles = call.alternate_alleles().iter()
            .map(|a| extend(a))
            .filter(|a| a != window)
            .sorted()
            .dedup()
            .collect();
        // the reference bases stand in for REF, even when the call's own REF disagrees
        let genotype = call.genotype().iter()
            .map(|&g| if g == 0 { window.to_string() } else { extend(&call.alleles()[g]) })
            .sorted()
            .collect();
        CallSignature { alleles, genotype }
    }
}

impl Equivalence for NormalizedEquivalence {
    fn is_equivalent(&self, lhs: &[Call], rhs: &[Call], reference: &mut dyn ReferenceProvider) -> Result<bool, ReferenceLookupError> {
        let first = match lhs.first().or(rhs.first()) {
            Some(c) => c,
            None => return Ok(true)
        };
        let (contig, position) = first.key();

        let window_len = lhs.iter().chain(rhs.iter())
            .map(|c| c.reference_allele().len())
            .max()
            .unwrap_or(1);
        let window_bytes = reference.fetch(contig, position, window_len)?;
        let window = String::from_utf8_lossy(&window_bytes).to_ascii_uppercase();

        // a REF that disagrees with the reference usually means a coordinate convention problem
        for call in lhs.iter().chain(rhs.iter()) {
            let call_ref = call.reference_allele();
            let window_ref = window.get(..call_ref.len()).unwrap_or(window.as_str());
            if !window_ref.eq_ignore_ascii_case(call_ref) {
                warn!("REF allele {call_ref:?} at {contig}:{position} does not match reference {window_ref:?}");
            }
        }

        let lhs_set: HashSet<CallSignature> = lhs.iter().map(|c| NormalizedEquivalence::signature(c, &window)).collect();
        let rhs_set: HashSet<CallSignature> = rhs.iter().map(|c| NormalizedEquivalence::signature(c, &window)).collect();
        trace!("{contig}:{position} lhs={lhs_set:?} rhs={rhs_set:?}");
        Ok(lhs_set == rhs_set)
    }
}
