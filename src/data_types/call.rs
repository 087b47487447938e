
use serde::Serialize;
use std::collections::BTreeSet;

/// The variant categories we track statistics for
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, strum_macros::AsRefStr, strum_macros::EnumIter)]
pub enum VariantType {
    /// REF and every ALT are length = 1
    Snv=0,
    /// REF length = 1, ALT length > 1
    Insertion,
    /// REF length > 1, ALT length = 1
    Deletion,
    /// Any other single-ALT length combination
    Indel,
    /// More than one distinct ALT allele at the position
    MultiAllelic,
    /// No ALT alleles at all, i.e. a reference block or a site-only REF call
    Reference
}

impl VariantType {
    /// Infers the variant type for a group of calls that share a (contig, position).
    /// The REF of the first call anchors the length comparison; all distinct ALT alleles across the group count.
    /// # Arguments
    /// * `calls` - the calls at a single position, must be non-empty to be meaningful
    pub fn from_group(calls: &[Call]) -> VariantType {
        let ref_len = match calls.first() {
            Some(call) => call.reference_allele().len(),
            None => return VariantType::Reference
        };

        let alternates: BTreeSet<&str> = calls.iter()
            .flat_map(|c| c.alternate_alleles())
            .map(|a| a.as_str())
            .collect();

        if alternates.len() > 1 {
            return VariantType::MultiAllelic;
        }

        match alternates.first() {
            None => VariantType::Reference,
            Some(alt) => match (ref_len, alt.len()) {
                (1, 1) => VariantType::Snv,
                (1, _) => VariantType::Insertion,
                (_, 1) => VariantType::Deletion,
                (_, _) => VariantType::Indel
            }
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CallError {
    #[error("call must have at least one allele (REF)")]
    NoAlleles,
    #[error("allele{index} is empty (length = 0)")]
    EmptyAllele { index: usize },
    #[error("genotype index {index} is out of range for {num_alleles} alleles")]
    GenotypeIndex { index: usize, num_alleles: usize },
}

/// A single variant call for one sample.
/// Positions are always 0-based, regardless of the source.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Call {
    /// The contig (chromosome) name
    contig: String,
    /// The 0-based coordinate of the first REF base
    position: u64,
    /// REF followed by all ALT alleles
    alleles: Vec<String>,
    /// Indices into `alleles` that were called for the sample, one per called haplotype
    genotype: Vec<usize>,
}

impl Call {
    /// Creates a new call, checking that the alleles and genotype are consistent.
    /// # Arguments
    /// * `contig` - the contig of the call
    /// * `position` - the 0-based coordinate of the call
    /// * `alleles` - REF followed by ALT alleles
    /// * `genotype` - the called allele indices
    /// # Errors
    /// * if there are no alleles
    /// * if any allele is an empty string
    /// * if any genotype index does not point into `alleles`
    pub fn new(contig: String, position: u64, alleles: Vec<String>, genotype: Vec<usize>) -> Result<Call, CallError> {
        if alleles.is_empty() {
            return Err(CallError::NoAlleles);
        }

        if let Some(index) = alleles.iter().position(|a| a.is_empty()) {
            return Err(CallError::EmptyAllele { index });
        }

        let num_alleles = alleles.len();
        if let Some(&index) = genotype.iter().find(|&&g| g >= num_alleles) {
            return Err(CallError::GenotypeIndex { index, num_alleles });
        }

        Ok(Call {
            contig,
            position,
            alleles,
            genotype
        })
    }

    /// Returns the allele strings selected by the genotype, in genotype order
    pub fn called_alleles(&self) -> impl Iterator<Item = &str> + '_ {
        self.genotype.iter().map(|&g| self.alleles[g].as_str())
    }

    /// Returns (contig, position) as a borrowed sort key
    pub fn key(&self) -> (&str, u64) {
        (&self.contig, self.position)
    }

    // getters
    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn alleles(&self) -> &[String] {
        &self.alleles
    }

    pub fn reference_allele(&self) -> &str {
        &self.alleles[0]
    }

    pub fn alternate_alleles(&self) -> &[String] {
        &self.alleles[1..]
    }

    pub fn genotype(&self) -> &[usize] {
        &self.genotype
    }
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
    fn test_basic_call() {
        let c = call(100, &["A", "T"], &[0, 1]);
        assert_eq!(c.key(), ("chr1", 100));
        assert_eq!(c.reference_allele(), "A");
        assert_eq!(c.alternate_alleles(), &["T".to_string()]);
        assert_eq!(c.called_alleles().collect::<Vec<_>>(), vec!["A", "T"]);
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(
            Call::new("chr1".to_string(), 0, vec![], vec![]),
            Err(CallError::NoAlleles)
        );
        assert_eq!(
            Call::new("chr1".to_string(), 0, vec!["A".to_string(), "".to_string()], vec![0]),
            Err(CallError::EmptyAllele { index: 1 })
        );
        assert_eq!(
            Call::new("chr1".to_string(), 0, vec!["A".to_string(), "T".to_string()], vec![0, 2]),
            Err(CallError::GenotypeIndex { index: 2, num_alleles: 2 })
        );
    }

    #[test]
    fn test_variant_types() {
        assert_eq!(VariantType::from_group(&[call(1, &["A", "T"], &[1])]), VariantType::Snv);
        assert_eq!(VariantType::from_group(&[call(1, &["A", "AGT"], &[1])]), VariantType::Insertion);
        assert_eq!(VariantType::from_group(&[call(1, &["AGT", "A"], &[1])]), VariantType::Deletion);
        assert_eq!(VariantType::from_group(&[call(1, &["AG", "AGT"], &[1])]), VariantType::Indel);
        assert_eq!(VariantType::from_group(&[call(1, &["C"], &[0])]), VariantType::Reference);
        assert_eq!(VariantType::from_group(&[]), VariantType::Reference);

        // multi-ALT in a single record and split across records are the same thing
        assert_eq!(VariantType::from_group(&[call(1, &["A", "T", "G"], &[1, 2])]), VariantType::MultiAllelic);
        assert_eq!(
            VariantType::from_group(&[call(1, &["A", "T"], &[1]), call(1, &["A", "G"], &[1])]),
            VariantType::MultiAllelic
        );

        // identical ALT across split records is still a single ALT
        assert_eq!(
            VariantType::from_group(&[call(1, &["A", "T"], &[0, 1]), call(1, &["A", "T"], &[1])]),
            VariantType::Snv
        );
    }
}
