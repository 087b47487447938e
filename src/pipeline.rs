
use indicatif::{ProgressBar, ProgressIterator};
use log::info;

use crate::data_types::call::Call;
use crate::data_types::diff_stats::DiffStats;
use crate::data_types::outcome::{AlignmentOutcome, Side};
use crate::diff_engine::{accumulate_stats, diff_calls, DiffConfig, DiffError};
use crate::orderer::{CallOrderer, ContigOrder};
use crate::parsing::api_source::ApiConfig;
use crate::parsing::call_source::{CallSourceSpec, CallStream};
use crate::parsing::reference::ReferenceProvider;
use crate::util::progress_bar::get_spinner_style;

/// Opens one side and orders it in memory
fn acquire_ordered(
    side: Side, spec: &CallSourceSpec, api: Option<&ApiConfig>,
    orderer: &(dyn CallOrderer + Sync), contig_order: &ContigOrder
) -> Result<Vec<Call>, DiffError> {
    let stream = spec.open(api)
        .map_err(|source| DiffError::Source { side, source })?;
    let calls = orderer.order(stream, contig_order)
        .map_err(|source| DiffError::Source { side, source })?;
    info!("Loaded {} {side} calls from {spec}.", calls.len());
    Ok(calls)
}

/// Runs a full diff from two sources to final statistics.
/// # Arguments
/// * `lhs` - the left call source
/// * `rhs` - the right call source
/// * `api` - remote service configuration, required if either side is remote
/// * `presorted` - if true, inputs are streamed straight into the engine and must already be ordered
/// * `orderer` - used to order each side when `presorted` is false; both sides are ordered in parallel
/// * `reference` - the reference provider
/// * `config` - engine configuration
/// # Errors
/// * if either source fails to open or yields an error
/// * if a presorted input is out of order
/// * if a reference lookup fails
pub fn run_diff(
    lhs: &CallSourceSpec, rhs: &CallSourceSpec, api: Option<&ApiConfig>,
    presorted: bool, orderer: &(dyn CallOrderer + Sync),
    reference: &mut dyn ReferenceProvider, config: &DiffConfig
) -> Result<DiffStats, DiffError> {
    let (lhs_stream, rhs_stream): (CallStream, CallStream) = if presorted {
        info!("Inputs are presorted, streaming calls directly.");
        let lhs_stream = lhs.open(api)
            .map_err(|source| DiffError::Source { side: Side::Lhs, source })?;
        let rhs_stream = rhs.open(api)
            .map_err(|source| DiffError::Source { side: Side::Rhs, source })?;
        (lhs_stream, rhs_stream)
    } else {
        info!("Loading and sorting all calls...");
        let contig_order = config.contig_order();
        let (lhs_result, rhs_result) = rayon::join(
            || acquire_ordered(Side::Lhs, lhs, api, orderer, contig_order),
            || acquire_ordered(Side::Rhs, rhs, api, orderer, contig_order)
        );
        let lhs_stream: CallStream = Box::new(lhs_result?.into_iter().map(Ok));
        let rhs_stream: CallStream = Box::new(rhs_result?.into_iter().map(Ok));
        (lhs_stream, rhs_stream)
    };

    info!("Comparing calls...");
    let progress = ProgressBar::new_spinner().with_style(get_spinner_style());
    let outcomes = diff_calls(lhs_stream, rhs_stream, reference, config);
    accumulate_with_progress(outcomes, config.max_mismatches(), &progress)
}

/// Runs `accumulate_stats` behind a spinner, closing the spinner on success and on failure
fn accumulate_with_progress<I>(outcomes: I, max_mismatches: Option<u64>, progress: &ProgressBar) -> Result<DiffStats, DiffError>
where
    I: Iterator<Item = Result<AlignmentOutcome, DiffError>>
{
    let result = accumulate_stats(outcomes.progress_with(progress.clone()), max_mismatches);
    match result.as_ref() {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon()
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::outcome::Classification;
    use crate::orderer::InMemoryOrderer;
    use rust_lib_reference_genome::reference_genome::ReferenceGenome;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    const HEADER: &str = "##fileformat=VCFv4.3
##contig=<ID=chr1,length=256>
##contig=<ID=chr2,length=256>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
";

    /// Helper function that builds a reference genome matching the VCF fixtures
    fn generate_simple_reference() -> ReferenceGenome {
        let mut ref_genome = ReferenceGenome::empty_reference();
        ref_genome.add_contig("chr1".to_string(), &"ACGT".repeat(64)).unwrap();
        ref_genome.add_contig("chr2".to_string(), &"ACGT".repeat(64)).unwrap();
        ref_genome
    }

    fn write_vcf(folder: &Path, name: &str, body: &str) -> CallSourceSpec {
        let filename: PathBuf = folder.join(name);
        let mut fp = std::fs::File::create(&filename).unwrap();
        write!(fp, "{HEADER}{body}").unwrap();
        CallSourceSpec::VcfFile { path: filename, sample: None }
    }

    #[test]
    fn test_run_diff() {
        let folder = tempfile::tempdir().unwrap();
        // POS is 1-based, so 101 lands on the A at 0-based 100
        let lhs = write_vcf(folder.path(), "lhs.vcf", "\
chr2\t5\t.\tA\tG\t.\tPASS\t.\tGT\t0/1
chr1\t101\t.\tA\tT\t.\tPASS\t.\tGT\t1/1
chr1\t201\t.\tA\tC\t.\tPASS\t.\tGT\t0/1
");
        let rhs = write_vcf(folder.path(), "rhs.vcf", "\
chr1\t101\t.\tAC\tTC\t.\tPASS\t.\tGT\t1/1
chr1\t151\t.\tC\t.\t.\tPASS\t.\tGT\t0/0
chr2\t5\t.\tA\tG\t.\tPASS\t.\tGT\t1/1
");

        let mut reference = generate_simple_reference();
        let stats = run_diff(&lhs, &rhs, None, false, &InMemoryOrderer, &mut reference, &DiffConfig::default()).unwrap();
        assert_eq!(stats.count(Classification::Match), 1);
        assert_eq!(stats.count(Classification::Mismatch), 1);
        assert_eq!(stats.count(Classification::LhsOnly), 1);
        assert_eq!(stats.count(Classification::RhsOnly), 1);

        // the lhs file is not sorted
        let mut reference = generate_simple_reference();
        let result = run_diff(&lhs, &rhs, None, true, &InMemoryOrderer, &mut reference, &DiffConfig::default());
        assert!(matches!(result, Err(DiffError::OutOfOrderInput { side: Side::Lhs, .. })));
    }

    #[test]
    fn test_missing_source() {
        let folder = tempfile::tempdir().unwrap();
        let rhs = write_vcf(folder.path(), "rhs.vcf", "");
        let lhs = CallSourceSpec::VcfFile { path: folder.path().join("missing.vcf"), sample: None };

        for presorted in [true, false] {
            let mut reference = generate_simple_reference();
            let result = run_diff(&lhs, &rhs, None, presorted, &InMemoryOrderer, &mut reference, &DiffConfig::default());
            assert!(matches!(result, Err(DiffError::Source { side: Side::Lhs, .. })));
        }
    }

    #[test]
    fn test_progress_closed() {
        let call = Call::new("chr1".to_string(), 0, vec!["A".to_string(), "T".to_string()], vec![1]).unwrap();

        let progress = ProgressBar::hidden();
        let outcomes = vec![Ok(AlignmentOutcome::one_sided(Side::Lhs, vec![call.clone()]))];
        let stats = accumulate_with_progress(outcomes.into_iter(), None, &progress).unwrap();
        assert_eq!(stats.count(Classification::LhsOnly), 1);
        assert!(progress.is_finished());

        // a failing outcome still closes the spinner
        let progress = ProgressBar::hidden();
        let outcomes = vec![
            Ok(AlignmentOutcome::one_sided(Side::Lhs, vec![call])),
            Err(DiffError::Source { side: Side::Rhs, source: anyhow::anyhow!("page request failed") }),
        ];
        let result = accumulate_with_progress(outcomes.into_iter(), None, &progress);
        assert!(matches!(result, Err(DiffError::Source { side: Side::Rhs, .. })));
        assert!(progress.is_finished());
    }
}
