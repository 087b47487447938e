
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::call::VariantType;
use crate::data_types::diff_stats::{ClassCounts, DiffStats};

/// Label for the row covering every position
pub const ALL_LABEL: &str = "ALL";
/// Label for the row combining the indel sub-categories
pub const JOINT_INDEL_LABEL: &str = "JointIndel";
/// The variant types summed into the joint indel row
const JOINT_INDEL_TYPES: [VariantType; 3] = [VariantType::Insertion, VariantType::Deletion, VariantType::Indel];

/// Writes the summary table for one diff run
pub struct SummaryWriter {
    /// Diff label to go on each row
    diff_label: String
}

/// Contains all the data written to each row of our stats file
#[derive(Serialize)]
struct SummaryRow {
    /// User provided label
    diff_label: String,
    /// The type of variant represented by this row
    variant_type: String,
    /// Positions where both sides agree
    matches: u64,
    /// Positions where both sides disagree
    mismatches: u64,
    /// Positions with only lhs calls
    lhs_only: u64,
    /// Positions with only rhs calls
    rhs_only: u64,
    /// Total number of positions in the lhs, treated as truth
    truth_total: u64,
    /// truth.TP, i.e. matches
    truth_tp: u64,
    /// truth.FN, i.e. mismatches + lhs_only
    truth_fn: u64,
    /// query.TP, i.e. matches
    query_tp: u64,
    /// query.FP, i.e. mismatches + rhs_only
    query_fp: u64,
    /// Recall = truth.TP / (truth.TP+truth.FN)
    metric_recall: Option<f64>,
    /// Precision = query.TP / (query.TP + query.FP)
    metric_precision: Option<f64>,
    /// F1 = combination score of recall and precision
    metric_f1: Option<f64>,
    /// Concordance = matches / (matches + mismatches)
    metric_concordance: Option<f64>
}

impl SummaryRow {
    /// Creates a new row from labels and classification counts
    fn new(diff_label: String, variant_type: String, counts: &ClassCounts) -> Self {
        let metrics = counts.summary_metrics();
        Self {
            diff_label,
            variant_type,
            matches: counts.matches,
            mismatches: counts.mismatches,
            lhs_only: counts.lhs_only,
            rhs_only: counts.rhs_only,
            truth_total: metrics.truth_tp + metrics.truth_fn,
            truth_tp: metrics.truth_tp,
            truth_fn: metrics.truth_fn,
            query_tp: metrics.query_tp,
            query_fp: metrics.query_fp,
            metric_recall: metrics.recall(),
            metric_precision: metrics.precision(),
            metric_f1: metrics.f1(),
            metric_concordance: counts.concordance()
        }
    }
}

impl SummaryWriter {
    pub fn new(diff_label: String) -> Self {
        Self {
            diff_label
        }
    }

    /// Will write the summary out to the given file path.
    /// Rows are the ALL row, one row per observed variant type, and the joint indel row.
    /// # Arguments
    /// * `stats` - the final stats of the run
    /// * `filename` - the filename for the output (tsv/csv)
    /// # Errors
    /// * if the file cannot be created or written
    pub fn write_summary(&self, stats: &DiffStats, filename: &Path) -> csv::Result<()> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;

        csv_writer.serialize(SummaryRow::new(self.diff_label.clone(), ALL_LABEL.to_string(), stats.counts()))?;

        let mut joint_counts = ClassCounts::default();
        for (variant_type, counts) in stats.variant_counts().iter() {
            csv_writer.serialize(SummaryRow::new(self.diff_label.clone(), variant_type.as_ref().to_string(), counts))?;
            if JOINT_INDEL_TYPES.contains(variant_type) {
                joint_counts += *counts;
            }
        }
        csv_writer.serialize(SummaryRow::new(self.diff_label.clone(), JOINT_INDEL_LABEL.to_string(), &joint_counts))?;

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::call::Call;
    use crate::data_types::outcome::{AlignmentOutcome, Side};

    fn call(position: u64, alleles: &[&str], genotype: &[usize]) -> Call {
        Call::new(
            "chr1".to_string(), position,
            alleles.iter().map(|a| a.to_string()).collect(),
            genotype.to_vec()
        ).unwrap()
    }

    fn example_stats() -> DiffStats {
        let mut stats = DiffStats::default();
        stats.add_outcome(&AlignmentOutcome::paired(vec![call(1, &["A", "T"], &[1])], vec![call(1, &["A", "T"], &[1])], true));
        stats.add_outcome(&AlignmentOutcome::paired(vec![call(2, &["A", "AT"], &[1])], vec![call(2, &["A", "AT"], &[0, 1])], false));
        stats.add_outcome(&AlignmentOutcome::one_sided(Side::Rhs, vec![call(3, &["AT", "A"], &[1])]));
        stats
    }

    #[test]
    fn test_write_tsv() {
        let folder = tempfile::tempdir().unwrap();
        let out_fn = folder.path().join("summary.tsv");
        SummaryWriter::new("run1".to_string()).write_summary(&example_stats(), &out_fn).unwrap();

        let contents = std::fs::read_to_string(&out_fn).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("diff_label\tvariant_type\tmatches\tmismatches\tlhs_only\trhs_only"));
        assert!(lines[1].starts_with("run1\tALL\t1\t1\t0\t1\t2\t1\t1\t1\t2\t"));
        assert!(lines[2].starts_with("run1\tSnv\t1\t0\t0\t0\t"));
        assert!(lines[3].starts_with("run1\tInsertion\t0\t1\t0\t0\t"));
        assert!(lines[4].starts_with("run1\tDeletion\t0\t0\t0\t1\t"));
        assert!(lines[5].starts_with("run1\tJointIndel\t0\t1\t0\t1\t"));
    }

    #[test]
    fn test_write_csv() {
        let folder = tempfile::tempdir().unwrap();
        let out_fn = folder.path().join("summary.csv");
        SummaryWriter::new("run1".to_string()).write_summary(&DiffStats::default(), &out_fn).unwrap();

        let contents = std::fs::read_to_string(&out_fn).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        // empty metrics serialize as empty fields
        assert_eq!(lines[1], "run1,ALL,0,0,0,0,0,0,0,0,0,,,,");
    }
}
