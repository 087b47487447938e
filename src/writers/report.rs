
use std::fmt;

use crate::data_types::diff_stats::{ClassCounts, DiffStats};
use crate::data_types::outcome::Classification;
use crate::writers::summary::ALL_LABEL;
use strum::IntoEnumIterator;

/// Text rendering of the final stats, written to stdout
pub struct DiffReport<'a> {
    /// User provided label for the run
    diff_label: &'a str,
    /// The stats to render
    stats: &'a DiffStats
}

impl<'a> DiffReport<'a> {
    pub fn new(diff_label: &'a str, stats: &'a DiffStats) -> Self {
        Self {
            diff_label,
            stats
        }
    }
}

/// Formats an optional ratio, "NA" when undefined
fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "NA".to_string()
    }
}

/// Writes one table row of counts
fn write_row(f: &mut fmt::Formatter<'_>, label: &str, counts: &ClassCounts) -> fmt::Result {
    write!(f, "{label:<14}")?;
    for classification in Classification::iter() {
        write!(f, "\t{}", counts.get(classification))?;
    }
    writeln!(f, "\t{}", format_ratio(counts.concordance()))
}

impl fmt::Display for DiffReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.diff_label)?;
        write!(f, "{:<14}", "variant_type")?;
        for classification in Classification::iter() {
            write!(f, "\t{}", classification.as_ref())?;
        }
        writeln!(f, "\tCONCORDANCE")?;

        write_row(f, ALL_LABEL, self.stats.counts())?;
        for (variant_type, counts) in self.stats.variant_counts().iter() {
            write_row(f, variant_type.as_ref(), counts)?;
        }

        let metrics = self.stats.counts().summary_metrics();
        writeln!(f, "lhs_calls: {}", self.stats.lhs_calls())?;
        writeln!(f, "rhs_calls: {}", self.stats.rhs_calls())?;
        writeln!(f, "recall (lhs as truth): {}", format_ratio(metrics.recall()))?;
        writeln!(f, "precision (lhs as truth): {}", format_ratio(metrics.precision()))?;
        writeln!(f, "f1: {}", format_ratio(metrics.f1()))?;
        if self.stats.truncated() {
            writeln!(f, "truncated: stopped early at the non-matching position limit")?;
        }
        Ok(())
    }
}
