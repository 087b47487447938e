/*!
# Orderer
Puts calls into the (contig, position) order that the diff engine requires.
The in-memory implementation buffers the whole stream and stable sorts it, so same-position calls keep their input order.
*/
use indexmap::IndexSet;
use log::debug;
use std::cmp::Ordering;

use crate::data_types::call::Call;
use crate::parsing::call_source::CallStream;

/// User-facing choice of contig order, resolved against the reference at run time
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, strum_macros::Display, clap::ValueEnum)]
pub enum ContigOrderMode {
    /// Plain string comparison of contig names
    #[default]
    #[strum(serialize = "lexicographic")]
    Lexicographic,
    /// The contig order of the reference index
    #[strum(serialize = "reference")]
    Reference
}

/// Total order over contig names
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ContigOrder {
    /// Contigs compare as strings
    #[default]
    Lexicographic,
    /// Contigs compare by their index in the set; unlisted contigs follow, lexicographically
    Explicit(IndexSet<String>)
}

impl ContigOrder {
    /// Builds an explicit order from a contig list, e.g. the reference order
    pub fn from_contigs<S: AsRef<str>>(contigs: &[S]) -> ContigOrder {
        ContigOrder::Explicit(contigs.iter().map(|c| c.as_ref().to_string()).collect())
    }

    /// Compares two contig names under this order
    pub fn compare_contigs(&self, a: &str, b: &str) -> Ordering {
        match self {
            ContigOrder::Lexicographic => a.cmp(b),
            ContigOrder::Explicit(order) => {
                match (order.get_index_of(a), order.get_index_of(b)) {
                    (Some(ia), Some(ib)) => ia.cmp(&ib),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => a.cmp(b)
                }
            }
        }
    }

    /// Compares two (contig, position) keys
    pub fn compare(&self, a: (&str, u64), b: (&str, u64)) -> Ordering {
        self.compare_contigs(a.0, b.0)
            .then(a.1.cmp(&b.1))
    }
}

/// Turns a possibly unordered call stream into an ordered list
pub trait CallOrderer {
    /// Drains `calls` and returns them in non-decreasing order.
    /// # Errors
    /// * the first error from the underlying stream, unchanged
    fn order(&self, calls: CallStream, contig_order: &ContigOrder) -> anyhow::Result<Vec<Call>>;
}

/// Buffers the full stream in memory, then stable sorts
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryOrderer;

impl CallOrderer for InMemoryOrderer {
    fn order(&self, calls: CallStream, contig_order: &ContigOrder) -> anyhow::Result<Vec<Call>> {
        let mut buffered: Vec<Call> = calls.collect::<anyhow::Result<_>>()?;
        if !buffered.is_sorted_by(|a, b| contig_order.compare(a.key(), b.key()).is_le()) {
            debug!("Sorting {} calls...", buffered.len());
            buffered.sort_by(|a, b| contig_order.compare(a.key(), b.key()));
        } else {
            debug!("Found {} sorted calls.", buffered.len());
        }
        Ok(buffered)
    }
}
