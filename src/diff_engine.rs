/*!
# Diff engine
Sorted merge-join of two ordered call streams.
One outcome is produced per distinct (contig, position) seen on either side, in ascending order.
Calls that share a position on one side are grouped and compared as a unit.
Outcomes are produced lazily, so a consumer can stop at any point without draining either input.
*/
use derive_builder::Builder;
use log::{debug, trace};
use std::cmp::Ordering;

use crate::data_types::call::Call;
use crate::data_types::diff_stats::DiffStats;
use crate::data_types::outcome::{AlignmentOutcome, Classification, Side};
use crate::equivalence::{Equivalence, EquivalenceMode};
use crate::orderer::ContigOrder;
use crate::parsing::call_source::CallStream;
use crate::parsing::reference::{ReferenceLookupError, ReferenceProvider};

#[derive(thiserror::Error, Debug)]
pub enum DiffError {
    #[error("{side} input is out of order: {contig}:{position} follows {previous_contig}:{previous_position}")]
    OutOfOrderInput {
        side: Side,
        previous_contig: String,
        previous_position: u64,
        contig: String,
        position: u64
    },
    #[error("reference lookup failed: {0}")]
    ReferenceLookup(#[from] ReferenceLookupError),
    #[error("error while reading {side} calls: {source:#}")]
    Source {
        side: Side,
        #[source]
        source: anyhow::Error
    }
}

/// Controls how positions are compared and when a run stops
#[derive(Builder, Clone, Debug, Default)]
#[builder(default)]
pub struct DiffConfig {
    /// The rule used to decide MATCH vs MISMATCH
    equivalence: EquivalenceMode,
    /// The contig order both inputs are sorted by
    contig_order: ContigOrder,
    /// If set, accumulation stops once this many non-MATCH positions were seen
    max_mismatches: Option<u64>
}

impl DiffConfig {
    // getters
    pub fn equivalence(&self) -> EquivalenceMode {
        self.equivalence
    }

    pub fn contig_order(&self) -> &ContigOrder {
        &self.contig_order
    }

    pub fn max_mismatches(&self) -> Option<u64> {
        self.max_mismatches
    }
}

/// Read head over one input, checking order as calls arrive
struct SideCursor {
    /// The side this cursor reads
    side: Side,
    /// The remaining input
    calls: CallStream,
    /// The next unconsumed call
    head: Option<Call>,
    /// Key of the most recently pulled call
    last_key: Option<(String, u64)>
}

impl SideCursor {
    fn new(side: Side, calls: CallStream) -> Self {
        Self {
            side,
            calls,
            head: None,
            last_key: None
        }
    }

    /// Pulls the next call into `head`, failing if it sorts before the previous call
    fn advance(&mut self, contig_order: &ContigOrder) -> Result<(), DiffError> {
        self.head = match self.calls.next() {
            None => None,
            Some(Err(source)) => return Err(DiffError::Source { side: self.side, source }),
            Some(Ok(call)) => {
                if let Some((previous_contig, previous_position)) = self.last_key.as_ref() {
                    if contig_order.compare((previous_contig.as_str(), *previous_position), call.key()).is_gt() {
                        return Err(DiffError::OutOfOrderInput {
                            side: self.side,
                            previous_contig: previous_contig.clone(),
                            previous_position: *previous_position,
                            contig: call.contig().to_string(),
                            position: call.position()
                        });
                    }
                }

                // only re-allocate the contig name when it changes
                match self.last_key.as_mut() {
                    Some((contig, position)) if contig.as_str() == call.contig() => {
                        *position = call.position();
                    },
                    _ => {
                        self.last_key = Some((call.contig().to_string(), call.position()));
                    }
                }
                Some(call)
            }
        };
        Ok(())
    }

    /// Takes the head and every following call at the same position
    fn take_group(&mut self, contig_order: &ContigOrder) -> Result<Vec<Call>, DiffError> {
        let mut group = vec![];
        if let Some(first) = self.head.take() {
            let (contig, position) = (first.contig().to_string(), first.position());
            group.push(first);
            self.advance(contig_order)?;

            while self.head.as_ref().is_some_and(|h| h.position() == position && h.contig() == contig) {
                if let Some(call) = self.head.take() {
                    group.push(call);
                }
                self.advance(contig_order)?;
            }
        }
        Ok(group)
    }
}

/// Lazy iterator over the alignment outcomes of two ordered call streams.
/// Single pass: after the first error, nothing further is produced.
pub struct CallDiff<'a> {
    /// Left input
    lhs: SideCursor,
    /// Right input
    rhs: SideCursor,
    /// Consulted whenever both sides have calls at a position
    reference: &'a mut dyn ReferenceProvider,
    /// The equivalence rule
    equivalence: Box<dyn Equivalence>,
    /// Order the inputs are expected to follow
    contig_order: ContigOrder,
    /// True once both heads have been primed
    started: bool,
    /// True once exhausted or failed
    done: bool
}

impl<'a> CallDiff<'a> {
    /// Creates the diff; no input is pulled until the first outcome is requested.
    /// # Arguments
    /// * `lhs` - left calls, must be non-decreasing under the configured contig order
    /// * `rhs` - right calls, must be non-decreasing under the configured contig order
    /// * `reference` - the reference provider
    /// * `config` - equivalence rule and contig order
    pub fn new(lhs: CallStream, rhs: CallStream, reference: &'a mut dyn ReferenceProvider, config: &DiffConfig) -> Self {
        Self {
            lhs: SideCursor::new(Side::Lhs, lhs),
            rhs: SideCursor::new(Side::Rhs, rhs),
            reference,
            equivalence: config.equivalence().build(),
            contig_order: config.contig_order().clone(),
            started: false,
            done: false
        }
    }

    fn next_outcome(&mut self) -> Result<Option<AlignmentOutcome>, DiffError> {
        if !self.started {
            self.lhs.advance(&self.contig_order)?;
            self.rhs.advance(&self.contig_order)?;
            self.started = true;
        }

        let ordering = match (self.lhs.head.as_ref(), self.rhs.head.as_ref()) {
            (None, None) => return Ok(None),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => self.contig_order.compare(l.key(), r.key())
        };

        let outcome = match ordering {
            Ordering::Less => AlignmentOutcome::one_sided(Side::Lhs, self.lhs.take_group(&self.contig_order)?),
            Ordering::Greater => AlignmentOutcome::one_sided(Side::Rhs, self.rhs.take_group(&self.contig_order)?),
            Ordering::Equal => {
                let lhs_group = self.lhs.take_group(&self.contig_order)?;
                let rhs_group = self.rhs.take_group(&self.contig_order)?;
                let is_match = self.equivalence.is_equivalent(&lhs_group, &rhs_group, &mut *self.reference)?;
                AlignmentOutcome::paired(lhs_group, rhs_group, is_match)
            }
        };
        trace!(
            "{}:{} {} lhs={:?} rhs={:?}",
            outcome.contig(), outcome.position(), outcome.classification().as_ref(),
            outcome.lhs_calls(), outcome.rhs_calls()
        );
        Ok(Some(outcome))
    }
}

impl Iterator for CallDiff<'_> {
    type Item = Result<AlignmentOutcome, DiffError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_outcome() {
            Ok(Some(outcome)) => Some(Ok(outcome)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Convenience wrapper that builds a `CallDiff`
/// # Arguments
/// * `lhs` - ordered left calls
/// * `rhs` - ordered right calls
/// * `reference` - the reference provider
/// * `config` - engine configuration
pub fn diff_calls<'a>(lhs: CallStream, rhs: CallStream, reference: &'a mut dyn ReferenceProvider, config: &DiffConfig) -> CallDiff<'a> {
    CallDiff::new(lhs, rhs, reference, config)
}

/// Folds outcomes into statistics, each outcome exactly once and in order.
/// # Arguments
/// * `outcomes` - the outcome sequence, typically a `CallDiff`
/// * `max_mismatches` - if set, stop pulling outcomes once this many non-MATCH positions were counted;
///   the stats are marked truncated only if the sequence had more outcomes left
/// # Errors
/// * the first error in the outcome sequence; no partial stats are returned
pub fn accumulate_stats<I>(outcomes: I, max_mismatches: Option<u64>) -> Result<DiffStats, DiffError>
where
    I: IntoIterator<Item = Result<AlignmentOutcome, DiffError>>
{
    let mut stats = DiffStats::default();
    let mut outcomes = outcomes.into_iter().peekable();
    while let Some(outcome) = outcomes.next() {
        stats.add_outcome(&outcome?);

        if let Some(max) = max_mismatches {
            let non_matching = stats.counts().total() - stats.count(Classification::Match);
            if non_matching >= max {
                if outcomes.peek().is_some() {
                    debug!("Reached {max} non-matching positions, stopping early.");
                    stats.set_truncated();
                }
                break;
            }
        }
    }
    Ok(stats)
}
