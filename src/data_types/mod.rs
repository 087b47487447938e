
/// Contains the call definition and variant type inference
pub mod call;
/// Accumulated statistics for a full diff run
pub mod diff_stats;
/// Alignment outcomes produced by the diff engine
pub mod outcome;
/// Contains tracker for TP, FP, FN and derived metrics
pub mod summary_metrics;
