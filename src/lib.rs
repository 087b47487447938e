
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Core merge-join that aligns two ordered call streams
pub mod diff_engine;
/// Rules for deciding if two groups of calls are the same
pub mod equivalence;
/// Contig ordering and the in-memory call orderer
pub mod orderer;
/// Tooling for turning input files and services into calls and reference bases
pub mod parsing;
/// Wires sources, ordering, the engine, and statistics into a full run
pub mod pipeline;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
