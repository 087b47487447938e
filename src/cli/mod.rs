/*!
# CLI module
Command line interface functionality that is specific to calldiff.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The diff CLI subcommand
pub mod diff;
