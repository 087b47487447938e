/*!
# Writers module
Contains the logic for rendering diff statistics, on stdout and to summary files.
*/
/// Human-readable report printed at the end of a run
pub mod report;
/// Generates the summary table file
pub mod summary;
