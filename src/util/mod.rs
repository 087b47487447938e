
/// Helper functions for writing JSON via serde, optionally gzipped
pub mod json_io;
/// Helper functions for generating the progress displays
pub mod progress_bar;
