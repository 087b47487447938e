
use indicatif::{ProgressState, ProgressStyle};

/// Shared spinner styling for streams of unknown length
pub fn get_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {spinner:.cyan} {pos} positions compared; Speed: {per_sec} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .with_key("per_sec", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.0}/s", state.per_sec());
        })
}
