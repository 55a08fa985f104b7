//! Terminal progress for batch conversions.

use doc_converter_core::{BatchProgress, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Renders batch progress with an indicatif bar sized on the first update.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Discovering files...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn activate(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.green/238}] {pos:>4}/{len} files  {elapsed_precise}  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
    }

    /// Handle for clearing the bar once the batch returns.
    pub fn handle(&self) -> ProgressBar {
        self.bar.clone()
    }
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, progress: &BatchProgress) -> anyhow::Result<()> {
        if self.bar.length() != Some(progress.total as u64) {
            self.activate(progress.total);
        }
        self.bar.set_position(progress.completed as u64);
        self.bar.set_message(progress.file_name.clone());
        Ok(())
    }
}
