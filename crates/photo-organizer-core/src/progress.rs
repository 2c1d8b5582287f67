use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;

use crate::types::RunSummary;

static CONSOLE: OnceLock<MultiProgress> = OnceLock::new();

/// Terminal shared by visible progress bars and log output
pub fn console() -> &'static MultiProgress {
    CONSOLE.get_or_init(MultiProgress::new)
}

/// Stderr writer that clears visible bars while a line is written
///
/// Used as the log target so records never tear through a drawn bar.
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        console().suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        console().suspend(|| io::stderr().flush())
    }
}

/// Progress bar for an organize run
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Create a tracker for `total` files; hidden when `visible` is false
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = if visible {
            console().add(ProgressBar::new(total as u64))
        } else {
            ProgressBar::new(total as u64)
        };
        if visible {
            let style = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");
            bar.set_style(style);
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_message("Scanning...");

        Self { bar }
    }

    /// Reflect the running counters
    pub fn update(&self, summary: &RunSummary) {
        self.bar.set_position(summary.total_files as u64);
        if summary.total_files as u64 > self.bar.length().unwrap_or(0) {
            self.bar.set_length(summary.total_files as u64);
        }
        self.bar.set_message(format!(
            "{} uniques, {} dupes, {} errors",
            summary.uniques_found, summary.dupes_found, summary.errors
        ));
    }

    pub fn finish(&self, summary: &RunSummary) {
        self.bar.finish_with_message(format!("Done: {}", summary));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_follows_counters() {
        let tracker = ProgressTracker::new(2, false);
        let summary = RunSummary {
            total_files: 3,
            uniques_found: 2,
            dupes_found: 1,
            ..Default::default()
        };
        tracker.update(&summary);
        assert_eq!(tracker.position(), 3);
        tracker.finish(&summary);
    }

    #[test]
    fn test_console_writer_passes_bytes_through() {
        let mut writer = ConsoleWriter;
        assert_eq!(writer.write(b"").unwrap(), 0);
        writer.flush().unwrap();
    }
}
