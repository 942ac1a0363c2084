//! Progress bar for archive commits.

use indicatif::{ProgressBar, ProgressStyle};
use zipsession::ProgressReporter;

/// Commit progress shown as a percentage bar
pub struct CommitProgress {
    bar: ProgressBar,
}

impl CommitProgress {
    /// Creates a new progress bar
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {wide_msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        };

        Self { bar }
    }

    /// Finishes and removes the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Leaves the bar with a message
    pub fn abandon(&self, msg: impl Into<String>) {
        self.bar.abandon_with_message(msg.into());
    }
}

impl ProgressReporter for CommitProgress {
    fn on_progress(&mut self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_entry_start(&mut self, name: &[u8]) {
        let name = String::from_utf8_lossy(name);
        // Truncate long names
        let display_name = if name.chars().count() > 40 {
            let tail: String = name.chars().rev().take(37).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            name.into_owned()
        };
        self.bar.set_message(display_name);
    }
}
