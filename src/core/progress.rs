//! Progress reporting for mutation runs using indicatif.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::mutation::MutationStatus;

/// Style templates for the progress bars.
pub mod styles {
    use super::*;

    /// Mutant progress: position, total and the per-status legend.
    pub fn mutant_progress() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {pos}/{len}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    /// Spinner style for indeterminate operations.
    pub fn spinner() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

/// Statuses shown in the legend, in display order.
const LEGEND: [MutationStatus; 5] = [
    MutationStatus::Killed,
    MutationStatus::Timeout,
    MutationStatus::Suspicious,
    MutationStatus::Survived,
    MutationStatus::Skipped,
];

fn emoji(status: MutationStatus) -> &'static str {
    match status {
        MutationStatus::Killed => "🎉",
        MutationStatus::Timeout => "⏰",
        MutationStatus::Suspicious => "🤔",
        MutationStatus::Survived => "🙁",
        MutationStatus::Skipped => "🔇",
        MutationStatus::Untested => "",
    }
}

/// Thread-safe tally of mutant outcomes.
#[derive(Clone)]
pub struct Progress {
    total: usize,
    counts: Arc<[AtomicUsize; 6]>,
    bar: ProgressBar,
    simple_output: bool,
}

impl Progress {
    /// Create a tracker for `total` mutants.
    ///
    /// The bar is only drawn when `show` is set and stderr is a terminal.
    pub fn new(total: usize, show: bool, simple_output: bool) -> Self {
        let bar = if show && is_tty() {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(styles::mutant_progress());
            bar
        } else {
            let bar = ProgressBar::hidden();
            bar.set_length(total as u64);
            bar
        };
        let progress = Self {
            total,
            counts: Arc::new(Default::default()),
            bar,
            simple_output,
        };
        progress.bar.set_message(progress.legend());
        progress
    }

    /// Create a tracker that never draws.
    pub fn hidden(total: usize) -> Self {
        Self::new(total, false, false)
    }

    fn slot(status: MutationStatus) -> usize {
        MutationStatus::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or_default()
    }

    /// Record one mutant outcome.
    pub fn register(&self, status: MutationStatus) {
        self.counts[Self::slot(status)].fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
        self.bar.set_message(self.legend());
    }

    /// Number of mutants recorded with `status`.
    pub fn count(&self, status: MutationStatus) -> usize {
        self.counts[Self::slot(status)].load(Ordering::Relaxed)
    }

    /// Number of mutants recorded so far.
    pub fn progress(&self) -> usize {
        MutationStatus::ALL.iter().map(|&s| self.count(s)).sum()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Snapshot of all counts.
    pub fn counts(&self) -> HashMap<MutationStatus, usize> {
        MutationStatus::ALL
            .iter()
            .map(|&status| (status, self.count(status)))
            .collect()
    }

    /// Legend line such as `🎉 3  ⏰ 0  🤔 0  🙁 7  🔇 0`.
    pub fn legend(&self) -> String {
        LEGEND
            .iter()
            .map(|&status| {
                let label = if self.simple_output {
                    status.as_str().to_uppercase()
                } else {
                    emoji(status).to_string()
                };
                format!("{label} {}", self.count(status))
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    /// Full status line: `progress/total  legend`.
    pub fn status_line(&self) -> String {
        format!("{}/{}  {}", self.progress(), self.total, self.legend())
    }

    /// Print a line above the bar without garbling it.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.bar.is_hidden() {
            eprintln!("{}", line.as_ref());
        } else {
            self.bar.println(line.as_ref());
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Check if stderr is a TTY (for deciding whether to show progress bars).
pub fn is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Create a spinner for indeterminate operations.
pub fn create_spinner(message: &str) -> ProgressBar {
    if is_tty() {
        let bar = ProgressBar::new_spinner();
        bar.set_style(styles::spinner());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}
