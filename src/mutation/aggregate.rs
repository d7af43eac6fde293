//! Run totals and the process exit code.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mutant::MutationStatus;

/// Exit code bit: the run ended with a fatal error.
pub const EXIT_FATAL: i32 = 1;
/// Exit code bit: at least one mutant survived.
pub const EXIT_SURVIVED: i32 = 2;
/// Exit code bit: at least one mutant timed out.
pub const EXIT_TIMEOUT: i32 = 4;
/// Exit code bit: at least one mutant was suspicious.
pub const EXIT_SUSPICIOUS: i32 = 8;

/// Per-status totals of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timeout: usize,
    pub suspicious: usize,
    pub skipped: usize,
    pub untested: usize,
    /// Mutants whose status came from the cache.
    pub cached: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: MutationStatus) {
        match status {
            MutationStatus::Killed => self.killed += 1,
            MutationStatus::Survived => self.survived += 1,
            MutationStatus::Timeout => self.timeout += 1,
            MutationStatus::Suspicious => self.suspicious += 1,
            MutationStatus::Skipped => self.skipped += 1,
            MutationStatus::Untested => self.untested += 1,
        }
    }

    pub fn count(&self, status: MutationStatus) -> usize {
        match status {
            MutationStatus::Killed => self.killed,
            MutationStatus::Survived => self.survived,
            MutationStatus::Timeout => self.timeout,
            MutationStatus::Suspicious => self.suspicious,
            MutationStatus::Skipped => self.skipped,
            MutationStatus::Untested => self.untested,
        }
    }

    /// Share of evaluated, non-skipped mutants that were killed.
    pub fn mutation_score(&self) -> f64 {
        let judged = self.killed + self.survived + self.timeout + self.suspicious;
        if judged == 0 {
            return 0.0;
        }
        self.killed as f64 / judged as f64
    }

    /// Bit-or of the outcome flags.
    pub fn exit_code(&self) -> i32 {
        let mut code = 0;
        if self.survived > 0 {
            code |= EXIT_SURVIVED;
        }
        if self.timeout > 0 {
            code |= EXIT_TIMEOUT;
        }
        if self.suspicious > 0 {
            code |= EXIT_SUSPICIOUS;
        }
        code
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mutants: {} killed, {} survived, {} timeout, {} suspicious, {} skipped",
            self.total, self.killed, self.survived, self.timeout, self.suspicious, self.skipped
        )
    }
}

/// Final exit code of a run.
///
/// `summary` is `None` when a fatal error ended the run before totals were
/// known. In CI mode only the fatal bit is reported.
pub fn exit_code(summary: Option<&RunSummary>, fatal: bool, ci: bool) -> i32 {
    let fatal_bit = if fatal { EXIT_FATAL } else { 0 };
    if ci {
        return fatal_bit;
    }
    fatal_bit | summary.map(RunSummary::exit_code).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(killed: usize, survived: usize, timeout: usize, suspicious: usize) -> RunSummary {
        RunSummary {
            total: killed + survived + timeout + suspicious,
            killed,
            survived,
            timeout,
            suspicious,
            ..RunSummary::default()
        }
    }

    #[test]
    fn test_all_killed_exits_cleanly() {
        assert_eq!(exit_code(Some(&summary(5, 0, 0, 0)), false, false), 0);
    }

    #[test]
    fn test_exit_bits() {
        assert_eq!(exit_code(Some(&summary(3, 7, 0, 0)), false, false), 2);
        assert_eq!(exit_code(Some(&summary(0, 0, 1, 0)), false, false), 4);
        assert_eq!(exit_code(Some(&summary(0, 0, 0, 1)), false, false), 8);
        assert_eq!(exit_code(Some(&summary(1, 1, 1, 1)), true, false), 15);
        assert_eq!(exit_code(None, true, false), 1);
    }

    #[test]
    fn test_ci_mode_only_reports_fatal() {
        assert_eq!(exit_code(Some(&summary(0, 4, 2, 1)), false, true), 0);
        assert_eq!(exit_code(Some(&summary(0, 4, 2, 1)), true, true), 1);
    }

    #[test]
    fn test_record_and_score() {
        let mut totals = RunSummary {
            total: 4,
            ..RunSummary::default()
        };
        totals.record(MutationStatus::Killed);
        totals.record(MutationStatus::Killed);
        totals.record(MutationStatus::Survived);
        totals.record(MutationStatus::Skipped);
        assert_eq!(totals.count(MutationStatus::Killed), 2);
        assert!((totals.mutation_score() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(RunSummary::default().mutation_score(), 0.0);
    }

    #[test]
    fn test_summary_line() {
        let mut totals = RunSummary {
            total: 3,
            ..RunSummary::default()
        };
        totals.record(MutationStatus::Killed);
        totals.record(MutationStatus::Killed);
        totals.record(MutationStatus::Timeout);
        assert_eq!(totals.exit_code(), EXIT_TIMEOUT);
        assert_eq!(
            totals.to_string(),
            "3 mutants: 2 killed, 0 survived, 1 timeout, 0 suspicious, 0 skipped"
        );
    }
}
