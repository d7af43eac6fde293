//! Run-wide parameters shared by the pipeline.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::mutation::{MutationCategory, MutationHooks};

/// Default test command.
pub const DEFAULT_RUNNER: &str = "python -m pytest -x --assert=plain";

/// Line numbers (1-indexed) eligible for mutation, per file.
pub type CoveredLines = HashMap<PathBuf, HashSet<usize>>;

/// Parameters of one mutation testing run.
///
/// Shared read-only by all workers; each mutant context holds its own clone,
/// which a hook may modify for that mutant only.
#[derive(Clone)]
pub struct RunConfig {
    /// Test command for the current mutant.
    pub test_command: String,
    /// Test command configured for the run.
    pub default_test_command: String,
    /// Don't forward test output.
    pub swallow_output: bool,
    /// Duration of the unmutated test suite.
    pub baseline_time_elapsed: Duration,
    pub test_time_multiplier: f64,
    /// Seconds added to the suspicious threshold.
    pub test_time_base: f64,
    /// Timeout as a multiple of the baseline.
    pub timeout_factor: f64,
    /// Fixed timeout, overriding `timeout_factor`.
    pub timeout: Option<Duration>,
    /// Rerun survivors with the default command when a hook changed it.
    pub rerun_all: bool,
    /// Shell command run before each mutant.
    pub pre_mutation: Option<String>,
    /// Shell command run after each mutant.
    pub post_mutation: Option<String>,
    pub paths_to_mutate: Vec<PathBuf>,
    pub mutation_types_to_apply: HashSet<MutationCategory>,
    /// Coverage or patch filter; `None` means every line is eligible.
    pub covered_lines_by_filename: Option<Arc<CoveredLines>>,
    /// Extra callee names treated like `dict(...)`.
    pub dict_synonyms: Vec<String>,
    /// Fingerprint of the test sources.
    pub hash_of_tests: String,
    /// Number of mutants in the run.
    pub total: usize,
    /// Collapse the exit code to fatal/non-fatal.
    pub ci: bool,
    pub no_progress: bool,
    pub simple_output: bool,
    pub max_workers: usize,
    /// Items a checker generation processes before it is replaced.
    pub cycle_after: usize,
    pub hooks: Option<Arc<dyn MutationHooks>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_command: DEFAULT_RUNNER.to_string(),
            default_test_command: DEFAULT_RUNNER.to_string(),
            swallow_output: true,
            baseline_time_elapsed: Duration::ZERO,
            test_time_multiplier: 2.0,
            test_time_base: 0.0,
            timeout_factor: 10.0,
            timeout: None,
            rerun_all: false,
            pre_mutation: None,
            post_mutation: None,
            paths_to_mutate: Vec::new(),
            mutation_types_to_apply: MutationCategory::ALL.into_iter().collect(),
            covered_lines_by_filename: None,
            dict_synonyms: Vec::new(),
            hash_of_tests: String::new(),
            total: 0,
            ci: false,
            no_progress: false,
            simple_output: false,
            max_workers: 2,
            cycle_after: 100,
            hooks: None,
        }
    }
}

impl RunConfig {
    /// Use `command` as both the current and the default test command.
    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        self.default_test_command = command.clone();
        self.test_command = command;
        self
    }

    /// Deadline for one test run; `None` until a baseline has been measured.
    pub fn test_timeout(&self) -> Option<Duration> {
        self.timeout.or_else(|| {
            (!self.baseline_time_elapsed.is_zero())
                .then(|| self.baseline_time_elapsed.mul_f64(self.timeout_factor))
        })
    }

    /// Survivors slower than this are reported as suspicious.
    pub fn suspicious_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.test_time_base.max(0.0))
            + self.baseline_time_elapsed.mul_f64(self.test_time_multiplier)
    }

    /// Whether a hook swapped in a different test command.
    pub fn uses_custom_test_command(&self) -> bool {
        self.test_command != self.default_test_command
    }

    pub fn reset_test_command(&mut self) {
        self.test_command.clone_from(&self.default_test_command);
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("test_command", &self.test_command)
            .field("default_test_command", &self.default_test_command)
            .field("baseline_time_elapsed", &self.baseline_time_elapsed)
            .field("hash_of_tests", &self.hash_of_tests)
            .field("total", &self.total)
            .field("max_workers", &self.max_workers)
            .field("hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}
