//! Evaluation of a single mutant.
//!
//! Applies the mutant to disk, runs the tests against it, classifies the
//! outcome and always puts the original file back.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::core::{Error, Result};

use super::context::MutationContext;
use super::mutant::MutationStatus;
use super::runner::{run_hook_command, TestRunner};
use super::safety::{FileLocks, MutationGuard};
use super::walker;

/// Everything a checker needs to evaluate mutants.
///
/// Cheap to clone; clones share the cache, the runner and the file locks.
#[derive(Clone)]
pub struct Evaluator {
    cache: Arc<dyn ResultCache>,
    runner: Arc<dyn TestRunner>,
    locks: Arc<FileLocks>,
}

impl Evaluator {
    pub fn new(cache: Arc<dyn ResultCache>, runner: Arc<dyn TestRunner>) -> Self {
        Self {
            cache,
            runner,
            locks: Arc::new(FileLocks::new()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    pub fn runner(&self) -> &Arc<dyn TestRunner> {
        &self.runner
    }

    /// Evaluate the mutant `ctx` targets.
    ///
    /// Test output and hook command output go to `output` unless the run
    /// swallows output. Timeouts and hook skips come back as statuses; any
    /// other error is returned after the target file has been restored.
    pub fn evaluate(
        &self,
        ctx: &mut MutationContext,
        output: &mut dyn FnMut(&str),
    ) -> Result<MutationStatus> {
        let filename = ctx
            .filename
            .clone()
            .ok_or_else(|| Error::InvalidArgument("mutant has no file name".to_string()))?;
        let address = ctx
            .target
            .address()
            .cloned()
            .ok_or_else(|| Error::InvalidArgument("can only evaluate a single mutant".to_string()))?;

        // A lone targeted mutant is always re-run.
        if ctx.config.total != 1 {
            if let Some(status) = self.cache.get(&filename, &address, &ctx.config.hash_of_tests)? {
                return Ok(status);
            }
        }

        ctx.current_line_index = address.line_number;
        if let Some(hooks) = ctx.config.hooks.clone() {
            match hooks.pre_mutation(ctx) {
                Ok(()) => {}
                Err(Error::Skip) => return Ok(MutationStatus::Skipped),
                Err(err) => return Err(err),
            }
            if ctx.skip {
                return Ok(MutationStatus::Skipped);
            }
        }

        if let Some(command) = ctx.config.pre_mutation.clone() {
            self.run_hook(&command, ctx.config.swallow_output, output)?;
        }

        let (mutated, count) = walker::mutate(ctx)?;
        if count != 1 {
            ctx.config.reset_test_command();
            return Err(Error::internal(format!(
                "expected exactly one mutation at {}:{}, found {count}",
                filename.display(),
                address
            )));
        }

        let status = {
            let lock = self.locks.get(&filename);
            let _held = lock.lock();
            let mut guard = MutationGuard::new(&filename)?;
            let result = guard
                .apply(mutated.as_bytes())
                .and_then(|()| self.run_tests(ctx, &filename, output));
            let restored = guard.restore();
            ctx.config.reset_test_command();
            let status = result?;
            restored?;
            status
        };
        debug!(file = %filename.display(), mutant = %address, %status, "evaluated mutant");

        if let Some(command) = ctx.config.post_mutation.clone() {
            self.run_hook(&command, ctx.config.swallow_output, output)?;
        }

        Ok(status)
    }

    fn run_tests(
        &self,
        ctx: &mut MutationContext,
        filename: &Path,
        output: &mut dyn FnMut(&str),
    ) -> Result<MutationStatus> {
        let swallow = ctx.config.swallow_output;
        let timeout = ctx.config.test_timeout();
        let mut on_line = |line: &str| {
            if !swallow {
                output(line);
            }
        };

        let start = Instant::now();
        let mut survived = match self.runner.run(&ctx.config.test_command, timeout, &mut on_line) {
            Ok(outcome) => outcome.passed(),
            Err(Error::Timeout { .. }) => return Ok(MutationStatus::Timeout),
            Err(err) => return Err(err),
        };

        if survived && ctx.config.rerun_all && ctx.config.uses_custom_test_command() {
            debug!(file = %filename.display(), "rerunning survivor with the default test command");
            ctx.config.reset_test_command();
            survived = match self.runner.run(&ctx.config.test_command, timeout, &mut on_line) {
                Ok(outcome) => outcome.passed(),
                Err(Error::Timeout { .. }) => return Ok(MutationStatus::Timeout),
                Err(err) => return Err(err),
            };
        }

        let elapsed = start.elapsed();
        Ok(if !survived {
            MutationStatus::Killed
        } else if elapsed > ctx.config.suspicious_threshold() {
            MutationStatus::Suspicious
        } else {
            MutationStatus::Survived
        })
    }

    fn run_hook(&self, command: &str, swallow: bool, output: &mut dyn FnMut(&str)) -> Result<()> {
        let text = run_hook_command(command)?;
        if swallow || text.trim().is_empty() {
            return Ok(());
        }
        for line in text.lines() {
            output(line);
        }
        Ok(())
    }
}

/// Run the unmodified test suite once and time it.
///
/// Anything but a clean exit is [`Error::BaselineFailed`]; the captured
/// output is replayed to `output` in that case.
pub fn time_test_suite(
    runner: &dyn TestRunner,
    command: &str,
    swallow_output: bool,
    output: &mut dyn FnMut(&str),
) -> Result<std::time::Duration> {
    let mut captured = Vec::new();
    let start = Instant::now();
    let outcome = runner.run(command, None, &mut |line| {
        if swallow_output {
            captured.push(line.to_string());
        } else {
            output(line);
        }
    })?;
    let elapsed = start.elapsed();

    // pytest-testmon exits with 5 when it deselects every test.
    let clean = outcome.code == Some(0) || (command.contains("--testmon") && outcome.code == Some(5));
    if !clean {
        for line in &captured {
            output(line);
        }
        warn!(command, code = ?outcome.code, "baseline test run failed");
        return Err(Error::BaselineFailed {
            command: command.to_string(),
        });
    }
    Ok(elapsed)
}
