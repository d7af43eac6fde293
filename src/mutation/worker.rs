//! The mutant pipeline: a feeder, cycling checker generations and a
//! coordinator, connected by bounded channels.
//!
//! The feeder walks the planned mutants file by file, answers what it can
//! from the cache and queues the rest. Checkers evaluate queued mutants; a
//! generation of checkers retires after `cycle_after` items and the
//! coordinator starts a fresh one. The coordinator owns both channels and
//! every thread, records each status as it arrives and joins everything
//! before returning.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::core::{Error, Progress, Result};

use super::aggregate::{exit_code, RunSummary};
use super::context::MutationContext;
use super::executor::Evaluator;
use super::mutant::{MutantAddress, MutationStatus, Target};

/// Capacity of the mutants and results channels.
pub const CHANNEL_CAPACITY: usize = 100;

/// The mutants planned for one file.
#[derive(Debug, Clone)]
pub struct FileMutants {
    pub filename: PathBuf,
    pub addresses: Vec<MutantAddress>,
}

impl FileMutants {
    pub fn new(filename: impl Into<PathBuf>, addresses: Vec<MutantAddress>) -> Self {
        Self {
            filename: filename.into(),
            addresses,
        }
    }
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Totals of every status recorded before the run ended.
    pub summary: RunSummary,
    /// The error that aborted the run, if any.
    pub fatal: Option<Error>,
}

impl RunReport {
    /// The totals, or the aborting error.
    pub fn into_result(self) -> Result<RunSummary> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(self.summary),
        }
    }

    /// Process exit code: the outcome bits recorded so far, plus the fatal
    /// bit when the run was aborted.
    pub fn exit_code(&self, ci: bool) -> i32 {
        exit_code(Some(&self.summary), self.fatal.is_some(), ci)
    }
}

/// Items on the mutants channel.
enum Work {
    Mutant(Box<MutationContext>),
    End,
}

/// Items on the results channel.
enum Message {
    /// A line of test or hook output.
    Output(String),
    Status {
        filename: PathBuf,
        address: MutantAddress,
        status: MutationStatus,
        cached: bool,
    },
    /// A checker retired because its generation reached its quota.
    Cycle,
    /// A checker saw the end of work.
    Finished,
    /// The feeder has queued everything.
    FeederDone,
    Fatal(Error),
    /// A checker thread died without finishing its loop.
    Died(Error),
}

/// Runs every planned mutant and tallies the outcomes.
pub struct Pipeline {
    evaluator: Evaluator,
    config: RunConfig,
    progress: Progress,
}

impl Pipeline {
    pub fn new(evaluator: Evaluator, config: RunConfig, progress: Progress) -> Self {
        Self {
            evaluator,
            config,
            progress,
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Evaluate all mutants of `files`.
    ///
    /// The report carries the totals recorded so far even when a fatal
    /// error aborted the run; the error is the first one seen, taken once
    /// all threads have stopped.
    pub fn run(&self, files: Vec<FileMutants>) -> RunReport {
        let total: usize = files.iter().map(|f| f.addresses.len()).sum();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        let fatal = self.drive(files, &mut summary).err();
        match &fatal {
            Some(err) => warn!(error = %err, %summary, "mutation pipeline aborted"),
            None => info!(%summary, "mutation pipeline finished"),
        }
        RunReport { summary, fatal }
    }

    fn drive(&self, files: Vec<FileMutants>, summary: &mut RunSummary) -> Result<()> {
        let total = summary.total;
        let workers = self.config.max_workers.max(1);
        let cycle_after = self.config.cycle_after.max(1);
        info!(total, workers, cycle_after, "starting mutation pipeline");

        let (work_tx, work_rx) = sync_channel::<Work>(CHANNEL_CAPACITY);
        let (results_tx, results_rx) = sync_channel::<Message>(CHANNEL_CAPACITY);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let abort = Arc::new(AtomicBool::new(false));

        let feeder = {
            let config = self.config.clone();
            let cache = Arc::clone(self.evaluator.cache());
            let results = results_tx.clone();
            let abort = Arc::clone(&abort);
            thread::Builder::new()
                .name("mutiny-feeder".to_string())
                .spawn(move || feed(files, config, cache.as_ref(), work_tx, results, &abort))?
        };

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut generation = 0;
        let mut live = self.spawn_generation(
            generation,
            workers,
            cycle_after,
            &work_rx,
            &results_tx,
            &abort,
            &mut handles,
        )?;

        let mut fatal: Option<Error> = None;
        let mut ended = false;
        let mut feeder_done = false;

        while live > 0 || !ended || !feeder_done {
            let Ok(message) = results_rx.recv() else {
                break;
            };
            match message {
                Message::Output(line) => self.progress.println(line),
                Message::Status {
                    filename,
                    address,
                    status,
                    cached,
                } => {
                    self.progress.register(status);
                    summary.record(status);
                    if cached {
                        summary.cached += 1;
                    } else if let Err(err) = self.evaluator.cache().put(
                        &filename,
                        &address,
                        &self.config.hash_of_tests,
                        status,
                    ) {
                        abort.store(true, Ordering::SeqCst);
                        fatal.get_or_insert(err);
                    }
                }
                Message::Cycle => {
                    live -= 1;
                    if live == 0 && !ended {
                        generation += 1;
                        debug!(generation, "cycling checker pool");
                        live = self.spawn_generation(
                            generation,
                            workers,
                            cycle_after,
                            &work_rx,
                            &results_tx,
                            &abort,
                            &mut handles,
                        )?;
                    }
                }
                Message::Finished => {
                    live -= 1;
                    ended = true;
                }
                Message::FeederDone => feeder_done = true,
                Message::Died(err) => {
                    abort.store(true, Ordering::SeqCst);
                    fatal.get_or_insert(err);
                    live -= 1;
                    if live == 0 && !ended {
                        generation += 1;
                        live = self.spawn_generation(
                            generation,
                            workers,
                            cycle_after,
                            &work_rx,
                            &results_tx,
                            &abort,
                            &mut handles,
                        )?;
                    }
                }
                Message::Fatal(err) => {
                    warn!(error = %err, "aborting mutation run");
                    abort.store(true, Ordering::SeqCst);
                    fatal.get_or_insert(err);
                }
            }
        }
        drop(results_tx);

        if feeder.join().is_err() {
            fatal.get_or_insert(Error::internal("feeder thread panicked"));
        }
        for handle in handles {
            if handle.join().is_err() {
                fatal.get_or_insert(Error::internal("checker thread panicked"));
            }
        }
        self.progress.finish();

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_generation(
        &self,
        generation: usize,
        workers: usize,
        cycle_after: usize,
        work_rx: &Arc<Mutex<Receiver<Work>>>,
        results: &SyncSender<Message>,
        abort: &Arc<AtomicBool>,
        handles: &mut Vec<JoinHandle<()>>,
    ) -> Result<usize> {
        let claimed = Arc::new(AtomicUsize::new(0));
        for index in 0..workers {
            let checker = Checker {
                evaluator: self.evaluator.clone(),
                work: Arc::clone(work_rx),
                claimed: Arc::clone(&claimed),
                cycle_after,
                abort: Arc::clone(abort),
            };
            let notice = ExitNotice::new(results.clone());
            let handle = thread::Builder::new()
                .name(format!("mutiny-checker-{generation}-{index}"))
                .spawn(move || checker.run(notice))?;
            handles.push(handle);
        }
        Ok(workers)
    }
}

/// Sends the end-of-work sentinel when dropped, so checkers terminate even
/// if the feeder fails or panics.
struct EndOfWork {
    work: SyncSender<Work>,
    results: SyncSender<Message>,
}

impl Drop for EndOfWork {
    fn drop(&mut self) {
        let _ = self.work.send(Work::End);
        let _ = self.results.send(Message::FeederDone);
    }
}

fn feed(
    files: Vec<FileMutants>,
    config: RunConfig,
    cache: &dyn crate::cache::ResultCache,
    work: SyncSender<Work>,
    results: SyncSender<Message>,
    abort: &AtomicBool,
) {
    let end = EndOfWork {
        work: work.clone(),
        results: results.clone(),
    };
    if let Err(err) = feed_files(files, &config, cache, &work, &results, abort) {
        let _ = results.send(Message::Fatal(err));
    }
    drop(work);
    drop(end);
}

fn feed_files(
    files: Vec<FileMutants>,
    config: &RunConfig,
    cache: &dyn crate::cache::ResultCache,
    work: &SyncSender<Work>,
    results: &SyncSender<Message>,
    abort: &AtomicBool,
) -> Result<()> {
    let mut position = 0;
    for file in files {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let source = std::fs::read_to_string(&file.filename)?;
        for address in file.addresses {
            if abort.load(Ordering::SeqCst) {
                return Ok(());
            }
            position += 1;
            // A single requested mutant is always re-evaluated.
            let cached = if config.total == 1 {
                None
            } else {
                cache.get(&file.filename, &address, &config.hash_of_tests)?
            };
            if let Some(status) = cached {
                let message = Message::Status {
                    filename: file.filename.clone(),
                    address,
                    status,
                    cached: true,
                };
                if results.send(message).is_err() {
                    return Ok(());
                }
                continue;
            }

            let ctx = MutationContext::new(source.clone(), Target::One(address), config.clone())
                .with_filename(&file.filename)
                .with_position(position);
            if work.send(Work::Mutant(Box::new(ctx))).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Sends a checker's exit message when dropped. Unless the checker set a
/// reason, it died unexpectedly.
struct ExitNotice {
    results: SyncSender<Message>,
    reason: Option<Message>,
}

impl ExitNotice {
    fn new(results: SyncSender<Message>) -> Self {
        Self {
            results,
            reason: None,
        }
    }

    fn send(&self, message: Message) -> bool {
        self.results.send(message).is_ok()
    }
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let message = self
            .reason
            .take()
            .unwrap_or_else(|| Message::Died(Error::internal("checker thread died")));
        let _ = self.results.send(message);
    }
}

struct Checker {
    evaluator: Evaluator,
    work: Arc<Mutex<Receiver<Work>>>,
    /// Items taken by this checker's generation.
    claimed: Arc<AtomicUsize>,
    cycle_after: usize,
    abort: Arc<AtomicBool>,
}

impl Checker {
    fn run(self, mut notice: ExitNotice) {
        loop {
            if self.claimed.fetch_add(1, Ordering::SeqCst) >= self.cycle_after {
                notice.reason = Some(Message::Cycle);
                return;
            }

            let item = self.work.lock().recv();
            let mut ctx = match item {
                Ok(Work::Mutant(ctx)) => ctx,
                Ok(Work::End) | Err(_) => {
                    notice.reason = Some(Message::Finished);
                    return;
                }
            };
            if self.abort.load(Ordering::SeqCst) {
                continue;
            }

            let filename = ctx.filename.clone().unwrap_or_default();
            let address = ctx.target.address().cloned();
            let message = {
                let results = &notice.results;
                let mut output = |line: &str| {
                    let _ = results.send(Message::Output(line.to_string()));
                };
                match (self.evaluator.evaluate(&mut ctx, &mut output), address) {
                    (Ok(status), Some(address)) => Message::Status {
                        filename,
                        address,
                        status,
                        cached: false,
                    },
                    (Ok(_), None) => Message::Fatal(Error::internal("evaluated a mutant without an address")),
                    (Err(err), _) => Message::Fatal(err),
                }
            };
            if !notice.send(message) {
                notice.reason = Some(Message::Finished);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::cache::{MemoryCache, ResultCache};
    use crate::mutation::aggregate::exit_code;
    use crate::mutation::runner::{InProcessRunner, TestOutcome, TestRunner};
    use crate::mutation::walker::list_mutations;

    /// Ten single-mutant files; mutants in the first three are killed.
    fn project(dir: &std::path::Path) -> Vec<FileMutants> {
        (0..10)
            .map(|i| {
                let filename = dir.join(format!("mod{i}.py"));
                let name = if i < 3 { "kill" } else { "keep" };
                let source = format!("def {name}_{i}(a, b):\n    return a + b\n");
                fs::write(&filename, &source).unwrap();
                let mut ctx = MutationContext::new(source, Target::All, RunConfig::default())
                    .with_filename(&filename);
                FileMutants::new(&filename, list_mutations(&mut ctx).unwrap())
            })
            .collect()
    }

    /// Fails when any `kill_` function in `dir` has been mutated.
    fn runner_for(dir: PathBuf, calls: Arc<AtomicUsize>) -> InProcessRunner {
        InProcessRunner::new("fake-pytest", move |_, out: &mut dyn Write| {
            calls.fetch_add(1, Ordering::SeqCst);
            let killed = fs::read_dir(&dir).unwrap().flatten().any(|entry| {
                let text = fs::read_to_string(entry.path()).unwrap_or_default();
                text.starts_with("def kill_") && text.contains(" - ")
            });
            let _ = writeln!(out, "collected 1 item");
            if killed { 1 } else { 0 }
        })
    }

    fn config(max_workers: usize, hash: &str) -> RunConfig {
        RunConfig {
            max_workers,
            hash_of_tests: hash.to_string(),
            test_time_base: 60.0,
            ..RunConfig::default().with_test_command("fake-pytest -x")
        }
    }

    fn snapshot(dir: &std::path::Path) -> Vec<(PathBuf, String)> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| (e.path(), fs::read_to_string(e.path()).unwrap()))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_three_killed_seven_survived() {
        let temp = tempfile::tempdir().unwrap();
        let files = project(temp.path());
        assert_eq!(files.iter().map(|f| f.addresses.len()).sum::<usize>(), 10);
        let before = snapshot(temp.path());

        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(runner_for(temp.path().to_path_buf(), calls.clone()));
        let cache = Arc::new(MemoryCache::new());
        let pipeline = Pipeline::new(
            Evaluator::new(cache.clone(), runner),
            config(2, "h1"),
            Progress::hidden(10),
        );

        let summary = pipeline.run(files).into_result().unwrap();
        assert_eq!(summary.killed, 3);
        assert_eq!(summary.survived + summary.suspicious, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(pipeline.progress().progress(), 10);
        assert_eq!(cache.len(), 10);

        let code = exit_code(Some(&summary), false, false);
        assert_eq!(code & 2, 2);
        assert_eq!(code & 4, 0);
        assert_eq!(code & 8, 0);
        assert_eq!(snapshot(temp.path()), before);
    }

    #[test]
    fn test_cached_results_skip_test_runs() {
        let temp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(runner_for(temp.path().to_path_buf(), calls.clone()));
        let cache = Arc::new(MemoryCache::new());
        let run = |hash: &str| {
            let pipeline = Pipeline::new(
                Evaluator::new(cache.clone(), runner.clone()),
                config(2, hash),
                Progress::hidden(10),
            );
            pipeline.run(project(temp.path())).into_result().unwrap()
        };

        let first = run("h1");
        assert_eq!(calls.load(Ordering::SeqCst), 10);

        let second = run("h1");
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(second.cached, 10);
        assert_eq!(second.killed, first.killed);

        let third = run("h2");
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(third.cached, 0);
    }

    #[test]
    fn test_checker_pool_cycles() {
        let temp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(runner_for(temp.path().to_path_buf(), calls.clone()));
        let threads = Arc::new(parking_lot::Mutex::new(HashSet::new()));
        let names = Arc::clone(&threads);
        let hooks = crate::mutation::hooks::FnHooks::new().on_pre_mutation(move |_| {
            if let Some(name) = thread::current().name() {
                names.lock().insert(name.to_string());
            }
            Ok(())
        });
        let pipeline = Pipeline::new(
            Evaluator::new(Arc::new(MemoryCache::new()), runner),
            RunConfig {
                cycle_after: 3,
                hooks: Some(Arc::new(hooks)),
                ..config(2, "h1")
            },
            Progress::hidden(10),
        );

        let summary = pipeline.run(project(temp.path())).into_result().unwrap();
        assert_eq!(summary.killed + summary.survived + summary.suspicious, 10);
        let generations: HashSet<String> = threads
            .lock()
            .iter()
            .filter_map(|name| name.split('-').nth(2).map(str::to_string))
            .collect();
        assert!(generations.len() >= 4, "saw generations {generations:?}");
    }

    #[test]
    fn test_timeout_is_reported_and_file_restored() {
        struct SlowRunner;
        impl TestRunner for SlowRunner {
            fn run(
                &self,
                command: &str,
                timeout: Option<Duration>,
                _on_line: &mut dyn FnMut(&str),
            ) -> Result<TestOutcome> {
                Err(Error::Timeout {
                    command: command.to_string(),
                    timeout: timeout.unwrap_or_default(),
                })
            }
        }

        let temp = tempfile::tempdir().unwrap();
        let files = project(temp.path());
        let before = snapshot(temp.path());
        let pipeline = Pipeline::new(
            Evaluator::new(Arc::new(MemoryCache::new()), Arc::new(SlowRunner)),
            config(2, "h1"),
            Progress::hidden(10),
        );
        let summary = pipeline.run(files).into_result().unwrap();
        assert_eq!(summary.timeout, 10);
        assert_eq!(exit_code(Some(&summary), false, false), 4);
        assert_eq!(snapshot(temp.path()), before);
    }

    #[test]
    fn test_fatal_error_stops_the_run() {
        let temp = tempfile::tempdir().unwrap();
        let mut files = project(temp.path());
        files.push(FileMutants::new(temp.path().join("missing.py"), vec![MutantAddress::new(0, 0, "")]));
        let before = snapshot(temp.path());

        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(runner_for(temp.path().to_path_buf(), calls));
        let pipeline = Pipeline::new(
            Evaluator::new(Arc::new(MemoryCache::new()), runner),
            config(2, "h1"),
            Progress::hidden(11),
        );
        assert!(matches!(pipeline.run(files).into_result(), Err(Error::Io(_))));
        assert_eq!(snapshot(temp.path()), before);
    }

    #[test]
    fn test_fatal_error_keeps_outcome_bits() {
        let temp = tempfile::tempdir().unwrap();
        let filename = temp.path().join("calc.py");
        let source = "def add(a, b):\n    return a + b\n";
        fs::write(&filename, source).unwrap();
        let mut ctx = MutationContext::new(source, Target::All, RunConfig::default())
            .with_filename(&filename);
        let mut addresses = list_mutations(&mut ctx).unwrap();
        assert_eq!(addresses.len(), 1);
        addresses.push(MutantAddress::new(1, 7, "    return a + b"));

        let runner = Arc::new(InProcessRunner::new("fake-pytest", |_, _| 0));
        let cache = Arc::new(MemoryCache::new());
        let pipeline = Pipeline::new(
            Evaluator::new(cache.clone(), runner),
            config(1, "h1"),
            Progress::hidden(2),
        );
        let report = pipeline.run(vec![FileMutants::new(&filename, addresses)]);

        assert!(matches!(report.fatal, Some(Error::Internal(_))));
        assert_eq!(report.summary.survived, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(report.exit_code(false), 3);
        assert_eq!(report.exit_code(true), 1);
        assert_eq!(fs::read_to_string(&filename).unwrap(), source);
    }

    #[test]
    fn test_empty_run() {
        let runner = Arc::new(InProcessRunner::new("noop", |_, _| 0));
        let pipeline = Pipeline::new(
            Evaluator::new(Arc::new(MemoryCache::new()), runner),
            config(3, "h1"),
            Progress::hidden(0),
        );
        let summary = pipeline.run(Vec::new()).into_result().unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_feeder_reports_cache_hits() {
        let temp = tempfile::tempdir().unwrap();
        let files = project(temp.path());
        let cache = Arc::new(MemoryCache::new());
        for file in &files {
            for address in &file.addresses {
                cache.put(&file.filename, address, "h1", MutationStatus::Killed).unwrap();
            }
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(runner_for(temp.path().to_path_buf(), calls.clone()));
        let pipeline = Pipeline::new(Evaluator::new(cache, runner), config(2, "h1"), Progress::hidden(10));
        let summary = pipeline.run(files).into_result().unwrap();
        assert_eq!(summary.killed, 10);
        assert_eq!(summary.cached, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
