//! Test command execution.
//!
//! A [`TestRunner`] runs the test command once and reports whether the tests
//! passed. Output is streamed line by line to a callback while the command
//! runs, and a run that outlives its deadline is killed and reported as
//! [`Error::Timeout`].

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit status of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOutcome {
    /// Exit code, `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

impl TestOutcome {
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Only exit codes 1 (tests failed) and 2 (interrupted or usage error)
    /// count as failures. Everything else, including pytest's "no tests
    /// collected" code 5, counts as a pass.
    pub fn passed(self) -> bool {
        !matches!(self.code, Some(1) | Some(2))
    }
}

/// Runs the test command.
pub trait TestRunner: Send + Sync {
    /// Run `command`, feeding each output line to `on_line`.
    ///
    /// With a `timeout`, a run still going when it expires is killed and
    /// reported as [`Error::Timeout`].
    fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<TestOutcome>;
}

/// Runs the test command through the host shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    working_dir: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = shell_command(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl TestRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<TestOutcome> {
        debug!(command, ?timeout, "running tests");
        let start = Instant::now();
        let mut child = self.command(command).spawn()?;

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        loop {
            drain(&rx, on_line);
            match child.try_wait()? {
                Some(status) => {
                    for reader in readers {
                        let _ = reader.join();
                    }
                    drain(&rx, on_line);
                    return Ok(TestOutcome::new(status.code()));
                }
                None => {
                    if let Some(limit) = timeout {
                        if start.elapsed() > limit {
                            kill(&mut child);
                            return Err(Error::Timeout {
                                command: command.to_string(),
                                timeout: limit,
                            });
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn forward_lines(stream: impl Read + Send + 'static, tx: mpsc::Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(std::result::Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

fn drain(rx: &mpsc::Receiver<String>, on_line: &mut dyn FnMut(&str)) {
    loop {
        match rx.try_recv() {
            Ok(line) => on_line(&line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
}

/// Kill the test process together with anything it spawned.
fn kill(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let killed = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if !killed.is_ok_and(|status| status.success()) {
            warn!(pid = child.id(), "could not kill test process group");
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Entry point of an in-process test runner: arguments in, exit code out.
pub type EntryPoint = dyn Fn(&[String], &mut dyn Write) -> i32 + Send + Sync;

/// Runs commands starting with a given prefix through an in-process entry
/// point instead of spawning a process; anything else goes to the shell.
///
/// A timed-out entry point cannot be interrupted. Its thread is detached and
/// left to finish on its own while the run reports [`Error::Timeout`].
#[derive(Clone)]
pub struct InProcessRunner {
    prefix: String,
    entry: Arc<EntryPoint>,
    fallback: ShellRunner,
}

impl InProcessRunner {
    pub fn new(
        prefix: impl Into<String>,
        entry: impl Fn(&[String], &mut dyn Write) -> i32 + Send + Sync + 'static,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            entry: Arc::new(entry),
            fallback: ShellRunner::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: ShellRunner) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether `command` is handled in process.
    pub fn handles(&self, command: &str) -> bool {
        let command = command.trim_start();
        command == self.prefix || command.starts_with(&format!("{} ", self.prefix))
    }
}

impl TestRunner for InProcessRunner {
    fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<TestOutcome> {
        if !self.handles(command) {
            return self.fallback.run(command, timeout, on_line);
        }

        let args: Vec<String> = command
            .trim_start()
            .split_whitespace()
            .skip(1)
            .map(str::to_string)
            .collect();
        let entry = Arc::clone(&self.entry);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut output = Vec::new();
            let code = entry(&args, &mut output);
            let _ = tx.send((code, output));
        });

        let received = match timeout {
            Some(limit) => rx.recv_timeout(limit),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((code, output)) => {
                for line in String::from_utf8_lossy(&output).lines() {
                    on_line(line);
                }
                Ok(TestOutcome::new(Some(code)))
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout {
                command: command.to_string(),
                timeout: timeout.unwrap_or_default(),
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::internal(format!("in-process test run `{command}` panicked")))
            }
        }
    }
}

/// Run a pre/post-mutation shell command to completion and return its output.
pub fn run_hook_command(command: &str) -> Result<String> {
    let output = shell_command(command).stdin(Stdio::null()).output()?;
    if !output.status.success() {
        warn!(command, code = ?output.status.code(), "hook command failed");
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}
