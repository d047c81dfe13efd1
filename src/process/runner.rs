//! Bounded external process execution
//!
//! `SystemRunner` starts the child through duct with stderr merged into
//! stdout, both written to an anonymous temp file, then polls until the child
//! exits or the deadline passes. A child that outlives its timeout is killed
//! and whatever it wrote so far is reported with the failure.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::CommandLine;

/// Why an external command was considered failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Non-zero exit (code is `None` when killed by a signal)
    Exit(Option<i32>),
    /// The hard timeout expired and the child was killed
    TimedOut(Duration),
    /// The process could not be started at all
    Spawn(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Exit(Some(code)) => write!(f, "exited with status {}", code),
            FailureCause::Exit(None) => write!(f, "was terminated by a signal"),
            FailureCause::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            FailureCause::Spawn(reason) => write!(f, "could not be started ({})", reason),
        }
    }
}

/// An external command failed, with whatever output it produced
#[derive(Debug, Clone, Error)]
#[error("{program} {cause}{}", format_output(.output))]
pub struct ProcessFailure {
    pub program: String,
    pub cause: FailureCause,
    pub output: String,
}

fn format_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl ProcessFailure {
    pub fn new(program: impl Into<String>, cause: FailureCause, output: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cause,
            output: output.into(),
        }
    }

    fn spawn(command: &CommandLine, err: io::Error) -> Self {
        Self::new(command.program(), FailureCause::Spawn(err.to_string()), String::new())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FailureCause::TimedOut(_))
    }

    /// Heuristic for "the tool is not installed", which no retry or
    /// different input will fix
    pub fn is_missing_binary(&self) -> bool {
        match &self.cause {
            FailureCause::Spawn(reason) => {
                reason.contains("No such file") || reason.contains("not found")
            }
            FailureCause::Exit(Some(127)) => true,
            _ => self.output.contains("command not found"),
        }
    }
}

/// Executes external commands with a hard timeout
pub trait ProcessRunner {
    /// Run `command` to completion and return its combined output
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<String, ProcessFailure>;
}

/// Runs commands on the host system
#[derive(Debug, Clone)]
pub struct SystemRunner {
    poll_interval: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<String, ProcessFailure> {
        debug!(command = %command, timeout_secs = timeout.as_secs(), "Running external command");

        let mut capture = tempfile::tempfile().map_err(|e| ProcessFailure::spawn(command, e))?;
        let sink = capture
            .try_clone()
            .map_err(|e| ProcessFailure::spawn(command, e))?;

        let mut expression = duct::cmd(command.program(), command.argv())
            .stdin_null()
            .stderr_to_stdout()
            .stdout_file(sink)
            .unchecked();
        for (key, value) in command.env_vars() {
            expression = expression.env(key, value);
        }

        let handle = expression
            .start()
            .map_err(|e| ProcessFailure::spawn(command, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match handle.try_wait() {
                Ok(Some(output)) => {
                    let status = output.status;
                    let text = read_captured(&mut capture);
                    if status.success() {
                        return Ok(text);
                    }
                    return Err(ProcessFailure::new(
                        command.program(),
                        FailureCause::Exit(status.code()),
                        text,
                    ));
                }
                Ok(None) => {}
                Err(e) => return Err(ProcessFailure::spawn(command, e)),
            }

            if Instant::now() >= deadline {
                if let Err(e) = handle.kill() {
                    warn!(program = command.program(), error = %e, "Failed to kill timed out process");
                }
                return Err(ProcessFailure::new(
                    command.program(),
                    FailureCause::TimedOut(timeout),
                    read_captured(&mut capture),
                ));
            }

            thread::sleep(self.poll_interval);
        }
    }
}

/// Everything the child has written to the capture file so far
fn read_captured(file: &mut File) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = file
        .seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut bytes))
    {
        warn!(error = %e, "Could not read captured process output");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
