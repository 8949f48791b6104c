// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Dotlink never links against a version control library. Instead, every
//! version control operation is performed by calling the external binary
//! through the [`Syscall`] trait. The production implementation, [`Shell`],
//! captures standard output, discards standard error, and bounds every call
//! with a timeout so that a hung binary cannot block the whole program.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Default upper bound for a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLine {
    /// Construct new command line from program and argument listing.
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse shell-style command string.
    ///
    /// Splits on whitespace only. No quoting rules apply. Returns `None` for
    /// a blank string.
    pub fn parse(line: impl AsRef<str>) -> Option<Self> {
        let mut tokens = line.as_ref().split_whitespace();
        let program = tokens.next()?;
        Some(Self::new(program, tokens))
    }

    /// Program to execute.
    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Arguments passed to program.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl Display for CommandLine {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Layer of indirection for external command execution.
pub trait Syscall {
    /// Run command, optionally from target working directory.
    ///
    /// Returns captured standard output on success. A non-zero exit status is
    /// reported as an error value, never as a panic.
    fn run(&self, cwd: Option<&Path>, command: &CommandLine) -> Result<String>;

    /// Run shell-style command string through [`Syscall::run`].
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Blank`] if command string is blank.
    fn run_line(&self, cwd: Option<&Path>, line: &str) -> Result<String> {
        let command = CommandLine::parse(line).ok_or(SyscallError::Blank)?;
        self.run(cwd, &command)
    }
}

impl<S: Syscall + ?Sized> Syscall for &S {
    fn run(&self, cwd: Option<&Path>, command: &CommandLine) -> Result<String> {
        (**self).run(cwd, command)
    }
}

/// Command execution through child processes.
#[derive(Debug, Clone)]
pub struct Shell {
    timeout: Duration,
}

impl Shell {
    /// Construct new shell with target timeout for each command.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Syscall for Shell {
    fn run(&self, cwd: Option<&Path>, command: &CommandLine) -> Result<String> {
        info!("command line: {command}");
        let program = command.program().to_string_lossy().into_owned();

        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|err| SyscallError::Spawn {
            source: err,
            program: program.clone(),
        })?;

        // INVARIANT: Drain stdout on separate thread so a chatty child never
        // blocks on a full pipe while we poll for its exit.
        let mut stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Some(stdout) = stdout.as_mut() {
                let _ = stdout.read_to_end(&mut buffer);
            }
            buffer
        });

        // INVARIANT: Timeouts too large to represent mean no deadline at all.
        let deadline = Instant::now().checked_add(self.timeout);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if deadline.is_some_and(|deadline| Instant::now() >= deadline) => {
                    reap(&mut child);
                    return Err(SyscallError::Timeout {
                        program,
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    reap(&mut child);
                    return Err(SyscallError::Wait {
                        source: err,
                        program,
                    });
                }
            }
        };

        let buffer = reader.join().unwrap_or_default();
        let output = String::from_utf8_lossy(&buffer).into_owned();
        let output_debug = output
            .trim()
            .lines()
            .map(|line| format!("\t{line}"))
            .collect::<Vec<_>>()
            .join("\n");
        debug!("output:\n{output_debug}");

        if !status.success() {
            return Err(SyscallError::Status {
                program,
                code: status.code(),
            });
        }

        Ok(output)
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// External command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command string holds no program to run.
    #[error("blank command line")]
    Blank,

    /// Command could not be started, e.g., binary is missing.
    #[error("failed to spawn {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Command exit status could not be collected.
    #[error("failed to wait on {program:?}")]
    Wait {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Command did not finish in time, and was killed.
    #[error("command {program:?} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Command exited with non-zero status.
    #[error("command {program:?} failed with exit code {code:?}")]
    Status { program: String, code: Option<i32> },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
