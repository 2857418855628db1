//! Command execution abstraction for aerie-provision.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution with captured output
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`

mod pipe;
mod real;

use std::process::ExitStatus;
use std::time::Duration;

use anyhow::Result;
use camino::Utf8PathBuf;

pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
///
/// Used by error messages and dry-run output to consistently format
/// command arguments (e.g., `"--full" "/var/lib/aerie/dataset"`).
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Specification for a command to be executed
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "scripts/download_airbirds.sh")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (optional, defaults to current directory)
    pub cwd: Option<Utf8PathBuf>,
    /// Environment variables to set (in addition to inherited environment)
    pub env: Vec<(String, String)>,
    /// Maximum wall-clock time the command may run before being killed.
    /// `None` means no limit.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Sets the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: Utf8PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    /// Adds an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the execution timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of command execution.
///
/// Captures the terminal status along with everything the child wrote to
/// its standard streams. The orchestrator surfaces `stderr` to the operator
/// when a run fails, so executors must fill it even on abnormal exits.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Everything the command wrote to standard output
    pub stdout: String,
    /// Everything the command wrote to standard error
    pub stderr: String,
    /// True if the command was killed after exceeding its timeout
    pub timed_out: bool,
    /// True for synthetic results describing a fault that prevented the
    /// command from producing an exit status (spawn failure, missing
    /// invocable). Distinguishes them from dry-run results, which also
    /// carry no status but count as success.
    pub faulted: bool,
}

impl ExecutionResult {
    /// Builds a synthetic failed result with diagnostic text in `stderr`.
    pub fn fault(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            faulted: true,
            ..Self::default()
        }
    }

    /// Returns true if the command executed successfully.
    ///
    /// In dry-run mode (status is None), this always returns true.
    /// A timed-out or faulted command is never successful, regardless of
    /// any exit status observed.
    pub fn success(&self) -> bool {
        !self.timed_out && !self.faulted && self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` to allow the executor to be shared
/// across components (e.g., when used as `Arc<dyn CommandExecutor>` by both
/// the bootstrapper and the strategy runner).
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}
