//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! using `std::process::Command` with real-time output streaming, output
//! capture, and an optional wall-clock timeout.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use which::which;

use super::pipe::{StreamType, panic_message, read_pipe_capture};
use super::{CommandExecutor, CommandSpec, ExecutionResult, format_command_args};
use crate::error::AerieError;

/// Poll interval for timeout-bounded waits.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cleans up a child process and its associated reader threads.
///
/// This function kills the child process, waits for it to terminate,
/// and joins all reader threads to prevent resource leaks. Captured
/// output from the joined threads is discarded.
///
/// Called from error paths in [`RealCommandExecutor::execute()`] to ensure
/// proper cleanup when thread spawning or process waiting fails.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<String>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Waits for the child to exit, enforcing the optional timeout.
///
/// Returns the exit status and whether the child had to be killed for
/// exceeding its allotted time. With no timeout this is a plain blocking
/// `wait()`; with a timeout the child is polled via `try_wait()` so the
/// deadline can be observed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return child.wait().map(|s| (s, false));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "command exceeded timeout of {:?}, killing", timeout);
            if let Err(e) = child.kill() {
                tracing::debug!(
                    pid = child.id(),
                    "kill returned error (process may have already exited): {}",
                    e
                );
            }
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns a default [`ExecutionResult`] whose
/// `status` is `None` (which counts as success).
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {:?}", spec);
            return Ok(ExecutionResult::default());
        }

        let cmd =
            which(&spec.command).with_context(|| format!("command not found: {}", spec.command))?;
        tracing::trace!("command found: {}: {}", spec.command, cmd.to_string_lossy());

        let mut command = Command::new(cmd);
        command.args(&spec.args);

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn().with_context(|| {
            format!("failed to spawn command `{}` with args {:?}", spec.command, spec.args)
        })?;

        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Read both stdout and stderr in separate threads with panic error propagation
        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || read_pipe_capture(stdout_pipe, StreamType::Stdout))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(AerieError::Execution {
                    command: format!("{} {}", spec.command, format_command_args(&spec.args)),
                    status: format!("failed to spawn stdout reader thread: {}", e),
                }
                .into());
            }
        };

        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || read_pipe_capture(stderr_pipe, StreamType::Stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                // Clean up by killing the child process and joining the stdout thread
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(AerieError::Execution {
                    command: format!("{} {}", spec.command, format_command_args(&spec.args)),
                    status: format!("failed to spawn stderr reader thread: {}", e),
                }
                .into());
            }
        };

        // Wait for the child process to complete, killing it on timeout
        let (status, timed_out) = match wait_with_timeout(&mut child, spec.timeout) {
            Ok(outcome) => outcome,
            Err(e) => {
                // If waiting fails, the process might still be running.
                // Kill it and clean up threads to prevent resource leaks.
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(AerieError::Execution {
                    command: format!("{} {}", spec.command, format_command_args(&spec.args)),
                    status: format!("failed to wait for command: {}", e),
                }
                .into());
            }
        };

        // Join reader threads and collect the captured text (with error
        // propagation on panic)
        let mut captured = [String::new(), String::new()];
        let mut panicked_streams = Vec::new();
        let handles = [("stdout", stdout_handle), ("stderr", stderr_handle)];
        for (i, (name, handle)) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(text) => captured[i] = text,
                Err(e) => {
                    let msg = panic_message(&*e);
                    tracing::error!(stream = name, panic = msg, "reader thread panicked");
                    panicked_streams.push(format!("{}: {}", name, msg));
                }
            }
        }

        if !panicked_streams.is_empty() {
            return Err(AerieError::Execution {
                command: format!("{} {}", spec.command, format_command_args(&spec.args)),
                status: format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            }
            .into());
        }

        let [stdout, stderr] = captured;

        tracing::trace!(
            "executed command: {}: success={} timed_out={}",
            spec.command,
            status.success(),
            timed_out
        );

        Ok(ExecutionResult {
            status: Some(status),
            stdout,
            stderr,
            timed_out,
            faulted: false,
        })
    }
}
