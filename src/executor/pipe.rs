//! Internal utilities for streaming and capturing command output.
//!
//! This module handles reading from stdout/stderr pipes, logging each line
//! in real-time during command execution, and accumulating the full text
//! for the caller's [`ExecutionResult`](super::ExecutionResult).

use std::io::{BufRead, BufReader, Read};

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
///
/// The returned `&str` borrows from the panic payload, so it is valid
/// as long as the `err` reference is valid.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads a pipe to completion, logging each line in real-time and returning
/// the accumulated text.
///
/// - stdout is logged at INFO level, stderr at WARN level, so operators can
///   watch download progress live while the full text is still captured
///   for the final diagnostic report.
/// - Binary data uses lossy UTF-8 conversion
/// - I/O errors stop reading but don't fail command execution
///   (capture is best-effort; command success is determined by exit status)
/// - `None` pipe logs an error and returns empty (unexpected if
///   `Stdio::piped()` was set)
pub(super) fn read_pipe_capture<R: Read>(pipe: Option<R>, stream_type: StreamType) -> String {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return String::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut line_buf = Vec::new();
    let mut captured = String::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let text = String::from_utf8_lossy(&line_buf);
                captured.push_str(&text);
                // Log output (excluding line terminator)
                let trimmed = text.trim_end_matches('\n').trim_end_matches('\r');
                match stream_type {
                    StreamType::Stdout => tracing::info!(stream = %stream_type, "{}", trimmed),
                    StreamType::Stderr => tracing::warn!(stream = %stream_type, "{}", trimmed),
                }
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }

    captured
}
