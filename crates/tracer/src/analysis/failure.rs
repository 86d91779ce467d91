//! Mapping of the final stop of the debuggee back to the call tree.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use super::symbol::{is_caller_candidate, strip_hash_suffix};
use crate::{
    artifact::{CallRecord, ExecutionStatus},
    backend::{FinalStop, Frame, StopReason, UNKNOWN},
};

/// Runtime functions reached when the program panics, asserts or aborts.
pub const PANIC_ENTRY_POINTS: &[&str] = &[
    "rust_panic",
    "rust_begin_unwind",
    "__rust_start_panic",
    "core::panicking::panic",
    "core::panicking::panic_fmt",
    "core::panicking::panic_nounwind",
    "core::panicking::panic_bounds_check",
    "core::panicking::assert_failed",
    "std::panicking::begin_panic",
    "std::panicking::rust_panic_with_hook",
    "core::result::unwrap_failed",
    "core::option::expect_failed",
    "std::process::abort",
    "abort",
    "__assert_fail",
];

/// Signals raised by aborts, failed assertions and traps.
const ABORT_SIGNALS: &[i32] = &[4, 5, 6];
const ABORT_SIGNAL_NAMES: &[&str] = &["SIGABRT", "SIGILL", "SIGTRAP"];

/// Whether `function` is a panic, assert or abort entry point.
///
/// `extra` extends the built-in [`PANIC_ENTRY_POINTS`].
pub fn is_panic_entry(function: &str, extra: &[String]) -> bool {
    let name = strip_hash_suffix(function);
    let matches = |entry: &str| {
        name == entry ||
            name.strip_prefix(entry)
                .is_some_and(|rest| rest.starts_with('<') || rest.starts_with("::"))
    };
    PANIC_ENTRY_POINTS.iter().copied().any(|entry| matches(entry)) ||
        extra.iter().any(|entry| matches(entry.as_str()))
}

/// Innermost frame of `backtrace` that is a panic entry point.
pub fn find_panic_frame<'a>(backtrace: &'a [Frame], extra: &[String]) -> Option<&'a Frame> {
    backtrace
        .iter()
        .find(|frame| frame.function.as_deref().is_some_and(|name| is_panic_entry(name, extra)))
}

fn is_abort_signal(reason: &StopReason) -> bool {
    match reason {
        StopReason::Signal { number, name } => {
            ABORT_SIGNALS.contains(number) ||
                name.as_deref().is_some_and(|name| ABORT_SIGNAL_NAMES.contains(&name))
        }
        _ => false,
    }
}

fn source_path(directory: Option<&str>, file: &str) -> PathBuf {
    let file_path = Path::new(file);
    match directory.filter(|dir| *dir != UNKNOWN && !dir.is_empty()) {
        Some(dir) if file_path.is_relative() => Path::new(dir).join(file_path),
        _ => file_path.to_path_buf(),
    }
}

/// Best-effort read of one 1-based source line. Blank lines count as missing.
pub fn read_source_line(directory: Option<&str>, file: &str, line: u32) -> Option<String> {
    if file == UNKNOWN || line == 0 {
        return None;
    }

    let path = source_path(directory, file);
    let reader = match File::open(&path) {
        Ok(file) => BufReader::new(file),
        Err(err) => {
            trace!(?path, "cannot open source file: {err}");
            return None;
        }
    };

    let text = reader.lines().nth(line as usize - 1)?.ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Message carried by a source line: the first quoted literal, or the whole line.
pub fn extract_message(line: &str) -> String {
    let line = line.trim();
    let Some(open) = line.find('"') else { return line.to_string() };

    let body = &line[open + 1..];
    let mut escaped = false;
    for (idx, c) in body.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return body[..idx].to_string(),
            _ => escaped = false,
        }
    }
    line.to_string()
}

/// Classifies failures and attributes them to recorded calls.
#[derive(Clone, Debug)]
pub struct FailureCorrelator<'a> {
    runtime: &'a str,
    extra_entry_points: &'a [String],
}

impl<'a> FailureCorrelator<'a> {
    pub fn new(runtime: &'a str, extra_entry_points: &'a [String]) -> Self {
        Self { runtime, extra_entry_points }
    }

    /// Status derived from the final stop of the debuggee.
    pub fn correlate(&self, stop: &FinalStop, calls: &[CallRecord]) -> ExecutionStatus {
        let panic_frame = find_panic_frame(&stop.backtrace, self.extra_entry_points);

        let status = match &stop.reason {
            StopReason::Exited { code: 0 } if panic_frame.is_none() => ExecutionStatus::success(),
            StopReason::Breakpoint | StopReason::Running if panic_frame.is_none() => {
                ExecutionStatus::success()
            }
            StopReason::Exited { code } if panic_frame.is_none() => {
                ExecutionStatus::failure(format!("Process exited with code {code}"))
            }
            reason if is_abort_signal(reason) || panic_frame.is_some() => {
                self.diagnose_panic(&stop.backtrace, calls.last())
            }
            reason => ExecutionStatus::failure(format!("Process stopped by {reason}")),
        };

        debug!(
            reason = %stop.reason,
            is_error = status.is_error,
            message = %status.error_message,
            "correlated final stop"
        );
        status
    }

    /// Panic diagnosis attributed to the last recorded call.
    ///
    /// The message comes from the source line of that call, then from the innermost user
    /// frame of `backtrace`, then from the function name.
    pub fn diagnose_panic(
        &self,
        backtrace: &[Frame],
        last: Option<&CallRecord>,
    ) -> ExecutionStatus {
        let Some(last) = last else {
            return ExecutionStatus::failure(self.generic_message());
        };

        let message = read_source_line(Some(last.directory.as_str()), &last.file, last.line)
            .or_else(|| self.panic_site_line(backtrace))
            .map(|line| extract_message(&line))
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                if last.function == UNKNOWN {
                    self.generic_message()
                } else {
                    format!("Panic in {}", last.function)
                }
            });

        ExecutionStatus::failure(message).attributed_to(last)
    }

    /// Source line of the innermost user frame of the panicking thread.
    fn panic_site_line(&self, backtrace: &[Frame]) -> Option<String> {
        let frame = backtrace.iter().find(|frame| {
            frame.function.as_deref().is_some_and(|name| {
                is_caller_candidate(name) && !is_panic_entry(name, self.extra_entry_points)
            }) && frame.file.is_some() &&
                frame.line.is_some()
        })?;
        read_source_line(frame.directory.as_deref(), frame.file.as_deref()?, frame.line?)
    }

    fn generic_message(&self) -> String {
        format!("{} panic/assert detected", self.runtime)
    }
}

/// Index of the call to flag as the error site.
///
/// Scans backwards for the failure location, then for the failing function name, and
/// settles for the last call.
pub fn select_error_call(calls: &[CallRecord], status: &ExecutionStatus) -> Option<usize> {
    if !status.is_error || calls.is_empty() {
        return None;
    }

    let by_location = || {
        (status.error_line > 0 && !status.error_file.is_empty() && status.error_file != UNKNOWN)
            .then(|| {
                calls.iter().rposition(|call| {
                    call.file == status.error_file && call.line == status.error_line
                })
            })
            .flatten()
    };

    let by_function = || {
        let wanted = strip_hash_suffix(&status.error_function);
        (!wanted.is_empty() && wanted != UNKNOWN)
            .then(|| {
                calls.iter().rposition(|call| {
                    strip_hash_suffix(&call.function).contains(wanted)
                })
            })
            .flatten()
    };

    by_location().or_else(by_function).or(Some(calls.len() - 1))
}
