use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::backend::{Frame, UNKNOWN};

/// Identifier of a recorded call. `0` is reserved for "no parent".
pub type CallId = u64;

/// Parent id of a call without a known caller.
pub const ROOT_CALL: CallId = 0;

/// A decoded argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One observed invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRecord {
    pub call_id: CallId,
    pub parent_call_id: CallId,
    pub function: String,
    pub file: String,
    pub directory: String,
    pub line: u32,
    pub args: Vec<Argument>,
    pub is_error: bool,
    pub error_message: Option<String>,
}

impl CallRecord {
    /// A record located at `frame`, falling back to sentinels for whatever the backend
    /// could not resolve.
    pub fn new(call_id: CallId, parent_call_id: CallId, frame: &Frame) -> Self {
        Self {
            call_id,
            parent_call_id,
            function: frame.function_name().to_string(),
            file: UNKNOWN.to_string(),
            directory: UNKNOWN.to_string(),
            line: 0,
            args: Vec::new(),
            is_error: false,
            error_message: None,
        }
        .located_at(frame)
    }

    pub fn with_args(mut self, args: Vec<Argument>) -> Self {
        self.args = args;
        self
    }

    fn located_at(mut self, frame: &Frame) -> Self {
        self.set_location(frame);
        self
    }

    /// Overwrite the source location with whatever `frame` resolves.
    pub fn set_location(&mut self, frame: &Frame) {
        if let Some(file) = frame.file.as_deref().filter(|file| !file.is_empty()) {
            self.file = file.to_string();
        }
        if let Some(directory) = frame.directory.as_deref().filter(|dir| !dir.is_empty()) {
            self.directory = directory.to_string();
        }
        if let Some(line) = frame.line.filter(|line| *line > 0) {
            self.line = line;
        }
    }

    pub fn has_location(&self) -> bool {
        self.file != UNKNOWN && self.line > 0
    }
}

/// Outcome of the traced execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub is_error: bool,
    pub error_message: String,
    pub error_function: String,
    pub error_file: String,
    pub error_line: u32,
}

impl ExecutionStatus {
    pub fn success() -> Self {
        Self::default()
    }

    /// A failure without call attribution.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { is_error: true, error_message: message.into(), ..Default::default() }
    }

    /// Attribute the failure to a call.
    pub fn attributed_to(mut self, record: &CallRecord) -> Self {
        self.error_function = record.function.clone();
        self.error_file = record.file.clone();
        self.error_line = record.line;
        self
    }
}

/// Everything collected during one trace session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceData {
    pub calls: Vec<CallRecord>,
    pub status: ExecutionStatus,
}

impl TraceData {
    pub fn call(&self, call_id: CallId) -> Option<&CallRecord> {
        self.calls.iter().rev().find(|record| record.call_id == call_id)
    }

    pub fn call_mut(&mut self, call_id: CallId) -> Option<&mut CallRecord> {
        self.calls.iter_mut().rev().find(|record| record.call_id == call_id)
    }
}

/// The process-wide trace store.
///
/// Every read and write, serialization included, happens under one lock.
#[derive(Debug, Default)]
pub struct TraceStore {
    data: Mutex<TraceData>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TraceData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the collected data.
    pub fn with<R>(&self, f: impl FnOnce(&mut TraceData) -> R) -> R {
        f(&mut self.lock())
    }

    /// Clear calls and status.
    pub fn reset(&self) {
        *self.lock() = TraceData::default();
    }

    pub fn append(&self, record: CallRecord) {
        self.lock().calls.push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last record in store order.
    pub fn last_call(&self) -> Option<CallRecord> {
        self.lock().calls.last().cloned()
    }

    /// Whether the record is missing its arguments and/or its location.
    pub fn missing_details(&self, call_id: CallId) -> Option<(bool, bool)> {
        self.lock().call(call_id).map(|record| (record.args.is_empty(), !record.has_location()))
    }

    /// Fill in arguments and location of an existing record without touching anything
    /// it already has.
    pub fn backfill(&self, call_id: CallId, args: Vec<Argument>, frame: Option<&Frame>) {
        let mut data = self.lock();
        let Some(record) = data.call_mut(call_id) else { return };

        if record.args.is_empty() && !args.is_empty() {
            record.args = args;
        }
        if let Some(frame) = frame.filter(|_| !record.has_location()) {
            record.set_location(frame);
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.lock().status.clone()
    }

    /// Record a failure unless one was recorded already. Returns whether `status` won.
    pub fn fail_once(&self, status: ExecutionStatus) -> bool {
        let mut data = self.lock();
        if data.status.is_error {
            return false;
        }
        data.status = status;
        true
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> TraceData {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sentinels() {
        let record = CallRecord::new(1, ROOT_CALL, &Frame::default());
        assert_eq!(record.function, UNKNOWN);
        assert_eq!(record.file, UNKNOWN);
        assert_eq!(record.line, 0);
        assert!(!record.has_location());

        let frame = Frame::new("a::b").at("lib.rs", 4).in_directory("/src");
        let record = CallRecord::new(2, 1, &frame);
        assert_eq!(record.directory, "/src");
        assert!(record.has_location());
    }

    #[test]
    fn test_backfill_only_fills_gaps() {
        let store = TraceStore::new();
        store.append(CallRecord::new(1, ROOT_CALL, &Frame::new("a::b")));
        assert_eq!(store.missing_details(1), Some((true, true)));

        store.backfill(1, vec![Argument::new("x", "1")], Some(&Frame::new("a::b").at("lib.rs", 9)));
        let moved = Frame::new("a::b").at("other.rs", 1);
        store.backfill(1, vec![Argument::new("x", "2")], Some(&moved));

        let record = store.snapshot().calls.remove(0);
        assert_eq!(record.args, vec![Argument::new("x", "1")]);
        assert_eq!((record.file.as_str(), record.line), ("lib.rs", 9));
        assert_eq!(store.missing_details(1), Some((false, false)));
        assert_eq!(store.missing_details(2), None);
    }

    #[test]
    fn test_first_failure_wins() {
        let store = TraceStore::new();
        assert!(store.fail_once(ExecutionStatus::failure("first")));
        assert!(!store.fail_once(ExecutionStatus::failure("second")));
        assert_eq!(store.status().error_message, "first");

        store.reset();
        assert_eq!(store.status(), ExecutionStatus::success());
        assert!(store.is_empty());
    }
}
