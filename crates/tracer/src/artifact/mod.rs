//! The trace store and the trace document.

mod document;
mod json;
mod trace;

pub use document::{CallEntry, DocumentStatus, TraceDocument};
pub use json::TraceFormatter;
pub use trace::{
    Argument, CallId, CallRecord, ExecutionStatus, TraceData, TraceStore, ROOT_CALL,
};
