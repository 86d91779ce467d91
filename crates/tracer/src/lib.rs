//! # calltrace-tracer
//!
//! Breakpoint-driven call tracing: call-graph reconstruction, value decoding, failure
//! correlation and the JSON trace document.

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod artifact;
pub mod backend;
pub mod config;
pub mod contracts;
mod core;
pub mod decode;
pub mod recorded;

pub use crate::core::{Resume, SessionState, TraceReport, TraceSession};
pub use config::TraceConfig;
pub use recorded::{replay, RecordedSession};
