//! A backend replayed from a recorded session script.
//!
//! The script is a JSON document describing the debuggee memory, the ordered stream of
//! breakpoint hits and the final stop. It implements the capability traits of
//! [`backend`](crate::backend) so the tracer can run without a live debugger.

use std::path::Path;

use calltrace_utils::load_json;
use eyre::{bail, OptionExt, Result};
use serde::{Deserialize, Serialize};

use crate::{
    backend::{BreakpointHit, FinalStop, Frame, MemoryReader, ThreadId, ValueHandle},
    config::TraceConfig,
    core::{TraceReport, TraceSession},
};

fn default_thread() -> ThreadId {
    1
}

fn decode_hex(data: &str) -> Option<Vec<u8>> {
    hex::decode(data.trim().trim_start_matches("0x")).ok()
}

/// A recorded debuggee value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedValue {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    /// Raw bytes as `0x`-prefixed hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RecordedValue>,
}

impl RecordedValue {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), type_name: Some(type_name.into()), ..Default::default() }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, bytes: &[u8]) -> Self {
        self.data = Some(hex::encode_prefixed(bytes));
        self
    }

    pub fn with_scalar(mut self, scalar: impl Into<String>) -> Self {
        self.scalar = Some(scalar.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }
}

impl<'a> ValueHandle for &'a RecordedValue {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn type_name(&self) -> Option<String> {
        self.type_name.clone()
    }

    fn data(&self) -> Option<Vec<u8>> {
        self.data.as_deref().and_then(decode_hex)
    }

    fn children(&self) -> Vec<Self> {
        self.children.iter().collect()
    }

    fn scalar(&self) -> Option<String> {
        self.scalar.clone()
    }

    fn summary(&self) -> Option<String> {
        self.summary.clone()
    }
}

/// One contiguous chunk of recorded debuggee memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub address: u64,
    /// Content as `0x`-prefixed hex.
    pub bytes: String,
}

/// Recorded debuggee memory. Reads must fall entirely inside one region.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMemory {
    #[serde(default)]
    pub regions: Vec<MemoryRegion>,
}

impl MemoryReader for RecordedMemory {
    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        for region in &self.regions {
            if address < region.address {
                continue;
            }
            let Some(bytes) = decode_hex(&region.bytes) else {
                bail!("memory region at {:#x} is not valid hex", region.address);
            };
            let Ok(offset) = usize::try_from(address - region.address) else { continue };
            let Some(end) = offset.checked_add(len) else { continue };
            if end <= bytes.len() {
                return Ok(bytes[offset..end].to_vec());
            }
        }

        bail!("no recorded memory at {address:#x} for {len} bytes")
    }
}

/// A recorded breakpoint hit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedHit {
    #[serde(default = "default_thread")]
    pub thread: ThreadId,
    /// Innermost frame first.
    #[serde(default)]
    pub backtrace: Vec<Frame>,
    #[serde(default)]
    pub args: Vec<RecordedValue>,
}

impl RecordedHit {
    /// Function of frame 0, if any.
    pub fn function(&self) -> Option<&str> {
        self.backtrace.first().and_then(|frame| frame.function.as_deref())
    }

    /// Pair the hit with the session memory.
    pub fn bind<'a>(&'a self, memory: &'a RecordedMemory) -> BoundHit<'a> {
        BoundHit { hit: self, memory }
    }
}

/// A [`RecordedHit`] together with the memory it may read.
#[derive(Clone, Copy, Debug)]
pub struct BoundHit<'a> {
    hit: &'a RecordedHit,
    memory: &'a RecordedMemory,
}

impl<'a> BreakpointHit for BoundHit<'a> {
    type Value = &'a RecordedValue;

    fn thread_id(&self) -> ThreadId {
        self.hit.thread
    }

    fn frame(&self) -> Option<Frame> {
        self.hit.backtrace.first().cloned()
    }

    fn arguments(&self) -> Vec<Self::Value> {
        self.hit.args.iter().collect()
    }

    fn backtrace(&self) -> Vec<Frame> {
        self.hit.backtrace.clone()
    }

    fn memory(&self) -> &dyn MemoryReader {
        self.memory
    }
}

/// One event of a recorded session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    /// A function was entered.
    Entry(RecordedHit),
    /// A panic or abort entry point was hit.
    Panic(RecordedHit),
}

/// A complete recorded debugging session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedSession {
    #[serde(default)]
    pub memory: RecordedMemory,
    #[serde(default)]
    pub events: Vec<RecordedEvent>,
    #[serde(default)]
    pub stop: FinalStop,
}

impl RecordedSession {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        load_json(path)?.ok_or_eyre(format!("session script {} does not exist", path.display()))
    }
}

/// Run a recorded session through a fresh tracer.
///
/// Entry events are delivered only when the entered function matches the configured
/// pattern, the way a pattern breakpoint would fire.
pub fn replay(session: &RecordedSession, config: TraceConfig) -> Result<TraceReport> {
    let mut tracer = TraceSession::start(config);

    for event in &session.events {
        match event {
            RecordedEvent::Entry(hit) => {
                let function = hit.function().unwrap_or_default();
                if !tracer.config().matches(function) {
                    trace!(function, "breakpoint pattern does not match");
                    continue;
                }
                tracer.on_function_entry(&hit.bind(&session.memory));
            }
            RecordedEvent::Panic(hit) => {
                tracer.on_failure_breakpoint(&hit.bind(&session.memory));
            }
        }
    }

    tracer.stop(&session.stop)
}
