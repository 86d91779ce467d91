//! Capabilities consumed from the debugging backend.
//!
//! The tracer never drives the debuggee itself. A backend (an LLDB plugin, a recorded
//! session, a test double) implements these traits and calls into
//! [`TraceSession`](crate::TraceSession) whenever a matched breakpoint is hit.

use std::fmt::{self, Display};

use eyre::Result;
use serde::{Deserialize, Serialize};

/// Native thread identifier as reported by the backend.
pub type ThreadId = u64;

/// Sentinel used whenever the backend cannot resolve a symbol or file.
pub const UNKNOWN: &str = "<unknown>";

/// Sentinel used whenever a value cannot be recovered.
pub const UNAVAILABLE: &str = "<unavailable>";

/// One activation record on a thread's call stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Fully-qualified function name, if the symbol resolver found one.
    #[serde(default)]
    pub function: Option<String>,
    /// Source file name (without directory).
    #[serde(default)]
    pub file: Option<String>,
    /// Directory containing `file`.
    #[serde(default)]
    pub directory: Option<String>,
    /// 1-based source line.
    #[serde(default)]
    pub line: Option<u32>,
}

impl Frame {
    pub fn new(function: impl Into<String>) -> Self {
        Self { function: Some(function.into()), ..Default::default() }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// The function name, or [`UNKNOWN`] when unresolved.
    pub fn function_name(&self) -> &str {
        self.function.as_deref().filter(|f| !f.is_empty()).unwrap_or(UNKNOWN)
    }
}

/// An opaque handle on a value living in the debuggee.
///
/// Every accessor is a backend query and may fail; failures surface as `None` or an
/// empty list and are never propagated.
pub trait ValueHandle: Sized {
    /// Variable or field name.
    fn name(&self) -> Option<String>;

    /// Type name as reported by the debug info, e.g. `ruint::Uint<256, 4>`.
    fn type_name(&self) -> Option<String>;

    /// Raw bytes of the value as laid out in debuggee memory.
    fn data(&self) -> Option<Vec<u8>>;

    /// Child fields in declaration order.
    fn children(&self) -> Vec<Self>;

    /// Rendering of a primitive scalar, when the backend has one.
    fn scalar(&self) -> Option<String>;

    /// Human summary provided by the backend's formatters.
    fn summary(&self) -> Option<String>;

    /// First child with the given name.
    fn child(&self, name: &str) -> Option<Self> {
        self.children().into_iter().find(|child| child.name().as_deref() == Some(name))
    }

    /// The value interpreted as an unsigned integer (pointers included).
    fn as_u64(&self) -> Option<u64> {
        if let Some(scalar) = self.scalar() {
            let scalar = scalar.trim();
            let parsed = match scalar.strip_prefix("0x").or_else(|| scalar.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => scalar.parse::<u64>().ok(),
            };
            if parsed.is_some() {
                return parsed;
            }
        }

        let data = self.data()?;
        if data.is_empty() || data.len() > 8 {
            return None;
        }
        let mut word = [0u8; 8];
        word[..data.len()].copy_from_slice(&data);
        Some(u64::from_le_bytes(word))
    }
}

/// Access to the debuggee's address space.
pub trait MemoryReader {
    /// Read exactly `len` bytes starting at `address`.
    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>>;
}

/// Everything the tracer may query while a thread is stopped at a matched breakpoint.
pub trait BreakpointHit {
    type Value: ValueHandle;

    /// The stopped thread.
    fn thread_id(&self) -> ThreadId;

    /// Frame 0, i.e. the function that was just entered. `None` if the frame is invalid.
    fn frame(&self) -> Option<Frame>;

    /// Named arguments of frame 0 in declaration order.
    fn arguments(&self) -> Vec<Self::Value>;

    /// Full backtrace of the stopped thread, innermost first. Index 0 is the current frame.
    fn backtrace(&self) -> Vec<Frame>;

    /// The debuggee's memory, used to follow pointers while decoding.
    fn memory(&self) -> &dyn MemoryReader;
}

/// Why the debuggee stopped for the last time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// The process exited with the given code.
    Exited { code: i32 },
    /// The process was stopped by a signal.
    Signal {
        number: i32,
        #[serde(default)]
        name: Option<String>,
    },
    /// The process was stopped by a machine exception.
    Exception { description: String },
    /// The process is parked at a (non-tracing) breakpoint.
    Breakpoint,
    /// The process never stopped, or is still running.
    Running,
}

impl Default for StopReason {
    fn default() -> Self {
        Self::Exited { code: 0 }
    }
}

impl Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exit with code {code}"),
            Self::Signal { name: Some(name), .. } => write!(f, "signal {name}"),
            Self::Signal { number, name: None } => write!(f, "signal {number}"),
            Self::Exception { description } => write!(f, "exception ({description})"),
            Self::Breakpoint => write!(f, "breakpoint"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Final stop classification plus the backtrace of the thread that stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStop {
    #[serde(default)]
    pub reason: StopReason,
    #[serde(default)]
    pub backtrace: Vec<Frame>,
}

impl FinalStop {
    pub fn new(reason: StopReason) -> Self {
        Self { reason, backtrace: Vec::new() }
    }

    pub fn with_backtrace(mut self, backtrace: Vec<Frame>) -> Self {
        self.backtrace = backtrace;
        self
    }
}
