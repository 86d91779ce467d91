use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Serializer;

use super::{
    json::TraceFormatter,
    trace::{Argument, CallId, CallRecord, TraceData},
};

/// Overall outcome as written to the trace document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Success,
    Error,
}

/// One call as written to the trace document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEntry {
    pub call_id: CallId,
    pub parent_call_id: CallId,
    pub function: String,
    pub file: String,
    pub line: u32,
    pub args: Vec<Argument>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&CallRecord> for CallEntry {
    fn from(record: &CallRecord) -> Self {
        Self {
            call_id: record.call_id,
            parent_call_id: record.parent_call_id,
            function: record.function.clone(),
            file: record.file.clone(),
            line: record.line,
            args: record.args.clone(),
            error: record.is_error,
            error_message: record.error_message.clone().filter(|_| record.is_error),
        }
    }
}

/// The trace document: the durable output of a trace session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceDocument {
    pub status: DocumentStatus,
    pub calls: Vec<CallEntry>,
}

impl From<&TraceData> for TraceDocument {
    fn from(data: &TraceData) -> Self {
        Self {
            status: if data.status.is_error {
                DocumentStatus::Error
            } else {
                DocumentStatus::Success
            },
            calls: data.calls.iter().map(CallEntry::from).collect(),
        }
    }
}

impl TraceDocument {
    /// Render as pretty JSON.
    pub fn render(&self) -> Result<String> {
        let mut out = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut out, TraceFormatter::new());
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(out)?)
    }

    pub fn parse(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// The call flagged as the error site, if any.
    pub fn error_call(&self) -> Option<&CallEntry> {
        self.calls.iter().find(|call| call.error)
    }
}
