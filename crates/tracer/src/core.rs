use std::{path::Path, sync::Arc};

use calltrace_utils::write_trace;
use eyre::Result;

use crate::{
    analysis::{select_error_call, CallGraphBuilder, FailureCorrelator},
    artifact::{CallRecord, ExecutionStatus, TraceData, TraceDocument, TraceStore},
    backend::{BreakpointHit, FinalStop},
    config::TraceConfig,
};

/// What the backend should do after a callback returns. Tracing never alters program
/// flow, so the only answer is to continue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Collecting calls.
    Armed,
    /// The document has been produced; further events are ignored.
    Finalized,
}

/// The outcome of a finished trace session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceReport {
    /// The rendered trace document.
    pub document: String,
    pub status: ExecutionStatus,
    pub calls: Vec<CallRecord>,
}

impl TraceReport {
    /// Write the document to `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_trace(path, &self.document)
    }
}

/// One trace session, from `start` to `stop`.
///
/// The backend delivers breakpoint hits to [`TraceSession::on_function_entry`] and
/// [`TraceSession::on_failure_breakpoint`], then calls [`TraceSession::stop`] once the
/// debuggee has stopped for good.
#[derive(Debug)]
pub struct TraceSession {
    config: TraceConfig,
    store: Arc<TraceStore>,
    graph: CallGraphBuilder,
    state: SessionState,
    report: Option<TraceReport>,
}

impl TraceSession {
    /// Arm a new session with an empty store.
    pub fn start(config: TraceConfig) -> Self {
        Self::with_store(config, Arc::new(TraceStore::new()))
    }

    /// Arm a new session on a shared store. The store is cleared first.
    pub fn with_store(config: TraceConfig, store: Arc<TraceStore>) -> Self {
        store.reset();
        debug!(pattern = config.pattern(), "trace session armed");
        Self {
            config,
            graph: CallGraphBuilder::new(store.clone()),
            store,
            state: SessionState::Armed,
            report: None,
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }

    fn correlator(&self) -> FailureCorrelator<'_> {
        FailureCorrelator::new(self.config.runtime(), self.config.panic_entry_points())
    }

    /// A traced function was entered.
    pub fn on_function_entry<H: BreakpointHit>(&mut self, hit: &H) -> Resume {
        if self.state == SessionState::Armed {
            self.graph.on_entry(hit);
        }
        Resume::Continue
    }

    /// A panic, assert or abort entry point was hit. The first failure is kept.
    pub fn on_failure_breakpoint<H: BreakpointHit>(&mut self, hit: &H) -> Resume {
        if self.state != SessionState::Armed {
            return Resume::Continue;
        }

        let last = self.store.last_call();
        let status = self.correlator().diagnose_panic(&hit.backtrace(), last.as_ref());
        if self.store.fail_once(status) {
            debug!(thread = hit.thread_id(), "session flagged as failed by panic breakpoint");
        } else {
            trace!(thread = hit.thread_id(), "session already failed");
        }
        Resume::Continue
    }

    /// Finalize the session and render the trace document.
    ///
    /// Correlation runs on the first call only; later calls return the same report.
    pub fn stop(&mut self, stop: &FinalStop) -> Result<TraceReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        if !self.store.status().is_error {
            let calls = self.store.snapshot().calls;
            let status = self.correlator().correlate(stop, &calls);
            if status.is_error {
                self.store.fail_once(status);
            }
        }

        let (document, data) = self.store.with(|data| {
            if let Some(idx) = select_error_call(&data.calls, &data.status) {
                let message = data.status.error_message.clone();
                let call = &mut data.calls[idx];
                call.is_error = true;
                call.error_message = Some(message);
            }
            (TraceDocument::from(&*data).render(), data.clone())
        });
        let document = document?;

        let TraceData { calls, status } = data;
        debug!(calls = calls.len(), is_error = status.is_error, "trace session finalized");

        let report = TraceReport { document, status, calls };
        self.state = SessionState::Finalized;
        self.report = Some(report.clone());
        Ok(report)
    }
}
