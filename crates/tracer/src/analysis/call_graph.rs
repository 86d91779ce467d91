use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::symbol::{is_caller_candidate, namespace_prefix, normalize};
use crate::{
    artifact::{Argument, CallId, CallRecord, TraceStore, ROOT_CALL},
    backend::{BreakpointHit, Frame, ThreadId, ValueHandle},
    decode::{classify, ANONYMOUS},
};

/// Call ids of the functions currently active on one thread, keyed by normalized name.
#[derive(Clone, Debug, Default)]
pub struct ThreadCallStack {
    active_functions: FxHashMap<String, CallId>,
}

impl ThreadCallStack {
    pub fn active(&self, key: &str) -> Option<CallId> {
        self.active_functions.get(key).copied()
    }

    pub fn activate(&mut self, key: String, call_id: CallId) {
        self.active_functions.insert(key, call_id);
    }

    pub fn len(&self) -> usize {
        self.active_functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_functions.is_empty()
    }
}

/// The innermost caller candidate at or after `start`, with its backtrace index.
fn find_caller(backtrace: &[Frame], start: usize) -> Option<(usize, &Frame)> {
    backtrace
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, frame)| frame.function.as_deref().is_some_and(is_caller_candidate))
}

/// Decode all named arguments of the hit frame.
pub fn decode_arguments<H: BreakpointHit>(hit: &H) -> Vec<Argument> {
    let memory = hit.memory();
    hit.arguments()
        .iter()
        .map(|value| {
            let name = value.name().filter(|name| !name.is_empty());
            let name = name.unwrap_or_else(|| ANONYMOUS.to_string());
            let shape = classify(value, memory);
            if shape.is_unavailable() {
                trace!(argument = %name, type_name = ?value.type_name(), "argument unavailable");
            }
            Argument::new(name, shape.to_string())
        })
        .collect()
}

/// Rebuilds the call tree from independent function-entry events.
///
/// Each thread keeps its own [`ThreadCallStack`]. Call ids come from one counter shared
/// by all threads, so they are unique within the session.
#[derive(Debug)]
pub struct CallGraphBuilder {
    store: Arc<TraceStore>,
    threads: FxHashMap<ThreadId, ThreadCallStack>,
    last_call_id: CallId,
}

impl CallGraphBuilder {
    pub fn new(store: Arc<TraceStore>) -> Self {
        Self { store, threads: FxHashMap::default(), last_call_id: ROOT_CALL }
    }

    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }

    pub fn thread(&self, thread: ThreadId) -> Option<&ThreadCallStack> {
        self.threads.get(&thread)
    }

    fn allocate(&mut self) -> CallId {
        self.last_call_id += 1;
        self.last_call_id
    }

    /// Process one function-entry event.
    pub fn on_entry<H: BreakpointHit>(&mut self, hit: &H) {
        let thread = hit.thread_id();
        let frame = hit.frame().unwrap_or_else(|| {
            debug!(thread, "breakpoint hit without a valid frame");
            Frame::default()
        });
        let function = frame.function_name().to_string();
        let key = normalize(&function);

        if let Some(call_id) = self.threads.get(&thread).and_then(|stack| stack.active(&key)) {
            trace!(thread, call_id, %function, "suppressed duplicate entry");
            self.backfill(call_id, hit, &frame);
            return;
        }

        let backtrace = hit.backtrace();
        let parent_call_id = self.discover_parent(thread, &function, &backtrace);

        let call_id = self.allocate();
        let record =
            CallRecord::new(call_id, parent_call_id, &frame).with_args(decode_arguments(hit));
        self.store.append(record);
        self.threads.entry(thread).or_default().activate(key, call_id);

        trace!(thread, call_id, parent_call_id, %function, "recorded call");
    }

    fn backfill<H: BreakpointHit>(&self, call_id: CallId, hit: &H, frame: &Frame) {
        let Some((needs_args, needs_location)) = self.store.missing_details(call_id) else {
            return;
        };
        if !needs_args && !needs_location {
            return;
        }

        // decode outside of the store lock
        let args = if needs_args { decode_arguments(hit) } else { Vec::new() };
        self.store.backfill(call_id, args, needs_location.then_some(frame));
    }

    /// Find (or synthesize) the logical caller of `function`.
    fn discover_parent(&mut self, thread: ThreadId, function: &str, backtrace: &[Frame]) -> CallId {
        let Some((index, caller)) = find_caller(backtrace, 1) else {
            return ROOT_CALL;
        };
        let caller_name = caller.function_name();
        let caller_key = normalize(caller_name);

        let stack = self.threads.entry(thread).or_default();
        if let Some(call_id) = stack.active(&caller_key) {
            return call_id;
        }

        let same_namespace =
            namespace_prefix(function).is_some_and(|prefix| caller_name.contains(prefix));
        if !same_namespace {
            trace!(thread, caller = caller_name, "caller outside of the traced namespace");
            return ROOT_CALL;
        }

        // one level further out, active callers only
        let grandparent = find_caller(backtrace, index + 1)
            .and_then(|(_, frame)| stack.active(&normalize(frame.function_name())))
            .unwrap_or(ROOT_CALL);

        let call_id = self.allocate();
        self.store.append(CallRecord::new(call_id, grandparent, caller));
        self.threads.entry(thread).or_default().activate(caller_key, call_id);

        debug!(
            thread,
            call_id,
            parent_call_id = grandparent,
            caller = caller_name,
            "synthesized caller"
        );
        call_id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::recorded::{RecordedHit, RecordedMemory, RecordedValue};

    const ROUTER: &str = "<erc20::Token as stylus_sdk::abi::Router<S>>::route";

    fn hit(thread: ThreadId, frames: &[&str]) -> RecordedHit {
        RecordedHit {
            thread,
            backtrace: frames.iter().map(|function| Frame::new(*function)).collect(),
            args: vec![],
        }
    }

    fn builder() -> CallGraphBuilder {
        CallGraphBuilder::new(Arc::new(TraceStore::new()))
    }

    fn enter(builder: &mut CallGraphBuilder, hit: &RecordedHit) {
        let memory = RecordedMemory::default();
        builder.on_entry(&hit.bind(&memory));
    }

    fn calls(builder: &CallGraphBuilder) -> Vec<CallRecord> {
        builder.store().snapshot().calls
    }

    #[test]
    fn test_router_frame_is_skipped() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::dispatch", "main"]));
        enter(
            &mut builder,
            &hit(1, &["erc20::Token::transfer", ROUTER, "erc20::Token::dispatch", "main"]),
        );

        let calls = calls(&builder);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].parent_call_id, ROOT_CALL);
        assert_eq!(calls[1].parent_call_id, calls[0].call_id);
    }

    #[test]
    fn test_plain_router_marker_is_skipped() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::dispatch"]));
        enter(
            &mut builder,
            &hit(1, &["erc20::Token::mint", "Router::route", "erc20::Token::dispatch"]),
        );
        let calls = calls(&builder);
        assert_eq!(calls[1].parent_call_id, calls[0].call_id);
    }

    #[test]
    fn test_duplicate_entry_is_suppressed() {
        let mut builder = builder();
        let entry = hit(1, &["erc20::Token::transfer::h0011223344556677", "main"]);
        enter(&mut builder, &entry);
        // same logical function through a different trampoline
        enter(&mut builder, &hit(1, &["erc20::Token::transfer::h8899aabbccddeeff", "main"]));
        assert_eq!(calls(&builder).len(), 1);

        // another thread is a separate call
        let mut other = entry.clone();
        other.thread = 2;
        enter(&mut builder, &other);
        let calls = calls(&builder);
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].call_id, calls[1].call_id);
    }

    #[test]
    fn test_duplicate_entry_backfills() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::approve"]));

        let mut complete = hit(1, &["erc20::Token::approve"]);
        complete.backtrace[0] = Frame::new("erc20::Token::approve").at("lib.rs", 77);
        complete.args = vec![RecordedValue::new("value", "u64").with_scalar("3")];
        enter(&mut builder, &complete);

        let calls = calls(&builder);
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].file.as_str(), calls[0].line), ("lib.rs", 77));
        assert_eq!(calls[0].args, vec![Argument::new("value", "3")]);
    }

    #[test]
    fn test_inactive_caller_is_synthesized() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::run"]));

        let mut nested = hit(1, &[
            "erc20::Token::transfer",
            ROUTER,
            "erc20::Token::checked_transfer",
            "erc20::Token::run",
        ]);
        nested.backtrace[2] = Frame::new("erc20::Token::checked_transfer").at("token.rs", 15);
        enter(&mut builder, &nested);

        let calls = calls(&builder);
        assert_eq!(calls.len(), 3);
        let (run, synthesized, transfer) = (&calls[0], &calls[1], &calls[2]);
        assert_eq!(synthesized.function, "erc20::Token::checked_transfer");
        assert_eq!((synthesized.file.as_str(), synthesized.line), ("token.rs", 15));
        assert!(synthesized.args.is_empty());
        assert_eq!(synthesized.parent_call_id, run.call_id);
        assert_eq!(transfer.parent_call_id, synthesized.call_id);

        // the synthesized caller is now active
        enter(&mut builder, &hit(1, &["erc20::Token::checked_transfer", "erc20::Token::run"]));
        assert_eq!(builder.store().len(), 3);
    }

    #[test]
    fn test_caller_in_foreign_namespace_is_root() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::mint", "vault::Vault::deposit", "main"]));
        let calls = calls(&builder);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parent_call_id, ROOT_CALL);
    }

    #[test]
    fn test_runtime_frames_are_not_callers() {
        let mut builder = builder();
        enter(&mut builder, &hit(1, &["erc20::Token::run"]));
        enter(&mut builder, &hit(1, &[
            "erc20::Token::mint",
            "core::ops::function::FnOnce::call_once",
            "<alloc::boxed::Box<F> as core::ops::function::Fn<A>>::call",
            "erc20::Token::run",
        ]));
        let calls = calls(&builder);
        assert_eq!(calls[1].parent_call_id, calls[0].call_id);
    }

    #[test]
    fn test_arguments_decoded_with_placeholders() {
        let mut builder = builder();
        let mut entry = hit(1, &["erc20::Token::mint"]);
        entry.args = vec![
            RecordedValue::new("to", "u32").with_scalar("9"),
            RecordedValue { type_name: Some("u8".to_string()), ..Default::default() },
            RecordedValue::new("amount", "erc20::Opaque"),
        ];
        enter(&mut builder, &entry);

        assert_eq!(
            calls(&builder)[0].args,
            vec![
                Argument::new("to", "9"),
                Argument::new(ANONYMOUS, crate::backend::UNAVAILABLE),
                Argument::new("amount", crate::backend::UNAVAILABLE),
            ]
        );
    }

    #[test]
    fn test_invalid_frame_degrades_to_sentinels() {
        let mut builder = builder();
        enter(&mut builder, &RecordedHit::default());
        let calls = calls(&builder);
        assert_eq!(calls[0].function, crate::backend::UNKNOWN);
        assert_eq!(calls[0].parent_call_id, ROOT_CALL);
    }

    #[test]
    fn test_ids_unique_and_parents_resolved() {
        let mut builder = builder();
        let script: &[(ThreadId, &[&str])] = &[
            (1, &["erc20::Token::run", "main"]),
            (2, &["erc20::Token::run", "main"]),
            (1, &["erc20::Token::a", "erc20::Token::run"]),
            (2, &["erc20::Token::b", "erc20::helper::inner", "erc20::Token::run"]),
            (1, &["erc20::Token::c", "erc20::Token::x", "erc20::Token::y", "main"]),
            (2, &["erc20::Token::a", ROUTER, "erc20::Token::b"]),
            (1, &["erc20::Token::a", "erc20::Token::run"]),
        ];
        for (thread, frames) in script {
            enter(&mut builder, &hit(*thread, frames));
        }

        let calls = calls(&builder);
        let mut seen = HashSet::new();
        for call in &calls {
            assert!(call.call_id != ROOT_CALL);
            assert!(
                call.parent_call_id == ROOT_CALL || seen.contains(&call.parent_call_id),
                "dangling parent in {call:?}"
            );
            assert!(seen.insert(call.call_id), "duplicate id in {call:?}");
        }
        assert_eq!(builder.thread(1).map(ThreadCallStack::len), Some(4));
    }
}
