//! Call-graph reconstruction and failure correlation.

mod call_graph;
mod failure;
pub mod symbol;

pub use call_graph::{decode_arguments, CallGraphBuilder, ThreadCallStack};
pub use failure::{
    extract_message, find_panic_frame, is_panic_entry, read_source_line, select_error_call,
    FailureCorrelator, PANIC_ENTRY_POINTS,
};
