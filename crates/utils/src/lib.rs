#[macro_use]
extern crate tracing;

pub mod path;
pub mod store;

pub use path::TracePath;
pub use store::{load_json, save_json, write_trace};
