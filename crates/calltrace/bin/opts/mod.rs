mod output;
mod registry;

pub use output::OutputOpts;
pub use registry::RegistryOpts;
