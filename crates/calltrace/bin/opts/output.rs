use std::path::PathBuf;

use calltrace_utils::TracePath;
use clap::Parser;

#[derive(Clone, Debug, Default, Parser)]
pub struct OutputOpts {
    /// Where to write the trace document. If not provided, the default is
    /// `/tmp/lldb_function_trace.json`.
    #[clap(long, short, env = "CALLTRACE_OUTPUT", value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl OutputOpts {
    pub fn path(&self) -> PathBuf {
        TracePath::resolve(self.output.as_deref())
    }
}
