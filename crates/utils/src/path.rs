use std::{
    env,
    path::{Path, PathBuf},
};

/// Environment variable overriding where the trace document is written.
pub const OUTPUT_ENV: &str = "CALLTRACE_OUTPUT";

/// Well-known location of the trace document.
pub const DEFAULT_OUTPUT: &str = "/tmp/lldb_function_trace.json";

/// Locations used by calltrace on disk.
#[derive(Clone, Debug, Default)]
pub struct TracePath {
    root: Option<PathBuf>,
}

impl TracePath {
    /// New trace path rooted at `root`, or at `~/.calltrace` when `None`.
    pub fn new(root: Option<impl Into<PathBuf>>) -> Self {
        Self { root: root.map(Into::into) }
    }

    /// Resolve the trace document path: explicit path, then `CALLTRACE_OUTPUT`, then
    /// [`DEFAULT_OUTPUT`].
    pub fn resolve(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        match env::var_os(OUTPUT_ENV).filter(|value| !value.is_empty()) {
            Some(value) => PathBuf::from(value),
            None => PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    /// Returns the path to calltrace's home dir: `~/.calltrace` by default.
    pub fn calltrace_dir(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| dirs_next::home_dir().map(|p| p.join(".calltrace")))
    }

    /// Returns the path to the contract registry: `<root>/contracts.json`.
    pub fn contracts_file(&self) -> Option<PathBuf> {
        Some(self.calltrace_dir()?.join("contracts.json"))
    }
}
