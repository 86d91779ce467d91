use std::path::PathBuf;

use calltrace_utils::TracePath;
use eyre::{Result, WrapErr};
use regex::Regex;

/// Pattern matching every function.
pub const DEFAULT_PATTERN: &str = ".*";

/// Runtime named in the generic panic message.
pub const DEFAULT_RUNTIME: &str = "Rust";

#[derive(Debug, Default)]
pub struct TraceConfigBuilder {
    pattern: Option<String>,
    output: Option<PathBuf>,
    runtime: Option<String>,
    panic_entry_points: Vec<String>,
}

impl TraceConfigBuilder {
    /// Set the function name pattern breakpoints are placed on.
    /// If not set, every function is traced.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set where the trace document is written.
    /// If not set, the path is resolved by [`TracePath::resolve`].
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Set the runtime named in the generic panic message.
    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Treat an additional function as a panic entry point.
    pub fn panic_entry_point(mut self, function: impl Into<String>) -> Self {
        self.panic_entry_points.push(function.into());
        self
    }

    /// Build the config. Fails if the pattern is not a valid regular expression.
    pub fn build(self) -> Result<TraceConfig> {
        let source = self.pattern.filter(|p| !p.trim().is_empty());
        let source = source.as_deref().unwrap_or(DEFAULT_PATTERN);
        let pattern =
            Regex::new(source).wrap_err_with(|| format!("invalid function pattern `{source}`"))?;

        Ok(TraceConfig {
            pattern,
            output: TracePath::resolve(self.output.as_deref()),
            runtime: self.runtime.unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            panic_entry_points: self.panic_entry_points,
        })
    }
}

/// Settings of one trace session.
#[derive(Clone, Debug)]
pub struct TraceConfig {
    pattern: Regex,
    output: PathBuf,
    runtime: String,
    panic_entry_points: Vec<String>,
}

impl TraceConfig {
    pub fn builder() -> TraceConfigBuilder {
        TraceConfigBuilder::default()
    }

    /// Whether a breakpoint on `function` would fire.
    pub fn matches(&self, function: &str) -> bool {
        self.pattern.is_match(function)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn panic_entry_points(&self) -> &[String] {
        &self.panic_entry_points
    }
}
