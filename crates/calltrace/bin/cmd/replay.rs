use std::path::PathBuf;

use calltrace_tracer::{replay, RecordedSession, TraceConfig, TraceReport};
use clap::Parser;
use eyre::Result;
use yansi::Paint;

use crate::opts::OutputOpts;

const BANNER: &str = "--- Function Trace (JSON) ---";
const FOOTER: &str = "-----------------------------";

/// CLI arguments for `calltrace replay`.
#[derive(Clone, Debug, Parser)]
pub struct ReplayArgs {
    /// The recorded session script to replay.
    pub script: PathBuf,

    /// Only trace functions whose name matches this regular expression.
    /// If not provided, every function is traced.
    #[arg(long, short, value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Treat an additional function as a panic entry point. Can be repeated.
    #[arg(long = "panic-entry", value_name = "FUNCTION")]
    pub panic_entries: Vec<String>,

    #[command(flatten)]
    pub output: OutputOpts,
}

impl ReplayArgs {
    pub fn run(self) -> Result<()> {
        let session = RecordedSession::load(&self.script)?;

        let mut builder = TraceConfig::builder().output(self.output.path());
        if let Some(pattern) = &self.pattern {
            builder = builder.pattern(pattern);
        }
        for entry in &self.panic_entries {
            builder = builder.panic_entry_point(entry);
        }
        let config = builder.build()?;
        let output = config.output().clone();

        debug!(script = ?self.script, pattern = config.pattern(), "replaying session");
        let report = replay(&session, config)?;
        print_report(&report);

        match report.persist(&output) {
            Ok(()) => println!("Trace written to {}", output.display().green()),
            Err(err) => {
                // the trace itself was already printed
                debug!(?output, "failed to write trace: {err:?}");
                eprintln!("{} {err:#}", "Failed to write trace:".red());
            }
        }

        Ok(())
    }
}

fn print_report(report: &TraceReport) {
    println!("{BANNER}");
    println!("{}", report.document);
    println!("{FOOTER}");

    if report.status.is_error {
        println!("{} {}", "Execution failed:".red().bold(), report.status.error_message);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_replay_writes_trace() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("session.json");
        fs::write(
            &script,
            r#"{
                "events": [
                    {
                        "event": "entry",
                        "backtrace": [
                            { "function": "erc20::Token::mint", "file": "lib.rs", "line": 4 }
                        ]
                    }
                ],
                "stop": { "reason": { "kind": "exited", "code": 0 } }
            }"#,
        )
        .unwrap();
        let output = dir.path().join("out").join("trace.json");

        let args = ReplayArgs {
            script,
            pattern: Some("^erc20::".to_string()),
            panic_entries: vec![],
            output: OutputOpts { output: Some(output.clone()) },
        };
        args.run().unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["status"], "success");
        assert_eq!(written["calls"][0]["function"], "erc20::Token::mint");
    }

    #[test]
    fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReplayArgs {
            script: dir.path().join("missing.json"),
            pattern: None,
            panic_entries: vec![],
            output: OutputOpts { output: Some(dir.path().join("trace.json")) },
        };
        assert!(args.run().is_err());
    }
}
