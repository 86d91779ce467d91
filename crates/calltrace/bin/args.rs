use crate::cmd::{contract::ContractArgs, replay::ReplayArgs};
use clap::{Parser, Subcommand};

/// calltrace: reconstruct the function call tree of a debugged program.
#[derive(Parser, Debug)]
#[command(
    name = "calltrace",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Find more information in our homepage: https://github.com/walnuthq/calltrace",
    next_display_order = None,
)]
pub struct CalltraceArgs {
    #[command(subcommand)]
    pub cmd: CalltraceSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CalltraceSubcommand {
    /// Replay a recorded debugging session and print its call trace.
    #[command(visible_alias = "r")]
    Replay(ReplayArgs),

    /// Manage the contracts of a multi-contract debugging session.
    #[command(visible_alias = "c")]
    Contract(ContractArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        CalltraceArgs::command().debug_assert();
    }

    #[test]
    fn parse_replay() {
        let args = CalltraceArgs::parse_from([
            "calltrace",
            "replay",
            "session.json",
            "--pattern",
            "^erc20::",
            "--output",
            "trace.json",
        ]);
        let CalltraceSubcommand::Replay(replay) = args.cmd else { panic!("expected replay") };
        assert_eq!(replay.pattern.as_deref(), Some("^erc20::"));
        assert_eq!(replay.output.output.as_deref(), Some(std::path::Path::new("trace.json")));
    }
}
