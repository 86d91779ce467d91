#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod opts;
mod utils;

use args::{CalltraceArgs, CalltraceSubcommand};
use clap::Parser;
use eyre::Result;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = CalltraceArgs::parse();

    match opts.cmd {
        CalltraceSubcommand::Replay(cmd) => cmd.run(),
        CalltraceSubcommand::Contract(cmd) => cmd.run(),
    }
}
