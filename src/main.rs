mod args;
mod commands;
mod diagnostics;
mod error;
mod modem;
mod shared;
mod tracker;

use anyhow::Result;
use clap::Parser;

use args::{AppCommand, Cli};
use commands::{run_gps, run_send, run_track};

// Top-level entrypoint: parse CLI args, set up logging and dispatch to a command module.
fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level.as_level())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        AppCommand::Track(args) => run_track(args),
        AppCommand::Send(args) => run_send(args),
        AppCommand::Gps(args) => run_gps(args),
    }
}
