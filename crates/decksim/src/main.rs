#![warn(missing_docs)]

//! Entry point for the `decksim` binary.

mod cli;
mod error;
mod sim;
mod term;

use std::process;

use clap::Parser;
use tracing::error;

use crate::{cli::Cli, error::Result};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and run the simulation.
fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::install_stderr(&cli.log.spec());
    sim::run(&cli)
}
