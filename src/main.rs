mod cli;
mod cmd;
mod command;
mod engine;
mod error;
mod gates;
mod git;
mod harness;
mod history;
mod host;
mod logger;
mod monitor;
mod multiplexer;
mod paths;
mod pool;
mod project;
mod prompt;
mod store;
mod task;
#[cfg(test)]
mod testutil;

use anyhow::Result;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "orange failed");
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let data = paths::DataDir::resolve()?;
    logger::init(&data)?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "orange start");

    cli::run(data)?;
    info!("orange finished successfully");
    Ok(())
}
