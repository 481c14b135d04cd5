use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::error;
use readforge::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.init_logging();

    match try_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> anyhow::Result<()> {
    let config = cli.into_config();
    readforge::run(config).context("simulation run failed")?;
    Ok(())
}
