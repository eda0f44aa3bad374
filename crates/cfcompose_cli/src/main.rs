//! `cfcompose` binary.

use std::process::ExitCode;

use cfcompose_cli::{Cli, run};
use cfcompose_core::{TracingConfig, load_dotenv};
use clap::Parser;

fn main() -> ExitCode {
    load_dotenv();
    let cli = Cli::parse();

    TracingConfig::new()
        .with_level(cli.log_level.into())
        .with_format(cli.log_format.into())
        .init();

    let mut stdout = std::io::stdout().lock();
    match run(cli.command, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
