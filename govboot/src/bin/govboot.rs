//! Entry point of the `govboot` command line tool.

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use govboot::{
    cli::Cli,
    error,
    primitives::logger::{scope_log_context, set_logger, ConsoleLogger},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    set_logger(Arc::new(ConsoleLogger), cli.log_level);

    match scope_log_context(cli.run()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
