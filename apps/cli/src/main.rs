//! OptDesk CLI — staged optimization-modeling assistant.
//!
//! Submits an optimization problem to the solver service and prints the
//! four answer artifacts (insights, formulation, code, solution) as they
//! arrive.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
