use clap::{Parser, Subcommand};

use lading_app::config::LoggingConfig;

mod check;
mod run;

#[derive(Debug, Parser)]
#[command(name = "lading", about = "Lading container packing CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Drive a plan's steps through a packing session
    Run(run::RunArgs),

    /// Validate a plan without calling the solver
    Check(check::CheckArgs),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Run(args) => run::run(args).await,
            Commands::Check(args) => check::run(&args),
        }
    }
}
