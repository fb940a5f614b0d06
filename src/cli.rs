//! CLI interface for commit-mailer.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod run;
pub mod serve;

/// commit-mailer: reviews commits with a language model and mails the results.
#[derive(Parser)]
#[command(name = "commit-mailer")]
#[command(about = "Reviews commits with a language model and emails the author", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Serves the webhook endpoint.
    Serve(serve::ServeCommand),
    /// Reviews the commits of a CI event file or the local HEAD once.
    Run(run::RunCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(serve_cmd) => serve_cmd.execute().await,
            Commands::Run(run_cmd) => run_cmd.execute().await,
        }
    }
}
