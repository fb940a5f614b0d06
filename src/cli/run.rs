//! `run` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::commit::{BatchTrigger, CommitSource};
use crate::config::Config;
use crate::pipeline::Orchestrator;

/// Reviews every commit once and mails one report per commit.
#[derive(Parser)]
pub struct RunCommand {
    /// Push event document; falls back to the local HEAD when absent.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    /// Repository to inspect.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

impl RunCommand {
    /// Executes the run command.
    ///
    /// Succeeds once every commit was attempted, even if some reports could
    /// not be delivered.
    pub async fn execute(self) -> Result<()> {
        let config = Config::from_env().context("Invalid configuration")?;

        let trigger = BatchTrigger::resolve(self.event_path, &self.repo);
        info!(trigger = ?trigger, "Collecting commits");
        let commits = trigger.collect().context("Failed to collect commits")?;
        if commits.is_empty() {
            println!("No commits to review");
            return Ok(());
        }

        let orchestrator = Orchestrator::from_config(&config, &self.repo).await?;
        let summary = orchestrator.run_batch(&commits).await;
        println!("Reviewed {} commit(s): {summary}", commits.len());
        Ok(())
    }
}
