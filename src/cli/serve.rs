//! `serve` command.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::pipeline::Orchestrator;
use crate::server::{self, AppState};

/// Serves `POST /webhook`, `POST /test-email` and `GET /health`.
#[derive(Parser)]
pub struct ServeCommand {
    /// Listen address, overrides `BIND_ADDR` and `PORT`.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Repository used to read commit diffs.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

impl ServeCommand {
    /// Executes the serve command.
    pub async fn execute(self) -> Result<()> {
        let config = Config::from_env().context("Invalid configuration")?;
        let addr = self.listen.unwrap_or(config.server.listen_addr);

        let orchestrator = Orchestrator::from_config(&config, &self.repo).await?;
        let state = AppState::new(Arc::new(orchestrator), config.server.test_recipient.clone());

        server::serve(addr, Arc::new(state), server::shutdown_signal()).await
    }
}
