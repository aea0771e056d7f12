//! `hotswap watch`: foreground orchestrator.

use anyhow::{Context, Result};
use clap::Args;

use hotswap_daemon::{start_blocking, RunOptions};

use super::Project;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl WatchArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        start_blocking(RunOptions {
            home: project.home.clone(),
            root: project.root.clone(),
            log_json: self.log_json,
        })
        .context("daemon exited with error")
    }
}
