pub mod check;
pub mod control;
pub mod init;
pub mod status;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use hotswap_daemon::paths::{project_name, socket_path_at};

/// A resolved project root and the daemon socket that serves it.
#[derive(Debug, Clone)]
pub struct Project {
    pub home: PathBuf,
    pub root: PathBuf,
    pub socket: PathBuf,
}

impl Project {
    pub fn resolve(root: &Path) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve project root '{}'", root.display()))?;
        let socket = socket_path_at(&home, &project_name(&root));
        Ok(Self { home, root, socket })
    }
}

/// Pretty-print a JSON payload from the daemon.
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
