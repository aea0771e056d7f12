//! `hotswap init [--force]`

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use hotswap_core::config::{self, HotswapConfig};

/// Write a default hotswap.yaml.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing hotswap.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve project root '{}'", root.display()))?;
        let target = config::config_path_at(&root);
        if target.exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                target.display()
            );
        }

        let defaults = HotswapConfig::default();
        let path = config::save_at(&root, &defaults)
            .with_context(|| format!("failed to write {}", target.display()))?;

        println!("✓ Wrote {}", path.display());
        println!(
            "  Watching {} for .{} / .{} changes, entry file {}",
            defaults
                .watch_dirs
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            defaults.source_extension,
            defaults.compiled_extension,
            defaults.entry_file,
        );
        Ok(())
    }
}
