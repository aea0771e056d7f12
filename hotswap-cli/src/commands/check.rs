//! `hotswap check <path>...`: validate without a running daemon.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use hotswap_core::{config, ReloadPath};
use hotswap_stage::{
    AcceptAll, CommandValidator, DiskFiles, FileAccess, SyntaxValidator, Verdict,
};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Paths relative to the project root.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

impl CheckArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let config = config::load_at(root)
            .with_context(|| format!("failed to load config under {}", root.display()))?;
        let validator: Box<dyn SyntaxValidator> = match &config.validator {
            Some(validator) => Box::new(CommandValidator::from_config(validator)),
            None => Box::new(AcceptAll),
        };
        let files = DiskFiles::new(root);

        let mut failures = 0usize;
        for raw in &self.paths {
            let path = ReloadPath::from(raw.as_str());
            if !config.is_interpretable(&path) {
                println!("{} {} (not validated)", "-".bright_black(), path);
                continue;
            }
            let contents = files
                .read_file(&path)
                .with_context(|| format!("failed to read {path}"))?
                .with_context(|| format!("{path} does not exist"))?;
            match validator
                .validate(&contents)
                .with_context(|| format!("failed to validate {path}"))?
            {
                Verdict::Valid => println!("{} {}", "✓".green(), path),
                Verdict::Invalid(diagnostic) => {
                    failures += 1;
                    println!("{} {}\n{}", "✗".red(), path, diagnostic);
                }
            }
        }

        if failures > 0 {
            bail!("{failures} file(s) failed syntax validation");
        }
        Ok(())
    }
}
