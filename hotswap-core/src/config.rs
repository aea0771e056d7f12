//! Per-project `hotswap.yaml` configuration.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   hotswap.yaml   (optional, every field has a default)
//!   app/main.rb    (default entry file)
//! ```
//!
//! # API pattern
//!
//! Loading and saving take the project root explicitly (`load_at(root)`),
//! so tests can point them at a `TempDir`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ReloadPath, Tick, DEBOUNCE_WINDOW_TICKS};

/// File name of the project configuration.
pub const CONFIG_FILE: &str = "hotswap.yaml";

/// External syntax checker, run with the candidate source on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// The checker is killed, and the change treated as unstageable, after
    /// this many milliseconds.
    #[serde(default = "default_validator_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_validator_timeout_ms() -> u64 {
    5_000
}

/// Everything the orchestrator needs to know about a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotswapConfig {
    /// Interpretable source extension, validated before reload.
    pub source_extension: String,
    /// Pre-compiled source extension, reloaded without validation.
    pub compiled_extension: String,
    pub entry_file: ReloadPath,
    pub compiled_entry_file: ReloadPath,
    /// File name of the drop-box inbox.
    pub mailbox_file: String,
    pub debounce_window_ticks: Tick,
    pub ticks_per_second: u32,
    /// Directories under the root that the watcher observes.
    pub watch_dirs: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorConfig>,
    pub suppress_hotload: bool,
}

impl Default for HotswapConfig {
    fn default() -> Self {
        Self {
            source_extension: "rb".to_string(),
            compiled_extension: "rbc".to_string(),
            entry_file: ReloadPath::from("app/main.rb"),
            compiled_entry_file: ReloadPath::from("app/main.rbc"),
            mailbox_file: "mailbox.rb".to_string(),
            debounce_window_ticks: DEBOUNCE_WINDOW_TICKS,
            ticks_per_second: 60,
            watch_dirs: vec![PathBuf::from("app")],
            validator: None,
            suppress_hotload: false,
        }
    }
}

impl HotswapConfig {
    /// Whether `path` has one of the two recognized extensions.
    pub fn is_reloadable(&self, path: &ReloadPath) -> bool {
        matches!(path.extension(), Some(ext) if ext == self.source_extension || ext == self.compiled_extension)
    }

    /// Whether `path` must go through the syntax validator.
    pub fn is_interpretable(&self, path: &ReloadPath) -> bool {
        path.extension() == Some(self.source_extension.as_str())
    }

    pub fn is_mailbox(&self, path: &ReloadPath) -> bool {
        path.file_name() == self.mailbox_file
    }

    /// Either form of the entry file.
    pub fn is_entry(&self, path: &ReloadPath) -> bool {
        *path == self.entry_file || *path == self.compiled_entry_file
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `<root>/hotswap.yaml`: pure, no I/O.
pub fn config_path_at(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load `<root>/hotswap.yaml`, falling back to defaults when it is absent.
///
/// Returns `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(root: &Path) -> Result<HotswapConfig, ConfigError> {
    let path = config_path_at(root);
    if !path.exists() {
        return Ok(HotswapConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(HotswapConfig::default());
    }
    let config: HotswapConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path: path.clone(), source: e })?;
    validate(&path, &config)?;
    Ok(config)
}

/// Atomically write `config` to `<root>/hotswap.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(root: &Path, config: &HotswapConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(root);
    let tmp_path = path.with_file_name(format!("{CONFIG_FILE}.tmp"));
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

fn validate(path: &Path, config: &HotswapConfig) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    };
    if config.source_extension.is_empty() || config.compiled_extension.is_empty() {
        return Err(invalid("extensions must not be empty".to_string()));
    }
    if config.source_extension == config.compiled_extension {
        return Err(invalid(format!(
            "source and compiled extensions are both '{}'",
            config.source_extension
        )));
    }
    if config.debounce_window_ticks < 0 {
        return Err(invalid(format!(
            "debounce_window_ticks must be >= 0, got {}",
            config.debounce_window_ticks
        )));
    }
    if config.ticks_per_second == 0 {
        return Err(invalid("ticks_per_second must be > 0".to_string()));
    }
    if config.mailbox_file.contains('/') {
        return Err(invalid(format!(
            "mailbox_file must be a bare file name, got '{}'",
            config.mailbox_file
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
