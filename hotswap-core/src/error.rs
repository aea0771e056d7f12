//! Error types for hotswap-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or saving project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, read-only root, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML with values the orchestrator cannot work with.
    #[error("invalid config at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
