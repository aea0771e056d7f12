use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, coordinator, and protocol client.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(#[from] hotswap_core::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Malformed request or response on the control socket.
    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The engine accepted the job but could not serve it.
    #[error("engine error: {0}")]
    Engine(String),

    #[error("boot marker {path} is not a unix timestamp: {reason}")]
    BootMarker { path: PathBuf, reason: String },

    #[error("another daemon already serves {socket}")]
    SocketInUse { socket: PathBuf },

    #[error("{task} task failed: {reason}")]
    Task { task: &'static str, reason: String },

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
