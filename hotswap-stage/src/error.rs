//! Error types for hotswap-stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidatorError;

/// Unexpected failures while staging a change.
///
/// These never leave the stager: they are reported to the host and the change
/// is rejected.
#[derive(Debug, Error)]
pub enum StageError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The syntax validator itself could not run.
    #[error("validator error: {0}")]
    Validator(#[from] ValidatorError),
}

/// Convenience constructor for [`StageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StageError {
    StageError::Io {
        path: path.into(),
        source,
    }
}
