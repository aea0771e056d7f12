//! # hotswap-stage
//!
//! Change validation and staging.
//!
//! Call [`Stager::handle_changed_file`] for every change the watcher reports.
//! Accepted changes end up in the [`hotswap_core::ReloadTracker`]; syntax
//! failures are either latched (during startup) or surfaced as
//! [`StageOutcome::Fatal`].

pub mod error;
pub mod files;
pub mod mailbox;
pub mod stager;
pub mod validate;

pub use error::StageError;
pub use files::{DiskFiles, FileAccess};
pub use stager::{StageContext, StageOutcome, Stager, StartupFailure};
pub use validate::{AcceptAll, CommandValidator, SyntaxValidator, ValidatorError, Verdict};
