//! Change validation and staging.
//!
//! [`Stager::handle_changed_file`] is the gate between a raw change
//! notification and the tracker:
//!
//! 1. extension filter (source or compiled only)
//! 2. suppressed mode short-circuit
//! 3. blank content short-circuit
//! 4. syntax validation for source files
//! 5. mailbox drain, or
//! 6. mark for reload
//! 7. wake the host
//!
//! Nothing raised here reaches the caller: unexpected failures are reported
//! to the host and the change is rejected.

use chrono::{DateTime, Utc};
use serde::Serialize;

use hotswap_core::{
    ConsoleReason, Host, HotswapConfig, LoadStatus, ReloadPath, ReloadTracker, TickSource,
};

use crate::error::{io_err, StageError};
use crate::files::FileAccess;
use crate::mailbox;
use crate::validate::{SyntaxValidator, Verdict};

/// Result of handing one changed path to the stager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Handled; possibly nothing to do.
    Accepted,
    /// Not a reload candidate, or staging failed unexpectedly.
    Rejected,
    /// Syntax error in a live file after boot.
    Fatal { message: String },
}

/// Syntax error latched while the process was still booting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupFailure {
    pub path: ReloadPath,
    pub diagnostic: String,
    pub recorded_at: DateTime<Utc>,
}

/// Collaborators borrowed for the duration of one staging call.
pub struct StageContext<'a> {
    pub tracker: &'a mut ReloadTracker,
    pub files: &'a dyn FileAccess,
    pub validator: &'a dyn SyntaxValidator,
    pub host: &'a mut dyn Host,
    pub ticks: &'a dyn TickSource,
    pub status: LoadStatus,
}

pub struct Stager {
    config: HotswapConfig,
    suppressed: bool,
    startup_failure: Option<StartupFailure>,
}

impl Stager {
    pub fn new(config: HotswapConfig) -> Self {
        let suppressed = config.suppress_hotload;
        Self {
            config,
            suppressed,
            startup_failure: None,
        }
    }

    pub fn config(&self) -> &HotswapConfig {
        &self.config
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        if self.suppressed != suppressed {
            tracing::info!(subsystem = "Engine", suppressed, "hot reload suppression changed");
        }
        self.suppressed = suppressed;
    }

    pub fn startup_failure(&self) -> Option<&StartupFailure> {
        self.startup_failure.as_ref()
    }

    pub fn clear_startup_failure(&mut self) -> Option<StartupFailure> {
        self.startup_failure.take()
    }

    /// Which form of the entry file to load first: compiled wins when both exist.
    pub fn entry_candidate(&self, files: &dyn FileAccess) -> Option<ReloadPath> {
        [&self.config.compiled_entry_file, &self.config.entry_file]
            .into_iter()
            .find(|path| files.path_exists(path))
            .cloned()
    }

    pub fn handle_changed_file(&mut self, path: &ReloadPath, cx: &mut StageContext<'_>) -> StageOutcome {
        self.handle(path, false, cx)
    }

    /// Like [`Stager::handle_changed_file`] but skips the extension and blank
    /// content shortcuts. Validation still applies.
    pub fn handle_forced(&mut self, path: &ReloadPath, cx: &mut StageContext<'_>) -> StageOutcome {
        self.handle(path, true, cx)
    }

    fn handle(&mut self, path: &ReloadPath, force: bool, cx: &mut StageContext<'_>) -> StageOutcome {
        if !force && !self.config.is_reloadable(path) {
            tracing::trace!(subsystem = "Engine", path = %path, "ignored: not a source file");
            return StageOutcome::Rejected;
        }
        if self.suppressed {
            tracing::debug!(subsystem = "Engine", path = %path, "ignored: hot reload suppressed");
            return StageOutcome::Accepted;
        }

        match self.stage(path, force, cx) {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("Failed to stage {path} for reload.\n{err}");
                cx.host.report_exception(&message);
                cx.host.pause();
                cx.host.show_console(ConsoleReason::Exception);
                StageOutcome::Rejected
            }
        }
    }

    fn stage(
        &mut self,
        path: &ReloadPath,
        force: bool,
        cx: &mut StageContext<'_>,
    ) -> Result<StageOutcome, StageError> {
        let content = cx
            .files
            .read_file(path)
            .map_err(|e| io_err(path.as_str(), e))?
            .unwrap_or_default();
        if !force && is_blank(&content) {
            tracing::debug!(subsystem = "Engine", path = %path, "ignored: empty file");
            return Ok(StageOutcome::Accepted);
        }

        if self.config.is_interpretable(path) {
            if let Verdict::Invalid(diagnostic) = cx.validator.validate(&content)? {
                return Ok(self.syntax_failure(path, diagnostic, cx));
            }
            if self.startup_failure.as_ref().is_some_and(|f| f.path == *path) {
                self.startup_failure = None;
                tracing::info!(subsystem = "Engine", path = %path, "startup syntax error corrected");
            }
        }

        if self.config.is_mailbox(path) {
            if let Some(staged) = drain_mailbox(path, cx)? {
                return Ok(self.handle(&staged, true, cx));
            }
        } else {
            cx.tracker.mark_for_reload(path, cx.ticks.global());
        }

        tracing::debug!(
            subsystem = "Engine",
            path = %path,
            tick = cx.ticks.global(),
            "marked for reload",
        );
        cx.host.wake();
        Ok(StageOutcome::Accepted)
    }

    fn syntax_failure(
        &mut self,
        path: &ReloadPath,
        diagnostic: String,
        cx: &mut StageContext<'_>,
    ) -> StageOutcome {
        if cx.status.is_booting() {
            // Queue anyway so the fixed file is picked up through the normal
            // completion path.
            cx.tracker.mark_for_reload(path, cx.ticks.global());
            tracing::warn!(
                subsystem = "Engine",
                path = %path,
                status = %cx.status,
                "syntax error during startup: {diagnostic}",
            );
            self.startup_failure = Some(StartupFailure {
                path: path.clone(),
                diagnostic,
                recorded_at: Utc::now(),
            });
            return StageOutcome::Accepted;
        }

        let message = format!("Failed to reload {path}.\n{diagnostic}");
        cx.host.report_exception(&message);
        cx.host.pause();
        cx.host.show_console(ConsoleReason::ExceptionOnLoad);
        StageOutcome::Fatal { message }
    }
}

/// Move non-empty mailbox content into a fresh staging file.
///
/// Returns the staging path, or `None` when the mailbox is empty.
fn drain_mailbox(
    mailbox_path: &ReloadPath,
    cx: &mut StageContext<'_>,
) -> Result<Option<ReloadPath>, StageError> {
    let contents = cx
        .files
        .read_file(mailbox_path)
        .map_err(|e| io_err(mailbox_path.as_str(), e))?
        .unwrap_or_default();
    let contents = String::from_utf8_lossy(&contents);
    let contents = contents.trim();
    if contents.is_empty() {
        return Ok(None);
    }

    let staged = mailbox::processed_path(mailbox_path, cx.ticks.global());
    cx.files
        .write_file(mailbox_path, b"")
        .map_err(|e| io_err(mailbox_path.as_str(), e))?;
    cx.files
        .write_file(&staged, contents.as_bytes())
        .map_err(|e| io_err(staged.as_str(), e))?;
    tracing::info!(
        subsystem = "Engine",
        mailbox = %mailbox_path,
        staged = %staged,
        "mailbox drained",
    );
    Ok(Some(staged))
}

fn is_blank(content: &[u8]) -> bool {
    content.iter().all(u8::is_ascii_whitespace)
}
