//! Boot/ready gate.
//!
//! The process starts in [`LoadStatus::Started`], moves to
//! [`LoadStatus::MainFirstLoad`] once the entry file has been submitted, and
//! becomes [`LoadStatus::Ready`] once the entry file has completed a reload,
//! nothing else is pending, and no startup syntax error is outstanding.
//! Status only moves forward; `Started` never jumps straight to ready.
//! Reaching ready is a one-way, one-time event:
//!
//! 1. both tick counters reset to the sentinel
//! 2. `boot.txt` rewritten with the current Unix time
//! 3. the boot callback fires (at most once per process)
//! 4. the host forgets its tracked modification times

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use hotswap_core::{Host, LoadStatus, ReloadPath, ReloadTracker, TickSource};
use hotswap_stage::{StageContext, StageOutcome, Stager, StartupFailure};

use crate::error::{io_err, DaemonError};

/// Names of the host's top-level callable capabilities.
pub type CapabilitySet = BTreeSet<String>;

/// Handed to the boot callback.
#[derive(Debug, Clone, Serialize)]
pub struct BootInfo {
    pub booted_at: DateTime<Utc>,
    pub marker: PathBuf,
}

pub type BootCallback = Box<dyn FnOnce(&BootInfo) + Send>;

/// What happened after a reload cycle closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostReload {
    pub new_capabilities: Vec<String>,
    pub became_ready: bool,
}

pub struct BootCoordinator {
    status: LoadStatus,
    entry_file: ReloadPath,
    compiled_entry_file: ReloadPath,
    baseline: Option<CapabilitySet>,
    on_boot: Option<BootCallback>,
    marker_path: PathBuf,
    ticks: Arc<dyn TickSource>,
    booted_at: Option<DateTime<Utc>>,
}

impl BootCoordinator {
    pub fn new(
        entry_file: ReloadPath,
        compiled_entry_file: ReloadPath,
        marker_path: PathBuf,
        ticks: Arc<dyn TickSource>,
    ) -> Self {
        Self {
            status: LoadStatus::Started,
            entry_file,
            compiled_entry_file,
            baseline: None,
            on_boot: None,
            marker_path,
            ticks,
            booted_at: None,
        }
    }

    pub fn set_boot_callback(&mut self, callback: BootCallback) {
        self.on_boot = Some(callback);
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == LoadStatus::Ready
    }

    pub fn booted_at(&self) -> Option<DateTime<Utc>> {
        self.booted_at
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Submit the entry file. Only acts while `Started`.
    ///
    /// Returns the staging outcome, or `None` when nothing was submitted.
    pub fn load_entry(
        &mut self,
        stager: &mut Stager,
        cx: &mut StageContext<'_>,
    ) -> Option<StageOutcome> {
        if self.status != LoadStatus::Started {
            return None;
        }

        let outcome = match stager.entry_candidate(cx.files) {
            Some(entry) => {
                tracing::info!(subsystem = "Engine", entry = %entry, "loading entry file");
                Some(stager.handle_forced(&entry, cx))
            }
            None => {
                tracing::warn!(
                    subsystem = "Engine",
                    entry = %self.entry_file,
                    compiled = %self.compiled_entry_file,
                    "no entry file found",
                );
                None
            }
        };
        self.mark_entry_attempted();
        outcome
    }

    /// `Started` -> `MainFirstLoad`. No-op in any later status.
    pub fn mark_entry_attempted(&mut self) {
        if self.status == LoadStatus::Started {
            self.status = LoadStatus::MainFirstLoad;
        }
    }

    /// Flip to ready when the entry file has completed and nothing is pending.
    ///
    /// A latched `startup_failure` pins the process below ready until the
    /// broken file validates again. Returns `true` on the transition.
    pub fn process_load_status(
        &mut self,
        tracker: &ReloadTracker,
        startup_failure: Option<&StartupFailure>,
        host: &mut dyn Host,
    ) -> bool {
        if self.status != LoadStatus::MainFirstLoad || tracker.is_reload_pending() {
            return false;
        }
        if !tracker.has_completed(&self.entry_file) && !tracker.has_completed(&self.compiled_entry_file)
        {
            return false;
        }
        if let Some(failure) = startup_failure {
            tracing::debug!(
                subsystem = "Engine",
                path = %failure.path,
                "held below ready by startup syntax error",
            );
            return false;
        }

        self.status = LoadStatus::Ready;
        self.ticks.reset();

        let booted_at = Utc::now();
        self.booted_at = Some(booted_at);
        if let Err(err) = write_boot_marker(&self.marker_path, booted_at) {
            tracing::warn!(subsystem = "Engine", error = %err, "failed to write boot marker");
        }

        if let Some(callback) = self.on_boot.take() {
            callback(&BootInfo {
                booted_at,
                marker: self.marker_path.clone(),
            });
        }
        host.reset_file_mtimes();
        tracing::info!(subsystem = "Engine", booted_at = %booted_at, "ready");
        true
    }

    /// Capability-delta detection, then [`BootCoordinator::process_load_status`].
    pub fn post_reload(
        &mut self,
        tracker: &ReloadTracker,
        capabilities: &CapabilitySet,
        startup_failure: Option<&StartupFailure>,
        host: &mut dyn Host,
    ) -> PostReload {
        let new_capabilities = self.detect_new_capabilities(capabilities);
        let became_ready = self.process_load_status(tracker, startup_failure, host);
        PostReload {
            new_capabilities,
            became_ready,
        }
    }

    fn detect_new_capabilities(&mut self, current: &CapabilitySet) -> Vec<String> {
        let Some(baseline) = self.baseline.replace(current.clone()) else {
            return Vec::new();
        };
        let added: Vec<String> = current.difference(&baseline).cloned().collect();
        for name in &added {
            tracing::info!(subsystem = "Engine", capability = %name, "new capability available");
        }
        added
    }
}

/// Decimal Unix seconds, overwritten on every ready transition.
pub fn write_boot_marker(path: &Path, at: DateTime<Utc>) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(path, at.timestamp().to_string()).map_err(|e| io_err(path, e))
}

/// `None` when no boot has been recorded yet.
pub fn read_boot_marker(path: &Path) -> Result<Option<i64>, DaemonError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    contents
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|err| DaemonError::BootMarker {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}
