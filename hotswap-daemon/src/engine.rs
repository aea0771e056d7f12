//! The single owner of tracker, stager, and coordinator state.
//!
//! Every mutation goes through `&mut Engine`; the runtime keeps the engine on
//! one task and serialises requests onto it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use hotswap_core::{
    Host, HotswapConfig, LoadStatus, ReloadEvent, ReloadEventKind, ReloadPath, ReloadTracker,
    Tick, TickSource,
};
use hotswap_stage::{FileAccess, StageContext, StageOutcome, Stager, StartupFailure, SyntaxValidator};

use crate::coordinator::{BootCallback, BootCoordinator, CapabilitySet, PostReload};

/// What a finished reload cycle did, including the readiness follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub completed: Vec<ReloadPath>,
    pub exception_occurred: bool,
    #[serde(flatten)]
    pub post_reload: PostReload,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub path: ReloadPath,
    pub state: Option<ReloadEventKind>,
    pub last_tick: Option<Tick>,
    pub events: usize,
}

/// Point-in-time view for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub load_status: LoadStatus,
    pub global_tick: Tick,
    pub frame_tick: Tick,
    pub reloading: bool,
    pub reload_pending: bool,
    pub pending: Vec<ReloadPath>,
    pub suppressed: bool,
    pub startup_failure: Option<StartupFailure>,
    pub booted_at: Option<DateTime<Utc>>,
    pub capabilities: usize,
    pub files: Vec<FileStatus>,
}

pub struct Engine<H: Host> {
    tracker: ReloadTracker,
    stager: Stager,
    coordinator: BootCoordinator,
    files: Box<dyn FileAccess>,
    validator: Box<dyn SyntaxValidator>,
    host: H,
    ticks: Arc<dyn TickSource>,
    capabilities: CapabilitySet,
}

impl<H: Host> Engine<H> {
    pub fn new(
        config: HotswapConfig,
        files: Box<dyn FileAccess>,
        validator: Box<dyn SyntaxValidator>,
        host: H,
        ticks: Arc<dyn TickSource>,
        marker_path: PathBuf,
    ) -> Self {
        let tracker = ReloadTracker::with_window(ticks.clone(), config.debounce_window_ticks);
        let coordinator = BootCoordinator::new(
            config.entry_file.clone(),
            config.compiled_entry_file.clone(),
            marker_path,
            ticks.clone(),
        );
        Self {
            tracker,
            stager: Stager::new(config),
            coordinator,
            files,
            validator,
            host,
            ticks,
            capabilities: CapabilitySet::new(),
        }
    }

    pub fn with_boot_callback(mut self, callback: BootCallback) -> Self {
        self.coordinator.set_boot_callback(callback);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn tracker(&self) -> &ReloadTracker {
        &self.tracker
    }

    pub fn coordinator(&self) -> &BootCoordinator {
        &self.coordinator
    }

    pub fn handle_changed_file(&mut self, path: &ReloadPath) -> StageOutcome {
        let status = self.coordinator.status();
        let mut cx = StageContext {
            tracker: &mut self.tracker,
            files: self.files.as_ref(),
            validator: self.validator.as_ref(),
            host: &mut self.host,
            ticks: self.ticks.as_ref(),
            status,
        };
        self.stager.handle_changed_file(path, &mut cx)
    }

    pub fn load_entry(&mut self) -> Option<StageOutcome> {
        let status = self.coordinator.status();
        let mut cx = StageContext {
            tracker: &mut self.tracker,
            files: self.files.as_ref(),
            validator: self.validator.as_ref(),
            host: &mut self.host,
            ticks: self.ticks.as_ref(),
            status,
        };
        self.coordinator.load_entry(&mut self.stager, &mut cx)
    }

    pub fn drain_pending(&mut self) -> Vec<ReloadPath> {
        self.tracker.drain_pending()
    }

    /// Close the active reload cycle. `None` when no cycle was active.
    pub fn complete_reload(&mut self) -> Option<CompletionReport> {
        let report = self.tracker.complete_reload()?;
        if !report.exception_occurred {
            self.host.resume();
            self.host.dismiss_exception_console();
        }
        self.host.reset_frame_accounting();

        let post_reload = self.coordinator.post_reload(
            &self.tracker,
            &self.capabilities,
            self.stager.startup_failure(),
            &mut self.host,
        );

        Some(CompletionReport {
            completed: report.completed,
            exception_occurred: report.exception_occurred,
            post_reload,
        })
    }

    /// The host failed while applying the current cycle.
    pub fn report_exception(&mut self, message: &str) {
        self.tracker.record_exception();
        self.host.report_exception(message);
    }

    pub fn report_capabilities(&mut self, names: impl IntoIterator<Item = String>) {
        self.capabilities = names.into_iter().collect();
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.stager.set_suppressed(suppressed);
    }

    pub fn history(&self, path: &ReloadPath) -> Vec<ReloadEvent> {
        self.tracker.history(path).to_vec()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            load_status: self.coordinator.status(),
            global_tick: self.ticks.global(),
            frame_tick: self.ticks.frame(),
            reloading: self.tracker.is_reloading(),
            reload_pending: self.tracker.is_reload_pending(),
            pending: self.tracker.pending().cloned().collect(),
            suppressed: self.stager.is_suppressed(),
            startup_failure: self.stager.startup_failure().cloned(),
            booted_at: self.coordinator.booted_at(),
            capabilities: self.capabilities.len(),
            files: self
                .tracker
                .records()
                .map(|(path, record)| FileStatus {
                    path: path.clone(),
                    state: record.current().map(|event| event.kind),
                    last_tick: record.current().map(|event| event.tick),
                    events: record.history().len(),
                })
                .collect(),
        }
    }
}
