//! Domain types for reload tracking.
//!
//! Paths are identifiers relative to the watched root with `/` separators,
//! never absolute filesystem paths. All event types serialize via serde so the
//! daemon can report them over its status protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

/// Host-supplied frame counter. Advances monotonically within an epoch.
pub type Tick = i64;

/// Value both tick counters are reset to when the process becomes ready.
pub const TICK_SENTINEL: Tick = -1;

/// Repeated mark requests for one path inside this many ticks are dropped.
pub const DEBOUNCE_WINDOW_TICKS: Tick = 60;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a reloadable source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReloadPath(pub String);

impl ReloadPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name component (text after the last `/`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension without the leading dot, if the file name has one.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Everything before the file name, without the trailing `/`.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }

    /// Path of `name` inside this path's directory.
    pub fn sibling(&self, name: &str) -> ReloadPath {
        match self.parent() {
            Some(parent) => ReloadPath(format!("{parent}/{name}")),
            None => ReloadPath(name.to_owned()),
        }
    }
}

impl fmt::Display for ReloadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ReloadPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReloadPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Stage of a single reload transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadEventKind {
    Queued,
    Processing,
    Completed,
}

impl ReloadEventKind {
    /// Queued and Processing both mean the host has not applied the file yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ReloadEventKind::Queued | ReloadEventKind::Processing)
    }
}

impl fmt::Display for ReloadEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadEventKind::Queued => write!(f, "queued"),
            ReloadEventKind::Processing => write!(f, "processing"),
            ReloadEventKind::Completed => write!(f, "completed"),
        }
    }
}

/// Process-wide boot progress. Only ever advances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Started,
    MainFirstLoad,
    Ready,
}

impl LoadStatus {
    /// `Started` and `MainFirstLoad`: syntax errors are tolerated here.
    pub fn is_booting(self) -> bool {
        self != LoadStatus::Ready
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Started => write!(f, "started"),
            LoadStatus::MainFirstLoad => write!(f, "main_first_load"),
            LoadStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Result of asking the tracker to queue a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    Queued,
    Debounced,
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One reload transition for one path. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadEvent {
    pub path: ReloadPath,
    pub tick: Tick,
    pub kind: ReloadEventKind,
}

impl ReloadEvent {
    pub fn new(path: ReloadPath, tick: Tick, kind: ReloadEventKind) -> Self {
        Self { path, tick, kind }
    }
}

/// Audit trail for one path. Created lazily, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReloadRecord {
    current: Option<ReloadEvent>,
    history: Vec<ReloadEvent>,
}

impl FileReloadRecord {
    pub fn current(&self) -> Option<&ReloadEvent> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[ReloadEvent] {
        &self.history
    }

    pub fn is_in_flight(&self) -> bool {
        self.current
            .as_ref()
            .map(|event| event.kind.is_in_flight())
            .unwrap_or(false)
    }

    pub fn has_completed(&self) -> bool {
        self.history
            .iter()
            .any(|event| event.kind == ReloadEventKind::Completed)
    }

    /// Append `event` and make it current.
    pub(crate) fn push(&mut self, event: ReloadEvent) {
        self.current = Some(event.clone());
        self.history.push(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
