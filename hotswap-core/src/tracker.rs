//! Per-path reload lifecycle with debounce and audit history.
//!
//! A path moves `Queued → Processing → Completed`:
//!
//! 1. [`ReloadTracker::mark_for_reload`] queues it (unless debounced) and adds
//!    it to the pending set.
//! 2. [`ReloadTracker::drain_pending`] hands every pending path to the host and
//!    opens a reload cycle.
//! 3. [`ReloadTracker::complete_reload`] closes the cycle once the host has
//!    applied everything.
//!
//! Records are never removed; their history is the audit trail.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::tick::TickSource;
use crate::types::{
    FileReloadRecord, MarkOutcome, ReloadEvent, ReloadEventKind, ReloadPath, Tick,
    DEBOUNCE_WINDOW_TICKS,
};

/// What a finished reload cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Paths moved to Completed, in first-seen order.
    pub completed: Vec<ReloadPath>,
    /// The host reported a failure while applying this cycle.
    pub exception_occurred: bool,
}

/// Owns every [`FileReloadRecord`] and the pending set.
pub struct ReloadTracker {
    records: IndexMap<ReloadPath, FileReloadRecord>,
    pending: IndexSet<ReloadPath>,
    ticks: Arc<dyn TickSource>,
    window: Tick,
    reloading: bool,
    exception_occurred: bool,
}

impl ReloadTracker {
    pub fn new(ticks: Arc<dyn TickSource>) -> Self {
        Self::with_window(ticks, DEBOUNCE_WINDOW_TICKS)
    }

    pub fn with_window(ticks: Arc<dyn TickSource>, window: Tick) -> Self {
        Self {
            records: IndexMap::new(),
            pending: IndexSet::new(),
            ticks,
            window,
            reloading: false,
            exception_occurred: false,
        }
    }

    /// Queue `path` for reload at tick `now`, or drop the request if it
    /// repeats a recent one.
    ///
    /// Only the newest event is consulted. An in-flight path's newest event is
    /// its Queued or Processing entry, never older than the Queued one, so a
    /// separate in-flight check could not debounce anything this one misses.
    pub fn mark_for_reload(&mut self, path: &ReloadPath, now: Tick) -> MarkOutcome {
        let window = self.window;
        let record = self.records.entry(path.clone()).or_default();

        if let Some(recent) = record.history().last() {
            if within_window(recent.tick, now, window) {
                tracing::debug!(
                    subsystem = "Engine",
                    path = %path,
                    tick = now,
                    last = %recent.kind,
                    last_tick = recent.tick,
                    "reload request debounced",
                );
                return MarkOutcome::Debounced;
            }
        }

        record.push(ReloadEvent::new(path.clone(), now, ReloadEventKind::Queued));
        self.pending.insert(path.clone());

        tracing::info!(
            subsystem = "Engine",
            path = %path,
            tick = now,
            frame = self.ticks.frame(),
            "queued to load",
        );
        MarkOutcome::Queued
    }

    /// Move every pending path to Processing and open a reload cycle.
    ///
    /// Returns the paths the host must apply, in the order they were queued.
    /// Empty (and side-effect free) when nothing is pending.
    pub fn drain_pending(&mut self) -> Vec<ReloadPath> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let now = self.ticks.global();
        let drained: Vec<ReloadPath> = self.pending.drain(..).collect();
        for path in &drained {
            self.records
                .entry(path.clone())
                .or_default()
                .push(ReloadEvent::new(path.clone(), now, ReloadEventKind::Processing));
        }

        self.exception_occurred = false;
        self.reloading = true;
        tracing::debug!(
            subsystem = "Engine",
            count = drained.len(),
            tick = now,
            "reload cycle started",
        );
        drained
    }

    /// Close the active reload cycle. `None` when no cycle is active.
    pub fn complete_reload(&mut self) -> Option<CycleReport> {
        if !self.reloading {
            return None;
        }
        self.reloading = false;

        let now = self.ticks.global();
        let frame = self.ticks.frame();
        let mut completed = Vec::new();
        for (path, record) in self.records.iter_mut() {
            if !record.is_in_flight() {
                continue;
            }
            tracing::info!(
                subsystem = "Engine",
                path = %path,
                tick = now,
                frame,
                "reloaded",
            );
            record.push(ReloadEvent::new(path.clone(), now, ReloadEventKind::Completed));
            completed.push(path.clone());
        }

        Some(CycleReport {
            completed,
            exception_occurred: self.exception_occurred,
        })
    }

    /// The host failed while applying the active cycle.
    pub fn record_exception(&mut self) {
        self.exception_occurred = true;
    }

    /// True while any path is Queued or Processing.
    pub fn is_reload_pending(&self) -> bool {
        self.records.values().any(FileReloadRecord::is_in_flight)
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    pub fn exception_occurred(&self) -> bool {
        self.exception_occurred
    }

    pub fn most_recent_history(&self, path: &ReloadPath) -> Option<&ReloadEvent> {
        self.records.get(path).and_then(|record| record.history().last())
    }

    pub fn history(&self, path: &ReloadPath) -> &[ReloadEvent] {
        self.records
            .get(path)
            .map(FileReloadRecord::history)
            .unwrap_or(&[])
    }

    pub fn has_completed(&self, path: &ReloadPath) -> bool {
        self.records
            .get(path)
            .map(FileReloadRecord::has_completed)
            .unwrap_or(false)
    }

    /// Paths awaiting drain, in insertion order.
    pub fn pending(&self) -> impl Iterator<Item = &ReloadPath> {
        self.pending.iter()
    }

    /// Every record ever created, in first-seen order.
    pub fn records(&self) -> impl Iterator<Item = (&ReloadPath, &FileReloadRecord)> {
        self.records.iter()
    }
}

/// `at` is inside the window ending at `now`. An `at` later than `now` was
/// stamped before a tick reset and counts as expired.
fn within_window(at: Tick, now: Tick, window: Tick) -> bool {
    at <= now && now - at < window
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::FrameClock;

    fn tracker_at(tick: Tick) -> (ReloadTracker, Arc<FrameClock>) {
        let clock = Arc::new(FrameClock::starting_at(tick));
        (ReloadTracker::new(clock.clone()), clock)
    }

    fn kinds(tracker: &ReloadTracker, path: &ReloadPath) -> Vec<ReloadEventKind> {
        tracker.history(path).iter().map(|e| e.kind).collect()
    }

    #[test]
    fn within_window_boundaries() {
        assert!(within_window(100, 100, 60));
        assert!(within_window(100, 159, 60));
        assert!(!within_window(100, 160, 60));
        assert!(!within_window(500, 10, 60), "pre-reset ticks are expired");
    }

    #[test]
    fn repeated_mark_inside_window_is_debounced() {
        let (mut tracker, _clock) = tracker_at(10);
        let path = ReloadPath::from("app/main.rb");

        assert_eq!(tracker.mark_for_reload(&path, 10), MarkOutcome::Queued);
        assert_eq!(tracker.mark_for_reload(&path, 11), MarkOutcome::Debounced);

        assert_eq!(kinds(&tracker, &path), vec![ReloadEventKind::Queued]);
        assert_eq!(tracker.pending().count(), 1);
    }

    #[test]
    fn drain_without_pending_is_a_no_op() {
        let (mut tracker, _clock) = tracker_at(0);
        assert!(tracker.drain_pending().is_empty());
        assert!(!tracker.is_reloading());
        assert_eq!(tracker.complete_reload(), None);
    }

    #[test]
    fn complete_without_cycle_is_a_no_op() {
        let (mut tracker, _clock) = tracker_at(0);
        let path = ReloadPath::from("app/a.rb");
        tracker.mark_for_reload(&path, 0);
        assert_eq!(tracker.complete_reload(), None);
        assert_eq!(kinds(&tracker, &path), vec![ReloadEventKind::Queued]);
    }

    #[test]
    fn exception_flag_is_reported_and_cleared_by_next_drain() {
        let (mut tracker, clock) = tracker_at(0);
        let path = ReloadPath::from("app/a.rb");
        tracker.mark_for_reload(&path, 0);
        tracker.drain_pending();
        tracker.record_exception();
        let report = tracker.complete_reload().expect("cycle active");
        assert!(report.exception_occurred);

        clock.set(100);
        tracker.mark_for_reload(&path, 100);
        tracker.drain_pending();
        assert!(!tracker.exception_occurred());
    }

    #[test]
    fn mark_after_tick_reset_is_not_debounced_by_old_epoch() {
        let (mut tracker, clock) = tracker_at(900);
        let path = ReloadPath::from("app/a.rb");
        tracker.mark_for_reload(&path, 900);
        tracker.drain_pending();
        tracker.complete_reload();

        clock.reset();
        assert_eq!(tracker.mark_for_reload(&path, 5), MarkOutcome::Queued);
    }

    #[test]
    fn pending_preserves_insertion_order() {
        let (mut tracker, _clock) = tracker_at(0);
        for name in ["app/c.rb", "app/a.rb", "app/b.rb"] {
            tracker.mark_for_reload(&ReloadPath::from(name), 0);
        }
        let drained: Vec<String> = tracker.drain_pending().into_iter().map(|p| p.0).collect();
        assert_eq!(drained, vec!["app/c.rb", "app/a.rb", "app/b.rb"]);
    }
}
