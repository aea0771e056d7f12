//! Boot-to-ready lifecycle driven through the public engine API.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use hotswap_core::{
    ConsoleReason, FrameClock, Host, HotswapConfig, LoadStatus, ReloadPath, ReloadTracker,
    TickSource, TICK_SENTINEL,
};
use hotswap_daemon::{read_boot_marker, BootCoordinator, Engine};
use hotswap_stage::{DiskFiles, StageOutcome, Verdict};
use tempfile::TempDir;

#[derive(Debug, Default)]
struct RecordingHost {
    calls: Vec<String>,
}

impl RecordingHost {
    fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }
}

impl Host for RecordingHost {
    fn pause(&mut self) {
        self.calls.push("pause".into());
    }
    fn resume(&mut self) {
        self.calls.push("resume".into());
    }
    fn dismiss_exception_console(&mut self) {
        self.calls.push("dismiss_console".into());
    }
    fn show_console(&mut self, reason: ConsoleReason) {
        self.calls.push(format!("show_console:{reason:?}"));
    }
    fn report_exception(&mut self, _message: &str) {
        self.calls.push("report_exception".into());
    }
    fn reset_frame_accounting(&mut self) {
        self.calls.push("reset_frame_accounting".into());
    }
    fn reset_file_mtimes(&mut self) {
        self.calls.push("reset_file_mtimes".into());
    }
    fn wake(&mut self) {
        self.calls.push("wake".into());
    }
}

fn write(root: &Path, path: &str, contents: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    fs::write(target, contents).expect("write");
}

fn engine(root: &TempDir, clock: Arc<FrameClock>) -> Engine<RecordingHost> {
    let validator = |src: &[u8]| {
        if String::from_utf8_lossy(src).contains("BROKEN") {
            Verdict::Invalid("syntax error, unexpected end-of-input".to_string())
        } else {
            Verdict::Valid
        }
    };
    Engine::new(
        HotswapConfig::default(),
        Box::new(DiskFiles::new(root.path())),
        Box::new(validator),
        RecordingHost::default(),
        clock,
        root.path().join("state").join("boot.txt"),
    )
}

fn cycle(engine: &mut Engine<RecordingHost>) -> hotswap_daemon::CompletionReport {
    engine.drain_pending();
    engine.complete_reload().expect("active cycle")
}

#[test]
fn clean_boot_reaches_ready_once() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick(args); end");
    let clock = Arc::new(FrameClock::starting_at(1));
    let mut engine = engine(&root, clock.clone());

    assert_eq!(engine.load_entry(), Some(StageOutcome::Accepted));
    assert_eq!(engine.coordinator().status(), LoadStatus::MainFirstLoad);
    assert_eq!(engine.load_entry(), None, "entry is only loaded while Started");

    let report = cycle(&mut engine);
    assert_eq!(report.completed, vec![ReloadPath::from("app/main.rb")]);
    assert!(report.post_reload.became_ready);
    assert!(engine.coordinator().is_ready());
    assert_eq!(clock.global(), TICK_SENTINEL);
    assert_eq!(engine.host().count("reset_file_mtimes"), 1);
    assert_eq!(engine.host().count("resume"), 1);

    let marker = read_boot_marker(&root.path().join("state/boot.txt")).expect("marker");
    assert!(marker.is_some());
}

#[test]
fn unrelated_pending_file_holds_ready() {
    let state = TempDir::new().expect("state");
    let clock = Arc::new(FrameClock::new());
    let mut tracker = ReloadTracker::new(clock.clone());
    let mut coord = BootCoordinator::new(
        ReloadPath::from("app/main.rb"),
        ReloadPath::from("app/main.rbc"),
        state.path().join("boot.txt"),
        clock,
    );
    let mut host = RecordingHost::default();
    coord.mark_entry_attempted();

    tracker.mark_for_reload(&ReloadPath::from("app/main.rb"), 0);
    tracker.drain_pending();
    tracker.complete_reload();
    tracker.mark_for_reload(&ReloadPath::from("app/enemy.rb"), 10);

    assert!(!coord.process_load_status(&tracker, None, &mut host));
    assert_eq!(coord.status(), LoadStatus::MainFirstLoad);

    tracker.drain_pending();
    tracker.complete_reload();
    assert!(coord.process_load_status(&tracker, None, &mut host));
}

#[test]
fn startup_syntax_error_pins_below_ready_until_fixed() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick BROKEN");
    let clock = Arc::new(FrameClock::starting_at(1));
    let mut engine = engine(&root, clock.clone());
    let marker = root.path().join("state/boot.txt");

    assert_eq!(engine.load_entry(), Some(StageOutcome::Accepted));
    let status = engine.status();
    assert_eq!(status.pending, vec![ReloadPath::from("app/main.rb")]);
    let failure = status.startup_failure.expect("latched");
    assert!(failure.diagnostic.contains("unexpected end-of-input"));

    let report = cycle(&mut engine);
    assert!(!report.post_reload.became_ready);
    assert_eq!(engine.coordinator().status(), LoadStatus::MainFirstLoad);
    assert!(!marker.exists(), "no boot marker for a broken boot");
    assert_eq!(engine.host().count("reset_file_mtimes"), 0);

    write(root.path(), "app/main.rb", "def tick(args); end");
    clock.set(200);
    assert_eq!(
        engine.handle_changed_file(&ReloadPath::from("app/main.rb")),
        StageOutcome::Accepted
    );
    assert!(engine.status().startup_failure.is_none());
    assert_eq!(engine.coordinator().status(), LoadStatus::MainFirstLoad);

    let report = cycle(&mut engine);
    assert!(report.post_reload.became_ready);
    assert_eq!(engine.status().load_status, LoadStatus::Ready);
    assert!(read_boot_marker(&marker).expect("marker").is_some());
}

#[test]
fn entry_change_before_load_entry_stays_started() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick(args); end");
    let mut engine = engine(&root, Arc::new(FrameClock::starting_at(1)));

    engine.handle_changed_file(&ReloadPath::from("app/main.rb"));
    let report = cycle(&mut engine);
    assert!(!report.post_reload.became_ready);
    assert_eq!(engine.coordinator().status(), LoadStatus::Started);

    engine.load_entry();
    assert_eq!(engine.coordinator().status(), LoadStatus::MainFirstLoad);
}

#[test]
fn syntax_error_after_ready_is_fatal_and_not_queued() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick(args); end");
    let clock = Arc::new(FrameClock::starting_at(1));
    let mut engine = engine(&root, clock.clone());
    engine.load_entry();
    cycle(&mut engine);

    clock.set(100);
    write(root.path(), "app/enemy.rb", "class Enemy BROKEN");
    let outcome = engine.handle_changed_file(&ReloadPath::from("app/enemy.rb"));

    assert!(matches!(outcome, StageOutcome::Fatal { ref message } if message.starts_with("Failed to reload app/enemy.rb.")));
    assert!(engine.history(&ReloadPath::from("app/enemy.rb")).is_empty());
    assert!(!engine.tracker().is_reload_pending());
    assert_eq!(engine.host().count("pause"), 1);
    assert!(engine
        .host()
        .calls
        .contains(&"show_console:ExceptionOnLoad".to_string()));
}

#[test]
fn failed_cycle_does_not_resume() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick(args); end");
    let mut engine = engine(&root, Arc::new(FrameClock::new()));
    engine.load_entry();

    engine.drain_pending();
    engine.report_exception("NoMethodError: undefined method `tick'");
    let report = engine.complete_reload().expect("active cycle");

    assert!(report.exception_occurred);
    assert_eq!(engine.host().count("resume"), 0);
    assert_eq!(engine.host().count("dismiss_console"), 0);
    assert_eq!(engine.host().count("reset_frame_accounting"), 1);
}

#[test]
fn new_capabilities_are_reported_after_reload() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/main.rb", "def tick(args); end");
    let clock = Arc::new(FrameClock::starting_at(1));
    let mut engine = engine(&root, clock.clone());
    engine.load_entry();

    engine.report_capabilities(vec!["tick".to_string()]);
    let first = cycle(&mut engine);
    assert!(first.post_reload.new_capabilities.is_empty());

    clock.set(300);
    write(root.path(), "app/spawner.rb", "def spawn_enemy; end");
    engine.handle_changed_file(&ReloadPath::from("app/spawner.rb"));
    engine.report_capabilities(vec!["tick".to_string(), "spawn_enemy".to_string()]);
    let second = cycle(&mut engine);
    assert_eq!(second.post_reload.new_capabilities, vec!["spawn_enemy".to_string()]);
    assert_eq!(engine.status().capabilities, 2);
}

#[test]
fn suppressed_engine_ignores_changes() {
    let root = TempDir::new().expect("root");
    write(root.path(), "app/enemy.rb", "class Enemy; end");
    let mut engine = engine(&root, Arc::new(FrameClock::new()));

    engine.set_suppressed(true);
    assert_eq!(
        engine.handle_changed_file(&ReloadPath::from("app/enemy.rb")),
        StageOutcome::Accepted
    );
    assert!(engine.status().suppressed);
    assert!(engine.status().pending.is_empty());
}
