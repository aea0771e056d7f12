//! Host-side effects fired by the reload pipeline.
//!
//! The host owns execution, the developer console, and the file watcher's
//! modification-time table. The orchestrator only asks it to act.

use serde::Serialize;

/// Why the developer console is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleReason {
    /// An unexpected failure while staging a change.
    Exception,
    /// A syntax error in a file that was already live.
    ExceptionOnLoad,
}

/// Side-effect sink implemented by the embedding host.
pub trait Host: Send {
    fn pause(&mut self);

    fn resume(&mut self);

    /// Hide the console if it was opened because of an exception.
    fn dismiss_exception_console(&mut self);

    fn show_console(&mut self, reason: ConsoleReason);

    /// Pretty-print and export an unexpected failure.
    fn report_exception(&mut self, message: &str);

    fn reset_frame_accounting(&mut self);

    /// Forget every tracked modification time so the next scan starts fresh.
    fn reset_file_mtimes(&mut self);

    /// Leave idle/subdued mode because work arrived.
    fn wake(&mut self);
}

/// Host that only logs and remembers whether execution is paused.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LogHost {
    paused: bool,
    console: Option<ConsoleReason>,
    exceptions: usize,
    mtime_resets: usize,
}

impl LogHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn console(&self) -> Option<ConsoleReason> {
        self.console
    }

    pub fn exceptions(&self) -> usize {
        self.exceptions
    }

    pub fn mtime_resets(&self) -> usize {
        self.mtime_resets
    }
}

impl Host for LogHost {
    fn pause(&mut self) {
        self.paused = true;
        tracing::info!(subsystem = "Engine", "execution paused");
    }

    fn resume(&mut self) {
        if self.paused {
            tracing::info!(subsystem = "Engine", "execution resumed");
        }
        self.paused = false;
    }

    fn dismiss_exception_console(&mut self) {
        if self.console.take().is_some() {
            tracing::debug!(subsystem = "Engine", "exception console dismissed");
        }
    }

    fn show_console(&mut self, reason: ConsoleReason) {
        self.console = Some(reason);
        tracing::warn!(subsystem = "Engine", reason = ?reason, "console shown");
    }

    fn report_exception(&mut self, message: &str) {
        self.exceptions += 1;
        tracing::error!(subsystem = "Engine", "{message}");
    }

    fn reset_frame_accounting(&mut self) {
        tracing::trace!(subsystem = "Engine", "frame accounting reset");
    }

    fn reset_file_mtimes(&mut self) {
        self.mtime_resets += 1;
        tracing::debug!(subsystem = "Engine", "tracked mtimes reset");
    }

    fn wake(&mut self) {
        tracing::trace!(subsystem = "Engine", "woken from idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_host_tracks_pause_and_console() {
        let mut host = LogHost::new();
        host.pause();
        host.show_console(ConsoleReason::Exception);
        assert!(host.is_paused());
        assert_eq!(host.console(), Some(ConsoleReason::Exception));

        host.resume();
        host.dismiss_exception_console();
        assert!(!host.is_paused());
        assert_eq!(host.console(), None);

        host.report_exception("Failed to reload app/main.rb.");
        host.reset_file_mtimes();
        assert_eq!(host.exceptions(), 1);
        assert_eq!(host.mtime_resets(), 1);
    }
}
