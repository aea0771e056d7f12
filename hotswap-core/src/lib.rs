//! hotswap core library: reload tracking, domain types, configuration.
//!
//! Public API surface:
//! - [`types`]: newtypes, events, records, load status
//! - [`tracker`]: [`ReloadTracker`], the per-path reload state machine
//! - [`tick`]: [`TickSource`] and the atomic [`FrameClock`]
//! - [`host`]: [`Host`] side-effect sink
//! - [`config`]: `hotswap.yaml` load / save
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod host;
pub mod tick;
pub mod tracker;
pub mod types;

pub use config::{HotswapConfig, ValidatorConfig};
pub use error::ConfigError;
pub use host::{ConsoleReason, Host, LogHost};
pub use tick::{FrameClock, TickSource};
pub use tracker::{CycleReport, ReloadTracker};
pub use types::{
    FileReloadRecord, LoadStatus, MarkOutcome, ReloadEvent, ReloadEventKind, ReloadPath, Tick,
    DEBOUNCE_WINDOW_TICKS, TICK_SENTINEL,
};
