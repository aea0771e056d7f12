//! hotswap daemon: boot coordinator, engine, and the watcher/clock/socket runtime.

pub mod coordinator;
pub mod engine;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use coordinator::{
    read_boot_marker, write_boot_marker, BootCallback, BootCoordinator, BootInfo, CapabilitySet,
    PostReload,
};
pub use engine::{CompletionReport, Engine, EngineStatus, FileStatus};
pub use error::DaemonError;
pub use protocol::{
    request_capabilities, request_complete, request_drain, request_fail, request_history,
    request_status, request_stop, request_touch, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking, RunOptions};
