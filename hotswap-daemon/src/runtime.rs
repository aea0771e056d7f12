use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use hotswap_core::{config, FrameClock, HotswapConfig, LogHost, ReloadPath};
use hotswap_stage::{AcceptAll, CommandValidator, DiskFiles, SyntaxValidator};

use crate::coordinator::BootInfo;
use crate::engine::Engine;
use crate::error::{io_err, DaemonError};
use crate::paths::{boot_marker_path_at, project_name, socket_path_at, state_dir_at};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Where to watch and where to keep state.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub home: PathBuf,
    pub root: PathBuf,
    pub log_json: bool,
}

#[derive(Debug)]
pub(crate) enum EngineCommand {
    Touch(ReloadPath),
    Drain,
    Complete,
    Fail(String),
    Capabilities(Vec<String>),
    History(ReloadPath),
    Status,
}

pub(crate) struct EngineJob {
    command: EngineCommand,
    source: &'static str,
    respond_to: oneshot::Sender<Result<Value, String>>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(options: RunOptions) -> Result<(), DaemonError> {
    init_tracing(options.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options.home, options.root))
}

/// Run the daemon runtime for one project root.
pub async fn run(home: PathBuf, root: PathBuf) -> Result<(), DaemonError> {
    let root = fs::canonicalize(&root).map_err(|e| io_err(&root, e))?;
    let config = config::load_at(&root)?;
    let project = project_name(&root);
    let state_dir = state_dir_at(&home, &project);
    fs::create_dir_all(&state_dir).map_err(|e| io_err(&state_dir, e))?;
    let socket = socket_path_at(&home, &project);

    let clock = Arc::new(FrameClock::new());
    let engine = build_engine(&config, &root, clock.clone(), boot_marker_path_at(&home, &project));
    let started_at_unix = unix_seconds_now();

    tracing::info!(
        root = %root.display(),
        socket = %socket.display(),
        ticks_per_second = config.ticks_per_second,
        "hotswap daemon starting",
    );

    let (engine_tx, engine_rx) = mpsc::channel::<EngineJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let engine_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = engine_task(engine, engine_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        let watch_dirs = config.watch_dirs.clone();
        let engine_tx = engine_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(root, watch_dirs, engine_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let clock_handle = {
        let shutdown = shutdown_tx.clone();
        let clock = clock.clone();
        let ticks_per_second = config.ticks_per_second;
        tokio::spawn(async move {
            let result = clock_task(clock, ticks_per_second, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let engine_tx = engine_tx.clone();
        let context = StatusContext {
            root: root.clone(),
            socket: socket.clone(),
            started_at_unix,
        };
        tokio::spawn(async move {
            let result = socket_server_task(
                socket,
                context,
                engine_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };
    drop(engine_tx);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task { task: "signal", reason: err.to_string() }),
                    }
                }
            }
        })
    };

    let (engine_result, watcher_result, clock_result, socket_result, signal_result) = tokio::join!(
        engine_handle,
        watcher_handle,
        clock_handle,
        socket_handle,
        signal_handle
    );

    handle_join("engine", engine_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("clock", clock_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

pub(crate) fn build_engine(
    config: &HotswapConfig,
    root: &Path,
    clock: Arc<FrameClock>,
    marker_path: PathBuf,
) -> Engine<LogHost> {
    let validator: Box<dyn SyntaxValidator> = match &config.validator {
        Some(validator) => Box::new(CommandValidator::from_config(validator)),
        None => Box::new(AcceptAll),
    };
    Engine::new(
        config.clone(),
        Box::new(DiskFiles::new(root)),
        validator,
        LogHost::new(),
        clock,
        marker_path,
    )
    .with_boot_callback(Box::new(|info: &BootInfo| {
        tracing::info!(
            subsystem = "Engine",
            booted_at = %info.booted_at,
            marker = %info.marker.display(),
            "first boot complete",
        );
    }))
}

/// Sole owner of the engine. Jobs run one at a time on the blocking pool, so
/// file I/O and validator subprocesses never occupy a runtime worker.
pub(crate) async fn engine_task(
    engine: Engine<LogHost>,
    mut engine_rx: mpsc::Receiver<EngineJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (mut engine, outcome) = on_blocking_pool(engine, |engine| engine.load_entry()).await?;
    if let Some(outcome) = outcome {
        tracing::debug!(outcome = ?outcome, "entry file submitted");
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = engine_rx.recv() => {
                let Some(job) = maybe_job else { break };
                tracing::trace!(source = job.source, command = ?job.command, "engine request");
                let command = job.command;
                let (returned, outcome) = on_blocking_pool(engine, move |engine| {
                    execute(engine, command).map_err(|err| err.to_string())
                })
                .await?;
                engine = returned;
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn on_blocking_pool<T, F>(
    mut engine: Engine<LogHost>,
    work: F,
) -> Result<(Engine<LogHost>, T), DaemonError>
where
    F: FnOnce(&mut Engine<LogHost>) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let output = work(&mut engine);
        (engine, output)
    })
    .await
    .map_err(|err| DaemonError::Task {
        task: "engine",
        reason: err.to_string(),
    })
}

fn execute(engine: &mut Engine<LogHost>, command: EngineCommand) -> Result<Value, DaemonError> {
    let value = match command {
        EngineCommand::Touch(path) => {
            let outcome = engine.handle_changed_file(&path);
            json!({ "path": path, "result": serde_json::to_value(outcome)? })
        }
        EngineCommand::Drain => json!({ "paths": engine.drain_pending() }),
        EngineCommand::Complete => serde_json::to_value(engine.complete_reload())?,
        EngineCommand::Fail(message) => {
            engine.report_exception(&message);
            json!({ "recorded": true })
        }
        EngineCommand::Capabilities(names) => {
            let count = names.len();
            engine.report_capabilities(names);
            json!({ "count": count })
        }
        EngineCommand::History(path) => {
            let events = serde_json::to_value(engine.history(&path))?;
            json!({ "path": path, "events": events })
        }
        EngineCommand::Status => json!({
            "engine": serde_json::to_value(engine.status())?,
            "host": serde_json::to_value(engine.host())?,
        }),
    };
    Ok(value)
}

pub(crate) async fn submit(
    engine_tx: &mpsc::Sender<EngineJob>,
    command: EngineCommand,
    source: &'static str,
) -> Result<Value, DaemonError> {
    let (tx, rx) = oneshot::channel();
    engine_tx
        .send(EngineJob {
            command,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("engine queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("engine response"))?;
    outcome.map_err(DaemonError::Engine)
}

async fn watcher_task(
    root: PathBuf,
    watch_dirs: Vec<PathBuf>,
    engine_tx: mpsc::Sender<EngineJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let files = DiskFiles::new(&root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;

    for dir in &watch_dirs {
        let absolute = root.join(dir);
        if absolute.is_dir() {
            watcher.watch(&absolute, RecursiveMode::Recursive)?;
            tracing::debug!(path = %absolute.display(), "watching source directory");
        } else {
            tracing::warn!(path = %absolute.display(), "watch directory missing, skipped");
        }
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }

                for path in event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    let Some(reload_path) = files.reload_path_for(&path) else {
                        continue;
                    };
                    match submit(&engine_tx, EngineCommand::Touch(reload_path), "watcher").await {
                        Ok(result) => tracing::trace!(result = %result, "change handled"),
                        Err(DaemonError::ChannelClosed(_)) => return Ok(()),
                        Err(err) => tracing::error!(error = %err, "watcher-triggered staging failed"),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Advances the shared tick counters at the configured rate.
pub(crate) async fn clock_task(
    clock: Arc<FrameClock>,
    ticks_per_second: u32,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(ticks_per_second.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                clock.advance();
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct StatusContext {
    root: PathBuf,
    socket: PathBuf,
    started_at_unix: u64,
}

async fn socket_server_task(
    socket: PathBuf,
    context: StatusContext,
    engine_tx: mpsc::Sender<EngineJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let context = context.clone();
                let engine_tx = engine_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, context, engine_tx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    context: StatusContext,
    engine_tx: mpsc::Sender<EngineJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        if request.cmd == "stop" {
            let _ = shutdown_tx.send(());
            write_response(&mut writer, &DaemonResponse::ok(json!({ "stopping": true }))).await?;
            break;
        }

        let response = match command_for(request) {
            Ok(EngineCommand::Status) => match submit(&engine_tx, EngineCommand::Status, "socket").await {
                Ok(engine) => DaemonResponse::ok(build_status_payload(&context, engine)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            Ok(command) => match submit(&engine_tx, command, "socket").await {
                Ok(data) => DaemonResponse::ok(data),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            Err(message) => DaemonResponse::error(message),
        };

        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

/// Map a wire request onto an engine command. `stop` is handled by the caller.
pub(crate) fn command_for(request: DaemonRequest) -> Result<EngineCommand, String> {
    let require_path = |path: Option<String>, cmd: &str| {
        path.filter(|p| !p.trim().is_empty())
            .map(ReloadPath::from)
            .ok_or_else(|| format!("'{cmd}' requires a path"))
    };

    match request.cmd.as_str() {
        "status" => Ok(EngineCommand::Status),
        "touch" => require_path(request.path, "touch").map(EngineCommand::Touch),
        "history" => require_path(request.path, "history").map(EngineCommand::History),
        "drain" => Ok(EngineCommand::Drain),
        "complete" => Ok(EngineCommand::Complete),
        "fail" => Ok(EngineCommand::Fail(
            request
                .message
                .unwrap_or_else(|| "reload failed".to_string()),
        )),
        "capabilities" => Ok(EngineCommand::Capabilities(request.names.unwrap_or_default())),
        other => Err(format!("unknown command '{other}'")),
    }
}

fn build_status_payload(context: &StatusContext, engine: Value) -> Value {
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": context.started_at_unix,
        "root": context.root.display().to_string(),
        "socket": context.socket.display().to_string(),
        "engine": engine["engine"],
        "host": engine["host"],
    })
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::SocketInUse {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            reason: err.to_string(),
        }),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
