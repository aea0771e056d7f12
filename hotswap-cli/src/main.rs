//! hotswap: hot-reload orchestrator CLI.
//!
//! # Usage
//!
//! ```text
//! hotswap [--root <dir>] init [--force]
//! hotswap [--root <dir>] watch [--log-json]
//! hotswap [--root <dir>] status [--json]
//! hotswap [--root <dir>] history <path> [--json]
//! hotswap [--root <dir>] touch <path>
//! hotswap [--root <dir>] drain | complete | stop
//! hotswap [--root <dir>] fail <message>
//! hotswap [--root <dir>] capabilities <name>...
//! hotswap [--root <dir>] check <path>...
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs,
    control::{CapabilitiesArgs, FailArgs, HistoryArgs, TouchArgs},
    init::InitArgs,
    status::StatusArgs,
    watch::WatchArgs,
    Project,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hotswap",
    version,
    about = "Track, validate, and gate live code reloads for a running process",
    long_about = None,
)]
struct Cli {
    /// Project root containing hotswap.yaml and the watched directories.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default hotswap.yaml into the project root.
    Init(InitArgs),

    /// Run the orchestrator in the foreground (watcher + clock + socket server).
    Watch(WatchArgs),

    /// Show load status, pending reloads, and per-file state.
    Status(StatusArgs),

    /// Show the reload history of one file.
    History(HistoryArgs),

    /// Submit a file as changed, as if the watcher had seen it.
    Touch(TouchArgs),

    /// Hand every pending file to the host and open a reload cycle.
    Drain,

    /// Close the active reload cycle.
    Complete,

    /// Report that applying the active cycle raised an exception.
    Fail(FailArgs),

    /// Replace the host's reported capability names.
    Capabilities(CapabilitiesArgs),

    /// Request graceful daemon shutdown.
    Stop,

    /// Validate files locally with the configured syntax checker.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(&cli.root),
        Commands::Check(args) => args.run(&cli.root),
        Commands::Watch(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::Status(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::History(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::Touch(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::Drain => commands::control::drain(&Project::resolve(&cli.root)?),
        Commands::Complete => commands::control::complete(&Project::resolve(&cli.root)?),
        Commands::Fail(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::Capabilities(args) => args.run(&Project::resolve(&cli.root)?),
        Commands::Stop => commands::control::stop(&Project::resolve(&cli.root)?),
    }
}
