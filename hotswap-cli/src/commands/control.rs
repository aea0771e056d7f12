//! Host-side control commands: `touch`, `history`, `drain`, `complete`,
//! `fail`, `capabilities`, `stop`.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use hotswap_daemon::{
    request_capabilities, request_complete, request_drain, request_fail, request_history,
    request_stop, request_touch, DaemonError,
};

use super::{print_json, Project};

#[derive(Args, Debug)]
pub struct TouchArgs {
    /// Path relative to the project root, e.g. app/player.rb.
    pub path: String,
}

impl TouchArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        let reply = request_touch(&project.socket, &self.path)
            .with_context(|| format!("failed to submit '{}'", self.path))?;
        let result = &reply["result"];
        match result["outcome"].as_str() {
            Some("accepted") => println!("{} {}", "✓".green(), self.path),
            Some("rejected") => println!("{} {} (not a reload candidate)", "-".bright_black(), self.path),
            Some("fatal") => {
                println!("{} {}", "✗".red(), self.path);
                if let Some(message) = result["message"].as_str() {
                    println!("{message}");
                }
                bail!("failed to stage {}", self.path);
            }
            _ => print_json(&reply)?,
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Path relative to the project root.
    pub path: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "tick")]
    tick: i64,
    #[tabled(rename = "event")]
    kind: String,
}

impl HistoryArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        let reply = request_history(&project.socket, &self.path)
            .with_context(|| format!("failed to load history for '{}'", self.path))?;
        if self.json {
            return print_json(&reply);
        }

        let rows: Vec<EventRow> = reply["events"]
            .as_array()
            .map(|events| {
                events
                    .iter()
                    .map(|event| EventRow {
                        tick: event["tick"].as_i64().unwrap_or_default(),
                        kind: event["kind"].as_str().unwrap_or("?").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if rows.is_empty() {
            println!("No reload events for {}.", self.path);
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

pub fn drain(project: &Project) -> Result<()> {
    let reply = request_drain(&project.socket).context("failed to drain pending reloads")?;
    for path in reply["paths"].as_array().into_iter().flatten() {
        if let Some(path) = path.as_str() {
            println!("{path}");
        }
    }
    Ok(())
}

pub fn complete(project: &Project) -> Result<()> {
    let reply = request_complete(&project.socket).context("failed to complete reload cycle")?;
    if reply.is_null() {
        println!("no reload cycle active");
        return Ok(());
    }

    let completed = reply["completed"].as_array().map(Vec::len).unwrap_or(0);
    let status = if reply["exception_occurred"].as_bool().unwrap_or(false) {
        "with exception".red().to_string()
    } else {
        "ok".green().to_string()
    };
    println!("reloaded {completed} file(s), {status}");
    for name in reply["new_capabilities"].as_array().into_iter().flatten() {
        if let Some(name) = name.as_str() {
            println!("  new capability: {name}");
        }
    }
    if reply["became_ready"].as_bool().unwrap_or(false) {
        println!("{}", "ready".green().bold());
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct FailArgs {
    /// Exception description shown by the host.
    pub message: String,
}

impl FailArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        request_fail(&project.socket, &self.message).context("failed to report exception")?;
        println!("exception recorded for the active reload cycle");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CapabilitiesArgs {
    /// Every capability name currently defined by the host.
    pub names: Vec<String>,
}

impl CapabilitiesArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        let reply: Value = request_capabilities(&project.socket, self.names)
            .context("failed to report capabilities")?;
        println!("{} capability name(s) recorded", reply["count"]);
        Ok(())
    }
}

pub fn stop(project: &Project) -> Result<()> {
    match request_stop(&project.socket) {
        Ok(()) => println!("daemon stop requested"),
        Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
        Err(err) => return Err(err).context("failed to stop daemon"),
    }
    Ok(())
}
