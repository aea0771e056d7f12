//! `hotswap status`: load status and per-file reload state.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};
use tabled::{settings::Style, Table, Tabled};

use hotswap_daemon::{request_status, DaemonError};

use super::{print_json, Project};

/// Arguments for `hotswap status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, project: &Project) -> Result<()> {
        let status = match request_status(&project.socket) {
            Ok(status) => status,
            Err(DaemonError::DaemonNotRunning { .. }) => json!({
                "running": false,
                "root": project.root.display().to_string(),
                "socket": project.socket.display().to_string(),
            }),
            Err(err) => return Err(err).context("failed to query daemon status"),
        };

        if self.json {
            return print_json(&status);
        }
        print_table(&status);
        Ok(())
    }
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "file")]
    path: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "last tick")]
    last_tick: String,
    #[tabled(rename = "events")]
    events: u64,
}

fn print_table(status: &Value) {
    if !status["running"].as_bool().unwrap_or(false) {
        println!(
            "{} daemon is not running (socket: {})",
            "■".bright_black().bold(),
            status["socket"].as_str().unwrap_or("?"),
        );
        return;
    }

    let engine = &status["engine"];
    let load_status = engine["load_status"].as_str().unwrap_or("unknown");
    let pending = engine["pending"].as_array().map(Vec::len).unwrap_or(0);
    println!(
        "hotswap v{} | {} | tick {} | {} pending{}",
        env!("CARGO_PKG_VERSION"),
        load_status_label(load_status),
        engine["global_tick"],
        pending,
        if engine["suppressed"].as_bool().unwrap_or(false) {
            " | suppressed".yellow().to_string()
        } else {
            String::new()
        },
    );

    if let Some(line) = uptime_line(status, Utc::now()) {
        println!("{line}");
    }
    if status["host"]["paused"].as_bool().unwrap_or(false) {
        println!("{}", "Execution paused.".red().bold());
    }
    if let Some(failure) = engine["startup_failure"].as_object() {
        println!(
            "{} {}\n{}",
            "Startup syntax error in".red().bold(),
            failure.get("path").and_then(Value::as_str).unwrap_or("?"),
            failure.get("diagnostic").and_then(Value::as_str).unwrap_or(""),
        );
    }

    let rows: Vec<FileRow> = engine["files"]
        .as_array()
        .map(|files| files.iter().map(file_row).collect())
        .unwrap_or_default();
    if rows.is_empty() {
        println!("No files tracked yet.");
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn file_row(file: &Value) -> FileRow {
    FileRow {
        path: file["path"].as_str().unwrap_or("?").to_string(),
        state: state_label(file["state"].as_str()),
        last_tick: file["last_tick"]
            .as_i64()
            .map(|tick| tick.to_string())
            .unwrap_or_else(|| "-".to_string()),
        events: file["events"].as_u64().unwrap_or(0),
    }
}

fn uptime_line(status: &Value, now: DateTime<Utc>) -> Option<String> {
    let started = Utc.timestamp_opt(status["started_at_unix"].as_i64()?, 0).single()?;
    let mut line = format!("up {}", format_duration(now - started));
    if let Some(booted) = status["engine"]["booted_at"]
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    {
        line.push_str(&format!(
            ", booted {}",
            booted.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ));
    }
    Some(line)
}

fn format_duration(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

fn load_status_label(status: &str) -> String {
    match status {
        "ready" => "READY".green().bold().to_string(),
        "main_first_load" => "LOADING ENTRY".yellow().bold().to_string(),
        "started" => "STARTED".bright_black().bold().to_string(),
        other => other.to_uppercase(),
    }
}

fn state_label(state: Option<&str>) -> String {
    match state {
        Some("queued") => "QUEUED".yellow().to_string(),
        Some("processing") => "PROCESSING".cyan().to_string(),
        Some("completed") => "RELOADED".green().to_string(),
        Some(other) => other.to_uppercase(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_row_reads_engine_payload() {
        let row = file_row(&json!({
            "path": "app/main.rb",
            "state": "completed",
            "last_tick": 42,
            "events": 3,
        }));
        assert_eq!(row.path, "app/main.rb");
        assert_eq!(row.last_tick, "42");
        assert_eq!(row.events, 3);
        assert!(row.state.contains("RELOADED"));
    }

    #[test]
    fn uptime_reports_elapsed_since_start() {
        let now = Utc.timestamp_opt(1_700_000_125, 0).unwrap();
        let line = uptime_line(&json!({ "started_at_unix": 1_700_000_000_i64, "engine": {} }), now);
        assert_eq!(line.as_deref(), Some("up 2m 5s"));
        assert_eq!(uptime_line(&json!({ "running": false }), now), None);
    }

    #[test]
    fn file_row_tolerates_missing_fields() {
        let row = file_row(&json!({ "path": "app/a.rb", "state": null, "last_tick": null }));
        assert_eq!(row.state, "-");
        assert_eq!(row.last_tick, "-");
        assert_eq!(row.events, 0);
    }
}
