//! Command-line surface for the autonomy-core binary: a `clap`-derived
//! `Cli`/`Command` dispatch where `serve` is the default and every other
//! subcommand loads config and exits.

pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// autonomy-core — the supervised process behind a conversational
/// assistant's scheduling and autonomous-action surface.
#[derive(Debug, Parser)]
#[command(name = "autonomy-core", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduler engine and process supervisor (default when no
    /// subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Admin surface for the Scheduler Engine (spec §6.1: `schedule
    /// list|run|add|set|enable|disable`).
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Process Supervisor status (spec §6.1: `mcp`).
    Mcp,
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// List every task the Scheduler Engine owns.
    List,
    /// Create a new task. `trigger_json` is one of the three closed
    /// `Trigger` variants serialized as JSON, e.g.
    /// `{"kind":"one_shot","at_timestamp":"2026-01-01T00:00:00Z"}`.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        owner_user: String,
        #[arg(long, value_parser = parse_task_kind)]
        kind: ac_domain::entities::TaskKind,
        #[arg(long)]
        trigger_json: String,
        #[arg(long)]
        payload_json: Option<String>,
    },
    /// Replace an existing task's trigger and recompute `next_run_at`.
    Set {
        id: String,
        #[arg(long)]
        trigger_json: String,
    },
    /// Fire a task immediately, bypassing its `next_run_at`.
    Run { id: String },
    /// Re-enable a disabled task.
    Enable { id: String },
    /// Disable a task without deleting it.
    Disable { id: String },
}

fn parse_task_kind(s: &str) -> Result<ac_domain::entities::TaskKind, String> {
    use ac_domain::entities::TaskKind;
    match s {
        "interval" => Ok(TaskKind::Interval),
        "cron" => Ok(TaskKind::Cron),
        "one_shot" | "one-shot" => Ok(TaskKind::OneShot),
        "workflow" => Ok(TaskKind::Workflow),
        "reminder" => Ok(TaskKind::Reminder),
        other => Err(format!(
            "unknown task kind '{other}' (expected interval, cron, one_shot, workflow, or reminder)"
        )),
    }
}

/// Loads the configuration from the path named by `AC_CONFIG` (or
/// `config.toml` by default). Shared by every subcommand so the loading
/// logic lives in one place rather than duplicated per subcommand.
pub fn load_config() -> anyhow::Result<(ac_domain::Config, String)> {
    let config_path = std::env::var("AC_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ac_domain::Config::default()
    };

    Ok((config, config_path))
}

/// Stable process identity for scheduler-lock acquisition (spec §4.5
/// point 1: "the node id that acquired the lock"), mirroring the
/// `SA_NODE_ID`/hostname-fallback convention of the node binaries.
pub fn resolve_node_id() -> String {
    std::env::var("AC_NODE_ID").unwrap_or_else(|_| format!("autonomy-core:{}", hostname_fallback()))
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_task_kinds() {
        assert!(parse_task_kind("interval").is_ok());
        assert!(parse_task_kind("cron").is_ok());
        assert!(parse_task_kind("one_shot").is_ok());
        assert!(parse_task_kind("workflow").is_ok());
        assert!(parse_task_kind("reminder").is_ok());
    }

    #[test]
    fn rejects_unknown_task_kind() {
        assert!(parse_task_kind("bogus").is_err());
    }
}
