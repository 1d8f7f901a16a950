//! `autonomy-core` — the supervised process behind a conversational
//! assistant's scheduling and autonomous-action surface (spec §1).

use std::sync::Arc;
use std::time::Duration;

use ac_core::bootstrap::build_app_state;
use ac_core::cli::{Cli, Command, ConfigCommand, ScheduleCommand};
use ac_domain::config::ConfigSeverity;
use ac_domain::entities::{Task, Trigger};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = ac_core::cli::load_config()?;
            run_server(config).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = ac_core::cli::load_config()?;
            let passed = ac_core::cli::doctor::run(&config, &config_path);
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ac_core::cli::load_config()?;
            let valid = ac_core::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = ac_core::cli::load_config()?;
            ac_core::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Schedule(cmd)) => run_schedule_command(cmd).await,
        Some(Command::Mcp) => run_mcp_status().await,
        Some(Command::Version) => {
            println!("autonomy-core {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing (only the `serve` command runs long enough to
/// want structured log output).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ac_core=debug")))
        .json()
        .init();
}

/// Boots every component and runs the scheduler's lock/tick loops until
/// Ctrl-C, per spec §5's cancellation model: the top-level signal cascades
/// down rather than any component polling for shutdown on its own.
async fn run_server(config: ac_domain::Config) -> anyhow::Result<()> {
    tracing::info!("autonomy-core starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let node_id = ac_core::cli::resolve_node_id();
    let (state, mut notify_rx, intent_rx) = build_app_state(config, node_id.clone()).await?;
    tracing::info!(%node_id, "autonomy-core ready");

    let (lock_task, tick_task) = state.scheduler.spawn();
    let router_task = ac_core::router::spawn_router(state.clone(), intent_rx);

    // Notification consumer: until a transport is wired up, every
    // published notification is only logged (spec §9: the scheduler
    // never holds a reference back to the transport it feeds).
    let notify_task = tokio::spawn(async move {
        while let Some(n) = notify_rx.recv().await {
            tracing::info!(user_id = %n.user_id, source = ?n.source, text = %n.text, "notification");
        }
    });

    // Periodic stale-lock / process-health sweep.
    let maintenance_task = {
        let mcp = Arc::clone(&state.mcp);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let snapshot = mcp.snapshot_all().await;
                let failed = snapshot.iter().filter(|s| s.status == ac_domain::ServerStatus::Failed).count();
                if failed > 0 {
                    tracing::warn!(failed, "tool servers in failed state");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");

    lock_task.abort();
    tick_task.abort();
    router_task.abort();
    notify_task.abort();
    maintenance_task.abort();
    state.mcp.shutdown_all().await;

    Ok(())
}

async fn run_schedule_command(cmd: ScheduleCommand) -> anyhow::Result<()> {
    let (config, _path) = ac_core::cli::load_config()?;
    let node_id = ac_core::cli::resolve_node_id();
    let (state, _notify_rx, _intent_rx) = build_app_state(config, node_id).await?;

    match cmd {
        ScheduleCommand::List => {
            let tasks = state.scheduler.list_tasks().await?;
            if tasks.is_empty() {
                println!("no tasks");
            }
            for t in tasks {
                println!(
                    "{}  owner={}  kind={:?}  enabled={}  next_run_at={:?}",
                    t.id, t.owner_user, t.kind, t.enabled, t.next_run_at
                );
            }
        }
        ScheduleCommand::Add {
            id,
            owner_user,
            kind,
            trigger_json,
            payload_json,
        } => {
            let trigger: Trigger = serde_json::from_str(&trigger_json)?;
            let payload = match payload_json {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Default::default(),
            };
            let now = chrono::Utc::now();
            let task = Task {
                id,
                owner_user,
                kind,
                trigger,
                enabled: true,
                payload,
                steps: Vec::new(),
                last_run_at: None,
                next_run_at: None,
                last_result: None,
                failure_count: 0,
                disabled_reason: None,
                state: Default::default(),
                created_at: now,
                updated_at: now,
            };
            let saved = state.scheduler.add_task(task).await?;
            println!("added {} (next_run_at={:?})", saved.id, saved.next_run_at);
        }
        ScheduleCommand::Set { id, trigger_json } => {
            let trigger: Trigger = serde_json::from_str(&trigger_json)?;
            let updated = state.scheduler.set_trigger(&id, trigger).await?;
            println!("updated {} (next_run_at={:?})", updated.id, updated.next_run_at);
        }
        ScheduleCommand::Run { id } => {
            let task = state.scheduler.run_now(&id).await?;
            println!("ran {} (last_result={:?})", task.id, task.last_result);
        }
        ScheduleCommand::Enable { id } => {
            let task = state.scheduler.set_enabled(&id, true).await?;
            println!("enabled {}", task.id);
        }
        ScheduleCommand::Disable { id } => {
            let task = state.scheduler.set_enabled(&id, false).await?;
            println!("disabled {}", task.id);
        }
    }

    state.mcp.shutdown_all().await;
    Ok(())
}

async fn run_mcp_status() -> anyhow::Result<()> {
    let (config, _path) = ac_core::cli::load_config()?;
    let node_id = ac_core::cli::resolve_node_id();
    let (state, _notify_rx, _intent_rx) = build_app_state(config, node_id).await?;

    let snapshot = state.mcp.snapshot_all().await;
    if snapshot.is_empty() {
        println!("no tool servers configured");
    }
    for server in snapshot {
        println!(
            "{}  status={:?}  tools={}  restarts={}",
            server.name,
            server.status,
            server.tools.len(),
            server.restart_count,
        );
    }

    state.mcp.shutdown_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_node_id_falls_back_when_unset() {
        std::env::remove_var("AC_NODE_ID");
        let id = ac_core::cli::resolve_node_id();
        assert!(id.starts_with("autonomy-core:"));
    }
}
