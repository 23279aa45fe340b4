//! User-facing message text.

use chrono::{DateTime, Utc};

use crate::lifecycle::executor::{CheckOutcome, LOG_TAIL_LINES, Operation, OperationOutcome};
use crate::runtime::{ContainerSummary, names};

pub const UNAUTHORIZED: &str = "❌ You don't have permission to use this command.";

pub const NO_CONTAINERS: &str = "ℹ️ No containers found.";

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━";

pub const HELP: &str = "\
📚 DockGram Bot Commands

Commands can be used in two formats:

1. Direct command format:
/start_container_name - Start a container
/stop_container_name - Stop a container
/restart_container_name - Restart a container
/logs_container_name - Show last 10 logs from a container

2. Traditional format:
/start container_name - Start a container
/stop container_name - Stop a container
/restart container_name - Restart a container
/logs container_name - Show last 10 logs from a container
/check container_name - Check if a container exists

Other commands:
/list - List all containers with clickable command links
/info - Show information about the bot environment
/help - Show this help message

Hyphens and underscores in container names are interchangeable.
Example: /start_my_container or /start my-container";

pub fn outcome(name: &str, outcome: &OperationOutcome) -> String {
    match outcome {
        OperationOutcome::AlreadyRunning => format!("ℹ️ '{name}' is already running."),
        OperationOutcome::Started => format!("✅ '{name}' has been started!"),
        OperationOutcome::AlreadyStopped => format!("ℹ️ '{name}' is already stopped."),
        OperationOutcome::Stopped => format!("🛑 '{name}' has been stopped!"),
        OperationOutcome::Restarted => format!("🔄 '{name}' has been restarted!"),
        OperationOutcome::Logs(logs) => {
            format!("📜 Last {LOG_TAIL_LINES} logs for '{name}':\n\n```\n{logs}\n```")
        }
        OperationOutcome::NoLogs => format!("ℹ️ No logs found for '{name}'."),
        OperationOutcome::NotFound => format!("❌ Container '{name}' not found."),
        OperationOutcome::Error(message) => {
            format!("❌ Error during container operation on '{name}': {message}")
        }
    }
}

pub fn list(containers: &[ContainerSummary]) -> String {
    if containers.is_empty() {
        return NO_CONTAINERS.to_string();
    }

    let mut text = String::from("📋 Container List:\n\n");
    for container in containers {
        let emoji = if container.state.is_running() {
            "🟢"
        } else {
            "🔴"
        };
        let token = names::command_token(&container.name);
        text.push_str(&format!(
            "{emoji} {} - Status: {}\n",
            container.name, container.state
        ));
        text.push_str(&format!(
            "▶️ /{start}_{token}\n⏹ /{stop}_{token}\n🔄 /{restart}_{token}\n📜 /{logs}_{token}\n{SEPARATOR}\n\n",
            start = Operation::Start.as_ref(),
            stop = Operation::Stop.as_ref(),
            restart = Operation::Restart.as_ref(),
            logs = Operation::Logs.as_ref(),
        ));
    }
    text
}

pub fn list_error(message: &str) -> String {
    format!("❌ Error listing containers: {message}")
}

pub fn check(name: &str, outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Found(container) => format!(
            "✅ Container '{}' exists with status: {}",
            container.name, container.state
        ),
        CheckOutcome::NotFound => format!("❌ Container '{name}' not found in Docker."),
        CheckOutcome::Error(message) => format!("❌ Error checking container: {message}"),
    }
}

/// Everything the `info` command reports.
pub struct InfoSnapshot<'a> {
    pub containers: &'a [ContainerSummary],
    pub monitoring_enabled: bool,
    pub manually_stopped: &'a [(String, DateTime<Utc>)],
    pub open_alerts: &'a [String],
}

fn or_none(items: Vec<String>) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub fn info(snapshot: &InfoSnapshot<'_>) -> String {
    let names: Vec<&str> = snapshot
        .containers
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    format!(
        "🔍 Information:\n\n\
         Bot Version: {}\n\
         Number of containers: {}\n\
         Container names: {}\n\
         Monitoring enabled: {}\n\
         Manually stopped containers: {}\n\
         Open alerts: {}\n",
        env!("CARGO_PKG_VERSION"),
        names.len(),
        names.join(", "),
        snapshot.monitoring_enabled,
        or_none(
            snapshot
                .manually_stopped
                .iter()
                .map(|(name, at)| format!("{name} (since {})", at.format("%Y-%m-%d %H:%M UTC")))
                .collect()
        ),
        or_none(snapshot.open_alerts.to_vec()),
    )
}

pub fn info_error(message: &str) -> String {
    format!("❌ Error generating info: {message}")
}

pub fn alert(container: &ContainerSummary) -> String {
    format!(
        "⚠️ Alert: Container '{}' has stopped unexpectedly! Current status: {}",
        container.name, container.state
    )
}
