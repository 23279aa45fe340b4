//! Inbound command handling: authorize, parse, execute, format.

use std::collections::HashSet;
use std::sync::Arc;

use crate::bot::command::{self, Command, CommandError};
use crate::bot::reply;
use crate::lifecycle::executor::Executor;
use crate::notify::OperatorId;

pub struct Router {
    executor: Arc<Executor>,
    operators: HashSet<OperatorId>,
    monitoring_enabled: bool,
}

impl Router {
    pub fn new(
        executor: Arc<Executor>,
        operators: impl IntoIterator<Item = OperatorId>,
        monitoring_enabled: bool,
    ) -> Self {
        Self {
            executor,
            operators: operators.into_iter().collect(),
            monitoring_enabled,
        }
    }

    fn authorize(&self, sender: OperatorId) -> Result<(), CommandError> {
        if self.operators.contains(&sender) {
            Ok(())
        } else {
            Err(CommandError::Unauthorized)
        }
    }

    /// Reply to send back, or `None` when the message is not a command.
    pub async fn handle(&self, sender: OperatorId, text: &str) -> Option<String> {
        if !command::is_command(text) {
            log::debug!("Ignoring non-command message from {sender}");
            return None;
        }

        let command = match self
            .authorize(sender)
            .and_then(|()| command::parse(text))
        {
            Ok(command) => command,
            Err(CommandError::Unauthorized) => {
                log::warn!("Rejected command from unauthorized user {sender}");
                return Some(CommandError::Unauthorized.to_string());
            }
            Err(e) => {
                log::warn!("Rejected command {text:?}: {e}");
                return Some(e.to_string());
            }
        };

        log::info!("Received {command:?} from {sender}");
        Some(self.execute(command).await)
    }

    async fn execute(&self, command: Command) -> String {
        match command {
            Command::Lifecycle(operation, name) => {
                let outcome = self.executor.run(operation, &name).await;
                reply::outcome(&name, &outcome)
            }
            Command::List => match self.executor.list().await {
                Ok(containers) => reply::list(&containers),
                Err(message) => reply::list_error(&message),
            },
            Command::Check(name) => {
                let outcome = self.executor.check(&name).await;
                reply::check(&name, &outcome)
            }
            Command::Info => match self.executor.list().await {
                Ok(containers) => {
                    let ledgers = self.executor.ledgers();
                    let manually_stopped = ledgers.manual_stops.entries();
                    let open_alerts = ledgers.alerts.names();
                    reply::info(&reply::InfoSnapshot {
                        containers: &containers,
                        monitoring_enabled: self.monitoring_enabled,
                        manually_stopped: &manually_stopped,
                        open_alerts: &open_alerts,
                    })
                }
                Err(message) => reply::info_error(&message),
            },
            Command::Help => reply::HELP.to_string(),
        }
    }
}
