//! Lifecycle operations against a single container.
//!
//! Every gateway failure is classified here; callers only ever see an
//! [`OperationOutcome`] or a [`CheckOutcome`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;

use crate::lifecycle::ledger::Ledgers;
use crate::runtime::{ContainerGateway, ContainerState, ContainerSummary, GatewayError, names};

/// Number of log lines returned by the `logs` operation.
pub const LOG_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Logs,
}

impl AsRef<str> for Operation {
    fn as_ref(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Logs => "logs",
        }
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "logs" => Ok(Self::Logs),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    AlreadyRunning,
    Started,
    AlreadyStopped,
    Stopped,
    Restarted,
    Logs(String),
    NoLogs,
    NotFound,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Found(ContainerSummary),
    NotFound,
    Error(String),
}

pub struct Executor {
    gateway: Arc<dyn ContainerGateway>,
    ledgers: Arc<Ledgers>,
}

impl Executor {
    pub fn new(gateway: Arc<dyn ContainerGateway>, ledgers: Arc<Ledgers>) -> Self {
        Self { gateway, ledgers }
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub async fn run(&self, operation: Operation, requested: &str) -> OperationOutcome {
        log::info!("Handling {} for container '{requested}'", operation.as_ref());

        let result = match names::resolve(self.gateway.as_ref(), requested).await {
            Ok(container) => {
                log::info!(
                    "Found container '{}' with status: {}",
                    container.name,
                    container.state
                );
                match operation {
                    Operation::Start => self.start(&container).await,
                    Operation::Stop => self.stop(&container).await,
                    Operation::Restart => self.restart(&container).await,
                    Operation::Logs => self.logs(&container).await,
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => outcome,
            Err(GatewayError::NotFound(_)) => {
                log::error!("Container not found: {requested}");
                OperationOutcome::NotFound
            }
            Err(e) => {
                log::error!(
                    "Container {} error for {requested}: {e}",
                    operation.as_ref()
                );
                OperationOutcome::Error(e.to_string())
            }
        }
    }

    async fn start(&self, container: &ContainerSummary) -> Result<OperationOutcome, GatewayError> {
        if container.state.is_running() {
            return Ok(OperationOutcome::AlreadyRunning);
        }

        log::info!("Starting container '{}'", container.name);
        match self.gateway.start(&container.name).await {
            Ok(()) => {}
            Err(GatewayError::NotModified(_)) => return Ok(OperationOutcome::AlreadyRunning),
            Err(e) => return Err(e),
        }

        self.ledgers.clear(&container.name);
        Ok(OperationOutcome::Started)
    }

    async fn stop(&self, container: &ContainerSummary) -> Result<OperationOutcome, GatewayError> {
        if container.state == ContainerState::Exited {
            return Ok(OperationOutcome::AlreadyStopped);
        }

        // Recorded before the call so a monitoring cycle that sees the
        // container exit mid-stop treats it as a manual stop.
        let previous = self
            .ledgers
            .manual_stops
            .record(&container.name, Utc::now());

        log::info!("Stopping container '{}'", container.name);
        match self.gateway.stop(&container.name).await {
            Ok(()) => Ok(OperationOutcome::Stopped),
            Err(GatewayError::NotModified(_)) => {
                self.ledgers.manual_stops.restore(&container.name, previous);
                Ok(OperationOutcome::AlreadyStopped)
            }
            Err(e) => {
                self.ledgers.manual_stops.restore(&container.name, previous);
                Err(e)
            }
        }
    }

    async fn restart(
        &self,
        container: &ContainerSummary,
    ) -> Result<OperationOutcome, GatewayError> {
        log::info!("Restarting container '{}'", container.name);
        self.gateway.restart(&container.name).await?;
        self.ledgers.clear(&container.name);
        Ok(OperationOutcome::Restarted)
    }

    async fn logs(&self, container: &ContainerSummary) -> Result<OperationOutcome, GatewayError> {
        let logs = self.gateway.logs(&container.name, LOG_TAIL_LINES).await?;
        if logs.is_empty() {
            return Ok(OperationOutcome::NoLogs);
        }
        Ok(OperationOutcome::Logs(logs))
    }

    /// Existence and status of a container, without touching it.
    pub async fn check(&self, requested: &str) -> CheckOutcome {
        match names::resolve(self.gateway.as_ref(), requested).await {
            Ok(container) => CheckOutcome::Found(container),
            Err(GatewayError::NotFound(_)) => CheckOutcome::NotFound,
            Err(e) => {
                log::error!("Container check error: {e}");
                CheckOutcome::Error(e.to_string())
            }
        }
    }

    /// All containers, stopped ones included, sorted by name ignoring case.
    pub async fn list(&self) -> Result<Vec<ContainerSummary>, String> {
        match self.gateway.list_containers(true).await {
            Ok(mut containers) => {
                containers.sort_by_key(|c| c.name.to_lowercase());
                Ok(containers)
            }
            Err(e) => {
                log::error!("Container listing error: {e}");
                Err(e.to_string())
            }
        }
    }
}
