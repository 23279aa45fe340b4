//! Container runtime gateway.
//!
//! Everything the bot knows about containers comes from a [`ContainerGateway`].
//! The production implementation talks to the Docker Engine through bollard
//! (see [`docker`]); tests use an in-memory fake.

use async_trait::async_trait;

pub mod docker;
pub mod names;

/// Observed state of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown(String),
}

impl ContainerState {
    /// Exited or dead. These are the states the monitor alerts on.
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Exited | Self::Dead)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl AsRef<str> for ContainerState {
    fn as_ref(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for ContainerState {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown(raw.to_string()),
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub state: ContainerState,
}

impl ContainerSummary {
    pub fn new(name: impl Into<String>, state: ContainerState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("container {0} not found")]
    NotFound(String),
    /// The runtime refused the call because the container is already in the
    /// requested state (HTTP 304 from the Docker API).
    #[error("container {0} is already in the requested state")]
    NotModified(String),
    #[error("{0}")]
    Runtime(String),
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
}

/// Administrative interface to the container runtime.
#[async_trait]
pub trait ContainerGateway: Send + Sync {
    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, GatewayError>;

    async fn get_container(&self, name: &str) -> Result<ContainerSummary, GatewayError>;

    async fn start(&self, name: &str) -> Result<(), GatewayError>;

    async fn stop(&self, name: &str) -> Result<(), GatewayError>;

    async fn restart(&self, name: &str) -> Result<(), GatewayError>;

    /// Last `tail` lines of the container's stdout and stderr.
    async fn logs(&self, name: &str, tail: usize) -> Result<String, GatewayError>;
}
