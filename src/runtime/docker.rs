//! Docker gateway backed by bollard.
//!
//! Connects to the local Docker daemon (Unix socket on Linux/macOS, named
//! pipe on Windows) and maps bollard's errors onto [`GatewayError`].

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::ContainerStateStatusEnum;
use bollard::query_parameters::{
    InspectContainerOptions, InspectContainerOptionsBuilder, ListContainersOptions,
    ListContainersOptionsBuilder, LogsOptions, LogsOptionsBuilder, RestartContainerOptions,
    RestartContainerOptionsBuilder, StartContainerOptions, StartContainerOptionsBuilder,
    StopContainerOptions, StopContainerOptionsBuilder,
};
use futures_util::StreamExt;

use super::{ContainerGateway, ContainerState, ContainerSummary, GatewayError};

/// Seconds Docker waits for a graceful stop before killing the container.
const STOP_TIMEOUT_SECS: i32 = 10;

impl From<ContainerStateStatusEnum> for ContainerState {
    fn from(status: ContainerStateStatusEnum) -> Self {
        match status {
            ContainerStateStatusEnum::CREATED => Self::Created,
            ContainerStateStatusEnum::RUNNING => Self::Running,
            ContainerStateStatusEnum::PAUSED => Self::Paused,
            ContainerStateStatusEnum::RESTARTING => Self::Restarting,
            ContainerStateStatusEnum::REMOVING => Self::Removing,
            ContainerStateStatusEnum::EXITED => Self::Exited,
            ContainerStateStatusEnum::DEAD => Self::Dead,
            ContainerStateStatusEnum::EMPTY => Self::Unknown(String::new()),
        }
    }
}

/// Classify a bollard error for the container `name`.
fn classify(name: &str, err: bollard::errors::Error) -> GatewayError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => GatewayError::NotFound(name.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        } => GatewayError::NotModified(name.to_string()),
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            GatewayError::Runtime(message)
        }
        other => GatewayError::Unavailable(other.to_string()),
    }
}

/// Docker reports names with a leading slash.
fn strip_slash(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

#[derive(Clone)]
pub struct DockerGateway {
    docker: Docker,
}

impl DockerGateway {
    pub fn connect() -> Result<Self, GatewayError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerGateway for DockerGateway {
    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, GatewayError> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new()
            .all(include_stopped)
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| classify("*", e))?;

        Ok(containers
            .into_iter()
            .filter_map(|container| {
                let name = container.names?.into_iter().next()?;
                let state = container
                    .state
                    .map(|s| ContainerState::from(s.to_string().as_str()))
                    .unwrap_or_else(|| ContainerState::Unknown(String::new()));
                Some(ContainerSummary::new(strip_slash(&name), state))
            })
            .collect())
    }

    async fn get_container(&self, name: &str) -> Result<ContainerSummary, GatewayError> {
        let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();

        let info = self
            .docker
            .inspect_container(name, Some(options))
            .await
            .map_err(|e| classify(name, e))?;

        let state = info
            .state
            .and_then(|state| state.status)
            .map(ContainerState::from)
            .unwrap_or_else(|| ContainerState::Unknown(String::new()));
        let actual_name = info
            .name
            .as_deref()
            .map(strip_slash)
            .unwrap_or(name)
            .to_string();

        Ok(ContainerSummary::new(actual_name, state))
    }

    async fn start(&self, name: &str) -> Result<(), GatewayError> {
        let options: StartContainerOptions = StartContainerOptionsBuilder::new().build();

        self.docker
            .start_container(name, Some(options))
            .await
            .map_err(|e| classify(name, e))
    }

    async fn stop(&self, name: &str) -> Result<(), GatewayError> {
        let options: StopContainerOptions = StopContainerOptionsBuilder::new()
            .t(STOP_TIMEOUT_SECS)
            .build();

        self.docker
            .stop_container(name, Some(options))
            .await
            .map_err(|e| classify(name, e))
    }

    async fn restart(&self, name: &str) -> Result<(), GatewayError> {
        let options: RestartContainerOptions = RestartContainerOptionsBuilder::new()
            .t(STOP_TIMEOUT_SECS)
            .build();

        self.docker
            .restart_container(name, Some(options))
            .await
            .map_err(|e| classify(name, e))
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, GatewayError> {
        let options: LogsOptions = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail(&tail.to_string())
            .build();

        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(line) => output.push_str(&line.to_string()),
                Err(e) => return Err(classify(name, e)),
            }
        }

        Ok(output)
    }
}
