//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::notify::{NotificationSink, OperatorId};
use crate::runtime::{ContainerGateway, ContainerState, ContainerSummary, GatewayError};

#[derive(Default)]
pub struct FakeGateway {
    containers: Mutex<BTreeMap<String, ContainerState>>,
    logs: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<&'static str, String>>,
    unchanged: Mutex<HashSet<&'static str>>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
    calls: AtomicUsize,
    mutations: AtomicUsize,
}

impl FakeGateway {
    pub fn with<'a>(containers: impl IntoIterator<Item = (&'a str, ContainerState)>) -> Self {
        let gateway = Self::default();
        for (name, state) in containers {
            gateway.set_state(name, state);
        }
        gateway
    }

    pub fn set_state(&self, name: &str, state: ContainerState) {
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), state);
    }

    pub fn remove(&self, name: &str) {
        self.containers.lock().unwrap().remove(name);
    }

    pub fn state(&self, name: &str) -> Option<ContainerState> {
        self.containers.lock().unwrap().get(name).cloned()
    }

    pub fn set_logs(&self, name: &str, logs: &str) {
        self.logs
            .lock()
            .unwrap()
            .insert(name.to_string(), logs.to_string());
    }

    /// Make the next and all following `op` calls fail with a runtime error.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op, message.to_string());
    }

    /// Make `op` answer "not modified", as the runtime does when the container
    /// is already in the requested state.
    pub fn not_modified(&self, op: &'static str) {
        self.unchanged.lock().unwrap().insert(op);
    }

    /// Listings never complete while set.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every call made through the trait.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// start/stop/restart calls that reached the runtime.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn enter(&self, op: &'static str) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if let Some(message) = self.failures.lock().unwrap().get(op) {
            return Err(GatewayError::Runtime(message.clone()));
        }
        Ok(())
    }

    fn mutate(&self, op: &'static str, name: &str, state: ContainerState) -> Result<(), GatewayError> {
        self.enter(op)?;
        if self.unchanged.lock().unwrap().contains(op) {
            return Err(GatewayError::NotModified(name.to_string()));
        }
        let mut containers = self.containers.lock().unwrap();
        let current = containers
            .get_mut(name)
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        *current = state;
        Ok(())
    }
}

#[async_trait]
impl ContainerGateway for FakeGateway {
    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, GatewayError> {
        self.enter("list")?;
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, state)| include_stopped || state.is_running())
            .map(|(name, state)| ContainerSummary::new(name.clone(), state.clone()))
            .collect())
    }

    async fn get_container(&self, name: &str) -> Result<ContainerSummary, GatewayError> {
        self.enter("get")?;
        self.state(name)
            .map(|state| ContainerSummary::new(name, state))
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))
    }

    async fn start(&self, name: &str) -> Result<(), GatewayError> {
        self.mutate("start", name, ContainerState::Running)
    }

    async fn stop(&self, name: &str) -> Result<(), GatewayError> {
        self.mutate("stop", name, ContainerState::Exited)
    }

    async fn restart(&self, name: &str) -> Result<(), GatewayError> {
        self.mutate("restart", name, ContainerState::Running)
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, GatewayError> {
        self.enter("logs")?;
        if self.state(name).is_none() {
            return Err(GatewayError::NotFound(name.to_string()));
        }
        let logs = self.logs.lock().unwrap();
        let all = logs.get(name).map(String::as_str).unwrap_or_default();
        let lines: Vec<&str> = all.lines().collect();
        let start = lines.len().saturating_sub(tail);
        Ok(lines[start..].join("\n"))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(OperatorId, String)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(OperatorId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_message(&self, recipient: OperatorId, text: &str) {
        self.sent.lock().unwrap().push((recipient, text.to_string()));
    }
}
