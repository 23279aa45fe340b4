//! Periodic reconciliation of container state against the ledgers.
//!
//! The first cycle after start-up only records containers that are already
//! down; they may have been stopped for any reason before this process ran.
//! Every later cycle alerts once per unexpected stop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

use crate::bot::reply;
use crate::lifecycle::ledger::{Ledgers, MANUAL_STOP_RETENTION};
use crate::notify::{NotificationSink, OperatorId};
use crate::runtime::{ContainerGateway, ContainerSummary, GatewayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No poll has completed yet.
    Cold,
    Warm,
}

/// What a single cycle changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub seeded: Vec<String>,
    pub alerted: Vec<ContainerSummary>,
    pub recovered: Vec<String>,
    /// Alert entries of containers that no longer exist.
    pub forgotten: Vec<String>,
    pub purged: Vec<String>,
}

pub struct Monitor {
    gateway: Arc<dyn ContainerGateway>,
    sink: Arc<dyn NotificationSink>,
    ledgers: Arc<Ledgers>,
    operators: Vec<OperatorId>,
    interval: Duration,
    retention: TimeDelta,
    phase: Phase,
}

impl Monitor {
    pub fn new(
        gateway: Arc<dyn ContainerGateway>,
        sink: Arc<dyn NotificationSink>,
        ledgers: Arc<Ledgers>,
        operators: Vec<OperatorId>,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            sink,
            ledgers,
            operators,
            interval,
            retention: MANUAL_STOP_RETENTION,
            phase: Phase::Cold,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one poll. Returns `None` if `shutdown` fired while the listing was
    /// pending; once the listing returns the cycle runs to completion. A
    /// failed listing leaves the ledgers and the phase untouched.
    pub async fn cycle(
        &mut self,
        now: DateTime<Utc>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Result<CycleReport, GatewayError>> {
        self.ledgers.begin_cycle();
        let listing = tokio::select! {
            result = self.gateway.list_containers(true) => result,
            _ = shutdown.changed() => return None,
        };

        match listing {
            Ok(containers) => Some(Ok(self.apply(&containers, now).await)),
            Err(e) => Some(Err(e)),
        }
    }

    async fn apply(&mut self, containers: &[ContainerSummary], now: DateTime<Utc>) -> CycleReport {
        let report = self.reconcile(containers, now);
        self.notify(&report.alerted).await;
        report
    }

    fn reconcile(&mut self, containers: &[ContainerSummary], now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        match self.phase {
            Phase::Cold => {
                log::info!("Initial container scan - recording states without alerting");
                for container in containers.iter().filter(|c| c.state.is_down()) {
                    if self.ledgers.seed(&container.name) {
                        report.seeded.push(container.name.clone());
                    }
                }
                self.phase = Phase::Warm;
            }
            Phase::Warm => {
                for container in containers {
                    if container.state.is_down() {
                        if self.ledgers.raise_alert(&container.name) {
                            report.alerted.push(container.clone());
                        }
                    } else if container.state.is_running()
                        && self.ledgers.alerts.remove(&container.name)
                    {
                        log::info!("Container '{}' is running again", container.name);
                        report.recovered.push(container.name.clone());
                    }
                }

                let present: HashSet<&str> = containers.iter().map(|c| c.name.as_str()).collect();
                report.forgotten = self.ledgers.alerts.retain_present(&present);
                for name in &report.forgotten {
                    log::info!("Container '{name}' no longer exists, dropping its alert");
                }
            }
        }

        report.purged = self.ledgers.manual_stops.purge_expired(now, self.retention);
        for name in &report.purged {
            log::info!("Manual stop of '{name}' expired");
        }

        report
    }

    async fn notify(&self, alerted: &[ContainerSummary]) {
        for container in alerted {
            log::warn!(
                "Container '{}' stopped unexpectedly ({})",
                container.name,
                container.state
            );
            let text = reply::alert(container);
            for operator in &self.operators {
                self.sink.send_message(*operator, &text).await;
            }
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Container monitoring started (interval: {} seconds)",
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.cycle(Utc::now(), &mut shutdown).await {
                None => break,
                Some(Ok(report)) => log::debug!(
                    "Monitoring cycle: {} seeded, {} alerted, {} recovered, {} forgotten, {} expired",
                    report.seeded.len(),
                    report.alerted.len(),
                    report.recovered.len(),
                    report.forgotten.len(),
                    report.purged.len()
                ),
                Some(Err(e)) => log::error!("Error in container monitoring: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        log::warn!("Container monitoring stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::executor::{Executor, Operation, OperationOutcome};
    use crate::runtime::ContainerState;
    use crate::testing::{FakeGateway, RecordingSink};

    const OPERATORS: [OperatorId; 2] = [11, 22];

    struct Harness {
        gateway: Arc<FakeGateway>,
        sink: Arc<RecordingSink>,
        ledgers: Arc<Ledgers>,
        monitor: Monitor,
        _shutdown_tx: watch::Sender<bool>,
        shutdown: watch::Receiver<bool>,
    }

    impl Harness {
        async fn cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, GatewayError> {
            self.monitor
                .cycle(now, &mut self.shutdown)
                .await
                .expect("cycle was cancelled")
        }
    }

    fn harness(containers: &[(&str, ContainerState)]) -> Harness {
        let gateway = Arc::new(FakeGateway::with(containers.iter().cloned()));
        let sink = Arc::new(RecordingSink::default());
        let ledgers = Arc::new(Ledgers::new());
        let monitor = Monitor::new(
            gateway.clone(),
            sink.clone(),
            ledgers.clone(),
            OPERATORS.to_vec(),
            Duration::from_secs(300),
        );
        let (_shutdown_tx, shutdown) = watch::channel(false);
        Harness {
            gateway,
            sink,
            ledgers,
            monitor,
            _shutdown_tx,
            shutdown,
        }
    }

    #[tokio::test]
    async fn test_cold_start_records_without_alerting() {
        let mut h = harness(&[
            ("web", ContainerState::Exited),
            ("db", ContainerState::Dead),
            ("cache", ContainerState::Running),
        ]);

        let report = h.cycle(Utc::now()).await.unwrap();

        assert_eq!(h.sink.count(), 0);
        assert_eq!(report.seeded, vec!["db".to_string(), "web".to_string()]);
        assert!(h.ledgers.alerts.contains("web"));
        assert!(h.ledgers.alerts.contains("db"));
        assert_eq!(h.monitor.phase(), Phase::Warm);
    }

    #[tokio::test]
    async fn test_failed_first_poll_stays_cold() {
        let mut h = harness(&[("web", ContainerState::Exited)]);
        h.gateway.set_unavailable(true);

        assert!(h.cycle(Utc::now()).await.is_err());
        assert_eq!(h.monitor.phase(), Phase::Cold);

        h.gateway.set_unavailable(false);
        h.cycle(Utc::now()).await.unwrap();
        assert_eq!(h.sink.count(), 0);
        assert!(h.ledgers.alerts.contains("web"));
    }

    #[tokio::test]
    async fn test_unexpected_stop_alerts_every_operator_once() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.set_state("web", ContainerState::Exited);
        for _ in 0..5 {
            h.cycle(Utc::now()).await.unwrap();
        }

        let sent = h.sink.sent();
        assert_eq!(sent.len(), OPERATORS.len());
        for (operator, (recipient, text)) in OPERATORS.iter().zip(&sent) {
            assert_eq!(recipient, operator);
            assert!(text.contains("'web'"));
            assert!(text.contains("exited"));
        }
    }

    #[tokio::test]
    async fn test_manual_stop_suppresses_alert() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.set_state("web", ContainerState::Exited);
        h.ledgers.manual_stops.record("web", Utc::now());
        h.cycle(Utc::now()).await.unwrap();

        assert_eq!(h.sink.count(), 0);
        assert!(h.ledgers.manual_stops.contains("web"));
        assert!(!h.ledgers.alerts.contains("web"));
    }

    #[tokio::test]
    async fn test_expired_manual_stop_is_purged_then_alerted() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.set_state("web", ContainerState::Exited);
        let now = Utc::now();
        h.ledgers
            .manual_stops
            .record("web", now - MANUAL_STOP_RETENTION - TimeDelta::minutes(1));

        let report = h.cycle(now).await.unwrap();
        assert_eq!(report.purged, vec!["web".to_string()]);
        assert!(!h.ledgers.manual_stops.contains("web"));
        assert_eq!(h.sink.count(), 0);

        let report = h.cycle(now).await.unwrap();
        assert_eq!(report.alerted.len(), 1);
        assert_eq!(h.sink.count(), OPERATORS.len());
    }

    #[tokio::test]
    async fn test_recovery_enables_a_second_alert() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.set_state("web", ContainerState::Exited);
        h.cycle(Utc::now()).await.unwrap();
        assert!(h.ledgers.alerts.contains("web"));

        h.gateway.set_state("web", ContainerState::Running);
        let report = h.cycle(Utc::now()).await.unwrap();
        assert_eq!(report.recovered, vec!["web".to_string()]);
        assert!(!h.ledgers.alerts.contains("web"));

        h.gateway.set_state("web", ContainerState::Exited);
        h.cycle(Utc::now()).await.unwrap();

        assert_eq!(h.sink.count(), 2 * OPERATORS.len());
    }

    #[tokio::test]
    async fn test_pre_existing_outage_alerts_after_recovery() {
        let mut h = harness(&[("web", ContainerState::Exited)]);
        h.cycle(Utc::now()).await.unwrap();
        h.cycle(Utc::now()).await.unwrap();
        assert_eq!(h.sink.count(), 0);

        h.gateway.set_state("web", ContainerState::Running);
        h.cycle(Utc::now()).await.unwrap();
        h.gateway.set_state("web", ContainerState::Exited);
        h.cycle(Utc::now()).await.unwrap();

        assert_eq!(h.sink.count(), OPERATORS.len());
    }

    #[tokio::test]
    async fn test_removed_container_alert_is_forgotten() {
        let mut h = harness(&[("web", ContainerState::Exited)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.remove("web");
        let report = h.cycle(Utc::now()).await.unwrap();

        assert_eq!(report.forgotten, vec!["web".to_string()]);
        assert!(h.ledgers.alerts.names().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_state() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        h.cycle(Utc::now()).await.unwrap();

        h.gateway.set_unavailable(true);
        assert!(matches!(
            h.cycle(Utc::now()).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert_eq!(h.sink.count(), 0);
        assert_eq!(h.monitor.phase(), Phase::Warm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let h = harness(&[("web", ContainerState::Exited)]);
        let gateway = h.gateway.clone();
        let sink = h.sink.clone();
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(h.monitor.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gateway.calls(), 1);

        gateway.set_state("web", ContainerState::Running);
        tokio::time::sleep(Duration::from_secs(300)).await;
        gateway.set_state("web", ContainerState::Exited);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(gateway.calls(), 3);
        assert_eq!(sink.count(), OPERATORS.len());

        tx.send(true).unwrap();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn test_operator_start_during_listing_is_not_alerted() {
        let mut h = harness(&[("web", ContainerState::Running)]);
        let executor = Executor::new(h.gateway.clone(), h.ledgers.clone());
        h.cycle(Utc::now()).await.unwrap();
        assert_eq!(
            executor.run(Operation::Stop, "web").await,
            OperationOutcome::Stopped
        );

        // The listing is taken while web is still stopped, and the operator
        // starts it before the cycle reconciles.
        h.ledgers.begin_cycle();
        let listing = h.gateway.list_containers(true).await.unwrap();
        assert_eq!(
            executor.run(Operation::Start, "web").await,
            OperationOutcome::Started
        );
        let report = h.monitor.apply(&listing, Utc::now()).await;

        assert!(report.alerted.is_empty());
        assert_eq!(h.sink.count(), 0);
        assert!(h.ledgers.alerts.names().is_empty());

        // A later crash still alerts.
        h.gateway.set_state("web", ContainerState::Exited);
        h.cycle(Utc::now()).await.unwrap();
        assert_eq!(h.sink.count(), OPERATORS.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_pending_listing() {
        let h = harness(&[("web", ContainerState::Exited)]);
        let gateway = h.gateway.clone();
        let ledgers = h.ledgers.clone();
        gateway.set_stalled(true);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(h.monitor.run(rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gateway.calls(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor kept waiting on the listing")
            .unwrap();

        assert_eq!(gateway.calls(), 1);
        assert!(ledgers.alerts.names().is_empty());
    }
}
