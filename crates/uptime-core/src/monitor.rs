//! The scheduler: drives probe cycles and feeds the notification channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::CheckerConfig;
use crate::notifier::Notification;
use crate::prober::{EndpointProber, ProbeResult};
use crate::registry::EndpointSpec;
use crate::report::{format_alert, format_summary};
use crate::tracker::{StatusTracker, TransitionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Active,
    Stopping,
    Stopped,
}

impl MonitorState {
    pub fn can_transition_to(self, target: MonitorState) -> bool {
        matches!(
            (self, target),
            (MonitorState::Idle, MonitorState::Active)
                | (MonitorState::Active, MonitorState::Stopping)
                | (MonitorState::Stopping, MonitorState::Stopped)
                | (MonitorState::Stopped, MonitorState::Active)
        )
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Owns the endpoint registry, the prober, and the status tracker, and runs
/// the periodic probe cycle.
pub struct HealthMonitor {
    endpoints: Vec<EndpointSpec>,
    config: CheckerConfig,
    prober: Arc<dyn EndpointProber>,
    tracker: Mutex<StatusTracker>,
    state: RwLock<MonitorState>,
    notification_tx: Option<UnboundedSender<Notification>>,
    created_at: DateTime<Utc>,
    last_checked: RwLock<Option<DateTime<Utc>>>,
    transitions_per_url: RwLock<HashMap<String, u64>>,
}

impl HealthMonitor {
    pub fn new(
        endpoints: Vec<EndpointSpec>,
        config: CheckerConfig,
        prober: Arc<dyn EndpointProber>,
        notification_tx: Option<UnboundedSender<Notification>>,
    ) -> Self {
        Self {
            endpoints,
            config,
            prober,
            tracker: Mutex::new(StatusTracker::new()),
            state: RwLock::new(MonitorState::Idle),
            notification_tx,
            created_at: Utc::now(),
            last_checked: RwLock::new(None),
            transitions_per_url: RwLock::new(HashMap::new()),
        }
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn state(&self) -> MonitorState {
        *self.state.read().await
    }

    pub async fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.read().await
    }

    /// Last observed status per URL, for metrics and status output.
    pub async fn status_snapshot(&self) -> Vec<(String, bool)> {
        self.tracker.lock().await.statuses()
    }

    pub async fn transition_counts(&self) -> HashMap<String, u64> {
        self.transitions_per_url.read().await.clone()
    }

    /// Probe every endpoint once, sequentially, in registry order. Does not
    /// touch status memory.
    pub async fn probe_all(&self) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(self.endpoints.len());
        for spec in &self.endpoints {
            results.push(self.prober.probe(spec).await);
        }
        results
    }

    /// One full cycle: probe, diff against status memory, notify.
    ///
    /// The tracker lock is held across the whole cycle, so a second cycle
    /// can never interleave with this one.
    pub async fn run_cycle(&self) -> (Vec<ProbeResult>, Vec<TransitionEvent>) {
        let mut tracker = self.tracker.lock().await;
        *self.last_checked.write().await = Some(Utc::now());

        let results = self.probe_all().await;
        let transitions = tracker.record_and_diff(&results);
        drop(tracker);

        if !transitions.is_empty() {
            let mut counts = self.transitions_per_url.write().await;
            for t in &transitions {
                *counts.entry(t.url.clone()).or_insert(0) += 1;
            }
        }

        if let Some(tx) = &self.notification_tx {
            if let Some(alert) = format_alert(&transitions) {
                if tx.send(Notification::Alert(alert)).is_err() {
                    warn!("Notification channel closed, alert dropped");
                }
            }
            let report = format_summary(&results, true);
            if tx.send(Notification::Report(report)).is_err() {
                warn!("Notification channel closed, report dropped");
            }
        }

        let up_count = results.iter().filter(|r| r.is_up()).count();
        info!(
            up = up_count,
            total = results.len(),
            transitions = transitions.len(),
            "Health check cycle complete"
        );

        (results, transitions)
    }

    /// Start the periodic loop. No-op when already active. With no
    /// configured endpoints, checks stay disabled.
    pub async fn start(self: Arc<Self>) {
        if self.endpoints.is_empty() {
            warn!("No monitor endpoints configured, health checks are disabled");
            return;
        }

        {
            let mut state = self.state.write().await;
            if *state == MonitorState::Active {
                return;
            }
            *state = MonitorState::Active;
        }

        info!(
            endpoints = self.endpoints.len(),
            interval_secs = self.config.check_interval.as_secs(),
            "Starting health monitor"
        );

        let monitor = Arc::clone(&self);
        tokio::spawn(async move {
            loop {
                {
                    let current = *monitor.state.read().await;
                    if current != MonitorState::Active {
                        let mut s = monitor.state.write().await;
                        *s = MonitorState::Stopped;
                        info!("Health monitor stopped");
                        break;
                    }
                }

                monitor.run_cycle().await;
                tokio::time::sleep(monitor.config.check_interval).await;
            }
        });
    }

    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if *state == MonitorState::Active {
            *state = MonitorState::Stopping;
            info!("Stopping health monitor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::EndpointStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn spec(url: &str) -> EndpointSpec {
        EndpointSpec {
            name: url.to_string(),
            url: url.to_string(),
            env: "Production".to_string(),
            surface: None,
            method: "GET".to_string(),
            expected_status: 200,
            description: String::new(),
        }
    }

    /// Prober that replays a scripted sequence of outcomes per URL, then
    /// reports UP forever.
    struct ScriptedProber {
        outcomes: std::sync::Mutex<HashMap<String, VecDeque<bool>>>,
    }

    impl ScriptedProber {
        fn new(script: &[(&str, &[bool])]) -> Self {
            let outcomes = script
                .iter()
                .map(|(url, states)| (url.to_string(), states.iter().copied().collect()))
                .collect();
            Self {
                outcomes: std::sync::Mutex::new(outcomes),
            }
        }
    }

    #[async_trait]
    impl EndpointProber for ScriptedProber {
        async fn probe(&self, spec: &EndpointSpec) -> ProbeResult {
            let is_up = self
                .outcomes
                .lock()
                .unwrap()
                .get_mut(&spec.url)
                .and_then(|q| q.pop_front())
                .unwrap_or(true);

            if is_up {
                ProbeResult::up(spec, 200, Duration::from_millis(5))
            } else {
                ProbeResult::down(spec, Some(503), "HTTP 503")
            }
        }
    }

    #[test]
    fn valid_state_transitions() {
        assert!(MonitorState::Idle.can_transition_to(MonitorState::Active));
        assert!(MonitorState::Active.can_transition_to(MonitorState::Stopping));
        assert!(MonitorState::Stopping.can_transition_to(MonitorState::Stopped));
        assert!(MonitorState::Stopped.can_transition_to(MonitorState::Active));
    }

    #[test]
    fn invalid_state_transitions() {
        assert!(!MonitorState::Idle.can_transition_to(MonitorState::Stopping));
        assert!(!MonitorState::Idle.can_transition_to(MonitorState::Stopped));
        assert!(!MonitorState::Active.can_transition_to(MonitorState::Idle));
        assert!(!MonitorState::Active.can_transition_to(MonitorState::Active));
        assert!(!MonitorState::Stopped.can_transition_to(MonitorState::Stopping));
        assert!(!MonitorState::Stopping.can_transition_to(MonitorState::Active));
    }

    #[tokio::test]
    async fn cycle_returns_results_in_registry_order() {
        let endpoints = vec![spec("https://b.com"), spec("https://a.com"), spec("https://c.com")];
        let prober = Arc::new(ScriptedProber::new(&[]));
        let monitor = HealthMonitor::new(endpoints, CheckerConfig::default(), prober, None);

        let (results, _) = monitor.run_cycle().await;
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.com", "https://a.com", "https://c.com"]);
    }

    #[tokio::test]
    async fn first_cycle_sends_report_but_no_alert() {
        let (tx, mut rx) = crate::notifier::notification_channel();
        let prober = Arc::new(ScriptedProber::new(&[("https://a.com", &[false])]));
        let monitor = HealthMonitor::new(
            vec![spec("https://a.com")],
            CheckerConfig::default(),
            prober,
            Some(tx),
        );

        let (results, transitions) = monitor.run_cycle().await;
        assert_eq!(results.len(), 1);
        assert!(transitions.is_empty());

        match rx.try_recv().unwrap() {
            Notification::Report(report) => assert!(report.contains("Health Check Report")),
            other => panic!("expected report, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_flip_sends_alert_before_report() {
        let (tx, mut rx) = crate::notifier::notification_channel();
        let prober = Arc::new(ScriptedProber::new(&[("https://a.com", &[true, false])]));
        let monitor = HealthMonitor::new(
            vec![spec("https://a.com")],
            CheckerConfig::default(),
            prober,
            Some(tx),
        );

        monitor.run_cycle().await;
        let _first_report = rx.try_recv().unwrap();

        let (_, transitions) = monitor.run_cycle().await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].previous, EndpointStatus::Up);
        assert_eq!(transitions[0].current, EndpointStatus::Down);

        match rx.try_recv().unwrap() {
            Notification::Alert(alert) => assert!(alert.contains("is now DOWN")),
            other => panic!("expected alert, got {:?}", other),
        }
        match rx.try_recv().unwrap() {
            Notification::Report(_) => {}
            other => panic!("expected report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn manual_probe_does_not_touch_status_memory() {
        let prober = Arc::new(ScriptedProber::new(&[("https://a.com", &[false, true])]));
        let monitor = HealthMonitor::new(
            vec![spec("https://a.com")],
            CheckerConfig::default(),
            prober,
            None,
        );

        // A manual pass consumes a scripted DOWN without recording it.
        let results = monitor.probe_all().await;
        assert!(!results[0].is_up());
        assert!(monitor.status_snapshot().await.is_empty());

        // The next real cycle is a first observation: no transition.
        let (_, transitions) = monitor.run_cycle().await;
        assert!(transitions.is_empty());
    }

    #[tokio::test]
    async fn transition_counts_accumulate() {
        let prober = Arc::new(ScriptedProber::new(&[("https://a.com", &[true, false, true])]));
        let monitor = HealthMonitor::new(
            vec![spec("https://a.com")],
            CheckerConfig::default(),
            prober,
            None,
        );

        monitor.run_cycle().await;
        monitor.run_cycle().await;
        monitor.run_cycle().await;

        let counts = monitor.transition_counts().await;
        assert_eq!(counts.get("https://a.com"), Some(&2));
    }

    #[tokio::test]
    async fn start_without_endpoints_stays_idle() {
        let prober = Arc::new(ScriptedProber::new(&[]));
        let monitor = Arc::new(HealthMonitor::new(
            vec![],
            CheckerConfig::default(),
            prober,
            None,
        ));

        Arc::clone(&monitor).start().await;
        assert_eq!(monitor.state().await, MonitorState::Idle);
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let prober = Arc::new(ScriptedProber::new(&[]));
        let monitor = Arc::new(HealthMonitor::new(
            vec![spec("https://a.com")],
            CheckerConfig::default().with_check_interval(3600),
            prober,
            None,
        ));

        Arc::clone(&monitor).start().await;
        assert_eq!(monitor.state().await, MonitorState::Active);

        monitor.stop().await;
        let state = monitor.state().await;
        assert!(state == MonitorState::Stopping || state == MonitorState::Stopped);
    }
}
