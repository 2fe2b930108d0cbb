//! Monitor module: runs one health-check cycle and decides on notification.

mod report;

pub use report::*;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::config::ConfigError;
use crate::notify::Notifier;
use crate::probe::{ApplicationTarget, CheckOutcome, ProbeError, Prober};
use crate::scheduler::CycleTask;

/// Errors that abort a whole cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to load applications: {0}")]
    Targets(#[from] ConfigError),
}

/// Supplies the ordered list of applications for a cycle.
pub trait TargetSource: Send + Sync {
    fn load_targets(&self) -> Result<Vec<ApplicationTarget>, ConfigError>;
}

/// Probes every configured application and alerts when any is unhealthy.
pub struct Monitor {
    targets: Arc<dyn TargetSource>,
    prober: Prober,
    notifier: Arc<dyn Notifier>,
}

impl Monitor {
    pub fn new(targets: Arc<dyn TargetSource>, prober: Prober, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            targets,
            prober,
            notifier,
        }
    }

    /// Load targets and probe them all concurrently.
    ///
    /// Outcomes are collected in target-list order, not completion order.
    pub async fn run_checks(&self) -> Result<CycleReport, CycleError> {
        let targets = self.targets.load_targets()?;
        let started_at = Utc::now();

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let prober = self.prober.clone();
                tokio::spawn(async move { prober.check(&target).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(targets.len());
        for (target, handle) in targets.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Probe task for {} failed: {}", target.name, e);
                    CheckOutcome::failed(
                        target,
                        Utc::now(),
                        &ProbeError::Unexpected(format!("probe task failed: {}", e)),
                    )
                }
            };

            tracing::info!(
                "Checked {}: {}",
                target.name,
                if outcome.is_healthy { "Healthy" } else { "Unhealthy" }
            );
            outcomes.push(outcome);
        }

        Ok(CycleReport::new(outcomes, started_at, Utc::now()))
    }

    /// Hand the report to the notifier if anything is unhealthy.
    ///
    /// Returns whether the notifier was invoked. Delivery errors are logged
    /// and swallowed.
    pub async fn notify_if_unhealthy(&self, report: &CycleReport) -> bool {
        if !report.has_unhealthy() {
            return false;
        }

        tracing::warn!(
            "{} of {} application(s) unhealthy",
            report.unhealthy_count(),
            report.all_outcomes.len()
        );

        if let Err(e) = self.notifier.notify(report).await {
            tracing::error!("Failed to send email: {}", e);
        }
        true
    }
}

#[async_trait]
impl CycleTask for Monitor {
    async fn run_cycle(&self) -> Result<(), CycleError> {
        tracing::info!("Starting health check...");

        let report = self.run_checks().await?;
        self.notify_if_unhealthy(&report).await;

        tracing::info!(
            "Health check completed. ({} checked in {} ms)",
            report.all_outcomes.len(),
            (report.finished_at - report.started_at).num_milliseconds()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::test_support::LogCapture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticTargets(Vec<ApplicationTarget>);

    impl TargetSource for StaticTargets {
        fn load_targets(&self) -> Result<Vec<ApplicationTarget>, ConfigError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTargets;

    impl TargetSource for BrokenTargets {
        fn load_targets(&self) -> Result<Vec<ApplicationTarget>, ConfigError> {
            Err(ConfigError::MalformedApplication {
                entry: "A|http://a.test|abc".to_string(),
                reason: "invalid expected status code 'abc'".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        reports: Mutex<Vec<CycleReport>>,
        fail: bool,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, report: &CycleReport) -> Result<(), NotifyError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotifyError::Config("SMTP server"));
            }
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    fn monitor(targets: Vec<ApplicationTarget>, notifier: Arc<RecordingNotifier>) -> Monitor {
        Monitor::new(
            Arc::new(StaticTargets(targets)),
            Prober::new(Duration::from_secs(5)).unwrap(),
            notifier,
        )
    }

    #[tokio::test]
    async fn test_mixed_cycle_notifies_once_with_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(
            vec![
                ApplicationTarget::new("A", server.uri()),
                ApplicationTarget::new("B", closed_port_url()),
            ],
            notifier.clone(),
        );

        monitor.run_cycle().await.unwrap();

        let reports = notifier.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.all_outcomes.len(), 2);
        assert_eq!(report.all_outcomes[0].application_name, "A");
        assert!(report.all_outcomes[0].is_healthy);
        assert_eq!(report.unhealthy_outcomes.len(), 1);
        assert_eq!(report.unhealthy_outcomes[0].application_name, "B");
        assert!(report.unhealthy_outcomes[0].message.starts_with("Connection failed: "));
        assert_eq!(report.unhealthy_outcomes[0].status_code, None);
    }

    #[tokio::test]
    async fn test_all_healthy_does_not_notify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(
            vec![
                ApplicationTarget::new("A", server.uri()),
                ApplicationTarget::new("A", server.uri()),
            ],
            notifier.clone(),
        );

        let report = monitor.run_checks().await.unwrap();
        assert_eq!(report.all_outcomes.len(), 2);
        assert!(!monitor.notify_if_unhealthy(&report).await);

        let logs = LogCapture::install();
        monitor.run_cycle().await.unwrap();
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 0);

        let output = logs.contents();
        assert!(output.contains("Starting health check..."));
        assert!(output.contains("Checked A: Healthy"));
        assert!(output.contains("Health check completed."));
        assert!(!output.contains("Failed to send email"));
    }

    #[tokio::test]
    async fn test_outcomes_follow_target_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/fast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(
            vec![
                ApplicationTarget::new("slow", format!("{}/slow", server.uri())),
                ApplicationTarget::new("fast", format!("{}/fast", server.uri())),
                ApplicationTarget::new("broken", "not a url"),
            ],
            notifier,
        );

        let report = monitor.run_checks().await.unwrap();
        let names: Vec<_> = report
            .all_outcomes
            .iter()
            .map(|o| o.application_name.as_str())
            .collect();
        assert_eq!(names, ["slow", "fast", "broken"]);

        let unhealthy: Vec<_> = report
            .unhealthy_outcomes
            .iter()
            .map(|o| o.application_name.as_str())
            .collect();
        assert_eq!(unhealthy, ["fast", "broken"]);
    }

    #[tokio::test]
    async fn test_empty_target_list() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(Vec::new(), notifier.clone());

        let report = monitor.run_checks().await.unwrap();
        assert!(report.all_outcomes.is_empty());
        assert!(report.unhealthy_outcomes.is_empty());

        monitor.run_cycle().await.unwrap();
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_notifier_failure_still_completes_cycle() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let monitor = monitor(vec![ApplicationTarget::new("broken", "not a url")], notifier.clone());
        let logs = LogCapture::install();

        assert!(monitor.run_cycle().await.is_ok());
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);

        let output = logs.contents();
        assert!(output.contains("Checked broken: Unhealthy"));
        assert!(output.contains("Failed to send email: "));
        assert!(output.contains("Health check completed."));
    }

    #[tokio::test]
    async fn test_target_load_failure_is_cycle_error() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            Arc::new(BrokenTargets),
            Prober::new(Duration::from_secs(5)).unwrap(),
            notifier.clone(),
        );

        let err = monitor.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Targets(_)));
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 0);
    }
}
