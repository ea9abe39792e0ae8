/**
 * NOTIFY - Destination des verdicts une fois l'état mis à jour
 *
 * RÔLE :
 * Distribue les verdicts du moteur vers trois types de collaborateurs :
 * - log sinks   : chaque verdict, en une ligne horodatée (tracing, fichier, activity feed)
 * - alert sinks : alertes offline/recovered (email, MQTT)
 * - cue         : signal sonore/UI au retour en ligne
 *
 * POLITIQUE D'ÉCHEC :
 * Un sink en erreur ou bloqué au-delà du sink timeout est loggé puis ignoré.
 * Rien ici ne peut faire échouer un cycle : l'état est déjà commité
 * avant le début du dispatch.
 */

pub mod cue;
pub mod email;
pub mod log;
pub mod mqtt;

use crate::engine::Verdict;
use crate::models::Device;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use cue::{cue_from_config, Cue, SilentCue, TerminalBell};
pub use email::EmailAlertSink;
pub use log::{ActivityFeed, FileLog, LogLevel, LogLine, LogSink, TracingLog};
pub use mqtt::MqttAlertSink;

pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("email build error: {0}")]
    Build(String),
    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub notices: usize,
    pub alerts: usize,
    pub recoveries: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.notices += other.notices;
        self.alerts += other.alerts;
        self.recoveries += other.recoveries;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

pub struct Notifier {
    alert_sinks: Vec<Arc<dyn AlertSink>>,
    log_sinks: Vec<Arc<dyn LogSink>>,
    cue: Arc<dyn Cue>,
    sink_timeout: Duration,
}

impl Notifier {
    pub fn new(cue: Arc<dyn Cue>) -> Self {
        Self {
            alert_sinks: Vec::new(),
            log_sinks: Vec::new(),
            cue,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sinks.push(sink);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sinks.push(sink);
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn alert_sink_names(&self) -> Vec<String> {
        self.alert_sinks.iter().map(|s| s.name().to_string()).collect()
    }

    /// Writes one line to every log sink.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let line = LogLine::now(level, message);
        for sink in &self.log_sinks {
            sink.write(&line);
        }
    }

    pub async fn dispatch(&self, device: &Device, verdicts: &[Verdict]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for verdict in verdicts {
            let message = verdict.message(device);
            match verdict {
                Verdict::Unreachable => {
                    report.notices += 1;
                    self.log(LogLevel::Warn, message);
                }
                Verdict::WentOffline => {
                    report.alerts += 1;
                    self.log(LogLevel::Error, message.clone());
                    report.merge(self.alert(&verdict.subject(device), &message).await);
                }
                Verdict::Recovered => {
                    report.recoveries += 1;
                    self.log(LogLevel::Info, message.clone());
                    self.cue.chime(device);
                    report.merge(self.alert(&verdict.subject(device), &message).await);
                }
            }
        }

        report
    }

    /// Sends to every alert sink concurrently; failures are logged, not returned.
    pub async fn alert(&self, subject: &str, body: &str) -> DispatchReport {
        let deliveries = self.alert_sinks.iter().map(|sink| async move {
            let result = match tokio::time::timeout(self.sink_timeout, sink.notify(subject, body)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(self.sink_timeout)),
            };
            (sink.name().to_string(), result)
        });

        let mut report = DispatchReport::default();
        for (name, result) in join_all(deliveries).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(sink = %name, error = %e, subject, "alert delivery failed");
                    self.log(LogLevel::Error, format!("Failed to send alert via {name}: {e}"));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        alerts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        async fn notify(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Rejected("mailbox full".into()));
            }
            self.alerts.lock().push(subject.to_string());
            Ok(())
        }
    }

    struct Hangs;

    #[async_trait]
    impl AlertSink for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        async fn notify(&self, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn device() -> Device {
        Device::new("NAS", "10.0.0.5")
    }

    #[tokio::test]
    async fn test_notice_is_log_only() {
        let capture = Arc::new(Capture::default());
        let feed = Arc::new(ActivityFeed::new(10));
        let notifier = Notifier::new(Arc::new(SilentCue))
            .with_alert_sink(capture.clone())
            .with_log_sink(feed.clone());

        let report = notifier.dispatch(&device(), &[Verdict::Unreachable]).await;

        assert_eq!(report.notices, 1);
        assert_eq!(report.delivered, 0);
        assert!(capture.alerts.lock().is_empty());
        assert_eq!(feed.entries(10)[0].message, "NAS (10.0.0.5) is now OFFLINE");
    }

    #[tokio::test]
    async fn test_alerts_reach_every_sink() {
        let first = Arc::new(Capture::default());
        let second = Arc::new(Capture::default());
        let notifier = Notifier::new(Arc::new(SilentCue))
            .with_alert_sink(first.clone())
            .with_alert_sink(second.clone());

        let report = notifier
            .dispatch(&device(), &[Verdict::WentOffline, Verdict::Recovered])
            .await;

        assert_eq!(report.alerts, 1);
        assert_eq!(report.recoveries, 1);
        assert_eq!(report.delivered, 4);
        assert_eq!(*first.alerts.lock(), vec!["[Alert] NAS is OFFLINE", "[Alert] NAS is ONLINE"]);
        assert_eq!(second.alerts.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_and_stalled_sinks_are_swallowed() {
        let healthy = Arc::new(Capture::default());
        let broken = Arc::new(Capture { fail: true, ..Default::default() });
        let feed = Arc::new(ActivityFeed::new(10));
        let notifier = Notifier::new(Arc::new(SilentCue))
            .with_alert_sink(broken)
            .with_alert_sink(Arc::new(Hangs))
            .with_alert_sink(healthy.clone())
            .with_log_sink(feed.clone())
            .with_sink_timeout(Duration::from_millis(50));

        let report = notifier.dispatch(&device(), &[Verdict::WentOffline]).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(healthy.alerts.lock().len(), 1);
        let lines: Vec<String> = feed.entries(10).into_iter().map(|l| l.message).collect();
        assert!(lines.iter().any(|l| l.contains("Failed to send alert via capture")));
        assert!(lines.iter().any(|l| l.contains("Failed to send alert via hangs")));
    }
}
