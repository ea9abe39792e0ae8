/*!
Test harness for the monitor

Wires a real Monitor + PollScheduler to test doubles:
- a `ScriptedProbe` instead of ping
- a `RecordingAlertSink`, `RecordingCue` and `MemoryLog` capturing every output
- expectations on alert subjects, checked with `verify_expectations`
*/

use crate::probe_stub::ScriptedProbe;
use crate::sinks::{MemoryLog, RecordingAlertSink, RecordingCue};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use watchtower_kernel::config::{DeviceConf, WatchtowerConfig};
use watchtower_kernel::models::DeviceStatus;
use watchtower_kernel::monitor::Monitor;
use watchtower_kernel::notify::{ActivityFeed, AlertSink, Notifier};
use watchtower_kernel::scheduler::{PollScheduler, TickReport};

/// Short enough that a hanging sink does not slow a test down.
pub const HARNESS_SINK_TIMEOUT: Duration = Duration::from_millis(250);
pub const HARNESS_ACTIVITY_CAPACITY: usize = 50;

pub struct TestHarness {
    pub monitor: Arc<Monitor>,
    pub scheduler: PollScheduler,
    pub probe: Arc<ScriptedProbe>,
    pub alerts: Arc<RecordingAlertSink>,
    pub cue: Arc<RecordingCue>,
    pub log: Arc<MemoryLog>,
    pub activity: Arc<ActivityFeed>,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    subject: String,
    expected_count: usize,
}

impl TestHarness {
    /// Harness over `(name, address)` pairs with default settings (threshold 3).
    pub fn new(devices: &[(&str, &str)]) -> Result<Self> {
        Self::build(Self::config_for(devices), Vec::new())
    }

    pub fn with_config(cfg: WatchtowerConfig) -> Result<Self> {
        Self::build(cfg, Vec::new())
    }

    /// Like `with_config`, with more alert sinks registered after the recorder.
    pub fn build(cfg: WatchtowerConfig, extra_sinks: Vec<Arc<dyn AlertSink>>) -> Result<Self> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        let probe = Arc::new(ScriptedProbe::new());
        let alerts = Arc::new(RecordingAlertSink::new("recorder"));
        let cue = Arc::new(RecordingCue::new());
        let log = Arc::new(MemoryLog::new());
        let activity = Arc::new(ActivityFeed::new(HARNESS_ACTIVITY_CAPACITY));

        let mut notifier = Notifier::new(cue.clone())
            .with_alert_sink(alerts.clone())
            .with_log_sink(log.clone())
            .with_log_sink(activity.clone())
            .with_sink_timeout(HARNESS_SINK_TIMEOUT);
        for sink in extra_sinks {
            notifier = notifier.with_alert_sink(sink);
        }

        let monitor = Arc::new(Monitor::new(&cfg, probe.clone(), notifier)?.with_activity(activity.clone()));
        let scheduler = PollScheduler::new(monitor.clone());

        Ok(Self { monitor, scheduler, probe, alerts, cue, log, activity, expectations: Vec::new() })
    }

    pub fn config_for(devices: &[(&str, &str)]) -> WatchtowerConfig {
        WatchtowerConfig {
            devices: devices.iter().map(|(name, address)| DeviceConf::new(name, address)).collect(),
            ..Default::default()
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.scheduler.run_tick().await
    }

    pub async fn ticks(&self, n: usize) -> Vec<TickReport> {
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            reports.push(self.tick().await);
        }
        reports
    }

    pub fn status(&self, address: &str) -> Option<DeviceStatus> {
        self.monitor.device(address, 0).map(|d| d.status)
    }

    /// Expects `count` alerts with exactly this subject on the recorder.
    pub fn expect_alerts(&mut self, subject: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation { subject: subject.to_string(), expected_count: count });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        let subjects = self.alerts.subjects();
        for expectation in &self.expectations {
            let actual = subjects.iter().filter(|s| **s == expectation.subject).count();
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "expected {} alert(s) '{}', got {} (all: {:?})",
                    expectation.expected_count,
                    expectation.subject,
                    actual,
                    subjects
                );
            }
        }
        tracing::debug!(count = self.expectations.len(), "expectations verified");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.alerts.clear();
        self.log.clear();
        self.probe.clear_calls();
        self.expectations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_basic_functionality() {
        let mut harness = TestHarness::new(&[("Router", "10.0.0.1")]).unwrap();
        harness.probe.script("10.0.0.1", [true, false, false, false]);

        harness.expect_alerts("[Alert] Router is OFFLINE", 1);
        harness.ticks(4).await;

        harness.verify_expectations().unwrap();
        assert_eq!(harness.status("10.0.0.1"), Some(DeviceStatus::Offline));
        assert_eq!(harness.probe.calls_for("10.0.0.1"), 4);
    }

    #[tokio::test]
    async fn test_failed_expectation_reports() {
        let mut harness = TestHarness::new(&[("Router", "10.0.0.1")]).unwrap();
        harness.expect_alerts("[Alert] Router is ONLINE", 1);
        harness.tick().await;
        assert!(harness.verify_expectations().is_err());
    }
}
