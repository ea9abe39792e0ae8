//! Poll scheduler.
//!
//! One tick probes every registered device concurrently, feeds each outcome
//! through [`evaluate`] under that device's lock, then hands the verdicts to
//! the notifier once probing is done. Notification latency therefore never
//! eats into another device's probe timeout, and devices are notified
//! concurrently so one slow sink is paid once per tick.

use crate::engine::{evaluate, Verdict};
use crate::models::{Device, DeviceStatus, ProbeOutcome};
use crate::monitor::Monitor;
use crate::notify::{DispatchReport, LogLevel};
use crate::probe::probe_bounded;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub probed: usize,
    pub online: usize,
    pub offline: usize,
    pub notices: usize,
    pub alerts: usize,
    pub recoveries: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl TickReport {
    fn absorb(&mut self, dispatch: DispatchReport) {
        self.notices += dispatch.notices;
        self.alerts += dispatch.alerts;
        self.recoveries += dispatch.recoveries;
        self.delivered += dispatch.delivered;
        self.failed += dispatch.failed;
    }
}

/// Result of a manual check. Never written to tracked state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualCheck {
    pub name: String,
    pub address: String,
    pub status: DeviceStatus,
    pub latency_ms: Option<u64>,
}

pub struct PollScheduler {
    monitor: Arc<Monitor>,
}

impl PollScheduler {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Ticks until `cancel` fires. The interval is re-read after every tick.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(devices = self.monitor.registry().len(), "poll scheduler started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.run_tick().await;
            debug!(
                probed = report.probed,
                online = report.online,
                offline = report.offline,
                alerts = report.alerts,
                recoveries = report.recoveries,
                "tick complete"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.monitor.poll_interval()) => {}
            }
        }

        info!("poll scheduler stopped");
    }

    pub async fn run_tick(&self) -> TickReport {
        let _gate = self.monitor.lock_tick().await;
        let started = Instant::now();

        let devices = self.monitor.registry().snapshot();
        let settings = self.monitor.settings();
        let probe = self.monitor.probe();
        let tracker = self.monitor.tracker();
        let (timeout, threshold) = (settings.probe_timeout, settings.threshold);

        let observed: Vec<(Device, ProbeOutcome, Vec<Verdict>)> = stream::iter(devices.iter().cloned())
            .map(|device| {
                let probe = probe.clone();
                async move {
                    let outcome = probe_bounded(probe.as_ref(), &device.address, timeout).await;
                    let now = OffsetDateTime::now_utc();
                    let verdicts = tracker
                        .apply(&device.address, |record| evaluate(record, outcome, threshold, now))
                        .unwrap_or_default();
                    (device, outcome, verdicts)
                }
            })
            .buffer_unordered(settings.max_concurrent.max(1))
            .collect()
            .await;

        let mut report = TickReport::default();
        let mut pending = Vec::new();
        for (device, outcome, verdicts) in &observed {
            report.probed += 1;
            if outcome.is_reachable() {
                report.online += 1;
            } else {
                report.offline += 1;
            }
            if !verdicts.is_empty() {
                pending.push(self.monitor.notifier().dispatch(device, verdicts));
            }
        }

        // All devices at once: a stalled sink costs one timeout per tick, not per device.
        for dispatched in join_all(pending).await {
            self.monitor.health_tracker().record_dispatch(&dispatched);
            report.absorb(dispatched);
        }

        self.monitor.health_tracker().record_tick(started.elapsed());
        report
    }

    /// Probes every device once and logs the result. Tracked state is untouched.
    pub async fn manual_check(&self) -> Vec<ManualCheck> {
        let devices = self.monitor.registry().snapshot();
        let settings = self.monitor.settings();
        let probe = self.monitor.probe();
        let timeout = settings.probe_timeout;

        let checks: Vec<ManualCheck> = stream::iter(devices.iter().cloned())
            .map(|device| {
                let probe = probe.clone();
                async move {
                    let outcome = probe_bounded(probe.as_ref(), &device.address, timeout).await;
                    let status = if outcome.is_reachable() { DeviceStatus::Online } else { DeviceStatus::Offline };
                    ManualCheck {
                        name: device.name,
                        address: device.address,
                        status,
                        latency_ms: outcome.latency().map(|l| l.as_millis() as u64),
                    }
                }
            })
            .buffered(settings.max_concurrent.max(1))
            .collect()
            .await;

        let notifier = self.monitor.notifier();
        for check in &checks {
            notifier.log(LogLevel::Info, format!("Manual check: {} is {}", check.name, check.status.label()));
        }
        checks
    }
}
