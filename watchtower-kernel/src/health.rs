use crate::notify::DispatchReport;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorHealth {
    pub uptime_seconds: u64,
    pub devices_tracked: usize,
    pub ticks_completed: u64,
    pub last_tick_ms: Option<u64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_tick_at: Option<OffsetDateTime>,
    pub alerts_sent: u64,
    pub notification_failures: u64,
    pub memory_usage_mb: Option<f32>,
}

/// Runtime counters shared between the scheduler and the HTTP layer.
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    ticks: Arc<AtomicU64>,
    alerts_sent: Arc<AtomicU64>,
    notification_failures: Arc<AtomicU64>,
    last_tick: Arc<Mutex<Option<(OffsetDateTime, Duration)>>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: Arc::new(AtomicU64::new(0)),
            alerts_sent: Arc::new(AtomicU64::new(0)),
            notification_failures: Arc::new(AtomicU64::new(0)),
            last_tick: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_tick(&self, took: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick.lock() = Some((OffsetDateTime::now_utc(), took));
    }

    pub fn record_dispatch(&self, report: &DispatchReport) {
        self.alerts_sent.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.notification_failures.fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn get_health(&self, devices_tracked: usize) -> MonitorHealth {
        let last = *self.last_tick.lock();
        MonitorHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            devices_tracked,
            ticks_completed: self.ticks(),
            last_tick_ms: last.map(|(_, took)| took.as_millis() as u64),
            last_tick_at: last.map(|(at, _)| at),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            memory_usage_mb: memory_usage_mb(),
        }
    }
}

/// Resident set size from procfs; `None` where unavailable.
fn memory_usage_mb() -> Option<f32> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let kb = status
            .lines()
            .find(|line| line.starts_with("VmRSS:"))?
            .split_whitespace()
            .nth(1)?
            .parse::<u64>()
            .ok()?;
        Some(kb as f32 / 1024.0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let health = HealthTracker::new();
        health.record_tick(Duration::from_millis(120));
        health.record_tick(Duration::from_millis(80));
        health.record_dispatch(&DispatchReport { delivered: 2, failed: 1, ..Default::default() });

        let snapshot = health.get_health(4);
        assert_eq!(snapshot.ticks_completed, 2);
        assert_eq!(snapshot.last_tick_ms, Some(80));
        assert!(snapshot.last_tick_at.is_some());
        assert_eq!(snapshot.alerts_sent, 2);
        assert_eq!(snapshot.notification_failures, 1);
        assert_eq!(snapshot.devices_tracked, 4);
    }

    #[test]
    fn test_fresh_tracker_has_no_tick() {
        let snapshot = HealthTracker::new().get_health(0);
        assert_eq!(snapshot.ticks_completed, 0);
        assert!(snapshot.last_tick_ms.is_none());
    }
}
