/**
 * MONITOR - Cœur partagé entre le scheduler et la couche HTTP
 *
 * RÔLE :
 * Possède le registry des devices, le state tracker, les settings actifs,
 * la probe et le notifier. Sert les lectures observer et applique les reloads.
 *
 * FONCTIONNEMENT :
 * - le tick gate (mutex tokio) est tenu par le scheduler pendant tout un tick
 *   et par reload() : un reload tombe donc entre deux ticks
 * - les observers ne touchent jamais le gate, seulement des locks brefs par device
 * - une config rejetée laisse registry, tracker et settings intacts
 */

use crate::config::{load_config, ConfigError, ProbeConf, WatchtowerConfig};
use crate::health::{HealthTracker, MonitorHealth};
use crate::models::{Device, OutageEvent};
use crate::notify::{ActivityFeed, LogLevel, LogLine, Notifier};
use crate::probe::Probe;
use crate::registry::DeviceRegistry;
use crate::tracker::{DeviceSnapshot, StateTracker, StatusSummary, SyncReport};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{info, warn};

pub type ProbeFactory = Box<dyn Fn(&ProbeConf) -> Arc<dyn Probe> + Send + Sync>;

/// The reloadable part of the configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub poll_interval: Duration,
    pub threshold: u32,
    pub probe_timeout: Duration,
    pub max_concurrent: usize,
    pub retention: Option<usize>,
    pub probe: ProbeConf,
    pub wol_broadcast: String,
}

impl Settings {
    pub fn from_config(cfg: &WatchtowerConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            threshold: cfg.offline_alert_threshold,
            probe_timeout: cfg.probe_timeout(),
            max_concurrent: cfg.probe.max_concurrent,
            retention: cfg.history_retention,
            probe: cfg.probe.clone(),
            wol_broadcast: cfg.wol.broadcast.clone(),
        }
    }
}

pub struct Monitor {
    registry: DeviceRegistry,
    tracker: StateTracker,
    settings: RwLock<Settings>,
    probe: RwLock<Arc<dyn Probe>>,
    probe_factory: Option<ProbeFactory>,
    notifier: Notifier,
    health: HealthTracker,
    activity: Option<Arc<ActivityFeed>>,
    config_path: Option<PathBuf>,
    tick_gate: AsyncMutex<()>,
}

impl Monitor {
    pub fn new(cfg: &WatchtowerConfig, probe: Arc<dyn Probe>, notifier: Notifier) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let devices = cfg.devices()?;
        let settings = Settings::from_config(cfg);
        let tracker = StateTracker::new(&devices, settings.retention);

        Ok(Self {
            registry: DeviceRegistry::new(devices),
            tracker,
            settings: RwLock::new(settings),
            probe: RwLock::new(probe),
            probe_factory: None,
            notifier,
            health: HealthTracker::new(),
            activity: None,
            config_path: None,
            tick_gate: AsyncMutex::new(()),
        })
    }

    /// Rebuilds the probe from the probe settings on every reload.
    pub fn with_probe_factory(mut self, factory: ProbeFactory) -> Self {
        self.probe_factory = Some(factory);
        self
    }

    pub fn with_activity(mut self, feed: Arc<ActivityFeed>) -> Self {
        self.activity = Some(feed);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn health_tracker(&self) -> &HealthTracker {
        &self.health
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.read().poll_interval
    }

    pub fn probe(&self) -> Arc<dyn Probe> {
        self.probe.read().clone()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub(crate) async fn lock_tick(&self) -> MutexGuard<'_, ()> {
        self.tick_gate.lock().await
    }

    // ---- observers ----

    /// Every device in registry order, with up to `recent_n` history events each.
    pub fn snapshot(&self, recent_n: usize) -> Vec<DeviceSnapshot> {
        self.registry
            .snapshot()
            .iter()
            .filter_map(|device| self.tracker.view(&device.address, recent_n))
            .collect()
    }

    pub fn device(&self, address: &str, recent_n: usize) -> Option<DeviceSnapshot> {
        self.tracker.view(address, recent_n)
    }

    pub fn history(&self, address: &str, n: usize) -> Option<Vec<OutageEvent>> {
        self.tracker.recent_events(address, n)
    }

    pub fn summary(&self) -> StatusSummary {
        self.tracker.summary()
    }

    pub fn health(&self) -> MonitorHealth {
        self.health.get_health(self.tracker.len())
    }

    /// Up to `limit` recent activity lines; empty when no feed is attached.
    pub fn activity(&self, limit: usize) -> Vec<LogLine> {
        self.activity.as_ref().map(|feed| feed.entries(limit)).unwrap_or_default()
    }

    pub fn find_device(&self, address: &str) -> Option<Device> {
        self.registry.get(address)
    }

    // ---- reload ----

    /// Applies a new configuration between two ticks.
    pub async fn reload(&self, cfg: &WatchtowerConfig) -> Result<SyncReport, ConfigError> {
        cfg.validate()?;
        let devices = cfg.devices()?;
        let settings = Settings::from_config(cfg);

        let _gate = self.lock_tick().await;

        let report = self.tracker.sync(&devices, settings.retention);
        self.registry.replace(devices);
        if let Some(factory) = &self.probe_factory {
            *self.probe.write() = factory(&settings.probe);
        }
        *self.settings.write() = settings;

        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            kept = report.kept,
            "configuration reloaded"
        );
        self.notifier.log(
            LogLevel::Info,
            format!(
                "Configuration reloaded: {} devices ({} added, {} removed)",
                self.registry.len(),
                report.added.len(),
                report.removed.len()
            ),
        );
        Ok(report)
    }

    /// Re-reads the config file this monitor was started from.
    pub async fn reload_from_path(&self) -> Result<SyncReport, ConfigError> {
        let Some(path) = self.config_path.clone() else {
            return Err(ConfigError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no config file attached"),
            });
        };
        match load_config(&path).await {
            Ok(cfg) => self.reload(&cfg).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "reload rejected, keeping previous config");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConf;
    use crate::models::{DeviceStatus, ProbeOutcome};
    use crate::notify::SilentCue;
    use async_trait::async_trait;

    struct AlwaysUp;

    #[async_trait]
    impl Probe for AlwaysUp {
        async fn probe(&self, _address: &str, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::reachable()
        }
    }

    fn config(devices: &[(&str, &str)]) -> WatchtowerConfig {
        WatchtowerConfig {
            devices: devices.iter().map(|(n, a)| DeviceConf::new(n, a)).collect(),
            ..Default::default()
        }
    }

    fn monitor(cfg: &WatchtowerConfig) -> Monitor {
        Monitor::new(cfg, Arc::new(AlwaysUp), Notifier::new(Arc::new(SilentCue))).unwrap()
    }

    #[test]
    fn test_snapshot_follows_registry_order() {
        let m = monitor(&config(&[("Switch", "10.0.0.2"), ("Router", "10.0.0.1")]));
        let names: Vec<String> = m.snapshot(5).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Router", "Switch"]);
        assert_eq!(m.summary().unknown, 2);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let cfg = WatchtowerConfig { offline_alert_threshold: 0, ..config(&[]) };
        let result = Monitor::new(&cfg, Arc::new(AlwaysUp), Notifier::new(Arc::new(SilentCue)));
        assert!(matches!(result, Err(ConfigError::InvalidThreshold)));
    }

    #[tokio::test]
    async fn test_reload_updates_settings_and_devices() {
        let m = monitor(&config(&[("Router", "10.0.0.1")]));
        m.tracker().apply("10.0.0.1", |r| r.state.status = DeviceStatus::Online);

        let mut next = config(&[("Router", "10.0.0.1"), ("NAS", "10.0.0.5")]);
        next.poll_interval_seconds = 5;
        next.offline_alert_threshold = 2;
        let report = m.reload(&next).await.unwrap();

        assert_eq!(report.added, vec!["10.0.0.5".to_string()]);
        assert_eq!(m.poll_interval(), Duration::from_secs(5));
        assert_eq!(m.settings().threshold, 2);
        assert_eq!(m.device("10.0.0.1", 0).unwrap().status, DeviceStatus::Online);
        assert_eq!(m.device("10.0.0.5", 0).unwrap().status, DeviceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_previous_state() {
        let m = monitor(&config(&[("Router", "10.0.0.1")]));
        let bad = config(&[("A", "10.0.0.9"), ("B", "10.0.0.9")]);

        assert!(matches!(m.reload(&bad).await, Err(ConfigError::DuplicateAddress { .. })));
        assert_eq!(m.registry().len(), 1);
        assert!(m.device("10.0.0.1", 0).is_some());
        assert!(m.device("10.0.0.9", 0).is_none());
    }

    #[tokio::test]
    async fn test_reload_from_path_without_file() {
        let m = monitor(&config(&[]));
        assert!(matches!(m.reload_from_path().await, Err(ConfigError::Io { .. })));
    }
}
