use crate::models::Device;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const DEFAULT_CONFIG_PATH: &str = "watchtower.yaml";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_MQTT_TOPIC: &str = "watchtower/alerts@v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("device #{index} has no name")]
    MissingName { index: usize },
    #[error("device '{name}' has no address")]
    MissingAddress { name: String },
    #[error("device '{name}' has an invalid address '{address}'")]
    InvalidAddress { name: String, address: String },
    #[error("address {address} is used by both '{first}' and '{second}'")]
    DuplicateAddress { address: String, first: String, second: String },
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
    #[error("offline alert threshold must be greater than zero")]
    InvalidThreshold,
    #[error("probe timeout and concurrency must be greater than zero")]
    InvalidProbe,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchtowerConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConf>,
    #[serde(default = "default_interval", alias = "ping_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_threshold")]
    pub offline_alert_threshold: u32,
    #[serde(default)]
    pub probe: ProbeConf,
    #[serde(default)]
    pub history_retention: Option<usize>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub cue: CueKind,
    #[serde(default)]
    pub http: HttpConf,
    #[serde(default)]
    pub wol: WolConf,
    #[serde(default)]
    pub alerts: AlertsConf,
}

/// Raw device entry; required fields are checked by `registry::load_devices`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DeviceConf {
    pub name: Option<String>,
    #[serde(alias = "ip")]
    pub address: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Ping,
    Tcp,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeConf {
    #[serde(default)]
    pub kind: ProbeKind,
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    #[default]
    Bell,
    Silent,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub bind: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WolConf {
    pub broadcast: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AlertsConf {
    pub email: Option<EmailConf>,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailConf {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub from: String,
    pub to: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
}

fn default_interval() -> u64 { DEFAULT_POLL_INTERVAL_SECS }
fn default_threshold() -> u32 { DEFAULT_ALERT_THRESHOLD }
fn default_probe_timeout() -> u64 { DEFAULT_PROBE_TIMEOUT_MS }
fn default_tcp_port() -> u16 { 80 }
fn default_max_concurrent() -> usize { 32 }
fn default_smtp_port() -> u16 { 587 }
fn default_mqtt_topic() -> String { DEFAULT_MQTT_TOPIC.into() }
fn default_mqtt_client_id() -> String { "watchtower-alerts".into() }

impl Default for ProbeConf {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Ping,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            tcp_port: default_tcp_port(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

impl Default for WolConf {
    fn default() -> Self {
        Self { broadcast: "255.255.255.255".into() }
    }
}

impl Default for WatchtowerConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            offline_alert_threshold: DEFAULT_ALERT_THRESHOLD,
            probe: ProbeConf::default(),
            history_retention: None,
            log_file: None,
            cue: CueKind::default(),
            http: HttpConf::default(),
            wol: WolConf::default(),
            alerts: AlertsConf::default(),
        }
    }
}

impl DeviceConf {
    pub fn new(name: &str, address: &str) -> Self {
        Self { name: Some(name.into()), address: Some(address.into()), mac: None }
    }
}

impl From<&Device> for DeviceConf {
    fn from(device: &Device) -> Self {
        Self {
            name: Some(device.name.clone()),
            address: Some(device.address.clone()),
            mac: device.mac.clone(),
        }
    }
}

impl WatchtowerConfig {
    /// Parses and validates a YAML (or JSON) document.
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        let cfg: WatchtowerConfig = serde_yaml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.offline_alert_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.probe.timeout_ms == 0 || self.probe.max_concurrent == 0 {
            return Err(ConfigError::InvalidProbe);
        }
        crate::registry::load_devices(&self.devices).map(|_| ())
    }

    /// Validated, name-sorted device list.
    pub fn devices(&self) -> Result<Vec<Device>, ConfigError> {
        crate::registry::load_devices(&self.devices)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var("WATCHTOWER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub async fn load_config(path: &Path) -> Result<WatchtowerConfig, ConfigError> {
    let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    WatchtowerConfig::from_yaml_str(&txt)
}
