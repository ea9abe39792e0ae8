use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// A monitored device. Identity is the address.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub address: String,
    pub mac: Option<String>,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self { name: name.into(), address: address.into(), mac: None }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "UNKNOWN",
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
        }
    }
}

/// Mutable tracking state of one device.
///
/// `alert_silenced` is only ever true while `status == Offline`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceState {
    pub status: DeviceStatus,
    pub consecutive_failures: u32,
    /// `None` until the first successful probe.
    pub last_seen: Option<OffsetDateTime>,
    pub alert_silenced: bool,
    pub last_latency: Option<Duration>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    BecameOnline,
    BecameOffline,
}

impl TransitionKind {
    pub fn status(&self) -> DeviceStatus {
        match self {
            TransitionKind::BecameOnline => DeviceStatus::Online,
            TransitionKind::BecameOffline => DeviceStatus::Offline,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct OutageEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: TransitionKind,
}

impl OutageEvent {
    pub fn new(timestamp: OffsetDateTime, kind: TransitionKind) -> Self {
        Self { timestamp, kind }
    }
}

/// Result of one reachability probe. Timeouts count as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { latency: Option<Duration> },
    Unreachable,
    TimedOut,
}

impl ProbeOutcome {
    pub fn reachable() -> Self {
        ProbeOutcome::Reachable { latency: None }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Reachable { latency } => *latency,
            _ => None,
        }
    }
}

impl From<bool> for ProbeOutcome {
    fn from(reachable: bool) -> Self {
        if reachable { ProbeOutcome::reachable() } else { ProbeOutcome::Unreachable }
    }
}
