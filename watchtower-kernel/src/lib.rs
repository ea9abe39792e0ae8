//! Watchtower: periodic reachability monitoring of network devices with
//! debounced offline alerts, recovery notices and per-device outage history.

pub mod config;
pub mod engine;
pub mod health;
pub mod history;
pub mod http;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod tracker;
pub mod wol;

pub use config::{ConfigError, WatchtowerConfig};
pub use engine::{evaluate, Verdict};
pub use models::{Device, DeviceState, DeviceStatus, OutageEvent, ProbeOutcome, TransitionKind};
pub use monitor::Monitor;
pub use notify::{AlertSink, Cue, LogSink, Notifier, NotifyError};
pub use probe::Probe;
pub use scheduler::{ManualCheck, PollScheduler, TickReport};
pub use tracker::{DeviceSnapshot, StatusSummary};
