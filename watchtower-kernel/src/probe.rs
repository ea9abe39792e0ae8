//! Reachability probes.
//!
//! A [`Probe`] answers "is this address reachable right now?". Failures and
//! timeouts are ordinary outcomes, never errors. [`probe_bounded`] enforces
//! the per-device timeout on top of whatever the adapter does itself.

use crate::config::{ProbeConf, ProbeKind};
use crate::models::ProbeOutcome;
use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome;
}

/// Runs `probe` and maps an overrun of `timeout` to [`ProbeOutcome::TimedOut`].
pub async fn probe_bounded(probe: &dyn Probe, address: &str, timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(timeout, probe.probe(address, timeout)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(address, timeout_ms = timeout.as_millis() as u64, "probe timed out");
            ProbeOutcome::TimedOut
        }
    }
}

pub fn probe_from_config(conf: &ProbeConf) -> Arc<dyn Probe> {
    match conf.kind {
        ProbeKind::Ping => Arc::new(PingProbe),
        ProbeKind::Tcp => Arc::new(TcpProbe::new(conf.tcp_port)),
    }
}

/// One ICMP echo through the system `ping` binary.
pub struct PingProbe;

impl PingProbe {
    fn command(address: &str, timeout: Duration) -> AsyncCommand {
        let mut cmd = AsyncCommand::new("ping");
        if cfg!(target_os = "windows") {
            cmd.args(["-n", "1", "-w"]).arg(timeout.as_millis().max(1).to_string());
        } else if cfg!(target_os = "macos") {
            cmd.args(["-c", "1", "-W"]).arg(timeout.as_millis().max(1).to_string());
        } else {
            // Linux iputils only takes whole seconds.
            cmd.args(["-c", "1", "-W"]).arg(timeout.as_secs().max(1).to_string());
        }
        cmd.arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        match Self::command(address, timeout).status().await {
            Ok(status) if status.success() => ProbeOutcome::Reachable { latency: Some(started.elapsed()) },
            Ok(status) => {
                debug!(address, code = ?status.code(), "ping failed");
                ProbeOutcome::Unreachable
            }
            Err(e) => {
                debug!(address, error = %e, "cannot spawn ping");
                ProbeOutcome::Unreachable
            }
        }
    }
}

/// TCP connect to a fixed port, for hosts that drop ICMP.
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    fn target(&self, address: &str) -> String {
        match address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{ip}]:{}", self.port),
            _ => format!("{address}:{}", self.port),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect(self.target(address))).await {
            Ok(Ok(_stream)) => ProbeOutcome::Reachable { latency: Some(started.elapsed()) },
            Ok(Err(e)) => {
                debug!(address, port = self.port, error = %e, "tcp connect failed");
                ProbeOutcome::Unreachable
            }
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}
