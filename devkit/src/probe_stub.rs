/*!
Scripted probe: each address gets a queue of outcomes, consumed one per
probe call. When a queue runs dry the probe falls back to a per-address
sticky outcome, then to the global default.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use watchtower_kernel::models::ProbeOutcome;
use watchtower_kernel::probe::Probe;

#[derive(Default)]
struct Script {
    queues: HashMap<String, VecDeque<ProbeOutcome>>,
    sticky: HashMap<String, ProbeOutcome>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

pub struct ScriptedProbe {
    default: ProbeOutcome,
    script: Mutex<Script>,
}

impl ScriptedProbe {
    /// Every unscripted address is unreachable.
    pub fn new() -> Self {
        Self::with_default(ProbeOutcome::Unreachable)
    }

    pub fn with_default(default: ProbeOutcome) -> Self {
        Self { default, script: Mutex::new(Script::default()) }
    }

    /// Queues outcomes for `address`; `true` means reachable.
    pub fn script<I, O>(&self, address: &str, outcomes: I) -> &Self
    where
        I: IntoIterator<Item = O>,
        O: Into<ProbeOutcome>,
    {
        self.script
            .lock()
            .queues
            .entry(address.to_string())
            .or_default()
            .extend(outcomes.into_iter().map(Into::into));
        self
    }

    /// Outcome returned for `address` whenever its queue is empty.
    pub fn set(&self, address: &str, outcome: impl Into<ProbeOutcome>) -> &Self {
        self.script.lock().sticky.insert(address.to_string(), outcome.into());
        self
    }

    /// Makes every probe of `address` take `delay` before answering.
    pub fn delay(&self, address: &str, delay: Duration) -> &Self {
        self.script.lock().delays.insert(address.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    pub fn calls_for(&self, address: &str) -> usize {
        self.script.lock().calls.iter().filter(|a| *a == address).count()
    }

    pub fn clear_calls(&self) {
        self.script.lock().calls.clear();
    }

    pub fn remaining(&self, address: &str) -> usize {
        self.script.lock().queues.get(address).map_or(0, VecDeque::len)
    }
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, address: &str, _timeout: Duration) -> ProbeOutcome {
        let (outcome, delay) = {
            let mut script = self.script.lock();
            script.calls.push(address.to_string());
            let queued = script.queues.get_mut(address).and_then(VecDeque::pop_front);
            let outcome = queued
                .or_else(|| script.sticky.get(address).copied())
                .unwrap_or(self.default);
            (outcome, script.delays.get(address).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
