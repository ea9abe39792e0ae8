//! Alert decision engine.
//!
//! [`evaluate`] applies one probe result to a device record and reports
//! what should be announced. It never performs I/O: the caller applies it
//! under the record lock and hands the returned [`Verdict`]s to the
//! notifier afterwards, so a failing sink can never leave state half-updated.
//!
//! ```text
//!  Unknown ──ok──► Online ◄──────────── ok: BecameOnline, Recovered ─────┐
//!     │              │                                                   │
//!     └─────fail─────┴──fail: Unreachable──► Offline(n) ─────────────────┘
//!                                               │ n == T: BecameOffline, WentOffline, silenced
//!                                               └ n >  T: nothing
//! ```

use crate::models::{Device, DeviceStatus, OutageEvent, ProbeOutcome, TransitionKind};
use crate::state::DeviceRecord;
use time::OffsetDateTime;

/// What a single observation asks the notifier to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First failure after not being offline. Log-only.
    Unreachable,
    /// Failure count reached the threshold. Full alert, once per outage.
    WentOffline,
    /// Offline device answered again. Full alert plus cue.
    Recovered,
}

impl Verdict {
    /// Whether the verdict goes to alert sinks, not just the logs.
    pub fn is_alert(&self) -> bool {
        !matches!(self, Verdict::Unreachable)
    }

    pub fn status(&self) -> DeviceStatus {
        match self {
            Verdict::Recovered => DeviceStatus::Online,
            Verdict::Unreachable | Verdict::WentOffline => DeviceStatus::Offline,
        }
    }

    pub fn message(&self, device: &Device) -> String {
        format!("{} ({}) is now {}", device.name, device.address, self.status().label())
    }

    pub fn subject(&self, device: &Device) -> String {
        format!("[Alert] {} is {}", device.name, self.status().label())
    }
}

/// Applies one probe result to `record`. `threshold` must be at least 1.
pub fn evaluate(
    record: &mut DeviceRecord,
    outcome: ProbeOutcome,
    threshold: u32,
    now: OffsetDateTime,
) -> Vec<Verdict> {
    let state = &mut record.state;
    let previous = state.status;
    let mut verdicts = Vec::new();

    if outcome.is_reachable() {
        state.status = DeviceStatus::Online;
        state.last_seen = Some(now);
        state.consecutive_failures = 0;
        state.alert_silenced = false;
        state.last_latency = outcome.latency();

        if previous == DeviceStatus::Offline {
            record.history.push(OutageEvent::new(now, TransitionKind::BecameOnline));
            verdicts.push(Verdict::Recovered);
        }
        return verdicts;
    }

    state.status = DeviceStatus::Offline;
    state.consecutive_failures = state.consecutive_failures.saturating_add(1);

    if previous != DeviceStatus::Offline {
        verdicts.push(Verdict::Unreachable);
    }

    // One alert per outage. `>=` so a threshold lowered mid-outage still fires.
    if state.consecutive_failures >= threshold && !state.alert_silenced {
        record.history.push(OutageEvent::new(now, TransitionKind::BecameOffline));
        state.alert_silenced = true;
        verdicts.push(Verdict::WentOffline);
    }

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    fn record() -> DeviceRecord {
        DeviceRecord::new(Device::new("Router", "192.168.1.1"), None)
    }

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + secs).unwrap()
    }

    fn step(record: &mut DeviceRecord, reachable: bool, tick: i64) -> Vec<Verdict> {
        evaluate(record, reachable.into(), 3, at(tick))
    }

    #[test]
    fn test_reference_scenario() {
        let mut r = record();

        // tick 1: first success from Unknown is not an event
        assert!(step(&mut r, true, 1).is_empty());
        assert_eq!(r.state.status, DeviceStatus::Online);
        assert_eq!(r.state.last_seen, Some(at(1)));
        assert!(r.history.is_empty());

        // tick 2: first failure -> log-only notice
        assert_eq!(step(&mut r, false, 2), vec![Verdict::Unreachable]);
        assert_eq!(r.state.consecutive_failures, 1);
        assert!(!r.state.alert_silenced);

        // tick 3: nothing
        assert!(step(&mut r, false, 3).is_empty());
        assert_eq!(r.state.consecutive_failures, 2);

        // tick 4: threshold reached -> full alert
        assert_eq!(step(&mut r, false, 4), vec![Verdict::WentOffline]);
        assert_eq!(r.state.consecutive_failures, 3);
        assert!(r.state.alert_silenced);
        assert_eq!(r.history.recent(10), vec![OutageEvent::new(at(4), TransitionKind::BecameOffline)]);

        // tick 5: silenced
        assert!(step(&mut r, false, 5).is_empty());
        assert_eq!(r.state.consecutive_failures, 4);

        // tick 6: recovery
        assert_eq!(step(&mut r, true, 6), vec![Verdict::Recovered]);
        assert_eq!(r.state.status, DeviceStatus::Online);
        assert_eq!(r.state.consecutive_failures, 0);
        assert!(!r.state.alert_silenced);
        assert_eq!(r.state.last_seen, Some(at(6)));
        assert_eq!(r.history.len(), 2);
        assert_eq!(r.history.last().unwrap().kind, TransitionKind::BecameOnline);
    }

    #[test]
    fn test_alert_fires_only_at_threshold() {
        let mut r = record();
        step(&mut r, true, 0);

        for failure in 1..=10 {
            let verdicts = step(&mut r, false, failure);
            let alerted = verdicts.contains(&Verdict::WentOffline);
            assert_eq!(alerted, failure == 3, "failure #{failure}");
        }
        assert_eq!(r.history.len(), 1);
    }

    #[test]
    fn test_unknown_device_first_failure_gets_notice() {
        let mut r = record();
        assert_eq!(step(&mut r, false, 0), vec![Verdict::Unreachable]);
        assert_eq!(r.state.status, DeviceStatus::Offline);
        assert!(r.state.last_seen.is_none());
    }

    #[test]
    fn test_threshold_of_one_notices_and_alerts_together() {
        let mut r = record();
        let verdicts = evaluate(&mut r, ProbeOutcome::TimedOut, 1, at(0));
        assert_eq!(verdicts, vec![Verdict::Unreachable, Verdict::WentOffline]);
        assert!(r.state.alert_silenced);
    }

    #[test]
    fn test_short_outage_recovers_without_offline_event() {
        let mut r = record();
        step(&mut r, true, 0);
        step(&mut r, false, 1);
        step(&mut r, false, 2);

        assert_eq!(step(&mut r, true, 3), vec![Verdict::Recovered]);
        assert_eq!(r.history.recent(10), vec![OutageEvent::new(at(3), TransitionKind::BecameOnline)]);
    }

    #[test]
    fn test_recovery_after_any_outage_length() {
        for outage in 1..=12 {
            let mut r = record();
            step(&mut r, true, 0);
            for i in 0..outage {
                step(&mut r, false, 1 + i);
            }
            let before = r.history.len();

            assert_eq!(step(&mut r, true, 100), vec![Verdict::Recovered]);
            assert_eq!(r.history.len(), before + 1);
            assert_eq!(r.history.last().unwrap().kind, TransitionKind::BecameOnline);
            assert_eq!(r.state.consecutive_failures, 0);
        }
    }

    #[test]
    fn test_latency_recorded_on_success() {
        let mut r = record();
        let outcome = ProbeOutcome::Reachable { latency: Some(Duration::from_millis(12)) };
        evaluate(&mut r, outcome, 3, at(0));
        assert_eq!(r.state.last_latency, Some(Duration::from_millis(12)));
    }

    #[test]
    fn test_silence_invariant_over_random_sequences() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let threshold = rng.gen_range(1..=5);
            let mut r = record();
            let mut alerts_this_outage = 0;

            for tick in 0..rng.gen_range(1..80) {
                let reachable = rng.gen_bool(0.45);
                let verdicts = evaluate(&mut r, reachable.into(), threshold, at(tick));

                if r.state.alert_silenced {
                    assert_eq!(r.state.status, DeviceStatus::Offline);
                }
                if reachable {
                    assert!(!r.state.alert_silenced);
                    assert_eq!(r.state.consecutive_failures, 0);
                    alerts_this_outage = 0;
                } else {
                    alerts_this_outage += verdicts.iter().filter(|v| **v == Verdict::WentOffline).count();
                    assert!(alerts_this_outage <= 1);
                    assert_eq!(alerts_this_outage == 1, r.state.consecutive_failures >= threshold);
                }
            }
        }
    }

    #[test]
    fn test_messages() {
        let device = Device::new("NAS", "10.0.0.5");
        assert_eq!(Verdict::WentOffline.subject(&device), "[Alert] NAS is OFFLINE");
        assert_eq!(Verdict::Recovered.message(&device), "NAS (10.0.0.5) is now ONLINE");
        assert_eq!(Verdict::Unreachable.message(&device), "NAS (10.0.0.5) is now OFFLINE");
        assert!(!Verdict::Unreachable.is_alert());
    }
}
