//! Per-device outage history.
//!
//! Events are kept in chronological order. Without a retention limit the
//! history grows with every confirmed transition; with one, the oldest
//! events are evicted first.

use crate::models::OutageEvent;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct OutageHistory {
    events: VecDeque<OutageEvent>,
    retention: Option<usize>,
}

impl OutageHistory {
    pub fn new(retention: Option<usize>) -> Self {
        Self { events: VecDeque::new(), retention }
    }

    pub fn push(&mut self, event: OutageEvent) {
        self.events.push_back(event);
        self.enforce_retention();
    }

    /// Last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<OutageEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).copied().collect()
    }

    pub fn set_retention(&mut self, retention: Option<usize>) {
        self.retention = retention;
        self.enforce_retention();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&OutageEvent> {
        self.events.back()
    }

    fn enforce_retention(&mut self) {
        if let Some(cap) = self.retention {
            while self.events.len() > cap {
                self.events.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransitionKind;
    use time::OffsetDateTime;

    fn event(secs: i64, kind: TransitionKind) -> OutageEvent {
        OutageEvent::new(OffsetDateTime::from_unix_timestamp(secs).unwrap(), kind)
    }

    fn filled(count: i64, retention: Option<usize>) -> OutageHistory {
        let mut history = OutageHistory::new(retention);
        for i in 0..count {
            let kind = if i % 2 == 0 { TransitionKind::BecameOffline } else { TransitionKind::BecameOnline };
            history.push(event(i, kind));
        }
        history
    }

    #[test]
    fn test_recent_is_bounded_and_oldest_first() {
        let history = filled(25, None);
        assert_eq!(history.len(), 25);

        for n in [0, 1, 10, 25, 40] {
            let recent = history.recent(n);
            assert!(recent.len() <= n);
            assert!(recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }

        let last_three = history.recent(3);
        let secs: Vec<i64> = last_three.iter().map(|e| e.timestamp.unix_timestamp()).collect();
        assert_eq!(secs, vec![22, 23, 24]);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let history = filled(12, Some(5));
        assert_eq!(history.len(), 5);
        assert_eq!(history.recent(10)[0].timestamp.unix_timestamp(), 7);
    }

    #[test]
    fn test_shrinking_retention_truncates() {
        let mut history = filled(8, None);
        history.set_retention(Some(2));
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().timestamp.unix_timestamp(), 7);

        history.set_retention(None);
        history.push(event(8, TransitionKind::BecameOffline));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let history = OutageHistory::default();
        assert!(history.is_empty());
        assert!(history.recent(10).is_empty());
    }
}
