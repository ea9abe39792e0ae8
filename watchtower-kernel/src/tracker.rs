/**
 * STATE TRACKER - Propriétaire de l'état mutable de chaque device
 *
 * RÔLE :
 * Garde un DeviceRecord (état + historique des pannes) par adresse surveillée.
 * Personne hors du tracker ne garde de référence vers un record entre deux appels.
 *
 * FONCTIONNEMENT :
 * - map adresse -> Shared<DeviceRecord>, chaque record derrière son propre mutex
 * - apply() exécute une closure sur un record dans une seule section critique :
 *   un observer ne voit jamais une transition à moitié appliquée
 * - sync() réconcilie la map avec une nouvelle liste (retire les supprimés,
 *   ajoute les nouveaux en Unknown, garde les survivants)
 * - view()/summary() copient les données sous des locks brefs
 */

use crate::models::{Device, DeviceStatus, OutageEvent};
use crate::state::{new_state, DeviceRecord, Shared};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;

/// Read-only copy of one device handed to observers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceSnapshot {
    pub name: String,
    pub address: String,
    pub mac: Option<String>,
    pub status: DeviceStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub consecutive_failures: u32,
    pub alert_silenced: bool,
    pub last_latency_ms: Option<u64>,
    pub recent: Vec<OutageEvent>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct StatusSummary {
    pub online: usize,
    pub offline: usize,
    pub unknown: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub kept: usize,
}

pub struct StateTracker {
    records: RwLock<HashMap<String, Shared<DeviceRecord>>>,
}

impl StateTracker {
    pub fn new(devices: &[Device], retention: Option<usize>) -> Self {
        let records = devices
            .iter()
            .map(|d| (d.address.clone(), new_state(DeviceRecord::new(d.clone(), retention))))
            .collect();
        Self { records: RwLock::new(records) }
    }

    /// Reconciles tracked records with `devices`.
    pub fn sync(&self, devices: &[Device], retention: Option<usize>) -> SyncReport {
        let mut records = self.records.write();
        let wanted: HashSet<&str> = devices.iter().map(|d| d.address.as_str()).collect();
        let mut report = SyncReport::default();

        records.retain(|address, _| {
            let keep = wanted.contains(address.as_str());
            if !keep {
                report.removed.push(address.clone());
            }
            keep
        });

        for device in devices {
            match records.get(&device.address) {
                Some(record) => {
                    let mut record = record.lock();
                    record.device = device.clone();
                    record.history.set_retention(retention);
                    report.kept += 1;
                }
                None => {
                    records.insert(
                        device.address.clone(),
                        new_state(DeviceRecord::new(device.clone(), retention)),
                    );
                    report.added.push(device.address.clone());
                }
            }
        }

        report.removed.sort();
        report
    }

    /// Runs `f` over the record for `address` while holding its lock.
    pub fn apply<R>(&self, address: &str, f: impl FnOnce(&mut DeviceRecord) -> R) -> Option<R> {
        let record = self.records.read().get(address).cloned()?;
        let mut guard = record.lock();
        Some(f(&mut guard))
    }

    pub fn view(&self, address: &str, recent: usize) -> Option<DeviceSnapshot> {
        self.apply(address, |record| snapshot_of(record, recent))
    }

    pub fn recent_events(&self, address: &str, n: usize) -> Option<Vec<OutageEvent>> {
        self.apply(address, |record| record.history.recent(n))
    }

    pub fn summary(&self) -> StatusSummary {
        let records: Vec<Shared<DeviceRecord>> = self.records.read().values().cloned().collect();
        let mut summary = StatusSummary { total: records.len(), ..Default::default() };
        for record in records {
            match record.lock().state.status {
                DeviceStatus::Online => summary.online += 1,
                DeviceStatus::Offline => summary.offline += 1,
                DeviceStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn contains(&self, address: &str) -> bool {
        self.records.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn snapshot_of(record: &DeviceRecord, recent: usize) -> DeviceSnapshot {
    DeviceSnapshot {
        name: record.device.name.clone(),
        address: record.device.address.clone(),
        mac: record.device.mac.clone(),
        status: record.state.status,
        last_seen: record.state.last_seen,
        consecutive_failures: record.state.consecutive_failures,
        alert_silenced: record.state.alert_silenced,
        last_latency_ms: record.state.last_latency.map(|l| l.as_millis() as u64),
        recent: record.history.recent(recent),
    }
}
