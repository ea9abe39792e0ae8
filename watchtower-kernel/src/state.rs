use crate::history::OutageHistory;
use crate::models::{Device, DeviceState};
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Everything tracked for one device. Always mutated as a whole under its lock.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device: Device,
    pub state: DeviceState,
    pub history: OutageHistory,
}

impl DeviceRecord {
    pub fn new(device: Device, retention: Option<usize>) -> Self {
        Self { device, state: DeviceState::default(), history: OutageHistory::new(retention) }
    }
}
