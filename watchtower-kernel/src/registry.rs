/**
 * DEVICE REGISTRY - Liste statique des devices surveillés
 *
 * RÔLE :
 * Transforme les entrées brutes de config en liste validée triée par nom,
 * et distribue des snapshots cohérents au scheduler et aux observers.
 *
 * FONCTIONNEMENT :
 * - load_devices() valide les entrées (nom, adresse, unicité) puis trie
 * - la liste active vit derrière un Arc<[Device]> ; snapshot() clone l'Arc
 * - replace() remplace toute la liste d'un coup, les lecteurs gardent leur snapshot
 */

use crate::config::{ConfigError, DeviceConf};
use crate::models::Device;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Validates raw entries and returns devices sorted by display name.
pub fn load_devices(entries: &[DeviceConf]) -> Result<Vec<Device>, ConfigError> {
    let mut devices = Vec::with_capacity(entries.len());
    let mut seen: HashMap<String, String> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let name = entry
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::MissingName { index })?;

        let address = entry
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConfigError::MissingAddress { name: name.to_string() })?;

        // Handed to `ping` as an argument.
        if address.starts_with('-') {
            return Err(ConfigError::InvalidAddress {
                name: name.to_string(),
                address: address.to_string(),
            });
        }

        if let Some(first) = seen.get(address) {
            return Err(ConfigError::DuplicateAddress {
                address: address.to_string(),
                first: first.clone(),
                second: name.to_string(),
            });
        }
        seen.insert(address.to_string(), name.to_string());

        devices.push(Device {
            name: name.to_string(),
            address: address.to_string(),
            mac: entry.mac.as_deref().map(str::trim).filter(|m| !m.is_empty()).map(String::from),
        });
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.address.cmp(&b.address)));
    Ok(devices)
}

pub struct DeviceRegistry {
    devices: RwLock<Arc<[Device]>>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices: RwLock::new(devices.into()) }
    }

    pub fn snapshot(&self) -> Arc<[Device]> {
        self.devices.read().clone()
    }

    /// Swaps the active list. Returns the previous one.
    pub fn replace(&self, devices: Vec<Device>) -> Arc<[Device]> {
        std::mem::replace(&mut *self.devices.write(), devices.into())
    }

    pub fn get(&self, address: &str) -> Option<Device> {
        self.devices.read().iter().find(|d| d.address == address).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, address: &str) -> DeviceConf {
        DeviceConf::new(name, address)
    }

    #[test]
    fn test_sorted_by_name() {
        let devices = load_devices(&[
            entry("Switch", "10.0.0.2"),
            entry("Access Point", "10.0.0.3"),
            entry("Router", "10.0.0.1"),
        ])
        .unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Access Point", "Router", "Switch"]);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let err = load_devices(&[entry("A", "10.0.0.1"), entry("B", "10.0.0.1")]).unwrap_err();
        match err {
            ConfigError::DuplicateAddress { address, first, second } => {
                assert_eq!(address, "10.0.0.1");
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_fields_rejected() {
        let err = load_devices(&[entry("A", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress { .. }));

        let nameless = DeviceConf { name: None, address: Some("10.0.0.1".into()), mac: None };
        let err = load_devices(&[entry("A", "10.0.0.2"), nameless]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingName { index: 1 }));
    }

    #[test]
    fn test_option_like_address_rejected() {
        let err = load_devices(&[entry("Router", "-c99")]).unwrap_err();
        match err {
            ConfigError::InvalidAddress { name, address } => {
                assert_eq!(name, "Router");
                assert_eq!(address, "-c99");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let registry = DeviceRegistry::new(vec![Device::new("A", "10.0.0.1")]);
        let before = registry.snapshot();

        let old = registry.replace(vec![Device::new("B", "10.0.0.2"), Device::new("C", "10.0.0.3")]);

        assert_eq!(before.len(), 1);
        assert_eq!(old[0].name, "A");
        assert_eq!(registry.len(), 2);
        assert!(registry.get("10.0.0.1").is_none());
        assert_eq!(registry.get("10.0.0.3").unwrap().name, "C");
    }
}
