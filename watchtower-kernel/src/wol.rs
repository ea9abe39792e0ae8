use crate::models::Device;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;

#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    #[error("no device with address {0}")]
    UnknownDevice(String),
    #[error("device '{0}' has no MAC address")]
    NoMac(String),
    #[error("invalid MAC address '{0}'")]
    InvalidMac(String),
    #[error("invalid broadcast address '{0}'")]
    InvalidBroadcast(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn parse_mac(mac: &str) -> Result<[u8; 6], WakeError> {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let separators_ok = mac.chars().all(|c| c.is_ascii_hexdigit() || matches!(c, ':' | '-' | '.'));
    if hex.len() != 12 || !separators_ok {
        return Err(WakeError::InvalidMac(mac.to_string()));
    }
    let mut out = [0u8; 6];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| WakeError::InvalidMac(mac.to_string()))?;
    }
    Ok(out)
}

/// 6 x 0xFF followed by the MAC repeated 16 times.
pub fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut pkt = [0xFFu8; 102];
    for chunk in pkt[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    pkt
}

/// Broadcasts a magic packet for `device` to ports 9 and 7.
/// Succeeds if at least one send went out.
pub async fn wake(device: &Device, broadcast: &str) -> Result<(), WakeError> {
    let mac = device.mac.as_deref().ok_or_else(|| WakeError::NoMac(device.name.clone()))?;
    let pkt = magic_packet(parse_mac(mac)?);
    let bcast: Ipv4Addr = broadcast
        .parse()
        .map_err(|_| WakeError::InvalidBroadcast(broadcast.to_string()))?;

    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    sock.set_broadcast(true)?;

    let mut last_err = None;
    let mut sent = false;
    for port in [9u16, 7u16] {
        match sock.send_to(&pkt, SocketAddrV4::new(bcast, port)).await {
            Ok(_) => sent = true,
            Err(e) => {
                tracing::warn!(device = %device.name, %bcast, port, error = %e, "WoL send failed");
                last_err = Some(e);
            }
        }
    }

    match (sent, last_err) {
        (true, _) => {
            tracing::info!(device = %device.name, mac, "WoL magic packet sent");
            Ok(())
        }
        (false, Some(e)) => Err(WakeError::Io(e)),
        (false, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac_formats() {
        let expected = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(parse_mac("AA:BB:CC:DD:EE:FF").unwrap(), expected);
        assert_eq!(parse_mac("aa-bb-cc-dd-ee-ff").unwrap(), expected);
        assert_eq!(parse_mac("aabb.ccdd.eeff").unwrap(), expected);
        assert!(matches!(parse_mac("AA:BB:CC"), Err(WakeError::InvalidMac(_))));
        assert!(matches!(parse_mac("GG:BB:CC:DD:EE:FF:00"), Err(WakeError::InvalidMac(_))));
    }

    #[test]
    fn test_magic_packet_layout() {
        let mac = [1, 2, 3, 4, 5, 6];
        let pkt = magic_packet(mac);
        assert_eq!(&pkt[..6], &[0xFF; 6]);
        assert_eq!(&pkt[6..12], &mac);
        assert_eq!(&pkt[96..], &mac);
    }

    #[tokio::test]
    async fn test_wake_without_mac() {
        let err = wake(&Device::new("Printer", "10.0.0.7"), "255.255.255.255").await.unwrap_err();
        assert!(matches!(err, WakeError::NoMac(ref name) if name == "Printer"));
    }

    #[tokio::test]
    async fn test_wake_to_loopback() {
        let device = Device::new("NAS", "10.0.0.5").with_mac("AA:BB:CC:DD:EE:FF");
        wake(&device, "127.0.0.1").await.unwrap();
    }
}
