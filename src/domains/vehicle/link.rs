//! The MAVLink UDP link to the vehicle.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::LifespanError;

/// First byte of a MAVLink 1 frame.
pub const MAVLINK_V1_MAGIC: u8 = 0xFE;

/// First byte of a MAVLink 2 frame.
pub const MAVLINK_V2_MAGIC: u8 = 0xFD;

// Largest MAVLink 2 frame is 280 bytes.
const RECV_BUFFER_SIZE: usize = 512;

/// Vehicle link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Connection string, e.g. `udpin://0.0.0.0:14540`.
    pub address: String,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            address: "udpin://0.0.0.0:14540".to_string(),
        }
    }
}

/// Parse a MAVLink connection string into a socket address.
///
/// Accepts `udpin://ip:port`, `udp://ip:port` or a bare `ip:port`. An empty
/// host (`udp://:14540`) binds on all interfaces.
pub fn parse_address(raw: &str) -> Result<SocketAddr, LifespanError> {
    let trimmed = raw.trim();

    let bare = match trimmed.split_once("://") {
        Some(("udp" | "udpin", rest)) => rest,
        Some(_) => return Err(LifespanError::UnsupportedScheme(raw.to_string())),
        None => trimmed,
    };

    let candidate = if bare.starts_with(':') {
        format!("0.0.0.0{bare}")
    } else {
        bare.to_string()
    };

    candidate
        .parse()
        .map_err(|_| LifespanError::invalid_address(raw))
}

/// MAVLink protocol version inferred from a frame's magic byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MavlinkVersion {
    V1,
    V2,
    Unknown,
}

impl MavlinkVersion {
    /// Classify a frame by its first byte.
    pub fn from_magic(byte: u8) -> Self {
        match byte {
            MAVLINK_V1_MAGIC => Self::V1,
            MAVLINK_V2_MAGIC => Self::V2,
            _ => Self::Unknown,
        }
    }
}

/// A datagram received on the link.
#[derive(Debug, Clone, Serialize)]
pub struct Datagram {
    pub from: SocketAddr,
    pub len: usize,
    pub version: MavlinkVersion,
}

/// An open UDP link to the vehicle.
#[derive(Debug)]
pub struct VehicleLink {
    address: String,
    socket: UdpSocket,
    connected_at: DateTime<Utc>,
}

impl VehicleLink {
    /// Bind the link on the given connection string.
    pub async fn bind(address: &str) -> Result<Self, LifespanError> {
        let addr = parse_address(address)?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| LifespanError::bind(addr, e))?;

        info!("Vehicle link listening on {}", socket.local_addr()?);

        Ok(Self {
            address: address.to_string(),
            socket,
            connected_at: Utc::now(),
        })
    }

    /// The configured connection string.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The socket address the link is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, LifespanError> {
        Ok(self.socket.local_addr()?)
    }

    /// When the link was opened.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Wait for the next datagram from the vehicle.
    pub async fn recv_datagram(&self, timeout: Duration) -> Result<Datagram, LifespanError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        let (len, from) = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| LifespanError::Timeout(timeout))??;

        let version = buf
            .get(..len)
            .and_then(|frame| frame.first())
            .map_or(MavlinkVersion::Unknown, |byte| MavlinkVersion::from_magic(*byte));

        debug!("Received {} bytes from {} ({:?})", len, from, version);

        Ok(Datagram { from, len, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_schemes() {
        let expected: SocketAddr = "127.0.0.1:14540".parse().unwrap();
        assert_eq!(parse_address("udpin://127.0.0.1:14540").unwrap(), expected);
        assert_eq!(parse_address("udp://127.0.0.1:14540").unwrap(), expected);
        assert_eq!(parse_address("127.0.0.1:14540").unwrap(), expected);
    }

    #[test]
    fn test_parse_address_empty_host() {
        let addr = parse_address("udp://:14550").unwrap();
        assert_eq!(addr, "0.0.0.0:14550".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_parse_address_rejects_tcp() {
        let err = parse_address("tcp://127.0.0.1:5760").unwrap_err();
        assert!(matches!(err, LifespanError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        let err = parse_address("udpin://drone").unwrap_err();
        assert!(matches!(err, LifespanError::InvalidAddress(_)));
    }

    #[test]
    fn test_mavlink_version_from_magic() {
        assert_eq!(MavlinkVersion::from_magic(0xFE), MavlinkVersion::V1);
        assert_eq!(MavlinkVersion::from_magic(0xFD), MavlinkVersion::V2);
        assert_eq!(MavlinkVersion::from_magic(0x00), MavlinkVersion::Unknown);
    }

    #[tokio::test]
    async fn test_recv_datagram_classifies_frame() {
        let link = VehicleLink::bind("udpin://127.0.0.1:0").await.unwrap();
        let target = link.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[MAVLINK_V2_MAGIC, 9, 0, 0], target).await.unwrap();

        let datagram = link.recv_datagram(Duration::from_secs(2)).await.unwrap();
        assert_eq!(datagram.len, 4);
        assert_eq!(datagram.version, MavlinkVersion::V2);
        assert_eq!(datagram.from, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_recv_datagram_times_out() {
        let link = VehicleLink::bind("127.0.0.1:0").await.unwrap();
        let err = link
            .recv_datagram(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LifespanError::Timeout(_)));
    }
}
