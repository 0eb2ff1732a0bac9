//! Reader discovery protocol
//!
//! Readers answer a UDP broadcast probe on the discovery port. The answer's
//! source address is the reader's address; its payload optionally carries
//! `key=value` pairs (separated by `;` or newlines) describing the device.
//! The host sends the probe, receives datagrams and feeds them to a
//! [`ReaderLocator`], which reports each reader once per discovery run.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::Serialize;

use crate::error::ParseError;

/// UDP port readers listen on for discovery probes
pub const DISCOVERY_PORT: u16 = 1069;

/// Interval between two probes while discovery runs
pub const PROBE_INTERVAL_MS: u64 = 2000;

/// Probe datagram
pub const PROBE: &[u8] = b"DMCC DISCOVER\r\n";

/// A reader that answered the probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredReader {
    pub address: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

impl DiscoveredReader {
    pub fn new(address: Ipv4Addr) -> Self {
        DiscoveredReader {
            address,
            name: None,
            serial: None,
            device_type: None,
        }
    }
}

/// Parse one datagram received on the discovery socket.
///
/// Returns `Ok(None)` for our own probe looped back by the broadcast.
pub fn parse_discovery_response(
    packet: &[u8],
    source: SocketAddrV4,
) -> Result<Option<DiscoveredReader>, ParseError> {
    if packet == PROBE {
        return Ok(None);
    }

    let payload = std::str::from_utf8(packet).map_err(|_| ParseError::InvalidString)?;
    let mut reader = DiscoveredReader::new(*source.ip());

    for field in payload
        .split([';', '\n', '\r', '\0'])
        .map(str::trim)
        .filter(|f| !f.is_empty())
    {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => reader.name = Some(value),
            "serial" => reader.serial = Some(value),
            "type" => reader.device_type = Some(value),
            _ => {}
        }
    }

    Ok(Some(reader))
}

/// Readers seen during one discovery run
#[derive(Debug, Default)]
pub struct ReaderLocator {
    /// Keyed by address (BTreeMap keeps report order stable in tests)
    pub readers: BTreeMap<Ipv4Addr, DiscoveredReader>,
}

impl ReaderLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every reader so the next run reports them again
    pub fn reset(&mut self) {
        self.readers.clear();
    }

    /// Handle a datagram, returning the reader if it was not seen before
    /// in this run.
    pub fn process(
        &mut self,
        packet: &[u8],
        source: SocketAddrV4,
    ) -> Result<Option<DiscoveredReader>, ParseError> {
        let Some(reader) = parse_discovery_response(packet, source)? else {
            return Ok(None);
        };
        if self.readers.contains_key(&reader.address) {
            return Ok(None);
        }
        self.readers.insert(reader.address, reader.clone());
        Ok(Some(reader))
    }
}
