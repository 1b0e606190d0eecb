use super::error::TrackerError;
use crate::bencode::{decode, Value};
use std::net::{Ipv4Addr, SocketAddrV4};

/// A successful announce reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds the tracker asks us to wait before re-announcing.
    pub interval: u32,
    pub peers: Vec<SocketAddrV4>,
    pub warning_message: Option<String>,
}

impl AnnounceResponse {
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            peers: Vec::new(),
            warning_message: None,
        }
    }

    /// Parses a bencoded announce reply body.
    pub fn from_bytes(body: &[u8]) -> Result<Self, TrackerError> {
        let value = decode(body)?;
        if value.as_dict().is_none() {
            return Err(TrackerError::InvalidResponse("expected dict".into()));
        }

        if let Some(failure) = value.get(b"failure reason").and_then(Value::as_str) {
            return Err(TrackerError::Failure(failure.to_string()));
        }

        let interval = value
            .get(b"interval")
            .and_then(Value::as_integer)
            .ok_or_else(|| TrackerError::InvalidResponse("missing interval".into()))?;
        let interval = u32::try_from(interval)
            .map_err(|_| TrackerError::InvalidResponse(format!("invalid interval {}", interval)))?;

        let mut response = AnnounceResponse::new(interval);
        response.warning_message = value
            .get(b"warning message")
            .and_then(Value::as_str)
            .map(String::from);

        match value.get(b"peers") {
            Some(Value::Bytes(compact)) => {
                if compact.len() % 6 != 0 {
                    return Err(TrackerError::InvalidResponse(format!(
                        "compact peer list length {} is not a multiple of 6",
                        compact.len()
                    )));
                }
                response.peers = parse_compact_peers(compact);
            }
            Some(Value::List(list)) => {
                response.peers = list.iter().filter_map(parse_dict_peer).collect();
            }
            Some(_) => return Err(TrackerError::InvalidResponse("malformed peers".into())),
            None => {}
        }

        Ok(response)
    }
}

/// Parses the compact IPv4 peer format: 4 bytes address + 2 bytes port,
/// both big-endian. A trailing partial entry is ignored.
pub fn parse_compact_peers(data: &[u8]) -> Vec<SocketAddrV4> {
    data.chunks_exact(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            SocketAddrV4::new(ip, port)
        })
        .collect()
}

fn parse_dict_peer(peer: &Value) -> Option<SocketAddrV4> {
    let ip: Ipv4Addr = peer.get(b"ip")?.as_str()?.parse().ok()?;
    let port = u16::try_from(peer.get(b"port")?.as_integer()?).ok()?;
    Some(SocketAddrV4::new(ip, port))
}
