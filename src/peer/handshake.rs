use super::error::PeerError;
use super::peer_id::PeerId;
use crate::constants::{HANDSHAKE_LEN, HASH_LEN, PROTOCOL};
use crate::metainfo::InfoHash;
use bytes::{BufMut, Bytes, BytesMut};

/// The fixed 68-byte message both sides send right after connecting.
///
/// Layout: `<19><"BitTorrent protocol"><8 reserved><info hash><peer id>`.
/// This type only encodes and decodes; reading 68 bytes off the wire is the
/// connection's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    /// A handshake with all reserved bits clear; no extensions are advertised.
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    /// Decodes the first [`HANDSHAKE_LEN`] bytes of `data`.
    ///
    /// Fails with [`PeerError::ProtocolMismatch`] when the length byte and
    /// protocol string are not exactly `19` + `"BitTorrent protocol"`,
    /// whatever the remaining 48 bytes hold.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::FrameDecode(format!(
                "handshake needs {} bytes, got {}",
                HANDSHAKE_LEN,
                data.len()
            )));
        }

        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::ProtocolMismatch);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; HASH_LEN];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            reserved,
            info_hash: InfoHash::new(info_hash),
            peer_id: PeerId(peer_id),
        })
    }
}
