use std::fmt;

use rand::distr::Alphanumeric;
use rand::Rng as _;

use crate::constants::{CLIENT_PREFIX, PEER_ID_LEN};

/// A 20-byte peer identifier.
///
/// Generated IDs follow the Azureus-style format `-PW0001-<12 random
/// alphanumerics>`, so every byte is printable.
///
/// ```
/// use piecewire::peer::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.as_bytes().len(), 20);
/// assert_eq!(peer_id.client_id(), Some("PW0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; PEER_ID_LEN]);

impl PeerId {
    /// Generates a new random peer ID with the client prefix.
    pub fn generate() -> Self {
        let mut id = [0u8; PEER_ID_LEN];
        id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
        let mut rng = rand::rng();
        for byte in &mut id[CLIENT_PREFIX.len()..] {
            *byte = rng.sample(Alphanumeric);
        }
        Self(id)
    }

    /// Creates a peer ID from a 20-byte slice.
    ///
    /// Returns `None` if the slice is not exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PEER_ID_LEN] {
        &self.0
    }

    /// Extracts the client identifier if using Azureus-style format.
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }

    pub fn to_hex(&self) -> String {
        crate::metainfo::hex_encode(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(client) = self.client_id() {
            write!(f, "PeerId({})", client)
        } else {
            write!(f, "PeerId({:02x?})", &self.0[..8])
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_alphanumeric() || *byte == b'-' {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02x}", byte)?;
            }
        }
        Ok(())
    }
}
