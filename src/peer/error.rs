use thiserror::Error;

/// Errors that end a peer connection.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's handshake doesn't carry the expected protocol identifier.
    #[error("protocol mismatch in handshake")]
    ProtocolMismatch,

    /// The peer's info hash doesn't match ours.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// A frame could not be decoded.
    #[error("frame decode error: {0}")]
    FrameDecode(String),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timeout")]
    Timeout,
}
