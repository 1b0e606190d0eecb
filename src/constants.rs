//! Protocol constants and tuning parameters.
//!
//! Wire-format values are fixed by the peer protocol; the timeouts and
//! pipeline settings are defaults that [`DownloadConfig`](crate::config::DownloadConfig)
//! can override.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &[u8; 8] = b"-PW0001-";

/// Length of a peer ID in bytes
pub const PEER_ID_LEN: usize = 20;

// ============================================================================
// Wire format
// ============================================================================

/// Protocol identifier carried in the handshake
pub const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";

/// Total handshake length: 1 + 19 + 8 + 20 + 20
pub const HANDSHAKE_LEN: usize = 68;

/// Length of a SHA-1 digest (info hash, piece hash)
pub const HASH_LEN: usize = 20;

/// Size of the big-endian length prefix on every frame
pub const FRAME_HEADER_LEN: usize = 4;

/// Request and Cancel payloads: index, begin, length
pub const REQUEST_PAYLOAD_LEN: usize = 12;

/// Piece payload header: index, begin
pub const PIECE_HEADER_LEN: usize = 8;

/// Largest frame body we accept. A piece message carries at most one block,
/// so anything near this size is already a misbehaving peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// ============================================================================
// Pipelining
// ============================================================================

/// Standard block size (16 KiB) - the request granularity within a piece
pub const BLOCK_SIZE: u32 = 16384;

/// Largest block size a peer is expected to honour
pub const MAX_BLOCK_SIZE: u32 = 131072;

/// Maximum outstanding block requests to a single peer
pub const MAX_PIPELINED_REQUESTS: usize = 4;

/// Capacity of the receiver -> scheduler message channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Initial capacity of the transport read buffer
pub const READ_BUFFER_CAPACITY: usize = 32 * 1024;

// ============================================================================
// Timeouts
// ============================================================================

/// TCP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for the whole handshake exchange
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for downloading and verifying one piece
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a single socket write
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP tracker request timeout
pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Ports
// ============================================================================

/// Port reported to the tracker
pub const DEFAULT_PORT: u16 = 6881;
