use crate::config::ConfigError;
use crate::constants::HASH_LEN;
use crate::metainfo::hex_encode;
use crate::peer::PeerError;
use crate::storage::StorageError;
use crate::tracker::TrackerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// The assembled piece hashed to something other than the metainfo hash.
    #[error(
        "piece {index} failed hash check: expected {}, got {}",
        hex_encode(.expected),
        hex_encode(.actual)
    )]
    ChunkIntegrity {
        index: u32,
        expected: [u8; HASH_LEN],
        actual: [u8; HASH_LEN],
    },

    #[error("invalid piece index: {0}")]
    InvalidChunkIndex(u32),

    #[error("torrent has no announce url")]
    MissingAnnounce,

    #[error("no peers available")]
    NoPeers,

    /// The piece was not finished within the configured deadline.
    #[error("piece download timed out")]
    Timeout,
}

impl DownloadError {
    /// Whether retrying against another peer could succeed.
    ///
    /// Every peer error is scoped to its connection, and a bad hash or a
    /// stalled peer says nothing about other peers. Storage, tracker and
    /// configuration failures would recur.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DownloadError::Peer(_) | DownloadError::ChunkIntegrity { .. } | DownloadError::Timeout
        )
    }
}
