use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors that can occur when loading a torrent file.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The torrent file contains invalid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required field is missing from the torrent file.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value or type.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The number of piece hashes doesn't match the content length.
    #[error("expected {expected} piece hashes for the content length, found {actual}")]
    PieceCountMismatch { expected: u64, actual: usize },

    /// A hex info hash is malformed.
    #[error("invalid info hash")]
    InvalidInfoHash,

    /// An I/O error occurred while reading the torrent file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
