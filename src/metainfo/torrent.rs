use super::error::MetainfoError;
use super::info_hash::InfoHash;
use crate::bencode::{decode, encode, Value};
use crate::constants::HASH_LEN;
use bytes::Bytes;
use std::path::Path;

/// A parsed single-file torrent.
///
/// The piece hashes are checked against the content length on load, so a
/// `Metainfo` value always satisfies
/// `info.pieces.len() == ceil(info.length / info.piece_length)`.
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// The info dictionary containing file and piece information.
    pub info: Info,
    /// SHA-1 of the canonical bencoding of the info dictionary.
    pub info_hash: InfoHash,
    /// Tracker announce URL.
    pub announce: Option<String>,
    raw_info: Bytes,
}

/// The info dictionary from a torrent file.
#[derive(Debug, Clone)]
pub struct Info {
    /// Suggested name for the file.
    pub name: String,
    /// Total size of the content in bytes.
    pub length: u64,
    /// Number of bytes per piece. The last piece may be shorter.
    pub piece_length: u32,
    /// SHA-1 hash of each piece.
    pub pieces: Vec<[u8; HASH_LEN]>,
}

impl Metainfo {
    /// Parses a torrent file from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid bencode, a required field
    /// is missing or has the wrong type, or the number of piece hashes does
    /// not cover the content length.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let root = decode(data)?;
        if root.as_dict().is_none() {
            return Err(MetainfoError::InvalidField("root"));
        }

        let info_value = root
            .get(b"info")
            .ok_or(MetainfoError::MissingField("info"))?;

        let raw_info = Bytes::from(encode(info_value));
        let info_hash = InfoHash::from_info_bytes(&raw_info);
        let info = Info::from_value(info_value)?;

        let announce = root
            .get(b"announce")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self {
            info,
            info_hash,
            announce,
            raw_info,
        })
    }

    /// Reads and parses a torrent file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MetainfoError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Returns the canonical bencoding of the info dictionary.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }
}

impl Info {
    fn from_value(value: &Value) -> Result<Self, MetainfoError> {
        if value.as_dict().is_none() {
            return Err(MetainfoError::InvalidField("info"));
        }

        let name = value
            .get(b"name")
            .and_then(Value::as_str)
            .ok_or(MetainfoError::MissingField("name"))?
            .to_string();

        let length = value
            .get(b"length")
            .ok_or(MetainfoError::MissingField("length"))?
            .as_integer()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or(MetainfoError::InvalidField("length"))?;

        let piece_length = value
            .get(b"piece length")
            .ok_or(MetainfoError::MissingField("piece length"))?
            .as_integer()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|&v| v > 0)
            .ok_or(MetainfoError::InvalidField("piece length"))?;

        let pieces_bytes = value
            .get(b"pieces")
            .and_then(Value::as_bytes)
            .ok_or(MetainfoError::MissingField("pieces"))?;

        if pieces_bytes.len() % HASH_LEN != 0 {
            return Err(MetainfoError::InvalidField("pieces"));
        }

        let pieces: Vec<[u8; HASH_LEN]> = pieces_bytes
            .chunks_exact(HASH_LEN)
            .map(|chunk| {
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();

        let expected = length.div_ceil(u64::from(piece_length));
        if pieces.len() as u64 != expected {
            return Err(MetainfoError::PieceCountMismatch {
                expected,
                actual: pieces.len(),
            });
        }

        Ok(Self {
            name,
            length,
            piece_length,
            pieces,
        })
    }

    /// Number of pieces in the torrent.
    pub fn piece_count(&self) -> u32 {
        self.pieces.len() as u32
    }

    /// Expected SHA-1 of the piece at `index`.
    pub fn piece_hash(&self, index: u32) -> Option<&[u8; HASH_LEN]> {
        self.pieces.get(index as usize)
    }

    /// Hex-encoded piece hashes, in order.
    pub fn piece_hashes_hex(&self) -> impl Iterator<Item = String> + '_ {
        self.pieces.iter().map(|h| super::info_hash::hex_encode(h))
    }
}
