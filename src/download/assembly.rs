use super::error::DownloadError;
use crate::constants::HASH_LEN;
use bytes::{Bytes, BytesMut};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Blocks of one piece, stored by offset as they arrive.
///
/// Arrival order does not matter: [`verify`](Self::verify) concatenates
/// blocks in offset order. A block that would overlap the end of the piece
/// or repeat an offset already held is refused, so `bytes_received` never
/// exceeds the piece length.
#[derive(Debug)]
pub struct ChunkAssembly {
    index: u32,
    length: u32,
    blocks: BTreeMap<u32, Bytes>,
    bytes_received: u32,
}

impl ChunkAssembly {
    pub fn new(index: u32, length: u32) -> Self {
        Self {
            index,
            length,
            blocks: BTreeMap::new(),
            bytes_received: 0,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Stores a block. Returns false if it was refused.
    pub fn insert(&mut self, begin: u32, data: Bytes) -> bool {
        let end = u64::from(begin) + data.len() as u64;
        if data.is_empty() || end > u64::from(self.length) || self.blocks.contains_key(&begin) {
            return false;
        }
        self.bytes_received += data.len() as u32;
        self.blocks.insert(begin, data);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.length
    }

    /// Drops every stored block.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.bytes_received = 0;
    }

    /// Concatenates the blocks in offset order and checks the SHA-1.
    ///
    /// # Errors
    ///
    /// [`DownloadError::ChunkIntegrity`] with both digests if the hash does
    /// not match. The assembled bytes are not returned in that case.
    pub fn verify(&self, expected: &[u8; HASH_LEN]) -> Result<Bytes, DownloadError> {
        let mut data = BytesMut::with_capacity(self.length as usize);
        for block in self.blocks.values() {
            data.extend_from_slice(block);
        }

        let actual: [u8; HASH_LEN] = Sha1::digest(&data).into();
        if &actual != expected {
            return Err(DownloadError::ChunkIntegrity {
                index: self.index,
                expected: *expected,
                actual,
            });
        }

        Ok(data.freeze())
    }
}
