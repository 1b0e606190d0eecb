use super::error::StorageError;
use super::ChunkSink;
use bytes::Bytes;

/// Keeps appended pieces in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    chunks: Vec<Bytes>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended piece, in order.
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// All appended bytes concatenated.
    pub fn data(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkSink for MemorySink {
    async fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.chunks.push(Bytes::copy_from_slice(data));
        Ok(())
    }
}
