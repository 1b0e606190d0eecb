use super::block::BlockRequest;
use crate::metainfo::Info;

/// Piece and block boundaries for a single-file torrent.
///
/// All pieces are `chunk_length` bytes except the last, which holds whatever
/// remains of `total_length`. Within a piece, all blocks are `block_size`
/// bytes except the last, which is cut to the end of the piece.
///
/// ```
/// use piecewire::download::ChunkLayout;
///
/// let layout = ChunkLayout::new(1_000_000, 262_144, 16_384);
/// assert_eq!(layout.chunk_count(), 4);
/// assert_eq!(layout.chunk_len(3), Some(213_568));
/// assert_eq!(layout.block_count(3), Some(14));
/// assert_eq!(layout.block_len(3, 13), Some(576));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    total_length: u64,
    chunk_length: u32,
    block_size: u32,
}

impl ChunkLayout {
    pub fn new(total_length: u64, chunk_length: u32, block_size: u32) -> Self {
        Self {
            total_length,
            chunk_length,
            block_size,
        }
    }

    pub fn for_info(info: &Info, block_size: u32) -> Self {
        Self::new(info.length, info.piece_length, block_size)
    }

    pub fn chunk_count(&self) -> u32 {
        if self.chunk_length == 0 {
            return 0;
        }
        self.total_length.div_ceil(u64::from(self.chunk_length)) as u32
    }

    /// Byte length of piece `index`, or `None` past the end.
    pub fn chunk_len(&self, index: u32) -> Option<u32> {
        if index >= self.chunk_count() {
            return None;
        }
        let start = u64::from(index) * u64::from(self.chunk_length);
        let remaining = self.total_length - start;
        Some(remaining.min(u64::from(self.chunk_length)) as u32)
    }

    pub fn block_count(&self, index: u32) -> Option<u32> {
        if self.block_size == 0 {
            return None;
        }
        self.chunk_len(index)
            .map(|len| len.div_ceil(self.block_size))
    }

    /// Byte length of block `block` within piece `index`.
    pub fn block_len(&self, index: u32, block: u32) -> Option<u32> {
        let chunk_len = self.chunk_len(index)?;
        let begin = u64::from(block) * u64::from(self.block_size);
        if begin >= u64::from(chunk_len) {
            return None;
        }
        Some((u64::from(chunk_len) - begin).min(u64::from(self.block_size)) as u32)
    }

    /// Request for block `block` of piece `index`, or `None` past the end.
    pub fn block(&self, index: u32, block: u32) -> Option<BlockRequest> {
        let length = self.block_len(index, block)?;
        Some(BlockRequest::new(index, block * self.block_size, length))
    }

    /// Every block request for piece `index`, in offset order.
    pub fn blocks(&self, index: u32) -> impl Iterator<Item = BlockRequest> + '_ {
        let count = self.block_count(index).unwrap_or(0);
        (0..count).filter_map(move |block| self.block(index, block))
    }
}
