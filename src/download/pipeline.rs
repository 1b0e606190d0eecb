use super::block::BlockRequest;
use super::layout::ChunkLayout;

/// Request window for one piece.
///
/// Hands out the piece's blocks from its [`ChunkLayout`] in offset order
/// while fewer than `window` are outstanding.
#[derive(Debug)]
pub struct RequestPipeline {
    layout: ChunkLayout,
    index: u32,
    window: usize,
    block_count: u32,
    next_block: u32,
    outstanding: Vec<BlockRequest>,
}

impl RequestPipeline {
    /// A pipeline for piece `index`. A piece the layout doesn't have yields
    /// no requests.
    pub fn new(layout: ChunkLayout, index: u32, window: usize) -> Self {
        Self {
            layout,
            index,
            window,
            block_count: layout.block_count(index).unwrap_or(0),
            next_block: 0,
            outstanding: Vec::with_capacity(window),
        }
    }

    /// The next request to send, if the window has room and blocks remain.
    pub fn next_request(&mut self) -> Option<BlockRequest> {
        if self.outstanding.len() >= self.window || self.is_exhausted() {
            return None;
        }

        let request = self.layout.block(self.index, self.next_block)?;
        self.next_block += 1;
        self.outstanding.push(request);
        Some(request)
    }

    /// Takes requests until the window is full or nothing remains.
    pub fn fill(&mut self) -> Vec<BlockRequest> {
        std::iter::from_fn(|| self.next_request()).collect()
    }

    /// Clears the outstanding request a block answers.
    ///
    /// Returns false if no outstanding request matches; the block should be
    /// dropped.
    pub fn complete(&mut self, index: u32, begin: u32, length: u32) -> bool {
        match self
            .outstanding
            .iter()
            .position(|r| r.matches(index, begin, length))
        {
            Some(pos) => {
                self.outstanding.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Forgets every outstanding request and starts the piece over.
    pub fn cancel_all(&mut self) -> Vec<BlockRequest> {
        self.next_block = 0;
        std::mem::take(&mut self.outstanding)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// True once every block of the piece has been requested.
    pub fn is_exhausted(&self) -> bool {
        self.next_block >= self.block_count
    }
}
