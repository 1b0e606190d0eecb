use crate::peer::Message;

/// One block request: `length` bytes at `begin` within piece `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub index: u32,
    pub begin: u32,
    pub length: u32,
}

impl BlockRequest {
    pub fn new(index: u32, begin: u32, length: u32) -> Self {
        Self {
            index,
            begin,
            length,
        }
    }

    /// Whether a received block answers this request exactly.
    pub fn matches(&self, index: u32, begin: u32, length: u32) -> bool {
        self.index == index && self.begin == begin && self.length == length
    }

    pub fn to_message(self) -> Message {
        Message::Request {
            index: self.index,
            begin: self.begin,
            length: self.length,
        }
    }
}
