use bytes::Bytes;

/// The set of pieces a remote peer has advertised.
///
/// Bits are numbered from the high bit of the first byte, as on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
    piece_count: usize,
}

impl Bitfield {
    /// Creates an empty bitfield for the given number of pieces.
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
            piece_count,
        }
    }

    /// Creates a bitfield from a `bitfield` message payload.
    ///
    /// A short payload is padded with zeros; spare bits past `piece_count`
    /// are cleared.
    pub fn from_bytes(bytes: &Bytes, piece_count: usize) -> Self {
        let mut bits = bytes.to_vec();
        bits.resize(piece_count.div_ceil(8), 0);

        let spare = bits.len() * 8 - piece_count;
        if spare > 0 {
            if let Some(last) = bits.last_mut() {
                *last &= 0xFFu8 << spare;
            }
        }

        Self { bits, piece_count }
    }

    pub fn has_piece(&self, index: usize) -> bool {
        if index >= self.piece_count {
            return false;
        }
        (self.bits[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Marks a piece as available; used for `have` messages.
    pub fn set_piece(&mut self, index: usize) {
        if index < self.piece_count {
            self.bits[index / 8] |= 1 << (7 - index % 8);
        }
    }

    /// Number of pieces marked available.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}
