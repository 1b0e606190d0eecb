use super::error::PeerError;
use super::message::Message;
use crate::constants::{FRAME_HEADER_LEN, MAX_FRAME_LEN, READ_BUFFER_CAPACITY};
use bytes::{Buf, BytesMut};

/// Incremental frame decoder.
///
/// Bytes from the transport are appended as they arrive, in whatever
/// chunking the socket delivers. [`decode_next`](Self::decode_next) yields
/// a message only once its whole frame is buffered; a partial frame stays in
/// the buffer until more bytes are appended.
///
/// ```
/// use piecewire::peer::{Message, MessageDecoder};
///
/// let frame = Message::Have { piece: 7 }.encode();
/// let mut decoder = MessageDecoder::new();
///
/// decoder.extend_from_slice(&frame[..3]);
/// assert!(decoder.decode_next().unwrap().is_none());
///
/// decoder.extend_from_slice(&frame[3..]);
/// assert_eq!(decoder.decode_next().unwrap(), Some(Message::Have { piece: 7 }));
/// ```
#[derive(Debug)]
pub struct MessageDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::with_buffer(BytesMut::with_capacity(READ_BUFFER_CAPACITY))
    }

    /// Starts from bytes already read off the wire, such as whatever
    /// followed the handshake in the same read.
    pub fn with_buffer(buf: BytesMut) -> Self {
        Self {
            buf,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// The carry-over buffer, for reading from the transport directly into it.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of buffered bytes not yet consumed as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decodes the next complete frame, or returns `None` if more input is
    /// needed.
    ///
    /// # Errors
    ///
    /// [`PeerError::FrameDecode`] if the length prefix exceeds the maximum
    /// frame length or a known message has a malformed payload. Both are
    /// fatal for the connection since the stream can't be resynchronised.
    pub fn decode_next(&mut self) -> Result<Option<Message>, PeerError> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;

        if length > self.max_frame_len {
            return Err(PeerError::FrameDecode(format!(
                "frame length {} exceeds maximum {}",
                length, self.max_frame_len
            )));
        }

        let total_len = FRAME_HEADER_LEN + length;
        if self.buf.len() < total_len {
            self.buf.reserve(total_len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(FRAME_HEADER_LEN);
        let body = self.buf.split_to(length).freeze();
        Message::decode_body(body).map(Some)
    }
}
