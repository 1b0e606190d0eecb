use super::error::PeerError;
use crate::constants::{FRAME_HEADER_LEN, PIECE_HEADER_LEN, REQUEST_PAYLOAD_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl MessageId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageId::Choke),
            1 => Some(MessageId::Unchoke),
            2 => Some(MessageId::Interested),
            3 => Some(MessageId::NotInterested),
            4 => Some(MessageId::Have),
            5 => Some(MessageId::Bitfield),
            6 => Some(MessageId::Request),
            7 => Some(MessageId::Piece),
            8 => Some(MessageId::Cancel),
            _ => None,
        }
    }
}

/// A post-handshake peer message.
///
/// On the wire every message is `<u32 length><u8 id><payload>`, with the
/// length counting the id and payload. A zero length is a keep-alive and has
/// no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    Bitfield(Bytes),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Bytes },
    Cancel { index: u32, begin: u32, length: u32 },
    /// A message id this client doesn't know. Kept so the session can log
    /// and skip it instead of dropping the connection.
    Unknown { id: u8, payload: Bytes },
}

impl Message {
    pub fn id(&self) -> Option<u8> {
        let id = match self {
            Message::KeepAlive => return None,
            Message::Choke => MessageId::Choke,
            Message::Unchoke => MessageId::Unchoke,
            Message::Interested => MessageId::Interested,
            Message::NotInterested => MessageId::NotInterested,
            Message::Have { .. } => MessageId::Have,
            Message::Bitfield(_) => MessageId::Bitfield,
            Message::Request { .. } => MessageId::Request,
            Message::Piece { .. } => MessageId::Piece,
            Message::Cancel { .. } => MessageId::Cancel,
            Message::Unknown { id, .. } => return Some(*id),
        };
        Some(id as u8)
    }

    /// Length of the frame body: id plus payload.
    fn body_len(&self) -> usize {
        match self {
            Message::KeepAlive => 0,
            Message::Choke | Message::Unchoke | Message::Interested | Message::NotInterested => 1,
            Message::Have { .. } => 5,
            Message::Bitfield(bits) => 1 + bits.len(),
            Message::Request { .. } | Message::Cancel { .. } => 1 + REQUEST_PAYLOAD_LEN,
            Message::Piece { data, .. } => 1 + PIECE_HEADER_LEN + data.len(),
            Message::Unknown { payload, .. } => 1 + payload.len(),
        }
    }

    /// Encodes the message as a complete length-prefixed frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + self.body_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u32(self.body_len() as u32);
        let Some(id) = self.id() else {
            return;
        };
        buf.put_u8(id);

        match self {
            Message::Have { piece } => buf.put_u32(*piece),
            Message::Bitfield(bits) => buf.put_slice(bits),
            Message::Request {
                index,
                begin,
                length,
            }
            | Message::Cancel {
                index,
                begin,
                length,
            } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(data);
            }
            Message::Unknown { payload, .. } => buf.put_slice(payload),
            _ => {}
        }
    }

    /// Decodes a frame body (everything after the length prefix).
    ///
    /// An empty body is a keep-alive. Unrecognised ids decode to
    /// [`Message::Unknown`]; known ids with a payload of the wrong size are
    /// an error.
    pub fn decode_body(mut body: Bytes) -> Result<Self, PeerError> {
        if body.is_empty() {
            return Ok(Message::KeepAlive);
        }

        let raw_id = body.get_u8();
        let Some(id) = MessageId::from_u8(raw_id) else {
            return Ok(Message::Unknown {
                id: raw_id,
                payload: body,
            });
        };

        let expect_len = |body: &Bytes, len: usize| {
            if body.len() == len {
                Ok(())
            } else {
                Err(PeerError::FrameDecode(format!(
                    "{:?} payload must be {} bytes, got {}",
                    id,
                    len,
                    body.len()
                )))
            }
        };

        match id {
            MessageId::Choke => expect_len(&body, 0).map(|_| Message::Choke),
            MessageId::Unchoke => expect_len(&body, 0).map(|_| Message::Unchoke),
            MessageId::Interested => expect_len(&body, 0).map(|_| Message::Interested),
            MessageId::NotInterested => expect_len(&body, 0).map(|_| Message::NotInterested),
            MessageId::Have => {
                expect_len(&body, 4)?;
                Ok(Message::Have {
                    piece: body.get_u32(),
                })
            }
            MessageId::Bitfield => Ok(Message::Bitfield(body)),
            MessageId::Request | MessageId::Cancel => {
                expect_len(&body, REQUEST_PAYLOAD_LEN)?;
                let (index, begin, length) = (body.get_u32(), body.get_u32(), body.get_u32());
                Ok(if id == MessageId::Request {
                    Message::Request {
                        index,
                        begin,
                        length,
                    }
                } else {
                    Message::Cancel {
                        index,
                        begin,
                        length,
                    }
                })
            }
            MessageId::Piece => {
                if body.len() < PIECE_HEADER_LEN {
                    return Err(PeerError::FrameDecode(format!(
                        "piece payload must be at least {} bytes, got {}",
                        PIECE_HEADER_LEN,
                        body.len()
                    )));
                }
                let index = body.get_u32();
                let begin = body.get_u32();
                Ok(Message::Piece {
                    index,
                    begin,
                    data: body,
                })
            }
        }
    }
}
