//! Peer wire protocol ([BEP-3]).
//!
//! - [`Handshake`] - the fixed 68-byte opening exchange
//! - [`Message`] / [`MessageDecoder`] - length-prefixed frames, decoded
//!   incrementally from an unstructured byte stream
//! - [`PeerSession`] - choke/interest state machine
//! - [`PeerConnection`] - TCP transport, handshake, and the receiver task
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod bitfield;
mod codec;
mod connection;
mod error;
mod handshake;
mod message;
mod peer_id;
mod session;
mod transport;

pub use bitfield::Bitfield;
pub use codec::MessageDecoder;
pub use connection::{PeerConnection, PeerStream};
pub use error::PeerError;
pub use handshake::Handshake;
pub use message::{Message, MessageId};
pub use peer_id::PeerId;
pub use session::{ChokingState, PeerSession, SessionEvent, SessionState};
pub use transport::{Inbound, MessageReader, MessageWriter};
