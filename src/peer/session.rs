use super::bitfield::Bitfield;
use super::message::Message;
use super::peer_id::PeerId;
use bytes::Bytes;
use tracing::{debug, trace, warn};

/// Where a peer session is in its lifecycle.
///
/// ```text
/// Connected -> HandshakeSent -> HandshakeVerified -> Idle <-> Unchoked -> Downloading -> Completed
///                                                      ^                      |
///                                                      +------- choke --------+
/// ```
///
/// `Failed` is reachable from anywhere on a transport or protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connection open, nothing sent yet.
    Connected,
    /// Our handshake is on the wire.
    HandshakeSent,
    /// The peer's handshake checked out; waiting for its first message.
    HandshakeVerified,
    /// Choked by the peer.
    Idle,
    /// The peer unchoked us; requests may be sent.
    Unchoked,
    /// At least one block of the current piece has arrived.
    Downloading,
    /// The current piece is verified and stored.
    Completed,
    Failed,
}

/// Choke and interest flags for both ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChokingState {
    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
}

impl Default for ChokingState {
    fn default() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

/// What a received message means for the block scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Nothing for the scheduler; the message only updated session state.
    None,
    /// Requests may be sent.
    Unchoked,
    /// All outstanding requests are void and partial piece data must go.
    Choked,
    /// A block arrived while requests were allowed.
    Block { index: u32, begin: u32, data: Bytes },
}

/// Protocol state for one peer connection.
///
/// The session does no I/O. The connection feeds it every decoded message
/// through [`on_message`](Self::on_message), which applies the transition
/// and reports what the scheduler should do about it.
#[derive(Debug)]
pub struct PeerSession {
    state: SessionState,
    choking: ChokingState,
    bitfield: Option<Bitfield>,
    piece_count: usize,
    remote_id: Option<PeerId>,
}

impl PeerSession {
    pub fn new(piece_count: usize) -> Self {
        Self {
            state: SessionState::Connected,
            choking: ChokingState::default(),
            bitfield: None,
            piece_count,
            remote_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn choking(&self) -> ChokingState {
        self.choking
    }

    pub fn bitfield(&self) -> Option<&Bitfield> {
        self.bitfield.as_ref()
    }

    pub fn remote_id(&self) -> Option<PeerId> {
        self.remote_id
    }

    /// Whether the peer is known to have the piece. `None` until the peer
    /// sends a bitfield or a `have`.
    pub fn peer_has(&self, index: u32) -> Option<bool> {
        self.bitfield.as_ref().map(|bf| bf.has_piece(index as usize))
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }

    pub fn handshake_sent(&mut self) {
        self.transition(SessionState::HandshakeSent);
    }

    pub fn handshake_verified(&mut self, remote_id: PeerId) {
        self.remote_id = Some(remote_id);
        self.transition(SessionState::HandshakeVerified);
    }

    pub fn fail(&mut self) {
        self.transition(SessionState::Failed);
    }

    /// True once the session is past the handshake and we have not yet told
    /// the peer we're interested. The connection sends `interested` as soon
    /// as this flips.
    pub fn needs_interest(&self) -> bool {
        matches!(
            self.state,
            SessionState::Idle
                | SessionState::Unchoked
                | SessionState::Downloading
                | SessionState::Completed
        ) && !self.choking.am_interested
    }

    pub fn set_interested(&mut self, interested: bool) {
        self.choking.am_interested = interested;
    }

    /// Readies the session for the next piece on the same connection.
    pub fn begin_chunk(&mut self) {
        if matches!(self.state, SessionState::Downloading | SessionState::Completed) {
            let next = if self.choking.peer_choking {
                SessionState::Idle
            } else {
                SessionState::Unchoked
            };
            self.transition(next);
        }
    }

    /// Records that a block answering one of our requests arrived.
    ///
    /// Only requested blocks move the session into `Downloading`; stray
    /// pieces surface as events but leave the state alone.
    pub fn block_accepted(&mut self) {
        if self.state == SessionState::Unchoked {
            self.transition(SessionState::Downloading);
        }
    }

    /// Marks the current piece as verified and stored.
    pub fn complete_chunk(&mut self) {
        if self.state == SessionState::Downloading {
            self.transition(SessionState::Completed);
        }
    }

    /// Applies one message from the peer.
    pub fn on_message(&mut self, message: Message) -> SessionEvent {
        if self.state == SessionState::HandshakeVerified {
            if !matches!(message, Message::Bitfield(_)) {
                debug!(message = ?message.id(), "first message is not a bitfield");
            }
            self.transition(SessionState::Idle);
        }

        match message {
            Message::KeepAlive => {
                trace!("keep-alive");
                SessionEvent::None
            }
            Message::Choke => {
                self.choking.peer_choking = true;
                match self.state {
                    SessionState::Unchoked | SessionState::Downloading => {
                        self.transition(SessionState::Idle);
                        SessionEvent::Choked
                    }
                    _ => SessionEvent::None,
                }
            }
            Message::Unchoke => {
                self.choking.peer_choking = false;
                if self.state == SessionState::Idle {
                    self.transition(SessionState::Unchoked);
                    SessionEvent::Unchoked
                } else {
                    SessionEvent::None
                }
            }
            Message::Interested => {
                self.choking.peer_interested = true;
                SessionEvent::None
            }
            Message::NotInterested => {
                self.choking.peer_interested = false;
                SessionEvent::None
            }
            Message::Have { piece } => {
                let piece_count = self.piece_count;
                self.bitfield
                    .get_or_insert_with(|| Bitfield::new(piece_count))
                    .set_piece(piece as usize);
                SessionEvent::None
            }
            Message::Bitfield(bits) => {
                let bitfield = Bitfield::from_bytes(&bits, self.piece_count);
                debug!(pieces = bitfield.count(), of = self.piece_count, "peer bitfield");
                self.bitfield = Some(bitfield);
                SessionEvent::None
            }
            Message::Request { index, begin, .. } | Message::Cancel { index, begin, .. } => {
                trace!(index, begin, "ignoring upload-side message");
                SessionEvent::None
            }
            Message::Piece { index, begin, data } => match self.state {
                SessionState::Unchoked | SessionState::Downloading => {
                    SessionEvent::Block { index, begin, data }
                }
                state => {
                    debug!(index, begin, ?state, "dropping block received outside a download");
                    SessionEvent::None
                }
            },
            Message::Unknown { id, payload } => {
                warn!(id, len = payload.len(), "ignoring unknown message");
                SessionEvent::None
            }
        }
    }
}
