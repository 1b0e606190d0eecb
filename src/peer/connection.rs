use super::codec::MessageDecoder;
use super::error::PeerError;
use super::handshake::Handshake;
use super::message::Message;
use super::peer_id::PeerId;
use super::session::{PeerSession, SessionEvent, SessionState};
use super::transport::{Inbound, MessageReader, MessageWriter};
use crate::config::DownloadConfig;
use crate::constants::{HANDSHAKE_LEN, READ_BUFFER_CAPACITY};
use crate::metainfo::InfoHash;
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

type BoxedWriter = MessageWriter<WriteHalf<Box<dyn PeerStream>>>;

/// Any duplex byte stream a peer can be reached over.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> PeerStream for T {}

/// An established, handshaken connection to one peer.
///
/// A background receiver task owns the read half: it decodes frames and
/// forwards them over a channel. The connection owns the write half and
/// the [`PeerSession`], and applies each forwarded message to the session
/// in [`next_event`](Self::next_event). Dropping the connection stops the
/// receiver task.
///
/// ```no_run
/// use piecewire::config::DownloadConfig;
/// use piecewire::metainfo::InfoHash;
/// use piecewire::peer::{PeerConnection, PeerId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let addr = "192.168.1.100:6881".parse()?;
/// let info_hash = InfoHash::new([0u8; 20]);
///
/// let conn = PeerConnection::connect(addr, info_hash, PeerId::generate(), 4, &DownloadConfig::default()).await?;
/// println!("Peer ID: {}", conn.remote_id().to_hex());
/// # Ok(())
/// # }
/// ```
pub struct PeerConnection {
    addr: SocketAddr,
    remote_id: PeerId,
    session: PeerSession,
    writer: BoxedWriter,
    inbound: mpsc::Receiver<Inbound>,
    receiver_task: JoinHandle<()>,
}

impl PeerConnection {
    /// Connects over TCP and performs the handshake, each step under its own
    /// deadline from `config`.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: InfoHash,
        local_id: PeerId,
        piece_count: usize,
        config: &DownloadConfig,
    ) -> Result<Self, PeerError> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;
        stream.set_nodelay(true)?;
        debug!(peer = %addr, "connected");

        Self::establish(stream, addr, info_hash, local_id, piece_count, config).await
    }

    /// Performs the handshake over an already-open stream.
    pub async fn establish<S>(
        stream: S,
        addr: SocketAddr,
        info_hash: InfoHash,
        local_id: PeerId,
        piece_count: usize,
        config: &DownloadConfig,
    ) -> Result<Self, PeerError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut stream: Box<dyn PeerStream> = Box::new(stream);
        let mut session = PeerSession::new(piece_count);

        let exchange = exchange_handshakes(&mut stream, &mut session, info_hash, local_id);
        let (remote, leftover) = match timeout(config.handshake_timeout, exchange).await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                session.fail();
                return Err(e);
            }
            Err(_) => {
                session.fail();
                return Err(PeerError::Timeout);
            }
        };
        session.handshake_verified(remote.peer_id);
        info!(peer = %addr, remote_id = %remote.peer_id, "handshake complete");

        let (read_half, write_half) = tokio::io::split(stream);
        let decoder = MessageDecoder::with_buffer(leftover).with_max_frame_len(config.max_frame_len);
        let (inbound, receiver_task) =
            MessageReader::new(read_half, decoder).spawn(config.channel_capacity);

        Ok(Self {
            addr,
            remote_id: remote.peer_id,
            session,
            writer: MessageWriter::new(write_half),
            inbound,
            receiver_task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn remote_id(&self) -> PeerId {
        self.remote_id
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PeerSession {
        &mut self.session
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        if let Err(e) = self.writer.send(message).await {
            self.session.fail();
            return Err(e);
        }
        Ok(())
    }

    /// Waits for the next message that matters to the scheduler.
    ///
    /// Every message from the receiver task is applied to the session;
    /// messages that only update session state are consumed here. Sends
    /// `interested` as soon as the session leaves the handshake phase.
    pub async fn next_event(&mut self) -> Result<SessionEvent, PeerError> {
        loop {
            let message = match self.inbound.recv().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.session.fail();
                    return Err(e);
                }
                None => {
                    self.session.fail();
                    return Err(PeerError::ConnectionClosed);
                }
            };

            let event = self.session.on_message(message);

            if self.session.needs_interest() {
                self.send(&Message::Interested).await?;
                self.session.set_interested(true);
                debug!(peer = %self.addr, "sent interested");
            }

            if event != SessionEvent::None {
                return Ok(event);
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        self.session.state() == SessionState::Failed
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.receiver_task.abort();
    }
}

/// Sends our handshake, then reads until the peer's 68 bytes are in.
///
/// Returns the peer's handshake and any bytes that arrived after it.
async fn exchange_handshakes<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    session: &mut PeerSession,
    info_hash: InfoHash,
    local_id: PeerId,
) -> Result<(Handshake, BytesMut), PeerError> {
    stream
        .write_all(&Handshake::new(info_hash, local_id).encode())
        .await?;
    stream.flush().await?;
    session.handshake_sent();

    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    while buf.len() < HANDSHAKE_LEN {
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(PeerError::ConnectionClosed);
        }
    }

    let remote = Handshake::decode(&buf.split_to(HANDSHAKE_LEN))?;
    if remote.info_hash != info_hash {
        return Err(PeerError::InfoHashMismatch);
    }

    Ok((remote, buf))
}
