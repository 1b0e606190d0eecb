use super::codec::MessageDecoder;
use super::error::PeerError;
use super::message::Message;
use crate::constants::WRITE_TIMEOUT;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::trace;

/// What the receiver task hands to the connection: a decoded message, or
/// the error that ended the read loop.
pub type Inbound = Result<Message, PeerError>;

/// Read half of a peer connection.
pub struct MessageReader<R> {
    stream: R,
    decoder: MessageDecoder,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(stream: R, decoder: MessageDecoder) -> Self {
        Self { stream, decoder }
    }

    /// Reads until one whole frame is buffered and decodes it.
    pub async fn receive(&mut self) -> Result<Message, PeerError> {
        loop {
            if let Some(message) = self.decoder.decode_next()? {
                return Ok(message);
            }

            let n = self.stream.read_buf(self.decoder.buffer_mut()).await?;
            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
            trace!(bytes = n, buffered = self.decoder.buffered(), "read");
        }
    }
}

impl<R: AsyncRead + Unpin + Send + 'static> MessageReader<R> {
    /// Runs the read loop on its own task.
    ///
    /// Messages are forwarded in arrival order. The loop ends after
    /// forwarding the first error, or when the receiving side is dropped.
    pub fn spawn(mut self, capacity: usize) -> (mpsc::Receiver<Inbound>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(async move {
            loop {
                let inbound = self.receive().await;
                let done = inbound.is_err();
                if tx.send(inbound).await.is_err() || done {
                    break;
                }
            }
        });
        (rx, handle)
    }
}

/// Write half of a peer connection.
pub struct MessageWriter<W> {
    stream: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(64),
        }
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        self.buf.clear();
        message.encode_into(&mut self.buf);
        timeout(WRITE_TIMEOUT, async {
            self.stream.write_all(&self.buf).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }
}
