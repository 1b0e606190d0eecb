use super::assembly::ChunkAssembly;
use super::error::DownloadError;
use super::layout::ChunkLayout;
use super::pipeline::RequestPipeline;
use crate::config::DownloadConfig;
use crate::constants::HASH_LEN;
use crate::metainfo::Info;
use crate::peer::{PeerConnection, SessionEvent, SessionState};
use crate::storage::ChunkSink;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// Downloads and verifies one piece over an established connection.
///
/// A `ChunkDownload` holds only what the piece needs (index, length,
/// expected hash, window); it borrows the connection for the duration of
/// [`run`](Self::run), so the same connection can serve several pieces in
/// turn.
#[derive(Debug, Clone)]
pub struct ChunkDownload {
    index: u32,
    length: u32,
    expected: [u8; HASH_LEN],
    layout: ChunkLayout,
    window: usize,
    deadline: Duration,
}

impl ChunkDownload {
    /// # Errors
    ///
    /// [`DownloadError::Config`] if `config` has a zero window or an
    /// out-of-range block size, [`DownloadError::InvalidChunkIndex`] if the
    /// torrent has no piece `index`.
    pub fn new(info: &Info, index: u32, config: &DownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        let layout = ChunkLayout::for_info(info, config.block_size);
        let length = layout
            .chunk_len(index)
            .ok_or(DownloadError::InvalidChunkIndex(index))?;
        let expected = *info
            .piece_hash(index)
            .ok_or(DownloadError::InvalidChunkIndex(index))?;

        Ok(Self {
            index,
            length,
            expected,
            layout,
            window: config.window,
            deadline: config.chunk_timeout,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Downloads the piece, verifies it and appends it to `sink`.
    ///
    /// Nothing reaches the sink unless the whole piece hashes correctly.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Timeout`] if the piece isn't done within the
    ///   configured deadline; the connection is marked failed.
    /// - [`DownloadError::ChunkIntegrity`] if the assembled piece has the
    ///   wrong hash.
    /// - [`DownloadError::Peer`] if the connection breaks.
    pub async fn run<S: ChunkSink>(
        &self,
        conn: &mut PeerConnection,
        sink: &mut S,
    ) -> Result<Bytes, DownloadError> {
        match timeout(self.deadline, self.drive(conn, sink)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(peer = %conn.addr(), piece = self.index, "piece download timed out");
                conn.session_mut().fail();
                Err(DownloadError::Timeout)
            }
        }
    }

    async fn drive<S: ChunkSink>(
        &self,
        conn: &mut PeerConnection,
        sink: &mut S,
    ) -> Result<Bytes, DownloadError> {
        let mut pipeline = RequestPipeline::new(self.layout, self.index, self.window);
        let mut assembly = ChunkAssembly::new(self.index, self.length);

        conn.session_mut().begin_chunk();
        if conn.session().peer_has(self.index) == Some(false) {
            warn!(peer = %conn.addr(), piece = self.index, "peer did not advertise piece, requesting anyway");
        }
        debug!(peer = %conn.addr(), piece = self.index, length = self.length, "starting piece");

        if conn.session().state() == SessionState::Unchoked {
            self.request_more(conn, &mut pipeline).await?;
        }

        loop {
            match conn.next_event().await? {
                SessionEvent::None => {}
                SessionEvent::Unchoked => {
                    self.request_more(conn, &mut pipeline).await?;
                }
                SessionEvent::Choked => {
                    let cancelled = pipeline.cancel_all();
                    debug!(
                        peer = %conn.addr(),
                        piece = self.index,
                        cancelled = cancelled.len(),
                        discarded = assembly.bytes_received(),
                        "choked mid-piece, restarting when unchoked"
                    );
                    assembly.reset();
                }
                SessionEvent::Block { index, begin, data } => {
                    if !pipeline.complete(index, begin, data.len() as u32) {
                        debug!(index, begin, len = data.len(), "dropping unrequested block");
                        continue;
                    }
                    trace!(index, begin, len = data.len(), "block");
                    conn.session_mut().block_accepted();
                    assembly.insert(begin, data);

                    if assembly.is_complete() {
                        return self.finish(conn, &assembly, sink).await;
                    }
                    self.request_more(conn, &mut pipeline).await?;
                }
            }
        }
    }

    async fn request_more(
        &self,
        conn: &mut PeerConnection,
        pipeline: &mut RequestPipeline,
    ) -> Result<(), DownloadError> {
        for request in pipeline.fill() {
            trace!(index = request.index, begin = request.begin, length = request.length, "request");
            conn.send(&request.to_message()).await?;
        }
        Ok(())
    }

    async fn finish<S: ChunkSink>(
        &self,
        conn: &mut PeerConnection,
        assembly: &ChunkAssembly,
        sink: &mut S,
    ) -> Result<Bytes, DownloadError> {
        let data = match assembly.verify(&self.expected) {
            Ok(data) => data,
            Err(e) => {
                warn!(peer = %conn.addr(), piece = self.index, error = %e, "piece failed verification");
                return Err(e);
            }
        };

        sink.append(&data).await?;
        conn.session_mut().complete_chunk();
        info!(peer = %conn.addr(), piece = self.index, bytes = data.len(), "piece verified");
        Ok(data)
    }
}
