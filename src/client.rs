//! End-to-end download driver.
//!
//! [`Client`] ties the pieces together for one torrent: it asks the tracker
//! for peers, connects to them one at a time, and runs [`ChunkDownload`]s
//! over the connection. When a peer fails in a way another peer might not
//! (timeout, bad hash, broken connection), the client moves on to the next
//! address and resumes at the piece that failed.
//!
//! ```no_run
//! use piecewire::client::Client;
//! use piecewire::config::DownloadConfig;
//! use piecewire::metainfo::Metainfo;
//! use piecewire::storage::FileSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(Metainfo::from_file("sample.torrent")?, DownloadConfig::default())?;
//!
//! let mut sink = FileSink::create("sample.bin").await?;
//! client.download(&mut sink).await?;
//! sink.finish().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::DownloadConfig;
use crate::download::{ChunkDownload, DownloadError};
use crate::metainfo::Metainfo;
use crate::peer::{PeerConnection, PeerError, PeerId};
use crate::storage::ChunkSink;
use crate::tracker::resolve_peers;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

pub struct Client {
    metainfo: Metainfo,
    config: DownloadConfig,
    peer_id: PeerId,
}

impl Client {
    /// Creates a client with a fresh peer ID.
    pub fn new(metainfo: Metainfo, config: DownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        Ok(Self {
            metainfo,
            config,
            peer_id: PeerId::generate(),
        })
    }

    pub fn metainfo(&self) -> &Metainfo {
        &self.metainfo
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Announces to the tracker and returns the peers it lists.
    pub async fn peers(&self) -> Result<Vec<SocketAddr>, DownloadError> {
        let announce = self
            .metainfo
            .announce
            .as_deref()
            .ok_or(DownloadError::MissingAnnounce)?;

        let peers = resolve_peers(
            announce,
            self.metainfo.info_hash,
            self.peer_id,
            self.config.port,
            self.metainfo.info.length,
        )
        .await?;
        debug!(count = peers.len(), "tracker returned peers");

        Ok(peers.into_iter().map(SocketAddr::V4).collect())
    }

    /// Connects and handshakes with one peer.
    pub async fn connect(&self, addr: SocketAddr) -> Result<PeerConnection, PeerError> {
        PeerConnection::connect(
            addr,
            self.metainfo.info_hash,
            self.peer_id,
            self.metainfo.info.pieces.len(),
            &self.config,
        )
        .await
    }

    /// Handshakes with a peer and returns its peer ID.
    pub async fn handshake(&self, addr: SocketAddr) -> Result<PeerId, PeerError> {
        Ok(self.connect(addr).await?.remote_id())
    }

    /// Downloads one piece from the first tracker peer that serves it.
    pub async fn download_piece<S: ChunkSink>(&self, index: u32, sink: &mut S) -> Result<(), DownloadError> {
        let chunk = ChunkDownload::new(&self.metainfo.info, index, &self.config)?;
        let peers = self.peers().await?;
        self.download_chunks(&peers, &[chunk], sink).await
    }

    /// Same as [`download_piece`](Self::download_piece), with the peer list
    /// given instead of fetched from the tracker.
    pub async fn download_piece_from<S: ChunkSink>(
        &self,
        peers: &[SocketAddr],
        index: u32,
        sink: &mut S,
    ) -> Result<(), DownloadError> {
        let chunk = ChunkDownload::new(&self.metainfo.info, index, &self.config)?;
        self.download_chunks(peers, &[chunk], sink).await
    }

    /// Downloads every piece in order, appending each to `sink` as it is
    /// verified.
    pub async fn download<S: ChunkSink>(&self, sink: &mut S) -> Result<(), DownloadError> {
        let peers = self.peers().await?;
        self.download_from(&peers, sink).await
    }

    pub async fn download_from<S: ChunkSink>(
        &self,
        peers: &[SocketAddr],
        sink: &mut S,
    ) -> Result<(), DownloadError> {
        let chunks = (0..self.metainfo.info.piece_count())
            .map(|index| ChunkDownload::new(&self.metainfo.info, index, &self.config))
            .collect::<Result<Vec<_>, _>>()?;
        self.download_chunks(peers, &chunks, sink).await
    }

    /// Runs `chunks` in order, one connection at a time.
    ///
    /// A recoverable error drops the current peer; the next peer picks up at
    /// the piece that failed. Anything else is returned immediately.
    async fn download_chunks<S: ChunkSink>(
        &self,
        peers: &[SocketAddr],
        chunks: &[ChunkDownload],
        sink: &mut S,
    ) -> Result<(), DownloadError> {
        let mut next = 0;
        let mut last_error = None;

        for &addr in peers {
            if next == chunks.len() {
                break;
            }

            let mut conn = match self.connect(addr).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(peer = %addr, error = %e, "could not connect, trying next peer");
                    last_error = Some(DownloadError::from(e));
                    continue;
                }
            };

            while let Some(chunk) = chunks.get(next) {
                match chunk.run(&mut conn, sink).await {
                    Ok(_) => next += 1,
                    Err(e) if e.is_recoverable() => {
                        warn!(peer = %addr, piece = chunk.index(), error = %e, "piece failed, trying next peer");
                        last_error = Some(e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if next == chunks.len() {
            info!(pieces = chunks.len(), "download complete");
            Ok(())
        } else {
            Err(last_error.unwrap_or(DownloadError::NoPeers))
        }
    }
}

#[cfg(test)]
mod tests;
