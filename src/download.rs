//! Block-level piece download over a single peer connection.
//!
//! A piece is fetched as a series of fixed-size blocks. [`ChunkDownload`]
//! drives the exchange: it keeps up to `window` block requests in flight
//! through a [`RequestPipeline`], stores arriving blocks by offset in a
//! [`ChunkAssembly`], and once every byte is in, checks the SHA-1 against
//! the metainfo before handing the piece to a
//! [`ChunkSink`](crate::storage::ChunkSink).
//!
//! The download is event driven: it only wakes when the connection reports
//! an unchoke, a choke, or a block.
//!
//! ```no_run
//! use piecewire::config::DownloadConfig;
//! use piecewire::download::ChunkDownload;
//! use piecewire::metainfo::Metainfo;
//! use piecewire::peer::{PeerConnection, PeerId};
//! use piecewire::storage::MemorySink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = Metainfo::from_file("sample.torrent")?;
//! let config = DownloadConfig::default();
//! let addr = "192.168.1.100:6881".parse()?;
//!
//! let mut conn = PeerConnection::connect(
//!     addr,
//!     torrent.info_hash,
//!     PeerId::generate(),
//!     torrent.info.pieces.len(),
//!     &config,
//! )
//! .await?;
//!
//! let mut sink = MemorySink::new();
//! ChunkDownload::new(&torrent.info, 0, &config)?
//!     .run(&mut conn, &mut sink)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod assembly;
mod block;
mod chunk;
mod error;
mod layout;
mod pipeline;

pub use assembly::ChunkAssembly;
pub use block::BlockRequest;
pub use chunk::ChunkDownload;
pub use error::DownloadError;
pub use layout::ChunkLayout;
pub use pipeline::RequestPipeline;

#[cfg(test)]
pub(crate) mod tests;
