//! Output for verified pieces.
//!
//! The downloader never writes partial or unverified data: each piece is
//! handed to a [`ChunkSink`] exactly once, after its hash checks out. Pieces
//! arrive in the order they were downloaded, so a sink only ever appends.
//!
//! - [`FileSink`] - appends to a file on disk
//! - [`MemorySink`] - collects pieces in memory
//!
//! ```no_run
//! use piecewire::storage::{ChunkSink, FileSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sink = FileSink::create("downloads/sample.txt").await?;
//! sink.append(b"verified piece bytes").await?;
//! sink.finish().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileSink;
pub use memory::MemorySink;

use std::future::Future;

/// Append-only destination for verified piece data.
pub trait ChunkSink: Send {
    /// Appends one verified piece.
    fn append(&mut self, data: &[u8]) -> impl Future<Output = Result<(), StorageError>> + Send;
}
