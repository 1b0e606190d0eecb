use super::error::StorageError;
use super::ChunkSink;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes pieces to a file, one after another.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
    written: u64,
}

impl FileSink {
    /// Creates (or truncates) the file at `path`, creating parent
    /// directories as needed.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;

        debug!(path = %path.display(), "opened output file");
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and syncs the file to disk.
    pub async fn finish(mut self) -> Result<u64, StorageError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.written)
    }
}

impl ChunkSink for FileSink {
    async fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(data).await?;
        self.file.flush().await?;
        self.written += data.len() as u64;
        Ok(())
    }
}
