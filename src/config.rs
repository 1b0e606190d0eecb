//! Download tuning.
//!
//! [`DownloadConfig`] collects every knob the peer connection and the block
//! scheduler read. Defaults come from [`constants`](crate::constants); the
//! CLI overrides individual fields through the `with_*` builders.
//!
//! ```
//! use piecewire::config::DownloadConfig;
//! use std::time::Duration;
//!
//! let config = DownloadConfig::default()
//!     .with_window(8)
//!     .with_chunk_timeout(Duration::from_secs(120));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    BLOCK_SIZE, CHUNK_TIMEOUT, CONNECT_TIMEOUT, DEFAULT_PORT, EVENT_CHANNEL_CAPACITY,
    HANDSHAKE_TIMEOUT, MAX_BLOCK_SIZE, MAX_FRAME_LEN, MAX_PIPELINED_REQUESTS,
};

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("request window must be at least 1")]
    ZeroWindow,

    #[error("block size must be between 1 and {max} bytes, got {got}")]
    InvalidBlockSize { got: u32, max: u32 },
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Bytes requested per block message.
    pub block_size: u32,
    /// Maximum outstanding block requests.
    pub window: usize,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Deadline for the handshake exchange.
    pub handshake_timeout: Duration,
    /// Deadline for one full piece (request, receive, verify, store).
    pub chunk_timeout: Duration,
    /// Largest frame body accepted from the peer.
    pub max_frame_len: usize,
    /// Capacity of the receiver task's message channel.
    pub channel_capacity: usize,
    /// Port reported to the tracker.
    pub port: u16,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            window: MAX_PIPELINED_REQUESTS,
            connect_timeout: CONNECT_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            chunk_timeout: CHUNK_TIMEOUT,
            max_frame_len: MAX_FRAME_LEN,
            channel_capacity: EVENT_CHANNEL_CAPACITY,
            port: DEFAULT_PORT,
        }
    }
}

impl DownloadConfig {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Checks the values the scheduler depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::InvalidBlockSize {
                got: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(())
    }
}
