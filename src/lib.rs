//! piecewire - a single-peer BitTorrent download client
//!
//! Fetches a single-file torrent from one peer at a time, piece by piece,
//! with pipelined block requests and SHA-1 verification of every piece
//! before it is stored.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 bencode encoding/decoding
//! - [`metainfo`] - BEP-3 torrent metainfo and info hash
//! - [`tracker`] - BEP-3/23 HTTP tracker announce
//! - [`peer`] - BEP-3 peer wire protocol: handshake, framing, session state
//! - [`download`] - Block pipelining, piece assembly and verification
//! - [`storage`] - Append-only sinks for verified pieces
//! - [`client`] - Tracker-to-disk download driver with peer fallback
//! - [`config`] - Download tuning

pub mod bencode;
pub mod client;
pub mod config;
pub mod constants;
pub mod download;
pub mod metainfo;
pub mod peer;
pub mod storage;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use client::Client;
pub use config::{ConfigError, DownloadConfig};
pub use download::{ChunkDownload, ChunkLayout, DownloadError};
pub use metainfo::{Info, InfoHash, Metainfo, MetainfoError};
pub use peer::{
    Handshake, Message, MessageDecoder, PeerConnection, PeerError, PeerId, PeerSession,
    SessionEvent, SessionState,
};
pub use storage::{ChunkSink, FileSink, MemorySink, StorageError};
pub use tracker::{AnnounceResponse, HttpTracker, TrackerError};
