//! piecewire - command-line BitTorrent client.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use piecewire::client::Client;
use piecewire::config::DownloadConfig;
use piecewire::metainfo::Metainfo;
use piecewire::storage::FileSink;

#[derive(Parser)]
#[command(name = "piecewire", about = "Single-peer BitTorrent client", version)]
struct Cli {
    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Tuning {
    /// Maximum outstanding block requests per peer
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Bytes per block request
    #[arg(long, global = true)]
    block_size: Option<u32>,
    /// Seconds allowed for one piece
    #[arg(long, global = true)]
    chunk_timeout: Option<u64>,
    /// Port reported to the tracker
    #[arg(long, global = true)]
    port: Option<u16>,
}

impl Tuning {
    fn config(&self) -> DownloadConfig {
        let mut config = DownloadConfig::default();
        if let Some(window) = self.window {
            config = config.with_window(window);
        }
        if let Some(block_size) = self.block_size {
            config = config.with_block_size(block_size);
        }
        if let Some(secs) = self.chunk_timeout {
            config = config.with_chunk_timeout(Duration::from_secs(secs));
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a bencoded value and print it as JSON
    Decode {
        /// Bencoded value, e.g. `d3:foo3:bare`
        value: String,
    },
    /// Print torrent metadata
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
    /// List the peers the tracker returns
    Peers {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
    /// Handshake with a peer and print its peer ID
    Handshake {
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Peer address as `ip:port`
        peer: SocketAddr,
    },
    /// Download and verify a single piece
    #[command(name = "download_piece")]
    DownloadPiece {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Zero-based piece index
        index: u32,
    },
    /// Download the whole file
    Download {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

fn load(path: &Path) -> Result<Metainfo> {
    Metainfo::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

/// `RUST_LOG` when it is set and parses, `info` otherwise.
fn log_filter<E>(from_env: Result<EnvFilter, E>) -> EnvFilter {
    from_env.unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::try_from_default_env()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.tuning.config();

    match cli.command {
        Commands::Decode { value } => {
            let decoded = piecewire::bencode::decode(value.as_bytes()).context("invalid bencode")?;
            println!("{}", decoded.to_json());
        }
        Commands::Info { torrent } => {
            let metainfo = load(&torrent)?;
            println!("Tracker URL: {}", metainfo.announce.as_deref().unwrap_or(""));
            println!("Length: {}", metainfo.info.length);
            println!("Info Hash: {}", metainfo.info_hash);
            println!("Piece Length: {}", metainfo.info.piece_length);
            println!("Piece Hashes:");
            for hash in metainfo.info.piece_hashes_hex() {
                println!("{}", hash);
            }
        }
        Commands::Peers { torrent } => {
            let client = Client::new(load(&torrent)?, config)?;
            for peer in client.peers().await.context("tracker announce failed")? {
                println!("{}", peer);
            }
        }
        Commands::Handshake { torrent, peer } => {
            let client = Client::new(load(&torrent)?, config)?;
            let remote_id = client
                .handshake(peer)
                .await
                .with_context(|| format!("handshake with {} failed", peer))?;
            println!("Peer ID: {}", remote_id.to_hex());
        }
        Commands::DownloadPiece {
            output,
            torrent,
            index,
        } => {
            let client = Client::new(load(&torrent)?, config)?;
            let mut sink = FileSink::create(&output).await?;
            client
                .download_piece(index, &mut sink)
                .await
                .with_context(|| format!("failed to download piece {}", index))?;
            sink.finish().await?;
            println!("Piece {} downloaded to {}.", index, output.display());
        }
        Commands::Download { output, torrent } => {
            let client = Client::new(load(&torrent)?, config)?;
            let mut sink = FileSink::create(&output).await?;
            client.download(&mut sink).await.context("download failed")?;
            sink.finish().await?;
            println!("Downloaded {} to {}.", torrent.display(), output.display());
        }
    }

    Ok(())
}
