use super::*;
use crate::bencode::{encode, Value};
use crate::config::ConfigError;
use crate::download::tests::{content, FakePeer};
use crate::storage::MemorySink;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use tokio::net::TcpListener;

const PIECE: u32 = 16384;

fn torrent(data: &[u8], announce: Option<&str>) -> Metainfo {
    let pieces: Vec<u8> = data
        .chunks(PIECE as usize)
        .flat_map(|piece| Sha1::digest(piece).to_vec())
        .collect();

    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"length"), Value::from(data.len() as i64));
    info.insert(Bytes::from_static(b"name"), Value::from("sample.bin"));
    info.insert(Bytes::from_static(b"piece length"), Value::from(i64::from(PIECE)));
    info.insert(Bytes::from_static(b"pieces"), Value::from(Bytes::from(pieces)));

    let mut root = BTreeMap::new();
    if let Some(url) = announce {
        root.insert(Bytes::from_static(b"announce"), Value::from(url));
    }
    root.insert(Bytes::from_static(b"info"), Value::from(info));

    Metainfo::from_bytes(&encode(&Value::from(root))).unwrap()
}

/// Accepts one connection and serves `data` (possibly corrupted) until the
/// client stops asking.
async fn spawn_peer(metainfo: &Metainfo, data: Vec<u8>) -> (SocketAddr, tokio::task::JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info_hash = metainfo.info_hash;

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = FakePeer::new(stream);
        peer.handshake(info_hash).await;
        peer.open(&[0xFF]).await;
        peer.serve_until_quiet(&data, PIECE).await.len()
    });
    (addr, handle)
}

#[test]
fn test_rejects_invalid_config() {
    let data = content(PIECE as usize);
    let result = Client::new(torrent(&data, None), DownloadConfig::default().with_window(0));
    assert!(matches!(
        result,
        Err(DownloadError::Config(ConfigError::ZeroWindow))
    ));
}

#[tokio::test]
async fn test_peers_requires_announce() {
    let data = content(PIECE as usize);
    let client = Client::new(torrent(&data, None), DownloadConfig::default()).unwrap();
    assert!(matches!(
        client.peers().await,
        Err(DownloadError::MissingAnnounce)
    ));
}

#[tokio::test]
async fn test_handshake_returns_remote_id() {
    let data = content(PIECE as usize);
    let client = Client::new(torrent(&data, None), DownloadConfig::default()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info_hash = client.metainfo().info_hash;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = FakePeer::new(stream);
        peer.handshake(info_hash).await;
        peer
    });

    let remote_id = client.handshake(addr).await.unwrap();
    assert_eq!(remote_id, PeerId([b'f'; 20]));
    assert_eq!(remote_id.to_hex(), "66".repeat(20));
}

#[tokio::test]
async fn test_download_from_single_peer() {
    let data = content(3 * PIECE as usize + 123);
    let client = Client::new(torrent(&data, None), DownloadConfig::default()).unwrap();
    let (addr, peer) = spawn_peer(client.metainfo(), data.clone()).await;

    let mut sink = MemorySink::new();
    client.download_from(&[addr], &mut sink).await.unwrap();

    assert_eq!(sink.chunks().len(), 4);
    assert_eq!(sink.data(), data);
    assert_eq!(peer.await.unwrap(), 4);
}

#[tokio::test]
async fn test_download_moves_past_bad_peers() {
    let data = content(2 * PIECE as usize);
    let client = Client::new(torrent(&data, None), DownloadConfig::default()).unwrap();

    // nothing listening here
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let refused = closed.local_addr().unwrap();
    drop(closed);

    let mut corrupted = data.clone();
    corrupted[PIECE as usize + 10] ^= 0xFF;
    let (bad, bad_peer) = spawn_peer(client.metainfo(), corrupted).await;
    let (good, good_peer) = spawn_peer(client.metainfo(), data.clone()).await;

    let mut sink = MemorySink::new();
    client
        .download_from(&[refused, bad, good], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.data(), data);
    // the bad peer delivered piece 0 intact before piece 1 failed
    assert_eq!(bad_peer.await.unwrap(), 2);
    assert_eq!(good_peer.await.unwrap(), 1);
}

#[tokio::test]
async fn test_download_piece_reports_last_error() {
    let data = content(PIECE as usize);
    let client = Client::new(torrent(&data, None), DownloadConfig::default()).unwrap();

    let mut corrupted = data.clone();
    corrupted[0] ^= 0xFF;
    let (bad, bad_peer) = spawn_peer(client.metainfo(), corrupted).await;

    let mut sink = MemorySink::new();
    let result = client.download_piece_from(&[bad], 0, &mut sink).await;
    assert!(matches!(
        result,
        Err(DownloadError::ChunkIntegrity { index: 0, .. })
    ));
    assert!(sink.is_empty());
    bad_peer.await.unwrap();

    assert!(matches!(
        client.download_piece_from(&[], 0, &mut sink).await,
        Err(DownloadError::NoPeers)
    ));
    assert!(matches!(
        client.download_piece_from(&[bad], 1, &mut sink).await,
        Err(DownloadError::InvalidChunkIndex(1))
    ));
}
