use super::*;
use crate::config::DownloadConfig;
use crate::constants::HANDSHAKE_LEN;
use crate::metainfo::{Info, InfoHash};
use crate::peer::{Handshake, Message, MessageDecoder, PeerConnection, PeerId};
use crate::storage::MemorySink;
use bytes::Bytes;
use rand::seq::SliceRandom;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BLOCK: u32 = 16384;
const QUIET: Duration = Duration::from_millis(50);

pub(crate) fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub(crate) fn make_info(content: &[u8], piece_length: u32) -> Info {
    Info {
        name: "sample.bin".to_string(),
        length: content.len() as u64,
        piece_length,
        pieces: content
            .chunks(piece_length as usize)
            .map(|piece| -> [u8; 20] { Sha1::digest(piece).into() })
            .collect(),
    }
}

/// The remote end of a connection, scripted by a test.
pub(crate) struct FakePeer<S> {
    stream: S,
    decoder: MessageDecoder,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FakePeer<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: MessageDecoder::new(),
        }
    }

    pub(crate) async fn handshake(&mut self, info_hash: InfoHash) {
        let mut theirs = [0u8; HANDSHAKE_LEN];
        self.stream.read_exact(&mut theirs).await.unwrap();
        let reply = Handshake::new(info_hash, PeerId([b'f'; 20])).encode();
        self.stream.write_all(&reply).await.unwrap();
    }

    pub(crate) async fn send(&mut self, message: &Message) {
        self.stream.write_all(&message.encode()).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// The next message, or `None` once the client hangs up.
    pub(crate) async fn next_message(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.decoder.decode_next().unwrap() {
                return Some(message);
            }
            match self.stream.read_buf(self.decoder.buffer_mut()).await {
                Ok(n) if n > 0 => {}
                _ => return None,
            }
        }
    }

    pub(crate) async fn read_message(&mut self) -> Message {
        self.next_message().await.expect("connection closed")
    }

    pub(crate) async fn read_request(&mut self) -> BlockRequest {
        match self.read_message().await {
            Message::Request {
                index,
                begin,
                length,
            } => BlockRequest::new(index, begin, length),
            other => panic!("expected request, got {:?}", other),
        }
    }

    pub(crate) async fn expect_interested(&mut self) {
        assert_eq!(self.read_message().await, Message::Interested);
    }

    /// Bitfield, wait for interested, unchoke.
    pub(crate) async fn open(&mut self, bitfield: &[u8]) {
        self.send(&Message::Bitfield(Bytes::copy_from_slice(bitfield))).await;
        self.expect_interested().await;
        self.send(&Message::Unchoke).await;
    }

    pub(crate) async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(QUIET, self.read_message()).await;
        assert!(next.is_err(), "unexpected message {:?}", next);
    }

    pub(crate) async fn serve(&mut self, content: &[u8], piece_length: u32, request: BlockRequest) {
        let start = request.index as usize * piece_length as usize + request.begin as usize;
        let data = Bytes::copy_from_slice(&content[start..start + request.length as usize]);
        self.send(&Message::Piece {
            index: request.index,
            begin: request.begin,
            data,
        })
        .await;
    }

    /// Answers each request as it arrives until the client goes quiet.
    pub(crate) async fn serve_until_quiet(&mut self, content: &[u8], piece_length: u32) -> Vec<BlockRequest> {
        let mut served = Vec::new();
        while let Ok(Some(message)) = tokio::time::timeout(QUIET * 4, self.next_message()).await {
            match message {
                Message::Request {
                    index,
                    begin,
                    length,
                } => {
                    let request = BlockRequest::new(index, begin, length);
                    self.serve(content, piece_length, request).await;
                    served.push(request);
                }
                other => panic!("expected request, got {:?}", other),
            }
        }
        served
    }
}

async fn connect(
    info: &Info,
    config: &DownloadConfig,
) -> (PeerConnection, FakePeer<tokio::io::DuplexStream>) {
    let (local, remote) = tokio::io::duplex(1 << 20);
    let info_hash = InfoHash::new([1u8; 20]);
    let mut peer = FakePeer::new(remote);

    let (conn, ()) = tokio::join!(
        PeerConnection::establish(
            local,
            "127.0.0.1:6881".parse().unwrap(),
            info_hash,
            PeerId::generate(),
            info.pieces.len(),
            config,
        ),
        peer.handshake(info_hash),
    );
    (conn.unwrap(), peer)
}

#[test]
fn test_layout_boundaries() {
    let layout = ChunkLayout::new(1_000_000, 262_144, BLOCK);
    let last_chunk = 1_000_000 - 3 * 262_144;

    assert_eq!(layout.chunk_count(), 4);
    assert_eq!(layout.chunk_len(0), Some(262_144));
    assert_eq!(layout.chunk_len(2), Some(262_144));
    assert_eq!(layout.chunk_len(3), Some(last_chunk));
    assert_eq!(layout.chunk_len(4), None);

    assert_eq!(layout.block_count(0), Some(16));
    assert_eq!(layout.block_len(0, 15), Some(BLOCK));
    assert_eq!(layout.block_len(0, 16), None);

    assert_eq!(last_chunk, 213_568);
    assert_eq!(layout.block_count(3), Some(14));
    assert_eq!(layout.block_len(3, 12), Some(BLOCK));
    assert_eq!(layout.block_len(3, 13), Some(last_chunk % BLOCK));
    assert_eq!(last_chunk % BLOCK, 576);

    let blocks: Vec<_> = layout.blocks(3).collect();
    assert_eq!(blocks.len(), 14);
    assert_eq!(blocks[13], BlockRequest::new(3, 13 * BLOCK, 576));
    assert_eq!(blocks.iter().map(|b| b.length).sum::<u32>(), last_chunk);

    let total: u64 = (0..4)
        .flat_map(|c| layout.blocks(c).collect::<Vec<_>>())
        .map(|b| u64::from(b.length))
        .sum();
    assert_eq!(total, 1_000_000);
}

#[test]
fn test_layout_exact_multiple() {
    let layout = ChunkLayout::new(4 * 32768, 32768, BLOCK);
    assert_eq!(layout.chunk_count(), 4);
    assert_eq!(layout.chunk_len(3), Some(32768));
    assert_eq!(layout.block_count(3), Some(2));
    assert_eq!(layout.block_len(3, 1), Some(BLOCK));

    assert_eq!(ChunkLayout::new(0, 32768, BLOCK).chunk_count(), 0);
}

#[test]
fn test_pipeline_window() {
    let length = 3 * BLOCK + 1000;
    let layout = ChunkLayout::new(3 * u64::from(length), length, BLOCK);
    let mut pipeline = RequestPipeline::new(layout, 2, 2);

    let first = pipeline.fill();
    assert_eq!(
        first,
        vec![BlockRequest::new(2, 0, BLOCK), BlockRequest::new(2, BLOCK, BLOCK)]
    );
    assert!(pipeline.next_request().is_none());
    assert_eq!(pipeline.outstanding(), 2);

    assert!(!pipeline.complete(2, 0, 1000));
    assert!(!pipeline.complete(1, 0, BLOCK));
    assert!(pipeline.complete(2, BLOCK, BLOCK));
    assert!(!pipeline.complete(2, BLOCK, BLOCK));

    assert_eq!(pipeline.fill(), vec![BlockRequest::new(2, 2 * BLOCK, BLOCK)]);
    assert!(pipeline.complete(2, 0, BLOCK));
    assert_eq!(pipeline.fill(), vec![BlockRequest::new(2, 3 * BLOCK, 1000)]);
    assert!(pipeline.is_exhausted());
    assert!(pipeline.fill().is_empty());

    let cancelled = pipeline.cancel_all();
    assert_eq!(cancelled.len(), 2);
    assert_eq!(pipeline.outstanding(), 0);
    assert_eq!(pipeline.next_request(), Some(BlockRequest::new(2, 0, BLOCK)));
}

#[test]
fn test_pipeline_short_last_piece() {
    let layout = ChunkLayout::new(1_000_000, 262_144, BLOCK);
    let mut pipeline = RequestPipeline::new(layout, 3, 4);

    let mut requests = Vec::new();
    while let Some(request) = pipeline.next_request() {
        assert!(pipeline.complete(request.index, request.begin, request.length));
        requests.push(request);
    }

    assert!(pipeline.is_exhausted());
    assert_eq!(requests.len(), 14);
    assert_eq!(requests, layout.blocks(3).collect::<Vec<_>>());
    assert_eq!(requests.last(), Some(&BlockRequest::new(3, 13 * BLOCK, 576)));
    assert_eq!(requests.iter().map(|r| r.length).sum::<u32>(), 213_568);
}

#[test]
fn test_pipeline_past_last_piece() {
    let layout = ChunkLayout::new(1_000_000, 262_144, BLOCK);
    let mut pipeline = RequestPipeline::new(layout, 4, 4);
    assert!(pipeline.is_exhausted());
    assert!(pipeline.fill().is_empty());
}

fn assemble(data: &[u8], order: &[BlockRequest]) -> ChunkAssembly {
    let mut assembly = ChunkAssembly::new(0, data.len() as u32);
    for request in order {
        let start = request.begin as usize;
        let block = Bytes::copy_from_slice(&data[start..start + request.length as usize]);
        assert!(assembly.insert(request.begin, block));
    }
    assembly
}

#[test]
fn test_assembly_order_independent() {
    let data = content(3 * BLOCK as usize + 1000);
    let hash: [u8; 20] = Sha1::digest(&data).into();
    let layout = ChunkLayout::new(data.len() as u64, data.len() as u32, BLOCK);
    let sequential: Vec<_> = layout.blocks(0).collect();
    assert_eq!(sequential.len(), 4);

    let in_order = assemble(&data, &sequential).verify(&hash).unwrap();
    assert_eq!(&in_order[..], &data[..]);

    let mut reversed = sequential.clone();
    reversed.reverse();
    let assembly = assemble(&data, &reversed);
    assert!(assembly.is_complete());
    assert_eq!(assembly.verify(&hash).unwrap(), in_order);

    let mut rng = rand::rng();
    for _ in 0..20 {
        let mut shuffled = sequential.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(assemble(&data, &shuffled).verify(&hash).unwrap(), in_order);
    }
}

#[test]
fn test_assembly_rejects_overflow_and_duplicates() {
    let mut assembly = ChunkAssembly::new(0, 20000);
    assert!(assembly.insert(0, Bytes::from(vec![0u8; 16384])));
    assert!(!assembly.insert(0, Bytes::from(vec![0u8; 16384])));
    assert!(!assembly.insert(16384, Bytes::from(vec![0u8; 16384])));
    assert!(!assembly.insert(16384, Bytes::new()));
    assert_eq!(assembly.bytes_received(), 16384);
    assert!(!assembly.is_complete());

    assert!(assembly.insert(16384, Bytes::from(vec![0u8; 3616])));
    assert!(assembly.is_complete());

    assembly.reset();
    assert!(assembly.is_empty());
    assert_eq!(assembly.bytes_received(), 0);
}

#[test]
fn test_assembly_detects_corruption() {
    let data = content(2 * BLOCK as usize);
    let hash: [u8; 20] = Sha1::digest(&data).into();

    let mut corrupted = data.clone();
    corrupted[BLOCK as usize + 7] ^= 0x01;
    let layout = ChunkLayout::new(data.len() as u64, data.len() as u32, BLOCK);
    let blocks: Vec<_> = layout.blocks(0).collect();

    match assemble(&corrupted, &blocks).verify(&hash) {
        Err(DownloadError::ChunkIntegrity {
            index,
            expected,
            actual,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(expected, hash);
            assert_eq!(actual, <[u8; 20]>::from(Sha1::digest(&corrupted)));
        }
        other => panic!("expected integrity error, got {:?}", other),
    }
}

#[test]
fn test_invalid_chunk_index() {
    let data = content(1000);
    let info = make_info(&data, 512);
    assert!(ChunkDownload::new(&info, 1, &DownloadConfig::default()).is_ok());
    assert!(matches!(
        ChunkDownload::new(&info, 2, &DownloadConfig::default()),
        Err(DownloadError::InvalidChunkIndex(2))
    ));
}

#[test]
fn test_chunk_download_rejects_bad_config() {
    use crate::config::ConfigError;

    let data = content(1000);
    let info = make_info(&data, 512);

    let zero_block = DownloadConfig::default().with_block_size(0);
    assert!(matches!(
        ChunkDownload::new(&info, 0, &zero_block),
        Err(DownloadError::Config(ConfigError::InvalidBlockSize { got: 0, .. }))
    ));

    let zero_window = DownloadConfig::default().with_window(0);
    assert!(matches!(
        ChunkDownload::new(&info, 0, &zero_window),
        Err(DownloadError::Config(ConfigError::ZeroWindow))
    ));
}

#[test]
fn test_error_recoverability() {
    use crate::peer::PeerError;

    assert!(DownloadError::Timeout.is_recoverable());
    assert!(DownloadError::Peer(PeerError::ConnectionClosed).is_recoverable());
    assert!(DownloadError::ChunkIntegrity {
        index: 0,
        expected: [0; 20],
        actual: [1; 20]
    }
    .is_recoverable());
    assert!(!DownloadError::InvalidChunkIndex(3).is_recoverable());
    assert!(!DownloadError::NoPeers.is_recoverable());
}

#[tokio::test]
async fn test_window_discipline() {
    let piece_length = 10 * BLOCK;
    let data = content(piece_length as usize);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script_data = data.clone();
    let script = tokio::spawn(async move {
        peer.open(&[0x80]).await;

        let mut pending = VecDeque::new();
        for i in 0..4 {
            let request = peer.read_request().await;
            assert_eq!(request, BlockRequest::new(0, i * BLOCK, BLOCK));
            pending.push_back(request);
        }
        peer.assert_quiet().await;

        let mut served = 0;
        while let Some(request) = pending.pop_front() {
            peer.serve(&script_data, piece_length, request).await;
            served += 1;

            if served + pending.len() < 10 {
                let next = peer.read_request().await;
                assert_eq!(next.begin, (served + pending.len()) as u32 * BLOCK);
                pending.push_back(next);
                peer.assert_quiet().await;
            }
            assert!(pending.len() <= 4);
        }
        assert_eq!(served, 10);
        peer
    });

    let mut sink = MemorySink::new();
    let verified = ChunkDownload::new(&info, 0, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await
        .unwrap();
    script.await.unwrap();

    assert_eq!(&verified[..], &data[..]);
    assert_eq!(sink.chunks().len(), 1);
    assert_eq!(sink.data(), data);
    assert_eq!(conn.session().state(), crate::peer::SessionState::Completed);
}

async fn download_in_order(reverse: bool) {
    let piece_length = 3 * BLOCK + 1000;
    let data = content(piece_length as usize);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script_data = data.clone();
    let script = tokio::spawn(async move {
        peer.open(&[0x80]).await;
        let mut requests = Vec::new();
        for _ in 0..4 {
            requests.push(peer.read_request().await);
        }
        assert_eq!(requests[3], BlockRequest::new(0, 3 * BLOCK, 1000));

        if reverse {
            requests.reverse();
        } else {
            requests.shuffle(&mut rand::rng());
        }
        for request in requests {
            peer.serve(&script_data, piece_length, request).await;
        }
        peer
    });

    let mut sink = MemorySink::new();
    ChunkDownload::new(&info, 0, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await
        .unwrap();
    script.await.unwrap();

    assert_eq!(sink.data(), data);
}

#[tokio::test]
async fn test_blocks_in_reverse_order() {
    download_in_order(true).await;
}

#[tokio::test]
async fn test_blocks_in_random_order() {
    download_in_order(false).await;
}

#[tokio::test]
async fn test_integrity_failure_writes_nothing() {
    let piece_length = 2 * BLOCK;
    let data = content(piece_length as usize);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let mut corrupted = data.clone();
    corrupted[100] ^= 0xFF;
    let script = tokio::spawn(async move {
        peer.open(&[0x80]).await;
        peer.serve_until_quiet(&corrupted, piece_length).await;
        peer
    });

    let mut sink = MemorySink::new();
    let result = ChunkDownload::new(&info, 0, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::ChunkIntegrity { index: 0, .. })
    ));
    assert!(sink.is_empty());
    drop(conn);
    script.await.unwrap();
}

#[tokio::test]
async fn test_choke_discards_outstanding() {
    let piece_length = 6 * BLOCK;
    let data = content(piece_length as usize);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script_data = data.clone();
    let script = tokio::spawn(async move {
        peer.open(&[0x80]).await;
        let mut requests = Vec::new();
        for _ in 0..4 {
            requests.push(peer.read_request().await);
        }

        // two blocks land, then the peer chokes
        peer.serve(&script_data, piece_length, requests[0]).await;
        peer.serve(&script_data, piece_length, requests[1]).await;
        let refill = peer.read_request().await;
        let refill2 = peer.read_request().await;
        assert_eq!(refill.begin, 4 * BLOCK);
        assert_eq!(refill2.begin, 5 * BLOCK);

        peer.send(&Message::Choke).await;
        // a block for a request voided by the choke, with garbage in it
        peer.send(&Message::Piece {
            index: 0,
            begin: requests[2].begin,
            data: Bytes::from(vec![0xAB; BLOCK as usize]),
        })
        .await;
        peer.assert_quiet().await;

        peer.send(&Message::Unchoke).await;
        let served = peer.serve_until_quiet(&script_data, piece_length).await;
        assert_eq!(served.len(), 6);
        assert_eq!(served[0], BlockRequest::new(0, 0, BLOCK));
        peer
    });

    let mut sink = MemorySink::new();
    ChunkDownload::new(&info, 0, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await
        .unwrap();
    script.await.unwrap();

    assert_eq!(sink.chunks().len(), 1);
    assert_eq!(sink.data(), data);
}

#[tokio::test]
async fn test_short_last_piece() {
    let piece_length = 2 * BLOCK;
    let data = content(3 * piece_length as usize + 20000);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script_data = data.clone();
    let script = tokio::spawn(async move {
        peer.open(&[0xF0]).await;
        let served = peer.serve_until_quiet(&script_data, piece_length).await;
        assert_eq!(
            served,
            vec![
                BlockRequest::new(3, 0, BLOCK),
                BlockRequest::new(3, BLOCK, 20000 - BLOCK),
            ]
        );
        peer
    });

    let mut sink = MemorySink::new();
    ChunkDownload::new(&info, 3, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await
        .unwrap();
    script.await.unwrap();

    assert_eq!(sink.data(), &data[3 * piece_length as usize..]);
}

#[tokio::test]
async fn test_consecutive_pieces_on_one_connection() {
    let piece_length = BLOCK + 500;
    let data = content(3 * piece_length as usize);
    let info = make_info(&data, piece_length);
    let config = DownloadConfig::default();
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script_data = data.clone();
    let script = tokio::spawn(async move {
        peer.open(&[0xE0]).await;
        let served = peer.serve_until_quiet(&script_data, piece_length).await;
        assert_eq!(served.len(), 6);
        peer
    });

    let mut sink = MemorySink::new();
    for index in 0..3 {
        ChunkDownload::new(&info, index, &config)
            .unwrap()
            .run(&mut conn, &mut sink)
            .await
            .unwrap();
    }
    script.await.unwrap();

    assert_eq!(sink.chunks().len(), 3);
    assert_eq!(sink.data(), data);
}

#[tokio::test]
async fn test_stalled_peer_times_out() {
    let data = content(BLOCK as usize);
    let info = make_info(&data, BLOCK);
    let config = DownloadConfig::default().with_chunk_timeout(Duration::from_millis(200));
    let (mut conn, mut peer) = connect(&info, &config).await;

    let script = tokio::spawn(async move {
        // never unchokes
        peer.send(&Message::Bitfield(Bytes::from_static(&[0x80]))).await;
        peer.expect_interested().await;
        peer
    });

    let mut sink = MemorySink::new();
    let result = ChunkDownload::new(&info, 0, &config)
        .unwrap()
        .run(&mut conn, &mut sink)
        .await;
    assert!(matches!(result, Err(DownloadError::Timeout)));
    assert!(conn.is_failed());
    assert!(sink.is_empty());
    script.await.unwrap();
}
