use super::error::TrackerError;
use super::response::AnnounceResponse;
use crate::constants::HTTP_TRACKER_TIMEOUT;
use crate::metainfo::InfoHash;
use crate::peer::PeerId;
use reqwest::Client;
use std::net::SocketAddrV4;
use tracing::{debug, warn};

/// Parameters of one announce.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

impl AnnounceRequest {
    /// A first announce for a download that hasn't started.
    pub fn new(info_hash: InfoHash, peer_id: PeerId, port: u16, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
        }
    }
}

pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder()
            .timeout(HTTP_TRACKER_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Builds the full announce URL with a percent-encoded query string.
    pub fn announce_url(&self, request: &AnnounceRequest) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            self.url,
            separator,
            url_encode(request.info_hash.as_bytes()),
            url_encode(request.peer_id.as_bytes()),
            request.port,
            request.uploaded,
            request.downloaded,
            request.left
        )
    }

    pub async fn announce(&self, request: &AnnounceRequest) -> Result<AnnounceResponse, TrackerError> {
        let url = self.announce_url(request);
        debug!(tracker = %self.url, info_hash = %request.info_hash, "announcing");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let announce = AnnounceResponse::from_bytes(&body)?;

        if let Some(ref warning) = announce.warning_message {
            warn!(tracker = %self.url, warning = %warning, "tracker warning");
        }
        debug!(
            tracker = %self.url,
            peers = announce.peers.len(),
            interval = announce.interval,
            "announce complete"
        );

        Ok(announce)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Resolves an info hash to the peer addresses the tracker knows about.
pub async fn resolve_peers(
    announce_url: &str,
    info_hash: InfoHash,
    peer_id: PeerId,
    port: u16,
    left: u64,
) -> Result<Vec<SocketAddrV4>, TrackerError> {
    let tracker = HttpTracker::new(announce_url)?;
    let request = AnnounceRequest::new(info_hash, peer_id, port, left);
    Ok(tracker.announce(&request).await?.peers)
}

fn url_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
