//! HTTP tracker protocol ([BEP-3], [BEP-23]).
//!
//! The tracker maps an info hash to the addresses of peers sharing it. Only
//! the announce request is implemented, and peers are requested in compact
//! form (6 bytes per IPv4 peer).
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html
//! [BEP-23]: http://bittorrent.org/beps/bep_0023.html

mod error;
mod http;
mod response;

pub use error::TrackerError;
pub use http::{resolve_peers, AnnounceRequest, HttpTracker};
pub use response::{parse_compact_peers, AnnounceResponse};
