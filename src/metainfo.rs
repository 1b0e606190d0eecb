//! Torrent metainfo handling ([BEP-3]).
//!
//! A `.torrent` file is a bencoded dictionary. The part that matters for a
//! download is the `info` dictionary:
//!
//! - `name` - suggested file name
//! - `piece length` - size of each piece in bytes
//! - `pieces` - concatenated 20-byte SHA-1 hashes, one per piece
//! - `length` - total content size
//!
//! The SHA-1 of the canonical bencoding of `info` is the [`InfoHash`], which
//! identifies the content in the tracker announce and the peer handshake.
//!
//! ```no_run
//! use piecewire::metainfo::Metainfo;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = Metainfo::from_file("sample.torrent")?;
//!
//! println!("Info hash: {}", torrent.info_hash);
//! println!("Pieces: {}", torrent.info.piece_count());
//! # Ok(())
//! # }
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod error;
mod info_hash;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub(crate) use info_hash::hex_encode;
pub use torrent::{Info, Metainfo};
