//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the self-describing format `.torrent` files and tracker
//! responses are written in. It has four types:
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! Dictionaries are held in a `BTreeMap`, so [`encode`] always emits keys in
//! sorted order. That makes re-encoding a decoded dictionary canonical, which
//! is what the info hash relies on.
//!
//! # Examples
//!
//! ```
//! use piecewire::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d3:cow3:moo4:spaml1:a1:bee").unwrap();
//! assert_eq!(value.get(b"cow").and_then(Value::as_str), Some("moo"));
//! assert_eq!(encode(&value), b"d3:cow3:moo4:spaml1:a1:bee");
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::BencodeError;
pub use value::Value;
