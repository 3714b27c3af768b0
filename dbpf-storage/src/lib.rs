//! Read-only access to SimCity 4 DBPF archives.
//!
//! A DBPF file is a header, a payload region and an index table of
//! `(type, group, instance)` keyed entries, some of which are QFS
//! compressed. [`DbpfReader`] parses the envelope, builds the key index,
//! serves decompressed entry payloads, and composes the decoders from
//! `sc4-formats` into typed loaders.

mod error;
pub mod reader;
pub mod source;

pub use error::{Error, Result};
pub use reader::{DbpfReader, EntryData, Header, IndexEntry, Locator};
pub use source::FileSource;

use sc4_formats::Tgi;

/// Key of the directory entry listing decompressed sizes for every QFS
/// compressed entry in the archive.
pub const DIRECTORY_TGI: Tgi = Tgi::new(0xE86B_1EEF, 0xE86B_1EEF, 0x286B_1F03);

/// Key of the network-junction rule script.
pub const RUL0_TGI: Tgi = Tgi::new(0x0A5B_CF4B, 0xAA5B_CF57, 0x1000_0000);
