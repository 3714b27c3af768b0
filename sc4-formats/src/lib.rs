//! Decoders for the resource formats found inside SimCity 4 DBPF archives.
//!
//! Every decoder is a pure function of an input byte slice: it borrows the
//! payload, returns an owned record, and never reads past the slice end.
//! Archive handling (envelope, index, decompression) lives in the
//! `dbpf-storage` crate; this crate only understands the payloads.

pub mod catalog;
mod error;
pub mod exemplar;
pub mod fsh;
pub mod ltext;
pub mod reader;
pub mod rul0;
pub mod s3d;
pub mod tgi;

pub use error::Error;
pub use tgi::{Tgi, TgiMask};

pub type Result<T> = std::result::Result<T, Error>;
