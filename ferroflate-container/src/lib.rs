//! # Ferroflate Container
//!
//! The gzip (RFC 1952) and zlib (RFC 1950) container formats, layered over
//! the raw DEFLATE codec from `ferroflate-deflate`.
//!
//! Both formats wrap a DEFLATE stream with a small header and a checksum
//! trailer over the uncompressed data: CRC-32 plus modulo-2^32 size for
//! gzip, Adler-32 for zlib. The readers decode in end-exact mode, so the
//! trailer is picked up precisely where the compressed data ends.
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_container::gzip::{GzipMetadata, GzipReader, GzipWriter};
//! use std::io::{Read, Write};
//!
//! let meta = GzipMetadata {
//!     file_name: Some("greeting.txt".into()),
//!     ..GzipMetadata::default()
//! };
//! let mut writer = GzipWriter::new(Vec::new(), &meta).unwrap();
//! writer.write_all(b"Hello, World!").unwrap();
//! let compressed = writer.finish().unwrap();
//!
//! let mut reader = GzipReader::new(&compressed[..]).unwrap();
//! assert_eq!(reader.metadata().file_name.as_deref(), Some("greeting.txt"));
//! let mut out = Vec::new();
//! reader.read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"Hello, World!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod gzip;
pub mod zlib;

pub use gzip::{GzipMetadata, GzipReader, GzipWriter, OperatingSystem};
pub use zlib::{ZlibLevel, ZlibMetadata, ZlibReader, ZlibWriter};

use ferroflate_core::error::{FerroflateError, Result};
use std::io::Read;

/// `read_exact` that reports a truncated stream as
/// [`Reason::UnexpectedEndOfStream`] instead of a bare I/O error.
///
/// [`Reason::UnexpectedEndOfStream`]: ferroflate_core::Reason::UnexpectedEndOfStream
pub(crate) fn read_exact_or_end<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FerroflateError::unexpected_end()
        } else {
            e.into()
        }
    })
}
