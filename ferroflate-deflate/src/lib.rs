//! # Ferroflate Deflate
//!
//! Pure Rust implementation of the DEFLATE compressed data format (RFC 1951).
//!
//! This crate provides the raw codec — no zlib or gzip framing. The container
//! formats live in `ferroflate-container`.
//!
//! ## Decompression
//!
//! [`InflaterReader`] is a byte-oriented pull decoder over any
//! [`std::io::Read`] source. It supports all three block types (stored, fixed
//! Huffman, dynamic Huffman), maintains the 32 KiB sliding dictionary, and
//! reports malformed data through precise [`Reason`] codes. Over a markable
//! source it can run in *end-exact* mode, leaving the source positioned on
//! the first byte after the compressed stream.
//!
//! ## Compression
//!
//! [`DeflaterWriter`] is a byte-oriented push encoder. How each block is
//! encoded is decided by a pluggable [`Strategy`]: stored blocks, the fixed
//! Huffman code, dynamic Huffman codes with package-merge length limiting,
//! LZ77 matching, a best-of-N selector, and a recursive block splitter can
//! be composed freely, or picked through a zlib-style compression level.
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_deflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! [`Reason`]: ferroflate_core::Reason

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod comp;
pub mod deflate;
mod dictionary;
pub mod huffman;
pub mod inflate;
pub mod tables;

// Re-exports
pub use comp::{strategy_for_level, BitSink, Decision, Strategy};
pub use deflate::{deflate, DeflaterWriter};
pub use inflate::{inflate, InflaterReader};
