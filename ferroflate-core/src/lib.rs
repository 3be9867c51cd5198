//! # Ferroflate Core
//!
//! Core components for the ferroflate DEFLATE library.
//!
//! This crate provides the fundamental building blocks shared by the codec
//! and container crates:
//!
//! - [`bitstream`]: bit-level I/O for the LSB-first variable-length codes of
//!   RFC 1951
//! - [`checksum`]: CRC-32 and Adler-32, plus checksumming pass-through streams
//! - [`markable`]: byte sources that can be rewound to a recorded position
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! Ferroflate is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: CLI                                                 │
//! │     gzip / gunzip front ends                            │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     gzip and zlib headers, trailers, checksums          │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     DEFLATE inflater and strategy-driven deflater       │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, checksums, markable sources    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_core::bitstream::{BitReader, BitWriter};
//! use ferroflate_core::checksum::{Checksum, Crc32};
//!
//! // Write and read back a few bit fields
//! let mut output = Vec::new();
//! let mut writer = BitWriter::new(&mut output);
//! writer.write_bits(0b101, 3).unwrap();
//! writer.write_bits(0b1100, 4).unwrap();
//! writer.finish().unwrap();
//!
//! let mut reader = BitReader::new(&output[..]);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//!
//! // Compute a CRC-32
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, World!");
//! assert_eq!(crc.value(), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![forbid(unsafe_code)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod markable;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, Checksum, ChecksumReader, ChecksumWriter, Crc32};
pub use error::{FerroflateError, Reason, Result};
pub use markable::{BufferedMarkReader, Markable, MarkableFile};
