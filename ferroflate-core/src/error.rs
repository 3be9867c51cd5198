//! Error types for ferroflate operations.
//!
//! All failure modes of the codec and container layers funnel into a single
//! [`FerroflateError`]. Malformed compressed data is reported as
//! [`FerroflateError::Format`] carrying a [`Reason`], I/O failures from the
//! caller's byte source/sink are wrapped verbatim, and API misuse (reading a
//! closed stream, invalid buffer sizes) is a non-latching
//! [`FerroflateError::InvalidState`].

use std::fmt;
use std::io;
use thiserror::Error;

/// Why a compressed stream was rejected.
///
/// Every way a DEFLATE, zlib, or gzip stream can be malformed maps to exactly
/// one of these kinds, so callers can match on the failure without parsing
/// message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Reason {
    UnexpectedEndOfStream,
    ReservedBlockType,
    UncompressedBlockLengthMismatch,
    HuffmanCodeUnderFull,
    HuffmanCodeOverFull,
    NoPreviousCodeLengthToCopy,
    CodeLengthCodeOverFull,
    EndOfBlockCodeZeroLength,
    ReservedLengthSymbol,
    ReservedDistanceSymbol,
    LengthEncounteredWithEmptyDistanceCode,
    CopyFromBeforeDictionaryStart,
    HeaderChecksumMismatch,
    UnsupportedCompressionMethod,
    DecompressedChecksumMismatch,
    DecompressedSizeMismatch,
    GzipInvalidMagicNumber,
    GzipReservedFlagsSet,
    GzipUnsupportedOperatingSystem,
}

impl Reason {
    /// A short human-readable description of this failure kind.
    pub fn describe(self) -> &'static str {
        match self {
            Self::UnexpectedEndOfStream => "unexpected end of stream",
            Self::ReservedBlockType => "reserved block type",
            Self::UncompressedBlockLengthMismatch => "uncompressed block length mismatch",
            Self::HuffmanCodeUnderFull => "under-full Huffman code",
            Self::HuffmanCodeOverFull => "over-full Huffman code",
            Self::NoPreviousCodeLengthToCopy => "no previous code length to copy",
            Self::CodeLengthCodeOverFull => "code length code over-full",
            Self::EndOfBlockCodeZeroLength => "end-of-block code has zero length",
            Self::ReservedLengthSymbol => "reserved length symbol",
            Self::ReservedDistanceSymbol => "reserved distance symbol",
            Self::LengthEncounteredWithEmptyDistanceCode => {
                "length symbol encountered with empty distance code"
            }
            Self::CopyFromBeforeDictionaryStart => "copy from before dictionary start",
            Self::HeaderChecksumMismatch => "header checksum mismatch",
            Self::UnsupportedCompressionMethod => "unsupported compression method",
            Self::DecompressedChecksumMismatch => "decompressed checksum mismatch",
            Self::DecompressedSizeMismatch => "decompressed size mismatch",
            Self::GzipInvalidMagicNumber => "invalid gzip magic number",
            Self::GzipReservedFlagsSet => "reserved gzip flags set",
            Self::GzipUnsupportedOperatingSystem => "unsupported gzip operating system",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The main error type for ferroflate operations.
#[derive(Debug, Error)]
pub enum FerroflateError {
    /// I/O error from the underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The compressed data violates its format.
    #[error("{reason}: {message}")]
    Format {
        /// Which format rule was violated.
        reason: Reason,
        /// Detail about the violation.
        message: String,
    },

    /// The API was used incorrectly (e.g. reading after close). Unlike
    /// format errors, these are reported immediately and do not latch.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for ferroflate operations.
pub type Result<T> = std::result::Result<T, FerroflateError>;

impl FerroflateError {
    /// Create a format error with the given reason and message.
    pub fn format(reason: Reason, message: impl Into<String>) -> Self {
        Self::Format {
            reason,
            message: message.into(),
        }
    }

    /// Create an unexpected-end-of-stream error.
    pub fn unexpected_end() -> Self {
        Self::format(Reason::UnexpectedEndOfStream, "input ended prematurely")
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// The format [`Reason`], if this is a format error.
    pub fn reason(&self) -> Option<Reason> {
        match self {
            Self::Format { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl From<FerroflateError> for io::Error {
    fn from(err: FerroflateError) -> Self {
        match err {
            FerroflateError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FerroflateError::format(Reason::ReservedBlockType, "block type 3");
        assert!(err.to_string().contains("reserved block type"));
        assert_eq!(err.reason(), Some(Reason::ReservedBlockType));

        let err = FerroflateError::invalid_state("stream already closed");
        assert!(err.to_string().contains("invalid state"));
        assert_eq!(err.reason(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: FerroflateError = io_err.into();
        assert!(matches!(err, FerroflateError::Io(_)));

        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::NotFound);
    }
}
