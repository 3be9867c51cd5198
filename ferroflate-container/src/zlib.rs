//! The zlib wrapper format (RFC 1950).
//!
//! ```text
//! +---+---+=====================+---+---+---+---+
//! |CMF|FLG| DEFLATE data        |    ADLER32    |
//! +---+---+=====================+---+---+---+---+
//! ```
//!
//! CMF packs the compression method (low nibble, 8 = DEFLATE) and CINFO
//! (window size exponent minus eight). FLG carries FCHECK bits making
//! `(CMF << 8 | FLG)` divisible by 31, the FDICT preset-dictionary flag,
//! and the two FLEVEL bits. The trailer is a big-endian Adler-32 over the
//! uncompressed data.

use crate::read_exact_or_end;
use ferroflate_core::checksum::{Adler32, Checksum};
use ferroflate_core::error::{FerroflateError, Reason, Result};
use ferroflate_core::markable::{BufferedMarkReader, Markable};
use ferroflate_deflate::comp::{strategy_for_level, Strategy};
use ferroflate_deflate::{DeflaterWriter, InflaterReader};
use std::io::{self, Read, Write};

/// The modulus of the FCHECK header checksum.
const CHECKSUM_MODULUS: u32 = 31;

/// The compression-level hint stored in the FLEVEL bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ZlibLevel {
    Fastest,
    Fast,
    Default,
    Maximum,
}

impl ZlibLevel {
    fn from_wire(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Fastest,
            1 => Self::Fast,
            2 => Self::Default,
            _ => Self::Maximum,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Self::Fastest => 0,
            Self::Fast => 1,
            Self::Default => 2,
            Self::Maximum => 3,
        }
    }

    /// The FLEVEL hint matching a compression level knob (0-9).
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=2 => Self::Fastest,
            3..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// The two header bytes of a zlib stream, plus the optional preset
/// dictionary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibMetadata {
    /// CINFO: base-2 log of the window size, minus eight. At most 7.
    pub compression_info: u8,
    /// Adler-32 of the preset dictionary, when FDICT is set.
    pub preset_dictionary: Option<u32>,
    /// The FLEVEL compression-level hint.
    pub compression_level: ZlibLevel,
}

impl Default for ZlibMetadata {
    fn default() -> Self {
        Self {
            compression_info: 7, // 32 KiB window
            preset_dictionary: None,
            compression_level: ZlibLevel::Default,
        }
    }
}

impl ZlibMetadata {
    /// Parse the two header bytes (and dictionary id, if flagged) from
    /// `input`.
    pub fn read<R: Read>(input: &mut R) -> Result<Self> {
        let mut header = [0u8; 2];
        read_exact_or_end(input, &mut header)?;
        let cmf = u32::from(header[0]);
        let flg = u32::from(header[1]);
        if (cmf << 8 | flg) % CHECKSUM_MODULUS != 0 {
            return Err(FerroflateError::format(
                Reason::HeaderChecksumMismatch,
                "FCHECK does not validate the zlib header",
            ));
        }

        let method = cmf & 0xF;
        if method != 8 {
            return Err(FerroflateError::format(
                Reason::UnsupportedCompressionMethod,
                format!("unsupported compression method {}", method),
            ));
        }
        let compression_info = (cmf >> 4) as u8;
        if compression_info > 7 {
            return Err(FerroflateError::format(
                Reason::UnsupportedCompressionMethod,
                format!(
                    "window size 2^{} exceeds the 32 KiB DEFLATE allows",
                    compression_info as u32 + 8
                ),
            ));
        }

        let preset_dictionary = if flg >> 5 & 1 != 0 {
            let mut id = [0u8; 4];
            read_exact_or_end(input, &mut id)?;
            Some(u32::from_be_bytes(id))
        } else {
            None
        };

        Ok(Self {
            compression_info,
            preset_dictionary,
            compression_level: ZlibLevel::from_wire((flg >> 6) as u8),
        })
    }

    /// Write the header bytes (and dictionary id, if present) to `out`.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.compression_info > 7 {
            return Err(FerroflateError::invalid_state(
                "compression info exceeds 7",
            ));
        }
        let cmf = u32::from(self.compression_info) << 4 | 8;
        let mut flg = u32::from(self.preset_dictionary.is_some()) << 5
            | u32::from(self.compression_level.to_wire()) << 6;
        flg |= (CHECKSUM_MODULUS - (cmf << 8 | flg) % CHECKSUM_MODULUS) % CHECKSUM_MODULUS;

        out.write_all(&[cmf as u8, flg as u8])?;
        if let Some(id) = self.preset_dictionary {
            out.write_all(&id.to_be_bytes())?;
        }
        Ok(())
    }
}

/// Decompresses a zlib stream, verifying the Adler-32 trailer.
///
/// The source must be [`Markable`] so the trailer can be read exactly where
/// the compressed data ends; [`ZlibReader::new`] grafts markability onto any
/// plain reader by buffering.
pub struct ZlibReader<M: Markable> {
    metadata: ZlibMetadata,
    inner: Option<InflaterReader<M>>,
    checksum: Adler32,
}

impl<R: Read> ZlibReader<BufferedMarkReader<R>> {
    /// Read the zlib header from `input` and prepare to decompress.
    pub fn new(input: R) -> Result<Self> {
        Self::from_markable(BufferedMarkReader::new(input))
    }
}

impl<M: Markable> ZlibReader<M> {
    /// Like [`ZlibReader::new`] over a source that is already markable.
    pub fn from_markable(mut input: M) -> Result<Self> {
        let metadata = ZlibMetadata::read(&mut input)?;
        let inner = InflaterReader::new_end_exact(input)?;
        Ok(Self {
            metadata,
            inner: Some(inner),
            checksum: Adler32::new(),
        })
    }

    /// The parsed header.
    pub fn metadata(&self) -> &ZlibMetadata {
        &self.metadata
    }

    /// Read decompressed bytes; zero with a non-empty `out` means the end
    /// of the stream, with the trailer verified.
    pub fn read_decompressed(&mut self, out: &mut [u8]) -> Result<usize> {
        // A zero-length read must not be mistaken for the end of the
        // DEFLATE stream, which would detach mid-stream and misread the
        // trailer
        if out.is_empty() {
            return Ok(0);
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };
        let n = inner.read_decompressed(out)?;
        if n > 0 {
            self.checksum.update(&out[..n]);
            return Ok(n);
        }

        let inner = self.inner.take().expect("presence checked above");
        let mut source = inner.detach()?;
        let mut trailer = [0u8; 4];
        read_exact_or_end(&mut source, &mut trailer)?;
        let expected = u32::from_be_bytes(trailer);
        if self.checksum.value() != expected {
            return Err(FerroflateError::format(
                Reason::DecompressedChecksumMismatch,
                format!(
                    "Adler-32 mismatch: expected {:#010x}, computed {:#010x}",
                    expected,
                    self.checksum.value()
                ),
            ));
        }
        Ok(0)
    }
}

impl<M: Markable> Read for ZlibReader<M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decompressed(buf).map_err(Into::into)
    }
}

/// Compresses a byte stream into a zlib stream.
pub struct ZlibWriter<W: Write> {
    deflater: Option<DeflaterWriter<W>>,
    checksum: Adler32,
}

impl<W: Write> ZlibWriter<W> {
    /// Write `metadata` to `out` and prepare to compress at the default
    /// level (6).
    pub fn new(out: W, metadata: &ZlibMetadata) -> Result<Self> {
        Self::with_strategy(out, metadata, strategy_for_level(6))
    }

    /// Compress at an explicit level (0-9), deriving the header's FLEVEL
    /// hint from it.
    pub fn with_level(out: W, level: u8) -> Result<Self> {
        let metadata = ZlibMetadata {
            compression_level: ZlibLevel::from_level(level),
            ..ZlibMetadata::default()
        };
        Self::with_strategy(out, &metadata, strategy_for_level(level))
    }

    /// Like [`ZlibWriter::new`] with an explicit encoder strategy.
    pub fn with_strategy(
        mut out: W,
        metadata: &ZlibMetadata,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self> {
        metadata.write(&mut out)?;
        Ok(Self {
            deflater: Some(DeflaterWriter::new(out, strategy)),
            checksum: Adler32::new(),
        })
    }

    /// Append uncompressed bytes.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let deflater = self
            .deflater
            .as_mut()
            .ok_or_else(|| FerroflateError::invalid_state("stream already finished"))?;
        deflater.write_bytes(buf)?;
        self.checksum.update(buf);
        Ok(())
    }

    /// Finish the DEFLATE stream, write the big-endian Adler-32 trailer,
    /// and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let deflater = self
            .deflater
            .take()
            .ok_or_else(|| FerroflateError::invalid_state("stream already finished"))?;
        let mut out = deflater.into_inner()?;
        out.write_all(&self.checksum.value().to_be_bytes())?;
        out.flush()?;
        Ok(out)
    }
}

impl<W: Write> Write for ZlibWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.deflater.as_mut() {
            Some(deflater) => deflater.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        // The classic 0x78 0x9C default header
        let mut out = Vec::new();
        ZlibMetadata::default().write(&mut out).unwrap();
        assert_eq!(out, vec![0x78, 0x9C]);

        let parsed = ZlibMetadata::read(&mut &out[..]).unwrap();
        assert_eq!(parsed, ZlibMetadata::default());
    }

    #[test]
    fn test_fcheck_always_validates() {
        for info in 0..=7u8 {
            for level in [
                ZlibLevel::Fastest,
                ZlibLevel::Fast,
                ZlibLevel::Default,
                ZlibLevel::Maximum,
            ] {
                let metadata = ZlibMetadata {
                    compression_info: info,
                    preset_dictionary: None,
                    compression_level: level,
                };
                let mut out = Vec::new();
                metadata.write(&mut out).unwrap();
                let value = u32::from(out[0]) << 8 | u32::from(out[1]);
                assert_eq!(value % 31, 0);
            }
        }
    }

    #[test]
    fn test_header_checksum_rejected() {
        let err = ZlibMetadata::read(&mut &[0x78, 0x9D][..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HeaderChecksumMismatch));
    }

    #[test]
    fn test_unsupported_method() {
        // CM = 7; FCHECK fixed up to pass
        let cmf = 0x77u32;
        let flg = (31 - (cmf << 8) % 31) % 31;
        let err = ZlibMetadata::read(&mut &[cmf as u8, flg as u8][..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::UnsupportedCompressionMethod));
    }

    #[test]
    fn test_preset_dictionary_id() {
        let metadata = ZlibMetadata {
            preset_dictionary: Some(0xDEAD_BEEF),
            ..ZlibMetadata::default()
        };
        let mut out = Vec::new();
        metadata.write(&mut out).unwrap();
        assert_eq!(out.len(), 6);
        let parsed = ZlibMetadata::read(&mut &out[..]).unwrap();
        assert_eq!(parsed.preset_dictionary, Some(0xDEAD_BEEF));
    }

    #[test]
    fn test_roundtrip() {
        for data in [&b""[..], b"zlib wrapped", &[7u8; 10_000]] {
            let mut writer = ZlibWriter::new(Vec::new(), &ZlibMetadata::default()).unwrap();
            writer.write_bytes(data).unwrap();
            let compressed = writer.finish().unwrap();

            let mut reader = ZlibReader::new(&compressed[..]).unwrap();
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn test_zero_length_read_is_a_no_op() {
        let mut writer = ZlibWriter::new(Vec::new(), &ZlibMetadata::default()).unwrap();
        writer.write_bytes(b"still here after empty reads").unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = ZlibReader::new(&compressed[..]).unwrap();
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert_eq!(reader.read(&mut []).unwrap(), 0);

        // The stream is still intact, trailer checks included
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"still here after empty reads");
    }

    #[test]
    fn test_adler_mismatch() {
        let mut writer = ZlibWriter::new(Vec::new(), &ZlibMetadata::default()).unwrap();
        writer.write_bytes(b"trailing checksum").unwrap();
        let mut compressed = writer.finish().unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0x55;
        let mut reader = ZlibReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(err.to_string().contains("Adler-32 mismatch"));
    }

    #[test]
    fn test_truncated_trailer() {
        let mut writer = ZlibWriter::new(Vec::new(), &ZlibMetadata::default()).unwrap();
        writer.write_bytes(b"cut short").unwrap();
        let mut compressed = writer.finish().unwrap();
        compressed.truncate(compressed.len() - 2);
        let mut reader = ZlibReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }
}
