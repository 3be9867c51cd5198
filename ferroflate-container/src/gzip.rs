//! The gzip file format (RFC 1952).

use crate::read_exact_or_end;
use ferroflate_core::checksum::{Checksum, ChecksumReader, ChecksumWriter, Crc32};
use ferroflate_core::error::{FerroflateError, Reason, Result};
use ferroflate_core::markable::{BufferedMarkReader, Markable};
use ferroflate_deflate::comp::{strategy_for_level, Strategy};
use ferroflate_deflate::{DeflaterWriter, InflaterReader};
use std::io::{self, Read, Write};

/// GZIP magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method identifier for DEFLATE, the only method defined.
const CM_DEFLATE: u8 = 8;

/// Header flag bits.
mod flags {
    /// File is probably text.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC-16 present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original file name present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits 5-7 are reserved and must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// The operating system recorded in a gzip header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OperatingSystem {
    FatFilesystem,
    Amiga,
    Vms,
    Unix,
    VmCms,
    AtariTos,
    HpfsFilesystem,
    Macintosh,
    ZSystem,
    Cpm,
    Tops20,
    NtfsFilesystem,
    Qdos,
    AcornRiscos,
    Unknown,
}

impl OperatingSystem {
    const NAMED: [OperatingSystem; 14] = [
        Self::FatFilesystem,
        Self::Amiga,
        Self::Vms,
        Self::Unix,
        Self::VmCms,
        Self::AtariTos,
        Self::HpfsFilesystem,
        Self::Macintosh,
        Self::ZSystem,
        Self::Cpm,
        Self::Tops20,
        Self::NtfsFilesystem,
        Self::Qdos,
        Self::AcornRiscos,
    ];

    fn from_wire(value: u8) -> Result<Self> {
        match value {
            0xFF => Ok(Self::Unknown),
            v if (v as usize) < Self::NAMED.len() => Ok(Self::NAMED[v as usize]),
            v => Err(FerroflateError::format(
                Reason::GzipUnsupportedOperatingSystem,
                format!("unsupported operating system value {}", v),
            )),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Self::Unknown => 0xFF,
            named => Self::NAMED
                .iter()
                .position(|&os| os == named)
                .unwrap_or(0xFF) as u8,
        }
    }

    /// A display name matching the RFC 1952 table.
    pub fn name(self) -> &'static str {
        match self {
            Self::FatFilesystem => "FAT filesystem",
            Self::Amiga => "Amiga",
            Self::Vms => "VMS",
            Self::Unix => "Unix",
            Self::VmCms => "VM/CMS",
            Self::AtariTos => "Atari TOS",
            Self::HpfsFilesystem => "HPFS filesystem",
            Self::Macintosh => "Macintosh",
            Self::ZSystem => "Z-System",
            Self::Cpm => "CP/M",
            Self::Tops20 => "TOPS-20",
            Self::NtfsFilesystem => "NTFS filesystem",
            Self::Qdos => "QDOS",
            Self::AcornRiscos => "Acorn RISC OS",
            Self::Unknown => "Unknown",
        }
    }
}

/// Everything a gzip header can carry besides the compressed data.
///
/// File name and comment are ISO-8859-1, NUL-terminated on the wire. A
/// modification time of zero means "not available" and is represented as
/// `None`.
#[derive(Debug, Clone)]
pub struct GzipMetadata {
    /// The FTEXT hint: the file is probably text.
    pub is_text: bool,
    /// Modification time, Unix seconds; `None` when absent.
    pub modification_time: Option<u32>,
    /// The XFL byte (2 = maximum compression, 4 = fastest).
    pub extra_flags: u8,
    /// Originating operating system.
    pub operating_system: OperatingSystem,
    /// The FEXTRA field, at most 65535 bytes.
    pub extra_field: Option<Vec<u8>>,
    /// Original file name.
    pub file_name: Option<String>,
    /// Free-form comment.
    pub comment: Option<String>,
    /// Whether the header carries (or should carry) a CRC-16 of itself.
    pub header_crc: bool,
}

impl Default for GzipMetadata {
    fn default() -> Self {
        Self {
            is_text: false,
            modification_time: None,
            extra_flags: 0,
            operating_system: OperatingSystem::Unknown,
            extra_field: None,
            file_name: None,
            comment: None,
            header_crc: false,
        }
    }
}

impl GzipMetadata {
    /// Parse a gzip header from `input`, leaving it positioned on the first
    /// byte of the compressed data.
    pub fn read<R: Read>(input: &mut R) -> Result<Self> {
        // Checksummed so an FHCRC trailer can be verified against exactly
        // the bytes read so far.
        let mut input = ChecksumReader::new(input, Crc32::new());

        let mut header = [0u8; 10];
        read_exact_or_end(&mut input, &mut header)?;
        if header[..2] != GZIP_MAGIC {
            return Err(FerroflateError::format(
                Reason::GzipInvalidMagicNumber,
                format!("invalid magic number {:02x} {:02x}", header[0], header[1]),
            ));
        }
        if header[2] != CM_DEFLATE {
            return Err(FerroflateError::format(
                Reason::UnsupportedCompressionMethod,
                format!("unsupported compression method {}", header[2]),
            ));
        }
        let flag_byte = header[3];
        if flag_byte & flags::RESERVED != 0 {
            return Err(FerroflateError::format(
                Reason::GzipReservedFlagsSet,
                "reserved flags are set",
            ));
        }
        let mtime = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let extra_flags = header[8];
        let operating_system = OperatingSystem::from_wire(header[9])?;

        let extra_field = if flag_byte & flags::FEXTRA != 0 {
            let mut len = [0u8; 2];
            read_exact_or_end(&mut input, &mut len)?;
            let mut field = vec![0u8; usize::from(u16::from_le_bytes(len))];
            read_exact_or_end(&mut input, &mut field)?;
            Some(field)
        } else {
            None
        };

        let file_name = if flag_byte & flags::FNAME != 0 {
            Some(read_latin1_string(&mut input)?)
        } else {
            None
        };

        let comment = if flag_byte & flags::FCOMMENT != 0 {
            Some(read_latin1_string(&mut input)?)
        } else {
            None
        };

        let header_crc = flag_byte & flags::FHCRC != 0;
        if header_crc {
            let expected = input.value() & 0xFFFF;
            let mut crc = [0u8; 2];
            read_exact_or_end(&mut input, &mut crc)?;
            if u32::from(u16::from_le_bytes(crc)) != expected {
                return Err(FerroflateError::format(
                    Reason::HeaderChecksumMismatch,
                    "header CRC-16 mismatch",
                ));
            }
        }

        Ok(Self {
            is_text: flag_byte & flags::FTEXT != 0,
            modification_time: (mtime != 0).then_some(mtime),
            extra_flags,
            operating_system,
            extra_field,
            file_name,
            comment,
            header_crc,
        })
    }

    /// Write this header to `out`.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        if let Some(field) = &self.extra_field {
            if field.len() > 0xFFFF {
                return Err(FerroflateError::invalid_state("extra field too long"));
            }
        }

        let mut out = ChecksumWriter::new(out, Crc32::new());

        let mut flag_byte = 0u8;
        if self.is_text {
            flag_byte |= flags::FTEXT;
        }
        if self.header_crc {
            flag_byte |= flags::FHCRC;
        }
        if self.extra_field.is_some() {
            flag_byte |= flags::FEXTRA;
        }
        if self.file_name.is_some() {
            flag_byte |= flags::FNAME;
        }
        if self.comment.is_some() {
            flag_byte |= flags::FCOMMENT;
        }

        out.write_all(&GZIP_MAGIC)?;
        out.write_all(&[CM_DEFLATE, flag_byte])?;
        out.write_all(&self.modification_time.unwrap_or(0).to_le_bytes())?;
        out.write_all(&[self.extra_flags, self.operating_system.to_wire()])?;

        if let Some(field) = &self.extra_field {
            out.write_all(&(field.len() as u16).to_le_bytes())?;
            out.write_all(field)?;
        }
        if let Some(name) = &self.file_name {
            write_latin1_string(&mut out, name)?;
        }
        if let Some(comment) = &self.comment {
            write_latin1_string(&mut out, comment)?;
        }
        if self.header_crc {
            out.write_all(&((out.value() & 0xFFFF) as u16).to_le_bytes())?;
        }
        Ok(())
    }
}

/// Read a NUL-terminated ISO-8859-1 string.
fn read_latin1_string<R: Read>(input: &mut R) -> Result<String> {
    let mut result = String::new();
    let mut byte = [0u8; 1];
    loop {
        read_exact_or_end(input, &mut byte)?;
        if byte[0] == 0 {
            return Ok(result);
        }
        result.push(char::from(byte[0]));
    }
}

/// Write a string as NUL-terminated ISO-8859-1.
fn write_latin1_string<W: Write>(out: &mut W, s: &str) -> Result<()> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    for c in s.chars() {
        let code = u32::from(c);
        if code == 0 || code > 0xFF {
            return Err(FerroflateError::invalid_state(
                "string is not representable in ISO-8859-1",
            ));
        }
        bytes.push(code as u8);
    }
    bytes.push(0);
    out.write_all(&bytes)?;
    Ok(())
}

/// Decompresses one gzip member, verifying the CRC-32 and size trailer.
///
/// The source must be [`Markable`] so the trailer can be read exactly where
/// the compressed data ends; [`GzipReader::new`] grafts markability onto any
/// plain reader by buffering.
#[derive(Debug)]
pub struct GzipReader<M: Markable> {
    metadata: GzipMetadata,
    inner: Option<InflaterReader<M>>,
    checksum: Crc32,
    length: u64,
}

impl<R: Read> GzipReader<BufferedMarkReader<R>> {
    /// Read the gzip header from `input` and prepare to decompress the
    /// member that follows.
    pub fn new(input: R) -> Result<Self> {
        Self::from_markable(BufferedMarkReader::new(input))
    }
}

impl<M: Markable> GzipReader<M> {
    /// Like [`GzipReader::new`] over a source that is already markable
    /// (e.g. a [`MarkableFile`]).
    ///
    /// [`MarkableFile`]: ferroflate_core::markable::MarkableFile
    pub fn from_markable(mut input: M) -> Result<Self> {
        let metadata = GzipMetadata::read(&mut input)?;
        let inner = InflaterReader::new_end_exact(input)?;
        Ok(Self {
            metadata,
            inner: Some(inner),
            checksum: Crc32::new(),
            length: 0,
        })
    }

    /// The parsed header.
    pub fn metadata(&self) -> &GzipMetadata {
        &self.metadata
    }

    /// Read decompressed bytes; zero with a non-empty `out` means the end
    /// of the member, with the trailer verified.
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
            self.length += n as u64;
            return Ok(n);
        }

        // End of the DEFLATE stream: the source now sits on the trailer
        let inner = self
            .inner
            .take()
            .expect("presence checked above");
        let mut source = inner.detach()?;
        let mut trailer = [0u8; 8];
        read_exact_or_end(&mut source, &mut trailer)?;

        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if self.checksum.value() != expected_crc {
            return Err(FerroflateError::format(
                Reason::DecompressedChecksumMismatch,
                format!(
                    "CRC-32 mismatch: expected {:#010x}, computed {:#010x}",
                    expected_crc,
                    self.checksum.value()
                ),
            ));
        }
        let expected_len = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        if self.length as u32 != expected_len {
            return Err(FerroflateError::format(
                Reason::DecompressedSizeMismatch,
                format!(
                    "size mismatch: expected {} mod 2^32, got {}",
                    expected_len, self.length
                ),
            ));
        }
        Ok(0)
    }
}

impl<M: Markable> Read for GzipReader<M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decompressed(buf).map_err(Into::into)
    }
}

/// Compresses a byte stream into a single-member gzip file.
pub struct GzipWriter<W: Write> {
    deflater: Option<DeflaterWriter<W>>,
    checksum: Crc32,
    length: u64,
}

impl<W: Write> GzipWriter<W> {
    /// Write `metadata` to `out` and prepare to compress at the default
    /// level (6).
    pub fn new(out: W, metadata: &GzipMetadata) -> Result<Self> {
        Self::with_strategy(out, metadata, strategy_for_level(6))
    }

    /// Like [`GzipWriter::new`] with an explicit compression level (0-9).
    pub fn with_level(out: W, metadata: &GzipMetadata, level: u8) -> Result<Self> {
        Self::with_strategy(out, metadata, strategy_for_level(level))
    }

    /// Like [`GzipWriter::new`] with an explicit encoder strategy.
    pub fn with_strategy(
        mut out: W,
        metadata: &GzipMetadata,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self> {
        metadata.write(&mut out)?;
        Ok(Self {
            deflater: Some(DeflaterWriter::new(out, strategy)),
            checksum: Crc32::new(),
            length: 0,
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
        self.length += buf.len() as u64;
        Ok(())
    }

    /// Finish the DEFLATE stream, write the CRC-32 and size trailer, and
    /// return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let deflater = self
            .deflater
            .take()
            .ok_or_else(|| FerroflateError::invalid_state("stream already finished"))?;
        let mut out = deflater.into_inner()?;
        out.write_all(&self.checksum.value().to_le_bytes())?;
        out.write_all(&(self.length as u32).to_le_bytes())?;
        out.flush()?;
        Ok(out)
    }
}

impl<W: Write> Write for GzipWriter<W> {
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

    fn roundtrip(metadata: &GzipMetadata, data: &[u8], level: u8) -> (GzipMetadata, Vec<u8>) {
        let mut writer = GzipWriter::with_level(Vec::new(), metadata, level).unwrap();
        writer.write_bytes(data).unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = GzipReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        (reader.metadata().clone(), out)
    }

    #[test]
    fn test_roundtrip_plain() {
        let data = b"Hello, gzip world! Hello, gzip world!";
        let (_, out) = roundtrip(&GzipMetadata::default(), data, 6);
        assert_eq!(out, data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let (_, out) = roundtrip(&GzipMetadata::default(), b"", 6);
        assert!(out.is_empty());
    }

    #[test]
    fn test_roundtrip_full_header() {
        let metadata = GzipMetadata {
            is_text: true,
            modification_time: Some(1_234_567_890),
            extra_flags: 2,
            operating_system: OperatingSystem::Unix,
            extra_field: Some(vec![1, 2, 3, 4]),
            file_name: Some("caf\u{e9}.txt".into()),
            comment: Some("round trip".into()),
            header_crc: true,
        };
        let (parsed, out) = roundtrip(&metadata, b"payload", 3);
        assert_eq!(out, b"payload");
        assert!(parsed.is_text);
        assert_eq!(parsed.modification_time, Some(1_234_567_890));
        assert_eq!(parsed.operating_system, OperatingSystem::Unix);
        assert_eq!(parsed.extra_field.as_deref(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(parsed.file_name.as_deref(), Some("caf\u{e9}.txt"));
        assert_eq!(parsed.comment.as_deref(), Some("round trip"));
        assert!(parsed.header_crc);
    }

    #[test]
    fn test_invalid_magic() {
        let err = GzipReader::new(&b"PK\x03\x04 not gzip at all"[..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::GzipInvalidMagicNumber));
    }

    #[test]
    fn test_unsupported_method() {
        let data = [0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 255];
        let err = GzipReader::new(&data[..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::UnsupportedCompressionMethod));
    }

    #[test]
    fn test_reserved_flags() {
        let data = [0x1F, 0x8B, 8, 0x20, 0, 0, 0, 0, 0, 255];
        let err = GzipReader::new(&data[..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::GzipReservedFlagsSet));
    }

    #[test]
    fn test_unsupported_operating_system() {
        let data = [0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 14];
        let err = GzipReader::new(&data[..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::GzipUnsupportedOperatingSystem));
    }

    #[test]
    fn test_truncated_header() {
        let err = GzipReader::new(&[0x1F, 0x8B, 8][..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::UnexpectedEndOfStream));
    }

    #[test]
    fn test_header_crc_mismatch() {
        let metadata = GzipMetadata {
            header_crc: true,
            file_name: Some("x".into()),
            ..GzipMetadata::default()
        };
        let mut writer = GzipWriter::new(Vec::new(), &metadata).unwrap();
        writer.write_bytes(b"data").unwrap();
        let mut compressed = writer.finish().unwrap();
        // Flip a file name byte; the header CRC no longer matches
        compressed[10] ^= 0x01;
        let err = GzipReader::new(&compressed[..]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HeaderChecksumMismatch));
    }

    #[test]
    fn test_payload_crc_mismatch() {
        let mut writer = GzipWriter::new(Vec::new(), &GzipMetadata::default()).unwrap();
        writer.write_bytes(b"checksummed payload").unwrap();
        let mut compressed = writer.finish().unwrap();
        // Corrupt the stored CRC in the trailer
        let crc_offset = compressed.len() - 8;
        compressed[crc_offset] ^= 0xFF;
        let mut reader = GzipReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(err.to_string().contains("CRC-32 mismatch"));
    }

    #[test]
    fn test_size_mismatch() {
        let mut writer = GzipWriter::new(Vec::new(), &GzipMetadata::default()).unwrap();
        writer.write_bytes(b"sized payload").unwrap();
        let mut compressed = writer.finish().unwrap();
        let size_offset = compressed.len() - 4;
        compressed[size_offset] ^= 0x01;
        let mut reader = GzipReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(err.to_string().contains("size mismatch"));
    }

    #[test]
    fn test_zero_length_read_is_a_no_op() {
        let mut writer = GzipWriter::new(Vec::new(), &GzipMetadata::default()).unwrap();
        writer.write_bytes(b"still here after empty reads").unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = GzipReader::new(&compressed[..]).unwrap();
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert_eq!(reader.read(&mut []).unwrap(), 0);

        // The stream is still intact, trailer checks included
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"still here after empty reads");
    }

    #[test]
    fn test_os_wire_values_roundtrip() {
        for value in 0..14u8 {
            let os = OperatingSystem::from_wire(value).unwrap();
            assert_eq!(os.to_wire(), value);
            assert_ne!(os.name(), "");
        }
        assert_eq!(OperatingSystem::from_wire(0xFF).unwrap(), OperatingSystem::Unknown);
    }
}
