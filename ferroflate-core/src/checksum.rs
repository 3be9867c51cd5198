//! CRC-32 and Adler-32 checksums.
//!
//! The gzip container uses CRC-32 (ISO 3309, as in ZIP and PNG) over both
//! its header and its decompressed payload; the zlib container uses Adler-32
//! over the decompressed payload. Both are exposed behind the [`Checksum`]
//! trait so the container layers and the CLI can thread either through the
//! [`ChecksumReader`]/[`ChecksumWriter`] pass-through adapters.

use std::io::{Read, Write};

/// A streaming 32-bit checksum.
pub trait Checksum {
    /// Feed more data into the checksum.
    fn update(&mut self, data: &[u8]);

    /// The checksum over all data fed so far.
    fn value(&self) -> u32;
}

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected).
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF
/// - Final XOR: 0xFFFFFFFF
/// - Reflected input and output
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Compute the CRC-32 of `data` in one shot.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum for Crc32 {
    fn update(&mut self, data: &[u8]) {
        let mut state = self.state;
        for &byte in data {
            state = (state >> 8) ^ CRC32_TABLE[((state ^ u32::from(byte)) & 0xFF) as usize];
        }
        self.state = state;
    }

    fn value(&self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

/// Largest prime smaller than 65536.
const ADLER_MODULUS: u32 = 65521;

/// Number of bytes that can be summed before the accumulators must be
/// reduced to avoid overflow.
const ADLER_NMAX: usize = 5552;

/// Adler-32 calculator (RFC 1950).
///
/// Faster than CRC-32 but with weaker error detection; used by the zlib
/// container format.
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Compute the Adler-32 of `data` in one shot.
    pub fn compute(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.value()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum for Adler32 {
    fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        let mut remaining = data;
        while remaining.len() >= ADLER_NMAX {
            let (chunk, rest) = remaining.split_at(ADLER_NMAX);
            remaining = rest;
            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }
            a %= ADLER_MODULUS;
            b %= ADLER_MODULUS;
        }
        for &byte in remaining {
            a += u32::from(byte);
            b += a;
        }

        self.a = a % ADLER_MODULUS;
        self.b = b % ADLER_MODULUS;
    }

    fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// A pass-through reader that checksums and counts everything read.
#[derive(Debug)]
pub struct ChecksumReader<R, C> {
    inner: R,
    checksum: C,
    count: u64,
}

impl<R: Read, C: Checksum> ChecksumReader<R, C> {
    /// Wrap `inner`, feeding every byte read through `checksum`.
    pub fn new(inner: R, checksum: C) -> Self {
        Self {
            inner,
            checksum,
            count: 0,
        }
    }

    /// The checksum over all bytes read so far.
    pub fn value(&self) -> u32 {
        self.checksum.value()
    }

    /// The number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.count
    }

    /// Unwrap the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, C: Checksum> Read for ChecksumReader<R, C> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.checksum.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// A pass-through writer that checksums and counts everything written.
#[derive(Debug)]
pub struct ChecksumWriter<W, C> {
    inner: W,
    checksum: C,
    count: u64,
}

impl<W: Write, C: Checksum> ChecksumWriter<W, C> {
    /// Wrap `inner`, feeding every byte written through `checksum`.
    pub fn new(inner: W, checksum: C) -> Self {
        Self {
            inner,
            checksum,
            count: 0,
        }
    }

    /// The checksum over all bytes written so far.
    pub fn value(&self) -> u32 {
        self.checksum.value()
    }

    /// The number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.count
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write, C: Checksum> Write for ChecksumWriter<W, C> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.checksum.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
