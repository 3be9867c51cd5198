//! DEFLATE compression (deflate).
//!
//! [`DeflaterWriter`] is a buffered push encoder over any [`Write`] sink.
//! Bytes accumulate in a window; each time the window's data region fills,
//! the configured [`Strategy`] decides how to encode it and the resulting
//! bits are written out. The trailing 32 KiB of encoded data are kept as
//! history so strategies can form back-references across block boundaries.
//! [`DeflaterWriter::finish`] emits the final block (with `bfinal = 1`,
//! even when no data is pending) and byte-aligns the output.

use crate::comp::{strategy_for_level, Strategy};
use ferroflate_core::bitstream::BitWriter;
use ferroflate_core::error::{FerroflateError, Result};
use std::io::{self, Write};

/// Largest history the DEFLATE format can reference.
const MAX_HISTORY_CAPACITY: usize = 32 * 1024;

/// Default size of the data region encoded per strategy invocation.
const DEFAULT_BUFFER_LEN: usize = 64 * 1024;

/// Compresses a byte stream into a raw DEFLATE data stream (no zlib or gzip
/// framing).
///
/// The writer buffers internally; wrapping the sink in a buffered writer is
/// unnecessary. Call [`DeflaterWriter::finish`] (or
/// [`DeflaterWriter::into_inner`]) when done — dropping an unfinished
/// writer loses the final block.
pub struct DeflaterWriter<W: Write> {
    out: BitWriter<W>,
    strategy: Box<dyn Strategy>,
    /// History region followed by the data region.
    window: Vec<u8>,
    history_capacity: usize,
    buffer_len: usize,
    history_len: usize,
    data_len: usize,
    finished: bool,
}

impl<W: Write> DeflaterWriter<W> {
    /// Create a deflater with the given strategy and default window sizes
    /// (32 KiB history, 64 KiB data region).
    pub fn new(out: W, strategy: Box<dyn Strategy>) -> Self {
        Self::with_capacities(out, strategy, MAX_HISTORY_CAPACITY, DEFAULT_BUFFER_LEN)
            .expect("default capacities are valid")
    }

    /// Create a deflater with a zlib-style compression level (0-9).
    pub fn with_level(out: W, level: u8) -> Self {
        Self::new(out, strategy_for_level(level))
    }

    /// Create a deflater with explicit window sizes.
    ///
    /// `buffer_len` must be positive, `history_capacity` at most 32 KiB,
    /// and their sum must not overflow; violations are reported as
    /// [`FerroflateError::InvalidState`].
    pub fn with_capacities(
        out: W,
        strategy: Box<dyn Strategy>,
        history_capacity: usize,
        buffer_len: usize,
    ) -> Result<Self> {
        if buffer_len == 0 {
            return Err(FerroflateError::invalid_state(
                "buffer length must be positive",
            ));
        }
        if history_capacity > MAX_HISTORY_CAPACITY {
            return Err(FerroflateError::invalid_state(
                "history capacity exceeds the 32 KiB the format can reference",
            ));
        }
        let window_len = history_capacity.checked_add(buffer_len).ok_or_else(|| {
            FerroflateError::invalid_state("window size overflows")
        })?;
        Ok(Self {
            out: BitWriter::new(out),
            strategy,
            window: vec![0; window_len],
            history_capacity,
            buffer_len,
            history_len: 0,
            data_len: 0,
            finished: false,
        })
    }

    /// Append bytes to the stream, encoding full windows as they form.
    pub fn write_bytes(&mut self, mut buf: &[u8]) -> Result<()> {
        if self.finished {
            return Err(FerroflateError::invalid_state("stream already finished"));
        }
        while !buf.is_empty() {
            if self.data_len == self.buffer_len {
                self.flush_window(false)?;
            }
            let n = (self.buffer_len - self.data_len).min(buf.len());
            let start = self.history_len + self.data_len;
            self.window[start..start + n].copy_from_slice(&buf[..n]);
            self.data_len += n;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Encode the pending data as the final block(s) and byte-align the
    /// output. Idempotent.
    ///
    /// A finish in the middle of a stream still produces a valid DEFLATE
    /// stream terminating in a block with `bfinal = 1`.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.flush_window(true)?;
        self.out.finish()?;
        self.finished = true;
        Ok(())
    }

    /// Finish the stream and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.out.into_inner())
    }

    /// Hand the buffered data to the strategy and emit its decision, then
    /// migrate the trailing bytes into the history region.
    fn flush_window(&mut self, is_final: bool) -> Result<()> {
        {
            let decision = self
                .strategy
                .decide(&self.window, 0, self.history_len, self.data_len);
            decision.compress_to(&mut self.out, is_final)?;
        }

        let total = self.history_len + self.data_len;
        let keep = total.min(self.history_capacity);
        self.window.copy_within(total - keep..total, 0);
        self.history_len = keep;
        self.data_len = 0;
        Ok(())
    }
}

impl<W: Write> Write for DeflaterWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Bits of a partially filled window cannot be forced out without
        // ending a block; only the sink is flushed.
        self.out.writer_mut().flush()
    }
}

/// Compress `data` into a raw DEFLATE stream at the given compression
/// level (0-9).
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut writer = DeflaterWriter::with_level(Vec::new(), level);
    writer.write_bytes(data)?;
    writer.into_inner()
}
