//! Byte sources that can be rewound to a recorded position.
//!
//! End-exact inflation over-reads its source for efficiency and must be able
//! to step back to the first byte after the compressed stream. That requires
//! a [`Markable`] source: one that can record a position (`mark`) and later
//! return to it (`rewind`).
//!
//! Two adapters are provided: [`MarkableFile`] for seekable files, and
//! [`BufferedMarkReader`] which grafts mark/rewind onto any reader by
//! recording the bytes read since the last mark and replaying them.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A byte source supporting mark/rewind.
///
/// Marking replaces any previous mark. The retained window only needs to
/// cover the span between consecutive marks; the inflater marks before every
/// buffer refill, so one input buffer's worth suffices.
pub trait Markable: Read {
    /// Record the current position as the rewind target.
    fn mark(&mut self) -> io::Result<()>;

    /// Return to the most recently recorded mark.
    fn rewind(&mut self) -> io::Result<()>;
}

/// A markable adapter over a seekable file.
#[derive(Debug)]
pub struct MarkableFile {
    file: File,
    mark: u64,
}

impl MarkableFile {
    /// Open the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            mark: 0,
        })
    }

    /// Wrap an already-open file. The mark starts at the current position.
    pub fn new(mut file: File) -> io::Result<Self> {
        let mark = file.stream_position()?;
        Ok(Self { file, mark })
    }
}

impl Read for MarkableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Markable for MarkableFile {
    fn mark(&mut self) -> io::Result<()> {
        self.mark = self.file.stream_position()?;
        Ok(())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.mark))?;
        Ok(())
    }
}

/// Grafts mark/rewind onto any reader by buffering.
///
/// Bytes read since the last mark are retained; `rewind` replays them. A new
/// mark discards the bytes already replayed, so memory use is bounded by the
/// distance between marks.
#[derive(Debug)]
pub struct BufferedMarkReader<R> {
    inner: R,
    /// Bytes read from `inner` since the last mark.
    saved: Vec<u8>,
    /// Next replay position within `saved`.
    replay: usize,
}

impl<R: Read> BufferedMarkReader<R> {
    /// Wrap `inner` with an empty mark window.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            saved: Vec::new(),
            replay: 0,
        }
    }

    /// Unwrap the underlying reader, discarding any replayable bytes.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BufferedMarkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.replay < self.saved.len() {
            let n = (self.saved.len() - self.replay).min(buf.len());
            buf[..n].copy_from_slice(&self.saved[self.replay..self.replay + n]);
            self.replay += n;
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        self.saved.extend_from_slice(&buf[..n]);
        self.replay += n;
        Ok(n)
    }
}

impl<R: Read> Markable for BufferedMarkReader<R> {
    fn mark(&mut self) -> io::Result<()> {
        self.saved.drain(..self.replay);
        self.replay = 0;
        Ok(())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.replay = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_mark_reader_replay() {
        let data = b"abcdefgh";
        let mut reader = BufferedMarkReader::new(&data[..]);

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        reader.rewind().unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abcde");
    }

    #[test]
    fn test_buffered_mark_reader_mark_discards_prefix() {
        let data = b"abcdefgh";
        let mut reader = BufferedMarkReader::new(&data[..]);

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        reader.mark().unwrap();

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ef");

        reader.rewind().unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"efgh");
    }

    #[test]
    fn test_buffered_mark_reader_mark_mid_replay() {
        let data = b"abcdefgh";
        let mut reader = BufferedMarkReader::new(&data[..]);

        let mut buf = [0u8; 6];
        reader.read_exact(&mut buf).unwrap();
        reader.rewind().unwrap();

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ab");

        // Marking during replay keeps the unreplayed tail available.
        reader.mark().unwrap();
        reader.rewind().unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"cdefgh");
    }
}
