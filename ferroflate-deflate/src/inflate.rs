//! DEFLATE decompression (inflate).
//!
//! [`InflaterReader`] decodes a raw DEFLATE stream (RFC 1951, no zlib or
//! gzip framing) from any [`Read`] source. It supports all three block
//! types:
//! - Type 0: stored (uncompressed)
//! - Type 1: fixed Huffman codes
//! - Type 2: dynamic Huffman codes
//!
//! The decoder is a state machine with three facade states: `Open` while
//! decoding, `StickyError` after the first failure (every later read
//! re-reports the same error without touching the source), and `Closed`.
//!
//! Over a [`Markable`] source the inflater can run in *end-exact* mode:
//! although it over-reads the source in buffer-sized chunks for speed, once
//! the final block has been decoded it rewinds and re-skips so that the
//! source is positioned exactly on the first byte after the compressed
//! stream. A byte with any bit consumed counts as fully consumed. This is
//! what lets the gzip/zlib layers read their trailers right after the
//! compressed payload.

use crate::dictionary::{Dictionary, DICTIONARY_MASK};
use crate::huffman::{self, CODE_TABLE_MASK};
use crate::tables::{
    fixed_distance_table, fixed_distance_tree, fixed_litlen_table, fixed_litlen_tree,
    CODE_LENGTH_CODE_ORDER, DISTANCE_TABLE, RUN_LENGTH_TABLE,
};
use ferroflate_core::bitstream::BitReader;
use ferroflate_core::error::{FerroflateError, Reason, Result};
use ferroflate_core::markable::Markable;
use std::borrow::Cow;
use std::io::{self, Read};

/// Decompresses a raw DEFLATE data stream into a byte stream.
///
/// Construct with [`InflaterReader::new`] for plain sources, or
/// [`InflaterReader::new_end_exact`] over a [`Markable`] source when the
/// position after the compressed data matters.
#[derive(Debug)]
pub struct InflaterReader<R: Read> {
    state: State<R>,
}

#[derive(Debug)]
enum State<R: Read> {
    Open(Box<Open<R>>),
    StickyError(SavedError),
    Closed,
}

/// A latched failure, replayed on every read after the first one.
#[derive(Debug)]
enum SavedError {
    Format { reason: Reason, message: String },
    Io { kind: io::ErrorKind, message: String },
    State { message: String },
}

fn save_error(err: &FerroflateError) -> SavedError {
    match err {
        FerroflateError::Io(e) => SavedError::Io {
            kind: e.kind(),
            message: e.to_string(),
        },
        FerroflateError::Format { reason, message } => SavedError::Format {
            reason: *reason,
            message: message.clone(),
        },
        FerroflateError::InvalidState(message) => SavedError::State {
            message: message.clone(),
        },
    }
}

impl SavedError {
    fn to_error(&self) -> FerroflateError {
        match self {
            Self::Format { reason, message } => FerroflateError::format(*reason, message.clone()),
            Self::Io { kind, message } => {
                FerroflateError::Io(io::Error::new(*kind, message.clone()))
            }
            Self::State { message } => FerroflateError::invalid_state(message.clone()),
        }
    }
}

impl<R: Read> InflaterReader<R> {
    /// Create an inflater over `input` with the default input buffer size.
    ///
    /// The source must supply raw DEFLATE data with no container framing.
    pub fn new(input: R) -> Self {
        Self {
            state: State::Open(Box::new(Open::new(
                BitReader::new(input),
                None,
            ))),
        }
    }

    /// Create an inflater with an explicit input buffer size.
    ///
    /// A zero `buffer_len` is rejected as [`FerroflateError::InvalidState`].
    pub fn with_buffer_len(input: R, buffer_len: usize) -> Result<Self> {
        if buffer_len == 0 {
            return Err(FerroflateError::invalid_state(
                "input buffer size must be positive",
            ));
        }
        Ok(Self {
            state: State::Open(Box::new(Open::new(
                BitReader::with_buffer_len(input, buffer_len),
                None,
            ))),
        })
    }

    /// Read decompressed bytes into `out`, returning how many were
    /// produced. Zero with a non-empty `out` means the end of the stream.
    pub fn read_decompressed(&mut self, out: &mut [u8]) -> Result<usize> {
        match &mut self.state {
            State::Open(open) => match open.read(out) {
                Ok(n) => Ok(n),
                Err(err) => {
                    self.state = State::StickyError(save_error(&err));
                    Err(err)
                }
            },
            State::StickyError(saved) => Err(saved.to_error()),
            State::Closed => Err(FerroflateError::invalid_state("stream already closed")),
        }
    }

    /// Read one decompressed byte, or `None` at the end of the stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read_decompressed(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Close the stream. Idempotent, and allowed from any state; reading
    /// afterwards reports [`FerroflateError::InvalidState`].
    pub fn close(&mut self) {
        self.state = State::Closed;
    }
}

impl<R: Markable> InflaterReader<R> {
    /// Create an inflater in end-exact mode.
    ///
    /// The source is marked before every internal refill; when the final
    /// block has been decoded, the source is rewound and re-skipped to sit
    /// exactly on the first byte after the compressed stream.
    pub fn new_end_exact(mut input: R) -> Result<Self> {
        input.mark()?;
        let mut bits = BitReader::new(input);
        bits.set_mark_on_refill(R::mark);
        Ok(Self {
            state: State::Open(Box::new(Open::new(bits, Some(R::rewind as RewindFn<R>)))),
        })
    }

    /// Give back the underlying source, positioned on the first unconsumed
    /// byte (a byte with any bit consumed counts as consumed).
    ///
    /// Only valid on an end-exact inflater that has not failed or closed.
    pub fn detach(self) -> Result<R> {
        match self.state {
            State::Open(mut open) => {
                open.reposition()?;
                Ok(open.input.into_inner())
            }
            State::StickyError(saved) => Err(saved.to_error()),
            State::Closed => Err(FerroflateError::invalid_state(
                "stream already detached or closed",
            )),
        }
    }
}

impl<R: Read> Read for InflaterReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decompressed(buf).map_err(Into::into)
    }
}

type RewindFn<R> = fn(&mut R) -> io::Result<()>;

/// The live decoding state: bit reader, dictionary, and current block.
#[derive(Debug)]
struct Open<R: Read> {
    input: BitReader<R>,
    /// Present iff this inflater is in end-exact mode.
    rewind_source: Option<RewindFn<R>>,
    dictionary: Dictionary,
    block: Option<BlockDecoder>,
    is_last_block: bool,
}

#[derive(Debug)]
enum BlockDecoder {
    Stored { remaining: u16 },
    Huffman(Box<HuffmanDecoder>),
}

impl<R: Read> Open<R> {
    fn new(input: BitReader<R>, rewind_source: Option<RewindFn<R>>) -> Self {
        Self {
            input,
            rewind_source,
            dictionary: Dictionary::new(),
            block: None,
            is_last_block: false,
        }
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut result = 0;
        while result < out.len() {
            if self.block.is_none() {
                // Between blocks
                if self.is_last_block {
                    break;
                }
                self.is_last_block = self.input.read_bits(1)? == 1;
                self.block = Some(match self.input.read_bits(2)? {
                    0 => BlockDecoder::new_stored(&mut self.input)?,
                    1 => BlockDecoder::new_fixed(),
                    2 => BlockDecoder::new_dynamic(&mut self.input)?,
                    _ => {
                        return Err(FerroflateError::format(
                            Reason::ReservedBlockType,
                            "reserved block type 3",
                        ))
                    }
                });
            }

            let (n, done) = match &mut self.block {
                Some(BlockDecoder::Stored { remaining }) => read_stored(
                    &mut self.input,
                    &mut self.dictionary,
                    remaining,
                    &mut out[result..],
                )?,
                Some(BlockDecoder::Huffman(dec)) => {
                    dec.read(&mut self.input, &mut self.dictionary, &mut out[result..])?
                }
                None => unreachable!("block decoder installed above"),
            };
            result += n;
            if done {
                self.block = None;
                if self.is_last_block && self.rewind_source.is_some() {
                    self.reposition()?;
                }
            }
        }
        Ok(result)
    }

    /// Rewind the source to the last mark, then skip the bytes genuinely
    /// consumed past it.
    fn reposition(&mut self) -> Result<()> {
        let rewind = self
            .rewind_source
            .ok_or_else(|| FerroflateError::invalid_state("source is not markable"))?;
        let mut skip = self.input.consumed_since_refill();
        let source = self.input.reader_mut();
        rewind(source)?;
        let mut scratch = [0u8; 512];
        while skip > 0 {
            let chunk_len = skip.min(scratch.len());
            let n = source.read(&mut scratch[..chunk_len])?;
            if n == 0 {
                return Err(FerroflateError::unexpected_end());
            }
            skip -= n;
        }
        Ok(())
    }
}

impl BlockDecoder {
    fn new_stored<R: Read>(input: &mut BitReader<R>) -> Result<Self> {
        input.align_to_byte();
        let len = input.read_bits(16)?;
        let nlen = input.read_bits(16)?;
        if len != nlen ^ 0xFFFF {
            return Err(FerroflateError::format(
                Reason::UncompressedBlockLengthMismatch,
                format!("len {:#06x} does not match nlen {:#06x}", len, nlen),
            ));
        }
        Ok(Self::Stored {
            remaining: len as u16,
        })
    }

    fn new_fixed() -> Self {
        Self::Huffman(Box::new(HuffmanDecoder {
            litlen_tree: Cow::Borrowed(fixed_litlen_tree()),
            litlen_table: Cow::Borrowed(fixed_litlen_table()),
            dist_tree: Some(Cow::Borrowed(fixed_distance_tree())),
            dist_table: Some(Cow::Borrowed(fixed_distance_table())),
            // Longest literal/length code (9) + length extra (5)
            // + distance code (5) + distance extra (13)
            max_bits_per_iter: 9 + 5 + 5 + 13,
            pending: 0,
            done: false,
        }))
    }

    fn new_dynamic<R: Read>(input: &mut BitReader<R>) -> Result<Self> {
        let num_litlen_codes = input.read_bits(5)? as usize + 257; // hlit + 257
        let num_dist_codes = input.read_bits(5)? as usize + 1; // hdist + 1

        // Read the code length code lengths, placed in permuted order
        let num_code_len_codes = input.read_bits(4)? as usize + 4; // hclen + 4
        let mut code_len_lengths = [0u8; 19];
        for &position in CODE_LENGTH_CODE_ORDER.iter().take(num_code_len_codes) {
            code_len_lengths[position] = input.read_bits(3)? as u8;
        }
        let code_len_tree = huffman::code_lengths_to_tree(&code_len_lengths)?;

        // Decode the main code lengths, expanding run symbols
        let mut code_lens = vec![0u8; num_litlen_codes + num_dist_codes];
        let mut run_val: Option<u8> = None;
        let mut i = 0;
        while i < code_lens.len() {
            let sym = decode_symbol(input, &code_len_tree)?;
            if sym < 16 {
                run_val = Some(sym as u8);
                code_lens[i] = sym as u8;
                i += 1;
                continue;
            }
            let (val, run_len) = match sym {
                16 => {
                    let prev = run_val.ok_or_else(|| {
                        FerroflateError::format(
                            Reason::NoPreviousCodeLengthToCopy,
                            "repeat symbol at the start of the code lengths",
                        )
                    })?;
                    (prev, input.read_bits(2)? + 3)
                }
                17 => {
                    run_val = Some(0);
                    (0, input.read_bits(3)? + 3)
                }
                18 => {
                    run_val = Some(0);
                    (0, input.read_bits(7)? + 11)
                }
                _ => unreachable!("code length alphabet has 19 symbols"),
            };
            for _ in 0..run_len {
                if i >= code_lens.len() {
                    return Err(FerroflateError::format(
                        Reason::CodeLengthCodeOverFull,
                        "run exceeds the number of codes",
                    ));
                }
                code_lens[i] = val;
                i += 1;
            }
        }

        // Literal/length code
        let litlen_lens = &code_lens[..num_litlen_codes];
        if litlen_lens[256] == 0 {
            return Err(FerroflateError::format(
                Reason::EndOfBlockCodeZeroLength,
                "end-of-block symbol has zero code length",
            ));
        }
        let litlen_tree = huffman::code_lengths_to_tree(litlen_lens)?;
        let litlen_table = huffman::tree_to_table(&litlen_tree);
        let mut max_bits_litlen = 0u32;
        for (sym, &len) in litlen_lens.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let mut bits = u32::from(len);
            if sym >= 257 && sym - 257 < RUN_LENGTH_TABLE.len() {
                bits += u32::from(RUN_LENGTH_TABLE[sym - 257] & 0x7);
            }
            max_bits_litlen = max_bits_litlen.max(bits);
        }

        // Distance code, with extra processing for degenerate shapes
        let dist_lens = &code_lens[num_litlen_codes..];
        let mut max_bits_dist = 0u32;
        let (dist_tree, dist_table) = if dist_lens == [0] {
            // Empty distance code; the block shall be all literal symbols
            (None, None)
        } else {
            for (sym, &len) in dist_lens.iter().enumerate() {
                if len == 0 {
                    continue;
                }
                let mut bits = u32::from(len);
                if sym < DISTANCE_TABLE.len() {
                    bits += DISTANCE_TABLE[sym] & 0xF;
                }
                max_bits_dist = max_bits_dist.max(bits);
            }

            let one_count = dist_lens.iter().filter(|&&x| x == 1).count();
            let other_positive = dist_lens.iter().filter(|&&x| x > 1).count();
            let tree = if one_count == 1 && other_positive == 0 {
                // Only one distance code is defined; pad with a sentinel
                // 32nd code so the Huffman tree is complete
                let mut padded = [0u8; 32];
                padded[..dist_lens.len()].copy_from_slice(dist_lens);
                padded[31] = 1;
                huffman::code_lengths_to_tree(&padded)?
            } else {
                huffman::code_lengths_to_tree(dist_lens)?
            };
            let table = huffman::tree_to_table(&tree);
            (Some(Cow::Owned(tree)), Some(Cow::Owned(table)))
        };

        Ok(Self::Huffman(Box::new(HuffmanDecoder {
            litlen_tree: Cow::Owned(litlen_tree),
            litlen_table: Cow::Owned(litlen_table),
            dist_tree,
            dist_table,
            max_bits_per_iter: max_bits_litlen + max_bits_dist,
            pending: 0,
            done: false,
        })))
    }
}

/// Copy stored-block bytes straight through, mirroring them into the
/// dictionary. Returns `(bytes_produced, block_done)`.
fn read_stored<R: Read>(
    input: &mut BitReader<R>,
    dictionary: &mut Dictionary,
    remaining: &mut u16,
    out: &mut [u8],
) -> Result<(usize, bool)> {
    let n = (*remaining as usize).min(out.len());
    input.read_aligned_bytes(&mut out[..n])?;
    dictionary.extend(&out[..n]);
    *remaining -= n as u16;
    Ok((n, *remaining == 0))
}

/// Decoder for one fixed or dynamic Huffman block.
#[derive(Debug)]
struct HuffmanDecoder {
    litlen_tree: Cow<'static, [i16]>,
    litlen_table: Cow<'static, [i16]>,
    dist_tree: Option<Cow<'static, [i16]>>,
    dist_table: Option<Cow<'static, [i16]>>,
    /// Upper bound on bits consumed by one symbol iteration; when the bit
    /// buffer holds at least this many, the fast path needs no I/O checks.
    max_bits_per_iter: u32,
    /// Bytes of a back-reference run that did not fit the caller's buffer;
    /// they sit in the dictionary and drain on the next call.
    pending: usize,
    done: bool,
}

impl HuffmanDecoder {
    fn read<R: Read>(
        &mut self,
        input: &mut BitReader<R>,
        dictionary: &mut Dictionary,
        out: &mut [u8],
    ) -> Result<(usize, bool)> {
        let mut index = 0;

        // Drain bytes held over from a run that overflowed the previous call
        while self.pending > 0 && index < out.len() {
            out[index] = dictionary.recent(self.pending);
            self.pending -= 1;
            index += 1;
        }

        while index < out.len() && !self.done {
            if input.bit_count() < self.max_bits_per_iter {
                input.top_up();
            }

            let run;
            let dist;
            if input.bit_count() >= self.max_bits_per_iter {
                // Fast path served entirely from the bit buffer
                let sym = decode_symbol_buffered(input, &self.litlen_table, &self.litlen_tree);
                if sym < 256 {
                    out[index] = sym as u8;
                    index += 1;
                    dictionary.push(sym as u8);
                    continue;
                } else if sym == 256 {
                    self.done = true;
                    break;
                }
                run = {
                    let entry = *RUN_LENGTH_TABLE.get(sym as usize - 257).ok_or_else(|| {
                        reserved_length_symbol(sym)
                    })?;
                    let extra_bits = u32::from(entry & 0x7);
                    u32::from(entry >> 3) + take_buffered_bits(input, extra_bits)
                };

                let (dist_table, dist_tree) = match (&self.dist_table, &self.dist_tree) {
                    (Some(table), Some(tree)) => (table, tree),
                    _ => return Err(empty_distance_code()),
                };
                let dist_sym = decode_symbol_buffered(input, dist_table, dist_tree);
                dist = {
                    let entry = *DISTANCE_TABLE.get(dist_sym as usize).ok_or_else(|| {
                        reserved_distance_symbol(dist_sym)
                    })?;
                    let extra_bits = entry & 0xF;
                    (entry >> 4) + take_buffered_bits(input, extra_bits)
                };
            } else {
                // General path, correct even when the buffer runs dry
                let sym = decode_symbol(input, &self.litlen_tree)?;
                if sym < 256 {
                    out[index] = sym as u8;
                    index += 1;
                    dictionary.push(sym as u8);
                    continue;
                } else if sym == 256 {
                    self.done = true;
                    break;
                }
                run = decode_run_length(input, sym)?;
                let dist_tree = match &self.dist_tree {
                    Some(tree) => tree,
                    None => return Err(empty_distance_code()),
                };
                let dist_sym = decode_symbol(input, dist_tree)?;
                dist = decode_distance(input, dist_sym)?;
            }

            // Copy the back-reference through the dictionary, byte by byte
            // so that overlapping runs propagate
            debug_assert!((3..=258).contains(&run));
            debug_assert!((1..=32768).contains(&dist));
            if dist as usize > dictionary.len() {
                return Err(FerroflateError::format(
                    Reason::CopyFromBeforeDictionaryStart,
                    format!(
                        "distance {} exceeds the {} bytes decoded so far",
                        dist,
                        dictionary.len()
                    ),
                ));
            }
            let mut read_index = dictionary.cursor().wrapping_sub(dist as usize) & DICTIONARY_MASK;
            for _ in 0..run {
                let byte = dictionary.at(read_index);
                read_index = (read_index + 1) & DICTIONARY_MASK;
                dictionary.push(byte);
                if index < out.len() {
                    out[index] = byte;
                    index += 1;
                } else {
                    self.pending += 1;
                }
            }
        }

        Ok((index, self.done && self.pending == 0))
    }
}

fn reserved_length_symbol(sym: u32) -> FerroflateError {
    FerroflateError::format(
        Reason::ReservedLengthSymbol,
        format!("reserved run length symbol {}", sym),
    )
}

fn reserved_distance_symbol(sym: u32) -> FerroflateError {
    FerroflateError::format(
        Reason::ReservedDistanceSymbol,
        format!("reserved distance symbol {}", sym),
    )
}

fn empty_distance_code() -> FerroflateError {
    FerroflateError::format(
        Reason::LengthEncounteredWithEmptyDistanceCode,
        "length symbol encountered with empty distance code",
    )
}

/// Decode one symbol wholly from the bit buffer: one table probe, then a
/// per-bit tree descent if the probe stopped on an internal node. The
/// caller guarantees enough buffered bits.
#[inline]
fn decode_symbol_buffered<R: Read>(input: &mut BitReader<R>, table: &[i16], tree: &[i16]) -> u32 {
    let entry = table[input.bits() as usize & CODE_TABLE_MASK];
    input.consume(u32::from(entry as u16 & 0xF));
    let mut node = entry >> 4;
    while node >= 0 {
        node = tree[node as usize + (input.bits() as usize & 1)];
        input.consume(1);
    }
    u32::from(!node as u16)
}

/// Take `n` extra bits from the bit buffer; the caller guarantees they are
/// present.
#[inline]
fn take_buffered_bits<R: Read>(input: &mut BitReader<R>, n: u32) -> u32 {
    let value = (input.bits() & ((1u64 << n) - 1)) as u32;
    input.consume(n);
    value
}

/// Decode one symbol with per-bit tree descent, reading more input as
/// needed.
fn decode_symbol<R: Read>(input: &mut BitReader<R>, tree: &[i16]) -> Result<u32> {
    let mut node: i16 = 0;
    while node >= 0 {
        node = if input.bit_count() > 0 {
            let bit = input.bits() as usize & 1;
            input.consume(1);
            tree[node as usize + bit]
        } else {
            tree[node as usize + input.read_bits(1)? as usize]
        };
    }
    Ok(u32::from(!node as u16))
}

/// Expand a length symbol in `[257, 287]` to a run length in `[3, 258]`.
fn decode_run_length<R: Read>(input: &mut BitReader<R>, sym: u32) -> Result<u32> {
    debug_assert!((257..=287).contains(&sym));
    let entry = *RUN_LENGTH_TABLE
        .get(sym as usize - 257)
        .ok_or_else(|| reserved_length_symbol(sym))?;
    let extra_bits = u32::from(entry & 0x7);
    let extra = if extra_bits > 0 {
        input.read_bits(extra_bits)?
    } else {
        0
    };
    Ok(u32::from(entry >> 3) + extra)
}

/// Expand a distance symbol in `[0, 31]` to a distance in `[1, 32768]`.
fn decode_distance<R: Read>(input: &mut BitReader<R>, sym: u32) -> Result<u32> {
    debug_assert!(sym <= 31);
    let entry = *DISTANCE_TABLE
        .get(sym as usize)
        .ok_or_else(|| reserved_distance_symbol(sym))?;
    let extra_bits = entry & 0xF;
    let extra = if extra_bits > 0 {
        input.read_bits(extra_bits)?
    } else {
        0
    };
    Ok((entry >> 4) + extra)
}

/// Decompress a complete DEFLATE stream held in memory.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = InflaterReader::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = reader.read_decompressed(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack a string of '0'/'1' characters LSB-first into bytes, padding the
    /// final byte with zeros. Spaces are ignored.
    fn bits(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut byte = 0u8;
        let mut count = 0;
        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if c == '1' {
                byte |= 1 << count;
            }
            count += 1;
            if count == 8 {
                out.push(byte);
                byte = 0;
                count = 0;
            }
        }
        if count > 0 {
            out.push(byte);
        }
        out
    }

    fn reason_of(data: &[u8]) -> Reason {
        inflate(data).unwrap_err().reason().expect("format error")
    }

    #[test]
    fn test_stored_empty() {
        let data = bits("1 00 00000 0000000000000000 1111111111111111");
        assert_eq!(data, vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(inflate(&data).unwrap(), b"");
    }

    #[test]
    fn test_stored_three_bytes() {
        let data = bits("1 00 00000 1100000000000000 0011111111111111 10100000 00101000 11000100");
        assert_eq!(inflate(&data).unwrap(), [0x05, 0x14, 0x23]);
    }

    #[test]
    fn test_fixed_empty() {
        let data = bits("1 10 0000000");
        assert_eq!(inflate(&data).unwrap(), b"");
    }

    #[test]
    fn test_fixed_literals_and_match() {
        // Literals 00 01 02, then length 3 / distance 3, then end of block
        let data = bits("1 10 00110000 00110001 00110010 0000001 00010 0000000");
        assert_eq!(inflate(&data).unwrap(), [0x00, 0x01, 0x02, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_fixed_overlapping_run() {
        // Literal 01, then length 4 / distance 1
        let data = bits("1 10 00110001 0000010 00000 0000000");
        assert_eq!(inflate(&data).unwrap(), [0x01; 5]);
    }

    #[test]
    fn test_dynamic_empty() {
        // Code length code {sym 1: len 1, sym 18: len 1}; literal/length
        // code {sym 0: len 1, sym 256: len 1}; two distance codes of length
        // one; data is just the end-of-block symbol.
        let data = bits(
            "1 01 00000 10000 1111 \
             000 000 100 000 000 000 000 000 000 000 000 000 000 000 000 000 000 100 000 \
             0 11111111 10101011 0 0 0 1",
        );
        assert_eq!(inflate(&data).unwrap(), b"");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(reason_of(&[]), Reason::UnexpectedEndOfStream);
    }

    #[test]
    fn test_reserved_block_type() {
        assert_eq!(reason_of(&bits("1 11 00000")), Reason::ReservedBlockType);
    }

    #[test]
    fn test_stored_length_mismatch() {
        let data = bits("1 00 00000 0010000000010000 1111100100110101");
        assert_eq!(reason_of(&data), Reason::UncompressedBlockLengthMismatch);
    }

    #[test]
    fn test_stored_truncated_payload() {
        // LEN = 3 but only two payload bytes present
        let data = bits("1 00 00000 1100000000000000 0011111111111111 10100000 00101000");
        assert_eq!(reason_of(&data), Reason::UnexpectedEndOfStream);
    }

    #[test]
    fn test_reserved_length_symbol() {
        // Fixed-code symbol 286
        assert_eq!(reason_of(&bits("1 10 11000110")), Reason::ReservedLengthSymbol);
    }

    #[test]
    fn test_reserved_distance_symbol() {
        // Literal 00, length 3, then fixed distance symbol 30
        let data = bits("1 10 00110000 0000001 11110 0000000");
        assert_eq!(reason_of(&data), Reason::ReservedDistanceSymbol);
    }

    #[test]
    fn test_code_length_code_over_full() {
        // HCLEN=4 with code length code lengths {1, 1, 1, 0}
        let data = bits("1 01 00000 00000 0000 100 100 100 000");
        assert_eq!(reason_of(&data), Reason::HuffmanCodeOverFull);
    }

    #[test]
    fn test_code_length_code_under_full() {
        // HCLEN=4 with code length code lengths {0, 0, 1, 0}
        let data = bits("1 01 00000 00000 0000 000 000 100 000");
        assert_eq!(reason_of(&data), Reason::HuffmanCodeUnderFull);
    }

    #[test]
    fn test_copy_before_start() {
        // Literal 00, then length 3 / distance 2 with only one byte emitted
        let data = bits("1 10 00110000 0000001 00001 0000000");
        assert_eq!(reason_of(&data), Reason::CopyFromBeforeDictionaryStart);
    }

    #[test]
    fn test_trailing_garbage_bits_ignored() {
        // The final byte's padding may hold anything
        let mut data = bits("1 10 0000000");
        *data.last_mut().unwrap() |= 0b1111_1000;
        assert_eq!(inflate(&data).unwrap(), b"");
    }

    #[test]
    fn test_sticky_error_is_replayed() {
        let data = bits("1 11 00000");
        let mut reader = InflaterReader::new(&data[..]);
        let mut buf = [0u8; 8];
        let first = reader.read_decompressed(&mut buf).unwrap_err();
        assert_eq!(first.reason(), Some(Reason::ReservedBlockType));
        // Same failure again, without touching the source
        let second = reader.read_decompressed(&mut buf).unwrap_err();
        assert_eq!(second.reason(), Some(Reason::ReservedBlockType));
    }

    #[test]
    fn test_read_after_close() {
        let data = bits("1 10 0000000");
        let mut reader = InflaterReader::new(&data[..]);
        reader.close();
        reader.close(); // Idempotent
        let err = reader.read_decompressed(&mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, FerroflateError::InvalidState(_)));
    }

    #[test]
    fn test_two_blocks() {
        // A non-final stored block "ab", then a final fixed block with
        // literal 'c' (0x63 -> code 0x93)
        let data = bits(
            "0 00 00000 0100000000000000 1011111111111111 10000110 01000110 \
             1 10 10010011 0000000",
        );
        assert_eq!(inflate(&data).unwrap(), b"abc");
    }

    #[test]
    fn test_single_distance_code_block() {
        // Dynamic block whose distance alphabet has exactly one 1-length
        // code; decodes "aaaa" as literal 'a' + run of 3 at distance 1.
        let compressed = {
            use crate::comp::Strategy;
            use ferroflate_core::bitstream::BitWriter;

            let strategy = crate::comp::DynamicHuffmanRle;
            let data = b"aaaa";
            let decision = strategy.decide(data, 0, 0, data.len());
            let mut out = Vec::new();
            let mut writer = BitWriter::new(&mut out);
            decision.compress_to(&mut writer, true).unwrap();
            writer.finish().unwrap();
            out
        };
        assert_eq!(inflate(&compressed).unwrap(), b"aaaa");
    }
}
