//! Block emission with the fixed Huffman code.

use super::{scan_rle, BitSink, Decision, RleOp, Strategy};
use crate::tables::{fixed_distance_codes, fixed_litlen_codes, length_to_code};
use ferroflate_core::error::Result;

/// Encodes every byte as a literal under the fixed literal/length code.
///
/// Header cost is just the three block-header bits, so this wins for short
/// mostly-ASCII data where a dynamic code table would not pay for itself.
#[derive(Debug, Clone, Copy)]
pub struct StaticHuffman;

impl Strategy for StaticHuffman {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let data = &buf[off + history_len..off + history_len + data_len];
        let mut bits = 1 + 2u64;
        for &byte in data {
            bits += if byte < 144 { 8 } else { 9 };
        }
        bits += 7; // End of block
        Box::new(StaticDecision {
            data,
            bit_lengths: [bits; 8],
        })
    }
}

struct StaticDecision<'a> {
    data: &'a [u8],
    bit_lengths: [u64; 8],
}

impl Decision for StaticDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        out.write_bits(u32::from(is_final), 1)?;
        out.write_bits(1, 2)?;
        let codes = fixed_litlen_codes();
        for &byte in self.data {
            let (code, len) = codes[usize::from(byte)];
            out.write_bits(code, len)?;
        }
        let (code, len) = codes[256];
        out.write_bits(code, len)?;
        Ok(())
    }
}

/// Fixed-code encoding with distance-1 run-length matches.
///
/// Repeats of the preceding byte (minimum run 3, maximum 258) become
/// length/distance pairs under the fixed codes; everything else is a
/// literal. Catches the common "byte rows" patterns without a match
/// searcher.
#[derive(Debug, Clone, Copy)]
pub struct StaticHuffmanRle;

impl Strategy for StaticHuffmanRle {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let mut bits = 1 + 2u64;
        scan_rle(buf, off, history_len, data_len, |op| match op {
            RleOp::Literal(byte) => bits += if byte < 144 { 8 } else { 9 },
            RleOp::Run(run) => {
                let (sym, extra_bits, _) = length_to_code(run);
                bits += if sym < 280 { 7 } else { 8 };
                bits += u64::from(extra_bits);
                bits += 5; // Distance code
            }
        });
        bits += 7; // End of block
        Box::new(StaticRleDecision {
            buf,
            off,
            history_len,
            data_len,
            bit_lengths: [bits; 8],
        })
    }
}

struct StaticRleDecision<'a> {
    buf: &'a [u8],
    off: usize,
    history_len: usize,
    data_len: usize,
    bit_lengths: [u64; 8],
}

impl Decision for StaticRleDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        out.write_bits(u32::from(is_final), 1)?;
        out.write_bits(1, 2)?;
        let codes = fixed_litlen_codes();
        let dist_codes = fixed_distance_codes();
        let mut ops = Vec::new();
        scan_rle(self.buf, self.off, self.history_len, self.data_len, |op| {
            ops.push(op)
        });
        for op in ops {
            match op {
                RleOp::Literal(byte) => {
                    let (code, len) = codes[usize::from(byte)];
                    out.write_bits(code, len)?;
                }
                RleOp::Run(run) => {
                    let (sym, extra_bits, extra) = length_to_code(run);
                    let (code, len) = codes[sym];
                    out.write_bits(code, len)?;
                    if extra_bits > 0 {
                        out.write_bits(extra, extra_bits)?;
                    }
                    let (dist_code, dist_len) = dist_codes[0]; // Distance 1
                    out.write_bits(dist_code, dist_len)?;
                }
            }
        }
        let (code, len) = codes[256];
        out.write_bits(code, len)?;
        Ok(())
    }
}
