//! Block emission with dynamic Huffman codes.
//!
//! Shared here is the dynamic block header: the combined literal/length and
//! distance code-length vector is run-length encoded with symbols 16/17/18
//! by a greedy scan, the code-length code itself is built with
//! package-merge (7-bit limit), and the whole header is emitted in the
//! RFC 1951 permutation order.

use super::{scan_rle, BitSink, CountingBitSink, Decision, RleOp, Strategy};
use crate::huffman::{code_lengths_to_codes, package_merge};
use crate::tables::{length_to_code, CODE_LENGTH_CODE_ORDER};
use ferroflate_core::error::Result;

/// Greedy run-length encoding of a code-length vector with the code-length
/// alphabet: `(symbol, extra_value)` pairs where symbols 16/17/18 carry
/// 2/3/7 extra bits.
fn rle_code_lengths(code_lens: &[u8]) -> Vec<(u8, u32)> {
    let mut symbols = Vec::new();
    let mut i = 0;
    while i < code_lens.len() {
        let val = code_lens[i];
        if val == 0 {
            let mut run = 1;
            while run < 138 && i + run < code_lens.len() && code_lens[i + run] == 0 {
                run += 1;
            }
            if run < 3 {
                symbols.push((0, 0));
                i += 1;
            } else if run < 11 {
                symbols.push((17, run as u32 - 3));
                i += run;
            } else {
                symbols.push((18, run as u32 - 11));
                i += run;
            }
            continue;
        }
        if i > 0 {
            let prev = code_lens[i - 1];
            let mut run = 0;
            while run < 6 && i + run < code_lens.len() && code_lens[i + run] == prev {
                run += 1;
            }
            if run >= 3 {
                symbols.push((16, run as u32 - 3));
                i += run;
                continue;
            }
        }
        symbols.push((val, 0));
        i += 1;
    }
    symbols
}

/// Number of extra bits carried by a code-length alphabet symbol.
fn code_length_extra_bits(sym: u8) -> u32 {
    match sym {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Emit HLIT/HDIST/HCLEN, the code-length code lengths in permutation
/// order, and the run-length-encoded main code lengths.
///
/// `litlen_lens.len()` must be in `[257, 288]` and `dist_lens.len()` in
/// `[1, 32]`.
pub(crate) fn write_dynamic_code_header(
    out: &mut dyn BitSink,
    litlen_lens: &[u8],
    dist_lens: &[u8],
) -> Result<()> {
    debug_assert!((257..=288).contains(&litlen_lens.len()));
    debug_assert!((1..=32).contains(&dist_lens.len()));

    let mut combined = Vec::with_capacity(litlen_lens.len() + dist_lens.len());
    combined.extend_from_slice(litlen_lens);
    combined.extend_from_slice(dist_lens);
    let symbols = rle_code_lengths(&combined);

    let mut histogram = [0u64; 19];
    for &(sym, _) in &symbols {
        histogram[usize::from(sym)] += 1;
    }
    // A one-symbol code cannot form a full tree; give it a dummy partner
    if histogram.iter().filter(|&&f| f > 0).count() == 1 {
        if let Some(i) = histogram.iter().position(|&f| f > 0) {
            histogram[(i + 1) % histogram.len()] = 1;
        }
    }
    let code_len_lens = package_merge(&histogram, 7);

    let reordered: Vec<u8> = CODE_LENGTH_CODE_ORDER
        .iter()
        .map(|&position| code_len_lens[position])
        .collect();
    let mut num_code_len_lens = reordered.len();
    while num_code_len_lens > 4 && reordered[num_code_len_lens - 1] == 0 {
        num_code_len_lens -= 1;
    }

    out.write_bits(litlen_lens.len() as u32 - 257, 5)?; // hlit
    out.write_bits(dist_lens.len() as u32 - 1, 5)?; // hdist
    out.write_bits(num_code_len_lens as u32 - 4, 4)?; // hclen

    for &len in reordered.iter().take(num_code_len_lens) {
        out.write_bits(u32::from(len), 3)?;
    }

    let code_len_codes = code_lengths_to_codes(&code_len_lens, 7)?;
    for &(sym, extra) in &symbols {
        let (code, len) = code_len_codes[usize::from(sym)];
        out.write_bits(code, len)?;
        let extra_bits = code_length_extra_bits(sym);
        if extra_bits > 0 {
            out.write_bits(extra, extra_bits)?;
        }
    }
    Ok(())
}

/// Literal-only dynamic Huffman encoding.
///
/// Builds one package-merge code over the byte values that actually occur
/// (plus end-of-block) and declares an empty distance code. No matching at
/// all, so it shines on data whose byte distribution is skewed but
/// non-repetitive.
#[derive(Debug, Clone, Copy)]
pub struct DynamicHuffmanLiteral;

fn emit_literal(data: &[u8], out: &mut dyn BitSink, is_final: bool) -> Result<()> {
    let mut histogram = [0u64; 257];
    for &byte in data {
        histogram[usize::from(byte)] += 1;
    }
    histogram[256] += 1;
    if data.is_empty() {
        histogram[0] += 1; // Dummy value so the tree is complete
    }
    let litlen_lens = package_merge(&histogram, 15);

    out.write_bits(u32::from(is_final), 1)?;
    out.write_bits(2, 2)?;
    write_dynamic_code_header(out, &litlen_lens, &[0])?;

    let codes = code_lengths_to_codes(&litlen_lens, 15)?;
    for &byte in data {
        let (code, len) = codes[usize::from(byte)];
        out.write_bits(code, len)?;
    }
    let (code, len) = codes[256];
    out.write_bits(code, len)?;
    Ok(())
}

impl Strategy for DynamicHuffmanLiteral {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let data = &buf[off + history_len..off + history_len + data_len];
        let mut counter = CountingBitSink::new();
        emit_literal(data, &mut counter, false).expect("counting emission cannot fail");
        Box::new(DynamicLiteralDecision {
            data,
            bit_lengths: [counter.bit_length(); 8],
        })
    }
}

struct DynamicLiteralDecision<'a> {
    data: &'a [u8],
    bit_lengths: [u64; 8],
}

impl Decision for DynamicLiteralDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        emit_literal(self.data, out, is_final)
    }
}

/// Dynamic Huffman encoding with distance-1 run-length matches.
///
/// Like [`DynamicHuffmanLiteral`] but repeats of the preceding byte become
/// length symbols with a single one-bit distance code.
#[derive(Debug, Clone, Copy)]
pub struct DynamicHuffmanRle;

fn emit_rle(
    buf: &[u8],
    off: usize,
    history_len: usize,
    data_len: usize,
    out: &mut dyn BitSink,
    is_final: bool,
) -> Result<()> {
    let mut ops = Vec::new();
    scan_rle(buf, off, history_len, data_len, |op| ops.push(op));

    let mut histogram = [0u64; 286];
    let mut any_run = false;
    for &op in &ops {
        match op {
            RleOp::Literal(byte) => histogram[usize::from(byte)] += 1,
            RleOp::Run(run) => {
                histogram[length_to_code(run).0] += 1;
                any_run = true;
            }
        }
    }
    histogram[256] += 1;
    if data_len == 0 {
        histogram[0] += 1; // Dummy value so the tree is complete
    }
    let litlen_lens = package_merge(&histogram, 15);
    let dist_lens = [u8::from(any_run)];

    out.write_bits(u32::from(is_final), 1)?;
    out.write_bits(2, 2)?;
    write_dynamic_code_header(out, &litlen_lens, &dist_lens)?;

    let codes = code_lengths_to_codes(&litlen_lens, 15)?;
    for &op in &ops {
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
                out.write_bits(0, 1)?; // The lone distance code, one bit
            }
        }
    }
    let (code, len) = codes[256];
    out.write_bits(code, len)?;
    Ok(())
}

impl Strategy for DynamicHuffmanRle {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let mut counter = CountingBitSink::new();
        emit_rle(buf, off, history_len, data_len, &mut counter, false)
            .expect("counting emission cannot fail");
        Box::new(DynamicRleDecision {
            buf,
            off,
            history_len,
            data_len,
            bit_lengths: [counter.bit_length(); 8],
        })
    }
}

struct DynamicRleDecision<'a> {
    buf: &'a [u8],
    off: usize,
    history_len: usize,
    data_len: usize,
    bit_lengths: [u64; 8],
}

impl Decision for DynamicRleDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        emit_rle(
            self.buf,
            self.off,
            self.history_len,
            self.data_len,
            out,
            is_final,
        )
    }
}
