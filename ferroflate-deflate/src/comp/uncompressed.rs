//! Stored (uncompressed) block emission.

use super::{BitSink, Decision, Strategy};
use ferroflate_core::error::Result;

/// Largest payload of one stored block.
const MAX_BLOCK_LEN: usize = (1 << 16) - 1;

/// Encodes the data as one or more stored blocks.
///
/// Expands the data slightly (35 header bits plus up to 5 padding bits per
/// block) but is the only encoding that never loses to incompressible
/// input. The cost depends on the writer's bit position, because each block
/// pads to a byte boundary before its length fields.
#[derive(Debug, Clone, Copy)]
pub struct Uncompressed;

impl Strategy for Uncompressed {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let mut bit_lengths = [0u64; 8];
        for (pos, slot) in bit_lengths.iter_mut().enumerate() {
            *slot = stored_cost(pos as u32, data_len);
        }
        Box::new(UncompressedDecision {
            data: &buf[off + history_len..off + history_len + data_len],
            bit_lengths,
        })
    }
}

/// Exact bit cost of emitting `data_len` bytes as stored blocks starting at
/// bit position `start`.
fn stored_cost(start: u32, data_len: usize) -> u64 {
    let mut bits = 0u64;
    let mut pos = u64::from(start);
    let mut remaining = data_len;
    loop {
        let n = remaining.min(MAX_BLOCK_LEN);
        bits += 3;
        pos = (pos + 3) % 8;
        bits += (8 - pos) % 8; // Padding to the byte boundary
        bits += 32 + 8 * n as u64;
        pos = 0;
        remaining -= n;
        if remaining == 0 {
            return bits;
        }
    }
}

struct UncompressedDecision<'a> {
    data: &'a [u8],
    bit_lengths: [u64; 8],
}

impl Decision for UncompressedDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        let mut index = 0;
        loop {
            let n = (self.data.len() - index).min(MAX_BLOCK_LEN);
            let last = index + n == self.data.len();
            out.write_bits(u32::from(is_final && last), 1)?;
            out.write_bits(0, 2)?;
            out.write_bits(0, (8 - out.bit_position()) % 8)?;
            out.write_bits(n as u32, 16)?;
            out.write_bits(n as u32 ^ 0xFFFF, 16)?;
            for &byte in &self.data[index..index + n] {
                out.write_bits(u32::from(byte), 8)?;
            }
            index += n;
            if last {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::CountingBitSink;
    use crate::inflate::inflate;
    use ferroflate_core::bitstream::BitWriter;

    fn emit(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        let decision = Uncompressed.decide(data, 0, 0, data.len());
        decision.compress_to(&mut writer, true).unwrap();
        writer.finish().unwrap();
        out
    }

    #[test]
    fn test_roundtrip() {
        for data in [&b""[..], b"a", b"Hello, World!"] {
            assert_eq!(inflate(&emit(data)).unwrap(), data);
        }
    }

    #[test]
    fn test_empty_data_still_emits_a_block() {
        assert_eq!(emit(b""), vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_splits_large_data() {
        let data = vec![0xAB; MAX_BLOCK_LEN + 10];
        let out = emit(&data);
        assert_eq!(inflate(&out).unwrap(), data);
        // Two block headers: 5 bytes of framing each when byte-aligned
        assert_eq!(out.len(), data.len() + 10);
    }

    #[test]
    fn test_bit_lengths_match_emission() {
        let data = b"some stored bytes";
        let decision = Uncompressed.decide(data, 0, 0, data.len());
        let lengths = decision.bit_lengths();
        for start in 0..8u32 {
            let mut sink = CountingBitSink::starting_at(start);
            decision.compress_to(&mut sink, true).unwrap();
            assert_eq!(lengths[start as usize], sink.bit_length(), "start {}", start);
        }
    }

    #[test]
    fn test_cost_varies_with_alignment() {
        let decision = Uncompressed.decide(b"xyz", 0, 0, 3);
        let lengths = decision.bit_lengths();
        // Aligned start: 3 header bits + 5 pad; position 5: no pad at all
        assert_eq!(lengths[0], 3 + 5 + 32 + 24);
        assert_eq!(lengths[5], 3 + 0 + 32 + 24);
    }
}
