//! Recursive binary block splitting.

use super::{BitSink, Decision, Strategy};
use ferroflate_core::error::{FerroflateError, Result};
use std::rc::Rc;

/// Recursively splits the data in half whenever encoding the halves as
/// separate blocks costs fewer bits than one block, at any starting
/// alignment. A minimum block length bounds the recursion.
///
/// Sub-decisions are cached in the returned decision, so the winning tree
/// is evaluated once and emitted in a single pass.
pub struct BinarySplit {
    substrategy: Box<dyn Strategy>,
    minimum_block_length: usize,
}

impl BinarySplit {
    /// Split with the given sub-strategy; `minimum_block_length` must be
    /// positive.
    pub fn new(substrategy: Box<dyn Strategy>, minimum_block_length: usize) -> Result<Self> {
        if minimum_block_length == 0 {
            return Err(FerroflateError::invalid_state(
                "non-positive minimum block length",
            ));
        }
        Ok(Self {
            substrategy,
            minimum_block_length,
        })
    }

    fn decide_rec<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
        current: Rc<dyn Decision + 'a>,
    ) -> Box<dyn Decision + 'a> {
        let mut bit_lengths = current.bit_lengths();
        let mut choices: [Vec<Rc<dyn Decision + 'a>>; 8] =
            std::array::from_fn(|_| vec![current.clone()]);

        let first_len = (data_len + 1) / 2;
        let second_len = data_len - first_len;
        if first_len.min(second_len) > self.minimum_block_length {
            let mut halves: Vec<Rc<dyn Decision + 'a>> = vec![
                Rc::from(self.substrategy.decide(buf, off, history_len, first_len)),
                Rc::from(
                    self.substrategy
                        .decide(buf, off, history_len + first_len, second_len),
                ),
            ];

            let improved = (0..8).any(|pos| sequential_cost(&halves, pos) < bit_lengths[pos]);
            if improved {
                // Worth splitting at least somewhere; try splitting deeper
                halves = vec![
                    Rc::from(self.decide_rec(
                        buf,
                        off,
                        history_len,
                        first_len,
                        halves[0].clone(),
                    )),
                    Rc::from(self.decide_rec(
                        buf,
                        off,
                        history_len + first_len,
                        second_len,
                        halves[1].clone(),
                    )),
                ];
            }
            for pos in 0..8 {
                let cost = sequential_cost(&halves, pos);
                if cost < bit_lengths[pos] {
                    bit_lengths[pos] = cost;
                    choices[pos] = halves.clone();
                }
            }
        }

        Box::new(SplitDecision {
            bit_lengths,
            choices,
        })
    }
}

/// Bits to emit the given decisions back to back, starting at bit position
/// `start`; each one is charged at the alignment the previous ones leave
/// behind.
fn sequential_cost(decisions: &[Rc<dyn Decision + '_>], start: usize) -> u64 {
    let mut bits = 0u64;
    for decision in decisions {
        bits += decision.bit_lengths()[((start as u64 + bits) % 8) as usize];
    }
    bits
}

impl Strategy for BinarySplit {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let whole = Rc::from(self.substrategy.decide(buf, off, history_len, data_len));
        self.decide_rec(buf, off, history_len, data_len, whole)
    }
}

struct SplitDecision<'a> {
    bit_lengths: [u64; 8],
    /// Per starting bit position: the block sequence to emit.
    choices: [Vec<Rc<dyn Decision + 'a>>; 8],
}

impl Decision for SplitDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        let decisions = &self.choices[out.bit_position() as usize];
        for (i, decision) in decisions.iter().enumerate() {
            decision.compress_to(out, is_final && i == decisions.len() - 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::{
        CountingBitSink, DynamicHuffmanLiteral, MultiStrategy, StaticHuffman, Uncompressed,
    };
    use crate::inflate::inflate;
    use ferroflate_core::bitstream::BitWriter;

    fn split_of(sub: Box<dyn Strategy>, min_len: usize) -> BinarySplit {
        BinarySplit::new(sub, min_len).unwrap()
    }

    #[test]
    fn test_rejects_zero_floor() {
        assert!(BinarySplit::new(Box::new(StaticHuffman), 0).is_err());
    }

    #[test]
    fn test_split_beats_single_block_on_mixed_data() {
        // First half favors a literal code, second half is pure run; one
        // dynamic block over both does worse than two specialized ones.
        let mut data = Vec::new();
        data.extend((0..=255u8).cycle().take(4096));
        data.extend(std::iter::repeat(7u8).take(4096));

        let single = DynamicHuffmanLiteral.decide(&data, 0, 0, data.len());
        let split = split_of(Box::new(DynamicHuffmanLiteral), 64).decide(&data, 0, 0, data.len());
        assert!(split.bit_lengths()[0] < single.bit_lengths()[0]);
    }

    #[test]
    fn test_never_worse_than_whole() {
        let data = b"plain ascii text without much structure";
        let whole = StaticHuffman.decide(data, 0, 0, data.len());
        let split = split_of(Box::new(StaticHuffman), 4).decide(data, 0, 0, data.len());
        for pos in 0..8 {
            assert!(split.bit_lengths()[pos] <= whole.bit_lengths()[pos]);
        }
    }

    #[test]
    fn test_bit_lengths_match_emission() {
        let mut data = vec![b'x'; 600];
        data.extend(b"abcdefghijklmnopqrstuvwxyz".iter().cycle().take(600));
        let sub = MultiStrategy::new(vec![
            Box::new(Uncompressed) as Box<dyn Strategy>,
            Box::new(DynamicHuffmanLiteral),
        ])
        .unwrap();
        let decision = split_of(Box::new(sub), 32).decide(&data, 0, 0, data.len());
        for start in 0..8u32 {
            let mut sink = CountingBitSink::starting_at(start);
            decision.compress_to(&mut sink, true).unwrap();
            assert_eq!(
                decision.bit_lengths()[start as usize],
                sink.bit_length(),
                "start {}",
                start
            );
        }
    }

    #[test]
    fn test_roundtrip() {
        let mut data = vec![0u8; 2000];
        data.extend(b"The quick brown fox jumps over the lazy dog. ".repeat(40));
        let strategy = split_of(
            Box::new(MultiStrategy::new(vec![
                Box::new(Uncompressed) as Box<dyn Strategy>,
                Box::new(DynamicHuffmanLiteral),
            ])
            .unwrap()),
            128,
        );
        let decision = strategy.decide(&data, 0, 0, data.len());
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        decision.compress_to(&mut writer, true).unwrap();
        writer.finish().unwrap();
        assert_eq!(inflate(&out).unwrap(), data);
    }
}
