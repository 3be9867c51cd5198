//! Best-of-N strategy selection.

use super::{BitSink, Decision, Strategy};
use ferroflate_core::error::{FerroflateError, Result};
use std::rc::Rc;

/// Evaluates several sub-strategies on the same window and emits whichever
/// one is cheapest at the writer's actual bit position.
pub struct MultiStrategy {
    strategies: Vec<Box<dyn Strategy>>,
}

impl MultiStrategy {
    /// Combine the given strategies. The list must be non-empty.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(FerroflateError::invalid_state("empty list of strategies"));
        }
        Ok(Self { strategies })
    }
}

impl Strategy for MultiStrategy {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let mut bit_lengths = [u64::MAX; 8];
        let mut chosen: [Option<Rc<dyn Decision + 'a>>; 8] = Default::default();
        for strategy in &self.strategies {
            let decision: Rc<dyn Decision + 'a> =
                Rc::from(strategy.decide(buf, off, history_len, data_len));
            let lengths = decision.bit_lengths();
            for (pos, &len) in lengths.iter().enumerate() {
                if len < bit_lengths[pos] {
                    bit_lengths[pos] = len;
                    chosen[pos] = Some(decision.clone());
                }
            }
        }
        let chosen: Vec<Rc<dyn Decision + 'a>> = chosen
            .into_iter()
            .map(|d| d.expect("at least one strategy produced a decision"))
            .collect();
        Box::new(MultiDecision {
            bit_lengths,
            chosen,
        })
    }
}

struct MultiDecision<'a> {
    bit_lengths: [u64; 8],
    /// The cheapest sub-decision per starting bit position.
    chosen: Vec<Rc<dyn Decision + 'a>>,
}

impl Decision for MultiDecision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        self.chosen[out.bit_position() as usize].compress_to(out, is_final)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::{StaticHuffman, StaticHuffmanRle, Uncompressed};
    use crate::inflate::inflate;
    use ferroflate_core::bitstream::BitWriter;

    fn multi() -> MultiStrategy {
        MultiStrategy::new(vec![
            Box::new(Uncompressed) as Box<dyn Strategy>,
            Box::new(StaticHuffman),
            Box::new(StaticHuffmanRle),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        assert!(MultiStrategy::new(Vec::new()).is_err());
    }

    #[test]
    fn test_picks_minimum_everywhere() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let strategy = multi();
        let combined = strategy.decide(data, 0, 0, data.len());
        let subs: Vec<_> = [
            Uncompressed.decide(data, 0, 0, data.len()),
            StaticHuffman.decide(data, 0, 0, data.len()),
            StaticHuffmanRle.decide(data, 0, 0, data.len()),
        ]
        .into_iter()
        .collect();
        for pos in 0..8 {
            let best = subs.iter().map(|d| d.bit_lengths()[pos]).min().unwrap();
            assert_eq!(combined.bit_lengths()[pos], best);
        }
    }

    #[test]
    fn test_roundtrip() {
        let strategy = multi();
        for data in [
            &b""[..],
            b"short",
            b"wwwwwwwwwwwwwwwwwwwwwwwwwwwww",
            &[0u8, 99, 200, 255, 255, 255, 255, 255, 3],
        ] {
            let decision = strategy.decide(data, 0, 0, data.len());
            let mut out = Vec::new();
            let mut writer = BitWriter::new(&mut out);
            decision.compress_to(&mut writer, true).unwrap();
            writer.finish().unwrap();
            assert_eq!(inflate(&out).unwrap(), data);
        }
    }
}
