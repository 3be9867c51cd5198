//! LZ77 matching with static or dynamic Huffman emission.

use super::dynamic_huffman::write_dynamic_code_header;
use super::{BitSink, CountingBitSink, Decision, Strategy};
use crate::huffman::{code_lengths_to_codes, package_merge};
use crate::tables::{
    distance_to_code, fixed_distance_codes, fixed_litlen_codes, length_to_code, MAX_DISTANCE,
    MAX_RUN_LENGTH, MIN_DISTANCE, MIN_RUN_LENGTH,
};
use ferroflate_core::error::{FerroflateError, Result};

/// Greedy LZ77 strategy.
///
/// At each position every candidate distance from `search_min_dist` up to
/// `search_max_dist` (bounded by the bytes available, including history) is
/// scanned and the longest match wins, ties broken by the smallest
/// distance. Matches shorter than `search_min_run` are emitted as
/// literals. The block is written with either the fixed codes or
/// package-merge dynamic codes.
#[derive(Debug, Clone, Copy)]
pub struct Lz77Huffman {
    use_dynamic_codes: bool,
    search_min_run: usize,
    search_max_run: usize,
    search_min_dist: usize,
    search_max_dist: usize,
}

impl Lz77Huffman {
    /// Create an LZ77 strategy.
    ///
    /// Run bounds must satisfy `3 <= min_run <= max_run <= 258` and
    /// distance bounds `1 <= min_dist <= max_dist <= 32768`; anything else
    /// is reported as [`FerroflateError::InvalidState`].
    pub fn new(
        use_dynamic_codes: bool,
        search_min_run: usize,
        search_max_run: usize,
        search_min_dist: usize,
        search_max_dist: usize,
    ) -> Result<Self> {
        let runs_valid = MIN_RUN_LENGTH <= search_min_run
            && search_min_run <= search_max_run
            && search_max_run <= MAX_RUN_LENGTH;
        let dists_valid = MIN_DISTANCE <= search_min_dist
            && search_min_dist <= search_max_dist
            && search_max_dist <= MAX_DISTANCE;
        if !runs_valid || !dists_valid {
            return Err(FerroflateError::invalid_state(
                "invalid minimum/maximum run length or distance",
            ));
        }
        Ok(Self {
            use_dynamic_codes,
            search_min_run,
            search_max_run,
            search_min_dist,
            search_max_dist,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Literal(u8),
    Match { run: usize, dist: usize },
}

impl Lz77Huffman {
    /// Greedy scan of the data region, producing tokens and the symbol
    /// histograms of their encoding.
    fn tokenize(
        &self,
        buf: &[u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> (Vec<Token>, [u64; 286], [u64; 30]) {
        let mut tokens = Vec::new();
        let mut litlen_histogram = [0u64; 286];
        let mut dist_histogram = [0u64; 30];

        let mut index = off + history_len;
        let end = index + data_len;
        while index < end {
            let mut best_run = 0;
            let mut best_dist = 0;
            let dist_end = self.search_max_dist.min(index - off);
            for dist in self.search_min_dist..=dist_end {
                if best_run >= self.search_max_run {
                    break;
                }
                let mut run = 0;
                let mut history_index = index - dist;
                while run < self.search_max_run
                    && index + run < end
                    && buf[index + run] == buf[history_index]
                {
                    run += 1;
                    history_index += 1;
                    if history_index == index {
                        // Overlapping match: wrap back into the source run
                        history_index -= dist;
                    }
                }
                if run > best_run {
                    best_run = run;
                    best_dist = dist;
                }
            }

            if best_run < self.search_min_run {
                let byte = buf[index];
                tokens.push(Token::Literal(byte));
                litlen_histogram[usize::from(byte)] += 1;
                index += 1;
            } else {
                tokens.push(Token::Match {
                    run: best_run,
                    dist: best_dist,
                });
                litlen_histogram[length_to_code(best_run).0] += 1;
                dist_histogram[distance_to_code(best_dist).0] += 1;
                index += best_run;
            }
        }

        (tokens, litlen_histogram, dist_histogram)
    }

    fn emit(
        &self,
        buf: &[u8],
        off: usize,
        history_len: usize,
        data_len: usize,
        out: &mut dyn BitSink,
        is_final: bool,
    ) -> Result<()> {
        let (tokens, mut litlen_histogram, mut dist_histogram) =
            self.tokenize(buf, off, history_len, data_len);
        litlen_histogram[256] += 1;
        if data_len == 0 {
            litlen_histogram[0] += 1; // Dummy value so the tree is complete
        }

        out.write_bits(u32::from(is_final), 1)?;
        out.write_bits(if self.use_dynamic_codes { 2 } else { 1 }, 2)?;

        let owned_codes; // Keeps dynamic code tables alive for the emission loop
        let (litlen_codes, dist_codes): (&[(u32, u32)], Option<&[(u32, u32)]>) =
            if !self.use_dynamic_codes {
                (fixed_litlen_codes(), Some(fixed_distance_codes()))
            } else {
                let mut litlen_end = litlen_histogram.len();
                while litlen_end > 257 && litlen_histogram[litlen_end - 1] == 0 {
                    litlen_end -= 1;
                }
                let litlen_lens = package_merge(&litlen_histogram[..litlen_end], 15);

                // A lone distance code cannot form a full tree; give its
                // neighbor a dummy frequency
                let used = dist_histogram.iter().filter(|&&f| f > 0).count();
                if used == 1 {
                    if let Some(i) = dist_histogram.iter().position(|&f| f > 0) {
                        if i + 1 < dist_histogram.len() {
                            dist_histogram[i + 1] = 1;
                        } else {
                            dist_histogram[i - 1] = 1;
                        }
                    }
                }
                let mut dist_end = dist_histogram.len();
                while dist_end > 1 && dist_histogram[dist_end - 1] == 0 {
                    dist_end -= 1;
                }
                let dist_lens = if dist_end == 1 && dist_histogram[0] == 0 {
                    vec![0u8]
                } else {
                    package_merge(&dist_histogram[..dist_end], 15)
                };

                write_dynamic_code_header(out, &litlen_lens, &dist_lens)?;

                let litlen = code_lengths_to_codes(&litlen_lens, 15)?;
                let dist = if dist_lens == [0] {
                    None
                } else {
                    Some(code_lengths_to_codes(&dist_lens, 15)?)
                };
                owned_codes = (litlen, dist);
                (&owned_codes.0, owned_codes.1.as_deref())
            };

        for &token in &tokens {
            match token {
                Token::Literal(byte) => {
                    let (code, len) = litlen_codes[usize::from(byte)];
                    out.write_bits(code, len)?;
                }
                Token::Match { run, dist } => {
                    let (sym, extra_bits, extra) = length_to_code(run);
                    let (code, len) = litlen_codes[sym];
                    out.write_bits(code, len)?;
                    if extra_bits > 0 {
                        out.write_bits(extra, extra_bits)?;
                    }

                    let dist_codes = dist_codes
                        .expect("matches were tokenized, so a distance code exists");
                    let (dist_sym, dist_extra_bits, dist_extra) = distance_to_code(dist);
                    let (code, len) = dist_codes[dist_sym];
                    out.write_bits(code, len)?;
                    if dist_extra_bits > 0 {
                        out.write_bits(dist_extra, dist_extra_bits)?;
                    }
                }
            }
        }

        let (code, len) = litlen_codes[256];
        out.write_bits(code, len)?;
        Ok(())
    }
}

impl Strategy for Lz77Huffman {
    fn decide<'a>(
        &self,
        buf: &'a [u8],
        off: usize,
        history_len: usize,
        data_len: usize,
    ) -> Box<dyn Decision + 'a> {
        let mut counter = CountingBitSink::new();
        self.emit(buf, off, history_len, data_len, &mut counter, false)
            .expect("counting emission cannot fail");
        Box::new(Lz77Decision {
            strategy: *self,
            buf,
            off,
            history_len,
            data_len,
            bit_lengths: [counter.bit_length(); 8],
        })
    }
}

struct Lz77Decision<'a> {
    strategy: Lz77Huffman,
    buf: &'a [u8],
    off: usize,
    history_len: usize,
    data_len: usize,
    bit_lengths: [u64; 8],
}

impl Decision for Lz77Decision<'_> {
    fn bit_lengths(&self) -> [u64; 8] {
        self.bit_lengths
    }

    fn compress_to(&self, out: &mut dyn BitSink, is_final: bool) -> Result<()> {
        self.strategy.emit(
            self.buf,
            self.off,
            self.history_len,
            self.data_len,
            out,
            is_final,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;
    use ferroflate_core::bitstream::BitWriter;

    fn emit(strategy: Lz77Huffman, buf: &[u8], history_len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        let decision = strategy.decide(buf, 0, history_len, buf.len() - history_len);
        decision.compress_to(&mut writer, true).unwrap();
        writer.finish().unwrap();
        out
    }

    fn fixed() -> Lz77Huffman {
        Lz77Huffman::new(false, 3, 258, 1, 1024).unwrap()
    }

    fn dynamic() -> Lz77Huffman {
        Lz77Huffman::new(true, 3, 258, 1, 1024).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(Lz77Huffman::new(false, 2, 258, 1, 1024).is_err());
        assert!(Lz77Huffman::new(false, 3, 259, 1, 1024).is_err());
        assert!(Lz77Huffman::new(false, 3, 258, 0, 1024).is_err());
        assert!(Lz77Huffman::new(false, 3, 258, 1, 40000).is_err());
        assert!(Lz77Huffman::new(false, 10, 3, 1, 1024).is_err());
    }

    #[test]
    fn test_tokenize_finds_longest_match() {
        let strategy = fixed();
        let (tokens, _, _) = strategy.tokenize(b"abcabcabcabc", 0, 0, 12);
        // Three literals, then one long overlapping match at distance 3
        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[3], Token::Match { run: 9, dist: 3 }));
    }

    #[test]
    fn test_tokenize_prefers_smaller_distance() {
        let strategy = fixed();
        // "xyxyxy": at index 2, distance 2 matches as long as anything
        let (tokens, _, _) = strategy.tokenize(b"xyxyxy", 0, 0, 6);
        assert!(matches!(tokens[2], Token::Match { run: 4, dist: 2 }));
    }

    #[test]
    fn test_roundtrip() {
        let samples: Vec<Vec<u8>> = vec![
            b"".to_vec(),
            b"a".to_vec(),
            b"to be or not to be, that is the question".to_vec(),
            b"abcabcabcabcabcabcabcabc".to_vec(),
            vec![0u8; 4000],
            (0..=255u8).cycle().take(3000).collect(),
        ];
        for data in &samples {
            for strategy in [fixed(), dynamic()] {
                let out = emit(strategy, data, 0);
                assert_eq!(&inflate(&out).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_matches_reach_into_history() {
        // The data region repeats a phrase that only exists in history
        let mut buf = b"some history bytes|".to_vec();
        let history_len = buf.len();
        buf.extend_from_slice(b"some history");
        let out = emit(dynamic(), &buf, history_len);

        // Decode against the same history by priming with a stored block
        let mut stream = Vec::new();
        let mut writer = BitWriter::new(&mut stream);
        let prime = crate::comp::Uncompressed.decide(&buf, 0, 0, history_len);
        prime.compress_to(&mut writer, false).unwrap();
        writer.finish().unwrap();
        stream.extend_from_slice(&out);

        assert_eq!(inflate(&stream).unwrap(), buf);
    }

    #[test]
    fn test_max_distance_match() {
        // A match at the full 32 KiB distance with the maximum run length
        let strategy = Lz77Huffman::new(true, 3, 258, 1, 32 * 1024).unwrap();
        let mut data = vec![0x55u8; 300];
        data.extend(vec![0x00u8; 32 * 1024 - 300]);
        data.extend(vec![0x55u8; 258]);
        let out = emit(strategy, &data, 0);
        assert_eq!(inflate(&out).unwrap(), data);
    }

    #[test]
    fn test_estimate_matches_emission() {
        let data = b"she sells sea shells by the sea shore";
        for strategy in [fixed(), dynamic()] {
            let decision = strategy.decide(data, 0, 0, data.len());
            let mut sink = CountingBitSink::new();
            decision.compress_to(&mut sink, false).unwrap();
            assert_eq!(decision.bit_lengths()[0], sink.bit_length());
        }
    }
}
