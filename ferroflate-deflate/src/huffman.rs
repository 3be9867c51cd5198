//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits Huffman codes as per-symbol code lengths; codes are
//! assigned canonically, by ascending length and, within a length, by
//! ascending symbol. This module provides both directions:
//!
//! - decoding: code lengths → a flat code tree ([`code_lengths_to_tree`])
//!   and a fast prefix lookup table derived from it ([`tree_to_table`]);
//! - encoding: code lengths → bit-reversed canonical codes
//!   ([`code_lengths_to_codes`]) and frequency histogram → optimal
//!   length-limited code lengths via package-merge ([`package_merge`]).
//!
//! # Code tree representation
//!
//! A code tree is a flat array of 16-bit integers where each adjacent pair at
//! an even index is one node: the earlier element is the left (0-bit) child,
//! the later the right (1-bit) child. A non-negative element is the array
//! index of a child node; a negative element is the bitwise complement of a
//! leaf symbol. The root is at index 0. For example the tree
//!
//! ```text
//!          /\
//!         0  1
//!        /    \
//!       /\    'c'
//!      0  1
//!     /    \
//!   'a'    'b'
//! ```
//!
//! is serialized as `[2, !'c', !'a', !'b']`. This sidesteps per-node heap
//! allocation and keeps the decode loop to an index chase.

use ferroflate_core::error::{FerroflateError, Reason, Result};
use std::rc::Rc;

/// Maximum code length used by the literal/length and distance alphabets.
pub const MAX_CODE_LENGTH: u32 = 15;

/// Number of index bits of the fast decode table built by [`tree_to_table`].
///
/// Any value from 1 to 15 decodes identically; 9 covers every fixed-code
/// symbol in one probe.
pub const CODE_TABLE_BITS: u32 = 9;

/// Bit mask matching [`CODE_TABLE_BITS`].
pub const CODE_TABLE_MASK: usize = (1 << CODE_TABLE_BITS) - 1;

/// Build a canonical code tree from per-symbol code lengths.
///
/// A length of zero means the symbol is absent. The lengths must form a full
/// tree: a code with fewer than two symbols, or whose Kraft sum falls short,
/// is rejected as [`Reason::HuffmanCodeUnderFull`]; one whose Kraft sum
/// overflows is rejected as [`Reason::HuffmanCodeOverFull`].
pub fn code_lengths_to_tree(code_lengths: &[u8]) -> Result<Vec<i16>> {
    debug_assert!(code_lengths.len() <= 1 << 11, "symbol does not fit in 11 bits");

    // Sort (length, symbol) pairs by packing both into one integer.
    let mut pairs: Vec<u16> = Vec::with_capacity(code_lengths.len());
    for (symbol, &len) in code_lengths.iter().enumerate() {
        debug_assert!(len as u32 <= MAX_CODE_LENGTH, "code length exceeds DEFLATE maximum");
        pairs.push(u16::from(len) << 11 | symbol as u16);
    }
    pairs.sort_unstable();

    let num_used = pairs.iter().filter(|&&p| p >> 11 != 0).count();
    if num_used < 2 {
        return Err(FerroflateError::format(
            Reason::HuffmanCodeUnderFull,
            "fewer than two symbols have codes",
        ));
    }

    let mut result = vec![0i16; (num_used - 1) * 2];
    let mut next = 0usize; // Next open slot awaiting a leaf or child pointer
    let mut end = 2usize; // Allocation frontier; the root pair is pre-opened
    let mut cur_len = 1u32;
    for &pair in pairs.iter().skip(code_lengths.len() - num_used) {
        let len = u32::from(pair >> 11);
        while cur_len < len {
            // Deepen every still-open slot at this depth by one level
            let frontier = end;
            while next < frontier {
                if end >= result.len() {
                    return Err(FerroflateError::format(
                        Reason::HuffmanCodeUnderFull,
                        "canonical code produces an under-full tree",
                    ));
                }
                result[next] = end as i16;
                next += 1;
                end += 2;
            }
            cur_len += 1;
        }
        if next >= end {
            return Err(FerroflateError::format(
                Reason::HuffmanCodeOverFull,
                "canonical code produces an over-full tree",
            ));
        }
        let symbol = pair & ((1 << 11) - 1);
        result[next] = !(symbol as i16);
        next += 1;
    }
    debug_assert!(end == result.len());
    if next < end {
        return Err(FerroflateError::format(
            Reason::HuffmanCodeUnderFull,
            "canonical code produces an under-full tree",
        ));
    }
    Ok(result)
}

/// Derive a fast prefix lookup table from a code tree.
///
/// Entry `i` records the result of descending from the root along the low
/// [`CODE_TABLE_BITS`] bits of `i`, packed as `node << 4 | bits_consumed`.
/// A negative `node` is the complement of a fully decoded symbol; a
/// non-negative one is the tree index to continue the descent from.
pub fn tree_to_table(tree: &[i16]) -> Vec<i16> {
    let mut result = vec![0i16; 1 << CODE_TABLE_BITS];
    for (i, entry) in result.iter_mut().enumerate() {
        let mut node: i16 = 0;
        let mut consumed = 0u32;
        loop {
            node = tree[node as usize + ((i >> consumed) & 1)];
            consumed += 1;
            if node < 0 || consumed >= CODE_TABLE_BITS {
                break;
            }
        }
        debug_assert!((-2048..=2047).contains(&node));
        *entry = node << 4 | consumed as i16;
    }
    result
}

/// Assign canonical codes to the given code lengths, for encoding.
///
/// Returns `(code, length)` per symbol with the code bits already reversed
/// for LSB-first emission; absent symbols get `(0, 0)`. Unlike the decoder
/// path, an incomplete or oversubscribed code here is a programming error,
/// reported as [`FerroflateError::InvalidState`].
pub fn code_lengths_to_codes(code_lengths: &[u8], max_code_length: u32) -> Result<Vec<(u32, u32)>> {
    debug_assert!((1..=MAX_CODE_LENGTH).contains(&max_code_length));
    let mut result = vec![(0u32, 0u32); code_lengths.len()];
    let mut next_code: u32 = 0;
    for code_length in 1..=max_code_length {
        next_code <<= 1;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if u32::from(len) != code_length {
                continue;
            }
            if next_code >> code_length != 0 {
                return Err(FerroflateError::invalid_state(
                    "canonical code produces an over-full tree",
                ));
            }
            result[symbol] = (next_code.reverse_bits() >> (32 - code_length), code_length);
            next_code += 1;
        }
    }
    if next_code != 1 << max_code_length {
        return Err(FerroflateError::invalid_state(
            "canonical code produces an under-full tree",
        ));
    }
    Ok(result)
}

/// Compute optimal length-limited code lengths with the package-merge
/// algorithm.
///
/// `histogram[sym]` is the frequency of `sym`; symbols with zero frequency
/// get length zero. With at least two used symbols the result has a Kraft
/// sum of exactly one, so [`code_lengths_to_codes`] accepts it. A single
/// used symbol gets length one; an empty histogram yields all zeros.
pub fn package_merge(histogram: &[u64], max_length: u32) -> Vec<u8> {
    enum Node {
        Leaf { symbol: usize },
        Package { children: (Rc<Node>, Rc<Node>) },
    }

    fn count_leaves(node: &Node, lengths: &mut [u8]) {
        match node {
            Node::Leaf { symbol } => lengths[*symbol] += 1,
            Node::Package { children } => {
                count_leaves(&children.0, lengths);
                count_leaves(&children.1, lengths);
            }
        }
    }

    let mut lengths = vec![0u8; histogram.len()];

    let leaves: Vec<(u64, Rc<Node>)> = histogram
        .iter()
        .enumerate()
        .filter(|&(_, &freq)| freq > 0)
        .map(|(symbol, &freq)| (freq, Rc::new(Node::Leaf { symbol })))
        .collect();
    match leaves.len() {
        0 => return lengths,
        1 => {
            if let Node::Leaf { symbol } = *leaves[0].1 {
                lengths[symbol] = 1;
            }
            return lengths;
        }
        _ => {}
    }

    let mut nodes: Vec<(u64, Rc<Node>)> = Vec::new();
    for _ in 0..max_length {
        nodes.extend(leaves.iter().cloned());
        nodes.sort_by_key(|&(freq, _)| freq);
        let mut packages = Vec::with_capacity(nodes.len() / 2);
        for pair in nodes.chunks_exact(2) {
            packages.push((
                pair[0].0 + pair[1].0,
                Rc::new(Node::Package {
                    children: (pair[0].1.clone(), pair[1].1.clone()),
                }),
            ));
        }
        // Any unpaired node is discarded
        nodes = packages;
    }

    for (_, node) in nodes.iter().take(leaves.len() - 1) {
        count_leaves(node, &mut lengths);
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_simple() {
        // Lengths {1, 2, 2}: canonical codes a=0, b=10, c=11
        let tree = code_lengths_to_tree(&[1, 2, 2]).unwrap();
        assert_eq!(tree.len(), 4);

        // Walk 0 -> 'a'
        assert_eq!(tree[0], !0);
        // Walk 1 -> internal, then 0 -> 'b', 1 -> 'c'
        let node = tree[1];
        assert!(node >= 0);
        assert_eq!(tree[node as usize], !1);
        assert_eq!(tree[node as usize + 1], !2);
    }

    #[test]
    fn test_tree_under_full() {
        let err = code_lengths_to_tree(&[0, 0, 1, 0]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HuffmanCodeUnderFull));

        let err = code_lengths_to_tree(&[2, 2, 2, 0]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HuffmanCodeUnderFull));
    }

    #[test]
    fn test_tree_over_full() {
        let err = code_lengths_to_tree(&[1, 1, 1, 0]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HuffmanCodeOverFull));

        let err = code_lengths_to_tree(&[1, 2, 2, 2]).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::HuffmanCodeOverFull));
    }

    #[test]
    fn test_table_matches_tree() {
        let tree = code_lengths_to_tree(&[1, 2, 3, 3]).unwrap();
        let table = tree_to_table(&tree);
        assert_eq!(table.len(), 1 << CODE_TABLE_BITS);

        // Every table entry must agree with a plain per-bit descent.
        for (i, &entry) in table.iter().enumerate() {
            let consumed = (entry & 0xF) as u32;
            let node = entry >> 4;

            let mut expect: i16 = 0;
            let mut bits = 0;
            while expect >= 0 && bits < CODE_TABLE_BITS {
                expect = tree[expect as usize + ((i >> bits) & 1)];
                bits += 1;
            }
            assert_eq!(node, expect);
            assert_eq!(consumed, bits);
        }
    }

    #[test]
    fn test_codes_invert_tree() {
        let lengths = [3u8, 3, 3, 3, 3, 2, 4, 4];
        let codes = code_lengths_to_codes(&lengths, 4).unwrap();
        let tree = code_lengths_to_tree(&lengths).unwrap();

        // Feeding each encoder code LSB-first through the tree must decode
        // back to its symbol.
        for (symbol, &(code, len)) in codes.iter().enumerate() {
            assert_eq!(len, u32::from(lengths[symbol]));
            let mut node: i16 = 0;
            for bit in 0..len {
                node = tree[node as usize + ((code >> bit) & 1) as usize];
            }
            assert_eq!(!node as usize, symbol);
        }
    }

    #[test]
    fn test_codes_reject_invalid() {
        assert!(code_lengths_to_codes(&[1, 1, 1], 4).is_err());
        assert!(code_lengths_to_codes(&[2, 2, 2], 4).is_err());
    }

    #[test]
    fn test_package_merge_basic() {
        let lengths = package_merge(&[5, 5, 5, 5], 15);
        assert_eq!(lengths, vec![2, 2, 2, 2]);

        // Skewed frequencies get shorter codes for common symbols.
        let lengths = package_merge(&[100, 30, 10, 5], 15);
        assert!(lengths[0] <= lengths[1]);
        assert!(lengths[1] <= lengths[2]);
        assert!(lengths[2] <= lengths[3]);
        assert!(code_lengths_to_codes(&lengths, 15).is_ok());
    }

    #[test]
    fn test_package_merge_respects_limit() {
        // Fibonacci-ish frequencies force long codes without a limit.
        let histogram = [1u64, 1, 2, 3, 5, 8, 13, 21, 34, 55];
        for limit in [4u32, 5, 7, 15] {
            let lengths = package_merge(&histogram, limit);
            assert!(lengths.iter().all(|&l| u32::from(l) <= limit));
            // Kraft sum must be exactly one.
            let kraft: u64 = lengths
                .iter()
                .filter(|&&l| l > 0)
                .map(|&l| 1u64 << (limit - u32::from(l)))
                .sum();
            assert_eq!(kraft, 1 << limit);
        }
    }

    #[test]
    fn test_package_merge_degenerate() {
        assert_eq!(package_merge(&[0, 0, 0], 15), vec![0, 0, 0]);
        assert_eq!(package_merge(&[0, 7, 0], 15), vec![0, 1, 0]);
    }
}
