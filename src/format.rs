//! Fixed wire-format vocabulary — known to both encoder and decoder.
//! Single source of truth for all bit widths and buffer limits.

/// Number of distinct byte symbols.
pub const SYMBOL_COUNT: usize = 256;

/// Width of the leading "leaf count - 1" field.
pub const LENGTH_BITS: u32 = 8;

/// Width of each node id in the preorder traversal.
pub const NODE_ID_BITS: u32 = 9;

/// Node id marking an internal node in the traversal. 0–255 are leaf symbols.
pub const INTERNAL_NODE: u16 = SYMBOL_COUNT as u16;

/// Width of the end-padding count that closes the header.
pub const PADDING_BITS: u32 = 3;

/// The whole output for an empty input.
pub const EMPTY_STREAM: u8 = 0;

pub const BYTE_BITS: usize = 8;

// ── Decode acceleration ──────────────────────────────────────────────────────
/// Bits consumed per lookahead step. Each entry can hold at most this many
/// symbols, since every code is at least one bit long.
pub const LOOKAHEAD_BITS: usize = 4;
pub const LOOKAHEAD_ENTRIES: usize = 1 << LOOKAHEAD_BITS;

// ── Streaming ────────────────────────────────────────────────────────────────
/// Live bit buffer size above which encoder and decoder flush.
pub const FLUSH_THRESHOLD_BITS: usize = 4096 * BYTE_BITS;
/// Smallest flush threshold accepted from callers.
pub const MIN_FLUSH_THRESHOLD_BITS: usize = 64;
/// Read size for the byte source.
pub const READ_CHUNK_BYTES: usize = 8192;

/// Number of entries in a traversal with `first_byte + 1` leaves.
pub fn traversal_len(first_byte: u8) -> usize {
    2 * first_byte as usize + 1
}

/// Total header length in bytes, the first byte included.
/// An empty stream (`first_byte == 0`) is that single byte.
pub fn header_len(first_byte: u8) -> usize {
    if first_byte == EMPTY_STREAM {
        return 1;
    }
    let bits = traversal_len(first_byte) * NODE_ID_BITS as usize + PADDING_BITS as usize;
    1 + bits.div_ceil(BYTE_BITS)
}

/// Number of zero bits that take `total_bits_mod_8` to the next byte boundary.
#[inline]
pub fn padding_for(total_bits_mod_8: usize) -> u8 {
    ((BYTE_BITS - total_bits_mod_8 % BYTE_BITS) % BYTE_BITS) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_len_matches_closed_form() {
        for first in 1u8..=255 {
            let l = first as usize + 1;
            let expected = 1 + ((2 * l - 1) * 9 + 3).div_ceil(8);
            assert_eq!(header_len(first), expected, "first byte {}", first);
        }
        assert_eq!(header_len(0), 1);
        // three leaves: 5 nodes * 9 + 3 = 48 bits = 6 bytes
        assert_eq!(header_len(2), 7);
    }

    #[test]
    fn padding_wraps() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 7);
        assert_eq!(padding_for(7), 1);
        assert_eq!(padding_for(8), 0);
    }
}
