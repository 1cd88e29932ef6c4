// src/encoder.rs
//! Two-phase streaming encoder.
//!
//! Phase 1 counts every byte of the input into a histogram. Phase 2 compiles
//! the histogram into a tree and code table, then streams the same input
//! through it:
//!
//!   header (tree + 3-bit end padding) ‖ packed codes ‖ zero fill to a byte
//!
//! The end padding is known before the first payload bit is written, because
//! it only depends on the header length and on `count × code length` per
//! symbol modulo 8. Header and payload therefore go out in one pass while the
//! live bit buffer stays near `flush_threshold` bits.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::bitbuf::BitBuffer;
use crate::error::{Error, Result};
use crate::format::{
    padding_for, BYTE_BITS, EMPTY_STREAM, FLUSH_THRESHOLD_BITS, LENGTH_BITS,
    MIN_FLUSH_THRESHOLD_BITS, PADDING_BITS, SYMBOL_COUNT,
};
use crate::stream::for_each_chunk;
use crate::tree::{CodeTable, HuffmanTree};

#[derive(Debug)]
enum State {
    Accumulating,
    /// `tree` is `None` when nothing was counted.
    Compiled { tree: Option<HuffmanTree>, codes: CodeTable },
}

#[derive(Debug)]
pub struct Encoder {
    counts: [u64; SYMBOL_COUNT],
    state: State,
    flush_threshold: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            counts: [0; SYMBOL_COUNT],
            state: State::Accumulating,
            flush_threshold: FLUSH_THRESHOLD_BITS,
        }
    }

    /// Flush the live buffer once it grows past `bits`. Does not change the
    /// bytes produced.
    pub fn with_flush_threshold(mut self, bits: usize) -> Self {
        self.flush_threshold = bits.max(MIN_FLUSH_THRESHOLD_BITS);
        self
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.state, State::Compiled { .. })
    }

    pub fn histogram(&self) -> &[u64; SYMBOL_COUNT] {
        &self.counts
    }

    fn ensure_accumulating(&self) -> Result<()> {
        if self.is_compiled() {
            return Err(Error::precondition("cannot count symbols after the encoder is compiled"));
        }
        Ok(())
    }

    pub fn add_symbol(&mut self, byte: u8) -> Result<()> {
        self.ensure_accumulating()?;
        self.counts[byte as usize] += 1;
        Ok(())
    }

    pub fn add_symbols(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_accumulating()?;
        for &b in bytes {
            self.counts[b as usize] += 1;
        }
        Ok(())
    }

    /// Counting pass over a whole byte source. Returns the bytes read.
    pub fn count_from<R: Read>(&mut self, reader: R) -> Result<u64> {
        self.ensure_accumulating()?;
        let counts = &mut self.counts;
        for_each_chunk(reader, |chunk| {
            for &b in chunk {
                counts[b as usize] += 1;
            }
            Ok(())
        })
    }

    fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Build the tree and code table. Idempotent; called implicitly by
    /// `header`, `encode` and the size accessors. An empty histogram compiles
    /// to an empty code table.
    pub fn compile(&mut self) -> Result<()> {
        if self.is_compiled() {
            return Ok(());
        }
        let (tree, codes) = if self.is_empty() {
            (None, vec![BitBuffer::new(); SYMBOL_COUNT])
        } else {
            let tree = HuffmanTree::from_frequencies(&self.counts)?;
            let codes = tree.codes();
            (Some(tree), codes)
        };
        debug!(
            leaves = tree.as_ref().map_or(0, HuffmanTree::leaf_count),
            input_bytes = self.input_size(),
            "encoder compiled"
        );
        self.state = State::Compiled { tree, codes };
        Ok(())
    }

    fn parts(&self) -> Result<(Option<&HuffmanTree>, &CodeTable)> {
        match &self.state {
            State::Compiled { tree, codes } => Ok((tree.as_ref(), codes)),
            State::Accumulating => Err(Error::precondition("encoder is not compiled")),
        }
    }

    /// `Σ count × code length` modulo 8, without overflow on large counts.
    fn payload_bits_mod_8(&self, codes: &CodeTable) -> usize {
        self.counts
            .iter()
            .zip(codes)
            .map(|(&count, code)| ((count % 8) as usize * code.len()) % BYTE_BITS)
            .sum::<usize>()
            % BYTE_BITS
    }

    /// Serialized header including the end-padding field, or the single
    /// `EMPTY_STREAM` byte when nothing was counted.
    pub fn header(&mut self) -> Result<BitBuffer> {
        self.compile()?;
        let (tree, codes) = self.parts()?;
        let Some(tree) = tree else {
            let mut bits = BitBuffer::new();
            bits.push_bits(EMPTY_STREAM as u64, LENGTH_BITS as usize);
            return Ok(bits);
        };
        let mut bits = tree.header();
        let header_mod = (bits.len() + PADDING_BITS as usize) % BYTE_BITS;
        let pad = padding_for(header_mod + self.payload_bits_mod_8(codes));
        bits.push_bits(pad as u64, PADDING_BITS as usize);
        Ok(bits)
    }

    /// Zero bits appended after the last code.
    pub fn end_padding(&mut self) -> Result<u8> {
        Ok(declared_padding(&self.header()?))
    }

    /// Stream `input` into `output` as header plus payload. `input` must carry
    /// the same bytes that were counted. Returns `(bytes read, bytes written)`.
    pub fn encode<R: Read, W: Write>(&mut self, input: R, mut output: W) -> Result<(u64, u64)> {
        let mut buffer = self.header()?;
        let declared_pad = declared_padding(&buffer);
        let flush_threshold = self.flush_threshold;
        let (_, codes) = self.parts()?;

        let mut scratch = Vec::with_capacity(flush_threshold / BYTE_BITS + 64);
        let mut written = 0u64;

        let read = for_each_chunk(input, |chunk| {
            for &b in chunk {
                let code = &codes[b as usize];
                if code.is_empty() {
                    return Err(unknown_symbol(b));
                }
                buffer.append(code);
                if buffer.len() > flush_threshold {
                    written += flush(&mut buffer, &mut scratch, &mut output)?;
                }
            }
            Ok(())
        })?;

        let pad = padding_for(buffer.len() % BYTE_BITS);
        if pad != declared_pad {
            return Err(Error::precondition("encoded input differs from the counted input"));
        }
        buffer.push_bits(0, pad as usize);
        written += flush(&mut buffer, &mut scratch, &mut output)?;
        debug_assert!(buffer.is_empty());
        output.flush()?;

        debug!(read, written, "encode finished");
        Ok((read, written))
    }

    /// Payload bits for `input`, with no header or padding.
    pub fn encode_to_bits(&mut self, input: &[u8]) -> Result<BitBuffer> {
        self.compile()?;
        let (_, codes) = self.parts()?;
        let mut bits = BitBuffer::new();
        for &b in input {
            let code = &codes[b as usize];
            if code.is_empty() {
                return Err(unknown_symbol(b));
            }
            bits.append(code);
        }
        Ok(bits)
    }

    /// Total counted bytes.
    pub fn input_size(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Bytes `encode` will write for the counted input.
    pub fn output_size(&mut self) -> Result<u64> {
        let header_bits = self.header()?.len() as u128;
        let (_, codes) = self.parts()?;
        let payload_bits: u128 = self
            .counts
            .iter()
            .zip(codes)
            .map(|(&count, code)| count as u128 * code.len() as u128)
            .sum();
        Ok((header_bits + payload_bits).div_ceil(BYTE_BITS as u128) as u64)
    }
}

/// Padding field of a header built by `Encoder::header`.
fn declared_padding(header: &BitBuffer) -> u8 {
    if header.len() == LENGTH_BITS as usize {
        return 0;
    }
    header.get(PADDING_BITS as usize, header.len() - PADDING_BITS as usize) as u8
}

fn unknown_symbol(byte: u8) -> Error {
    Error::precondition(format!("byte 0x{:02x} was never counted", byte))
}

fn flush<W: Write>(buffer: &mut BitBuffer, scratch: &mut Vec<u8>, output: &mut W) -> Result<u64> {
    scratch.clear();
    let bytes = buffer.drain_bytes(scratch);
    output.write_all(scratch)?;
    trace!(bytes, carried_bits = buffer.len(), "encoder flush");
    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const N: usize = 10_000;

    fn encode_all(encoder: &mut Encoder, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encoder.encode(Cursor::new(data), &mut out).unwrap();
        out
    }

    #[test]
    fn empty_encoder_header() {
        let mut encoder = Encoder::new();
        let header = encoder.header().unwrap();
        assert_eq!(header.len(), 8);
        assert_eq!(header.get(8, 0), 0);
        assert_eq!(encode_all(&mut encoder, b""), vec![0u8]);
    }

    #[test]
    fn empty_encoder_rejects_every_byte() {
        let mut encoder = Encoder::new();
        for i in 0..N / 100 {
            let chars: Vec<u8> = (0..N / 10).map(|j| (((i * j) & 1234) * 5 + i) as u8).collect();
            let err = encoder.encode_to_bits(&chars).unwrap_err();
            assert!(err.is_precondition());
        }
        let err = encoder.encode(Cursor::new(b"x"), Vec::new()).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn codes_match_header_tree() {
        let mut encoder = Encoder::new();
        for i in 0..N {
            encoder.add_symbol(((i & 1234) * 5) as u8).unwrap();
        }
        let header = encoder.header().unwrap();
        let nodes = 2 * header.get(8, 0) as usize + 1;
        let ids: Vec<u16> = (0..nodes).map(|i| header.get(9, 8 + 9 * i) as u16).collect();
        let codes = HuffmanTree::from_traversal(&ids).unwrap().codes();

        for sym in 0..=255u8 {
            let code = &codes[sym as usize];
            if code.is_empty() {
                assert!(encoder.encode_to_bits(&[sym]).unwrap_err().is_precondition());
            } else {
                assert_eq!(&encoder.encode_to_bits(&[sym]).unwrap(), code);
            }
        }
    }

    #[test]
    fn counting_after_compile_fails() {
        let mut encoder = Encoder::new();
        encoder.add_symbols(b"abc").unwrap();
        encoder.compile().unwrap();
        encoder.compile().unwrap();
        assert!(encoder.add_symbol(b'a').unwrap_err().is_precondition());
        assert!(encoder.add_symbols(b"a").unwrap_err().is_precondition());
        assert!(encoder.count_from(Cursor::new(b"a")).unwrap_err().is_precondition());
    }

    #[test]
    fn encode_compiles_implicitly() {
        let mut encoder = Encoder::new();
        encoder.add_symbols(b"aaaabbbc").unwrap();
        assert!(!encoder.is_compiled());
        encode_all(&mut encoder, b"aaaabbbc");
        assert!(encoder.is_compiled());
        assert!(encoder.add_symbol(b'a').is_err());
    }

    #[test]
    fn three_symbol_stream_layout() {
        let mut encoder = Encoder::new();
        encoder.add_symbols(b"aaaabbbc").unwrap();
        let out = encode_all(&mut encoder, b"aaaabbbc");

        // 8 + 5*9 + 3 = 56 header bits; a=1, b=2, c=2 bits → 4 + 6 + 2 = 12 payload bits
        assert_eq!(out[0], 2);
        assert_eq!(encoder.end_padding().unwrap(), 4);
        assert_eq!(out.len(), 7 + 2);
        assert_eq!(encoder.output_size().unwrap(), out.len() as u64);
        assert_eq!(encoder.input_size(), 8);
    }

    #[test]
    fn declared_padding_matches_payload() {
        for len in 1..40usize {
            let data: Vec<u8> = (0..len).map(|i| (i * i % 7) as u8 + b'a').collect();
            let mut encoder = Encoder::new();
            encoder.add_symbols(&data).unwrap();
            let header_bits = encoder.header().unwrap().len();
            let payload_bits = encoder.encode_to_bits(&data).unwrap().len();
            let pad = encoder.end_padding().unwrap() as usize;
            assert_eq!((header_bits + payload_bits + pad) % 8, 0, "len {}", len);
            assert!(pad < 8);
        }
    }

    #[test]
    fn output_size_matches_written() {
        let data: Vec<u8> = (0..N).map(|i| ((i * 31) ^ (i >> 3)) as u8 % 97).collect();
        let mut encoder = Encoder::new().with_flush_threshold(100);
        encoder.count_from(Cursor::new(&data)).unwrap();
        let expected = encoder.output_size().unwrap();
        let (read, written) = encoder.encode(Cursor::new(&data), Vec::new()).unwrap();
        assert_eq!(read, N as u64);
        assert_eq!(written, expected);
    }

    #[test]
    fn flush_threshold_does_not_change_output() {
        let data: Vec<u8> = (0..N).map(|i| (i % 251) as u8).collect();
        let mut outputs = Vec::new();
        for threshold in [0, 64, 1000, FLUSH_THRESHOLD_BITS] {
            let mut encoder = Encoder::new().with_flush_threshold(threshold);
            encoder.add_symbols(&data).unwrap();
            outputs.push(encode_all(&mut encoder, &data));
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn unknown_byte_in_stream_fails() {
        let mut encoder = Encoder::new();
        encoder.add_symbols(b"abc").unwrap();
        let err = encoder.encode(Cursor::new(b"abcd"), Vec::new()).unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("0x64"));
    }
}
