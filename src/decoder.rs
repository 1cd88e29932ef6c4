// src/decoder.rs
//! Streaming decoder: header → tree → lookahead decode of the payload.
//!
//! The payload is fed into a live bit buffer. Whenever the buffer grows past
//! the flush threshold every complete symbol is decoded and written, except
//! that the last `end_padding` bits are never consumed: they may be the
//! stream's fill bits. Bits of an unfinished symbol carry over to the next
//! round. At end of input exactly `end_padding` bits must remain.

use std::io::{Cursor, ErrorKind, Read, Write};

use bitstream_io::{BitRead, BitReader, LittleEndian};
use tracing::{debug, trace, warn};

use crate::bitbuf::BitBuffer;
use crate::error::{Error, Result};
use crate::format::{
    header_len, traversal_len, BYTE_BITS, EMPTY_STREAM, FLUSH_THRESHOLD_BITS,
    MIN_FLUSH_THRESHOLD_BITS, NODE_ID_BITS, PADDING_BITS,
};
use crate::stream::for_each_chunk;
use crate::tree::HuffmanTree;

#[derive(Debug)]
pub struct Decoder {
    tree: Option<HuffmanTree>,
    buffer: BitBuffer,
    end_padding: u8,
    flush_threshold: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            tree: None,
            buffer: BitBuffer::new(),
            end_padding: 0,
            flush_threshold: FLUSH_THRESHOLD_BITS,
        }
    }

    /// Decode once the live buffer grows past `bits`. Does not change the
    /// bytes produced.
    pub fn with_flush_threshold(mut self, bits: usize) -> Self {
        self.flush_threshold = bits.max(MIN_FLUSH_THRESHOLD_BITS);
        self
    }

    /// Tree parsed from the most recent header.
    pub fn tree(&self) -> Option<&HuffmanTree> {
        self.tree.as_ref()
    }

    /// Decode one compressed stream from `input` into `output`.
    /// Returns `(bytes read, bytes written)`.
    ///
    /// On error, anything already written to `output` is unreliable.
    pub fn decode<R: Read, W: Write>(&mut self, mut input: R, mut output: W) -> Result<(u64, u64)> {
        self.tree = None;
        self.buffer.clear();
        self.end_padding = 0;

        let mut first = [0u8; 1];
        read_header_bytes(&mut input, &mut first)?;
        if first[0] == EMPTY_STREAM {
            output.flush()?;
            debug!("empty stream");
            return Ok((1, 0));
        }

        let mut header = vec![0u8; header_len(first[0])];
        header[0] = first[0];
        read_header_bytes(&mut input, &mut header[1..])?;
        self.read_header(&header)?;

        let tree = match &self.tree {
            Some(tree) => tree,
            None => return Err(Error::malformed("missing tree")),
        };
        let buffer = &mut self.buffer;
        let end_padding = self.end_padding as usize;
        let flush_threshold = self.flush_threshold;
        let mut scratch = Vec::with_capacity(flush_threshold / BYTE_BITS * 4);
        let mut written = 0u64;

        let payload = for_each_chunk(&mut input, |chunk| {
            for piece in chunk.chunks(flush_threshold.div_ceil(BYTE_BITS)) {
                buffer.extend_from_bytes(piece);
                if buffer.len() > flush_threshold {
                    written += drain(tree, buffer, end_padding, &mut scratch, &mut output)?;
                }
            }
            Ok(())
        })?;
        written += drain(tree, buffer, end_padding, &mut scratch, &mut output)?;
        output.flush()?;

        if buffer.len() != end_padding {
            warn!(
                remaining = buffer.len(),
                declared = end_padding,
                "payload does not end on the declared padding"
            );
            return Err(Error::malformed(format!(
                "{} undecoded bits at end of stream, header declares {}",
                buffer.len(),
                end_padding
            )));
        }

        let read = header.len() as u64 + payload;
        debug!(read, written, "decode finished");
        Ok((read, written))
    }

    /// Parse the traversal and padding field, and seed the live buffer with
    /// the payload bits sharing the last header byte.
    fn read_header(&mut self, header: &[u8]) -> Result<()> {
        let nodes = traversal_len(header[0]);
        let mut reader = BitReader::endian(Cursor::new(&header[1..]), LittleEndian);

        let mut ids = Vec::with_capacity(nodes);
        for _ in 0..nodes {
            ids.push(reader.read::<u16>(NODE_ID_BITS)?);
        }
        let tree = HuffmanTree::from_traversal(&ids)?;
        let end_padding = reader.read::<u8>(PADDING_BITS)?;

        let used = nodes * NODE_ID_BITS as usize + PADDING_BITS as usize;
        let spare = (header.len() - 1) * BYTE_BITS - used;
        if spare > 0 {
            let bits = reader.read::<u8>(spare as u32)?;
            self.buffer.push_bits(bits as u64, spare);
        }

        debug!(leaves = tree.leaf_count(), end_padding, "header parsed");
        self.tree = Some(tree);
        self.end_padding = end_padding;
        Ok(())
    }
}

fn read_header_bytes<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::malformed("stream ends inside the header"),
        _ => Error::Io(e),
    })
}

/// Decode every complete symbol in front of the reserved padding, write it,
/// and keep the rest of the bits. Returns bytes written.
fn drain<W: Write>(
    tree: &HuffmanTree,
    buffer: &mut BitBuffer,
    end_padding: usize,
    scratch: &mut Vec<u8>,
    output: &mut W,
) -> Result<u64> {
    let end = buffer.len().saturating_sub(end_padding);
    scratch.clear();
    let consumed = tree.decode_run(buffer, end, scratch);
    output.write_all(scratch)?;
    buffer.consume(consumed);
    trace!(bytes = scratch.len(), carried_bits = buffer.len(), "decoder flush");
    Ok(scratch.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.add_symbols(data).unwrap();
        let mut out = Vec::new();
        encoder.encode(Cursor::new(data), &mut out).unwrap();
        out
    }

    fn decode(stream: &[u8]) -> Result<(Vec<u8>, (u64, u64))> {
        let mut out = Vec::new();
        let counts = Decoder::new().decode(Cursor::new(stream), &mut out)?;
        Ok((out, counts))
    }

    #[test]
    fn empty_stream() {
        let (out, counts) = decode(&[0]).unwrap();
        assert!(out.is_empty());
        assert_eq!(counts, (1, 0));
    }

    #[test]
    fn no_bytes_at_all_is_malformed() {
        assert!(decode(&[]).unwrap_err().is_malformed());
    }

    #[test]
    fn three_symbols() {
        let stream = compress(b"aaaabbbc");
        assert_eq!(stream[0], 2);
        let (out, counts) = decode(&stream).unwrap();
        assert_eq!(out, b"aaaabbbc");
        assert_eq!(counts, (stream.len() as u64, 8));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let stream = compress(b"aaaabbbc");
        for cut in 1..header_len(stream[0]) {
            let err = decode(&stream[..cut]).unwrap_err();
            assert!(err.is_malformed(), "cut at {}", cut);
        }
    }

    #[test]
    fn repeated_leaf_is_rejected() {
        // traversal 256, 'a', 256, 'a', 'b' for three leaves
        let mut bits = BitBuffer::new();
        bits.push_bits(2, 8);
        for id in [256u64, 97, 256, 97, 98] {
            bits.push_bits(id, 9);
        }
        bits.push_bits(0, 3);
        let mut stream = Vec::new();
        bits.drain_bytes(&mut stream);
        assert!(decode(&stream).unwrap_err().is_malformed());
    }

    #[test]
    fn wrong_padding_is_rejected() {
        let mut stream = compress(b"aaaabbbc");
        // padding field occupies bits 53..56 of the header, i.e. the top of byte 6
        let declared = stream[6] >> 5;
        stream[6] = (stream[6] & 0x1f) | (((declared + 1) % 8) << 5);
        assert!(decode(&stream).unwrap_err().is_malformed());
    }

    #[test]
    fn dropped_payload_byte_is_rejected() {
        // c=0 a=10 b=11: 15 payload bits + 1 padding bit in two bytes.
        // Without the last byte, the second `a` runs into the reserved bit.
        let stream = compress(b"cabcabcab");
        assert_eq!(stream.len(), 9);
        let err = decode(&stream[..8]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn extra_payload_byte_is_rejected() {
        // 0x08 decodes as `a a a` and then starts a two-bit code right at the
        // reserved padding, leaving 5 bits where 4 are declared.
        let mut stream = compress(b"aaaabbbc");
        stream.push(0x08);
        assert!(decode(&stream).unwrap_err().is_malformed());
    }

    #[test]
    fn small_threshold_matches_default() {
        let data: Vec<u8> = (0..20_000u32).map(|i| ((i * 7) % 13 + (i % 5) * 40) as u8).collect();
        let stream = compress(&data);

        let mut out = Vec::new();
        let (read, written) = Decoder::new()
            .with_flush_threshold(64)
            .decode(Cursor::new(&stream), &mut out)
            .unwrap();
        assert_eq!(out, data);
        assert_eq!(read, stream.len() as u64);
        assert_eq!(written, data.len() as u64);
    }

    #[test]
    fn decoder_is_reusable() {
        let mut decoder = Decoder::new();
        for data in [&b"first stream"[..], b"", b"second, longer stream of bytes"] {
            let stream = compress(data);
            let mut out = Vec::new();
            decoder.decode(Cursor::new(&stream), &mut out).unwrap();
            assert_eq!(out, data);
        }
    }
}
