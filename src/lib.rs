// src/lib.rs
//! huffpack — streaming byte-oriented Huffman compression.
//!
//! Stream layout:
//!   Byte 0:            leaf count - 1 (0 = empty input, nothing follows)
//!   Next bytes:        preorder tree traversal, 9 bits per node
//!                      (0–255 leaf symbol, 256 internal node),
//!                      then a 3-bit end-padding count
//!   Remaining bytes:   packed codes, zero-filled to a byte boundary;
//!                      the last `end padding` bits carry no symbol
//!
//! All fields are packed LSB-first. Compression needs two passes over the
//! input (count, then encode); decompression is a single streaming pass.
pub mod bitbuf;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod lookahead;
pub mod stream;
pub mod tree;

use std::io::Cursor;

pub use bitbuf::BitBuffer;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use tree::HuffmanTree;

/// Compress an in-memory buffer.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.add_symbols(input)?;
    let mut output = Vec::with_capacity(encoder.output_size()? as usize);
    encoder.encode(Cursor::new(input), &mut output)?;
    Ok(output)
}

/// Decompress an in-memory buffer produced by `compress` or `Encoder::encode`.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    Decoder::new().decode(Cursor::new(input), &mut output)?;
    Ok(output)
}
