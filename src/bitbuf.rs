// src/bitbuf.rs
//! Growable, bit-addressable buffer over 64-bit words.
//!
//! Bits are stored LSB-first: bit `i` lives at position `i % 64` of word
//! `i / 64`. Multi-bit values are appended low bit first, so `get` is the
//! exact inverse of `push_bits` at the same start index, and the bytes
//! produced by `drain_bytes` are the wire bytes of the compressed format.
//!
//! Invariant: `words.len() == ceil(len / 64)`. Bits past `len` in the last
//! word are don't-care.

const WORD_BITS: usize = 64;

#[derive(Default, Debug, Clone)]
pub struct BitBuffer {
    words: Vec<u64>,
    len: usize,
}

#[inline]
fn low_mask(width: usize) -> u64 {
    if width >= WORD_BITS { u64::MAX } else { (1u64 << width) - 1 }
}

impl BitBuffer {
    pub fn new() -> Self {
        BitBuffer { words: Vec::new(), len: 0 }
    }

    pub fn with_capacity(bits: usize) -> Self {
        BitBuffer {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
            len: 0,
        }
    }

    /// Buffer holding `bytes` in wire order.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = BitBuffer::with_capacity(bytes.len() * 8);
        buf.extend_from_bytes(bytes);
        buf
    }

    /// Number of valid bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, bit: bool) {
        self.push_bits(bit as u64, 1);
    }

    /// Append the low `width` bits of `value`, least significant first.
    /// `width == 0` is a no-op.
    ///
    /// # Panics
    /// If `width > 64`.
    pub fn push_bits(&mut self, value: u64, width: usize) {
        assert!(width <= WORD_BITS, "width {} exceeds word size", width);
        if width == 0 {
            return;
        }
        let value = value & low_mask(width);
        let offset = self.len % WORD_BITS;

        if offset == 0 {
            self.words.push(value);
        } else {
            // offset > 0 so both shifts are in range
            let last = self.words.len() - 1;
            self.words[last] = (self.words[last] & low_mask(offset)) | (value << offset);
            let free = WORD_BITS - offset;
            if width > free {
                self.words.push(value >> free);
            }
        }
        self.len += width;
    }

    /// Append every bit of `other`, in order.
    pub fn append(&mut self, other: &BitBuffer) {
        let full = other.len / WORD_BITS;
        for &word in &other.words[..full] {
            self.push_bits(word, WORD_BITS);
        }
        let rest = other.len % WORD_BITS;
        if rest > 0 {
            self.push_bits(other.words[full], rest);
        }
    }

    /// Append bytes in wire order, eight bits each.
    pub fn extend_from_bytes(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(8);
        for chunk in &mut chunks {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            self.push_bits(u64::from_le_bytes(word), WORD_BITS);
        }
        for &b in chunks.remainder() {
            self.push_bits(b as u64, 8);
        }
    }

    /// Read `width` bits starting at bit `start`, first bit in the lowest
    /// position. `width == 0` reads 0.
    ///
    /// # Panics
    /// If `width > 64` or the range runs past `len()`.
    pub fn get(&self, width: usize, start: usize) -> u64 {
        assert!(width <= WORD_BITS, "width {} exceeds word size", width);
        if width == 0 {
            return 0;
        }
        assert!(
            start + width <= self.len,
            "bit range {}..{} out of bounds (len {})",
            start, start + width, self.len
        );
        let idx = start / WORD_BITS;
        let offset = start % WORD_BITS;
        let mut value = self.words[idx] >> offset;
        if offset + width > WORD_BITS {
            value |= self.words[idx + 1] << (WORD_BITS - offset);
        }
        value & low_mask(width)
    }

    /// Bit at index `i`.
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {} out of bounds (len {})", i, self.len);
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    /// Remove the last bit.
    ///
    /// # Panics
    /// If the buffer is empty.
    pub fn pop(&mut self) -> bool {
        assert!(self.len > 0, "pop on empty bit buffer");
        let bit = self.bit(self.len - 1);
        self.len -= 1;
        if self.len % WORD_BITS == 0 {
            self.words.pop();
        }
        bit
    }

    pub fn swap(&mut self, other: &mut BitBuffer) {
        std::mem::swap(self, other);
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    /// Drop the first `n` bits, shifting the rest to the front.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len, "consume {} bits from buffer of {}", n, self.len);
        if n == 0 {
            return;
        }
        if n % WORD_BITS == 0 {
            self.words.drain(..n / WORD_BITS);
            self.len -= n;
            return;
        }
        let mut rest = BitBuffer::with_capacity(self.len - n);
        let mut pos = n;
        while pos < self.len {
            let width = (self.len - pos).min(WORD_BITS);
            rest.push_bits(self.get(width, pos), width);
            pos += width;
        }
        self.swap(&mut rest);
    }

    /// Move every complete byte into `out`, keeping the sub-byte tail.
    /// Returns the number of bytes moved.
    pub fn drain_bytes(&mut self, out: &mut Vec<u8>) -> usize {
        let bytes = self.len / 8;
        let full_words = bytes / 8;
        out.reserve(bytes);
        for &word in &self.words[..full_words] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for i in full_words * 8..bytes {
            out.push(self.get(8, i * 8) as u8);
        }
        self.consume(bytes * 8);
        bytes
    }
}

impl PartialEq for BitBuffer {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        let full = self.len / WORD_BITS;
        if self.words[..full] != other.words[..full] {
            return false;
        }
        let rest = self.len % WORD_BITS;
        rest == 0 || self.get(rest, full * WORD_BITS) == other.get(rest, full * WORD_BITS)
    }
}

impl Eq for BitBuffer {}
