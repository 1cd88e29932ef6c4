// src/tree.rs
//! Huffman tree over byte symbols, stored as a flat arena.
//!
//! Node ids: leaves occupy `[0, L)`, internal nodes `[L, 2L-1)`. Three parallel
//! arrays describe the topology: `leaves[i]` is the symbol of leaf `i`,
//! `children[j]` the (left, right) pair of internal node `L + j`, and
//! `parents[n]` the parent of any node (the root maps to itself).
//!
//! A tree always has at least two leaves. A histogram with a single symbol
//! builds a synthetic root over two leaves carrying that same symbol, so every
//! code is at least one bit long and both bit values decode to it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;
use std::sync::OnceLock;

use tracing::trace;

use crate::bitbuf::BitBuffer;
use crate::error::{Error, Result};
use crate::format::{INTERNAL_NODE, LENGTH_BITS, LOOKAHEAD_BITS, NODE_ID_BITS, SYMBOL_COUNT};
use crate::lookahead::LookaheadTable;

/// Code per symbol, indexed by byte value. Symbols absent from the tree have
/// an empty code.
pub type CodeTable = Vec<BitBuffer>;

#[derive(Debug, Clone)]
pub struct HuffmanTree {
    root: usize,
    leaves: Vec<u8>,
    children: Vec<(usize, usize)>,
    parents: Vec<usize>,
    lookahead: OnceLock<LookaheadTable>,
}

impl HuffmanTree {
    /// Build from a byte histogram by repeatedly merging the two lightest
    /// nodes. Ties are broken by node id: leaves are numbered in symbol order
    /// and merged nodes in creation order, so the result is deterministic.
    /// The first node popped becomes the left child.
    pub fn from_frequencies(counts: &[u64; SYMBOL_COUNT]) -> Result<Self> {
        let present: Vec<(u8, u64)> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0)
            .map(|(sym, &c)| (sym as u8, c))
            .collect();

        match present.len() {
            0 => return Err(Error::EmptyHistogram),
            1 => {
                let sym = present[0].0;
                return Ok(HuffmanTree {
                    root: 2,
                    leaves: vec![sym, sym],
                    children: vec![(0, 1)],
                    parents: vec![2; 3],
                    lookahead: OnceLock::new(),
                });
            }
            _ => {}
        }

        let leaf_count = present.len();
        let node_count = 2 * leaf_count - 1;
        let mut leaves = Vec::with_capacity(leaf_count);
        let mut children = Vec::with_capacity(leaf_count - 1);
        let mut parents = vec![0usize; node_count];

        let mut heap: BinaryHeap<(Reverse<u64>, Reverse<usize>)> =
            BinaryHeap::with_capacity(leaf_count);
        for (id, &(sym, count)) in present.iter().enumerate() {
            leaves.push(sym);
            heap.push((Reverse(count), Reverse(id)));
        }

        let mut next_id = leaf_count;
        let mut root = node_count - 1;
        while let Some((Reverse(w1), Reverse(left))) = heap.pop() {
            let Some((Reverse(w2), Reverse(right))) = heap.pop() else {
                root = left;
                break;
            };
            children.push((left, right));
            parents[left] = next_id;
            parents[right] = next_id;
            heap.push((Reverse(w1.saturating_add(w2)), Reverse(next_id)));
            next_id += 1;
        }
        debug_assert_eq!(root, node_count - 1);
        parents[root] = root;

        Ok(HuffmanTree { root, leaves, children, parents, lookahead: OnceLock::new() })
    }

    /// Rebuild from a preorder node-id sequence (0–255 leaf symbol,
    /// `INTERNAL_NODE` internal). Every internal entry is followed by its left
    /// subtree; once that subtree completes, the next entry is its right child.
    pub fn from_traversal(ids: &[u16]) -> Result<Self> {
        let n = ids.len();
        if n < 3 || n % 2 == 0 {
            return Err(Error::malformed(format!("traversal length {} is not a tree", n)));
        }
        let leaf_count = n / 2 + 1;

        let mut seen = [false; SYMBOL_COUNT];
        for &id in ids {
            if id > INTERNAL_NODE {
                return Err(Error::malformed(format!("invalid node id {}", id)));
            }
            if id < INTERNAL_NODE {
                if seen[id as usize] && leaf_count > 2 {
                    return Err(Error::malformed(format!("leaf symbol {} repeats", id)));
                }
                seen[id as usize] = true;
            }
        }
        if ids[0] != INTERNAL_NODE {
            return Err(Error::malformed("traversal root is a leaf"));
        }

        // Number nodes in order of appearance.
        let mut leaves = Vec::with_capacity(leaf_count);
        let mut internal = 0usize;
        let mut index = Vec::with_capacity(n);
        for &id in ids {
            if id == INTERNAL_NODE {
                if internal == leaf_count - 1 {
                    return Err(Error::malformed("too many internal nodes"));
                }
                index.push(leaf_count + internal);
                internal += 1;
            } else {
                if leaves.len() == leaf_count {
                    return Err(Error::malformed("too many leaves"));
                }
                index.push(leaves.len());
                leaves.push(id as u8);
            }
        }

        let root = index[0];
        let mut children = vec![(0usize, 0usize); leaf_count - 1];
        let mut parents = vec![0usize; n];
        parents[root] = root;
        let mut need_right: Vec<usize> = Vec::new();

        for i in 0..n - 1 {
            let next = index[i + 1];
            if ids[i] == INTERNAL_NODE {
                let node = index[i];
                children[node - leaf_count].0 = next;
                parents[next] = node;
                need_right.push(node);
            } else {
                let Some(node) = need_right.pop() else {
                    return Err(Error::malformed("entries after a complete tree"));
                };
                children[node - leaf_count].1 = next;
                parents[next] = node;
            }
        }
        if ids[n - 1] == INTERNAL_NODE || !need_right.is_empty() {
            return Err(Error::malformed("traversal ends inside an incomplete subtree"));
        }

        Ok(HuffmanTree { root, leaves, children, parents, lookahead: OnceLock::new() })
    }

    /// Number of leaves, two in the single-symbol case.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    /// Ids of all internal nodes.
    pub fn internal_nodes(&self) -> Range<usize> {
        self.leaves.len()..self.leaves.len() + self.children.len()
    }

    #[inline]
    pub fn symbol(&self, node: usize) -> Option<u8> {
        self.leaves.get(node).copied()
    }

    /// Child of internal `node`: right for a 1 bit, left for a 0 bit.
    #[inline]
    pub fn child(&self, node: usize, bit: bool) -> usize {
        let (left, right) = self.children[node - self.leaves.len()];
        if bit { right } else { left }
    }

    /// Root-to-leaf paths, 0 = left, 1 = right.
    ///
    /// Iterative depth-first walk: descend left to a leaf, record the path,
    /// climb back one bit and try the right branch, climbing further once both
    /// children are done. Ends back at the root with an empty path.
    pub fn codes(&self) -> CodeTable {
        let mut codes = vec![BitBuffer::new(); SYMBOL_COUNT];
        let mut path = BitBuffer::new();
        let mut visited = vec![false; self.parents.len()];
        let mut node = self.root;

        loop {
            visited[node] = true;
            if let Some(sym) = self.symbol(node) {
                codes[sym as usize] = path.clone();
                path.pop();
                node = self.parents[node];
                continue;
            }
            let (left, right) = self.children[node - self.leaves.len()];
            if !visited[left] {
                path.push(false);
                node = left;
            } else if !visited[right] {
                path.push(true);
                node = right;
            } else if node == self.root {
                break;
            } else {
                path.pop();
                node = self.parents[node];
            }
        }
        debug_assert!(path.is_empty());
        codes
    }

    /// Code length per symbol, 0 for absent symbols.
    pub fn code_lengths(&self) -> Vec<usize> {
        self.codes().iter().map(BitBuffer::len).collect()
    }

    /// Preorder node ids: leaf symbol for leaves, `INTERNAL_NODE` otherwise.
    pub fn traversal(&self) -> Vec<u16> {
        let mut ids = Vec::with_capacity(self.parents.len());
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            match self.symbol(node) {
                Some(sym) => ids.push(sym as u16),
                None => {
                    ids.push(INTERNAL_NODE);
                    let (left, right) = self.children[node - self.leaves.len()];
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        ids
    }

    /// Leaf count minus one in 8 bits, then the traversal at 9 bits per node.
    /// The end-padding field is appended by the encoder.
    pub fn header(&self) -> BitBuffer {
        let ids = self.traversal();
        let mut bits = BitBuffer::with_capacity(LENGTH_BITS as usize + ids.len() * NODE_ID_BITS as usize);
        bits.push_bits((self.leaves.len() - 1) as u64, LENGTH_BITS as usize);
        for id in ids {
            bits.push_bits(id as u64, NODE_ID_BITS as usize);
        }
        bits
    }

    /// Walk from `start`, reading bits at `*cursor` up to `end`, until a leaf is
    /// reached. Returns `None` when the bits run out first; the caller decides
    /// whether that is a chunk boundary or a truncated stream.
    pub fn decode_one(
        &self,
        bits: &BitBuffer,
        cursor: &mut usize,
        end: usize,
        start: usize,
    ) -> Option<u8> {
        let mut node = start;
        loop {
            if let Some(sym) = self.symbol(node) {
                return Some(sym);
            }
            if *cursor >= end {
                return None;
            }
            node = self.child(node, bits.bit(*cursor));
            *cursor += 1;
        }
    }

    /// Lazily built, cached for the lifetime of the tree.
    pub fn lookahead(&self) -> &LookaheadTable {
        self.lookahead.get_or_init(|| {
            let table = LookaheadTable::build(self);
            trace!(entries = table.len(), "lookahead table built");
            table
        })
    }

    /// Decode every complete symbol in `bits[..end]` into `out`.
    ///
    /// Whole windows go through the lookahead table, the remainder bit by bit.
    /// Returns the index just past the last complete symbol; bits from there
    /// on belong to a symbol that continues past `end`.
    pub fn decode_run(&self, bits: &BitBuffer, end: usize, out: &mut Vec<u8>) -> usize {
        let table = self.lookahead();
        let mut node = self.root;
        let mut idx = 0;

        while idx + LOOKAHEAD_BITS <= end {
            let step = table.step(node, bits.get(LOOKAHEAD_BITS, idx) as usize);
            out.extend_from_slice(step.symbols());
            node = step.node();
            idx += LOOKAHEAD_BITS;
        }

        loop {
            let mut cursor = idx;
            match self.decode_one(bits, &mut cursor, end, node) {
                Some(sym) => {
                    out.push(sym);
                    node = self.root;
                    idx = cursor;
                }
                None => break,
            }
        }

        // Step back over the partial symbol.
        while node != self.root {
            node = self.parents[node];
            idx -= 1;
        }
        idx
    }
}
