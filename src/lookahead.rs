//! Lookahead decode table.
//!
//! For every internal node and every value of a `LOOKAHEAD_BITS`-wide window,
//! records the symbols fully decoded while walking that window from the node
//! and the node reached after the last bit. A leaf reached mid-window emits its
//! symbol and the walk restarts at the root, so the resulting node is always
//! internal. The table is a pure function of tree topology.

use crate::format::{LOOKAHEAD_BITS, LOOKAHEAD_ENTRIES};
use crate::tree::HuffmanTree;

/// One precomputed window walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Step {
    symbols: [u8; LOOKAHEAD_BITS],
    count: u8,
    node: u16,
}

impl Step {
    /// Symbols completed inside the window, in stream order.
    #[inline]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols[..self.count as usize]
    }

    /// Internal node the walk ends on.
    #[inline]
    pub fn node(&self) -> usize {
        self.node as usize
    }
}

#[derive(Debug, Clone)]
pub struct LookaheadTable {
    first_internal: usize,
    steps: Vec<Step>,
}

impl LookaheadTable {
    pub fn build(tree: &HuffmanTree) -> Self {
        let internals = tree.internal_nodes();
        let mut steps = Vec::with_capacity(internals.len() * LOOKAHEAD_ENTRIES);

        for start in internals.clone() {
            for window in 0..LOOKAHEAD_ENTRIES {
                let mut step = Step::default();
                let mut node = start;
                let mut path = window;
                for _ in 0..LOOKAHEAD_BITS {
                    node = tree.child(node, path & 1 == 1);
                    if let Some(sym) = tree.symbol(node) {
                        step.symbols[step.count as usize] = sym;
                        step.count += 1;
                        node = tree.root();
                    }
                    path >>= 1;
                }
                step.node = node as u16;
                steps.push(step);
            }
        }

        LookaheadTable { first_internal: internals.start, steps }
    }

    /// Walk for `window` (first bit in the lowest position) from internal `node`.
    #[inline]
    pub fn step(&self, node: usize, window: usize) -> &Step {
        &self.steps[(node - self.first_internal) * LOOKAHEAD_ENTRIES + window]
    }

    /// Number of entries, `LOOKAHEAD_ENTRIES` per internal node.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
