//! Growable bit vector indexed by dense ids.
//!
//! Node ids keep growing while passes run (reductions create nodes), so every
//! per-id mark set must tolerate indices past its initial size. Reads beyond
//! the end yield `false`; writes grow the storage by roughly 1.5x.

/// Dense set of `usize` indices backed by 64-bit words.
#[derive(Debug, Clone, Default)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// Create a bit vector covering `len` indices, all cleared.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of indices currently covered without growing.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `index` is set. Out of range reads are `false`.
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.words[index / 64] >> (index % 64)) & 1 != 0
    }

    /// Set or clear `index`, growing the vector when needed.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.len {
            if !value {
                return;
            }
            self.grow(index);
        }
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Set `index`.
    pub fn insert(&mut self, index: usize) {
        self.set(index, true);
    }

    /// Clear every bit without shrinking.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterator over the set indices in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }

    fn grow(&mut self, index: usize) {
        let new_len = ((3 * index) / 2).max(index + 1);
        self.words.resize(new_len.div_ceil(64), 0);
        self.len = new_len;
    }
}
