//! A growable bit set over dense node indices.
//!
//! The dependency analyzer hands out node ids sequentially, so a bit per id is the
//! cheapest way to track per-node state such as "already expanded". The set grows on
//! insertion; querying an index beyond the current capacity simply reports `false`.
//!
//! # Example
//!
//! ```rust,ignore
//! use dotaot::utils::BitSet;
//!
//! let mut set = BitSet::new();
//! assert!(set.insert(3));
//! assert!(!set.insert(3));
//! assert!(set.contains(3));
//! assert!(!set.contains(1000));
//! ```

/// A growable bit set
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` bits before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        BitSet {
            words: Vec::with_capacity(capacity.div_ceil(64)),
        }
    }

    /// Sets bit `index`, growing the set if needed. Returns `true` if the bit was clear.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Clears bit `index`. Returns `true` if the bit was set.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        match self.words.get_mut(word) {
            Some(bits) if *bits & mask != 0 => {
                *bits &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if bit `index` is set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words.get(word).is_some_and(|bits| bits & mask != 0)
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets every bit of `other` in `self`. Returns `true` if `self` changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a |= *b;
            changed |= old != *a;
        }
        changed
    }

    /// Iterates the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| {
                let mut remaining = word;
                std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let bit = remaining.trailing_zeros() as usize;
                    remaining &= remaining - 1;
                    Some(word_idx * 64 + bit)
                })
            })
    }

    fn locate(index: usize) -> (usize, u64) {
        (index / 64, 1u64 << (index % 64))
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_grows() {
        let mut set = BitSet::new();
        assert!(set.is_empty());
        assert!(set.insert(0));
        assert!(set.insert(200));
        assert!(!set.insert(200));
        assert!(set.contains(0));
        assert!(set.contains(200));
        assert!(!set.contains(199));
        assert!(!set.contains(100_000));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn remove() {
        let mut set = BitSet::with_capacity(10);
        set.insert(5);
        assert!(set.remove(5));
        assert!(!set.remove(5));
        assert!(!set.remove(1000));
        assert!(set.is_empty());
    }

    #[test]
    fn iter_is_ascending() {
        let mut set = BitSet::new();
        for i in [130, 3, 64, 63] {
            set.insert(i);
        }
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 63, 64, 130]);
        assert_eq!(format!("{set:?}"), "{3, 63, 64, 130}");
    }

    #[test]
    fn union_grows_and_reports_change() {
        let mut a = BitSet::new();
        let mut b = BitSet::new();
        a.insert(1);
        b.insert(1);
        assert!(!a.union_with(&b));
        b.insert(500);
        assert!(a.union_with(&b));
        assert!(a.contains(500));
    }
}
