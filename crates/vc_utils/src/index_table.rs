use core::borrow::Borrow;
use core::fmt::{self, Debug};
use core::hash::{BuildHasher, Hash};

use crate::hash::{Entry, FixedHashState, HashMap};

// -----------------------------------------------------------------------------
// IndexTable

/// Assigns consecutive `u32` indices to keys in first-seen order.
///
/// Indices can also be reserved without a key through [`reserve`], which
/// keeps numbering aligned with a peer that counts slots the same way but
/// has nothing to look them up by.
///
/// # Examples
///
/// ```
/// use vc_utils::IndexTable;
///
/// let mut table = IndexTable::new();
/// assert_eq!(table.get_or_insert("a"), (0, true));
/// assert_eq!(table.get_or_insert("b"), (1, true));
/// assert_eq!(table.get_or_insert("a"), (0, false));
/// assert_eq!(table.reserve(), 2);
/// assert_eq!(table.get_or_insert("c"), (3, true));
/// ```
///
/// [`reserve`]: IndexTable::reserve
pub struct IndexTable<K, S = FixedHashState> {
    map: HashMap<K, u32, S>,
    next: u32,
}

impl<K> IndexTable<K, FixedHashState> {
    /// Creates an empty table.
    #[inline]
    pub fn new() -> Self {
        Self {
            map: HashMap::with_hasher(FixedHashState),
            next: 0,
        }
    }
}

impl<K, S: Default> Default for IndexTable<K, S> {
    fn default() -> Self {
        Self {
            map: HashMap::with_hasher(S::default()),
            next: 0,
        }
    }
}

impl<K: Hash + Eq, S: BuildHasher> IndexTable<K, S> {
    /// Returns the index of `key` and whether it was assigned by this call.
    pub fn get_or_insert(&mut self, key: K) -> (u32, bool) {
        match self.map.entry(key) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => {
                let index = self.next;
                entry.insert(index);
                self.next += 1;
                (index, true)
            }
        }
    }

    /// Returns the index previously assigned to `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).copied()
    }

    /// Returns `true` if `key` has an index.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }
}

impl<K, S> IndexTable<K, S> {
    /// Consumes the next index without binding a key to it.
    #[inline]
    pub fn reserve(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }

    /// Number of indices handed out so far, reservations included.
    #[inline]
    pub fn len(&self) -> usize {
        self.next as usize
    }

    /// Returns `true` if no index has been handed out.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Forgets every key and restarts numbering at zero.
    ///
    /// Keeps the allocated memory for reuse.
    pub fn clear(&mut self) {
        self.map.clear();
        self.next = 0;
    }
}

impl<K: Debug, S> Debug for IndexTable<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::IndexTable;

    #[test]
    fn first_seen_order() {
        let mut table = IndexTable::new();
        for (expect, key) in [10_u64, 20, 30].into_iter().enumerate() {
            assert_eq!(table.get_or_insert(key), (expect as u32, true));
        }
        assert_eq!(table.get_or_insert(20), (1, false));
        assert_eq!(table.get(&30), Some(2));
        assert_eq!(table.get(&40), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn reservations_share_numbering() {
        let mut table = IndexTable::new();
        assert_eq!(table.reserve(), 0);
        assert_eq!(table.get_or_insert('x'), (1, true));
        assert_eq!(table.reserve(), 2);
        assert_eq!(table.len(), 3);
        assert!(!table.contains(&'y'));

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.get_or_insert('y'), (0, true));
    }
}
