use alloc::vec;
use alloc::vec::Vec;

use crate::{min_occupancy, value_holder::ValueHolder};

/// A leaf page of a B+tree: an ordered key array with a parallel array of
/// value holders (see [`ValueHolder`]).
///
/// `id` is the logical page id assigned by the writer that created this
/// revision of the page (stable within a single write transaction); it has
/// no meaning once the page has been serialized to its final file offset.
#[derive(Debug, Clone)]
pub struct Leaf<K, V> {
    pub id: u64,
    pub revision: u64,
    pub keys: Vec<K>,
    pub values: Vec<ValueHolder<V>>,
}

/// Outcome of [`Leaf::insert`].
pub enum LeafInsertResult<K, V> {
    /// `key` already had an entry at `index`; the caller is responsible for
    /// adding `value` to that entry's [`ValueHolder`] (which may trigger the
    /// inline/subtree transition from spec §4.5 — that requires storage
    /// access this crate doesn't have).
    AddToHolder { index: usize },
    /// The new key was inserted in place; no further action is needed.
    Modified,
    /// The page was at capacity; it was split into this page (left half,
    /// unchanged) and `right` (the new page), separated by `pivot`.
    Split { pivot: K, right: Leaf<K, V> },
}

/// Outcome of [`Leaf::delete_key`] once the caller has determined removal is
/// unconditional (holder already emptied, or a whole-key delete was asked
/// for).
pub enum LeafDeleteResult {
    /// The leaf still meets minimum occupancy; nothing more to do.
    Removed,
    /// The leaf fell below minimum occupancy and must be rebalanced by
    /// borrowing from or merging with a sibling (decided by the caller, who
    /// has access to the siblings).
    Underflow,
}

impl<K: Ord + Clone, V> Leaf<K, V> {
    pub fn new(id: u64, revision: u64) -> Self {
        Self {
            id,
            revision,
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Binary search for `key`. Mirrors the encoding spec.md §4.3 describes
    /// for `find_pos`: a found key at index `i` is returned as `-(i+1)`; an
    /// absent key returns its non-negative insertion index.
    pub fn find_pos(&self, key: &K) -> isize {
        match self.keys.binary_search(key) {
            Ok(i) => -((i as isize) + 1),
            Err(i) => i as isize,
        }
    }

    pub fn get(&self, key: &K) -> Option<&ValueHolder<V>> {
        self.keys.binary_search(key).ok().map(|i| &self.values[i])
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut ValueHolder<V>> {
        match self.keys.binary_search(key) {
            Ok(i) => Some(&mut self.values[i]),
            Err(_) => None,
        }
    }

    /// Insert a brand new key with a singleton value holder, or report that
    /// `key` already exists so the caller can extend its holder instead.
    pub fn insert(&mut self, key: K, value: V, fanout: usize) -> LeafInsertResult<K, V> {
        let pos = self.find_pos(&key);
        if pos < 0 {
            let idx = (-(pos + 1)) as usize;
            return LeafInsertResult::AddToHolder { index: idx };
        }
        let idx = pos as usize;
        self.keys.insert(idx, key);
        self.values.insert(idx, ValueHolder::singleton(value));

        if self.keys.len() <= fanout {
            return LeafInsertResult::Modified;
        }

        let split_at = min_occupancy(fanout);
        let right_keys = self.keys.split_off(split_at);
        let right_values = self.values.split_off(split_at);
        let pivot = right_keys[0].clone();
        let right = Leaf {
            id: 0,
            revision: self.revision,
            keys: right_keys,
            values: right_values,
        };
        LeafInsertResult::Split { pivot, right }
    }

    /// Remove `key` and its whole value holder unconditionally.
    pub fn delete_key(&mut self, key: &K, fanout: usize) -> Option<(ValueHolder<V>, LeafDeleteResult)> {
        let idx = self.keys.binary_search(key).ok()?;
        self.keys.remove(idx);
        let holder = self.values.remove(idx);
        let result = if self.keys.len() >= min_occupancy(fanout) {
            LeafDeleteResult::Removed
        } else {
            LeafDeleteResult::Underflow
        };
        Some((holder, result))
    }

    pub fn find_left_most(&self) -> Option<(&K, &ValueHolder<V>)> {
        Some((self.keys.first()?, self.values.first()?))
    }

    pub fn find_right_most(&self) -> Option<(&K, &ValueHolder<V>)> {
        Some((self.keys.last()?, self.values.last()?))
    }

    /// Move the last entry of `left` onto the front of `self`. Returns the
    /// new separator key, which is the leftmost key of `self` after the move
    /// (spec.md §4.3 "Separator-key maintenance").
    pub fn borrow_from_left(&mut self, left: &mut Leaf<K, V>) -> K {
        let key = left.keys.pop().expect("left sibling must be non-empty to borrow from");
        let value = left.values.pop().expect("left sibling must be non-empty to borrow from");
        self.keys.insert(0, key);
        self.values.insert(0, value);
        self.keys[0].clone()
    }

    /// Move the first entry of `right` onto the back of `self`. Returns the
    /// new separator key: the leftmost key of `right` after the move.
    pub fn borrow_from_right(&mut self, right: &mut Leaf<K, V>) -> K {
        let key = right.keys.remove(0);
        let value = right.values.remove(0);
        self.keys.push(key);
        self.values.push(value);
        right.keys[0].clone()
    }

    /// Absorb `right`'s entries onto the end of `self`. The caller discards
    /// the separator key that used to sit between them and drops `right`'s
    /// page.
    pub fn merge_from_right(&mut self, mut right: Leaf<K, V>) {
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_of(keys: &[i32]) -> Leaf<i32, &'static str> {
        let mut leaf = Leaf::new(1, 0);
        for &k in keys {
            leaf.insert(k, "v", usize::MAX);
        }
        leaf
    }

    #[test]
    fn find_pos_encodes_found_and_absent() {
        let leaf = leaf_of(&[2, 4, 6]);
        assert_eq!(leaf.find_pos(&4), -2);
        assert_eq!(leaf.find_pos(&3), 1);
        assert_eq!(leaf.find_pos(&0), 0);
        assert_eq!(leaf.find_pos(&7), 3);
    }

    #[test]
    fn insert_splits_at_fanout() {
        let mut leaf = Leaf::new(1, 0);
        for k in 1..=4 {
            match leaf.insert(k, k * 10, 4) {
                LeafInsertResult::Modified => {}
                _ => panic!("leaf below fanout should not split"),
            }
        }
        match leaf.insert(5, 50, 4) {
            LeafInsertResult::Split { pivot, right } => {
                assert_eq!(pivot, 3);
                assert_eq!(leaf.keys, vec![1, 2]);
                assert_eq!(right.keys, vec![3, 4, 5]);
            }
            _ => panic!("leaf at fanout should split"),
        }
    }

    #[test]
    fn insert_existing_key_asks_caller_to_extend_holder() {
        let mut leaf = leaf_of(&[1, 2, 3]);
        match leaf.insert(2, "w", 8) {
            LeafInsertResult::AddToHolder { index } => assert_eq!(index, 1),
            _ => panic!("existing key must not grow the key array"),
        }
    }

    #[test]
    fn delete_key_reports_underflow_below_minimum_occupancy() {
        let mut leaf = leaf_of(&[1, 2]);
        let (_, result) = leaf.delete_key(&1, 4).unwrap();
        assert!(matches!(result, LeafDeleteResult::Underflow));
    }

    #[test]
    fn borrow_from_left_moves_separator() {
        let mut left = leaf_of(&[1, 2, 3]);
        let mut right = leaf_of(&[10]);
        let new_sep = right.borrow_from_left(&mut left);
        assert_eq!(new_sep, 3);
        assert_eq!(left.keys, vec![1, 2]);
        assert_eq!(right.keys, vec![3, 10]);
    }

    #[test]
    fn merge_from_right_concatenates() {
        let mut left = leaf_of(&[1, 2]);
        let right = leaf_of(&[3, 4]);
        left.merge_from_right(right);
        assert_eq!(left.keys, vec![1, 2, 3, 4]);
    }
}
