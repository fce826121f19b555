//! MVCC range cursors (spec.md §4.7): a path of `(page, index)` frames
//! pinned at a revision, independent of whatever `ReadTxn` built it.

use std::marker::PhantomData;
use std::sync::Arc;

use mavibot_codec::Codec;

use crate::error::Result;
use crate::page_codec::{decode_page, TreePage};
use crate::record_manager::RecordManagerInner;
use crate::tree::holder_values;
use crate::txn::{PageSource, ReadTxn};

/// A forward/backward range cursor over one tree's (or the duplicate-value
/// subtree's) ordered entries, holding its own revision pin the way
/// spec.md §5 describes a cursor outliving the transaction that opened it.
pub struct Cursor<K, V, KC, VC> {
    manager: Arc<RecordManagerInner>,
    revision: u64,
    /// The tree's root page ref at the pinned revision, kept around so
    /// `before_first`/`after_last` can rebuild the path without going back
    /// through a `Tree`.
    root_ref: u64,
    /// Root-to-leaf path: `(page_ref, position)`, where `position` is the
    /// active child index for a node frame and the active key index for
    /// the (always-last) leaf frame.
    frames: Vec<(u64, usize)>,
    /// Which of the current key's values `next()` will yield next.
    value_idx: usize,
    closed: bool,
    _marker: PhantomData<(K, V, KC, VC)>,
}

impl<K, V, KC, VC> Cursor<K, V, KC, VC>
where
    KC: Codec<K>,
    VC: Codec<V>,
{
    pub(crate) fn new(txn: &ReadTxn, root_ref: u64, frames: Vec<(u64, usize)>) -> Self {
        txn.manager.pin_revision(txn.revision);
        Self {
            manager: Arc::clone(&txn.manager),
            revision: txn.revision,
            root_ref,
            frames,
            value_idx: 0,
            closed: false,
            _marker: PhantomData,
        }
    }

    /// Position before the first key: the next [`Self::next`] call returns
    /// the tree's leftmost entry (spec.md §4.7 `before_first()`).
    pub fn before_first(&mut self) -> Result<()> {
        self.frames.clear();
        self.value_idx = 0;
        if self.root_ref != u64::MAX {
            self.descend_leftmost(self.root_ref)?;
        }
        Ok(())
    }

    /// Position after the last key: the next [`Self::prev`] call returns the
    /// tree's rightmost entry (spec.md §4.7 `after_last()`).
    pub fn after_last(&mut self) -> Result<()> {
        self.frames.clear();
        self.value_idx = 0;
        if self.root_ref != u64::MAX {
            self.descend_rightmost(self.root_ref)?;
            if let Some(last) = self.frames.last_mut() {
                last.1 += 1;
            }
        }
        Ok(())
    }

    fn fetch_leaf(&self, page_ref: u64) -> Result<mavibot_pager::Leaf<Vec<u8>, Vec<u8>>> {
        match self.fetch(page_ref)? {
            TreePage::Leaf(leaf) => Ok(leaf),
            TreePage::Node(_) => Err(crate::error::MaviError::CorruptPage { offset: page_ref }),
        }
    }

    fn fetch_node(&self, page_ref: u64) -> Result<mavibot_pager::Node<Vec<u8>>> {
        match self.fetch(page_ref)? {
            TreePage::Node(node) => Ok(node),
            TreePage::Leaf(_) => Err(crate::error::MaviError::CorruptPage { offset: page_ref }),
        }
    }

    fn descend_leftmost(&mut self, mut page_ref: u64) -> Result<()> {
        loop {
            match self.fetch(page_ref)? {
                TreePage::Leaf(_) => {
                    self.frames.push((page_ref, 0));
                    return Ok(());
                }
                TreePage::Node(node) => {
                    self.frames.push((page_ref, 0));
                    page_ref = node.children[0];
                }
            }
        }
    }

    fn descend_rightmost(&mut self, mut page_ref: u64) -> Result<()> {
        loop {
            match self.fetch(page_ref)? {
                TreePage::Leaf(leaf) => {
                    let idx = leaf.keys.len().saturating_sub(1);
                    self.frames.push((page_ref, idx));
                    return Ok(());
                }
                TreePage::Node(node) => {
                    let idx = node.children.len() - 1;
                    self.frames.push((page_ref, idx));
                    page_ref = node.children[idx];
                }
            }
        }
    }

    /// Move past the current leaf to the first key of the next leaf.
    /// Returns `false` if there is no next leaf.
    fn advance_to_next_leaf(&mut self) -> Result<bool> {
        self.frames.pop();
        while let Some((node_ref, child_idx)) = self.frames.pop() {
            let node = self.fetch_node(node_ref)?;
            if child_idx + 1 < node.children.len() {
                self.frames.push((node_ref, child_idx + 1));
                self.descend_leftmost(node.children[child_idx + 1])?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move before the current leaf to the last key of the previous leaf.
    /// Returns `false` if there is no previous leaf.
    fn retreat_to_prev_leaf(&mut self) -> Result<bool> {
        self.frames.pop();
        while let Some((node_ref, child_idx)) = self.frames.pop() {
            if child_idx > 0 {
                self.frames.push((node_ref, child_idx - 1));
                let node = self.fetch_node(node_ref)?;
                self.descend_rightmost(node.children[child_idx - 1])?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Return the next `(key, value)` pair and advance, or `None` at the end
    /// (spec.md §4.7 `next()`).
    pub fn next(&mut self) -> Result<Option<(K, V)>> {
        loop {
            let Some(&(leaf_ref, idx)) = self.frames.last() else {
                return Ok(None);
            };
            let leaf = self.fetch_leaf(leaf_ref)?;
            if idx >= leaf.keys.len() {
                if !self.advance_to_next_leaf()? {
                    return Ok(None);
                }
                self.value_idx = 0;
                continue;
            }
            let values = holder_values(self, &leaf.values[idx])?;
            if self.value_idx >= values.len() {
                let last = self.frames.last_mut().unwrap();
                last.1 += 1;
                self.value_idx = 0;
                continue;
            }
            let key_bytes = leaf.keys[idx].clone();
            let value_bytes = values[self.value_idx].clone();
            self.value_idx += 1;
            return Ok(Some((KC::decode(&key_bytes)?, VC::decode(&value_bytes)?)));
        }
    }

    /// Symmetric to [`Self::next`] (spec.md §4.7 `prev()`).
    pub fn prev(&mut self) -> Result<Option<(K, V)>> {
        loop {
            let Some(&(leaf_ref, idx)) = self.frames.last() else {
                return Ok(None);
            };
            if leaf_ref == u64::MAX {
                return Ok(None);
            }
            let leaf = self.fetch_leaf(leaf_ref)?;
            if leaf.keys.is_empty() {
                if !self.retreat_to_prev_leaf()? {
                    return Ok(None);
                }
                self.value_idx = 0;
                continue;
            }
            if idx >= leaf.keys.len() {
                // Positioned one past this (non-empty) leaf's last key —
                // the sentinel `after_last()` leaves behind, and the state
                // `next()` reaches once it has exhausted the whole tree.
                // Step back onto this leaf's own last key rather than
                // treating the leaf as already exhausted.
                self.frames.last_mut().unwrap().1 = leaf.keys.len() - 1;
                self.value_idx = 0;
                continue;
            }
            let values = holder_values(self, &leaf.values[idx])?;
            if self.value_idx >= values.len() {
                if idx == 0 {
                    if !self.retreat_to_prev_leaf()? {
                        return Ok(None);
                    }
                } else {
                    self.frames.last_mut().unwrap().1 = idx - 1;
                }
                self.value_idx = 0;
                continue;
            }
            let value_pos = values.len() - 1 - self.value_idx;
            let key_bytes = leaf.keys[idx].clone();
            let value_bytes = values[value_pos].clone();
            self.value_idx += 1;
            return Ok(Some((KC::decode(&key_bytes)?, VC::decode(&value_bytes)?)));
        }
    }

    pub fn has_next(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn has_prev(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Skip any remaining values of the current key and position at the
    /// start of the next distinct key (spec.md §4.7).
    pub fn move_to_next_non_duplicate_key(&mut self) -> Result<()> {
        if let Some(last) = self.frames.last_mut() {
            last.1 += 1;
        }
        self.value_idx = 0;
        Ok(())
    }

    /// Release this cursor's revision pin. Dropping the cursor does the
    /// same thing.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.manager.unpin_revision(self.revision);
        }
    }
}

impl<K, V, KC, VC> Drop for Cursor<K, V, KC, VC> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.manager.unpin_revision(self.revision);
        }
    }
}

impl<K, V, KC, VC> PageSource for Cursor<K, V, KC, VC> {
    fn fetch(&self, page_ref: u64) -> Result<TreePage> {
        let bytes = self.manager.page_io.read_record(page_ref)?;
        decode_page(&bytes)
    }
}

impl<K, V, KC, VC> Iterator for Cursor<K, V, KC, VC>
where
    KC: Codec<K>,
    VC: Codec<V>,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        match Cursor::next(self) {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
