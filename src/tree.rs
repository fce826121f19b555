//! B+tree operations (spec.md §4.3, §4.4, §4.6): the recursive byte-level
//! insert/delete/get/contains that compose `mavibot-pager`'s `Leaf`/`Node`
//! primitives with a write transaction's dirty-ref page store, plus the
//! typed `Tree<K, V, KC, VC>` handle the public API hands out.

use std::marker::PhantomData;

use mavibot_codec::Codec;
use mavibot_pager::{
    min_occupancy, Leaf, LeafInsertResult, Node, NodeDeleteResult, NodeInsertResult, ValueHolder,
};

use crate::error::{MaviError, Result};
use crate::page_codec::TreePage;
use crate::txn::{PageSource, ReadTxn, WriteTxn, NO_ROOT};
use crate::value_holder;

/// What a recursive insert reports back to its caller: the (possibly new)
/// ref for this subtree, whether the key/value set grew, and the prior
/// value at this key for non-duplicate trees.
struct InsertInfo {
    added: bool,
    prior_value: Option<Vec<u8>>,
}

enum InsertOutcome {
    Modified { new_ref: u64, info: InsertInfo },
    Split { left_ref: u64, pivot: Vec<u8>, right_ref: u64, info: InsertInfo },
}

fn insert_into(
    txn: &mut WriteTxn,
    page_ref: u64,
    key: Vec<u8>,
    value: Vec<u8>,
    fanout: u32,
    allow_duplicates: bool,
    up_threshold: u32,
    down_threshold: u32,
) -> Result<InsertOutcome> {
    let page = txn.fetch(page_ref)?;
    // Every path below replaces `page_ref` with a freshly stored page, so
    // the persisted original (if any) is superseded as of this revision
    // (spec.md §3 "Invariant (immutability)").
    txn.mark_copied(page_ref);
    match page {
        TreePage::Leaf(mut leaf) => {
            // `Leaf::insert` drops `value` without storing it when it
            // reports `AddToHolder` (the key already exists, so it never
            // touches the value array) — keep a clone so that branch still
            // has something to add to the holder.
            let value_clone = value.clone();
            match leaf.insert(key, value, fanout as usize) {
                LeafInsertResult::AddToHolder { index } => {
                    let info = if allow_duplicates {
                        let added =
                            value_holder::add_value(txn, &mut leaf.values[index], value_clone, fanout, up_threshold)?;
                        let _ = down_threshold;
                        InsertInfo { added, prior_value: None }
                    } else {
                        let old = leaf.values[index].first_inline().cloned();
                        leaf.values[index] = ValueHolder::singleton(value_clone);
                        InsertInfo { added: false, prior_value: old }
                    };
                    let new_ref = txn.store_leaf(leaf);
                    Ok(InsertOutcome::Modified { new_ref, info })
                }
                LeafInsertResult::Modified => {
                    let new_ref = txn.store_leaf(leaf);
                    Ok(InsertOutcome::Modified {
                        new_ref,
                        info: InsertInfo { added: true, prior_value: None },
                    })
                }
                LeafInsertResult::Split { pivot, right } => {
                    let left_ref = txn.store_leaf(leaf);
                    let right_ref = txn.store_leaf(right);
                    Ok(InsertOutcome::Split {
                        left_ref,
                        pivot,
                        right_ref,
                        info: InsertInfo { added: true, prior_value: None },
                    })
                }
            }
        }
        TreePage::Node(mut node) => {
            let idx = node.child_index(&key);
            let child_ref = node.children[idx];
            let outcome = insert_into(txn, child_ref, key, value, fanout, allow_duplicates, up_threshold, down_threshold)?;
            match outcome {
                InsertOutcome::Modified { new_ref, info } => {
                    node.children[idx] = new_ref;
                    let new_ref = txn.store_node(node);
                    Ok(InsertOutcome::Modified { new_ref, info })
                }
                InsertOutcome::Split { left_ref, pivot, right_ref, info } => {
                    node.children[idx] = left_ref;
                    match node.insert_child(idx, pivot, right_ref, fanout as usize) {
                        NodeInsertResult::Modified => {
                            let new_ref = txn.store_node(node);
                            Ok(InsertOutcome::Modified { new_ref, info })
                        }
                        NodeInsertResult::Split { pivot, right } => {
                            let left_ref = txn.store_node(node);
                            let right_ref = txn.store_node(right);
                            Ok(InsertOutcome::Split { left_ref, pivot, right_ref, info })
                        }
                    }
                }
            }
        }
    }
}

/// Insert `(key, value)` starting from `root_ref`, creating the first leaf
/// if the tree/subtree is empty and wrapping a new root on a root split.
pub(crate) fn insert_top(
    txn: &mut WriteTxn,
    root_ref: u64,
    key: Vec<u8>,
    value: Vec<u8>,
    fanout: u32,
    allow_duplicates: bool,
    up_threshold: u32,
    down_threshold: u32,
) -> Result<(u64, Option<Vec<u8>>)> {
    if root_ref == NO_ROOT {
        let mut leaf = Leaf::new(0, 0);
        leaf.keys.push(key);
        leaf.values.push(ValueHolder::singleton(value));
        return Ok((txn.store_leaf(leaf), None));
    }

    let outcome = insert_into(txn, root_ref, key, value, fanout, allow_duplicates, up_threshold, down_threshold)?;
    match outcome {
        InsertOutcome::Modified { new_ref, info } => Ok((new_ref, info.prior_value)),
        InsertOutcome::Split { left_ref, pivot, right_ref, info } => {
            let mut new_root = Node::new(0, 0);
            new_root.children.push(left_ref);
            new_root.keys.push(pivot);
            new_root.children.push(right_ref);
            Ok((txn.store_node(new_root), info.prior_value))
        }
    }
}

fn page_len(txn: &WriteTxn, page_ref: u64) -> Result<usize> {
    match txn.fetch(page_ref)? {
        TreePage::Leaf(leaf) => Ok(leaf.len()),
        TreePage::Node(node) => Ok(node.len()),
    }
}

enum DeleteOutcome {
    NotPresent,
    Ok { new_ref: u64, underflow: bool, removed_value: Option<Vec<u8>> },
}

fn borrow_left(txn: &mut WriteTxn, node: &mut Node<Vec<u8>>, idx: usize) -> Result<()> {
    let child_ref = node.children[idx];
    let sibling_ref = node.children[idx - 1];
    let child_page = txn.fetch(child_ref)?;
    let sibling_page = txn.fetch(sibling_ref)?;
    match (child_page, sibling_page) {
        (TreePage::Leaf(mut child), TreePage::Leaf(mut sibling)) => {
            let new_sep = child.borrow_from_left(&mut sibling);
            node.children[idx - 1] = txn.store_leaf(sibling);
            node.children[idx] = txn.store_leaf(child);
            node.keys[idx - 1] = new_sep;
        }
        (TreePage::Node(mut child), TreePage::Node(mut sibling)) => {
            let separator = node.keys[idx - 1].clone();
            let new_sep = child.borrow_from_left(&mut sibling, separator);
            node.children[idx - 1] = txn.store_node(sibling);
            node.children[idx] = txn.store_node(child);
            node.keys[idx - 1] = new_sep;
        }
        _ => return Err(MaviError::CorruptPage { offset: 0 }),
    }
    txn.mark_copied(child_ref);
    txn.mark_copied(sibling_ref);
    Ok(())
}

fn borrow_right(txn: &mut WriteTxn, node: &mut Node<Vec<u8>>, idx: usize) -> Result<()> {
    let child_ref = node.children[idx];
    let sibling_ref = node.children[idx + 1];
    let child_page = txn.fetch(child_ref)?;
    let sibling_page = txn.fetch(sibling_ref)?;
    match (child_page, sibling_page) {
        (TreePage::Leaf(mut child), TreePage::Leaf(mut sibling)) => {
            let new_sep = child.borrow_from_right(&mut sibling);
            node.children[idx] = txn.store_leaf(child);
            node.children[idx + 1] = txn.store_leaf(sibling);
            node.keys[idx] = new_sep;
        }
        (TreePage::Node(mut child), TreePage::Node(mut sibling)) => {
            let separator = node.keys[idx].clone();
            let new_sep = child.borrow_from_right(&mut sibling, separator);
            node.children[idx] = txn.store_node(child);
            node.children[idx + 1] = txn.store_node(sibling);
            node.keys[idx] = new_sep;
        }
        _ => return Err(MaviError::CorruptPage { offset: 0 }),
    }
    txn.mark_copied(child_ref);
    txn.mark_copied(sibling_ref);
    Ok(())
}

/// Sibling at `idx - 1` absorbs the underflowed child at `idx`.
fn merge_with_left(txn: &mut WriteTxn, node: &mut Node<Vec<u8>>, idx: usize, fanout: u32) -> Result<NodeDeleteResult> {
    let child_ref = node.children[idx];
    let sibling_ref = node.children[idx - 1];
    let separator = node.keys[idx - 1].clone();
    let child_page = txn.fetch(child_ref)?;
    let sibling_page = txn.fetch(sibling_ref)?;
    let merged_ref = match (sibling_page, child_page) {
        (TreePage::Leaf(mut sibling), TreePage::Leaf(child)) => {
            sibling.merge_from_right(child);
            txn.store_leaf(sibling)
        }
        (TreePage::Node(mut sibling), TreePage::Node(child)) => {
            sibling.merge_from_right(separator, child);
            txn.store_node(sibling)
        }
        _ => return Err(MaviError::CorruptPage { offset: 0 }),
    };
    txn.mark_copied(sibling_ref);
    txn.mark_copied(child_ref);
    node.children[idx - 1] = merged_ref;
    Ok(node.remove_entry(idx - 1, idx, fanout as usize))
}

/// Child at `idx` absorbs the underflowed sibling at `idx + 1`.
fn merge_with_right(txn: &mut WriteTxn, node: &mut Node<Vec<u8>>, idx: usize, fanout: u32) -> Result<NodeDeleteResult> {
    let child_ref = node.children[idx];
    let sibling_ref = node.children[idx + 1];
    let separator = node.keys[idx].clone();
    let child_page = txn.fetch(child_ref)?;
    let sibling_page = txn.fetch(sibling_ref)?;
    let merged_ref = match (child_page, sibling_page) {
        (TreePage::Leaf(mut child), TreePage::Leaf(sibling)) => {
            child.merge_from_right(sibling);
            txn.store_leaf(child)
        }
        (TreePage::Node(mut child), TreePage::Node(sibling)) => {
            child.merge_from_right(separator, sibling);
            txn.store_node(child)
        }
        _ => return Err(MaviError::CorruptPage { offset: 0 }),
    };
    txn.mark_copied(child_ref);
    txn.mark_copied(sibling_ref);
    node.children[idx] = merged_ref;
    Ok(node.remove_entry(idx, idx + 1, fanout as usize))
}

fn delete_from(
    txn: &mut WriteTxn,
    page_ref: u64,
    key: &[u8],
    value: Option<&[u8]>,
    fanout: u32,
    down_threshold: u32,
) -> Result<DeleteOutcome> {
    let page = txn.fetch(page_ref)?;
    match page {
        TreePage::Leaf(mut leaf) => {
            let idx = match leaf.keys.binary_search(&key.to_vec()) {
                Ok(i) => i,
                Err(_) => return Ok(DeleteOutcome::NotPresent),
            };
            let (remove_whole_key, removed_value) = match value {
                None => {
                    if let Some(subtree_ref) = leaf.values[idx].as_subtree() {
                        mark_subtree_abandoned(txn, subtree_ref)?;
                    }
                    (true, leaf.values[idx].first_inline().cloned())
                }
                Some(v) => {
                    let removed = value_holder::remove_value(txn, &mut leaf.values[idx], v, fanout, down_threshold)?;
                    if !removed {
                        return Ok(DeleteOutcome::NotPresent);
                    }
                    let empty = leaf.values[idx].inline_len() == Some(0);
                    (empty, Some(v.to_vec()))
                }
            };
            // Only now do we know this leaf is actually being replaced
            // (the `NotPresent` returns above leave `page_ref` untouched).
            txn.mark_copied(page_ref);

            if remove_whole_key {
                leaf.keys.remove(idx);
                leaf.values.remove(idx);
            }
            let underflow = leaf.keys.len() < min_occupancy(fanout as usize);
            let new_ref = txn.store_leaf(leaf);
            Ok(DeleteOutcome::Ok { new_ref, underflow, removed_value })
        }
        TreePage::Node(mut node) => {
            let idx = node.child_index(&key.to_vec());
            let child_ref = node.children[idx];
            let outcome = delete_from(txn, child_ref, key, value, fanout, down_threshold)?;
            let (child_new_ref, child_underflow, removed_value) = match outcome {
                DeleteOutcome::NotPresent => return Ok(DeleteOutcome::NotPresent),
                DeleteOutcome::Ok { new_ref, underflow, removed_value } => (new_ref, underflow, removed_value),
            };
            // The child subtree actually changed, so this node is being
            // replaced too (its `children[idx]` entry is about to move).
            txn.mark_copied(page_ref);
            node.children[idx] = child_new_ref;

            if !child_underflow {
                let new_ref = txn.store_node(node);
                return Ok(DeleteOutcome::Ok { new_ref, underflow: false, removed_value });
            }

            let has_left = idx > 0;
            let has_right = idx + 1 < node.children.len();
            let left_len = if has_left { page_len(txn, node.children[idx - 1])? } else { 0 };
            let right_len = if has_right { page_len(txn, node.children[idx + 1])? } else { 0 };
            let use_left = if has_left && has_right {
                left_len >= right_len
            } else {
                has_left
            };
            let min_occ = min_occupancy(fanout as usize);

            let (new_ref, underflow) = if use_left {
                if left_len > min_occ {
                    borrow_left(txn, &mut node, idx)?;
                    (txn.store_node(node), false)
                } else {
                    let result = merge_with_left(txn, &mut node, idx, fanout)?;
                    let underflow = matches!(result, NodeDeleteResult::Underflow);
                    (txn.store_node(node), underflow)
                }
            } else if right_len > min_occ {
                borrow_right(txn, &mut node, idx)?;
                (txn.store_node(node), false)
            } else {
                let result = merge_with_right(txn, &mut node, idx, fanout)?;
                let underflow = matches!(result, NodeDeleteResult::Underflow);
                (txn.store_node(node), underflow)
            };
            Ok(DeleteOutcome::Ok { new_ref, underflow, removed_value })
        }
    }
}

/// Delete `key` (or, when `value` is `Some`, just that one duplicate value)
/// starting from `root_ref`, collapsing an emptied root leaf or a
/// single-child root node as needed. Returns the new root ref, whether
/// anything was removed, and the removed value (when known).
pub(crate) fn delete_top(
    txn: &mut WriteTxn,
    root_ref: u64,
    key: &[u8],
    value: Option<&[u8]>,
    fanout: u32,
    _allow_duplicates: bool,
    down_threshold: u32,
) -> Result<(u64, bool, Option<Vec<u8>>)> {
    if root_ref == NO_ROOT {
        return Ok((NO_ROOT, false, None));
    }
    let outcome = delete_from(txn, root_ref, key, value, fanout, down_threshold)?;
    let (mut new_ref, removed_value) = match outcome {
        DeleteOutcome::NotPresent => return Ok((root_ref, false, None)),
        DeleteOutcome::Ok { new_ref, removed_value, .. } => (new_ref, removed_value),
    };

    match txn.fetch(new_ref)? {
        TreePage::Leaf(leaf) if leaf.is_empty() => new_ref = NO_ROOT,
        TreePage::Node(node) if node.len() == 0 => new_ref = node.children[0],
        _ => {}
    }
    Ok((new_ref, true, removed_value))
}

/// Collect every key of a Set-mode subtree (a duplicate-value holder's
/// secondary tree, where the key *is* the value) in ascending order.
pub(crate) fn raw_collect_all(txn: &WriteTxn, root_ref: u64) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    if root_ref != NO_ROOT {
        collect_into(txn, root_ref, &mut out)?;
    }
    Ok(out)
}

fn collect_into(txn: &WriteTxn, page_ref: u64, out: &mut Vec<Vec<u8>>) -> Result<()> {
    match txn.fetch(page_ref)? {
        TreePage::Leaf(leaf) => out.extend(leaf.keys),
        TreePage::Node(node) => {
            for child in node.children {
                collect_into(txn, child, out)?;
            }
        }
    }
    Ok(())
}

/// Mark every page of a whole subtree as superseded, the way a single
/// modified page is marked via `mark_copied` — used when a duplicate-value
/// holder's secondary subtree is discarded wholesale (the whole key it
/// belonged to was deleted, or it collapsed back to an inline holder) so
/// every page it still occupies, not just the ones a targeted delete
/// happened to touch, becomes eligible for reclamation (spec.md §4.5).
pub(crate) fn mark_subtree_abandoned(txn: &mut WriteTxn, root_ref: u64) -> Result<()> {
    if root_ref == NO_ROOT {
        return Ok(());
    }
    let page = txn.fetch(root_ref)?;
    txn.mark_copied(root_ref);
    if let TreePage::Node(node) = page {
        for child in node.children {
            mark_subtree_abandoned(txn, child)?;
        }
    }
    Ok(())
}

/// Read-side lookup that works against any [`PageSource`] (a `ReadTxn` or a
/// `WriteTxn` reading back its own uncommitted writes).
fn get_from<S: PageSource>(source: &S, page_ref: u64, key: &[u8]) -> Result<Option<ValueHolder<Vec<u8>>>> {
    if page_ref == NO_ROOT {
        return Ok(None);
    }
    match source.fetch(page_ref)? {
        TreePage::Leaf(leaf) => Ok(leaf.get(&key.to_vec()).cloned()),
        TreePage::Node(node) => {
            let idx = node.child_index(&key.to_vec());
            get_from(source, node.children[idx], key)
        }
    }
}

/// All values in ascending codec order for a holder, resolving a `Subtree`
/// by walking its secondary tree.
pub(crate) fn holder_values<S: PageSource>(source: &S, holder: &ValueHolder<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
    match holder {
        ValueHolder::Inline(values) => Ok(values.clone()),
        ValueHolder::Subtree(root) => {
            let mut out = Vec::new();
            collect_into_generic(source, *root, &mut out)?;
            Ok(out)
        }
    }
}

fn collect_into_generic<S: PageSource>(source: &S, page_ref: u64, out: &mut Vec<Vec<u8>>) -> Result<()> {
    if page_ref == NO_ROOT {
        return Ok(());
    }
    match source.fetch(page_ref)? {
        TreePage::Leaf(leaf) => out.extend(leaf.keys),
        TreePage::Node(node) => {
            for child in node.children {
                collect_into_generic(source, child, out)?;
            }
        }
    }
    Ok(())
}

/// Walk the full leftmost path of a tree rooted at `root_ref`, returning the
/// stack of `(page_ref, TreePage, index)` frames `Cursor` needs, positioned
/// at the first entry.
pub(crate) fn leftmost_path<S: PageSource>(source: &S, root_ref: u64) -> Result<Vec<(u64, TreePage, usize)>> {
    let mut frames = Vec::new();
    let mut cur = root_ref;
    loop {
        if cur == NO_ROOT {
            return Ok(Vec::new());
        }
        let page = source.fetch(cur)?;
        match &page {
            TreePage::Leaf(_) => {
                frames.push((cur, page, 0));
                return Ok(frames);
            }
            TreePage::Node(node) => {
                let child = node.children[0];
                frames.push((cur, page, 0));
                cur = child;
            }
        }
    }
}

/// Descend to the first key ≥ `key`, returning the same frame-stack shape
/// as [`leftmost_path`].
pub(crate) fn seek_path<S: PageSource>(source: &S, root_ref: u64, key: &[u8]) -> Result<Vec<(u64, TreePage, usize)>> {
    let mut frames = Vec::new();
    let mut cur = root_ref;
    loop {
        if cur == NO_ROOT {
            return Ok(Vec::new());
        }
        let page = source.fetch(cur)?;
        match &page {
            TreePage::Leaf(leaf) => {
                let idx = match leaf.keys.binary_search(&key.to_vec()) {
                    Ok(i) => i,
                    Err(i) => i,
                };
                frames.push((cur, page, idx));
                return Ok(frames);
            }
            TreePage::Node(node) => {
                let idx = node.child_index(&key.to_vec());
                let child = node.children[idx];
                frames.push((cur, page, idx));
                cur = child;
            }
        }
    }
}

/// A typed handle onto one named B+tree. Thin: it only knows how to encode
/// keys/values and delegates tree shape/storage to the byte-level functions
/// above, the way `find_pos`/`insert`/`delete` operate purely on ordered
/// byte strings in spec.md §4.3/§4.4.
pub struct Tree<K, V, KC, VC> {
    name: String,
    _marker: PhantomData<(K, V, KC, VC)>,
}

impl<K, V, KC, VC> Tree<K, V, KC, VC>
where
    KC: Codec<K>,
    VC: Codec<V>,
    K: Ord + Clone,
{
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, txn: &mut WriteTxn, key: &K, value: &V) -> Result<Option<V>> {
        let state = txn.tree_state(&self.name)?;
        let fanout = state.fanout;
        let allow_duplicates = state.allow_duplicates;
        let up = state.up_threshold;
        let down = state.down_threshold;
        let root_ref = state.root_ref;

        let key_bytes = KC::encode(key);
        let value_bytes = VC::encode(value);
        let (new_root, prior_bytes) =
            insert_top(txn, root_ref, key_bytes, value_bytes, fanout, allow_duplicates, up, down)?;

        let state = txn.tree_state(&self.name)?;
        state.root_ref = new_root;
        if prior_bytes.is_none() {
            state.element_count += 1;
        }
        txn.mark_touched(&self.name);

        match prior_bytes {
            Some(bytes) => Ok(Some(VC::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, txn: &ReadTxn, key: &K) -> Result<V> {
        let header = txn.tree_header(&self.name)?;
        let key_bytes = KC::encode(key);
        let holder = get_from(txn, header.root_offset, &key_bytes)?.ok_or(MaviError::KeyNotFound)?;
        let first = holder.first_inline_resolved(txn)?.ok_or(MaviError::KeyNotFound)?;
        VC::decode(&first).map_err(Into::into)
    }

    pub fn contains(&self, txn: &ReadTxn, key: &K, value: &V) -> Result<bool> {
        let header = txn.tree_header(&self.name)?;
        let key_bytes = KC::encode(key);
        let value_bytes = VC::encode(value);
        match get_from(txn, header.root_offset, &key_bytes)? {
            None => Ok(false),
            Some(holder) => Ok(holder_values(txn, &holder)?.contains(&value_bytes)),
        }
    }

    pub fn delete(&self, txn: &mut WriteTxn, key: &K, value: Option<&V>) -> Result<bool> {
        let state = txn.tree_state(&self.name)?;
        let fanout = state.fanout;
        let allow_duplicates = state.allow_duplicates;
        let down = state.down_threshold;
        let root_ref = state.root_ref;

        let key_bytes = KC::encode(key);
        let value_bytes = value.map(VC::encode);
        let (new_root, removed, _) =
            delete_top(txn, root_ref, &key_bytes, value_bytes.as_deref(), fanout, allow_duplicates, down)?;

        let state = txn.tree_state(&self.name)?;
        state.root_ref = new_root;
        if removed {
            state.element_count = state.element_count.saturating_sub(1);
        }
        txn.mark_touched(&self.name);
        Ok(removed)
    }

    pub fn nb_elems(&self, txn: &ReadTxn) -> Result<u64> {
        Ok(txn.tree_header(&self.name)?.element_count)
    }

    pub fn browse(&self, txn: &ReadTxn, from_key: Option<&K>) -> Result<crate::cursor::Cursor<K, V, KC, VC>> {
        let header = txn.tree_header(&self.name)?;
        let frames = match from_key {
            Some(key) => seek_path(txn, header.root_offset, &KC::encode(key))?,
            None => leftmost_path(txn, header.root_offset)?,
        };
        let positions = frames.into_iter().map(|(page_ref, _, idx)| (page_ref, idx)).collect();
        Ok(crate::cursor::Cursor::new(txn, header.root_offset, positions))
    }
}

trait HolderExt {
    fn first_inline_resolved<S: PageSource>(&self, source: &S) -> Result<Option<Vec<u8>>>;
}

impl HolderExt for ValueHolder<Vec<u8>> {
    fn first_inline_resolved<S: PageSource>(&self, source: &S) -> Result<Option<Vec<u8>>> {
        match self {
            ValueHolder::Inline(values) => Ok(values.first().cloned()),
            ValueHolder::Subtree(root) => {
                let frames = leftmost_path(source, *root)?;
                match frames.into_iter().next_back() {
                    Some((_, TreePage::Leaf(leaf), idx)) => Ok(leaf.keys.get(idx).cloned()),
                    _ => Ok(None),
                }
            }
        }
    }
}
