//! Read/write transaction handles (spec.md §4.6) and the dirty-ref scheme
//! that lets a page reference mean either "offset in the file" or "id into
//! this write transaction's still-in-memory dirty set" without changing
//! `mavibot-pager`'s `Node.children`/`ValueHolder::Subtree` shape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use crate::error::{MaviError, Result};
use crate::header::{GlobalHeader, TreeHeader};
use crate::page_codec::{decode_page, encode_page, TreePage};
use crate::record_manager::RecordManagerInner;

/// Sentinel root offset for a tree (or value-holder subtree) with no pages
/// yet — the empty-tree state.
pub(crate) const NO_ROOT: u64 = u64::MAX;

/// High bit marking a page reference as a dirty-set id rather than a file
/// offset. Real file offsets never use this bit: the backing file would
/// need to exceed 2^63 pages first.
const DIRTY_FLAG: u64 = 1 << 63;

pub(crate) fn is_dirty(page_ref: u64) -> bool {
    page_ref & DIRTY_FLAG != 0
}

pub(crate) fn dirty_id(page_ref: u64) -> u64 {
    page_ref & !DIRTY_FLAG
}

pub(crate) fn make_dirty(id: u64) -> u64 {
    id | DIRTY_FLAG
}

/// Resolves a page reference to its decoded contents, without caring
/// whether the backing bytes are already on disk or still sitting in a
/// write transaction's dirty set.
pub(crate) trait PageSource {
    fn fetch(&self, page_ref: u64) -> Result<TreePage>;
}

/// A snapshot read transaction: a pinned revision and the per-tree root
/// offsets captured at `begin_read` time. Every subsequent fetch resolves
/// through those offsets, so later commits are invisible to it (spec.md
/// §4.6: "capture ... the set of per-tree root offsets from the header at
/// the time of begin_read"). A commit rewrites a tree's header page in
/// place, so reading that page live would leak later writes into an
/// already-open snapshot — the per-tree headers below are read once, here,
/// and never touched again.
pub struct ReadTxn {
    pub(crate) manager: Arc<RecordManagerInner>,
    pub(crate) revision: u64,
    trees: HashMap<String, TreeHeader>,
    closed: bool,
}

impl ReadTxn {
    pub(crate) fn new(manager: Arc<RecordManagerInner>) -> Result<Self> {
        let header = manager.header_snapshot();
        manager.pin_revision(header.revision);
        debug!("begin_read pinned revision {}", header.revision);

        let mut trees = HashMap::with_capacity(header.trees.len());
        for entry in &header.trees {
            let bytes = manager.page_io.read_record(entry.header_offset)?;
            trees.insert(entry.name.clone(), TreeHeader::parse(&bytes)?);
        }

        Ok(Self {
            manager,
            revision: header.revision,
            trees,
            closed: false,
        })
    }

    pub(crate) fn tree_header(&self, name: &str) -> Result<TreeHeader> {
        self.trees
            .get(name)
            .cloned()
            .ok_or_else(|| MaviError::NoSuchTree(name.to_string()))
    }

    /// Release the revision pin early. Dropping a `ReadTxn` does the same
    /// thing; this is the explicit form spec.md §4.7's `Cursor::close` and
    /// §5's "close_cursor" language call out.
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

impl Drop for ReadTxn {
    fn drop(&mut self) {
        self.release();
    }
}

impl PageSource for ReadTxn {
    fn fetch(&self, page_ref: u64) -> Result<TreePage> {
        debug_assert!(!is_dirty(page_ref), "a read txn should never see a dirty ref");
        let bytes = self.manager.page_io.read_record(page_ref)?;
        decode_page(&bytes)
    }
}

/// Per-tree state a write transaction accumulates as operations touch it.
/// Loaded lazily from the base header the first time a tree is named.
pub(crate) struct TreeWorkingState {
    pub(crate) header_offset: u64,
    pub(crate) root_ref: u64,
    pub(crate) revision: u64,
    pub(crate) fanout: u32,
    pub(crate) allow_duplicates: bool,
    pub(crate) is_internal_subtree: bool,
    pub(crate) key_codec_tag: Vec<u8>,
    pub(crate) value_codec_tag: Vec<u8>,
    pub(crate) element_count: u64,
    pub(crate) up_threshold: u32,
    pub(crate) down_threshold: u32,
    touched: bool,
}

/// A write transaction: the dirty-page map, the set of persisted pages it
/// has superseded, and the per-tree root/state it is building up toward a
/// new revision (spec.md §3 "Transaction (write)").
pub struct WriteTxn {
    pub(crate) manager: Arc<RecordManagerInner>,
    base_header: GlobalHeader,
    pub(crate) revision: u64,
    dirty: HashMap<u64, TreePage>,
    next_dirty_id: u64,
    copied: HashSet<u64>,
    free_list_head: u64,
    pub(crate) trees: HashMap<String, TreeWorkingState>,
    finished: bool,
}

impl WriteTxn {
    pub(crate) fn new(manager: Arc<RecordManagerInner>) -> Result<Self> {
        let base_header = manager.header_snapshot();
        let revision = base_header.revision + 1;
        let free_list_head = base_header.free_list_head;
        debug!("begin_write targeting revision {revision}");
        Ok(Self {
            manager,
            base_header,
            revision,
            dirty: HashMap::new(),
            next_dirty_id: 0,
            copied: HashSet::new(),
            free_list_head,
            trees: HashMap::new(),
            finished: false,
        })
    }

    fn new_dirty_id(&mut self) -> u64 {
        let id = self.next_dirty_id;
        self.next_dirty_id += 1;
        make_dirty(id)
    }

    pub(crate) fn store_leaf(&mut self, mut leaf: mavibot_pager::Leaf<Vec<u8>, Vec<u8>>) -> u64 {
        leaf.revision = self.revision;
        let id = self.new_dirty_id();
        leaf.id = id;
        self.dirty.insert(dirty_id(id), TreePage::Leaf(leaf));
        id
    }

    pub(crate) fn store_node(&mut self, mut node: mavibot_pager::Node<Vec<u8>>) -> u64 {
        node.revision = self.revision;
        let id = self.new_dirty_id();
        node.id = id;
        self.dirty.insert(dirty_id(id), TreePage::Node(node));
        id
    }

    /// Remember that the persisted page at `page_ref` has been superseded,
    /// so it can be reclaimed once no reader still needs this revision. A
    /// ref into this same transaction's own dirty set was never written to
    /// disk and needs no bookkeeping.
    pub(crate) fn mark_copied(&mut self, page_ref: u64) {
        if !is_dirty(page_ref) {
            self.copied.insert(page_ref);
        }
    }

    /// Load (or return the already-loaded) working state for a named tree.
    pub(crate) fn load_tree(&mut self, name: &str) -> Result<()> {
        if self.trees.contains_key(name) {
            return Ok(());
        }
        let entry = self
            .base_header
            .trees
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| MaviError::NoSuchTree(name.to_string()))?;
        let bytes = self.manager.page_io.read_record(entry.header_offset)?;
        let header = TreeHeader::parse(&bytes)?;
        self.trees.insert(
            name.to_string(),
            TreeWorkingState {
                header_offset: entry.header_offset,
                root_ref: header.root_offset,
                revision: header.revision,
                fanout: header.fanout,
                allow_duplicates: header.allow_duplicates(),
                is_internal_subtree: header.is_internal_subtree(),
                key_codec_tag: header.key_codec_tag,
                value_codec_tag: header.value_codec_tag,
                element_count: header.element_count,
                up_threshold: header.up_threshold,
                down_threshold: header.down_threshold,
                touched: false,
            },
        );
        Ok(())
    }

    pub(crate) fn tree_state(&mut self, name: &str) -> Result<&mut TreeWorkingState> {
        self.load_tree(name)?;
        Ok(self.trees.get_mut(name).expect("just loaded"))
    }

    pub(crate) fn mark_touched(&mut self, name: &str) {
        if let Some(state) = self.trees.get_mut(name) {
            state.touched = true;
        }
    }

    /// Resolve `page_ref` to its page id once it's been fully materialized
    /// to a file offset. Recurses children-before-parents so an internal
    /// node is only serialized once every child ref it holds is a real file
    /// offset (spec.md §4.6 step 2).
    fn materialize_page(&mut self, page_ref: u64, resolved: &mut HashMap<u64, u64>) -> Result<u64> {
        if !is_dirty(page_ref) {
            return Ok(page_ref);
        }
        let id = dirty_id(page_ref);
        if let Some(&offset) = resolved.get(&id) {
            return Ok(offset);
        }

        let mut page = self
            .dirty
            .remove(&id)
            .ok_or(MaviError::CorruptPage { offset: 0 })?;

        match &mut page {
            TreePage::Leaf(leaf) => {
                for holder in leaf.values.iter_mut() {
                    if let mavibot_pager::ValueHolder::Subtree(subtree_ref) = holder {
                        *subtree_ref = self.materialize_page(*subtree_ref, resolved)?;
                    }
                }
            }
            TreePage::Node(node) => {
                for child in node.children.iter_mut() {
                    *child = self.materialize_page(*child, resolved)?;
                }
            }
        }

        let bytes = encode_page(&page);
        let n = self.manager.page_io.pages_needed(bytes.len());
        let (offsets, new_head) = self.manager.page_io.allocate(n, self.free_list_head)?;
        self.free_list_head = new_head;
        self.manager.page_io.write_record(&offsets, &bytes)?;
        let offset = offsets[0];
        resolved.insert(id, offset);
        Ok(offset)
    }

    /// Materialize every touched tree's dirty pages and publish a new
    /// global header pointing at the new roots (spec.md §4.6).
    pub fn commit(mut self) -> Result<()> {
        let mut resolved = HashMap::new();
        let touched: Vec<String> = self
            .trees
            .iter()
            .filter(|(_, s)| s.touched)
            .map(|(name, _)| name.clone())
            .collect();

        let mut new_header_records: Vec<(u64, Vec<u8>)> = Vec::new();
        for name in &touched {
            let root_ref = self.trees.get(name).unwrap().root_ref;
            let new_root_offset = if root_ref == NO_ROOT {
                NO_ROOT
            } else {
                self.materialize_page(root_ref, &mut resolved)?
            };

            let state = self.trees.get(name).unwrap();
            let tree_header = TreeHeader {
                name: name.clone(),
                root_offset: new_root_offset,
                revision: self.revision,
                fanout: state.fanout,
                flags: {
                    let mut flags = crate::header::TreeFlags::empty();
                    if state.allow_duplicates {
                        flags.insert(crate::header::TreeFlags::ALLOW_DUPLICATES);
                    }
                    if state.is_internal_subtree {
                        flags.insert(crate::header::TreeFlags::INTERNAL_SUBTREE);
                    }
                    flags
                },
                key_codec_tag: state.key_codec_tag.clone(),
                value_codec_tag: state.value_codec_tag.clone(),
                element_count: state.element_count,
                up_threshold: state.up_threshold,
                down_threshold: state.down_threshold,
            };
            new_header_records.push((state.header_offset, tree_header.serialize()));
        }

        // Tree headers are a fixed-size record once created (name and codec
        // tags never change), so each commit rewrites the same page chain
        // in place instead of going through the free list (spec.md §4.2
        // treats this as part of header publication, not page allocation).
        for (offset, bytes) in &new_header_records {
            let chain = self.manager.page_io.chain_offsets(*offset)?;
            self.manager.page_io.write_record(&chain, bytes)?;
        }

        let mut header = self.base_header.clone();
        header.revision = self.revision;
        header.free_list_head = self.free_list_head;
        self.manager.page_io.flush()?;
        self.manager.publish(header)?;

        if !self.copied.is_empty() {
            self.manager
                .note_copied_pages(self.revision, self.copied.iter().copied().collect());
        }
        self.manager.release_write_slot();
        let _ = self.manager.try_reclaim();
        self.finished = true;
        debug!("committed revision {}", self.revision);
        Ok(())
    }

    /// Discard every dirty page and pre-allocated chain; the free list and
    /// header are untouched (spec.md §4.6 "On rollback").
    pub fn rollback(mut self) {
        self.finished = true;
        debug!("rolled back revision {} (nothing was published)", self.revision);
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if !self.finished {
            self.manager.release_write_slot();
        }
    }
}

impl PageSource for WriteTxn {
    fn fetch(&self, page_ref: u64) -> Result<TreePage> {
        if is_dirty(page_ref) {
            self.dirty
                .get(&dirty_id(page_ref))
                .cloned()
                .ok_or(MaviError::CorruptPage { offset: 0 })
        } else {
            let bytes = self.manager.page_io.read_record(page_ref)?;
            decode_page(&bytes)
        }
    }
}
