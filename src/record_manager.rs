//! Owns the open file, the header, the tree registry, and free-page
//! handoff between revisions (spec.md §4.2).

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions as FsOpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};

use crate::error::{MaviError, Result};
use crate::header::{GlobalHeader, TreeDirEntry, TreeFlags, TreeHeader, HEADER_SLOT_COUNT};
use crate::pageio::PageIo;
use crate::txn::{ReadTxn, WriteTxn};

/// Builder for opening or creating a mavibot file. Page size, the initial
/// file size, and duplicate-value thresholds are builder fields rather
/// than a parsed config file (spec.md §1 excludes config-file parsing).
pub struct OpenOptions {
    page_size: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self { page_size: 4096 }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size in bytes, used only when creating a new file. Must be a
    /// power of two large enough to hold a global header slot.
    pub fn page_size(mut self, size: u32) -> Self {
        if (size as usize) % page_size::get() != 0 {
            warn!(
                "configured page size {size} is not a multiple of the OS page size ({}); \
                 mmap remaps may not stay aligned",
                page_size::get()
            );
        }
        self.page_size = size;
        self
    }

    pub fn open(self, path: impl AsRef<Path>) -> Result<RecordManager> {
        use fs4::fs_std::FileExt;

        let path = path.as_ref();
        let existed = path.exists();
        let file = FsOpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        // spec.md §5: "the file may be opened by one process" — an advisory
        // exclusive lock turns a second process opening the same file into
        // an immediate `Io` error rather than silent corruption.
        file.try_lock_exclusive()
            .map_err(|_| MaviError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                format!("{} is already locked by another process", path.display()),
            )))?;
        RecordManager::from_file(file, self.page_size, existed)
    }

    /// Open a manager backed by an unnamed temporary file — useful for
    /// tests and scratch trees that don't need to survive the process.
    pub fn open_anon(self) -> Result<RecordManager> {
        let file = tempfile::tempfile()?;
        RecordManager::from_file(file, self.page_size, false)
    }
}

struct ReclaimState {
    /// Revision -> number of live pins at that revision.
    pinned: BTreeMap<u64, u64>,
    /// Revision at which a set of pages was superseded -> those pages.
    pending: BTreeMap<u64, Vec<u64>>,
}

impl ReclaimState {
    fn new() -> Self {
        Self {
            pinned: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    fn pin(&mut self, revision: u64) {
        *self.pinned.entry(revision).or_insert(0) += 1;
    }

    fn unpin(&mut self, revision: u64) {
        if let Some(count) = self.pinned.get_mut(&revision) {
            *count -= 1;
            if *count == 0 {
                self.pinned.remove(&revision);
            }
        }
    }

    fn min_pinned(&self) -> Option<u64> {
        self.pinned.keys().next().copied()
    }
}

pub(crate) struct RecordManagerInner {
    pub(crate) page_io: PageIo,
    header: RwLock<GlobalHeader>,
    active_slot: AtomicU32,
    /// Enforces the single-writer rule (spec.md §5): `begin_write` fails
    /// with `WriteBusy` while this is `true`.
    write_active: AtomicBool,
    /// Guards read-modify-write of the global header, independent of
    /// `write_lock` — reclaim-on-close can flip the header's free-list head
    /// without holding the writer-transaction lock (spec.md §5 "dedicated
    /// publication lock").
    publication_lock: Mutex<()>,
    reclaim: Mutex<ReclaimState>,
}

impl RecordManagerInner {
    pub(crate) fn header_snapshot(&self) -> GlobalHeader {
        self.header.read().unwrap().clone()
    }

    pub(crate) fn pin_revision(&self, revision: u64) {
        self.reclaim.lock().unwrap().pin(revision);
    }

    pub(crate) fn unpin_revision(&self, revision: u64) {
        self.reclaim.lock().unwrap().unpin(revision);
        let _ = self.try_reclaim();
    }

    pub(crate) fn note_copied_pages(&self, revision: u64, offsets: Vec<u64>) {
        if offsets.is_empty() {
            return;
        }
        self.reclaim.lock().unwrap().pending.insert(revision, offsets);
    }

    /// Free any pending page sets whose revision no reader still pins.
    /// Safe to call after any commit or cursor/read-txn close (spec.md §5).
    pub(crate) fn try_reclaim(&self) -> Result<()> {
        let boundary = {
            let state = self.reclaim.lock().unwrap();
            state.min_pinned().unwrap_or(u64::MAX)
        };
        let ready: Vec<(u64, Vec<u64>)> = {
            let mut state = self.reclaim.lock().unwrap();
            let keys: Vec<u64> = state.pending.range(..boundary).map(|(k, _)| *k).collect();
            keys.into_iter()
                .map(|k| (k, state.pending.remove(&k).unwrap()))
                .collect()
        };
        if ready.is_empty() {
            return Ok(());
        }

        let _publish_guard = self.publication_lock.lock().unwrap();
        let mut header = self.header.read().unwrap().clone();
        for (revision, offsets) in ready {
            debug!("reclaiming {} page(s) superseded at revision {revision}", offsets.len());
            for offset in offsets {
                header.free_list_head = self.page_io.free_chain(offset, header.free_list_head)?;
            }
        }
        self.swap_header_locked(header)
    }

    /// Write `header` into the other slot and make it the active one.
    /// Caller must hold `publication_lock`.
    fn swap_header_locked(&self, mut header: GlobalHeader) -> Result<()> {
        let next_slot = 1 - self.active_slot.load(Ordering::SeqCst);
        header.seq = header.seq.wrapping_add(1);
        let bytes = header.serialize(header.seq);
        self.page_io.write_at(next_slot as u64 * self.page_io.page_size() as u64, &bytes)?;
        self.page_io.flush()?;
        self.active_slot.store(next_slot, Ordering::SeqCst);
        *self.header.write().unwrap() = header;
        Ok(())
    }

    pub(crate) fn publish(&self, header: GlobalHeader) -> Result<()> {
        let _guard = self.publication_lock.lock().unwrap();
        self.swap_header_locked(header)
    }

    /// Try to claim the single-writer slot. Returns `WriteBusy` if another
    /// write transaction already holds it.
    pub(crate) fn acquire_write_slot(&self) -> Result<()> {
        self.write_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| MaviError::WriteBusy)
    }

    pub(crate) fn release_write_slot(&self) {
        self.write_active.store(false, Ordering::SeqCst);
    }
}

/// An open mavibot file: the registry of named B+trees plus the machinery
/// to start transactions against them.
pub struct RecordManager {
    pub(crate) inner: Arc<RecordManagerInner>,
}

impl RecordManager {
    fn from_file(file: File, page_size: u32, existed: bool) -> Result<RecordManager> {
        let page_io = PageIo::open(file, page_size, HEADER_SLOT_COUNT as u64)?;

        let (header, active_slot) = if existed && page_io.file_len()? >= page_size as u64 * 2 {
            let slot0 = page_io.read_at(0, page_size as usize)?;
            let slot1 = page_io.read_at(page_size as u64, page_size as usize)?;
            let parsed0 = GlobalHeader::parse_slot(&slot0);
            let parsed1 = GlobalHeader::parse_slot(&slot1);
            let picked_from_1 = matches!(
                (&parsed0, &parsed1),
                (Err(_), Ok(_))
            ) || matches!(
                (&parsed0, &parsed1),
                (Ok((_, s0)), Ok((_, s1))) if s1.wrapping_sub(*s0) as i32 > 0
            );
            if parsed0.is_err() || parsed1.is_err() {
                warn!("one global header slot failed validation; recovering from the other");
            }
            let header = GlobalHeader::choose_latest([parsed0, parsed1])?;
            (header, if picked_from_1 { 1 } else { 0 })
        } else {
            let mut header = GlobalHeader::new(page_size);
            header.seq = 0;
            let bytes = header.serialize(0);
            page_io.write_at(0, &bytes)?;
            page_io.write_at(page_size as u64, &bytes)?;
            page_io.flush()?;
            (header, 0u32)
        };

        Ok(RecordManager {
            inner: Arc::new(RecordManagerInner {
                page_io,
                header: RwLock::new(header),
                active_slot: AtomicU32::new(active_slot),
                write_active: AtomicBool::new(false),
                publication_lock: Mutex::new(()),
                reclaim: Mutex::new(ReclaimState::new()),
            }),
        })
    }

    /// Names of every managed B+tree.
    pub fn list_trees(&self) -> Vec<String> {
        self.inner
            .header_snapshot()
            .trees
            .into_iter()
            .map(|entry| entry.name)
            .collect()
    }

    pub(crate) fn tree_header(&self, name: &str) -> Result<TreeHeader> {
        let header = self.inner.header_snapshot();
        let entry = header
            .trees
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| MaviError::NoSuchTree(name.to_string()))?;
        let bytes = self.inner.page_io.read_record(entry.header_offset)?;
        TreeHeader::parse(&bytes)
    }

    /// Register a new named B+tree. `key_codec_tag`/`value_codec_tag` are
    /// opaque identifiers a `Tree<K, V>` uses to sanity-check it's opening
    /// the codec it was built with.
    pub fn create_tree(
        &self,
        name: &str,
        key_codec_tag: &str,
        value_codec_tag: &str,
        allow_duplicates: bool,
        fanout: u32,
    ) -> Result<()> {
        self.create_tree_with_thresholds(name, key_codec_tag, value_codec_tag, allow_duplicates, fanout, 8, 4)
    }

    /// As [`Self::create_tree`], but with explicit duplicate-value holder
    /// thresholds (spec.md §4.5) instead of the defaults of 8/4.
    pub fn create_tree_with_thresholds(
        &self,
        name: &str,
        key_codec_tag: &str,
        value_codec_tag: &str,
        allow_duplicates: bool,
        fanout: u32,
        up_threshold: u32,
        down_threshold: u32,
    ) -> Result<()> {
        let mut header = self.inner.header_snapshot();
        if header.trees.iter().any(|e| e.name == name) {
            return Err(MaviError::AlreadyManaged(name.to_string()));
        }

        let mut flags = TreeFlags::empty();
        if allow_duplicates {
            flags.insert(TreeFlags::ALLOW_DUPLICATES);
        }
        let tree_header = TreeHeader {
            name: name.to_string(),
            root_offset: crate::txn::NO_ROOT,
            revision: 0,
            fanout,
            flags,
            key_codec_tag: key_codec_tag.as_bytes().to_vec(),
            value_codec_tag: value_codec_tag.as_bytes().to_vec(),
            element_count: 0,
            up_threshold,
            down_threshold,
        };
        let bytes = tree_header.serialize();
        let n = self.inner.page_io.pages_needed(bytes.len());
        let (offsets, new_free_head) = self.inner.page_io.allocate(n, header.free_list_head)?;
        header.free_list_head = new_free_head;
        self.inner.page_io.write_record(&offsets, &bytes)?;

        header.trees.push(TreeDirEntry {
            name: name.to_string(),
            header_offset: offsets[0],
        });
        debug!("created tree {name:?} at header offset {}", offsets[0]);
        self.inner.publish(header)
    }

    /// Check that a tree exists and return nothing else — [`Self::tree`]
    /// hands back the typed handle.
    pub fn open_tree(&self, name: &str) -> Result<()> {
        self.tree_header(name).map(|_| ())
    }

    /// A typed handle onto a tree already registered with
    /// [`Self::create_tree`]/[`Self::create_tree_with_thresholds`]
    /// (spec.md §6 "Tree::...").
    pub fn tree<K, V, KC, VC>(&self, name: &str) -> Result<crate::tree::Tree<K, V, KC, VC>>
    where
        KC: mavibot_codec::Codec<K>,
        VC: mavibot_codec::Codec<V>,
        K: Ord + Clone,
    {
        self.tree_header(name)?;
        Ok(crate::tree::Tree::new(name))
    }

    pub fn begin_read(&self) -> Result<ReadTxn> {
        ReadTxn::new(Arc::clone(&self.inner))
    }

    pub fn begin_write(&self) -> Result<WriteTxn> {
        self.inner.acquire_write_slot()?;
        match WriteTxn::new(Arc::clone(&self.inner)) {
            Ok(txn) => Ok(txn),
            Err(err) => {
                self.inner.release_write_slot();
                Err(err)
            }
        }
    }

    /// Force a synchronous flush and an eager free-list reclamation pass,
    /// independent of the next commit (not part of spec.md's on-disk
    /// format — a convenience matching the teacher's split between
    /// per-commit durability and an explicit checkpoint).
    pub fn checkpoint(&self) -> Result<()> {
        self.inner.page_io.flush()?;
        self.inner.try_reclaim()
    }

    pub fn close(self) -> Result<()> {
        self.inner.page_io.flush()?;
        Ok(())
    }
}
