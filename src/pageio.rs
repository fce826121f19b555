//! Page I/O layer: maps fixed-size file pages to/from byte buffers, chains
//! multi-page records, and threads freed pages through a free list
//! (spec.md §4.1).
//!
//! Reads go through a memory map that is lock-free with respect to other
//! readers, the way the teacher crate's `StorageInner` exposes its
//! `memmap2::MmapRaw` regions. Pages are never rewritten in place once
//! published, so a reader never observes a torn page; the map is only
//! remapped (never mutated through the map) after the file grows.
//! Writes go through a plain positioned `File` write, serialized by the
//! single-writer discipline the record manager enforces above this layer.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::sync::{Mutex, RwLock};

use memmap2::{Mmap, MmapOptions};

use crate::error::{MaviError, Result};
use crate::format::{write_u32, write_u64, ByteReader, END_OF_RECORD};

/// Per-page overhead: 8-byte next-page offset + 4-byte payload length.
const PAGE_HEADER_LEN: usize = 12;
/// Extra 4 bytes at the front of the first page's payload: the record's
/// total length.
const FIRST_PAGE_EXTRA: usize = 4;

pub struct PageIo {
    file: Mutex<File>,
    page_size: u32,
    mmap: RwLock<Mmap>,
}

impl PageIo {
    /// Wrap an already-sized file (at least `reserved_pages` pages long).
    pub fn open(file: File, page_size: u32, reserved_pages: u64) -> Result<Self> {
        let len = file.metadata()?.len();
        let min_len = reserved_pages * page_size as u64;
        if len < min_len {
            file.set_len(min_len)?;
        }
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self {
            file: Mutex::new(file),
            page_size,
            mmap: RwLock::new(mmap),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.lock().unwrap().metadata()?.len())
    }

    fn remap(&self) -> Result<()> {
        let file = self.file.lock().unwrap();
        let mmap = unsafe { MmapOptions::new().map(&*file)? };
        *self.mmap.write().unwrap() = mmap;
        Ok(())
    }

    /// Read `len` bytes at `offset`, remapping once if the current map is
    /// stale relative to the file (the file grew since the last remap).
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        {
            let guard = self.mmap.read().unwrap();
            if (offset as usize).saturating_add(len) <= guard.len() {
                return Ok(guard[offset as usize..offset as usize + len].to_vec());
            }
        }
        self.remap()?;
        let guard = self.mmap.read().unwrap();
        if (offset as usize).saturating_add(len) > guard.len() {
            return Err(MaviError::EndOfFile { offset });
        }
        Ok(guard[offset as usize..offset as usize + len].to_vec())
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let file = self.file.lock().unwrap();
        file.sync_data()?;
        Ok(())
    }

    fn extend_file_by_one_page(&self) -> Result<u64> {
        let mut file = self.file.lock().unwrap();
        let offset = file.metadata()?.len();
        file.set_len(offset + self.page_size as u64)?;
        drop(file);
        self.remap()?;
        Ok(offset)
    }

    fn read_next_pointer(&self, offset: u64) -> Result<u64> {
        let bytes = self.read_at(offset, 8)?;
        let mut reader = ByteReader::new(&bytes);
        reader.read_u64()
    }

    fn write_next_pointer(&self, offset: u64, next: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(8);
        write_u64(&mut buf, next);
        self.write_at(offset, &buf)
    }

    /// How many chained pages are needed to hold `payload_len` bytes.
    pub fn pages_needed(&self, payload_len: usize) -> u32 {
        let first_cap = self.page_size as usize - PAGE_HEADER_LEN - FIRST_PAGE_EXTRA;
        if payload_len <= first_cap {
            return 1;
        }
        let other_cap = self.page_size as usize - PAGE_HEADER_LEN;
        let remaining = payload_len - first_cap;
        1 + remaining.div_ceil(other_cap) as u32
    }

    /// Allocate `n` chained pages, popping from the free list first and
    /// extending the file for any shortfall. Returns the page offsets in
    /// chain order and the free list's new head.
    pub fn allocate(&self, n: u32, mut free_list_head: u64) -> Result<(Vec<u64>, u64)> {
        let mut offsets = Vec::with_capacity(n as usize);
        for _ in 0..n {
            if free_list_head != END_OF_RECORD {
                let offset = free_list_head;
                free_list_head = self.read_next_pointer(offset)?;
                offsets.push(offset);
            } else {
                offsets.push(self.extend_file_by_one_page()?);
            }
        }
        Ok((offsets, free_list_head))
    }

    /// Serialize `payload` across the pre-allocated chain `offsets`, which
    /// must have enough capacity (see [`Self::pages_needed`]).
    pub fn write_record(&self, offsets: &[u64], payload: &[u8]) -> Result<()> {
        let page_size = self.page_size as usize;
        let first_cap = page_size - PAGE_HEADER_LEN - FIRST_PAGE_EXTRA;
        let other_cap = page_size - PAGE_HEADER_LEN;
        let mut written = 0usize;

        for (i, &offset) in offsets.iter().enumerate() {
            let next = if i + 1 < offsets.len() {
                offsets[i + 1]
            } else {
                END_OF_RECORD
            };
            let cap = if i == 0 { first_cap } else { other_cap };
            let take = (payload.len() - written).min(cap);

            let mut body = Vec::new();
            if i == 0 {
                write_u32(&mut body, payload.len() as u32);
            }
            body.extend_from_slice(&payload[written..written + take]);
            written += take;

            let mut page = Vec::with_capacity(page_size);
            write_u64(&mut page, next);
            write_u32(&mut page, body.len() as u32);
            page.extend_from_slice(&body);
            page.resize(page_size, 0);
            self.write_at(offset, &page)?;
        }

        if written != payload.len() {
            return Err(MaviError::EndOfFile {
                offset: offsets.last().copied().unwrap_or(0),
            });
        }
        Ok(())
    }

    /// Read the full payload of the record chained from `first_offset`.
    pub fn read_record(&self, first_offset: u64) -> Result<Vec<u8>> {
        let mut cur = first_offset;
        let mut result = Vec::new();
        let mut total_len: Option<usize> = None;

        loop {
            let header = self.read_at(cur, PAGE_HEADER_LEN)?;
            let mut reader = ByteReader::new(&header);
            let next = reader.read_u64()?;
            let payload_len = reader.read_u32()? as usize;
            let payload = self.read_at(cur + PAGE_HEADER_LEN as u64, payload_len)?;

            if total_len.is_none() {
                let mut preader = ByteReader::new(&payload);
                total_len = Some(preader.read_u32()? as usize);
                result.extend_from_slice(preader.remaining());
            } else {
                result.extend_from_slice(&payload);
            }

            if next == END_OF_RECORD {
                break;
            }
            cur = next;
        }

        result.truncate(total_len.unwrap_or(0));
        Ok(result)
    }

    /// The offsets of every page in the record starting at `first_offset`,
    /// in chain order. Used to rewrite a fixed-length record (the tree
    /// header) in place without re-allocating its page chain.
    pub fn chain_offsets(&self, first_offset: u64) -> Result<Vec<u64>> {
        let mut offsets = Vec::new();
        let mut cur = first_offset;
        loop {
            offsets.push(cur);
            let next = self.read_next_pointer(cur)?;
            if next == END_OF_RECORD {
                break;
            }
            cur = next;
        }
        Ok(offsets)
    }

    /// Thread every page in the record starting at `first_offset` onto the
    /// free list headed by `free_list_head`. Returns the new head.
    pub fn free_chain(&self, first_offset: u64, free_list_head: u64) -> Result<u64> {
        let mut offsets = Vec::new();
        let mut cur = first_offset;
        loop {
            offsets.push(cur);
            let next = self.read_next_pointer(cur)?;
            if next == END_OF_RECORD {
                break;
            }
            cur = next;
        }

        let mut new_head = free_list_head;
        for &offset in offsets.iter().rev() {
            self.write_next_pointer(offset, new_head)?;
            new_head = offset;
        }
        Ok(new_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    fn fresh_pageio(page_size: u32) -> PageIo {
        let file = tempfile().unwrap();
        PageIo::open(file, page_size, 2).unwrap()
    }

    #[test]
    fn record_round_trips_across_multiple_pages() {
        let io = fresh_pageio(64);
        let payload: Vec<u8> = (0..200u16).map(|n| (n % 251) as u8).collect();
        let n = io.pages_needed(payload.len());
        assert!(n > 1, "200 bytes should not fit in one 64-byte page");
        let (offsets, free_head) = io.allocate(n, END_OF_RECORD).unwrap();
        assert_eq!(free_head, END_OF_RECORD);
        io.write_record(&offsets, &payload).unwrap();
        let read_back = io.read_record(offsets[0]).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn freed_pages_are_reused_on_next_allocation() {
        let io = fresh_pageio(64);
        let payload = vec![1u8; 10];
        let n = io.pages_needed(payload.len());
        let (offsets, free_head) = io.allocate(n, END_OF_RECORD).unwrap();
        io.write_record(&offsets, &payload).unwrap();
        let file_len_before = io.file_len().unwrap();

        let free_head = io.free_chain(offsets[0], free_head).unwrap();
        let (new_offsets, _) = io.allocate(n, free_head).unwrap();
        assert_eq!(new_offsets, offsets, "reused pages should come off the free list");
        assert_eq!(io.file_len().unwrap(), file_len_before, "no file growth expected");
    }

    #[test]
    fn small_payload_fits_a_single_page() {
        let io = fresh_pageio(4096);
        assert_eq!(io.pages_needed(10), 1);
    }
}
