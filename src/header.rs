//! Global file header and per-tree header: parse/serialize plus the
//! redundant-checksum recovery rule from spec.md §4.2 and §6.
//!
//! The global header lives in two fixed slots (file pages 0 and 1) written
//! alternately on each commit — the one place in this design that is
//! mutated in place rather than copy-on-write, since it's the sole anchor
//! every other lookup starts from. Each slot carries a sequence number at
//! its start and end (torn-write detection: a crash mid-write leaves them
//! disagreeing) and an xxh3 checksum of its body (bit-level corruption
//! detection), mirroring the checksum the teacher crate computes over its
//! own `RootHeader` in `src/lib.rs`. On open, the slot with the higher
//! valid sequence number wins; if the newer slot is torn or fails its
//! checksum, the other slot is used instead.

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{MaviError, Result};
use crate::format::{write_bytestring, write_u32, write_u64, ByteReader};

pub const HEADER_MAGIC: u64 = 0x4d41_5649_424f_5421;
pub const HEADER_VERSION: u32 = 1;
pub const HEADER_SLOT_COUNT: u32 = 2;

/// Sentinel meaning "the free list is empty".
pub const NO_FREE_PAGE: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDirEntry {
    pub name: String,
    pub header_offset: u64,
}

#[derive(Debug, Clone)]
pub struct GlobalHeader {
    pub page_size: u32,
    pub free_list_head: u64,
    pub revision: u64,
    pub seq: u32,
    pub trees: Vec<TreeDirEntry>,
}

impl GlobalHeader {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            free_list_head: NO_FREE_PAGE,
            revision: 0,
            seq: 0,
            trees: Vec::new(),
        }
    }

    fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        write_u64(&mut body, HEADER_MAGIC);
        write_u32(&mut body, HEADER_VERSION);
        write_u32(&mut body, self.page_size);
        write_u32(&mut body, self.trees.len() as u32);
        write_u64(&mut body, self.free_list_head);
        write_u64(&mut body, self.revision);
        for entry in &self.trees {
            write_bytestring(&mut body, Some(entry.name.as_bytes()));
            write_u64(&mut body, entry.header_offset);
        }
        body
    }

    /// Serialize one slot with sequence number `seq` at both ends and a
    /// checksum of the body in between.
    pub fn serialize(&self, seq: u32) -> Vec<u8> {
        let body = self.body();
        let checksum = xxh3_64(&body);

        let mut out = Vec::with_capacity(body.len() + 20);
        write_u32(&mut out, seq);
        out.extend_from_slice(&body);
        write_u64(&mut out, checksum);
        write_u32(&mut out, seq);
        out
    }

    /// Parse one slot, validating the begin/end sequence numbers agree and
    /// the checksum matches. Returns the header and its sequence number.
    pub fn parse_slot(bytes: &[u8]) -> Result<(Self, u32)> {
        let mut reader = ByteReader::new(bytes);
        let seq_begin = reader.read_u32()?;
        let body_start = reader.position();

        let magic = reader.read_u64()?;
        if magic != HEADER_MAGIC {
            return Err(MaviError::CorruptPage { offset: 0 });
        }
        let _version = reader.read_u32()?;
        let page_size = reader.read_u32()?;
        let tree_count = reader.read_u32()?;
        let free_list_head = reader.read_u64()?;
        let revision = reader.read_u64()?;

        let mut trees = Vec::with_capacity(tree_count as usize);
        for _ in 0..tree_count {
            let name_bytes = reader.read_bytestring_required()?;
            let name = String::from_utf8(name_bytes).map_err(|_| MaviError::CorruptPage { offset: 0 })?;
            let header_offset = reader.read_u64()?;
            trees.push(TreeDirEntry { name, header_offset });
        }
        let body_end = reader.position();
        let checksum = reader.read_u64()?;
        let seq_end = reader.read_u32()?;

        if seq_begin != seq_end {
            return Err(MaviError::CorruptPage { offset: 0 });
        }
        if xxh3_64(&bytes[body_start..body_end]) != checksum {
            return Err(MaviError::CorruptPage { offset: 0 });
        }

        Ok((
            GlobalHeader {
                page_size,
                free_list_head,
                revision,
                seq: seq_begin,
                trees,
            },
            seq_begin,
        ))
    }

    /// Pick the valid slot with the highest sequence number; used on open
    /// when both header slots have been read from disk.
    pub fn choose_latest(slots: [Result<(Self, u32)>; 2]) -> Result<Self> {
        match slots {
            [Ok((a, seq_a)), Ok((b, seq_b))] => {
                if seq_a.wrapping_sub(seq_b) as i32 >= 0 && seq_a != seq_b {
                    Ok(a)
                } else {
                    Ok(b)
                }
            }
            [Ok((a, _)), Err(_)] => Ok(a),
            [Err(_), Ok((b, _))] => Ok(b),
            [Err(e), Err(_)] => Err(e),
        }
    }
}

/// One-byte flag set for a tree header. Hand-rolled rather than pulling in
/// the `bitflags` crate for two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeFlags(u8);

impl TreeFlags {
    pub const ALLOW_DUPLICATES: TreeFlags = TreeFlags(0b0000_0001);
    pub const INTERNAL_SUBTREE: TreeFlags = TreeFlags(0b0000_0010);

    pub fn empty() -> Self {
        TreeFlags(0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        TreeFlags(bits)
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for TreeFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        TreeFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct TreeHeader {
    pub name: String,
    pub root_offset: u64,
    pub revision: u64,
    pub fanout: u32,
    pub flags: TreeFlags,
    pub key_codec_tag: Vec<u8>,
    pub value_codec_tag: Vec<u8>,
    pub element_count: u64,
    /// Duplicate-value holder thresholds (spec.md §4.5). Not named in the
    /// global/tree header layout spec.md §6 spells out byte-for-byte, but
    /// S4 creates a tree with non-default thresholds, so they have to be
    /// per-tree and persisted rather than a single compile-time constant.
    pub up_threshold: u32,
    pub down_threshold: u32,
}

impl TreeHeader {
    pub fn allow_duplicates(&self) -> bool {
        self.flags.contains(TreeFlags::ALLOW_DUPLICATES)
    }

    pub fn is_internal_subtree(&self) -> bool {
        self.flags.contains(TreeFlags::INTERNAL_SUBTREE)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_bytestring(&mut out, Some(self.name.as_bytes()));
        write_u64(&mut out, self.root_offset);
        write_u64(&mut out, self.revision);
        write_u32(&mut out, self.fanout);
        out.push(self.flags.bits());
        write_bytestring(&mut out, Some(&self.key_codec_tag));
        write_bytestring(&mut out, Some(&self.value_codec_tag));
        write_u64(&mut out, self.element_count);
        write_u32(&mut out, self.up_threshold);
        write_u32(&mut out, self.down_threshold);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let name = String::from_utf8(reader.read_bytestring_required()?)
            .map_err(|_| MaviError::CorruptPage { offset: 0 })?;
        let root_offset = reader.read_u64()?;
        let revision = reader.read_u64()?;
        let fanout = reader.read_u32()?;
        let flags = TreeFlags::from_bits(reader.read_u8()?);
        let key_codec_tag = reader.read_bytestring_required()?;
        let value_codec_tag = reader.read_bytestring_required()?;
        let element_count = reader.read_u64()?;
        let up_threshold = reader.read_u32()?;
        let down_threshold = reader.read_u32()?;
        Ok(TreeHeader {
            name,
            root_offset,
            revision,
            fanout,
            flags,
            key_codec_tag,
            value_codec_tag,
            element_count,
            up_threshold,
            down_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_header_round_trips() {
        let mut header = GlobalHeader::new(4096);
        header.revision = 3;
        header.trees.push(TreeDirEntry {
            name: "people".to_string(),
            header_offset: 8192,
        });
        let bytes = header.serialize(7);
        let (parsed, seq) = GlobalHeader::parse_slot(&bytes).unwrap();
        assert_eq!(seq, 7);
        assert_eq!(parsed.page_size, 4096);
        assert_eq!(parsed.revision, 3);
        assert_eq!(parsed.trees[0].name, "people");
    }

    #[test]
    fn torn_write_is_detected() {
        let header = GlobalHeader::new(4096);
        let mut bytes = header.serialize(1);
        let len = bytes.len();
        bytes[len - 1] = 0xff;
        assert!(GlobalHeader::parse_slot(&bytes).is_err());
    }

    #[test]
    fn choose_latest_prefers_higher_sequence() {
        let header = GlobalHeader::new(4096);
        let older = header.serialize(1);
        let newer = header.serialize(2);
        let chosen = GlobalHeader::choose_latest([
            GlobalHeader::parse_slot(&older),
            GlobalHeader::parse_slot(&newer),
        ])
        .unwrap();
        assert_eq!(chosen.seq, 2);
    }

    #[test]
    fn tree_header_round_trips() {
        let header = TreeHeader {
            name: "dups".to_string(),
            root_offset: 4096,
            revision: 2,
            fanout: 64,
            flags: TreeFlags::ALLOW_DUPLICATES,
            key_codec_tag: b"u64".to_vec(),
            value_codec_tag: b"bytes".to_vec(),
            element_count: 10,
            up_threshold: 8,
            down_threshold: 4,
        };
        let bytes = header.serialize();
        let parsed = TreeHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.name, "dups");
        assert!(parsed.allow_duplicates());
        assert!(!parsed.is_internal_subtree());
        assert_eq!(parsed.element_count, 10);
        assert_eq!(parsed.up_threshold, 8);
        assert_eq!(parsed.down_threshold, 4);
    }
}
