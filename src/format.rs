//! Binary encoding primitives shared by the header, page, and record
//! layouts in spec.md §6.
//!
//! Every multi-byte integer on disk is big-endian (spec.md §4.1). Byte
//! strings are length-prefixed with a 4-byte signed length; a length of
//! `-1` is the null sentinel, distinct from a present-but-empty string.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{MaviError, Result};

/// Sentinel `next-page-offset` marking the end of a page-io record
/// (spec.md §4.1, §6 "Page layout").
pub const END_OF_RECORD: u64 = u64::MAX;

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    let mut buf = [0u8; 4];
    BigEndian::write_i32(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Write a byte string as a 4-byte length prefix followed by its bytes.
/// `None` is written as length `-1` with no payload.
pub fn write_bytestring(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            write_i32(out, bytes.len() as i32);
            out.extend_from_slice(bytes);
        }
        None => write_i32(out, -1),
    }
}

/// A read-only cursor over a byte slice, used to parse the header and page
/// layouts back out. Every read checks bounds and reports `EndOfFile`
/// rather than panicking on a truncated record.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(MaviError::EndOfFile {
                offset: self.pos as u64,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a length-prefixed byte string; a stored length of `-1` decodes
    /// to `None`.
    pub fn read_bytestring(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    /// Read a length-prefixed byte string that must not be null.
    pub fn read_bytestring_required(&mut self) -> Result<Vec<u8>> {
        self.read_bytestring()?.ok_or(MaviError::CorruptPage {
            offset: self.pos as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytestring_round_trips_present_and_null() {
        let mut buf = Vec::new();
        write_bytestring(&mut buf, Some(b"hello"));
        write_bytestring(&mut buf, None);
        write_bytestring(&mut buf, Some(b""));

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_bytestring().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(reader.read_bytestring().unwrap(), None);
        assert_eq!(reader.read_bytestring().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn truncated_record_reports_end_of_file() {
        let buf = vec![0u8, 0, 0];
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(reader.read_u32(), Err(MaviError::EndOfFile { .. })));
    }

    #[test]
    fn integers_round_trip_big_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x0102_0304);
        write_u64(&mut buf, 0x1122_3344_5566_7788);
        assert_eq!(&buf[0..4], &[0x01, 0x02, 0x03, 0x04]);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(reader.read_u64().unwrap(), 0x1122_3344_5566_7788);
    }
}
