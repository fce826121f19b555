//! Serializes and parses the in-memory [`Leaf`]/[`Node`] page shapes from
//! `mavibot-pager` to and from the "Node payload layout" spec.md §6
//! describes.
//!
//! Keys and values arriving here are already codec-encoded byte strings
//! (`Vec<u8>`), so this module only has to lay out lengths, counts, and
//! child/value-holder framing — it never touches a user's original typed
//! value.

use mavibot_pager::{Leaf, Node, ValueHolder};

use crate::error::{MaviError, Result};
use crate::format::{write_bytestring, write_i32, write_u32, write_u64, ByteReader};

/// Either page shape a tree page can take, tagged the way spec.md §6
/// describes: the element-count field is negative for a node, positive
/// for a leaf (magnitude is the key count).
#[derive(Clone)]
pub enum TreePage {
    Leaf(Leaf<Vec<u8>, Vec<u8>>),
    Node(Node<Vec<u8>>),
}

fn encode_value_holder(out: &mut Vec<u8>, holder: &ValueHolder<Vec<u8>>) {
    match holder {
        ValueHolder::Inline(values) => {
            out.push(0);
            write_u32(out, values.len() as u32);
            for value in values {
                write_bytestring(out, Some(value));
            }
        }
        ValueHolder::Subtree(offset) => {
            out.push(1);
            write_u64(out, *offset);
        }
    }
}

fn decode_value_holder(reader: &mut ByteReader) -> Result<ValueHolder<Vec<u8>>> {
    match reader.read_u8()? {
        0 => {
            let count = reader.read_u32()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(reader.read_bytestring_required()?);
            }
            Ok(ValueHolder::Inline(values))
        }
        1 => Ok(ValueHolder::Subtree(reader.read_u64()?)),
        _ => Err(MaviError::CorruptPage { offset: reader.position() as u64 }),
    }
}

/// Encode a page's full on-disk payload: id, revision, tagged element
/// count, total data size, then the body.
pub fn encode_page(page: &TreePage) -> Vec<u8> {
    let mut body = Vec::new();
    let (id, revision, count) = match page {
        TreePage::Leaf(leaf) => {
            for (key, holder) in leaf.keys.iter().zip(leaf.values.iter()) {
                encode_value_holder(&mut body, holder);
                write_bytestring(&mut body, Some(key));
            }
            (leaf.id, leaf.revision, leaf.keys.len() as i32)
        }
        TreePage::Node(node) => {
            write_u64(&mut body, node.children[0]);
            for (key, child) in node.keys.iter().zip(node.children.iter().skip(1)) {
                write_bytestring(&mut body, Some(key));
                write_u64(&mut body, *child);
            }
            (node.id, node.revision, -(node.keys.len() as i32))
        }
    };

    let mut out = Vec::with_capacity(body.len() + 24);
    write_u64(&mut out, id);
    write_u64(&mut out, revision);
    write_i32(&mut out, count);
    write_u32(&mut out, body.len() as u32);
    out.extend_from_slice(&body);
    out
}

/// Parse a page payload produced by [`encode_page`].
pub fn decode_page(bytes: &[u8]) -> Result<TreePage> {
    let mut reader = ByteReader::new(bytes);
    let id = reader.read_u64()?;
    let revision = reader.read_u64()?;
    let count = reader.read_i32()?;
    let _data_size = reader.read_u32()?;

    if count >= 0 {
        let n = count as usize;
        let mut keys = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let holder = decode_value_holder(&mut reader)?;
            let key = reader.read_bytestring_required()?;
            keys.push(key);
            values.push(holder);
        }
        Ok(TreePage::Leaf(Leaf {
            id,
            revision,
            keys,
            values,
        }))
    } else {
        let n = (-count) as usize;
        let mut keys = Vec::with_capacity(n);
        let mut children = Vec::with_capacity(n + 1);
        children.push(reader.read_u64()?);
        for _ in 0..n {
            keys.push(reader.read_bytestring_required()?);
            children.push(reader.read_u64()?);
        }
        Ok(TreePage::Node(Node {
            id,
            revision,
            keys,
            children,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips() {
        let mut leaf = Leaf::new(1, 5);
        leaf.keys = vec![b"a".to_vec(), b"b".to_vec()];
        leaf.values = vec![
            ValueHolder::Inline(vec![b"1".to_vec()]),
            ValueHolder::Subtree(4096),
        ];
        let bytes = encode_page(&TreePage::Leaf(leaf));
        match decode_page(&bytes).unwrap() {
            TreePage::Leaf(parsed) => {
                assert_eq!(parsed.id, 1);
                assert_eq!(parsed.revision, 5);
                assert_eq!(parsed.keys, vec![b"a".to_vec(), b"b".to_vec()]);
                assert_eq!(parsed.values[1].as_subtree(), Some(4096));
            }
            TreePage::Node(_) => panic!("expected a leaf"),
        }
    }

    #[test]
    fn node_round_trips() {
        let node = Node {
            id: 2,
            revision: 3,
            keys: vec![b"m".to_vec()],
            children: vec![10, 20],
        };
        let bytes = encode_page(&TreePage::Node(node));
        match decode_page(&bytes).unwrap() {
            TreePage::Node(parsed) => {
                assert_eq!(parsed.keys, vec![b"m".to_vec()]);
                assert_eq!(parsed.children, vec![10, 20]);
            }
            TreePage::Leaf(_) => panic!("expected a node"),
        }
    }
}
