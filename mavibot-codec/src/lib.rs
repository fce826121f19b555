//! Key and value encoding contract for mavibot.
//!
//! A B+tree only knows how to compare byte strings; it has no idea whether
//! the bytes it's holding came from a `u64`, a `String`, or something else.
//! A [`Codec`] bridges the two: it turns a typed value into a byte string
//! whose natural lexicographic order matches the value's own `Ord`, and back
//! again. As long as every codec here is order-preserving, the tree can
//! stay generic over `Vec<u8>` keys and values and never need to know the
//! original type.
//!
//! This crate also carries [`Block`]/[`OwnedBlock`], the zero-copy byte
//! buffer wrappers the storage layer hands codecs to decode from, so a
//! decode never has to copy a page's bytes just to read them.

mod block;
mod block_owned;
mod bytes;
mod integer;

pub use block::{Block, BlockApi};
pub use block_owned::{OwnedBlock, OwnedBlockApi};
pub use bytes::ByteArrayCodec;
pub use integer::{I64Codec, U64Codec};

/// Something that went wrong turning bytes back into a typed value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected {expected} bytes, found {found}")]
    UnexpectedLength { expected: usize, found: usize },
    #[error("bytes were not valid UTF-8")]
    InvalidUtf8,
}

/// An order-preserving mapping between a typed value and its canonical byte
/// encoding.
///
/// Implementors must guarantee that for any `a, b: T`,
/// `Codec::encode(a).cmp(&Codec::encode(b)) == a.cmp(&b)`. The B+tree relies
/// on this to use plain byte-slice comparison instead of re-parsing keys on
/// every comparison.
pub trait Codec<T> {
    fn encode(value: &T) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<T, CodecError>;
}
