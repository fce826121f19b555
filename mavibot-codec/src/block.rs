use std::ops::Deref;
use std::sync::Arc;

/// An API for interfacing with a memory-backed block of immutable bytes.
///
/// The storage layer implements this directly over mmap'd page ranges so
/// that reading a key or value never has to copy bytes out of the page
/// cache; tests and in-memory call sites implement it over a plain
/// `Arc<[u8]>`.
pub trait BlockApi: Send + Sync {
    /// Clone the reference to this block, without copying data.
    fn clone_block(&self) -> Box<dyn BlockApi>;

    fn block(&self) -> &[u8];
}

impl Deref for dyn BlockApi {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.block()
    }
}

/// An immutable block of bytes, borrowed from some larger backing memory.
pub struct Block(Box<dyn BlockApi>);

impl Block {
    pub fn from_api(api: Box<dyn BlockApi>) -> Self {
        Self(api)
    }
}

impl Deref for Block {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl Clone for Block {
    fn clone(&self) -> Self {
        Self(self.0.clone_block())
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.block().fmt(f)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block() == other.block()
    }
}

impl Eq for Block {}

impl BlockApi for Arc<[u8]> {
    fn block(&self) -> &[u8] {
        self.deref()
    }

    fn clone_block(&self) -> Box<dyn BlockApi> {
        Box::new(Clone::clone(self))
    }
}

impl From<Box<[u8]>> for Block {
    fn from(value: Box<[u8]>) -> Self {
        let api: Arc<[u8]> = value.into();
        Self(Box::new(api))
    }
}

impl From<Arc<[u8]>> for Block {
    fn from(value: Arc<[u8]>) -> Self {
        Self(Box::new(value))
    }
}

impl From<Vec<u8>> for Block {
    fn from(value: Vec<u8>) -> Self {
        value.into_boxed_slice().into()
    }
}

impl BlockApi for &'static [u8] {
    fn block(&self) -> &[u8] {
        self
    }

    fn clone_block(&self) -> Box<dyn BlockApi> {
        Box::new(*self)
    }
}

impl From<&'static [u8]> for Block {
    fn from(value: &'static [u8]) -> Self {
        Self(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_derefs_to_its_bytes() {
        let block: Block = vec![1u8, 2, 3].into();
        assert_eq!(&*block, &[1, 2, 3]);
    }

    #[test]
    fn clone_shares_the_backing_bytes() {
        let block: Block = vec![4u8, 5, 6].into();
        let cloned = block.clone();
        assert_eq!(&*block, &*cloned);
    }
}
