use std::ops::{Deref, DerefMut};

/// An API for a mutable block of bytes checked out from a backing
/// allocation, which must be explicitly committed or forgotten.
pub trait OwnedBlockApi: Send + Sync {
    fn block_mut(&mut self) -> &mut [u8];

    fn block(&self) -> &[u8];

    /// Commit the block back to the backing memory, keeping only the first
    /// `size` bytes.
    fn commit(self: Box<Self>, size: usize);

    /// Give up this allocation without writing anything back.
    fn forget(self: Box<Self>);
}

pub struct OwnedBlock(Box<dyn OwnedBlockApi>);

impl OwnedBlock {
    pub fn from_api(api: Box<dyn OwnedBlockApi>) -> Self {
        Self(api)
    }

    pub fn commit(self, size: usize) {
        self.0.commit(size)
    }

    pub fn forget(self) {
        self.0.forget()
    }
}

impl Deref for OwnedBlock {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.0.block()
    }
}

impl DerefMut for OwnedBlock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.block_mut()
    }
}

impl std::fmt::Debug for OwnedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.block().fmt(f)
    }
}
