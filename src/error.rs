use thiserror::Error;

use mavibot_codec::CodecError;

/// Errors surfaced by the public API, per the error table in spec.md §7.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MaviError {
    #[error("no tree named {0:?} is managed by this file")]
    NoSuchTree(String),

    #[error("a tree named {0:?} is already managed by this file")]
    AlreadyManaged(String),

    #[error("key not found")]
    KeyNotFound,

    #[error("unexpected end of file reading a record at offset {offset}")]
    EndOfFile { offset: u64 },

    #[error("codec rejected stored bytes")]
    SerializerCreation(#[source] CodecError),

    #[error("a write transaction is already active")]
    WriteBusy,

    #[error("header checksum or magic mismatch at offset {offset}")]
    CorruptPage { offset: u64 },

    #[error("storage I/O error")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for MaviError {
    fn from(err: std::io::Error) -> Self {
        MaviError::Io(err)
    }
}

impl From<CodecError> for MaviError {
    fn from(err: CodecError) -> Self {
        MaviError::SerializerCreation(err)
    }
}

impl From<mavibot_pager::PageError> for MaviError {
    fn from(err: mavibot_pager::PageError) -> Self {
        match err {
            mavibot_pager::PageError::EmptyPage | mavibot_pager::PageError::DataCorruption => {
                MaviError::CorruptPage { offset: 0 }
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, MaviError>;
