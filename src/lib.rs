//! Mavibot: an embedded, persistent, MVCC B+tree key-value storage engine.
//!
//! A [`RecordManager`] owns a single backing file and the registry of named
//! B+trees stored in it (spec.md §4.2). Readers ([`RecordManager::begin_read`])
//! never block and never see a later writer's commits; the single writer
//! ([`RecordManager::begin_write`]) accumulates changes in a [`WriteTxn`] and
//! publishes them atomically on [`WriteTxn::commit`] (spec.md §4.6). A
//! [`Tree`] is a typed handle bridging a caller's key/value types, through a
//! [`mavibot_codec::Codec`] pair, onto the byte-string B+tree underneath.
//!
//! ```no_run
//! use mavibot::{OpenOptions, U64Codec, ByteArrayCodec};
//!
//! # fn main() -> mavibot::Result<()> {
//! let manager = OpenOptions::new().open("example.mav")?;
//! manager.create_tree("people", "u64", "bytes", false, 64)?;
//! let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("people")?;
//!
//! let mut txn = manager.begin_write()?;
//! tree.insert(&mut txn, &1, &"alice".to_string())?;
//! txn.commit()?;
//!
//! let read = manager.begin_read()?;
//! assert_eq!(tree.get(&read, &1)?, "alice");
//! # Ok(())
//! # }
//! ```

mod cursor;
mod error;
mod format;
mod header;
mod page_codec;
mod pageio;
mod record_manager;
mod tree;
mod txn;
mod value_holder;

pub use cursor::Cursor;
pub use error::{MaviError, Result};
pub use record_manager::{OpenOptions, RecordManager};
pub use tree::Tree;
pub use txn::{ReadTxn, WriteTxn};

pub use mavibot_codec::{ByteArrayCodec, Codec, CodecError, I64Codec, U64Codec};
