//! Orchestrates the inline-array/secondary-B+tree transition a leaf's
//! value holder goes through (spec.md §4.5). `mavibot_pager::ValueHolder`
//! only knows the two shapes and the I/O-free operations on each; creating
//! or collapsing the secondary tree needs storage access, which lives here.

use mavibot_pager::ValueHolder;

use crate::error::Result;
use crate::tree::{delete_top, insert_top, mark_subtree_abandoned, raw_collect_all};
use crate::txn::{WriteTxn, NO_ROOT};

/// Add `value` to `holder`. Returns whether the holder's element set grew
/// (it does not grow if `value` was already present).
pub(crate) fn add_value(
    txn: &mut WriteTxn,
    holder: &mut ValueHolder<Vec<u8>>,
    value: Vec<u8>,
    fanout: u32,
    up_threshold: u32,
) -> Result<bool> {
    match holder {
        ValueHolder::Inline(values) => {
            if values.binary_search(&value).is_ok() {
                return Ok(false);
            }
            if values.len() + 1 > up_threshold as usize {
                let mut all = values.clone();
                let idx = all.binary_search(&value).unwrap_err();
                all.insert(idx, value);
                let mut root_ref = NO_ROOT;
                for v in all {
                    let (new_root, _) = insert_top(txn, root_ref, v.clone(), v, fanout, false, 0, 0)?;
                    root_ref = new_root;
                }
                *holder = ValueHolder::Subtree(root_ref);
            } else {
                let idx = values.binary_search(&value).unwrap_err();
                values.insert(idx, value);
            }
            Ok(true)
        }
        ValueHolder::Subtree(root_ref) => {
            let (new_root, added) = insert_top(txn, *root_ref, value.clone(), value, fanout, false, 0, 0)?;
            *root_ref = new_root;
            Ok(added.is_none())
        }
    }
}

/// Remove `value` from `holder`, collapsing a `Subtree` back to `Inline`
/// once its remaining element count drops to `down_threshold` or below.
/// Returns whether `value` was present.
pub(crate) fn remove_value(
    txn: &mut WriteTxn,
    holder: &mut ValueHolder<Vec<u8>>,
    value: &[u8],
    fanout: u32,
    down_threshold: u32,
) -> Result<bool> {
    match holder {
        ValueHolder::Inline(values) => match values.binary_search(&value.to_vec()) {
            Ok(idx) => {
                values.remove(idx);
                Ok(true)
            }
            Err(_) => Ok(false),
        },
        ValueHolder::Subtree(root_ref) => {
            let (new_root, removed, _) = delete_top(txn, *root_ref, value, None, fanout, false, 0)?;
            if !removed {
                return Ok(false);
            }
            let remaining = raw_collect_all(txn, new_root)?;
            if remaining.len() <= down_threshold as usize {
                mark_subtree_abandoned(txn, new_root)?;
                *holder = ValueHolder::Inline(remaining);
            } else {
                *root_ref = new_root;
            }
            Ok(true)
        }
    }
}
