//! spec.md §8 S6 — a rolled-back write transaction leaves no trace: the key
//! is absent and the file grows no more than an equivalent no-op open/close.

use mavibot::{ByteArrayCodec, MaviError, OpenOptions, U64Codec};

#[test]
fn rollback_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s6.mavibot");

    let manager = OpenOptions::new().open(&path).unwrap();
    manager.create_tree("s6", "u64", "bytes", false, 4).unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s6").unwrap();
    manager.checkpoint().unwrap();
    let baseline_len = std::fs::metadata(&path).unwrap().len();

    let mut txn = manager.begin_write().unwrap();
    tree.insert(&mut txn, &7u64, &"x".to_string()).unwrap();
    txn.rollback();

    let read = manager.begin_read().unwrap();
    match tree.get(&read, &7) {
        Err(MaviError::KeyNotFound) => {}
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    read.close();

    manager.checkpoint().unwrap();
    let after_rollback_len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(baseline_len, after_rollback_len);

    let mut txn = manager.begin_write().unwrap();
    tree.insert(&mut txn, &7u64, &"x".to_string()).unwrap();
    txn.commit().unwrap();
    manager.close().unwrap();

    let reopened_len = std::fs::metadata(&path).unwrap().len();
    assert!(reopened_len >= after_rollback_len);
}
