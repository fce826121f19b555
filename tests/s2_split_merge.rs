//! spec.md §8 S2 — split then delete triggering merge.

use mavibot::{ByteArrayCodec, OpenOptions, U64Codec};

#[test]
fn split_grows_tree_then_delete_triggers_merge() {
    let manager = OpenOptions::new().open_anon().unwrap();
    manager.create_tree("s2", "u64", "bytes", false, 4).unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s2").unwrap();

    let mut txn = manager.begin_write().unwrap();
    for (k, v) in [
        (1u64, "a"),
        (2, "b"),
        (3, "c"),
        (4, "d"),
        (5, "e"),
        (6, "f"),
        (7, "g"),
        (8, "h"),
    ] {
        tree.insert(&mut txn, &k, &v.to_string()).unwrap();
    }
    txn.commit().unwrap();

    let read = manager.begin_read().unwrap();
    let mut cursor = tree.browse(&read, None).unwrap();
    let mut out = Vec::new();
    while let Some(pair) = cursor.next().unwrap() {
        out.push(pair);
    }
    assert_eq!(out.len(), 8);
    read.close();

    let mut txn = manager.begin_write().unwrap();
    assert!(tree.delete(&mut txn, &1, None).unwrap());
    assert!(tree.delete(&mut txn, &2, None).unwrap());
    txn.commit().unwrap();

    let read = manager.begin_read().unwrap();
    let mut cursor = tree.browse(&read, None).unwrap();
    let mut out = Vec::new();
    while let Some(pair) = cursor.next().unwrap() {
        out.push(pair);
    }
    assert_eq!(
        out,
        vec![
            (3, "c".to_string()),
            (4, "d".to_string()),
            (5, "e".to_string()),
            (6, "f".to_string()),
            (7, "g".to_string()),
            (8, "h".to_string()),
        ]
    );
}
