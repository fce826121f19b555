//! spec.md §8 S1 — insert/get: fanout=4, integer keys, byte-string values.

use mavibot::{ByteArrayCodec, OpenOptions, U64Codec};

#[test]
fn insert_then_get_and_browse_in_order() {
    let manager = OpenOptions::new().open_anon().unwrap();
    manager.create_tree("s1", "u64", "bytes", false, 4).unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s1").unwrap();

    let mut txn = manager.begin_write().unwrap();
    for (k, v) in [(1u64, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")] {
        tree.insert(&mut txn, &k, &v.to_string()).unwrap();
    }
    txn.commit().unwrap();

    let read = manager.begin_read().unwrap();
    assert_eq!(tree.get(&read, &3).unwrap(), "c");
    assert_eq!(tree.nb_elems(&read).unwrap(), 5);

    let mut cursor = tree.browse(&read, None).unwrap();
    let mut out = Vec::new();
    while let Some(pair) = cursor.next().unwrap() {
        out.push(pair);
    }
    assert_eq!(
        out,
        vec![
            (1, "a".to_string()),
            (2, "b".to_string()),
            (3, "c".to_string()),
            (4, "d".to_string()),
            (5, "e".to_string()),
        ]
    );
}
