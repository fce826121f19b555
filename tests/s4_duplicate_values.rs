//! spec.md §8 S4 — duplicate-value holder transitions between inline and
//! subtree storage as values are added and removed.

use mavibot::{ByteArrayCodec, OpenOptions, U64Codec};

#[test]
fn inline_holder_promotes_to_subtree_and_collapses_back() {
    let manager = OpenOptions::new().open_anon().unwrap();
    manager
        .create_tree_with_thresholds("s4", "u64", "bytes", true, 4, 4, 2)
        .unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s4").unwrap();

    let mut txn = manager.begin_write().unwrap();
    for v in ["a", "b", "c", "d", "e"] {
        tree.insert(&mut txn, &1u64, &v.to_string()).unwrap();
    }
    txn.commit().unwrap();

    let read = manager.begin_read().unwrap();
    for v in ["a", "b", "c", "d", "e"] {
        assert!(tree.contains(&read, &1, &v.to_string()).unwrap());
    }
    let mut cursor = tree.browse(&read, None).unwrap();
    let mut values = Vec::new();
    while let Some((key, value)) = cursor.next().unwrap() {
        assert_eq!(key, 1);
        values.push(value);
    }
    assert_eq!(values, vec!["a", "b", "c", "d", "e"]);
    drop(cursor);
    read.close();

    let mut txn = manager.begin_write().unwrap();
    for v in ["b", "c", "d"] {
        assert!(tree.delete(&mut txn, &1, Some(&v.to_string())).unwrap());
    }
    txn.commit().unwrap();

    let read = manager.begin_read().unwrap();
    let mut cursor = tree.browse(&read, None).unwrap();
    let mut values = Vec::new();
    while let Some((key, value)) = cursor.next().unwrap() {
        assert_eq!(key, 1);
        values.push(value);
    }
    assert_eq!(values, vec!["a", "e"]);
}
