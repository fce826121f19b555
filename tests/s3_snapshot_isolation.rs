//! spec.md §8 S3 — a read transaction's view is frozen at its pin revision.

use mavibot::{ByteArrayCodec, OpenOptions, U64Codec};

#[test]
fn read_txn_does_not_see_later_commits() {
    let manager = OpenOptions::new().open_anon().unwrap();
    manager.create_tree("s3", "u64", "bytes", false, 4).unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s3").unwrap();

    let mut setup = manager.begin_write().unwrap();
    for (k, v) in [(10u64, "a"), (20, "b"), (30, "c")] {
        tree.insert(&mut setup, &k, &v.to_string()).unwrap();
    }
    setup.commit().unwrap();

    let r1 = manager.begin_read().unwrap();

    let mut writer = manager.begin_write().unwrap();
    tree.insert(&mut writer, &40u64, &"d".to_string()).unwrap();
    writer.commit().unwrap();

    let mut cursor = tree.browse(&r1, None).unwrap();
    let mut out = Vec::new();
    while let Some(pair) = cursor.next().unwrap() {
        out.push(pair);
    }
    assert_eq!(
        out,
        vec![(10, "a".to_string()), (20, "b".to_string()), (30, "c".to_string())]
    );
    drop(cursor);
    r1.close();

    let r2 = manager.begin_read().unwrap();
    let mut cursor = tree.browse(&r2, None).unwrap();
    let mut out = Vec::new();
    while let Some(pair) = cursor.next().unwrap() {
        out.push(pair);
    }
    assert_eq!(
        out,
        vec![
            (10, "a".to_string()),
            (20, "b".to_string()),
            (30, "c".to_string()),
            (40, "d".to_string()),
        ]
    );
}
