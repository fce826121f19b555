//! spec.md §8 S5 — data survives a close/reopen cycle.

use mavibot::{ByteArrayCodec, OpenOptions, U64Codec};

#[test]
fn data_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s5.mavibot");

    {
        let manager = OpenOptions::new().page_size(512).open(&path).unwrap();
        manager.create_tree("s5", "u64", "bytes", false, 4).unwrap();
        let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s5").unwrap();

        let mut txn = manager.begin_write().unwrap();
        for i in 1u64..=100 {
            tree.insert(&mut txn, &i, &format!("v{i}")).unwrap();
        }
        txn.commit().unwrap();
        manager.close().unwrap();
    }

    let manager = OpenOptions::new().page_size(512).open(&path).unwrap();
    let tree = manager.tree::<u64, String, U64Codec, ByteArrayCodec>("s5").unwrap();

    let read = manager.begin_read().unwrap();
    assert_eq!(tree.nb_elems(&read).unwrap(), 100);
    for i in 1u64..=100 {
        assert_eq!(tree.get(&read, &i).unwrap(), format!("v{i}"));
    }
}
