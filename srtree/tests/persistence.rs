mod common;

use std::io;

use common::{init_logging, item, p, random_records, sorted};
use srtree::{
    All, IndexConfig, NeighborAlgorithm, OpenMode, RecordReader, RecordWriter, SRTree,
    SRTreeError, SRTreeResult, SessionConfig, StaticAlgorithm,
};
use tempfile::tempdir;

fn config() -> IndexConfig {
    IndexConfig::default().with_block_size(512)
}

#[test]
fn test_reopen_keeps_contents() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("points.srt");
    let records = random_records(1, 500, 3);

    let expected = {
        let mut tree = SRTree::create(&path, 3, 8, &config()).unwrap();
        for record in &records {
            tree.store(record.point.clone(), record.data_item.clone())
                .unwrap();
        }
        let neighbors = tree.get_neighbors(&p(&[0.5, 0.5, 0.5]), 7).unwrap();
        tree.close().unwrap();
        neighbors
    };

    let tree = SRTree::open(&path, OpenMode::Read, SessionConfig::default()).unwrap();
    assert_eq!(tree.dimension(), 3);
    assert_eq!(tree.data_item_size(), 8);
    assert_eq!(tree.block_size(), 512);
    assert_eq!(tree.info().static_algorithm, StaticAlgorithm::NonStatic);
    tree.check().unwrap();

    let stored = tree.range(All).unwrap().collect::<SRTreeResult<Vec<_>>>().unwrap();
    assert_eq!(sorted(stored), sorted(records));
    assert_eq!(tree.get_neighbors(&p(&[0.5, 0.5, 0.5]), 7).unwrap(), expected);
}

#[test]
fn test_reopen_read_write_and_modify() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("points.srt");
    let records = random_records(2, 300, 2);
    SRTree::build(&path, 2, 8, records.clone(), &config())
        .unwrap()
        .close()
        .unwrap();

    {
        let mut tree = SRTree::open(&path, OpenMode::ReadWrite, SessionConfig::default()).unwrap();
        assert_eq!(tree.info().static_algorithm, StaticAlgorithm::VamCorrected);
        for record in &records[..100] {
            tree.remove(&record.point, &record.data_item).unwrap();
        }
        tree.store(p(&[2.0, 2.0]), item("far")).unwrap();
        // dropped without close: the store is still flushed
    }

    let tree = SRTree::open(
        &path,
        OpenMode::Read,
        SessionConfig::default().with_neighbor_algorithm(NeighborAlgorithm::BreadthFirst),
    )
    .unwrap();
    assert_eq!(tree.neighbor_algorithm(), NeighborAlgorithm::BreadthFirst);
    tree.check().unwrap();
    assert_eq!(tree.range(All).unwrap().count(), 201);
    let farthest = tree.get_neighbors(&p(&[3.0, 3.0]), 1).unwrap();
    assert_eq!(farthest[0].data_item, item("far"));
}

#[test]
fn test_read_only_rejects_mutation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("points.srt");
    SRTree::build(&path, 2, 8, random_records(3, 50, 2), &config()).unwrap();

    let mut tree = SRTree::open(&path, OpenMode::Read, SessionConfig::default()).unwrap();
    match tree.store(p(&[0.0, 0.0]), item("x")) {
        Err(SRTreeError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(tree.remove(&p(&[0.0, 0.0]), &item("x")).is_err());
}

#[test]
fn test_open_missing_or_foreign_file() {
    let dir = tempdir().unwrap();
    let missing = SRTree::open(dir.path().join("nope.srt"), OpenMode::Read, SessionConfig::default());
    assert!(matches!(missing, Err(SRTreeError::Io(_))));

    let foreign = dir.path().join("foreign.srt");
    let mut bytes = vec![7u8; 1024];
    bytes[..4].copy_from_slice(&512i32.to_le_bytes());
    std::fs::write(&foreign, bytes).unwrap();
    assert!(matches!(
        SRTree::open(&foreign, OpenMode::Read, SessionConfig::default()),
        Err(SRTreeError::Corruption(_))
    ));
}

#[test]
fn test_memory_tree_dump() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dumped.srt");
    let records = random_records(4, 250, 2);

    let mut tree = SRTree::create("", 2, 8, &config()).unwrap();
    for record in &records {
        tree.store(record.point.clone(), record.data_item.clone())
            .unwrap();
    }
    tree.remove(&records[0].point, &records[0].data_item).unwrap();
    tree.dump_to_file(&path).unwrap();

    let reopened = SRTree::open(&path, OpenMode::Read, SessionConfig::default()).unwrap();
    reopened.check().unwrap();
    assert_eq!(reopened.info(), tree.info());
    assert_eq!(
        reopened.get_neighbors(&p(&[0.3, 0.3]), 10).unwrap(),
        tree.get_neighbors(&p(&[0.3, 0.3]), 10).unwrap()
    );
    assert_eq!(reopened.report().unwrap(), tree.report().unwrap());
}

#[test]
fn test_build_from_record_file() {
    let dir = tempdir().unwrap();
    let text_path = dir.path().join("records.txt");
    let records = random_records(5, 120, 3);
    {
        let mut writer = RecordWriter::create(&text_path, 3).unwrap();
        for record in &records {
            writer.write(record).unwrap();
        }
        writer.flush().unwrap();
    }

    let reader = RecordReader::open(&text_path).unwrap();
    let dimension = reader.dimension();
    let read = reader.read_all().unwrap();
    let data_item_size = read.iter().map(|r| r.data_item.len()).max().unwrap();
    // payloads gain a trailing NUL
    assert_eq!(data_item_size, 4);

    let tree = SRTree::build(dir.path().join("records.srt"), dimension, data_item_size, read, &config())
        .unwrap();
    tree.check().unwrap();
    let nearest = tree.get_neighbors(&records[17].point, 1).unwrap();
    assert_eq!(nearest[0].data_item.to_text(), records[17].data_item.to_text());
}
