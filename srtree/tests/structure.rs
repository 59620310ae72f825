mod common;

use common::{init_logging, item, p, random_records, sorted};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use srtree::{
    All, DataItem, IndexConfig, NonLeafFloatType, Record, SRTree, SRTreeError, SRTreeResult,
    StaticAlgorithm,
};

fn all_records(tree: &SRTree) -> Vec<Record> {
    sorted(tree.range(All).unwrap().collect::<SRTreeResult<Vec<_>>>().unwrap())
}

/// Every non-root block keeps at least the minimum fill after insertions.
fn assert_fill(tree: &SRTree) {
    let report = tree.report().unwrap();
    let info = tree.info();
    let leaf_min = (tree.leaf_max_count() * info.split_factor / 100) as f64
        / tree.leaf_max_count() as f64;
    if report.blocks.nodes > 0 {
        assert!(report.utilization.leaf_entries.min >= leaf_min);
    }
    assert!(report.utilization.leaf_entries.max <= 1.0);
    assert!(report.utilization.node_entries.max <= 1.0);
}

#[test]
fn test_random_inserts_keep_tree_valid() {
    init_logging();
    for float_type in [NonLeafFloatType::Double, NonLeafFloatType::Single] {
        let config = IndexConfig::default()
            .with_block_size(512)
            .with_non_leaf_float_type(float_type);
        let records = random_records(42, 700, 3);
        let mut tree = SRTree::create_in_memory(3, 8, &config).unwrap();
        for (i, record) in records.iter().enumerate() {
            tree.store(record.point.clone(), record.data_item.clone())
                .unwrap();
            if i % 100 == 0 {
                tree.check().unwrap();
            }
        }
        tree.check().unwrap();
        assert_fill(&tree);
        assert_eq!(tree.report().unwrap().num_points, 700);
        assert_eq!(all_records(&tree), sorted(records));
    }
}

/// Small blocks in 3 and 4 dimensions leave nodes with only a few entries,
/// so single-child parents are common while the tree grows and shrinks.
#[test]
fn test_small_fanout_inserts_and_removals() {
    init_logging();
    let mut seed = 100;
    for dimension in [3, 4] {
        for block_size in [256, 512] {
            for float_type in [NonLeafFloatType::Double, NonLeafFloatType::Single] {
                seed += 1;
                let config = IndexConfig::default()
                    .with_block_size(block_size)
                    .with_non_leaf_float_type(float_type);
                let mut records = random_records(seed, 500, dimension);
                let mut tree = SRTree::create_in_memory(dimension, 8, &config).unwrap();

                for (i, record) in records.iter().enumerate() {
                    tree.store(record.point.clone(), record.data_item.clone())
                        .unwrap();
                    if i % 100 == 99 {
                        tree.check().unwrap();
                    }
                }
                assert_eq!(all_records(&tree), sorted(records.clone()));

                let mut rng = StdRng::seed_from_u64(seed);
                records.shuffle(&mut rng);
                while records.len() > 100 {
                    for record in records.drain(..80) {
                        tree.remove(&record.point, &record.data_item).unwrap();
                    }
                    tree.check().unwrap();
                }
                assert_eq!(all_records(&tree), sorted(records.clone()));

                for record in records.drain(..) {
                    tree.remove(&record.point, &record.data_item).unwrap();
                }
                tree.check().unwrap();
                assert_eq!(tree.height(), 1);
                assert!(all_records(&tree).is_empty());
            }
        }
    }
}

#[test]
fn test_factors_at_their_limits() {
    let records = random_records(9, 300, 2);
    for (split, reinsert) in [(0, 0), (50, 50), (10, 0), (40, 30)] {
        let config = IndexConfig::default()
            .with_block_size(256)
            .with_split_factor(split)
            .with_reinsert_factor(reinsert);
        let mut tree = SRTree::create_in_memory(2, 8, &config).unwrap();
        for record in &records {
            tree.store(record.point.clone(), record.data_item.clone())
                .unwrap();
        }
        tree.check().unwrap();
        assert_eq!(all_records(&tree).len(), 300);
    }
}

#[test]
fn test_interleaved_removals() {
    init_logging();
    let config = IndexConfig::default().with_block_size(256);
    let records = random_records(17, 400, 2);
    let mut tree = SRTree::create_in_memory(2, 8, &config).unwrap();
    for record in &records {
        tree.store(record.point.clone(), record.data_item.clone())
            .unwrap();
    }

    let mut order = records.clone();
    order.shuffle(&mut StdRng::seed_from_u64(18));
    let (gone, kept) = order.split_at(250);
    for (i, record) in gone.iter().enumerate() {
        tree.remove(&record.point, &record.data_item).unwrap();
        if i % 50 == 0 {
            tree.check().unwrap();
        }
    }
    tree.check().unwrap();
    assert_eq!(all_records(&tree), sorted(kept.to_vec()));
    assert!(tree.report().unwrap().blocks.free > 0);

    // freed blocks are reused before the file grows
    let file_size = tree.info().file_size;
    for record in gone.iter().take(20) {
        tree.store(record.point.clone(), record.data_item.clone())
            .unwrap();
    }
    assert_eq!(tree.info().file_size, file_size);
    tree.check().unwrap();
}

#[test]
fn test_duplicates() {
    let config = IndexConfig::default().with_block_size(256);
    let mut tree = SRTree::create_in_memory(2, 8, &config).unwrap();
    for _ in 0..30 {
        tree.store(p(&[1.0, 1.0]), item("dup")).unwrap();
    }
    tree.store(p(&[2.0, 2.0]), item("other")).unwrap();
    tree.check().unwrap();

    let found = tree.get_neighbors(&p(&[1.0, 1.0]), 1).unwrap();
    assert_eq!(found.len(), 30);

    for left in (0..30).rev() {
        tree.remove(&p(&[1.0, 1.0]), &item("dup")).unwrap();
        assert_eq!(all_records(&tree).len(), left + 1);
    }
    assert!(matches!(
        tree.remove(&p(&[1.0, 1.0]), &item("dup")),
        Err(SRTreeError::NotFound)
    ));
    tree.check().unwrap();
    assert_eq!(tree.height(), 1);
}

#[test]
fn test_static_builds_are_packed() {
    init_logging();
    let config = IndexConfig::default().with_block_size(512);
    for n in [0, 1, 14, 15, 100, 1000, 2345] {
        let records = random_records(n as u64, n, 3);
        let tree = SRTree::build_in_memory(3, 8, records.clone(), &config).unwrap();
        tree.check().unwrap();

        let report = tree.report().unwrap();
        assert_eq!(report.num_points, n as u64);
        assert_eq!(report.blocks.free, 0);
        if n > tree.leaf_max_count() {
            // only leaves on the rightmost path may be half full
            assert!(report.utilization.leaf_entries.min >= 0.5);
        }
        assert_eq!(all_records(&tree), sorted(records));
    }
}

#[test]
fn test_static_tree_accepts_updates() {
    let config = IndexConfig::default()
        .with_block_size(512)
        .with_static_algorithm(StaticAlgorithm::VamOriginal);
    let records = random_records(77, 40, 2);
    let mut tree = SRTree::build_in_memory(2, 8, records.clone(), &config).unwrap();
    assert_eq!(tree.info().static_algorithm, StaticAlgorithm::VamOriginal);
    tree.check().unwrap();

    for record in random_records(78, 60, 2) {
        tree.store(record.point, DataItem::from(format!("new{}", record.data_item).as_str()))
            .unwrap();
    }
    for record in &records[..20] {
        tree.remove(&record.point, &record.data_item).unwrap();
    }
    tree.check().unwrap();
    assert_eq!(all_records(&tree).len(), 80);
}

/// With 14 points per leaf and 5 entries per node, the logarithmic subtree
/// size of VAM_ORIGINAL packs too many children into a node from 71 points
/// on, except for a few exact multiples of the subtree capacity.
#[test]
fn test_original_and_corrected_static_boundaries() {
    let original = IndexConfig::default()
        .with_block_size(512)
        .with_static_algorithm(StaticAlgorithm::VamOriginal);
    let corrected = original.clone().with_static_algorithm(StaticAlgorithm::VamCorrected);

    for n in [14, 15, 40, 70] {
        let records = random_records(n as u64, n, 3);
        let tree = SRTree::build_in_memory(3, 8, records.clone(), &original).unwrap();
        assert_eq!((tree.leaf_max_count(), tree.node_max_count()), (14, 5));
        tree.check().unwrap();
        assert_eq!(all_records(&tree), sorted(records));
    }
    for n in [71, 100, 333, 1000] {
        let records = random_records(n as u64, n, 3);
        let result = SRTree::build_in_memory(3, 8, records, &original);
        assert!(matches!(result, Err(SRTreeError::Capacity(_))), "n = {}", n);
    }

    for n in [14, 15, 40, 70, 71, 100, 333, 1000] {
        let records = random_records(n as u64, n, 3);
        let tree = SRTree::build_in_memory(3, 8, records.clone(), &corrected).unwrap();
        tree.check().unwrap();
        assert_eq!(tree.report().unwrap().blocks.free, 0);
        assert_eq!(all_records(&tree), sorted(records));
    }
}
