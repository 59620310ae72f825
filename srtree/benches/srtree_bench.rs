//! SR-tree benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srtree::{DataItem, IndexConfig, NeighborAlgorithm, Point, Record, Rect, SRTree};
use std::hint::black_box;
use tempfile::tempdir;

const DIMENSION: usize = 8;

fn records(n: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(n as u64);
    (0..n)
        .map(|i| {
            let coords = (0..DIMENSION).map(|_| rng.gen::<f64>()).collect();
            Record::new(Point::new(coords), DataItem::from(i.to_string().as_str()))
        })
        .collect()
}

fn config() -> IndexConfig {
    IndexConfig::default().with_block_size(4096)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("SRTree Insert");

    for size in [100, 1000, 10000].iter() {
        let data = records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("bench.srt");
                    (SRTree::create(&path, DIMENSION, 8, &config()).unwrap(), dir)
                },
                |(mut tree, _dir)| {
                    for record in data {
                        tree.store(record.point.clone(), record.data_item.clone())
                            .unwrap();
                    }
                    black_box(tree.height())
                },
            );
        });
    }

    group.finish();
}

fn bench_static_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("SRTree Static Build");

    for size in [1000, 10000, 100000].iter() {
        let data = records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let tree = SRTree::build_in_memory(DIMENSION, 8, data.clone(), &config()).unwrap();
                black_box(tree.height())
            });
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("SRTree Search");

    let dir = tempdir().unwrap();
    let mut tree = SRTree::build(dir.path().join("bench.srt"), DIMENSION, 8, records(20000), &config())
        .unwrap();
    let query = Point::new(vec![0.5; DIMENSION]);

    group.bench_function("rect_20k", |b| {
        let rect = Rect::from_bounds(&[0.3; DIMENSION], &[0.7; DIMENSION]);
        b.iter(|| black_box(tree.get_in_rect(&rect).unwrap()));
    });

    for algorithm in [NeighborAlgorithm::DepthFirst, NeighborAlgorithm::BreadthFirst] {
        tree.set_neighbor_algorithm(algorithm);
        group.bench_function(format!("nn_20k_{}", algorithm), |b| {
            b.iter(|| black_box(tree.get_neighbors(&query, 10).unwrap()));
        });
    }

    group.bench_function("colored_nn_20k", |b| {
        let queries = vec![query.clone(), Point::new(vec![0.2; DIMENSION])];
        b.iter(|| black_box(tree.get_colored_neighbors(&queries, 10).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_static_build, bench_queries);
criterion_main!(benches);
