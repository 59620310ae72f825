#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srtree::{DataItem, Point, Record};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn p(coords: &[f64]) -> Point {
    Point::new(coords.to_vec())
}

pub fn item(text: &str) -> DataItem {
    DataItem::from(text)
}

/// Uniform random records in the unit cube, payloads `"0"`, `"1"`, ...
pub fn random_records(seed: u64, n: usize, dimension: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let coords = (0..dimension).map(|_| rng.gen::<f64>()).collect();
            Record::new(Point::new(coords), DataItem::from(i.to_string().as_str()))
        })
        .collect()
}

pub fn random_points(seed: u64, n: usize, dimension: usize) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Point::new((0..dimension).map(|_| rng.gen_range(-0.1..1.1)).collect()))
        .collect()
}

/// Distances of the records nearest to `query`, ascending.
pub fn brute_force_distances(records: &[Record], query: &Point) -> Vec<f64> {
    let mut distances: Vec<f64> = records.iter().map(|r| r.point.distance(query)).collect();
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
    distances
}

pub fn sorted(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(Record::compare);
    records
}
