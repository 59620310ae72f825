//! Colored nearest-neighbor search: all query records form one point set and
//! at most one neighbor is reported per payload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use srtree::{NeighborAlgorithm, Point};
use srtree_tools::{init_logging, open_for_queries, read_records, QueryStats};

#[derive(Parser, Debug)]
#[command(name = "srtree-colored-nn", version, about)]
struct Args {
    /// Record file holding the query points
    record_file: PathBuf,

    /// Index file to search
    index_file: PathBuf,

    /// Number of query records to read (all by default)
    #[arg(short, long)]
    count: Option<usize>,

    /// Number of neighbors
    #[arg(short, long, default_value_t = 10)]
    neighbors: usize,

    /// Session property as key=value (repeatable)
    #[arg(short, long = "property")]
    property: Vec<String>,

    /// Use the breadth-first search
    #[arg(long)]
    breadth_first: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let (dimension, queries) = read_records(&args.record_file, args.count)?;
    let mut tree = open_for_queries(&args.index_file, &args.property, dimension)?;
    if args.breadth_first {
        tree.set_neighbor_algorithm(NeighborAlgorithm::BreadthFirst);
    }

    let points: Vec<Point> = queries.into_iter().map(|r| r.point).collect();
    println!("Searching {} points", points.len());

    let mut stats = QueryStats::new();
    let found = stats.measure(&tree, || tree.get_colored_neighbors(&points, args.neighbors))?;
    for record in &found {
        let distance = points
            .iter()
            .map(|q| q.distance(&record.point))
            .fold(f64::INFINITY, f64::min);
        println!("{}: {}", record.data_item, distance);
    }
    tree.close()?;

    stats.print();
    Ok(())
}
