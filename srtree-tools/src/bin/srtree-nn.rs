//! Nearest-neighbor search for every record of a record file.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use srtree::NeighborAlgorithm;
use srtree_tools::{init_logging, open_for_queries, read_records, QueryStats};

#[derive(Parser, Debug)]
#[command(name = "srtree-nn", version, about)]
struct Args {
    /// Record file holding the query points
    record_file: PathBuf,

    /// Index file to search
    index_file: PathBuf,

    /// Number of query records to read (all by default)
    #[arg(short, long)]
    count: Option<usize>,

    /// Number of neighbors per query
    #[arg(short, long, default_value_t = 10)]
    neighbors: usize,

    /// Session property as key=value (repeatable)
    #[arg(short, long = "property")]
    property: Vec<String>,

    /// Use the breadth-first search
    #[arg(long)]
    breadth_first: bool,

    /// Fail unless every query record is among its own neighbors
    #[arg(short, long)]
    verify: bool,

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

    let mut stats = QueryStats::new();
    for query in &queries {
        println!("Searching {}", query.point);
        let found = stats.measure(&tree, || tree.get_neighbors(&query.point, args.neighbors))?;
        for record in &found {
            println!("{}: {}", record.data_item, record.point.distance(&query.point));
        }
        println!();

        if args.verify && !found.contains(query) {
            bail!("record {} is not found", query.data_item);
        }
    }
    tree.close()?;

    stats.print();
    Ok(())
}
