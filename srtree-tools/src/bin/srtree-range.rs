//! Rectangle queries: either one rectangle given on the command line, or a
//! square window around every record of a record file.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use srtree::{Range, Rect, SRTree};
use srtree_tools::{init_logging, open_for_queries, read_records, QueryStats};

#[derive(Parser, Debug)]
#[command(name = "srtree-range", version, about)]
struct Args {
    /// Index file to search
    index_file: PathBuf,

    /// Query rectangle as `min:max` per axis
    #[arg(short, long, num_args = 1.., conflicts_with = "records")]
    rect: Vec<String>,

    /// Record file whose points become window centers
    #[arg(long)]
    records: Option<PathBuf>,

    /// Width of the windows around record points
    #[arg(short, long, default_value_t = 0.1)]
    width: f64,

    /// Number of query records to read (all by default)
    #[arg(short, long)]
    count: Option<usize>,

    /// Session property as key=value (repeatable)
    #[arg(short, long = "property")]
    property: Vec<String>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_range(text: &str) -> Result<Range> {
    let (min, max) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("range `{}` is not of the form min:max", text))?;
    Ok(Range::new(min.trim().parse()?, max.trim().parse()?))
}

fn search(tree: &SRTree, rect: &Rect, stats: &mut QueryStats) -> Result<()> {
    println!("Searching {}", rect);
    let found = stats.measure(tree, || tree.get_in_rect(rect))?;
    for record in &found {
        println!("{} {}", record.point, record.data_item);
    }
    println!();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);
    let mut stats = QueryStats::new();

    match &args.records {
        Some(path) => {
            let (dimension, queries) = read_records(path, args.count)?;
            let tree = open_for_queries(&args.index_file, &args.property, dimension)?;
            let half = args.width / 2.0;
            for query in &queries {
                let ranges = query
                    .point
                    .coords()
                    .iter()
                    .map(|&x| Range::new(x - half, x + half))
                    .collect();
                search(&tree, &Rect::new(ranges), &mut stats)?;
            }
        }
        None => {
            if args.rect.is_empty() {
                bail!("give either --rect or --records");
            }
            let ranges = args
                .rect
                .iter()
                .map(|r| parse_range(r))
                .collect::<Result<Vec<_>>>()?;
            let tree = open_for_queries(&args.index_file, &args.property, ranges.len())?;
            search(&tree, &Rect::new(ranges), &mut stats)?;
        }
    }

    stats.print();
    Ok(())
}
