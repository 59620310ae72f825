//! Builds a packed index from a record file with VAMSplit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use srtree::SRTree;
use srtree_tools::{index_config, init_logging, read_records};

#[derive(Parser, Debug)]
#[command(name = "srtree-static-build", version, about)]
struct Args {
    /// Record file to read
    record_file: PathBuf,

    /// Index file to create
    index_file: PathBuf,

    /// Number of records to read (all by default)
    #[arg(short, long)]
    count: Option<usize>,

    /// Index property as key=value (repeatable)
    #[arg(short, long = "property")]
    property: Vec<String>,

    /// Payload size in bytes (longest payload of the file by default)
    #[arg(short = 's', long)]
    data_size: Option<usize>,

    /// Verify the tree after building
    #[arg(long)]
    check: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = index_config(&args.property)?;
    let (dimension, records) = read_records(&args.record_file, args.count)?;
    let data_size = args
        .data_size
        .unwrap_or_else(|| records.iter().map(|r| r.data_item.len()).max().unwrap_or(0));
    let total = records.len();

    let mut tree = SRTree::build(&args.index_file, dimension, data_size, records, &config)
        .with_context(|| format!("cannot build index {:?}", args.index_file))?;
    if args.check {
        tree.check()?;
    }
    tree.close()?;

    println!(
        "Built {:?} from {} records with {} (height {}, {} bytes)",
        args.index_file,
        total,
        tree.info().static_algorithm,
        tree.height(),
        tree.info().file_size
    );
    Ok(())
}
