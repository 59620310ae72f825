//! Builds an index by inserting the records of a record file one by one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use srtree::SRTree;
use srtree_tools::{index_config, init_logging, read_records};

#[derive(Parser, Debug)]
#[command(name = "srtree-build", version, about)]
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

    /// Build in memory and dump the result to the index file
    #[arg(short, long)]
    memory: bool,

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

    let target = if args.memory {
        PathBuf::new()
    } else {
        args.index_file.clone()
    };
    let mut tree = SRTree::create(&target, dimension, data_size, &config)
        .with_context(|| format!("cannot create index {:?}", args.index_file))?;

    let total = records.len();
    for (i, record) in records.into_iter().enumerate() {
        tree.store(record.point, record.data_item)
            .with_context(|| format!("cannot store record {}", i + 1))?;
        if (i + 1) % 1000 == 0 {
            log::info!("Stored {} of {} records", i + 1, total);
        }
    }

    if args.check {
        tree.check()?;
    }
    if args.memory {
        tree.dump_to_file(&args.index_file)?;
    }
    tree.close()?;

    println!(
        "Stored {} records in {:?} (height {}, {} bytes)",
        total,
        args.index_file,
        tree.height(),
        tree.info().file_size
    );
    println!("{}", tree.profile());
    Ok(())
}
