//! Prints the structure and utilization of an index file.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use srtree::{OpenMode, SRTree, SessionConfig};
use srtree_tools::init_logging;

#[derive(Parser, Debug)]
#[command(name = "srtree-print", version, about)]
struct Args {
    /// Index file to print
    index_file: PathBuf,

    /// List every node and leaf
    #[arg(short, long)]
    verbose: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Audit the tree structure as well
    #[arg(long)]
    check: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let tree = SRTree::open(&args.index_file, OpenMode::Read, SessionConfig::default())
        .with_context(|| format!("cannot open index {:?}", args.index_file))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &tree.report()?)?;
        writeln!(out)?;
    } else {
        tree.print(args.verbose, &mut out)?;
    }

    if args.check {
        tree.check()?;
        writeln!(out, "Check passed")?;
    }
    Ok(())
}
