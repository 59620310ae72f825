//! Shared plumbing of the SR-tree command-line tools.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use srtree::{
    IndexConfig, OpenMode, ProfileSnapshot, ProfileStats, Record, RecordReader, SRTree,
    SessionConfig, Summary,
};

/// Installs `env_logger`; `debug` raises the default level of the srtree crate.
pub fn init_logging(debug: bool) {
    let default = if debug { "srtree=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Splits `key=value` arguments.
pub fn parse_properties(args: &[String]) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow!("property `{}` is not of the form key=value", arg))
        })
        .collect()
}

/// Index parameters from `key=value` arguments.
pub fn index_config(properties: &[String]) -> Result<IndexConfig> {
    Ok(IndexConfig::from_properties(parse_properties(properties)?)?)
}

/// Reads at most `count` records (all of them when `None`).
pub fn read_records(path: &Path, count: Option<usize>) -> Result<(usize, Vec<Record>)> {
    let reader =
        RecordReader::open(path).with_context(|| format!("cannot open record file {:?}", path))?;
    let dimension = reader.dimension();
    let records = reader
        .take(count.unwrap_or(usize::MAX))
        .collect::<srtree::SRTreeResult<Vec<_>>>()
        .with_context(|| format!("cannot read record file {:?}", path))?;
    log::debug!("Read {} records of dimension {} from {:?}", records.len(), dimension, path);
    Ok((dimension, records))
}

/// Opens an index for queries, applying session properties and checking
/// that its dimension matches the query records.
pub fn open_for_queries(path: &Path, properties: &[String], dimension: usize) -> Result<SRTree> {
    let mut tree = SRTree::open(path, OpenMode::Read, SessionConfig::default())
        .with_context(|| format!("cannot open index {:?}", path))?;
    tree.set_properties(parse_properties(properties)?)?;
    if tree.dimension() != dimension {
        bail!(
            "mismatch in dimensions: the record file has {}, the index has {}",
            dimension,
            tree.dimension()
        );
    }
    print_properties(&tree);
    Ok(tree)
}

pub fn print_properties(tree: &SRTree) {
    for (name, value) in tree.properties() {
        println!("{}={}", name, value);
    }
}

/// Per-query profile counters and elapsed times.
#[derive(Default)]
pub struct QueryStats {
    counters: ProfileStats,
    elapsed: Summary,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `query` with a fresh profile and records its cost.
    pub fn measure<T>(&mut self, tree: &SRTree, query: impl FnOnce() -> T) -> T {
        tree.reset_profile();
        let start = Instant::now();
        let result = query();
        self.add(tree.profile(), start.elapsed());
        result
    }

    fn add(&mut self, sample: ProfileSnapshot, elapsed: Duration) {
        self.counters.add_sample(&sample);
        self.elapsed.add(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn print(&self) {
        println!("**** Processing Cost ****");
        println!("{:<24} {}", "elapsed_ms", self.elapsed);
        print!("{}", self.counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        let args = vec![
            "HnSRTreeBlockSize=1024".to_string(),
            " HnSRTreeNeighborAlgorithm = BREADTH_FIRST".to_string(),
        ];
        let parsed = parse_properties(&args).unwrap();
        assert_eq!(parsed[0], ("HnSRTreeBlockSize".to_string(), "1024".to_string()));
        assert_eq!(parsed[1].1, "BREADTH_FIRST");

        assert!(parse_properties(&["nonsense".to_string()]).is_err());
        assert_eq!(index_config(&args[..1]).unwrap().block_size, 1024);
    }
}
