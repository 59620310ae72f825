//! # SR-tree - Persistent Similarity Search Index
//!
//! An SR-tree stores multidimensional points with small opaque payloads in
//! a file of fixed-size blocks and answers range and nearest-neighbor
//! queries over them. Every subtree is bounded by both a rectangle and a
//! sphere; searches prune with whichever bound is tighter.
//!
//! ## Features
//!
//! - **Dynamic insertion**: split and forced reinsertion in the R*-tree manner
//! - **Deletion**: underflowing blocks are dissolved and their entries reinserted
//! - **Bulk construction**: one-pass VAMSplit build of fully packed trees
//! - **Queries**: resumable range iteration, k-nearest-neighbor search
//!   (depth-first or breadth-first), colored neighbor search
//! - **Diagnostics**: structural audit, utilization report, I/O profile
//!
//! ## Usage
//!
//! ```rust,no_run
//! use srtree::{DataItem, IndexConfig, Point, Rect, SRTree};
//! use tempfile::tempdir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempdir()?;
//! let mut tree = SRTree::create(dir.path().join("cities.srt"), 2, 16, &IndexConfig::default())?;
//!
//! tree.store(Point::new(vec![35.68, 139.69]), DataItem::from("tokyo"))?;
//! tree.store(Point::new(vec![34.69, 135.50]), DataItem::from("osaka"))?;
//!
//! let nearest = tree.get_neighbors(&Point::new(vec![35.0, 136.0]), 1)?;
//! assert_eq!(nearest[0].data_item, DataItem::from("osaka"));
//!
//! let inside = tree.get_in_rect(&Rect::from_bounds(&[35.0, 139.0], &[36.0, 140.0]))?;
//! assert_eq!(inside.len(), 1);
//! # Ok(())
//! # }
//! ```

// Index engine
mod audit;
mod block;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod geometry;
pub mod info;
pub mod profile;
pub mod query;
mod stack;
pub mod storage;
mod tree;
pub mod types;

// Reporting and record files
pub mod record;
pub mod report;

pub use cluster::Cluster;
pub use config::{
    IndexConfig, NeighborAlgorithm, NonLeafFloatType, Properties, SessionConfig,
    StaticAlgorithm,
};
pub use geometry::{Point, Range, Rect, Sphere};
pub use info::TreeInfo;
pub use profile::{ProfileSnapshot, ProfileStats, Summary};
pub use query::{All, QueryRegion, RangeIter};
pub use record::{RecordReader, RecordWriter};
pub use report::TreeReport;
pub use tree::{OpenMode, SRTree};
pub use types::{BlockOffset, DataItem, Record, SRTreeError, SRTreeResult};
