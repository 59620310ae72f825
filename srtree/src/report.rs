//! Utilization and cluster statistics of an index file.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::block::{Block, Leaf, Node};
use crate::constants::{BLOCK_TAG_SIZE, ENTRY_COUNT_SIZE, MAGIC};
use crate::info::TreeInfo;
use crate::profile::Summary;
use crate::tree::SRTree;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

/// Number of blocks of each kind in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCounts {
    pub nodes: u64,
    pub leaves: u64,
    pub free: u64,
}

/// Entry utilization is `count / max count`; block utilization is the share
/// of the block taken by the encoded contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Utilization {
    pub root_entries: Summary,
    pub node_entries: Summary,
    pub leaf_entries: Summary,
    pub root_blocks: Summary,
    pub node_blocks: Summary,
    pub leaf_blocks: Summary,
    pub total_blocks: Summary,
}

/// Bounds of the clusters stored at one kind of level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterStats {
    pub sphere_radius: Summary,
    pub sphere_volume: Summary,
    pub rect_diagonal: Summary,
    pub rect_volume: Summary,
}

impl ClusterStats {
    fn add(&mut self, cluster: &crate::cluster::Cluster) {
        self.sphere_radius.add(cluster.sphere().radius());
        self.sphere_volume.add(cluster.sphere().volume());
        self.rect_diagonal.add(cluster.rect().diagonal());
        self.rect_volume.add(cluster.rect().volume());
    }
}

/// Result of a full scan of the index file.
///
/// `leaf_clusters` covers the entries that point to leaves; `node_clusters`
/// covers every other node entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeReport {
    pub info: TreeInfo,
    pub node_max_count: usize,
    pub leaf_max_count: usize,
    pub blocks: BlockCounts,
    pub num_points: u64,
    pub utilization: Utilization,
    pub node_clusters: ClusterStats,
    pub leaf_clusters: ClusterStats,
}

impl SRTree {
    /// Scans every block of the file and summarizes the tree.
    pub fn report(&self) -> SRTreeResult<TreeReport> {
        self.scan(None)
    }

    /// Writes the report to `out`. `verbose` lists every node and leaf first.
    pub fn print(&self, verbose: bool, out: &mut dyn Write) -> SRTreeResult<()> {
        let report = if verbose {
            self.scan(Some(&mut *out))?
        } else {
            self.scan(None)?
        };
        write!(out, "{}", report)?;
        Ok(())
    }

    fn scan(&self, mut listing: Option<&mut dyn Write>) -> SRTreeResult<TreeReport> {
        self.check_open()?;
        let info = &self.info;
        let mut blocks = BlockCounts::default();
        let mut num_points = 0u64;
        let mut utilization = Utilization::default();

        let mut offset = info.block_size as BlockOffset;
        while offset < info.file_size {
            match self.read_block(offset)? {
                Block::Node(node) => {
                    if let Some(out) = listing.as_deref_mut() {
                        self.list_node(&node, out)?;
                    }
                    let entries = node.count() as f64 / info.node_max_count() as f64;
                    let fill = content_size(node.count(), info.node_entry_size()) as f64
                        / info.block_size as f64;
                    if offset == info.root_offset {
                        utilization.root_entries.add(entries);
                        utilization.root_blocks.add(fill);
                    } else {
                        utilization.node_entries.add(entries);
                        utilization.node_blocks.add(fill);
                    }
                    utilization.total_blocks.add(fill);
                    blocks.nodes += 1;
                }
                Block::Leaf(leaf) => {
                    if let Some(out) = listing.as_deref_mut() {
                        self.list_leaf(&leaf, out)?;
                    }
                    let fill = content_size(leaf.count(), info.leaf_entry_size()) as f64
                        / info.block_size as f64;
                    utilization
                        .leaf_entries
                        .add(leaf.count() as f64 / info.leaf_max_count() as f64);
                    utilization.leaf_blocks.add(fill);
                    utilization.total_blocks.add(fill);
                    blocks.leaves += 1;
                    num_points += leaf.count() as u64;
                }
                Block::Free { .. } => blocks.free += 1,
            }
            offset += info.block_size as BlockOffset;
        }

        let mut node_clusters = ClusterStats::default();
        let mut leaf_clusters = ClusterStats::default();
        self.measure_clusters(info.root_offset, 0, &mut node_clusters, &mut leaf_clusters)?;

        Ok(TreeReport {
            info: info.clone(),
            node_max_count: info.node_max_count(),
            leaf_max_count: info.leaf_max_count(),
            blocks,
            num_points,
            utilization,
            node_clusters,
            leaf_clusters,
        })
    }

    fn measure_clusters(
        &self,
        offset: BlockOffset,
        level: usize,
        node_clusters: &mut ClusterStats,
        leaf_clusters: &mut ClusterStats,
    ) -> SRTreeResult<()> {
        let height = self.info.height;
        match self.read_block(offset)? {
            Block::Node(node) => {
                if level + 1 >= height {
                    return Err(SRTreeError::corruption(format!(
                        "node 0x{:08X} found at the leaf level",
                        offset
                    )));
                }
                for entry in node.entries() {
                    if level + 2 == height {
                        leaf_clusters.add(&entry.cluster);
                    } else {
                        node_clusters.add(&entry.cluster);
                    }
                    self.measure_clusters(entry.child, level + 1, node_clusters, leaf_clusters)?;
                }
                Ok(())
            }
            Block::Leaf(_) if level + 1 == height => Ok(()),
            Block::Leaf(_) => Err(SRTreeError::corruption(format!(
                "leaf 0x{:08X} found at level {} of a tree of height {}",
                offset, level, height
            ))),
            Block::Free { .. } => Err(SRTreeError::corruption(format!(
                "tree links to the free block 0x{:08X}",
                offset
            ))),
        }
    }

    fn list_node(&self, node: &Node, out: &mut dyn Write) -> SRTreeResult<()> {
        let info = &self.info;
        let size = content_size(node.count(), info.node_entry_size());
        writeln!(out, "Block (0x{:08X})", node.offset())?;
        writeln!(out, "    type              : NODE")?;
        writeln!(
            out,
            "    entry utilization : {} ({} %)",
            node.count(),
            percent(node.count(), info.node_max_count())
        )?;
        writeln!(
            out,
            "    block utilization : {} ({} %)",
            size,
            percent(size, info.block_size)
        )?;
        for (i, entry) in node.entries().iter().enumerate() {
            writeln!(
                out,
                "    {:5}: cluster = {}, offset = 0x{:08X}",
                i, entry.cluster, entry.child
            )?;
        }
        Ok(())
    }

    fn list_leaf(&self, leaf: &Leaf, out: &mut dyn Write) -> SRTreeResult<()> {
        let info = &self.info;
        let size = content_size(leaf.count(), info.leaf_entry_size());
        writeln!(out, "Block (0x{:08X})", leaf.offset())?;
        writeln!(out, "    type              : LEAF")?;
        writeln!(
            out,
            "    entry utilization : {} ({} %)",
            leaf.count(),
            percent(leaf.count(), info.leaf_max_count())
        )?;
        writeln!(
            out,
            "    block utilization : {} ({} %)",
            size,
            percent(size, info.block_size)
        )?;
        for (i, record) in leaf.records().iter().enumerate() {
            writeln!(out, "    {:5}: {} {}", i, record.point, record.data_item)?;
        }
        Ok(())
    }
}

fn content_size(count: usize, entry_size: usize) -> usize {
    BLOCK_TAG_SIZE + ENTRY_COUNT_SIZE + count * entry_size
}

fn percent(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

fn magic_text() -> String {
    MAGIC.to_be_bytes().iter().map(|&b| b as char).collect()
}

struct Percent<'a>(&'a Summary);

impl fmt::Display for Percent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg {:9.5} %, min {:9.5} %, max {:9.5} %",
            self.0.avg() * 100.0,
            self.0.min * 100.0,
            self.0.max * 100.0
        )
    }
}

struct Spread<'a>(&'a Summary);

impl fmt::Display for Spread<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg {:13.6e}, min {:13.6e}, max {:13.6e}",
            self.0.avg(),
            self.0.min,
            self.0.max
        )
    }
}

impl fmt::Display for TreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.info;
        let u = &self.utilization;
        writeln!(f, "SuperBlock")?;
        writeln!(f, "    magic               : {}", magic_text())?;
        writeln!(f, "    dimension           : {}", info.dimension)?;
        writeln!(f, "    dataItemSize        : {}", info.data_item_size)?;
        writeln!(f, "    fileSize            : {}", info.file_size)?;
        writeln!(f, "    freeOffset          : 0x{:08X}", info.free_offset)?;
        writeln!(f, "    rootOffset          : 0x{:08X}", info.root_offset)?;
        writeln!(f, "    height              : {}", info.height)?;
        writeln!(f, "    blockSize           : {}", info.block_size)?;
        writeln!(f, "    splitFactor         : {}", info.split_factor)?;
        writeln!(f, "    reinsertFactor      : {}", info.reinsert_factor)?;
        writeln!(f, "    staticAlgorithm     : {}", info.static_algorithm)?;
        writeln!(f, "    nonLeafFloatType    : {}", info.non_leaf_float_type)?;
        writeln!(f, "Node maxCount           : {}", self.node_max_count)?;
        writeln!(f, "Leaf maxCount           : {}", self.leaf_max_count)?;
        writeln!(f, "Root entry utilization  : {:9.5} %", u.root_entries.avg() * 100.0)?;
        writeln!(f, "Node entry utilization  : {}", Percent(&u.node_entries))?;
        writeln!(f, "Leaf entry utilization  : {}", Percent(&u.leaf_entries))?;
        writeln!(f, "Root block utilization  : {:9.5} %", u.root_blocks.avg() * 100.0)?;
        writeln!(f, "Node block utilization  : {}", Percent(&u.node_blocks))?;
        writeln!(f, "Leaf block utilization  : {}", Percent(&u.leaf_blocks))?;
        writeln!(f, "Total block utilization : {}", Percent(&u.total_blocks))?;
        writeln!(f, "Number of nodes         : {}", self.blocks.nodes)?;
        writeln!(f, "Number of leaves        : {}", self.blocks.leaves)?;
        writeln!(f, "Number of free blocks   : {}", self.blocks.free)?;
        writeln!(f, "Number of leaf entries  : {}", self.num_points)?;
        let clusters = [("Node", &self.node_clusters), ("Leaf", &self.leaf_clusters)];
        for (kind, stats) in clusters {
            writeln!(f, "{} sphere radius: {}", kind, Spread(&stats.sphere_radius))?;
            writeln!(f, "{} sphere volume: {}", kind, Spread(&stats.sphere_volume))?;
            writeln!(f, "{} rect diagonal: {}", kind, Spread(&stats.rect_diagonal))?;
            writeln!(f, "{} rect volume  : {}", kind, Spread(&stats.rect_volume))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::geometry::Point;
    use crate::types::{DataItem, Record};

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(
                    Point::new(vec![(i % 6) as f64, (i / 6) as f64]),
                    DataItem::from(format!("{}", i).as_str()),
                )
            })
            .collect()
    }

    #[test]
    fn test_report_counts_blocks_and_points() {
        let config = IndexConfig::default().with_block_size(256);
        let mut tree = SRTree::create_in_memory(2, 40, &config).unwrap();
        for record in records(30) {
            tree.store(record.point, record.data_item).unwrap();
        }
        tree.remove(&Point::new(vec![0.0, 0.0]), &DataItem::from("0"))
            .unwrap();

        let report = tree.report().unwrap();
        assert_eq!(report.num_points, 29);
        assert_eq!(report.leaf_max_count, 4);
        assert_eq!(report.node_max_count, 3);
        let total = report.blocks.nodes + report.blocks.leaves + report.blocks.free;
        assert_eq!(total as i64, tree.info().file_size / 256 - 1);
        assert_eq!(report.utilization.root_entries.count, 1);
        assert!(report.utilization.leaf_entries.max <= 1.0);
        assert!(report.utilization.leaf_entries.min > 0.0);
        assert!(report.leaf_clusters.sphere_radius.count > 0);
    }

    #[test]
    fn test_static_tree_leaves_are_full() {
        let config = IndexConfig::default().with_block_size(256);
        let tree = SRTree::build_in_memory(2, 40, records(32), &config).unwrap();
        let report = tree.report().unwrap();
        assert_eq!(report.num_points, 32);
        assert_eq!(report.blocks.free, 0);
        assert_eq!(report.utilization.leaf_entries.avg(), 1.0);
    }

    #[test]
    fn test_print_and_serialize() {
        let config = IndexConfig::default().with_block_size(256);
        let tree = SRTree::build_in_memory(2, 40, records(10), &config).unwrap();

        let mut short = Vec::new();
        tree.print(false, &mut short).unwrap();
        let short = String::from_utf8(short).unwrap();
        assert!(short.starts_with("SuperBlock\n    magic               : HnSR\n"));
        assert!(short.contains("Number of leaf entries  : 10"));
        assert!(!short.contains("Block (0x"));

        let mut long = Vec::new();
        tree.print(true, &mut long).unwrap();
        let long = String::from_utf8(long).unwrap();
        assert!(long.contains("type              : LEAF"));
        assert!(long.ends_with(&short));

        let json = serde_json::to_value(tree.report().unwrap()).unwrap();
        assert_eq!(json["num_points"], 10);
        assert_eq!(json["info"]["dimension"], 2);
    }

    #[test]
    fn test_single_leaf_tree_has_no_clusters() {
        let config = IndexConfig::default().with_block_size(256);
        let tree = SRTree::build_in_memory(2, 40, records(3), &config).unwrap();
        let report = tree.report().unwrap();
        assert_eq!(report.blocks.leaves, 1);
        assert_eq!(report.blocks.nodes, 0);
        assert_eq!(report.leaf_clusters.sphere_radius.count, 0);
        assert_eq!(report.node_clusters.rect_volume.count, 0);
    }
}
