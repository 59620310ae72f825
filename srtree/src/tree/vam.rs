//! One-pass bulk construction (VAMSplit).
//!
//! The record array is partitioned recursively: each slice is cut at a
//! multiple of the capacity of a child subtree, along the axis of largest
//! variance, using selection rather than sorting. Subtrees of equal level
//! are collected until a slice is finished and then packed into a node.
//! All leaves but those on the rightmost path end up completely full.

use super::split::{max_variance_axis, Mass};
use super::SRTree;
use crate::block::{Leaf, Node};
use crate::cluster::Cluster;
use crate::config::StaticAlgorithm;
use crate::types::{BlockOffset, Record, SRTreeError, SRTreeResult};

/// A finished subtree waiting for its parent.
struct Subtree {
    offset: BlockOffset,
    level: usize,
    count: usize,
    cluster: Option<Cluster>,
}

impl SRTree {
    pub(super) fn build_static(&mut self, mut records: Vec<Record>) -> SRTreeResult<()> {
        let total = records.len();
        let mut subtrees = Vec::new();
        self.build_vam(&mut records, 0, total, None, &mut subtrees)?;

        let root = match (subtrees.pop(), subtrees.is_empty()) {
            (Some(root), true) => root,
            _ => {
                return Err(SRTreeError::corruption(
                    "bulk construction did not produce a single root",
                ))
            }
        };
        self.info.root_offset = root.offset;
        self.info.height = root.level + 1;
        self.write_super_block()?;
        log::debug!(
            "Built {} records with {}: root 0x{:08X}, height {}",
            total,
            self.info.static_algorithm,
            root.offset,
            self.info.height
        );
        Ok(())
    }

    /// Builds `records[start..end]` and appends the resulting subtrees to `out`.
    ///
    /// `level` is the level the caller expects the subtrees at (`None` for
    /// the whole tree). Returns the number of subtrees appended.
    fn build_vam(
        &mut self,
        records: &mut [Record],
        start: usize,
        end: usize,
        level: Option<usize>,
        out: &mut Vec<Subtree>,
    ) -> SRTreeResult<usize> {
        let bucket = self.info.leaf_max_count();
        let fanout = self.info.node_max_count();
        let size = end - start;

        if level.is_some() && size < bucket / 2 {
            return Err(SRTreeError::corruption(format!(
                "bulk construction produced an undersized slice ({} records)",
                size
            )));
        }
        if size <= bucket {
            out.push(self.create_bucket(&records[start..end])?);
            return Ok(1);
        }

        let (child_level, cscap, gscap) = if size <= 2 * bucket {
            (0, 1, 0)
        } else {
            let child_level = match self.info.static_algorithm {
                StaticAlgorithm::VamOriginal => {
                    let ratio = size as f64 / (2 * bucket) as f64;
                    (ratio.ln() / (fanout as f64).ln()) as usize
                }
                _ => {
                    let num_nodes = size.div_ceil(bucket);
                    let mut count = 1;
                    let mut exp = 0;
                    while count < num_nodes {
                        count *= fanout;
                        exp += 1;
                    }
                    exp - 1
                }
            };
            let cscap = bucket * fanout.pow(child_level as u32);
            (child_level, cscap, cscap / fanout)
        };

        let lo_size = match self.info.static_algorithm {
            StaticAlgorithm::VamOriginal => cscap * (size / (2 * cscap)),
            _ if gscap != 0 && size <= 2 * cscap => gscap * (size.div_ceil(gscap) / 2),
            _ => cscap * (size.div_ceil(cscap) / 2),
        };
        log::trace!(
            "VAMSplit slice {}..{}: child level {}, cscap {}, gscap {}, lo {}",
            start,
            end,
            child_level,
            cscap,
            gscap,
            lo_size
        );

        select_on_max_variance_axis(&mut records[start..end], lo_size);

        let base = out.len();
        let lo = self.build_vam(records, start, start + lo_size, Some(child_level), out)?;
        let hi = self.build_vam(records, start + lo_size, end, Some(child_level), out)?;
        let built = lo + hi;

        match level {
            Some(level) if child_level >= level => Ok(built),
            _ => {
                if cfg!(debug_assertions) {
                    check_utilization(&out[base..], end < records.len(), bucket, fanout)?;
                }
                let children: Vec<Subtree> = out.drain(base..).collect();
                out.push(self.create_node(children)?);
                Ok(1)
            }
        }
    }

    fn create_bucket(&mut self, records: &[Record]) -> SRTreeResult<Subtree> {
        let mut leaf = Leaf::new(self.allocate()?);
        for record in records {
            leaf.push(record.clone());
        }
        self.write_leaf(&leaf)?;
        Ok(Subtree {
            offset: leaf.offset(),
            level: 0,
            count: leaf.count(),
            cluster: leaf.cluster(&self.info),
        })
    }

    fn create_node(&mut self, children: Vec<Subtree>) -> SRTreeResult<Subtree> {
        let level = children.first().map(|c| c.level).unwrap_or(0);
        if children.iter().any(|c| c.level != level) {
            let levels: Vec<usize> = children.iter().map(|c| c.level).collect();
            return Err(SRTreeError::corruption(format!(
                "bulk construction produced unbalanced siblings (levels {:?})",
                levels
            )));
        }

        let mut node = Node::new(self.allocate()?);
        for child in children {
            let cluster = child.cluster.ok_or_else(|| {
                SRTreeError::corruption(format!("subtree 0x{:08X} is empty", child.offset))
            })?;
            node.push(cluster, child.offset);
        }
        self.write_node(&node)?;
        Ok(Subtree {
            offset: node.offset(),
            level: level + 1,
            count: node.count(),
            cluster: node.cluster(&self.info),
        })
    }
}

/// Moves the record of rank `rank` along the axis of largest variance into
/// place, with smaller coordinates before it and larger ones after.
fn select_on_max_variance_axis(records: &mut [Record], rank: usize) {
    if rank == 0 || rank >= records.len() {
        return;
    }
    let axis = {
        let masses: Vec<Mass> = records.iter().map(|r| Mass::of_point(&r.point)).collect();
        max_variance_axis(&masses)
    };
    records.select_nth_unstable_by(rank, |a, b| {
        a.point
            .coord(axis)
            .partial_cmp(&b.point.coord(axis))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Checks that packed siblings are full. On the rightmost path the last two
/// may hold as little as half a block.
fn check_utilization(
    siblings: &[Subtree],
    left_side: bool,
    bucket: usize,
    fanout: usize,
) -> SRTreeResult<()> {
    let n = siblings.len();
    let full_until = if left_side { n } else { n.saturating_sub(2) };
    for (i, subtree) in siblings.iter().enumerate() {
        let capacity = if subtree.level == 0 { bucket } else { fanout };
        let required = if i < full_until { capacity } else { capacity / 2 };
        if subtree.count < required {
            return Err(SRTreeError::corruption(format!(
                "{} 0x{:08X} holds {} entries (at least {} expected)",
                if subtree.level == 0 { "leaf" } else { "node" },
                subtree.offset,
                subtree.count,
                required
            )));
        }
    }
    Ok(())
}
