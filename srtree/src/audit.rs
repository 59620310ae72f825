//! Structural audit of a whole tree.
//!
//! `check` is diagnostic only. It reads every reachable block and verifies
//! that stored clusters match their children, that all leaves sit at the
//! same depth and that every point lies inside the bounds of each ancestor
//! entry.

use crate::block::Block;
use crate::cluster::Cluster;
use crate::geometry::Point;
use crate::tree::SRTree;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

impl SRTree {
    /// Audits the tree, returning [`SRTreeError::Corruption`] on the first
    /// violation found.
    pub fn check(&self) -> SRTreeResult<()> {
        self.check_open()?;
        let root = self.info.root_offset;
        let levels = self.check_block(root, None)?;
        if levels != self.info.height {
            return Err(violation(format!(
                "tree has {} levels but the super block records height {}",
                levels, self.info.height
            )));
        }
        self.check_inclusion(root)?;
        log::debug!("Checked SR-tree: height {}, root 0x{:08X}", levels, root);
        Ok(())
    }

    /// Number of levels below and including `offset`.
    fn check_block(&self, offset: BlockOffset, expected: Option<&Cluster>) -> SRTreeResult<usize> {
        match self.read_block(offset)? {
            Block::Node(node) => {
                if let Some(expected) = expected {
                    check_cluster(offset, expected, node.cluster(&self.info))?;
                }
                let mut levels = None;
                for entry in node.entries() {
                    let child = self.check_block(entry.child, Some(&entry.cluster))?;
                    match levels {
                        None => levels = Some(child),
                        Some(levels) if levels != child => {
                            return Err(violation(format!(
                                "the tree is not balanced at node 0x{:08X}",
                                offset
                            )))
                        }
                        Some(_) => {}
                    }
                }
                Ok(levels.unwrap_or(0) + 1)
            }
            Block::Leaf(leaf) => {
                if let Some(expected) = expected {
                    check_cluster(offset, expected, leaf.cluster(&self.info))?;
                }
                Ok(1)
            }
            Block::Free { .. } => Err(violation(format!(
                "unexpected free block 0x{:08X} in the tree",
                offset
            ))),
        }
    }

    /// Points of the subtree at `offset`, checked against the bounds of
    /// every entry on the way up.
    fn check_inclusion(&self, offset: BlockOffset) -> SRTreeResult<Vec<Point>> {
        match self.read_block(offset)? {
            Block::Node(node) => {
                let mut sum = Vec::new();
                for entry in node.entries() {
                    let points = self.check_inclusion(entry.child)?;
                    let sphere = entry.cluster.sphere();
                    let rect = entry.cluster.rect();
                    for point in &points {
                        if !sphere.includes(point) {
                            return Err(violation(format!(
                                "point {} is not included in the sphere {} of node 0x{:08X} \
                                 (distance from the center {})",
                                point,
                                sphere,
                                offset,
                                sphere.center().distance(point)
                            )));
                        }
                        if !rect.includes(point) {
                            return Err(violation(format!(
                                "point {} is not included in the rect {} of node 0x{:08X}",
                                point, rect, offset
                            )));
                        }
                    }
                    sum.extend(points);
                }
                Ok(sum)
            }
            Block::Leaf(leaf) => Ok(leaf.into_records().into_iter().map(|r| r.point).collect()),
            Block::Free { .. } => Err(violation(format!(
                "unexpected free block 0x{:08X} in the tree",
                offset
            ))),
        }
    }
}

fn check_cluster(
    offset: BlockOffset,
    expected: &Cluster,
    actual: Option<Cluster>,
) -> SRTreeResult<()> {
    match actual {
        Some(actual) if &actual == expected => Ok(()),
        Some(actual) => Err(violation(format!(
            "mismatch in clusters of block 0x{:08X}: stored {}, computed {}",
            offset, expected, actual
        ))),
        None => Err(violation(format!(
            "block 0x{:08X} is empty but its parent stores {}",
            offset, expected
        ))),
    }
}

fn violation(msg: String) -> SRTreeError {
    log::warn!("SR-tree check failed: {}", msg);
    SRTreeError::Corruption(msg)
}
