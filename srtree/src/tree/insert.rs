//! Dynamic insertion.
//!
//! `store` runs a queue of pending entries seeded with the new record. A
//! full block either splits or, once per block and call, evicts its
//! outermost entries to the back of the queue (forced reinsertion). Split
//! halves and recomputed clusters travel up the access stack to the root.

use std::collections::{HashSet, VecDeque};

use super::split::{reinsert_placements, split_sides, Mass, Placement, Side};
use super::SRTree;
use crate::block::{Leaf, Node, NodeEntry};
use crate::cluster::Cluster;
use crate::geometry::Point;
use crate::profile::Profile;
use crate::stack::{AccessStack, StackBlock};
use crate::types::{BlockOffset, DataItem, Record, SRTreeError, SRTreeResult};

/// An entry waiting to be (re)inserted.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Point(Record),
    /// A subtree to hang below a node on `level` (leaves are level 0).
    Block { offset: BlockOffset, level: usize },
}

/// Queue and reinsertion guard of one `store` or `remove` call.
#[derive(Debug, Default)]
pub(crate) struct Reinsertion {
    pub queue: VecDeque<Pending>,
    /// Blocks that already evicted entries during this call. A second
    /// overflow of the same block splits instead.
    pub processed: HashSet<BlockOffset>,
}

impl Reinsertion {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What to do with a full block receiving one more entry.
enum Overflow {
    Split,
    Reinsert,
}

impl SRTree {
    /// Inserts a point with its payload. Duplicates are allowed.
    pub fn store(&mut self, point: Point, data_item: DataItem) -> SRTreeResult<()> {
        self.check_writable()?;
        self.check_record(&point, &data_item)?;
        self.cursor = None;

        let mut state = Reinsertion::new();
        state
            .queue
            .push_back(Pending::Point(Record::new(point, data_item)));
        self.drain(&mut state)
    }

    pub(crate) fn drain(&mut self, state: &mut Reinsertion) -> SRTreeResult<()> {
        while let Some(entry) = state.queue.pop_front() {
            match entry {
                Pending::Point(record) => self.insert_point(record, state)?,
                Pending::Block { offset, level } => self.insert_block(offset, level, state)?,
            }
        }
        Ok(())
    }

    fn overflow_action(
        &self,
        offset: BlockOffset,
        count: usize,
        depth: usize,
        state: &mut Reinsertion,
    ) -> Overflow {
        let reinsert_count = (count + 1) * self.info.reinsert_factor / 100;
        if depth == 1 || reinsert_count == 0 {
            Overflow::Split
        } else if state.processed.insert(offset) {
            Overflow::Reinsert
        } else {
            state.processed.remove(&offset);
            Overflow::Split
        }
    }

    fn insert_point(&mut self, record: Record, state: &mut Reinsertion) -> SRTreeResult<()> {
        let mut stack = self.choose_leaf(&record.point)?;
        let leaf_max = self.info.leaf_max_count();
        let depth = stack.depth();

        let (leaf, _) = stack.top_leaf_mut()?;
        if leaf.count() < leaf_max {
            leaf.push(record);
            self.write_leaf(leaf)?;
            return self.update_cluster(stack);
        }

        let (offset, count) = (leaf.offset(), leaf.count());
        match self.overflow_action(offset, count, depth, state) {
            Overflow::Split => self.split_leaf(stack, record, state),
            Overflow::Reinsert => self.reinsert_leaf(stack, record, state),
        }
    }

    fn insert_block(
        &mut self,
        offset: BlockOffset,
        level: usize,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        if level == 0 || level >= self.info.height {
            // The tree shrank below the level of this subtree.
            return self.dissolve_block(offset, state);
        }
        let cluster = self
            .read_tree_block(offset)?
            .cluster(&self.info)
            .ok_or_else(|| {
                SRTreeError::corruption(format!("queued block 0x{:08X} is empty", offset))
            })?;

        let mut stack = self.choose_node(cluster.centroid(), self.info.height - level)?;
        let node_max = self.info.node_max_count();
        let depth = stack.depth();

        let (parent, _) = stack.top_node_mut()?;
        if parent.count() < node_max {
            parent.push(cluster, offset);
            self.write_node(parent)?;
            return self.update_cluster(stack);
        }

        let (parent_offset, count) = (parent.offset(), parent.count());
        let entry = NodeEntry {
            cluster,
            child: offset,
        };
        match self.overflow_action(parent_offset, count, depth, state) {
            Overflow::Split => self.split_node(stack, entry, state),
            Overflow::Reinsert => self.reinsert_node(stack, entry, state),
        }
    }

    /// Queues every point below `offset` and frees its blocks.
    fn dissolve_block(&mut self, offset: BlockOffset, state: &mut Reinsertion) -> SRTreeResult<()> {
        match self.read_tree_block(offset)? {
            StackBlock::Leaf(leaf) => {
                for record in leaf.into_records() {
                    state.queue.push_back(Pending::Point(record));
                }
            }
            StackBlock::Node(node) => {
                for entry in node.into_entries() {
                    self.dissolve_block(entry.child, state)?;
                }
            }
        }
        log::debug!("Dissolved subtree 0x{:08X} into points", offset);
        self.release(offset)
    }

    // ========================================================================
    // Descent
    // ========================================================================

    /// Path from the root to the leaf whose clusters are nearest to `point`.
    fn choose_leaf(&self, point: &Point) -> SRTreeResult<AccessStack> {
        let mut stack = AccessStack::new();
        let mut offset = self.info.root_offset;
        loop {
            match self.read_tree_block(offset)? {
                StackBlock::Node(node) => {
                    let index = choose_subtree(&node, point)?;
                    offset = node.child_at(index);
                    stack.push_node(node);
                    stack.set_cursor(index);
                }
                StackBlock::Leaf(leaf) => {
                    stack.push_leaf(leaf);
                    return Ok(stack);
                }
            }
        }
    }

    /// Path from the root down to the node at `depth` nearest to `centroid`.
    fn choose_node(&self, centroid: &Point, depth: usize) -> SRTreeResult<AccessStack> {
        let mut stack = AccessStack::new();
        let mut offset = self.info.root_offset;
        while stack.depth() < depth {
            let node = self.read_node(offset)?;
            let index = choose_subtree(&node, centroid)?;
            offset = node.child_at(index);
            stack.push_node(node);
            stack.set_cursor(index);
        }
        Ok(stack)
    }

    // ========================================================================
    // Propagation
    // ========================================================================

    /// Recomputes the cluster of the top block and stores it in every
    /// ancestor entry on the way to the root.
    pub(crate) fn update_cluster(&self, mut stack: AccessStack) -> SRTreeResult<()> {
        let top = stack
            .pop()
            .ok_or_else(|| SRTreeError::corruption("access stack is empty"))?;
        let mut cluster = block_cluster(&self.info, &top.block)?;

        while let Some(frame) = stack.pop() {
            match frame.block {
                StackBlock::Node(mut node) => {
                    node.set_cluster_at(frame.cursor, cluster);
                    self.write_node(&node)?;
                    cluster = block_cluster(&self.info, &StackBlock::Node(node))?;
                }
                StackBlock::Leaf(leaf) => {
                    return Err(SRTreeError::corruption(format!(
                        "leaf 0x{:08X} found above another block",
                        leaf.offset()
                    )))
                }
            }
        }
        Ok(())
    }

    /// Replaces the entry under the cursor of the top node by `left` and adds
    /// `right` next to it. An empty stack means the root itself was split.
    fn update_node(
        &mut self,
        mut stack: AccessStack,
        left: NodeEntry,
        right: NodeEntry,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        if stack.is_empty() {
            return self.extend_tree(left, right);
        }
        let node_max = self.info.node_max_count();
        let depth = stack.depth();

        let (node, cursor) = stack.top_node_mut()?;
        node.set_entry(cursor, left.cluster, left.child);
        if node.count() < node_max {
            node.push(right.cluster, right.child);
            self.write_node(node)?;
            return self.update_cluster(stack);
        }

        let (offset, count) = (node.offset(), node.count());
        match self.overflow_action(offset, count, depth, state) {
            Overflow::Split => self.split_node(stack, right, state),
            Overflow::Reinsert => self.reinsert_node(stack, right, state),
        }
    }

    /// Puts a new root above the two halves of the old one.
    fn extend_tree(&mut self, left: NodeEntry, right: NodeEntry) -> SRTreeResult<()> {
        let offset = self.allocate()?;
        let mut root = Node::new(offset);
        root.push(left.cluster, left.child);
        root.push(right.cluster, right.child);
        self.write_node(&root)?;

        self.info.root_offset = offset;
        self.info.height += 1;
        self.write_super_block()?;
        log::debug!(
            "Extended tree: new root 0x{:08X}, height {}",
            offset,
            self.info.height
        );
        Ok(())
    }

    // ========================================================================
    // Split
    // ========================================================================

    fn split_leaf(
        &mut self,
        mut stack: AccessStack,
        record: Record,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        let (leaf, _) = stack.top_leaf_mut()?;
        let offset = leaf.offset();
        let mut records = std::mem::replace(leaf, Leaf::new(offset)).into_records();
        stack.pop();
        records.push(record);

        let sides = {
            let masses: Vec<Mass> = records.iter().map(|r| Mass::of_point(&r.point)).collect();
            split_sides(&masses, self.info.split_factor)
        };

        let mut left = Leaf::new(offset);
        let mut right = Leaf::new(self.allocate()?);
        for (record, side) in records.into_iter().zip(sides) {
            match side {
                Side::Left => left.push(record),
                Side::Right => right.push(record),
            }
        }
        self.write_leaf(&left)?;
        self.write_leaf(&right)?;
        Profile::bump(&self.profile.leaf_splits);
        log::debug!(
            "Split leaf 0x{:08X} into {} + {} entries (new leaf 0x{:08X})",
            offset,
            left.count(),
            right.count(),
            right.offset()
        );

        let left_entry = leaf_entry(&self.info, &left)?;
        let right_entry = leaf_entry(&self.info, &right)?;
        self.update_node(stack, left_entry, right_entry, state)
    }

    fn split_node(
        &mut self,
        mut stack: AccessStack,
        entry: NodeEntry,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        let (node, _) = stack.top_node_mut()?;
        let offset = node.offset();
        let mut entries = std::mem::replace(node, Node::new(offset)).into_entries();
        stack.pop();
        entries.push(entry);

        let sides = {
            let masses: Vec<Mass> = entries.iter().map(|e| Mass::of_cluster(&e.cluster)).collect();
            split_sides(&masses, self.info.split_factor)
        };

        let mut left = Node::new(offset);
        let mut right = Node::new(self.allocate()?);
        for (entry, side) in entries.into_iter().zip(sides) {
            match side {
                Side::Left => left.push(entry.cluster, entry.child),
                Side::Right => right.push(entry.cluster, entry.child),
            }
        }
        self.write_node(&left)?;
        self.write_node(&right)?;
        Profile::bump(&self.profile.node_splits);
        log::debug!(
            "Split node 0x{:08X} into {} + {} entries (new node 0x{:08X})",
            offset,
            left.count(),
            right.count(),
            right.offset()
        );

        let left_entry = node_entry(&self.info, &left)?;
        let right_entry = node_entry(&self.info, &right)?;
        self.update_node(stack, left_entry, right_entry, state)
    }

    // ========================================================================
    // Forced reinsertion
    // ========================================================================

    fn reinsert_leaf(
        &mut self,
        mut stack: AccessStack,
        record: Record,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        let (leaf, _) = stack.top_leaf_mut()?;
        let offset = leaf.offset();
        let mut records = std::mem::replace(leaf, Leaf::new(offset)).into_records();
        stack.pop();
        records.push(record);

        let placements = {
            let masses: Vec<Mass> = records.iter().map(|r| Mass::of_point(&r.point)).collect();
            reinsert_placements(&masses, self.info.reinsert_factor)
        };

        let mut kept = Leaf::new(offset);
        for (record, placement) in records.into_iter().zip(placements) {
            match placement {
                Placement::Stay => kept.push(record),
                Placement::Reinsert => state.queue.push_back(Pending::Point(record)),
            }
        }
        self.write_leaf(&kept)?;
        log::debug!(
            "Reinserting from leaf 0x{:08X}, {} entries stay",
            offset,
            kept.count()
        );

        stack.push_leaf(kept);
        self.update_cluster(stack)
    }

    fn reinsert_node(
        &mut self,
        mut stack: AccessStack,
        entry: NodeEntry,
        state: &mut Reinsertion,
    ) -> SRTreeResult<()> {
        let level = self.info.height - stack.depth();
        let (node, _) = stack.top_node_mut()?;
        let offset = node.offset();
        let mut entries = std::mem::replace(node, Node::new(offset)).into_entries();
        stack.pop();
        entries.push(entry);

        let placements = {
            let masses: Vec<Mass> = entries.iter().map(|e| Mass::of_cluster(&e.cluster)).collect();
            reinsert_placements(&masses, self.info.reinsert_factor)
        };

        let mut kept = Node::new(offset);
        for (entry, placement) in entries.into_iter().zip(placements) {
            match placement {
                Placement::Stay => kept.push(entry.cluster, entry.child),
                Placement::Reinsert => state.queue.push_back(Pending::Block {
                    offset: entry.child,
                    level,
                }),
            }
        }
        self.write_node(&kept)?;
        log::debug!(
            "Reinserting from node 0x{:08X} (level {}), {} entries stay",
            offset,
            level,
            kept.count()
        );

        stack.push_node(kept);
        self.update_cluster(stack)
    }
}

/// Index of the child whose centroid is nearest to `point`; the first wins ties.
pub(crate) fn choose_subtree(node: &Node, point: &Point) -> SRTreeResult<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, entry) in node.entries().iter().enumerate() {
        let d = entry.cluster.centroid().distance(point);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i).ok_or_else(|| {
        SRTreeError::corruption(format!("node 0x{:08X} has no entries", node.offset()))
    })
}

fn block_cluster(info: &crate::info::TreeInfo, block: &StackBlock) -> SRTreeResult<Cluster> {
    block.cluster(info).ok_or_else(|| {
        SRTreeError::corruption(format!("block 0x{:08X} has no entries", block.offset()))
    })
}

fn leaf_entry(info: &crate::info::TreeInfo, leaf: &Leaf) -> SRTreeResult<NodeEntry> {
    let cluster = leaf.cluster(info).ok_or_else(|| {
        SRTreeError::corruption(format!("split left leaf 0x{:08X} empty", leaf.offset()))
    })?;
    Ok(NodeEntry {
        cluster,
        child: leaf.offset(),
    })
}

fn node_entry(info: &crate::info::TreeInfo, node: &Node) -> SRTreeResult<NodeEntry> {
    let cluster = node.cluster(info).ok_or_else(|| {
        SRTreeError::corruption(format!("split left node 0x{:08X} empty", node.offset()))
    })?;
    Ok(NodeEntry {
        cluster,
        child: node.offset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;

    fn small_tree() -> SRTree {
        SRTree::create_in_memory(2, 40, &IndexConfig::default().with_block_size(256)).unwrap()
    }

    fn p(x: f64, y: f64) -> Point {
        Point::new(vec![x, y])
    }

    #[test]
    fn test_fifth_point_splits_root_leaf() {
        let mut tree = small_tree();
        let coords = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        for (i, &(x, y)) in coords.iter().enumerate() {
            tree.store(p(x, y), DataItem::new(vec![i as u8])).unwrap();
        }
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.profile().leaf_splits, 0);

        tree.store(p(5.0, 5.0), DataItem::new(vec![4u8])).unwrap();
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.profile().leaf_splits, 1);

        let root = tree.read_node(tree.root_offset()).unwrap();
        assert_eq!(root.count(), 2);
        let weights: i32 = root.entries().iter().map(|e| e.cluster.weight()).sum();
        assert_eq!(weights, 5);
    }

    #[test]
    fn test_store_rejects_bad_records() {
        let mut tree = small_tree();
        assert!(matches!(
            tree.store(Point::new(vec![1.0]), DataItem::from("x")),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            tree.store(p(0.0, 0.0), DataItem::new(vec![0u8; 41])),
            Err(SRTreeError::Config(_))
        ));
    }

    #[test]
    fn test_many_inserts_grow_tree() {
        let mut tree = small_tree();
        for i in 0..200 {
            let x = (i * 37 % 101) as f64;
            let y = (i * 59 % 103) as f64;
            tree.store(p(x, y), DataItem::from(format!("{}", i).as_str()))
                .unwrap();
        }
        assert!(tree.height() >= 4);
        let root = tree.read_node(tree.root_offset()).unwrap();
        let weights: i32 = root.entries().iter().map(|e| e.cluster.weight()).sum();
        assert_eq!(weights, 200);
        assert!(tree.profile().node_splits > 0);
    }

    #[test]
    fn test_choose_subtree_first_minimum() {
        let info = crate::info::TreeInfo::new(2, 40, &IndexConfig::default().with_block_size(256));
        let mut node = Node::new(256);
        for (x, child) in [(0.0, 512), (2.0, 768), (2.0, 1024)] {
            let cluster = Cluster::from_points(&[p(x, 0.0)], info.non_leaf_float_type).unwrap();
            node.push(cluster, child);
        }
        assert_eq!(choose_subtree(&node, &p(1.9, 0.0)).unwrap(), 1);
        assert_eq!(choose_subtree(&node, &p(1.0, 0.0)).unwrap(), 0);
        assert!(choose_subtree(&Node::new(256), &p(0.0, 0.0)).is_err());
    }
}
