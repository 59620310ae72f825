//! Deletion.
//!
//! The record is located by a depth-first scan guided by the bounding
//! rectangles. After removal, blocks that fall below the minimum fill are
//! released and their entries queued for reinsertion; a root left with a
//! single child is replaced by that child.

use super::insert::{Pending, Reinsertion};
use super::SRTree;
use crate::block::Leaf;
use crate::cluster::Cluster;
use crate::geometry::Point;
use crate::stack::{AccessStack, StackBlock, StackFrame};
use crate::types::{DataItem, SRTreeError, SRTreeResult};

impl SRTree {
    /// Removes one occurrence of the given point/payload pair.
    ///
    /// Returns [`SRTreeError::NotFound`] when the pair is not stored.
    pub fn remove(&mut self, point: &Point, data_item: &DataItem) -> SRTreeResult<()> {
        self.check_writable()?;
        self.check_record(point, data_item)?;
        self.cursor = None;

        let mut stack = self
            .search_point(point, data_item)?
            .ok_or(SRTreeError::NotFound)?;

        let (mut leaf, cursor) = match stack.pop() {
            Some(StackFrame {
                block: StackBlock::Leaf(leaf),
                cursor,
            }) => (leaf, cursor),
            _ => return Err(SRTreeError::corruption("search did not end on a leaf")),
        };
        leaf.remove_at(cursor);

        if stack.is_empty() {
            return self.write_leaf(&leaf);
        }

        let mut state = Reinsertion::new();
        let leaf_min = self.info.leaf_max_count() * self.info.split_factor / 100;
        let node_min = self.info.node_max_count() * self.info.split_factor / 100;

        let mut underflow = leaf.count() < leaf_min || leaf.is_empty();
        let mut cluster: Option<Cluster> = None;
        if underflow {
            log::debug!(
                "Underflow in leaf 0x{:08X} ({} entries left)",
                leaf.offset(),
                leaf.count()
            );
            let offset = leaf.offset();
            for record in leaf.into_records() {
                state.queue.push_back(Pending::Point(record));
            }
            self.release(offset)?;
        } else {
            self.write_leaf(&leaf)?;
            cluster = leaf.cluster(&self.info);
        }

        // intermediate nodes
        while stack.depth() > 1 {
            let level = self.info.height - stack.depth();
            let (mut node, cursor) = pop_node(&mut stack)?;

            if underflow {
                node.remove_at(cursor);
                underflow = node.count() < node_min || node.count() == 0;
                if underflow {
                    log::debug!(
                        "Underflow in node 0x{:08X} (level {}, {} entries left)",
                        node.offset(),
                        level,
                        node.count()
                    );
                    let offset = node.offset();
                    for entry in node.into_entries() {
                        state.queue.push_back(Pending::Block {
                            offset: entry.child,
                            level,
                        });
                    }
                    self.release(offset)?;
                } else {
                    self.write_node(&node)?;
                    cluster = node.cluster(&self.info);
                }
            } else {
                node.set_cluster_at(cursor, take_cluster(&mut cluster)?);
                self.write_node(&node)?;
                cluster = node.cluster(&self.info);
            }
        }

        // root
        let (mut root, cursor) = pop_node(&mut stack)?;
        if underflow {
            root.remove_at(cursor);
            match root.count() {
                0 => {
                    self.release(root.offset())?;
                    let offset = self.allocate()?;
                    self.write_leaf(&Leaf::new(offset))?;
                    self.info.root_offset = offset;
                    self.info.height = 1;
                    self.write_super_block()?;
                    log::debug!("Tree emptied: new root leaf 0x{:08X}", offset);
                }
                1 => {
                    self.release(root.offset())?;
                    self.info.root_offset = root.child_at(0);
                    self.info.height -= 1;
                    self.write_super_block()?;
                    log::debug!(
                        "Shrunk tree: new root 0x{:08X}, height {}",
                        self.info.root_offset,
                        self.info.height
                    );
                }
                _ => self.write_node(&root)?,
            }
        } else {
            root.set_cluster_at(cursor, take_cluster(&mut cluster)?);
            self.write_node(&root)?;
        }

        self.drain(&mut state)
    }

    /// Access path to the leaf entry equal to the pair, cursor on the entry.
    fn search_point(
        &self,
        point: &Point,
        data_item: &DataItem,
    ) -> SRTreeResult<Option<AccessStack>> {
        let mut stack = AccessStack::new();
        push_block(&mut stack, self.read_tree_block(self.info.root_offset)?);

        loop {
            let next = {
                let frame = stack
                    .top_mut()
                    .ok_or_else(|| SRTreeError::corruption("access stack is empty"))?;
                match &frame.block {
                    StackBlock::Node(node) => {
                        let mut next = None;
                        if node.count() > 0 {
                            loop {
                                if node.cluster_at(frame.cursor).rect().includes(point) {
                                    next = Some(node.child_at(frame.cursor));
                                    break;
                                }
                                if frame.cursor + 1 >= node.count() {
                                    break;
                                }
                                frame.cursor += 1;
                            }
                        }
                        next
                    }
                    StackBlock::Leaf(leaf) => {
                        let mut i = frame.cursor;
                        while i < leaf.count() {
                            let record = leaf.record_at(i);
                            if &record.point == point && &record.data_item == data_item {
                                frame.cursor = i;
                                return Ok(Some(stack));
                            }
                            i += 1;
                        }
                        None
                    }
                }
            };

            match next {
                Some(child) => push_block(&mut stack, self.read_tree_block(child)?),
                None => {
                    loop {
                        stack.pop();
                        if stack.is_empty() {
                            return Ok(None);
                        }
                        if stack.has_more() {
                            break;
                        }
                    }
                    stack.advance();
                }
            }
        }
    }
}

fn push_block(stack: &mut AccessStack, block: StackBlock) {
    match block {
        StackBlock::Node(node) => stack.push_node(node),
        StackBlock::Leaf(leaf) => stack.push_leaf(leaf),
    }
}

fn pop_node(stack: &mut AccessStack) -> SRTreeResult<(crate::block::Node, usize)> {
    match stack.pop() {
        Some(StackFrame {
            block: StackBlock::Node(node),
            cursor,
        }) => Ok((node, cursor)),
        Some(frame) => Err(SRTreeError::corruption(format!(
            "expected a node at 0x{:08X}",
            frame.block.offset()
        ))),
        None => Err(SRTreeError::corruption("access stack is empty")),
    }
}

fn take_cluster(cluster: &mut Option<Cluster>) -> SRTreeResult<Cluster> {
    cluster
        .take()
        .ok_or_else(|| SRTreeError::corruption("child cluster of a remaining block is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;

    fn p(x: f64, y: f64) -> Point {
        Point::new(vec![x, y])
    }

    fn filled_tree(n: usize) -> SRTree {
        let mut tree =
            SRTree::create_in_memory(2, 40, &IndexConfig::default().with_block_size(256)).unwrap();
        for i in 0..n {
            tree.store(p((i % 10) as f64, (i / 10) as f64), DataItem::from(format!("{}", i).as_str()))
                .unwrap();
        }
        tree
    }

    fn total_weight(tree: &SRTree) -> i32 {
        match tree.read_tree_block(tree.root_offset()).unwrap() {
            StackBlock::Node(node) => node.entries().iter().map(|e| e.cluster.weight()).sum(),
            StackBlock::Leaf(leaf) => leaf.count() as i32,
        }
    }

    #[test]
    fn test_remove_from_root_leaf() {
        let mut tree = filled_tree(3);
        tree.remove(&p(1.0, 0.0), &DataItem::from("1")).unwrap();
        assert_eq!(total_weight(&tree), 2);
        assert!(matches!(
            tree.remove(&p(1.0, 0.0), &DataItem::from("1")),
            Err(SRTreeError::NotFound)
        ));
    }

    #[test]
    fn test_payload_must_match() {
        let mut tree = filled_tree(20);
        assert!(matches!(
            tree.remove(&p(1.0, 0.0), &DataItem::from("2")),
            Err(SRTreeError::NotFound)
        ));
        tree.remove(&p(2.0, 0.0), &DataItem::from("2")).unwrap();
        assert_eq!(total_weight(&tree), 19);
    }

    #[test]
    fn test_remove_everything_shrinks_tree() {
        let mut tree = filled_tree(60);
        assert!(tree.height() > 2);
        for i in 0..60 {
            tree.remove(
                &p((i % 10) as f64, (i / 10) as f64),
                &DataItem::from(format!("{}", i).as_str()),
            )
            .unwrap();
            assert_eq!(total_weight(&tree), 60 - i as i32 - 1);
        }
        assert_eq!(tree.height(), 1);
        assert!(tree.info().free_offset != crate::constants::NULL_OFFSET);
    }
}
