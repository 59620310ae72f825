//! Depth-first branch-and-bound neighbor search.

use super::neighbor::{cut_with_ties, insert_sorted, ordered_children, Neighbor};
use crate::block::{Leaf, Node};
use crate::geometry::Point;
use crate::profile::Profile;
use crate::stack::StackBlock;
use crate::tree::SRTree;
use crate::types::{BlockOffset, Record, SRTreeResult};

impl SRTree {
    pub(crate) fn neighbors_depth_first(
        &self,
        query: &Point,
        max_count: usize,
    ) -> SRTreeResult<Vec<Record>> {
        let mut neighbors = Vec::new();
        self.choose_neighbors(self.root_offset(), query, max_count, &mut neighbors)?;
        Ok(neighbors
            .into_iter()
            .filter_map(Neighbor::into_record)
            .collect())
    }

    fn choose_neighbors(
        &self,
        offset: BlockOffset,
        query: &Point,
        max_count: usize,
        neighbors: &mut Vec<Neighbor>,
    ) -> SRTreeResult<()> {
        match self.read_tree_block(offset)? {
            StackBlock::Node(node) => {
                self.choose_neighbors_in_node(&node, query, max_count, neighbors)
            }
            StackBlock::Leaf(leaf) => {
                self.choose_neighbors_in_leaf(&leaf, query, max_count, neighbors);
                Ok(())
            }
        }
    }

    fn choose_neighbors_in_node(
        &self,
        node: &Node,
        query: &Point,
        max_count: usize,
        neighbors: &mut Vec<Neighbor>,
    ) -> SRTreeResult<()> {
        let profile = self.profile_counters();
        Profile::bump(&profile.visited_nodes);
        Profile::add(&profile.compared_node_entries, node.count() as u64);

        let children = ordered_children(
            node.entries().iter().map(|e| &e.cluster),
            |cluster| self.min_distance(query, cluster),
            |cluster| self.max_distance(query, cluster),
        );
        for child in children {
            let worth_visiting = match neighbors.last() {
                Some(farthest) if neighbors.len() >= max_count => {
                    child.min_distance <= farthest.distance
                }
                _ => true,
            };
            if worth_visiting {
                self.choose_neighbors(node.child_at(child.index), query, max_count, neighbors)?;
            }
        }
        Ok(())
    }

    fn choose_neighbors_in_leaf(
        &self,
        leaf: &Leaf,
        query: &Point,
        max_count: usize,
        neighbors: &mut Vec<Neighbor>,
    ) {
        let profile = self.profile_counters();
        Profile::bump(&profile.visited_leaves);
        Profile::add(&profile.compared_leaf_entries, leaf.count() as u64);

        for record in leaf.records() {
            let distance = query.distance(&record.point);
            if let Some(farthest) = neighbors.last() {
                if neighbors.len() >= max_count && distance > farthest.distance {
                    continue;
                }
            }
            insert_sorted(neighbors, Neighbor::point(record.clone(), distance));
        }

        let count = cut_with_ties(neighbors, max_count);
        neighbors.truncate(count);
    }
}
