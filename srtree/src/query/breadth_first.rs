//! Best-first neighbor search over one list mixing points and unexpanded
//! blocks.

use super::neighbor::{insert_sorted, Candidate, Neighbor};
use crate::geometry::Point;
use crate::profile::Profile;
use crate::stack::StackBlock;
use crate::tree::SRTree;
use crate::types::{BlockOffset, Record, SRTreeError, SRTreeResult};

impl SRTree {
    pub(crate) fn neighbors_breadth_first(
        &self,
        query: &Point,
        max_count: usize,
    ) -> SRTreeResult<Vec<Record>> {
        let mut neighbors = Vec::new();
        let mut num_points = 0;
        self.expand_neighbors(&mut neighbors, &mut num_points, query, max_count, self.root_offset())?;

        // expand the nearest block until the first `max_count` entries are points
        while let Some(index) = first_block_within(&neighbors, max_count) {
            let offset = match neighbors.remove(index).candidate {
                Candidate::Block(offset) => offset,
                Candidate::Point(_) => {
                    return Err(SRTreeError::corruption("neighbor list lost a block entry"))
                }
            };
            self.expand_neighbors(&mut neighbors, &mut num_points, query, max_count, offset)?;

            let (kept, points) = useful_prefix(&neighbors, max_count);
            neighbors.truncate(kept);
            num_points = points;
        }

        Ok(take_results(neighbors, max_count))
    }

    /// Adds the entries of a block to the list, skipping those that cannot
    /// beat the current farthest candidate.
    fn expand_neighbors(
        &self,
        neighbors: &mut Vec<Neighbor>,
        num_points: &mut usize,
        query: &Point,
        max_count: usize,
        offset: BlockOffset,
    ) -> SRTreeResult<()> {
        let profile = self.profile_counters();
        match self.read_tree_block(offset)? {
            StackBlock::Leaf(leaf) => {
                for record in leaf.records() {
                    let distance = record.point.distance(query);
                    if beyond_farthest(neighbors, *num_points, max_count, distance) {
                        continue;
                    }
                    insert_sorted(neighbors, Neighbor::point(record.clone(), distance));
                    *num_points += 1;
                }
                Profile::bump(&profile.visited_leaves);
                Profile::add(&profile.compared_leaf_entries, leaf.count() as u64);
            }
            StackBlock::Node(node) => {
                for entry in node.entries() {
                    let distance = self.min_distance(query, &entry.cluster);
                    if beyond_farthest(neighbors, *num_points, max_count, distance) {
                        continue;
                    }
                    insert_sorted(neighbors, Neighbor::block(entry.child, distance));
                }
                Profile::bump(&profile.visited_nodes);
                Profile::add(&profile.compared_node_entries, node.count() as u64);
            }
        }
        Ok(())
    }
}

pub(super) fn beyond_farthest(
    neighbors: &[Neighbor],
    num_points: usize,
    max_count: usize,
    distance: f64,
) -> bool {
    match neighbors.last() {
        Some(farthest) => num_points >= max_count && distance > farthest.distance,
        None => false,
    }
}

/// Index of the first block among the first `max_count` entries.
pub(super) fn first_block_within(neighbors: &[Neighbor], max_count: usize) -> Option<usize> {
    neighbors
        .iter()
        .take(max_count)
        .position(|n| !n.is_point())
}

/// Length of the prefix worth keeping and the number of points in it.
///
/// Entries after the `max_count`-th point are dropped unless they tie with
/// their predecessor.
pub(super) fn useful_prefix(neighbors: &[Neighbor], max_count: usize) -> (usize, usize) {
    let mut points = 0;
    let mut index = 0;
    while index < neighbors.len() {
        if points >= max_count && neighbors[index - 1].distance != neighbors[index].distance {
            break;
        }
        if neighbors[index].is_point() {
            points += 1;
        }
        index += 1;
    }
    (index, points)
}

/// The first `max_count` entries and the points tying with the last of them.
pub(super) fn take_results(neighbors: Vec<Neighbor>, max_count: usize) -> Vec<Record> {
    let mut results = Vec::new();
    let mut last_distance = None;
    for (i, neighbor) in neighbors.into_iter().enumerate() {
        if i >= max_count && (!neighbor.is_point() || Some(neighbor.distance) != last_distance) {
            break;
        }
        last_distance = Some(neighbor.distance);
        if let Some(record) = neighbor.into_record() {
            results.push(record);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataItem;

    fn point_at(distance: f64) -> Neighbor {
        Neighbor::point(
            Record::new(Point::new(vec![distance]), DataItem::from("p")),
            distance,
        )
    }

    #[test]
    fn test_first_block_within() {
        let list = vec![point_at(0.0), point_at(1.0), Neighbor::block(512, 2.0)];
        assert_eq!(first_block_within(&list, 2), None);
        assert_eq!(first_block_within(&list, 3), Some(2));
    }

    #[test]
    fn test_useful_prefix_counts_points_only() {
        let list = vec![
            Neighbor::block(512, 0.0),
            point_at(1.0),
            point_at(2.0),
            point_at(2.0),
            Neighbor::block(1024, 3.0),
        ];
        assert_eq!(useful_prefix(&list, 1), (2, 1));
        assert_eq!(useful_prefix(&list, 2), (4, 3));
        assert_eq!(useful_prefix(&list, 5), (5, 3));
    }

    #[test]
    fn test_take_results_keeps_ties() {
        let list = vec![point_at(0.0), point_at(1.0), point_at(1.0), point_at(2.0)];
        assert_eq!(take_results(list.clone(), 2).len(), 3);
        assert_eq!(take_results(list.clone(), 1).len(), 1);
        assert_eq!(take_results(list, 4).len(), 4);
    }
}
