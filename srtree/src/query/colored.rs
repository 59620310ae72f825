//! Colored neighbor search: nearest neighbors of a point set with at most
//! one result per color.
//!
//! The color of a stored point is its payload, compared with
//! [`DataItem::compare`] unless the caller supplies its own comparator.
//! The distance of a point to the query set is its distance to the nearest
//! query point.

use std::cmp::Ordering;

use super::breadth_first::{beyond_farthest, first_block_within, take_results, useful_prefix};
use super::neighbor::{check_max_count, cmp_f64, cut_with_ties, ordered_children, Candidate, Neighbor};
use crate::block::{Leaf, Node};
use crate::cluster::Cluster;
use crate::config::NeighborAlgorithm;
use crate::geometry::Point;
use crate::profile::Profile;
use crate::stack::StackBlock;
use crate::tree::SRTree;
use crate::types::{BlockOffset, DataItem, Record, SRTreeError, SRTreeResult};

/// Candidate list ordered by distance, with an index of the best point of
/// each color.
///
/// `by_color` holds the positions of the points in `by_distance`, ordered by
/// color. Every point has exactly one position there; positions are shifted
/// whenever `by_distance` gains or loses an entry.
pub(crate) struct ColoredCandidates<'f> {
    by_distance: Vec<Neighbor>,
    by_color: Vec<usize>,
    compare_colors: &'f dyn Fn(&DataItem, &DataItem) -> Ordering,
}

impl<'f> ColoredCandidates<'f> {
    pub fn new(compare_colors: &'f dyn Fn(&DataItem, &DataItem) -> Ordering) -> Self {
        Self {
            by_distance: Vec::new(),
            by_color: Vec::new(),
            compare_colors,
        }
    }

    pub fn len(&self) -> usize {
        self.by_distance.len()
    }

    pub fn entries(&self) -> &[Neighbor] {
        &self.by_distance
    }

    pub fn farthest(&self) -> Option<&Neighbor> {
        self.by_distance.last()
    }

    /// Distance, then color for two points; otherwise the plain neighbor order.
    fn distance_order(&self, a: &Neighbor, b: &Neighbor) -> Ordering {
        match (&a.candidate, &b.candidate) {
            (Candidate::Point(x), Candidate::Point(y)) => cmp_f64(a.distance, b.distance)
                .then_with(|| (self.compare_colors)(&x.data_item, &y.data_item)),
            _ => a.compare(b),
        }
    }

    fn search_distance(&self, key: &Neighbor) -> usize {
        self.by_distance
            .binary_search_by(|n| self.distance_order(n, key))
            .unwrap_or_else(|i| i)
    }

    fn search_color(&self, color: &DataItem) -> Result<usize, usize> {
        self.by_color
            .binary_search_by(|&pos| match self.by_distance[pos].record() {
                Some(record) => (self.compare_colors)(&record.data_item, color),
                None => Ordering::Less,
            })
    }

    fn insert_at(&mut self, index: usize, neighbor: Neighbor) {
        self.by_distance.insert(index, neighbor);
        for pos in self.by_color.iter_mut() {
            if *pos >= index {
                *pos += 1;
            }
        }
    }

    /// Removes an entry whose color position, if any, is already gone.
    fn remove_at(&mut self, index: usize) {
        self.by_distance.remove(index);
        for pos in self.by_color.iter_mut() {
            if *pos > index {
                *pos -= 1;
            }
        }
    }

    /// Offers a point. Returns true when it introduced a new color.
    ///
    /// A point of a known color replaces the current one only when it is
    /// strictly closer (or equally close and ordered first).
    pub fn offer_point(&mut self, neighbor: Neighbor) -> SRTreeResult<bool> {
        let color = match neighbor.record() {
            Some(record) => record.data_item.clone(),
            None => return Err(SRTreeError::corruption("offered a block as a point")),
        };
        let (color_index, new_color) = match self.search_color(&color) {
            Ok(color_index) => {
                let old_index = self.by_color[color_index];
                let old = self.by_distance.get(old_index).ok_or_else(inconsistent)?;
                if neighbor.distance > old.distance
                    || (neighbor.distance == old.distance
                        && neighbor.compare(old) != Ordering::Less)
                {
                    return Ok(false);
                }
                self.by_color.remove(color_index);
                self.remove_at(old_index);
                (color_index, false)
            }
            Err(color_index) => (color_index, true),
        };
        let index = self.search_distance(&neighbor);
        self.insert_at(index, neighbor);
        self.by_color.insert(color_index, index);
        Ok(new_color)
    }

    pub fn offer_block(&mut self, neighbor: Neighbor) {
        let index = self.search_distance(&neighbor);
        self.insert_at(index, neighbor);
    }

    /// Removes the entry at `index`, which must be a block.
    pub fn take_block(&mut self, index: usize) -> SRTreeResult<BlockOffset> {
        match self.by_distance.get(index).map(|n| &n.candidate) {
            Some(Candidate::Block(offset)) => {
                let offset = *offset;
                self.remove_at(index);
                Ok(offset)
            }
            _ => Err(SRTreeError::corruption("neighbor list lost a block entry")),
        }
    }

    /// Drops everything from `len` on, together with the dropped colors.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.by_distance.len() {
            return;
        }
        self.by_color.retain(|&pos| pos < len);
        self.by_distance.truncate(len);
    }

    pub fn into_entries(self) -> Vec<Neighbor> {
        self.by_distance
    }
}

fn inconsistent() -> SRTreeError {
    SRTreeError::corruption("colored candidate views are out of step")
}

/// Query point set with the distance measures of colored search.
struct QuerySet<'q> {
    tree: &'q SRTree,
    points: &'q [Point],
}

impl QuerySet<'_> {
    fn distance(&self, point: &Point) -> f64 {
        self.points
            .iter()
            .map(|q| q.distance(point))
            .fold(f64::INFINITY, f64::min)
    }

    fn min_distance(&self, cluster: &Cluster) -> f64 {
        self.points
            .iter()
            .map(|q| self.tree.min_distance(q, cluster))
            .fold(f64::INFINITY, f64::min)
    }

    fn max_distance(&self, cluster: &Cluster) -> f64 {
        self.points
            .iter()
            .map(|q| self.tree.max_distance(q, cluster))
            .fold(0.0, f64::max)
    }
}

impl SRTree {
    /// Nearest neighbors of a point set, at most one per payload.
    pub fn get_colored_neighbors(
        &self,
        queries: &[Point],
        max_count: usize,
    ) -> SRTreeResult<Vec<Record>> {
        self.get_colored_neighbors_by(queries, max_count, DataItem::compare)
    }

    /// Nearest neighbors of a point set, at most one per color, where two
    /// payloads share a color when `compare_colors` returns `Equal`.
    ///
    /// `compare_colors` must be a total order.
    pub fn get_colored_neighbors_by<F>(
        &self,
        queries: &[Point],
        max_count: usize,
        compare_colors: F,
    ) -> SRTreeResult<Vec<Record>>
    where
        F: Fn(&DataItem, &DataItem) -> Ordering,
    {
        self.check_open()?;
        if queries.is_empty() {
            return Err(SRTreeError::config("no query point is given"));
        }
        for query in queries {
            self.check_point(query)?;
        }
        check_max_count(max_count)?;

        let queries = QuerySet {
            tree: self,
            points: queries,
        };
        let mut candidates = ColoredCandidates::new(&compare_colors);
        match self.neighbor_algorithm() {
            NeighborAlgorithm::DepthFirst => {
                self.choose_colored(self.root_offset(), &queries, max_count, &mut candidates)?;
                Ok(candidates
                    .into_entries()
                    .into_iter()
                    .filter_map(Neighbor::into_record)
                    .collect())
            }
            NeighborAlgorithm::BreadthFirst => {
                self.colored_breadth_first(&queries, max_count, &mut candidates)?;
                Ok(take_results(candidates.into_entries(), max_count))
            }
        }
    }

    // ========================================================================
    // Depth-first
    // ========================================================================

    fn choose_colored(
        &self,
        offset: BlockOffset,
        queries: &QuerySet,
        max_count: usize,
        candidates: &mut ColoredCandidates,
    ) -> SRTreeResult<()> {
        match self.read_tree_block(offset)? {
            StackBlock::Node(node) => self.choose_colored_in_node(&node, queries, max_count, candidates),
            StackBlock::Leaf(leaf) => self.choose_colored_in_leaf(&leaf, queries, max_count, candidates),
        }
    }

    fn choose_colored_in_node(
        &self,
        node: &Node,
        queries: &QuerySet,
        max_count: usize,
        candidates: &mut ColoredCandidates,
    ) -> SRTreeResult<()> {
        let profile = self.profile_counters();
        Profile::bump(&profile.visited_nodes);
        Profile::add(&profile.compared_node_entries, node.count() as u64);

        let children = ordered_children(
            node.entries().iter().map(|e| &e.cluster),
            |cluster| queries.min_distance(cluster),
            |cluster| queries.max_distance(cluster),
        );
        for child in children {
            let worth_visiting = match candidates.farthest() {
                Some(farthest) if candidates.len() >= max_count => {
                    child.min_distance <= farthest.distance
                }
                _ => true,
            };
            if worth_visiting {
                self.choose_colored(node.child_at(child.index), queries, max_count, candidates)?;
            }
        }
        Ok(())
    }

    fn choose_colored_in_leaf(
        &self,
        leaf: &Leaf,
        queries: &QuerySet,
        max_count: usize,
        candidates: &mut ColoredCandidates,
    ) -> SRTreeResult<()> {
        let profile = self.profile_counters();
        Profile::bump(&profile.visited_leaves);
        Profile::add(&profile.compared_leaf_entries, leaf.count() as u64);

        for record in leaf.records() {
            let distance = queries.distance(&record.point);
            if let Some(farthest) = candidates.farthest() {
                if candidates.len() >= max_count && distance > farthest.distance {
                    continue;
                }
            }
            candidates.offer_point(Neighbor::point(record.clone(), distance))?;
        }

        let count = cut_with_ties(candidates.entries(), max_count);
        candidates.truncate(count);
        Ok(())
    }

    // ========================================================================
    // Breadth-first
    // ========================================================================

    fn colored_breadth_first(
        &self,
        queries: &QuerySet,
        max_count: usize,
        candidates: &mut ColoredCandidates,
    ) -> SRTreeResult<()> {
        let mut num_points = 0;
        self.expand_colored(candidates, &mut num_points, queries, max_count, self.root_offset())?;

        while let Some(index) = first_block_within(candidates.entries(), max_count) {
            let offset = candidates.take_block(index)?;
            self.expand_colored(candidates, &mut num_points, queries, max_count, offset)?;

            let (kept, points) = useful_prefix(candidates.entries(), max_count);
            candidates.truncate(kept);
            num_points = points;
        }
        Ok(())
    }

    fn expand_colored(
        &self,
        candidates: &mut ColoredCandidates,
        num_points: &mut usize,
        queries: &QuerySet,
        max_count: usize,
        offset: BlockOffset,
    ) -> SRTreeResult<()> {
        let profile = self.profile_counters();
        match self.read_tree_block(offset)? {
            StackBlock::Leaf(leaf) => {
                for record in leaf.records() {
                    let distance = queries.distance(&record.point);
                    if beyond_farthest(candidates.entries(), *num_points, max_count, distance) {
                        continue;
                    }
                    if candidates.offer_point(Neighbor::point(record.clone(), distance))? {
                        *num_points += 1;
                    }
                }
                Profile::bump(&profile.visited_leaves);
                Profile::add(&profile.compared_leaf_entries, leaf.count() as u64);
            }
            StackBlock::Node(node) => {
                for entry in node.entries() {
                    let distance = queries.min_distance(&entry.cluster);
                    if beyond_farthest(candidates.entries(), *num_points, max_count, distance) {
                        continue;
                    }
                    candidates.offer_block(Neighbor::block(entry.child, distance));
                }
                Profile::bump(&profile.visited_nodes);
                Profile::add(&profile.compared_node_entries, node.count() as u64);
            }
        }
        Ok(())
    }
}
