//! Candidates and distance bounds shared by the neighbor searches.

use std::cmp::Ordering;

use crate::cluster::{BoundChoice, Cluster};
use crate::config::NeighborAlgorithm;
use crate::geometry::Point;
use crate::profile::Profile;
use crate::tree::SRTree;
use crate::types::{BlockOffset, Record, SRTreeError, SRTreeResult};

/// What a neighbor candidate stands for.
#[derive(Debug, Clone)]
pub(crate) enum Candidate {
    Point(Record),
    /// A subtree not expanded yet.
    Block(BlockOffset),
}

#[derive(Debug, Clone)]
pub(crate) struct Neighbor {
    pub distance: f64,
    pub candidate: Candidate,
}

impl Neighbor {
    pub fn point(record: Record, distance: f64) -> Self {
        Self {
            distance,
            candidate: Candidate::Point(record),
        }
    }

    pub fn block(offset: BlockOffset, distance: f64) -> Self {
        Self {
            distance,
            candidate: Candidate::Block(offset),
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self.candidate, Candidate::Point(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.candidate {
            Candidate::Point(record) => Some(record),
            Candidate::Block(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self.candidate {
            Candidate::Point(record) => Some(record),
            Candidate::Block(_) => None,
        }
    }

    /// Distance first; at equal distance blocks come before points, blocks
    /// are ordered by offset and points by payload.
    pub fn compare(&self, other: &Neighbor) -> Ordering {
        match cmp_f64(self.distance, other.distance) {
            Ordering::Equal => {}
            order => return order,
        }
        match (&self.candidate, &other.candidate) {
            (Candidate::Block(a), Candidate::Block(b)) => a.cmp(b),
            (Candidate::Block(_), Candidate::Point(_)) => Ordering::Less,
            (Candidate::Point(_), Candidate::Block(_)) => Ordering::Greater,
            (Candidate::Point(a), Candidate::Point(b)) => a.data_item.compare(&b.data_item),
        }
    }
}

pub(crate) fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Inserts `neighbor` after every element that does not order after it.
pub(crate) fn insert_sorted(neighbors: &mut Vec<Neighbor>, neighbor: Neighbor) {
    let index = neighbors.partition_point(|n| n.compare(&neighbor) != Ordering::Greater);
    neighbors.insert(index, neighbor);
}

/// Length of the prefix holding the first `max_count` elements plus every
/// following element at the same distance as its predecessor.
pub(crate) fn cut_with_ties(neighbors: &[Neighbor], max_count: usize) -> usize {
    let mut count = 0;
    while count < neighbors.len() {
        if count >= max_count && neighbors[count - 1].distance != neighbors[count].distance {
            break;
        }
        count += 1;
    }
    count
}

/// Child of a node ordered for a depth-first descent.
pub(crate) struct ChildDistance {
    pub index: usize,
    pub min_distance: f64,
    pub max_distance: f64,
}

/// Children of a node with their distance bounds, in visiting order.
pub(crate) fn ordered_children<'c>(
    clusters: impl Iterator<Item = &'c Cluster>,
    min_distance: impl Fn(&Cluster) -> f64,
    max_distance: impl Fn(&Cluster) -> f64,
) -> Vec<ChildDistance> {
    let mut children: Vec<ChildDistance> = clusters
        .enumerate()
        .map(|(index, cluster)| ChildDistance {
            index,
            min_distance: min_distance(cluster),
            max_distance: max_distance(cluster),
        })
        .collect();
    sort_children(&mut children);
    children
}

/// Sorts children by minimum distance, then maximum distance, then index.
pub(crate) fn sort_children(children: &mut [ChildDistance]) {
    children.sort_by(|a, b| {
        cmp_f64(a.min_distance, b.min_distance)
            .then_with(|| cmp_f64(a.max_distance, b.max_distance))
            .then_with(|| a.index.cmp(&b.index))
    });
}

impl SRTree {
    /// k nearest neighbors of `query` with the session algorithm.
    ///
    /// Results are ordered by distance. More than `max_count` records are
    /// returned when several lie exactly at the distance of the last one.
    pub fn get_neighbors(&self, query: &Point, max_count: usize) -> SRTreeResult<Vec<Record>> {
        self.check_open()?;
        self.check_point(query)?;
        check_max_count(max_count)?;
        match self.neighbor_algorithm() {
            NeighborAlgorithm::DepthFirst => self.neighbors_depth_first(query, max_count),
            NeighborAlgorithm::BreadthFirst => self.neighbors_breadth_first(query, max_count),
        }
    }

    /// Lower bound of the distance from `point` to any member of `cluster`,
    /// counting which bound was the tighter one.
    pub(crate) fn min_distance(&self, point: &Point, cluster: &Cluster) -> f64 {
        let (distance, choice) = cluster.min_distance(point);
        let profile = self.profile_counters();
        match choice {
            BoundChoice::Equal => Profile::bump(&profile.equal_distances),
            BoundChoice::Sphere => Profile::bump(&profile.farther_spheres),
            BoundChoice::Rect => Profile::bump(&profile.farther_rects),
        }
        distance
    }

    pub(crate) fn max_distance(&self, point: &Point, cluster: &Cluster) -> f64 {
        cluster.max_distance(point)
    }
}

pub(crate) fn check_max_count(max_count: usize) -> SRTreeResult<()> {
    if max_count == 0 {
        return Err(SRTreeError::config("max count must be at least 1"));
    }
    Ok(())
}
