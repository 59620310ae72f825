//! Query engine.
//!
//! - `range`: resumable range iteration over a [`QueryRegion`]
//! - `neighbor`: candidate lists and distance bounds shared by the searches
//! - `depth_first` / `breadth_first`: k-nearest-neighbor search
//! - `colored`: nearest-neighbor search keeping one result per payload class

mod breadth_first;
mod colored;
mod depth_first;
mod neighbor;
pub(crate) mod range;

pub use range::RangeIter;

use crate::cluster::Cluster;
use crate::geometry::{Point, Rect, Sphere};

/// A region range queries can be run against.
///
/// `overlaps` prunes subtrees and may return false positives; `includes`
/// decides membership of stored points and must be exact.
pub trait QueryRegion {
    fn overlaps(&self, cluster: &Cluster) -> bool;

    fn includes(&self, point: &Point) -> bool;
}

/// Matches every stored point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct All;

impl QueryRegion for All {
    fn overlaps(&self, _cluster: &Cluster) -> bool {
        true
    }

    fn includes(&self, _point: &Point) -> bool {
        true
    }
}

impl QueryRegion for Rect {
    fn overlaps(&self, cluster: &Cluster) -> bool {
        Rect::overlaps(self, cluster.rect()) && self.overlaps_sphere(cluster.sphere())
    }

    fn includes(&self, point: &Point) -> bool {
        Rect::includes(self, point)
    }
}

impl QueryRegion for Sphere {
    fn overlaps(&self, cluster: &Cluster) -> bool {
        cluster.rect().overlaps_sphere(self) && cluster.sphere().overlaps(self)
    }

    fn includes(&self, point: &Point) -> bool {
        Sphere::includes(self, point)
    }
}

impl<R: QueryRegion + ?Sized> QueryRegion for &R {
    fn overlaps(&self, cluster: &Cluster) -> bool {
        (**self).overlaps(cluster)
    }

    fn includes(&self, point: &Point) -> bool {
        (**self).includes(point)
    }
}
