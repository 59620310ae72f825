//! Bounding regions of subtrees.
//!
//! A cluster summarizes a set of points by its centroid, the number of points
//! it covers (its weight), a bounding sphere around the centroid and a
//! bounding rectangle. Both bounds contain every member: radii use upper
//! bound distances, and reduced precision rounds everything outward.
//! Clusters are recomputed from block contents, never patched in place.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::NonLeafFloatType;
use crate::geometry::rounding;
use crate::geometry::{Point, Rect, Sphere};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    centroid: Point,
    weight: i32,
    sphere: Sphere,
    rect: Rect,
}

impl Cluster {
    /// Assembles a cluster from decoded parts.
    pub fn new(centroid: Point, weight: i32, sphere: Sphere, rect: Rect) -> Self {
        Self {
            centroid,
            weight,
            sphere,
            rect,
        }
    }

    /// Cluster of a set of points, `None` when there is no point.
    pub fn from_points<'a, I>(points: I, float_type: NonLeafFloatType) -> Option<Cluster>
    where
        I: IntoIterator<Item = &'a Point>,
        I::IntoIter: Clone,
    {
        let iter = points.into_iter();
        let mut count = 0usize;
        let mut sum: Vec<f64> = Vec::new();
        for point in iter.clone() {
            if sum.is_empty() {
                sum = vec![0.0; point.dimension()];
            }
            for (s, &c) in sum.iter_mut().zip(point.coords()) {
                *s += c;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let centroid = Point::new(sum.iter().map(|s| s / count as f64).collect());
        let centroid = round_centroid(centroid, float_type);

        let mut radius = 0.0f64;
        for point in iter.clone() {
            let d = centroid.upper_bound_distance(point);
            if d > radius {
                radius = d;
            }
        }
        let radius = round_radius(radius, float_type);
        let rect = round_rect(Rect::bounding(iter)?, float_type);

        Some(Cluster {
            sphere: Sphere::new(centroid.clone(), radius),
            centroid,
            weight: count as i32,
            rect,
        })
    }

    /// Cluster of a set of child clusters, `None` when there is no child.
    pub fn from_clusters<'a, I>(clusters: I, float_type: NonLeafFloatType) -> Option<Cluster>
    where
        I: IntoIterator<Item = &'a Cluster>,
        I::IntoIter: Clone,
    {
        let iter = clusters.into_iter();
        let mut total = 0i64;
        let mut sum: Vec<f64> = Vec::new();
        let mut rect: Option<Rect> = None;
        for cluster in iter.clone() {
            if sum.is_empty() {
                sum = vec![0.0; cluster.dimension()];
            }
            let weight = cluster.weight as f64;
            for (s, &c) in sum.iter_mut().zip(cluster.centroid.coords()) {
                *s += c * weight;
            }
            total += cluster.weight as i64;
            rect = Some(match rect {
                None => cluster.rect.clone(),
                Some(r) => r.union(&cluster.rect),
            });
        }
        let rect = rect?;

        let centroid = if total > 0 {
            Point::new(sum.iter().map(|s| s / total as f64).collect())
        } else {
            rect.center_point()
        };
        let centroid = round_centroid(centroid, float_type);

        let mut radius = 0.0f64;
        for cluster in iter {
            let sphere_bound = cluster.sphere.upper_bound_max_distance(&centroid);
            let rect_bound = cluster.rect.upper_bound_max_distance(&centroid);
            let d = sphere_bound.min(rect_bound);
            if d > radius {
                radius = d;
            }
        }
        let radius = round_radius(radius, float_type);

        Some(Cluster {
            sphere: Sphere::new(centroid.clone(), radius),
            centroid,
            weight: total as i32,
            rect: round_rect(rect, float_type),
        })
    }

    pub fn centroid(&self) -> &Point {
        &self.centroid
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn sphere(&self) -> &Sphere {
        &self.sphere
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn dimension(&self) -> usize {
        self.centroid.dimension()
    }

    /// Lower bound of the distance from `point` to any member.
    ///
    /// Takes the tighter of the sphere and rectangle bounds and reports which
    /// one won.
    pub fn min_distance(&self, point: &Point) -> (f64, BoundChoice) {
        let sphere = self.sphere.lower_bound_min_distance(point);
        let rect = self.rect.lower_bound_min_distance(point);
        if sphere == rect {
            (sphere, BoundChoice::Equal)
        } else if sphere > rect {
            (sphere, BoundChoice::Sphere)
        } else {
            (rect, BoundChoice::Rect)
        }
    }

    /// Upper bound of the distance from `point` to any member.
    pub fn max_distance(&self, point: &Point) -> f64 {
        let sphere = self.sphere.upper_bound_max_distance(point);
        let rect = self.rect.upper_bound_max_distance(point);
        sphere.min(rect)
    }
}

/// Which bound decided a minimum distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundChoice {
    Equal,
    Sphere,
    Rect,
}

fn round_centroid(centroid: Point, float_type: NonLeafFloatType) -> Point {
    match float_type {
        NonLeafFloatType::Double => centroid,
        NonLeafFloatType::Single => centroid.to_single_precision(),
    }
}

fn round_radius(radius: f64, float_type: NonLeafFloatType) -> f64 {
    match float_type {
        NonLeafFloatType::Double => radius,
        NonLeafFloatType::Single => rounding::round_up_f32(radius),
    }
}

fn round_rect(rect: Rect, float_type: NonLeafFloatType) -> Rect {
    match float_type {
        NonLeafFloatType::Double => rect,
        NonLeafFloatType::Single => rect.to_single_precision(),
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cluster[centroid={}, weight={}, radius={}, rect={}]",
            self.centroid,
            self.weight,
            self.sphere.radius(),
            self.rect
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(vec![0.0, 0.0]),
            Point::new(vec![1.0, 0.0]),
            Point::new(vec![0.0, 1.0]),
            Point::new(vec![1.0, 1.0]),
        ]
    }

    #[test]
    fn test_point_cluster() {
        let points = square();
        let cluster = Cluster::from_points(&points, NonLeafFloatType::Double).unwrap();
        assert_eq!(cluster.centroid().coords(), &[0.5, 0.5]);
        assert_eq!(cluster.weight(), 4);
        assert!(cluster.sphere().radius() >= 0.5f64.sqrt());
        assert_eq!(cluster.rect(), &Rect::from_bounds(&[0.0, 0.0], &[1.0, 1.0]));
        for p in &points {
            assert!(cluster.sphere().includes(p));
            assert!(cluster.rect().includes(p));
        }
        assert!(Cluster::from_points(&Vec::<Point>::new(), NonLeafFloatType::Double).is_none());
    }

    #[test]
    fn test_cluster_of_clusters_is_weighted() {
        let left = vec![Point::new(vec![0.0, 0.0])];
        let right = vec![
            Point::new(vec![4.0, 0.0]),
            Point::new(vec![4.0, 0.0]),
            Point::new(vec![4.0, 0.0]),
        ];
        let a = Cluster::from_points(&left, NonLeafFloatType::Double).unwrap();
        let b = Cluster::from_points(&right, NonLeafFloatType::Double).unwrap();
        let parent = Cluster::from_clusters([&a, &b], NonLeafFloatType::Double).unwrap();

        assert_eq!(parent.weight(), 4);
        assert_eq!(parent.centroid().coords(), &[3.0, 0.0]);
        assert!(parent.sphere().radius() >= 3.0);
        assert!(parent.sphere().includes(&left[0]));
        assert!(parent.sphere().includes(&right[0]));
        assert_eq!(parent.rect(), &Rect::from_bounds(&[0.0, 0.0], &[4.0, 0.0]));
    }

    #[test]
    fn test_single_precision_cluster_contains_members() {
        let points = vec![
            Point::new(vec![0.1, 0.7]),
            Point::new(vec![0.3, 0.2]),
            Point::new(vec![0.9, 0.4]),
        ];
        let cluster = Cluster::from_points(&points, NonLeafFloatType::Single).unwrap();
        for p in &points {
            assert!(cluster.sphere().includes(p));
            assert!(cluster.rect().includes(p));
        }
        for &c in cluster.centroid().coords() {
            assert_eq!(c as f32 as f64, c);
        }
        let parent = Cluster::from_clusters([&cluster], NonLeafFloatType::Single).unwrap();
        for p in &points {
            assert!(parent.sphere().includes(p));
        }
    }

    #[test]
    fn test_parent_of_single_child_contains_members() {
        // the centroid lands on the rounded middle of the rect on every axis
        let points = vec![
            Point::new(vec![0.7327509486485168, 0.9347800637465246, 0.4114801800228428]),
            Point::new(vec![0.756134578463542, 0.9892922228756693, 0.42373505787941435]),
        ];
        let leaf = Cluster::from_points(&points, NonLeafFloatType::Double).unwrap();
        let parent = Cluster::from_clusters([&leaf], NonLeafFloatType::Double).unwrap();
        assert!(parent.sphere().radius() >= leaf.sphere().radius());
        for p in &points {
            assert!(leaf.sphere().includes(p));
            assert!(parent.sphere().includes(p));
            assert!(parent.rect().includes(p));
        }
    }

    #[test]
    fn test_min_and_max_distance() {
        let points = square();
        let cluster = Cluster::from_points(&points, NonLeafFloatType::Double).unwrap();
        let q = Point::new(vec![3.0, 0.5]);
        let (min, choice) = cluster.min_distance(&q);
        assert!(min <= 2.0);
        assert_eq!(choice, BoundChoice::Rect);
        assert!(cluster.max_distance(&q) >= 3.0);
        let (inside, _) = cluster.min_distance(&Point::new(vec![0.5, 0.5]));
        assert_eq!(inside, 0.0);
    }
}
