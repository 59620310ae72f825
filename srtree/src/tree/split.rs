//! Selection rules for overflowing blocks.
//!
//! Both rules work on weighted positions: a point is a position of weight
//! one, a child cluster is its centroid weighted by the number of points it
//! covers (all of them assumed to sit at the centroid).

use crate::cluster::Cluster;
use crate::geometry::Point;

/// A weighted position taking part in a split or a reinsertion.
pub(crate) struct Mass<'a> {
    coords: &'a [f64],
    weight: f64,
}

impl<'a> Mass<'a> {
    pub fn of_point(point: &'a Point) -> Self {
        Self {
            coords: point.coords(),
            weight: 1.0,
        }
    }

    pub fn of_cluster(cluster: &'a Cluster) -> Self {
        Self {
            coords: cluster.centroid().coords(),
            weight: cluster.weight() as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Stay,
    Reinsert,
}

/// Variance of one axis over a group.
fn axis_variance<'a>(group: impl Iterator<Item = &'a Mass<'a>>, axis: usize) -> f64 {
    let mut sum = 0.0;
    let mut sum2 = 0.0;
    let mut total = 0.0;
    for mass in group {
        let c = mass.coords[axis];
        sum += c * mass.weight;
        sum2 += c * c * mass.weight;
        total += mass.weight;
    }
    let avg = sum / total;
    sum2 / total - avg * avg
}

/// Axis of largest variance; the first one wins ties.
pub(crate) fn max_variance_axis(masses: &[Mass]) -> usize {
    let dimension = masses.first().map(|m| m.coords.len()).unwrap_or(0);
    let mut best_axis = 0;
    let mut best_var = f64::NEG_INFINITY;
    for axis in 0..dimension {
        let var = axis_variance(masses.iter(), axis);
        if var > best_var {
            best_axis = axis;
            best_var = var;
        }
    }
    best_axis
}

/// Divides `masses` in two groups along the axis of largest variance.
///
/// Entries are ordered along that axis and cut where the summed per-axis
/// variances of both sides are smallest. Each side keeps at least
/// `split_factor` percent of the entries (and at least one).
pub(crate) fn split_sides(masses: &[Mass], split_factor: usize) -> Vec<Side> {
    let n = masses.len();
    let dimension = masses.first().map(|m| m.coords.len()).unwrap_or(0);
    let min_count = (n * split_factor / 100).max(1);
    let max_count = n.saturating_sub(min_count);

    let axis = max_variance_axis(masses);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        masses[a].coords[axis]
            .partial_cmp(&masses[b].coords[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let variance_sum = |range: &[usize]| -> f64 {
        (0..dimension)
            .map(|axis| axis_variance(range.iter().map(|&i| &masses[i]), axis))
            .sum()
    };

    let mut best: Option<(usize, f64)> = None;
    for count in min_count..=max_count {
        let total = variance_sum(&order[..count]) + variance_sum(&order[count..]);
        match best {
            Some((_, var)) if total >= var => {}
            _ => best = Some((count, total)),
        }
    }
    let cut = best.map(|(count, _)| count).unwrap_or(n / 2);

    let mut sides = vec![Side::Right; n];
    for &i in &order[..cut] {
        sides[i] = Side::Left;
    }
    sides
}

/// Marks the `(n * reinsert_factor / 100)` entries farthest from the
/// weighted centroid for reinsertion.
pub(crate) fn reinsert_placements(masses: &[Mass], reinsert_factor: usize) -> Vec<Placement> {
    let n = masses.len();
    let reinsert_count = n * reinsert_factor / 100;
    let dimension = masses.first().map(|m| m.coords.len()).unwrap_or(0);

    let total: f64 = masses.iter().map(|m| m.weight).sum();
    let centroid = Point::new(
        (0..dimension)
            .map(|axis| masses.iter().map(|m| m.coords[axis] * m.weight).sum::<f64>() / total)
            .collect(),
    );

    let distances: Vec<f64> = masses
        .iter()
        .map(|m| Point::from(m.coords).distance(&centroid))
        .collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        distances[b]
            .partial_cmp(&distances[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut placements = vec![Placement::Stay; n];
    for &i in order.iter().take(reinsert_count) {
        placements[i] = Placement::Reinsert;
    }
    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NonLeafFloatType;

    fn points(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(vec![x, y])).collect()
    }

    #[test]
    fn test_axis_of_largest_variance() {
        let pts = points(&[(0.0, 0.0), (1.0, 5.0), (2.0, 10.0)]);
        let masses: Vec<Mass> = pts.iter().map(Mass::of_point).collect();
        assert_eq!(max_variance_axis(&masses), 1);

        let tie = points(&[(0.0, 0.0), (1.0, 1.0)]);
        let masses: Vec<Mass> = tie.iter().map(Mass::of_point).collect();
        assert_eq!(max_variance_axis(&masses), 0);
    }

    #[test]
    fn test_split_separates_outlier_group() {
        let pts = points(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (5.0, 5.0)]);
        let masses: Vec<Mass> = pts.iter().map(Mass::of_point).collect();
        let sides = split_sides(&masses, 40);
        assert_eq!(
            sides,
            vec![Side::Left, Side::Left, Side::Left, Side::Right, Side::Right]
        );
    }

    #[test]
    fn test_split_respects_min_count() {
        let pts = points(&[(0.0, 0.0), (0.1, 0.0), (0.2, 0.0), (0.3, 0.0), (100.0, 0.0)]);
        let masses: Vec<Mass> = pts.iter().map(Mass::of_point).collect();
        let sides = split_sides(&masses, 50);
        let left = sides.iter().filter(|s| **s == Side::Left).count();
        assert!(left >= 2 && left <= 3);

        let unrestricted = split_sides(&masses, 0);
        assert_eq!(unrestricted[4], Side::Right);
        assert_eq!(unrestricted.iter().filter(|s| **s == Side::Right).count(), 1);
    }

    #[test]
    fn test_split_clusters_uses_weights() {
        let a = Cluster::from_points(&points(&[(0.0, 0.0)]), NonLeafFloatType::Double).unwrap();
        let b = Cluster::from_points(&points(&[(1.0, 0.0); 6]), NonLeafFloatType::Double).unwrap();
        let c = Cluster::from_points(&points(&[(9.0, 0.0)]), NonLeafFloatType::Double).unwrap();
        let masses = vec![Mass::of_cluster(&a), Mass::of_cluster(&b), Mass::of_cluster(&c)];
        let sides = split_sides(&masses, 0);
        assert_eq!(sides, vec![Side::Left, Side::Left, Side::Right]);
    }

    #[test]
    fn test_reinsert_picks_farthest() {
        let pts = points(&[(0.0, 0.0), (0.5, 0.5), (1.0, 0.0), (0.0, 1.0), (10.0, 10.0)]);
        let masses: Vec<Mass> = pts.iter().map(Mass::of_point).collect();
        let placements = reinsert_placements(&masses, 30);
        assert_eq!(
            placements,
            vec![
                Placement::Stay,
                Placement::Stay,
                Placement::Stay,
                Placement::Stay,
                Placement::Reinsert
            ]
        );
        assert!(reinsert_placements(&masses, 10)
            .iter()
            .all(|p| *p == Placement::Stay));
    }
}
