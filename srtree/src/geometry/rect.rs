use serde::{Deserialize, Serialize};
use std::fmt;

use super::rounding;
use super::{Point, Sphere};

/// A closed interval on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn includes(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    ranges: Vec<Range>,
}

impl Rect {
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Builds a rectangle from per-axis lower and upper bounds.
    pub fn from_bounds(min: &[f64], max: &[f64]) -> Self {
        Self {
            ranges: min
                .iter()
                .zip(max)
                .map(|(&lo, &hi)| Range::new(lo, hi))
                .collect(),
        }
    }

    /// Smallest rectangle enclosing every point, `None` for an empty input.
    pub fn bounding<'a, I>(points: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ranges: Vec<Range> = first.coords().iter().map(|&c| Range::new(c, c)).collect();
        for point in iter {
            for (range, &c) in ranges.iter_mut().zip(point.coords()) {
                if c < range.min {
                    range.min = c;
                }
                if c > range.max {
                    range.max = c;
                }
            }
        }
        Some(Rect { ranges })
    }

    /// Smallest rectangle enclosing both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            ranges: self
                .ranges
                .iter()
                .zip(&other.ranges)
                .map(|(a, b)| Range::new(a.min.min(b.min), a.max.max(b.max)))
                .collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, axis: usize) -> &Range {
        &self.ranges[axis]
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn includes(&self, point: &Point) -> bool {
        self.ranges
            .iter()
            .zip(point.coords())
            .all(|(range, &c)| range.includes(c))
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.ranges
            .iter()
            .zip(&other.ranges)
            .all(|(a, b)| a.overlaps(b))
    }

    pub fn overlaps_sphere(&self, sphere: &Sphere) -> bool {
        self.min_distance(sphere.center()) <= sphere.radius()
    }

    pub fn center_point(&self) -> Point {
        Point::new(self.ranges.iter().map(Range::center).collect())
    }

    /// The point of the rectangle closest to `point`.
    pub fn nearest_point(&self, point: &Point) -> Point {
        Point::new(
            self.ranges
                .iter()
                .zip(point.coords())
                .map(|(range, &c)| {
                    if c < range.min {
                        range.min
                    } else if c < range.max {
                        c
                    } else {
                        range.max
                    }
                })
                .collect(),
        )
    }

    /// The corner of the rectangle farthest from `point`.
    ///
    /// Each axis takes the end at the larger rounded distance. Rounding is
    /// monotone, so no member of the range is rounded farther than that end.
    pub fn farthest_point(&self, point: &Point) -> Point {
        Point::new(
            self.ranges
                .iter()
                .zip(point.coords())
                .map(|(range, &c)| {
                    if (c - range.min).abs() < (range.max - c).abs() {
                        range.max
                    } else {
                        range.min
                    }
                })
                .collect(),
        )
    }

    pub fn min_distance(&self, point: &Point) -> f64 {
        point.distance(&self.nearest_point(point))
    }

    pub fn lower_bound_min_distance(&self, point: &Point) -> f64 {
        point.lower_bound_distance(&self.nearest_point(point))
    }

    pub fn upper_bound_max_distance(&self, point: &Point) -> f64 {
        point.upper_bound_distance(&self.farthest_point(point))
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f64 {
        self.ranges
            .iter()
            .map(|r| r.width() * r.width())
            .sum::<f64>()
            .sqrt()
    }

    pub fn volume(&self) -> f64 {
        self.ranges.iter().map(Range::width).product()
    }

    /// Rounds every bound outward to single precision.
    pub(crate) fn to_single_precision(&self) -> Rect {
        Rect {
            ranges: self
                .ranges
                .iter()
                .map(|r| {
                    Range::new(
                        rounding::round_down_f32(r.min),
                        rounding::round_up_f32(r.max),
                    )
                })
                .collect(),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", r.min, r.max)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Rect {
        Rect::from_bounds(&[0.0, 0.0], &[1.0, 1.0])
    }

    #[test]
    fn test_bounding_rect() {
        let points = vec![
            Point::new(vec![0.0, 3.0]),
            Point::new(vec![2.0, -1.0]),
            Point::new(vec![1.0, 1.0]),
        ];
        let rect = Rect::bounding(&points).unwrap();
        assert_eq!(rect, Rect::from_bounds(&[0.0, -1.0], &[2.0, 3.0]));
        assert!(points.iter().all(|p| rect.includes(p)));
        assert!(Rect::bounding(&Vec::<Point>::new()).is_none());
    }

    #[test]
    fn test_nearest_and_farthest_points() {
        let rect = unit_square();
        let p = Point::new(vec![2.0, 0.25]);
        assert_eq!(rect.nearest_point(&p).coords(), &[1.0, 0.25]);
        assert_eq!(rect.farthest_point(&p).coords(), &[0.0, 1.0]);
        assert_eq!(rect.min_distance(&p), 1.0);
        let inside = Point::new(vec![0.5, 0.5]);
        assert_eq!(rect.min_distance(&inside), 0.0);
    }

    #[test]
    fn test_farthest_point_near_the_center() {
        // 0.1 + 0.2 rounds up, so the center sits above the true midpoint
        let rect = Rect::from_bounds(&[0.1], &[0.2]);
        let c = Point::new(vec![rect.range(0).center()]);
        let far = rect.farthest_point(&c);
        let to_min = (c.coord(0) - 0.1).abs();
        let to_max = (0.2 - c.coord(0)).abs();
        assert_eq!((far.coord(0) - c.coord(0)).abs(), to_min.max(to_max));
        for end in [0.1, 0.2] {
            assert!(rect.upper_bound_max_distance(&c) >= c.distance(&Point::new(vec![end])));
        }
    }

    #[test]
    fn test_overlaps() {
        let rect = unit_square();
        assert!(rect.overlaps(&Rect::from_bounds(&[1.0, 1.0], &[2.0, 2.0])));
        assert!(!rect.overlaps(&Rect::from_bounds(&[1.5, 0.0], &[2.0, 1.0])));
        assert!(rect.overlaps_sphere(&Sphere::new(Point::new(vec![2.0, 0.5]), 1.0)));
        assert!(!rect.overlaps_sphere(&Sphere::new(Point::new(vec![2.0, 2.0]), 1.0)));
    }

    #[test]
    fn test_measures() {
        let rect = Rect::from_bounds(&[0.0, 0.0], &[3.0, 4.0]);
        assert_eq!(rect.diagonal(), 5.0);
        assert_eq!(rect.volume(), 12.0);
        assert_eq!(rect.center_point().coords(), &[1.5, 2.0]);
    }

    #[test]
    fn test_single_precision_rect_contains_original() {
        let rect = Rect::from_bounds(&[0.1, -0.3], &[0.7, 0.9]);
        let rounded = rect.to_single_precision();
        for (a, b) in rect.ranges().iter().zip(rounded.ranges()) {
            assert!(b.min <= a.min);
            assert!(b.max >= a.max);
        }
    }
}
