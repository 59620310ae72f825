use serde::{Deserialize, Serialize};
use std::fmt;

use super::rounding;

/// A fixed-length vector of coordinates. The dimension is fixed per index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Vec<f64>,
}

impl Point {
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// The origin of the given dimension.
    pub fn origin(dimension: usize) -> Self {
        Self {
            coords: vec![0.0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    pub fn coord(&self, axis: usize) -> f64 {
        self.coords[axis]
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn distance(&self, other: &Point) -> f64 {
        rounding::distance(&self.coords, &other.coords)
    }

    /// Distance that is guaranteed not to exceed the exact value.
    pub fn lower_bound_distance(&self, other: &Point) -> f64 {
        rounding::lower_bound_distance(&self.coords, &other.coords)
    }

    /// Distance that is guaranteed not to fall below the exact value.
    pub fn upper_bound_distance(&self, other: &Point) -> f64 {
        rounding::upper_bound_distance(&self.coords, &other.coords)
    }

    /// Coordinates rounded to the nearest single precision value.
    pub(crate) fn to_single_precision(&self) -> Point {
        Point::new(self.coords.iter().map(|&c| rounding::to_f32(c)).collect())
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Point::new(coords)
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Point::new(coords.to_vec())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_basics() {
        let p = Point::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(p.dimension(), 3);
        assert_eq!(p.coord(1), 2.0);
        assert_eq!(p.to_string(), "(1, 2, 3)");
        assert_eq!(Point::origin(2).coords(), &[0.0, 0.0]);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(vec![0.0, 0.0]);
        let b = Point::new(vec![3.0, 4.0]);
        assert_eq!(a.distance(&b), 5.0);
        assert!(a.upper_bound_distance(&b) >= 5.0);
        assert!(a.lower_bound_distance(&b) <= 5.0);
    }
}
