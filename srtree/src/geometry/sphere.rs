use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use super::rounding::{next_down, next_up};
use super::Point;

/// A ball given by its center and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    center: Point,
    radius: f64,
}

impl Sphere {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> &Point {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn dimension(&self) -> usize {
        self.center.dimension()
    }

    pub fn includes(&self, point: &Point) -> bool {
        point.distance(&self.center) <= self.radius
    }

    pub fn overlaps(&self, other: &Sphere) -> bool {
        self.center.distance(&other.center) <= self.radius + other.radius
    }

    pub fn min_distance(&self, point: &Point) -> f64 {
        (point.distance(&self.center) - self.radius).max(0.0)
    }

    pub fn max_distance(&self, point: &Point) -> f64 {
        point.distance(&self.center) + self.radius
    }

    /// Distance to the sphere surface, never above the exact value.
    pub fn lower_bound_min_distance(&self, point: &Point) -> f64 {
        let d = point.lower_bound_distance(&self.center) - self.radius;
        if d <= 0.0 {
            0.0
        } else {
            next_down(d).max(0.0)
        }
    }

    /// Distance to the farthest point of the sphere, never below the exact value.
    pub fn upper_bound_max_distance(&self, point: &Point) -> f64 {
        next_up(point.upper_bound_distance(&self.center) + self.radius)
    }

    pub fn volume(&self) -> f64 {
        let d = self.dimension() as f64;
        PI.powf(d / 2.0) * self.radius.powf(d) / gamma_half(self.dimension() + 2)
    }
}

/// Gamma function at `n / 2` for a positive integer `n`.
fn gamma_half(n: usize) -> f64 {
    let (mut value, mut x) = if n % 2 == 0 {
        (1.0, 1.0)
    } else {
        (PI.sqrt(), 0.5)
    };
    while x < n as f64 / 2.0 {
        value *= x;
        x += 1.0;
    }
    value
}

impl fmt::Display for Sphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sphere[center={}, radius={}]", self.center, self.radius)
    }
}
