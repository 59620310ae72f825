//! Geometric primitives: points, rectangles, spheres and directed rounding.

mod point;
mod rect;
pub mod rounding;
mod sphere;

pub use point::Point;
pub use rect::{Range, Rect};
pub use sphere::Sphere;
