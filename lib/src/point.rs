use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A position in the plane. Stipple positions live in normalized `[0, 1]²` space, everything
/// the partitioner and the spatial index touch is in grid units.
#[derive(Copy, Clone, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Self) -> f64 {
        let xs = self.x - other.x;
        let ys = self.y - other.y;
        (xs * xs) + (ys * ys)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Rotate counter-clockwise around the origin by `angle` radians.
    pub fn rotate(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Point::new(self.x * cos - self.y * sin, self.y * cos + self.x * sin)
    }

    pub fn clamp_unit(&self) -> Self {
        Point::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }

    /// Scale each axis independently, e.g. to go from normalized space to grid units.
    pub fn scale(&self, sx: f64, sy: f64) -> Self {
        Point::new(self.x * sx, self.y * sy)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, scale: f64) -> Self {
        Point::new(self.x * scale, self.y * scale)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, divisor: f64) -> Self {
        Point::new(self.x / divisor, self.y / divisor)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.distance(other) < 0.00001
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rotation_by_quarter_turn() {
        assert_eq!(Point::new(2.0, 0.0).rotate(FRAC_PI_2), Point::new(0.0, 2.0));
        assert_eq!(Point::new(0.0, 1.0).rotate(FRAC_PI_2), Point::new(-1.0, 0.0));
    }

    #[test]
    fn clamping_keeps_points_in_unit_square() {
        assert_eq!(Point::new(-0.2, 1.5).clamp_unit(), Point::new(0.0, 1.0));
        assert_eq!(Point::new(0.3, 0.7).clamp_unit(), Point::new(0.3, 0.7));
    }

    #[test]
    fn equality_is_approximate() {
        assert_eq!(Point::new(1.0, 1.0), Point::new(1.000001, 1.0));
        assert_ne!(Point::new(1.0, 1.0), Point::new(1.001, 1.0));
    }
}
