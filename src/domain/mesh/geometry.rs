use std::fmt;
use std::ops::{Add, Div, Index, Mul, Sub};

use std::f64::consts::FRAC_PI_4;

#[cfg(feature = "json_export")]
use json::JsonValue;

/// Tolerance used when comparing coordinates in real or parametric space
pub const GEOMETRIC_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq)]
/// 2D vector in Parametric or Real Space
pub struct V2D {
    inner: [f64; 2],
}

impl V2D {
    pub const fn from([x, y]: [f64; 2]) -> Self {
        Self { inner: [x, y] }
    }

    pub fn x(&self) -> f64 {
        self.inner[0]
    }

    pub fn y(&self) -> f64 {
        self.inner[1]
    }
}

impl Default for V2D {
    fn default() -> Self {
        Self { inner: [0.0; 2] }
    }
}

impl Index<usize> for V2D {
    type Output = f64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}

impl Add for V2D {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            inner: [self[0] + other[0], self[1] + other[1]],
        }
    }
}

impl Sub for V2D {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            inner: [self[0] - other[0], self[1] - other[1]],
        }
    }
}

impl Div<f64> for V2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            inner: [self[0] / divisor, self[1] / divisor],
        }
    }
}

impl Mul<f64> for V2D {
    type Output = Self;
    fn mul(self, coefficient: f64) -> Self {
        Self {
            inner: [self[0] * coefficient, self[1] * coefficient],
        }
    }
}

/*
    | [x1, y1] |
    | [x2, y2] |
*/

#[derive(Clone, Copy, Debug)]
/// 2 by 2 Matrix. Used to represent transformations in/into Parametric space
pub struct M2D {
    pub u: V2D,
    pub v: V2D,
}

impl M2D {
    pub const fn from(r0: [f64; 2], r1: [f64; 2]) -> Self {
        Self {
            u: V2D::from(r0),
            v: V2D::from(r1),
        }
    }

    #[inline]
    pub fn det(&self) -> f64 {
        self.u[0] * self.v[1] - self.u[1] * self.v[0]
    }

    pub fn inverse(&self) -> Self {
        Self {
            u: V2D::from([self.v[1], -1.0 * self.u[1]]),
            v: V2D::from([-1.0 * self.v[0], self.u[0]]),
        } / self.det()
    }

    pub fn transpose(&self) -> Self {
        Self {
            u: V2D::from([self.u[0], self.v[0]]),
            v: V2D::from([self.u[1], self.v[1]]),
        }
    }
}

impl Div<f64> for M2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            u: self.u / divisor,
            v: self.v / divisor,
        }
    }
}

impl Mul<V2D> for M2D {
    type Output = V2D;
    fn mul(self, v: V2D) -> V2D {
        V2D::from([self.u[0] * v[0] + self.u[1] * v[1], self.v[0] * v[0] + self.v[1] * v[1]])
    }
}

impl fmt::Display for M2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "u: [{:.5}, {:.5}]  v: [{:.5}, {:.5}]",
            self.u[0], self.u[1], self.v[0], self.v[1]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Parametric Coordinate Directions
pub enum ParaDir {
    U,
    V,
}

#[cfg(feature = "json_export")]
impl From<ParaDir> for JsonValue {
    fn from(dir: ParaDir) -> Self {
        match dir {
            ParaDir::U => JsonValue::from("U-Dir"),
            ParaDir::V => JsonValue::from("V-Dir"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// Point in 2D Space
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn between(a: &Self, b: &Self) -> Self {
        Self::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// The orientation of the "edge" composed of these two Points
    /// panics if the points have the same location
    pub fn orientation_with(&self, other: &Self) -> ParaDir {
        assert!(
            self.dist(other) > GEOMETRIC_TOLERANCE,
            "Cannot compute the orientation between two Points at the same location: [{} == {}]!",
            self,
            other,
        );

        let dx = (other.x - self.x).abs();
        let dy = (other.y - self.y).abs();
        let theta = (dy / dx).atan();

        if theta < FRAC_PI_4 {
            ParaDir::U
        } else {
            ParaDir::V
        }
    }

    pub fn dist(&self, other: &Self) -> f64 {
        let dx = (other.x - self.x).abs();
        let dy = (other.y - self.y).abs();

        (dx.powi(2) + dy.powi(2)).sqrt()
    }

    /// Is this point located inside (or on the boundary of) the rectangle described by its two diagonal corners
    pub fn within(&self, [min, max]: &[Point; 2]) -> bool {
        self.x >= min.x - GEOMETRIC_TOLERANCE
            && self.x <= max.x + GEOMETRIC_TOLERANCE
            && self.y >= min.y - GEOMETRIC_TOLERANCE
            && self.y <= max.y + GEOMETRIC_TOLERANCE
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.x, self.y)
    }
}
