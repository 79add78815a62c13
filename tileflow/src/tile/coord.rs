//! Layer-system coordinates and rectangles.

use serde::{Deserialize, Serialize};

/// A point in layer system units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// An axis-aligned rectangle given by two opposite corners.
///
/// Layer systems may grow rightwards or leftwards and upwards or downwards,
/// so `top_left` is not necessarily the numerically smaller corner. Use the
/// `min_*`/`max_*` accessors for orientation-free geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RectCoord {
    pub top_left: Coord,
    pub bottom_right: Coord,
}

impl RectCoord {
    pub const fn new(top_left: Coord, bottom_right: Coord) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub const fn from_corners(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(Coord::new(left, top), Coord::new(right, bottom))
    }

    pub fn min_x(&self) -> f64 {
        self.top_left.x.min(self.bottom_right.x)
    }

    pub fn max_x(&self) -> f64 {
        self.top_left.x.max(self.bottom_right.x)
    }

    pub fn min_y(&self) -> f64 {
        self.top_left.y.min(self.bottom_right.y)
    }

    pub fn max_y(&self) -> f64 {
        self.top_left.y.max(self.bottom_right.y)
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn center(&self) -> Coord {
        Coord::new(
            (self.top_left.x + self.bottom_right.x) / 2.0,
            (self.top_left.y + self.bottom_right.y) / 2.0,
        )
    }

    /// True if the rectangles share a region of positive area.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &RectCoord) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    /// Bit patterns of the four coordinates, for exact equality and hashing.
    pub(crate) fn to_bits(self) -> [u64; 4] {
        [
            self.top_left.x.to_bits(),
            self.top_left.y.to_bits(),
            self.bottom_right.x.to_bits(),
            self.bottom_right.y.to_bits(),
        ]
    }

    pub(crate) fn total_cmp(&self, other: &RectCoord) -> std::cmp::Ordering {
        self.top_left
            .x
            .total_cmp(&other.top_left.x)
            .then(self.top_left.y.total_cmp(&other.top_left.y))
            .then(self.bottom_right.x.total_cmp(&other.bottom_right.x))
            .then(self.bottom_right.y.total_cmp(&other.bottom_right.y))
    }
}
