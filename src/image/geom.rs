// src/image/geom.rs

//! Geometric primitives for integer rectangles and points.
//!
//! Rectangles are half-open: a rectangle covers columns `x..x + width` and
//! rows `y..y + height`. `max_x`/`max_y` return the last covered column/row,
//! which is what most segmentation probes are written against.

/// A 2D point with integer coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        crate::utils::math::distance(self.x, self.y, other.x, other.y)
    }
}

/// Represents a 2D rectangle with integer coordinates.
///
/// Width and height are signed so that intersections of disjoint rectangles
/// can be represented (and detected through `is_empty`). This struct is `Copy`,
/// so it can be passed around cheaply by value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates an empty rectangle.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Smallest rectangle that covers both points. Order doesn't matter.
    pub fn spanning(p1: Point, p2: Point) -> Self {
        let min_x = p1.x.min(p2.x);
        let max_x = p1.x.max(p2.x);
        let min_y = p1.y.min(p2.y);
        let max_y = p1.y.max(p2.y);
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Last covered column (`x + width - 1`).
    pub fn max_x(&self) -> i32 {
        self.x + self.width - 1
    }

    /// Last covered row (`y + height - 1`).
    pub fn max_y(&self) -> i32 {
        self.y + self.height - 1
    }

    /// Checks if the rectangle has zero or negative width or height.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of covered pixels, zero for empty rectangles.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Center point, rounded toward the top-left.
    pub fn midpoint(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Checks if a point is contained within the rectangle's bounds.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        !self.is_empty() && px >= self.x && px <= self.max_x() && py >= self.y && py <= self.max_y()
    }

    /// Checks if `other` lies completely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Checks if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.x <= self.max_x()
            && self.x <= other.max_x()
            && other.y <= self.max_y()
            && self.y <= other.max_y()
    }

    /// Returns the overlapping region. Disjoint rectangles produce a rectangle
    /// with non-positive width or height.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x_end = (self.x + self.width).min(other.x + other.width);
        let y_end = (self.y + self.height).min(other.y + other.height);
        Rect::new(x, y, x_end - x, y_end - y)
    }

    /// Returns a new rectangle that is the smallest bounding box containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x_end = (self.x + self.width).max(other.x + other.width);
        let y_end = (self.y + self.height).max(other.y + other.height);

        Rect::new(x, y, x_end - x, y_end - y)
    }

    /// Returns a new rectangle translated by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Returns a new rectangle grown by `(dx, dy)` on each side.
    pub fn inflate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2 * dx,
            self.height + 2 * dy,
        )
    }
}
