//! Quadrant tree over rectangles.
//!
//! Every segmentation step needs "which areas or columns are near this
//! rectangle". `SpatialIndex` answers that with a simple four-way split tree:
//! a leaf holds up to [`MAX_VALUES_PER_NODE`] entries; when it overflows, its
//! region is divided around the average midpoint of its entries into four
//! quadrants plus an overflow bucket for entries that straddle the split
//! lines.
//!
//! Removal never rebalances. A node's coverage is the union of everything
//! ever inserted below it and does not shrink, so queries may visit nodes
//! that are already empty but never miss a live entry.

use crate::image::geom::{Point, Rect};

/// Capacity of a leaf before it tries to split.
pub const MAX_VALUES_PER_NODE: usize = 16;

/// Anything with a bounding rectangle.
pub trait Bounded {
    fn bounds(&self) -> Rect;

    fn midpoint(&self) -> Point {
        self.bounds().midpoint()
    }
}

impl Bounded for Rect {
    fn bounds(&self) -> Rect {
        *self
    }
}

/// A key tagged with the rectangle it is indexed under.
///
/// Entities that live in an arena are indexed through their id; equality
/// compares keys only so that removal does not depend on the rectangle.
#[derive(Debug, Clone, Copy)]
pub struct Keyed<K> {
    pub key: K,
    pub rect: Rect,
}

impl<K> Keyed<K> {
    pub fn new(key: K, rect: Rect) -> Self {
        Keyed { key, rect }
    }
}

impl<K: PartialEq> PartialEq for Keyed<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K> Bounded for Keyed<K> {
    fn bounds(&self) -> Rect {
        self.rect
    }
}

// ─── Node ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Contents<T> {
    Leaf(Vec<T>),
    Branch {
        quadrants: Vec<Node<T>>,
        overflow: Box<Node<T>>,
    },
}

#[derive(Debug)]
struct Node<T> {
    region: Rect,
    coverage: Option<Rect>,
    no_split: bool,
    contents: Contents<T>,
}

impl<T: Bounded + Clone + PartialEq> Node<T> {
    fn new(region: Rect) -> Self {
        Node {
            region,
            coverage: None,
            no_split: false,
            contents: Contents::Leaf(Vec::new()),
        }
    }

    fn covers(&self, rect: &Rect) -> bool {
        self.coverage.is_some_and(|c| c.intersects(rect))
    }

    fn leaf_len(&self) -> usize {
        match &self.contents {
            Contents::Leaf(values) => values.len(),
            Contents::Branch { .. } => 0,
        }
    }

    fn insert(&mut self, value: T) {
        let rect = value.bounds();
        self.coverage = Some(match self.coverage {
            Some(c) => c.union(&rect),
            None => rect,
        });
        let full = match &mut self.contents {
            Contents::Leaf(values) => {
                values.push(value);
                values.len() > MAX_VALUES_PER_NODE
            }
            Contents::Branch {
                quadrants,
                overflow,
            } => {
                match quadrants.iter_mut().find(|q| q.region.contains_rect(&rect)) {
                    Some(quadrant) => quadrant.insert(value),
                    None => overflow.insert(value),
                }
                false
            }
        };
        if full && !self.no_split {
            self.split();
        }
    }

    fn remove(&mut self, value: &T) -> bool {
        match &mut self.contents {
            Contents::Leaf(values) => match values.iter().position(|v| v == value) {
                Some(idx) => {
                    values.remove(idx);
                    true
                }
                None => false,
            },
            Contents::Branch {
                quadrants,
                overflow,
            } => {
                let rect = value.bounds();
                match quadrants.iter_mut().find(|q| q.region.contains_rect(&rect)) {
                    Some(quadrant) => quadrant.remove(value),
                    None => overflow.remove(value),
                }
            }
        }
    }

    fn query(&self, rect: &Rect, results: &mut Vec<T>) {
        match &self.contents {
            Contents::Leaf(values) => {
                results.extend(values.iter().filter(|v| v.bounds().intersects(rect)).cloned());
            }
            Contents::Branch {
                quadrants,
                overflow,
            } => {
                for quadrant in quadrants {
                    if quadrant.covers(rect) {
                        quadrant.query(rect, results);
                    }
                }
                if overflow.covers(rect) {
                    overflow.query(rect, results);
                }
            }
        }
    }

    fn collect(&self, results: &mut Vec<T>) {
        match &self.contents {
            Contents::Leaf(values) => results.extend(values.iter().cloned()),
            Contents::Branch {
                quadrants,
                overflow,
            } => {
                for quadrant in quadrants {
                    quadrant.collect(results);
                }
                overflow.collect(results);
            }
        }
    }

    /// Distributes the leaf's values into four quadrants and an overflow
    /// bucket. If any bucket would overflow immediately the node stays a
    /// leaf for good.
    fn split(&mut self) {
        let values = match &self.contents {
            Contents::Leaf(values) if !values.is_empty() => values,
            _ => return,
        };
        let mid = average_midpoint(values);
        let b = self.region;
        let left_width = mid.x - b.x;
        let right_width = b.x + b.width - mid.x;
        let up_height = mid.y - b.y;
        let down_height = b.y + b.height - mid.y;

        let mut quadrants = vec![
            Node::new(Rect::new(b.x, b.y, left_width, up_height)),
            Node::new(Rect::new(mid.x, b.y, right_width, up_height)),
            Node::new(Rect::new(b.x, mid.y, left_width, down_height)),
            Node::new(Rect::new(mid.x, mid.y, right_width, down_height)),
        ];
        let mut overflow = Node::new(b);

        for value in values {
            let rect = value.bounds();
            let target = match quadrants.iter_mut().find(|q| q.region.contains_rect(&rect)) {
                Some(quadrant) => quadrant,
                None => &mut overflow,
            };
            if target.leaf_len() == MAX_VALUES_PER_NODE {
                self.no_split = true;
                return;
            }
            target.insert(value.clone());
        }

        self.contents = Contents::Branch {
            quadrants,
            overflow: Box::new(overflow),
        };
    }
}

fn average_midpoint<T: Bounded>(values: &[T]) -> Point {
    let (mut x, mut y) = (0i64, 0i64);
    for value in values {
        let mid = value.midpoint();
        x += mid.x as i64;
        y += mid.y as i64;
    }
    let n = values.len() as i64;
    Point::new((x / n) as i32, (y / n) as i32)
}

// ─── SpatialIndex ───────────────────────────────────────────────────────────

/// Rectangle index supporting insert, remove and intersection queries.
#[derive(Debug)]
pub struct SpatialIndex<T> {
    root: Node<T>,
    len: usize,
}

impl<T: Bounded + Clone + PartialEq> SpatialIndex<T> {
    /// Creates an empty index covering `region`. Entries outside the region
    /// are still accepted; they end up in overflow buckets.
    pub fn new(region: Rect) -> Self {
        SpatialIndex {
            root: Node::new(region),
            len: 0,
        }
    }

    /// Creates an index and inserts `values`.
    pub fn with_values<I>(region: Rect, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut index = Self::new(region);
        for value in values {
            index.insert(value);
        }
        index
    }

    pub fn insert(&mut self, value: T) {
        self.root.insert(value);
        self.len += 1;
    }

    /// Removes one entry equal to `value`. Returns false if it was not found.
    pub fn remove(&mut self, value: &T) -> bool {
        let removed = self.root.remove(value);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// All entries whose rectangle intersects `rect`.
    pub fn query(&self, rect: &Rect) -> Vec<T> {
        let mut results = Vec::new();
        if self.root.covers(rect) {
            self.root.query(rect, &mut results);
        }
        results
    }

    /// Like [`query`](Self::query) but leaves out entries equal to `skip`.
    pub fn query_except(&self, rect: &Rect, skip: &T) -> Vec<T> {
        let mut results = self.query(rect);
        results.retain(|v| v != skip);
        results
    }

    /// Checks whether any entry intersects `rect`.
    pub fn intersects_any(&self, rect: &Rect) -> bool {
        !self.query(rect).is_empty()
    }

    /// Every entry in tree order.
    pub fn all(&self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.len);
        self.root.collect(&mut results);
        results
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_entries(n: i32) -> Vec<Keyed<i32>> {
        let mut entries = Vec::new();
        for i in 0..n {
            let x = (i % 10) * 20;
            let y = (i / 10) * 20;
            entries.push(Keyed::new(i, Rect::new(x, y, 10, 10)));
        }
        entries
    }

    #[test]
    fn test_query_small_index() {
        let index = SpatialIndex::with_values(Rect::new(0, 0, 100, 100), grid_entries(3));
        let found = index.query(&Rect::new(15, 0, 10, 5));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, 1);
    }

    #[test]
    fn test_split_keeps_all_entries() {
        let entries = grid_entries(100);
        let index = SpatialIndex::with_values(Rect::new(0, 0, 200, 200), entries.clone());
        assert_eq!(index.len(), 100);
        let mut keys: Vec<i32> = index.all().iter().map(|e| e.key).collect();
        keys.sort();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());

        let found = index.query(&Rect::new(0, 0, 200, 200));
        assert_eq!(found.len(), 100);
    }

    #[test]
    fn test_query_except() {
        let entries = grid_entries(2);
        let index = SpatialIndex::with_values(Rect::new(0, 0, 100, 100), entries.clone());
        let found = index.query_except(&Rect::new(0, 0, 100, 100), &entries[0]);
        assert_eq!(found, vec![entries[1]]);
    }

    #[test]
    fn test_remove_after_split() {
        let entries = grid_entries(50);
        let mut index = SpatialIndex::with_values(Rect::new(0, 0, 200, 200), entries.clone());
        assert!(index.remove(&entries[17]));
        assert!(!index.remove(&entries[17]));
        assert_eq!(index.len(), 49);
        let found = index.query(&entries[17].rect);
        assert!(found.iter().all(|e| e.key != 17));
    }

    #[test]
    fn test_identical_rects_stop_splitting() {
        let mut index = SpatialIndex::new(Rect::new(0, 0, 100, 100));
        for i in 0..40 {
            index.insert(Keyed::new(i, Rect::new(10, 10, 5, 5)));
        }
        assert_eq!(index.query(&Rect::new(12, 12, 1, 1)).len(), 40);
    }
}
