//! Reading-direction columns and the arena that owns them.

use std::collections::HashSet;

use crate::image::geom::{Point, Rect};
use crate::segment::area::Area;
use crate::segment::spatial_index::Keyed;

/// Stable index of a column inside a [`ColumnSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub usize);

/// Index entry for a column.
pub type ColumnEntry = Keyed<ColumnId>;

/// An ordered run of areas sharing one reading line.
///
/// Areas are kept sorted along the reading axis. A column always holds at
/// least one area.
#[derive(Debug, Clone)]
pub struct Column {
    areas: Vec<Area>,
    rect: Rect,
    vertical: bool,
    pub furigana: bool,
    /// Furigana columns annotating this column.
    pub furigana_columns: Vec<ColumnId>,
    /// Average midpoint spacing of regular areas, set during orientation
    /// resolution.
    pub area_distance: Option<f32>,
    pub score: f32,
    pub next: Option<ColumnId>,
    pub previous: Option<ColumnId>,
    pub changed: bool,
}

impl Column {
    /// Creates a single-area column.
    pub fn from_area(area: Area, vertical: bool) -> Self {
        let rect = area.rect;
        let mut column = Column {
            areas: vec![area],
            rect,
            vertical,
            furigana: false,
            furigana_columns: Vec::new(),
            area_distance: None,
            score: 0.0,
            next: None,
            previous: None,
            changed: false,
        };
        column.score = column.ratio();
        column
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Mutable access to the areas for split/merge passes. The column's
    /// rectangle is left as is.
    pub fn areas_mut(&mut self) -> &mut Vec<Area> {
        &mut self.areas
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    pub fn x(&self) -> i32 {
        self.rect.x
    }

    pub fn y(&self) -> i32 {
        self.rect.y
    }

    pub fn width(&self) -> i32 {
        self.rect.width
    }

    pub fn height(&self) -> i32 {
        self.rect.height
    }

    pub fn max_x(&self) -> i32 {
        self.rect.max_x()
    }

    pub fn max_y(&self) -> i32 {
        self.rect.max_y()
    }

    pub fn midpoint(&self) -> Point {
        self.rect.midpoint()
    }

    pub fn size(&self) -> i32 {
        self.rect.width * self.rect.height
    }

    pub fn min_dim(&self) -> i32 {
        self.rect.width.min(self.rect.height)
    }

    /// Column thickness.
    pub fn minor_dim(&self) -> i32 {
        if self.vertical { self.rect.width } else { self.rect.height }
    }

    /// Column length.
    pub fn major_dim(&self) -> i32 {
        if self.vertical { self.rect.height } else { self.rect.width }
    }

    pub fn area_size_sum(&self) -> i32 {
        self.areas.iter().map(Area::size).sum()
    }

    pub fn pixels(&self) -> usize {
        self.areas.iter().map(|a| a.pixels).sum()
    }

    pub fn pixel_area_ratio(&self) -> f32 {
        self.pixels() as f32 / self.size() as f32
    }

    pub fn ratio(&self) -> f32 {
        let min = self.rect.width.min(self.rect.height);
        let max = self.rect.width.max(self.rect.height);
        min as f32 / max as f32
    }

    pub fn avg_area_ratio(&self) -> f32 {
        let sum: f32 = self.areas.iter().map(Area::ratio).sum();
        sum / self.areas.len() as f32
    }

    pub fn median_area_size(&self) -> f32 {
        let mut sizes: Vec<i32> = self.areas.iter().map(Area::size).collect();
        sizes.sort_unstable();
        let n = sizes.len();
        if n % 2 == 1 {
            sizes[n / 2] as f32
        } else {
            (sizes[n / 2 - 1] + sizes[n / 2]) as f32 / 2.0
        }
    }

    pub fn min_rgb(&self) -> u8 {
        self.areas.iter().map(|a| a.min_rgb).min().unwrap_or(255)
    }

    /// Pixel-weighted average of the areas' minimum intensities.
    pub fn avg_rgb(&self) -> f32 {
        let mut sum = 0.0f32;
        let mut weight = 0.0f32;
        for area in &self.areas {
            sum += area.min_rgb as f32 * area.pixels as f32;
            weight += area.pixels as f32;
        }
        if weight == 0.0 { 255.0 } else { sum / weight }
    }

    pub fn contains_column(&self, other: &Column) -> bool {
        self.rect.contains_rect(&other.rect)
    }

    /// Shared surface relative to the smaller of the two columns.
    pub fn intersect_ratio(&self, other: &Column) -> f32 {
        if !self.rect.intersects(&other.rect) {
            return 0.0;
        }
        let common = self.rect.intersection(&other.rect).area() as f32;
        let reference = self.size().min(other.size()) as f32;
        common / reference
    }

    /// Shared width relative to the narrower of the two columns.
    pub fn horizontal_intersect_ratio(&self, other: &Column) -> f32 {
        if other.x() > self.max_x() || other.max_x() < self.x() {
            return 0.0;
        }
        let common = self.max_x().min(other.max_x()) - self.x().max(other.x()) + 1;
        let reference = self.width().min(other.width());
        common as f32 / reference as f32
    }

    /// Combines two columns. Areas are re-sorted along the reading axis and
    /// areas overlapping along that axis are fused.
    pub fn merge(&self, other: &Column) -> Column {
        let mut areas = self.areas.clone();
        areas.extend(other.areas.iter().cloned());
        let vertical = self.vertical;
        areas.sort_by_key(|a| if vertical { a.midpoint().y } else { a.midpoint().x });

        let mut i = 0;
        while i + 1 < areas.len() {
            let (a1, a2) = (&areas[i], &areas[i + 1]);
            let overlap = if vertical {
                a1.max_y() >= a2.y() && a1.y() <= a2.max_y()
            } else {
                a1.max_x() >= a2.x() && a1.x() <= a2.max_x()
            };
            if overlap {
                let merged = a1.merge(a2);
                areas.splice(i..i + 2, std::iter::once(merged));
            } else {
                i += 1;
            }
        }

        let mut column = Column {
            areas,
            rect: self.rect.union(&other.rect),
            vertical,
            furigana: false,
            furigana_columns: Vec::new(),
            area_distance: None,
            score: 0.0,
            next: None,
            previous: None,
            changed: true,
        };
        column.score = column.ratio();
        column
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{},{},{}:{}",
            if self.vertical { "v" } else { "h" },
            self.rect.x,
            self.rect.y,
            self.rect.width,
            self.rect.height
        )
    }
}

// ─── ColumnSet ──────────────────────────────────────────────────────────────

/// Arena of columns. Links between columns are [`ColumnId`]s into the same
/// set.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: Column) -> ColumnId {
        self.columns.push(column);
        ColumnId(self.columns.len() - 1)
    }

    pub fn get(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    pub fn get_mut(&mut self, id: ColumnId) -> &mut Column {
        &mut self.columns[id.0]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        (0..self.columns.len()).map(ColumnId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, &Column)> + '_ {
        self.columns.iter().enumerate().map(|(i, c)| (ColumnId(i), c))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index entry for column `id`.
    pub fn entry(&self, id: ColumnId) -> ColumnEntry {
        Keyed::new(id, self.get(id).rect)
    }

    pub fn entries(&self) -> Vec<ColumnEntry> {
        self.ids().map(|id| self.entry(id)).collect()
    }

    /// Every area of every column.
    pub fn areas(&self) -> impl Iterator<Item = &Area> + '_ {
        self.columns.iter().flat_map(|c| c.areas.iter())
    }

    /// Follows `next` links starting at `start`. Stops at the end of the
    /// chain or right before a column that was already visited.
    pub fn chain(&self, start: ColumnId) -> Vec<ColumnId> {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            chain.push(id);
            current = self.get(id).next;
        }
        chain
    }

    /// Builds a new set from selected columns of one or more sets. Links are
    /// remapped to the new ids; links to columns that were not selected are
    /// dropped.
    pub fn compose(parts: &[(&ColumnSet, &[ColumnId])]) -> ColumnSet {
        let mut result = ColumnSet::new();
        let mut remaps = Vec::with_capacity(parts.len());
        for (set, selected) in parts {
            let mut remap = vec![None; set.len()];
            for &id in selected.iter() {
                if remap[id.0].is_none() {
                    remap[id.0] = Some(result.push(set.get(id).clone()));
                }
            }
            remaps.push(remap);
        }
        for remap in &remaps {
            for new_id in remap.iter().flatten() {
                let column = result.get_mut(*new_id);
                column.next = column.next.and_then(|id| remap[id.0]);
                column.previous = column.previous.and_then(|id| remap[id.0]);
                let furigana = std::mem::take(&mut column.furigana_columns);
                column.furigana_columns = furigana.into_iter().filter_map(|id| remap[id.0]).collect();
            }
        }
        result
    }

    /// Keeps only the columns matching `keep`, remapping links.
    pub fn retain<F>(&self, mut keep: F) -> ColumnSet
    where
        F: FnMut(&Column) -> bool,
    {
        let selected: Vec<ColumnId> = self.iter().filter(|(_, c)| keep(c)).map(|(id, _)| id).collect();
        ColumnSet::compose(&[(self, &selected)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(x: i32, y: i32, w: i32, h: i32) -> Area {
        Area::new(Rect::new(x, y, w, h), (w * h) as usize)
    }

    #[test]
    fn test_merge_sorts_areas() {
        let c1 = Column::from_area(area(10, 40, 15, 15), true);
        let c2 = Column::from_area(area(10, 10, 15, 15), true);
        let merged = c1.merge(&c2);
        assert_eq!(merged.rect(), Rect::new(10, 10, 15, 45));
        assert_eq!(merged.areas().len(), 2);
        assert_eq!(merged.areas()[0].y(), 10);
        assert_eq!(merged.areas()[1].y(), 40);
    }

    #[test]
    fn test_merge_fuses_overlapping_areas() {
        let c1 = Column::from_area(area(10, 10, 6, 15), true);
        let c2 = Column::from_area(area(18, 12, 6, 10), true);
        let merged = c1.merge(&c2);
        assert_eq!(merged.areas().len(), 1);
        assert_eq!(merged.areas()[0].rect, Rect::new(10, 10, 14, 15));
    }

    #[test]
    fn test_chain_stops_on_cycle() {
        let mut set = ColumnSet::new();
        let a = set.push(Column::from_area(area(0, 0, 10, 10), true));
        let b = set.push(Column::from_area(area(20, 0, 10, 10), true));
        set.get_mut(a).next = Some(b);
        set.get_mut(b).next = Some(a);
        assert_eq!(set.chain(a), vec![a, b]);
    }

    #[test]
    fn test_compose_remaps_links() {
        let mut set = ColumnSet::new();
        let a = set.push(Column::from_area(area(0, 0, 10, 10), true));
        let b = set.push(Column::from_area(area(20, 0, 10, 10), true));
        let c = set.push(Column::from_area(area(40, 0, 10, 10), true));
        set.get_mut(a).next = Some(b);
        set.get_mut(b).next = Some(c);
        set.get_mut(c).previous = Some(b);

        let kept = ColumnSet::compose(&[(&set, &[b, c])]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.get(ColumnId(0)).next, Some(ColumnId(1)));
        assert_eq!(kept.get(ColumnId(1)).previous, Some(ColumnId(0)));

        let dropped = set.retain(|col| col.x() != 20);
        assert_eq!(dropped.len(), 2);
        assert_eq!(dropped.get(ColumnId(0)).next, None);
    }
}
