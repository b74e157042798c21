//! Region growing: merges areas into reading-direction columns.
//!
//! Every area starts as its own column. Columns are then grown in rounds,
//! three along the reading direction with a growing probe and one across it.
//! Within a round, thin and small columns are processed first. A merge is
//! kept only if the merged column scores at least as well as the weighted
//! average of its parts and does not run through background ink.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use log::{debug, trace};

use crate::image::geom::Rect;
use crate::segment::area::Area;
use crate::segment::column::{Column, ColumnEntry, ColumnId, ColumnSet};
use crate::segment::spatial_index::{Keyed, SpatialIndex};
use crate::segment::task::SegmentationTask;
use crate::utils::config::SegmentationConfig;
use crate::utils::math::scale;

/// Fraction of a target that must lie inside the largest column for the
/// merge to be accepted without scoring.
const CONTAINED_RATIO: f32 = 0.65;
/// Minimum weighted ink ratio at both column ends.
const COLUMN_END_RATIO: f32 = 0.05;

/// Groups `areas` into columns of the given orientation.
pub fn find_columns(
    task: &SegmentationTask,
    config: &SegmentationConfig,
    areas: &[Area],
    vertical: bool,
) -> ColumnSet {
    if areas.is_empty() {
        return ColumnSet::new();
    }
    let mut builder = ColumnBuilder::new(task, config, vertical);
    for area in areas {
        builder.add(Column::from_area(area.clone(), vertical));
    }
    for iteration in 1..=3 {
        builder.merge_round(true, iteration);
    }
    builder.merge_round(false, 1);
    let columns = builder.finish();
    debug!(
        "{} columns from {} areas ({})",
        columns.len(),
        areas.len(),
        if vertical { "vertical" } else { "horizontal" }
    );
    columns
}

struct ColumnBuilder<'a> {
    task: &'a SegmentationTask,
    config: &'a SegmentationConfig,
    vertical: bool,
    columns: ColumnSet,
    removed: Vec<bool>,
    index: SpatialIndex<ColumnEntry>,
}

impl<'a> ColumnBuilder<'a> {
    fn new(task: &'a SegmentationTask, config: &'a SegmentationConfig, vertical: bool) -> Self {
        ColumnBuilder {
            task,
            config,
            vertical,
            columns: ColumnSet::new(),
            removed: Vec::new(),
            index: SpatialIndex::new(task.binary.bounds()),
        }
    }

    fn add(&mut self, column: Column) -> ColumnId {
        let id = self.columns.push(column);
        self.removed.push(false);
        self.index.insert(self.columns.entry(id));
        id
    }

    fn col(&self, id: ColumnId) -> &Column {
        self.columns.get(id)
    }

    fn retire(&mut self, id: ColumnId) {
        self.index.remove(&self.columns.entry(id));
        self.removed[id.0] = true;
    }

    fn priority(&self, id: ColumnId) -> Reverse<(i64, ColumnId)> {
        let col = self.col(id);
        Reverse((col.minor_dim() as i64 * col.size() as i64, id))
    }

    fn finish(self) -> ColumnSet {
        let live: Vec<ColumnId> = self.index.all().into_iter().map(|e| e.key).collect();
        ColumnSet::compose(&[(&self.columns, &live)])
    }

    fn merge_round(&mut self, expand_length: bool, iteration: i32) {
        let mut todo: BinaryHeap<_> = self
            .index
            .all()
            .into_iter()
            .map(|e| self.priority(e.key))
            .collect();

        while let Some(Reverse((_, id))) = todo.pop() {
            if self.removed[id.0] {
                continue;
            }
            let probe = self.probe(self.col(id), expand_length, iteration);
            let mut targets: Vec<ColumnId> = self
                .index
                .query_except(&probe, &self.columns.entry(id))
                .into_iter()
                .map(|e| e.key)
                .collect();

            let mut largest = id;
            for &target in &targets {
                if self.col(target).minor_dim() > self.col(largest).minor_dim() {
                    largest = target;
                }
            }

            let max_delta = self.config.rgb_max_delta as f32;
            if self.col(id).avg_rgb() - self.col(largest).avg_rgb() > max_delta {
                trace!("  skip rgb");
                continue;
            }
            let rejected = self.filter_targets_by_rgb(&mut targets, largest);
            if targets.is_empty() {
                continue;
            }

            let mut merged = self.col(id).clone();
            for &target in &targets {
                merged = merged.merge(self.col(target));
            }

            if !expand_length && self.has_new_targets(&merged, id, &targets, &rejected) {
                continue;
            }

            if self.check_merge(&mut merged, id, &targets, largest) {
                trace!("merged {} with {} targets", self.col(id), targets.len());
                for &target in &targets {
                    self.retire(target);
                }
                self.retire(id);
                let new_id = self.add(merged);
                todo.push(self.priority(new_id));
            }
        }
    }

    /// Drops targets much lighter than the largest column, except those
    /// inside it and dakuten-like marks next to it. Returns the dropped ones.
    fn filter_targets_by_rgb(&self, targets: &mut Vec<ColumnId>, largest: ColumnId) -> Vec<ColumnId> {
        let largest = self.col(largest);
        let reference = largest.avg_rgb();
        let max_delta = self.config.rgb_max_delta as f32;
        let mut rejected = Vec::new();
        targets.retain(|&id| {
            let target = self.col(id);
            if largest.contains_column(target) {
                return true;
            }
            let dakuten = target.areas().len() == 1
                && target.ratio() >= 0.6
                && target.max_y() >= largest.y() - largest.width() / 4
                && target.max_y() < largest.max_y()
                && target.midpoint().x > largest.midpoint().x
                && target.pixel_area_ratio() >= 0.5
                && largest.horizontal_intersect_ratio(target) >= 0.7;
            if dakuten {
                return true;
            }
            if target.avg_rgb() - reference > max_delta {
                rejected.push(id);
                return false;
            }
            true
        });
        rejected
    }

    /// Sideways growth may only absorb the probed neighbours.
    fn has_new_targets(
        &self,
        merged: &Column,
        original: ColumnId,
        targets: &[ColumnId],
        rejected: &[ColumnId],
    ) -> bool {
        let known: HashSet<ColumnId> = std::iter::once(original)
            .chain(targets.iter().copied())
            .chain(rejected.iter().copied())
            .collect();
        self.index
            .query(&merged.rect())
            .iter()
            .any(|e| !known.contains(&e.key))
    }

    fn probe(&self, col: &Column, expand_length: bool, iteration: i32) -> Rect {
        let (w, h) = (col.width(), col.height());
        if expand_length {
            let extra = (w.min(h) as f32 * 0.5 * iteration as f32).ceil() as i32;
            if col.is_vertical() {
                Rect::new(col.x(), col.y() - extra, w, h + extra * 2)
            } else {
                Rect::new(col.x() - extra, col.y(), w + extra * 2, h)
            }
        } else {
            let extra = w.min(h);
            if col.is_vertical() {
                Rect::new(col.x() - extra, col.y(), w + extra * 2, h)
            } else {
                Rect::new(col.x(), col.y() - extra, w, h + extra * 2)
            }
        }
    }

    fn check_merge(
        &self,
        merged: &mut Column,
        original: ColumnId,
        targets: &[ColumnId],
        largest: ColumnId,
    ) -> bool {
        merged.score = self.score(merged);
        let parts: Vec<&Column> = targets
            .iter()
            .chain(std::iter::once(&original))
            .map(|&id| self.col(id))
            .collect();

        let largest = self.col(largest);
        if parts.iter().all(|p| largest.intersect_ratio(p) >= CONTAINED_RATIO) {
            return true;
        }

        // wide expansion of a long column is usually a jump into furigana
        let minor_expansion = merged.minor_dim() as f32 / largest.minor_dim() as f32;
        let max_penalty = scale(self.col(original).areas().len() as f32, 2.0, 4.0, 1.0, 0.8);
        merged.score *= scale(minor_expansion, 1.15, 1.4, 1.0, max_penalty);

        let lowest = parts.iter().map(|p| p.score).fold(f32::INFINITY, f32::min);
        let threshold = self.config.pixel_rgb_threshold as f32;
        let mut score_sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for part in &parts {
            let mut weight = (part.size() as f32).powf(0.58);
            if part.score == lowest {
                weight *= 1.25;
            }
            weight *= scale(part.min_rgb() as f32, 0.0, threshold, 1.0, 0.5);
            score_sum += part.score * weight;
            weight_sum += weight;
        }
        let old_score = score_sum / weight_sum;

        merged.score >= old_score && self.check_background(merged) && self.check_column_ends(merged)
    }

    fn check_background(&self, col: &Column) -> bool {
        let border = self.task.count_pixels(&col.rect(), true, false);
        if border >= 2 {
            let inside = self.task.count_pixels(&col.rect(), true, true);
            if inside >= col.minor_dim().max(0) as usize {
                return false;
            }
        }
        true
    }

    fn check_column_ends(&self, col: &Column) -> bool {
        let length = col.minor_dim();
        let (first, second) = if col.is_vertical() {
            (
                Rect::new(col.x(), col.y(), col.width(), length),
                Rect::new(col.x(), col.max_y() - length, col.width(), length),
            )
        } else {
            (
                Rect::new(col.x(), col.y(), length, col.height()),
                Rect::new(col.max_x() - length, col.y(), length, col.height()),
            )
        };
        self.check_column_end(col, &first) && self.check_column_end(col, &second)
    }

    fn check_column_end(&self, col: &Column, probe: &Rect) -> bool {
        let mut pixels = 0.0f32;
        for area in col.areas() {
            if !probe.intersects(&area.rect) {
                continue;
            }
            let common = probe.intersection(&area.rect).area() as f32;
            let ratio = common / area.size() as f32;
            // thin lines along the column are fine
            let shape = scale(area.major_minor_ratio(self.vertical), 0.5, 1.5, 0.5, 1.5);
            pixels += area.pixels as f32 * ratio * shape;
        }
        pixels / probe.area() as f32 >= COLUMN_END_RATIO
    }

    /// Square root of the summed area scores.
    fn score(&self, col: &Column) -> f32 {
        let mut sum = 0.0f32;
        for area in col.areas() {
            let size = score_size(area, col);
            sum += size * score_shape(area) * score_location(area, col, size) * score_rgb(area, col);
        }
        sum.sqrt()
    }
}

fn score_size(area: &Area, col: &Column) -> f32 {
    let ratio = (area.max_dim() as f32 / (col.minor_dim() as f32 * 0.9)).min(1.0);
    ratio * ratio
}

fn score_shape(area: &Area) -> f32 {
    scale(area.ratio(), 0.0, 0.9, 0.0, 1.0).powf(1.2)
}

fn score_location(area: &Area, col: &Column, size_score: f32) -> f32 {
    let (first, second) = if col.is_vertical() {
        (area.x() - col.x(), col.max_x() - area.max_x())
    } else {
        (area.y() - col.y(), col.max_y() - area.max_y())
    };
    let diff = (first - second).abs() as f32 / col.minor_dim() as f32;
    let diff = scale(diff, 0.1, 1.0, 0.0, 1.0);
    let exponent = scale(size_score, 0.2, 0.8, 6.0, 3.0);
    (1.0 - diff).powf(exponent)
}

fn score_rgb(area: &Area, col: &Column) -> f32 {
    let delta = area.min_rgb as f32 - col.min_rgb() as f32;
    scale(delta, 50.0, 100.0, 1.0, 0.4)
}

/// Index entry helper for other column passes.
pub(crate) fn column_index(task: &SegmentationTask, columns: &ColumnSet) -> SpatialIndex<ColumnEntry> {
    SpatialIndex::with_values(task.binary.bounds(), columns.entries())
}

/// Index over individual areas tagged with their column.
pub(crate) fn area_index(
    task: &SegmentationTask,
    columns: &ColumnSet,
) -> SpatialIndex<Keyed<(ColumnId, usize)>> {
    let mut index = SpatialIndex::new(task.binary.bounds());
    for (id, col) in columns.iter() {
        for (i, area) in col.areas().iter().enumerate() {
            index.insert(Keyed::new((id, i), area.rect));
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::image_formats::{Pixel, Pixmap};
    use crate::image::pixel_grid::PixelGrid;
    use crate::segment::find_areas::find_areas;
    use crate::utils::config::Config;

    fn columns_for(binary: PixelGrid, vertical: bool) -> ColumnSet {
        let image = Pixmap::from_pixel(binary.width() as u32, binary.height() as u32, Pixel::black());
        let config = Config::default();
        let mut task = SegmentationTask::new(image, binary, &config).unwrap();
        let areas = find_areas(&mut task, &config.segmentation).unwrap();
        find_columns(&task, &config.segmentation, &areas, vertical)
    }

    fn two_squares() -> PixelGrid {
        PixelGrid::from_fn(60, 80, |x, y| {
            (10..25).contains(&x) && ((10..25).contains(&y) || (40..55).contains(&y))
        })
        .unwrap()
    }

    #[test]
    fn test_vertical_squares_form_one_column() {
        let columns = columns_for(two_squares(), true);
        assert_eq!(columns.len(), 1);
        let col = columns.get(ColumnId(0));
        assert_eq!(col.rect(), Rect::new(10, 10, 15, 45));
        assert_eq!(col.areas().len(), 2);
        assert!(col.areas()[0].y() < col.areas()[1].y());
    }

    #[test]
    fn test_horizontal_hypothesis_keeps_squares_apart() {
        let columns = columns_for(two_squares(), false);
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_score_of_regular_column() {
        let mut a = Area::new(Rect::new(10, 10, 15, 15), 225);
        a.min_rgb = 0;
        let col = Column::from_area(a.clone(), true)
            .merge(&Column::from_area(Area::new(Rect::new(10, 40, 15, 15), 225), true));
        let size = score_size(&col.areas()[0], &col);
        assert_eq!(size, 1.0);
        assert_eq!(score_shape(&a), 1.0);
        assert_eq!(score_location(&a, &col, size), 1.0);
    }
}
