//! Chooses between the vertical and horizontal column hypotheses.
//!
//! Columns of both orientations that overlap each other form a group. Each
//! group is scored once per orientation and only the better orientation's
//! columns are kept, so different regions of one image may be read in
//! different directions.

use std::collections::HashSet;

use log::trace;

use crate::image::geom::Rect;
use crate::segment::area::Area;
use crate::segment::column::{Column, ColumnId, ColumnSet};
use crate::segment::spatial_index::{Keyed, SpatialIndex};
use crate::segment::task::SegmentationTask;
use crate::utils::config::{Config, OrientationTarget};
use crate::utils::math::scale;

/// A column in one of the two hypotheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ColumnRef {
    vertical: bool,
    id: ColumnId,
}

/// Combines the hypotheses into the final column set and drops columns
/// thinner than the configured minimum.
pub fn resolve_orientation(
    task: &SegmentationTask,
    config: &Config,
    vertical: ColumnSet,
    horizontal: ColumnSet,
) -> ColumnSet {
    let min_thickness = config.segmentation.min_column_thickness;
    let combined = match config.orientation {
        OrientationTarget::Vertical => vertical,
        OrientationTarget::Horizontal => horizontal,
        OrientationTarget::Automatic => {
            let mut resolver = Resolver::new(task, config, vertical, horizontal);
            resolver.run()
        }
    };
    combined.retain(|col| col.min_dim() > min_thickness)
}

struct Resolver {
    sets: [ColumnSet; 2],
    index: SpatialIndex<Keyed<ColumnRef>>,
    /// Furigana areas of each orientation as (rect, pixels), indexed by
    /// position.
    furigana: [Vec<(Rect, usize)>; 2],
    furigana_index: [SpatialIndex<Keyed<usize>>; 2],
    visited: HashSet<ColumnRef>,
    rgb_max_delta: i32,
}

/// Slot of an orientation in the per-orientation arrays.
fn slot(vertical: bool) -> usize {
    if vertical { 0 } else { 1 }
}

impl Resolver {
    fn new(task: &SegmentationTask, config: &Config, vertical: ColumnSet, horizontal: ColumnSet) -> Self {
        let bounds = task.binary.bounds();
        let sets = [vertical, horizontal];
        let mut index = SpatialIndex::new(bounds);
        let mut furigana = [Vec::new(), Vec::new()];
        let mut furigana_index = [SpatialIndex::new(bounds), SpatialIndex::new(bounds)];
        for (s, set) in sets.iter().enumerate() {
            for (id, col) in set.iter() {
                index.insert(Keyed::new(ColumnRef { vertical: s == 0, id }, col.rect()));
                if !col.furigana {
                    continue;
                }
                for area in col.areas() {
                    furigana_index[s].insert(Keyed::new(furigana[s].len(), area.rect));
                    furigana[s].push((area.rect, area.pixels));
                }
            }
        }
        Self {
            sets,
            index,
            furigana,
            furigana_index,
            visited: HashSet::new(),
            rgb_max_delta: config.segmentation.rgb_max_delta,
        }
    }

    fn column(&self, r: ColumnRef) -> &Column {
        self.sets[slot(r.vertical)].get(r.id)
    }

    fn run(&mut self) -> ColumnSet {
        let mut all: Vec<ColumnRef> = Vec::new();
        for (s, set) in self.sets.iter().enumerate() {
            all.extend(set.ids().map(|id| ColumnRef { vertical: s == 0, id }));
        }
        // large columns first so that small fragments join their groups
        all.sort_by_key(|&r| std::cmp::Reverse(self.column(r).size()));

        let mut selected: [Vec<ColumnId>; 2] = [Vec::new(), Vec::new()];
        for r in all {
            if self.visited.contains(&r) {
                continue;
            }
            let (vertical_group, horizontal_group) = self.collect_group(r);
            let vertical_score = self.group_score(&vertical_group, true);
            let horizontal_score = self.group_score(&horizontal_group, false);
            let use_vertical = match (vertical_score, horizontal_score) {
                (Some(v), Some(h)) => v <= h,
                (None, Some(_)) => false,
                _ => true,
            };
            trace!(
                "group of {} vertical and {} horizontal columns, scores {:?} / {:?}",
                vertical_group.len(),
                horizontal_group.len(),
                vertical_score,
                horizontal_score
            );
            if use_vertical {
                selected[0].extend(vertical_group);
            } else {
                selected[1].extend(horizontal_group);
            }
        }

        ColumnSet::compose(&[(&self.sets[0], &selected[0]), (&self.sets[1], &selected[1])])
    }

    /// Flood fill over columns that overlap each other in either orientation.
    fn collect_group(&mut self, start: ColumnRef) -> (Vec<ColumnId>, Vec<ColumnId>) {
        let start_rgb = self.column(start).min_rgb() as i32;
        let mut vertical = Vec::new();
        let mut horizontal = Vec::new();
        let mut todo = vec![start];
        while let Some(next) = todo.pop() {
            if !self.visited.insert(next) {
                continue;
            }
            if next.vertical {
                vertical.push(next.id);
            } else {
                horizontal.push(next.id);
            }

            let col = self.column(next);
            let mut candidates = self.index.query_except(&col.rect(), &Keyed::new(next, col.rect()));
            for &furigana in &col.furigana_columns {
                let rect = self.sets[slot(next.vertical)].get(furigana).rect();
                candidates.extend(self.index.query(&rect));
            }

            for candidate in candidates {
                let other = self.column(candidate.key);
                // columns of a different color belong to the background
                if (start_rgb - other.min_rgb() as i32).abs() > self.rgb_max_delta {
                    continue;
                }
                let common = if col.rect().intersects(&other.rect()) {
                    col.rect().intersection(&other.rect()).area()
                } else {
                    0
                };
                let reference = |c: &Column| ((c.minor_dim() as f64).powi(2) / 4.0).ceil() as i64;
                if common >= reference(col) || common >= reference(other) {
                    todo.push(candidate.key);
                }
            }
        }
        (vertical, horizontal)
    }

    /// Combined score of one orientation's columns in a group, lower is
    /// better. `None` if the group has no columns or no measurable areas.
    fn group_score(&mut self, ids: &[ColumnId], vertical: bool) -> Option<f32> {
        if ids.is_empty() {
            return None;
        }
        let distance = self.area_distance_score(ids, vertical);
        let connected = self.connected_score(ids, vertical);
        let null_columns = self.null_columns_score(ids, vertical);
        Some(distance? * connected? * null_columns)
    }

    /// Weighted average spacing between consecutive characters.
    fn area_distance_score(&mut self, ids: &[ColumnId], vertical: bool) -> Option<f32> {
        let mut distance_sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for &id in ids {
            let distance = self.area_distance(self.sets[slot(vertical)].get(id));
            let col = self.sets[slot(vertical)].get_mut(id);
            col.area_distance = distance;
            let Some(distance) = distance else {
                continue;
            };
            let mut weight = (col.area_size_sum() as f32).sqrt();
            if col.areas().len() == 2 {
                weight *= col.avg_area_ratio().powi(2);
            }
            distance_sum += distance * weight;
            weight_sum += weight;
        }
        (weight_sum > 0.0).then(|| distance_sum / weight_sum)
    }

    /// Mean distance between midpoints of consecutive, plausible characters.
    fn area_distance(&self, col: &Column) -> Option<f32> {
        let vertical = col.is_vertical();
        let minor = col.minor_dim() as f32;
        let mut areas: Vec<&Area> = col.areas().iter().filter(|a| !self.is_furigana(a, vertical)).collect();
        areas.sort_by_key(|a| if vertical { a.y() } else { a.x() });

        let mut distance_sum = 0.0f32;
        let mut pairs = 0;
        for pair in areas.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.punctuation || next.punctuation || prev.splitted || next.splitted {
                continue;
            }
            // small square areas, like か read in the wrong orientation
            let smaller = if prev.size() < next.size() { prev } else { next };
            if smaller.size() as f32 / (minor * minor) <= 0.3 && smaller.ratio() >= 0.5 {
                continue;
            }
            // two thin areas, like い read in the wrong orientation
            if (prev.major_minor_ratio(vertical) + next.major_minor_ratio(vertical)) / 2.0 <= 0.7 {
                continue;
            }
            if prev.major_dim(vertical).max(next.major_dim(vertical)) as f32 > minor * 1.5 {
                continue;
            }
            let distance = if vertical {
                next.midpoint().y - prev.midpoint().y
            } else {
                next.midpoint().x - prev.midpoint().x
            } as f32;
            if distance > minor * 2.0 {
                continue;
            }
            distance_sum += distance;
            pairs += 1;
        }
        (pairs > 0).then(|| distance_sum / pairs as f32)
    }

    /// True if the area is exactly covered by furigana of the other
    /// orientation.
    fn is_furigana(&self, area: &Area, vertical: bool) -> bool {
        let other = slot(!vertical);
        let pixels: usize = self.furigana_index[other]
            .query(&area.rect)
            .iter()
            .map(|e| self.furigana[other][e.key].1)
            .sum();
        pixels == area.pixels
    }

    /// Penalty for columns without a measurable character spacing.
    fn null_columns_score(&self, ids: &[ColumnId], vertical: bool) -> f32 {
        let mut null_weight = 0.0f32;
        let mut total_weight = 0.0f32;
        for &id in ids {
            let col = self.sets[slot(vertical)].get(id);
            let weight = (col.area_size_sum() as f32).sqrt();
            if col.area_distance.is_none() {
                null_weight += weight;
            }
            total_weight += weight;
        }
        let ratio = if total_weight > 0.0 { null_weight / total_weight } else { 1.0 };
        if ratio < 0.5 {
            scale(ratio, 0.0, 0.5, 1.0, 1.1)
        } else {
            scale(ratio, 0.5, 1.0, 1.1, 10.0)
        }
    }

    /// Score of the best reading-order chain. Long chains of square
    /// characters suggest the right orientation.
    fn connected_score(&self, ids: &[ColumnId], vertical: bool) -> Option<f32> {
        let set = &self.sets[slot(vertical)];
        let group: HashSet<ColumnId> = ids.iter().copied().collect();
        let mut best: Option<f32> = None;
        for &id in ids {
            if set.get(id).previous.is_some_and(|p| group.contains(&p)) {
                continue;
            }
            let mut ratio_sum: Option<f32> = None;
            for link in set.chain(id) {
                for area in set.get(link).areas().iter().filter(|a| !a.punctuation) {
                    *ratio_sum.get_or_insert(0.0) += area.ratio();
                }
            }
            if let Some(sum) = ratio_sum {
                let score = 1.0 / sum.powf(0.2);
                if best.is_none_or(|b| score < b) {
                    best = Some(score);
                }
            }
        }
        best
    }
}
