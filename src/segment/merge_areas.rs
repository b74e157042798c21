//! Merges character fragments inside columns.
//!
//! Consecutive non-punctuation areas are grouped into chunks. Every way of
//! joining neighbours inside a chunk is scored against the expected
//! character size; the best combination replaces the chunk.

use log::trace;

use crate::segment::area::Area;
use crate::segment::column::{Column, ColumnSet};

/// Merged areas may be at most this many column thicknesses long.
const MAX_AREA_SIZE: f32 = 1.5;
/// Combinations are enumerated exhaustively, so chunks stay small.
const MAX_CHUNK_SIZE: usize = 10;

pub fn merge_areas(columns: &mut ColumnSet) {
    let ids: Vec<_> = columns.ids().collect();
    for id in ids {
        merge_column(columns.get_mut(id));
    }
}

struct Sizes {
    target: i32,
    max: i32,
    vertical: bool,
}

fn merge_column(col: &mut Column) {
    let scale = size_scale(col);
    let sizes = Sizes {
        target: (col.minor_dim() as f32 * scale).ceil() as i32,
        max: (col.minor_dim() as f32 * MAX_AREA_SIZE * scale).ceil() as i32,
        vertical: col.is_vertical(),
    };

    let areas = col.areas_mut();
    let mut chunk_start = 0;
    let mut chunk_len = 0;
    let mut i = 0;
    while i < areas.len() {
        let punctuation = areas[i].punctuation;
        let last_in_col = i == areas.len() - 1;
        let mut last_in_chunk = punctuation || last_in_col;
        if !punctuation {
            if chunk_len == 0 {
                chunk_start = i;
            }
            chunk_len += 1;
            if chunk_len == MAX_CHUNK_SIZE {
                last_in_chunk = true;
            } else if !last_in_col {
                let test = areas[i].merge(&areas[i + 1]);
                if test.major_dim(sizes.vertical) > sizes.max {
                    last_in_chunk = true;
                }
            }
        }
        if last_in_chunk && chunk_len > 0 {
            let chunk: Vec<Area> = areas[chunk_start..chunk_start + chunk_len].to_vec();
            let merged = best_merge(&chunk, &sizes);
            let merged_len = merged.len();
            areas.splice(chunk_start..chunk_start + chunk_len, merged);
            let restart = !punctuation && !last_in_col && chunk_len > 1;
            i = chunk_start + merged_len - 1;
            chunk_len = 0;
            if restart {
                // the last area of the chunk starts the next chunk
                continue;
            }
        }
        i += 1;
    }
}

/// Horizontal text set in compressed fonts has characters narrower than the
/// line height. Long lines estimate the ratio from the 75th percentile width.
fn size_scale(col: &Column) -> f32 {
    if col.is_vertical() || col.areas().len() < 15 {
        return 1.0;
    }
    let mut widths: Vec<i32> = col.areas().iter().map(Area::width).collect();
    widths.sort_unstable();
    let n = widths.len();
    let lo = ((n as f32 * 0.75).floor() as usize).min(n - 1);
    let hi = ((n as f32 * 0.75).ceil() as usize).min(n - 1);
    let width = (widths[lo] + widths[hi]) / 2;
    let scale = width as f32 / col.height() as f32;
    if scale > 0.8 {
        1.0
    } else {
        scale.max(0.6)
    }
}

fn best_merge(areas: &[Area], sizes: &Sizes) -> Vec<Area> {
    if areas.len() == 1 {
        return areas.to_vec();
    }
    // bit i set: area i is joined with area i + 1
    let combinations = 1u32 << (areas.len() - 1);
    let mut best_score = 0.0f32;
    let mut best = areas.to_vec();
    for combination in 0..combinations {
        let Some(merged) = apply_combination(areas, combination, sizes) else {
            continue;
        };
        let score = merge_score(&merged, sizes);
        if score > best_score {
            best_score = score;
            best = merged.into_iter().map(|(area, _)| area).collect();
        }
    }
    if best.len() != areas.len() {
        trace!("merged {} fragments into {} areas", areas.len(), best.len());
    }
    best
}

/// Joins areas as selected by `combination`. Each result carries the
/// largest gap that was bridged to build it. `None` if a merged area would
/// be too long.
fn apply_combination(areas: &[Area], combination: u32, sizes: &Sizes) -> Option<Vec<(Area, i32)>> {
    let mut merged = Vec::new();
    let mut current: Option<(Area, i32)> = None;
    for (i, area) in areas.iter().enumerate() {
        let next = match current.take() {
            Some((prev, gap)) => {
                let distance = if sizes.vertical {
                    area.y() - prev.max_y()
                } else {
                    area.x() - prev.max_x()
                };
                let joined = prev.merge(area);
                if joined.major_dim(sizes.vertical) > sizes.max {
                    return None;
                }
                (joined, gap.max(distance))
            }
            None => (area.clone(), 0),
        };
        if combination & (1 << i) != 0 {
            current = Some(next);
        } else {
            merged.push(next);
        }
    }
    if let Some(last) = current {
        merged.push(last);
    }
    Some(merged)
}

fn merge_score(areas: &[(Area, i32)], sizes: &Sizes) -> f32 {
    let mut sum = 0.0f32;
    for (area, gap) in areas {
        let size = area.major_dim(sizes.vertical);
        let mut score = if size <= sizes.target {
            size as f32 / sizes.target as f32
        } else {
            let ratio = 1.0 - (size - sizes.target) as f32 / (sizes.max - sizes.target).max(1) as f32;
            ratio.max(0.0).powf(1.5)
        };
        let distance = (*gap).min(sizes.max);
        score *= 1.0 - distance as f32 / sizes.max as f32;
        sum += score;
    }
    sum / areas.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::geom::Rect;
    use crate::segment::column::ColumnId;

    fn area(x: i32, y: i32, w: i32, h: i32) -> Area {
        Area::new(Rect::new(x, y, w, h), (w * h / 2) as usize)
    }

    fn column(areas: Vec<Area>) -> ColumnSet {
        let mut iter = areas.into_iter();
        let mut col = Column::from_area(iter.next().unwrap(), true);
        for a in iter {
            col = col.merge(&Column::from_area(a, true));
        }
        let mut set = ColumnSet::new();
        set.push(col);
        set
    }

    #[test]
    fn test_fragments_are_joined() {
        // 20 px wide column: a character split into two halves, then a whole one
        let mut set = column(vec![
            area(10, 10, 20, 9),
            area(10, 21, 20, 9),
            area(10, 40, 20, 20),
        ]);
        merge_areas(&mut set);
        let areas = set.get(ColumnId(0)).areas();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].rect, Rect::new(10, 10, 20, 20));
        assert_eq!(areas[1].rect, Rect::new(10, 40, 20, 20));
    }

    #[test]
    fn test_full_characters_are_kept() {
        let mut set = column(vec![area(10, 10, 20, 20), area(10, 34, 20, 20)]);
        merge_areas(&mut set);
        assert_eq!(set.get(ColumnId(0)).areas().len(), 2);
    }

    #[test]
    fn test_punctuation_breaks_chunks() {
        let mut set = column(vec![area(10, 10, 20, 9), area(10, 21, 20, 9)]);
        set.get_mut(ColumnId(0)).areas_mut()[1].punctuation = true;
        merge_areas(&mut set);
        assert_eq!(set.get(ColumnId(0)).areas().len(), 2);
    }
}
