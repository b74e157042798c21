//! Splits areas that are too long for their column, typically two
//! characters touching each other.

use log::trace;

use crate::segment::area::Area;
use crate::segment::column::{Column, ColumnSet};
use crate::segment::task::SegmentationTask;
use crate::utils::config::SegmentationConfig;

const SCAN_FROM: f32 = 0.25;
const SCAN_TO: f32 = 0.75;
const MAX_PIXELS_PRCT: f32 = 0.14;
/// Areas smaller than this in both dimensions are never split.
const MIN_SPLIT_DIM: i32 = 10;

pub fn split_areas(task: &SegmentationTask, config: &SegmentationConfig, columns: &mut ColumnSet) {
    let ids: Vec<_> = columns.ids().collect();
    for id in ids {
        let col = columns.get_mut(id);
        let min_length = (col.min_dim() as f32 * config.split_min_length).ceil() as i32;
        let vertical = col.is_vertical();
        let mut i = 0;
        while i < col.areas().len() {
            let area = &col.areas()[i];
            if area.height() < MIN_SPLIT_DIM && area.width() < MIN_SPLIT_DIM {
                i += 1;
                continue;
            }
            if area.major_dim(vertical) > min_length {
                if let Some((first, second)) = split_area(task, area, col) {
                    trace!("split {} into {} and {}", area, first, second);
                    col.areas_mut().splice(i..=i, [first, second]);
                    // the first part may still be too long
                    continue;
                }
            }
            i += 1;
        }
    }
}

/// Finds the sparsest cut line within the central half of the area,
/// scanning outward from the center.
fn split_area(task: &SegmentationTask, area: &Area, col: &Column) -> Option<(Area, Area)> {
    let vertical = col.is_vertical();
    let (start, length, thickness, limit) = if vertical {
        (area.y(), area.height(), area.width(), task.height())
    } else {
        (area.x(), area.width(), area.height(), task.width())
    };
    let min = start + (length as f32 * SCAN_FROM).floor() as i32;
    let max = start + (length as f32 * SCAN_TO).ceil() as i32;
    if min <= 0 || max >= limit - 1 {
        return None;
    }
    let mut min_pixels = (thickness as f32 * MAX_PIXELS_PRCT).ceil() as usize;
    if vertical {
        min_pixels += 1;
    }
    let count = |at: i32| {
        if vertical {
            task.binary.count_row(area.x(), area.max_x(), at)
        } else {
            task.binary.count_column(at, area.y(), area.max_y())
        }
    };

    // visit lines center-out: c, c+1, c-1, c+2, c-2, ...
    let mut split_at = None;
    let mut delta = 0;
    let mut at = min + (max - min) / 2;
    while at >= min && at <= max {
        let pixels = count(at);
        if pixels < min_pixels {
            min_pixels = pixels;
            split_at = Some(at);
        }
        delta += 1;
        if delta == (max - min) / 4 {
            // lines further out must be clearly better than the center
            min_pixels = (min_pixels as f32 * 0.9).floor() as usize;
        }
        at = if delta % 2 == 0 { at + delta } else { at - delta };
    }

    let mut split_at = split_at?;
    // the cut line goes to the side it is more connected to
    let (mut before, mut after) = (0, 0);
    if vertical {
        for x in col.x()..=col.max_x() {
            if task.pixel(x, split_at) {
                before += task.pixel(x, split_at - 1) as i32;
                after += task.pixel(x, split_at + 1) as i32;
            }
        }
    } else {
        for y in col.y()..=col.max_y() {
            if task.pixel(split_at, y) {
                before += task.pixel(split_at - 1, y) as i32;
                after += task.pixel(split_at + 1, y) as i32;
            }
        }
    }
    if before > after {
        split_at += 1;
    }
    area.split(split_at, !vertical, &task.binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::geom::Rect;
    use crate::image::image_formats::{Pixel, Pixmap};
    use crate::image::pixel_grid::PixelGrid;
    use crate::utils::config::Config;

    #[test]
    fn test_split_touching_characters() {
        // two 20×20 blocks joined by a thin 2 px bridge in a 20 px wide column
        let binary = PixelGrid::from_fn(60, 80, |x, y| {
            let top = (10..30).contains(&x) && (10..30).contains(&y);
            let bottom = (10..30).contains(&x) && (32..52).contains(&y);
            let bridge = (19..21).contains(&x) && (30..32).contains(&y);
            top || bottom || bridge
        })
        .unwrap();
        let image = Pixmap::from_pixel(60, 80, Pixel::black());
        let config = Config::default();
        let task = SegmentationTask::new(image, binary.clone(), &config).unwrap();

        let area = Area::new(Rect::new(10, 10, 20, 42), binary.count_ones());
        let mut columns = ColumnSet::new();
        let id = columns.push(Column::from_area(area, true));
        split_areas(&task, &config.segmentation, &mut columns);

        let areas = columns.get(id).areas();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].rect.y, 10);
        assert_eq!(areas[1].rect.max_y(), 51);
        assert!(areas.iter().all(|a| a.splitted));
        assert!(areas[0].rect.height >= 20 && areas[0].rect.height <= 22);
    }
}
