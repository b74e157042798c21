//! Marks brackets, dots and commas inside columns.

use crate::image::geom::{Point, Rect};
use crate::segment::area::Area;
use crate::segment::column::{Column, ColumnSet};
use crate::segment::task::SegmentationTask;

const TEST_SQUARE_SIZE: f32 = 0.15;
const TEST_TRIANGLE_SIZE: f32 = 0.55;

pub fn find_punctuation(task: &SegmentationTask, columns: &mut ColumnSet) {
    let ids: Vec<_> = columns.ids().collect();
    for id in ids {
        let col = columns.get(id);
        let brackets: Vec<bool> = col.areas().iter().map(|a| is_bracket(task, a, col)).collect();
        let dots = dot_or_comma(col);
        for (i, area) in columns.get_mut(id).areas_mut().iter_mut().enumerate() {
            if brackets[i] || dots[i] {
                area.punctuation = true;
                area.changed = true;
            }
        }
    }
}

/// Which corners of the area's bounding box hold ink.
struct Corners {
    ne: bool,
    nw: bool,
    se: bool,
    sw: bool,
}

fn any_ink(task: &SegmentationTask, rect: &Rect) -> bool {
    (rect.y..=rect.max_y()).any(|y| (rect.x..=rect.max_x()).any(|x| task.pixel(x, y)))
}

fn is_bracket(task: &SegmentationTask, area: &Area, col: &Column) -> bool {
    if area.major_minor_ratio(col.is_vertical()) > 0.44 || area.min_dim() <= 2 {
        return false;
    }
    let size = (area.min_dim() as f32 * TEST_SQUARE_SIZE).ceil() as i32;
    let square = |x: i32, y: i32| any_ink(task, &Rect::new(x, y, size, size));
    let corners = Corners {
        ne: square(area.max_x() - size + 1, area.y()),
        nw: square(area.x(), area.y()),
        se: square(area.max_x() - size + 1, area.max_y() - size + 1),
        sw: square(area.x(), area.max_y() - size + 1),
    };
    if col.is_vertical() {
        is_horizontal_bracket(task, area, &corners)
    } else {
        is_vertical_bracket(task, area, &corners)
    }
}

/// Brackets lying across a vertical column (`︵` and `︶`): ink in both
/// corners of one side and an empty triangle pointing inward from it.
fn is_horizontal_bracket(task: &SegmentationTask, area: &Area, c: &Corners) -> bool {
    let tri_width = (area.width() as f32 * TEST_TRIANGLE_SIZE).floor() as i32;
    let tri_height = (area.height() as f32 * TEST_TRIANGLE_SIZE).floor() as i32;
    let min_x = area.x() + (area.width() - tri_width) / 2;
    let max_x = area.max_x() - (area.width() - tri_width) / 2;
    let mid = area.midpoint();
    if c.se && (c.ne || c.sw) {
        let t = [
            Point::new(mid.x, area.max_y() - tri_height),
            Point::new(max_x, area.max_y()),
            Point::new(min_x, area.max_y()),
        ];
        if !triangle_has_ink(task, area, &t) {
            return true;
        }
    }
    if c.nw && (c.sw || c.ne) {
        let t = [
            Point::new(mid.x, area.y() + tri_height),
            Point::new(min_x, area.y()),
            Point::new(max_x, area.y()),
        ];
        if !triangle_has_ink(task, area, &t) {
            return true;
        }
    }
    false
}

/// Brackets standing in a horizontal line (`(` and `)`).
fn is_vertical_bracket(task: &SegmentationTask, area: &Area, c: &Corners) -> bool {
    let tri_width = (area.width() as f32 * TEST_TRIANGLE_SIZE).floor() as i32;
    let tri_height = (area.height() as f32 * TEST_TRIANGLE_SIZE).floor() as i32;
    let min_y = area.y() + (area.height() - tri_height) / 2;
    let max_y = area.max_y() - (area.height() - tri_height) / 2;
    let mid = area.midpoint();
    if c.ne && (c.nw || c.se) {
        let t = [
            Point::new(area.max_x() - tri_width, mid.y),
            Point::new(area.max_x(), min_y),
            Point::new(area.max_x(), max_y),
        ];
        if !triangle_has_ink(task, area, &t) {
            return true;
        }
    }
    if c.sw && (c.se || c.nw) {
        let t = [
            Point::new(area.x() + tri_width, mid.y),
            Point::new(area.x(), max_y),
            Point::new(area.x(), min_y),
        ];
        if !triangle_has_ink(task, area, &t) {
            return true;
        }
    }
    false
}

fn triangle_has_ink(task: &SegmentationTask, area: &Area, t: &[Point; 3]) -> bool {
    for x in area.x()..=area.max_x() {
        for y in area.y()..=area.max_y() {
            if inside_triangle(Point::new(x, y), t) && task.pixel(x, y) {
                return true;
            }
        }
    }
    false
}

fn inside_triangle(p: Point, t: &[Point; 3]) -> bool {
    let sign = |p1: Point, p2: Point, p3: Point| {
        (p1.x - p3.x) as i64 * (p2.y - p3.y) as i64 - (p2.x - p3.x) as i64 * (p1.y - p3.y) as i64
    };
    let d1 = sign(p, t[0], t[1]);
    let d2 = sign(p, t[1], t[2]);
    let d3 = sign(p, t[2], t[0]);
    let has_neg = d1 < 0 || d2 < 0 || d3 < 0;
    let has_pos = d1 > 0 || d2 > 0 || d3 > 0;
    !(has_neg && has_pos)
}

/// Small trailing areas close to the previous character and near the
/// column's trailing edge (`、` and `。`).
fn dot_or_comma(col: &Column) -> Vec<bool> {
    let areas = col.areas();
    let mut marks = vec![false; areas.len()];
    for i in 1..areas.len() {
        let prev = &areas[i - 1];
        let area = &areas[i];
        let next = areas.get(i + 1);
        let (size, location, distance) = if col.is_vertical() {
            (
                area.max_dim() as f32 <= (0.35 * col.width() as f32).ceil(),
                ((col.max_x() - area.max_x()) as f32) < col.width() as f32 * 0.25,
                next.is_none_or(|n| area.y() - prev.max_y() < n.y() - area.max_y()),
            )
        } else {
            (
                area.max_dim() as f32 <= (0.35 * col.height() as f32).ceil(),
                ((col.max_y() - area.max_y()) as f32) < col.height() as f32 * 0.25,
                next.is_none_or(|n| area.x() - prev.max_x() < n.x() - area.max_x()),
            )
        };
        marks[i] = size && location && distance;
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::image_formats::{Pixel, Pixmap};
    use crate::image::pixel_grid::PixelGrid;
    use crate::utils::config::Config;

    fn task_from(binary: PixelGrid) -> SegmentationTask {
        let image = Pixmap::from_pixel(binary.width() as u32, binary.height() as u32, Pixel::black());
        SegmentationTask::new(image, binary, &Config::default()).unwrap()
    }

    #[test]
    fn test_trailing_dot_in_vertical_column() {
        let glyph = Area::new(Rect::new(10, 10, 20, 20), 400);
        let dot = Area::new(Rect::new(24, 33, 5, 5), 25);
        let col = Column::from_area(glyph, true).merge(&Column::from_area(dot, true));
        assert_eq!(dot_or_comma(&col), vec![false, true]);
    }

    #[test]
    fn test_centered_small_area_is_not_a_dot() {
        let glyph = Area::new(Rect::new(10, 10, 20, 20), 400);
        let small = Area::new(Rect::new(17, 33, 5, 5), 25);
        let col = Column::from_area(glyph, true).merge(&Column::from_area(small, true));
        assert_eq!(dot_or_comma(&col), vec![false, false]);
    }

    #[test]
    fn test_bracket_across_vertical_column() {
        // "︶"-like arc: two legs joined by a bottom bar
        let binary = PixelGrid::from_fn(60, 40, |x, y| {
            let legs = (x == 10 || x == 11 || x == 38 || x == 39) && (10..18).contains(&y);
            let bar = (10..40).contains(&x) && (18..20).contains(&y);
            legs || bar
        })
        .unwrap();
        let task = task_from(binary);
        let area = Area::new(Rect::new(10, 10, 30, 10), 92);
        let col = Column::from_area(area.clone(), true);
        assert!(is_bracket(&task, &area, &col));

        let solid = PixelGrid::from_fn(60, 40, |x, y| (10..40).contains(&x) && (10..20).contains(&y))
            .unwrap();
        let task = task_from(solid);
        assert!(!is_bracket(&task, &area, &col));
    }
}
