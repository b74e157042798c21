//! Links columns that continue each other, for example text flowing around
//! a picture or a line wrapped by a speech bubble.

use log::trace;

use crate::image::geom::{Point, Rect};
use crate::segment::column::{Column, ColumnId, ColumnSet};
use crate::segment::find_columns::column_index;
use crate::segment::task::SegmentationTask;

const PROBE_SIZE: f32 = 1.75;
const MAX_THICKNESS_DIFF: f32 = 0.75;

pub fn find_connections(task: &SegmentationTask, columns: &mut ColumnSet) {
    let index = column_index(task, columns);
    let ids: Vec<_> = columns.ids().collect();
    for id in ids {
        let col = columns.get(id);
        if col.furigana {
            continue;
        }
        let probe = probe_for(col);
        let end = end_point(col);

        // the nearest column whose start falls into the probe
        let mut best: Option<(ColumnId, i64)> = None;
        for entry in index.query(&probe) {
            let other = entry.key;
            let candidate = columns.get(other);
            let start = start_point(candidate);
            if other == id || candidate.furigana || !probe.contains(start.x, start.y) {
                continue;
            }
            let distance = squared_distance(start, end);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((other, distance));
            }
        }
        let Some((next, _)) = best else {
            continue;
        };
        if columns.get(next).previous.is_some() || !can_connect(task, columns, id, next) {
            continue;
        }

        trace!("connected {} to {}", columns.get(id), columns.get(next));
        columns.get_mut(id).next = Some(next);
        columns.get_mut(next).previous = Some(id);
    }
}

/// Region where the following column may begin: left of the top of a
/// vertical column, below the left edge of a horizontal one.
fn probe_for(col: &Column) -> Rect {
    if col.is_vertical() {
        let size = (col.width() as f32 * PROBE_SIZE).ceil() as i32;
        Rect::new(col.x() - size - 1, col.y() - size / 2, size, size)
    } else {
        let size = (col.height() as f32 * PROBE_SIZE).ceil() as i32;
        Rect::new(col.x() - size / 2, col.max_y() + 1, size, size)
    }
}

/// Where reading of a column begins.
fn start_point(col: &Column) -> Point {
    if col.is_vertical() {
        Point::new(col.max_x(), col.y())
    } else {
        Point::new(col.x(), col.y())
    }
}

/// The corner of a column next to where the following column starts.
fn end_point(col: &Column) -> Point {
    if col.is_vertical() {
        Point::new(col.x(), col.y())
    } else {
        Point::new(col.x(), col.max_y())
    }
}

fn squared_distance(a: Point, b: Point) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

fn can_connect(task: &SegmentationTask, columns: &ColumnSet, id: ColumnId, next: ColumnId) -> bool {
    let col = columns.get(id);
    let target = columns.get(next);
    let end = end_point(col);
    let start = start_point(target);

    // nothing from the background may separate the two columns
    let gap = Rect::spanning(end, start);
    if task.count_pixels(&gap, true, true) >= 2 {
        return false;
    }
    let middle = Rect::spanning(col.midpoint(), end);
    if task.count_pixels(&middle, true, true) >= 2 {
        return false;
    }

    let thickness = col.minor_dim().min(target.minor_dim()) as f32
        / col.minor_dim().max(target.minor_dim()) as f32;
    if thickness < MAX_THICKNESS_DIFF {
        return false;
    }

    // no third column in between
    !columns
        .iter()
        .any(|(other, c)| other != id && other != next && c.rect().intersects(&gap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::image_formats::{Pixel, Pixmap};
    use crate::image::pixel_grid::PixelGrid;
    use crate::segment::area::Area;
    use crate::utils::config::Config;

    fn task(width: u32, height: u32, background: impl Fn(usize, usize) -> bool) -> SegmentationTask {
        let image = Pixmap::from_pixel(width, height, Pixel::white());
        let mut task =
            SegmentationTask::new(image, PixelGrid::new(width as usize, height as usize).unwrap(), &Config::default())
                .unwrap();
        task.background = PixelGrid::from_fn(width as usize, height as usize, background).unwrap();
        task
    }

    fn vertical(x: i32, y: i32, height: i32) -> Column {
        Column::from_area(Area::new(Rect::new(x, y, 20, height), 200), true)
    }

    #[test]
    fn test_next_column_to_the_left() {
        let task = task(200, 200, |_, _| false);
        let mut columns = ColumnSet::new();
        let right = columns.push(vertical(100, 20, 120));
        let left = columns.push(vertical(75, 25, 100));
        find_connections(&task, &mut columns);

        assert_eq!(columns.get(right).next, Some(left));
        assert_eq!(columns.get(left).previous, Some(right));
        assert_eq!(columns.get(left).next, None);
        assert_eq!(columns.chain(right), vec![right, left]);
    }

    #[test]
    fn test_background_blocks_connection() {
        // a frame line between the two columns
        let task = task(200, 200, |x, _| x == 97 || x == 98);
        let mut columns = ColumnSet::new();
        let right = columns.push(vertical(100, 20, 120));
        columns.push(vertical(75, 25, 100));
        find_connections(&task, &mut columns);
        assert_eq!(columns.get(right).next, None);
    }

    #[test]
    fn test_thin_column_is_not_connected() {
        let task = task(200, 200, |_, _| false);
        let mut columns = ColumnSet::new();
        let right = columns.push(vertical(100, 20, 120));
        columns.push(Column::from_area(Area::new(Rect::new(85, 25, 10, 100), 100), true));
        find_connections(&task, &mut columns);
        assert_eq!(columns.get(right).next, None);
    }
}
