//! Detects furigana columns running alongside main text.

use log::trace;

use crate::image::geom::Rect;
use crate::segment::column::{ColumnId, ColumnSet};
use crate::segment::find_columns::column_index;
use crate::segment::task::SegmentationTask;

pub fn find_furigana(task: &SegmentationTask, columns: &mut ColumnSet) {
    let index = column_index(task, columns);
    let ids: Vec<_> = columns.ids().collect();
    for id in ids {
        let col = columns.get(id);
        // furigana sits right of vertical text and above horizontal text
        let probe = if col.is_vertical() {
            Rect::new(col.max_x() + 1, col.y(), col.width() / 2, col.height())
        } else {
            Rect::new(col.x(), col.y() - col.height() / 2 - 1, col.width(), col.height() / 2)
        };
        if task.count_pixels(&probe, true, false) >= 2 {
            continue;
        }

        let minor = col.minor_dim() as f32;
        let found: Vec<ColumnId> = index
            .query_except(&probe, &columns.entry(id))
            .into_iter()
            .map(|e| e.key)
            .filter(|&other| {
                let c2 = columns.get(other);
                (c2.minor_dim() as f32) < minor * 0.55
                    && (c2.minor_dim() as f32) > minor * 0.20
                    && (c2.major_dim() as f32) < col.major_dim() as f32 * 1.05
                    && c2.median_area_size() < col.median_area_size() * 0.5
            })
            .collect();

        for &furigana in &found {
            trace!("furigana {} for {}", columns.get(furigana), columns.get(id));
            let f = columns.get_mut(furigana);
            f.furigana = true;
            f.changed = true;
        }
        columns.get_mut(id).furigana_columns.extend(found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::image_formats::{Pixel, Pixmap};
    use crate::image::pixel_grid::PixelGrid;
    use crate::segment::area::Area;
    use crate::segment::column::Column;
    use crate::utils::config::Config;

    fn column(rects: &[Rect]) -> Column {
        let mut col = Column::from_area(Area::new(rects[0], 100), true);
        for r in &rects[1..] {
            col = col.merge(&Column::from_area(Area::new(*r, 100), true));
        }
        col
    }

    #[test]
    fn test_thin_column_right_of_text() {
        let image = Pixmap::from_pixel(100, 120, Pixel::white());
        let task = SegmentationTask::new(image, PixelGrid::new(100, 120).unwrap(), &Config::default())
            .unwrap();

        let mut columns = ColumnSet::new();
        let main = columns.push(column(&[
            Rect::new(20, 10, 20, 20),
            Rect::new(20, 35, 20, 20),
            Rect::new(20, 60, 20, 20),
        ]));
        let ruby = columns.push(column(&[Rect::new(42, 12, 7, 7), Rect::new(42, 22, 7, 7)]));
        find_furigana(&task, &mut columns);

        assert!(columns.get(ruby).furigana);
        assert!(!columns.get(main).furigana);
        assert_eq!(columns.get(main).furigana_columns, vec![ruby]);
    }
}
