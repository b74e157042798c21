//! Picks the character images handed to recognition.

use crate::image::filters::crop_border;
use crate::image::geom::{Point, Rect};
use crate::image::pixel_grid::PixelGrid;
use crate::segment::area::Area;
use crate::segment::column::{ColumnId, ColumnSet};
use crate::utils::error::Result;

/// Binary crop of one character.
#[derive(Debug, Clone)]
pub struct SubImage {
    pub image: PixelGrid,
    /// Location in the target image.
    pub rect: Rect,
    /// Column the character was taken from, if it came from segmentation.
    pub column: Option<ColumnId>,
    /// Orientation of that column.
    pub vertical: Option<bool>,
}

/// The non-punctuation area nearest to `point`. `None` if no area midpoint
/// is within the area's larger dimension.
pub fn area_near(columns: &ColumnSet, point: Point) -> Option<(ColumnId, usize)> {
    let mut best: Option<((ColumnId, usize), i32, &Area)> = None;
    for (id, col) in columns.iter() {
        for (i, area) in col.areas().iter().enumerate() {
            if area.punctuation {
                continue;
            }
            let distance = area.midpoint().distance(&point) as i32;
            if best.is_none_or(|(_, d, _)| distance < d) {
                best = Some(((id, i), distance, area));
            }
        }
    }
    let (found, distance, area) = best?;
    (distance <= area.max_dim()).then_some(found)
}

/// Up to `max_characters` characters starting from the one nearest to
/// `point`, following the reading order into linked columns.
pub fn sub_images_at(
    binary: &PixelGrid,
    columns: &ColumnSet,
    point: Point,
    max_characters: usize,
) -> Result<Vec<SubImage>> {
    let Some((first_column, first_area)) = area_near(columns, point) else {
        return Ok(Vec::new());
    };

    let mut selected: Vec<(ColumnId, &Area)> = Vec::new();
    'chain: for id in columns.chain(first_column) {
        let skip = if id == first_column { first_area } else { 0 };
        for area in columns.get(id).areas().iter().skip(skip) {
            if selected.len() == max_characters {
                break 'chain;
            }
            if !area.punctuation {
                selected.push((id, area));
            }
        }
    }

    selected
        .into_iter()
        .map(|(id, area)| {
            Ok(SubImage {
                image: binary.crop(&area.rect)?,
                rect: area.rect,
                column: Some(id),
                vertical: Some(columns.get(id).is_vertical()),
            })
        })
        .collect()
}

/// Crops caller-supplied character rectangles, shrinking empty margins.
pub fn sub_images_in(binary: &PixelGrid, rects: &[Rect]) -> Result<Vec<SubImage>> {
    rects
        .iter()
        .map(|rect| {
            let rect = crop_border(binary, rect);
            Ok(SubImage {
                image: binary.crop(&rect)?,
                rect,
                column: None,
                vertical: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::column::Column;

    fn column(rects: &[Rect]) -> Column {
        let mut col = Column::from_area(Area::new(rects[0], 100), true);
        for r in &rects[1..] {
            col = col.merge(&Column::from_area(Area::new(*r, 100), true));
        }
        col
    }

    fn linked_columns() -> ColumnSet {
        let mut columns = ColumnSet::new();
        let right = columns.push(column(&[Rect::new(60, 10, 20, 20), Rect::new(60, 40, 20, 20)]));
        let left = columns.push(column(&[Rect::new(30, 10, 20, 20), Rect::new(30, 40, 20, 20)]));
        columns.get_mut(right).next = Some(left);
        columns.get_mut(left).previous = Some(right);
        columns
    }

    #[test]
    fn test_area_near() {
        let columns = linked_columns();
        assert_eq!(area_near(&columns, Point::new(70, 45)), Some((ColumnId(0), 1)));
        assert_eq!(area_near(&columns, Point::new(190, 190)), None);
    }

    #[test]
    fn test_follows_next_column() {
        let columns = linked_columns();
        let binary = PixelGrid::new(100, 100).unwrap();
        let images = sub_images_at(&binary, &columns, Point::new(70, 45), 4).unwrap();
        let rects: Vec<Rect> = images.iter().map(|s| s.rect).collect();
        assert_eq!(
            rects,
            vec![Rect::new(60, 40, 20, 20), Rect::new(30, 10, 20, 20), Rect::new(30, 40, 20, 20)]
        );
        assert_eq!(images[1].column, Some(ColumnId(1)));
        assert_eq!(images[0].vertical, Some(true));
    }

    #[test]
    fn test_stops_at_max_characters() {
        let columns = linked_columns();
        let binary = PixelGrid::new(100, 100).unwrap();
        let images = sub_images_at(&binary, &columns, Point::new(70, 20), 2).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].rect, Rect::new(60, 40, 20, 20));
    }

    #[test]
    fn test_column_loop_terminates() {
        let mut columns = linked_columns();
        columns.get_mut(ColumnId(1)).next = Some(ColumnId(0));
        let binary = PixelGrid::new(100, 100).unwrap();
        let images = sub_images_at(&binary, &columns, Point::new(70, 20), 10).unwrap();
        assert_eq!(images.len(), 4);
    }

    #[test]
    fn test_rectangles_are_tightened() {
        let binary = PixelGrid::from_fn(40, 40, |x, y| (10..20).contains(&x) && (12..18).contains(&y)).unwrap();
        let images = sub_images_in(&binary, &[Rect::new(5, 5, 20, 20)]).unwrap();
        assert_eq!(images[0].rect, Rect::new(10, 12, 10, 6));
        assert_eq!(images[0].image.count_ones(), 60);
        assert!(images[0].column.is_none());
    }
}
