//! Runs the segmentation steps in order.

use std::time::Instant;

use log::debug;

use crate::image::filters::{binarize, unsharp_mask};
use crate::image::image_formats::Pixmap;
use crate::observer::{Observer, notify};
use crate::segment::area::Area;
use crate::segment::column::ColumnSet;
use crate::segment::connections::find_connections;
use crate::segment::find_areas::find_areas;
use crate::segment::find_columns::find_columns;
use crate::segment::furigana::find_furigana;
use crate::segment::invert::invert_image;
use crate::segment::merge_areas::merge_areas;
use crate::segment::orientation::resolve_orientation;
use crate::segment::punctuation::find_punctuation;
use crate::segment::split_areas::split_areas;
use crate::segment::task::SegmentationTask;
use crate::utils::config::{Config, OrientationTarget};
use crate::utils::error::Result;

/// Outcome of segmenting one image.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub task: SegmentationTask,
    pub columns: ColumnSet,
}

/// Finds character areas and reading columns in `image`.
pub fn segment(image: &Pixmap, config: &Config, observer: Option<&dyn Observer>) -> Result<Segmentation> {
    let started = Instant::now();
    let seg = &config.segmentation;
    let fixed = config.fixed_black_level.as_ref();

    let binary = if fixed.is_some() {
        binarize(image, seg.pixel_rgb_threshold, fixed)?
    } else {
        let sharpened = unsharp_mask(image, seg.unsharp_amount, seg.unsharp_radius, seg.unsharp_threshold);
        binarize(&sharpened, seg.pixel_rgb_threshold, None)?
    };
    let mut task = SegmentationTask::new(image.clone(), binary, config)?;
    invert_image(&mut task, config);
    notify(observer, "binary", |o| o.on_binary_image(&task.binary));

    let areas = find_areas(&mut task, seg)?;
    debug!("found {} areas in {} ms", areas.len(), started.elapsed().as_millis());
    notify(observer, "areas", |o| o.on_areas(&areas));

    let wants = |target: OrientationTarget| config.orientation == OrientationTarget::Automatic || config.orientation == target;
    let vertical = if wants(OrientationTarget::Vertical) {
        columns_for(&task, config, &areas, true, observer)
    } else {
        ColumnSet::new()
    };
    let horizontal = if wants(OrientationTarget::Horizontal) {
        columns_for(&task, config, &areas, false, observer)
    } else {
        ColumnSet::new()
    };

    let columns = resolve_orientation(&task, config, vertical, horizontal);
    notify(observer, "combined", |o| o.on_columns("combined", None, &columns));
    debug!(
        "segmentation found {} columns in {} ms",
        columns.len(),
        started.elapsed().as_millis()
    );
    Ok(Segmentation { task, columns })
}

/// Builds the column hypothesis for one orientation.
fn columns_for(
    task: &SegmentationTask,
    config: &Config,
    areas: &[Area],
    vertical: bool,
    observer: Option<&dyn Observer>,
) -> ColumnSet {
    let started = Instant::now();
    let mut columns = find_columns(task, &config.segmentation, areas, vertical);
    notify(observer, "columns", |o| o.on_columns("columns", Some(vertical), &columns));

    find_punctuation(task, &mut columns);
    split_areas(task, &config.segmentation, &mut columns);
    merge_areas(&mut columns);
    find_furigana(task, &mut columns);
    find_connections(task, &mut columns);
    notify(observer, "connections", |o| o.on_columns("connections", Some(vertical), &columns));

    debug!(
        "{} columns: {} in {} ms",
        if vertical { "vertical" } else { "horizontal" },
        columns.len(),
        started.elapsed().as_millis()
    );
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::geom::Rect;
    use crate::image::image_formats::Pixel;

    fn image_with(rects: &[Rect]) -> Pixmap {
        Pixmap::from_fn(100, 100, |x, y| {
            let ink = rects.iter().any(|r| r.contains(x as i32, y as i32));
            if ink { Pixel::black() } else { Pixel::white() }
        })
    }

    #[test]
    fn test_single_square() {
        let image = image_with(&[Rect::new(40, 40, 20, 20)]);
        let result = segment(&image, &Config::default(), None).unwrap();
        let areas: Vec<Rect> = result.columns.areas().map(|a| a.rect).collect();
        assert_eq!(areas, vec![Rect::new(40, 40, 20, 20)]);
    }

    #[test]
    fn test_vertical_pair() {
        let image = image_with(&[Rect::new(10, 10, 15, 15), Rect::new(10, 40, 15, 15)]);
        let result = segment(&image, &Config::default(), None).unwrap();
        assert_eq!(result.columns.len(), 1);
        let col = &result.columns.columns()[0];
        assert!(col.is_vertical());
        assert_eq!(col.areas().len(), 2);
        assert!(col.areas()[0].y() < col.areas()[1].y());
    }

    #[test]
    fn test_blank_image() {
        let image = Pixmap::from_pixel(50, 50, Pixel::white());
        let result = segment(&image, &Config::default(), None).unwrap();
        assert!(result.columns.is_empty());
    }
}
