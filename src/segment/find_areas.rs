//! Connected component extraction and noise rejection.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::image::geom::Rect;
use crate::image::pixel_grid::PixelGrid;
use crate::segment::area::Area;
use crate::segment::spatial_index::{Keyed, SpatialIndex};
use crate::segment::task::SegmentationTask;
use crate::utils::config::SegmentationConfig;
use crate::utils::error::Result;
use crate::utils::math::scale;

/// Areas with at most this many pixels skip the neighbour histogram test.
const DITHER_MIN_PIXELS: usize = 15;
/// Components this small and square count toward the dither density probe.
const DITHER_SMALL_PIXELS: usize = 6;
const DITHER_SMALL_RATIO: f32 = 0.6;

/// Finds candidate glyph areas in `task.binary`.
///
/// All ink starts as background. Components rejected during extraction
/// (touching a border, oversized, sparse, speech bubbles) stay in it; every
/// other component is removed from it, including those dropped afterwards
/// as dither or as too small, so that noise does not block column growth.
pub fn find_areas(task: &mut SegmentationTask, config: &SegmentationConfig) -> Result<Vec<Area>> {
    let (width, height) = (task.width(), task.height());
    let mut background = task.binary.clone();
    let mut visited: Vec<bool> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| !task.pixel(x, y))
        .collect();

    let mut areas = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if visited[(y * width + x) as usize] {
                continue;
            }
            let pixels = flood(task, &mut visited, x, y);
            if let Some(area) = accept_component(task, config, &pixels) {
                for &(px, py) in &pixels {
                    background.set(px, py, false);
                }
                trace!("area:{} rgb:{}", area, area.min_rgb);
                areas.push(area);
            }
        }
    }
    task.background = background;

    let found = areas.len();
    remove_dither_by_neighbours(&task.binary, config, &mut areas);
    remove_dither_clusters(&task.binary, config, &mut areas);
    areas.retain(|a| a.pixels >= config.min_area_pixels.max(0) as usize);
    debug!("found {} areas, {} after noise rejection", found, areas.len());
    Ok(areas)
}

/// 8-connected flood fill from `(x, y)`.
fn flood(task: &SegmentationTask, visited: &mut [bool], x: i32, y: i32) -> Vec<(i32, i32)> {
    let (width, height) = (task.width(), task.height());
    let mut pixels = Vec::new();
    let mut todo = VecDeque::from([(x, y)]);
    while let Some((px, py)) = todo.pop_front() {
        let i = (py * width + px) as usize;
        if visited[i] {
            continue;
        }
        visited[i] = true;
        if !task.pixel(px, py) {
            continue;
        }
        pixels.push((px, py));
        for ny in py - 1..=py + 1 {
            for nx in px - 1..=px + 1 {
                if nx < 0 || nx >= width || ny < 0 || ny >= height {
                    continue;
                }
                if !visited[(ny * width + nx) as usize] {
                    todo.push_back((nx, ny));
                }
            }
        }
    }
    pixels
}

fn accept_component(
    task: &SegmentationTask,
    config: &SegmentationConfig,
    pixels: &[(i32, i32)],
) -> Option<Area> {
    let (width, height) = (task.width(), task.height());
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for &(x, y) in pixels {
        if x <= 0 || x >= width - 1 || y <= 0 || y >= height - 1 || task.border_pixel(x, y) {
            return None;
        }
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    if pixels.is_empty() {
        return None;
    }
    let rect = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
    if rect.width > config.max_area_size || rect.height > config.max_area_size {
        return None;
    }
    let mut area = Area::new(rect, pixels.len());
    if area.size() > config.sparse_area_pixels && area.pixel_density() < config.min_sparse_density {
        return None;
    }
    if is_speech_bubble(&task.binary, config, &area) {
        return None;
    }
    area.min_rgb = pixels
        .iter()
        .map(|&(x, y)| task.pixel_rgb(x, y))
        .min()
        .unwrap_or(255);
    Some(area)
}

/// A large component whose ink lies mostly outside an inscribed ellipse is
/// a speech bubble outline.
fn is_speech_bubble(image: &PixelGrid, config: &SegmentationConfig, area: &Area) -> bool {
    if area.width() < config.bubble_min_size || area.height() < config.bubble_min_size {
        return false;
    }
    let a2 = (area.width() as f32 / 2.0 * config.bubble_ellipse_size).powi(2);
    let b2 = (area.height() as f32 / 2.0 * config.bubble_ellipse_size).powi(2);
    let center = area.midpoint();
    let mut outside = 0usize;
    for y in area.y()..=area.max_y() {
        for x in area.x()..=area.max_x() {
            let value = ((x - center.x) as f32).powi(2) / a2 + ((y - center.y) as f32).powi(2) / b2;
            if value > 1.0 && image.get(x, y) {
                outside += 1;
            }
        }
    }
    outside as f32 / area.pixels as f32 > config.bubble_outside_ratio
}

/// Removes areas dominated by pixels with few 4-neighbours. The threshold
/// tightens for lighter areas.
fn remove_dither_by_neighbours(image: &PixelGrid, config: &SegmentationConfig, areas: &mut Vec<Area>) {
    areas.retain(|area| {
        if area.pixels <= DITHER_MIN_PIXELS {
            return true;
        }
        let mut counts = [0usize; 5];
        for x in area.x()..=area.max_x() {
            for y in area.y()..=area.max_y() {
                if !image.get(x, y) {
                    continue;
                }
                let neighbours = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .iter()
                    .filter(|&&(nx, ny)| image.get(nx, ny))
                    .count();
                counts[neighbours] += 1;
            }
        }
        if counts[0] > area.pixels / 2 {
            return false;
        }
        let score = (counts[0] as f32 * 2.0 + counts[1] as f32) / area.pixels as f32;
        let rgb_quality = area.min_rgb as f32 / config.pixel_rgb_threshold as f32;
        let threshold = 1.3 * scale(rgb_quality, 0.5, 0.7, 1.0, 0.6);
        score < threshold
    });
}

/// Removes clusters of tiny square components found by sliding an
/// overlapping probe over the image.
fn remove_dither_clusters(image: &PixelGrid, config: &SegmentationConfig, areas: &mut Vec<Area>) {
    let index = SpatialIndex::with_values(
        image.bounds(),
        areas.iter().enumerate().map(|(i, a)| Keyed::new(i, a.rect)),
    );
    let step = (config.dither_tile_size - config.dither_tile_overlap).max(1);
    let mut remove = vec![false; areas.len()];
    let mut x = 0;
    while x < image.width() as i32 {
        let mut y = 0;
        while y < image.height() as i32 {
            let probe = Rect::new(x, y, config.dither_tile_size, config.dither_tile_size);
            let small: Vec<usize> = index
                .query(&probe)
                .into_iter()
                .map(|e| e.key)
                .filter(|&i| areas[i].pixels <= DITHER_SMALL_PIXELS && areas[i].ratio() > DITHER_SMALL_RATIO)
                .collect();
            if small.len() >= config.dither_cluster_count {
                for i in small {
                    remove[i] = true;
                }
            }
            y += step;
        }
        x += step;
    }
    let mut i = 0;
    areas.retain(|_| {
        let keep = !remove[i];
        i += 1;
        keep
    });
}
