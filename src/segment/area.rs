//! Candidate glyphs found by the segmenter.

use crate::image::geom::{Point, Rect};
use crate::image::pixel_grid::PixelGrid;
use crate::segment::spatial_index::Bounded;

/// A candidate character or character fragment.
///
/// `rect` is the tight bound of the area's ink. Areas are plain values: a
/// column owns the areas it contains, so the owning column is known from
/// where the area is stored rather than from a back-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub rect: Rect,
    /// Number of ink pixels inside the area.
    pub pixels: usize,
    /// Darkest channel value over the area's pixels (after inversion).
    pub min_rgb: u8,
    /// Bracket, dot or comma.
    pub punctuation: bool,
    /// Produced by cutting a larger area in two.
    pub splitted: bool,
    /// Modified by the most recent segmentation step.
    pub changed: bool,
    /// Rectangles of the connected components merged into this area.
    pub sources: Vec<Rect>,
}

impl Area {
    pub fn new(rect: Rect, pixels: usize) -> Self {
        Area {
            rect,
            pixels,
            min_rgb: 0,
            punctuation: false,
            splitted: false,
            changed: false,
            sources: vec![rect],
        }
    }

    pub fn x(&self) -> i32 {
        self.rect.x
    }

    pub fn y(&self) -> i32 {
        self.rect.y
    }

    pub fn width(&self) -> i32 {
        self.rect.width
    }

    pub fn height(&self) -> i32 {
        self.rect.height
    }

    pub fn max_x(&self) -> i32 {
        self.rect.max_x()
    }

    pub fn max_y(&self) -> i32 {
        self.rect.max_y()
    }

    /// Surface of the bounding rectangle.
    pub fn size(&self) -> i32 {
        self.rect.width * self.rect.height
    }

    pub fn midpoint(&self) -> Point {
        self.rect.midpoint()
    }

    /// `min(w/h, h/w)`: 1.0 for a square, close to 0.0 for a thin line.
    pub fn ratio(&self) -> f32 {
        let r1 = self.rect.width as f32 / self.rect.height as f32;
        let r2 = self.rect.height as f32 / self.rect.width as f32;
        r1.min(r2)
    }

    pub fn pixel_density(&self) -> f32 {
        self.pixels as f32 / self.size() as f32
    }

    pub fn min_dim(&self) -> i32 {
        self.rect.width.min(self.rect.height)
    }

    pub fn max_dim(&self) -> i32 {
        self.rect.width.max(self.rect.height)
    }

    /// Length along the reading direction.
    pub fn major_dim(&self, vertical: bool) -> i32 {
        if vertical { self.rect.height } else { self.rect.width }
    }

    /// Thickness across the reading direction.
    pub fn minor_dim(&self, vertical: bool) -> i32 {
        if vertical { self.rect.width } else { self.rect.height }
    }

    pub fn major_minor_ratio(&self, vertical: bool) -> f32 {
        self.major_dim(vertical) as f32 / self.minor_dim(vertical) as f32
    }

    /// Combines two areas into one covering both.
    pub fn merge(&self, other: &Area) -> Area {
        let mut sources = self.sources.clone();
        sources.extend_from_slice(&other.sources);
        Area {
            rect: self.rect.union(&other.rect),
            pixels: self.pixels + other.pixels,
            min_rgb: self.min_rgb.min(other.min_rgb),
            punctuation: false,
            splitted: false,
            changed: true,
            sources,
        }
    }

    /// Cuts the area at column `x` (first column of the right part) or row
    /// `y` (first row of the lower part). Each part is shrunk to the ink it
    /// actually holds; `None` if either part would be blank.
    pub fn split(&self, at: i32, vertical_cut: bool, grid: &PixelGrid) -> Option<(Area, Area)> {
        let (first, second) = if vertical_cut {
            (
                Rect::new(self.rect.x, self.rect.y, at - self.rect.x, self.rect.height),
                Rect::new(at, self.rect.y, self.rect.x + self.rect.width - at, self.rect.height),
            )
        } else {
            (
                Rect::new(self.rect.x, self.rect.y, self.rect.width, at - self.rect.y),
                Rect::new(self.rect.x, at, self.rect.width, self.rect.y + self.rect.height - at),
            )
        };
        let first = self.split_part(first, grid)?;
        let second = self.split_part(second, grid)?;
        Some((first, second))
    }

    fn split_part(&self, rect: Rect, grid: &PixelGrid) -> Option<Area> {
        if rect.is_empty() {
            return None;
        }
        let bounds = grid.crop(&rect).ok()?.ink_bounds()?;
        let tight = bounds.translate(rect.x, rect.y);
        Some(Area {
            rect: tight,
            pixels: grid.count_in_rect(&tight, true),
            min_rgb: self.min_rgb,
            punctuation: false,
            splitted: true,
            changed: true,
            sources: self.sources.clone(),
        })
    }
}

impl Bounded for Area {
    fn bounds(&self) -> Rect {
        self.rect
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{}:{}",
            self.rect.x, self.rect.y, self.rect.width, self.rect.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut a = Area::new(Rect::new(0, 0, 10, 10), 50);
        a.min_rgb = 40;
        let mut b = Area::new(Rect::new(0, 15, 10, 5), 20);
        b.min_rgb = 10;
        let merged = a.merge(&b);
        assert_eq!(merged.rect, Rect::new(0, 0, 10, 20));
        assert_eq!(merged.pixels, 70);
        assert_eq!(merged.min_rgb, 10);
        assert_eq!(merged.sources.len(), 2);
    }

    #[test]
    fn test_split_tightens_parts() {
        // two blocks separated by a blank row at y = 5
        let grid = PixelGrid::from_fn(10, 12, |x, y| (2..8).contains(&x) && y != 5 && y < 11)
            .unwrap();
        let area = Area::new(Rect::new(2, 0, 6, 11), grid.count_ones());
        let (up, down) = area.split(5, false, &grid).unwrap();
        assert_eq!(up.rect, Rect::new(2, 0, 6, 5));
        assert_eq!(down.rect, Rect::new(2, 6, 6, 5));
        assert!(up.splitted && down.splitted);
        assert_eq!(up.pixels + down.pixels, area.pixels);
    }

    #[test]
    fn test_dimensions() {
        let area = Area::new(Rect::new(0, 0, 4, 12), 10);
        assert_eq!(area.major_dim(true), 12);
        assert_eq!(area.minor_dim(true), 4);
        assert!((area.ratio() - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(area.to_string(), "0,0,4:12");
    }
}
