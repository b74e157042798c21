//! Binary pixel grid used by the segmentation pipeline.
//!
//! `PixelGrid` stores one bit per pixel (true = ink) in a `BitVec` with
//! MSB-first ordering. Accessors taking signed coordinates treat everything
//! outside the grid as white, so probes near the image edges need no special
//! casing.

use bitvec::order::Msb0;
use bitvec::prelude::*;

use crate::image::geom::Rect;
use crate::utils::error::{OcrError, Result};

/// A width × height boolean matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    bits: BitVec<u8, Msb0>,
}

impl PixelGrid {
    /// Creates an all-white grid.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let total_bits = match width.checked_mul(height) {
            Some(bits) if bits < (isize::MAX as usize) => bits,
            _ => {
                return Err(OcrError::InvalidArg(format!(
                    "grid dimensions ({}x{}) are too large",
                    width, height
                )));
            }
        };
        let mut bits = BitVec::with_capacity(total_bits);
        bits.resize(total_bits, false);
        Ok(Self {
            width,
            height,
            bits,
        })
    }

    /// Creates a grid by evaluating `f` for each pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut grid = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    grid.bits.set(y * width + x, true);
                }
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Full grid as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Returns the pixel at `(x, y)`, false outside the grid.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        self.bits[y as usize * self.width + x as usize]
    }

    /// Sets the pixel at `(x, y)`. Writes outside the grid are ignored.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        self.bits.set(idx, value);
    }

    /// Inverts the pixel at `(x, y)`.
    pub fn flip(&mut self, x: i32, y: i32) {
        let value = self.get(x, y);
        self.set(x, y, !value);
    }

    /// Total number of ink pixels.
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    /// Counts ink pixels inside `rect`. With `inside == false` only the
    /// rectangle's outline is examined.
    pub fn count_in_rect(&self, rect: &Rect, inside: bool) -> usize {
        let mut pixels = 0;
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                let on_border =
                    y == rect.y || y == rect.max_y() || x == rect.x || x == rect.max_x();
                if (inside || on_border) && self.get(x, y) {
                    pixels += 1;
                }
            }
        }
        pixels
    }

    /// Counts ink pixels along row `y` between `min_x..=max_x`.
    pub fn count_row(&self, min_x: i32, max_x: i32, y: i32) -> usize {
        (min_x..=max_x).filter(|&x| self.get(x, y)).count()
    }

    /// Counts ink pixels along column `x` between `min_y..=max_y`.
    pub fn count_column(&self, x: i32, min_y: i32, max_y: i32) -> usize {
        (min_y..=max_y).filter(|&y| self.get(x, y)).count()
    }

    /// Copies the pixels under `rect` into a new grid. Pixels outside the
    /// source are white.
    pub fn crop(&self, rect: &Rect) -> Result<PixelGrid> {
        if rect.is_empty() {
            return Err(OcrError::InvalidArg(format!("cannot crop empty rect {:?}", rect)));
        }
        PixelGrid::from_fn(rect.width as usize, rect.height as usize, |x, y| {
            self.get(rect.x + x as i32, rect.y + y as i32)
        })
    }

    /// Tightest rectangle around all ink pixels, `None` for a blank grid.
    pub fn ink_bounds(&self) -> Option<Rect> {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for idx in self.bits.iter_ones() {
            let x = (idx % self.width) as i32;
            let y = (idx / self.width) as i32;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if min_x > max_x {
            None
        } else {
            Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = PixelGrid::new(10, 5).unwrap();
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.count_ones(), 0);
    }

    #[test]
    fn test_out_of_bounds_is_white() {
        let mut grid = PixelGrid::new(3, 3).unwrap();
        grid.set(-1, 0, true);
        grid.set(3, 3, true);
        assert!(!grid.get(-1, 0));
        assert_eq!(grid.count_ones(), 0);
    }

    #[test]
    fn test_count_in_rect_border_only() {
        let grid = PixelGrid::from_fn(5, 5, |_, _| true).unwrap();
        let rect = Rect::new(0, 0, 5, 5);
        assert_eq!(grid.count_in_rect(&rect, true), 25);
        assert_eq!(grid.count_in_rect(&rect, false), 16);
    }

    #[test]
    fn test_crop_and_bounds() {
        let grid = PixelGrid::from_fn(8, 8, |x, y| (2..5).contains(&x) && (3..6).contains(&y))
            .unwrap();
        assert_eq!(grid.ink_bounds(), Some(Rect::new(2, 3, 3, 3)));
        let cropped = grid.crop(&Rect::new(1, 2, 5, 5)).unwrap();
        assert_eq!(cropped.ink_bounds(), Some(Rect::new(1, 1, 3, 3)));
        assert_eq!(cropped.count_ones(), 9);
    }
}
