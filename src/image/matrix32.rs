//! Bit-packed 32×32 matrices used by the bitmap matcher.
//!
//! Each row is one `u32`; pixel `x` of a row is stored in bit `31 - x`, so the
//! leftmost pixel is the most significant bit. All overlap counts used for
//! scoring reduce to `AND` + `count_ones` over the 32 rows.

use std::fmt;

use crate::image::geom::Rect;
use crate::image::pixel_grid::PixelGrid;
use crate::utils::error::{OcrError, Result};

/// Side length of every matrix.
pub const MATRIX_SIZE: i32 = 32;

/// Mask covering `width` pixels starting at column `x`.
#[inline]
fn span_mask(x: i32, width: i32) -> u32 {
    if width <= 0 || x >= MATRIX_SIZE {
        return 0;
    }
    let full = if width >= MATRIX_SIZE {
        u32::MAX
    } else {
        !(u32::MAX >> width)
    };
    full.checked_shr(x.max(0) as u32).unwrap_or(0)
}

/// Shifts a row right (towards larger x) by `dx` pixels; negative moves left.
#[inline]
fn shift_row(row: u32, dx: i32) -> u32 {
    if dx >= 0 {
        row.checked_shr(dx as u32).unwrap_or(0)
    } else {
        row.checked_shl((-dx) as u32).unwrap_or(0)
    }
}

/// A 32×32 bitmap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Matrix32 {
    rows: [u32; 32],
}

impl Matrix32 {
    // ── Construction ─────────────────────────────────────────────────────

    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: [u32; 32]) -> Self {
        Self { rows }
    }

    /// Packs a 32×32 pixel grid.
    pub fn from_grid(grid: &PixelGrid) -> Result<Self> {
        if grid.width() != 32 || grid.height() != 32 {
            return Err(OcrError::DimensionMismatch {
                expected: (32, 32),
                actual: (grid.width() as u32, grid.height() as u32),
            });
        }
        let mut matrix = Self::new();
        for y in 0..MATRIX_SIZE {
            for x in 0..MATRIX_SIZE {
                if grid.get(x, y) {
                    matrix.set(x, y);
                }
            }
        }
        Ok(matrix)
    }

    // ── Pixel access ─────────────────────────────────────────────────────

    pub fn rows(&self) -> &[u32; 32] {
        &self.rows
    }

    #[inline]
    pub fn row(&self, y: usize) -> u32 {
        self.rows[y]
    }

    /// True if the bit is set, false outside the matrix.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        if !(0..MATRIX_SIZE).contains(&x) || !(0..MATRIX_SIZE).contains(&y) {
            return false;
        }
        self.rows[y as usize] & (1u32 << (31 - x)) != 0
    }

    /// Sets a bit. Ignored outside the matrix.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32) {
        if !(0..MATRIX_SIZE).contains(&x) || !(0..MATRIX_SIZE).contains(&y) {
            return;
        }
        self.rows[y as usize] |= 1u32 << (31 - x);
    }

    /// Clears a bit. Ignored outside the matrix.
    #[inline]
    pub fn clear(&mut self, x: i32, y: i32) {
        if !(0..MATRIX_SIZE).contains(&x) || !(0..MATRIX_SIZE).contains(&y) {
            return;
        }
        self.rows[y as usize] &= !(1u32 << (31 - x));
    }

    // ── Counting ─────────────────────────────────────────────────────────

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.rows.iter().map(|r| r.count_ones()).sum()
    }

    /// Number of set bits inside `bounds`.
    pub fn count_in(&self, bounds: &Rect) -> u32 {
        let mut within = Matrix32::new();
        within.add_bits_within(self, bounds);
        within.count_ones()
    }

    /// Number of bits set in both matrices.
    #[inline]
    pub fn and_count(&self, other: &Matrix32) -> u32 {
        self.rows
            .iter()
            .zip(other.rows.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }

    // ── Bit operations ───────────────────────────────────────────────────

    /// Adds every bit of `other` into this matrix.
    pub fn or_assign(&mut self, other: &Matrix32) {
        for (a, b) in self.rows.iter_mut().zip(other.rows.iter()) {
            *a |= *b;
        }
    }

    /// Adds the bits of `source` that fall inside `bounds`.
    pub fn add_bits_within(&mut self, source: &Matrix32, bounds: &Rect) {
        let clipped = bounds.intersection(&Rect::new(0, 0, MATRIX_SIZE, MATRIX_SIZE));
        if clipped.is_empty() {
            return;
        }
        let mask = span_mask(clipped.x, clipped.width);
        for y in clipped.y..=clipped.max_y() {
            self.rows[y as usize] |= source.rows[y as usize] & mask;
        }
    }

    /// Returns a copy moved by `(dx, dy)`. Bits pushed outside are lost;
    /// positive values move right and down.
    pub fn shifted(&self, dx: i32, dy: i32) -> Matrix32 {
        let mut moved = Matrix32::new();
        for y in 0..MATRIX_SIZE {
            let new_y = y + dy;
            if !(0..MATRIX_SIZE).contains(&new_y) {
                continue;
            }
            moved.rows[new_y as usize] = shift_row(self.rows[y as usize], dx);
        }
        moved
    }

    /// Copies the bits of `source` inside `rect` into this matrix, moved by
    /// `(dx, dy)`. Existing bits are kept.
    pub fn copy_bits(&mut self, source: &Matrix32, rect: &Rect, dx: i32, dy: i32) {
        let clipped = rect.intersection(&Rect::new(0, 0, MATRIX_SIZE, MATRIX_SIZE));
        if clipped.is_empty() {
            return;
        }
        let mask = span_mask(clipped.x, clipped.width);
        for source_y in clipped.y..=clipped.max_y() {
            let target_y = source_y + dy;
            if !(0..MATRIX_SIZE).contains(&target_y) {
                continue;
            }
            self.rows[target_y as usize] |= shift_row(source.rows[source_y as usize] & mask, dx);
        }
    }

    /// Stretches the region `rect` by duplicating its middle column or row and
    /// returns the stretched bits together with their new bounds.
    ///
    /// Only one axis may be stretched at a time and the amount must be positive.
    pub fn stretched(&self, rect: &Rect, horizontal: i32, vertical: i32) -> Result<(Matrix32, Rect)> {
        if horizontal != 0 && vertical != 0 {
            return Err(OcrError::InvalidTransformation {
                horizontal_stretch: horizontal,
                vertical_stretch: vertical,
            });
        }
        if horizontal < 0 || vertical < 0 || (horizontal == 0 && vertical == 0) {
            return Err(OcrError::InvalidArg(format!(
                "stretch amount must be positive (got {}, {})",
                horizontal, vertical
            )));
        }
        let mut target = Matrix32::new();
        let limits = Rect::new(0, 0, MATRIX_SIZE, MATRIX_SIZE);
        if horizontal > 0 {
            let divider_x = rect.x + rect.width / 2;
            let right = Rect::new(divider_x, rect.y, rect.max_x() - divider_x + 1, rect.height);
            let left = Rect::new(rect.x, rect.y, divider_x - rect.x + 1, rect.height);
            let divider = Rect::new(divider_x, rect.y, 1, rect.height);
            let move_right = (horizontal + 1) / 2;
            let move_left = horizontal - move_right;

            target.copy_bits(self, &right, move_right, 0);
            target.copy_bits(self, &left, -move_left, 0);
            for dx in (-move_left + 1)..move_right {
                target.copy_bits(self, &divider, dx, 0);
            }
            let unbounded = Rect::new(rect.x - move_left, rect.y, rect.width + horizontal, rect.height);
            Ok((target, unbounded.intersection(&limits)))
        } else {
            let divider_y = rect.y + rect.height / 2;
            let bottom = Rect::new(rect.x, divider_y, rect.width, rect.max_y() - divider_y + 1);
            let top = Rect::new(rect.x, rect.y, rect.width, divider_y - rect.y + 1);
            let divider = Rect::new(rect.x, divider_y, rect.width, 1);
            let move_down = (vertical + 1) / 2;
            let move_up = vertical - move_down;

            target.copy_bits(self, &bottom, 0, move_down);
            target.copy_bits(self, &top, 0, -move_up);
            for dy in (-move_up + 1)..move_down {
                target.copy_bits(self, &divider, 0, dy);
            }
            let unbounded = Rect::new(rect.x, rect.y - move_up, rect.width, rect.height + vertical);
            Ok((target, unbounded.intersection(&limits)))
        }
    }

    /// Bounding rectangle of the set bits, `None` for an empty matrix.
    pub fn find_bounds(&self) -> Option<Rect> {
        let columns = self.rows.iter().fold(0u32, |acc, r| acc | r);
        if columns == 0 {
            return None;
        }
        let left = columns.leading_zeros() as i32;
        let right = 31 - columns.trailing_zeros() as i32;
        let top = self.rows.iter().position(|&r| r != 0)? as i32;
        let bottom = self.rows.iter().rposition(|&r| r != 0)? as i32;
        Some(Rect::new(left, top, right - left + 1, bottom - top + 1))
    }

    // ── Halo ─────────────────────────────────────────────────────────────

    /// One-pixel dilation ring: bits not set here that touch a set bit in
    /// any of the 8 directions.
    pub fn dilation_ring(&self) -> Matrix32 {
        let mut horizontal = [0u32; 32];
        for (h, &r) in horizontal.iter_mut().zip(self.rows.iter()) {
            *h = r | (r << 1) | (r >> 1);
        }
        let mut ring = Matrix32::new();
        for y in 0..32 {
            let mut dilated = horizontal[y];
            if y > 0 {
                dilated |= horizontal[y - 1];
            }
            if y < 31 {
                dilated |= horizontal[y + 1];
            }
            ring.rows[y] = dilated & !self.rows[y];
        }
        ring
    }

    /// Builds `layers` halo layers. Layer `i` holds the pixels first reached
    /// by the `i + 1`th dilation of this matrix.
    pub fn halo(&self, layers: usize) -> Vec<Matrix32> {
        let mut covered = *self;
        let mut halo = Vec::with_capacity(layers);
        for _ in 0..layers {
            let layer = covered.dilation_ring();
            covered.or_assign(&layer);
            halo.push(layer);
        }
        halo
    }
}

impl fmt::Debug for Matrix32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix32 [")?;
        for y in 0..MATRIX_SIZE {
            let line: String = (0..MATRIX_SIZE)
                .map(|x| if self.get(x, y) { 'x' } else { '.' })
                .collect();
            writeln!(f, "  {}", line)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, size: i32) -> Matrix32 {
        let mut m = Matrix32::new();
        for yy in y..y + size {
            for xx in x..x + size {
                m.set(xx, yy);
            }
        }
        m
    }

    #[test]
    fn test_bit_layout() {
        let mut m = Matrix32::new();
        m.set(0, 0);
        m.set(31, 1);
        assert_eq!(m.row(0), 0x8000_0000);
        assert_eq!(m.row(1), 1);
        assert!(m.get(0, 0));
        m.clear(0, 0);
        assert!(!m.get(0, 0));
        assert!(!m.get(-1, 40));
    }

    #[test]
    fn test_shifted() {
        let m = square(4, 4, 2);
        let moved = m.shifted(1, -2);
        assert_eq!(moved.find_bounds(), Some(Rect::new(5, 2, 2, 2)));
        assert_eq!(m.shifted(40, 0).count_ones(), 0);
    }

    #[test]
    fn test_and_count() {
        let a = square(0, 0, 4);
        let b = square(2, 2, 4);
        assert_eq!(a.and_count(&b), 4);
    }

    #[test]
    fn test_halo_rings() {
        let m = square(10, 10, 1);
        let halo = m.halo(2);
        assert_eq!(halo.len(), 2);
        assert_eq!(halo[0].count_ones(), 8);
        assert_eq!(halo[1].count_ones(), 16);
        assert_eq!(halo[0].and_count(&m), 0);
        assert_eq!(halo[0].and_count(&halo[1]), 0);
    }

    #[test]
    fn test_halo_clipped_at_edges() {
        let m = square(0, 0, 1);
        let halo = m.halo(1);
        assert_eq!(halo[0].count_ones(), 3);
    }

    #[test]
    fn test_copy_bits_masked() {
        let source = square(0, 0, 8);
        let mut target = Matrix32::new();
        target.copy_bits(&source, &Rect::new(2, 2, 2, 2), 3, 1);
        assert_eq!(target.find_bounds(), Some(Rect::new(5, 3, 2, 2)));
        assert_eq!(target.count_ones(), 4);
    }

    #[test]
    fn test_stretch_horizontal() {
        let source = square(10, 10, 4);
        let bounds = Rect::new(10, 10, 4, 4);
        let (stretched, new_bounds) = source.stretched(&bounds, 2, 0).unwrap();
        assert_eq!(new_bounds, Rect::new(9, 10, 6, 4));
        assert_eq!(stretched.find_bounds(), Some(new_bounds));
        assert_eq!(stretched.count_ones(), 24);
    }

    #[test]
    fn test_stretch_vertical() {
        let source = square(10, 10, 4);
        let bounds = Rect::new(10, 10, 4, 4);
        let (stretched, new_bounds) = source.stretched(&bounds, 0, 3).unwrap();
        assert_eq!(new_bounds, Rect::new(10, 9, 4, 7));
        assert_eq!(stretched.count_ones(), 28);
    }

    #[test]
    fn test_combined_stretch_rejected() {
        let source = square(10, 10, 4);
        let result = source.stretched(&Rect::new(10, 10, 4, 4), 1, 1);
        assert!(matches!(
            result,
            Err(OcrError::InvalidTransformation {
                horizontal_stretch: 1,
                vertical_stretch: 1
            })
        ));
    }

    #[test]
    fn test_count_in_bounds() {
        let m = square(0, 0, 10);
        assert_eq!(m.count_in(&Rect::new(5, 5, 10, 10)), 25);
    }
}
