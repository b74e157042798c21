//! Raster preprocessing: unsharp mask, thresholding and glyph resizing.

use crate::image::geom::Rect;
use crate::image::image_formats::{Pixel, Pixmap};
use crate::image::pixel_grid::PixelGrid;
use crate::utils::config::{FixedBlackLevel, SegmentationConfig};
use crate::utils::error::{OcrError, Result};
use crate::utils::math::scale;

// ─── Unsharp mask ───────────────────────────────────────────────────────────

/// Normalized 1D gaussian kernel of `2 * radius + 1` taps, sigma = radius / 3.
fn gaussian_kernel(radius: usize) -> Vec<f32> {
    let radius = radius.max(1) as i32;
    let sigma = radius as f32 / 3.0;
    let two_sigma_square = 2.0 * sigma * sigma;
    let sigma_root = (two_sigma_square * std::f32::consts::PI).sqrt();
    let mut data: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / two_sigma_square).exp() / sigma_root)
        .collect();
    let total: f32 = data.iter().sum();
    for v in data.iter_mut() {
        *v /= total;
    }
    data
}

/// One separable blur pass along rows. Taps that fall outside the row reuse
/// the center pixel.
fn blur_rows(src: &[[f32; 3]], width: usize, height: usize, kernel: &[f32]) -> Vec<[f32; 3]> {
    let radius = (kernel.len() / 2) as i32;
    let mut dst = vec![[0.0f32; 3]; width * height];
    for y in 0..height {
        let offset = y * width;
        for x in 0..width {
            let mut acc = [0.0f32; 3];
            for i in -radius..=radius {
                let mut sx = x as i32 + i;
                if sx < 0 || sx >= width as i32 {
                    sx = x as i32;
                }
                let p = src[offset + sx as usize];
                let factor = kernel[(radius + i) as usize];
                for c in 0..3 {
                    acc[c] += factor * p[c];
                }
            }
            dst[offset + x] = acc;
        }
    }
    dst
}

fn transpose(src: &[[f32; 3]], width: usize, height: usize) -> Vec<[f32; 3]> {
    let mut dst = vec![[0.0f32; 3]; width * height];
    for y in 0..height {
        for x in 0..width {
            dst[x * height + y] = src[y * width + x];
        }
    }
    dst
}

/// Sharpens `image` by adding back `amount` times the difference to its
/// gaussian blur. Channels that differ from the blur by less than
/// `threshold` are left untouched.
pub fn unsharp_mask(image: &Pixmap, amount: f32, radius: usize, threshold: i32) -> Pixmap {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width == 0 || height == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(radius);
    let src: Vec<[f32; 3]> = image
        .pixels()
        .iter()
        .map(|p| [p.r as f32, p.g as f32, p.b as f32])
        .collect();

    let horizontal = blur_rows(&src, width, height, &kernel);
    let transposed = transpose(&horizontal, width, height);
    let vertical = blur_rows(&transposed, height, width, &kernel);
    let blurred = transpose(&vertical, height, width);

    let amount = amount * 1.6;
    let sharpen = |orig: u8, blur: f32| -> u8 {
        let blur = (blur + 0.5).min(255.0) as i32;
        let orig = orig as i32;
        if (orig - blur).abs() >= threshold {
            (amount * (orig - blur) as f32 + orig as f32).clamp(0.0, 255.0) as u8
        } else {
            orig as u8
        }
    };

    Pixmap::from_fn(image.width(), image.height(), |x, y| {
        let idx = y as usize * width + x as usize;
        let p = image.pixels()[idx];
        let b = blurred[idx];
        Pixel::new(sharpen(p.r, b[0]), sharpen(p.g, b[1]), sharpen(p.b, b[2]))
    })
}

// ─── Thresholding ───────────────────────────────────────────────────────────

/// Decides whether a pixel is ink. With a fixed black level every channel
/// must be within range of the level; otherwise two of the three channels
/// must be darker than `threshold`.
pub fn is_ink(pixel: Pixel, threshold: u8, fixed: Option<&FixedBlackLevel>) -> bool {
    if let Some(level) = fixed {
        let within = |value: u8, target: u8| {
            let (value, target, range) = (value as i32, target as i32, level.range as i32);
            value >= target - range && value <= target + range
        };
        return within(pixel.r, level.red) && within(pixel.g, level.green) && within(pixel.b, level.blue);
    }
    let red = pixel.r < threshold;
    let green = pixel.g < threshold;
    let blue = pixel.b < threshold;
    (red && green) || (green && blue) || (red && blue)
}

/// Converts an RGB image to a binary grid.
pub fn binarize(image: &Pixmap, threshold: u8, fixed: Option<&FixedBlackLevel>) -> Result<PixelGrid> {
    let width = image.width() as usize;
    let pixels = image.pixels();
    PixelGrid::from_fn(width, image.height() as usize, |x, y| {
        is_ink(pixels[y * width + x], threshold, fixed)
    })
}

// ─── Glyph resizing ─────────────────────────────────────────────────────────

/// Area-averaged ink coverage of each destination pixel, in `0.0..=1.0`.
fn resample_coverage(grid: &PixelGrid, width: usize, height: usize) -> Vec<f32> {
    let sx = grid.width() as f32 / width as f32;
    let sy = grid.height() as f32 / height as f32;
    let mut coverage = vec![0.0f32; width * height];
    for dy in 0..height {
        let y0 = dy as f32 * sy;
        let y1 = y0 + sy;
        for dx in 0..width {
            let x0 = dx as f32 * sx;
            let x1 = x0 + sx;
            let mut ink = 0.0f32;
            let mut y = y0.floor() as i32;
            while (y as f32) < y1 {
                let wy = (y1.min(y as f32 + 1.0) - y0.max(y as f32)).max(0.0);
                let mut x = x0.floor() as i32;
                while (x as f32) < x1 {
                    let wx = (x1.min(x as f32 + 1.0) - x0.max(x as f32)).max(0.0);
                    if grid.get(x, y) {
                        ink += wx * wy;
                    }
                    x += 1;
                }
                y += 1;
            }
            coverage[dy * width + dx] = ink / (sx * sy);
        }
    }
    coverage
}

/// Resizes a binary grid to a `width` × `height` gray image without keeping
/// proportions. Ink is black, partly covered pixels get intermediate levels.
pub fn resize_gray(grid: &PixelGrid, width: usize, height: usize) -> Result<Pixmap> {
    if grid.width() == 0 || grid.height() == 0 || width == 0 || height == 0 {
        return Err(OcrError::InvalidArg(format!(
            "cannot resize {}x{} to {}x{}",
            grid.width(),
            grid.height(),
            width,
            height
        )));
    }
    let coverage = resample_coverage(grid, width, height);
    Ok(Pixmap::from_fn(width as u32, height as u32, |x, y| {
        let gray = (255.0 * (1.0 - coverage[y as usize * width + x as usize])).round() as u8;
        Pixel::new(gray, gray, gray)
    }))
}

/// Resizes a binary grid to `width` × `height` without keeping proportions.
/// Resampled pixels are ink if their gray level is below `threshold`.
pub fn resize_binary(grid: &PixelGrid, width: usize, height: usize, threshold: u8) -> Result<PixelGrid> {
    binarize(&resize_gray(grid, width, height)?, threshold, None)
}

/// Resizes a binary grid like [`resize_binary`], sharpening the gray image
/// before thresholding so thin strokes survive shrinking.
pub fn resize_sharpened(
    grid: &PixelGrid,
    width: usize,
    height: usize,
    config: &SegmentationConfig,
) -> Result<PixelGrid> {
    let gray = resize_gray(grid, width, height)?;
    let sharpened = unsharp_mask(&gray, config.unsharp_amount, config.unsharp_radius, config.unsharp_threshold);
    binarize(&sharpened, config.pixel_rgb_threshold, None)
}

/// Places `grid` in the center of a `size` × `size` white square. Pixels that
/// do not fit are cut.
pub fn center_on_square(grid: &PixelGrid, size: usize) -> Result<PixelGrid> {
    let delta_x = (size as i32 - grid.width() as i32) / 2;
    let delta_y = (size as i32 - grid.height() as i32) / 2;
    PixelGrid::from_fn(size, size, |x, y| grid.get(x as i32 - delta_x, y as i32 - delta_y))
}

/// Resizes a glyph to `target_size` and centers it on a `final_size` square.
///
/// Thin glyphs keep part of their proportions: the minor side shrinks toward
/// 8 pixels as the side ratio drops from 0.4 to 0.1, so that strokes like
/// `一` do not fill the whole block.
pub fn fit_to_square(
    grid: &PixelGrid,
    target_size: usize,
    final_size: usize,
    threshold: u8,
) -> Result<PixelGrid> {
    let (w, h) = (grid.width() as f32, grid.height() as f32);
    let mut ratio = w / h;
    if ratio > 1.0 {
        ratio = 1.0 / ratio;
    }
    let target_min_dim = scale(ratio, 0.1, 0.4, 8.0, target_size as f32).round() as usize;
    let (mut target_width, mut target_height) = (target_size, target_size);
    if grid.width() > grid.height() {
        target_height = target_min_dim.max(1);
    } else {
        target_width = target_min_dim.max(1);
    }
    let resized = resize_binary(grid, target_width, target_height, threshold)?;
    center_on_square(&resized, final_size)
}

/// Shrinks `rect` toward its midpoint while its outer rows and columns hold
/// no ink.
pub fn crop_border(grid: &PixelGrid, rect: &Rect) -> Rect {
    let mid = rect.midpoint();
    let mut min_x = rect.x;
    while min_x < mid.x && grid.count_column(min_x, rect.y, rect.max_y()) == 0 {
        min_x += 1;
    }
    let mut max_x = rect.max_x();
    while max_x > mid.x && grid.count_column(max_x, rect.y, rect.max_y()) == 0 {
        max_x -= 1;
    }
    let mut min_y = rect.y;
    while min_y < mid.y && grid.count_row(rect.x, rect.max_x(), min_y) == 0 {
        min_y += 1;
    }
    let mut max_y = rect.max_y();
    while max_y > mid.y && grid.count_row(rect.x, rect.max_x(), max_y) == 0 {
        max_y -= 1;
    }
    Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_normalized() {
        let kernel = gaussian_kernel(2);
        assert_eq!(kernel.len(), 5);
        let total: f32 = kernel.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_unsharp_keeps_flat_image() {
        let image = Pixmap::from_pixel(6, 6, Pixel::new(120, 120, 120));
        let sharpened = unsharp_mask(&image, 4.0, 2, 2);
        assert_eq!(sharpened, image);
    }

    #[test]
    fn test_unsharp_increases_contrast() {
        let image = Pixmap::from_fn(10, 1, |x, _| {
            if x < 5 { Pixel::new(100, 100, 100) } else { Pixel::new(160, 160, 160) }
        });
        let sharpened = unsharp_mask(&image, 4.0, 2, 2);
        assert!(sharpened.get_pixel(4, 0).r < 100);
        assert!(sharpened.get_pixel(5, 0).r > 160);
    }

    #[test]
    fn test_is_ink_two_of_three() {
        assert!(is_ink(Pixel::new(10, 10, 250), 140, None));
        assert!(!is_ink(Pixel::new(10, 250, 250), 140, None));
    }

    #[test]
    fn test_is_ink_fixed_level() {
        let level = FixedBlackLevel {
            red: 200,
            green: 40,
            blue: 40,
            range: 20,
        };
        assert!(is_ink(Pixel::new(210, 30, 50), 140, Some(&level)));
        assert!(!is_ink(Pixel::new(0, 0, 0), 140, Some(&level)));
    }

    #[test]
    fn test_resize_solid_block() {
        let grid = PixelGrid::from_fn(10, 10, |_, _| true).unwrap();
        let resized = resize_binary(&grid, 30, 30, 140).unwrap();
        assert_eq!(resized.count_ones(), 900);
    }

    #[test]
    fn test_sharpening_keeps_thin_stroke() {
        // a one pixel stroke shrunk by 2/3 turns light gray
        let grid = PixelGrid::from_fn(9, 9, |x, _| x == 4).unwrap();
        let config = SegmentationConfig::default();
        let plain = resize_binary(&grid, 6, 9, config.pixel_rgb_threshold).unwrap();
        assert_eq!(plain.count_ones(), 0);
        let sharpened = resize_sharpened(&grid, 6, 9, &config).unwrap();
        assert_eq!(sharpened.count_ones(), 18);
        assert!((0..9).all(|y| sharpened.get(2, y) && sharpened.get(3, y)));
    }

    #[test]
    fn test_sharpening_keeps_binary_image() {
        let grid = PixelGrid::from_fn(12, 12, |x, y| (3..7).contains(&x) && (2..10).contains(&y)).unwrap();
        let sharpened = resize_sharpened(&grid, 12, 12, &SegmentationConfig::default()).unwrap();
        assert_eq!(sharpened, grid);
    }

    #[test]
    fn test_fit_to_square_centers() {
        let grid = PixelGrid::from_fn(15, 15, |_, _| true).unwrap();
        let fitted = fit_to_square(&grid, 30, 32, 140).unwrap();
        assert_eq!(fitted.width(), 32);
        assert_eq!(fitted.ink_bounds(), Some(Rect::new(1, 1, 30, 30)));
    }

    #[test]
    fn test_fit_to_square_thin_glyph() {
        let grid = PixelGrid::from_fn(40, 2, |_, _| true).unwrap();
        let fitted = fit_to_square(&grid, 30, 32, 140).unwrap();
        let bounds = fitted.ink_bounds().unwrap();
        assert_eq!(bounds.width, 30);
        assert_eq!(bounds.height, 8);
    }

    #[test]
    fn test_crop_border() {
        let grid = PixelGrid::from_fn(20, 20, |x, y| (5..9).contains(&x) && (6..10).contains(&y))
            .unwrap();
        let rect = crop_border(&grid, &Rect::new(2, 2, 12, 14));
        assert_eq!(rect, Rect::new(5, 6, 4, 4));
    }
}
