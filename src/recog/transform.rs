//! Target bitmaps generated by translating and stretching the glyph image.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::image::filters::{center_on_square, fit_to_square, resize_binary, resize_sharpened};
use crate::image::matrix32::{MATRIX_SIZE, Matrix32};
use crate::image::pixel_grid::PixelGrid;
use crate::recog::reference::HaloMatrix;
use crate::utils::config::{Config, SegmentationConfig};
use crate::utils::error::Result;

/// Translation and stretch applied to a bitmap, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Transformation {
    pub horizontal_translate: i32,
    pub vertical_translate: i32,
    pub horizontal_stretch: i32,
    pub vertical_stretch: i32,
}

impl Transformation {
    pub fn new(
        horizontal_translate: i32,
        vertical_translate: i32,
        horizontal_stretch: i32,
        vertical_stretch: i32,
    ) -> Self {
        Self {
            horizontal_translate,
            vertical_translate,
            horizontal_stretch,
            vertical_stretch,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Total number of one-pixel steps.
    pub fn steps(&self) -> i32 {
        self.horizontal_translate.abs()
            + self.vertical_translate.abs()
            + self.horizontal_stretch.abs()
            + self.vertical_stretch.abs()
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.horizontal_translate, self.vertical_translate, self.horizontal_stretch, self.vertical_stretch
        )
    }
}

/// A transformed view of the glyph being recognized.
#[derive(Debug, Clone)]
pub struct TargetMatrix {
    pub bitmap: HaloMatrix,
    /// Position of the character within the request.
    pub char_index: usize,
    pub transform: Transformation,
}

/// Generates target matrices for one glyph image. Stretched bitmaps are
/// cached, so later stages with more transformations reuse earlier work.
pub struct TargetTransformer {
    base: PixelGrid,
    target_size: i32,
    threshold: u8,
    /// Sharpening applied after each resize, `None` with a fixed black level.
    sharpen: Option<SegmentationConfig>,
    halo_layers: usize,
    char_index: usize,
    stretched: HashMap<(i32, i32), Matrix32>,
}

impl TargetTransformer {
    pub fn new(image: &PixelGrid, config: &Config, char_index: usize) -> Result<Self> {
        let target_size = config.ocr.target_size;
        let threshold = config.segmentation.pixel_rgb_threshold;
        let base = fit_to_square(image, target_size as usize, target_size as usize, threshold)?;
        Ok(Self {
            base,
            target_size,
            threshold,
            sharpen: config.fixed_black_level.is_none().then(|| config.segmentation.clone()),
            halo_layers: config.ocr.halo_size.saturating_sub(1),
            char_index,
            stretched: HashMap::new(),
        })
    }

    /// Every transformation within the limits whose result still fits the
    /// 32×32 canvas.
    pub fn targets(&mut self, max_translate: i32, max_stretch: i32, max_steps: i32) -> Result<Vec<Arc<TargetMatrix>>> {
        let margin = (MATRIX_SIZE - self.target_size) / 2;
        let fits = |stretch: i32, translate: i32| (stretch as f32 / 2.0).ceil() as i32 + translate.abs() <= margin;

        let mut targets = Vec::new();
        for ht in -max_translate..=max_translate {
            for vt in -max_translate..=max_translate {
                for hs in -max_stretch..=max_stretch {
                    for vs in -max_stretch..=max_stretch {
                        let transform = Transformation::new(ht, vt, hs, vs);
                        if transform.steps() > max_steps || !fits(hs, ht) || !fits(vs, vt) {
                            continue;
                        }
                        targets.push(Arc::new(self.transform(transform)?));
                    }
                }
            }
        }
        Ok(targets)
    }

    /// Builds the target for a single transformation.
    pub fn transform(&mut self, transform: Transformation) -> Result<TargetMatrix> {
        let stretched = self.stretch(transform.horizontal_stretch, transform.vertical_stretch)?;
        let matrix = stretched.shifted(transform.horizontal_translate, transform.vertical_translate);
        Ok(TargetMatrix {
            bitmap: HaloMatrix::new(matrix, self.halo_layers),
            char_index: self.char_index,
            transform,
        })
    }

    fn stretch(&mut self, horizontal: i32, vertical: i32) -> Result<Matrix32> {
        if let Some(matrix) = self.stretched.get(&(horizontal, vertical)) {
            return Ok(*matrix);
        }
        let width = (self.target_size + horizontal).max(1) as usize;
        let height = (self.target_size + vertical).max(1) as usize;
        let resized = match &self.sharpen {
            Some(segmentation) => resize_sharpened(&self.base, width, height, segmentation)?,
            None => resize_binary(&self.base, width, height, self.threshold)?,
        };
        let square = center_on_square(&resized, MATRIX_SIZE as usize)?;
        let matrix = Matrix32::from_grid(&square)?;
        self.stretched.insert((horizontal, vertical), matrix);
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> PixelGrid {
        PixelGrid::from_fn(20, 20, |x, y| (4..16).contains(&x) && (4..16).contains(&y)).unwrap()
    }

    #[test]
    fn test_stage_one_transformations() {
        let config = Config::default();
        let mut transformer = TargetTransformer::new(&block(), &config, 2).unwrap();
        let targets = transformer.targets(1, 1, 1).unwrap();
        // identity plus one step in each of the eight directions
        assert_eq!(targets.len(), 9);
        assert!(targets.iter().all(|t| t.char_index == 2));
        assert_eq!(targets.iter().filter(|t| t.transform.is_identity()).count(), 1);
    }

    #[test]
    fn test_translation_limited_by_margin() {
        let mut config = Config::default();
        config.ocr.target_size = 30;
        let mut transformer = TargetTransformer::new(&block(), &config, 0).unwrap();
        let targets = transformer.targets(2, 2, 4).unwrap();
        let has = |ht: i32, hs: i32| {
            targets
                .iter()
                .any(|t| t.transform.horizontal_translate == ht && t.transform.horizontal_stretch == hs)
        };
        // one pixel of margin on each side; shrinking frees room to move
        assert!(has(2, -2));
        assert!(has(0, 2));
        assert!(!has(2, 0));
        assert!(!has(1, 2));
        assert!(targets.iter().all(|t| {
            let tr = t.transform;
            (tr.horizontal_stretch as f32 / 2.0).ceil() as i32 + tr.horizontal_translate.abs() <= 1
                && (tr.vertical_stretch as f32 / 2.0).ceil() as i32 + tr.vertical_translate.abs() <= 1
        }));
    }

    #[test]
    fn test_stretched_target_is_sharpened() {
        let config = Config::default();
        let mut transformer = TargetTransformer::new(&block(), &config, 0).unwrap();
        let shrunk = transformer.transform(Transformation::new(0, 0, -4, 0)).unwrap();
        let width = (config.ocr.target_size - 4) as usize;
        let size = config.ocr.target_size as usize;
        let resized = resize_sharpened(&transformer.base, width, size, &config.segmentation).unwrap();
        let expected = Matrix32::from_grid(&center_on_square(&resized, MATRIX_SIZE as usize).unwrap()).unwrap();
        assert_eq!(shrunk.bitmap.matrix, expected);
    }

    #[test]
    fn test_translation_moves_pixels() {
        let config = Config::default();
        let mut transformer = TargetTransformer::new(&block(), &config, 0).unwrap();
        let identity = transformer.transform(Transformation::default()).unwrap();
        let moved = transformer.transform(Transformation::new(1, 0, 0, 0)).unwrap();
        let bounds = identity.bitmap.matrix.find_bounds().unwrap();
        assert_eq!(moved.bitmap.matrix.find_bounds(), Some(bounds.translate(1, 0)));
        assert_eq!(identity.bitmap.halo.len(), config.ocr.halo_size - 1);
    }
}
