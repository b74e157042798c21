//! Per-image state shared by the segmentation steps.

use crate::image::geom::Rect;
use crate::image::image_formats::Pixmap;
use crate::image::pixel_grid::PixelGrid;
use crate::utils::config::{CharacterColor, Config};
use crate::utils::error::Result;

/// Rasters derived from one target image.
///
/// `binary` starts as the thresholded image and is modified in place by
/// background inversion. `background` holds ink that does not belong to any
/// accepted area; `border` marks the separator lines drawn around inverted
/// regions.
#[derive(Debug, Clone)]
pub struct SegmentationTask {
    original: Pixmap,
    pub binary: PixelGrid,
    pub background: PixelGrid,
    pub border: PixelGrid,
    /// Inverted flag per block, row-major over `blocks_x` × `blocks_y`.
    pub inverted: Vec<bool>,
    pub blocks_x: usize,
    pub blocks_y: usize,
    pub block_size: usize,
    invert_all: bool,
    invert_none: bool,
}

impl SegmentationTask {
    pub fn new(original: Pixmap, binary: PixelGrid, config: &Config) -> Result<Self> {
        let (width, height) = (binary.width(), binary.height());
        let block_size = config.segmentation.invert_block_size.max(1);
        let blocks_x = width.div_ceil(block_size);
        let blocks_y = height.div_ceil(block_size);
        Ok(SegmentationTask {
            original,
            background: PixelGrid::new(width, height)?,
            border: PixelGrid::new(width, height)?,
            binary,
            inverted: vec![false; blocks_x * blocks_y],
            blocks_x,
            blocks_y,
            block_size,
            invert_all: config.fixed_black_level.is_none()
                && config.color == CharacterColor::WhiteOnBlack,
            invert_none: config.fixed_black_level.is_some()
                || config.color == CharacterColor::BlackOnWhite,
        })
    }

    pub fn width(&self) -> i32 {
        self.binary.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.binary.height() as i32
    }

    pub fn original(&self) -> &Pixmap {
        &self.original
    }

    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> bool {
        self.binary.get(x, y)
    }

    #[inline]
    pub fn background_pixel(&self, x: i32, y: i32) -> bool {
        self.background.get(x, y)
    }

    #[inline]
    pub fn border_pixel(&self, x: i32, y: i32) -> bool {
        self.border.get(x, y)
    }

    /// Counts ink pixels (or background pixels with `background == true`)
    /// inside `rect`, or only along its outline when `inside` is false.
    pub fn count_pixels(&self, rect: &Rect, background: bool, inside: bool) -> usize {
        let grid = if background { &self.background } else { &self.binary };
        grid.count_in_rect(rect, inside)
    }

    pub fn is_block_inverted(&self, bx: usize, by: usize) -> bool {
        self.inverted[by * self.blocks_x + bx]
    }

    fn is_pixel_inverted(&self, x: i32, y: i32) -> bool {
        if self.invert_none {
            false
        } else if self.invert_all {
            true
        } else {
            let bx = x as usize / self.block_size;
            let by = y as usize / self.block_size;
            self.is_block_inverted(bx, by)
        }
    }

    /// Ink intensity of a source pixel: its darkest channel, flipped inside
    /// inverted regions so that text is always dark.
    pub fn pixel_rgb(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.original.width() as i32 || y >= self.original.height() as i32 {
            return 255;
        }
        let min = self.original.get_pixel(x as u32, y as u32).min_channel();
        if self.is_pixel_inverted(x, y) { 255 - min } else { min }
    }
}
