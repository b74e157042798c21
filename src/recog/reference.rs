//! Reference glyphs and the bitmap representation shared with targets.

use crate::image::geom::Rect;
use crate::image::matrix32::Matrix32;

/// A 32×32 bitmap with its halo rings, the unit compared by the scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaloMatrix {
    pub matrix: Matrix32,
    /// Ring `i` holds the pixels first reached by the `i + 1`th dilation.
    pub halo: Vec<Matrix32>,
    pub pixels: u32,
}

impl HaloMatrix {
    /// Wraps `matrix`, building `layers` halo rings.
    pub fn new(matrix: Matrix32, layers: usize) -> Self {
        Self {
            halo: matrix.halo(layers),
            pixels: matrix.count_ones(),
            matrix,
        }
    }
}

/// Connected part of a reference glyph, aligned on its own during
/// component refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub bounds: Rect,
    /// Layer that holds this component's pixels. Only bits inside `bounds`
    /// belong to the component.
    pub matrix: Matrix32,
    pub pixels: u32,
}

/// One rendered character of one reference font.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatrix {
    pub character: char,
    pub bitmap: HaloMatrix,
    /// Multiplier applied to positive scores, favouring common characters.
    pub score_modifier: f32,
    pub font: String,
    pub components: Vec<Component>,
}

impl ReferenceMatrix {
    pub fn matrix(&self) -> &Matrix32 {
        &self.bitmap.matrix
    }

    pub fn pixels(&self) -> u32 {
        self.bitmap.pixels
    }
}
