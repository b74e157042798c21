//! A Rust library for recognizing Japanese characters in screen captures.
//!
//! Recognition runs in two steps. Segmentation finds character areas and
//! groups them into vertical or horizontal reading columns. Each selected
//! character is then matched against a cache of pre-rendered reference
//! glyphs using bit-packed 32×32 matrices.
//!
//! # Quick Start
//!
//! ```ignore
//! use kanji_ocr::{Config, Point, Recognizer};
//!
//! let mut ocr = Recognizer::new(Config::default())?;
//! ocr.set_target_image(&pixmap)?;
//!
//! // characters starting from the one under the cursor
//! if let Some(results) = ocr.run_at(Point::new(120, 45))? {
//!     println!("{} ({})", results.best_match(), if results.vertical { "vertical" } else { "horizontal" });
//! }
//! ```
//!
//! # Features
//!
//! - **Automatic orientation**: Vertical and horizontal hypotheses are compared per text block
//! - **Background inversion**: White text on dark backgrounds is detected and inverted
//! - **Furigana detection**: Ruby columns are excluded from the main text
//! - **Worker pool**: Characters of a request are recognized in parallel
//! - **Optional parallelism**: Enable `rayon` feature for parallel cache building
//!
//! # Reference Cache
//!
//! Reference glyphs are rendered outside this crate and stored with
//! [`ReferenceCacheBuilder`]. A missing cache file is reported as
//! [`OcrError::MissingCache`].

// Core modules
pub mod image;
pub mod observer;
pub mod recog;
pub mod recognizer;
pub mod segment;
pub mod utils;

// Public API
pub use recognizer::Recognizer;
pub use observer::Observer;

// Recognition types
pub use recog::{OcrResult, OcrResults, ReferenceCache, ReferenceCacheBuilder, ReferenceMatrix};

// Segmentation types
pub use segment::{Area, Column, ColumnId, ColumnSet};

// Image types
pub use image::{Matrix32, Pixel, PixelGrid, Pixmap, Point, Rect};

// Configuration
pub use utils::config::{CharacterColor, Config, FixedBlackLevel, OrientationTarget, ReferenceFont};

// Error types
pub use utils::error::{OcrError, Result};

// Constants
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.3.0");
    }

    #[test]
    fn test_public_api_segmentation() -> Result<()> {
        let image = Pixmap::from_fn(60, 60, |x, y| {
            if (20..40).contains(&x) && (20..40).contains(&y) {
                Pixel::black()
            } else {
                Pixel::white()
            }
        });
        let mut ocr = Recognizer::new(Config::default())?;
        ocr.set_target_image(&image)?;
        let columns = ocr.columns().ok_or(OcrError::NoTargetImage)?;
        assert_eq!(columns.areas().count(), 1);
        Ok(())
    }
}
