pub mod filters;
pub mod geom;
pub mod image_formats;
pub mod matrix32;
pub mod pixel_grid;

pub use geom::{Point, Rect};
pub use image_formats::{Pixel, Pixmap};
pub use matrix32::Matrix32;
pub use pixel_grid::PixelGrid;
