// src/image/image_formats.rs

//! In-memory representation of the RGB images handed to the recognizer.
//!
//! Decoding from files is left to the caller; any decoder that yields packed
//! 8-bit RGB bytes can feed `Pixmap::from_raw`.

use bytemuck::{Pod, Zeroable};

use crate::utils::error::{OcrError, Result};

// --- Pixel Type Definitions ---

/// A single RGB pixel with 8-bit components.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Pixel { r, g, b }
    }

    pub fn black() -> Self {
        Pixel { r: 0, g: 0, b: 0 }
    }

    pub fn white() -> Self {
        Pixel {
            r: 255,
            g: 255,
            b: 255,
        }
    }

    /// Darkest channel value. Used as the pixel's ink intensity.
    pub fn min_channel(&self) -> u8 {
        self.r.min(self.g).min(self.b)
    }
}

// --- Pixmap Type (Color Image Buffer) ---

/// A 2D buffer of color pixels stored in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<Pixel>,
}

impl Pixmap {
    /// Creates a pixmap filled with a single pixel value.
    pub fn from_pixel(width: u32, height: u32, pixel: Pixel) -> Self {
        Pixmap {
            width,
            height,
            data: vec![pixel; (width * height) as usize],
        }
    }

    /// Creates a pixmap from packed RGB bytes (3 bytes per pixel, row-major).
    pub fn from_raw(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if bytes.len() != expected {
            return Err(OcrError::InvalidArg(format!(
                "expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                bytes.len()
            )));
        }
        let data: Vec<Pixel> = bytemuck::cast_slice::<u8, Pixel>(bytes).to_vec();
        Ok(Pixmap {
            width,
            height,
            data,
        })
    }

    /// Creates a pixmap by calling a function for each pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Pixel,
    {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Pixmap {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        assert!(x < self.width && y < self.height);
        self.data[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.data
    }

    /// Returns raw pixel data as a byte slice.
    pub fn as_raw(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let bytes = [0u8, 1, 2, 3, 4, 5];
        let pixmap = Pixmap::from_raw(2, 1, &bytes).unwrap();
        assert_eq!(pixmap.get_pixel(1, 0), Pixel::new(3, 4, 5));
        assert_eq!(pixmap.as_raw(), &bytes);
    }

    #[test]
    fn test_from_raw_wrong_length() {
        let result = Pixmap::from_raw(2, 2, &[0u8; 5]);
        assert!(matches!(result, Err(OcrError::InvalidArg(_))));
    }

    #[test]
    fn test_min_channel() {
        assert_eq!(Pixel::new(200, 30, 90).min_channel(), 30);
    }
}
