// src/utils/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the recognition library.
#[derive(Error, Debug)]
pub enum OcrError {
    /// An error occurred during I/O operations (cache files, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Recognition was requested before a target image was set.
    #[error("Target image not set")]
    NoTargetImage,

    /// The reference cache file for a configured font does not exist.
    #[error("Reference cache {} not found, rebuild cache", path.display())]
    MissingCache { path: PathBuf },

    /// The loaded reference cache holds no matrices for the requested font.
    #[error("Cache doesn't contain font: {0}, rebuild cache")]
    MissingFont(String),

    /// The reference cache file is truncated or was not written by this library.
    #[error("Corrupt reference cache: {0}")]
    CorruptCache(String),

    /// Simultaneous stretch on both axes was requested for a glyph component.
    #[error(
        "Combined stretch is not supported (horizontal {horizontal_stretch}, vertical {vertical_stretch})"
    )]
    InvalidTransformation {
        horizontal_stretch: i32,
        vertical_stretch: i32,
    },

    /// An invalid argument was provided to a function.
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    /// Occurs when image dimensions do not match the expected dimensions.
    #[error(
        "Dimension mismatch: expected ({}, {}), but got ({}, {})",
        expected.0, expected.1, actual.0, actual.1
    )]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The worker pool channels were disconnected while a request was in flight.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl From<toml::de::Error> for OcrError {
    fn from(err: toml::de::Error) -> Self {
        OcrError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for OcrError {
    fn from(err: toml::ser::Error) -> Self {
        OcrError::Config(err.to_string())
    }
}

/// A specialized `Result` type for recognition operations.
pub type Result<T> = std::result::Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_target_image_message() {
        let err = OcrError::NoTargetImage;
        assert!(matches!(err, OcrError::NoTargetImage));
        assert_eq!(err.to_string(), "Target image not set");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: OcrError = io.into();
        assert!(matches!(err, OcrError::Io(_)));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = OcrError::DimensionMismatch {
            expected: (32, 32),
            actual: (31, 30),
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected (32, 32), but got (31, 30)"
        );
    }
}
