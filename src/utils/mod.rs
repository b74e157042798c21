//! General-purpose utility modules.

pub mod bytes_ext;
pub mod config;
pub mod error;
pub mod log;
pub mod math;

// Re-export commonly used items
pub use error::{OcrError, Result};
